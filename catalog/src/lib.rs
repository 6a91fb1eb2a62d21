pub mod monitor;
pub mod registry;
pub mod server;

pub use monitor::{LivenessMonitor, MonitorHandle, StatusObserver};
pub use registry::{Catalog, CatalogStore, ListFilter};

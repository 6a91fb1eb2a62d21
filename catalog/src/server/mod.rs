//! HTTP server wiring for the catalog.
//!
//! Mounts the catalog boundary behind a REST surface and owns the liveness
//! monitor lifecycle: the monitor starts before the server accepts traffic
//! and is shut down cleanly after the server stops.

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use common::{CatalogConfig, Result};
use log::info;

use crate::monitor::{LivenessMonitor, StatusObserver};
use crate::registry::Catalog;

pub mod handlers;

pub struct CatalogServer {
    catalog: Arc<Catalog>,
    config: CatalogConfig,
    observer: Option<StatusObserver>,
}

impl CatalogServer {
    pub fn new(catalog: Arc<Catalog>, config: CatalogConfig) -> Self {
        Self {
            catalog,
            config,
            observer: None,
        }
    }

    /// Forwards a status observer to the liveness monitor.
    pub fn with_observer(mut self, observer: StatusObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Runs until the HTTP server stops, then shuts the monitor down.
    pub async fn run(self) -> Result<()> {
        let mut monitor = LivenessMonitor::new(Arc::clone(&self.catalog), self.config.clone());
        if let Some(observer) = self.observer {
            monitor = monitor.with_observer(observer);
        }
        let monitor = monitor.spawn();

        let catalog = web::Data::from(Arc::clone(&self.catalog));
        info!("Starting catalog HTTP server on {}", self.config.bind_address);
        let server = HttpServer::new(move || {
            App::new()
                .app_data(catalog.clone())
                .service(
                    web::scope("/catalog")
                        .route("/{kind}", web::post().to(handlers::register))
                        .route("/{kind}", web::get().to(handlers::list))
                        .route("/{kind}/{id}", web::get().to(handlers::get))
                        .route("/{kind}/{id}", web::delete().to(handlers::deregister))
                        .route("/{kind}/{id}/heartbeat", web::post().to(handlers::heartbeat)),
                )
                .route("/status", web::get().to(handlers::get_status))
                .wrap(
                    actix_cors::Cors::default()
                        .allow_any_origin()
                        .allow_any_method()
                        .allow_any_header(),
                )
        })
        .bind(&self.config.bind_address)?
        .run();

        let result = server.await;
        info!("HTTP server stopped, shutting down liveness monitor");
        monitor.shutdown().await;
        result?;
        Ok(())
    }
}

//! Main entry point for the catalog server application

use std::io::Write;
use std::sync::Arc;

use actix_web::main as actix_main;
use catalog_server::registry::Catalog;
use catalog_server::server::CatalogServer;
use chrono::Local;
use common::{CatalogConfig, Result};
use env_logger::fmt::Color;
use env_logger::Builder;
use log::{error, info, LevelFilter};

const BANNER: &str = r#"
    ██████╗ █████╗ ████████╗ █████╗ ██╗      ██████╗  ██████╗
   ██╔════╝██╔══██╗╚══██╔══╝██╔══██╗██║     ██╔═══██╗██╔════╝
   ██║     ███████║   ██║   ███████║██║     ██║   ██║██║  ███╗
   ██║     ██╔══██║   ██║   ██╔══██║██║     ██║   ██║██║   ██║
   ╚██████╗██║  ██║   ██║   ██║  ██║███████╗╚██████╔╝╚██████╔╝
    ╚═════╝╚═╝  ╚═╝   ╚═╝   ╚═╝  ╚═╝╚══════╝ ╚═════╝  ╚═════╝

   IoT Resource Catalog v0.1.0
"#;

fn setup_logger() {
    let mut builder = Builder::from_default_env();

    builder
        .format(|buf, record| {
            let mut timestamp_style = buf.style();
            let mut level_style = buf.style();
            let mut target_style = buf.style();
            let mut message_style = buf.style();

            let level_color = match record.level() {
                log::Level::Error => Color::Red,
                log::Level::Warn => Color::Yellow,
                log::Level::Info => Color::Green,
                log::Level::Debug => Color::Cyan,
                log::Level::Trace => Color::White,
            };

            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            writeln!(
                buf,
                "{} {} [{}] {}",
                timestamp_style.set_color(Color::Rgb(100, 100, 100)).value(timestamp),
                level_style.set_color(level_color).value(record.level()),
                target_style.set_color(Color::Blue).value(record.target()),
                message_style.set_color(Color::White).value(record.args())
            )
        })
        .filter(None, LevelFilter::Info)
        .init();
}

#[actix_main]
async fn main() -> Result<()> {
    setup_logger();

    println!("{}", BANNER);

    info!("Starting catalog server...");

    let config = CatalogConfig::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    info!(
        "Configuration loaded (bind {}, scan every {:?}, stale after {:?}, offline after {:?})",
        config.bind_address, config.scan_interval, config.stale_after, config.offline_after
    );

    let catalog = Arc::new(Catalog::new());
    info!("Catalog instance {} initialized", catalog.instance_id());

    CatalogServer::new(catalog, config).run().await
}

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use watchpost::config::Config;
use watchpost::geolocation::DatabaseResolver;
use watchpost::input::{CachedRunner, ShellRunner};
use watchpost::monitor::Monitor;

/// Dashboard server entry point
#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting SSH + OpenProject monitor dashboard...");

    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("watchpost.toml"));

    let mut config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else {
        log::warn!("Config file {:?} not found, using defaults", config_path);
        Config::default()
    };
    config.apply_env_overrides();

    let geo = DatabaseResolver::open(&config.paths.geoip_db);
    if geo.is_available() {
        log::info!("GeoIP database loaded from {:?}", config.paths.geoip_db);
    }

    let ttl = Duration::from_secs(config.commands.cache_ttl_secs);
    let runner = Arc::new(CachedRunner::new(
        ShellRunner::new(config.commands.timeout_secs),
        ttl,
    ));

    if !ttl.is_zero() {
        let pruned = Arc::clone(&runner);
        actix_web::rt::spawn(async move {
            let mut interval = tokio::time::interval(ttl * 12);
            loop {
                interval.tick().await;
                pruned.prune();
            }
        });
    }

    let (host, port) = (config.server.host.clone(), config.server.port);
    let monitor = web::Data::new(Arc::new(Monitor::new(config, runner, Arc::new(geo))?));

    log::info!("Listening on {}:{}", host, port);
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(monitor.clone())
            .configure(watchpost::api::configure)
    })
    .bind((host, port))?
    .run()
    .await?;

    log::info!("Dashboard stopped");
    Ok(())
}

use actix_web::{web, App, HttpServer};
use log::{error, info};
use std::env;
use std::sync::Arc;

use rde_roster::config::AppConfig;
use rde_roster::db;
use rde_roster::handlers;
use rde_roster::kafka::{create_producer, KafkaConfig};
use rde_roster::logger::setup_logger;
use rde_roster::middleware::RequestLogger;
use rde_roster::notifications::Notifier;

fn fail(message: String) -> std::io::Error {
    error!("{}", message);
    std::io::Error::new(std::io::ErrorKind::Other, message)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables and initialize logger
    dotenvy::dotenv().ok();
    setup_logger();

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .map_err(|e| fail(format!("PORT must be a number: {}", e)))?;

    let config = AppConfig::from_env();
    config
        .validate()
        .map_err(|e| fail(format!("Invalid configuration: {}", e)))?;

    let db_url = env::var("DATABASE_URL").map_err(|_| fail("DATABASE_URL must be set".to_string()))?;
    info!("Connecting to database");
    let pool = db::init_pool(&db_url).map_err(fail)?;

    tokio::fs::create_dir_all(&config.media_root)
        .await
        .map_err(|e| fail(format!("Cannot create media root {:?}: {}", config.media_root, e)))?;

    let producer = Arc::new(create_producer(&KafkaConfig::from_env()));
    let notifier = Notifier::new(producer, &config);
    let max_upload_bytes = config.max_upload_bytes;

    info!("Starting HTTP server at http://{}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(RequestLogger)
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(notifier.clone()))
            .app_data(web::PayloadConfig::new(max_upload_bytes))
            .configure(handlers::configure)
    })
    .workers(2)
    .keep_alive(std::time::Duration::from_secs(75))
    .shutdown_timeout(30)
    .on_connect(|_conn, addr| {
        log::debug!("New connection from: {:?}", addr);
    })
    .bind((host, port))?
    .run()
    .await
}

mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod services;
mod utils;
#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use actix_web::{App, HttpServer, middleware::Logger, web};

use crate::config::AppConfig;
use crate::services::notifier::{LogNotifier, ResetCodeNotifier};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;
    utils::logger::init_logger(config.log_format);

    if config.uses_default_secret() {
        tracing::warn!("JWT_SECRET not set, using the insecure development secret");
    }

    tracing::info!(database_url = %config.database_url, "connecting to database");
    let db = db::establish_connection(&config)
        .await
        .map_err(std::io::Error::other)?;
    db::create_schema(&db).await.map_err(std::io::Error::other)?;
    tracing::info!("database ready");

    tokio::fs::create_dir_all(&config.media_root).await?;

    let bind = (config.bind_addr.clone(), config.port);
    let notifier: Arc<dyn ResetCodeNotifier> = Arc::new(LogNotifier);
    let config = web::Data::new(config);
    let notifier = web::Data::from(notifier);

    tracing::info!(addr = %bind.0, port = bind.1, "starting server");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(db.clone()))
            .app_data(config.clone())
            .app_data(notifier.clone())
            .app_data(web::JsonConfig::default().limit(config.max_upload_bytes * 2))
            .configure(routes::configure_routes)
    })
    .bind(bind)?
    .run()
    .await
}

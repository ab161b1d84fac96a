use actix_web::{http::StatusCode, middleware::{ErrorHandlers, Logger}, web, App, HttpServer};
use dotenv::dotenv;
use log::{error, info};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::io;
use std::time::Duration;

mod auth;
mod config;
mod delay;
mod error;
mod models;
mod notify;
mod response;
mod routes;
mod scope;
mod sheets;
mod status;
mod week;

use config::Config;
use sheets::SheetsClient;

fn spawn_reminder_loop(pool: MySqlPool, every_secs: u64) {
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(every_secs));
        loop {
            interval.tick().await;
            if let Err(e) = notify::generate_delay_reminders(&pool, delay::now()).await {
                error!("Reminder sweep failed: {}", e);
            }
        }
    });
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            error!("Failed to create pool: {}", e);
            io::Error::new(io::ErrorKind::Other, e)
        })?;

    if config.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            error!("Failed to run migrations: {}", e);
            io::Error::new(io::ErrorKind::Other, e)
        })?;
        info!("Migrations applied");
    }

    let sheets = SheetsClient::new(config.sheets_base_url.clone(), config.sheets_api_key.clone())
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    if !sheets.is_configured() {
        info!("GOOGLE_SHEETS_API_KEY not set, FMS sheet sync is disabled");
    }

    if config.reminder_interval_secs > 0 {
        info!("Overdue reminders every {} seconds", config.reminder_interval_secs);
        spawn_reminder_loop(pool.clone(), config.reminder_interval_secs);
    }

    let server_address = config.server_address.clone();
    info!("Server running at http://{}", server_address);

    let pool = web::Data::new(pool);
    let config = web::Data::new(config);
    let sheets = web::Data::new(sheets);

    HttpServer::new(move || {
        App::new()
            .app_data(pool.clone())
            .app_data(config.clone())
            .app_data(sheets.clone())
            .wrap(ErrorHandlers::new().handler(StatusCode::METHOD_NOT_ALLOWED, error::method_not_allowed))
            .wrap(Logger::default())
            .configure(routes::routes::app_configure)
            .default_service(web::to(error::not_found))
    })
    .bind(server_address)?
    .run()
    .await
}

//! Parking engine server
//!
//! Serves the gate and back-office API over PostgreSQL.

use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use anyhow::Context;
use parking_api::{configure, json_config, query_config};
use parking_auth::JwtService;
use parking_core::AppConfig;
use parking_db::{create_pool, run_migrations, PgStore};
use parking_services::{EngineSettings, ParkingEngine};
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "parking_server={0},parking_api={0},parking_services={0},parking_db={0},parking_auth={0},actix_web=info,sqlx=warn",
            log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting parking engine v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().context("Failed to load configuration")?;
    let settings = EngineSettings::from_config(&config.billing, &config.policy)?;

    info!("Connecting to database...");
    let pool = create_pool(&config.database).await?;
    run_migrations(&pool).await?;

    let engine = Arc::new(ParkingEngine::with_system_clock(
        Arc::new(PgStore::new(pool)),
        settings,
    ));
    engine.bootstrap(&config.inventory).await?;

    let jwt_service = Arc::new(JwtService::from_config(&config.auth));
    info!(
        "JWT service configured with {} second token expiration",
        jwt_service.expiration_secs()
    );

    let bind_addr = config.server_addr();
    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, config.server.workers
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::from(engine.clone()))
            .app_data(web::Data::new(jwt_service.clone()))
            .app_data(query_config())
            .app_data(json_config())
            .wrap(TracingLogger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure::<PgStore>)
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(config.server.workers)
    .bind(&bind_addr)?
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}

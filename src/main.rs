mod config;
mod db;
mod domain;
mod middleware;
mod services;
mod state;
mod web;

use crate::config::Config;
use crate::services::mailer::Mailer;
use crate::state::SharedState;
use axum::{routing::get_service, Router};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{services::ServeDir, services::ServeFile, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL missing");
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            e
        })?;
    tracing::info!("Database migrations completed");

    db::seed::seed_all(&pool).await?;

    let mailer = Arc::new(Mailer::new(config.email.clone(), config.base_url.clone()));
    let shared: SharedState = Arc::new(state::AppState {
        pool,
        session_key: config.session_key.clone(),
        mailer,
    });

    let static_handler = ServeDir::new("static").not_found_service(ServeFile::new("index.html"));

    let app = Router::new()
        .merge(web::routes(shared.clone()))
        .fallback_service(get_service(static_handler))
        .layer(axum::middleware::from_fn_with_state(
            shared.clone(),
            middleware::guard::route_guard,
        ))
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

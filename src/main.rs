mod auth;
mod config;
mod middleware;

mod db;
mod error;
mod images;
mod models;
mod ownership;
mod reservation_access;
mod routes;
mod schedule;
mod store;
mod tokens;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::{
    config::Config,
    models::AppState,
    reservation_access::ReservationAccess,
    store::{PgBlockedSlotStore, PgReservationStore},
    tokens::TokenKeys,
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg).await?;
    db::init_schema(&pool).await?;

    let keys = Arc::new(TokenKeys::from_secret(&cfg.jwt_secret));
    let state = AppState {
        db: pool.clone(),
        reservations: Arc::new(PgReservationStore::new(pool.clone())),
        blocked_slots: Arc::new(PgBlockedSlotStore::new(pool.clone())),
        tokens: keys.clone(),
        reservation_access: ReservationAccess::new(
            keys,
            chrono::Duration::minutes(cfg.reservation_token_ttl_minutes),
        ),
        admin_password: Arc::from(cfg.admin_password.as_str()),
        user_token_ttl_hours: cfg.user_token_ttl_hours,
        admin_token_ttl_hours: cfg.admin_token_ttl_hours,
    };

    // The public site and the admin console are served from other origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    pool.close().await;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

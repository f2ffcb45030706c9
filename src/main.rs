//! Gateway HTTP entrypoint.
//!
//! Boots an Axum server exposing the asset gateway surface: payments,
//! issuances, dividends, wallets and activations over two blockchain
//! backends, behind HMAC request authentication.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `CONFIG` selects the JSON configuration file
//! - `ENV=dev` stubs out broadcasts and reduces fee constants
//! - `OTEL_*` variables enable tracing export

use axum::http::Method;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors;
use tower_http::trace::TraceLayer;

use chaingate::app::AppState;
use chaingate::config::{Config, Env};
use chaingate::routes;
use chaingate::sig_down::SigDown;
use chaingate::telemetry::Telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let _telemetry = Telemetry::init();

    let config = Config::load()?;
    let env = Env::from_env();
    tracing::info!(env = env.as_str(), "configuration loaded");

    let state = Arc::new(AppState::new(config, env).await?);
    let addr = SocketAddr::new(state.config.host, state.config.port);

    let http_endpoints = axum::Router::new()
        .merge(routes::routes().with_state(state))
        .layer(TraceLayer::new_for_http())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        );

    tracing::info!("Starting server at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        });

    let sig_down = SigDown::try_new()?;
    let cancellation_token = sig_down.cancellation_token();
    let graceful_shutdown = async move { cancellation_token.cancelled().await };
    axum::serve(listener, http_endpoints)
        .with_graceful_shutdown(graceful_shutdown)
        .await?;

    Ok(())
}

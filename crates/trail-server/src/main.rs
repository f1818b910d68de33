//! Trail Server - live ADS-B trail accumulation and lifecycle service

use anyhow::Result;
use axum::routing::get;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trail_server::config::Config;
use trail_server::feed::FeedClient;
use trail_server::state::AppState;
use trail_server::{api, loops};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("trail_server=debug".parse()?))
        .init();

    tracing::info!("Starting Trail Server...");

    let config = Config::from_env();
    let port = config.server_port;
    let state = Arc::new(AppState::new(&config));
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let feed = FeedClient::new(
        &config.feeder_url,
        Duration::from_secs(config.request_timeout_secs),
    );

    // Start background loops
    let handles = vec![
        tokio::spawn(loops::live_update_loop::run_live_update_loop(
            state.clone(),
            feed,
            config.live_update_interval_secs,
            shutdown_tx.subscribe(),
        )),
        tokio::spawn(loops::cleanup_loop::run_cleanup_loop(
            state.clone(),
            config.cleanup_interval_secs,
            shutdown_tx.subscribe(),
        )),
        tokio::spawn(loops::fade_loop::run_fade_loop(
            state.clone(),
            config.auto_fade_interval_secs,
            shutdown_tx.subscribe(),
        )),
    ];

    // Build the app
    let app = api::routes()
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Run server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(());
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

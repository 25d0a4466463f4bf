use anyhow::Context;
use axum::routing::get;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use twr_server::{api, config::Config, loops, persistence, reference, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "twr_server=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(?config, "starting tower admission server");

    let database =
        persistence::init_database(&config.database_path, config.database_max_connections)
            .await
            .context("database init failed")?;

    let snapshot = match reference::load_snapshot(&config.reference_path) {
        Ok(data) => data,
        Err(err) => {
            tracing::warn!(
                path = %config.reference_path,
                error = %err,
                "reference snapshot unavailable, starting with empty data"
            );
            Default::default()
        }
    };

    let port = config.server_port;
    let sweep_interval = config.notam_sweep_interval_secs;
    let (state, audit_rx) = AppState::new(config, database, snapshot);
    let state = Arc::new(state);
    state
        .load_from_database()
        .await
        .context("audit cache warm-up failed")?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let persist_handle = tokio::spawn(loops::audit_persist_loop::run_audit_persist_loop(
        state.database().clone(),
        audit_rx,
        shutdown_tx.subscribe(),
    ));
    tokio::spawn(loops::notam_sweep_loop::run_notam_sweep_loop(
        state.clone(),
        sweep_interval,
        shutdown_tx.subscribe(),
    ));

    let app = api::routes()
        .route("/health", get(|| async { "ok" }))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind failed")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .context("server error")?;

    // Let the persist loop drain the audit channel before exit.
    let _ = shutdown_tx.send(());
    let _ = persist_handle.await;

    Ok(())
}

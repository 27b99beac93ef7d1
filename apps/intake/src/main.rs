mod analysis;
mod config;
mod errors;
mod extraction;
mod intake;
mod models;
mod routes;
mod session;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::scoring::HeuristicScorer;
use crate::config::Config;
use crate::extraction::pdf::PdfParser;
use crate::routes::build_router;
use crate::session::store::spawn_sweeper;
use crate::session::{Pipeline, SessionStore};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume intake v{}", env!("CARGO_PKG_VERSION"));

    let policy = config.policy()?;
    info!(
        "Intake policy: max {} accepting {}",
        policy.limit_label(),
        config.accepted_types
    );

    // PdfParser (lopdf, pdf-extract fallback) and the heuristic scorer by default.
    let pipeline = Pipeline::new(
        Arc::new(PdfParser),
        Arc::new(HeuristicScorer),
        config.timings(),
    );

    let sessions = SessionStore::new();
    spawn_sweeper(
        sessions.clone(),
        config.session_idle_ttl(),
        config.session_sweep_every(),
    );
    info!(
        "Idle sessions expire after {}s",
        config.session_idle_ttl().as_secs()
    );

    let state = AppState {
        config: config.clone(),
        policy: Arc::new(policy),
        sessions,
        pipeline,
    };

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()), // TODO: restrict origins to the wizard frontend
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

//! Centavo Server - REST API for AI-assisted personal finance
//!
//! Serves spending tips, weekly meal plans, receipt scanning and the token
//! usage ledger under `/api/v1`, plus `/health` and `/metrics`.

mod auth;
mod config;
mod error;
mod health;
mod metrics;
mod routes;
mod state;

use anyhow::Context;
use centavo_ai::{AiError, Advisor, GeminiClient};
use centavo_core::CostRates;
use centavo_store::Store;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Command};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let store = Store::connect(&cli.database_url, cli.max_connections)
        .await
        .context("Failed to connect to database")?;
    store.migrate().await.context("Failed to run migrations")?;

    match cli.command.unwrap_or_default() {
        Command::Migrate => Ok(()),
        Command::Serve => serve(cli.bind_addr, store).await,
    }
}

async fn serve(addr: SocketAddr, store: Store) -> anyhow::Result<()> {
    let advisor = build_advisor()?;
    let state = Arc::new(AppState::new(store, advisor, CostRates::from_env()));
    let app = routes::app(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Starting Centavo server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.shutdown.clone()))
        .await
        .context("Server error")?;
    Ok(())
}

/// Missing credentials degrade to heuristics; any other configuration error
/// stops startup.
fn build_advisor() -> anyhow::Result<Advisor> {
    match GeminiClient::from_env() {
        Ok(client) => {
            info!("AI generation enabled with model {}", client.model());
            Ok(Advisor::new(client))
        }
        Err(AiError::MissingCredentials) => {
            warn!("GEMINI_API_KEY not set; tips, meal plans and receipts will use heuristics");
            Ok(Advisor::disabled())
        }
        Err(e) => Err(e).context("Invalid AI configuration"),
    }
}

async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
    token.cancel();
}

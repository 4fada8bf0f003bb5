//! citadel - feed aggregation and curation service
//!
//! One process runs the whole system: the SQLite-backed store, the worker
//! with its schedules and workflows, and the HTTP API. Construction happens
//! here, in order, and shutdown unwinds in reverse: stop accepting HTTP,
//! drain the worker, close the database.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use citadel_common::config::Config;
use citadel_common::db::{init, Store};
use citadel_common::{Error, Result};
use citadel_server::api::{build_router, cookie_key, AppState};
use citadel_server::reader::Reader;
use citadel_worker::fetch::Fetcher;
use citadel_worker::judge::ClaudeClient;
use citadel_worker::{Activities, Worker};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    info!(
        port = config.port,
        database = %config.database,
        version = env!("CARGO_PKG_VERSION"),
        "starting citadel"
    );

    // Store
    let pool = init::connect(&config.database).await?;
    let store = Store::new(pool.clone());

    // Worker: fetcher, judgement client, activities, schedules
    let claude = match &config.claude_api_key {
        Some(key) => Some(ClaudeClient::new(key.clone())?),
        None => {
            info!("no claude api key configured, judgement will only auto-approve");
            None
        }
    };
    let activities = Activities::new(store.clone(), Fetcher::new()?, claude);
    let worker = Worker::new(activities);
    worker.start().await;

    // HTTP API
    let http = reqwest::Client::builder()
        .user_agent(concat!("citadel/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| Error::Internal(format!("error building http client: {err}")))?;
    let state = AppState {
        store,
        workflows: worker.workflows(),
        reader: Arc::new(Reader::new()?),
        http,
        cookie_key: cookie_key(&config.cookie_hash_key, &config.cookie_block_key),
        config: Arc::new(config.clone()),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .map_err(|err| Error::Internal(format!("error binding port {}: {err}", config.port)))?;
    info!(port = config.port, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| Error::Internal(format!("server error: {err}")))?;

    // HTTP accept has stopped; unwind the rest in order.
    worker.shutdown().await;
    pool.close().await;
    info!("goodbye");

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}

pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod domain;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use crate::core::{config::Settings, state::AppState, telemetry};
use crate::repositories::exam_bank::ExamBank;
use crate::repositories::results::{RedisResultStore, ResultStore};
use crate::services::attempts::AttemptService;
use crate::services::oracle::GradingOracle;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let bank = ExamBank::load(std::path::Path::new(&settings.exam_bank().root))?;

    let results = RedisResultStore::new(settings.redis().redis_url());
    if let Err(err) = results.connect().await {
        tracing::error!(error = %err, "Failed to connect to Redis; continuing without result history");
    } else {
        tracing::info!("Redis connected successfully");
    }

    let oracle = GradingOracle::from_settings(&settings)?;
    let store: Arc<dyn ResultStore> = Arc::new(results.clone());
    let attempts = AttemptService::new(
        oracle,
        store.clone(),
        Duration::from_millis(settings.grading().oracle_delay_ms),
    );

    let state = AppState::new(settings, bank, store, attempts);
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "ExamPrep Rust API listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    results.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}

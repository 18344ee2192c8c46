pub mod orders;
pub mod payments;
pub mod webhook;

use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;

use crate::AppState;
use crate::error::AppError;
use crate::store::StatusCounts;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub orders: StatusCounts,
}

pub async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let counts = state.store.counts().await?;

    Ok(Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        orders: counts,
    }))
}

//! Inbound processor webhook. Verification runs over the raw body before
//! anything is parsed for business logic; a bad signature mutates nothing.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
};
use serde_json::json;

use crate::AppState;
use crate::error::AppError;
use crate::verifier;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::VerificationFailed("missing signature header".to_string())
        })?;

    let event = verifier::verify(&body, header, &state.webhook_secret)?;
    state.reconciler.apply_event(&event).await?;

    // Business no-ops still acknowledge receipt, or the processor redelivers.
    Ok(Json(json!({ "received": true })))
}

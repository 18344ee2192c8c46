//! Read API for the admin dashboard.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::domain::order::{Order, OrderStatus};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub count: usize,
    pub orders: Vec<Order>,
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let status = match params.status.as_deref() {
        Some(raw) => Some(raw.parse::<OrderStatus>().map_err(AppError::Validation)?),
        None => None,
    };

    let orders = state.store.list(status).await?;

    Ok(Json(ListResponse {
        success: true,
        count: orders.len(),
        orders,
    }))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let order = state
        .store
        .find(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {} not found", id)))?;

    Ok(Json(order))
}

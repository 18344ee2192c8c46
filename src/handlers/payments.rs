//! Payment-intent creation and the client's save-order call.

use std::collections::HashMap;

use axum::{Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AppState;
use crate::domain::order::{Amount, OrderStatus};
use crate::error::AppError;
use crate::services::reconciler::OrderMetadata;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateIntentRequest {
    pub amount: Option<Amount>,
    pub currency: Option<String>,
    pub order_details: Option<Value>,
    pub customer_info: Option<Value>,
    pub shipping: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentResponse {
    pub client_secret: String,
    pub payment_reference_id: String,
    pub order_id: String,
}

/// Creates a remote payment intent, then records the matching pending order.
/// The gateway call happens first; no order exists for a failed intent.
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Json(body): Json<CreateIntentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let amount = body
        .amount
        .ok_or_else(|| AppError::Validation("Missing amount".to_string()))?;
    let currency = body.currency.unwrap_or_else(|| "usd".to_string());

    let mut metadata = HashMap::new();
    if let Some(email) = body
        .customer_info
        .as_ref()
        .and_then(|info| info.get("email"))
        .and_then(Value::as_str)
    {
        metadata.insert("customer_email".to_string(), email.to_string());
    }

    let intent = state.stripe.create_intent(amount, &currency, &metadata).await?;

    let order = state
        .reconciler
        .register_intent(
            &intent.id,
            amount,
            &currency,
            OrderMetadata {
                customer_info: body.customer_info,
                order_details: body.order_details,
                shipping: body.shipping,
            },
        )
        .await?;

    Ok(Json(CreateIntentResponse {
        client_secret: intent.client_secret,
        payment_reference_id: intent.id,
        order_id: order.id,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SaveOrderRequest {
    pub payment_reference_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub amount: Option<Amount>,
    pub customer_info: Option<Value>,
    pub order_details: Option<Value>,
    pub shipping: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOrderResponse {
    pub success: bool,
    pub order_id: String,
}

/// Client-side confirmation. The claimed status is provisional; only a
/// verified webhook finalizes the order.
pub async fn save_order(
    State(state): State<AppState>,
    Json(body): Json<SaveOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let reference_id = body
        .payment_reference_id
        .ok_or_else(|| AppError::Validation("Missing paymentReferenceId".to_string()))?;

    let order = state
        .reconciler
        .record_order(
            &reference_id,
            body.status,
            body.amount,
            OrderMetadata {
                customer_info: body.customer_info,
                order_details: body.order_details,
                shipping: body.shipping,
            },
        )
        .await?;

    Ok(Json(SaveOrderResponse {
        success: true,
        order_id: order.id,
    }))
}

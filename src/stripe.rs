//! HTTP client for the payment processor's payment-intent API.
//!
//! Remote intent creation is not idempotent without an idempotency key, so a
//! failed or timed-out call is surfaced as a terminal `Gateway` error and
//! never retried here.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info};

use crate::domain::order::Amount;
use crate::error::AppError;

/// Smallest chargeable amount in minor units, mirroring the processor's
/// own floor for card charges.
pub const MIN_CHARGE_AMOUNT: Amount = 50;

const DEFAULT_API_URL: &str = "https://api.stripe.com";

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    base_url: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(secret_key: String, timeout: Duration) -> Self {
        Self::with_base_url(secret_key, DEFAULT_API_URL.to_string(), timeout)
    }

    /// Base URL override, used by tests to point at a local mock server.
    pub fn with_base_url(secret_key: String, base_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            secret_key,
        }
    }

    /// Creates a remote payment intent. The amount floor is checked locally;
    /// nothing goes over the wire for an invalid amount.
    pub async fn create_intent(
        &self,
        amount: Amount,
        currency: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<PaymentIntent, AppError> {
        if amount < MIN_CHARGE_AMOUNT {
            return Err(AppError::Validation(format!(
                "amount must be at least {} minor units, got {}",
                MIN_CHARGE_AMOUNT, amount
            )));
        }

        let url = format!(
            "{}/v1/payment_intents",
            self.base_url.trim_end_matches('/')
        );

        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), amount.to_string()),
            ("currency".to_string(), currency.to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        for (key, value) in metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!("payment intent request failed: {}", e);
                if e.is_timeout() {
                    AppError::Gateway("payment processor timed out".to_string())
                } else {
                    AppError::Gateway(format!("payment processor unreachable: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| format!("payment processor returned {}", status));
            error!(%status, "payment intent rejected: {}", message);
            return Err(AppError::Gateway(message));
        }

        let intent = response
            .json::<PaymentIntent>()
            .await
            .map_err(|e| AppError::Gateway(format!("invalid payment processor response: {}", e)))?;

        info!(reference_id = %intent.id, amount, "payment intent created");
        Ok(intent)
    }
}

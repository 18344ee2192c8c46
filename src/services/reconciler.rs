//! Order reconciliation.
//!
//! Two independent signals converge on one order: the client's save call
//! after it believes payment went through, and the processor's signed
//! webhook. Both funnel through here so their effects commute: either
//! arrival order, including duplicate webhook deliveries, lands on the same
//! final state. The webhook is authoritative; a client-claimed status is
//! provisional until an event finalizes the order.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::domain::order::{Amount, Order, OrderPatch, OrderStatus, StatusClaim};
use crate::error::AppError;
use crate::store::OrderStore;
use crate::verifier::{EventKind, VerifiedEvent};

#[derive(Debug, Clone, Default)]
pub struct OrderMetadata {
    pub customer_info: Option<Value>,
    pub order_details: Option<Value>,
    pub shipping: Option<Value>,
}

#[derive(Debug)]
pub enum EventOutcome {
    /// The event changed (or created) the order.
    Applied(Order),
    /// The order was already finalized; redelivery or a late conflicting
    /// event. Not an error.
    NoopTerminal(Order),
    /// Verified, but not an event type this service acts on.
    Unrecognized,
}

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn OrderStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Records the pending order for a freshly created payment intent.
    pub async fn register_intent(
        &self,
        reference_id: &str,
        amount: Amount,
        currency: &str,
        metadata: OrderMetadata,
    ) -> Result<Order, AppError> {
        let outcome = self
            .store
            .upsert(OrderPatch {
                payment_reference_id: Some(reference_id.to_string()),
                amount: Some(amount),
                currency: Some(currency.to_string()),
                customer_info: metadata.customer_info,
                order_details: metadata.order_details,
                shipping: metadata.shipping,
                ..Default::default()
            })
            .await?;

        info!(
            order_id = %outcome.order.id,
            reference_id,
            created = outcome.created,
            "order registered for payment intent"
        );
        Ok(outcome.order)
    }

    /// Client-initiated save. The claimed status is applied provisionally;
    /// a verified event can still overturn it. Creates the order lazily when
    /// the reference id is not yet known.
    pub async fn record_order(
        &self,
        reference_id: &str,
        status: Option<OrderStatus>,
        amount: Option<Amount>,
        metadata: OrderMetadata,
    ) -> Result<Order, AppError> {
        let outcome = self
            .store
            .upsert(OrderPatch {
                payment_reference_id: Some(reference_id.to_string()),
                status: status.map(StatusClaim::Save),
                amount,
                customer_info: metadata.customer_info,
                order_details: metadata.order_details,
                shipping: metadata.shipping,
                ..Default::default()
            })
            .await?;

        info!(
            order_id = %outcome.order.id,
            reference_id,
            status = outcome.order.status.as_str(),
            created = outcome.created,
            "order saved"
        );
        Ok(outcome.order)
    }

    /// Applies a verified processor event. Idempotent: redelivering the same
    /// event leaves the order untouched.
    pub async fn apply_event(&self, event: &VerifiedEvent) -> Result<EventOutcome, AppError> {
        let status = match event.kind {
            EventKind::IntentSucceeded => OrderStatus::Completed,
            EventKind::IntentFailed => OrderStatus::Failed,
            EventKind::Unrecognized => {
                info!(event_type = %event.event_type, "ignoring unrecognized event type");
                return Ok(EventOutcome::Unrecognized);
            }
        };

        let reference_id = event.reference_id.as_deref().ok_or_else(|| {
            AppError::Validation("event carries no payment reference id".to_string())
        })?;

        let outcome = self
            .store
            .upsert(OrderPatch {
                payment_reference_id: Some(reference_id.to_string()),
                status: Some(StatusClaim::Event(status)),
                ..Default::default()
            })
            .await?;

        if !outcome.created && !outcome.status_changed && outcome.order.finalized {
            // Duplicate delivery or an event racing a finalized order.
            warn!(
                order_id = %outcome.order.id,
                reference_id,
                status = outcome.order.status.as_str(),
                "event arrived after terminal state, no-op"
            );
            return Ok(EventOutcome::NoopTerminal(outcome.order));
        }

        info!(
            order_id = %outcome.order.id,
            reference_id,
            status = outcome.order.status.as_str(),
            "event applied"
        );
        Ok(EventOutcome::Applied(outcome.order))
    }
}

//! Order persistence port. Backing storage is an interchangeable detail;
//! the contract is atomic lookup-then-upsert keyed by payment reference id
//! (falling back to order id) and a status-filtered, recency-sorted listing.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::domain::order::{Order, OrderPatch, OrderStatus};
use crate::error::AppError;

pub use file::FileOrderStore;
pub use memory::MemoryOrderStore;

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub order: Order,
    pub created: bool,
    pub status_changed: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Merge `patch` into the order matched by payment reference id (then id),
    /// creating the order when no match exists. Implementations must hold the
    /// lookup and the write under one critical section: two concurrent first
    /// arrivals for the same reference id produce exactly one record.
    async fn upsert(&self, patch: OrderPatch) -> Result<UpsertOutcome, AppError>;

    /// Lookup by either key.
    async fn find(&self, key: &str) -> Result<Option<Order>, AppError>;

    /// Orders sorted by `completed_at` desc, falling back to `created_at`
    /// desc; ties keep insertion order.
    async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, AppError>;

    async fn counts(&self) -> Result<StatusCounts, AppError>;
}

/// Shared upsert core, run under the caller's lock. Orders live in a plain
/// vector; insertion order is the listing tie-break.
pub(crate) fn upsert_in(orders: &mut Vec<Order>, patch: OrderPatch) -> UpsertOutcome {
    let now = Utc::now();

    let position = patch
        .payment_reference_id
        .as_deref()
        .and_then(|reference| {
            orders
                .iter()
                .position(|o| o.payment_reference_id.as_deref() == Some(reference))
        })
        .or_else(|| {
            patch
                .id
                .as_deref()
                .and_then(|id| orders.iter().position(|o| o.id == id))
        });

    match position {
        Some(index) => {
            let status_changed = orders[index].apply(patch, now);
            UpsertOutcome {
                order: orders[index].clone(),
                created: false,
                status_changed,
            }
        }
        None => {
            let order = Order::create(patch, now);
            orders.push(order.clone());
            UpsertOutcome {
                order,
                created: true,
                status_changed: false,
            }
        }
    }
}

pub(crate) fn find_in(orders: &[Order], key: &str) -> Option<Order> {
    orders
        .iter()
        .find(|o| o.id == key || o.payment_reference_id.as_deref() == Some(key))
        .cloned()
}

pub(crate) fn list_in(orders: &[Order], status: Option<OrderStatus>) -> Vec<Order> {
    let mut selected: Vec<Order> = orders
        .iter()
        .filter(|o| status.map_or(true, |s| o.status == s))
        .cloned()
        .collect();
    // Stable sort: equal keys keep insertion order.
    selected.sort_by(|a, b| b.recency().cmp(&a.recency()));
    selected
}

pub(crate) fn counts_in(orders: &[Order]) -> StatusCounts {
    let mut counts = StatusCounts {
        total: orders.len(),
        ..Default::default()
    };
    for order in orders {
        match order.status {
            OrderStatus::Pending => counts.pending += 1,
            OrderStatus::Completed => counts.completed += 1,
            OrderStatus::Failed => counts.failed += 1,
        }
    }
    counts
}

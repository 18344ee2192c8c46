//! In-memory order store. State is lost on restart; fine for development
//! and for tests.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::order::{Order, OrderPatch, OrderStatus};
use crate::error::AppError;

use super::{OrderStore, StatusCounts, UpsertOutcome};

#[derive(Default)]
pub struct MemoryOrderStore {
    // One lock over the whole vector: lookup-then-write stays atomic.
    orders: Mutex<Vec<Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn upsert(&self, patch: OrderPatch) -> Result<UpsertOutcome, AppError> {
        let mut orders = self.orders.lock().await;
        Ok(super::upsert_in(&mut orders, patch))
    }

    async fn find(&self, key: &str) -> Result<Option<Order>, AppError> {
        let orders = self.orders.lock().await;
        Ok(super::find_in(&orders, key))
    }

    async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, AppError> {
        let orders = self.orders.lock().await;
        Ok(super::list_in(&orders, status))
    }

    async fn counts(&self) -> Result<StatusCounts, AppError> {
        let orders = self.orders.lock().await;
        Ok(super::counts_in(&orders))
    }
}

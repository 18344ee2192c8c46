//! Flat-file order store. The whole collection is serialized to one JSON
//! file on every mutation: write a temp file in the same directory, then
//! rename over the target, so a failed write leaves the prior file intact.
//! Acceptable only at low volume.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::order::{Order, OrderPatch, OrderStatus};
use crate::error::AppError;

use super::{OrderStore, StatusCounts, UpsertOutcome};

pub struct FileOrderStore {
    path: PathBuf,
    orders: Mutex<Vec<Order>>,
}

impl FileOrderStore {
    /// Loads the order file if present; a missing file starts empty.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        let orders = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Vec<Order>>(&bytes)
                .map_err(|e| AppError::Internal(format!("corrupt order file: {}", e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(AppError::Internal(format!(
                    "failed to read order file: {}",
                    e
                )))
            }
        };
        info!(orders = orders.len(), path = %path.display(), "order file loaded");
        Ok(Self {
            path,
            orders: Mutex::new(orders),
        })
    }

    async fn persist(&self, orders: &[Order]) -> Result<(), AppError> {
        let bytes = serde_json::to_vec_pretty(orders)
            .map_err(|e| AppError::Internal(format!("failed to serialize orders: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| AppError::Internal(format!("failed to write order file: {}", e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| AppError::Internal(format!("failed to replace order file: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for FileOrderStore {
    async fn upsert(&self, patch: OrderPatch) -> Result<UpsertOutcome, AppError> {
        let mut orders = self.orders.lock().await;
        let outcome = super::upsert_in(&mut orders, patch);
        self.persist(&orders).await?;
        Ok(outcome)
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

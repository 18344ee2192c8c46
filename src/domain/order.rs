//! Order domain entity and the status state machine.
//! Framework-agnostic; all mutation goes through `Order::apply`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Amounts are minor currency units (cents) everywhere in this service.
pub type Amount = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "completed" => Ok(OrderStatus::Completed),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

/// Where a status claim came from. Verified events are authoritative:
/// once an event sets a terminal status the order is finalized and no
/// later claim of either kind may change it. A client save is provisional
/// and stays overwritable by a later event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClaim {
    Save(OrderStatus),
    Event(OrderStatus),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub payment_reference_id: Option<String>,
    pub status: OrderStatus,
    pub amount: Amount,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_info: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set once a verified event has driven the order to a terminal status.
    #[serde(default)]
    pub finalized: bool,
}

/// The unit of mutation handed to the store. `payment_reference_id` is the
/// primary lookup key, `id` the fallback; everything else is merged into the
/// matched (or freshly created) record.
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub id: Option<String>,
    pub payment_reference_id: Option<String>,
    pub status: Option<StatusClaim>,
    pub amount: Option<Amount>,
    pub currency: Option<String>,
    pub customer_info: Option<Value>,
    pub order_details: Option<Value>,
    pub shipping: Option<Value>,
}

impl Order {
    /// Creates a fresh order from a patch. Status defaults to pending and is
    /// then run through the same claim logic as an update, so a first-arrival
    /// event lands in the right terminal state.
    pub fn create(patch: OrderPatch, now: DateTime<Utc>) -> Self {
        let id = patch
            .id
            .clone()
            .or_else(|| patch.payment_reference_id.clone())
            .unwrap_or_else(|| generate_order_id(now));

        let mut order = Order {
            id,
            payment_reference_id: patch.payment_reference_id.clone(),
            status: OrderStatus::Pending,
            amount: patch.amount.unwrap_or(0),
            currency: patch.currency.clone().unwrap_or_else(|| "usd".to_string()),
            customer_info: None,
            order_details: None,
            shipping: None,
            created_at: now,
            completed_at: None,
            finalized: false,
        };
        order.merge_metadata(&patch);
        if let Some(claim) = patch.status {
            order.apply_claim(claim, now);
        }
        order
    }

    /// Applies a patch to an existing order. Returns true when the status
    /// actually changed. `id` and `created_at` are never touched.
    pub fn apply(&mut self, patch: OrderPatch, now: DateTime<Utc>) -> bool {
        if self.payment_reference_id.is_none() {
            self.payment_reference_id = patch.payment_reference_id.clone();
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(currency) = &patch.currency {
            self.currency = currency.clone();
        }
        self.merge_metadata(&patch);

        match patch.status {
            Some(claim) => self.apply_claim(claim, now),
            None => false,
        }
    }

    fn apply_claim(&mut self, claim: StatusClaim, now: DateTime<Utc>) -> bool {
        let (next, finalizes) = match claim {
            StatusClaim::Event(status) => {
                if self.finalized {
                    return false;
                }
                (status, status.is_terminal())
            }
            StatusClaim::Save(status) => {
                if self.finalized {
                    return false;
                }
                // A save may not silently revert an earlier terminal claim.
                if self.status.is_terminal() && !status.is_terminal() {
                    return false;
                }
                (status, false)
            }
        };

        // Confirming a provisional completion counts as a change: the order
        // moves from client-claimed to event-finalized.
        let changed = next != self.status || finalizes;
        self.status = next;
        if finalizes {
            self.finalized = true;
        }
        match next {
            OrderStatus::Completed => {
                if self.completed_at.is_none() {
                    self.completed_at = Some(now);
                }
            }
            _ => self.completed_at = None,
        }
        changed
    }

    fn merge_metadata(&mut self, patch: &OrderPatch) {
        merge_field(&mut self.customer_info, &patch.customer_info);
        merge_field(&mut self.order_details, &patch.order_details);
        merge_field(&mut self.shipping, &patch.shipping);
    }

    /// Sort key for listings: most recent completion first, falling back to
    /// creation time.
    pub fn recency(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.created_at)
    }
}

fn merge_field(target: &mut Option<Value>, incoming: &Option<Value>) {
    if let Some(incoming) = incoming {
        match target {
            Some(existing) => merge_json(existing, incoming),
            None => *target = Some(incoming.clone()),
        }
    }
}

/// Deep-merges `incoming` into `existing`: nested objects merge key by key,
/// anything else replaces. A partial update payload never drops fields it
/// does not mention.
pub fn merge_json(existing: &mut Value, incoming: &Value) {
    match (existing, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        existing.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (existing, incoming) => *existing = incoming.clone(),
    }
}

fn generate_order_id(now: DateTime<Utc>) -> String {
    let fragment = Uuid::new_v4().simple().to_string();
    format!("ord_{}_{}", now.timestamp_millis(), &fragment[..8])
}

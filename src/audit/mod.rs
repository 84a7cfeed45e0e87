//! Intervention log
//!
//! Payments the bot could neither refund nor forward are held here for an
//! operator. Entries are keyed by the triggering message, so a redelivered
//! event is recorded once.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::disposition::IncomingPayment;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Intervention {
    pub intervention_id: Uuid,
    pub user_id: String,
    pub message_id: String,
    pub asset_id: String,
    /// Amount exactly as delivered
    pub amount: String,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

pub struct InterventionLog {
    records: Arc<RwLock<HashMap<String, Intervention>>>,
}

impl InterventionLog {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Hold a payment for manual handling. Returns the existing entry's id
    /// when the message was already recorded.
    pub async fn record(&self, payment: &IncomingPayment, reason: impl Into<String>) -> Result<Uuid> {
        let mut records = self.records.write().await;

        let entry = records
            .entry(payment.message_id.clone())
            .or_insert_with(|| Intervention {
                intervention_id: Uuid::new_v4(),
                user_id: payment.user_id.clone(),
                message_id: payment.message_id.clone(),
                asset_id: payment.asset_id.clone(),
                amount: payment.amount.clone(),
                reason: reason.into(),
                recorded_at: Utc::now(),
            });

        Ok(entry.intervention_id)
    }

    /// All held payments, oldest first
    pub async fn list(&self) -> Vec<Intervention> {
        let records = self.records.read().await;

        let mut items: Vec<_> = records.values().cloned().collect();
        items.sort_by(|a, b| {
            a.recorded_at
                .cmp(&b.recorded_at)
                .then_with(|| a.message_id.cmp(&b.message_id))
        });
        items
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InterventionLog {
    fn default() -> Self {
        Self::new()
    }
}

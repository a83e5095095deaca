//! Audit sink
//!
//! Best-effort, fire-and-forget recording of order mutations. A failing
//! sink never affects the triggering operation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One accepted record of an order mutation
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub action: &'static str,
    pub order_id: Uuid,
    pub order_number: String,
    pub entity_id: String,
    pub actor: Option<String>,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        action: &'static str,
        order_id: Uuid,
        order_number: impl Into<String>,
        entity_id: impl Into<String>,
        actor: Option<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            action,
            order_id,
            order_number: order_number.into(),
            entity_id: entity_id.into(),
            actor,
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), BoxError>;
}

/// Default sink: writes audit records to the service log
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), BoxError> {
        info!(
            "audit: action={} order={} entity={} actor={:?} {}",
            entry.action, entry.order_number, entry.entity_id, entry.actor, entry.detail
        );
        Ok(())
    }
}

//! Domain events
//!
//! Exhaustive tagged union of everything the platform broadcasts to
//! realtime clients, plus the channel derivation used for room scoping.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::OrderStatus;

/// Event kinds broadcast across the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderCreated(OrderEvent),
    OrderUpdated(OrderEvent),
    OrderStatusChanged(OrderStatusChangedEvent),
    ReceiptCreated(ReceiptEvent),
    TableUpdated(TableEvent),
    PumpUpdated(PumpEvent),
    MenuChanged(MenuEvent),
    EmployeeChanged(EmployeeEvent),
    BranchChanged(BranchEvent),
}

impl DomainEvent {
    /// Stable kind name, used as topic key and client-facing event name
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OrderCreated(_) => "order_created",
            Self::OrderUpdated(_) => "order_updated",
            Self::OrderStatusChanged(_) => "order_status_changed",
            Self::ReceiptCreated(_) => "receipt_created",
            Self::TableUpdated(_) => "table_updated",
            Self::PumpUpdated(_) => "pump_updated",
            Self::MenuChanged(_) => "menu_changed",
            Self::EmployeeChanged(_) => "employee_changed",
            Self::BranchChanged(_) => "branch_changed",
        }
    }

    pub fn entity_id(&self) -> Option<&str> {
        match self {
            Self::OrderCreated(e) | Self::OrderUpdated(e) => Some(&e.entity_id),
            Self::OrderStatusChanged(e) => Some(&e.entity_id),
            Self::ReceiptCreated(e) => Some(&e.entity_id),
            Self::TableUpdated(e) => Some(&e.entity_id),
            Self::PumpUpdated(e) => Some(&e.entity_id),
            Self::MenuChanged(e) => Some(&e.entity_id),
            Self::EmployeeChanged(e) => Some(&e.entity_id),
            Self::BranchChanged(e) => Some(&e.entity_id),
        }
    }

    pub fn branch_id(&self) -> Option<&str> {
        match self {
            Self::OrderCreated(e) | Self::OrderUpdated(e) => e.branch_id.as_deref(),
            Self::OrderStatusChanged(e) => e.branch_id.as_deref(),
            Self::ReceiptCreated(e) => e.branch_id.as_deref(),
            Self::TableUpdated(e) => e.branch_id.as_deref(),
            Self::PumpUpdated(e) => e.branch_id.as_deref(),
            Self::MenuChanged(e) => e.branch_id.as_deref(),
            Self::EmployeeChanged(e) => e.branch_id.as_deref(),
            Self::BranchChanged(e) => Some(&e.branch_id),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::ReceiptCreated(e) => e.user_id.as_deref(),
            _ => None,
        }
    }
}

/// Snapshot payload for order created/updated events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: Uuid,
    pub order_number: String,
    pub entity_id: String,
    pub branch_id: Option<String>,
    pub customer_id: String,
    pub status: OrderStatus,
    pub total: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order_id: Uuid,
    pub order_number: String,
    pub entity_id: String,
    pub branch_id: Option<String>,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    pub changed_by: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptEvent {
    pub receipt_id: Uuid,
    pub order_id: Uuid,
    pub entity_id: String,
    pub branch_id: Option<String>,
    pub user_id: Option<String>,
    pub total: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableEvent {
    pub table_id: String,
    pub entity_id: String,
    pub branch_id: Option<String>,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpEvent {
    pub pump_id: String,
    pub entity_id: String,
    pub branch_id: Option<String>,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuEvent {
    pub menu_item_id: String,
    pub entity_id: String,
    pub branch_id: Option<String>,
    pub change: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeEvent {
    pub employee_id: String,
    pub entity_id: String,
    pub branch_id: Option<String>,
    pub change: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchEvent {
    pub branch_id: String,
    pub entity_id: String,
    pub change: String,
    pub timestamp: DateTime<Utc>,
}

/// A named broadcast scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    Entity(String),
    Branch(String),
    User(String),
    Global,
}

impl Channel {
    /// Derive the broadcast channel for an event: branch wins over entity,
    /// and an event scoped to neither goes global.
    pub fn for_event(event: &DomainEvent) -> Self {
        if let Some(branch_id) = event.branch_id() {
            Self::Branch(branch_id.to_string())
        } else if let Some(entity_id) = event.entity_id() {
            Self::Entity(entity_id.to_string())
        } else {
            Self::Global
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entity(id) => write!(f, "entity:{}", id),
            Self::Branch(id) => write!(f, "branch:{}", id),
            Self::User(id) => write!(f, "user:{}", id),
            Self::Global => f.write_str("global"),
        }
    }
}

/// Wrapper stamping every published event with an id and timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: DomainEvent,
}

impl EventMessage {
    pub fn new(event: DomainEvent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// What the generic broadcast topic carries to the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastMessage {
    pub channel: String,
    pub kind: String,
    pub payload: serde_json::Value,
}

// ── Tests ──────────────────────────────────────────────────────

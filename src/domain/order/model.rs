//! Order aggregate
//!
//! An order is mutated only through `OrderService` operations; the model
//! enforces the transition graph and the arithmetic identity
//! `total = subtotal - discount + tax + tip`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money;
use crate::domain::{DomainError, DomainResult};

/// Order status
///
/// INCOMING -> PROCESSING -> SERVED -> PAID, one step at a time.
/// CANCELLED is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Incoming,
    Processing,
    Served,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incoming => "INCOMING",
            Self::Processing => "PROCESSING",
            Self::Served => "SERVED",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// PAID and CANCELLED accept no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }

    /// Whether `next` is a legal single-step forward move from this status.
    /// Backward and skip-ahead moves are rejected.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            OrderStatus::Cancelled => true,
            OrderStatus::Incoming => false,
            OrderStatus::Processing => *self == OrderStatus::Incoming,
            OrderStatus::Served => *self == OrderStatus::Processing,
            OrderStatus::Paid => *self == OrderStatus::Served,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line item owned by exactly one order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub menu_item_id: String,
    pub menu_item_name: String,
    pub price: Decimal,
    pub quantity: u32,
    pub special_instructions: Option<String>,
    /// Contributor for multi-participant bulk orders
    pub added_by: Option<String>,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        money::round(self.price * Decimal::from(self.quantity))
    }
}

/// One paying participant of a split bill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitParticipant {
    pub user_id: String,
    pub amount: Decimal,
    pub paid: bool,
}

/// Order aggregate root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Human-readable, date-prefixed unique number (e.g. ORD-20260826-0042)
    pub order_number: String,
    pub entity_id: String,
    pub branch_id: Option<String>,
    pub customer_id: String,
    pub employee_id: String,
    pub table_id: Option<String>,
    pub pump_id: Option<String>,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub tip_amount: Decimal,
    pub total: Decimal,
    pub is_bulk_order: bool,
    pub bulk_order_initiator_id: Option<String>,
    pub is_split_bill: bool,
    pub split_details: Vec<SplitParticipant>,
    pub promotion_id: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub preparing_at: Option<DateTime<Utc>>,
    pub served_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub cancelled_by: Option<String>,
    /// Opaque token encoding id/number/status, regenerated on every mutation
    pub tracking_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Recompute `total` from the stored components, normalized to 2 dp
    pub fn recompute_total(&mut self) {
        self.total = money::round(self.subtotal - self.discount + self.tax + self.tip_amount);
    }

    /// Regenerate the opaque tracking token from the current state
    pub fn refresh_tracking_token(&mut self) {
        self.tracking_token = encode_tracking_token(self.id, &self.order_number, self.status);
    }

    /// Apply a status transition requested by a caller.
    ///
    /// Terminal orders and moves outside the transition graph are rejected
    /// with a Conflict. Split orders reach PAID only through their
    /// participants, never through this path.
    pub fn apply_status(
        &mut self,
        next: OrderStatus,
        reason: Option<String>,
        actor: Option<String>,
    ) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "order {} is already {}",
                self.order_number, self.status
            )));
        }
        if next == OrderStatus::Paid && self.is_split_bill {
            return Err(DomainError::conflict(
                "split orders are paid through their participants",
            ));
        }
        if !self.status.can_transition_to(next) {
            return Err(DomainError::conflict(format!(
                "illegal transition {} -> {} for order {}",
                self.status, next, self.order_number
            )));
        }

        let now = Utc::now();
        match next {
            OrderStatus::Processing => {
                self.accepted_at = Some(now);
                self.preparing_at = Some(now);
            }
            OrderStatus::Served => self.served_at = Some(now),
            OrderStatus::Paid => self.paid_at = Some(now),
            OrderStatus::Cancelled => {
                self.cancelled_at = Some(now);
                self.cancel_reason = reason;
                self.cancelled_by = actor;
            }
            OrderStatus::Incoming => {}
        }
        self.status = next;
        Ok(())
    }

    /// Sum of all split participant amounts
    pub fn split_total(&self) -> Decimal {
        self.split_details
            .iter()
            .fold(Decimal::ZERO, |acc, p| acc + p.amount)
    }

    /// Whether every split participant has settled
    pub fn all_split_paid(&self) -> bool {
        !self.split_details.is_empty() && self.split_details.iter().all(|p| p.paid)
    }
}

/// Encode the opaque tracking token: base64 over a small JSON envelope.
/// Carries no cryptographic guarantee.
pub fn encode_tracking_token(id: Uuid, number: &str, status: OrderStatus) -> String {
    let payload = serde_json::json!({
        "id": id,
        "number": number,
        "status": status.as_str(),
    });
    BASE64.encode(payload.to_string())
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn sample_order() -> Order {
        let id = Uuid::new_v4();
        let mut order = Order {
            id,
            order_number: "ORD-20260826-0001".to_string(),
            entity_id: "ent-1".to_string(),
            branch_id: Some("br-1".to_string()),
            customer_id: "cust-1".to_string(),
            employee_id: "emp-1".to_string(),
            table_id: None,
            pump_id: None,
            status: OrderStatus::Incoming,
            items: vec![OrderItem {
                id: Uuid::new_v4(),
                menu_item_id: "mi-1".to_string(),
                menu_item_name: "Burger".to_string(),
                price: dec("15.99"),
                quantity: 2,
                special_instructions: None,
                added_by: None,
            }],
            subtotal: dec("31.98"),
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
            tip_amount: dec("5.00"),
            total: Decimal::ZERO,
            is_bulk_order: false,
            bulk_order_initiator_id: None,
            is_split_bill: false,
            split_details: Vec::new(),
            promotion_id: None,
            accepted_at: None,
            preparing_at: None,
            served_at: None,
            paid_at: None,
            cancelled_at: None,
            cancel_reason: None,
            cancelled_by: None,
            tracking_token: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        order.recompute_total();
        order.refresh_tracking_token();
        order
    }

    #[test]
    fn total_identity_holds() {
        let order = sample_order();
        assert_eq!(order.total, dec("36.98"));
    }

    #[test]
    fn line_total_is_exact() {
        let order = sample_order();
        assert_eq!(order.items[0].line_total(), dec("31.98"));
    }

    #[test]
    fn forward_transitions_one_step_only() {
        assert!(OrderStatus::Incoming.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Served));
        assert!(OrderStatus::Served.can_transition_to(OrderStatus::Paid));
        // skip-ahead rejected
        assert!(!OrderStatus::Incoming.can_transition_to(OrderStatus::Served));
        assert!(!OrderStatus::Incoming.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Paid));
        // backward rejected
        assert!(!OrderStatus::Served.can_transition_to(OrderStatus::Processing));
        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Incoming));
    }

    #[test]
    fn cancel_reachable_from_any_non_terminal() {
        assert!(OrderStatus::Incoming.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Served.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn terminal_states_reject_everything() {
        for next in [
            OrderStatus::Incoming,
            OrderStatus::Processing,
            OrderStatus::Served,
            OrderStatus::Paid,
            OrderStatus::Cancelled,
        ] {
            assert!(!OrderStatus::Paid.can_transition_to(next));
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn processing_stamps_accepted_and_preparing() {
        let mut order = sample_order();
        order
            .apply_status(OrderStatus::Processing, None, None)
            .unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert!(order.accepted_at.is_some());
        assert!(order.preparing_at.is_some());
    }

    #[test]
    fn cancel_stamps_reason_and_actor() {
        let mut order = sample_order();
        order
            .apply_status(
                OrderStatus::Cancelled,
                Some("out of stock".to_string()),
                Some("emp-1".to_string()),
            )
            .unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(order.cancelled_at.is_some());
        assert_eq!(order.cancel_reason.as_deref(), Some("out of stock"));
        assert_eq!(order.cancelled_by.as_deref(), Some("emp-1"));
    }

    #[test]
    fn terminal_order_rejects_transition() {
        let mut order = sample_order();
        order
            .apply_status(OrderStatus::Cancelled, None, None)
            .unwrap();
        let err = order
            .apply_status(OrderStatus::Processing, None, None)
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn split_order_cannot_be_paid_directly() {
        let mut order = sample_order();
        order.apply_status(OrderStatus::Processing, None, None).unwrap();
        order.apply_status(OrderStatus::Served, None, None).unwrap();
        order.is_split_bill = true;
        let err = order.apply_status(OrderStatus::Paid, None, None).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn tracking_token_changes_with_status() {
        let mut order = sample_order();
        let before = order.tracking_token.clone();
        order.apply_status(OrderStatus::Processing, None, None).unwrap();
        order.refresh_tracking_token();
        assert_ne!(before, order.tracking_token);

        let decoded = BASE64.decode(order.tracking_token.as_bytes()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(value["number"], "ORD-20260826-0001");
        assert_eq!(value["status"], "PROCESSING");
    }

    #[test]
    fn split_total_sums_participants() {
        let mut order = sample_order();
        order.split_details = vec![
            SplitParticipant {
                user_id: "u1".to_string(),
                amount: dec("18.49"),
                paid: false,
            },
            SplitParticipant {
                user_id: "u2".to_string(),
                amount: dec("18.49"),
                paid: true,
            },
        ];
        assert_eq!(order.split_total(), dec("36.98"));
        assert!(!order.all_split_paid());
        order.split_details[0].paid = true;
        assert!(order.all_split_paid());
    }

    #[test]
    fn empty_split_is_never_fully_paid() {
        let order = sample_order();
        assert!(!order.all_split_paid());
    }
}

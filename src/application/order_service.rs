//! Order lifecycle engine
//!
//! Owns every mutation of the Order aggregate: creation, status
//! transitions, tipping, bill splitting, cancellation. Mutations of one
//! order are serialized behind a per-order async mutex; distinct orders
//! proceed fully in parallel. Every successful mutation publishes the
//! corresponding domain event; event and audit failures never roll back
//! the primary mutation.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use log::warn;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{money, DomainError, DomainResult, Order, OrderItem, OrderRepository, OrderStatus, SplitParticipant};
use crate::notifications::{DomainEvent, OrderEvent, OrderStatusChangedEvent, SharedEventBus};

use super::audit::{AuditEntry, AuditSink};

/// One line item of a new order
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub menu_item_id: String,
    pub menu_item_name: String,
    pub price: Decimal,
    pub quantity: u32,
    pub special_instructions: Option<String>,
    pub added_by: Option<String>,
}

/// Input for `OrderService::create`
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub entity_id: String,
    pub branch_id: Option<String>,
    pub customer_id: String,
    pub employee_id: String,
    pub table_id: Option<String>,
    pub pump_id: Option<String>,
    pub items: Vec<NewOrderItem>,
    pub tip_amount: Option<Decimal>,
    pub promotion_id: Option<String>,
    pub is_bulk_order: bool,
    pub bulk_order_initiator_id: Option<String>,
}

/// One participant share for `split_bill`
#[derive(Debug, Clone)]
pub struct SplitShare {
    pub user_id: String,
    pub amount: Decimal,
}

/// The order lifecycle engine
pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    event_bus: SharedEventBus,
    audit: Arc<dyn AuditSink>,
    /// Per-order exclusion scope spanning each read-modify-write.
    /// Entries live for the process lifetime.
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl OrderService {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        event_bus: SharedEventBus,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            repo,
            event_bus,
            audit,
            locks: DashMap::new(),
        }
    }

    /// Number of orders that currently hold a serialization slot
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }

    fn order_lock(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Create a new order in status INCOMING.
    ///
    /// Computes `subtotal = Σ price×quantity` and
    /// `total = subtotal - discount + tax + tip`, allocates a
    /// date-prefixed order number, and publishes an order-created event.
    pub async fn create(&self, request: CreateOrderRequest) -> DomainResult<Order> {
        if request.items.is_empty() {
            return Err(DomainError::validation("order must contain at least one item"));
        }
        for item in &request.items {
            if item.quantity < 1 {
                return Err(DomainError::validation(format!(
                    "item '{}' has quantity {}, minimum is 1",
                    item.menu_item_name, item.quantity
                )));
            }
            if money::is_negative(item.price) {
                return Err(DomainError::validation(format!(
                    "item '{}' has a negative price",
                    item.menu_item_name
                )));
            }
        }
        let tip = request.tip_amount.unwrap_or(Decimal::ZERO);
        if money::is_negative(tip) {
            return Err(DomainError::validation("tip amount cannot be negative"));
        }

        let today = Utc::now().date_naive();
        let sequence = self.repo.next_order_sequence(&request.entity_id, today).await?;
        let order_number = format!("ORD-{}-{:04}", today.format("%Y%m%d"), sequence);

        let items: Vec<OrderItem> = request
            .items
            .into_iter()
            .map(|item| OrderItem {
                id: Uuid::new_v4(),
                menu_item_id: item.menu_item_id,
                menu_item_name: item.menu_item_name,
                price: money::round(item.price),
                quantity: item.quantity,
                special_instructions: item.special_instructions,
                added_by: item.added_by,
            })
            .collect();
        let subtotal = items
            .iter()
            .fold(Decimal::ZERO, |acc, item| acc + item.line_total());

        let now = Utc::now();
        let mut order = Order {
            id: Uuid::new_v4(),
            order_number,
            entity_id: request.entity_id,
            branch_id: request.branch_id,
            customer_id: request.customer_id,
            employee_id: request.employee_id,
            table_id: request.table_id,
            pump_id: request.pump_id,
            status: OrderStatus::Incoming,
            items,
            subtotal: money::round(subtotal),
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
            tip_amount: money::round(tip),
            total: Decimal::ZERO,
            is_bulk_order: request.is_bulk_order,
            bulk_order_initiator_id: request.bulk_order_initiator_id,
            is_split_bill: false,
            split_details: Vec::new(),
            promotion_id: request.promotion_id,
            accepted_at: None,
            preparing_at: None,
            served_at: None,
            paid_at: None,
            cancelled_at: None,
            cancel_reason: None,
            cancelled_by: None,
            tracking_token: String::new(),
            created_at: now,
            updated_at: now,
        };
        order.recompute_total();
        order.refresh_tracking_token();

        self.repo.create(order.clone()).await?;

        self.event_bus
            .publish(DomainEvent::OrderCreated(snapshot(&order)));
        self.record_audit(AuditEntry::new(
            "order_created",
            order.id,
            &order.order_number,
            &order.entity_id,
            Some(order.employee_id.clone()),
            format!("total={}", order.total),
        ));

        Ok(order)
    }

    /// Move an order along the transition graph.
    ///
    /// Terminal orders and backward/skip-ahead moves fail with Conflict.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        reason: Option<String>,
        actor: Option<String>,
    ) -> DomainResult<Order> {
        let lock = self.order_lock(id);
        let _guard = lock.lock().await;

        let mut order = self.load(id).await?;
        let previous = order.status;
        order.apply_status(status, reason, actor.clone())?;
        order.refresh_tracking_token();
        order.updated_at = Utc::now();
        self.repo.save(order.clone()).await?;

        self.publish_status_change(&order, previous, actor.clone());
        self.record_audit(AuditEntry::new(
            "order_status_changed",
            order.id,
            &order.order_number,
            &order.entity_id,
            actor,
            format!("{} -> {}", previous, order.status),
        ));

        Ok(order)
    }

    /// Divide the order total among participants.
    ///
    /// Rejects atomically unless the shares sum to the stored total within
    /// the money tolerance. Does not change the order status.
    pub async fn split_bill(&self, id: Uuid, shares: Vec<SplitShare>) -> DomainResult<Order> {
        let lock = self.order_lock(id);
        let _guard = lock.lock().await;

        let mut order = self.load(id).await?;
        if order.status == OrderStatus::Paid {
            return Err(DomainError::conflict(format!(
                "order {} is already paid",
                order.order_number
            )));
        }

        let sum = shares
            .iter()
            .fold(Decimal::ZERO, |acc, share| acc + share.amount);
        if !money::approx_eq(sum, order.total) {
            return Err(DomainError::validation(format!(
                "split amounts {} do not match order total {}",
                sum, order.total
            )));
        }

        order.is_split_bill = true;
        order.split_details = shares
            .into_iter()
            .map(|share| SplitParticipant {
                user_id: share.user_id,
                amount: money::round(share.amount),
                paid: false,
            })
            .collect();
        order.refresh_tracking_token();
        order.updated_at = Utc::now();
        self.repo.save(order.clone()).await?;

        self.event_bus
            .publish(DomainEvent::OrderUpdated(snapshot(&order)));
        self.record_audit(AuditEntry::new(
            "order_split",
            order.id,
            &order.order_number,
            &order.entity_id,
            None,
            format!("{} participants", order.split_details.len()),
        ));

        Ok(order)
    }

    /// Mark one split participant as paid.
    ///
    /// When the last unpaid participant settles, the order transitions to
    /// PAID atomically and exactly one status-changed event is published.
    /// This is the only path by which a split order reaches PAID.
    pub async fn mark_split_paid(&self, id: Uuid, user_id: &str) -> DomainResult<Order> {
        let lock = self.order_lock(id);
        let _guard = lock.lock().await;

        let mut order = self.load(id).await?;
        if order.status == OrderStatus::Cancelled {
            return Err(DomainError::conflict(format!(
                "order {} is cancelled",
                order.order_number
            )));
        }

        let participant = order
            .split_details
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or_else(|| DomainError::not_found("split participant", "user_id", user_id))?;
        if participant.paid {
            return Err(DomainError::conflict(format!(
                "participant {} has already paid",
                user_id
            )));
        }
        participant.paid = true;

        let previous = order.status;
        let completed = order.all_split_paid();
        if completed {
            order.status = OrderStatus::Paid;
            order.paid_at = Some(Utc::now());
        }
        order.refresh_tracking_token();
        order.updated_at = Utc::now();
        self.repo.save(order.clone()).await?;

        if completed {
            self.publish_status_change(&order, previous, Some(user_id.to_string()));
        } else {
            self.event_bus
                .publish(DomainEvent::OrderUpdated(snapshot(&order)));
        }
        self.record_audit(AuditEntry::new(
            "split_paid",
            order.id,
            &order.order_number,
            &order.entity_id,
            Some(user_id.to_string()),
            if completed {
                "all participants settled, order paid".to_string()
            } else {
                "participant settled".to_string()
            },
        ));

        Ok(order)
    }

    /// Set the tip and recompute the total. Never emits a status event.
    pub async fn add_tip(&self, id: Uuid, amount: Decimal) -> DomainResult<Order> {
        if money::is_negative(amount) {
            return Err(DomainError::validation("tip amount cannot be negative"));
        }

        let lock = self.order_lock(id);
        let _guard = lock.lock().await;

        let mut order = self.load(id).await?;
        order.tip_amount = money::round(amount);
        order.recompute_total();
        order.refresh_tracking_token();
        order.updated_at = Utc::now();
        self.repo.save(order.clone()).await?;

        self.event_bus
            .publish(DomainEvent::OrderUpdated(snapshot(&order)));
        self.record_audit(AuditEntry::new(
            "tip_added",
            order.id,
            &order.order_number,
            &order.entity_id,
            None,
            format!("tip={} total={}", order.tip_amount, order.total),
        ));

        Ok(order)
    }

    /// Cancel a non-terminal order
    pub async fn cancel(&self, id: Uuid, reason: String, actor: String) -> DomainResult<Order> {
        self.update_status(id, OrderStatus::Cancelled, Some(reason), Some(actor))
            .await
    }

    async fn load(&self, id: Uuid) -> DomainResult<Order> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", "id", id.to_string()))
    }

    fn publish_status_change(&self, order: &Order, previous: OrderStatus, actor: Option<String>) {
        self.event_bus
            .publish(DomainEvent::OrderStatusChanged(OrderStatusChangedEvent {
                order_id: order.id,
                order_number: order.order_number.clone(),
                entity_id: order.entity_id.clone(),
                branch_id: order.branch_id.clone(),
                previous_status: previous,
                new_status: order.status,
                changed_by: actor,
                timestamp: Utc::now(),
            }));
    }

    /// Fire-and-forget audit recording; failures are logged only
    fn record_audit(&self, entry: AuditEntry) {
        let sink = self.audit.clone();
        tokio::spawn(async move {
            let action = entry.action.clone();
            if let Err(e) = sink.record(entry).await {
                warn!("Audit sink rejected '{}' record: {}", action, e);
            }
        });
    }
}

fn snapshot(order: &Order) -> OrderEvent {
    OrderEvent {
        order_id: order.id,
        order_number: order.order_number.clone(),
        entity_id: order.entity_id.clone(),
        branch_id: order.branch_id.clone(),
        customer_id: order.customer_id.clone(),
        status: order.status,
        total: order.total,
        timestamp: Utc::now(),
    }
}

// ── Tests ──────────────────────────────────────────────────────

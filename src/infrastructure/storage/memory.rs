//! In-memory order store
//!
//! Backs the service in development and tests; durable stores plug in
//! behind the same `OrderRepository` trait.

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::{DomainError, DomainResult, Order, OrderRepository};

pub struct InMemoryOrderStore {
    orders: DashMap<Uuid, Order>,
    /// Order-number sequences keyed by `{entity_id}:{yyyymmdd}`
    sequences: DashMap<String, u32>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            sequences: DashMap::new(),
        }
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderStore {
    async fn create(&self, order: Order) -> DomainResult<()> {
        if self.orders.contains_key(&order.id) {
            return Err(DomainError::conflict(format!(
                "order {} already exists",
                order.id
            )));
        }
        self.orders.insert(order.id, order);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Order>> {
        Ok(self.orders.get(&id).map(|order| order.clone()))
    }

    async fn save(&self, order: Order) -> DomainResult<()> {
        if !self.orders.contains_key(&order.id) {
            return Err(DomainError::not_found("order", "id", order.id.to_string()));
        }
        self.orders.insert(order.id, order);
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> DomainResult<()> {
        self.orders
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found("order", "id", id.to_string()))
    }

    async fn next_order_sequence(&self, entity_id: &str, date: NaiveDate) -> DomainResult<u32> {
        let key = format!("{}:{}", entity_id, date.format("%Y%m%d"));
        let mut entry = self.sequences.entry(key).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::OrderStatus;

    fn sample_order() -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            order_number: "ORD-20260826-0001".to_string(),
            entity_id: "ent-1".to_string(),
            branch_id: None,
            customer_id: "cust-1".to_string(),
            employee_id: "emp-1".to_string(),
            table_id: None,
            pump_id: None,
            status: OrderStatus::Incoming,
            items: Vec::new(),
            subtotal: Decimal::ZERO,
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
            tip_amount: Decimal::ZERO,
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
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn create_find_save_remove() {
        let store = InMemoryOrderStore::new();
        let mut order = sample_order();
        let id = order.id;

        store.create(order.clone()).await.unwrap();
        assert!(store.find_by_id(id).await.unwrap().is_some());

        order.status = OrderStatus::Processing;
        store.save(order).await.unwrap();
        let found = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(found.status, OrderStatus::Processing);

        store.remove(id).await.unwrap();
        assert!(store.find_by_id(id).await.unwrap().is_none());
        assert!(matches!(
            store.remove(id).await.unwrap_err(),
            DomainError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let store = InMemoryOrderStore::new();
        let order = sample_order();
        store.create(order.clone()).await.unwrap();
        assert!(matches!(
            store.create(order).await.unwrap_err(),
            DomainError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn save_of_unknown_order_is_not_found() {
        let store = InMemoryOrderStore::new();
        assert!(matches!(
            store.save(sample_order()).await.unwrap_err(),
            DomainError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn sequences_scoped_per_entity_and_day() {
        let store = InMemoryOrderStore::new();
        let day1 = NaiveDate::from_ymd_opt(2026, 8, 26).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2026, 8, 27).unwrap();

        assert_eq!(store.next_order_sequence("ent-1", day1).await.unwrap(), 1);
        assert_eq!(store.next_order_sequence("ent-1", day1).await.unwrap(), 2);
        // other entity and other day start fresh
        assert_eq!(store.next_order_sequence("ent-2", day1).await.unwrap(), 1);
        assert_eq!(store.next_order_sequence("ent-1", day2).await.unwrap(), 1);
    }
}

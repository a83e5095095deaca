//! Order repository interface

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use super::model::Order;
use crate::domain::DomainResult;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist a new order together with its items, atomically
    async fn create(&self, order: Order) -> DomainResult<()>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Order>>;

    /// Persist the current state of an existing order
    async fn save(&self, order: Order) -> DomainResult<()>;

    /// Administrative removal
    async fn remove(&self, id: Uuid) -> DomainResult<()>;

    /// Allocate the next order-number sequence value, scoped per entity per day
    async fn next_order_sequence(&self, entity_id: &str, date: NaiveDate) -> DomainResult<u32>;
}

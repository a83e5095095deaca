//! Event bus
//!
//! In-process typed pub/sub over tokio broadcast channels, one per topic,
//! plus a single generic broadcast topic the realtime gateway relays from.
//! Non-durable by design: events published with no subscriber are dropped.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, info, warn};
use tokio::sync::broadcast;

use super::events::{BroadcastMessage, Channel, DomainEvent, EventMessage};

/// Default per-topic channel capacity
const DEFAULT_CAPACITY: usize = 1024;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Event bus fanning out domain events to topic subscribers
pub struct EventBus {
    capacity: usize,
    topics: DashMap<String, broadcast::Sender<EventMessage>>,
    broadcast_topic: broadcast::Sender<BroadcastMessage>,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (broadcast_topic, _) = broadcast::channel(capacity);
        Self {
            capacity,
            topics: DashMap::new(),
            broadcast_topic,
            subscriber_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publish an event.
    ///
    /// Emits on the kind topic, on `entity:{id}:{kind}` and
    /// `branch:{id}:{kind}` where those scopes are present, and always on
    /// the generic broadcast topic as `{channel, kind, payload}`.
    /// Never blocks the caller; handler execution is scheduled elsewhere.
    pub fn publish(&self, event: DomainEvent) {
        let message = EventMessage::new(event);
        let kind = message.event.kind();

        self.send_topic(kind, &message);
        if let Some(entity_id) = message.event.entity_id() {
            self.send_topic(&format!("entity:{}:{}", entity_id, kind), &message);
        }
        if let Some(branch_id) = message.event.branch_id() {
            self.send_topic(&format!("branch:{}:{}", branch_id, kind), &message);
        }

        let channel = Channel::for_event(&message.event);
        match serde_json::to_value(&message) {
            Ok(payload) => {
                let broadcast = BroadcastMessage {
                    channel: channel.to_string(),
                    kind: kind.to_string(),
                    payload,
                };
                match self.broadcast_topic.send(broadcast) {
                    Ok(count) => {
                        debug!(
                            "Event published: kind={}, channel={}, relay_subscribers={}",
                            kind, channel, count
                        );
                    }
                    Err(_) => {
                        // No relay attached - normal when no gateway is running
                        debug!("Event published (no relay): kind={}, channel={}", kind, channel);
                    }
                }
            }
            Err(e) => {
                warn!("Failed to serialize event for broadcast: kind={}, {}", kind, e);
            }
        }
    }

    fn send_topic(&self, topic: &str, message: &EventMessage) {
        if let Some(sender) = self.topics.get(topic) {
            if sender.send(message.clone()).is_err() {
                debug!("No live subscribers on topic '{}'", topic);
            }
        }
    }

    /// Subscribe to a topic: an event kind (`order_created`), or a scoped
    /// key (`entity:{id}:{kind}`, `branch:{id}:{kind}`).
    pub fn subscribe(&self, topic: &str) -> EventSubscriber {
        let receiver = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        self.subscriber_count.fetch_add(1, Ordering::SeqCst);
        info!(
            "New subscriber on '{}', total: {}",
            topic,
            self.subscriber_count.load(Ordering::SeqCst)
        );

        EventSubscriber {
            topic: topic.to_string(),
            receiver,
            subscriber_count: self.subscriber_count.clone(),
        }
    }

    /// Subscribe to the generic broadcast topic (gateway relay feed)
    pub fn subscribe_broadcast(&self) -> BroadcastSubscriber {
        BroadcastSubscriber {
            receiver: self.broadcast_topic.subscribe(),
        }
    }

    /// Attach a detached handler to a topic. The handler runs on its own
    /// task; a failing handler is logged and never reaches the publisher
    /// or other handlers.
    pub fn attach<F, Fut>(&self, topic: &str, handler: F)
    where
        F: Fn(EventMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send,
    {
        let mut subscriber = self.subscribe(topic);
        let topic = topic.to_string();
        tokio::spawn(async move {
            while let Some(message) = subscriber.recv().await {
                if let Err(e) = handler(message).await {
                    warn!("Handler on '{}' failed: {}", topic, e);
                }
            }
            debug!("Handler task on '{}' stopped", topic);
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives events for one topic
pub struct EventSubscriber {
    topic: String,
    receiver: broadcast::Receiver<EventMessage>,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventSubscriber {
    /// Receive the next event; lagged gaps are logged and skipped
    pub async fn recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!("Subscriber on '{}' lagged, {} events missed", self.topic, count);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for EventSubscriber {
    fn drop(&mut self) {
        self.subscriber_count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Receives `{channel, kind, payload}` messages from the broadcast topic
pub struct BroadcastSubscriber {
    receiver: broadcast::Receiver<BroadcastMessage>,
}

impl BroadcastSubscriber {
    pub async fn recv(&mut self) -> Option<BroadcastMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!("Broadcast relay lagged, {} events missed", count);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Shared event bus type
pub type SharedEventBus = Arc<EventBus>;

pub fn create_event_bus() -> SharedEventBus {
    Arc::new(EventBus::new())
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::domain::OrderStatus;
    use crate::notifications::events::OrderEvent;

    fn order_created(branch: Option<&str>) -> DomainEvent {
        DomainEvent::OrderCreated(OrderEvent {
            order_id: Uuid::new_v4(),
            order_number: "ORD-20260826-0001".to_string(),
            entity_id: "ent-1".to_string(),
            branch_id: branch.map(String::from),
            customer_id: "cust-1".to_string(),
            status: OrderStatus::Incoming,
            total: "36.98".parse().unwrap(),
            timestamp: Utc::now(),
        })
    }

    async fn recv_or_timeout(subscriber: &mut EventSubscriber) -> EventMessage {
        tokio::time::timeout(Duration::from_millis(200), subscriber.recv())
            .await
            .expect("timeout")
            .expect("no message")
    }

    #[tokio::test]
    async fn kind_topic_receives_all_scopes() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe("order_created");

        bus.publish(order_created(Some("br-1")));
        bus.publish(order_created(None));

        assert_eq!(recv_or_timeout(&mut subscriber).await.event.kind(), "order_created");
        assert_eq!(recv_or_timeout(&mut subscriber).await.event.kind(), "order_created");
    }

    #[tokio::test]
    async fn scoped_topics_filter_by_entity_and_branch() {
        let bus = EventBus::new();
        let mut entity_sub = bus.subscribe("entity:ent-1:order_created");
        let mut branch_sub = bus.subscribe("branch:br-1:order_created");

        bus.publish(order_created(Some("br-1")));

        assert!(recv_or_timeout(&mut entity_sub).await.event.entity_id().is_some());
        assert_eq!(recv_or_timeout(&mut branch_sub).await.event.branch_id(), Some("br-1"));
    }

    #[tokio::test]
    async fn broadcast_channel_prefers_branch_over_entity() {
        let bus = EventBus::new();
        let mut relay = bus.subscribe_broadcast();

        bus.publish(order_created(Some("br-9")));
        let message = tokio::time::timeout(Duration::from_millis(200), relay.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.channel, "branch:br-9");
        assert_eq!(message.kind, "order_created");

        bus.publish(order_created(None));
        let message = tokio::time::timeout(Duration::from_millis(200), relay.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.channel, "entity:ent-1");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish(order_created(None));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn failing_handler_does_not_stop_delivery() {
        let bus = EventBus::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        bus.attach("order_created", move |message| {
            let tx = tx.clone();
            async move {
                tx.send(message.event.kind().to_string()).ok();
                Err::<(), BoxError>("boom".into())
            }
        });
        // Give the handler task a moment to subscribe
        tokio::time::sleep(Duration::from_millis(20)).await;

        bus.publish(order_created(None));
        bus.publish(order_created(None));

        for _ in 0..2 {
            let kind = tokio::time::timeout(Duration::from_millis(200), rx.recv())
                .await
                .expect("timeout")
                .expect("handler stopped");
            assert_eq!(kind, "order_created");
        }
    }

    #[tokio::test]
    async fn subscriber_count_tracks_drops() {
        let bus = EventBus::new();
        let sub1 = bus.subscribe("order_created");
        let _sub2 = bus.subscribe("order_updated");
        assert_eq!(bus.subscriber_count(), 2);
        drop(sub1);
        assert_eq!(bus.subscriber_count(), 1);
    }
}

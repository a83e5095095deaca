//! Client connection abstraction

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::{AuthContext, Role};

/// An authenticated realtime client connection
#[derive(Debug)]
pub struct ClientConnection {
    pub id: Uuid,
    pub user_id: String,
    pub role: Role,
    pub entity_id: Option<String>,
    pub branch_id: Option<String>,
    /// Channel to push frames to this client
    pub sender: mpsc::UnboundedSender<String>,
    pub connected_at: DateTime<Utc>,
}

impl ClientConnection {
    pub fn new(ctx: &AuthContext, sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: ctx.user_id.clone(),
            role: ctx.role,
            entity_id: ctx.entity_id.clone(),
            branch_id: ctx.branch_id.clone(),
            sender,
            connected_at: Utc::now(),
        }
    }

    pub fn send(&self, frame: String) -> Result<(), String> {
        self.sender
            .send(frame)
            .map_err(|e| format!("Failed to push frame: {}", e))
    }
}

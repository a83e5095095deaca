//! Client/server message protocol for the realtime gateway

use serde::{Deserialize, Serialize};

use crate::auth::AuthContext;

/// Post-connect subscription commands
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "action")]
pub enum ClientCommand {
    #[serde(rename = "subscribe:entity")]
    SubscribeEntity { id: String },
    #[serde(rename = "subscribe:branch")]
    SubscribeBranch { id: String },
    #[serde(rename = "unsubscribe:entity")]
    UnsubscribeEntity { id: String },
    #[serde(rename = "unsubscribe:branch")]
    UnsubscribeBranch { id: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorReply {
    pub error: String,
}

impl ErrorReply {
    pub fn access_denied() -> String {
        serde_json::json!({"error": "Access denied"}).to_string()
    }

    pub fn invalid_request() -> String {
        serde_json::json!({"error": "Invalid request"}).to_string()
    }
}

/// Acknowledgement sent once a handshake resolves
pub fn connected_frame(ctx: &AuthContext) -> String {
    serde_json::json!({
        "event": "connected",
        "data": {
            "user_id": ctx.user_id,
            "entity_id": ctx.entity_id,
            "branch_id": ctx.branch_id,
            "role": ctx.role,
        }
    })
    .to_string()
}

/// Server push frame: event name is the kind, body is the payload
pub fn event_frame(kind: &str, payload: &serde_json::Value) -> String {
    serde_json::json!({
        "event": kind,
        "data": payload,
    })
    .to_string()
}

// ── Tests ──────────────────────────────────────────────────────

//! Realtime gateway server
//!
//! Terminates WebSocket connections, authenticates them at handshake,
//! binds them to authorization-scoped rooms, and relays event-bus
//! broadcasts to matching rooms. A single connection's failure never
//! affects other connections.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::auth::{AuthContext, AuthGate, Role};
use crate::config::Config;
use crate::notifications::{Channel, SharedEventBus};
use crate::shared::shutdown::ShutdownSignal;

use super::connection::ClientConnection;
use super::protocol::{connected_frame, event_frame, ClientCommand, ErrorReply};
use super::session::{create_session_manager, SessionManager, SharedSessionManager};

/// Realtime gateway over WebSocket
pub struct GatewayServer {
    config: Config,
    sessions: SharedSessionManager,
    auth: Arc<dyn AuthGate>,
    event_bus: SharedEventBus,
    shutdown_signal: Option<ShutdownSignal>,
}

impl GatewayServer {
    pub fn new(config: Config, auth: Arc<dyn AuthGate>, event_bus: SharedEventBus) -> Self {
        Self {
            config,
            sessions: create_session_manager(),
            auth,
            event_bus,
            shutdown_signal: None,
        }
    }

    /// Set the shutdown signal for graceful shutdown
    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown_signal = Some(signal);
        self
    }

    pub fn sessions(&self) -> SharedSessionManager {
        self.sessions.clone()
    }

    /// Start the gateway: spawn the event relay and accept connections
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.address();
        let listener = TcpListener::bind(&addr).await?;
        info!("🔌 Realtime gateway listening on ws://{}", addr);

        self.spawn_relay();

        if let Some(ref shutdown) = self.shutdown_signal {
            let shutdown = shutdown.clone();
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => self.spawn_connection(stream, addr),
                            Err(e) => error!("Failed to accept connection: {}", e),
                        }
                    }
                    _ = shutdown.notified().wait() => {
                        info!("🛑 Gateway received shutdown signal");
                        return Ok(());
                    }
                }
            }
        } else {
            while let Ok((stream, addr)) = listener.accept().await {
                self.spawn_connection(stream, addr);
            }
            Ok(())
        }
    }

    /// Relay `{channel, kind, payload}` broadcasts to matching rooms
    fn spawn_relay(&self) {
        let sessions = self.sessions.clone();
        let mut relay = self.event_bus.subscribe_broadcast();
        tokio::spawn(async move {
            while let Some(message) = relay.recv().await {
                let frame = event_frame(&message.kind, &message.payload);
                if message.channel == Channel::Global.to_string() {
                    sessions.broadcast_all(&frame);
                } else {
                    sessions.send_to_room(&message.channel, &frame);
                }
            }
            debug!("Event relay stopped: bus closed");
        });
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let sessions = self.sessions.clone();
        let auth = self.auth.clone();
        let auth_timeout = Duration::from_secs(self.config.auth_timeout_secs);
        let shutdown = self.shutdown_signal.clone();

        tokio::spawn(async move {
            if let Err(e) =
                handle_connection(stream, addr, sessions, auth, auth_timeout, shutdown).await
            {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }
}

/// Pull the bearer token from the handshake: `Authorization: Bearer` header
/// first, `?token=` query parameter as fallback.
fn extract_token(request: &Request) -> Option<String> {
    if let Some(value) = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    request.uri().query().and_then(|query| {
        query.split('&').find_map(|pair| {
            pair.strip_prefix("token=")
                .filter(|t| !t.is_empty())
                .map(String::from)
        })
    })
}

/// Entity subscription: SUPER_ADMIN, or the connection's own entity
fn may_join_entity(ctx: &AuthContext, entity_id: &str) -> bool {
    ctx.role == Role::SuperAdmin || ctx.entity_id.as_deref() == Some(entity_id)
}

/// Branch subscription: SUPER_ADMIN, ENTITY_OWNER, or the connection's own branch
fn may_join_branch(ctx: &AuthContext, branch_id: &str) -> bool {
    matches!(ctx.role, Role::SuperAdmin | Role::EntityOwner)
        || ctx.branch_id.as_deref() == Some(branch_id)
}

/// Process one subscription command frame and build the reply
fn handle_command(
    text: &str,
    conn_id: Uuid,
    ctx: &AuthContext,
    sessions: &SessionManager,
) -> String {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(ClientCommand::SubscribeEntity { id }) => {
            if may_join_entity(ctx, &id) {
                sessions.join(conn_id, &Channel::Entity(id.clone()).to_string());
                serde_json::json!({"success": true, "id": id}).to_string()
            } else {
                warn!("conn={} denied entity subscription to '{}'", conn_id, id);
                ErrorReply::access_denied()
            }
        }
        Ok(ClientCommand::SubscribeBranch { id }) => {
            if may_join_branch(ctx, &id) {
                sessions.join(conn_id, &Channel::Branch(id.clone()).to_string());
                serde_json::json!({"success": true, "id": id}).to_string()
            } else {
                warn!("conn={} denied branch subscription to '{}'", conn_id, id);
                ErrorReply::access_denied()
            }
        }
        Ok(ClientCommand::UnsubscribeEntity { id }) => {
            sessions.leave(conn_id, &Channel::Entity(id.clone()).to_string());
            serde_json::json!({"success": true, "id": id}).to_string()
        }
        Ok(ClientCommand::UnsubscribeBranch { id }) => {
            sessions.leave(conn_id, &Channel::Branch(id.clone()).to_string());
            serde_json::json!({"success": true, "id": id}).to_string()
        }
        Err(_) => ErrorReply::invalid_request(),
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    sessions: SharedSessionManager,
    auth: Arc<dyn AuthGate>,
    auth_timeout: Duration,
    shutdown: Option<ShutdownSignal>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    debug!("New connection from {}", addr);

    let mut token: Option<String> = None;
    let mut ws_stream =
        tokio_tungstenite::accept_hdr_async(stream, |req: &Request, response: Response| {
            token = extract_token(req);
            Ok(response)
        })
        .await?;

    // Authenticate before any session state exists. Missing token, failed
    // verification or timeout all close the socket with no acknowledgement.
    let ctx = match token {
        Some(token) => match tokio::time::timeout(auth_timeout, auth.verify(&token)).await {
            Ok(Ok(ctx)) => ctx,
            Ok(Err(e)) => {
                info!("Rejected connection from {}: {}", addr, e);
                let _ = ws_stream.close(None).await;
                return Ok(());
            }
            Err(_) => {
                info!("Rejected connection from {}: verification timed out", addr);
                let _ = ws_stream.close(None).await;
                return Ok(());
            }
        },
        None => {
            info!("Rejected connection from {}: no token supplied", addr);
            let _ = ws_stream.close(None).await;
            return Ok(());
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let connection = ClientConnection::new(&ctx, tx);
    let conn_id = sessions.register(connection);

    // Bind to the rooms the identity scope grants
    if let Some(ref entity_id) = ctx.entity_id {
        sessions.join(conn_id, &Channel::Entity(entity_id.clone()).to_string());
    }
    if let Some(ref branch_id) = ctx.branch_id {
        sessions.join(conn_id, &Channel::Branch(branch_id.clone()).to_string());
    }
    sessions.join(conn_id, &Channel::User(ctx.user_id.clone()).to_string());

    info!("[{}] Connected from {} as {}", conn_id, addr, ctx.user_id);

    // Acknowledge with the resolved identity scope
    if ws_sender
        .send(Message::Text(connected_frame(&ctx)))
        .await
        .is_err()
    {
        sessions.unregister(conn_id);
        return Ok(());
    }

    // Outgoing frames
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = ws_sender.send(Message::Text(frame)).await {
                debug!("Send error: {}", e);
                break;
            }
        }
    });

    // Incoming commands
    let recv_sessions = sessions.clone();
    let recv_ctx = ctx.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let reply = handle_command(&text, conn_id, &recv_ctx, &recv_sessions);
                    if let Err(e) = recv_sessions.send_to(conn_id, reply) {
                        debug!("[{}] Reply dropped: {}", conn_id, e);
                        break;
                    }
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(frame)) => {
                    debug!("[{}] Close frame: {:?}", conn_id, frame);
                    break;
                }
                Ok(Message::Binary(data)) => {
                    warn!("[{}] Ignoring binary frame ({} bytes)", conn_id, data.len());
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    debug!("[{}] WebSocket error: {}", conn_id, e);
                    break;
                }
            }
        }
    });

    if let Some(shutdown) = shutdown {
        tokio::select! {
            _ = send_task => {}
            _ = recv_task => {}
            _ = shutdown.notified().wait() => {
                info!("[{}] Closing due to server shutdown", conn_id);
            }
        }
    } else {
        tokio::select! {
            _ = send_task => {}
            _ = recv_task => {}
        }
    }

    sessions.unregister(conn_id);
    info!("[{}] Disconnected", conn_id);
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────

//!
//! Realtime ordering service: hosts the order lifecycle engine and the
//! WebSocket gateway. Reads configuration from TOML
//! (~/.config/tably-ordering/config.toml).

use std::sync::Arc;

use log::{error, info};

use tably_ordering::application::LogAuditSink;
use tably_ordering::auth::{JwtAuthGate, JwtConfig};
use tably_ordering::shared::ShutdownCoordinator;
use tably_ordering::{
    default_config_path, AppConfig, Config, EventBus, GatewayServer, InMemoryOrderStore,
    OrderService,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = std::env::var("ORDERING_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| default_config_path());
    let app_cfg = match AppConfig::load(&config_path) {
        Ok(cfg) => {
            init_logging(&cfg.logging.level);
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            let cfg = AppConfig::default();
            init_logging(&cfg.logging.level);
            error!("Failed to load config: {}. Using defaults.", e);
            cfg
        }
    };

    info!("Starting Tably ordering service...");

    let jwt_config = JwtConfig {
        secret: app_cfg.security.jwt_secret.clone(),
        expiration_hours: app_cfg.security.jwt_expiration_hours,
        issuer: "tably-ordering".to_string(),
    };
    info!(
        "JWT configured with {}h token expiration",
        jwt_config.expiration_hours
    );

    // ── Core wiring ────────────────────────────────────────────
    let repo = Arc::new(InMemoryOrderStore::new());
    let event_bus = Arc::new(EventBus::with_capacity(app_cfg.gateway.channel_capacity));
    info!("🔔 Event bus initialized");

    let orders = Arc::new(OrderService::new(
        repo.clone(),
        event_bus.clone(),
        Arc::new(LogAuditSink),
    ));
    info!(
        "Order lifecycle engine ready ({} orders loaded)",
        repo.order_count()
    );

    // Mirror order status changes into the service log
    event_bus.attach("order_status_changed", |message| async move {
        info!("event: {}", serde_json::to_string(&message)?);
        Ok(())
    });

    // ── Gateway ────────────────────────────────────────────────
    let shutdown = ShutdownCoordinator::new();
    let shutdown_signal = shutdown.signal();
    shutdown.start_signal_listener();

    let auth_gate = Arc::new(JwtAuthGate::new(jwt_config));
    let server = GatewayServer::new(Config::from(&app_cfg), auth_gate, event_bus.clone())
        .with_shutdown(shutdown_signal.clone());

    info!("🚀 Gateway starting. Press Ctrl+C to shutdown gracefully.");
    if let Err(e) = server.run().await {
        error!("Gateway error: {}", e);
    }

    info!(
        "👋 Ordering service shutdown complete ({} orders in store, {} serialized)",
        repo.order_count(),
        orders.active_locks()
    );
    Ok(())
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

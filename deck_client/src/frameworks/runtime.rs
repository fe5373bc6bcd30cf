// Bootstrap for the panel binary.

use crate::domain::{CommandResult, ConnectionState, PlayerStatus, Subscriber};
use crate::frameworks::config::{self, PanelConfig};
use crate::interface_adapters::{CommandButton, DisplayFormat, MonitorWidget, WsConnector};
use crate::use_cases::{ConnectionManager, SubscriberRegistry};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub fn init_runtime() {
    // Load .env locally; safe to ignore when not present.
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Logs every bus event.
struct EventLog;

impl Subscriber for EventLog {
    fn on_connection_state(&self, state: ConnectionState) {
        info!(?state, "connection state");
    }

    fn on_player_status(&self, status: &PlayerStatus) {
        debug!(
            player = %status.name,
            health = status.health,
            food = status.food,
            level = status.level,
            dimension = %status.dimension,
            "player status"
        );
    }

    fn on_player_join(&self, player: &str, uuid: &str) {
        info!(player, uuid, "player joined");
    }

    fn on_player_leave(&self, player: &str, uuid: &str) {
        info!(player, uuid, "player left");
    }

    fn on_command_result(&self, result: &CommandResult) {
        info!(success = result.success, message = %result.message, code = ?result.result, "command result");
    }

    fn on_error(&self, message: &str) {
        warn!(message, "bridge error");
    }
}

async fn connect_and_sync(manager: &Arc<ConnectionManager>) {
    if manager.connect().await.is_ok() && !manager.request_player_data().await {
        warn!("player data request failed");
    }
}

pub async fn run() {
    init_runtime();
    let config = PanelConfig::from_env();

    let subscribers = Arc::new(SubscriberRegistry::new());
    subscribers.register(Arc::new(EventLog));
    let monitor = Arc::new(MonitorWidget::new(config.player(), DisplayFormat::default()));
    subscribers.register(monitor.clone());

    let connector = Arc::new(WsConnector::new(config.server_url().clone()));
    let manager = ConnectionManager::new(
        connector,
        subscribers.clone(),
        config.connection_settings(),
    );

    connect_and_sync(&manager).await;

    if let Some(command) = config.command() {
        let button = CommandButton::new(command, config.player());
        subscribers.register(Arc::new(button.clone()));
        let feedback = button.press(&manager).await;
        info!(command = %button.title(), ?feedback, "command sent");
    }

    let mut retry = tokio::time::interval(config::RETRY_INTERVAL);
    retry.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut refresh = tokio::time::interval(config::TITLE_REFRESH);
    refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = retry.tick() => {
                if !manager.is_connected() {
                    debug!(url = %config.server_url(), "retrying connection");
                    connect_and_sync(&manager).await;
                }
            }
            _ = refresh.tick() => {
                debug!(title = %monitor.render(manager.state()), "monitor");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received");
                break;
            }
        }
    }

    manager.disconnect().await;
    info!("panel stopped");
}

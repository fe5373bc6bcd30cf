// The panel's single connection to the bridge.

use super::fanout::SubscriberRegistry;
use crate::domain::{
    ConnectionState, Connector, EventStream, PanelRequest, PlayerStatus, RequestSink,
    ServerEvent, TransportError,
};
use futures::{SinkExt, StreamExt};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::{Mutex as AsyncMutex, watch},
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            send_timeout: Duration::from_secs(2),
        }
    }
}

struct Link {
    generation: u64,
    sink: RequestSink,
}

/// Owns the one outbound connection of this process.
///
/// State: `Disconnected -> Connecting -> Connected -> Disconnected`. There is
/// no retry loop here; callers decide when to call [`connect`](Self::connect)
/// again. Every state change is pushed to all subscribers.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    subscribers: Arc<SubscriberRegistry>,
    settings: ConnectionSettings,
    state_tx: watch::Sender<ConnectionState>,
    // Serializes connect attempts and disconnects.
    connect_lock: AsyncMutex<()>,
    // Single writer: every send goes through this lock.
    link: AsyncMutex<Option<Link>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    generation: AtomicU64,
    // Last known status per actor uuid.
    players: RwLock<HashMap<String, PlayerStatus>>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        subscribers: Arc<SubscriberRegistry>,
        settings: ConnectionSettings,
    ) -> Arc<Self> {
        let (state_tx, _state_rx) = watch::channel(ConnectionState::Disconnected);
        Arc::new(Self {
            connector,
            subscribers,
            settings,
            state_tx,
            connect_lock: AsyncMutex::new(()),
            link: AsyncMutex::new(None),
            reader: Mutex::new(None),
            generation: AtomicU64::new(0),
            players: RwLock::new(HashMap::new()),
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn subscribers(&self) -> &Arc<SubscriberRegistry> {
        &self.subscribers
    }

    /// Opens the connection unless one is already up. Concurrent callers
    /// queue behind one attempt, so at most one transport is opened.
    pub async fn connect(self: &Arc<Self>) -> Result<(), TransportError> {
        if self.is_connected() {
            return Ok(());
        }
        let _attempt = self.connect_lock.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        self.set_state(ConnectionState::Connecting);
        let opened = match timeout(self.settings.connect_timeout, self.connector.connect()).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnectTimeout),
        };

        let transport = match opened {
            Ok(transport) => transport,
            Err(e) => {
                warn!(error = %e, "connect failed");
                self.set_state(ConnectionState::Disconnected);
                let message = e.to_string();
                self.subscribers.notify(|s| s.on_error(&message));
                return Err(e);
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        *self.link.lock().await = Some(Link {
            generation,
            sink: transport.sink,
        });
        self.set_state(ConnectionState::Connected);

        let manager = Arc::clone(self);
        let reader = tokio::spawn(async move {
            manager.receive_loop(generation, transport.events).await;
        });
        if let Some(stale) = self.lock_reader().replace(reader) {
            stale.abort();
        }
        info!(generation, "connected to bridge");
        Ok(())
    }

    /// Closes the transport and stops the receive loop. An attempt already
    /// in flight finishes first and is then torn down.
    pub async fn disconnect(&self) {
        let _attempt = self.connect_lock.lock().await;
        let link = self.link.lock().await.take();
        if let Some(mut link) = link {
            if let Err(e) = timeout(self.settings.send_timeout, link.sink.close()).await {
                debug!(error = %e, "close timed out");
            }
        }
        if let Some(reader) = self.lock_reader().take() {
            reader.abort();
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// `false` when not connected or when the write fails; a failed write
    /// drops the connection.
    pub async fn send_command(&self, command: &str, player: Option<&str>) -> bool {
        self.send(PanelRequest::ExecuteCommand {
            command: command.to_string(),
            player: player.map(str::to_string),
        })
        .await
    }

    pub async fn request_player_data(&self) -> bool {
        self.send(PanelRequest::GetPlayerData).await
    }

    /// Case-insensitive lookup in the last-known cache.
    pub fn player(&self, name: &str) -> Option<PlayerStatus> {
        self.read_players()
            .values()
            .find(|status| status.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn players(&self) -> Vec<PlayerStatus> {
        let mut players: Vec<PlayerStatus> = self.read_players().values().cloned().collect();
        players.sort_by(|a, b| a.name.cmp(&b.name));
        players
    }

    async fn send(&self, request: PanelRequest) -> bool {
        if !self.is_connected() {
            return false;
        }
        let mut link = self.link.lock().await;
        let Some(active) = link.as_mut() else {
            return false;
        };

        let error = match timeout(self.settings.send_timeout, active.sink.send(request)).await {
            Ok(Ok(())) => return true,
            Ok(Err(e)) => e,
            Err(_) => TransportError::Send("send timed out".to_string()),
        };
        warn!(error = %error, "send failed; dropping connection");
        link.take();
        drop(link);
        if let Some(reader) = self.lock_reader().take() {
            reader.abort();
        }
        self.set_state(ConnectionState::Disconnected);
        false
    }

    // Only reader of the transport; events are handled strictly in arrival order.
    async fn receive_loop(self: Arc<Self>, generation: u64, mut events: EventStream) {
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => self.dispatch(event),
                Err(TransportError::Malformed(detail)) => {
                    warn!(error = %detail, "failed to process message");
                    let message = format!("Failed to process message: {detail}");
                    self.subscribers.notify(|s| s.on_error(&message));
                }
                Err(e) => {
                    info!(error = %e, "connection lost");
                    break;
                }
            }
        }

        // A newer connection may already own the link.
        let mut link = self.link.lock().await;
        if link.as_ref().is_some_and(|active| active.generation == generation) {
            link.take();
            drop(link);
            self.set_state(ConnectionState::Disconnected);
        }
    }

    fn dispatch(&self, event: ServerEvent) {
        match event {
            ServerEvent::Connection { status, message } => {
                info!(%status, %message, "bridge greeting");
            }
            ServerEvent::PlayerStatus(status) => {
                self.remember(status.clone());
                self.subscribers.notify(|s| s.on_player_status(&status));
            }
            ServerEvent::PlayerJoin { player, uuid } => {
                self.subscribers.notify(|s| s.on_player_join(&player, &uuid));
            }
            ServerEvent::PlayerLeave { player, uuid } => {
                self.write_players().remove(&uuid);
                self.subscribers.notify(|s| s.on_player_leave(&player, &uuid));
            }
            ServerEvent::PlayerData(players) => {
                for status in players {
                    self.remember(status.clone());
                    self.subscribers.notify(|s| s.on_player_status(&status));
                }
            }
            ServerEvent::CommandResult(result) => {
                self.subscribers.notify(|s| s.on_command_result(&result));
            }
            ServerEvent::Error { message } => {
                warn!(%message, "bridge reported an error");
                self.subscribers.notify(|s| s.on_error(&message));
            }
        }
    }

    fn remember(&self, status: PlayerStatus) {
        self.write_players().insert(status.uuid.clone(), status);
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(?previous, ?state, "connection state changed");
            self.subscribers.notify(|s| s.on_connection_state(state));
        }
    }

    fn lock_reader(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.reader.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_players(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, PlayerStatus>> {
        self.players.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_players(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, PlayerStatus>> {
        self.players.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CommandResult;
    use crate::use_cases::test_support::{FakeConnector, RecordingSubscriber, status};
    use std::time::Duration;

    fn manager_with(
        connector: Arc<FakeConnector>,
    ) -> (Arc<ConnectionManager>, Arc<RecordingSubscriber>) {
        manager_with_settings(connector, ConnectionSettings::default())
    }

    fn manager_with_settings(
        connector: Arc<FakeConnector>,
        settings: ConnectionSettings,
    ) -> (Arc<ConnectionManager>, Arc<RecordingSubscriber>) {
        let subscribers = Arc::new(SubscriberRegistry::new());
        let widget = Arc::new(RecordingSubscriber::default());
        subscribers.register(widget.clone());
        let manager = ConnectionManager::new(connector, subscribers, settings);
        (manager, widget)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn connect_is_idempotent_once_connected() {
        let connector = Arc::new(FakeConnector::default());
        let (manager, widget) = manager_with(connector.clone());

        manager.connect().await.unwrap();
        manager.connect().await.unwrap();

        assert_eq!(connector.connects(), 1);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(widget.events(), vec!["state:Connecting", "state:Connected"]);
    }

    #[tokio::test]
    async fn concurrent_connects_open_a_single_transport() {
        let connector = Arc::new(FakeConnector::with_delay(Duration::from_millis(50)));
        let (manager, _widget) = manager_with(connector.clone());

        let (a, b) = tokio::join!(manager.connect(), manager.connect());

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn failed_connect_reports_and_returns_to_disconnected() {
        let connector = Arc::new(FakeConnector::default());
        connector.fail_next(TransportError::Connect("refused".to_string()));
        let (manager, widget) = manager_with(connector.clone());

        let result = manager.connect().await;

        assert_eq!(result, Err(TransportError::Connect("refused".to_string())));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(
            widget.events(),
            vec![
                "state:Connecting",
                "state:Disconnected",
                "error:connect failed: refused"
            ]
        );

        // The caller's retry succeeds once the bridge is reachable.
        manager.connect().await.unwrap();
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn send_is_refused_without_a_connection() {
        let connector = Arc::new(FakeConnector::default());
        let (manager, _widget) = manager_with(connector.clone());

        assert!(!manager.send_command("/time set day", None).await);
        assert!(!manager.request_player_data().await);
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test]
    async fn requests_reach_the_transport_in_order() {
        let connector = Arc::new(FakeConnector::default());
        let (manager, _widget) = manager_with(connector.clone());
        manager.connect().await.unwrap();
        let mut server = connector.take_server();

        assert!(manager.send_command("/time set day", Some("Alice")).await);
        assert!(manager.request_player_data().await);

        assert_eq!(
            server.next_request().await,
            Some(PanelRequest::ExecuteCommand {
                command: "/time set day".to_string(),
                player: Some("Alice".to_string()),
            })
        );
        assert_eq!(server.next_request().await, Some(PanelRequest::GetPlayerData));
    }

    #[tokio::test]
    async fn failed_write_drops_the_connection() {
        let connector = Arc::new(FakeConnector::default());
        let (manager, widget) = manager_with(connector.clone());
        manager.connect().await.unwrap();
        let mut server = connector.take_server();
        server.stop_reading();

        assert!(!manager.send_command("/say hi", None).await);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(widget.events().last().map(String::as_str), Some("state:Disconnected"));
    }

    #[tokio::test]
    async fn stalled_write_times_out_and_drops_the_connection() {
        let connector = Arc::new(FakeConnector::stalled());
        let settings = ConnectionSettings {
            send_timeout: Duration::from_millis(100),
            ..ConnectionSettings::default()
        };
        let (manager, widget) = manager_with_settings(connector.clone(), settings);
        manager.connect().await.unwrap();

        let started = tokio::time::Instant::now();
        let sent = tokio::time::timeout(
            Duration::from_secs(2),
            manager.send_command("/say hi", None),
        )
        .await
        .expect("send should give up after its timeout");

        assert!(!sent);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(widget.events().last().map(String::as_str), Some("state:Disconnected"));
        assert!(!manager.request_player_data().await);
    }

    #[tokio::test]
    async fn inbound_events_update_cache_and_fan_out_in_order() {
        let connector = Arc::new(FakeConnector::default());
        let (manager, widget) = manager_with(connector.clone());
        manager.connect().await.unwrap();
        let server = connector.take_server();

        server.push(ServerEvent::PlayerJoin {
            player: "Alice".to_string(),
            uuid: "uuid-alice".to_string(),
        });
        server.push(ServerEvent::PlayerStatus(status("Alice", "uuid-alice", 18.0)));
        server.push(ServerEvent::PlayerData(vec![status("Bob", "uuid-bob", 20.0)]));
        server.push(ServerEvent::CommandResult(CommandResult {
            success: true,
            message: "Command executed successfully".to_string(),
            result: Some(1),
        }));
        server.push(ServerEvent::PlayerLeave {
            player: "Bob".to_string(),
            uuid: "uuid-bob".to_string(),
        });
        settle().await;

        assert_eq!(
            widget.events()[2..],
            [
                "join:Alice",
                "status:Alice",
                "status:Bob",
                "result:true",
                "leave:Bob"
            ]
        );
        assert_eq!(manager.player("ALICE").map(|p| p.health), Some(18.0));
        assert!(manager.player("Bob").is_none());
        assert_eq!(manager.players().len(), 1);
    }

    #[tokio::test]
    async fn malformed_frames_surface_as_errors_without_dropping() {
        let connector = Arc::new(FakeConnector::default());
        let (manager, widget) = manager_with(connector.clone());
        manager.connect().await.unwrap();
        let server = connector.take_server();

        server.push_error(TransportError::Malformed("expected value at line 1".to_string()));
        server.push(ServerEvent::Error {
            message: "Invalid message format".to_string(),
        });
        settle().await;

        assert!(manager.is_connected());
        assert_eq!(
            widget.events()[2..],
            [
                "error:Failed to process message: expected value at line 1",
                "error:Invalid message format"
            ]
        );
    }

    #[tokio::test]
    async fn remote_close_returns_to_disconnected() {
        let connector = Arc::new(FakeConnector::default());
        let (manager, _widget) = manager_with(connector.clone());
        manager.connect().await.unwrap();
        let mut state = manager.watch_state();

        drop(connector.take_server());
        state
            .wait_for(|s| *s == ConnectionState::Disconnected)
            .await
            .unwrap();

        assert!(!manager.send_command("/say hi", None).await);
    }

    #[tokio::test]
    async fn stale_reader_does_not_clobber_a_newer_connection() {
        let connector = Arc::new(FakeConnector::default());
        let (manager, _widget) = manager_with(connector.clone());
        manager.connect().await.unwrap();
        let first = connector.take_server();

        manager.disconnect().await;
        manager.connect().await.unwrap();
        drop(first);
        settle().await;

        assert!(manager.is_connected());
        assert_eq!(connector.connects(), 2);
    }

    #[tokio::test]
    async fn disconnect_notifies_and_stops_reading() {
        let connector = Arc::new(FakeConnector::default());
        let (manager, widget) = manager_with(connector.clone());
        manager.connect().await.unwrap();
        let server = connector.take_server();

        manager.disconnect().await;
        server.push(ServerEvent::PlayerJoin {
            player: "Late".to_string(),
            uuid: "uuid-late".to_string(),
        });
        settle().await;

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(
            widget.events(),
            vec!["state:Connecting", "state:Connected", "state:Disconnected"]
        );
    }

    #[tokio::test]
    async fn disconnect_during_connect_wins() {
        let connector = Arc::new(FakeConnector::with_delay(Duration::from_millis(100)));
        let (manager, widget) = manager_with(connector.clone());

        let connecting = tokio::spawn({
            let manager = manager.clone();
            async move { manager.connect().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(manager.state(), ConnectionState::Connecting);

        manager.disconnect().await;
        connecting.await.unwrap().unwrap();

        let server = connector.take_server();
        server.push(ServerEvent::PlayerJoin {
            player: "Late".to_string(),
            uuid: "uuid-late".to_string(),
        });
        settle().await;

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.send_command("/say hi", None).await);
        assert_eq!(
            widget.events(),
            vec!["state:Connecting", "state:Connected", "state:Disconnected"]
        );
    }
}

// Framework bootstrap for the bridge runtime and the host-facing handle.

use crate::domain::{ActorSnapshot, Simulation};
use crate::frameworks::config::{self, BridgeConfig};
use crate::interface_adapters::net::{AllowList, ConnectionRegistry, bus_serializer, ws_handler};
use crate::interface_adapters::sim::{InMemorySimulation, MemoryActor};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{HostEvent, SimulationSlot, sampler_task};

use axum::{Router, routing::get};
use std::{
    io::Result,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tokio::{
    net::TcpListener,
    sync::{Notify, mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

const DROP_LOG_THROTTLE: Duration = Duration::from_secs(2);

pub fn init_runtime() {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeStatus {
    pub clients: usize,
    pub tracked_actors: usize,
}

pub struct Bridge;

impl Bridge {
    /// Binds every interface on the configured port. A bind failure is
    /// returned to the caller; nothing else is started.
    pub async fn start(config: BridgeConfig) -> Result<BridgeHandle> {
        let address = SocketAddr::from(([0, 0, 0, 0], config.port()));
        let listener = TcpListener::bind(address).await.inspect_err(|e| {
            error!(%address, error = %e, "failed to bind");
        })?;
        Self::start_on(listener, config).await
    }

    pub async fn start_on(listener: TcpListener, config: BridgeConfig) -> Result<BridgeHandle> {
        let address = listener.local_addr()?;

        // host_tx/rx: tick/join/leave from the host, consumed in order by the sampler.
        let (host_tx, host_rx) = mpsc::channel::<HostEvent>(config::HOST_EVENT_CAPACITY);
        // bus_tx/rx: sampler output, serialized once and broadcast.
        let (bus_tx, bus_rx) = mpsc::channel(config::BUS_CAPACITY);
        let (known_tx, known_rx) = watch::channel(Arc::new(Vec::<ActorSnapshot>::new()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sampler_shutdown = Arc::new(Notify::new());

        let registry = Arc::new(ConnectionRegistry::new());
        let simulation = SimulationSlot::new();

        let state = Arc::new(AppState {
            registry: registry.clone(),
            simulation: simulation.clone(),
            known_rx: known_rx.clone(),
            allow_list: AllowList::new(config.allowed_clients()),
            welcome: Arc::from(config.language().welcome()),
            shutdown_rx: shutdown_rx.clone(),
        });

        let sampler = tokio::spawn(sampler_task(
            host_rx,
            simulation.clone(),
            bus_tx,
            known_tx,
            config.update_interval(),
            sampler_shutdown.clone(),
        ));
        let serializer = tokio::spawn(bus_serializer(bus_rx, registry.clone()));

        // Panels connect to the root path; /ws is accepted too.
        let app = Router::new()
            .route("/", get(ws_handler))
            .route("/ws", get(ws_handler))
            .with_state(state);

        let mut server_shutdown = shutdown_rx;
        let server = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await;
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        });

        info!(%address, "bridge listening");
        Ok(BridgeHandle {
            local_addr: address,
            host_tx,
            simulation,
            registry,
            known_rx,
            shutdown_tx,
            sampler_shutdown,
            tasks: vec![sampler, serializer, server],
            last_drop_log: Mutex::new(None),
        })
    }
}

/// The host's side of a running bridge. Event hooks never block, so they can
/// be called straight from the simulation's tick thread.
pub struct BridgeHandle {
    local_addr: SocketAddr,
    host_tx: mpsc::Sender<HostEvent>,
    simulation: SimulationSlot,
    registry: Arc<ConnectionRegistry>,
    known_rx: watch::Receiver<Arc<Vec<ActorSnapshot>>>,
    shutdown_tx: watch::Sender<bool>,
    sampler_shutdown: Arc<Notify>,
    tasks: Vec<JoinHandle<()>>,
    last_drop_log: Mutex<Option<Instant>>,
}

impl BridgeHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Negotiates capabilities once and publishes the simulation to the
    /// sampler and the command resolver.
    pub fn attach_simulation(&self, simulation: Arc<dyn Simulation>) {
        self.simulation.attach(simulation);
    }

    pub fn detach_simulation(&self) {
        self.simulation.detach();
    }

    pub fn on_tick(&self) {
        self.enqueue(HostEvent::Tick);
    }

    pub fn on_actor_joined(&self, name: impl Into<String>, uuid: impl Into<String>) {
        self.enqueue(HostEvent::ActorJoined {
            name: name.into(),
            uuid: uuid.into(),
        });
    }

    pub fn on_actor_left(&self, name: impl Into<String>, uuid: impl Into<String>) {
        self.enqueue(HostEvent::ActorLeft {
            name: name.into(),
            uuid: uuid.into(),
        });
    }

    pub async fn status(&self) -> BridgeStatus {
        BridgeStatus {
            clients: self.registry.count().await,
            tracked_actors: self.known_rx.borrow().len(),
        }
    }

    pub async fn stop(self) {
        info!("stopping bridge");
        self.shutdown_tx.send_replace(true);
        self.sampler_shutdown.notify_one();
        drop(self.host_tx);

        for mut task in self.tasks {
            if tokio::time::timeout(config::STOP_GRACE, &mut task)
                .await
                .is_err()
            {
                warn!("background task did not stop in time; aborting");
                task.abort();
            }
        }
        info!("bridge stopped");
    }

    fn enqueue(&self, event: HostEvent) {
        if let Err(e) = self.host_tx.try_send(event) {
            let mut last = self.last_drop_log.lock().unwrap_or_else(|e| e.into_inner());
            if last.is_none_or(|at| at.elapsed() >= DROP_LOG_THROTTLE) {
                *last = Some(Instant::now());
                warn!(error = %e, "host event dropped");
            }
        }
    }
}

/// Standalone host: an in-memory simulation with one wandering actor, ticked
/// at 20 Hz until the process exits.
pub async fn run(listener: TcpListener, config: BridgeConfig) -> Result<()> {
    let bridge = Bridge::start_on(listener, config).await?;

    let simulation = Arc::new(InMemorySimulation::new(Some("1.20.4")));
    let actor = simulation.add_actor(MemoryActor::named(
        "DeckTester",
        "00000000-0000-0000-0000-00000000d3c4",
    ));
    bridge.attach_simulation(simulation.clone());
    bridge.on_actor_joined("DeckTester", "00000000-0000-0000-0000-00000000d3c4");

    let mut interval = tokio::time::interval(config::STANDALONE_TICK_INTERVAL);
    let mut ticks: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                ticks += 1;
                actor.update(|state| {
                    state.position.x += 0.05;
                    state.experience = (ticks % 100) as f32 / 100.0;
                });
                bridge.on_tick();
            }
            _ = tokio::signal::ctrl_c() => {
                debug!(ticks, "ctrl-c received");
                break;
            }
        }
    }

    bridge.stop().await;
    Ok(())
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let config = BridgeConfig::from_env();
    if !config.auto_start() {
        info!("auto start disabled; not starting bridge");
        return Ok(());
    }

    let address = SocketAddr::from(([0, 0, 0, 0], config.port()));

    // Bind TCP listener with error handling
    let listener = TcpListener::bind(address).await.inspect_err(|e| {
        tracing::error!(%address, error = %e, "failed to bind");
    })?;

    run(listener, config).await
}

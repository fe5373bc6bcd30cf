// Registry of live panel connections and the broadcast engine over it.

use axum::extract::ws::{Message, Utf8Bytes};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

pub type ConnId = u64;

const FULL_QUEUE_LOG_THROTTLE: Duration = Duration::from_secs(2);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnId),
    #[error("outbound queue for connection {0} is full")]
    QueueFull(ConnId),
    #[error("outbound queue for connection {0} is closed")]
    Closed(ConnId),
}

/// One registered connection: its id, remote address and outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnId,
    pub remote: SocketAddr,
    outbound: mpsc::Sender<Message>,
}

impl ConnectionHandle {
    fn deliver(&self, frame: Utf8Bytes) -> Result<(), DeliveryError> {
        self.outbound
            .try_send(Message::Text(frame))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull(self.id),
                mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed(self.id),
            })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct ConnectionRegistry {
    next_id: AtomicU64,
    handles: RwLock<HashMap<ConnId, ConnectionHandle>>,
    last_full_log: Mutex<Option<Instant>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handles: RwLock::new(HashMap::new()),
            last_full_log: Mutex::new(None),
        }
    }

    pub async fn register(&self, remote: SocketAddr, outbound: mpsc::Sender<Message>) -> ConnId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = ConnectionHandle {
            id,
            remote,
            outbound,
        };
        let mut handles = self.handles.write().await;
        handles.insert(id, handle);
        debug!(conn_id = id, %remote, total = handles.len(), "connection registered");
        id
    }

    /// Removing an id that is already gone is a no-op; returns whether anything was removed.
    pub async fn unregister(&self, id: ConnId) -> bool {
        let mut handles = self.handles.write().await;
        let removed = handles.remove(&id).is_some();
        if removed {
            debug!(conn_id = id, total = handles.len(), "connection unregistered");
        }
        removed
    }

    pub async fn count(&self) -> usize {
        self.handles.read().await.len()
    }

    /// Point-in-time copy of the registered handles.
    pub async fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.handles.read().await.values().cloned().collect()
    }

    /// Enqueues `frame` on every handle registered when the snapshot is taken.
    /// A failing handle is logged and skipped; it stays registered until its
    /// own connection closes.
    pub async fn broadcast(&self, frame: Utf8Bytes) -> BroadcastReport {
        let handles = self.snapshot().await;
        let mut report = BroadcastReport::default();
        for handle in handles {
            match handle.deliver(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    self.log_delivery_failure(&handle, &e);
                }
            }
        }
        report
    }

    /// Delivers to exactly one connection; used for replies.
    pub async fn send_to(&self, id: ConnId, frame: Utf8Bytes) -> Result<(), DeliveryError> {
        let handle = self
            .handles
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(DeliveryError::UnknownConnection(id))?;
        handle.deliver(frame).inspect_err(|e| {
            self.log_delivery_failure(&handle, e);
        })
    }

    fn log_delivery_failure(&self, handle: &ConnectionHandle, error: &DeliveryError) {
        match error {
            DeliveryError::QueueFull(_) => {
                let mut last = self
                    .last_full_log
                    .lock()
                    .unwrap_or_else(|e| e.into_inner());
                if last.is_none_or(|at| at.elapsed() >= FULL_QUEUE_LOG_THROTTLE) {
                    *last = Some(Instant::now());
                    warn!(conn_id = handle.id, remote = %handle.remote, "outbound queue full; dropping frame");
                }
            }
            other => {
                debug!(conn_id = handle.id, remote = %handle.remote, error = %other, "frame not delivered");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn remote(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn frame(text: &str) -> Utf8Bytes {
        Utf8Bytes::from(text.to_string())
    }

    fn drain(rx: &mut mpsc::Receiver<Message>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            out.push(text.to_string());
        }
        out
    }

    #[tokio::test]
    async fn broadcast_reaches_registered_handles_only() {
        let registry = ConnectionRegistry::new();
        let (a_tx, mut a_rx) = mpsc::channel(8);
        let (b_tx, mut b_rx) = mpsc::channel(8);
        let a = registry.register(remote(4001), a_tx).await;
        let b = registry.register(remote(4002), b_tx).await;
        assert_ne!(a, b);

        assert!(registry.unregister(b).await);
        let report = registry.broadcast(frame("hello")).await;

        assert_eq!(report, BroadcastReport { delivered: 1, failed: 0 });
        assert_eq!(drain(&mut a_rx), vec!["hello"]);
        assert!(drain(&mut b_rx).is_empty());
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn default_registry_starts_empty() {
        let registry = ConnectionRegistry::default();
        assert_eq!(registry.count().await, 0);
        assert_eq!(
            registry.broadcast(frame("nobody")).await,
            BroadcastReport { delivered: 0, failed: 0 }
        );
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let id = registry.register(remote(4003), tx).await;

        assert!(registry.unregister(id).await);
        assert!(!registry.unregister(id).await);
        assert!(!registry.unregister(id + 1_000_000).await);
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn failing_handle_does_not_block_others_or_get_evicted() {
        let registry = ConnectionRegistry::new();
        let (dead_tx, dead_rx) = mpsc::channel(1);
        drop(dead_rx);
        let (full_tx, _full_rx) = mpsc::channel(1);
        let (ok_tx, mut ok_rx) = mpsc::channel(8);
        registry.register(remote(4004), dead_tx).await;
        let full = registry.register(remote(4005), full_tx).await;
        registry.register(remote(4006), ok_tx).await;

        registry.send_to(full, frame("fill")).await.unwrap();
        let report = registry.broadcast(frame("status")).await;

        assert_eq!(report, BroadcastReport { delivered: 1, failed: 2 });
        assert_eq!(drain(&mut ok_rx), vec!["status"]);
        assert_eq!(registry.count().await, 3);
    }

    #[tokio::test]
    async fn send_to_targets_one_connection() {
        let registry = ConnectionRegistry::new();
        let (a_tx, mut a_rx) = mpsc::channel(8);
        let (b_tx, mut b_rx) = mpsc::channel(8);
        let a = registry.register(remote(4007), a_tx).await;
        registry.register(remote(4008), b_tx).await;

        registry.send_to(a, frame("reply")).await.unwrap();

        assert_eq!(drain(&mut a_rx), vec!["reply"]);
        assert!(drain(&mut b_rx).is_empty());
        assert_eq!(
            registry.send_to(a + 1_000_000, frame("x")).await,
            Err(DeliveryError::UnknownConnection(a + 1_000_000))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_churn_never_duplicates_frames() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (stable_tx, mut stable_rx) = mpsc::channel(1024);
        registry.register(remote(5000), stable_tx).await;

        let churn = {
            let registry = registry.clone();
            tokio::spawn(async move {
                let mut receivers = Vec::new();
                for port in 0..200u16 {
                    let (tx, rx) = mpsc::channel(1024);
                    let id = registry.register(remote(6000 + port), tx).await;
                    if port % 2 == 0 {
                        registry.unregister(id).await;
                    }
                    receivers.push(rx);
                    tokio::task::yield_now().await;
                }
                receivers
            })
        };

        for n in 0..100 {
            registry.broadcast(frame(&n.to_string())).await;
            tokio::task::yield_now().await;
        }
        let mut receivers = churn.await.unwrap();

        let expected: Vec<String> = (0..100).map(|n| n.to_string()).collect();
        assert_eq!(drain(&mut stable_rx), expected);
        for rx in receivers.iter_mut() {
            let got = drain(rx);
            let mut deduped = got.clone();
            deduped.dedup();
            assert_eq!(got, deduped);
        }
    }
}

//! Connected WebSocket clients.
//!
//! Each client owns a bounded outbound queue drained by its writer task.
//! [`ClientRegistry`] is the relay's [`Transport`]: deliveries are pushed
//! with `try_send`, so a slow client loses messages instead of stalling the
//! fan-out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use metrics::counter;
use parking_lot::Mutex;
use relay_core::{ConnectionId, Delivery, Relay, Transport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::metrics::{DELIVERIES_TOTAL, DELIVERY_DROPS_TOTAL};
use crate::protocol::{self, ProtocolError};
use crate::session;

/// A connected WebSocket client.
pub struct Client {
    tx: mpsc::Sender<Arc<String>>,
    connected_at: Instant,
    last_pong: Mutex<Instant>,
    dropped: AtomicU64,
}

impl Client {
    fn new(tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            tx,
            connected_at: now,
            last_pong: Mutex::new(now),
            dropped: AtomicU64::new(0),
        }
    }

    /// Record a pong (or any other sign of life).
    pub fn record_pong(&self) {
        *self.last_pong.lock() = Instant::now();
    }

    /// Time since the last pong, or since connecting.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Messages dropped because the queue was full or closed.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn push(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }
}

/// Registry of all connected WebSocket clients.
pub struct ClientRegistry {
    clients: DashMap<ConnectionId, Arc<Client>>,
    max_send_queue: usize,
    client_timeout: Duration,
}

impl ClientRegistry {
    /// Create a registry whose clients queue up to `max_send_queue` frames.
    pub fn new(max_send_queue: usize, client_timeout: Duration) -> Self {
        Self {
            clients: DashMap::new(),
            max_send_queue: max_send_queue.max(1),
            client_timeout,
        }
    }

    /// Register `id` and return the receiving end of its outbound queue.
    pub fn register(&self, id: ConnectionId) -> mpsc::Receiver<Arc<String>> {
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let _ = self.clients.insert(id, Arc::new(Client::new(tx)));
        rx
    }

    /// Remove a client. Returns `false` if it was not registered.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        self.clients.remove(id).is_some()
    }

    /// Look up a client.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Client>> {
        self.clients.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Queue a pre-encoded frame for `id`.
    ///
    /// Returns `false` if the client is unknown or its queue is full.
    pub fn send_to(&self, id: &ConnectionId, frame: Arc<String>) -> bool {
        let Some(client) = self.get(id) else {
            return false;
        };
        if client.push(frame) {
            counter!(DELIVERIES_TOTAL).increment(1);
            true
        } else {
            counter!(DELIVERY_DROPS_TOTAL).increment(1);
            warn!(
                conn_id = %id,
                dropped = client.drop_count(),
                "send queue full, dropping message"
            );
            false
        }
    }

    /// Record a pong from `id`.
    pub fn record_pong(&self, id: &ConnectionId) {
        if let Some(client) = self.clients.get(id) {
            client.record_pong();
        }
    }

    /// Clients silent for longer than the client timeout.
    pub fn dead_clients(&self) -> Vec<ConnectionId> {
        self.clients
            .iter()
            .filter(|entry| entry.value().last_pong_elapsed() >= self.client_timeout)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of connected clients.
    pub fn count(&self) -> usize {
        self.clients.len()
    }
}

impl Transport for ClientRegistry {
    fn send(&self, connection: &ConnectionId, delivery: &Delivery) -> bool {
        match delivery.encoded() {
            Some(frame) => self.send_to(connection, frame),
            None => false,
        }
    }
}

/// Drive one WebSocket until it closes, the client times out, or `shutdown`
/// fires.
///
/// The writer drains `rx` and pings every `heartbeat`; the reader applies
/// client frames to `relay` in arrival order and treats any inbound frame,
/// pongs included, as a sign of life. Replies go through the same queue as
/// notifications.
pub async fn handle_ws_connection(
    socket: WebSocket,
    conn_id: ConnectionId,
    mut rx: mpsc::Receiver<Arc<String>>,
    registry: Arc<ClientRegistry>,
    relay: Arc<Relay>,
    heartbeat: Duration,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_cid = conn_id.clone();
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat);
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(text) = msg else { break };
                    let frame = WsMessage::Text(Arc::unwrap_or_clone(text).into());
                    if ws_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                    trace!(conn_id = %writer_cid, "sent ping");
                }
                () = shutdown.cancelled() => {
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    break;
                }
            }
        }
    });

    let reader_cid = conn_id.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            registry.record_pong(&reader_cid);
            match msg {
                WsMessage::Text(text) => {
                    if let Some(reply) = session::handle_text(&relay, &reader_cid, text.as_str()) {
                        let _ = registry.send(&reader_cid, &reply);
                    }
                }
                WsMessage::Binary(_) => {
                    let reply = protocol::error_frame(&ProtocolError::Binary);
                    let _ = registry.send(&reader_cid, &reply);
                }
                WsMessage::Close(_) => break,
                WsMessage::Ping(_) | WsMessage::Pong(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }
    debug!(conn_id = %conn_id, "socket tasks finished");
}

/// Periodically disconnect clients that stopped answering pings.
///
/// Swept clients are removed from `registry` and cascaded out of `relay`;
/// dropping their queue ends the writer task, which closes the socket.
pub fn start_cleanup_task(
    registry: Arc<ClientRegistry>,
    relay: Arc<Relay>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let _ = ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = sweep(&registry, &relay);
                    if removed > 0 {
                        info!(removed, "dead client cleanup");
                    }
                }
                () = shutdown.cancelled() => break,
            }
        }
    })
}

/// Remove every dead client. Returns how many were removed.
pub fn sweep(registry: &ClientRegistry, relay: &Relay) -> usize {
    let mut removed = 0;
    for id in registry.dead_clients() {
        if registry.unregister(&id) {
            let _ = relay.on_disconnect(&id);
            removed += 1;
            info!(conn_id = %id, "cleaned up dead client");
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::GroupKey;
    use serde_json::json;

    fn registry(queue: usize) -> ClientRegistry {
        ClientRegistry::new(queue, Duration::from_secs(90))
    }

    #[test]
    fn register_and_unregister() {
        let reg = registry(8);
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let _rx_a = reg.register(a.clone());
        let _rx_b = reg.register(b.clone());
        assert_eq!(reg.count(), 2);

        assert!(reg.unregister(&a));
        assert!(!reg.unregister(&a));
        assert_eq!(reg.count(), 1);
    }

    #[tokio::test]
    async fn transport_delivers_encoded_frame() {
        let reg = registry(8);
        let id = ConnectionId::new();
        let mut rx = reg.register(id.clone());

        let delivery = Delivery::new("ping", json!({}));
        assert!(reg.send(&id, &delivery));

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.as_str(), r#"{"event":"ping","data":{}}"#);
    }

    #[test]
    fn send_to_unknown_client_is_noop() {
        let reg = registry(8);
        assert!(!reg.send(&ConnectionId::new(), &Delivery::new("ping", json!(null))));
    }

    #[test]
    fn full_queue_drops() {
        let reg = registry(2);
        let id = ConnectionId::new();
        let _rx = reg.register(id.clone());

        assert!(reg.send_to(&id, Arc::new("1".into())));
        assert!(reg.send_to(&id, Arc::new("2".into())));
        assert!(!reg.send_to(&id, Arc::new("3".into())));
        assert_eq!(reg.get(&id).unwrap().drop_count(), 1);
    }

    #[test]
    fn closed_queue_drops() {
        let reg = registry(8);
        let id = ConnectionId::new();
        drop(reg.register(id.clone()));
        assert!(!reg.send_to(&id, Arc::new("x".into())));
    }

    #[test]
    fn fresh_clients_are_alive() {
        let reg = registry(8);
        let _rx = reg.register(ConnectionId::new());
        assert!(reg.dead_clients().is_empty());
    }

    #[test]
    fn sweep_cascades_disconnect() {
        let relay = Relay::new();
        let reg = ClientRegistry::new(8, Duration::ZERO);
        let id = relay.on_connect();
        let _rx = reg.register(id.clone());
        let _ = relay.join(&id, &GroupKey::User("42".into()));
        let _ = relay.join_vendor_area(&id, &"A1".into(), &"v1".into());

        assert_eq!(sweep(&reg, &relay), 1);
        assert_eq!(reg.count(), 0);
        assert!(!relay.is_connected(&id));
        assert!(relay.members_of(&GroupKey::User("42".into())).is_empty());
        assert_eq!(relay.lookup(&"A1".into(), &"v1".into()), None);
    }

    #[test]
    fn pong_refreshes_liveness() {
        let reg = registry(8);
        let id = ConnectionId::new();
        let _rx = reg.register(id.clone());
        std::thread::sleep(Duration::from_millis(5));
        let before = reg.get(&id).unwrap().last_pong_elapsed();
        reg.record_pong(&id);
        assert!(reg.get(&id).unwrap().last_pong_elapsed() < before);
    }
}

//! Connection registry and router.
//!
//! A single [`Hub`] task owns the live connection set and the list of every
//! identity ever assigned. Connections talk to it only through a
//! [`HubHandle`], which carries three intents (register, unregister,
//! broadcast) plus read-only queries. Each intent kind is processed in FIFO
//! order; across kinds the hub prefers register, then unregister, then
//! broadcast.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use hush_proto::Envelope;

use crate::mailbox::{Delivery, Mailbox};
use crate::metrics::RelayMetrics;
use crate::router::{self, Route};

/// Depth of each intent queue.
const INTENT_QUEUE_DEPTH: usize = 1024;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("hub is not running")]
    Closed,
}

/// Opaque relay-assigned client identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(String);

impl ClientId {
    /// Mint a fresh identity
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A new connection handing its mailbox to the hub
#[derive(Debug)]
pub struct Registration {
    pub id: ClientId,
    pub mailbox: Mailbox,
}

enum Query {
    Live(oneshot::Sender<Vec<ClientId>>),
    Known(oneshot::Sender<Vec<ClientId>>),
}

/// Cloneable handle used by connections to reach the hub
#[derive(Clone)]
pub struct HubHandle {
    register_tx: mpsc::Sender<Registration>,
    unregister_tx: mpsc::Sender<ClientId>,
    broadcast_tx: mpsc::Sender<String>,
    query_tx: mpsc::Sender<Query>,
}

impl HubHandle {
    pub async fn register(&self, id: ClientId, mailbox: Mailbox) -> Result<(), HubError> {
        self.register_tx
            .send(Registration { id, mailbox })
            .await
            .map_err(|_| HubError::Closed)
    }

    pub async fn unregister(&self, id: ClientId) -> Result<(), HubError> {
        self.unregister_tx
            .send(id)
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Submit a raw inbound frame for routing
    pub async fn broadcast(&self, frame: String) -> Result<(), HubError> {
        self.broadcast_tx
            .send(frame)
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Identities currently live, sorted
    pub async fn live_ids(&self) -> Result<Vec<ClientId>, HubError> {
        self.query(Query::Live).await
    }

    /// Every identity ever assigned, in assignment order
    pub async fn known_ids(&self) -> Result<Vec<ClientId>, HubError> {
        self.query(Query::Known).await
    }

    async fn query<F>(&self, make: F) -> Result<Vec<ClientId>, HubError>
    where
        F: FnOnce(oneshot::Sender<Vec<ClientId>>) -> Query,
    {
        let (tx, rx) = oneshot::channel();
        self.query_tx
            .send(make(tx))
            .await
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }
}

/// Single-writer owner of the registry
pub struct Hub {
    live: HashMap<ClientId, Mailbox>,
    // Never pruned: identities of departed clients stay here
    identities: Vec<ClientId>,
    register_rx: mpsc::Receiver<Registration>,
    unregister_rx: mpsc::Receiver<ClientId>,
    broadcast_rx: mpsc::Receiver<String>,
    query_rx: mpsc::Receiver<Query>,
    metrics: Arc<RelayMetrics>,
}

impl Hub {
    pub fn new(metrics: Arc<RelayMetrics>) -> (Self, HubHandle) {
        let (register_tx, register_rx) = mpsc::channel(INTENT_QUEUE_DEPTH);
        let (unregister_tx, unregister_rx) = mpsc::channel(INTENT_QUEUE_DEPTH);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(INTENT_QUEUE_DEPTH);
        let (query_tx, query_rx) = mpsc::channel(INTENT_QUEUE_DEPTH);

        let hub = Self {
            live: HashMap::new(),
            identities: Vec::new(),
            register_rx,
            unregister_rx,
            broadcast_rx,
            query_rx,
            metrics,
        };
        let handle = HubHandle {
            register_tx,
            unregister_tx,
            broadcast_tx,
            query_tx,
        };
        (hub, handle)
    }

    /// Start the dispatch loop on the current runtime
    pub fn spawn(metrics: Arc<RelayMetrics>) -> HubHandle {
        let (hub, handle) = Self::new(metrics);
        tokio::spawn(hub.run());
        handle
    }

    /// Dispatch loop. Ends once every handle has been dropped.
    pub async fn run(mut self) {
        info!("Hub dispatch loop started");
        loop {
            tokio::select! {
                biased;
                Some(registration) = self.register_rx.recv() => self.register(registration),
                Some(id) = self.unregister_rx.recv() => self.unregister(&id),
                Some(frame) = self.broadcast_rx.recv() => self.dispatch(frame),
                Some(query) = self.query_rx.recv() => self.answer(query),
                else => break,
            }
        }
        info!("Hub dispatch loop stopped");
    }

    fn register(&mut self, Registration { id, mailbox }: Registration) {
        info!(client = %id, "Client registered");
        self.live.insert(id.clone(), mailbox);
        self.identities.push(id.clone());
        self.metrics.record_registered();

        // Announce the newcomer to every identity ever seen, itself included
        let targets = self.identities.clone();
        for target in targets {
            let envelope = Envelope::discovery(id.as_str(), target.as_str());
            match envelope.encode() {
                Ok(frame) => self.deliver_to(&target, frame),
                Err(e) => warn!(client = %id, "Failed to encode discovery envelope: {}", e),
            }
        }
    }

    fn unregister(&mut self, id: &ClientId) {
        // Dropping the mailbox closes it and stops the writer
        if self.live.remove(id).is_some() {
            info!(client = %id, "Client unregistered");
            self.metrics.record_removed();
        }
    }

    fn dispatch(&mut self, frame: String) {
        match router::route(&frame) {
            Route::Undecodable => {
                warn!("Undecodable frame, forwarding to all clients");
                self.metrics.record_decode_failure();
                self.deliver_all(frame);
            }
            Route::Broadcast { kind, sender } => {
                debug!(%sender, ?kind, "Broadcast");
                self.deliver_all(frame);
            }
            Route::Direct { kind, sender, target } => {
                debug!(%sender, %target, ?kind, "Direct");
                self.deliver_to(&ClientId(target), frame);
            }
        }
    }

    fn deliver_all(&mut self, frame: String) {
        self.metrics.record_broadcast();
        let stale: Vec<ClientId> = self
            .live
            .iter()
            .filter(|(_, mailbox)| mailbox.deliver(frame.clone()) != Delivery::Queued)
            .map(|(id, _)| id.clone())
            .collect();
        for id in stale {
            self.evict(&id);
        }
    }

    fn deliver_to(&mut self, target: &ClientId, frame: String) {
        let Some(mailbox) = self.live.get(target) else {
            debug!(%target, "Target not live, dropping frame");
            self.metrics.record_dropped();
            return;
        };
        self.metrics.record_direct();
        if mailbox.deliver(frame) != Delivery::Queued {
            self.evict(target);
        }
    }

    fn evict(&mut self, id: &ClientId) {
        if self.live.remove(id).is_some() {
            warn!(client = %id, "Mailbox full or closed, evicting client");
            self.metrics.record_eviction();
            self.metrics.record_removed();
        }
    }

    fn answer(&self, query: Query) {
        match query {
            Query::Live(reply) => {
                let mut ids: Vec<ClientId> = self.live.keys().cloned().collect();
                ids.sort();
                let _ = reply.send(ids);
            }
            Query::Known(reply) => {
                let _ = reply.send(self.identities.clone());
            }
        }
    }
}

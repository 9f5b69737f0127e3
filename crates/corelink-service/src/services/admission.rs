// ============================================
// File: crates/corelink-service/src/services/admission.rs
// ============================================
//! # Client Admission
//!
//! ## Creation Reason
//! Local clients do not push messages blindly; they first ask for a slot
//! and are told when they may transmit. This keeps the plaintext queues
//! bounded and lets priority decide who goes first.
//!
//! ## Main Functionality
//! - `ClientId` / `ClientOptions`: registered local clients
//! - `ClientNotification` / `ClientSink`: everything sent to clients
//! - `ClientRegistry`: options and message-type interests per client
//! - `RequestTable`: pending send requests indexed by peer and by client
//!
//! ## Request Indexing
//! ```text
//! by_peer:   PeerId ──► BTreeMap<arrival seq, ClientRequest>
//! by_client: ClientId ──► { PeerId ──► arrival seq }
//! ```
//! Both maps are updated together; a request never exists in only one.
//!
//! ## ⚠️ Important Note for Next Developer
//! - One request per (client, peer); a repeated request updates the
//!   existing one in place and keeps its arrival position
//! - Ties on priority go to the earlier arrival
//!
//! ## Last Modified
//! v0.1.0 - Initial admission control

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use corelink_common::PeerId;
use corelink_transport::PerformanceHint;

use crate::error::{Result, ServiceError};

// ============================================
// Clients
// ============================================

/// Local client identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// What a client wants to be told about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ClientOptions {
    /// Neighbour sessions becoming usable
    pub connect: bool,
    /// Neighbour links going away
    pub disconnect: bool,
    /// Bandwidth or liveness changes of confirmed neighbours
    pub status_change: bool,
    /// Every inbound message in full
    pub full_inbound: bool,
    /// Header of every inbound message
    pub hdr_inbound: bool,
    /// Every outbound message in full
    pub full_outbound: bool,
    /// Header of every outbound message
    pub hdr_outbound: bool,
}

/// Message delivered to a local client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientNotification {
    /// A neighbour session is confirmed.
    Connect {
        /// Neighbour
        peer: PeerId,
        /// Transport properties
        hints: Vec<PerformanceHint>,
    },
    /// A neighbour link went down.
    Disconnect {
        /// Neighbour
        peer: PeerId,
    },
    /// Bandwidth or timeout of a confirmed neighbour changed.
    StatusChange {
        /// Neighbour
        peer: PeerId,
        /// When the session times out without traffic
        timeout: Instant,
        /// Inbound quota
        bw_in: u32,
        /// Outbound quota
        bw_out: u32,
        /// Transport properties
        hints: Vec<PerformanceHint>,
    },
    /// A message arrived from a neighbour.
    Inbound {
        /// Sender
        peer: PeerId,
        /// Full message, or its 4-byte header
        message: Bytes,
        /// `message` is the header only
        header_only: bool,
        /// Transport properties
        hints: Vec<PerformanceHint>,
    },
    /// A message was put into a frame for a neighbour.
    Outbound {
        /// Destination
        peer: PeerId,
        /// Full message, or its 4-byte header
        message: Bytes,
        /// `message` is the header only
        header_only: bool,
    },
    /// The client may now transmit `size` bytes to `peer`.
    SendReady {
        /// Destination
        peer: PeerId,
        /// Size granted
        size: usize,
        /// Id from the original request
        request_id: u32,
    },
}

/// Where client notifications go.
pub trait ClientSink: Send + Sync {
    /// Delivers `notification` to `client`.
    fn deliver(&self, client: ClientId, notification: ClientNotification);
}

/// Sink that keeps everything in memory.
#[derive(Debug, Default)]
pub struct ClientOutbox {
    delivered: Mutex<Vec<(ClientId, ClientNotification)>>,
}

impl ClientOutbox {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything delivered so far.
    pub fn take(&self) -> Vec<(ClientId, ClientNotification)> {
        std::mem::take(&mut *self.delivered.lock())
    }

    /// Removes and returns what was delivered to `client`.
    pub fn take_for(&self, client: ClientId) -> Vec<ClientNotification> {
        let mut delivered = self.delivered.lock();
        let (mine, rest): (Vec<_>, Vec<_>) = delivered.drain(..).partition(|(c, _)| *c == client);
        *delivered = rest;
        mine.into_iter().map(|(_, n)| n).collect()
    }
}

impl ClientSink for ClientOutbox {
    fn deliver(&self, client: ClientId, notification: ClientNotification) {
        self.delivered.lock().push((client, notification));
    }
}

/// Sink that forwards into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(ClientId, ClientNotification)>,
}

impl ChannelSink {
    /// Creates the sink and the receiving half.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(ClientId, ClientNotification)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ClientSink for ChannelSink {
    fn deliver(&self, client: ClientId, notification: ClientNotification) {
        // receiver gone means nobody is listening any more
        let _ = self.tx.send((client, notification));
    }
}

// ============================================
// ClientRegistry
// ============================================

#[derive(Debug, Clone)]
struct ClientEntry {
    options: ClientOptions,
    types: HashSet<u16>,
}

/// Registered local clients.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: BTreeMap<ClientId, ClientEntry>,
}

impl ClientRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or re-registers a client.
    pub fn register(&mut self, client: ClientId, options: ClientOptions, types: &[u16]) {
        self.clients.insert(
            client,
            ClientEntry {
                options,
                types: types.iter().copied().collect(),
            },
        );
    }

    /// Forgets a client. Returns `false` if it was unknown.
    pub fn unregister(&mut self, client: ClientId) -> bool {
        self.clients.remove(&client).is_some()
    }

    /// `true` if `client` is registered.
    #[must_use]
    pub fn contains(&self, client: ClientId) -> bool {
        self.clients.contains_key(&client)
    }

    /// Number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// `true` if nobody is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Clients whose options satisfy `wants`.
    pub fn matching<'a>(
        &'a self,
        wants: impl Fn(&ClientOptions) -> bool + 'a,
    ) -> impl Iterator<Item = ClientId> + 'a {
        self.clients
            .iter()
            .filter(move |(_, entry)| wants(&entry.options))
            .map(|(id, _)| *id)
    }

    /// How an inbound message of `msg_type` is delivered to each client:
    /// `Some(false)` in full, `Some(true)` header-only, `None` not at all.
    pub fn inbound_interest(&self, msg_type: u16) -> impl Iterator<Item = (ClientId, bool)> + '_ {
        self.clients.iter().filter_map(move |(id, entry)| {
            if entry.options.full_inbound || entry.types.contains(&msg_type) {
                Some((*id, false))
            } else if entry.options.hdr_inbound {
                Some((*id, true))
            } else {
                None
            }
        })
    }
}

// ============================================
// RequestTable
// ============================================

/// A client's pending request to send to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequest {
    /// Requesting client
    pub client: ClientId,
    /// Destination
    pub peer: PeerId,
    /// Desired message size
    pub size: usize,
    /// Larger is more important
    pub priority: u32,
    /// Opaque id echoed in `SendReady`
    pub request_id: u32,
}

/// Pending requests, indexed per peer and per client.
#[derive(Debug, Default)]
pub struct RequestTable {
    next_seq: u64,
    by_peer: HashMap<PeerId, BTreeMap<u64, ClientRequest>>,
    by_client: HashMap<ClientId, HashMap<PeerId, u64>>,
}

impl RequestTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a request, or updates the client's existing one for the peer.
    ///
    /// # Errors
    /// `ClientQueueFull` if the client already waits on `limit` peers.
    pub fn insert(&mut self, request: ClientRequest, limit: usize) -> Result<()> {
        let per_client = self.by_client.entry(request.client).or_default();
        if let Some(&seq) = per_client.get(&request.peer) {
            if let Some(existing) = self
                .by_peer
                .get_mut(&request.peer)
                .and_then(|queue| queue.get_mut(&seq))
            {
                *existing = request;
                return Ok(());
            }
        }
        if per_client.len() >= limit {
            return Err(ServiceError::ClientQueueFull {
                client: request.client,
                limit,
            });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        per_client.insert(request.peer, seq);
        self.by_peer
            .entry(request.peer)
            .or_default()
            .insert(seq, request);
        Ok(())
    }

    /// Highest-priority request for `peer`, earliest arrival on ties.
    #[must_use]
    pub fn best(&self, peer: &PeerId) -> Option<&ClientRequest> {
        let mut best: Option<&ClientRequest> = None;
        for request in self.by_peer.get(peer)?.values() {
            if best.map_or(true, |b| request.priority > b.priority) {
                best = Some(request);
            }
        }
        best
    }

    /// Oldest request for `peer`.
    #[must_use]
    pub fn head(&self, peer: &PeerId) -> Option<&ClientRequest> {
        self.by_peer.get(peer)?.values().next()
    }

    /// Removes the request of `client` for `peer` from both indices.
    pub fn remove(&mut self, client: ClientId, peer: &PeerId) -> Option<ClientRequest> {
        let per_client = self.by_client.get_mut(&client)?;
        let seq = per_client.remove(peer)?;
        if per_client.is_empty() {
            self.by_client.remove(&client);
        }
        let queue = self.by_peer.get_mut(peer)?;
        let request = queue.remove(&seq);
        if queue.is_empty() {
            self.by_peer.remove(peer);
        }
        request
    }

    /// Drops every request of `client`.
    pub fn remove_client(&mut self, client: ClientId) -> usize {
        let Some(per_client) = self.by_client.remove(&client) else {
            return 0;
        };
        let count = per_client.len();
        for (peer, seq) in per_client {
            if let Some(queue) = self.by_peer.get_mut(&peer) {
                queue.remove(&seq);
                if queue.is_empty() {
                    self.by_peer.remove(&peer);
                }
            }
        }
        count
    }

    /// Drops every request for `peer`.
    pub fn remove_peer(&mut self, peer: &PeerId) -> usize {
        let Some(queue) = self.by_peer.remove(peer) else {
            return 0;
        };
        for request in queue.values() {
            if let Some(per_client) = self.by_client.get_mut(&request.client) {
                per_client.remove(peer);
                if per_client.is_empty() {
                    self.by_client.remove(&request.client);
                }
            }
        }
        queue.len()
    }

    /// Number of requests waiting for `peer`.
    #[must_use]
    pub fn pending_for(&self, peer: &PeerId) -> usize {
        self.by_peer.get(peer).map_or(0, BTreeMap::len)
    }

    /// Total number of pending requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_peer.values().map(BTreeMap::len).sum()
    }

    /// `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_peer.is_empty()
    }
}

// ============================================
// Tests
// ============================================

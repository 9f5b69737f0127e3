// ============================================
// File: crates/corelink-service/src/state.rs
// ============================================
//! # Link-Layer State
//!
//! ## Creation Reason
//! Single owner of every neighbour, every pending client request and the
//! timer queue. All link-layer behaviour is a method on `CoreState`, run
//! to completion on one task; nothing here awaits or locks.
//!
//! ## Main Functionality
//! - Outbound: `enqueue_plaintext` → scheduler → assembler → seal →
//!   encrypted queue → transport hand-off
//! - Inbound: `on_transport_event(Received)` → open → PING / PONG /
//!   client delivery
//! - Handshake: `on_handshake_event`, key retransmission with backoff
//! - Clients: registration, send-request admission, peer information
//! - Lifecycle: creation, keep-alive, idle eviction, quota, decay
//!
//! ## Main Logical Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ enqueue ─► messages ─► process_plaintext ─► encrypted queue  │
//! │                           ▲                      │           │
//! │                           │ queue empty          ▼           │
//! │                     process_encrypted ◄── TransmitReady      │
//! │                                                  │           │
//! │                                          take_outgoing()     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Neighbours are looked up again after every call that may free one;
//!   never hold a `&mut Neighbour` across another `CoreState` method
//! - A timer handle is cleared before its task body runs
//! - The encrypted queue is drained before a new plaintext batch forms
//!
//! ## Last Modified
//! v0.1.0 - Initial core state

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use corelink_common::{PeerId, Timestamp};
use corelink_core::crypto::frame::FRAME_OVERHEAD;
use corelink_core::crypto::{DefaultFrameCrypto, FrameCrypto};
use corelink_core::protocol::codec::{encode_ping, encode_pong};
use corelink_core::protocol::messages::{MAX_ENCRYPTED_MESSAGE_SIZE, MESSAGE_HEADER_SIZE};
use corelink_core::{
    EncryptedHeader, MessageHeader, MessageType, PingMessage, PongMessage, RawMessage, SessionKey,
};
use corelink_transport::{BandwidthTracker, PerformanceHint, TransmitHandle, Transport, TransportEvent};

use crate::config::CoreConfig;
use crate::error::{Result, ServiceError};
use crate::handlers::{InboundHandler, InboundMessage};
use crate::services::admission::{
    ClientId, ClientNotification, ClientOptions, ClientRegistry, ClientRequest, ClientSink,
    RequestTable,
};
use crate::services::assembler::{self, fits_full_notification};
use crate::services::handshake::{
    after_key_received, after_key_sent, HandshakeEvent, HandshakeState, KeyExchange,
};
use crate::services::neighbour::{EncryptedFrame, MessageEntry, Neighbour, PendingTransmit};
use crate::services::plan::{self, PlanParams, Selection};
use crate::services::preference::{self, PreferenceSum, QuotaInputs};
use crate::stats::{self, StatisticsSink};
use crate::timers::{Scheduler, Task, TaskHandle, TimerKind, TimerQueue};

// ============================================
// Constants
// ============================================

/// Largest plaintext one frame can carry.
pub const FRAME_BUDGET: usize = MAX_ENCRYPTED_MESSAGE_SIZE - FRAME_OVERHEAD;

/// Priority of PING and PONG frames.
pub const CONTROL_PRIORITY: u32 = 0x00FF_FFFF;

// ============================================
// Collaborators
// ============================================

/// External services `CoreState` talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Frame transmission control
    pub transport: Arc<dyn Transport>,
    /// Outbound key transmission
    pub key_exchange: Arc<dyn KeyExchange>,
    /// Local client notifications
    pub clients: Arc<dyn ClientSink>,
    /// Counters
    pub stats: Arc<dyn StatisticsSink>,
}

/// Answer to [`CoreState::request_peer_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerInfo {
    /// Neighbour
    pub peer: PeerId,
    /// Inbound quota
    pub bw_in: u32,
    /// Outbound quota
    pub bw_out: u32,
    /// Bytes reserved (negative when giving bandwidth back)
    pub reserved_amount: i32,
    /// How long until the requested reservation could succeed
    pub reserve_delay: Duration,
    /// Preference after the change
    pub preference: u64,
}

impl PeerInfo {
    const fn empty(peer: PeerId) -> Self {
        Self {
            peer,
            bw_in: 0,
            bw_out: 0,
            reserved_amount: 0,
            reserve_delay: Duration::ZERO,
            preference: 0,
        }
    }
}

// ============================================
// CoreState
// ============================================

/// All link-layer state of one node.
pub struct CoreState {
    config: CoreConfig,
    local: PeerId,
    crypto: DefaultFrameCrypto,
    inbound: InboundHandler,
    transport: Arc<dyn Transport>,
    key_exchange: Arc<dyn KeyExchange>,
    clients: Arc<dyn ClientSink>,
    stats: Arc<dyn StatisticsSink>,
    timers: TimerQueue,
    neighbours: HashMap<PeerId, Neighbour>,
    loopback: Neighbour,
    registry: ClientRegistry,
    requests: RequestTable,
    preference_sum: PreferenceSum,
    decay_task: Option<TaskHandle>,
    outgoing: VecDeque<(PeerId, Bytes)>,
}

impl CoreState {
    /// Creates the state for node `local` and starts the preference
    /// decay timer.
    #[must_use]
    pub fn new(local: PeerId, config: CoreConfig, collaborators: Collaborators) -> Self {
        let mut timers = TimerQueue::new();
        let now = timers.now();
        let decay_task = Some(timers.after(config.timers.preference_decay(), Task::PreferenceDecay));
        let inbound = InboundHandler::new(local, config.timers.max_message_age());
        let loopback = Neighbour::loopback(local, now, &config);
        info!(peer = %local, "Link layer ready");
        Self {
            local,
            crypto: DefaultFrameCrypto::new(),
            inbound,
            transport: collaborators.transport,
            key_exchange: collaborators.key_exchange,
            clients: collaborators.clients,
            stats: collaborators.stats,
            timers,
            neighbours: HashMap::new(),
            loopback,
            registry: ClientRegistry::new(),
            requests: RequestTable::new(),
            preference_sum: PreferenceSum::new(),
            decay_task,
            outgoing: VecDeque::new(),
            config,
        }
    }

    // ========================================
    // Accessors
    // ========================================

    /// Our own identity.
    #[must_use]
    pub const fn local_peer(&self) -> PeerId {
        self.local
    }

    /// Effective configuration.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Neighbour entry for `peer`; our own identity maps to the loopback
    /// entry.
    #[must_use]
    pub fn neighbour(&self, peer: &PeerId) -> Option<&Neighbour> {
        if *peer == self.local {
            return Some(&self.loopback);
        }
        self.neighbours.get(peer)
    }

    /// Number of neighbour entries, loopback excluded.
    #[must_use]
    pub fn neighbour_count(&self) -> usize {
        self.neighbours.len()
    }

    /// Number of pending client send requests.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    /// Current preference sum.
    #[must_use]
    pub const fn preference_sum(&self) -> u64 {
        self.preference_sum.total()
    }

    /// Earliest scheduled task.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Frames granted by the transport and ready to be written.
    pub fn take_outgoing(&mut self) -> Vec<(PeerId, Bytes)> {
        self.outgoing.drain(..).collect()
    }

    fn now(&self) -> Instant {
        self.timers.now()
    }

    fn plan_params(&self) -> PlanParams {
        PlanParams {
            frame_budget: FRAME_BUDGET,
            max_cork_delay: self.config.timers.max_cork_delay(),
            max_queue: self.config.limits.max_peer_queue_size,
        }
    }

    // ========================================
    // Timers
    // ========================================

    fn schedule(&mut self, peer: PeerId, kind: TimerKind, delay: Duration) {
        let Some(n) = self.neighbours.get_mut(&peer) else {
            return;
        };
        if let Some(old) = n.timers.slot(kind).take() {
            self.timers.cancel(old);
        }
        let handle = self.timers.after(delay, Task::Neighbour { peer, kind });
        *n.timers.slot(kind) = Some(handle);
    }

    fn cancel_timer(&mut self, peer: PeerId, kind: TimerKind) {
        if let Some(n) = self.neighbours.get_mut(&peer) {
            if let Some(old) = n.timers.slot(kind).take() {
                self.timers.cancel(old);
            }
        }
    }

    /// Runs every task due at or before `now`.
    pub fn run_due(&mut self, now: Instant) {
        while let Some((handle, task)) = self.timers.pop_due(now) {
            self.run_task(handle, task);
        }
    }

    fn run_task(&mut self, handle: TaskHandle, task: Task) {
        match task {
            Task::PreferenceDecay => {
                if self.decay_task == Some(handle) {
                    self.decay_task = None;
                    self.decay_preferences();
                }
            }
            Task::Neighbour { peer, kind } => {
                let Some(n) = self.neighbours.get_mut(&peer) else {
                    return;
                };
                let slot = n.timers.slot(kind);
                if *slot != Some(handle) {
                    return;
                }
                *slot = None;
                trace!(peer = %peer, task = ?kind, "Running neighbour task");
                match kind {
                    TimerKind::RetryPlaintext => self.process_plaintext(peer),
                    TimerKind::RetryHandshake => self.retry_handshake(peer),
                    TimerKind::KeepAlive => self.send_keep_alive(peer),
                    TimerKind::IdleEviction => self.consider_free(peer),
                    TimerKind::QuotaUpdate => self.quota_update(peer),
                }
            }
        }
    }

    // ========================================
    // Neighbour Lifecycle
    // ========================================

    fn ensure_neighbour(&mut self, peer: PeerId) {
        if self.neighbours.contains_key(&peer) {
            return;
        }
        let now = self.now();
        self.neighbours
            .insert(peer, Neighbour::new(peer, now, &self.config));
        self.stats
            .set(stats::NEIGHBOUR_ENTRIES, self.neighbour_count_i64());
        debug!(peer = %peer, "Created neighbour entry");
        self.quota_update(peer);
        self.consider_free(peer);
    }

    fn neighbour_count_i64(&self) -> i64 {
        i64::try_from(self.neighbours.len()).unwrap_or(i64::MAX)
    }

    /// Frees `peer` if nothing keeps it alive and its idle bound passed;
    /// otherwise re-arms the eviction check for the remaining time.
    fn consider_free(&mut self, peer: PeerId) {
        let now = self.now();
        let idle = self.config.timers.idle_timeout();
        let Some(n) = self.neighbours.get(&peer) else {
            return;
        };
        if n.transmit.is_some() || n.is_connected {
            return;
        }
        let left = n.idle_deadline(idle).saturating_duration_since(now);
        if !left.is_zero() {
            self.schedule(peer, TimerKind::IdleEviction, left);
            return;
        }
        info!(peer = %peer, "Evicting idle neighbour");
        self.stats.update(stats::NEIGHBOURS_EVICTED, 1);
        self.free_neighbour(peer);
    }

    fn free_neighbour(&mut self, peer: PeerId) {
        let Some(n) = self.neighbours.get_mut(&peer) else {
            return;
        };
        for handle in n.timers.drain() {
            self.timers.cancel(handle);
        }
        n.messages.clear();
        n.encrypted.clear();
        if let Some(pending) = n.transmit.take() {
            self.transport.cancel(pending.handle);
        }
        if let Some(n) = self.neighbours.remove(&peer) {
            self.preference_sum.remove(n.current_preference);
        }
        self.requests.remove_peer(&peer);
        self.stats
            .set(stats::NEIGHBOUR_ENTRIES, self.neighbour_count_i64());
        self.stats.set(
            stats::TOTAL_PREFERENCE,
            i64::try_from(self.preference_sum.total()).unwrap_or(i64::MAX),
        );
    }

    fn quota_update(&mut self, peer: PeerId) {
        let now = self.now();
        let idle = self.config.timers.idle_timeout();
        let inputs_base = QuotaInputs {
            preference: 0,
            preference_sum: self.preference_sum.total(),
            neighbour_count: self.neighbours.len(),
            total_out: self.config.bandwidth.total_quota_out,
            min_per_peer: self.config.bandwidth.default_bw_in_out,
        };
        let Some(n) = self.neighbours.get_mut(&peer) else {
            return;
        };
        let q_in = if preference::is_idle(now, n.last_activity, n.time_established, idle) {
            debug!(peer = %peer, "Neighbour idle, inbound quota forced to zero");
            0
        } else {
            preference::inbound_quota(&QuotaInputs {
                preference: n.current_preference,
                ..inputs_base
            })
        };
        let changed = q_in != n.bw_in;
        if changed {
            n.bw_in = q_in;
            n.recv_window.update_quota(now, q_in);
            self.transport.set_quota(&peer, n.bw_in, n.bw_out);
        }
        self.schedule(peer, TimerKind::QuotaUpdate, self.config.timers.quota_update());
        if changed {
            self.handle_peer_status_change(peer);
        }
    }

    fn decay_preferences(&mut self) {
        self.preference_sum
            .decay(self.neighbours.values_mut().map(|n| &mut n.current_preference));
        self.stats.set(
            stats::TOTAL_PREFERENCE,
            i64::try_from(self.preference_sum.total()).unwrap_or(i64::MAX),
        );
        self.decay_task = Some(
            self.timers
                .after(self.config.timers.preference_decay(), Task::PreferenceDecay),
        );
    }

    fn handle_peer_status_change(&mut self, peer: PeerId) {
        let Some(n) = self.neighbours.get(&peer) else {
            return;
        };
        if n.is_connected && n.state.is_confirmed() {
            self.report_status(peer);
        }
    }

    /// Sends the neighbour's current status to `status_change` observers.
    fn report_status(&mut self, peer: PeerId) {
        let idle = self.config.timers.idle_timeout();
        let Some(n) = self.neighbours.get(&peer) else {
            return;
        };
        self.stats.update(stats::STATUS_CHANGES, 1);
        let notification = ClientNotification::StatusChange {
            peer,
            timeout: n.idle_deadline(idle),
            bw_in: n.bw_in,
            bw_out: n.bw_out,
            hints: n.hints.clone(),
        };
        for client in self.registry.matching(|o| o.status_change) {
            self.clients.deliver(client, notification.clone());
        }
    }

    fn notify_all(&self, wants: impl Fn(&ClientOptions) -> bool, notification: &ClientNotification) {
        for client in self.registry.matching(wants) {
            self.clients.deliver(client, notification.clone());
        }
    }

    // ========================================
    // Handshake
    // ========================================

    fn send_key(&mut self, peer: PeerId) {
        let Some(n) = self.neighbours.get_mut(&peer) else {
            return;
        };
        if n.timers.is_scheduled(TimerKind::RetryHandshake) {
            trace!(peer = %peer, "Key exchange already in progress");
            return;
        }
        if !n.is_connected {
            if n.transmit.is_none() {
                self.stats.update(stats::CONNECT_REQUESTS, 1);
                match self.transport.request_transmit(
                    &peer,
                    0,
                    CONTROL_PRIORITY,
                    self.config.timers.idle_timeout(),
                ) {
                    Some(handle) => {
                        debug!(peer = %peer, "Asked transport to connect");
                        n.transmit = Some(PendingTransmit {
                            handle,
                            connect_hint: true,
                        });
                    }
                    None => debug!(peer = %peer, "Transport refused connection hint"),
                }
            }
            return;
        }

        let next = after_key_sent(n.state);
        self.key_exchange
            .send_key(&peer, &n.encrypt_key, n.encrypt_key_created, next);
        n.state = next;
        debug!(peer = %peer, state = %next, "Sent session key");
        self.send_ping(peer);
        self.process_encrypted(peer);

        let Some(n) = self.neighbours.get(&peer) else {
            return;
        };
        if !n.state.is_confirmed() && !n.timers.is_scheduled(TimerKind::RetryHandshake) {
            let delay = n.set_key_retry_frequency;
            self.schedule(peer, TimerKind::RetryHandshake, delay);
        }
    }

    fn retry_handshake(&mut self, peer: PeerId) {
        let Some(n) = self.neighbours.get_mut(&peer) else {
            return;
        };
        n.set_key_retry_frequency = n.set_key_retry_frequency.saturating_mul(2);
        debug!(
            peer = %peer,
            state = %n.state,
            next_retry_ms = n.set_key_retry_frequency.as_millis() as u64,
            "Retrying key exchange"
        );
        // A stalled handshake on a live link is reported; retries continue.
        let stalled = n.is_connected && !n.state.is_confirmed();
        if stalled {
            self.report_status(peer);
        }
        self.send_key(peer);
    }

    /// Applies a transition reported by the key exchange.
    pub fn on_handshake_event(&mut self, peer: PeerId, event: HandshakeEvent) {
        if peer == self.local {
            warn!("Key exchange event for our own identity ignored");
            return;
        }
        match event {
            HandshakeEvent::KeyReceived {
                key,
                created,
                sender_state,
            } => self.on_key_received(peer, key, created, sender_state),
            HandshakeEvent::Reset => self.reset_session(peer),
        }
    }

    fn on_key_received(
        &mut self,
        peer: PeerId,
        key: SessionKey,
        created: Timestamp,
        sender_state: HandshakeState,
    ) {
        self.ensure_neighbour(peer);
        let Some(n) = self.neighbours.get_mut(&peer) else {
            return;
        };
        self.stats.update(stats::KEYS_RECEIVED, 1);
        if n.state.can_decrypt() && created < n.decrypt_key_created {
            debug!(peer = %peer, "Ignoring session key older than the current one");
            return;
        }
        if created != n.decrypt_key_created || n.decrypt_key.is_none() {
            n.replay.reset();
            n.decrypt_key_created = created;
        }
        n.decrypt_key = Some(key);

        let (next, resend) = after_key_received(n.state, sender_state);
        debug!(peer = %peer, from = %n.state, to = %next, "Session key received");
        n.state = next;
        if resend {
            // Answer now; frames sealed before the peer knew our key were dropped.
            self.cancel_timer(peer, TimerKind::RetryHandshake);
            self.send_key(peer);
        }
    }

    /// Drops the session with `peer` and starts a new key exchange.
    fn reset_session(&mut self, peer: PeerId) {
        let Some(n) = self.neighbours.get_mut(&peer) else {
            return;
        };
        let was_confirmed = n.state.is_confirmed();
        info!(peer = %peer, state = %n.state, "Resetting session");
        for kind in [
            TimerKind::RetryHandshake,
            TimerKind::RetryPlaintext,
            TimerKind::KeepAlive,
        ] {
            if let Some(old) = n.timers.slot(kind).take() {
                self.timers.cancel(old);
            }
        }
        n.encrypted.clear();
        if let Some(pending) = n.transmit.take() {
            self.transport.cancel(pending.handle);
        }
        n.reset_session(&self.config);
        if was_confirmed {
            self.notify_all(|o| o.disconnect, &ClientNotification::Disconnect { peer });
        }
        self.send_key(peer);
    }

    // ========================================
    // PING / PONG
    // ========================================

    fn seal_frame(&mut self, peer: PeerId, plaintext: &[u8]) -> Result<Bytes> {
        let n = self
            .neighbours
            .get_mut(&peer)
            .ok_or(ServiceError::NeighbourNotFound(peer))?;
        let Some(seq) = n.next_sequence_number() else {
            warn!(peer = %peer, "Sequence numbers exhausted, rekeying");
            let state = n.state;
            self.reset_session(peer);
            return Err(ServiceError::SessionNotReady { peer, state });
        };
        let header = EncryptedHeader::new(rand::thread_rng().gen(), seq, n.bw_in, Timestamp::now());
        let frame = self
            .crypto
            .seal(&n.encrypt_key, n.encrypt_key_created, &peer, header, plaintext)?;
        self.stats.update(
            stats::BYTES_ENCRYPTED,
            i64::try_from(plaintext.len()).unwrap_or(i64::MAX),
        );
        trace!(peer = %peer, seq, size = frame.len(), "Sealed frame");
        Ok(frame)
    }

    fn queue_control(&mut self, peer: PeerId, plaintext: &[u8], max_delay: Duration) -> Result<()> {
        let bytes = self.seal_frame(peer, plaintext)?;
        let deadline = crate::timers::deadline_after(self.now(), max_delay);
        let n = self
            .neighbours
            .get_mut(&peer)
            .ok_or(ServiceError::NeighbourNotFound(peer))?;
        n.encrypted.push_back(EncryptedFrame {
            bytes,
            priority: CONTROL_PRIORITY,
            deadline,
        });
        Ok(())
    }

    fn send_ping(&mut self, peer: PeerId) {
        let Some(n) = self.neighbours.get(&peer) else {
            return;
        };
        let ping = PingMessage {
            iv_seed: rand::thread_rng().gen(),
            challenge: n.ping_challenge,
            target: peer,
        };
        match self.queue_control(peer, &encode_ping(&ping), self.config.timers.max_ping_delay()) {
            Ok(()) => self.stats.update(stats::PINGS_CREATED, 1),
            Err(e) => debug!(peer = %peer, error = %e, "Could not queue PING"),
        }
    }

    fn send_keep_alive(&mut self, peer: PeerId) {
        self.send_ping(peer);
        self.process_encrypted(peer);

        let now = self.now();
        let Some(n) = self.neighbours.get(&peer) else {
            return;
        };
        let left = n
            .idle_deadline(self.config.timers.idle_timeout())
            .saturating_duration_since(now);
        let delay = (left / 2).max(self.config.timers.min_ping_frequency());
        self.schedule(peer, TimerKind::KeepAlive, delay);
    }

    fn handle_ping(&mut self, peer: PeerId, ping: &PingMessage) {
        if ping.target != self.local {
            debug!(peer = %peer, "PING addressed to another peer dropped");
            return;
        }
        self.stats.update(stats::PINGS_RECEIVED, 1);
        let Some(n) = self.neighbours.get(&peer) else {
            return;
        };
        let pong = PongMessage {
            iv_seed: rand::thread_rng().gen(),
            challenge: ping.challenge,
            inbound_bw_limit: n.bw_in,
            target: self.local,
        };
        let delay = self.config.timers.max_ping_delay().saturating_mul(2);
        match self.queue_control(peer, &encode_pong(&pong), delay) {
            Ok(()) => self.stats.update(stats::PONGS_CREATED, 1),
            Err(e) => debug!(peer = %peer, error = %e, "Could not queue PONG"),
        }
        self.process_encrypted(peer);
    }

    fn handle_pong(&mut self, peer: PeerId, pong: &PongMessage) {
        let now = self.now();
        let Some(n) = self.neighbours.get_mut(&peer) else {
            return;
        };
        if pong.target != peer || pong.challenge != n.ping_challenge {
            debug!(peer = %peer, "PONG with wrong target or challenge dropped");
            return;
        }
        self.stats.update(stats::PONGS_RECEIVED, 1);
        let state = n.state;
        match state {
            HandshakeState::KeyReceived => {
                n.state = HandshakeState::KeyConfirmed;
                n.time_established.get_or_insert(now);
                self.stats.update(stats::KEYS_CONFIRMED, 1);
                info!(peer = %peer, "Session confirmed");
                n.bw_out_external_limit = pong.inbound_bw_limit;
                if n.refresh_bw_out(now) {
                    self.transport.set_quota(&peer, n.bw_in, n.bw_out);
                }
                let connect = ClientNotification::Connect {
                    peer,
                    hints: n.hints.clone(),
                };
                self.cancel_timer(peer, TimerKind::RetryHandshake);
                self.notify_all(|o| o.connect, &connect);
                self.process_encrypted(peer);
            }
            HandshakeState::KeyConfirmed => {}
            HandshakeState::Down | HandshakeState::KeySent => {
                debug!(peer = %peer, state = %state, "Unexpected PONG dropped");
                return;
            }
        }
        if let Some(n) = self.neighbours.get_mut(&peer) {
            n.last_activity = now;
        }
        let half_idle = self.config.timers.idle_timeout() / 2;
        self.schedule(peer, TimerKind::KeepAlive, half_idle);
        self.handle_peer_status_change(peer);
    }

    // ========================================
    // Outbound Pipeline
    // ========================================

    /// Queues one complete message for `peer`.
    ///
    /// Messages for our own identity are delivered to local clients
    /// directly.
    ///
    /// # Errors
    /// - `MessageTooLarge` if the payload exceeds one frame
    /// - `InvalidMessage` if it is not exactly one application message
    /// - `QueueFull` if the neighbour's plaintext queue has no free slot
    pub fn enqueue_plaintext(
        &mut self,
        peer: PeerId,
        payload: Bytes,
        priority: u32,
        deadline: Instant,
    ) -> Result<()> {
        if payload.len() > FRAME_BUDGET {
            return Err(ServiceError::MessageTooLarge {
                size: payload.len(),
                max: FRAME_BUDGET,
            });
        }
        let header = MessageHeader::parse_exact(&payload)
            .map_err(|e| ServiceError::invalid_message(e.to_string()))?;
        if MessageType::from_u16(header.msg_type).is_some() {
            return Err(ServiceError::invalid_message(format!(
                "type {} is reserved for the link layer",
                header.msg_type
            )));
        }

        if peer == self.local {
            let message = RawMessage {
                header,
                bytes: payload,
            };
            self.deliver_inbound(peer, &message, &[]);
            return Ok(());
        }

        self.ensure_neighbour(peer);
        self.discard_expired(peer);
        let max = self.config.limits.max_peer_queue_size;
        let Some(n) = self.neighbours.get_mut(&peer) else {
            return Err(ServiceError::NeighbourNotFound(peer));
        };
        if n.queue_is_full(max) {
            debug!(peer = %peer, limit = max, "Plaintext queue full");
            return Err(ServiceError::QueueFull { peer, limit: max });
        }
        trace!(peer = %peer, size = payload.len(), priority, "Queued plaintext");
        n.messages
            .push_back(MessageEntry::new(payload, priority, deadline));
        self.process_plaintext(peer);
        self.schedule_peer_messages(peer);
        Ok(())
    }

    fn discard_expired(&mut self, peer: PeerId) {
        let now = self.now();
        let grace = self.config.timers.past_expiration_discard();
        let max = self.config.limits.max_peer_queue_size;
        let Some(n) = self.neighbours.get_mut(&peer) else {
            return;
        };
        let was_full = n.queue_is_full(max);
        let dropped = plan::discard_expired(&mut n.messages, now, grace);
        if dropped == 0 {
            return;
        }
        debug!(peer = %peer, dropped, "Discarded expired messages");
        self.stats.update(
            stats::MESSAGES_EXPIRED,
            i64::try_from(dropped).unwrap_or(i64::MAX),
        );
        if was_full {
            self.schedule_peer_messages(peer);
        }
    }

    fn process_plaintext(&mut self, peer: PeerId) {
        self.cancel_timer(peer, TimerKind::RetryPlaintext);
        let Some(n) = self.neighbours.get(&peer) else {
            return;
        };
        let (state, retry_pending, retry) = (
            n.state,
            n.timers.is_scheduled(TimerKind::RetryHandshake),
            n.set_key_retry_frequency,
        );
        match state {
            HandshakeState::Down => {
                self.send_key(peer);
                return;
            }
            HandshakeState::KeySent | HandshakeState::KeyReceived => {
                if !retry_pending {
                    self.schedule(peer, TimerKind::RetryHandshake, retry);
                }
                return;
            }
            HandshakeState::KeyConfirmed => {}
        }

        self.discard_expired(peer);
        let now = self.now();
        let params = self.plan_params();
        let Some(n) = self.neighbours.get_mut(&peer) else {
            return;
        };
        if n.messages.is_empty() || !n.encrypted.is_empty() {
            return;
        }
        let bw_out = n.bw_out;
        match plan::select_messages(&mut n.messages, &mut n.send_window, bw_out, now, &params) {
            Selection::Idle => return,
            Selection::Corked { retry } => {
                self.stats.update(stats::TRANSMISSIONS_CORKED, 1);
                trace!(peer = %peer, retry_ms = retry.as_millis() as u64, "Corked");
                self.schedule(peer, TimerKind::RetryPlaintext, retry);
                return;
            }
            Selection::Wait { retry } => {
                trace!(peer = %peer, retry_ms = retry.as_millis() as u64, "Waiting for bandwidth");
                self.schedule(peer, TimerKind::RetryPlaintext, retry);
                return;
            }
            Selection::Ready { bytes } => {
                trace!(peer = %peer, bytes, "Selected messages");
            }
        }
        let Some(batch) = assembler::assemble(&mut n.messages) else {
            return;
        };

        self.notify_outbound(peer, &batch.messages);
        let bytes = match self.seal_frame(peer, &batch.plaintext) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Failed to seal frame");
                return;
            }
        };
        if let Some(n) = self.neighbours.get_mut(&peer) {
            n.encrypted.push_back(EncryptedFrame {
                bytes,
                priority: batch.priority,
                deadline: batch.deadline,
            });
        }
        self.process_encrypted(peer);
        self.schedule_peer_messages(peer);
    }

    fn notify_outbound(&self, peer: PeerId, messages: &[Bytes]) {
        for message in messages {
            let header = message.slice(..MESSAGE_HEADER_SIZE);
            for client in self.registry.matching(|o| o.hdr_outbound) {
                self.clients.deliver(
                    client,
                    ClientNotification::Outbound {
                        peer,
                        message: header.clone(),
                        header_only: true,
                    },
                );
            }
            let full = fits_full_notification(message.len());
            for client in self.registry.matching(|o| o.full_outbound) {
                self.clients.deliver(
                    client,
                    ClientNotification::Outbound {
                        peer,
                        message: if full { message.clone() } else { header.clone() },
                        header_only: !full,
                    },
                );
            }
        }
    }

    fn process_encrypted(&mut self, peer: PeerId) {
        let now = self.now();
        loop {
            let Some(n) = self.neighbours.get_mut(&peer) else {
                return;
            };
            if n.transmit.is_some() {
                return;
            }
            let Some(head) = n.encrypted.front() else {
                self.process_plaintext(peer);
                return;
            };
            let timeout = head.deadline.saturating_duration_since(now);
            if let Some(handle) =
                self.transport
                    .request_transmit(&peer, head.bytes.len(), head.priority, timeout)
            {
                n.transmit = Some(PendingTransmit {
                    handle,
                    connect_hint: false,
                });
                return;
            }
            debug!(peer = %peer, "Transport refused frame, discarding");
            n.encrypted.pop_front();
            self.stats.update(stats::TRANSMIT_FAILURES, 1);
        }
    }

    fn on_transmit_ready(&mut self, peer: PeerId, handle: TransmitHandle, capacity: usize) {
        let now = self.now();
        let Some(n) = self.neighbours.get_mut(&peer) else {
            return;
        };
        let Some(pending) = n.transmit.filter(|p| p.handle == handle) else {
            trace!(peer = %peer, ?handle, "Stale transmit grant ignored");
            return;
        };
        n.transmit = None;

        if pending.connect_hint {
            if n.is_connected {
                self.process_encrypted(peer);
            }
            self.consider_free(peer);
            return;
        }

        if let Some(frame) = n.encrypted.pop_front() {
            let len = frame.bytes.len();
            if capacity >= len {
                n.send_window
                    .consume(now, i64::try_from(len).unwrap_or(i64::MAX));
                self.stats.update(
                    stats::ENCRYPTED_BYTES_SENT,
                    i64::try_from(len).unwrap_or(i64::MAX),
                );
                trace!(peer = %peer, size = len, "Frame handed to transport");
                self.outgoing.push_back((peer, frame.bytes));
            } else {
                debug!(peer = %peer, size = len, capacity, "Transmit grant too small, frame discarded");
                self.stats.update(stats::TRANSMIT_FAILURES, 1);
            }
        }
        self.process_encrypted(peer);
        self.consider_free(peer);
    }

    fn on_transmit_failed(&mut self, peer: PeerId, handle: TransmitHandle) {
        let Some(n) = self.neighbours.get_mut(&peer) else {
            return;
        };
        let Some(pending) = n.transmit.filter(|p| p.handle == handle) else {
            return;
        };
        n.transmit = None;
        if pending.connect_hint {
            debug!(peer = %peer, "Connection hint failed");
        } else {
            n.encrypted.pop_front();
            self.stats.update(stats::TRANSMIT_FAILURES, 1);
            debug!(peer = %peer, "Transmission failed, frame discarded");
            self.process_encrypted(peer);
        }
        self.consider_free(peer);
    }

    /// Records that writing a granted frame to the link failed.
    pub fn on_send_error(&mut self, peer: PeerId) {
        self.stats.update(stats::TRANSMIT_FAILURES, 1);
        debug!(peer = %peer, "Link rejected granted frame");
    }

    // ========================================
    // Inbound Pipeline
    // ========================================

    fn on_frame_received(&mut self, peer: PeerId, frame: &Bytes, hints: Vec<PerformanceHint>) {
        if peer == self.local {
            warn!("Frame claiming to come from ourselves dropped");
            return;
        }
        self.ensure_neighbour(peer);
        let now = self.now();
        let Some(n) = self.neighbours.get_mut(&peer) else {
            return;
        };
        let batch = match self.inbound.open(n, frame, self.stats.as_ref()) {
            Ok(batch) => batch,
            Err(e) if e.is_suspicious() => {
                warn!(peer = %peer, error = %e, "Suspicious frame dropped");
                return;
            }
            Err(e) => {
                debug!(peer = %peer, error = %e, "Frame dropped");
                return;
            }
        };

        n.hints = hints;
        let mut bw_changed = false;
        if batch.inbound_bw_limit != n.bw_out_external_limit {
            n.bw_out_external_limit = batch.inbound_bw_limit;
            if n.refresh_bw_out(now) {
                self.transport.set_quota(&peer, n.bw_in, n.bw_out);
                bw_changed = true;
            }
        }
        n.last_activity = now;
        if n.state.is_confirmed() {
            n.time_established.get_or_insert(now);
        }
        let half_idle = self.config.timers.idle_timeout() / 2;
        self.schedule(peer, TimerKind::KeepAlive, half_idle);

        for raw in batch.messages {
            match InboundHandler::classify(raw) {
                Ok(InboundMessage::Ping(ping)) => self.handle_ping(peer, &ping),
                Ok(InboundMessage::Pong(pong)) => self.handle_pong(peer, &pong),
                Ok(InboundMessage::Application(message)) => {
                    let hints = self
                        .neighbours
                        .get(&peer)
                        .map(|n| n.hints.clone())
                        .unwrap_or_default();
                    self.deliver_inbound(peer, &message, &hints);
                }
                Err(e) => debug!(peer = %peer, error = %e, "Unusable message skipped"),
            }
        }
        if bw_changed {
            self.handle_peer_status_change(peer);
            self.process_plaintext(peer);
        }
    }

    fn deliver_inbound(&self, peer: PeerId, message: &RawMessage, hints: &[PerformanceHint]) {
        trace!(peer = %peer, msg_type = message.header.msg_type, "Delivering inbound message");
        for (client, header_only) in self.registry.inbound_interest(message.header.msg_type) {
            self.clients.deliver(
                client,
                ClientNotification::Inbound {
                    peer,
                    message: if header_only {
                        message.header_bytes()
                    } else {
                        message.bytes.clone()
                    },
                    header_only,
                    hints: hints.to_vec(),
                },
            );
        }
    }

    // ========================================
    // Transport Events
    // ========================================

    /// Handles one event from the transport.
    pub fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { peer, hints } => self.on_connected(peer, hints),
            TransportEvent::Disconnected { peer } => self.on_disconnected(peer),
            TransportEvent::Received { peer, frame, hints } => {
                self.on_frame_received(peer, &frame, hints);
            }
            TransportEvent::TransmitReady {
                peer,
                handle,
                capacity,
            } => self.on_transmit_ready(peer, handle, capacity),
            TransportEvent::TransmitFailed { peer, handle } => {
                self.on_transmit_failed(peer, handle);
            }
        }
    }

    fn on_connected(&mut self, peer: PeerId, hints: Vec<PerformanceHint>) {
        if peer == self.local {
            warn!("Transport reported a connection to ourselves");
            return;
        }
        self.ensure_neighbour(peer);
        let now = self.now();
        let window = self.config.bandwidth.max_window_secs;
        let Some(n) = self.neighbours.get_mut(&peer) else {
            return;
        };
        if n.is_connected {
            debug!(peer = %peer, "Duplicate connect notification ignored");
            return;
        }
        n.is_connected = true;
        n.hints = hints;
        n.reset_trackers(now, window);
        if let Some(pending) = n.transmit.filter(|p| p.connect_hint) {
            self.transport.cancel(pending.handle);
            n.transmit = None;
        }
        self.transport.set_quota(&peer, n.bw_in, n.bw_out);
        info!(peer = %peer, "Neighbour connected");
        self.cancel_timer(peer, TimerKind::IdleEviction);
        self.send_key(peer);
    }

    fn on_disconnected(&mut self, peer: PeerId) {
        let Some(n) = self.neighbours.get_mut(&peer) else {
            debug!(peer = %peer, "Disconnect for unknown neighbour");
            return;
        };
        if !n.is_connected {
            return;
        }
        n.is_connected = false;
        info!(peer = %peer, "Neighbour disconnected");
        self.cancel_timer(peer, TimerKind::KeepAlive);
        self.notify_all(|o| o.disconnect, &ClientNotification::Disconnect { peer });
        self.requests.remove_peer(&peer);
        self.consider_free(peer);
    }

    // ========================================
    // Clients
    // ========================================

    /// Registers a local client; with `connect` set it is told about
    /// every neighbour that already has a confirmed session.
    pub fn client_connect(&mut self, client: ClientId, options: ClientOptions, types: &[u16]) {
        self.registry.register(client, options, types);
        debug!(%client, "Client registered");
        if !options.connect {
            return;
        }
        for n in self.neighbours.values() {
            if n.is_connected && n.state.is_confirmed() {
                self.clients.deliver(
                    client,
                    ClientNotification::Connect {
                        peer: n.peer,
                        hints: n.hints.clone(),
                    },
                );
            }
        }
    }

    /// Forgets a client and all its pending requests.
    pub fn client_disconnect(&mut self, client: ClientId) {
        self.registry.unregister(client);
        let dropped = self.requests.remove_client(client);
        debug!(%client, dropped, "Client unregistered");
    }

    /// Asks for permission to send `size` bytes to `peer`; answered with
    /// `SendReady` once the neighbour's queue has room.
    ///
    /// # Errors
    /// - `UnknownClient` if `client` is not registered
    /// - `MessageTooLarge` if `size` exceeds one frame
    /// - `SessionNotReady` / `NeighbourNotFound` without a confirmed,
    ///   connected session
    /// - `ClientQueueFull` if the client waits on too many peers
    pub fn client_request_send(
        &mut self,
        client: ClientId,
        peer: PeerId,
        size: usize,
        priority: u32,
        request_id: u32,
    ) -> Result<()> {
        if !self.registry.contains(client) {
            return Err(ServiceError::UnknownClient(client));
        }
        if size > FRAME_BUDGET {
            return Err(ServiceError::MessageTooLarge {
                size,
                max: FRAME_BUDGET,
            });
        }
        if peer != self.local {
            let Some(n) = self.neighbours.get(&peer) else {
                self.stats.update(stats::SEND_REQUESTS_DROPPED, 1);
                return Err(ServiceError::NeighbourNotFound(peer));
            };
            if !(n.is_connected && n.state.is_confirmed()) {
                self.stats.update(stats::SEND_REQUESTS_DROPPED, 1);
                return Err(ServiceError::SessionNotReady {
                    peer,
                    state: n.state,
                });
            }
        }
        self.requests.insert(
            ClientRequest {
                client,
                peer,
                size,
                priority,
                request_id,
            },
            self.config.limits.max_client_queue_size,
        )?;
        self.schedule_peer_messages(peer);
        Ok(())
    }

    /// Withdraws a pending request. Returns `false` if none existed.
    pub fn client_cancel_send(&mut self, client: ClientId, peer: &PeerId) -> bool {
        self.requests.remove(client, peer).is_some()
    }

    fn grant(&mut self, request: &ClientRequest) {
        self.requests.remove(request.client, &request.peer);
        trace!(client = %request.client, peer = %request.peer, "Granting send request");
        self.clients.deliver(
            request.client,
            ClientNotification::SendReady {
                peer: request.peer,
                size: request.size,
                request_id: request.request_id,
            },
        );
    }

    /// Offers a free queue slot of `peer` to the best pending request.
    fn schedule_peer_messages(&mut self, peer: PeerId) {
        if peer == self.local {
            while let Some(request) = self.requests.head(&peer).cloned() {
                self.grant(&request);
            }
            return;
        }
        let Some(n) = self.neighbours.get(&peer) else {
            return;
        };
        if n.queue_is_full(self.config.limits.max_peer_queue_size) {
            trace!(peer = %peer, "Queue full, requests wait");
            return;
        }
        if let Some(request) = self.requests.best(&peer).cloned() {
            self.grant(&request);
        }
    }

    /// Adjusts limits, reservation and preference for `peer` and reports
    /// its bandwidth.
    ///
    /// Without a confirmed session nothing changes and an empty answer
    /// is returned.
    pub fn request_peer_info(
        &mut self,
        peer: PeerId,
        limit_outbound: u32,
        reserve_inbound: i32,
        preference_change: u64,
    ) -> PeerInfo {
        let now = self.now();
        let Some(n) = self.neighbours.get_mut(&peer) else {
            return PeerInfo::empty(peer);
        };
        if !n.state.is_confirmed() {
            return PeerInfo::empty(peer);
        }

        let mut bw_changed = false;
        if n.bw_out_internal_limit != limit_outbound {
            n.bw_out_internal_limit = limit_outbound;
            if n.refresh_bw_out(now) {
                self.transport.set_quota(&peer, n.bw_in, n.bw_out);
                bw_changed = true;
            }
        }

        let mut reserve_delay = Duration::ZERO;
        let reserved_amount = match reserve_inbound {
            want if want < 0 => want,
            0 => 0,
            want => {
                let bytes = u64::from(want.unsigned_abs());
                reserve_delay = n.recv_window.delay_until_available(now, bytes);
                if reserve_delay.is_zero() {
                    want
                } else {
                    0
                }
            }
        };
        if reserved_amount != 0 {
            n.recv_window.consume(now, i64::from(reserved_amount));
        }

        let old = n.current_preference;
        n.current_preference = preference::apply_change(old, preference_change);
        let inc = n.current_preference - old;
        let (bw_in, bw_out) = (n.bw_in, n.bw_out);

        if self
            .preference_sum
            .add(inc, self.neighbours.values_mut().map(|n| &mut n.current_preference))
        {
            debug!("Preference sum overflowed, all preferences halved");
        }
        self.stats.set(
            stats::TOTAL_PREFERENCE,
            i64::try_from(self.preference_sum.total()).unwrap_or(i64::MAX),
        );
        if bw_changed {
            self.handle_peer_status_change(peer);
            // A queue parked on a zero rate would otherwise wait for its timer.
            self.process_plaintext(peer);
        }

        PeerInfo {
            peer,
            bw_in,
            bw_out,
            reserved_amount,
            reserve_delay,
            preference: self
                .neighbours
                .get(&peer)
                .map_or(0, |n| n.current_preference),
        }
    }

    /// Asks the transport to connect to `peer`.
    ///
    /// # Errors
    /// `LocalPeer` for our own identity.
    pub fn request_connect(&mut self, peer: PeerId) -> Result<()> {
        if peer == self.local {
            return Err(ServiceError::LocalPeer);
        }
        self.ensure_neighbour(peer);
        let Some(n) = self.neighbours.get_mut(&peer) else {
            return Err(ServiceError::NeighbourNotFound(peer));
        };
        if n.is_connected || n.transmit.is_some() {
            return Ok(());
        }
        self.stats.update(stats::CONNECT_REQUESTS, 1);
        match self.transport.request_transmit(
            &peer,
            0,
            CONTROL_PRIORITY,
            self.config.timers.idle_timeout(),
        ) {
            Some(handle) => {
                n.transmit = Some(PendingTransmit {
                    handle,
                    connect_hint: true,
                });
                debug!(peer = %peer, "Connection requested");
            }
            None => debug!(peer = %peer, "Transport refused connection request"),
        }
        Ok(())
    }

    // ========================================
    // Shutdown
    // ========================================

    /// Frees every neighbour and drops all client requests.
    pub fn shutdown(&mut self) {
        let peers: Vec<PeerId> = self.neighbours.keys().copied().collect();
        for peer in peers {
            self.free_neighbour(peer);
        }
        self.requests = RequestTable::new();
        if let Some(handle) = self.decay_task.take() {
            self.timers.cancel(handle);
        }
        info!("Link layer stopped");
    }
}

impl std::fmt::Debug for CoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreState")
            .field("local", &self.local)
            .field("neighbours", &self.neighbours.len())
            .field("clients", &self.registry.len())
            .field("requests", &self.requests.len())
            .field("timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use corelink_transport::MemoryTransport;

    use crate::services::admission::ClientOutbox;
    use crate::services::handshake::RecordingKeyExchange;
    use crate::stats::InMemoryStats;

    struct Harness {
        core: CoreState,
        transport: Arc<MemoryTransport>,
        stats: Arc<InMemoryStats>,
    }

    fn harness() -> Harness {
        let local = PeerId::new([1; 32]);
        let transport = Arc::new(MemoryTransport::new(local));
        let stats = Arc::new(InMemoryStats::new());
        let core = CoreState::new(
            local,
            CoreConfig::default(),
            Collaborators {
                transport: transport.clone(),
                key_exchange: Arc::new(RecordingKeyExchange::new()),
                clients: Arc::new(ClientOutbox::new()),
                stats: stats.clone(),
            },
        );
        Harness {
            core,
            transport,
            stats,
        }
    }

    fn message(msg_type: u16, body_len: usize) -> Bytes {
        let size = u16::try_from(4 + body_len).unwrap();
        let mut out = size.to_be_bytes().to_vec();
        out.extend_from_slice(&msg_type.to_be_bytes());
        out.resize(4 + body_len, 0xAB);
        Bytes::from(out)
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_rejects_malformed_payload() {
        let mut h = harness();
        let peer = PeerId::new([2; 32]);
        let err = h
            .core
            .enqueue_plaintext(peer, Bytes::from_static(&[0, 9, 0]), 1, Instant::now())
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidMessage { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_rejects_link_layer_types() {
        let mut h = harness();
        let peer = PeerId::new([2; 32]);
        let err = h
            .core
            .enqueue_plaintext(peer, message(83, 40), 1, Instant::now())
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidMessage { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_rejects_oversized_payload() {
        let mut h = harness();
        let err = h
            .core
            .enqueue_plaintext(
                PeerId::new([2; 32]),
                Bytes::from(vec![0u8; FRAME_BUDGET + 1]),
                1,
                Instant::now(),
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::MessageTooLarge { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_bound_before_session() {
        let mut h = harness();
        let peer = PeerId::new([2; 32]);
        let deadline = Instant::now() + Duration::from_secs(60);
        let max = h.core.config().limits.max_peer_queue_size;

        for _ in 0..max {
            h.core
                .enqueue_plaintext(peer, message(1000, 10), 1, deadline)
                .unwrap();
        }
        let err = h
            .core
            .enqueue_plaintext(peer, message(1000, 10), 1, deadline)
            .unwrap_err();

        assert!(err.is_backpressure());
        assert_eq!(h.core.neighbour(&peer).unwrap().messages.len(), max);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_peer_triggers_connection_hint() {
        let mut h = harness();
        let peer = PeerId::new([2; 32]);
        h.core
            .enqueue_plaintext(peer, message(1000, 10), 1, Instant::now())
            .unwrap();

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].size, 0);
        assert_eq!(h.stats.get(stats::CONNECT_REQUESTS), 1);
        assert_eq!(h.stats.get(stats::NEIGHBOUR_ENTRIES), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_connect_to_self_rejected() {
        let mut h = harness();
        let local = h.core.local_peer();
        assert!(matches!(
            h.core.request_connect(local),
            Err(ServiceError::LocalPeer)
        ));
        assert!(h.core.neighbour(&local).unwrap().state.is_confirmed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_info_without_session_is_empty() {
        let mut h = harness();
        let peer = PeerId::new([2; 32]);
        let info = h.core.request_peer_info(peer, 1000, 10, 5);
        assert_eq!(info, PeerInfo::empty(peer));
        assert_eq!(h.core.preference_sum(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_frees_everything() {
        let mut h = harness();
        for i in 2..5u8 {
            h.core.request_connect(PeerId::new([i; 32])).unwrap();
        }
        assert_eq!(h.core.neighbour_count(), 3);

        h.core.shutdown();

        assert_eq!(h.core.neighbour_count(), 0);
        assert_eq!(h.core.next_deadline(), None);
        assert_eq!(h.transport.cancelled().len(), 3);
    }
}

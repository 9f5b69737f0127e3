// ============================================
// File: crates/corelink-service/src/services/neighbour.rs
// ============================================
//! # Neighbour State
//!
//! ## Creation Reason
//! Everything the link layer knows about one directly connected peer:
//! session keys, handshake state, bandwidth, both queues and the handles
//! of its scheduled callbacks.
//!
//! ## Main Functionality
//! - `Neighbour`: per-peer record owned by `CoreState`
//! - `MessageEntry`: one queued plaintext message
//! - `EncryptedFrame`: one sealed frame awaiting the transport
//! - `NeighbourTimers`: the five cancellable callbacks
//!
//! ## ⚠️ Important Note for Next Developer
//! - `bw_out` must stay `min(bw_out_internal_limit, bw_out_external_limit)`;
//!   go through `refresh_bw_out`
//! - The plaintext queue is FIFO by insertion; the scheduler relies on it
//! - A neighbour is only freed through `CoreState`, which cancels timers
//!   and the transmit handle first
//!
//! ## Last Modified
//! v0.1.0 - Initial neighbour record

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use tokio::time::Instant;

use corelink_common::{PeerId, Timestamp};
use corelink_core::SessionKey;
use corelink_transport::{BandwidthTracker, PerformanceHint, TransmitHandle, WindowTracker};

use crate::config::CoreConfig;
use crate::services::handshake::HandshakeState;
use crate::services::replay::ReplayWindow;
use crate::timers::{TaskHandle, TimerKind};

// ============================================
// MessageEntry
// ============================================

/// A plaintext message waiting for a frame.
#[derive(Debug, Clone)]
pub struct MessageEntry {
    /// Complete message, header included
    pub payload: Bytes,
    /// Larger is more important
    pub priority: u32,
    /// Latest useful transmission time
    pub deadline: Instant,
    /// Soft deadline granted once when corking is considered
    pub slack_deadline: Instant,
    /// Marked for the next frame by the scheduler
    pub do_transmit: bool,
    /// `slack_deadline` has been assigned
    pub got_slack: bool,
}

impl MessageEntry {
    /// New unmarked entry.
    #[must_use]
    pub fn new(payload: Bytes, priority: u32, deadline: Instant) -> Self {
        Self {
            payload,
            priority,
            deadline,
            slack_deadline: deadline,
            do_transmit: false,
            got_slack: false,
        }
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

// ============================================
// EncryptedFrame
// ============================================

/// A sealed frame in the encrypted queue.
#[derive(Debug, Clone)]
pub struct EncryptedFrame {
    /// Wire bytes
    pub bytes: Bytes,
    /// Priority passed to the transport
    pub priority: u32,
    /// Transmission deadline passed to the transport
    pub deadline: Instant,
}

// ============================================
// Transmit Slot
// ============================================

/// The single outstanding transport request of a neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransmit {
    /// Transport handle
    pub handle: TransmitHandle,
    /// Zero-size request made only to get the transport to connect
    pub connect_hint: bool,
}

// ============================================
// NeighbourTimers
// ============================================

/// Handles of the per-neighbour callbacks; `None` when not scheduled.
#[derive(Debug, Default, Clone)]
pub struct NeighbourTimers {
    retry_plaintext: Option<TaskHandle>,
    retry_handshake: Option<TaskHandle>,
    keep_alive: Option<TaskHandle>,
    idle_eviction: Option<TaskHandle>,
    quota_update: Option<TaskHandle>,
}

impl NeighbourTimers {
    /// Slot for `kind`.
    pub fn slot(&mut self, kind: TimerKind) -> &mut Option<TaskHandle> {
        match kind {
            TimerKind::RetryPlaintext => &mut self.retry_plaintext,
            TimerKind::RetryHandshake => &mut self.retry_handshake,
            TimerKind::KeepAlive => &mut self.keep_alive,
            TimerKind::IdleEviction => &mut self.idle_eviction,
            TimerKind::QuotaUpdate => &mut self.quota_update,
        }
    }

    /// `true` if `kind` is scheduled.
    #[must_use]
    pub fn is_scheduled(&self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::RetryPlaintext => self.retry_plaintext.is_some(),
            TimerKind::RetryHandshake => self.retry_handshake.is_some(),
            TimerKind::KeepAlive => self.keep_alive.is_some(),
            TimerKind::IdleEviction => self.idle_eviction.is_some(),
            TimerKind::QuotaUpdate => self.quota_update.is_some(),
        }
    }

    /// Takes every scheduled handle, leaving all slots empty.
    pub fn drain(&mut self) -> Vec<TaskHandle> {
        [
            self.retry_plaintext.take(),
            self.retry_handshake.take(),
            self.keep_alive.take(),
            self.idle_eviction.take(),
            self.quota_update.take(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

// ============================================
// Neighbour
// ============================================

/// Link-layer record of one peer.
#[derive(Debug)]
pub struct Neighbour {
    /// Peer identity
    pub peer: PeerId,
    /// Pinned to `KeyConfirmed`, frames are never encrypted
    pub loopback: bool,
    /// Handshake state
    pub state: HandshakeState,

    /// Our key for frames to this peer
    pub encrypt_key: SessionKey,
    /// Creation time of `encrypt_key`
    pub encrypt_key_created: Timestamp,
    /// Peer's key for frames from it
    pub decrypt_key: Option<SessionKey>,
    /// Creation time of `decrypt_key`
    pub decrypt_key_created: Timestamp,
    /// Value the peer must echo in its PONG
    pub ping_challenge: u32,
    /// Current handshake retry interval
    pub set_key_retry_frequency: Duration,

    /// Last authenticated traffic from the peer
    pub last_activity: Instant,
    /// When the transport connection came up
    pub time_established: Option<Instant>,
    /// Transport reports a direct connection
    pub is_connected: bool,
    /// Transport performance properties
    pub hints: Vec<PerformanceHint>,

    /// Bandwidth we accept from the peer
    pub bw_in: u32,
    /// Bandwidth we may send to the peer
    pub bw_out: u32,
    /// Local limit requested by clients
    pub bw_out_internal_limit: u32,
    /// Limit advertised by the peer
    pub bw_out_external_limit: u32,
    /// Outbound byte budget at `bw_out`
    pub send_window: WindowTracker,
    /// Inbound byte budget at `bw_in`, used for reservations
    pub recv_window: WindowTracker,

    /// Sequence number of the last frame we sealed
    pub last_sequence_number_sent: u32,
    /// Inbound replay protection
    pub replay: ReplayWindow,

    /// Plaintext queue, FIFO by insertion
    pub messages: VecDeque<MessageEntry>,
    /// Sealed frames, FIFO
    pub encrypted: VecDeque<EncryptedFrame>,
    /// Outstanding transport request
    pub transmit: Option<PendingTransmit>,

    /// Client-assigned preference
    pub current_preference: u64,
    /// Callback handles
    pub timers: NeighbourTimers,
}

impl Neighbour {
    /// Fresh neighbour with a new session key and default bandwidth.
    #[must_use]
    pub fn new(peer: PeerId, now: Instant, config: &CoreConfig) -> Self {
        let default_bw = config.bandwidth.default_bw_in_out;
        let window = config.bandwidth.max_window_secs;
        Self {
            peer,
            loopback: false,
            state: HandshakeState::Down,
            encrypt_key: SessionKey::generate(),
            encrypt_key_created: Timestamp::now(),
            decrypt_key: None,
            decrypt_key_created: Timestamp::from_micros(0),
            ping_challenge: rand::thread_rng().gen(),
            set_key_retry_frequency: config.timers.set_key_retry(),
            last_activity: now,
            time_established: None,
            is_connected: false,
            hints: Vec::new(),
            bw_in: default_bw,
            bw_out: default_bw,
            bw_out_internal_limit: u32::MAX,
            bw_out_external_limit: default_bw,
            send_window: WindowTracker::new(now, default_bw, window),
            recv_window: WindowTracker::new(now, default_bw, window),
            last_sequence_number_sent: 0,
            replay: ReplayWindow::new(),
            messages: VecDeque::new(),
            encrypted: VecDeque::new(),
            transmit: None,
            current_preference: 0,
            timers: NeighbourTimers::default(),
        }
    }

    /// The entry for our own identity.
    #[must_use]
    pub fn loopback(peer: PeerId, now: Instant, config: &CoreConfig) -> Self {
        let mut neighbour = Self::new(peer, now, config);
        neighbour.loopback = true;
        neighbour.state = HandshakeState::KeyConfirmed;
        neighbour.is_connected = true;
        neighbour.time_established = Some(now);
        neighbour
    }

    /// `true` if no more messages may be queued.
    #[must_use]
    pub fn queue_is_full(&self, max: usize) -> bool {
        self.messages.len() >= max
    }

    /// Next sequence number for an outbound frame.
    ///
    /// `None` once the 32-bit space is used up; the session must be
    /// reset with a fresh key before sending again.
    pub fn next_sequence_number(&mut self) -> Option<u32> {
        let next = self.last_sequence_number_sent.checked_add(1)?;
        self.last_sequence_number_sent = next;
        Some(next)
    }

    /// Recomputes `bw_out` from both limits. Returns `true` on change.
    pub fn refresh_bw_out(&mut self, now: Instant) -> bool {
        let bw_out = self.bw_out_internal_limit.min(self.bw_out_external_limit);
        if bw_out == self.bw_out {
            return false;
        }
        self.bw_out = bw_out;
        self.send_window.update_quota(now, bw_out);
        true
    }

    /// Restarts both trackers at the current rates.
    pub fn reset_trackers(&mut self, now: Instant, window_secs: u32) {
        self.send_window = WindowTracker::new(now, self.bw_out, window_secs);
        self.recv_window = WindowTracker::new(now, self.bw_in, window_secs);
    }

    /// Time at which the neighbour counts as idle.
    #[must_use]
    pub fn idle_deadline(&self, idle_timeout: Duration) -> Instant {
        crate::timers::deadline_after(self.last_activity, idle_timeout)
    }

    /// Drops the session: new key, state `Down`, sequence state cleared.
    pub fn reset_session(&mut self, config: &CoreConfig) {
        self.state = HandshakeState::Down;
        self.encrypt_key = SessionKey::generate();
        self.encrypt_key_created = Timestamp::now();
        self.decrypt_key = None;
        self.decrypt_key_created = Timestamp::from_micros(0);
        self.last_sequence_number_sent = 0;
        self.replay.reset();
        self.ping_challenge = rand::thread_rng().gen();
        self.set_key_retry_frequency = config.timers.set_key_retry();
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbour() -> Neighbour {
        Neighbour::new(PeerId::new([1; 32]), Instant::now(), &CoreConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_neighbour_defaults() {
        let config = CoreConfig::default();
        let n = neighbour();
        assert_eq!(n.state, HandshakeState::Down);
        assert_eq!(n.bw_in, config.bandwidth.default_bw_in_out);
        assert_eq!(n.bw_out, config.bandwidth.default_bw_in_out);
        assert_eq!(n.bw_out_internal_limit, u32::MAX);
        assert!(n.messages.is_empty());
        assert!(n.transmit.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bw_out_is_min_of_limits() {
        let mut n = neighbour();
        n.bw_out_internal_limit = 1000;
        assert!(n.refresh_bw_out(Instant::now()));
        assert_eq!(n.bw_out, 1000);
        assert_eq!(n.send_window.quota(), 1000);
        assert!(!n.refresh_bw_out(Instant::now()));

        n.bw_out_external_limit = 10;
        assert!(n.refresh_bw_out(Instant::now()));
        assert_eq!(n.bw_out, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_numbers_strictly_increase() {
        let mut n = neighbour();
        assert_eq!(n.next_sequence_number(), Some(1));
        assert_eq!(n.next_sequence_number(), Some(2));
        n.last_sequence_number_sent = u32::MAX;
        assert_eq!(n.next_sequence_number(), None);
        assert_eq!(n.last_sequence_number_sent, u32::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_session_clears_sequence_state() {
        let config = CoreConfig::default();
        let mut n = neighbour();
        n.state = HandshakeState::KeyConfirmed;
        n.last_sequence_number_sent = 40;
        n.replay.check_and_record(7);
        n.reset_session(&config);
        assert_eq!(n.state, HandshakeState::Down);
        assert_eq!(n.last_sequence_number_sent, 0);
        assert_eq!(n.replay.highest_seen(), 0);
        assert!(n.decrypt_key.is_none());
    }

    #[test]
    fn test_timer_slots_drain() {
        let mut timers = NeighbourTimers::default();
        assert!(!timers.is_scheduled(TimerKind::KeepAlive));
        assert!(timers.drain().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loopback_is_confirmed() {
        let n = Neighbour::loopback(PeerId::new([2; 32]), Instant::now(), &CoreConfig::default());
        assert!(n.loopback);
        assert!(n.state.is_confirmed());
    }
}

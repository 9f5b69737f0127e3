// ============================================
// File: crates/corelink-service/src/services/handshake.rs
// ============================================
//! # Handshake State Machine
//!
//! ## Creation Reason
//! The key-exchange message formats live outside the link layer. What the
//! link layer owns is the per-neighbour state those messages drive and the
//! decision of when to (re)send our own key.
//!
//! ## Main Functionality
//! - `HandshakeState`: `Down` → `KeySent` → `KeyReceived` → `KeyConfirmed`
//! - `KeyExchange`: outbound collaborator that transmits our session key
//! - `HandshakeEvent`: inbound transitions reported by the key exchange
//! - Pure transition helpers used by `CoreState`
//!
//! ## Handshake Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │   Down ──send_key──► KeySent ──peer key──► KeyReceived       │
//! │     │                                          │             │
//! │     └──────────peer key──────────────────────►─┤             │
//! │                                                │ valid PONG  │
//! │                                                ▼             │
//! │                                          KeyConfirmed        │
//! │                                                              │
//! │   Reset (any state) ──► Down, replay state cleared           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - States only move forward; `Reset` is the single way back
//! - Only `KeyReceived` and `KeyConfirmed` may decrypt frames
//! - Only `KeyConfirmed` drains the plaintext queue
//!
//! ## Last Modified
//! v0.1.0 - Initial handshake state machine

use std::fmt;

use parking_lot::Mutex;

use corelink_common::{PeerId, Timestamp};
use corelink_core::SessionKey;

// ============================================
// HandshakeState
// ============================================

/// Session state of a neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum HandshakeState {
    /// Nothing exchanged yet.
    #[default]
    Down,
    /// Our key was sent, nothing received.
    KeySent,
    /// We hold the peer's key; our key is not yet confirmed.
    KeyReceived,
    /// The peer proved it holds our key by answering a PING.
    KeyConfirmed,
}

impl HandshakeState {
    /// `true` if frames from the peer can be decrypted.
    #[must_use]
    pub const fn can_decrypt(self) -> bool {
        matches!(self, Self::KeyReceived | Self::KeyConfirmed)
    }

    /// `true` if the plaintext queue may be drained.
    #[must_use]
    pub const fn is_confirmed(self) -> bool {
        matches!(self, Self::KeyConfirmed)
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Down => "down",
            Self::KeySent => "key-sent",
            Self::KeyReceived => "key-received",
            Self::KeyConfirmed => "key-confirmed",
        };
        f.write_str(name)
    }
}

// ============================================
// Transitions
// ============================================

/// State after we transmitted our key.
#[must_use]
pub const fn after_key_sent(state: HandshakeState) -> HandshakeState {
    match state {
        HandshakeState::Down => HandshakeState::KeySent,
        other => other,
    }
}

/// State after a peer key was accepted, and whether our key must be
/// (re)sent so the peer can reach `KeyReceived` too.
///
/// `sender_state` is the state the peer claimed when it sent its key.
#[must_use]
pub const fn after_key_received(
    state: HandshakeState,
    sender_state: HandshakeState,
) -> (HandshakeState, bool) {
    let peer_has_our_key = sender_state.can_decrypt();
    match state {
        HandshakeState::Down => (HandshakeState::KeyReceived, true),
        HandshakeState::KeySent | HandshakeState::KeyReceived => {
            (HandshakeState::KeyReceived, !peer_has_our_key)
        }
        HandshakeState::KeyConfirmed => (HandshakeState::KeyConfirmed, !peer_has_our_key),
    }
}

// ============================================
// Key Exchange Collaborator
// ============================================

/// Inbound transition reported by the key exchange.
#[derive(Debug, Clone)]
pub enum HandshakeEvent {
    /// The peer's session key arrived and verified.
    KeyReceived {
        /// Peer's encryption key, our decryption key
        key: SessionKey,
        /// Creation time the peer stamped on the key
        created: Timestamp,
        /// State the peer was in when it sent the key
        sender_state: HandshakeState,
    },
    /// Drop the session and start over.
    Reset,
}

/// Transmits our session key to a neighbour.
pub trait KeyExchange: Send + Sync {
    /// Sends `key` (created at `created`) to `peer`; `state` is our
    /// current handshake state, carried so the peer can tell whether we
    /// already hold its key.
    fn send_key(&self, peer: &PeerId, key: &SessionKey, created: Timestamp, state: HandshakeState);
}

/// One call to [`KeyExchange::send_key`].
#[derive(Debug, Clone)]
pub struct KeyOffer {
    /// Destination
    pub peer: PeerId,
    /// Key that was offered
    pub key: SessionKey,
    /// Its creation time
    pub created: Timestamp,
    /// Sender state at the time
    pub state: HandshakeState,
}

/// Key exchange that only records what it was asked to send.
///
/// Used by tests and by the daemon until a real key exchange is attached;
/// two linked services can be wired together by feeding each other's
/// offers back as [`HandshakeEvent::KeyReceived`].
#[derive(Debug, Default)]
pub struct RecordingKeyExchange {
    offers: Mutex<Vec<KeyOffer>>,
}

impl RecordingKeyExchange {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns all recorded offers.
    pub fn take(&self) -> Vec<KeyOffer> {
        std::mem::take(&mut *self.offers.lock())
    }

    /// Number of offers recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offers.lock().len()
    }

    /// `true` if nothing was offered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offers.lock().is_empty()
    }
}

impl KeyExchange for RecordingKeyExchange {
    fn send_key(&self, peer: &PeerId, key: &SessionKey, created: Timestamp, state: HandshakeState) {
        self.offers.lock().push(KeyOffer {
            peer: *peer,
            key: key.clone(),
            created,
            state,
        });
    }
}

// ============================================
// Tests
// ============================================

// ============================================
// File: crates/corelink-service/src/handlers/inbound.rs
// ============================================
//! # Inbound Frame Handler
//!
//! ## Creation Reason
//! Turns an encrypted frame from the transport back into the messages it
//! carries, rejecting anything forged, replayed or ancient before a
//! single byte reaches the rest of the service.
//!
//! ## Main Functionality
//! - `InboundHandler::open`: authenticate, decrypt, replay-check, age-check
//! - `InboundHandler::classify`: PING / PONG / application message
//! - `OpenedBatch`: header fields the caller acts on plus the messages
//!
//! ## Frame Processing
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  1. Session can decrypt? (KeyReceived / KeyConfirmed)        │
//! │  2. Verify HMAC with auth key (key, iv_seed, key created)    │
//! │  3. Decrypt body, IV bound to our identity                   │
//! │  4. Replay window: duplicate / too old / accept              │
//! │  5. Timestamp not older than the message age bound           │
//! │  6. Split payload into messages                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The replay window is only touched after authentication succeeded
//! - Every rejection bumps exactly one counter
//! - A payload that fails to split is dropped whole, never partially
//!
//! ## Last Modified
//! v0.1.0 - Initial inbound handler

use std::time::Duration;

use bytes::Bytes;
use tracing::{trace, warn};

use corelink_common::PeerId;
use corelink_core::crypto::{DefaultFrameCrypto, FrameCrypto};
use corelink_core::error::CoreError;
use corelink_core::protocol::codec::{decode_ping, decode_pong};
use corelink_core::protocol::split_messages;
use corelink_core::{MessageType, PingMessage, PongMessage, RawMessage};

use crate::error::{Result, ServiceError};
use crate::services::neighbour::Neighbour;
use crate::services::replay::ReplayCheckResult;
use crate::stats::{self, StatisticsSink};

// ============================================
// Types
// ============================================

/// Decrypted and accepted frame.
#[derive(Debug, Clone)]
pub struct OpenedBatch {
    /// Sequence number of the frame
    pub sequence_number: u32,
    /// Bandwidth the peer is willing to receive from us
    pub inbound_bw_limit: u32,
    /// Messages in frame order
    pub messages: Vec<RawMessage>,
}

/// A message out of a frame, by who handles it.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// Liveness probe for us
    Ping(PingMessage),
    /// Answer to our probe
    Pong(PongMessage),
    /// Anything else, for local clients
    Application(RawMessage),
}

// ============================================
// InboundHandler
// ============================================

/// Opens inbound frames.
#[derive(Debug, Clone)]
pub struct InboundHandler {
    local: PeerId,
    crypto: DefaultFrameCrypto,
    max_message_age: Duration,
}

impl InboundHandler {
    /// Creates a handler for frames addressed to `local`.
    #[must_use]
    pub const fn new(local: PeerId, max_message_age: Duration) -> Self {
        Self {
            local,
            crypto: DefaultFrameCrypto::new(),
            max_message_age,
        }
    }

    /// Authenticates and decrypts `frame` from `neighbour`.
    ///
    /// # Errors
    /// - `SessionNotReady` if no decryption key is held
    /// - `Core(AuthenticationFailed | Decryption)` on forged frames
    /// - `Core(DuplicateFrame | ReplayDetected)` on replays
    /// - `Core(InvalidTimestamp)` if the frame is too old
    /// - `Core(MalformedMessage | MessageTooShort)` on broken payloads
    pub fn open(
        &self,
        neighbour: &mut Neighbour,
        frame: &Bytes,
        stats: &dyn StatisticsSink,
    ) -> Result<OpenedBatch> {
        let key = match (&neighbour.decrypt_key, neighbour.state.can_decrypt()) {
            (Some(key), true) => key,
            _ => {
                stats.update(stats::FRAMES_WITHOUT_KEY, 1);
                return Err(ServiceError::SessionNotReady {
                    peer: neighbour.peer,
                    state: neighbour.state,
                });
            }
        };

        let opened = self
            .crypto
            .open(key, neighbour.decrypt_key_created, &self.local, frame)
            .map_err(|e| {
                if e.is_crypto_error() {
                    stats.update(stats::AUTH_FAILURES, 1);
                    warn!(peer = %neighbour.peer, error = %e, "Failed to authenticate frame");
                }
                e
            })?;
        let header = opened.header;
        let seq = header.sequence_number;

        match neighbour.replay.check_and_record(seq) {
            ReplayCheckResult::Duplicate => {
                stats.update(stats::DUPLICATES, 1);
                return Err(CoreError::DuplicateFrame { sequence: seq }.into());
            }
            ReplayCheckResult::TooOld => {
                stats.update(stats::STALE, 1);
                return Err(CoreError::replay(seq, neighbour.replay.highest_seen()).into());
            }
            ReplayCheckResult::Accept | ReplayCheckResult::AcceptAndAdvance => {}
        }

        if let Err(e) = header.timestamp.check_age(self.max_message_age) {
            stats.update(stats::BYTES_ANCIENT, i64::try_from(frame.len()).unwrap_or(i64::MAX));
            return Err(CoreError::invalid_timestamp(e.to_string()).into());
        }

        stats.update(
            stats::BYTES_DECRYPTED,
            i64::try_from(opened.payload.len()).unwrap_or(i64::MAX),
        );
        let messages = split_messages(&opened.payload)?;
        trace!(
            peer = %neighbour.peer,
            seq,
            count = messages.len(),
            "Frame opened"
        );

        Ok(OpenedBatch {
            sequence_number: seq,
            inbound_bw_limit: header.inbound_bw_limit,
            messages,
        })
    }

    /// Sorts a message by who handles it.
    ///
    /// # Errors
    /// Codec errors for PING / PONG of the wrong size; a nested encrypted
    /// frame is malformed.
    pub fn classify(message: RawMessage) -> Result<InboundMessage> {
        match MessageType::from_u16(message.header.msg_type) {
            Some(MessageType::Ping) => Ok(InboundMessage::Ping(decode_ping(&message.bytes)?)),
            Some(MessageType::Pong) => Ok(InboundMessage::Pong(decode_pong(&message.bytes)?)),
            Some(MessageType::EncryptedMessage) => {
                Err(CoreError::malformed("encrypted frame nested inside a frame").into())
            }
            None => Ok(InboundMessage::Application(message)),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use corelink_common::Timestamp;
    use corelink_core::protocol::codec::encode_ping;
    use corelink_core::{EncryptedHeader, SessionKey};
    use tokio::time::Instant;

    use crate::config::CoreConfig;
    use crate::services::handshake::HandshakeState;
    use crate::stats::InMemoryStats;

    const AGE: Duration = Duration::from_secs(86_400);

    struct Fixture {
        local: PeerId,
        key: SessionKey,
        created: Timestamp,
        neighbour: Neighbour,
    }

    fn fixture() -> Fixture {
        let local = PeerId::new([1; 32]);
        let key = SessionKey::generate();
        let created = Timestamp::now();
        let mut neighbour =
            Neighbour::new(PeerId::new([2; 32]), Instant::now(), &CoreConfig::default());
        neighbour.state = HandshakeState::KeyReceived;
        neighbour.decrypt_key = Some(key.clone());
        neighbour.decrypt_key_created = created;
        Fixture {
            local,
            key,
            created,
            neighbour,
        }
    }

    fn app_message(msg_type: u16, body: &[u8]) -> Vec<u8> {
        let size = u16::try_from(4 + body.len()).unwrap();
        let mut out = size.to_be_bytes().to_vec();
        out.extend_from_slice(&msg_type.to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    fn seal(f: &Fixture, seq: u32, timestamp: Timestamp, plaintext: &[u8]) -> Bytes {
        DefaultFrameCrypto::new()
            .seal(
                &f.key,
                f.created,
                &f.local,
                EncryptedHeader::new(7, seq, 5000, timestamp),
                plaintext,
            )
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_valid_frame() {
        let mut f = fixture();
        let stats = InMemoryStats::new();
        let handler = InboundHandler::new(f.local, AGE);
        let frame = seal(&f, 1, Timestamp::now(), &app_message(1000, b"hello"));

        let batch = handler.open(&mut f.neighbour, &frame, &stats).unwrap();

        assert_eq!(batch.sequence_number, 1);
        assert_eq!(batch.inbound_bw_limit, 5000);
        assert_eq!(batch.messages.len(), 1);
        assert_eq!(batch.messages[0].header.msg_type, 1000);
        assert_eq!(stats.get(stats::BYTES_DECRYPTED), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flipped_byte_fails_authentication() {
        let mut f = fixture();
        let stats = InMemoryStats::new();
        let handler = InboundHandler::new(f.local, AGE);
        let frame = seal(&f, 1, Timestamp::now(), &app_message(1000, b"hello"));
        let mut tampered = frame.to_vec();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;

        let err = handler
            .open(&mut f.neighbour, &Bytes::from(tampered), &stats)
            .unwrap_err();

        assert!(err.is_suspicious());
        assert_eq!(stats.get(stats::AUTH_FAILURES), 1);
        // the replay window must not have moved
        assert_eq!(f.neighbour.replay.highest_seen(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_rejected() {
        let mut f = fixture();
        let stats = InMemoryStats::new();
        let handler = InboundHandler::new(f.local, AGE);
        let frame = seal(&f, 3, Timestamp::now(), &app_message(1000, b"x"));

        handler.open(&mut f.neighbour, &frame, &stats).unwrap();
        let err = handler.open(&mut f.neighbour, &frame, &stats).unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Core(CoreError::DuplicateFrame { sequence: 3 })
        ));
        assert_eq!(stats.get(stats::DUPLICATES), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_sequence_rejected() {
        let mut f = fixture();
        let stats = InMemoryStats::new();
        let handler = InboundHandler::new(f.local, AGE);
        let now = Timestamp::now();

        let frame = seal(&f, 100, now, &[]);
        handler.open(&mut f.neighbour, &frame, &stats).unwrap();
        let frame = seal(&f, 50, now, &[]);
        let err = handler.open(&mut f.neighbour, &frame, &stats).unwrap_err();

        assert!(matches!(err, ServiceError::Core(CoreError::ReplayDetected { .. })));
        assert_eq!(stats.get(stats::STALE), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ancient_timestamp_rejected() {
        let mut f = fixture();
        let stats = InMemoryStats::new();
        let handler = InboundHandler::new(f.local, Duration::from_secs(60));
        let old = Timestamp::from_micros(Timestamp::now().as_micros() - 120_000_000);

        let frame = seal(&f, 1, old, &[]);
        let err = handler.open(&mut f.neighbour, &frame, &stats).unwrap_err();

        assert!(matches!(err, ServiceError::Core(CoreError::InvalidTimestamp { .. })));
        assert!(stats.get(stats::BYTES_ANCIENT) > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_key_drops_frame() {
        let mut f = fixture();
        let stats = InMemoryStats::new();
        let handler = InboundHandler::new(f.local, AGE);
        let frame = seal(&f, 1, Timestamp::now(), &[]);
        f.neighbour.state = HandshakeState::KeySent;

        let err = handler.open(&mut f.neighbour, &frame, &stats).unwrap_err();

        assert!(matches!(err, ServiceError::SessionNotReady { .. }));
        assert_eq!(stats.get(stats::FRAMES_WITHOUT_KEY), 1);
    }

    #[test]
    fn test_classify() {
        let ping = encode_ping(&PingMessage {
            iv_seed: 1,
            challenge: 2,
            target: PeerId::new([3; 32]),
        });
        let messages = split_messages(&ping).unwrap();
        assert!(matches!(
            InboundHandler::classify(messages[0].clone()).unwrap(),
            InboundMessage::Ping(PingMessage { challenge: 2, .. })
        ));

        let app = Bytes::from(app_message(4242, b"abc"));
        let messages = split_messages(&app).unwrap();
        assert!(matches!(
            InboundHandler::classify(messages[0].clone()).unwrap(),
            InboundMessage::Application(_)
        ));
    }
}

// ============================================
// File: crates/corelink-core/src/lib.rs
// ============================================
//! # Corelink Core - Frame Codec & Crypto Pipeline
//!
//! ## Creation Reason
//! Everything that touches bytes on the wire between two neighbours:
//! message layouts and the symmetric pipeline that turns a batch of
//! plaintext messages into one authenticated, encrypted frame.
//!
//! ## Main Functionality
//!
//! ### Protocol Module ([`protocol`])
//! - Message header, encrypted frame header, PING and PONG layouts
//! - `Codec` trait and `ProtocolCodec` (big-endian wire format)
//! - Tokenizer splitting a decrypted payload into messages
//!
//! ### Crypto Module ([`crypto`])
//! - Key types (`IdentityKeyPair`, `SessionKey`, `AuthKey`)
//! - Per-frame IV and authentication-key derivation (HKDF-SHA256)
//! - Frame seal/open (ChaCha20-Poly1305 + HMAC-SHA256)
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              corelink-service                       │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   corelink-core  ◄──   corelink-transport          │
//! │   You are here        │                            │
//! │         │             │                            │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             corelink-common                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Guarantees
//! - **Confidentiality**: ChaCha20-Poly1305 over the frame body
//! - **Integrity**: HMAC-SHA256 under a per-frame derived key, checked first
//! - **Replay Protection**: sequence numbers in the authenticated header
//!
//! ## ⚠️ Important Note for Next Developer
//! - Use RustCrypto implementations only, never custom primitives
//! - Key types zeroize on drop
//! - Wire layouts are big-endian and fixed; changing them breaks peers
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod error;
pub mod protocol;

pub use crypto::{DefaultFrameCrypto, FrameCrypto, IdentityKeyPair, OpenedFrame, SessionKey};
pub use error::{CoreError, Result};
pub use protocol::{
    EncryptedHeader, MessageHeader, MessageType, PingMessage, PongMessage, RawMessage,
};

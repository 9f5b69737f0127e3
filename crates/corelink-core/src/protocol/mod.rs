// ============================================
// File: crates/corelink-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Defines the wire layout of everything exchanged between two
//! neighbours once a session key exists.
//!
//! ## Main Functionality
//! - [`messages`]: Message header, encrypted frame header, PING, PONG
//! - [`codec`]: Binary encode/decode plus the payload tokenizer
//!
//! ## Frame Overview
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ EncryptedHeader (56 bytes, cleartext, authenticated)     │
//! ├──────────────────────────────────────────────────────────┤
//! │ ChaCha20-Poly1305 ciphertext                             │
//! │  ├─ message 1 (u16 size | u16 type | body)               │
//! │  ├─ message 2 ...                                        │
//! │  └─ Poly1305 tag (16 bytes)                              │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format Principles
//! - Big-endian byte order for every multi-byte integer
//! - Every inner message starts with its own size/type header
//! - Sizes include the header itself
//!
//! ## ⚠️ Important Note for Next Developer
//! - The layouts here are shared with remote peers; do not reorder fields
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod codec;
pub mod messages;

pub use codec::{split_messages, Codec, ProtocolCodec};
pub use messages::{
    EncryptedHeader, MessageHeader, MessageType, PingMessage, PongMessage, RawMessage,
};

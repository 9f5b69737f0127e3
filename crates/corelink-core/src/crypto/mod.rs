// ============================================
// File: crates/corelink-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Symmetric protection of neighbour-to-neighbour frames plus the
//! long-term identity key that names this node.
//!
//! ## Main Functionality
//! - [`keys`]: `IdentityKeyPair` (Ed25519), `SessionKey`, `AuthKey`
//! - [`kdf`]: Per-frame IV and authentication-key derivation
//! - [`frame`]: Seal/open of encrypted frames
//!
//! ## Cryptographic Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  per frame: iv_seed = random u32                            │
//! │                                                             │
//! │  nonce    = HKDF(key, salt=iv_seed, seq || receiver)        │
//! │  auth_key = HKDF(key, salt=iv_seed, key creation time)      │
//! │                                                             │
//! │  ciphertext = ChaCha20-Poly1305(key, nonce, body, aad=hdr)  │
//! │  hmac       = HMAC-SHA256(auth_key, hdr || ciphertext)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Randomness comes from the seed, never from regenerating the key
//! - The sequence number is folded into the nonce so (key, nonce) never
//!   repeats within one session key
//! - HMAC is verified before any decryption is attempted
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod frame;
pub mod kdf;
pub mod keys;

pub use frame::{DefaultFrameCrypto, FrameCrypto, OpenedFrame};
pub use keys::{AuthKey, IdentityKeyPair, SessionKey};

// ============================================
// Constants
// ============================================

/// Size of Ed25519 public key in bytes.
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of ChaCha20-Poly1305 key in bytes.
pub const CHACHA20_KEY_SIZE: usize = 32;

/// Size of ChaCha20-Poly1305 nonce in bytes.
pub const CHACHA20_NONCE_SIZE: usize = 12;

/// Size of Poly1305 authentication tag in bytes.
pub const POLY1305_TAG_SIZE: usize = 16;

/// Size of an HMAC-SHA256 digest in bytes.
pub const HMAC_SIZE: usize = 32;

/// HKDF info label for nonce derivation.
pub const IV_INFO_LABEL: &[u8] = b"corelink-frame-iv";

/// HKDF info label for authentication-key derivation.
pub const AUTH_INFO_LABEL: &[u8] = b"corelink-frame-auth";

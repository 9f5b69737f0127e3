// ============================================
// File: crates/corelink-core/src/crypto/kdf.rs
// ============================================
//! # Key Derivation Functions
//!
//! ## Creation Reason
//! Each frame gets its own nonce and its own HMAC key, both derived from
//! the session key and a random 32-bit seed carried in the clear.
//!
//! ## Main Functionality
//! - `derive_iv`: nonce from (key, seed, sequence number, receiver)
//! - `derive_auth_key`: HMAC key from (key, seed, key creation time)
//! - `hkdf_expand`: shared HKDF-SHA256 helper
//!
//! ## ⚠️ Important Note for Next Developer
//! - Both derivations use the seed as HKDF salt; the labels keep them apart
//! - The receiver identity in the IV binds a frame to one direction
//!
//! ## Last Modified
//! v0.1.0 - Initial derivations

use hkdf::Hkdf;
use sha2::Sha256;

use corelink_common::{PeerId, Timestamp};

use super::keys::{AuthKey, SessionKey};
use super::{AUTH_INFO_LABEL, CHACHA20_NONCE_SIZE, HMAC_SIZE, IV_INFO_LABEL};
use crate::error::{CoreError, Result};

// ============================================
// Key Derivation
// ============================================

/// Derives the AEAD nonce for one frame.
///
/// # Errors
/// Only if HKDF refuses the output length, which cannot happen for 12 bytes.
pub fn derive_iv(
    key: &SessionKey,
    iv_seed: u32,
    sequence_number: u32,
    receiver: &PeerId,
) -> Result<[u8; CHACHA20_NONCE_SIZE]> {
    let mut info = Vec::with_capacity(IV_INFO_LABEL.len() + 4 + 32);
    info.extend_from_slice(IV_INFO_LABEL);
    info.extend_from_slice(&sequence_number.to_be_bytes());
    info.extend_from_slice(receiver.as_bytes());

    let mut iv = [0u8; CHACHA20_NONCE_SIZE];
    hkdf_expand(key.as_bytes(), &iv_seed.to_be_bytes(), &info, &mut iv)?;
    Ok(iv)
}

/// Derives the HMAC key for one frame.
///
/// # Errors
/// Only if HKDF refuses the output length.
pub fn derive_auth_key(key: &SessionKey, iv_seed: u32, created: Timestamp) -> Result<AuthKey> {
    let mut info = Vec::with_capacity(AUTH_INFO_LABEL.len() + 8);
    info.extend_from_slice(AUTH_INFO_LABEL);
    info.extend_from_slice(&created.to_be_bytes());

    let mut out = [0u8; HMAC_SIZE];
    hkdf_expand(key.as_bytes(), &iv_seed.to_be_bytes(), &info, &mut out)?;
    Ok(AuthKey::from_bytes(out))
}

/// HKDF-SHA256 extract-and-expand into `output`.
///
/// # Errors
/// `KeyDerivation` if `output` exceeds 255 * 32 bytes.
pub fn hkdf_expand(ikm: &[u8], salt: &[u8], info: &[u8], output: &mut [u8]) -> Result<()> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    hk.expand(info, output).map_err(|_| CoreError::KeyDerivation {
        reason: format!("HKDF expansion failed for {} bytes", output.len()),
    })
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SessionKey {
        SessionKey::from_bytes([0x42u8; 32])
    }

    #[test]
    fn test_derive_iv_deterministic() {
        let peer = PeerId::new([1u8; 32]);
        let a = derive_iv(&key(), 5, 1, &peer).unwrap();
        let b = derive_iv(&key(), 5, 1, &peer).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_iv_depends_on_every_input() {
        let peer = PeerId::new([1u8; 32]);
        let base = derive_iv(&key(), 5, 1, &peer).unwrap();
        assert_ne!(base, derive_iv(&key(), 6, 1, &peer).unwrap());
        assert_ne!(base, derive_iv(&key(), 5, 2, &peer).unwrap());
        assert_ne!(base, derive_iv(&key(), 5, 1, &PeerId::new([2u8; 32])).unwrap());
        let other_key = SessionKey::from_bytes([0x43u8; 32]);
        assert_ne!(base, derive_iv(&other_key, 5, 1, &peer).unwrap());
    }

    #[test]
    fn test_auth_key_depends_on_creation_time() {
        let a = derive_auth_key(&key(), 5, Timestamp::from_micros(1)).unwrap();
        let b = derive_auth_key(&key(), 5, Timestamp::from_micros(2)).unwrap();
        let c = derive_auth_key(&key(), 6, Timestamp::from_micros(1)).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
    }

    #[test]
    fn test_hkdf_expand_rejects_oversized_output() {
        let mut too_long = vec![0u8; 255 * 32 + 1];
        assert!(hkdf_expand(&[0u8; 32], b"salt", b"info", &mut too_long).is_err());
    }
}

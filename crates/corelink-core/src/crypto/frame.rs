// ============================================
// File: crates/corelink-core/src/crypto/frame.rs
// ============================================
//! # Frame Encryption
//!
//! ## Creation Reason
//! Turns an assembled plaintext batch into one encrypted, authenticated
//! frame and back.
//!
//! ## Main Functionality
//! - `FrameCrypto`: Trait for frame seal/open
//! - `DefaultFrameCrypto`: ChaCha20-Poly1305 + HMAC-SHA256 implementation
//!
//! ## Frame Format
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ size | type | iv_seed | seq | bw_in | timestamp  (24)    │ ← AAD, HMAC input
//! ├──────────────────────────────────────────────────────────┤
//! │ hmac (32)                                                │
//! ├──────────────────────────────────────────────────────────┤
//! │ ciphertext || Poly1305 tag (16)                          │ ← HMAC input
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Processing Order
//! Seal: derive nonce → AEAD encrypt → derive auth key → HMAC.
//! Open: derive auth key → verify HMAC → derive nonce → AEAD decrypt.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Replay and age checks live with the neighbour state, not here
//! - Sequence numbers MUST be unique per session key; the nonce relies on it
//!
//! ## Last Modified
//! v0.1.0 - Initial frame crypto implementation

use bytes::{Bytes, BytesMut};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, trace};

use corelink_common::{PeerId, Timestamp};

use super::kdf::{derive_auth_key, derive_iv};
use super::keys::{AuthKey, SessionKey};
use super::POLY1305_TAG_SIZE;
use crate::error::{CoreError, Result};
use crate::protocol::codec::{Codec, ProtocolCodec};
use crate::protocol::messages::{
    EncryptedHeader, ENCRYPTED_HEADER_HMAC_OFFSET, ENCRYPTED_HEADER_SIZE,
    MAX_ENCRYPTED_MESSAGE_SIZE,
};

type HmacSha256 = Hmac<Sha256>;

/// Bytes added to a plaintext batch by sealing.
pub const FRAME_OVERHEAD: usize = ENCRYPTED_HEADER_SIZE + POLY1305_TAG_SIZE;

// ============================================
// OpenedFrame
// ============================================

/// Result of successfully opening a frame.
#[derive(Debug, Clone)]
pub struct OpenedFrame {
    /// Authenticated cleartext header
    pub header: EncryptedHeader,
    /// Decrypted batch of messages
    pub payload: Bytes,
}

// ============================================
// FrameCrypto Trait
// ============================================

/// Frame-level encryption operations.
pub trait FrameCrypto: Send + Sync {
    /// Seals `plaintext` under `key`.
    ///
    /// `header.size` and `header.hmac` are overwritten. `receiver` is the
    /// identity of the neighbour the frame is for.
    ///
    /// # Errors
    /// `MessageTooLarge` if the frame would exceed the wire limit,
    /// `Encryption` if the cipher fails.
    fn seal(
        &self,
        key: &SessionKey,
        created: Timestamp,
        receiver: &PeerId,
        header: EncryptedHeader,
        plaintext: &[u8],
    ) -> Result<Bytes>;

    /// Authenticates and decrypts `frame`.
    ///
    /// `receiver` is our own identity, `created` the creation time of the
    /// sender's key.
    ///
    /// # Errors
    /// `AuthenticationFailed` on HMAC mismatch, `Decryption` on AEAD
    /// failure, protocol errors for truncated or inconsistent frames.
    fn open(
        &self,
        key: &SessionKey,
        created: Timestamp,
        receiver: &PeerId,
        frame: &Bytes,
    ) -> Result<OpenedFrame>;

    /// Bytes added on top of the plaintext.
    fn overhead(&self) -> usize {
        FRAME_OVERHEAD
    }
}

// ============================================
// DefaultFrameCrypto
// ============================================

/// ChaCha20-Poly1305 body encryption with an HMAC-SHA256 outer tag.
#[derive(Debug, Default, Clone)]
pub struct DefaultFrameCrypto;

impl DefaultFrameCrypto {
    /// Creates a new instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn mac(auth_key: &AuthKey, header_prefix: &[u8], ciphertext: &[u8]) -> Result<HmacSha256> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(auth_key.as_bytes())
            .map_err(|_| CoreError::encryption("invalid HMAC key length"))?;
        mac.update(header_prefix);
        mac.update(ciphertext);
        Ok(mac)
    }

    fn cipher(key: &SessionKey) -> Result<ChaCha20Poly1305> {
        ChaCha20Poly1305::new_from_slice(key.as_bytes())
            .map_err(|_| CoreError::encryption("Failed to create cipher"))
    }
}

impl FrameCrypto for DefaultFrameCrypto {
    fn seal(
        &self,
        key: &SessionKey,
        created: Timestamp,
        receiver: &PeerId,
        mut header: EncryptedHeader,
        plaintext: &[u8],
    ) -> Result<Bytes> {
        let total = FRAME_OVERHEAD + plaintext.len();
        if total > MAX_ENCRYPTED_MESSAGE_SIZE {
            debug!(size = total, "Batch too large to seal");
            return Err(CoreError::too_large(MAX_ENCRYPTED_MESSAGE_SIZE, total));
        }
        header.size =
            u16::try_from(total).map_err(|_| CoreError::too_large(usize::from(u16::MAX), total))?;
        header.hmac = [0u8; 32];

        let mut buf = BytesMut::with_capacity(total);
        ProtocolCodec.encode(&header, &mut buf);

        let iv = derive_iv(key, header.iv_seed, header.sequence_number, receiver)?;
        let ciphertext = Self::cipher(key)?
            .encrypt(
                &Nonce::from(iv),
                Payload {
                    msg: plaintext,
                    aad: &buf[..ENCRYPTED_HEADER_HMAC_OFFSET],
                },
            )
            .map_err(|_| CoreError::encryption("ChaCha20-Poly1305 encryption failed"))?;

        let auth_key = derive_auth_key(key, header.iv_seed, created)?;
        let tag = Self::mac(&auth_key, &buf[..ENCRYPTED_HEADER_HMAC_OFFSET], &ciphertext)?
            .finalize()
            .into_bytes();
        buf[ENCRYPTED_HEADER_HMAC_OFFSET..ENCRYPTED_HEADER_SIZE].copy_from_slice(&tag);
        buf.extend_from_slice(&ciphertext);

        trace!(seq = header.sequence_number, size = total, "Frame sealed");
        Ok(buf.freeze())
    }

    fn open(
        &self,
        key: &SessionKey,
        created: Timestamp,
        receiver: &PeerId,
        frame: &Bytes,
    ) -> Result<OpenedFrame> {
        if frame.len() < FRAME_OVERHEAD {
            return Err(CoreError::too_short(FRAME_OVERHEAD, frame.len()));
        }
        let mut cursor = frame.clone();
        let header: EncryptedHeader = ProtocolCodec.decode(&mut cursor)?;
        if usize::from(header.size) != frame.len() {
            return Err(CoreError::malformed(format!(
                "frame declares {} bytes, received {}",
                header.size,
                frame.len()
            )));
        }
        let ciphertext = &frame[ENCRYPTED_HEADER_SIZE..];

        let auth_key = derive_auth_key(key, header.iv_seed, created)?;
        Self::mac(&auth_key, &frame[..ENCRYPTED_HEADER_HMAC_OFFSET], ciphertext)?
            .verify_slice(&header.hmac)
            .map_err(|_| {
                debug!(seq = header.sequence_number, "Frame HMAC mismatch");
                CoreError::AuthenticationFailed
            })?;

        let iv = derive_iv(key, header.iv_seed, header.sequence_number, receiver)?;
        let plaintext = Self::cipher(key)?
            .decrypt(
                &Nonce::from(iv),
                Payload {
                    msg: ciphertext,
                    aad: &frame[..ENCRYPTED_HEADER_HMAC_OFFSET],
                },
            )
            .map_err(|_| {
                debug!(seq = header.sequence_number, "Frame body failed to decrypt");
                CoreError::Decryption
            })?;

        Ok(OpenedFrame {
            header,
            payload: Bytes::from(plaintext),
        })
    }
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

    fn created() -> Timestamp {
        Timestamp::from_micros(1_700_000_000_000_000)
    }

    fn header(seq: u32) -> EncryptedHeader {
        EncryptedHeader::new(0xfeed_f00d, seq, 32 * 1024, Timestamp::now())
    }

    fn seal(plaintext: &[u8]) -> Bytes {
        DefaultFrameCrypto
            .seal(&key(), created(), &PeerId::new([9u8; 32]), header(1), plaintext)
            .unwrap()
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let receiver = PeerId::new([9u8; 32]);
        let frame = seal(b"\x00\x09\x03\xe8hello");
        assert_eq!(frame.len(), FRAME_OVERHEAD + 9);

        let opened = DefaultFrameCrypto.open(&key(), created(), &receiver, &frame).unwrap();
        assert_eq!(&opened.payload[..], b"\x00\x09\x03\xe8hello");
        assert_eq!(opened.header.sequence_number, 1);
        assert_eq!(opened.header.inbound_bw_limit, 32 * 1024);
    }

    #[test]
    fn test_flipped_ciphertext_byte_fails_authentication() {
        let receiver = PeerId::new([9u8; 32]);
        let mut tampered = seal(b"some payload bytes").to_vec();
        tampered[ENCRYPTED_HEADER_SIZE + 3] ^= 0x01;

        let result = DefaultFrameCrypto.open(&key(), created(), &receiver, &Bytes::from(tampered));
        assert!(matches!(result, Err(CoreError::AuthenticationFailed)));
    }

    #[test]
    fn test_tampered_sequence_number_fails_authentication() {
        let receiver = PeerId::new([9u8; 32]);
        let mut tampered = seal(b"abc").to_vec();
        tampered[11] ^= 0x01;

        let result = DefaultFrameCrypto.open(&key(), created(), &receiver, &Bytes::from(tampered));
        assert!(matches!(result, Err(CoreError::AuthenticationFailed)));
    }

    #[test]
    fn test_wrong_key_creation_time_fails_authentication() {
        let receiver = PeerId::new([9u8; 32]);
        let frame = seal(b"abc");
        let result = DefaultFrameCrypto.open(
            &key(),
            Timestamp::from_micros(created().as_micros() + 1),
            &receiver,
            &frame,
        );
        assert!(matches!(result, Err(CoreError::AuthenticationFailed)));
    }

    #[test]
    fn test_wrong_receiver_fails_decryption() {
        let frame = seal(b"abc");
        let result = DefaultFrameCrypto.open(&key(), created(), &PeerId::new([8u8; 32]), &frame);
        assert!(matches!(result, Err(CoreError::Decryption)));
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let frame = seal(b"abcdef");
        let short = frame.slice(..frame.len() - 1);
        let result = DefaultFrameCrypto.open(&key(), created(), &PeerId::new([9u8; 32]), &short);
        assert!(matches!(result, Err(CoreError::MalformedMessage { .. })));

        let tiny = frame.slice(..10);
        let result = DefaultFrameCrypto.open(&key(), created(), &PeerId::new([9u8; 32]), &tiny);
        assert!(matches!(result, Err(CoreError::MessageTooShort { .. })));
    }

    #[test]
    fn test_oversized_plaintext_rejected() {
        let big = vec![0u8; MAX_ENCRYPTED_MESSAGE_SIZE];
        let result =
            DefaultFrameCrypto.seal(&key(), created(), &PeerId::new([9u8; 32]), header(1), &big);
        assert!(matches!(result, Err(CoreError::MessageTooLarge { .. })));
    }

    #[test]
    fn test_distinct_sequence_numbers_distinct_ciphertext() {
        let receiver = PeerId::new([9u8; 32]);
        let a = DefaultFrameCrypto
            .seal(&key(), created(), &receiver, header(1), b"same")
            .unwrap();
        let b = DefaultFrameCrypto
            .seal(&key(), created(), &receiver, header(2), b"same")
            .unwrap();
        assert_ne!(a[ENCRYPTED_HEADER_SIZE..], b[ENCRYPTED_HEADER_SIZE..]);
    }
}

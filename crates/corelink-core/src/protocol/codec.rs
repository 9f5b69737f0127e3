// ============================================
// File: crates/corelink-core/src/protocol/codec.rs
// ============================================
//! # Protocol Codec
//!
//! ## Creation Reason
//! Binary encoding and decoding of the fixed-layout messages, plus the
//! tokenizer that walks a decrypted frame payload message by message.
//!
//! ## Main Functionality
//! - `Codec` trait: Generic encode/decode interface
//! - `ProtocolCodec`: Implementation for the link-layer message types
//! - `split_messages`: Cut a payload into `RawMessage`s
//!
//! ## Wire Format
//! All messages use big-endian byte order for multi-byte integers.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always validate buffer lengths before reading
//! - `decode` consumes exactly one message from the front of the buffer
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use bytes::{Buf, BufMut, Bytes, BytesMut};

use corelink_common::{PeerId, Timestamp};

use crate::crypto::HMAC_SIZE;
use crate::error::{CoreError, Result};
use crate::protocol::messages::{
    EncryptedHeader, MessageHeader, MessageType, PingMessage, PongMessage, RawMessage,
    ENCRYPTED_HEADER_SIZE, MESSAGE_HEADER_SIZE, PING_MESSAGE_SIZE, PONG_MESSAGE_SIZE,
};

// ============================================
// Codec Trait
// ============================================

/// Trait for encoding and decoding protocol messages.
///
/// # Type Parameters
/// * `T` - The message type to encode/decode
pub trait Codec<T> {
    /// Encodes a message into a byte buffer.
    fn encode(&self, msg: &T, buf: &mut BytesMut);

    /// Decodes a message from the front of `buf`.
    ///
    /// # Errors
    /// Returns an error if the buffer is short or carries another type.
    fn decode(&self, buf: &mut Bytes) -> Result<T>;
}

// ============================================
// ProtocolCodec
// ============================================

/// Codec implementation for the link-layer messages.
#[derive(Debug, Default, Clone)]
pub struct ProtocolCodec;

impl ProtocolCodec {
    /// Creates a new protocol codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn expect_header(buf: &mut Bytes, expected: MessageType, min: usize) -> Result<MessageHeader> {
        if buf.len() < min {
            return Err(CoreError::too_short(min, buf.len()));
        }
        let header = MessageHeader::peek(buf)?;
        if header.msg_type != expected.as_u16() {
            return Err(CoreError::UnexpectedMessageType {
                got: header.msg_type,
                expected: expected.as_u16(),
            });
        }
        buf.advance(MESSAGE_HEADER_SIZE);
        Ok(header)
    }

    fn get_peer(buf: &mut Bytes) -> PeerId {
        let mut id = [0u8; 32];
        buf.copy_to_slice(&mut id);
        PeerId::new(id)
    }
}

// ============================================
// MessageHeader Codec
// ============================================

impl Codec<MessageHeader> for ProtocolCodec {
    fn encode(&self, msg: &MessageHeader, buf: &mut BytesMut) {
        buf.put_u16(msg.size);
        buf.put_u16(msg.msg_type);
    }

    fn decode(&self, buf: &mut Bytes) -> Result<MessageHeader> {
        let header = MessageHeader::peek(buf)?;
        buf.advance(MESSAGE_HEADER_SIZE);
        Ok(header)
    }
}

// ============================================
// EncryptedHeader Codec
// ============================================

impl Codec<EncryptedHeader> for ProtocolCodec {
    fn encode(&self, msg: &EncryptedHeader, buf: &mut BytesMut) {
        buf.reserve(ENCRYPTED_HEADER_SIZE);
        buf.put_u16(msg.size);
        buf.put_u16(MessageType::EncryptedMessage.as_u16());
        buf.put_u32(msg.iv_seed);
        buf.put_u32(msg.sequence_number);
        buf.put_u32(msg.inbound_bw_limit);
        buf.put_u64(msg.timestamp.as_micros());
        buf.put_slice(&msg.hmac);
    }

    fn decode(&self, buf: &mut Bytes) -> Result<EncryptedHeader> {
        let header = Self::expect_header(buf, MessageType::EncryptedMessage, ENCRYPTED_HEADER_SIZE)?;
        let iv_seed = buf.get_u32();
        let sequence_number = buf.get_u32();
        let inbound_bw_limit = buf.get_u32();
        let timestamp = Timestamp::from_micros(buf.get_u64());
        let mut hmac = [0u8; HMAC_SIZE];
        buf.copy_to_slice(&mut hmac);

        Ok(EncryptedHeader {
            size: header.size,
            iv_seed,
            sequence_number,
            inbound_bw_limit,
            timestamp,
            hmac,
        })
    }
}

// ============================================
// PingMessage Codec
// ============================================

impl Codec<PingMessage> for ProtocolCodec {
    #[allow(clippy::cast_possible_truncation)]
    fn encode(&self, msg: &PingMessage, buf: &mut BytesMut) {
        buf.reserve(PING_MESSAGE_SIZE);
        buf.put_u16(PING_MESSAGE_SIZE as u16);
        buf.put_u16(MessageType::Ping.as_u16());
        buf.put_u32(msg.iv_seed);
        buf.put_u32(msg.challenge);
        buf.put_slice(msg.target.as_bytes());
    }

    fn decode(&self, buf: &mut Bytes) -> Result<PingMessage> {
        let header = Self::expect_header(buf, MessageType::Ping, PING_MESSAGE_SIZE)?;
        if usize::from(header.size) != PING_MESSAGE_SIZE {
            return Err(CoreError::malformed(format!("PING of size {}", header.size)));
        }
        let iv_seed = buf.get_u32();
        let challenge = buf.get_u32();
        let target = Self::get_peer(buf);
        Ok(PingMessage {
            iv_seed,
            challenge,
            target,
        })
    }
}

// ============================================
// PongMessage Codec
// ============================================

impl Codec<PongMessage> for ProtocolCodec {
    #[allow(clippy::cast_possible_truncation)]
    fn encode(&self, msg: &PongMessage, buf: &mut BytesMut) {
        buf.reserve(PONG_MESSAGE_SIZE);
        buf.put_u16(PONG_MESSAGE_SIZE as u16);
        buf.put_u16(MessageType::Pong.as_u16());
        buf.put_u32(msg.iv_seed);
        buf.put_u32(msg.challenge);
        buf.put_u32(msg.inbound_bw_limit);
        buf.put_slice(msg.target.as_bytes());
    }

    fn decode(&self, buf: &mut Bytes) -> Result<PongMessage> {
        let header = Self::expect_header(buf, MessageType::Pong, PONG_MESSAGE_SIZE)?;
        if usize::from(header.size) != PONG_MESSAGE_SIZE {
            return Err(CoreError::malformed(format!("PONG of size {}", header.size)));
        }
        let iv_seed = buf.get_u32();
        let challenge = buf.get_u32();
        let inbound_bw_limit = buf.get_u32();
        let target = Self::get_peer(buf);
        Ok(PongMessage {
            iv_seed,
            challenge,
            inbound_bw_limit,
            target,
        })
    }
}

// ============================================
// Tokenizer
// ============================================

/// Splits a decrypted frame payload into its messages.
///
/// # Errors
/// `MalformedMessage` / `MessageTooShort` if any header is broken or
/// declares more bytes than remain. Nothing is returned in that case so
/// a corrupt payload is never partially delivered.
pub fn split_messages(payload: &Bytes) -> Result<Vec<RawMessage>> {
    let mut messages = Vec::new();
    let mut offset = 0;
    while offset < payload.len() {
        let header = MessageHeader::peek(&payload[offset..])?;
        let size = usize::from(header.size);
        let remaining = payload.len() - offset;
        if size > remaining {
            return Err(CoreError::malformed(format!(
                "message of size {size} exceeds remaining {remaining} bytes"
            )));
        }
        messages.push(RawMessage {
            header,
            bytes: payload.slice(offset..offset + size),
        });
        offset += size;
    }
    Ok(messages)
}

// ============================================
// Convenience Functions
// ============================================

/// Encodes a PING to bytes.
#[must_use]
pub fn encode_ping(msg: &PingMessage) -> Bytes {
    let mut buf = BytesMut::with_capacity(PING_MESSAGE_SIZE);
    ProtocolCodec.encode(msg, &mut buf);
    buf.freeze()
}

/// Decodes a PING from bytes.
///
/// # Errors
/// See [`Codec::decode`].
pub fn decode_ping(buf: &[u8]) -> Result<PingMessage> {
    let mut bytes = Bytes::copy_from_slice(buf);
    ProtocolCodec.decode(&mut bytes)
}

/// Encodes a PONG to bytes.
#[must_use]
pub fn encode_pong(msg: &PongMessage) -> Bytes {
    let mut buf = BytesMut::with_capacity(PONG_MESSAGE_SIZE);
    ProtocolCodec.encode(msg, &mut buf);
    buf.freeze()
}

/// Decodes a PONG from bytes.
///
/// # Errors
/// See [`Codec::decode`].
pub fn decode_pong(buf: &[u8]) -> Result<PongMessage> {
    let mut bytes = Bytes::copy_from_slice(buf);
    ProtocolCodec.decode(&mut bytes)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn app_message(msg_type: u16, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&u16::try_from(body.len() + 4).unwrap().to_be_bytes());
        out.extend_from_slice(&msg_type.to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_encrypted_header_layout() {
        let mut header = EncryptedHeader::new(
            0x0102_0304,
            7,
            32 * 1024,
            Timestamp::from_micros(0x1122_3344_5566_7788),
        );
        header.size = 100;
        header.hmac = [0xaa; HMAC_SIZE];

        let mut buf = BytesMut::new();
        ProtocolCodec.encode(&header, &mut buf);
        assert_eq!(buf.len(), ENCRYPTED_HEADER_SIZE);
        assert_eq!(&buf[0..4], &[0, 100, 0, 82]);
        assert_eq!(&buf[4..8], &[1, 2, 3, 4]);
        assert_eq!(&buf[8..12], &[0, 0, 0, 7]);
        assert_eq!(&buf[16..24], &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]);

        let mut bytes = buf.freeze();
        let decoded: EncryptedHeader = ProtocolCodec.decode(&mut bytes).unwrap();
        assert_eq!(decoded, header);
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_ping_encoding() {
        let ping = PingMessage {
            iv_seed: 9,
            challenge: 0xdead_beef,
            target: PeerId::new([3u8; 32]),
        };
        let bytes = encode_ping(&ping);
        assert_eq!(bytes.len(), PING_MESSAGE_SIZE);
        assert_eq!(&bytes[0..4], &[0, 44, 0, 83]);
        assert_eq!(decode_ping(&bytes).unwrap(), ping);
    }

    #[test]
    fn test_pong_rejected_as_ping() {
        let pong = PongMessage {
            iv_seed: 1,
            challenge: 2,
            inbound_bw_limit: 3,
            target: PeerId::new([4u8; 32]),
        };
        let bytes = encode_pong(&pong);
        assert_eq!(bytes.len(), PONG_MESSAGE_SIZE);
        assert!(matches!(
            decode_ping(&bytes),
            Err(CoreError::UnexpectedMessageType { got: 84, expected: 83 })
        ));
        assert_eq!(decode_pong(&bytes).unwrap(), pong);
    }

    #[test]
    fn test_split_messages_preserves_order() {
        let mut payload = app_message(1000, b"first");
        payload.extend(app_message(1001, b""));
        payload.extend(app_message(1002, b"third!"));
        let payload = Bytes::from(payload);

        let msgs = split_messages(&payload).unwrap();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].header.msg_type, 1000);
        assert_eq!(&msgs[0].bytes[4..], b"first");
        assert_eq!(msgs[1].header.size, 4);
        assert_eq!(msgs[2].header_bytes().len(), 4);
    }

    #[test]
    fn test_split_messages_rejects_overrun() {
        let mut payload = app_message(1000, b"ok");
        payload.extend_from_slice(&[0, 50, 0, 1, 0]);
        assert!(split_messages(&Bytes::from(payload)).is_err());
    }

    #[test]
    fn test_split_messages_empty() {
        assert!(split_messages(&Bytes::new()).unwrap().is_empty());
    }
}

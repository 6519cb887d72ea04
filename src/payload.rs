//! Payload serialization.
//!
//! Frame payloads are opaque to the framing layer. [`PayloadCodec`] turns
//! typed application messages into payload bytes and back. The default
//! [`BincodeCodec`] uses `bincode` with big-endian fixed-width integers, so
//! an [`Envelope`](crate::envelope::Envelope) lays out as
//! `handlerId:u32 | senderId:string | protocolVersion:string | sequence:u32 |
//! innerPayload:bytes` with `u64` length prefixes for strings and bytes.
//!
//! Decoding never panics: truncated input, schema mismatches and trailing
//! bytes all surface as [`PayloadError`], whose recovery policy is to drop
//! the single offending frame.

use bincode::{
    Decode,
    Encode,
    config::{self, Config},
    error::{DecodeError, EncodeError},
};
use thiserror::Error;

use crate::codec::RecoveryPolicy;

/// Upper bound on allocations performed while decoding one payload.
pub const DECODE_LIMIT: usize = 16 * 1024 * 1024;

/// Application message that can travel inside a frame payload.
///
/// Implemented automatically for every type deriving `bincode::Encode` and
/// `bincode::Decode`.
pub trait Message: Encode + Decode<()> {}

impl<T> Message for T where T: Encode + Decode<()> {}

/// Errors raised while encoding or decoding a payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The value could not be encoded.
    #[error("failed to encode payload: {0}")]
    Encode(#[from] EncodeError),
    /// The bytes are truncated or do not match the expected schema.
    #[error("failed to decode payload: {0}")]
    Decode(#[from] DecodeError),
    /// Decoding succeeded but left unread bytes behind.
    #[error("payload has {trailing} trailing bytes after a {consumed}-byte message")]
    TrailingBytes {
        /// Bytes consumed by the decoded message.
        consumed: usize,
        /// Bytes left over.
        trailing: usize,
    },
}

impl PayloadError {
    /// Payload errors are isolated to one frame; the connection stays open.
    #[must_use]
    pub fn recovery_policy(&self) -> RecoveryPolicy { RecoveryPolicy::Drop }
}

/// Pluggable payload serializer.
///
/// # Object Safety
///
/// Like the message traits it is built on, this trait is generic over the
/// message type and therefore not object-safe. Use a concrete codec type in
/// API bounds.
pub trait PayloadCodec: Send + Sync + 'static {
    /// Serialize `value` into payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Encode`] if the value cannot be encoded.
    fn serialize<M: Message>(&self, value: &M) -> Result<Vec<u8>, PayloadError>;

    /// Deserialize a message that must occupy all of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] on truncated, mismatched or over-long input.
    fn deserialize<M: Message>(&self, bytes: &[u8]) -> Result<M, PayloadError>;
}

/// `bincode` codec with big-endian fixed-width integers.
///
/// # Examples
///
/// ```
/// use tickwire::payload::{BincodeCodec, PayloadCodec};
///
/// let codec = BincodeCodec;
/// let bytes = codec.serialize(&(7_u32, String::from("hi"))).expect("encode");
/// let value: (u32, String) = codec.deserialize(&bytes).expect("decode");
/// assert_eq!(value, (7, String::from("hi")));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    fn config() -> impl Config {
        config::standard()
            .with_big_endian()
            .with_fixed_int_encoding()
            .with_limit::<DECODE_LIMIT>()
    }
}

impl PayloadCodec for BincodeCodec {
    fn serialize<M: Message>(&self, value: &M) -> Result<Vec<u8>, PayloadError> {
        Ok(bincode::encode_to_vec(value, Self::config())?)
    }

    fn deserialize<M: Message>(&self, bytes: &[u8]) -> Result<M, PayloadError> {
        let (message, consumed) = bincode::decode_from_slice(bytes, Self::config())?;
        if consumed != bytes.len() {
            return Err(PayloadError::TrailingBytes {
                consumed,
                trailing: bytes.len() - consumed,
            });
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[derive(Debug, PartialEq, bincode::Encode, bincode::Decode)]
    struct Sample {
        id: u32,
        name: String,
        data: Vec<u8>,
    }

    fn sample() -> Sample {
        Sample {
            id: 0x0102_0304,
            name: "abc".into(),
            data: vec![9, 8],
        }
    }

    #[test]
    fn integers_are_big_endian_fixed_width() {
        let bytes = BincodeCodec.serialize(&sample()).expect("encode");
        assert_eq!(&bytes[..4], &[1, 2, 3, 4]);
        assert_eq!(&bytes[4..12], &3_u64.to_be_bytes());
        assert_eq!(&bytes[12..15], b"abc");
    }

    #[test]
    fn round_trips_structs() {
        let bytes = BincodeCodec.serialize(&sample()).expect("encode");
        let decoded: Sample = BincodeCodec.deserialize(&bytes).expect("decode");
        assert_eq!(decoded, sample());
    }

    #[rstest]
    #[case::empty(0)]
    #[case::mid_string(10)]
    #[case::missing_last_byte(1)]
    fn truncated_input_is_a_decode_error(#[case] cut_from_end: usize) {
        let bytes = BincodeCodec.serialize(&sample()).expect("encode");
        let truncated = if cut_from_end == 0 {
            &bytes[..0]
        } else {
            &bytes[..bytes.len() - cut_from_end]
        };
        let err = BincodeCodec
            .deserialize::<Sample>(truncated)
            .expect_err("truncated input");
        assert!(matches!(err, PayloadError::Decode(_)));
        assert_eq!(err.recovery_policy(), RecoveryPolicy::Drop);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = BincodeCodec.serialize(&7_u32).expect("encode");
        bytes.push(0);
        let err = BincodeCodec.deserialize::<u32>(&bytes).expect_err("trailing");
        assert!(matches!(
            err,
            PayloadError::TrailingBytes {
                consumed: 4,
                trailing: 1
            }
        ));
    }

    #[test]
    fn absurd_length_prefix_does_not_allocate() {
        let mut bytes = vec![0, 0, 0, 1];
        bytes.extend_from_slice(&u64::MAX.to_be_bytes());
        let err = BincodeCodec.deserialize::<Sample>(&bytes).expect_err("limit");
        assert!(matches!(err, PayloadError::Decode(_)));
    }
}

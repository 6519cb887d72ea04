//! Request envelopes and server responses.
//!
//! Outgoing `Normal` frames carry an [`Envelope`] wrapping a serialized
//! inner message with routing metadata. The server answers with a
//! [`Response`] carrying the same handler id and a status code.

use std::fmt;

use thiserror::Error;

/// Routing wrapper carried inside outgoing `Normal` frames.
///
/// `sequence` is reserved: no peer currently assigns or checks it, so the
/// client always sends zero and does not infer ordering from it.
#[derive(bincode::Decode, bincode::Encode, Clone, PartialEq, Eq)]
pub struct Envelope {
    handler_id: u32,
    sender_id: String,
    protocol_version: String,
    sequence: u32,
    payload: Vec<u8>,
}

impl Envelope {
    /// Create an envelope with an unset sequence number.
    #[must_use]
    pub fn new(
        handler_id: u32,
        sender_id: impl Into<String>,
        protocol_version: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            handler_id,
            sender_id: sender_id.into(),
            protocol_version: protocol_version.into(),
            sequence: 0,
            payload,
        }
    }

    /// Server handler the request is addressed to.
    #[must_use]
    pub const fn handler_id(&self) -> u32 { self.handler_id }

    /// Device identity of the sender.
    #[must_use]
    pub fn sender_id(&self) -> &str { &self.sender_id }

    /// Protocol revision the sender speaks.
    #[must_use]
    pub fn protocol_version(&self) -> &str { &self.protocol_version }

    /// Reserved; always zero.
    #[must_use]
    pub const fn sequence(&self) -> u32 { self.sequence }

    /// Serialized inner message.
    #[must_use]
    pub fn payload(&self) -> &[u8] { &self.payload }

    /// Consume the envelope and return the inner message bytes.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> { self.payload }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("handler_id", &self.handler_id)
            .field("sender_id", &self.sender_id)
            .field("protocol_version", &self.protocol_version)
            .field("sequence", &self.sequence)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Server answer to an enveloped request.
///
/// A `response_code` of zero means success; anything else is an
/// application-defined failure passed through to the caller.
#[derive(bincode::Decode, bincode::Encode, Clone, Debug, PartialEq, Eq)]
pub struct Response {
    handler_id: u32,
    response_code: u32,
    timestamp: u64,
    data: Vec<u8>,
}

/// A [`Response`] with a nonzero status code.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("handler {handler_id} failed with response code {code}")]
pub struct ResponseFailure {
    /// Handler the failed request was addressed to.
    pub handler_id: u32,
    /// Application-defined failure code.
    pub code: u32,
}

impl Response {
    /// Construct a response.
    #[must_use]
    pub fn new(handler_id: u32, response_code: u32, timestamp: u64, data: Vec<u8>) -> Self {
        Self {
            handler_id,
            response_code,
            timestamp,
            data,
        }
    }

    /// Handler that produced the response.
    #[must_use]
    pub const fn handler_id(&self) -> u32 { self.handler_id }

    /// Zero on success, otherwise an application-defined failure code.
    #[must_use]
    pub const fn response_code(&self) -> u32 { self.response_code }

    /// Server timestamp in milliseconds.
    #[must_use]
    pub const fn timestamp(&self) -> u64 { self.timestamp }

    /// Serialized response body.
    #[must_use]
    pub fn data(&self) -> &[u8] { &self.data }

    /// Whether `response_code` is zero.
    #[must_use]
    pub const fn is_success(&self) -> bool { self.response_code == 0 }

    /// Convert a nonzero response code into an error.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseFailure`] when `response_code != 0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tickwire::envelope::Response;
    ///
    /// assert!(Response::new(1, 0, 0, vec![]).into_result().is_ok());
    /// let failure = Response::new(1, 7, 0, vec![]).into_result().unwrap_err();
    /// assert_eq!(failure.code, 7);
    /// ```
    pub fn into_result(self) -> Result<Self, ResponseFailure> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ResponseFailure {
                handler_id: self.handler_id,
                code: self.response_code,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{BincodeCodec, PayloadCodec};

    #[test]
    fn envelope_layout_matches_wire_schema() {
        let envelope = Envelope::new(2, "dev", "1.0.0", vec![0xAB]);
        let bytes = BincodeCodec.serialize(&envelope).expect("encode");

        let mut expected = Vec::new();
        expected.extend_from_slice(&2_u32.to_be_bytes());
        expected.extend_from_slice(&3_u64.to_be_bytes());
        expected.extend_from_slice(b"dev");
        expected.extend_from_slice(&5_u64.to_be_bytes());
        expected.extend_from_slice(b"1.0.0");
        expected.extend_from_slice(&0_u32.to_be_bytes());
        expected.extend_from_slice(&1_u64.to_be_bytes());
        expected.push(0xAB);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn envelope_sequence_is_always_zero() {
        let envelope = Envelope::new(9, "a", "b", Vec::new());
        assert_eq!(envelope.sequence(), 0);
    }

    #[test]
    fn response_round_trips() {
        let response = Response::new(0, 0, 1_700_000_000_000, b"{}".to_vec());
        let bytes = BincodeCodec.serialize(&response).expect("encode");
        let decoded: Response = BincodeCodec.deserialize(&bytes).expect("decode");
        assert_eq!(decoded, response);
        assert!(decoded.is_success());
    }

    #[test]
    fn failure_code_becomes_error() {
        let failure = Response::new(4, 31, 0, Vec::new())
            .into_result()
            .expect_err("nonzero code");
        assert_eq!(
            failure,
            ResponseFailure {
                handler_id: 4,
                code: 31
            }
        );
    }
}

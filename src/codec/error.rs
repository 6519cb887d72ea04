//! Error types for the framing layer.
//!
//! [`FramingError`] covers problems with the frame header itself,
//! [`EofError`] describes a stream that stopped inside a header or a
//! payload, and [`CodecError`] wraps both together with transport I/O
//! failures.
//!
//! Every error maps to a [`RecoveryPolicy`]. Framing faults mean the byte
//! stream can no longer be trusted, so they always disconnect; the session
//! then establishes a fresh connection.

use std::io;

use thiserror::Error;

/// How the session reacts to a codec failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryPolicy {
    /// Discard the offending frame and keep the connection open.
    Drop,
    /// Close the connection; the stream is assumed corrupted.
    Disconnect,
}

/// Errors in the wire-level frame structure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// The length prefix is smaller than the frame header, or a frame was
    /// shorter than its header.
    #[error("malformed frame: declared length {declared} is below the 5-byte header")]
    MalformedFrame {
        /// Length read from the prefix (0 if the prefix was incomplete).
        declared: u32,
    },

    /// The length prefix exceeds the configured maximum.
    #[error("frame exceeds max length: {size} > {max}")]
    OversizedFrame {
        /// Total frame size indicated by the length prefix.
        size: usize,
        /// Maximum accepted frame size.
        max: usize,
    },
}

/// End-of-stream conditions.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// The peer closed the stream inside a frame header.
    #[error("premature EOF during header: {bytes_received} of {header_size} header bytes")]
    MidHeader {
        /// Header bytes received before EOF.
        bytes_received: usize,
        /// Expected header size.
        header_size: usize,
    },

    /// The peer closed the stream inside a frame payload.
    #[error("premature EOF: {bytes_received} bytes of {expected} byte frame received")]
    MidFrame {
        /// Bytes of the frame received before EOF.
        bytes_received: usize,
        /// Total length declared by the frame header.
        expected: usize,
    },
}

/// Top-level error for reading and writing frames.
///
/// # Examples
///
/// ```
/// use tickwire::codec::{CodecError, FramingError, RecoveryPolicy};
///
/// let err = CodecError::Framing(FramingError::MalformedFrame { declared: 0 });
/// assert_eq!(err.recovery_policy(), RecoveryPolicy::Disconnect);
/// assert!(err.is_malformed());
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame structure error.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Transport I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// End-of-stream handling.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),
}

impl CodecError {
    /// Recovery policy for this error.
    ///
    /// Every codec error disconnects: a bad header leaves no reliable frame
    /// boundary to resume from, and I/O or EOF errors end the stream anyway.
    /// Per-frame `Drop` recovery applies to payload decoding, see
    /// [`PayloadError`](crate::payload::PayloadError).
    #[must_use]
    pub fn recovery_policy(&self) -> RecoveryPolicy { RecoveryPolicy::Disconnect }

    /// Returns true if the error came from an invalid frame header.
    #[must_use]
    pub fn is_malformed(&self) -> bool { matches!(self, Self::Framing(_)) }

    /// Short category label for logs and metrics.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::Io(_) => "io",
            Self::Eof(_) => "eof",
        }
    }

    /// Recover a `CodecError` that travelled through an [`io::Error`].
    ///
    /// `tokio_util` decoders must return `io::Error`; this undoes the
    /// conversion performed by `From<CodecError> for io::Error`.
    #[must_use]
    pub fn from_io(err: io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<FramingError>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(framing) = inner.downcast::<FramingError>() {
                    return Self::Framing(*framing);
                }
            }
            return Self::Io(io::Error::from(io::ErrorKind::InvalidData));
        }
        if err.get_ref().is_some_and(|inner| inner.is::<EofError>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(eof) = inner.downcast::<EofError>() {
                    return Self::Eof(*eof);
                }
            }
            return Self::Io(io::Error::from(io::ErrorKind::UnexpectedEof));
        }
        Self::Io(err)
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            CodecError::Framing(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Eof(e) => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::malformed(CodecError::Framing(FramingError::MalformedFrame { declared: 1 }), "framing")]
    #[case::oversized(
        CodecError::Framing(FramingError::OversizedFrame { size: 9, max: 8 }),
        "framing"
    )]
    #[case::eof(
        CodecError::Eof(EofError::MidHeader { bytes_received: 2, header_size: 5 }),
        "eof"
    )]
    #[case::io(CodecError::Io(io::Error::other("reset")), "io")]
    fn every_codec_error_disconnects(#[case] err: CodecError, #[case] label: &str) {
        assert_eq!(err.recovery_policy(), RecoveryPolicy::Disconnect);
        assert_eq!(err.error_type(), label);
    }

    #[test]
    fn framing_error_survives_io_round_trip() {
        let original = FramingError::MalformedFrame { declared: 0 };
        let io_err: io::Error = CodecError::Framing(original.clone()).into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);

        match CodecError::from_io(io_err) {
            CodecError::Framing(recovered) => assert_eq!(recovered, original),
            other => panic!("expected framing error, got {other:?}"),
        }
    }

    #[test]
    fn eof_error_survives_io_round_trip() {
        let original = EofError::MidFrame {
            bytes_received: 3,
            expected: 10,
        };
        let io_err: io::Error = CodecError::Eof(original).into();
        assert_eq!(io_err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(matches!(
            CodecError::from_io(io_err),
            CodecError::Eof(EofError::MidFrame { expected: 10, .. })
        ));
    }

    #[test]
    fn plain_io_error_stays_io() {
        let err = CodecError::from_io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(matches!(err, CodecError::Io(ref e) if e.kind() == io::ErrorKind::ConnectionReset));
    }
}

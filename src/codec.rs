//! Stream reassembly for the length-prefixed frame format.
//!
//! TCP delivers a byte stream, not frames: a single read may contain a
//! partial header, exactly one frame, or several frames back to back.
//! [`FrameCodec`] implements `tokio_util`'s [`Decoder`] and [`Encoder`] for
//! the [`Frame`] format so it can drive `FramedRead`/`FramedWrite` on a
//! socket. [`Reassembler`] wraps the same decoder behind a push-style
//! [`feed`](Reassembler::feed) API for callers that manage their own reads.
//!
//! The receive buffer is a [`BytesMut`], so appending and consuming from the
//! front are both amortised O(1).
//!
//! # Error Handling
//!
//! A length prefix below [`HEADER_LENGTH`] is a protocol violation reported
//! as [`FramingError::MalformedFrame`]. The decoder never yields an empty
//! frame for such input, so a caller looping on `decode` always terminates.
//! See the [`error`] module for the full taxonomy.

use std::io;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{self, Frame, HEADER_LENGTH, LENGTH_PREFIX_SIZE};

pub mod error;

pub use error::{CodecError, EofError, FramingError, RecoveryPolicy};

/// Most buffer space reserved ahead of bytes that have not arrived yet.
///
/// The length prefix is untrusted, so a large declared frame grows the
/// buffer only as its bytes are received.
pub const MAX_RESERVE_AHEAD: usize = 64 * 1024;

/// Decoder and encoder for [`Frame`]s.
///
/// No maximum frame size is enforced unless one is configured with
/// [`FrameCodec::with_max_frame_length`].
///
/// # Examples
///
/// ```
/// use bytes::BytesMut;
/// use tickwire::{
///     codec::FrameCodec,
///     frame::{Frame, PacketType},
/// };
/// use tokio_util::codec::{Decoder, Encoder};
///
/// let mut codec = FrameCodec::new();
/// let mut wire = BytesMut::new();
/// codec
///     .encode(Frame::new(PacketType::Normal, vec![1, 2, 3]), &mut wire)
///     .expect("encode");
/// let frame = codec.decode(&mut wire).expect("decode").expect("complete frame");
/// assert_eq!(&frame.payload()[..], &[1, 2, 3]);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameCodec {
    max_frame_length: Option<usize>,
}

impl FrameCodec {
    /// Create a codec without a frame size limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_frame_length: None,
        }
    }

    /// Create a codec rejecting frames whose total length exceeds `max`.
    ///
    /// The limit is raised to at least [`HEADER_LENGTH`].
    #[must_use]
    pub fn with_max_frame_length(max: usize) -> Self {
        Self {
            max_frame_length: Some(max.max(HEADER_LENGTH)),
        }
    }

    /// Configured maximum total frame length, if any.
    #[must_use]
    pub const fn max_frame_length(&self) -> Option<usize> { self.max_frame_length }

    pub(crate) fn check_size(&self, size: usize) -> Result<(), FramingError> {
        match self.max_frame_length {
            Some(max) if size > max => Err(FramingError::OversizedFrame { size, max }),
            _ => Ok(()),
        }
    }

    fn decode_frame(&self, src: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
        let Some(declared) = frame::read_length_prefix(src) else {
            return Ok(None);
        };
        let total = declared as usize;
        if total < HEADER_LENGTH {
            return Err(FramingError::MalformedFrame { declared }.into());
        }
        self.check_size(total)?;
        if src.len() < total {
            src.reserve((total - src.len()).min(MAX_RESERVE_AHEAD));
            return Ok(None);
        }
        let bytes = src.split_to(total).freeze();
        Ok(Some(frame::decode_bytes(bytes)?))
    }
}

/// Build the EOF error for bytes left over when the stream ended.
fn build_eof_error(src: &BytesMut) -> CodecError {
    let bytes_received = src.len();
    match frame::read_length_prefix(src) {
        Some(declared) if bytes_received >= HEADER_LENGTH => EofError::MidFrame {
            bytes_received,
            expected: declared as usize,
        },
        _ => EofError::MidHeader {
            bytes_received,
            header_size: HEADER_LENGTH,
        },
    }
    .into()
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.decode_frame(src).map_err(io::Error::from)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        match self.decode_frame(src) {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => {
                let err = build_eof_error(src);
                tracing::debug!(
                    buffered = src.len(),
                    prefix_size = LENGTH_PREFIX_SIZE,
                    "stream ended inside a frame"
                );
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.check_size(item.total_length())
            .and_then(|()| item.encode_into(dst))
            .map_err(|err| CodecError::Framing(err).into())
    }
}

/// Accumulates raw socket bytes and yields complete frames.
///
/// # Examples
///
/// ```
/// use tickwire::{
///     codec::Reassembler,
///     frame::{PacketType, encode},
/// };
///
/// let wire = encode(PacketType::Location, &[1, 2, 3]).expect("encode");
/// let mut reassembler = Reassembler::new();
///
/// assert!(reassembler.feed(&wire[..4]).expect("partial header").is_empty());
/// let frames = reassembler.feed(&wire[4..]).expect("rest of frame");
/// assert_eq!(frames.len(), 1);
/// assert_eq!(reassembler.buffered(), 0);
/// ```
#[derive(Debug, Default)]
pub struct Reassembler {
    codec: FrameCodec,
    buffer: BytesMut,
}

impl Reassembler {
    /// Create a reassembler without a frame size limit.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create a reassembler using `codec` for frame extraction.
    #[must_use]
    pub fn with_codec(codec: FrameCodec) -> Self {
        Self {
            codec,
            buffer: BytesMut::new(),
        }
    }

    /// Append `bytes` and return every frame now complete, in arrival order.
    ///
    /// A single call may yield zero, one or many frames. Incomplete trailing
    /// data stays buffered for the next call.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Framing`] when a length prefix is malformed or
    /// oversized. The buffer is cleared because no frame boundary can be
    /// trusted after that point; the connection should be closed.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Frame>, CodecError> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();
        loop {
            match self.codec.decode_frame(&mut self.buffer) {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => return Ok(frames),
                Err(err) => {
                    self.buffer.clear();
                    return Err(err);
                }
            }
        }
    }

    /// Number of bytes received but not yet consumed into frames.
    #[must_use]
    pub fn buffered(&self) -> usize { self.buffer.len() }

    /// Discard any buffered partial frame.
    pub fn reset(&mut self) { self.buffer.clear(); }
}

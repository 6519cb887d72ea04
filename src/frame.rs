//! Wire-level frame header and packet types.
//!
//! Every unit on the wire is a [`Frame`]: a 4-byte big-endian total length,
//! a 1-byte packet type and an opaque payload. The total length counts the
//! header itself, so an empty payload produces a length of
//! [`HEADER_LENGTH`]. Higher-level payload schemas are opaque at this layer.
//!
//! ```text
//! Frame := totalLength:u32 | packetType:u8 | payload:bytes[totalLength-5]
//! ```

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::FramingError;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of the full frame header (length prefix plus packet type).
pub const HEADER_LENGTH: usize = LENGTH_PREFIX_SIZE + 1;

/// Packet type tag carried in every frame header.
///
/// The assignments must match the peer. Unrecognised tags are preserved in
/// [`PacketType::Other`] so routing can decide what to do with them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PacketType {
    /// Heartbeat ping, echoed by the server as a pong.
    Ping,
    /// Request/response traffic carrying an envelope or response.
    Normal,
    /// Game start notification.
    GameStart,
    /// Location broadcast from the server.
    Location,
    /// Any other tag.
    Other(u8),
}

impl PacketType {
    /// Return the on-wire tag.
    ///
    /// # Examples
    ///
    /// ```
    /// use tickwire::frame::PacketType;
    ///
    /// assert_eq!(PacketType::Location.as_u8(), 3);
    /// assert_eq!(PacketType::from(3), PacketType::Location);
    /// ```
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Ping => 0,
            Self::Normal => 1,
            Self::GameStart => 2,
            Self::Location => 3,
            Self::Other(tag) => tag,
        }
    }

    /// Whether this packet type is handled by the session itself rather than
    /// routed to application callbacks.
    #[must_use]
    pub const fn is_control(self) -> bool { matches!(self, Self::Ping) }
}

impl From<u8> for PacketType {
    fn from(tag: u8) -> Self {
        match tag {
            0 => Self::Ping,
            1 => Self::Normal,
            2 => Self::GameStart,
            3 => Self::Location,
            other => Self::Other(other),
        }
    }
}

impl From<PacketType> for u8 {
    fn from(value: PacketType) -> Self { value.as_u8() }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ping => f.write_str("ping"),
            Self::Normal => f.write_str("normal"),
            Self::GameStart => f.write_str("game-start"),
            Self::Location => f.write_str("location"),
            Self::Other(tag) => write!(f, "other({tag})"),
        }
    }
}

/// A single decoded frame.
///
/// Frames are immutable once constructed: the payload is a cheaply
/// clonable [`Bytes`] handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    packet_type: PacketType,
    payload: Bytes,
}

impl Frame {
    /// Construct a frame from its parts.
    #[must_use]
    pub fn new(packet_type: PacketType, payload: impl Into<Bytes>) -> Self {
        Self {
            packet_type,
            payload: payload.into(),
        }
    }

    /// Packet type tag of this frame.
    #[must_use]
    pub const fn packet_type(&self) -> PacketType { self.packet_type }

    /// Payload bytes of this frame.
    #[must_use]
    pub fn payload(&self) -> &Bytes { &self.payload }

    /// Consume the frame and return the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes { self.payload }

    /// Value written to the length prefix: header plus payload.
    #[must_use]
    pub fn total_length(&self) -> usize { HEADER_LENGTH + self.payload.len() }

    /// Append the encoded frame to `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::OversizedFrame`] when the total length does
    /// not fit the 32-bit length prefix.
    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<(), FramingError> {
        let total = self.total_length();
        let prefix = u32::try_from(total).map_err(|_| FramingError::OversizedFrame {
            size: total,
            max: u32::MAX as usize,
        })?;
        dst.reserve(total);
        dst.put_u32(prefix);
        dst.put_u8(self.packet_type.as_u8());
        dst.extend_from_slice(&self.payload);
        Ok(())
    }
}

/// Encode a packet type and payload into a complete frame.
///
/// # Errors
///
/// Returns [`FramingError::OversizedFrame`] if the payload is too large for
/// the 32-bit length prefix.
///
/// # Examples
///
/// ```
/// use tickwire::frame::{PacketType, encode};
///
/// let bytes = encode(PacketType::Normal, b"hi").expect("small payload");
/// assert_eq!(&bytes[..], &[0, 0, 0, 7, 1, b'h', b'i']);
/// ```
pub fn encode(packet_type: PacketType, payload: &[u8]) -> Result<Bytes, FramingError> {
    let mut dst = BytesMut::with_capacity(HEADER_LENGTH + payload.len());
    Frame::new(packet_type, Bytes::copy_from_slice(payload)).encode_into(&mut dst)?;
    Ok(dst.freeze())
}

/// Decode a complete frame produced by [`encode`].
///
/// `bytes` must hold exactly one frame. Only the header is validated here;
/// the declared length is trusted to match the slice, which is what the
/// reassembler guarantees before calling this function.
///
/// # Errors
///
/// Returns [`FramingError::MalformedFrame`] when fewer than
/// [`HEADER_LENGTH`] bytes are supplied.
///
/// # Examples
///
/// ```
/// use tickwire::frame::{PacketType, decode, encode};
///
/// let bytes = encode(PacketType::Location, &[9, 9]).expect("encode");
/// let frame = decode(&bytes).expect("decode");
/// assert_eq!(frame.packet_type(), PacketType::Location);
/// assert_eq!(&frame.payload()[..], &[9, 9]);
/// ```
pub fn decode(bytes: &[u8]) -> Result<Frame, FramingError> {
    decode_bytes(Bytes::copy_from_slice(bytes))
}

/// Zero-copy variant of [`decode`] for frames already split out of a
/// receive buffer.
///
/// # Errors
///
/// Returns [`FramingError::MalformedFrame`] when fewer than
/// [`HEADER_LENGTH`] bytes are supplied.
pub fn decode_bytes(bytes: Bytes) -> Result<Frame, FramingError> {
    if bytes.len() < HEADER_LENGTH {
        return Err(FramingError::MalformedFrame {
            declared: read_length_prefix(&bytes).unwrap_or(0),
        });
    }
    let packet_type = PacketType::from(bytes[LENGTH_PREFIX_SIZE]);
    Ok(Frame::new(packet_type, bytes.slice(HEADER_LENGTH..)))
}

/// Read the big-endian length prefix if at least four bytes are present.
#[must_use]
pub fn read_length_prefix(bytes: &[u8]) -> Option<u32> {
    let prefix = bytes.get(..LENGTH_PREFIX_SIZE)?;
    let prefix = <[u8; LENGTH_PREFIX_SIZE]>::try_from(prefix).ok()?;
    Some(u32::from_be_bytes(prefix))
}

#[cfg(test)]
mod tests;

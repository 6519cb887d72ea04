//! Game message schemas exchanged with the server.
//!
//! These are plain data types; their meaning (positions, player states) is
//! left to the application. All of them implement
//! [`Message`](crate::payload::Message) through their `bincode` derives.

/// Well-known handler identifiers for enveloped requests.
pub mod handler {
    /// Initial handshake carrying [`InitialPayload`](super::InitialPayload).
    pub const INIT: u32 = 0;
    /// Local player position carrying
    /// [`LocationUpdatePayload`](super::LocationUpdatePayload).
    pub const LOCATION_UPDATE: u32 = 2;
}

/// Handshake sent once after connecting.
#[derive(bincode::Decode, bincode::Encode, Clone, Debug, PartialEq)]
pub struct InitialPayload {
    /// Stable identity of this device.
    pub device_id: String,
    /// Player slot chosen by the user.
    pub player_id: u32,
    /// Simulated client latency in milliseconds.
    pub latency: f32,
}

/// Position of the local player.
#[derive(bincode::Decode, bincode::Encode, Clone, Copy, Debug, PartialEq)]
pub struct LocationUpdatePayload {
    /// Horizontal world coordinate.
    pub x: f32,
    /// Vertical world coordinate.
    pub y: f32,
}

/// Liveness of a remote user.
#[derive(bincode::Decode, bincode::Encode, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UserStatus {
    /// Connected and reporting positions.
    #[default]
    Active,
    /// Known to the server but idle or gone.
    Inactive,
}

/// One user's position within a [`LocationUpdate`].
#[derive(bincode::Decode, bincode::Encode, Clone, Debug, PartialEq)]
pub struct UserLocation {
    /// Sender id of the user's device.
    pub id: String,
    /// Player slot of the user.
    pub player_id: u32,
    /// Horizontal world coordinate.
    pub x: f32,
    /// Vertical world coordinate.
    pub y: f32,
    /// Liveness as seen by the server.
    pub status: UserStatus,
    /// Server time of the last position change, in milliseconds.
    pub last_update_time: u64,
}

/// Snapshot of every user's position, broadcast in `Location` frames.
///
/// Each update fully supersedes the previous one. An empty frame payload
/// means "no users" and decodes to [`LocationUpdate::default`].
#[derive(bincode::Decode, bincode::Encode, Clone, Debug, Default, PartialEq)]
pub struct LocationUpdate {
    /// Every known user, in server order.
    pub users: Vec<UserLocation>,
}

/// Heartbeat payload. The server echoes it unchanged, so the round-trip time
/// is the current time minus `timestamp_ms`.
#[derive(bincode::Decode, bincode::Encode, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ping {
    /// Milliseconds since the session's clock origin when the ping was sent.
    pub timestamp_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{BincodeCodec, PayloadCodec};

    #[test]
    fn location_update_round_trips() {
        let update = LocationUpdate {
            users: vec![UserLocation {
                id: "u-1".into(),
                player_id: 7,
                x: 1.0,
                y: 2.0,
                status: UserStatus::Inactive,
                last_update_time: 99,
            }],
        };
        let bytes = BincodeCodec.serialize(&update).expect("encode");
        let decoded: LocationUpdate = BincodeCodec.deserialize(&bytes).expect("decode");
        assert_eq!(decoded, update);
    }

    #[test]
    fn empty_location_update_is_eight_zero_bytes() {
        let bytes = BincodeCodec
            .serialize(&LocationUpdate::default())
            .expect("encode");
        assert_eq!(bytes, vec![0; 8]);
    }
}

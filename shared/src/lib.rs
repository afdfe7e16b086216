//! Wire protocol shared by the input server and controller devices
//!
//! Controllers speak a single-byte protocol over a reliable stream:
//! - peer → server: one byte per control event (direction, action, pause)
//! - server → peer: exactly one assignment byte right after the connection
//!   is accepted (the 1-based player number, or [`FULL_RESPONSE`])
//!
//! Discovery uses bincode-encoded [`DiscoveryPacket`] datagrams so a device
//! can locate the server's stream endpoint before connecting.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version of the byte protocol described in this crate
pub const PROTOCOL_VERSION: u8 = 1;

pub const DIR_UP: u8 = 1;
pub const DIR_DOWN: u8 = 2;
pub const DIR_LEFT: u8 = 3;
pub const DIR_RIGHT: u8 = 4;
pub const DIR_NONE: u8 = 5;

pub const ACTION_PRESSED: u8 = 100;
pub const ACTION_RELEASED: u8 = 101;
pub const PAUSE: u8 = 200;

/// Assignment byte sent to a peer when every slot is occupied
pub const FULL_RESPONSE: u8 = 255;

/// Largest player count whose slot numbers all fit below [`FULL_RESPONSE`]
pub const MAX_PLAYERS: usize = 254;

/// Default service name used when advertising the server
pub const SERVICE_NAME: &str = "Go Time Geese";
/// Default service identifier matched by discovery probes
pub const SERVICE_ID: &str = "2cafd5f6-ea6c-44c4-99bf-5629bdbcab1d";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown control byte {0}")]
    UnknownByte(u8),
    #[error("byte {0} is not a direction")]
    InvalidDirection(u8),
    #[error("discovery packet codec error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Directional input held by a player slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    #[default]
    None,
}

impl Direction {
    pub fn to_byte(self) -> u8 {
        match self {
            Direction::Up => DIR_UP,
            Direction::Down => DIR_DOWN,
            Direction::Left => DIR_LEFT,
            Direction::Right => DIR_RIGHT,
            Direction::None => DIR_NONE,
        }
    }

    /// Parses a direction from its name, as typed on a console
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "up" | "u" => Some(Direction::Up),
            "down" | "d" => Some(Direction::Down),
            "left" | "l" => Some(Direction::Left),
            "right" | "r" => Some(Direction::Right),
            "none" | "n" => Some(Direction::None),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            DIR_UP => Ok(Direction::Up),
            DIR_DOWN => Ok(Direction::Down),
            DIR_LEFT => Ok(Direction::Left),
            DIR_RIGHT => Ok(Direction::Right),
            DIR_NONE => Ok(Direction::None),
            other => Err(ProtocolError::InvalidDirection(other)),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Direction::Up => "Up",
            Direction::Down => "Down",
            Direction::Left => "Left",
            Direction::Right => "Right",
            Direction::None => "None",
        };
        f.write_str(name)
    }
}

/// A single decoded peer → server message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Direction(Direction),
    ActionPressed,
    ActionReleased,
    Pause,
}

impl ControlMessage {
    /// Classifies one byte from a controller stream
    ///
    /// Bytes outside the version 1 table are rejected instead of being
    /// reinterpreted as directions.
    pub fn decode(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            ACTION_PRESSED => Ok(ControlMessage::ActionPressed),
            ACTION_RELEASED => Ok(ControlMessage::ActionReleased),
            PAUSE => Ok(ControlMessage::Pause),
            DIR_UP..=DIR_NONE => Direction::try_from(byte).map(ControlMessage::Direction),
            other => Err(ProtocolError::UnknownByte(other)),
        }
    }

    pub fn encode(self) -> u8 {
        match self {
            ControlMessage::Direction(direction) => direction.to_byte(),
            ControlMessage::ActionPressed => ACTION_PRESSED,
            ControlMessage::ActionReleased => ACTION_RELEASED,
            ControlMessage::Pause => PAUSE,
        }
    }
}

/// The single byte a server sends right after accepting a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentReply {
    /// Zero-based slot index; encoded on the wire as `slot + 1`
    Slot(usize),
    Full,
}

impl AssignmentReply {
    pub fn encode(self) -> u8 {
        match self {
            AssignmentReply::Slot(index) => {
                debug_assert!(index < MAX_PLAYERS, "slot {} has no assignment byte", index);
                (index + 1) as u8
            }
            AssignmentReply::Full => FULL_RESPONSE,
        }
    }

    /// Decodes an assignment byte; `0` is never sent by a server
    pub fn decode(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            FULL_RESPONSE => Ok(AssignmentReply::Full),
            0 => Err(ProtocolError::UnknownByte(0)),
            number => Ok(AssignmentReply::Slot(number as usize - 1)),
        }
    }
}

/// Datagrams exchanged on the discovery port
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum DiscoveryPacket {
    Probe {
        service_id: String,
    },
    Announce {
        service_name: String,
        service_id: String,
        protocol_version: u8,
        port: u16,
    },
}

impl DiscoveryPacket {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        Ok(bincode::deserialize(data)?)
    }
}

//! KGAPI packet model.
//!
//! Every packet on the host link shares one layout:
//! ```text
//! Byte 0: Packet type (0xC0 = command/response, 0x80 = event)
//! Byte 1: Payload length (0-255)
//! Byte 2: Packet class (System, Bluetooth, ...)
//! Byte 3: Command / event id within the class
//! Byte 4..: Payload, fixed offsets, multi-byte fields little-endian
//! ```
//!
//! Responses reuse the command type byte and always echo the class and
//! command id of the packet that triggered them.

pub mod dispatch;
pub mod event;
pub mod framing;

use crate::config::{MAX_PAYLOAD, PACKET_HEADER_SIZE};
use heapless::Vec;

/// Wire value for command and response packets.
pub const TYPE_COMMAND: u8 = 0xC0;

/// Wire value for event packets.
pub const TYPE_EVENT: u8 = 0x80;

/// Direction/kind of a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketType {
    /// Host → controller request.
    Command,
    /// Controller → host reply to a command.
    Response,
    /// Controller → host unsolicited notification.
    Event,
}

impl PacketType {
    /// Type byte used on the wire.
    pub const fn wire(self) -> u8 {
        match self {
            PacketType::Command | PacketType::Response => TYPE_COMMAND,
            PacketType::Event => TYPE_EVENT,
        }
    }
}

/// Packet classes known to this controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PacketClass {
    Protocol = 0x00,
    System = 0x01,
    Touch = 0x02,
    Feedback = 0x03,
    Motion = 0x04,
    Flex = 0x05,
    Pressure = 0x06,
    Bluetooth = 0x07,
}

impl PacketClass {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(PacketClass::Protocol),
            0x01 => Some(PacketClass::System),
            0x02 => Some(PacketClass::Touch),
            0x03 => Some(PacketClass::Feedback),
            0x04 => Some(PacketClass::Motion),
            0x05 => Some(PacketClass::Flex),
            0x06 => Some(PacketClass::Pressure),
            0x07 => Some(PacketClass::Bluetooth),
            _ => None,
        }
    }
}

/// Byte-level framing failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Fewer bytes than the header (or declared length) requires.
    Incomplete,
    /// First byte is not a known packet type.
    UnknownType(u8),
    /// Payload does not fit in one packet.
    Oversized,
}

/// One decoded KGAPI packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketType,
    pub class: u8,
    pub command: u8,
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

impl Packet {
    /// Build a packet, rejecting payloads longer than 255 bytes.
    pub fn new(kind: PacketType, class: u8, command: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let payload = Vec::from_slice(payload).map_err(|_| FrameError::Oversized)?;
        Ok(Self {
            kind,
            class,
            command,
            payload,
        })
    }

    /// Parse a complete frame.
    ///
    /// Packets arriving from the host carry the command type; 0xC0 is
    /// therefore decoded as [`PacketType::Command`].
    pub fn parse(raw: &[u8]) -> Result<Self, FrameError> {
        if raw.len() < PACKET_HEADER_SIZE {
            return Err(FrameError::Incomplete);
        }
        let kind = match raw[0] {
            TYPE_COMMAND => PacketType::Command,
            TYPE_EVENT => PacketType::Event,
            other => return Err(FrameError::UnknownType(other)),
        };
        let len = raw[1] as usize;
        let body = raw
            .get(PACKET_HEADER_SIZE..PACKET_HEADER_SIZE + len)
            .ok_or(FrameError::Incomplete)?;
        Self::new(kind, raw[2], raw[3], body)
    }

    /// Serialise into `buf`.
    /// Returns the number of bytes written, or 0 if `buf` is too small.
    pub fn encode(&self, buf: &mut [u8]) -> usize {
        encode_frame(self.kind, self.class, self.command, &self.payload, buf)
    }
}

/// Write a frame header and payload into `buf`.
/// Returns the number of bytes written, or 0 if `buf` is too small.
pub fn encode_frame(kind: PacketType, class: u8, command: u8, payload: &[u8], buf: &mut [u8]) -> usize {
    let total = PACKET_HEADER_SIZE + payload.len();
    if payload.len() > MAX_PAYLOAD || buf.len() < total {
        return 0;
    }
    buf[0] = kind.wire();
    buf[1] = payload.len() as u8;
    buf[2] = class;
    buf[3] = command;
    buf[PACKET_HEADER_SIZE..total].copy_from_slice(payload);
    total
}

/// Positional little-endian reader over command parameters.
///
/// The dispatcher validates the parameter length before any handler
/// runs, so reads past the end only happen on a descriptor bug; they
/// yield zeroes instead of panicking.
pub struct ParamReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ParamReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn u8(&mut self) -> u8 {
        let [b] = self.array::<1>();
        b
    }

    pub fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.array())
    }

    pub fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.array())
    }

    pub fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        if let Some(src) = self.data.get(self.pos..self.pos + N) {
            out.copy_from_slice(src);
        }
        self.pos += N;
        out
    }
}

/// Little-endian payload builder for responses and events.
///
/// Writes beyond 255 bytes are dropped; every payload the core builds
/// is bounded well below that.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PayloadWriter {
    buf: Vec<u8, MAX_PAYLOAD>,
}

impl PayloadWriter {
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        let _ = self.buf.push(value);
        self
    }

    pub fn i8(&mut self, value: i8) -> &mut Self {
        self.u8(value as u8)
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        for &b in data {
            if self.buf.push(b).is_err() {
                break;
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

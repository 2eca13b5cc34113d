//! iWRAP multiplexing frames.
//!
//! With `SET CONTROL MUX 1` in effect the module wraps all serial traffic:
//!
//! ```text
//! [0xBF][link][flags:6 | len_hi:2][len_lo][data ...][link ^ 0xFF]
//! ```
//!
//! Link `0xFF` carries the command/notification text; other links carry
//! raw data of the open Bluetooth connections.

use crate::config::RADIO_LINE_LEN;
use heapless::Vec;

pub const SOF: u8 = 0xBF;
pub const CONTROL_LINK: u8 = 0xFF;

/// Bytes a frame adds around its data.
pub const OVERHEAD: usize = 5;

/// Largest data length the 10-bit length field can carry.
const MAX_DATA: usize = 0x3FF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MuxError {
    /// Byte outside a frame that is not a start-of-frame marker.
    Stray(u8),
    /// Data does not fit the frame or the receive buffer.
    Oversized,
    /// Trailing byte does not match the link id.
    BadTrailer { link: u8, trailer: u8 },
}

/// One decoded frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MuxPacket {
    pub link: u8,
    pub data: Vec<u8, RADIO_LINE_LEN>,
}

/// Wrap `data` for `link`.
pub fn encode<const N: usize>(link: u8, data: &[u8]) -> Result<Vec<u8, N>, MuxError> {
    if data.len() > MAX_DATA || data.len() + OVERHEAD > N {
        return Err(MuxError::Oversized);
    }
    let len = data.len();
    let mut out = Vec::new();
    // Capacity was checked above.
    let _ = out.extend_from_slice(&[SOF, link, (len >> 8) as u8 & 0x03, len as u8]);
    let _ = out.extend_from_slice(data);
    let _ = out.push(link ^ 0xFF);
    Ok(out)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Link,
    Flags,
    Length { high: u8 },
    Data { remaining: usize },
    Trailer,
}

/// Cuts the module's byte stream into MUX frames.
pub struct MuxDecoder {
    state: State,
    link: u8,
    data: Vec<u8, RADIO_LINE_LEN>,
}

impl Default for MuxDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MuxDecoder {
    pub const fn new() -> Self {
        Self {
            state: State::Idle,
            link: 0,
            data: Vec::new(),
        }
    }

    /// True between a start-of-frame marker and the frame's trailer.
    pub fn in_frame(&self) -> bool {
        self.state != State::Idle
    }

    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.data.clear();
    }

    /// Feed one byte; a complete frame is returned with its trailing byte.
    pub fn push(&mut self, byte: u8) -> Result<Option<MuxPacket>, MuxError> {
        match self.state {
            State::Idle => {
                if byte != SOF {
                    return Err(MuxError::Stray(byte));
                }
                self.data.clear();
                self.state = State::Link;
            }
            State::Link => {
                self.link = byte;
                self.state = State::Flags;
            }
            State::Flags => {
                self.state = State::Length { high: byte & 0x03 };
            }
            State::Length { high } => {
                let len = (usize::from(high) << 8) | usize::from(byte);
                if len > RADIO_LINE_LEN {
                    self.reset();
                    return Err(MuxError::Oversized);
                }
                self.state = if len == 0 {
                    State::Trailer
                } else {
                    State::Data { remaining: len }
                };
            }
            State::Data { remaining } => {
                // Length was checked against capacity.
                let _ = self.data.push(byte);
                self.state = if remaining == 1 {
                    State::Trailer
                } else {
                    State::Data {
                        remaining: remaining - 1,
                    }
                };
            }
            State::Trailer => {
                self.state = State::Idle;
                if byte != self.link ^ 0xFF {
                    self.data.clear();
                    return Err(MuxError::BadTrailer {
                        link: self.link,
                        trailer: byte,
                    });
                }
                return Ok(Some(MuxPacket {
                    link: self.link,
                    data: core::mem::take(&mut self.data),
                }));
            }
        }
        Ok(None)
    }
}

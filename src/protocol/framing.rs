//! Byte-stream to frame assembly.
//!
//! The host transport delivers an unframed byte stream. The length byte
//! in every header is enough to cut it into frames; there is no escape
//! sequence and no checksum. A byte that cannot start a frame is dropped
//! so the assembler resynchronises on the next valid type byte.

use super::{FrameError, TYPE_COMMAND, TYPE_EVENT};
use crate::config::{MAX_FRAME, PACKET_HEADER_SIZE};
use heapless::Vec;

/// One complete frame, header included.
pub type Frame = Vec<u8, MAX_FRAME>;

/// Accumulates bytes until a full frame is available.
#[derive(Default)]
pub struct PacketAssembler {
    buf: Frame,
}

impl PacketAssembler {
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed one byte.
    ///
    /// Returns `Ok(Some(frame))` when `byte` completes a frame,
    /// `Ok(None)` while more bytes are needed, and
    /// `Err(FrameError::UnknownType)` when a stray byte was discarded.
    pub fn push(&mut self, byte: u8) -> Result<Option<Frame>, FrameError> {
        if self.buf.is_empty() && byte != TYPE_COMMAND && byte != TYPE_EVENT {
            trace!("framing: dropping stray byte 0x{:02X}", byte);
            return Err(FrameError::UnknownType(byte));
        }

        // Capacity is MAX_FRAME and a frame never exceeds it.
        let _ = self.buf.push(byte);

        if self.buf.len() >= 2 && self.buf.len() == PACKET_HEADER_SIZE + self.buf[1] as usize {
            let frame = core::mem::take(&mut self.buf);
            return Ok(Some(frame));
        }
        Ok(None)
    }

    /// Discard a partially received frame (e.g. after a receive timeout).
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Number of bytes buffered for the frame in progress.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(asm: &mut PacketAssembler, bytes: &[u8]) -> Option<Frame> {
        let mut out = None;
        for &b in bytes {
            if let Ok(Some(frame)) = asm.push(b) {
                out = Some(frame);
            }
        }
        out
    }

    #[test]
    fn assembles_zero_length_command() {
        let mut asm = PacketAssembler::new();
        let frame = feed(&mut asm, &[0xC0, 0x00, 0x01, 0x01]).unwrap();
        assert_eq!(frame.as_slice(), &[0xC0, 0x00, 0x01, 0x01]);
        assert_eq!(asm.pending(), 0);
    }

    #[test]
    fn waits_for_declared_payload() {
        let mut asm = PacketAssembler::new();
        assert_eq!(asm.push(0xC0), Ok(None));
        assert_eq!(asm.push(0x01), Ok(None));
        assert_eq!(asm.push(0x07), Ok(None));
        assert_eq!(asm.push(0x02), Ok(None));
        let frame = asm.push(0x03).unwrap().unwrap();
        assert_eq!(frame.as_slice(), &[0xC0, 0x01, 0x07, 0x02, 0x03]);
    }

    #[test]
    fn resynchronises_after_garbage() {
        let mut asm = PacketAssembler::new();
        assert_eq!(asm.push(0x55), Err(FrameError::UnknownType(0x55)));
        let frame = feed(&mut asm, &[0xC0, 0x00, 0x07, 0x01]).unwrap();
        assert_eq!(frame[3], 0x01);
    }

    #[test]
    fn back_to_back_frames() {
        let mut asm = PacketAssembler::new();
        let first = feed(&mut asm, &[0xC0, 0x00, 0x01, 0x01]).unwrap();
        let second = feed(&mut asm, &[0xC0, 0x01, 0x07, 0x02, 0x02]).unwrap();
        assert_eq!(first.len(), 4);
        assert_eq!(second.len(), 5);
    }

    #[test]
    fn reset_discards_partial_frame() {
        let mut asm = PacketAssembler::new();
        let _ = asm.push(0xC0);
        let _ = asm.push(0x04);
        asm.reset();
        assert_eq!(asm.pending(), 0);
    }
}

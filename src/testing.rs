//! Recording doubles for unit tests.

use std::string::String;
use std::vec::Vec;

use crate::bluetooth::{RadioLink, RadioMode};
use crate::config::DeviceProfile;
use crate::controller::Controller;
use crate::protocol::event::PacketSink;
use crate::system::{BatteryStatus, Board, MemoryUsage, ResetMode};

/// Keeps every transmitted frame.
#[derive(Default)]
pub struct RecordingSink {
    pub frames: Vec<Vec<u8>>,
}

impl PacketSink for RecordingSink {
    fn transmit(&mut self, frame: &[u8]) {
        self.frames.push(frame.to_vec());
    }
}

/// Keeps every radio command line.
#[derive(Default)]
pub struct RecordingRadio {
    pub commands: Vec<String>,
    pub modes: Vec<RadioMode>,
}

impl RecordingRadio {
    pub fn sent(&self) -> Vec<&str> {
        self.commands.iter().map(String::as_str).collect()
    }
}

impl RadioLink for RecordingRadio {
    fn send_command(&mut self, command: &str, mode: RadioMode) {
        self.commands.push(command.into());
        self.modes.push(mode);
    }
}

/// Fixed readings, records resets.
#[derive(Default)]
pub struct MockBoard {
    pub resets: Vec<ResetMode>,
}

impl Board for MockBoard {
    fn reset(&mut self, mode: ResetMode) {
        self.resets.push(mode);
    }

    fn memory(&self) -> MemoryUsage {
        MemoryUsage {
            free: 0x1000,
            total: 0x0004_0000,
        }
    }

    fn battery(&self) -> BatteryStatus {
        BatteryStatus { status: 1, level: 87 }
    }
}

pub type TestController = Controller<RecordingRadio, RecordingSink, MockBoard>;

pub fn test_controller() -> TestController {
    Controller::new(
        RecordingRadio::default(),
        RecordingSink::default(),
        MockBoard::default(),
        DeviceProfile::default(),
    )
}

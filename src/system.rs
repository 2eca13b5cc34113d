//! System class support: reset modes, board collaborator and capability
//! records.

use heapless::Vec;

use crate::config::DeviceProfile;
use crate::error::Error;
use crate::protocol::event::{Event, EventSink};

/// `system_reset` mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ResetMode {
    /// Reset everything, including the Bluetooth link manager.
    Full = 1,
    /// Reset only the core protocol state.
    CoreOnly = 2,
}

impl ResetMode {
    pub fn from_u8(value: u8) -> Result<Self, Error> {
        match value {
            1 => Ok(ResetMode::Full),
            2 => Ok(ResetMode::CoreOnly),
            _ => Err(Error::ParameterRange),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MemoryUsage {
    pub free: u32,
    pub total: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryStatus {
    /// Charger state as reported by the board (opaque to the core).
    pub status: u8,
    /// Charge level in percent.
    pub level: u8,
}

/// Platform services the controller needs from the board.
pub trait Board {
    /// Re-initialise peripherals after a `system_reset`.
    fn reset(&mut self, mode: ResetMode);
    fn memory(&self) -> MemoryUsage;
    fn battery(&self) -> BatteryStatus;
}

/// Capability categories reported by `system_get_capabilities`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CapabilityCategory {
    Platform = 0x01,
    HostInterface = 0x02,
    Feedback = 0x03,
    Touch = 0x04,
    Motion = 0x05,
    Flex = 0x06,
    Pressure = 0x07,
}

impl CapabilityCategory {
    pub const ALL: [CapabilityCategory; 7] = [
        CapabilityCategory::Platform,
        CapabilityCategory::HostInterface,
        CapabilityCategory::Feedback,
        CapabilityCategory::Touch,
        CapabilityCategory::Motion,
        CapabilityCategory::Flex,
        CapabilityCategory::Pressure,
    ];

    /// Whether a `get_capabilities(category)` request covers `self`.
    /// Category 0 selects everything.
    pub fn selected_by(self, category: u8) -> bool {
        category == 0 || category == self as u8
    }
}

/// Encoded TLV list of one capability category.
pub type CapabilityRecord = Vec<u8, 16>;

fn tlv(record: &mut CapabilityRecord, kind: u8, value: &[u8]) {
    let _ = record.push(kind);
    let _ = record.push(value.len() as u8);
    let _ = record.extend_from_slice(value);
}

/// TLV record describing `category` for this hardware variant.
pub fn capability_record(profile: &DeviceProfile, category: CapabilityCategory) -> CapabilityRecord {
    let mut record = CapabilityRecord::new();
    match category {
        CapabilityCategory::Platform => {
            tlv(&mut record, 0x01, &[profile.board]);
            tlv(&mut record, 0x02, &[profile.hand]);
            tlv(&mut record, 0x03, &[profile.dual_glove]);
        }
        CapabilityCategory::HostInterface => tlv(&mut record, 0x01, &[profile.host_interfaces]),
        CapabilityCategory::Feedback => tlv(&mut record, 0x01, &[profile.feedback]),
        CapabilityCategory::Touch => {
            tlv(&mut record, 0x01, &[profile.touch_sensors]);
            tlv(&mut record, 0x02, &profile.touch_combinations.to_le_bytes());
        }
        CapabilityCategory::Motion => tlv(&mut record, 0x01, &[profile.motion]),
        CapabilityCategory::Flex => tlv(&mut record, 0x01, &[profile.flex]),
        CapabilityCategory::Pressure => tlv(&mut record, 0x01, &[profile.pressure]),
    }
    record
}

/// Queue one `system_capability` event per selected category and return
/// how many were selected. Unknown categories select nothing.
pub fn report_capabilities(profile: &DeviceProfile, category: u8, events: &mut impl EventSink) -> u16 {
    let mut count = 0;
    for cat in CapabilityCategory::ALL {
        if !cat.selected_by(category) {
            continue;
        }
        let record = capability_record(profile, cat);
        events.queue(&Event::SystemCapability {
            category: cat as u8,
            record: &record,
        });
        count += 1;
    }
    count
}

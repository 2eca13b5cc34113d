//! Application-wide constants and compile-time configuration.
//!
//! Protocol sizes, capacities, and firmware identity live here so they
//! can be tuned in one place. The hardware variant reported to the host
//! is described at runtime by [`DeviceProfile`].

// Firmware identity

/// Firmware version reported by `system_get_info`.
pub const FIRMWARE_VERSION_MAJOR: u16 = 0;
pub const FIRMWARE_VERSION_MINOR: u16 = 1;
pub const FIRMWARE_VERSION_PATCH: u16 = 0;

/// KGAPI protocol revision implemented by this crate.
pub const PROTOCOL_VERSION: u16 = 1;

/// Build timestamp (seconds since the Unix epoch), exported by `build.rs`.
pub fn build_timestamp() -> u32 {
    env!("KG_BUILD_TIMESTAMP").parse().unwrap_or(0)
}

// Protocol

/// Largest parameter/payload a packet can carry (one length byte).
pub const MAX_PAYLOAD: usize = 255;

/// Header bytes in front of every payload: type, length, class, command.
pub const PACKET_HEADER_SIZE: usize = 4;

/// Largest complete frame on the wire.
pub const MAX_FRAME: usize = PACKET_HEADER_SIZE + MAX_PAYLOAD;

/// Number of event hooks the embedding application can register.
pub const MAX_EVENT_HOOKS: usize = 16;

/// Events held back while a command response is outstanding.
pub const EVENT_QUEUE_DEPTH: usize = 16;

// Soft timers

/// Number of user-schedulable soft timers.
pub const SOFT_TIMER_COUNT: usize = 8;

/// Scheduler rate: sub-second ticks per second (100 Hz, 10 ms each).
pub const TICKS_PER_SECOND: u8 = 100;

// Bluetooth

/// Maximum number of remembered pairings (iWRAP keeps up to 16).
pub const MAX_PAIRINGS: usize = 16;

/// Width of the active link bitmask (link identifiers 0..15).
pub const MAX_LINKS: u8 = 16;

/// Accepted inquiry duration range (seconds, inclusive).
pub const DISCOVER_MIN_SECS: u8 = 5;
pub const DISCOVER_MAX_SECS: u8 = 30;

/// Seconds between automatic reconnect attempts in autocall mode.
pub const AUTOCALL_RETRY_SECS: u32 = 10;

/// Longest text command sent to the radio module.
pub const RADIO_COMMAND_LEN: usize = 48;

/// Longest notification line accepted from the radio module.
pub const RADIO_LINE_LEN: usize = 96;

/// Longest remote device name kept from an inquiry response.
pub const INQUIRY_NAME_LEN: usize = 32;

// Hardware variant

/// Hardware variant reported by `system_get_capabilities`.
///
/// Values are opaque identifiers agreed with the host tooling; the core
/// only packs them into capability records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceProfile {
    /// Board identifier.
    pub board: u8,
    /// Which hand the glove is built for (1 = left, 2 = right).
    pub hand: u8,
    /// Non-zero when two gloves operate as a pair.
    pub dual_glove: u8,
    /// Host interface bitmask (serial, Bluetooth, USB HID, ...).
    pub host_interfaces: u8,
    /// Feedback device bitmask (LED, piezo, vibration).
    pub feedback: u8,
    /// Number of touch sensors.
    pub touch_sensors: u8,
    /// Number of base touch combinations.
    pub touch_combinations: u16,
    /// Motion sensor type (0 = none).
    pub motion: u8,
    /// Flex sensor type (0 = none).
    pub flex: u8,
    /// Pressure sensor type (0 = none).
    pub pressure: u8,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            board: 0x01,
            hand: 0x02,
            dual_glove: 0,
            host_interfaces: 0x05,
            feedback: 0x07,
            touch_sensors: 37,
            touch_combinations: 60,
            motion: 0x01,
            flex: 0,
            pressure: 0,
        }
    }
}

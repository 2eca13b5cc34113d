//! Bluetooth subsystem.
//!
//! The controller drives an external iWRAP-style radio module over a
//! serial text interface:
//!
//! 1. **Link Manager** - owns the pairing table, the active link bitmask,
//!    the pending-operation gate and the mode/page-mode state machine.
//! 2. **Radio commands** - typed construction of the text commands sent
//!    to the module.
//! 3. **Notifications** - parsing of the module's asynchronous lines into
//!    state updates for the link manager.
//! 4. **MUX framing** - the binary framing the module switches to once
//!    `SET CONTROL MUX 1` is in effect.

pub mod command;
pub mod link;
pub mod mux;
pub mod notify;
pub mod pairing;


use core::fmt;

use crate::config::MAX_LINKS;

pub use command::{CallTarget, RadioCommand};
pub use link::{LinkManager, Origin};
pub use notify::RadioNotification;
pub use pairing::{DeviceIndexes, PairingEntry, PairingTable};

/// Six-byte Bluetooth hardware address.
///
/// Stored in display order (`00:07:80:...`, most significant byte first);
/// the host wire format carries the same bytes reversed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Placeholder reported for links that no pairing accounts for.
    pub const UNKNOWN: MacAddress = MacAddress([0xFF; 6]);

    /// Build from little-endian wire order.
    pub fn from_wire(bytes: [u8; 6]) -> Self {
        let mut b = bytes;
        b.reverse();
        Self(b)
    }

    /// Bytes in little-endian wire order.
    pub fn to_wire(self) -> [u8; 6] {
        let mut b = self.0;
        b.reverse();
        b
    }

    /// Parse `aa:bb:cc:dd:ee:ff` (either case).
    pub fn parse(text: &str) -> Option<Self> {
        let mut out = [0u8; 6];
        let mut parts = text.split(':');
        for slot in out.iter_mut() {
            let part = parts.next()?;
            if part.len() != 2 {
                return None;
            }
            *slot = u8::from_str_radix(part, 16).ok()?;
        }
        if parts.next().is_some() {
            return None;
        }
        Some(Self(out))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Operating mode selected by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BluetoothMode {
    /// Radio invisible, all links closed.
    Disabled = 0,
    /// Always discoverable and connectable.
    Visible = 1,
    /// Connectable; discoverable only while nothing is paired.
    Manual = 2,
    /// Like `Manual`, and reconnects to the last device automatically.
    Autocall = 3,
}

impl BluetoothMode {
    /// Highest valid wire value.
    pub const MAX: u8 = 3;

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(BluetoothMode::Disabled),
            1 => Some(BluetoothMode::Visible),
            2 => Some(BluetoothMode::Manual),
            3 => Some(BluetoothMode::Autocall),
            _ => None,
        }
    }

    /// Modes whose page mode follows pairing-table occupancy.
    pub fn follows_pairings(self) -> bool {
        matches!(self, BluetoothMode::Manual | BluetoothMode::Autocall)
    }
}

/// Low-level radio visibility/connectability (`SET BT PAGE <n>`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PageMode {
    /// No page scan: neither discoverable nor connectable.
    Off = 0,
    /// Connectable by paired devices, not discoverable.
    Connectable = 2,
    /// Discoverable and connectable.
    Visible = 3,
    /// Discoverable and connectable while waiting for a first pairing.
    Pairable = 4,
}

/// Single-slot gate for radio-initiated operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PendingOperation {
    #[default]
    Idle,
    PendingInquiry,
    PendingPair,
    PendingCall,
}

/// Service profiles a pairing may support and activate independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Profile {
    HidControl,
    HidInterrupt,
    Spp,
    Iap,
    Hfp,
    Avrcp,
}

impl Profile {
    /// All profiles in bit order.
    pub const ALL: [Profile; 6] = [
        Profile::HidControl,
        Profile::HidInterrupt,
        Profile::Spp,
        Profile::Iap,
        Profile::Hfp,
        Profile::Avrcp,
    ];

    /// Order used to attribute a link to a profile when several match.
    pub const ATTRIBUTION_ORDER: [Profile; 6] = [
        Profile::Avrcp,
        Profile::Hfp,
        Profile::HidControl,
        Profile::HidInterrupt,
        Profile::Iap,
        Profile::Spp,
    ];

    /// Bit position in `profiles_supported` / `profiles_active`.
    pub const fn bit(self) -> u8 {
        match self {
            Profile::HidControl => 0,
            Profile::HidInterrupt => 1,
            Profile::Spp => 2,
            Profile::Iap => 3,
            Profile::Hfp => 4,
            Profile::Avrcp => 5,
        }
    }

    pub const fn mask(self) -> u8 {
        1 << self.bit()
    }

    /// Profile whose mask equals `mask` exactly.
    pub fn from_mask(mask: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.mask() == mask)
    }

    /// Map an iWRAP protocol token (and L2CAP PSM / channel) to a profile.
    pub fn from_iwrap(protocol: &str, channel: &str) -> Option<Self> {
        match protocol {
            "HID" => match channel {
                "13" => Some(Profile::HidInterrupt),
                _ => Some(Profile::HidControl),
            },
            "RFCOMM" => Some(Profile::Spp),
            "IAP" => Some(Profile::Iap),
            "HFP" | "HFP-AG" => Some(Profile::Hfp),
            "AVRCP" => Some(Profile::Avrcp),
            _ => None,
        }
    }
}

/// Bitmask of open links; bit *i* set means link id *i* is connected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkSet(u16);

impl LinkSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, link: u8) -> bool {
        link < MAX_LINKS && self.0 & (1 << link) != 0
    }

    /// Returns `false` if `link` is outside the bitmask.
    pub fn insert(&mut self, link: u8) -> bool {
        if link >= MAX_LINKS {
            return false;
        }
        self.0 |= 1 << link;
        true
    }

    pub fn remove(&mut self, link: u8) {
        if link < MAX_LINKS {
            self.0 &= !(1 << link);
        }
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn count(self) -> u8 {
        self.0.count_ones() as u8
    }

    /// Open link ids in ascending order.
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..MAX_LINKS).filter(move |&id| self.contains(id))
    }
}

/// Interpretation mode the radio link is currently in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioMode {
    /// Plain text command mode.
    #[default]
    Command,
    /// Multiplexed mode: commands are wrapped in MUX frames by the transport.
    Mux,
}

/// Serial command channel to the radio module.
///
/// Fire-and-forget: replies come back later as notification lines.
pub trait RadioLink {
    fn send_command(&mut self, command: &str, mode: RadioMode);
}

//! Text commands for the radio module.
//!
//! Commands are built from typed fields and rendered through
//! `core::fmt`, never by patching characters into a template.

use core::fmt::{self, Write};

use super::{MacAddress, PageMode, Profile};
use crate::config::RADIO_COMMAND_LEN;
use heapless::String;

/// Remote service selected for an outgoing call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CallTarget {
    Hid,
    Avrcp,
    Hfp,
    Iap,
    Spp,
}

impl CallTarget {
    /// Select a call target from a requested profile mask.
    ///
    /// Only an exact single-profile mask selects AVRCP, HFP, iAP or SPP;
    /// anything else falls back to HID.
    pub fn for_profile_mask(mask: u8) -> Self {
        match Profile::from_mask(mask) {
            Some(Profile::Avrcp) => CallTarget::Avrcp,
            Some(Profile::Hfp) => CallTarget::Hfp,
            Some(Profile::Iap) => CallTarget::Iap,
            Some(Profile::Spp) => CallTarget::Spp,
            _ => CallTarget::Hid,
        }
    }

    /// (service target, connection protocol) tokens of the CALL command.
    pub const fn tokens(self) -> (&'static str, &'static str) {
        match self {
            CallTarget::Hid => ("0011", "HID"),
            CallTarget::Avrcp => ("0017", "AVRCP"),
            CallTarget::Hfp => ("111F", "HFP"),
            CallTarget::Iap => ("*", "IAP"),
            CallTarget::Spp => ("1101", "RFCOMM"),
        }
    }

    /// Profile a successful call of this kind opens.
    pub const fn profile(self) -> Profile {
        match self {
            CallTarget::Hid => Profile::HidControl,
            CallTarget::Avrcp => Profile::Avrcp,
            CallTarget::Hfp => Profile::Hfp,
            CallTarget::Iap => Profile::Iap,
            CallTarget::Spp => Profile::Spp,
        }
    }
}

/// One command for the radio module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioCommand {
    SetPageMode(PageMode),
    Close(u8),
    Reset,
    Inquiry { duration: u8 },
    Pair(MacAddress),
    ForgetPairing(MacAddress),
    ForgetAllPairings,
    /// Dump every setting, including stored pairings (`SET` with no args).
    ListSettings,
    Call { address: MacAddress, target: CallTarget },
}

impl RadioCommand {
    /// Render into a fixed-capacity line (without line terminator).
    pub fn render(&self) -> String<RADIO_COMMAND_LEN> {
        let mut line = String::new();
        // The longest command (CALL with address) is well below capacity.
        let _ = write!(line, "{}", self);
        line
    }
}

impl fmt::Display for RadioCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RadioCommand::SetPageMode(mode) => write!(f, "SET BT PAGE {}", mode as u8),
            RadioCommand::Close(link) => write!(f, "CLOSE {}", link),
            RadioCommand::Reset => f.write_str("RESET"),
            RadioCommand::Inquiry { duration } => write!(f, "INQUIRY {:02} NAME", duration),
            RadioCommand::Pair(address) => write!(f, "PAIR {}", address),
            RadioCommand::ForgetPairing(address) => write!(f, "SET BT PAIR {}", address),
            RadioCommand::ForgetAllPairings => f.write_str("SET BT PAIR *"),
            RadioCommand::ListSettings => f.write_str("SET"),
            RadioCommand::Call { address, target } => {
                let (service, protocol) = target.tokens();
                write!(f, "CALL {} {} {}", address, service, protocol)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: MacAddress = MacAddress([0x00, 0x07, 0x80, 0x12, 0xAB, 0x0F]);

    #[test]
    fn renders_simple_commands() {
        assert_eq!(RadioCommand::SetPageMode(PageMode::Pairable).render().as_str(), "SET BT PAGE 4");
        assert_eq!(RadioCommand::SetPageMode(PageMode::Off).render().as_str(), "SET BT PAGE 0");
        assert_eq!(RadioCommand::Reset.render().as_str(), "RESET");
        assert_eq!(RadioCommand::ForgetAllPairings.render().as_str(), "SET BT PAIR *");
        assert_eq!(RadioCommand::ListSettings.render().as_str(), "SET");
    }

    #[test]
    fn close_uses_decimal_link_id() {
        assert_eq!(RadioCommand::Close(3).render().as_str(), "CLOSE 3");
        assert_eq!(RadioCommand::Close(12).render().as_str(), "CLOSE 12");
    }

    #[test]
    fn inquiry_duration_is_two_digits() {
        assert_eq!(RadioCommand::Inquiry { duration: 5 }.render().as_str(), "INQUIRY 05 NAME");
        assert_eq!(RadioCommand::Inquiry { duration: 30 }.render().as_str(), "INQUIRY 30 NAME");
    }

    #[test]
    fn address_commands() {
        assert_eq!(RadioCommand::Pair(ADDR).render().as_str(), "PAIR 00:07:80:12:ab:0f");
        assert_eq!(
            RadioCommand::ForgetPairing(ADDR).render().as_str(),
            "SET BT PAIR 00:07:80:12:ab:0f"
        );
    }

    #[test]
    fn call_targets_by_profile_mask() {
        let call = |mask| {
            RadioCommand::Call {
                address: ADDR,
                target: CallTarget::for_profile_mask(mask),
            }
            .render()
        };
        assert_eq!(call(0x20).as_str(), "CALL 00:07:80:12:ab:0f 0017 AVRCP");
        assert_eq!(call(0x10).as_str(), "CALL 00:07:80:12:ab:0f 111F HFP");
        assert_eq!(call(0x08).as_str(), "CALL 00:07:80:12:ab:0f * IAP");
        assert_eq!(call(0x04).as_str(), "CALL 00:07:80:12:ab:0f 1101 RFCOMM");
        assert_eq!(call(0x01).as_str(), "CALL 00:07:80:12:ab:0f 0011 HID");
        assert_eq!(call(0x00).as_str(), "CALL 00:07:80:12:ab:0f 0011 HID");
        assert_eq!(call(0x30).as_str(), "CALL 00:07:80:12:ab:0f 0011 HID");
    }
}

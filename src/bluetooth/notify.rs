//! Radio module notification parser.
//!
//! The module answers commands and reports link activity with one text
//! line per notification. Only the lines that change link-manager state
//! are recognised; everything else parses to `None`.
//!
//! ```text
//! READY.
//! SET BT BDADDR 00:07:80:aa:bb:cc
//! SET BT PAIR 00:07:80:aa:bb:cc 1234abcd...
//! SET CONTROL MUX 1
//! PAIR 00:07:80:aa:bb:cc OK | FAIL
//! INQUIRY_PARTIAL 00:07:80:aa:bb:cc 240404 "Phone" -60
//! INQUIRY 2
//! CALL 0
//! CONNECT 0 RFCOMM 1
//! RING 1 00:07:80:aa:bb:cc 11 HID
//! NO CARRIER 0 ERROR 407 CONNECTION_FAILED
//! ```

use super::{MacAddress, Profile};

/// Radio-originated state update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioNotification<'a> {
    /// Module finished booting and accepts commands.
    Ready,
    /// Module's own hardware address.
    LocalAddress(MacAddress),
    /// Whether the module runs in multiplexing mode (settings listing).
    Multiplexing(bool),
    /// A pairing is stored in the module (settings listing or fresh pairing).
    PairingAdded(MacAddress),
    /// An outgoing pairing request failed.
    PairingFailed(MacAddress),
    /// One device found during inquiry.
    InquiryResult {
        address: MacAddress,
        class_of_device: [u8; 3],
        name: &'a str,
        rssi: i8,
    },
    /// Inquiry finished after finding `count` devices.
    InquiryComplete { count: u8 },
    /// Outgoing call accepted by the module as link `link`.
    CallStarted { link: u8 },
    /// Outgoing call connected.
    Connected { link: u8, profile: Option<Profile> },
    /// Incoming connection from a remote device.
    Ring {
        link: u8,
        address: MacAddress,
        profile: Option<Profile>,
    },
    /// Link closed or call failed; `reason` is the module's error code.
    NoCarrier { link: u8, reason: u16 },
}

/// Parse one line (trailing CR/LF tolerated).
pub fn parse_line(line: &str) -> Option<RadioNotification<'_>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line == "READY." {
        return Some(RadioNotification::Ready);
    }

    if let Some(rest) = line.strip_prefix("SET BT BDADDR ") {
        return MacAddress::parse(rest.trim()).map(RadioNotification::LocalAddress);
    }

    if let Some(rest) = line.strip_prefix("SET BT PAIR ") {
        // Listing format carries the link key after the address; our own
        // "SET BT PAIR <addr>" echo (forget) does not.
        let mut parts = rest.split_whitespace();
        let address = MacAddress::parse(parts.next()?)?;
        parts.next()?;
        return Some(RadioNotification::PairingAdded(address));
    }

    if let Some(rest) = line.strip_prefix("SET CONTROL MUX ") {
        return match rest.trim() {
            "0" => Some(RadioNotification::Multiplexing(false)),
            "1" => Some(RadioNotification::Multiplexing(true)),
            _ => None,
        };
    }

    if let Some(rest) = line.strip_prefix("NO CARRIER ") {
        let mut parts = rest.split_whitespace();
        let link = parts.next()?.parse().ok()?;
        let reason = match (parts.next(), parts.next()) {
            (Some("ERROR"), Some(code)) => u16::from_str_radix(code, 16).unwrap_or(0xFFFF),
            _ => 0,
        };
        return Some(RadioNotification::NoCarrier { link, reason });
    }

    let mut parts = line.split_whitespace();
    match parts.next()? {
        "PAIR" => {
            let address = MacAddress::parse(parts.next()?)?;
            match parts.next()? {
                "OK" => Some(RadioNotification::PairingAdded(address)),
                "FAIL" => Some(RadioNotification::PairingFailed(address)),
                _ => None,
            }
        }
        "INQUIRY_PARTIAL" => parse_inquiry_result(line),
        "INQUIRY" => {
            let arg = parts.next()?;
            match arg.parse() {
                Ok(count) => Some(RadioNotification::InquiryComplete { count }),
                // "INQUIRY <addr> <cod>" result lines after completion
                Err(_) => parse_inquiry_result(line),
            }
        }
        "CALL" => {
            let link = parts.next()?.parse().ok()?;
            Some(RadioNotification::CallStarted { link })
        }
        "CONNECT" => {
            let link = parts.next()?.parse().ok()?;
            let protocol = parts.next().unwrap_or("");
            let channel = parts.next().unwrap_or("");
            Some(RadioNotification::Connected {
                link,
                profile: Profile::from_iwrap(protocol, channel),
            })
        }
        "RING" => {
            let link = parts.next()?.parse().ok()?;
            let address = MacAddress::parse(parts.next()?)?;
            let channel = parts.next().unwrap_or("");
            let protocol = parts.next().unwrap_or("");
            Some(RadioNotification::Ring {
                link,
                address,
                profile: Profile::from_iwrap(protocol, channel),
            })
        }
        _ => None,
    }
}

/// `<keyword> <addr> <cod> ["name"] [rssi]`
fn parse_inquiry_result(line: &str) -> Option<RadioNotification<'_>> {
    let mut parts = line.splitn(4, ' ');
    parts.next()?;
    let address = MacAddress::parse(parts.next()?)?;
    let class_of_device = parse_cod(parts.next()?)?;
    let tail = parts.next().unwrap_or("").trim();

    let (name, after_name) = match tail.strip_prefix('"') {
        Some(quoted) => match quoted.find('"') {
            Some(end) => (&quoted[..end], quoted[end + 1..].trim()),
            None => (quoted, ""),
        },
        None => ("", tail),
    };
    let rssi = after_name.parse().unwrap_or(0);

    Some(RadioNotification::InquiryResult {
        address,
        class_of_device,
        name,
        rssi,
    })
}

/// Six hex digits, most significant byte first.
fn parse_cod(text: &str) -> Option<[u8; 3]> {
    if text.len() != 6 {
        return None;
    }
    let value = u32::from_str_radix(text, 16).ok()?;
    Some([(value >> 16) as u8, (value >> 8) as u8, value as u8])
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: MacAddress = MacAddress([0x00, 0x07, 0x80, 0xAA, 0xBB, 0xCC]);

    #[test]
    fn ready_and_local_address() {
        assert_eq!(parse_line("READY.\r\n"), Some(RadioNotification::Ready));
        assert_eq!(
            parse_line("SET BT BDADDR 00:07:80:aa:bb:cc"),
            Some(RadioNotification::LocalAddress(ADDR))
        );
    }

    #[test]
    fn mux_setting() {
        assert_eq!(
            parse_line("SET CONTROL MUX 1\r\n"),
            Some(RadioNotification::Multiplexing(true))
        );
        assert_eq!(
            parse_line("SET CONTROL MUX 0"),
            Some(RadioNotification::Multiplexing(false))
        );
        assert_eq!(parse_line("SET CONTROL MUX 2"), None);
    }

    #[test]
    fn pairing_listing_requires_key() {
        assert_eq!(
            parse_line("SET BT PAIR 00:07:80:aa:bb:cc 0123456789abcdef"),
            Some(RadioNotification::PairingAdded(ADDR))
        );
        assert_eq!(parse_line("SET BT PAIR 00:07:80:aa:bb:cc"), None);
    }

    #[test]
    fn pair_result() {
        assert_eq!(
            parse_line("PAIR 00:07:80:aa:bb:cc OK"),
            Some(RadioNotification::PairingAdded(ADDR))
        );
        assert_eq!(
            parse_line("PAIR 00:07:80:aa:bb:cc FAIL"),
            Some(RadioNotification::PairingFailed(ADDR))
        );
    }

    #[test]
    fn inquiry_lines() {
        assert_eq!(
            parse_line("INQUIRY_PARTIAL 00:07:80:aa:bb:cc 240404 \"My Phone\" -60"),
            Some(RadioNotification::InquiryResult {
                address: ADDR,
                class_of_device: [0x24, 0x04, 0x04],
                name: "My Phone",
                rssi: -60,
            })
        );
        assert_eq!(
            parse_line("INQUIRY 00:07:80:aa:bb:cc 5a020c"),
            Some(RadioNotification::InquiryResult {
                address: ADDR,
                class_of_device: [0x5A, 0x02, 0x0C],
                name: "",
                rssi: 0,
            })
        );
        assert_eq!(
            parse_line("INQUIRY 2"),
            Some(RadioNotification::InquiryComplete { count: 2 })
        );
    }

    #[test]
    fn call_lifecycle() {
        assert_eq!(parse_line("CALL 3"), Some(RadioNotification::CallStarted { link: 3 }));
        assert_eq!(
            parse_line("CONNECT 3 RFCOMM 1"),
            Some(RadioNotification::Connected {
                link: 3,
                profile: Some(Profile::Spp)
            })
        );
        assert_eq!(
            parse_line("NO CARRIER 3 ERROR 407 CONNECTION_FAILED"),
            Some(RadioNotification::NoCarrier { link: 3, reason: 0x0407 })
        );
        assert_eq!(
            parse_line("NO CARRIER 1 ERROR 0"),
            Some(RadioNotification::NoCarrier { link: 1, reason: 0 })
        );
    }

    #[test]
    fn ring_carries_profile() {
        assert_eq!(
            parse_line("RING 1 00:07:80:aa:bb:cc 13 HID"),
            Some(RadioNotification::Ring {
                link: 1,
                address: ADDR,
                profile: Some(Profile::HidInterrupt)
            })
        );
    }

    #[test]
    fn unrelated_lines_are_ignored() {
        assert_eq!(parse_line("SYNTAX ERROR"), None);
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("CALL x"), None);
        assert_eq!(parse_line("PAIR nonsense OK"), None);
    }
}

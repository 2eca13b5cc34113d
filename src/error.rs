//! Unified error type for the KGAPI core.
//!
//! We avoid `alloc` - every variant maps onto the 16-bit result field
//! carried by response packets. Implements `defmt::Format` for efficient
//! on-target logging when the `defmt` feature is enabled.

use core::fmt;

/// Result codes surfaced to the host (0 = success is `Ok(())`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum Error {
    // Protocol
    /// No command is bound to the (class, command) pair.
    InvalidCommand = 0x0001,

    /// Declared parameter length does not match the command descriptor.
    ParameterLength = 0x0002,

    /// A parameter value is outside its declared range.
    ParameterRange = 0x0003,

    /// A table slot expected to be populated was empty.
    ///
    /// Signals a broken internal invariant; never expected in operation.
    NullPointer = 0x0004,

    // Bluetooth
    /// The radio module has not reported ready yet (or was reset).
    InterfaceNotReady = 0x0101,

    /// Another radio-initiated operation is still pending.
    InterfaceBusy = 0x0102,
}

impl Error {
    /// Wire value of this error.
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Map a wire value back to an error, if it is one we know.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0001 => Some(Error::InvalidCommand),
            0x0002 => Some(Error::ParameterLength),
            0x0003 => Some(Error::ParameterRange),
            0x0004 => Some(Error::NullPointer),
            0x0101 => Some(Error::InterfaceNotReady),
            0x0102 => Some(Error::InterfaceBusy),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Error::InvalidCommand => "invalid command",
            Error::ParameterLength => "incorrect parameter length",
            Error::ParameterRange => "parameter out of range",
            Error::NullPointer => "missing table entry",
            Error::InterfaceNotReady => "interface not ready",
            Error::InterfaceBusy => "interface busy",
        };
        write!(f, "{} (0x{:04X})", text, self.code())
    }
}

/// Collapse a handler result into the 16-bit result field.
pub fn result_code<T>(result: &Result<T, Error>) -> u16 {
    match result {
        Ok(_) => 0,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip_through_from_code() {
        for e in [
            Error::InvalidCommand,
            Error::ParameterLength,
            Error::ParameterRange,
            Error::NullPointer,
            Error::InterfaceNotReady,
            Error::InterfaceBusy,
        ] {
            assert_eq!(Error::from_code(e.code()), Some(e));
        }
        assert_eq!(Error::from_code(0), None);
        assert_eq!(Error::from_code(0xFFFF), None);
    }

    #[test]
    fn display_includes_code() {
        let text = format!("{}", Error::InterfaceBusy);
        assert_eq!(text, "interface busy (0x0102)");
    }

    #[test]
    fn result_code_is_zero_on_success() {
        assert_eq!(result_code::<()>(&Ok(())), 0);
        assert_eq!(result_code::<u8>(&Err(Error::ParameterRange)), 0x0003);
    }
}

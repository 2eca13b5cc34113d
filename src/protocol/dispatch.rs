//! Command table and request validation.
//!
//! Every command the controller accepts is described by a static
//! [`CommandDescriptor`]. A raw packet is only handed to a handler once
//! its (class, command) pair is known and its declared parameter length
//! matches the descriptor exactly.

use super::{PacketClass, PayloadWriter, TYPE_COMMAND};
use crate::config::PACKET_HEADER_SIZE;
use crate::error::Error;

/// Handler selector for a validated command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandId {
    SystemPing,
    SystemReset,
    SystemGetInfo,
    SystemGetCapabilities,
    SystemGetMemory,
    SystemGetBatteryStatus,
    SystemSetTimer,

    BluetoothGetMode,
    BluetoothSetMode,
    BluetoothReset,
    BluetoothGetMac,
    BluetoothGetPairings,
    BluetoothDiscover,
    BluetoothPair,
    BluetoothDeletePairing,
    BluetoothClearPairings,
    BluetoothGetConnections,
    BluetoothConnect,
    BluetoothDisconnect,
}

/// Static description of one command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandDescriptor {
    pub class: u8,
    pub command: u8,
    /// Exact parameter byte count.
    pub param_len: u8,
    pub id: CommandId,
}

const fn cmd(class: PacketClass, command: u8, param_len: u8, id: CommandId) -> CommandDescriptor {
    CommandDescriptor {
        class: class as u8,
        command,
        param_len,
        id,
    }
}

use CommandId::*;
use PacketClass::{Bluetooth, System};

pub static COMMANDS: [CommandDescriptor; 19] = [
    cmd(System, 0x01, 0, SystemPing),
    cmd(System, 0x02, 1, SystemReset),
    cmd(System, 0x03, 0, SystemGetInfo),
    cmd(System, 0x04, 1, SystemGetCapabilities),
    cmd(System, 0x05, 0, SystemGetMemory),
    cmd(System, 0x06, 0, SystemGetBatteryStatus),
    cmd(System, 0x07, 4, SystemSetTimer),
    cmd(Bluetooth, 0x01, 0, BluetoothGetMode),
    cmd(Bluetooth, 0x02, 1, BluetoothSetMode),
    cmd(Bluetooth, 0x03, 0, BluetoothReset),
    cmd(Bluetooth, 0x04, 0, BluetoothGetMac),
    cmd(Bluetooth, 0x05, 0, BluetoothGetPairings),
    cmd(Bluetooth, 0x06, 1, BluetoothDiscover),
    cmd(Bluetooth, 0x07, 6, BluetoothPair),
    cmd(Bluetooth, 0x08, 1, BluetoothDeletePairing),
    cmd(Bluetooth, 0x09, 0, BluetoothClearPairings),
    cmd(Bluetooth, 0x0A, 0, BluetoothGetConnections),
    cmd(Bluetooth, 0x0B, 2, BluetoothConnect),
    cmd(Bluetooth, 0x0C, 1, BluetoothDisconnect),
];

pub fn lookup(class: u8, command: u8) -> Option<&'static CommandDescriptor> {
    COMMANDS
        .iter()
        .find(|d| d.class == class && d.command == command)
}

/// Check a raw command packet and split off its parameters.
///
/// Nothing is mutated here; a rejected packet has no side effects.
pub fn validate(raw: &[u8]) -> Result<(&'static CommandDescriptor, &[u8]), Error> {
    if raw.len() < PACKET_HEADER_SIZE {
        return Err(Error::ParameterLength);
    }
    if raw[0] != TYPE_COMMAND {
        return Err(Error::InvalidCommand);
    }
    let declared = raw[1];
    let descriptor = lookup(raw[2], raw[3]).ok_or(Error::InvalidCommand)?;
    if declared != descriptor.param_len {
        return Err(Error::ParameterLength);
    }
    let params = raw
        .get(PACKET_HEADER_SIZE..PACKET_HEADER_SIZE + declared as usize)
        .ok_or(Error::ParameterLength)?;
    Ok((descriptor, params))
}

/// What a handler wants sent back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Response payload for the dispatcher to send.
    Respond(PayloadWriter),
    /// The handler already replied (system reset).
    NoResponse,
}

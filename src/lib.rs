//! KGAPI command/event engine for the glove controller.
//!
//! Everything here is plain logic over fixed-capacity buffers and can be
//! tested on the host (no embedded hardware required):
//!
//! - `protocol`: packet model, stream framing, command table, event gateway
//! - `bluetooth`: link manager for the external radio module
//! - `timer`: uptime clock and soft timers
//! - `system`: reset modes, board collaborator, capability records
//! - `controller`: the owned top-level state machine tying them together
//!
//! Usage: `cargo test --lib`
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main]
//! and drives a [`Controller`] from the UART and ticker tasks.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

// ═══════════════════════════════════════════════════════════════════════════
// Core modules
// ═══════════════════════════════════════════════════════════════════════════

pub mod bluetooth;
pub mod config;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod system;
pub mod timer;

#[cfg(test)]
mod testing;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports
// ═══════════════════════════════════════════════════════════════════════════

pub use bluetooth::{BluetoothMode, LinkManager, MacAddress, Origin, RadioLink, RadioMode};
pub use config::DeviceProfile;
pub use controller::Controller;
pub use error::Error;
pub use protocol::event::{Disposition, Emission, Event, EventHook, EventId, PacketSink};
pub use protocol::framing::PacketAssembler;
pub use protocol::{Packet, PacketClass, PacketType};
pub use system::{BatteryStatus, Board, MemoryUsage, ResetMode};

//! Event emission gateway.
//!
//! Every event the controller produces goes through [`EventGateway`]:
//! the event is offered to the hook registered for its exact id (if any),
//! and only reaches the host when the hook lets it through. State changes
//! that triggered the event are never rolled back by a suppression.
//!
//! Events raised while a command is being answered are queued and
//! flushed after the response, so the host always sees the response
//! first.

use heapless::{Deque, LinearMap};

use super::framing::Frame;
use super::{encode_frame, PacketClass, PacketType, PayloadWriter};
use crate::bluetooth::MacAddress;
use crate::config::{EVENT_QUEUE_DEPTH, MAX_EVENT_HOOKS, MAX_FRAME};

/// (class, id) pair identifying an event type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventId {
    pub class: u8,
    pub id: u8,
}

impl EventId {
    pub const fn new(class: PacketClass, id: u8) -> Self {
        Self {
            class: class as u8,
            id,
        }
    }

    // Protocol
    pub const PROTOCOL_ERROR: EventId = EventId::new(PacketClass::Protocol, 0x01);

    // System
    pub const SYSTEM_BOOT: EventId = EventId::new(PacketClass::System, 0x01);
    pub const SYSTEM_READY: EventId = EventId::new(PacketClass::System, 0x02);
    pub const SYSTEM_ERROR: EventId = EventId::new(PacketClass::System, 0x03);
    pub const SYSTEM_CAPABILITY: EventId = EventId::new(PacketClass::System, 0x04);
    pub const SYSTEM_BATTERY_STATUS: EventId = EventId::new(PacketClass::System, 0x05);
    pub const SYSTEM_TIMER_TICK: EventId = EventId::new(PacketClass::System, 0x06);

    // Bluetooth
    pub const BLUETOOTH_MODE: EventId = EventId::new(PacketClass::Bluetooth, 0x01);
    pub const BLUETOOTH_READY: EventId = EventId::new(PacketClass::Bluetooth, 0x02);
    pub const BLUETOOTH_INQUIRY_RESPONSE: EventId = EventId::new(PacketClass::Bluetooth, 0x03);
    pub const BLUETOOTH_INQUIRY_COMPLETE: EventId = EventId::new(PacketClass::Bluetooth, 0x04);
    pub const BLUETOOTH_PAIRING_STATUS: EventId = EventId::new(PacketClass::Bluetooth, 0x05);
    pub const BLUETOOTH_PAIRING_FAILED: EventId = EventId::new(PacketClass::Bluetooth, 0x06);
    pub const BLUETOOTH_PAIRINGS_CLEARED: EventId = EventId::new(PacketClass::Bluetooth, 0x07);
    pub const BLUETOOTH_CONNECTION_STATUS: EventId = EventId::new(PacketClass::Bluetooth, 0x08);
    pub const BLUETOOTH_CONNECTION_CLOSED: EventId = EventId::new(PacketClass::Bluetooth, 0x09);
}

/// A decoded event, as handed to hooks and encoded for the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event<'a> {
    /// A host packet was rejected before reaching a handler.
    ProtocolError { code: u16 },

    SystemBoot {
        major: u16,
        minor: u16,
        patch: u16,
        protocol: u16,
        timestamp: u32,
    },
    SystemReady,
    SystemError { code: u16 },
    /// One capability record: `[category][len][record...]`.
    SystemCapability { category: u8, record: &'a [u8] },
    SystemBatteryStatus { status: u8, level: u8 },
    SystemTimerTick { handle: u8, seconds: u32, subticks: u8 },

    BluetoothMode { mode: u8 },
    BluetoothReady,
    BluetoothInquiryResponse {
        address: MacAddress,
        class_of_device: [u8; 3],
        rssi: i8,
        status: u8,
        /// Pairing index of the device, `0xFF` if unpaired.
        pairing: u8,
        name: &'a [u8],
    },
    BluetoothInquiryComplete { count: u8 },
    BluetoothPairingStatus {
        pairing: u8,
        address: MacAddress,
        priority: u8,
        profiles_supported: u8,
        profiles_active: u8,
        /// Link ids of the active profiles.
        handles: &'a [u8],
    },
    BluetoothPairingFailed { address: MacAddress },
    BluetoothPairingsCleared,
    BluetoothConnectionStatus {
        handle: u8,
        address: MacAddress,
        pairing: u8,
        profile: u8,
        status: u8,
    },
    BluetoothConnectionClosed { handle: u8, reason: u16 },
}

impl Event<'_> {
    pub fn id(&self) -> EventId {
        match self {
            Event::ProtocolError { .. } => EventId::PROTOCOL_ERROR,
            Event::SystemBoot { .. } => EventId::SYSTEM_BOOT,
            Event::SystemReady => EventId::SYSTEM_READY,
            Event::SystemError { .. } => EventId::SYSTEM_ERROR,
            Event::SystemCapability { .. } => EventId::SYSTEM_CAPABILITY,
            Event::SystemBatteryStatus { .. } => EventId::SYSTEM_BATTERY_STATUS,
            Event::SystemTimerTick { .. } => EventId::SYSTEM_TIMER_TICK,
            Event::BluetoothMode { .. } => EventId::BLUETOOTH_MODE,
            Event::BluetoothReady => EventId::BLUETOOTH_READY,
            Event::BluetoothInquiryResponse { .. } => EventId::BLUETOOTH_INQUIRY_RESPONSE,
            Event::BluetoothInquiryComplete { .. } => EventId::BLUETOOTH_INQUIRY_COMPLETE,
            Event::BluetoothPairingStatus { .. } => EventId::BLUETOOTH_PAIRING_STATUS,
            Event::BluetoothPairingFailed { .. } => EventId::BLUETOOTH_PAIRING_FAILED,
            Event::BluetoothPairingsCleared => EventId::BLUETOOTH_PAIRINGS_CLEARED,
            Event::BluetoothConnectionStatus { .. } => EventId::BLUETOOTH_CONNECTION_STATUS,
            Event::BluetoothConnectionClosed { .. } => EventId::BLUETOOTH_CONNECTION_CLOSED,
        }
    }

    /// Append the wire payload of this event to `w`.
    pub fn encode(&self, w: &mut PayloadWriter) {
        match *self {
            Event::ProtocolError { code } | Event::SystemError { code } => {
                w.u16(code);
            }
            Event::SystemBoot {
                major,
                minor,
                patch,
                protocol,
                timestamp,
            } => {
                w.u16(major).u16(minor).u16(patch).u16(protocol).u32(timestamp);
            }
            Event::SystemReady | Event::BluetoothReady | Event::BluetoothPairingsCleared => {}
            Event::SystemCapability { category, record } => {
                w.u8(category).u8(record.len() as u8).bytes(record);
            }
            Event::SystemBatteryStatus { status, level } => {
                w.u8(status).u8(level);
            }
            Event::SystemTimerTick {
                handle,
                seconds,
                subticks,
            } => {
                w.u8(handle).u32(seconds).u8(subticks);
            }
            Event::BluetoothMode { mode } => {
                w.u8(mode);
            }
            Event::BluetoothInquiryResponse {
                address,
                class_of_device,
                rssi,
                status,
                pairing,
                name,
            } => {
                w.bytes(&address.to_wire())
                    .bytes(&class_of_device)
                    .i8(rssi)
                    .u8(status)
                    .u8(pairing)
                    .u8(name.len() as u8)
                    .bytes(name);
            }
            Event::BluetoothInquiryComplete { count } => {
                w.u8(count);
            }
            Event::BluetoothPairingStatus {
                pairing,
                address,
                priority,
                profiles_supported,
                profiles_active,
                handles,
            } => {
                w.u8(pairing)
                    .bytes(&address.to_wire())
                    .u8(priority)
                    .u8(profiles_supported)
                    .u8(profiles_active)
                    .u8(handles.len() as u8)
                    .bytes(handles);
            }
            Event::BluetoothPairingFailed { address } => {
                w.bytes(&address.to_wire());
            }
            Event::BluetoothConnectionStatus {
                handle,
                address,
                pairing,
                profile,
                status,
            } => {
                w.u8(handle)
                    .bytes(&address.to_wire())
                    .u8(pairing)
                    .u8(profile)
                    .u8(status);
            }
            Event::BluetoothConnectionClosed { handle, reason } => {
                w.u8(handle).u16(reason);
            }
        }
    }

    /// Encode as a complete event frame.
    pub fn to_frame(&self) -> Frame {
        let mut payload = PayloadWriter::new();
        self.encode(&mut payload);
        let id = self.id();
        let mut buf = [0u8; MAX_FRAME];
        let n = encode_frame(PacketType::Event, id.class, id.id, payload.as_slice(), &mut buf);
        // `n <= MAX_FRAME`, so this never truncates.
        Frame::from_slice(&buf[..n]).unwrap_or_default()
    }
}

/// Hook verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Disposition {
    /// Let the event reach the host.
    Transmit,
    /// The hook consumed the event; do not send it.
    Suppress,
}

/// Interception hook for one event type.
pub type EventHook = fn(&Event<'_>) -> Disposition;

/// Outcome of offering an event to the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Emission {
    Sent,
    Suppressed,
}

/// Fixed table of per-event hooks.
#[derive(Default)]
pub struct EventHooks {
    map: LinearMap<EventId, EventHook, MAX_EVENT_HOOKS>,
}

impl EventHooks {
    pub const fn new() -> Self {
        Self {
            map: LinearMap::new(),
        }
    }

    /// Install `hook` for `id`, replacing any previous one.
    /// Gives the hook back when the table is full.
    pub fn register(&mut self, id: EventId, hook: EventHook) -> Result<(), EventHook> {
        self.map.insert(id, hook).map(|_| ()).map_err(|(_, hook)| hook)
    }

    pub fn unregister(&mut self, id: EventId) -> Option<EventHook> {
        self.map.remove(&id)
    }

    pub fn get(&self, id: EventId) -> Option<EventHook> {
        self.map.get(&id).copied()
    }

    /// Run the hook registered for `event`, if any.
    pub fn offer(&self, event: &Event<'_>) -> Disposition {
        match self.get(event.id()) {
            Some(hook) => hook(event),
            None => Disposition::Transmit,
        }
    }
}

/// Outgoing channel to the host. One call per complete frame.
pub trait PacketSink {
    fn transmit(&mut self, frame: &[u8]);
}

/// Anything that accepts events on behalf of the host link.
///
/// Implemented by [`EventGateway`]; the link manager and timer code only
/// ever see this trait.
pub trait EventSink {
    /// Send `event` now, unless its hook suppresses it.
    fn emit(&mut self, event: &Event<'_>) -> Emission;

    /// Hold `event` until the current response has been sent.
    fn queue(&mut self, event: &Event<'_>) -> Emission;
}

/// Hook table, host sink and deferred-event queue.
pub struct EventGateway<S> {
    sink: S,
    hooks: EventHooks,
    pending: Deque<Frame, EVENT_QUEUE_DEPTH>,
}

impl<S: PacketSink> EventGateway<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            hooks: EventHooks::new(),
            pending: Deque::new(),
        }
    }

    pub fn hooks(&self) -> &EventHooks {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut EventHooks {
        &mut self.hooks
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Send a response frame. Responses never pass through hooks.
    pub fn respond(&mut self, class: u8, command: u8, payload: &[u8]) {
        let mut buf = [0u8; MAX_FRAME];
        let n = encode_frame(PacketType::Response, class, command, payload, &mut buf);
        if n > 0 {
            self.sink.transmit(&buf[..n]);
        }
    }

    /// Transmit every queued event in order.
    pub fn flush(&mut self) {
        while let Some(frame) = self.pending.pop_front() {
            self.sink.transmit(&frame);
        }
    }

    /// Number of events waiting for [`flush`](Self::flush).
    pub fn queued(&self) -> usize {
        self.pending.len()
    }

    fn admit(&self, event: &Event<'_>) -> bool {
        match self.hooks.offer(event) {
            Disposition::Transmit => true,
            Disposition::Suppress => {
                debug!("event {:?} suppressed by hook", event.id());
                false
            }
        }
    }
}

impl<S: PacketSink> EventSink for EventGateway<S> {
    fn emit(&mut self, event: &Event<'_>) -> Emission {
        if !self.admit(event) {
            return Emission::Suppressed;
        }
        let frame = event.to_frame();
        self.sink.transmit(&frame);
        Emission::Sent
    }

    fn queue(&mut self, event: &Event<'_>) -> Emission {
        if !self.admit(event) {
            return Emission::Suppressed;
        }
        let frame = event.to_frame();
        if let Err(frame) = self.pending.push_back(frame) {
            warn!("event queue full, sending {:?} immediately", event.id());
            self.sink.transmit(&frame);
        }
        Emission::Sent
    }
}

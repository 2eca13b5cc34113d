//! Bluetooth link manager.
//!
//! Owns everything the controller knows about the radio module: readiness,
//! operating mode and page mode, the pairing table, the active link set
//! and the single pending-operation gate. Host commands and radio
//! notifications both mutate it through `&mut self`; commands go out
//! through a [`RadioLink`] and state changes are reported through an
//! [`EventSink`].

use super::command::{CallTarget, RadioCommand};
use super::notify::RadioNotification;
use super::pairing::{DeviceIndexes, PairingEntry, PairingTable};
use super::{BluetoothMode, LinkSet, MacAddress, PageMode, PendingOperation, Profile, RadioLink, RadioMode};
use crate::config::{AUTOCALL_RETRY_SECS, DISCOVER_MAX_SECS, DISCOVER_MIN_SECS, INQUIRY_NAME_LEN};
use crate::error::Error;
use crate::protocol::event::{Event, EventSink};

/// `connection_status` value for an open link.
pub const CONNECTION_CONNECTED: u8 = 2;

/// Placeholder for "no pairing" / "no profile" in status events.
const NONE: u8 = 0xFF;

/// Where a mode change came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Origin {
    /// A host `bluetooth_set_mode` command, which answers with its own
    /// response packet.
    HostCommand,
    /// Firmware-internal change; the host learns about it from the
    /// `bluetooth_mode` event.
    Local,
}

/// Outgoing call in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CallRequest {
    address: MacAddress,
    target: CallTarget,
    /// Link id assigned by the module once it accepted the call.
    link: Option<u8>,
}

pub struct LinkManager {
    ready: bool,
    initialized: bool,
    mode: BluetoothMode,
    /// Last page mode sent to the module; `None` until one was sent.
    page_mode: Option<PageMode>,
    pending: PendingOperation,
    pairings: PairingTable,
    links: LinkSet,
    last_used: DeviceIndexes,
    local_address: MacAddress,
    radio_mode: RadioMode,
    autocall_target: u8,
    reconnect_due: bool,
    last_autocall: Option<u32>,
    call: Option<CallRequest>,
}

impl Default for LinkManager {
    fn default() -> Self {
        Self::new(BluetoothMode::Manual)
    }
}

impl LinkManager {
    /// Fresh manager; the radio is not ready until it reports `READY.`.
    pub const fn new(mode: BluetoothMode) -> Self {
        Self {
            ready: false,
            initialized: false,
            mode,
            page_mode: None,
            pending: PendingOperation::Idle,
            pairings: PairingTable::new(),
            links: LinkSet::empty(),
            last_used: DeviceIndexes {
                spp: None,
                iap: None,
                hid: None,
                raw_hid: None,
                hfp: None,
                avrcp: None,
            },
            local_address: MacAddress([0; 6]),
            radio_mode: RadioMode::Command,
            autocall_target: 0,
            reconnect_due: false,
            last_autocall: None,
            call: None,
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn mode(&self) -> BluetoothMode {
        self.mode
    }

    pub fn page_mode(&self) -> Option<PageMode> {
        self.page_mode
    }

    pub fn pending(&self) -> PendingOperation {
        self.pending
    }

    pub fn pairings(&self) -> &PairingTable {
        &self.pairings
    }

    pub fn links(&self) -> LinkSet {
        self.links
    }

    pub fn last_used(&self) -> &DeviceIndexes {
        &self.last_used
    }

    pub fn local_address(&self) -> MacAddress {
        self.local_address
    }

    pub fn autocall_target(&self) -> u8 {
        self.autocall_target
    }

    pub fn radio_mode(&self) -> RadioMode {
        self.radio_mode
    }

    /// Switch between plain command mode and MUX mode for outgoing commands.
    pub fn set_radio_mode(&mut self, mode: RadioMode) {
        self.radio_mode = mode;
    }

    // ── Host commands ──────────────────────────────────────────────────

    pub fn get_mode(&self) -> Result<BluetoothMode, Error> {
        self.ensure_ready()?;
        Ok(self.mode)
    }

    /// Change the operating mode and reconfigure the radio to match.
    ///
    /// The `bluetooth_mode` event is emitted after every successful call
    /// (changed or not) unless `origin` is [`Origin::HostCommand`].
    pub fn set_mode(
        &mut self,
        mode: u8,
        origin: Origin,
        radio: &mut impl RadioLink,
        events: &mut impl EventSink,
    ) -> Result<(), Error> {
        let mode = BluetoothMode::from_u8(mode).ok_or(Error::ParameterRange)?;
        self.ensure_ready()?;

        if mode != self.mode {
            info!("bluetooth: mode {} -> {}", self.mode as u8, mode as u8);
            self.autocall_target = 0;
            match mode {
                BluetoothMode::Disabled => {
                    self.send(radio, RadioCommand::SetPageMode(PageMode::Off));
                    self.page_mode = Some(PageMode::Off);
                    self.close_all(radio);
                }
                BluetoothMode::Visible => self.apply_page_mode(PageMode::Visible, radio),
                BluetoothMode::Autocall => {
                    self.autocall_target = 1;
                    self.reconnect_due = true;
                    self.apply_paired_page_mode(radio);
                }
                BluetoothMode::Manual => self.apply_paired_page_mode(radio),
            }
            self.mode = mode;
        }

        if origin == Origin::Local {
            events.emit(&Event::BluetoothMode {
                mode: self.mode as u8,
            });
        }
        Ok(())
    }

    /// Reset the radio module. Readiness returns with the next `READY.`.
    pub fn reset(&mut self, radio: &mut impl RadioLink) -> Result<(), Error> {
        self.ensure_ready()?;
        self.restart(radio);
        Ok(())
    }

    /// Reset the radio module whether or not it is ready (power-on, full
    /// system reset).
    pub fn restart(&mut self, radio: &mut impl RadioLink) {
        info!("bluetooth: restarting radio module");
        self.ready = false;
        self.initialized = false;
        self.set_pending(PendingOperation::Idle);
        self.call = None;
        self.send(radio, RadioCommand::Reset);
    }

    /// Module address in wire order.
    pub fn get_mac(&self) -> Result<[u8; 6], Error> {
        self.ensure_ready()?;
        Ok(self.local_address.to_wire())
    }

    /// Pairing count; one `pairing_status` event per entry is queued.
    pub fn get_pairings(&self, events: &mut impl EventSink) -> Result<u8, Error> {
        self.ensure_ready()?;
        let count = self.pairings.len() as u8;
        for index in 0..count {
            let entry = self.pairings.get(index)?;
            let handles = entry.active_links();
            events.queue(&Event::BluetoothPairingStatus {
                pairing: index,
                address: entry.address,
                priority: entry.priority,
                profiles_supported: entry.profiles_supported,
                profiles_active: entry.profiles_active,
                handles: &handles,
            });
        }
        Ok(count)
    }

    /// Start an inquiry lasting `duration` seconds.
    pub fn discover(&mut self, duration: u8, radio: &mut impl RadioLink) -> Result<(), Error> {
        self.ensure_ready()?;
        if !(DISCOVER_MIN_SECS..=DISCOVER_MAX_SECS).contains(&duration) {
            return Err(Error::ParameterRange);
        }
        self.ensure_idle()?;
        self.send(radio, RadioCommand::Inquiry { duration });
        self.set_pending(PendingOperation::PendingInquiry);
        Ok(())
    }

    /// Request pairing with the device at `address` (wire order).
    pub fn pair(&mut self, address: [u8; 6], radio: &mut impl RadioLink) -> Result<(), Error> {
        self.ensure_ready()?;
        self.ensure_idle()?;
        self.send(radio, RadioCommand::Pair(MacAddress::from_wire(address)));
        self.set_pending(PendingOperation::PendingPair);
        Ok(())
    }

    pub fn delete_pairing(&mut self, index: u8, radio: &mut impl RadioLink) -> Result<(), Error> {
        self.ensure_ready()?;
        self.pairings.check_index(index)?;
        let address = self.pairings.get(index)?.address;

        self.send(radio, RadioCommand::ForgetPairing(address));
        for link in self.links.iter() {
            if matches!(self.pairings.owner_of_link(link), Some((owner, _)) if owner == index) {
                self.send(radio, RadioCommand::Close(link));
            }
        }

        self.pairings.remove(index);
        self.last_used.shift_after_removal(index);
        info!("bluetooth: pairing {} removed, {} left", index, self.pairings.len());

        if self.pairings.is_empty() && self.mode.follows_pairings() {
            self.apply_page_mode(PageMode::Pairable, radio);
        }
        Ok(())
    }

    pub fn clear_pairings(
        &mut self,
        radio: &mut impl RadioLink,
        events: &mut impl EventSink,
    ) -> Result<(), Error> {
        self.ensure_ready()?;
        self.pairings.clear();
        self.send(radio, RadioCommand::ForgetAllPairings);
        self.close_all(radio);
        self.last_used.clear();
        info!("bluetooth: all pairings cleared");

        if self.mode.follows_pairings() {
            self.apply_page_mode(PageMode::Pairable, radio);
        }
        events.queue(&Event::BluetoothPairingsCleared);
        Ok(())
    }

    /// Open link count; one `connection_status` event per open link is
    /// queued.
    pub fn get_connections(&self, events: &mut impl EventSink) -> Result<u8, Error> {
        self.ensure_ready()?;
        for link in self.links.iter() {
            let event = match self.pairings.owner_of_link(link) {
                Some((pairing, profile)) => Event::BluetoothConnectionStatus {
                    handle: link,
                    address: self.pairings.get(pairing)?.address,
                    pairing,
                    profile: profile.mask(),
                    status: CONNECTION_CONNECTED,
                },
                // Pairing deleted while the link was still closing.
                None => Event::BluetoothConnectionStatus {
                    handle: link,
                    address: MacAddress::UNKNOWN,
                    pairing: NONE,
                    profile: NONE,
                    status: CONNECTION_CONNECTED,
                },
            };
            events.queue(&event);
        }
        Ok(self.links.count())
    }

    /// Call pairing `index` using the profile selected by `profile_mask`.
    pub fn connect(&mut self, index: u8, profile_mask: u8, radio: &mut impl RadioLink) -> Result<(), Error> {
        self.ensure_ready()?;
        self.pairings.check_index(index)?;
        self.ensure_idle()?;
        let address = self.pairings.get(index)?.address;
        self.start_call(address, CallTarget::for_profile_mask(profile_mask), radio);
        Ok(())
    }

    pub fn disconnect(&mut self, link: u8, radio: &mut impl RadioLink) -> Result<(), Error> {
        self.ensure_ready()?;
        if !self.links.contains(link) {
            return Err(Error::ParameterRange);
        }
        self.send(radio, RadioCommand::Close(link));
        Ok(())
    }

    // ── Radio notifications ────────────────────────────────────────────

    /// Apply one parsed notification from the module.
    pub fn notify(
        &mut self,
        notification: RadioNotification<'_>,
        radio: &mut impl RadioLink,
        events: &mut impl EventSink,
    ) {
        match notification {
            RadioNotification::Ready => self.on_ready(radio, events),
            RadioNotification::LocalAddress(address) => {
                debug!("bluetooth: local address {}", address);
                self.local_address = address;
            }
            RadioNotification::Multiplexing(enabled) => {
                let mode = if enabled { RadioMode::Mux } else { RadioMode::Command };
                if mode != self.radio_mode {
                    info!("bluetooth: radio link now {:?}", mode);
                    self.set_radio_mode(mode);
                }
            }
            RadioNotification::PairingAdded(address) => self.on_pairing_added(address, radio, events),
            RadioNotification::PairingFailed(address) => {
                warn!("bluetooth: pairing with {} failed", address);
                self.release(PendingOperation::PendingPair);
                events.emit(&Event::BluetoothPairingFailed { address });
            }
            RadioNotification::InquiryResult {
                address,
                class_of_device,
                name,
                rssi,
            } => {
                let name = name.as_bytes();
                let name = &name[..name.len().min(INQUIRY_NAME_LEN)];
                events.emit(&Event::BluetoothInquiryResponse {
                    address,
                    class_of_device,
                    rssi,
                    status: 0,
                    pairing: self.pairings.position(&address).unwrap_or(NONE),
                    name,
                });
            }
            RadioNotification::InquiryComplete { count } => {
                self.release(PendingOperation::PendingInquiry);
                events.emit(&Event::BluetoothInquiryComplete { count });
            }
            RadioNotification::CallStarted { link } => match self.call.as_mut() {
                Some(call) => call.link = Some(link),
                None => warn!("bluetooth: CALL {} without a request", link),
            },
            RadioNotification::Connected { link, profile } => {
                let Some(call) = self.call.filter(|c| c.link == Some(link)) else {
                    warn!("bluetooth: CONNECT {} does not match a call", link);
                    return;
                };
                self.call = None;
                self.release(PendingOperation::PendingCall);
                let pairing = self.pairings.position(&call.address);
                self.open_link(link, pairing, profile.unwrap_or(call.target.profile()), events);
            }
            RadioNotification::Ring { link, address, profile } => {
                let pairing = self.pairings.position(&address);
                self.open_link(link, pairing, profile.unwrap_or(Profile::HidControl), events);
            }
            RadioNotification::NoCarrier { link, reason } => self.on_no_carrier(link, reason, events),
        }
    }

    /// Autocall driver, called once per second with the uptime.
    ///
    /// In autocall mode, with nothing connected and the gate idle, calls
    /// the last HID device (or pairing 0) right after the mode switch and
    /// then every [`AUTOCALL_RETRY_SECS`] seconds.
    pub fn poll_autocall(&mut self, now: u32, radio: &mut impl RadioLink) {
        if self.mode != BluetoothMode::Autocall
            || self.autocall_target == 0
            || !self.ready
            || self.pending != PendingOperation::Idle
            || !self.links.is_empty()
            || self.pairings.is_empty()
        {
            return;
        }
        let retry = match self.last_autocall {
            Some(last) => now.wrapping_sub(last) >= AUTOCALL_RETRY_SECS,
            None => true,
        };
        if !(self.reconnect_due || retry) {
            return;
        }
        self.reconnect_due = false;
        self.last_autocall = Some(now);

        let index = self
            .last_used
            .hid
            .filter(|&i| (i as usize) < self.pairings.len())
            .unwrap_or(0);
        if let Ok(entry) = self.pairings.get(index) {
            let address = entry.address;
            info!("bluetooth: autocall pairing {}", index);
            self.start_call(address, CallTarget::Hid, radio);
        }
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn ensure_ready(&self) -> Result<(), Error> {
        if self.ready {
            Ok(())
        } else {
            Err(Error::InterfaceNotReady)
        }
    }

    fn ensure_idle(&self) -> Result<(), Error> {
        if self.pending == PendingOperation::Idle {
            Ok(())
        } else {
            debug!("bluetooth: busy with {:?}", self.pending);
            Err(Error::InterfaceBusy)
        }
    }

    fn set_pending(&mut self, pending: PendingOperation) {
        if self.pending != pending {
            debug!("bluetooth: gate {:?} -> {:?}", self.pending, pending);
            self.pending = pending;
        }
    }

    /// Reopen the gate if it is held by `op`.
    fn release(&mut self, op: PendingOperation) {
        if self.pending == op {
            self.set_pending(PendingOperation::Idle);
        }
    }

    fn send(&self, radio: &mut impl RadioLink, command: RadioCommand) {
        let line = command.render();
        trace!("radio <- {}", line.as_str());
        radio.send_command(&line, self.radio_mode);
    }

    /// Send `page` unless the module is already in it.
    fn apply_page_mode(&mut self, page: PageMode, radio: &mut impl RadioLink) {
        if self.page_mode != Some(page) {
            info!("bluetooth: page mode {}", page as u8);
            self.send(radio, RadioCommand::SetPageMode(page));
            self.page_mode = Some(page);
        }
    }

    /// Manual/autocall visibility: connectable only once something is paired.
    fn apply_paired_page_mode(&mut self, radio: &mut impl RadioLink) {
        let page = if self.pairings.is_empty() {
            PageMode::Pairable
        } else {
            PageMode::Connectable
        };
        self.apply_page_mode(page, radio);
    }

    /// Page mode for the current operating mode, as after a radio reset.
    fn apply_mode_page_mode(&mut self, radio: &mut impl RadioLink) {
        match self.mode {
            BluetoothMode::Disabled => self.apply_page_mode(PageMode::Off, radio),
            BluetoothMode::Visible => self.apply_page_mode(PageMode::Visible, radio),
            BluetoothMode::Manual | BluetoothMode::Autocall => self.apply_paired_page_mode(radio),
        }
    }

    fn close_all(&self, radio: &mut impl RadioLink) {
        for link in self.links.iter() {
            self.send(radio, RadioCommand::Close(link));
        }
    }

    fn start_call(&mut self, address: MacAddress, target: CallTarget, radio: &mut impl RadioLink) {
        self.send(radio, RadioCommand::Call { address, target });
        self.call = Some(CallRequest {
            address,
            target,
            link: None,
        });
        self.set_pending(PendingOperation::PendingCall);
    }

    fn open_link(&mut self, link: u8, pairing: Option<u8>, profile: Profile, events: &mut impl EventSink) {
        if !self.links.insert(link) {
            warn!("bluetooth: link id {} out of range", link);
            return;
        }
        let address = match pairing.and_then(|i| self.pairings.get_mut(i).ok()) {
            Some(entry) => {
                entry.attach(profile, link);
                entry.address
            }
            None => MacAddress::UNKNOWN,
        };
        if let Some(index) = pairing {
            self.last_used.record(profile, index);
        }
        info!("bluetooth: link {} open", link);
        events.emit(&Event::BluetoothConnectionStatus {
            handle: link,
            address,
            pairing: pairing.unwrap_or(NONE),
            profile: profile.mask(),
            status: CONNECTION_CONNECTED,
        });
    }

    fn on_ready(&mut self, radio: &mut impl RadioLink, events: &mut impl EventSink) {
        info!("bluetooth: radio ready");
        self.ready = true;
        self.initialized = true;
        self.set_pending(PendingOperation::Idle);
        self.call = None;
        // A module reset drops every link and forgets its page mode.
        self.links.clear();
        for entry in self.pairings.iter_mut() {
            entry.detach_all();
        }
        self.page_mode = None;
        self.apply_mode_page_mode(radio);
        // The listing re-reports stored pairings and the MUX setting.
        self.send(radio, RadioCommand::ListSettings);
        events.emit(&Event::BluetoothReady);
    }

    fn on_pairing_added(&mut self, address: MacAddress, radio: &mut impl RadioLink, events: &mut impl EventSink) {
        self.release(PendingOperation::PendingPair);
        let index = match self.pairings.position(&address) {
            Some(index) => index,
            None => match self.pairings.push(PairingEntry::new(address)) {
                Ok(index) => {
                    info!("bluetooth: pairing {} added ({})", index, address);
                    index
                }
                Err(_) => {
                    warn!("bluetooth: pairing table full, ignoring {}", address);
                    return;
                }
            },
        };

        if let Ok(entry) = self.pairings.get(index) {
            let handles = entry.active_links();
            events.emit(&Event::BluetoothPairingStatus {
                pairing: index,
                address: entry.address,
                priority: entry.priority,
                profiles_supported: entry.profiles_supported,
                profiles_active: entry.profiles_active,
                handles: &handles,
            });
        }

        if self.ready && self.mode.follows_pairings() {
            self.apply_paired_page_mode(radio);
        }
    }

    fn on_no_carrier(&mut self, link: u8, reason: u16, events: &mut impl EventSink) {
        let failed_call = matches!(self.call, Some(c) if c.link == Some(link) || c.link.is_none());
        if failed_call && !self.links.contains(link) {
            debug!("bluetooth: call failed, reason 0x{:04X}", reason);
            self.call = None;
            self.release(PendingOperation::PendingCall);
        } else if !self.links.contains(link) {
            debug!("bluetooth: NO CARRIER for unknown link {}", link);
            return;
        }

        self.links.remove(link);
        for entry in self.pairings.iter_mut() {
            entry.detach(link);
        }
        info!("bluetooth: link {} closed", link);
        events.emit(&Event::BluetoothConnectionClosed { handle: link, reason });
    }
}

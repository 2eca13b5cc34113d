//! Top-level controller.
//!
//! Owns all protocol state and the three outside collaborators (radio
//! link, host sink, board). The embedding firmware feeds it host packets,
//! radio notification lines and the 100 Hz tick, one call at a time.

use crate::bluetooth::notify::parse_line;
use crate::bluetooth::{LinkManager, Origin, RadioLink};
use crate::config::{
    build_timestamp, DeviceProfile, FIRMWARE_VERSION_MAJOR, FIRMWARE_VERSION_MINOR,
    FIRMWARE_VERSION_PATCH, PROTOCOL_VERSION,
};
use crate::error::{result_code, Error};
use crate::protocol::dispatch::{validate, CommandId, Reply};
use crate::protocol::event::{Event, EventGateway, EventHook, EventId, EventSink, PacketSink};
use crate::protocol::{PacketClass, ParamReader, PayloadWriter};
use crate::system::{report_capabilities, Board, ResetMode};
use crate::timer::{Clock, SoftTimers};

pub struct Controller<R, S, B> {
    radio: R,
    events: EventGateway<S>,
    board: B,
    profile: DeviceProfile,
    bluetooth: LinkManager,
    timers: SoftTimers,
    clock: Clock,
}

impl<R: RadioLink, S: PacketSink, B: Board> Controller<R, S, B> {
    pub fn new(radio: R, sink: S, board: B, profile: DeviceProfile) -> Self {
        Self {
            radio,
            events: EventGateway::new(sink),
            board,
            profile,
            bluetooth: LinkManager::default(),
            timers: SoftTimers::new(),
            clock: Clock::new(),
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn bluetooth(&self) -> &LinkManager {
        &self.bluetooth
    }

    pub fn timers(&self) -> &SoftTimers {
        &self.timers
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn sink(&self) -> &S {
        self.events.sink()
    }

    pub fn sink_mut(&mut self) -> &mut S {
        self.events.sink_mut()
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    // ── Event hooks ────────────────────────────────────────────────────

    /// Intercept every future event with id `id`.
    pub fn register_hook(&mut self, id: EventId, hook: EventHook) -> Result<(), EventHook> {
        self.events.hooks_mut().register(id, hook)
    }

    pub fn unregister_hook(&mut self, id: EventId) -> Option<EventHook> {
        self.events.hooks_mut().unregister(id)
    }

    // ── Entry points ───────────────────────────────────────────────────

    /// Announce the firmware to the host (`system_boot`, `system_ready`).
    pub fn boot(&mut self) {
        self.events.emit(&Event::SystemBoot {
            major: FIRMWARE_VERSION_MAJOR,
            minor: FIRMWARE_VERSION_MINOR,
            patch: FIRMWARE_VERSION_PATCH,
            protocol: PROTOCOL_VERSION,
            timestamp: build_timestamp(),
        });
        self.events.emit(&Event::SystemReady);
    }

    /// Power-on: announce the boot and reset the radio module, which
    /// answers `READY.` once it accepts commands.
    pub fn start(&mut self) {
        self.boot();
        self.bluetooth.restart(&mut self.radio);
    }

    /// Handle one complete host packet.
    ///
    /// Validation failures are returned without any side effect; a valid
    /// command always produces its response (unless the handler replied
    /// itself) followed by any events it queued.
    pub fn dispatch(&mut self, raw: &[u8]) -> Result<(), Error> {
        let (descriptor, params) = validate(raw).inspect_err(|e| {
            warn!("dispatch: rejected packet: {}", e.code());
        })?;
        trace!("dispatch: {:?}", descriptor.id);

        if let Reply::Respond(payload) = self.execute(descriptor.id, params) {
            self.events
                .respond(descriptor.class, descriptor.command, payload.as_slice());
        }
        self.events.flush();
        Ok(())
    }

    /// [`dispatch`](Self::dispatch), reporting rejections to the host as a
    /// `protocol_error` event.
    pub fn process(&mut self, raw: &[u8]) -> Result<(), Error> {
        self.dispatch(raw).inspect_err(|e| {
            self.events.emit(&Event::ProtocolError { code: e.code() });
        })
    }

    /// 100 Hz scheduler hook.
    pub fn tick(&mut self) {
        self.clock.advance();
        for handle in self.timers.take_due(self.clock) {
            self.events.emit(&Event::SystemTimerTick {
                handle,
                seconds: self.clock.seconds,
                subticks: self.clock.ticks,
            });
        }
        if self.clock.ticks == 0 {
            self.bluetooth.poll_autocall(self.clock.seconds, &mut self.radio);
        }
    }

    /// Handle one text line from the radio module.
    pub fn radio_line(&mut self, line: &str) {
        match parse_line(line) {
            Some(notification) => {
                self.bluetooth
                    .notify(notification, &mut self.radio, &mut self.events)
            }
            None => trace!("radio -> (ignored) {}", line),
        }
    }

    /// Change the Bluetooth mode from firmware code; the host is told
    /// through a `bluetooth_mode` event.
    pub fn set_bluetooth_mode(&mut self, mode: u8) -> Result<(), Error> {
        self.bluetooth
            .set_mode(mode, Origin::Local, &mut self.radio, &mut self.events)
    }

    /// Emit `system_battery_status` with the board's current reading.
    pub fn report_battery(&mut self) {
        let battery = self.board.battery();
        self.events.emit(&Event::SystemBatteryStatus {
            status: battery.status,
            level: battery.level,
        });
    }

    /// Emit `system_error` for a fault detected outside the protocol core.
    pub fn report_error(&mut self, code: u16) {
        error!("system error 0x{:04X}", code);
        self.events.emit(&Event::SystemError { code });
    }

    // ── Handlers ───────────────────────────────────────────────────────

    fn execute(&mut self, id: CommandId, params: &[u8]) -> Reply {
        let mut p = ParamReader::new(params);
        let mut w = PayloadWriter::new();

        match id {
            CommandId::SystemPing => {
                w.u32(self.clock.seconds);
            }
            CommandId::SystemReset => match ResetMode::from_u8(p.u8()) {
                Ok(mode) => {
                    self.events
                        .respond(PacketClass::System as u8, 0x02, &0u16.to_le_bytes());
                    self.reset(mode);
                    return Reply::NoResponse;
                }
                Err(e) => {
                    w.u16(e.code());
                }
            },
            CommandId::SystemGetInfo => {
                w.u16(FIRMWARE_VERSION_MAJOR)
                    .u16(FIRMWARE_VERSION_MINOR)
                    .u16(FIRMWARE_VERSION_PATCH)
                    .u16(PROTOCOL_VERSION)
                    .u32(build_timestamp());
            }
            CommandId::SystemGetCapabilities => {
                let count = report_capabilities(&self.profile, p.u8(), &mut self.events);
                w.u16(count);
            }
            CommandId::SystemGetMemory => {
                let memory = self.board.memory();
                w.u32(memory.free).u32(memory.total);
            }
            CommandId::SystemGetBatteryStatus => {
                let battery = self.board.battery();
                w.u8(battery.status).u8(battery.level);
            }
            CommandId::SystemSetTimer => {
                let handle = p.u8();
                let interval = p.u16();
                let oneshot = p.u8();
                let r = self.timers.set(handle, interval, oneshot, self.clock);
                w.u16(result_code(&r));
            }

            CommandId::BluetoothGetMode => {
                let r = self.bluetooth.get_mode();
                w.u16(result_code(&r)).u8(r.map_or(0xFF, |m| m as u8));
            }
            CommandId::BluetoothSetMode => {
                let r = self.bluetooth.set_mode(
                    p.u8(),
                    Origin::HostCommand,
                    &mut self.radio,
                    &mut self.events,
                );
                w.u16(result_code(&r));
            }
            CommandId::BluetoothReset => {
                let r = self.bluetooth.reset(&mut self.radio);
                w.u16(result_code(&r));
            }
            CommandId::BluetoothGetMac => {
                let r = self.bluetooth.get_mac();
                w.u16(result_code(&r)).bytes(&r.unwrap_or([0; 6]));
            }
            CommandId::BluetoothGetPairings => {
                let r = self.bluetooth.get_pairings(&mut self.events);
                w.u16(result_code(&r)).u8(r.unwrap_or(0));
            }
            CommandId::BluetoothDiscover => {
                let r = self.bluetooth.discover(p.u8(), &mut self.radio);
                w.u16(result_code(&r));
            }
            CommandId::BluetoothPair => {
                let r = self.bluetooth.pair(p.array::<6>(), &mut self.radio);
                w.u16(result_code(&r));
            }
            CommandId::BluetoothDeletePairing => {
                let r = self.bluetooth.delete_pairing(p.u8(), &mut self.radio);
                w.u16(result_code(&r));
            }
            CommandId::BluetoothClearPairings => {
                let r = self
                    .bluetooth
                    .clear_pairings(&mut self.radio, &mut self.events);
                w.u16(result_code(&r));
            }
            CommandId::BluetoothGetConnections => {
                let r = self.bluetooth.get_connections(&mut self.events);
                w.u16(result_code(&r)).u8(r.unwrap_or(0));
            }
            CommandId::BluetoothConnect => {
                let pairing = p.u8();
                let profile = p.u8();
                let r = self.bluetooth.connect(pairing, profile, &mut self.radio);
                w.u16(result_code(&r));
            }
            CommandId::BluetoothDisconnect => {
                let r = self.bluetooth.disconnect(p.u8(), &mut self.radio);
                w.u16(result_code(&r));
            }
        }
        Reply::Respond(w)
    }

    /// Reinitialise after `system_reset`.
    fn reset(&mut self, mode: ResetMode) {
        info!("system reset, mode {}", mode as u8);
        self.timers.clear();
        self.clock = Clock::new();
        if mode == ResetMode::Full {
            // The module keeps its MUX setting across a reset.
            let radio_mode = self.bluetooth.radio_mode();
            self.bluetooth = LinkManager::default();
            self.bluetooth.set_radio_mode(radio_mode);
            self.bluetooth.restart(&mut self.radio);
        }
        self.board.reset(mode);
        self.boot();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::RadioMode;
    use crate::testing::{test_controller, TestController};

    fn ready() -> TestController {
        let mut c = test_controller();
        c.radio_line("READY.");
        c.sink_mut().frames.clear();
        c.radio_mut().commands.clear();
        c
    }

    #[test]
    fn ping_reports_uptime() {
        let mut c = ready();
        for _ in 0..250 {
            c.tick();
        }
        c.dispatch(&[0xC0, 0x00, 0x01, 0x01]).unwrap();
        assert_eq!(c.sink().frames, vec![vec![0xC0, 4, 0x01, 0x01, 2, 0, 0, 0]]);
    }

    #[test]
    fn rejected_packet_has_no_response() {
        let mut c = ready();
        assert_eq!(c.dispatch(&[0xC0, 0x01, 0x07, 0x01, 0x00]), Err(Error::ParameterLength));
        assert!(c.sink().frames.is_empty());
    }

    #[test]
    fn process_reports_protocol_error() {
        let mut c = ready();
        assert_eq!(c.process(&[0xC0, 0x00, 0x09, 0x01]), Err(Error::InvalidCommand));
        assert_eq!(c.sink().frames, vec![vec![0x80, 2, 0x00, 0x01, 0x01, 0x00]]);
    }

    #[test]
    fn get_info_layout() {
        let mut c = ready();
        c.dispatch(&[0xC0, 0x00, 0x01, 0x03]).unwrap();
        let frame = &c.sink().frames[0];
        assert_eq!(frame[1], 12);
        assert_eq!(frame[4..6], FIRMWARE_VERSION_MAJOR.to_le_bytes());
        assert_eq!(frame[10..12], PROTOCOL_VERSION.to_le_bytes());
    }

    #[test]
    fn memory_and_battery_come_from_board() {
        let mut c = ready();
        c.dispatch(&[0xC0, 0x00, 0x01, 0x05]).unwrap();
        c.dispatch(&[0xC0, 0x00, 0x01, 0x06]).unwrap();
        let frames = &c.sink().frames;
        assert_eq!(frames[0][4..], [0x00, 0x10, 0, 0, 0x00, 0x00, 0x04, 0]);
        assert_eq!(frames[1][4..], [1, 87]);
    }

    #[test]
    fn bad_reset_mode_gets_normal_response() {
        let mut c = ready();
        c.dispatch(&[0xC0, 0x01, 0x01, 0x02, 0x03]).unwrap();
        assert_eq!(c.sink().frames, vec![vec![0xC0, 2, 0x01, 0x02, 0x03, 0x00]]);
        assert!(c.board().resets.is_empty());
    }

    #[test]
    fn reset_replies_before_resetting() {
        let mut c = ready();
        c.dispatch(&[0xC0, 0x04, 0x01, 0x07, 0x00, 0x0A, 0x00, 0x00]).unwrap();
        c.sink_mut().frames.clear();

        c.dispatch(&[0xC0, 0x01, 0x01, 0x02, 0x01]).unwrap();
        let frames = &c.sink().frames;
        assert_eq!(frames[0], vec![0xC0, 2, 0x01, 0x02, 0x00, 0x00]);
        // boot + ready, no second response
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1][..4], [0x80, 12, 0x01, 0x01]);
        assert_eq!(frames[2], vec![0x80, 0, 0x01, 0x02]);
        assert_eq!(c.board().resets, vec![ResetMode::Full]);
        assert!(!c.timers().get(0).unwrap().active);
        assert!(!c.bluetooth().is_ready());
        assert_eq!(c.radio().sent(), vec!["RESET"]);
    }

    #[test]
    fn full_reset_keeps_mux_framing() {
        let mut c = ready();
        c.radio_line("SET CONTROL MUX 1");
        c.dispatch(&[0xC0, 0x01, 0x01, 0x02, 0x01]).unwrap();
        assert_eq!(c.bluetooth().radio_mode(), RadioMode::Mux);
        assert_eq!(c.radio().sent().last(), Some(&"RESET"));
        assert_eq!(c.radio().modes.last(), Some(&RadioMode::Mux));
    }

    #[test]
    fn start_announces_and_resets_radio() {
        let mut c = test_controller();
        c.start();
        let frames = &c.sink().frames;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0][..4], [0x80, 12, 0x01, 0x01]);
        assert_eq!(frames[1], vec![0x80, 0, 0x01, 0x02]);
        assert_eq!(c.radio().sent(), vec!["RESET"]);
        assert!(!c.bluetooth().is_ready());
    }

    #[test]
    fn core_only_reset_keeps_bluetooth() {
        let mut c = ready();
        c.dispatch(&[0xC0, 0x01, 0x01, 0x02, 0x02]).unwrap();
        assert!(c.bluetooth().is_ready());
        assert_eq!(c.board().resets, vec![ResetMode::CoreOnly]);
    }

    #[test]
    fn timer_fires_tick_events() {
        let mut c = ready();
        // handle 1, every 3 ticks, repeating
        c.dispatch(&[0xC0, 0x04, 0x01, 0x07, 0x01, 0x03, 0x00, 0x00]).unwrap();
        assert_eq!(c.sink().frames[0], vec![0xC0, 2, 0x01, 0x07, 0, 0]);
        c.sink_mut().frames.clear();

        for _ in 0..6 {
            c.tick();
        }
        let frames = &c.sink().frames;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], vec![0x80, 6, 0x01, 0x06, 1, 0, 0, 0, 0, 3]);
        assert_eq!(frames[1], vec![0x80, 6, 0x01, 0x06, 1, 0, 0, 0, 0, 6]);
    }

    #[test]
    fn set_timer_rejects_bad_handle() {
        let mut c = ready();
        c.dispatch(&[0xC0, 0x04, 0x01, 0x07, 0x08, 0x0A, 0x00, 0x00]).unwrap();
        assert_eq!(c.sink().frames[0], vec![0xC0, 2, 0x01, 0x07, 0x03, 0x00]);
    }

    #[test]
    fn capabilities_follow_response() {
        let mut c = ready();
        c.dispatch(&[0xC0, 0x01, 0x01, 0x04, 0x00]).unwrap();
        let frames = &c.sink().frames;
        assert_eq!(frames.len(), 8);
        assert_eq!(frames[0], vec![0xC0, 2, 0x01, 0x04, 7, 0]);
        assert!(frames[1..].iter().all(|f| f[0] == 0x80 && f[3] == 0x04));
    }

    #[test]
    fn local_mode_change_emits_event() {
        let mut c = ready();
        c.set_bluetooth_mode(1).unwrap();
        assert_eq!(c.sink().frames, vec![vec![0x80, 1, 0x07, 0x01, 0x01]]);
    }

    #[test]
    fn report_battery_event() {
        let mut c = ready();
        c.report_battery();
        assert_eq!(c.sink().frames, vec![vec![0x80, 2, 0x01, 0x05, 1, 87]]);
    }
}

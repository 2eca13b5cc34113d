//! Integration tests: drive the controller with raw host packets and
//! radio lines, observe frames and radio commands.

use kgapi::bluetooth::RadioMode;
use kgapi::{
    BatteryStatus, Board, Controller, DeviceProfile, Disposition, Event, EventId, MemoryUsage,
    PacketAssembler, PacketSink, RadioLink, ResetMode,
};

#[derive(Default)]
struct Host {
    frames: Vec<Vec<u8>>,
}

impl PacketSink for Host {
    fn transmit(&mut self, frame: &[u8]) {
        self.frames.push(frame.to_vec());
    }
}

#[derive(Default)]
struct Radio {
    lines: Vec<String>,
}

impl RadioLink for Radio {
    fn send_command(&mut self, command: &str, _mode: RadioMode) {
        self.lines.push(command.to_string());
    }
}

#[derive(Default)]
struct Board52 {
    resets: Vec<ResetMode>,
}

impl Board for Board52 {
    fn reset(&mut self, mode: ResetMode) {
        self.resets.push(mode);
    }

    fn memory(&self) -> MemoryUsage {
        MemoryUsage {
            free: 200_000,
            total: 262_144,
        }
    }

    fn battery(&self) -> BatteryStatus {
        BatteryStatus { status: 0, level: 100 }
    }
}

type Glove = Controller<Radio, Host, Board52>;

fn glove() -> Glove {
    Controller::new(
        Radio::default(),
        Host::default(),
        Board52::default(),
        DeviceProfile::default(),
    )
}

/// Controller with the radio ready and all logs cleared.
fn ready_glove() -> Glove {
    let mut g = glove();
    g.radio_line("READY.\r\n");
    g.radio_line("SET BT BDADDR 00:07:80:aa:bb:cc");
    g.sink_mut().frames.clear();
    g.radio_mut().lines.clear();
    g
}

fn take(g: &mut Glove) -> Vec<Vec<u8>> {
    std::mem::take(&mut g.sink_mut().frames)
}

#[test]
fn boot_announces_firmware() {
    let mut g = glove();
    g.boot();
    let frames = take(&mut g);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0][..4], [0x80, 12, 0x01, 0x01]);
    assert_eq!(frames[1], vec![0x80, 0, 0x01, 0x02]);
}

#[test]
fn bluetooth_commands_before_ready_report_not_ready() {
    let mut g = glove();
    g.dispatch(&[0xC0, 0x00, 0x07, 0x01]).unwrap();
    g.dispatch(&[0xC0, 0x00, 0x07, 0x04]).unwrap();
    let frames = take(&mut g);
    assert_eq!(frames[0], vec![0xC0, 3, 0x07, 0x01, 0x01, 0x01, 0xFF]);
    assert_eq!(
        frames[1],
        vec![0xC0, 8, 0x07, 0x04, 0x01, 0x01, 0, 0, 0, 0, 0, 0]
    );
}

#[test]
fn host_mode_change_replies_without_event() {
    let mut g = ready_glove();
    g.dispatch(&[0xC0, 0x01, 0x07, 0x02, 0x01]).unwrap();
    g.dispatch(&[0xC0, 0x00, 0x07, 0x01]).unwrap();
    assert_eq!(
        take(&mut g),
        vec![
            vec![0xC0, 2, 0x07, 0x02, 0x00, 0x00],
            vec![0xC0, 3, 0x07, 0x01, 0x00, 0x00, 0x01],
        ]
    );
    assert_eq!(g.radio().lines, vec!["SET BT PAGE 3"]);
}

#[test]
fn out_of_range_mode() {
    let mut g = ready_glove();
    g.dispatch(&[0xC0, 0x01, 0x07, 0x02, 0x04]).unwrap();
    assert_eq!(take(&mut g), vec![vec![0xC0, 2, 0x07, 0x02, 0x03, 0x00]]);
    assert!(g.radio().lines.is_empty());
}

#[test]
fn length_mismatch_never_reaches_handler() {
    let mut g = ready_glove();
    // bluetooth_disconnect declared with no parameter
    assert_eq!(
        g.process(&[0xC0, 0x00, 0x07, 0x0C]),
        Err(kgapi::Error::ParameterLength)
    );
    assert_eq!(take(&mut g), vec![vec![0x80, 2, 0x00, 0x01, 0x02, 0x00]]);
    assert!(g.radio().lines.is_empty());
}

#[test]
fn mac_is_reported_in_wire_order() {
    let mut g = ready_glove();
    g.dispatch(&[0xC0, 0x00, 0x07, 0x04]).unwrap();
    assert_eq!(
        take(&mut g),
        vec![vec![0xC0, 8, 0x07, 0x04, 0, 0, 0xCC, 0xBB, 0xAA, 0x80, 0x07, 0x00]]
    );
}

#[test]
fn byte_stream_is_framed_and_dispatched() {
    let mut g = ready_glove();
    let mut asm = PacketAssembler::new();
    let stream = [
        0x00, 0x13, // line noise
        0xC0, 0x00, 0x01, 0x01, // ping
        0xC0, 0x01, 0x07, 0x06, 0x0A, // discover 10 s
    ];
    for byte in stream {
        if let Ok(Some(frame)) = asm.push(byte) {
            g.process(&frame).unwrap();
        }
    }
    let frames = take(&mut g);
    assert_eq!(frames[0], vec![0xC0, 4, 0x01, 0x01, 0, 0, 0, 0]);
    assert_eq!(frames[1], vec![0xC0, 2, 0x07, 0x06, 0, 0]);
    assert_eq!(g.radio().lines, vec!["INQUIRY 10 NAME"]);
}

#[test]
fn second_radio_operation_is_busy() {
    let mut g = ready_glove();
    g.dispatch(&[0xC0, 0x01, 0x07, 0x06, 0x0A]).unwrap();
    g.dispatch(&[0xC0, 0x06, 0x07, 0x07, 0x33, 0x22, 0x11, 0x80, 0x07, 0x00])
        .unwrap();
    let frames = take(&mut g);
    assert_eq!(frames[1], vec![0xC0, 2, 0x07, 0x07, 0x02, 0x01]);

    g.radio_line("INQUIRY 0");
    g.dispatch(&[0xC0, 0x06, 0x07, 0x07, 0x33, 0x22, 0x11, 0x80, 0x07, 0x00])
        .unwrap();
    let frames = take(&mut g);
    assert_eq!(frames[0], vec![0x80, 1, 0x07, 0x04, 0]);
    assert_eq!(frames[1], vec![0xC0, 2, 0x07, 0x07, 0, 0]);
    assert_eq!(
        g.radio().lines,
        vec!["INQUIRY 10 NAME", "PAIR 00:07:80:11:22:33"]
    );
}

#[test]
fn pairing_events_follow_response() {
    let mut g = ready_glove();
    g.radio_line("SET BT PAIR 00:07:80:11:22:33 00112233445566778899aabbccddeeff");
    g.radio_line("SET BT PAIR 00:07:80:44:55:66 00112233445566778899aabbccddeeff");
    g.radio_line("RING 0 00:07:80:44:55:66 11 HID");
    take(&mut g);

    g.dispatch(&[0xC0, 0x00, 0x07, 0x05]).unwrap();
    let frames = take(&mut g);
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0], vec![0xC0, 3, 0x07, 0x05, 0, 0, 2]);
    assert_eq!(frames[1][..5], [0x80, 11, 0x07, 0x05, 0]);
    assert_eq!(
        frames[2],
        vec![0x80, 12, 0x07, 0x05, 1, 0x66, 0x55, 0x44, 0x80, 0x07, 0x00, 0, 0x01, 0x01, 1, 0]
    );

    g.dispatch(&[0xC0, 0x00, 0x07, 0x0A]).unwrap();
    let frames = take(&mut g);
    assert_eq!(frames[0], vec![0xC0, 3, 0x07, 0x0A, 0, 0, 1]);
    assert_eq!(
        frames[1],
        vec![0x80, 10, 0x07, 0x08, 0, 0x66, 0x55, 0x44, 0x80, 0x07, 0x00, 1, 0x01, 2]
    );
}

fn hide_pairings(_: &Event<'_>) -> Disposition {
    Disposition::Suppress
}

#[test]
fn hooks_intercept_events_not_responses() {
    let mut g = ready_glove();
    g.register_hook(EventId::BLUETOOTH_PAIRING_STATUS, hide_pairings)
        .unwrap();
    g.radio_line("SET BT PAIR 00:07:80:11:22:33 00112233445566778899aabbccddeeff");
    g.dispatch(&[0xC0, 0x00, 0x07, 0x05]).unwrap();
    assert_eq!(take(&mut g), vec![vec![0xC0, 3, 0x07, 0x05, 0, 0, 1]]);

    g.unregister_hook(EventId::BLUETOOTH_PAIRING_STATUS);
    g.dispatch(&[0xC0, 0x00, 0x07, 0x05]).unwrap();
    assert_eq!(take(&mut g).len(), 2);
}

#[test]
fn delete_and_connect_through_packets() {
    let mut g = ready_glove();
    for i in 0..3u8 {
        g.radio_line(&format!(
            "SET BT PAIR 00:07:80:00:00:0{} 00112233445566778899aabbccddeeff",
            i
        ));
    }
    g.radio_mut().lines.clear();
    take(&mut g);

    // delete pairing 1, then call what is now pairing 1 (formerly 2) over SPP
    g.dispatch(&[0xC0, 0x01, 0x07, 0x08, 0x01]).unwrap();
    g.dispatch(&[0xC0, 0x02, 0x07, 0x0B, 0x01, 0x04]).unwrap();
    assert_eq!(
        take(&mut g),
        vec![
            vec![0xC0, 2, 0x07, 0x08, 0, 0],
            vec![0xC0, 2, 0x07, 0x0B, 0, 0],
        ]
    );
    assert_eq!(
        g.radio().lines,
        vec![
            "SET BT PAIR 00:07:80:00:00:01",
            "CALL 00:07:80:00:00:02 1101 RFCOMM"
        ]
    );

    // inactive link
    g.dispatch(&[0xC0, 0x01, 0x07, 0x0C, 0x03]).unwrap();
    assert_eq!(take(&mut g), vec![vec![0xC0, 2, 0x07, 0x0C, 0x03, 0x00]]);
}

#[test]
fn soft_timer_ticks_reach_host() {
    let mut g = ready_glove();
    // handle 0, 1.5 s, one-shot
    g.dispatch(&[0xC0, 0x04, 0x01, 0x07, 0x00, 150, 0x00, 0x01])
        .unwrap();
    take(&mut g);
    for _ in 0..400 {
        g.tick();
    }
    assert_eq!(
        take(&mut g),
        vec![vec![0x80, 6, 0x01, 0x06, 0, 1, 0, 0, 0, 50]]
    );
}

#[test]
fn system_queries() {
    let mut g = ready_glove();
    g.dispatch(&[0xC0, 0x00, 0x01, 0x05]).unwrap();
    g.dispatch(&[0xC0, 0x00, 0x01, 0x06]).unwrap();
    g.dispatch(&[0xC0, 0x01, 0x01, 0x04, 0x04]).unwrap();
    let frames = take(&mut g);
    let free = 200_000u32.to_le_bytes();
    let total = 262_144u32.to_le_bytes();
    assert_eq!(frames[0][4..8], free);
    assert_eq!(frames[0][8..12], total);
    assert_eq!(frames[1], vec![0xC0, 2, 0x01, 0x06, 0, 100]);
    assert_eq!(frames[2], vec![0xC0, 2, 0x01, 0x04, 1, 0]);
    // touch: [category][len][T=1 L=1 sensors][T=2 L=2 combos]
    assert_eq!(frames[3], vec![0x80, 9, 0x01, 0x04, 0x04, 7, 1, 1, 37, 2, 2, 60, 0]);
}

#[test]
fn full_reset_restarts_link_manager() {
    let mut g = ready_glove();
    g.dispatch(&[0xC0, 0x01, 0x01, 0x02, 0x01]).unwrap();
    let frames = take(&mut g);
    assert_eq!(frames[0], vec![0xC0, 2, 0x01, 0x02, 0, 0]);
    assert_eq!(g.board().resets, vec![ResetMode::Full]);
    assert!(!g.bluetooth().is_ready());
    assert_eq!(g.radio().lines, vec!["RESET"]);
    take(&mut g);

    g.radio_line("READY.\r\n");
    assert_eq!(g.radio().lines, vec!["RESET", "SET BT PAGE 4", "SET"]);
    take(&mut g);
    g.dispatch(&[0xC0, 0x00, 0x07, 0x01]).unwrap();
    assert_eq!(take(&mut g), vec![vec![0xC0, 3, 0x07, 0x01, 0x00, 0x00, 0x02]]);
}

#[test]
fn start_resets_radio_and_relists_pairings() {
    let mut g = glove();
    g.start();
    assert_eq!(take(&mut g).len(), 2);
    assert_eq!(g.radio().lines, vec!["RESET"]);

    g.radio_line("READY.\r\n");
    g.radio_line("SET BT PAIR 00:07:80:00:00:01 00112233445566778899aabbccddeeff");
    g.radio_line("SET CONTROL MUX 0");
    assert!(g.bluetooth().is_ready());
    assert_eq!(g.bluetooth().pairings().len(), 1);
    assert_eq!(g.radio().lines, vec!["RESET", "SET BT PAGE 4", "SET", "SET BT PAGE 2"]);
}

//! kgapi firmware - KGAPI controller on the nRF52840.
//!
//! Task layout:
//!   - host_rx:   host UART bytes -> PacketAssembler -> controller inbox
//!   - host_tx:   outgoing frames -> host UART
//!   - radio_rx:  radio UART bytes (plain or MUX framed) -> text lines ->
//!                controller inbox
//!   - radio_tx:  radio command lines -> radio UART (plain or MUX framed)
//!   - main loop: owns the Controller, serves the inbox, 100 Hz tick and
//!                the periodic battery report
//!
//! The host and radio transports never touch controller state; they only
//! exchange owned buffers with the main loop through channels.

#![no_std]
#![no_main]

use defmt::{debug, error, info, warn};
use embassy_executor::Spawner;
use embassy_futures::select::{select3, Either3};
use embassy_nrf::buffered_uarte::{self, BufferedUarte, BufferedUarteRx, BufferedUarteTx};
use embassy_nrf::peripherals::{TIMER1, TIMER2, UARTE0, UARTE1};
use embassy_nrf::{bind_interrupts, peripherals, uarte};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Ticker, Timer};
use heapless::String;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use kgapi::bluetooth::mux::{self, MuxDecoder};
use kgapi::config::{RADIO_COMMAND_LEN, RADIO_LINE_LEN, TICKS_PER_SECOND};
use kgapi::protocol::framing::{Frame, PacketAssembler};
use kgapi::{
    BatteryStatus, Board, Controller, DeviceProfile, MemoryUsage, PacketSink, RadioLink, RadioMode,
    ResetMode,
};

bind_interrupts!(struct Irqs {
    UARTE0 => buffered_uarte::InterruptHandler<peripherals::UARTE0>;
    UARTE1 => buffered_uarte::InterruptHandler<peripherals::UARTE1>;
});

/// Seconds between unsolicited `system_battery_status` events.
const BATTERY_REPORT_SECS: u64 = 60;

/// `system_error` codes for transport faults.
const ERROR_HOST_UART: u16 = 0x0201;
const ERROR_RADIO_UART: u16 = 0x0202;
const ERROR_RADIO_OVERRUN: u16 = 0x0203;

/// UART ring buffer sizes.
const UART_RX_BUF: usize = 256;
const UART_TX_BUF: usize = 256;

/// nRF52840 RAM size.
const RAM_TOTAL: u32 = 256 * 1024;
const RAM_END: u32 = 0x2000_0000 + RAM_TOTAL;

// ═══════════════════════════════════════════════════════════════════════════
// Channels
// ═══════════════════════════════════════════════════════════════════════════

enum Input {
    Host(Frame),
    Radio(String<RADIO_LINE_LEN>),
    Fault(u16),
}

struct RadioLine {
    text: String<RADIO_COMMAND_LEN>,
    mode: RadioMode,
}

static INBOX: Channel<CriticalSectionRawMutex, Input, 8> = Channel::new();
static HOST_OUT: Channel<CriticalSectionRawMutex, Frame, 24> = Channel::new();
static RADIO_OUT: Channel<CriticalSectionRawMutex, RadioLine, 8> = Channel::new();

type Glove = Controller<ChannelRadio, ChannelHost, NrfBoard>;

static CONTROLLER: StaticCell<Glove> = StaticCell::new();

static HOST_RX_BUF: StaticCell<[u8; UART_RX_BUF]> = StaticCell::new();
static HOST_TX_BUF: StaticCell<[u8; UART_TX_BUF]> = StaticCell::new();
static RADIO_RX_BUF: StaticCell<[u8; UART_RX_BUF]> = StaticCell::new();
static RADIO_TX_BUF: StaticCell<[u8; UART_TX_BUF]> = StaticCell::new();

// ═══════════════════════════════════════════════════════════════════════════
// Collaborators
// ═══════════════════════════════════════════════════════════════════════════

/// Queues frames for the host UART writer.
struct ChannelHost;

impl PacketSink for ChannelHost {
    fn transmit(&mut self, frame: &[u8]) {
        let Ok(frame) = Frame::from_slice(frame) else {
            warn!("host: oversized frame dropped");
            return;
        };
        if HOST_OUT.try_send(frame).is_err() {
            warn!("host: tx queue full, frame dropped");
        }
    }
}

/// Queues command lines for the radio UART writer.
struct ChannelRadio;

impl RadioLink for ChannelRadio {
    fn send_command(&mut self, command: &str, mode: RadioMode) {
        let mut text = String::new();
        if text.push_str(command).is_err() {
            warn!("radio: command too long: {}", command);
            return;
        }
        if RADIO_OUT.try_send(RadioLine { text, mode }).is_err() {
            warn!("radio: tx queue full, dropped {}", command);
        }
    }
}

/// Board services for the nRF52840.
///
/// A reset is deferred until the main loop has flushed the reset response.
struct NrfBoard {
    reset_requested: Option<ResetMode>,
}

impl Board for NrfBoard {
    fn reset(&mut self, mode: ResetMode) {
        self.reset_requested = Some(mode);
    }

    fn memory(&self) -> MemoryUsage {
        extern "C" {
            static __sheap: u8;
        }
        // SAFETY: only the address of the linker symbol is taken.
        let heap_start = unsafe { core::ptr::addr_of!(__sheap) } as u32;
        MemoryUsage {
            free: RAM_END.saturating_sub(heap_start),
            total: RAM_TOTAL,
        }
    }

    fn battery(&self) -> BatteryStatus {
        // USB/bench powered: no battery monitor on this board.
        BatteryStatus { status: 0, level: 100 }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Transport tasks
// ═══════════════════════════════════════════════════════════════════════════

/// Write all of `bytes`; the buffered writer may accept fewer per call.
async fn write_all<U: uarte::Instance>(
    tx: &mut BufferedUarteTx<'static, U>,
    mut bytes: &[u8],
) -> Result<(), buffered_uarte::Error> {
    while !bytes.is_empty() {
        let n = tx.write(bytes).await?;
        bytes = &bytes[n..];
    }
    tx.flush().await
}

#[embassy_executor::task]
async fn host_rx(mut rx: BufferedUarteRx<'static, UARTE0, TIMER1>) {
    let mut assembler = PacketAssembler::new();
    let mut chunk = [0u8; 32];
    loop {
        let n = match rx.read(&mut chunk).await {
            Ok(n) => n,
            Err(_) => {
                assembler.reset();
                INBOX.send(Input::Fault(ERROR_HOST_UART)).await;
                continue;
            }
        };
        for &byte in &chunk[..n] {
            if let Ok(Some(frame)) = assembler.push(byte) {
                INBOX.send(Input::Host(frame)).await;
            }
        }
    }
}

#[embassy_executor::task]
async fn host_tx(mut tx: BufferedUarteTx<'static, UARTE0>) {
    loop {
        let frame = HOST_OUT.receive().await;
        if write_all(&mut tx, &frame).await.is_err() {
            error!("host: write failed");
        }
    }
}

/// Splits radio text into lines for the controller.
struct LineSplitter {
    line: String<RADIO_LINE_LEN>,
    overrun: bool,
}

impl LineSplitter {
    const fn new() -> Self {
        Self {
            line: String::new(),
            overrun: false,
        }
    }

    fn clear(&mut self) {
        self.line.clear();
        self.overrun = false;
    }

    async fn push(&mut self, byte: u8) {
        match byte {
            b'\n' => {
                if self.overrun {
                    INBOX.send(Input::Fault(ERROR_RADIO_OVERRUN)).await;
                } else if !self.line.is_empty() {
                    INBOX.send(Input::Radio(core::mem::take(&mut self.line))).await;
                }
                self.clear();
            }
            b'\r' => {}
            c if c.is_ascii() => {
                if self.line.push(c as char).is_err() {
                    self.overrun = true;
                }
            }
            _ => {}
        }
    }
}

#[embassy_executor::task]
async fn radio_rx(mut rx: BufferedUarteRx<'static, UARTE1, TIMER2>) {
    let mut lines = LineSplitter::new();
    let mut decoder = MuxDecoder::new();
    let mut chunk = [0u8; 32];
    loop {
        let n = match rx.read(&mut chunk).await {
            Ok(n) => n,
            Err(_) => {
                lines.clear();
                decoder.reset();
                INBOX.send(Input::Fault(ERROR_RADIO_UART)).await;
                continue;
            }
        };
        for &byte in &chunk[..n] {
            // Plain text is ASCII; the MUX start marker is not.
            if !decoder.in_frame() && byte != mux::SOF {
                lines.push(byte).await;
                continue;
            }
            match decoder.push(byte) {
                Ok(Some(packet)) if packet.link == mux::CONTROL_LINK => {
                    for &b in &packet.data {
                        lines.push(b).await;
                    }
                }
                Ok(Some(packet)) => {
                    debug!("radio: {} bytes on data link {}", packet.data.len(), packet.link);
                }
                Ok(None) => {}
                Err(e) => warn!("radio: bad MUX frame: {}", e),
            }
        }
    }
}

#[embassy_executor::task]
async fn radio_tx(mut tx: BufferedUarteTx<'static, UARTE1>) {
    let mut buf: heapless::Vec<u8, { RADIO_COMMAND_LEN + mux::OVERHEAD }> = heapless::Vec::new();
    loop {
        let line = RADIO_OUT.receive().await;
        let text = line.text.as_bytes();
        let framed = match line.mode {
            RadioMode::Command => {
                buf.clear();
                buf.extend_from_slice(text)
                    .and_then(|_| buf.extend_from_slice(b"\r\n"))
                    .is_ok()
            }
            RadioMode::Mux => match mux::encode(mux::CONTROL_LINK, text) {
                Ok(frame) => {
                    buf = frame;
                    true
                }
                Err(_) => false,
            },
        };
        if !framed {
            warn!("radio: command does not fit a frame");
            continue;
        }
        if write_all(&mut tx, &buf).await.is_err() {
            error!("radio: write failed");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Main
// ═══════════════════════════════════════════════════════════════════════════

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_nrf::init(Default::default());
    info!("kgapi firmware starting");

    let mut config = uarte::Config::default();
    config.parity = uarte::Parity::EXCLUDED;
    config.baudrate = uarte::Baudrate::BAUD115200;

    let host = BufferedUarte::new(
        p.UARTE0,
        p.TIMER1,
        p.PPI_CH0,
        p.PPI_CH1,
        p.PPI_GROUP0,
        Irqs,
        p.P0_08,
        p.P0_06,
        config.clone(),
        HOST_RX_BUF.init([0; UART_RX_BUF]),
        HOST_TX_BUF.init([0; UART_TX_BUF]),
    );
    let (host_rx_half, host_tx_half) = host.split();
    let radio = BufferedUarte::new(
        p.UARTE1,
        p.TIMER2,
        p.PPI_CH2,
        p.PPI_CH3,
        p.PPI_GROUP1,
        Irqs,
        p.P1_01,
        p.P1_02,
        config,
        RADIO_RX_BUF.init([0; UART_RX_BUF]),
        RADIO_TX_BUF.init([0; UART_TX_BUF]),
    );
    let (radio_rx_half, radio_tx_half) = radio.split();

    spawner.must_spawn(host_rx(host_rx_half));
    spawner.must_spawn(host_tx(host_tx_half));
    spawner.must_spawn(radio_rx(radio_rx_half));
    spawner.must_spawn(radio_tx(radio_tx_half));

    let glove = CONTROLLER.init(Controller::new(
        ChannelRadio,
        ChannelHost,
        NrfBoard {
            reset_requested: None,
        },
        DeviceProfile::default(),
    ));
    glove.start();

    let mut tick = Ticker::every(Duration::from_hz(TICKS_PER_SECOND as u64));
    let mut battery = Ticker::every(Duration::from_secs(BATTERY_REPORT_SECS));

    loop {
        match select3(INBOX.receive(), tick.next(), battery.next()).await {
            Either3::First(Input::Host(frame)) => {
                let _ = glove.process(&frame);
            }
            Either3::First(Input::Radio(line)) => glove.radio_line(&line),
            Either3::First(Input::Fault(code)) => glove.report_error(code),
            Either3::Second(()) => glove.tick(),
            Either3::Third(()) => glove.report_battery(),
        }

        if let Some(mode) = glove.board().reset_requested {
            info!("board reset requested ({})", mode as u8);
            if mode == ResetMode::Full {
                // Let host_tx drain the reset response first.
                while !HOST_OUT.is_empty() {
                    Timer::after(Duration::from_millis(1)).await;
                }
                Timer::after(Duration::from_millis(5)).await;
                cortex_m::peripheral::SCB::sys_reset();
            }
            glove.board_mut().reset_requested = None;
        }
    }
}

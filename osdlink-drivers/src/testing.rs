//! Simulated peripherals and clocks for driver tests

use core::cell::Cell;
use core::convert::Infallible;
use std::collections::VecDeque;
use std::vec::Vec;

use embedded_io::{ErrorType, Read, Write};
use osdlink_core::traits::{Axis, FlightState, RcCommand, SpectrumData, SPECTRUM_BIN_COUNT};
use osdlink_hal::{MonotonicClock, SerialTransport};
use osdlink_protocol::commands::{
    CMD_GET_NEXT_CHARSET, CMD_REGISTER_ACCESS, CMD_RESET_CHARSET_ENUM, CHARSET_NAME_LENGTH,
};
use osdlink_protocol::{
    CharsetInfo, DevCmd, DeviceFrame, FrameBuilder, FrameParser, RegisterAccess, SyncFrame,
    SyncFrameParser,
};

/// Clock that moves forward by a fixed step every time it is read
pub struct StepClock {
    now: Cell<u64>,
    step_us: u64,
}

impl StepClock {
    pub fn new(step_us: u64) -> Self {
        Self {
            now: Cell::new(0),
            step_us,
        }
    }

    /// Current time without advancing
    pub fn peek_us(&self) -> u64 {
        self.now.get()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now.set(self.now.get() + ms * 1000);
    }
}

impl MonotonicClock for StepClock {
    fn now_us(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.step_us);
        now
    }
}

/// Build a NUL-padded charset name
pub fn charset(id: u8, name: &str) -> CharsetInfo {
    let mut buf = [0u8; CHARSET_NAME_LENGTH];
    buf[..name.len()].copy_from_slice(name.as_bytes());
    CharsetInfo {
        id,
        name: buf,
        has_more: false,
    }
}

/// OpenTCO peripheral living behind a loopback transport
///
/// Register writes land in a register file, reads are answered from it,
/// and charset enumeration walks `charsets`.
pub struct SimOpenTco {
    parser: FrameParser,
    rx: VecDeque<u8>,
    next_charset: usize,
    pub registers: [u16; 16],
    pub charsets: Vec<CharsetInfo>,
    /// Received frames, oldest first
    pub frames: Vec<DeviceFrame>,
    /// Never answer anything
    pub silent: bool,
    /// Stop answering after this many replies
    pub reply_limit: Option<usize>,
    /// Corrupt this many upcoming charset replies
    pub corrupt_charset_replies: usize,
    /// Bytes prepended to every reply
    pub noise: Vec<u8>,
    /// Reported transmit buffer space
    pub tx_capacity: usize,
}

impl SimOpenTco {
    pub fn new() -> Self {
        Self {
            parser: FrameParser::new(),
            rx: VecDeque::new(),
            next_charset: 0,
            registers: [0; 16],
            charsets: Vec::new(),
            frames: Vec::new(),
            silent: false,
            reply_limit: None,
            corrupt_charset_replies: 0,
            noise: Vec::new(),
            tx_capacity: 256,
        }
    }

    /// Queue raw bytes for the driver to read
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Received frames with the given opcode
    pub fn frames_with(&self, command: u8) -> impl Iterator<Item = &DeviceFrame> {
        self.frames
            .iter()
            .filter(move |f| f.devcmd.command == command)
    }

    fn handle(&mut self, frame: DeviceFrame) {
        let device = frame.devcmd.device;
        match frame.devcmd.command {
            CMD_REGISTER_ACCESS => {
                if let Ok(access) = RegisterAccess::from_payload(&frame.payload) {
                    if access.read {
                        let reply = RegisterAccess {
                            value: self.registers[access.register as usize],
                            ..access
                        };
                        self.reply(DevCmd::response(device, CMD_REGISTER_ACCESS), &reply.to_payload(), false);
                    } else {
                        self.registers[access.register as usize] = access.value;
                    }
                }
            }
            CMD_RESET_CHARSET_ENUM => self.next_charset = 0,
            CMD_GET_NEXT_CHARSET => {
                if let Some(info) = self.charsets.get(self.next_charset).copied() {
                    let info = CharsetInfo {
                        has_more: self.next_charset + 1 < self.charsets.len(),
                        ..info
                    };
                    let corrupt = self.corrupt_charset_replies > 0;
                    if corrupt {
                        self.corrupt_charset_replies -= 1;
                    } else {
                        self.next_charset += 1;
                    }
                    self.reply(
                        DevCmd::response(device, CMD_GET_NEXT_CHARSET),
                        &info.to_payload(),
                        corrupt,
                    );
                }
            }
            _ => {}
        }
        self.frames.push(frame);
    }

    fn reply(&mut self, devcmd: DevCmd, payload: &[u8], corrupt: bool) {
        if self.silent || self.reply_limit == Some(0) {
            return;
        }
        if let Some(left) = self.reply_limit.as_mut() {
            *left -= 1;
        }
        let frame = DeviceFrame::new(devcmd, payload).unwrap();
        let mut builder = FrameBuilder::new();
        let bytes = frame.encode(&mut builder).unwrap();
        self.rx.extend(self.noise.iter().copied());
        let start = self.rx.len();
        self.rx.extend(bytes.iter().copied());
        if corrupt {
            // Flip a bit inside the charset name
            self.rx[start + 4] ^= 0x01;
        }
    }
}

impl ErrorType for SimOpenTco {
    type Error = Infallible;
}

impl Read for SimOpenTco {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut n = 0;
        while n < buf.len() {
            match self.rx.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl Write for SimOpenTco {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for &b in buf {
            if let Ok(Some(frame)) = self.parser.feed(b) {
                self.handle(frame);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl SerialTransport for SimOpenTco {
    fn rx_bytes_waiting(&self) -> usize {
        self.rx.len()
    }

    fn tx_bytes_free(&self) -> usize {
        self.tx_capacity
    }
}

/// TinyOSD peripheral: applies page writes to its own character grid
pub struct SimTinyOsd {
    parser: SyncFrameParser,
    /// Character grid as the device shows it
    pub grid: Vec<u8>,
    /// Received frames, oldest first
    pub frames: Vec<SyncFrame>,
    /// Bytes received over the wire
    pub bytes_received: usize,
    /// Reported transmit buffer space
    pub tx_capacity: usize,
}

impl SimTinyOsd {
    pub fn new(cells: usize) -> Self {
        Self {
            parser: SyncFrameParser::new(),
            grid: vec![0; cells],
            frames: Vec::new(),
            bytes_received: 0,
            tx_capacity: 256,
        }
    }
}

impl ErrorType for SimTinyOsd {
    type Error = Infallible;
}

impl Read for SimTinyOsd {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }
}

impl Write for SimTinyOsd {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        assert!(buf.len() <= self.tx_capacity, "write larger than reported space");
        self.bytes_received += buf.len();
        for &b in buf {
            if let Ok(Some(frame)) = self.parser.feed(b) {
                if let Some((address, chars)) = frame.as_page_write() {
                    let start = address as usize;
                    self.grid[start..start + chars.len()].copy_from_slice(chars);
                }
                self.frames.push(frame);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl SerialTransport for SimTinyOsd {
    fn rx_bytes_waiting(&self) -> usize {
        0
    }

    fn tx_bytes_free(&self) -> usize {
        self.tx_capacity
    }
}

/// Fixed flight state
#[derive(Default)]
pub struct StaticFlight {
    pub rc: RcCommand,
    pub arming_flags: u8,
    pub spectrum: Option<SpectrumData>,
}

impl StaticFlight {
    pub fn with_spectrum(level: f32) -> Self {
        Self {
            rc: RcCommand {
                throttle: 1000.0,
                ..Default::default()
            },
            arming_flags: 0,
            spectrum: Some(SpectrumData {
                max_value: level,
                bins: [level; SPECTRUM_BIN_COUNT],
            }),
        }
    }
}

impl FlightState for StaticFlight {
    fn rc_command(&self) -> RcCommand {
        self.rc
    }

    fn arming_flags(&self) -> u8 {
        self.arming_flags
    }

    fn spectrum(&self, _axis: Axis) -> Option<SpectrumData> {
        self.spectrum
    }
}

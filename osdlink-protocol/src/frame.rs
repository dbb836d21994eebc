//! Frame encoding and decoding for the generic device protocol.
//!
//! Frame format:
//! - HEADER (1 byte): 0x80 synchronization byte
//! - DEVCMD (1 byte): device id in bits 4-7 (bit 7 = response), opcode in bits 0-3
//! - LEN (1 byte, variable-arity commands only): number of payload bytes
//! - PAYLOAD (0-60 bytes, including LEN): command-specific data
//! - CRC (1 byte): CRC-8/DVB-S2 over HEADER through the last payload byte

use heapless::{Deque, Vec};

use crate::commands::{payload_layout, PayloadLayout, DEVICE_RESPONSE};
use crate::crc::{crc8_dvb_s2_const, crc8_dvb_s2_slice, Crc8};

/// Frame synchronization byte
pub const FRAME_HEADER: u8 = 0x80;

/// Maximum bytes between DEVCMD and CRC
pub const MAX_DATA_LENGTH: usize = 60;

/// Maximum complete frame size
pub const MAX_FRAME_LENGTH: usize = MAX_DATA_LENGTH + 4;

/// Running CRC after the header byte alone
pub const CRC8_FROM_HEADER: u8 = crc8_dvb_s2_const(0, FRAME_HEADER);

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
    /// CRC did not fold to zero
    CrcMismatch,
    /// Frame is incomplete (need more bytes)
    Incomplete,
    /// Invalid frame structure
    InvalidFrame,
    /// Reply came from a different device or answers a different command
    UnexpectedDevice,
    /// Buffer too small for encoding
    BufferTooSmall,
}

/// Packed device/command byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DevCmd {
    /// Device id (0-7)
    pub device: u8,
    /// Frame is a reply from `device`
    pub response: bool,
    /// Command opcode (0-15)
    pub command: u8,
}

impl DevCmd {
    /// Command addressed to a device
    pub const fn request(device: u8, command: u8) -> Self {
        Self {
            device: device & 0x07,
            response: false,
            command: command & 0x0F,
        }
    }

    /// Reply from a device
    pub const fn response(device: u8, command: u8) -> Self {
        Self {
            device: device & 0x07,
            response: true,
            command: command & 0x0F,
        }
    }

    /// Pack into the wire byte
    pub const fn to_byte(&self) -> u8 {
        let mut nibble = self.device & 0x07;
        if self.response {
            nibble |= DEVICE_RESPONSE;
        }
        (nibble << 4) | (self.command & 0x0F)
    }

    /// Unpack from the wire byte
    pub const fn from_byte(byte: u8) -> Self {
        let nibble = byte >> 4;
        Self {
            device: nibble & 0x07,
            response: nibble & DEVICE_RESPONSE != 0,
            command: byte & 0x0F,
        }
    }
}

/// Position of a reserved length byte inside a [`FrameBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LengthSlot(usize);

/// Append-only frame work buffer
///
/// `begin` writes the header and DEVCMD, the `push_*` methods append
/// payload, and `finish` appends the CRC. For variable-arity commands a
/// length byte is reserved up front and patched once the payload is known.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    buf: [u8; MAX_FRAME_LENGTH],
    len: usize,
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuilder {
    /// Create an empty builder
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_FRAME_LENGTH],
            len: 0,
        }
    }

    /// Start a new frame, discarding anything previously assembled
    pub fn begin(&mut self, devcmd: DevCmd) -> &mut Self {
        self.buf[0] = FRAME_HEADER;
        self.buf[1] = devcmd.to_byte();
        self.len = 2;
        self
    }

    /// Write cursor (bytes assembled so far, CRC excluded)
    pub fn cursor(&self) -> usize {
        self.len
    }

    /// Bytes between DEVCMD and CRC
    pub fn data_len(&self) -> usize {
        self.len.saturating_sub(2)
    }

    /// Append one byte
    pub fn push_u8(&mut self, value: u8) -> Result<(), FrameError> {
        if self.len < 2 {
            return Err(FrameError::InvalidFrame);
        }
        if self.data_len() >= MAX_DATA_LENGTH {
            return Err(FrameError::PayloadTooLarge);
        }
        self.buf[self.len] = value;
        self.len += 1;
        Ok(())
    }

    /// Append a big-endian 16-bit value
    pub fn push_u16(&mut self, value: u16) -> Result<(), FrameError> {
        self.push_bytes(&value.to_be_bytes())
    }

    /// Append raw bytes
    pub fn push_bytes(&mut self, data: &[u8]) -> Result<(), FrameError> {
        if self.data_len() + data.len() > MAX_DATA_LENGTH {
            return Err(FrameError::PayloadTooLarge);
        }
        for &b in data {
            self.push_u8(b)?;
        }
        Ok(())
    }

    /// Append text without a terminator
    pub fn push_str(&mut self, text: &str) -> Result<(), FrameError> {
        self.push_bytes(text.as_bytes())
    }

    /// Room left for payload bytes
    pub fn remaining(&self) -> usize {
        MAX_DATA_LENGTH - self.data_len()
    }

    /// Reserve a length byte to be patched later
    pub fn reserve_length(&mut self) -> Result<LengthSlot, FrameError> {
        let slot = LengthSlot(self.len);
        self.push_u8(0)?;
        Ok(slot)
    }

    /// Patch a reserved length byte with the number of bytes written after it
    pub fn patch_length(&mut self, slot: LengthSlot) {
        self.buf[slot.0] = (self.len - slot.0 - 1) as u8;
    }

    /// Append the CRC and return the complete frame
    pub fn finish(&mut self) -> Result<&[u8], FrameError> {
        if self.len < 2 {
            return Err(FrameError::InvalidFrame);
        }
        self.buf[self.len] = crc8_dvb_s2_slice(0, &self.buf[..self.len]);
        Ok(&self.buf[..self.len + 1])
    }
}

/// A decoded generic device frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceFrame {
    /// Device, direction, and opcode
    pub devcmd: DevCmd,
    /// Payload, without the length byte
    pub payload: Vec<u8, MAX_DATA_LENGTH>,
}

impl DeviceFrame {
    /// Create a frame with the given payload
    pub fn new(devcmd: DevCmd, payload: &[u8]) -> Result<Self, FrameError> {
        let mut vec = Vec::new();
        vec.extend_from_slice(payload)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self {
            devcmd,
            payload: vec,
        })
    }

    /// Encode using the OSD command layout
    pub fn encode<'a>(&self, builder: &'a mut FrameBuilder) -> Result<&'a [u8], FrameError> {
        self.encode_with(builder, payload_layout(&self.devcmd))
    }

    /// Encode with an explicit layout
    pub fn encode_with<'a>(
        &self,
        builder: &'a mut FrameBuilder,
        layout: PayloadLayout,
    ) -> Result<&'a [u8], FrameError> {
        builder.begin(self.devcmd);
        match layout {
            PayloadLayout::Fixed(n) => {
                if n != self.payload.len() {
                    return Err(FrameError::InvalidFrame);
                }
                builder.push_bytes(&self.payload)?;
            }
            PayloadLayout::Prefixed => {
                let slot = builder.reserve_length()?;
                builder.push_bytes(&self.payload)?;
                builder.patch_length(slot);
            }
        }
        builder.finish()
    }
}

/// Bytes held back for replay after a false start
const BACKLOG_CAPACITY: usize = 2 * MAX_FRAME_LENGTH;

/// State machine for parsing incoming frames
///
/// A `0x80` inside noise or inside another frame looks like a header. When
/// the frame started there fails its length or CRC check, every byte after
/// that false header is replayed, so a real frame hidden behind it is
/// still found.
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParseState,
    crc: Crc8,
    devcmd: DevCmd,
    expected_length: usize,
    payload: Vec<u8, MAX_DATA_LENGTH>,
    /// Raw bytes of the frame in progress, header included
    raw: Vec<u8, MAX_FRAME_LENGTH>,
    /// Bytes waiting to be parsed
    backlog: Deque<u8, BACKLOG_CAPACITY>,
    layout: fn(&DevCmd) -> PayloadLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Waiting for HEADER byte
    WaitingForHeader,
    /// Got HEADER, waiting for DEVCMD
    WaitingForDevCmd,
    /// Variable-arity command, waiting for LEN
    WaitingForLength,
    /// Reading payload bytes
    ReadingPayload,
    /// Waiting for CRC
    WaitingForCrc,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a parser for the OSD command set
    pub fn new() -> Self {
        Self::with_layout(payload_layout)
    }

    /// Create a parser with a custom payload layout table
    pub fn with_layout(layout: fn(&DevCmd) -> PayloadLayout) -> Self {
        Self {
            state: ParseState::WaitingForHeader,
            crc: Crc8::new(),
            devcmd: DevCmd::request(0, 0),
            expected_length: 0,
            payload: Vec::new(),
            raw: Vec::new(),
            backlog: Deque::new(),
            layout,
        }
    }

    /// Reset the parser state and drop any held-back bytes
    pub fn reset(&mut self) {
        self.restart();
        self.backlog.clear();
    }

    /// Whether the parser is between frames with nothing held back
    pub fn is_idle(&self) -> bool {
        self.state == ParseState::WaitingForHeader && self.backlog.is_empty()
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(frame))` when a complete valid frame is parsed,
    /// `Ok(None)` when more bytes are needed, or `Err` when a frame was
    /// rejected and nothing valid turned up in its replayed bytes.
    pub fn feed(&mut self, byte: u8) -> Result<Option<DeviceFrame>, FrameError> {
        if self.backlog.push_back(byte).is_err() {
            // Only reachable after a run of false headers; drop the oldest
            let _ = self.backlog.pop_front();
            let _ = self.backlog.push_back(byte);
        }
        self.drain()
    }

    /// Parse bytes held back from an earlier rejected frame
    ///
    /// A frame found during replay is returned at once and anything after
    /// it waits here; call this when no new bytes are arriving.
    pub fn feed_pending(&mut self) -> Result<Option<DeviceFrame>, FrameError> {
        self.drain()
    }

    /// Feed multiple bytes to the parser
    ///
    /// Returns the first complete frame found, if any.
    /// Remaining bytes after a complete frame are not consumed.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<Option<DeviceFrame>, FrameError> {
        for &byte in bytes {
            if let Some(frame) = self.feed(byte)? {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }

    fn drain(&mut self) -> Result<Option<DeviceFrame>, FrameError> {
        let mut result = Ok(None);
        while let Some(byte) = self.backlog.pop_front() {
            match self.step(byte) {
                Ok(Some(frame)) => return Ok(Some(frame)),
                Ok(None) => {}
                Err(e) => {
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }
        result
    }

    fn restart(&mut self) {
        self.state = ParseState::WaitingForHeader;
        self.crc = Crc8::new();
        self.expected_length = 0;
        self.payload.clear();
        self.raw.clear();
    }

    /// Drop the frame in progress and queue its bytes after the header
    fn reject(&mut self, error: FrameError) -> Result<Option<DeviceFrame>, FrameError> {
        for &byte in self.raw.iter().skip(1).rev() {
            if self.backlog.push_front(byte).is_err() {
                break;
            }
        }
        self.restart();
        Err(error)
    }

    fn step(&mut self, byte: u8) -> Result<Option<DeviceFrame>, FrameError> {
        if self.state == ParseState::WaitingForHeader {
            if byte == FRAME_HEADER {
                self.crc = Crc8::from_partial(CRC8_FROM_HEADER);
                self.raw.clear();
                let _ = self.raw.push(byte);
                self.state = ParseState::WaitingForDevCmd;
            }
            // Silently ignore everything else while waiting
            return Ok(None);
        }

        // Bounded by the frame layout, cannot overflow
        let _ = self.raw.push(byte);
        match self.state {
            ParseState::WaitingForHeader => Ok(None),
            ParseState::WaitingForDevCmd => {
                self.crc.update(byte);
                self.devcmd = DevCmd::from_byte(byte);
                self.payload.clear();
                match (self.layout)(&self.devcmd) {
                    PayloadLayout::Fixed(0) => self.state = ParseState::WaitingForCrc,
                    PayloadLayout::Fixed(n) if n > MAX_DATA_LENGTH => {
                        return self.reject(FrameError::InvalidFrame);
                    }
                    PayloadLayout::Fixed(n) => {
                        self.expected_length = n;
                        self.state = ParseState::ReadingPayload;
                    }
                    PayloadLayout::Prefixed => self.state = ParseState::WaitingForLength,
                }
                Ok(None)
            }
            ParseState::WaitingForLength => {
                if byte as usize >= MAX_DATA_LENGTH {
                    return self.reject(FrameError::InvalidFrame);
                }
                self.crc.update(byte);
                self.expected_length = byte as usize;
                self.state = if self.expected_length == 0 {
                    ParseState::WaitingForCrc
                } else {
                    ParseState::ReadingPayload
                };
                Ok(None)
            }
            ParseState::ReadingPayload => {
                self.crc.update(byte);
                let _ = self.payload.push(byte);
                if self.payload.len() == self.expected_length {
                    self.state = ParseState::WaitingForCrc;
                }
                Ok(None)
            }
            ParseState::WaitingForCrc => {
                self.crc.update(byte);
                if !self.crc.is_valid() {
                    return self.reject(FrameError::CrcMismatch);
                }
                let frame = DeviceFrame {
                    devcmd: self.devcmd,
                    payload: self.payload.clone(),
                };
                self.restart();
                Ok(Some(frame))
            }
        }
    }
}

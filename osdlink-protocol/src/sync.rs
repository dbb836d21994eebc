//! Screen-sync frame format (TinyOSD)
//!
//! Frame format:
//! - HEADER (1 byte): 0x80
//! - LEN (1 byte): number of DATA bytes
//! - PAGE/CMD (1 byte): 0x00-0x03 address a 256-byte page of the grid,
//!   0x07 carries stick overlay data
//! - DATA (LEN bytes): for page writes, `[offset][chars...]`
//! - CRC (1 byte): CRC-8/DVB-S2 over HEADER, LEN, PAGE/CMD and DATA
//!
//! A page-0 frame with a single data byte is the enable command.

use heapless::Vec;

use crate::crc::Crc8;
use crate::frame::FrameError;

/// Frame synchronization byte
pub const SYNC_HEADER: u8 = 0x80;

/// Page 0 write / enable command
pub const CMD_ENABLE: u8 = 0x00;

/// Stick position and arming overlay
pub const CMD_STICKS: u8 = 0x07;

/// Highest addressable page
pub const MAX_PAGE: u8 = 0x03;

/// Bytes of a frame that are not DATA (header, len, cmd, crc)
pub const FRAME_OVERHEAD: usize = 4;

/// Largest DATA section this implementation emits or accepts
pub const MAX_SYNC_DATA: usize = 64;

/// Largest complete frame
pub const MAX_SYNC_FRAME: usize = MAX_SYNC_DATA + FRAME_OVERHEAD;

/// A screen-sync frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncFrame {
    /// Page number or command
    pub command: u8,
    /// Frame data
    pub data: Vec<u8, MAX_SYNC_DATA>,
}

impl SyncFrame {
    /// Create a frame with the given data
    pub fn new(command: u8, data: &[u8]) -> Result<Self, FrameError> {
        let mut vec = Vec::new();
        vec.extend_from_slice(data)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self { command, data: vec })
    }

    /// Enable command
    pub fn enable() -> Self {
        let mut data = Vec::new();
        let _ = data.push(1);
        Self {
            command: CMD_ENABLE,
            data,
        }
    }

    /// Page write of `chars` starting at linear grid `address`
    pub fn page_write(address: u16, chars: &[u8]) -> Result<Self, FrameError> {
        let mut data = Vec::<u8, MAX_SYNC_DATA>::new();
        data.push(address as u8)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        data.extend_from_slice(chars)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self {
            command: page_of(address),
            data,
        })
    }

    /// Linear grid address and characters, if this is a page write
    pub fn as_page_write(&self) -> Option<(u16, &[u8])> {
        if self.command > MAX_PAGE || self.data.len() < 2 {
            return None;
        }
        let address = ((self.command as u16) << 8) | self.data[0] as u16;
        Some((address, &self.data[1..]))
    }

    /// Size of the encoded frame
    pub fn encoded_len(&self) -> usize {
        self.data.len() + FRAME_OVERHEAD
    }

    /// Encode this frame into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        encode_sync_frame(self.command, &self.data, buffer)
    }
}

/// Page number of a linear grid address
pub fn page_of(address: u16) -> u8 {
    ((address >> 8) as u8) & MAX_PAGE
}

/// Encode a frame straight from borrowed data
pub fn encode_sync_frame(command: u8, data: &[u8], buffer: &mut [u8]) -> Result<usize, FrameError> {
    if data.len() > u8::MAX as usize {
        return Err(FrameError::PayloadTooLarge);
    }
    let frame_len = data.len() + FRAME_OVERHEAD;
    if buffer.len() < frame_len {
        return Err(FrameError::BufferTooSmall);
    }

    buffer[0] = SYNC_HEADER;
    buffer[1] = data.len() as u8;
    buffer[2] = command;
    buffer[3..3 + data.len()].copy_from_slice(data);

    let mut crc = Crc8::new();
    crc.update_slice(&buffer[..3 + data.len()]);
    buffer[3 + data.len()] = crc.value();

    Ok(frame_len)
}

/// State machine for parsing screen-sync frames (device side, simulators)
#[derive(Debug, Clone)]
pub struct SyncFrameParser {
    state: SyncState,
    crc: Crc8,
    expected_length: usize,
    command: u8,
    data: Vec<u8, MAX_SYNC_DATA>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    WaitingForHeader,
    WaitingForLength,
    WaitingForCommand,
    ReadingData,
    WaitingForCrc,
}

impl Default for SyncFrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncFrameParser {
    /// Create a new parser
    pub fn new() -> Self {
        Self {
            state: SyncState::WaitingForHeader,
            crc: Crc8::new(),
            expected_length: 0,
            command: 0,
            data: Vec::new(),
        }
    }

    /// Reset the parser state
    pub fn reset(&mut self) {
        self.state = SyncState::WaitingForHeader;
        self.crc = Crc8::new();
        self.expected_length = 0;
        self.data.clear();
    }

    /// Feed a single byte
    pub fn feed(&mut self, byte: u8) -> Result<Option<SyncFrame>, FrameError> {
        match self.state {
            SyncState::WaitingForHeader => {
                if byte == SYNC_HEADER {
                    self.crc = Crc8::new();
                    self.crc.update(byte);
                    self.state = SyncState::WaitingForLength;
                }
                Ok(None)
            }
            SyncState::WaitingForLength => {
                if byte as usize > MAX_SYNC_DATA {
                    self.reset();
                    return Err(FrameError::InvalidFrame);
                }
                self.crc.update(byte);
                self.expected_length = byte as usize;
                self.state = SyncState::WaitingForCommand;
                Ok(None)
            }
            SyncState::WaitingForCommand => {
                self.crc.update(byte);
                self.command = byte;
                self.data.clear();
                self.state = if self.expected_length == 0 {
                    SyncState::WaitingForCrc
                } else {
                    SyncState::ReadingData
                };
                Ok(None)
            }
            SyncState::ReadingData => {
                self.crc.update(byte);
                let _ = self.data.push(byte);
                if self.data.len() == self.expected_length {
                    self.state = SyncState::WaitingForCrc;
                }
                Ok(None)
            }
            SyncState::WaitingForCrc => {
                self.crc.update(byte);
                if !self.crc.is_valid() {
                    self.reset();
                    return Err(FrameError::CrcMismatch);
                }
                let frame = SyncFrame {
                    command: self.command,
                    data: self.data.clone(),
                };
                self.reset();
                Ok(Some(frame))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::crc8_dvb_s2_slice;

    #[test]
    fn test_enable_frame() {
        let mut buf = [0u8; 8];
        let len = SyncFrame::enable().encode(&mut buf).unwrap();
        assert_eq!(len, 5);
        assert_eq!(&buf[..4], &[SYNC_HEADER, 1, CMD_ENABLE, 1]);
        assert_eq!(crc8_dvb_s2_slice(0, &buf[..len]), 0);
    }

    #[test]
    fn test_page_write_addressing() {
        let frame = SyncFrame::page_write(0x1F5, b"ARMED").unwrap();
        assert_eq!(frame.command, 1);
        assert_eq!(frame.data[0], 0xF5);
        assert_eq!(frame.as_page_write(), Some((0x1F5, &b"ARMED"[..])));
        assert_eq!(frame.encoded_len(), 10);
    }

    #[test]
    fn test_enable_is_not_page_write() {
        assert_eq!(SyncFrame::enable().as_page_write(), None);
    }

    #[test]
    fn test_parse_roundtrip_with_garbage() {
        let frame = SyncFrame::page_write(12, &[b'A'; 20]).unwrap();
        let mut buf = [0u8; MAX_SYNC_FRAME];
        let len = frame.encode(&mut buf).unwrap();

        let mut parser = SyncFrameParser::new();
        assert_eq!(parser.feed(0x13), Ok(None));
        let mut parsed = None;
        for &b in &buf[..len] {
            if let Some(f) = parser.feed(b).unwrap() {
                parsed = Some(f);
            }
        }
        assert_eq!(parsed, Some(frame));
    }

    #[test]
    fn test_parse_bad_crc() {
        let mut buf = [0u8; 16];
        let len = SyncFrame::enable().encode(&mut buf).unwrap();
        buf[3] ^= 0x40;

        let mut parser = SyncFrameParser::new();
        let mut result = Ok(None);
        for &b in &buf[..len] {
            result = parser.feed(b);
        }
        assert_eq!(result, Err(FrameError::CrcMismatch));
    }

    #[test]
    fn test_buffer_too_small() {
        let mut buf = [0u8; 4];
        assert_eq!(
            encode_sync_frame(0, &[1, 2], &mut buf),
            Err(FrameError::BufferTooSmall)
        );
    }
}

//! OpenTCO device ids, command opcodes, registers, and payload layouts
//!
//! Opcodes 0x00 (register access) and 0x0F (special) are shared by every
//! device class; the rest of the table is the OSD command set.

use crate::frame::{DevCmd, FrameError};

// Device ids (request direction)
pub const DEVICE_OSD: u8 = 0x00;
pub const DEVICE_VTX: u8 = 0x01;
pub const DEVICE_CAM: u8 = 0x02;
pub const DEVICE_MAX: u8 = 0x07;

/// Set on the device nibble when the frame is a reply from that device
pub const DEVICE_RESPONSE: u8 = 0x08;

// Generic register access
pub const REGISTER_ACCESS_MODE_READ: u8 = 0x80;
pub const REGISTER_ACCESS_MODE_WRITE: u8 = 0x00;
pub const MAX_REGISTER: u8 = 0x0F;

// Command opcodes
pub const CMD_REGISTER_ACCESS: u8 = 0x00;
pub const CMD_FILL_REGION: u8 = 0x01;
pub const CMD_WRITE: u8 = 0x02;
pub const CMD_RESET_CHARSET_ENUM: u8 = 0x03;
pub const CMD_GET_NEXT_CHARSET: u8 = 0x04;
pub const CMD_WRITE_BUFFER_H: u8 = 0x08;
pub const CMD_WRITE_BUFFER_V: u8 = 0x09;
pub const CMD_SPECIAL: u8 = 0x0F;

// Subcommands of CMD_SPECIAL
pub const SPECIAL_SUB_STICKSTATUS: u8 = 0x00;
pub const SPECIAL_SUB_SPECTRUM: u8 = 0x01;

/// OSD registers
pub mod reg {
    /// Enabled feature mask (R/W)
    pub const STATUS: u8 = 0x00;
    /// Supported feature mask (R)
    pub const SUPPORTED_FEATURES: u8 = 0x01;
    /// Video standard (R/W)
    pub const VIDEO_FORMAT: u8 = 0x02;
    /// Black level (R/W)
    pub const BRIGHTNESS_BLACK: u8 = 0x03;
    /// White level (R/W)
    pub const BRIGHTNESS_WHITE: u8 = 0x04;
    /// Screen size, rows in the high byte, columns in the low byte (R)
    pub const SCREEN_SIZE: u8 = 0x05;
    /// Active charset id (R/W)
    pub const CHARSET: u8 = 0x06;
}

/// OSD feature bits as carried in the STATUS / SUPPORTED_FEATURES registers
pub mod feature {
    pub const ENABLE: u16 = 1 << 0;
    pub const INVERT: u16 = 1 << 1;
    pub const BRIGHTNESS: u16 = 1 << 2;
    pub const CHARSET: u16 = 1 << 3;
    pub const RENDER_LOGO: u16 = 1 << 8;
    pub const RENDER_PILOTLOGO: u16 = 1 << 9;
    pub const RENDER_STICKS: u16 = 1 << 10;
    pub const RENDER_SPECTRUM: u16 = 1 << 11;
    pub const RENDER_CROSSHAIR: u16 = 1 << 12;
}

/// Length of a charset name on the wire
pub const CHARSET_NAME_LENGTH: usize = 10;

/// Payload of a GET_NEXT_CHARSET reply: id, name, has_more
pub const CHARSET_RESPONSE_PAYLOAD: usize = 1 + CHARSET_NAME_LENGTH + 1;

/// Bytes following the header of a charset reply (devcmd, payload, crc)
pub const CHARSET_RESPONSE_BODY: usize = 1 + CHARSET_RESPONSE_PAYLOAD + 1;

/// Payload of a register access frame: register byte plus 16-bit value
pub const REGISTER_PAYLOAD: usize = 3;

/// How the payload length of a frame is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PayloadLayout {
    /// Fixed number of payload bytes, no length byte on the wire
    Fixed(usize),
    /// Explicit length byte precedes the payload
    Prefixed,
}

/// Payload layout of the OSD command set
pub fn payload_layout(devcmd: &DevCmd) -> PayloadLayout {
    match (devcmd.command, devcmd.response) {
        (CMD_REGISTER_ACCESS, _) => PayloadLayout::Fixed(REGISTER_PAYLOAD),
        (CMD_FILL_REGION, false) => PayloadLayout::Fixed(5),
        (CMD_WRITE, false) => PayloadLayout::Fixed(3),
        (CMD_RESET_CHARSET_ENUM, _) => PayloadLayout::Fixed(0),
        (CMD_GET_NEXT_CHARSET, false) => PayloadLayout::Fixed(0),
        (CMD_GET_NEXT_CHARSET, true) => PayloadLayout::Fixed(CHARSET_RESPONSE_PAYLOAD),
        (CMD_WRITE_BUFFER_H | CMD_WRITE_BUFFER_V | CMD_SPECIAL, _) => PayloadLayout::Prefixed,
        _ => PayloadLayout::Fixed(0),
    }
}

/// A 16-bit register access, as carried in a CMD_REGISTER_ACCESS payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterAccess {
    /// Register index (0-15)
    pub register: u8,
    /// Read request (mode bit set) or write
    pub read: bool,
    /// Value written, or value returned by a reply
    pub value: u16,
}

impl RegisterAccess {
    /// Read request for `register`
    pub fn read(register: u8) -> Self {
        Self {
            register: register & MAX_REGISTER,
            read: true,
            value: 0,
        }
    }

    /// Write of `value` to `register`
    pub fn write(register: u8, value: u16) -> Self {
        Self {
            register: register & MAX_REGISTER,
            read: false,
            value,
        }
    }

    /// Encode to the 3-byte payload
    pub fn to_payload(&self) -> [u8; REGISTER_PAYLOAD] {
        let mode = if self.read {
            REGISTER_ACCESS_MODE_READ
        } else {
            REGISTER_ACCESS_MODE_WRITE
        };
        let [hi, lo] = self.value.to_be_bytes();
        [self.register | mode, hi, lo]
    }

    /// Decode from a register access payload
    pub fn from_payload(payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() != REGISTER_PAYLOAD {
            return Err(FrameError::InvalidFrame);
        }
        Ok(Self {
            register: payload[0] & MAX_REGISTER,
            read: payload[0] & REGISTER_ACCESS_MODE_READ != 0,
            value: u16::from_be_bytes([payload[1], payload[2]]),
        })
    }
}

/// One entry of the device's charset enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharsetInfo {
    /// Charset id, written to the CHARSET register to select it
    pub id: u8,
    /// Fixed-width name, NUL padded
    pub name: [u8; CHARSET_NAME_LENGTH],
    /// Device has further charsets after this one
    pub has_more: bool,
}

impl CharsetInfo {
    /// Decode from a GET_NEXT_CHARSET reply payload
    pub fn from_payload(payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() != CHARSET_RESPONSE_PAYLOAD {
            return Err(FrameError::InvalidFrame);
        }
        let mut name = [0u8; CHARSET_NAME_LENGTH];
        name.copy_from_slice(&payload[1..1 + CHARSET_NAME_LENGTH]);
        Ok(Self {
            id: payload[0],
            name,
            has_more: payload[1 + CHARSET_NAME_LENGTH] != 0,
        })
    }

    /// Encode to a reply payload (used by device simulators)
    pub fn to_payload(&self) -> [u8; CHARSET_RESPONSE_PAYLOAD] {
        let mut out = [0u8; CHARSET_RESPONSE_PAYLOAD];
        out[0] = self.id;
        out[1..1 + CHARSET_NAME_LENGTH].copy_from_slice(&self.name);
        out[1 + CHARSET_NAME_LENGTH] = self.has_more as u8;
        out
    }

    /// Name as text, trimmed at the first NUL
    pub fn name_str(&self) -> &str {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(CHARSET_NAME_LENGTH);
        core::str::from_utf8(&self.name[..end]).unwrap_or("")
    }
}

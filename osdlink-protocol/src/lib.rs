//! OSD peripheral wire protocols
//!
//! Two framed protocols share one UART-style link to the OSD hardware.
//! Both are checksummed with CRC-8/DVB-S2 (polynomial 0xD5, init 0).
//!
//! # Generic device protocol (OpenTCO)
//!
//! ```text
//! ┌────────┬────────┬─────────┬─────────────┬──────┐
//! │ HEADER │ DEVCMD │ [LEN]   │ PAYLOAD     │ CRC8 │
//! │ 0x80   │ 1B     │ 0/1B    │ 0–60B       │ 1B   │
//! └────────┴────────┴─────────┴─────────────┴──────┘
//! ```
//!
//! DEVCMD packs the device id (high nibble, bit 7 marks a response) and the
//! command opcode (low nibble). LEN is only present for variable-arity
//! commands.
//!
//! # Screen-sync protocol (TinyOSD)
//!
//! ```text
//! ┌────────┬─────┬──────────┬─────────────┬──────┐
//! │ HEADER │ LEN │ PAGE/CMD │ DATA        │ CRC8 │
//! │ 0x80   │ 1B  │ 1B       │ 0–255B      │ 1B   │
//! └────────┴─────┴──────────┴─────────────┴──────┘
//! ```
//!
//! The CRC of a valid frame folds to zero when it is run over every byte
//! including the received CRC itself.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod commands;
pub mod crc;
pub mod frame;
pub mod sync;

pub use commands::{CharsetInfo, PayloadLayout, RegisterAccess};
pub use crc::{crc8_dvb_s2, crc8_dvb_s2_slice, Crc8};
pub use frame::{
    DevCmd, DeviceFrame, FrameBuilder, FrameError, FrameParser, LengthSlot, FRAME_HEADER,
    MAX_DATA_LENGTH, MAX_FRAME_LENGTH,
};
pub use sync::{SyncFrame, SyncFrameParser, SYNC_HEADER};

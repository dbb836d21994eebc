//! TinyOSD peripheral driver
//!
//! The device has no registers and never answers. The driver keeps the
//! whole character grid locally and streams differences to it.

use osdlink_hal::UartConfig;

pub mod buffer;
pub mod osd;

pub use buffer::{RefreshReport, ScreenBuffer, SyncReport, REFRESH_TIMEOUT_MS, SYNC_BUDGET};
pub use osd::TinyOsd;

/// Serial settings the TinyOSD listens with
pub const UART_CONFIG: UartConfig = UartConfig::OSD_LINK;

//! OpenTCO peripheral driver
//!
//! - [`device`]: device handle, frame send path, register access
//! - [`charset`]: charset discovery state machine
//! - [`osd`]: [`DisplayPort`](osdlink_core::traits::DisplayPort) implementation

use osdlink_hal::UartConfig;

pub mod charset;
pub mod device;
pub mod osd;

pub use charset::{CharsetEnumerator, CharsetList, EnumState, MAX_CHARSETS, MAX_RETRIES};
pub use device::{OpenTcoDevice, RegisterRead, RESPONSE_TIMEOUT_MS};
pub use osd::OpenTcoOsd;

/// Serial settings OpenTCO peripherals listen with
pub const UART_CONFIG: UartConfig = UartConfig::OSD_LINK;

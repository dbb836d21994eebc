//! osdlink Hardware Abstraction Layer
//!
//! This crate defines the traits the OSD drivers consume but never own:
//! the byte-oriented serial transport and a monotonic time source. Board
//! support code implements them; the protocol engine only talks to these.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  osdlink-drivers (OpenTCO, TinyOSD)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  osdlink-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  board UART   │       │ embassy-time  │
//! │  (buffered)   │       │    clock      │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`uart::SerialTransport`] - Non-blocking buffered serial link
//! - [`clock::MonotonicClock`] - Microsecond time source for deadlines

#![no_std]
#![deny(unsafe_code)]

pub mod clock;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use clock::{Deadline, MonotonicClock};
pub use uart::{Parity, SerialTransport, StopBits, UartConfig};

#[cfg(feature = "embassy-time")]
pub use clock::EmbassyClock;

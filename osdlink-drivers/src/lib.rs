//! OSD peripheral drivers
//!
//! Concrete [`DisplayPort`](osdlink_core::traits::DisplayPort)
//! implementations for the two supported peripheral protocols:
//!
//! - OpenTCO: register-addressed device protocol, immediate drawing
//!   commands, charset discovery
//! - TinyOSD: local screen model pushed out by differential sync
//!
//! Both drivers are generic over the serial transport, the monotonic
//! clock and the flight-state source, and never block longer than one
//! response window.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod error;
pub mod opentco;
pub mod tinyosd;

#[cfg(test)]
mod testing;

pub use error::LinkError;
pub use opentco::{OpenTcoDevice, OpenTcoOsd};
pub use tinyosd::{ScreenBuffer, TinyOsd};

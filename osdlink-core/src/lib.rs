//! Board-agnostic core logic for OSD peripheral drivers
//!
//! This crate contains everything the drivers share that does not depend
//! on a particular wire protocol:
//!
//! - Display configuration (brightness, position adjust, feature mask,
//!   video standard)
//! - The device-surface capability trait implemented by every driver
//! - The flight-state trait drivers read overlay inputs from
//! - Cyclic overlay scheduling and overlay payload math

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod config;
pub mod overlay;
pub mod traits;

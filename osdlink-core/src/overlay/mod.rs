//! Supplementary overlays
//!
//! Overlays are drawn by the peripheral itself from small payloads the
//! driver sends once per overlay cycle. This module decides which overlay
//! is due and computes its payload; the drivers put it on the wire.

pub mod scheduler;
pub mod spectrum;
pub mod sticks;

pub use scheduler::{OverlayItem, OverlayScheduler, OVERLAY_INTERVAL_MS};
pub use spectrum::{SpectrumScaler, SPECTRUM_LPF_GAIN};
pub use sticks::{StickOverlay, STICK_OVERLAY_LEN, STICK_SIZE_X, STICK_SIZE_Y};

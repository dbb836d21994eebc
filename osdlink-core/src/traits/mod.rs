//! Capability traits
//!
//! [`DisplayPort`] is the surface every OSD driver offers to the OSD
//! layer. [`FlightState`] is what drivers read when they render overlays.

pub mod display;
pub mod flight;

pub use display::{DisplayError, DisplayExt, DisplayPort};
pub use flight::{Axis, FlightState, RcCommand, SpectrumData, SPECTRUM_BIN_COUNT};

//! Configuration types
//!
//! Owned by the firmware configuration layer; drivers only read them,
//! except for the supported-feature mask discovered at init.

#[cfg(feature = "serde")]
pub mod persist;
pub mod types;

#[cfg(feature = "serde")]
pub use persist::*;
pub use types::*;

//! Link-level errors shared by both drivers

use osdlink_core::traits::DisplayError;
use osdlink_protocol::FrameError;

/// Errors raised while talking to a peripheral
///
/// None of these is fatal. `CrcMismatch` stays inside the exchange that
/// saw it, `BudgetExhausted` ends a sync pass early, and the rest are
/// handed to the caller to retry on a later cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// Received frame failed its checksum
    CrcMismatch,
    /// No valid reply within the response window
    Timeout,
    /// Not enough transmit buffer space for the frame
    BudgetExhausted,
    /// Nothing answered the initial status read
    DeviceAbsent,
    /// Transport reported an I/O error
    Transport,
    /// Frame could not be built or decoded
    Frame(FrameError),
}

impl From<FrameError> for LinkError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::CrcMismatch => LinkError::CrcMismatch,
            other => LinkError::Frame(other),
        }
    }
}

impl From<LinkError> for DisplayError {
    fn from(e: LinkError) -> Self {
        match e {
            LinkError::Timeout | LinkError::CrcMismatch => DisplayError::Timeout,
            LinkError::DeviceAbsent => DisplayError::DeviceAbsent,
            LinkError::Transport | LinkError::BudgetExhausted => DisplayError::Transport,
            LinkError::Frame(FrameError::PayloadTooLarge) => DisplayError::BufferOverflow,
            LinkError::Frame(_) => DisplayError::FrameError,
        }
    }
}

//! Round-robin overlay cycle
//!
//! One overlay action per interval, taken in a fixed order:
//!
//! ```text
//! Features -> Sticks -> Spectrum(roll) -> Features -> Sticks -> Spectrum(pitch) -> ...
//! ```
//!
//! The spectrum slot rotates through the axes on each of its turns.

use crate::traits::Axis;

/// Overlay cycle interval
pub const OVERLAY_INTERVAL_MS: u32 = 100;

/// Overlay action due on a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OverlayItem {
    /// Re-announce the enabled feature mask
    Features,
    /// Stick position and arming overlay
    Sticks,
    /// Gyro spectrum of one axis
    Spectrum(Axis),
}

/// Number of slots in the cycle
const SLOT_COUNT: u8 = 3;

/// Fixed-interval round-robin scheduler
#[derive(Debug, Clone)]
pub struct OverlayScheduler {
    /// Cycle interval in microseconds
    interval_us: u64,
    /// Earliest time the next slot may fire
    next_due_us: u64,
    /// Index of the next slot
    slot: u8,
    /// Axis used on the next spectrum turn
    spectrum_axis: Axis,
}

impl Default for OverlayScheduler {
    fn default() -> Self {
        Self::new(OVERLAY_INTERVAL_MS)
    }
}

impl OverlayScheduler {
    /// Create a scheduler; the first tick fires immediately
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_us: interval_ms as u64 * 1000,
            next_due_us: 0,
            slot: 0,
            spectrum_axis: Axis::Roll,
        }
    }

    /// Restart the cycle from the first slot
    pub fn reset(&mut self) {
        self.next_due_us = 0;
        self.slot = 0;
        self.spectrum_axis = Axis::Roll;
    }

    /// Check the timer and hand out the next action if one is due
    ///
    /// At most one action is returned per call, no matter how late the
    /// call is; missed intervals are not caught up.
    pub fn tick(&mut self, now_us: u64) -> Option<OverlayItem> {
        if now_us < self.next_due_us {
            return None;
        }
        self.next_due_us = now_us.saturating_add(self.interval_us);

        let item = match self.slot {
            0 => OverlayItem::Features,
            1 => OverlayItem::Sticks,
            _ => {
                let axis = self.spectrum_axis;
                self.spectrum_axis = axis.next();
                OverlayItem::Spectrum(axis)
            }
        };
        self.slot = (self.slot + 1) % SLOT_COUNT;
        Some(item)
    }
}

//! Stick position overlay
//!
//! The peripheral draws two stick gimbals in a box of
//! `STICK_SIZE_X` x `STICK_SIZE_Y` pixels. Positions are sent as pixel
//! coordinates inside that box.

use crate::traits::RcCommand;

/// Stick box width in pixels
pub const STICK_SIZE_X: f32 = 96.0;

/// Stick box height in pixels
pub const STICK_SIZE_Y: f32 = 128.0;

/// Deflection range of roll, pitch and yaw
const STICK_RANGE: f32 = 500.0;

/// Lowest throttle command
const THROTTLE_MIN: f32 = 1000.0;

/// Encoded overlay length: roll, pitch, throttle, yaw, arming flags
pub const STICK_OVERLAY_LEN: usize = 5;

/// Stick overlay payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StickOverlay {
    pub roll: u8,
    pub pitch: u8,
    pub throttle: u8,
    pub yaw: u8,
    pub arming_flags: u8,
}

impl StickOverlay {
    /// Map stick commands into the stick box
    ///
    /// Out-of-range commands saturate at the box edges.
    pub fn from_rc(rc: &RcCommand, arming_flags: u8) -> Self {
        let half_x = STICK_SIZE_X / 2.0;
        let half_y = STICK_SIZE_Y / 2.0;

        Self {
            roll: to_pixel(half_x + half_x * rc.roll / STICK_RANGE),
            pitch: to_pixel(half_y - half_y * rc.pitch / STICK_RANGE),
            throttle: to_pixel(STICK_SIZE_Y - STICK_SIZE_Y * (rc.throttle - THROTTLE_MIN) / 1000.0),
            yaw: to_pixel(half_x - half_x * rc.yaw / STICK_RANGE),
            arming_flags,
        }
    }

    /// Wire form
    pub fn to_bytes(&self) -> [u8; STICK_OVERLAY_LEN] {
        [
            self.roll,
            self.pitch,
            self.throttle,
            self.yaw,
            self.arming_flags,
        ]
    }
}

fn to_pixel(value: f32) -> u8 {
    // Float-to-int `as` saturates and maps NaN to 0
    value as u8
}

//! Flight-state inputs for overlays

/// Number of frequency bins in a gyro spectrum sample
pub const SPECTRUM_BIN_COUNT: usize = 16;

/// Rotation axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    Roll = 0,
    Pitch = 1,
    Yaw = 2,
}

impl Axis {
    /// All axes in rotation order
    pub const ALL: [Axis; 3] = [Axis::Roll, Axis::Pitch, Axis::Yaw];

    /// Next axis, wrapping from yaw back to roll
    pub const fn next(self) -> Self {
        match self {
            Axis::Roll => Axis::Pitch,
            Axis::Pitch => Axis::Yaw,
            Axis::Yaw => Axis::Roll,
        }
    }

    /// Array index of this axis
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Current stick commands
///
/// Roll, pitch and yaw are centered on zero with a ±500 range. Throttle
/// runs from 1000 to 2000.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RcCommand {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub throttle: f32,
}

/// One gyro spectrum sample for a single axis
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpectrumData {
    /// Largest bin value of this sample
    pub max_value: f32,
    /// Bin magnitudes, lowest frequency first
    pub bins: [f32; SPECTRUM_BIN_COUNT],
}

impl Default for SpectrumData {
    fn default() -> Self {
        Self {
            max_value: 0.0,
            bins: [0.0; SPECTRUM_BIN_COUNT],
        }
    }
}

/// Read access to the flight controller state overlays are built from
pub trait FlightState {
    /// Current stick commands
    fn rc_command(&self) -> RcCommand;

    /// Packed arming flags, sent along with the stick overlay
    fn arming_flags(&self) -> u8;

    /// Latest spectrum of `axis`, if the analyser is running
    fn spectrum(&self, axis: Axis) -> Option<SpectrumData>;
}

impl<F: FlightState + ?Sized> FlightState for &F {
    fn rc_command(&self) -> RcCommand {
        (**self).rc_command()
    }

    fn arming_flags(&self) -> u8 {
        (**self).arming_flags()
    }

    fn spectrum(&self, axis: Axis) -> Option<SpectrumData> {
        (**self).spectrum(axis)
    }
}

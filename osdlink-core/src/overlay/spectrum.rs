//! Gyro spectrum auto-scaling
//!
//! Bins are scaled against a slowly tracking maximum per axis so the
//! overlay neither clips on every spike nor flattens when the airframe is
//! quiet.

use crate::traits::{Axis, SpectrumData, SPECTRUM_BIN_COUNT};

/// Single-pole low-pass gain applied to the per-axis maximum
pub const SPECTRUM_LPF_GAIN: f32 = 0.01;

/// Per-axis auto-scaling state
#[derive(Debug, Clone, Default)]
pub struct SpectrumScaler {
    max: [f32; 3],
}

impl SpectrumScaler {
    /// Create a scaler with all maxima at zero
    pub const fn new() -> Self {
        Self { max: [0.0; 3] }
    }

    /// Current low-passed maximum of an axis
    pub fn max(&self, axis: Axis) -> f32 {
        self.max[axis.index()]
    }

    /// Fold a sample into the axis maximum and scale its bins to 0..=255
    pub fn scale(&mut self, axis: Axis, sample: &SpectrumData) -> [u8; SPECTRUM_BIN_COUNT] {
        let max = &mut self.max[axis.index()];
        *max += SPECTRUM_LPF_GAIN * (sample.max_value - *max);

        let mut out = [0u8; SPECTRUM_BIN_COUNT];
        if max.is_nan() || *max <= 0.0 {
            return out;
        }
        for (dst, &bin) in out.iter_mut().zip(sample.bins.iter()) {
            *dst = (255.0 * bin / *max).min(255.0) as u8;
        }
        out
    }
}

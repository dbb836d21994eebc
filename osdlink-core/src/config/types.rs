//! Configuration type definitions

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Character columns of the OSD grid
pub const VIDEO_COLS: u8 = 35;

/// Character rows in PAL mode
pub const VIDEO_LINES_PAL: u8 = 16;

/// Character rows in NTSC mode
pub const VIDEO_LINES_NTSC: u8 = 13;

/// Grid size in PAL mode
pub const VIDEO_BUFFER_CHARS_PAL: usize = VIDEO_COLS as usize * VIDEO_LINES_PAL as usize;

/// Grid size in NTSC mode
pub const VIDEO_BUFFER_CHARS_NTSC: usize = VIDEO_COLS as usize * VIDEO_LINES_NTSC as usize;

/// Columns reported to the OSD layer when the device does not report a size
pub const DEFAULT_REPORTED_COLS: u8 = 30;

/// Display feature mask
///
/// Bit positions are those of the display layer; drivers translate to
/// and from their own wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplayFeatures(u16);

impl DisplayFeatures {
    pub const NONE: Self = Self(0);
    pub const ENABLE: Self = Self(1 << 0);
    pub const INVERT: Self = Self(1 << 1);
    pub const BRIGHTNESS: Self = Self(1 << 2);
    pub const CHARSET: Self = Self(1 << 3);
    pub const RENDER_LOGO: Self = Self(1 << 8);
    pub const RENDER_PILOT_LOGO: Self = Self(1 << 9);
    pub const RENDER_STICKS: Self = Self(1 << 10);
    pub const RENDER_SPECTRUM: Self = Self(1 << 11);
    pub const RENDER_CROSSHAIR: Self = Self(1 << 12);

    /// Every defined feature
    pub const ALL: Self = Self(
        Self::ENABLE.0
            | Self::INVERT.0
            | Self::BRIGHTNESS.0
            | Self::CHARSET.0
            | Self::RENDER_LOGO.0
            | Self::RENDER_PILOT_LOGO.0
            | Self::RENDER_STICKS.0
            | Self::RENDER_SPECTRUM.0
            | Self::RENDER_CROSSHAIR.0,
    );

    /// Build from raw bits, dropping undefined ones
    pub const fn from_bits_truncate(bits: u16) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Raw bits
    pub const fn bits(&self) -> u16 {
        self.0
    }

    /// Check that every feature in `other` is set
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the features in `other`
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the features in `other`
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Features present in both masks
    pub const fn intersection(&self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Features present in either mask
    pub const fn union(&self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// No feature set
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Requested video standard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VideoSystem {
    /// Detect from the incoming video signal
    #[default]
    Auto,
    Pal,
    Ntsc,
}

impl VideoSystem {
    /// Register encoding
    pub const fn to_register(self) -> u16 {
        match self {
            VideoSystem::Auto => 0,
            VideoSystem::Pal => 1,
            VideoSystem::Ntsc => 2,
        }
    }

    /// Decode a register value, unknown values map to `Auto`
    pub const fn from_register(value: u16) -> Self {
        match value {
            1 => VideoSystem::Pal,
            2 => VideoSystem::Ntsc,
            _ => VideoSystem::Auto,
        }
    }

    /// Character rows for this standard (NTSC when undetermined)
    pub const fn rows(self) -> u8 {
        match self {
            VideoSystem::Pal => VIDEO_LINES_PAL,
            VideoSystem::Ntsc | VideoSystem::Auto => VIDEO_LINES_NTSC,
        }
    }

    /// Character cells for this standard
    pub const fn buffer_chars(self) -> usize {
        VIDEO_COLS as usize * self.rows() as usize
    }
}

/// Video capture profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VcdProfile {
    /// Requested video standard
    pub video_system: VideoSystem,
    /// Horizontal position offset
    pub h_offset: i8,
    /// Vertical position offset
    pub v_offset: i8,
}

impl Default for VcdProfile {
    fn default() -> Self {
        Self {
            video_system: VideoSystem::Auto,
            h_offset: 0,
            v_offset: 0,
        }
    }
}

/// Per-device display settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplayPortProfile {
    /// Column count adjustment applied on resync
    pub col_adjust: i8,
    /// Row count adjustment applied on resync
    pub row_adjust: i8,
    /// Black level
    pub black_brightness: u8,
    /// White level
    pub white_brightness: u8,
    /// Features the device reported it supports
    pub supported_features: DisplayFeatures,
    /// Features the pilot enabled (always a subset of supported after init)
    pub enabled_features: DisplayFeatures,
}

impl DisplayPortProfile {
    /// Check whether a feature is enabled
    pub const fn is_enabled(&self, feature: DisplayFeatures) -> bool {
        self.enabled_features.contains(feature)
    }

    /// Store the supported set and mask the enabled set down to it
    pub fn apply_supported(&mut self, supported: DisplayFeatures) {
        self.supported_features = supported;
        self.enabled_features = self.enabled_features.intersection(supported);
    }

    /// Apply `row_adjust` to a row count
    pub fn adjusted_rows(&self, rows: u8) -> u8 {
        adjust(rows, self.row_adjust)
    }

    /// Apply `col_adjust` to a column count
    pub fn adjusted_cols(&self, cols: u8) -> u8 {
        adjust(cols, self.col_adjust)
    }
}

fn adjust(value: u8, delta: i8) -> u8 {
    (value as i16 + delta as i16).clamp(0, u8::MAX as i16) as u8
}

/// OSD layer settings the driver needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OsdConfig {
    /// Preferred charset id
    pub charset: u8,
}

/// Everything a driver reads from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OsdSettings {
    pub profile: DisplayPortProfile,
    pub vcd: VcdProfile,
    pub osd: OsdConfig,
}

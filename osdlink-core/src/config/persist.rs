//! Binary persistence of display settings
//!
//! Settings are stored as a postcard blob wrapped in a small header so a
//! stale or foreign record is rejected instead of misread.

use serde::{Deserialize, Serialize};

use super::types::OsdSettings;

/// Magic number identifying a stored settings record
pub const SETTINGS_MAGIC: u32 = 0x4F53444C; // "OSDL"

/// Current settings record version
pub const SETTINGS_VERSION: u8 = 1;

/// Upper bound of an encoded record
pub const MAX_SETTINGS_SIZE: usize = 64;

/// Settings persistence errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Encoding failed or did not fit the buffer
    Serialize,
    /// Decoding failed
    Deserialize,
    /// Record does not start with the settings magic
    BadMagic,
    /// Record was written by a different layout version
    VersionMismatch,
}

/// On-flash layout of a settings record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct StoredSettings {
    magic: u32,
    version: u8,
    settings: OsdSettings,
}

impl OsdSettings {
    /// Encode into `buf`, returning the used prefix
    pub fn store<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        let record = StoredSettings {
            magic: SETTINGS_MAGIC,
            version: SETTINGS_VERSION,
            settings: *self,
        };
        postcard::to_slice(&record, buf).map_err(|_| ConfigError::Serialize)
    }

    /// Decode a record produced by [`OsdSettings::store`]
    pub fn load(bytes: &[u8]) -> Result<Self, ConfigError> {
        let record: StoredSettings =
            postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)?;

        if record.magic != SETTINGS_MAGIC {
            return Err(ConfigError::BadMagic);
        }
        if record.version != SETTINGS_VERSION {
            return Err(ConfigError::VersionMismatch);
        }
        Ok(record.settings)
    }
}

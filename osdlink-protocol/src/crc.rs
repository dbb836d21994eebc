//! CRC-8/DVB-S2
//!
//! Polynomial 0xD5, initial value 0, no reflection, no final XOR. The table
//! is generated at compile time.

/// Generator polynomial
pub const POLYNOMIAL: u8 = 0xD5;

const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC8_TABLE: [u8; 256] = build_table();

/// Fold one byte into a running CRC
#[inline]
pub fn crc8_dvb_s2(crc: u8, byte: u8) -> u8 {
    CRC8_TABLE[(crc ^ byte) as usize]
}

/// Fold a slice into a running CRC
pub fn crc8_dvb_s2_slice(crc: u8, data: &[u8]) -> u8 {
    data.iter().fold(crc, |crc, &b| crc8_dvb_s2(crc, b))
}

/// Compile-time variant, used for precomputed partial values
pub const fn crc8_dvb_s2_const(crc: u8, byte: u8) -> u8 {
    let mut crc = crc ^ byte;
    let mut bit = 0;
    while bit < 8 {
        if crc & 0x80 != 0 {
            crc = (crc << 1) ^ POLYNOMIAL;
        } else {
            crc <<= 1;
        }
        bit += 1;
    }
    crc
}

/// Incremental CRC accumulator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Crc8 {
    value: u8,
}

impl Crc8 {
    /// Fresh accumulator (initial value 0)
    pub const fn new() -> Self {
        Self { value: 0 }
    }

    /// Resume from a precomputed partial value
    pub const fn from_partial(value: u8) -> Self {
        Self { value }
    }

    /// Feed one byte
    pub fn update(&mut self, byte: u8) {
        self.value = crc8_dvb_s2(self.value, byte);
    }

    /// Feed a slice
    pub fn update_slice(&mut self, data: &[u8]) {
        self.value = crc8_dvb_s2_slice(self.value, data);
    }

    /// Current CRC value
    pub const fn value(&self) -> u8 {
        self.value
    }

    /// True once the received CRC byte has been folded in and matched
    pub const fn is_valid(&self) -> bool {
        self.value == 0
    }
}

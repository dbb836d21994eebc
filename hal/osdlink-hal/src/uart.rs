//! UART serial communication abstractions
//!
//! The OSD link shares a buffered UART with nothing else, but it must never
//! stall the control loop. Transports therefore expose how much data is
//! waiting and how much transmit buffer is left, so callers can decide
//! before they commit to a read or write.

use embedded_io::{Read, Write};

/// Buffered, non-blocking serial transport
///
/// Reads and writes go through `embedded_io`. Implementations must return
/// from `write` without waiting for the wire as long as the data fits into
/// [`tx_bytes_free`](SerialTransport::tx_bytes_free).
pub trait SerialTransport: Read + Write {
    /// Number of received bytes that can be read without blocking
    fn rx_bytes_waiting(&self) -> usize;

    /// Free space in the transmit buffer, in bytes
    fn tx_bytes_free(&self) -> usize;

    /// Read a single byte if one is waiting
    fn try_read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        if self.rx_bytes_waiting() == 0 {
            return Ok(None);
        }
        let mut buf = [0u8; 1];
        match self.read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }

    /// Discard everything currently waiting in the receive buffer
    fn drain_rx(&mut self) -> Result<usize, Self::Error> {
        let mut dropped = 0;
        while self.try_read_byte()?.is_some() {
            dropped += 1;
        }
        Ok(dropped)
    }
}

/// UART line settings a peripheral expects
///
/// Board code opens the port with these before handing the transport to a
/// driver. Data bits are always eight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Line is idle-low instead of idle-high
    pub inverted: bool,
}

impl UartConfig {
    /// 115200 8N1, idle-high
    pub const OSD_LINK: Self = Self {
        baudrate: 115_200,
        parity: Parity::None,
        stop_bits: StopBits::One,
        inverted: false,
    };

    /// Time one byte occupies the wire, start and stop bits included
    pub const fn byte_time_us(&self) -> u32 {
        let parity = match self.parity {
            Parity::None => 0,
            Parity::Even | Parity::Odd => 1,
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        let bits: u32 = 1 + 8 + parity + stop;
        (bits * 1_000_000).div_ceil(self.baudrate)
    }
}

impl Default for UartConfig {
    fn default() -> Self {
        Self::OSD_LINK
    }
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}

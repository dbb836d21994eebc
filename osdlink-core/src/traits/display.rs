//! Device-surface trait for OSD peripherals

/// Errors that can occur at the device surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayError {
    /// No valid reply within the response window
    Timeout,
    /// Nothing answered at initialization
    DeviceAbsent,
    /// Transport refused a read or write
    Transport,
    /// Frame could not be built or decoded
    FrameError,
    /// Text or region does not fit the frame or the grid
    BufferOverflow,
}

/// Surface of an OSD peripheral as seen by the OSD layer
///
/// Coordinates are character cells, `x` is the column and `y` the row.
/// Drivers decide whether a call goes to the wire immediately or only
/// changes a local screen model that [`draw_screen`](DisplayPort::draw_screen)
/// pushes out later.
pub trait DisplayPort {
    /// Take the display for exclusive use (e.g. CMS menu)
    fn grab(&mut self) -> Result<(), DisplayError>;

    /// Give the display back
    fn release(&mut self) -> Result<(), DisplayError>;

    /// Blank every cell
    fn clear_screen(&mut self) -> Result<(), DisplayError>;

    /// Fill a rectangle of cells with `value`
    fn fill_region(
        &mut self,
        x: u8,
        y: u8,
        width: u8,
        height: u8,
        value: u8,
    ) -> Result<(), DisplayError>;

    /// Push pending changes to the device
    ///
    /// Must not block. Work that does not fit this call is picked up by
    /// the next one.
    fn draw_screen(&mut self) -> Result<(), DisplayError>;

    /// Write text starting at a cell
    fn write_string(&mut self, x: u8, y: u8, text: &str) -> Result<(), DisplayError>;

    /// Write a single character
    fn write_char(&mut self, x: u8, y: u8, c: u8) -> Result<(), DisplayError>;

    /// Re-apply brightness and feature settings from the profile
    fn reload_profile(&mut self) -> Result<(), DisplayError>;

    /// A multi-frame transfer currently owns the link
    fn is_transfer_in_progress(&self) -> bool;

    /// Periodic housekeeping, drives the overlay cycle
    fn heartbeat(&mut self) -> Result<(), DisplayError>;

    /// Re-establish the screen and refresh [`rows`](DisplayPort::rows) and
    /// [`cols`](DisplayPort::cols)
    fn resync(&mut self) -> Result<(), DisplayError>;

    /// Free space in the transmit buffer
    fn tx_bytes_free(&self) -> usize;

    /// Rows reported by the last resync
    fn rows(&self) -> u8;

    /// Columns reported by the last resync
    fn cols(&self) -> u8;

    /// Write font or other non-volatile data
    ///
    /// Devices without a font upload path accept and ignore the data.
    fn write_nvm(&mut self, _address: u16, _data: &[u8]) -> Result<(), DisplayError> {
        Ok(())
    }
}

/// Helpers built on top of [`DisplayPort`]
pub trait DisplayExt: DisplayPort {
    /// Blank a row, then write `text` at its start
    fn write_line(&mut self, y: u8, text: &str) -> Result<(), DisplayError> {
        let cols = self.cols();
        self.fill_region(0, y, cols, 1, b' ')?;
        self.write_string(0, y, text)
    }

    /// Write `text` centered on a row
    ///
    /// Text wider than the row is cut at the last whole character that fits.
    fn write_centered(&mut self, y: u8, text: &str) -> Result<(), DisplayError> {
        let cols = self.cols() as usize;
        let len = text
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .take_while(|&end| end <= cols)
            .last()
            .unwrap_or(0);
        let x = (cols - len) / 2;
        self.write_string(x as u8, y, &text[..len])
    }
}

// Blanket implementation for all DisplayPort types
impl<T: DisplayPort + ?Sized> DisplayExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records writes into an in-memory grid
    struct GridDisplay {
        cells: [[u8; 30]; 4],
    }

    impl GridDisplay {
        fn new() -> Self {
            Self {
                cells: [[b'.'; 30]; 4],
            }
        }

        fn row(&self, y: usize) -> &str {
            core::str::from_utf8(&self.cells[y]).unwrap()
        }
    }

    impl DisplayPort for GridDisplay {
        fn grab(&mut self) -> Result<(), DisplayError> {
            Ok(())
        }
        fn release(&mut self) -> Result<(), DisplayError> {
            Ok(())
        }
        fn clear_screen(&mut self) -> Result<(), DisplayError> {
            self.fill_region(0, 0, 30, 4, b' ')
        }
        fn fill_region(
            &mut self,
            x: u8,
            y: u8,
            width: u8,
            height: u8,
            value: u8,
        ) -> Result<(), DisplayError> {
            for row in y..y + height {
                for col in x..x + width {
                    self.cells[row as usize][col as usize] = value;
                }
            }
            Ok(())
        }
        fn draw_screen(&mut self) -> Result<(), DisplayError> {
            Ok(())
        }
        fn write_string(&mut self, x: u8, y: u8, text: &str) -> Result<(), DisplayError> {
            for (i, b) in text.bytes().enumerate() {
                self.write_char(x + i as u8, y, b)?;
            }
            Ok(())
        }
        fn write_char(&mut self, x: u8, y: u8, c: u8) -> Result<(), DisplayError> {
            let cell = self
                .cells
                .get_mut(y as usize)
                .and_then(|row| row.get_mut(x as usize))
                .ok_or(DisplayError::BufferOverflow)?;
            *cell = c;
            Ok(())
        }
        fn reload_profile(&mut self) -> Result<(), DisplayError> {
            Ok(())
        }
        fn is_transfer_in_progress(&self) -> bool {
            false
        }
        fn heartbeat(&mut self) -> Result<(), DisplayError> {
            Ok(())
        }
        fn resync(&mut self) -> Result<(), DisplayError> {
            Ok(())
        }
        fn tx_bytes_free(&self) -> usize {
            usize::MAX
        }
        fn rows(&self) -> u8 {
            4
        }
        fn cols(&self) -> u8 {
            30
        }
    }

    #[test]
    fn test_write_line_blanks_row() {
        let mut display = GridDisplay::new();
        display.write_line(1, "DISARMED").unwrap();
        assert_eq!(display.row(1), "DISARMED                      ");
        assert_eq!(display.row(0), "..............................");
    }

    #[test]
    fn test_write_centered() {
        let mut display = GridDisplay::new();
        display.clear_screen().unwrap();
        display.write_centered(2, "ARMED").unwrap();
        assert_eq!(&display.row(2)[12..17], "ARMED");
    }

    #[test]
    fn test_write_centered_cuts_at_char_boundary() {
        let mut display = GridDisplay::new();
        display.clear_screen().unwrap();
        // 34 bytes; byte 30 falls inside a three-byte character
        display.write_centered(0, "a€€€€€€€€€€€").unwrap();
        assert_eq!(display.row(0), " a€€€€€€€€€ ");
    }

    #[test]
    fn test_default_nvm_write_is_accepted() {
        let mut display = GridDisplay::new();
        assert_eq!(display.write_nvm(0x10, &[1, 2, 3]), Ok(()));
    }
}

//! Differential screen sync
//!
//! Writers change the screen buffer; the shadow buffer holds what the
//! device is believed to show. A sync pass walks from the cycle cursor to
//! the next difference and sends a run of cells as one page write. An
//! unchanged cell sitting right before a changed one is folded into the
//! run, which is cheaper than a fresh 5-byte frame header.

use embedded_io::Write;
use osdlink_core::config::{VideoSystem, VIDEO_BUFFER_CHARS_PAL, VIDEO_COLS};
use osdlink_hal::{Deadline, MonotonicClock, SerialTransport};
use osdlink_protocol::sync::{
    encode_sync_frame, page_of, FRAME_OVERHEAD, MAX_SYNC_DATA, MAX_SYNC_FRAME,
};

use crate::error::LinkError;

/// Characters sent per incremental sync pass
pub const SYNC_BUDGET: usize = 32;

/// Wall-clock limit of a full refresh
pub const REFRESH_TIMEOUT_MS: u32 = 500;

/// Cells per refresh chunk
const REFRESH_CHUNK: usize = SYNC_BUDGET - 1;

/// Cells addressed by one page
const PAGE_SIZE: usize = 256;

/// Bytes of a page write that are not characters (overhead plus offset)
const RUN_OVERHEAD: usize = FRAME_OVERHEAD + 1;

/// Outcome of a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncReport {
    /// Frames written
    pub frames: usize,
    /// Cells carried by those frames
    pub cells: usize,
    /// Bytes handed to the transport
    pub bytes: usize,
}

/// Outcome of a full refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RefreshReport {
    /// Cells sent before finishing or giving up
    pub cells: usize,
    /// Whole buffer went out before the deadline
    pub complete: bool,
}

/// Screen and shadow buffers of one character grid
#[derive(Debug, Clone)]
pub struct ScreenBuffer {
    screen: [u8; VIDEO_BUFFER_CHARS_PAL],
    shadow: [u8; VIDEO_BUFFER_CHARS_PAL],
    len: usize,
    cols: usize,
    cursor: usize,
    /// A pass or refresh stopped with differences left to send
    pending: bool,
}

impl ScreenBuffer {
    /// Blank buffer sized for a video standard, in sync with a blank device
    pub fn new(video_system: VideoSystem) -> Self {
        Self {
            screen: [b' '; VIDEO_BUFFER_CHARS_PAL],
            shadow: [b' '; VIDEO_BUFFER_CHARS_PAL],
            len: video_system.buffer_chars(),
            cols: VIDEO_COLS as usize,
            cursor: 0,
            pending: false,
        }
    }

    /// Number of cells in use
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn rows(&self) -> usize {
        self.len / self.cols
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Desired screen contents
    pub fn screen(&self) -> &[u8] {
        &self.screen[..self.len]
    }

    /// Contents last sent to the device
    pub fn shadow(&self) -> &[u8] {
        &self.shadow[..self.len]
    }

    /// Position the next sync pass starts scanning from
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// An update went out partly and later passes still have to finish it
    ///
    /// Set when a sync pass or a refresh stops on budget, transmit space or
    /// deadline with differences left; cleared by the pass that sends the
    /// last of them. Writes alone never set it.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Screen and shadow match everywhere
    pub fn is_synced(&self) -> bool {
        self.screen() == self.shadow()
    }

    /// Switch to another video standard
    ///
    /// The shadow is invalidated since the device layout changed.
    pub fn resize(&mut self, video_system: VideoSystem) {
        self.len = video_system.buffer_chars();
        self.cursor = 0;
        self.invalidate();
    }

    /// Forget what the device shows so every cell is sent again
    pub fn invalidate(&mut self) {
        for (shadow, &screen) in self.shadow.iter_mut().zip(self.screen.iter()) {
            *shadow = !screen;
        }
    }

    /// Set one cell; out-of-grid writes are dropped
    pub fn set(&mut self, x: u8, y: u8, c: u8) {
        if let Some(pos) = self.position(x, y) {
            self.screen[pos] = c;
        }
    }

    /// Write text from a cell, clipped at the right edge
    pub fn write_str(&mut self, x: u8, y: u8, text: &str) {
        let Some(start) = self.position(x, y) else {
            return;
        };
        let room = self.cols - x as usize;
        for (i, &b) in text.as_bytes().iter().take(room).enumerate() {
            self.screen[start + i] = b;
        }
    }

    /// Fill a rectangle, clipped to the grid
    pub fn fill(&mut self, x: u8, y: u8, width: u8, height: u8, value: u8) {
        let x_end = (x as usize + width as usize).min(self.cols);
        let y_end = (y as usize + height as usize).min(self.rows());
        for row in y as usize..y_end {
            let base = row * self.cols;
            for col in x as usize..x_end {
                self.screen[base + col] = value;
            }
        }
    }

    /// Blank the whole screen
    pub fn clear(&mut self) {
        self.screen[..self.len].fill(b' ');
    }

    fn position(&self, x: u8, y: u8) -> Option<usize> {
        let pos = y as usize * self.cols + x as usize;
        ((x as usize) < self.cols && pos < self.len).then_some(pos)
    }

    fn changed(&self, pos: usize) -> bool {
        pos < self.len && self.screen[pos] != self.shadow[pos]
    }

    /// First differing cell at or after `from`, wrapping once
    fn next_difference(&self, from: usize) -> Option<usize> {
        (0..self.len)
            .map(|i| (from + i) % self.len)
            .find(|&pos| self.changed(pos))
    }

    /// Run one incremental sync pass
    ///
    /// Sends at most `budget` cells, never more than the transport can
    /// take right now, and never blocks. Cells reach the shadow only once
    /// their frame has been handed to the transport. A pass that finds no
    /// transmit space simply ends; the next pass picks up from the cursor.
    /// The pass holds the buffer exclusively, so passes never overlap.
    pub fn sync<T: SerialTransport>(
        &mut self,
        transport: &mut T,
        budget: usize,
    ) -> Result<SyncReport, LinkError> {
        if self.len == 0 {
            return Ok(SyncReport::default());
        }
        let report = self.sync_runs(transport, budget)?;
        self.pending = self.next_difference(self.cursor).is_some();
        Ok(report)
    }

    fn sync_runs<T: SerialTransport>(
        &mut self,
        transport: &mut T,
        budget: usize,
    ) -> Result<SyncReport, LinkError> {
        let mut report = SyncReport::default();
        let mut remaining = budget;
        let mut frame = [0u8; MAX_SYNC_FRAME];
        let mut data = [0u8; MAX_SYNC_DATA];

        while remaining > 0 {
            let Some(start) = self.next_difference(self.cursor) else {
                break;
            };

            let free = transport.tx_bytes_free();
            if free <= RUN_OVERHEAD {
                trace!("tinyosd: sync pass stopped, no transmit space");
                break;
            }
            let max_run = remaining
                .min(free - RUN_OVERHEAD)
                .min(data.len() - 1);

            let mut end = start;
            while end < self.len
                && end - start < max_run
                && (self.changed(end) || self.changed(end + 1))
            {
                end += 1;
            }
            let run = end - start;

            data[0] = start as u8;
            data[1..=run].copy_from_slice(&self.screen[start..end]);
            let n = encode_sync_frame(page_of(start as u16), &data[..=run], &mut frame)?;
            transport
                .write_all(&frame[..n])
                .map_err(|_| LinkError::Transport)?;

            self.shadow[start..end].copy_from_slice(&self.screen[start..end]);
            self.cursor = end % self.len;
            remaining -= run;
            report.frames += 1;
            report.cells += run;
            report.bytes += n;
        }

        Ok(report)
    }

    /// Push the whole buffer, page by page
    ///
    /// Blocks until every chunk has been accepted or `timeout_ms` has
    /// passed. Chunks that went out are committed to the shadow either
    /// way.
    pub fn refresh_all<T: SerialTransport, C: MonotonicClock>(
        &mut self,
        transport: &mut T,
        clock: &C,
        timeout_ms: u32,
    ) -> Result<RefreshReport, LinkError> {
        let deadline = Deadline::after_ms(clock, timeout_ms);
        let mut frame = [0u8; MAX_SYNC_FRAME];
        let mut data = [0u8; REFRESH_CHUNK + 1];
        let mut pos = 0;

        while pos < self.len {
            let page_room = PAGE_SIZE - pos % PAGE_SIZE;
            let chunk = (self.len - pos).min(REFRESH_CHUNK).min(page_room);

            data[0] = pos as u8;
            data[1..=chunk].copy_from_slice(&self.screen[pos..pos + chunk]);
            let n = encode_sync_frame(page_of(pos as u16), &data[..=chunk], &mut frame)?;

            while transport.tx_bytes_free() < n {
                if deadline.expired(clock) {
                    warn!(
                        "tinyosd: refresh stopped after {=usize} of {=usize} cells",
                        pos,
                        self.len
                    );
                    self.pending = true;
                    return Ok(RefreshReport {
                        cells: pos,
                        complete: false,
                    });
                }
            }
            transport
                .write_all(&frame[..n])
                .map_err(|_| LinkError::Transport)?;

            self.shadow[pos..pos + chunk].copy_from_slice(&self.screen[pos..pos + chunk]);
            pos += chunk;
        }

        self.cursor = 0;
        self.pending = false;
        Ok(RefreshReport {
            cells: pos,
            complete: true,
        })
    }
}

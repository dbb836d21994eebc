//! TinyOSD display driver

use embedded_io::Write;
use osdlink_core::config::{DisplayFeatures, OsdSettings, VideoSystem, DEFAULT_REPORTED_COLS};
use osdlink_core::overlay::{OverlayItem, OverlayScheduler, StickOverlay};
use osdlink_core::traits::{DisplayError, DisplayPort, FlightState};
use osdlink_hal::{MonotonicClock, SerialTransport};
use osdlink_protocol::sync::{encode_sync_frame, CMD_STICKS, MAX_SYNC_FRAME};
use osdlink_protocol::SyncFrame;

use super::buffer::{RefreshReport, ScreenBuffer, REFRESH_TIMEOUT_MS, SYNC_BUDGET};
use crate::error::LinkError;

/// TinyOSD driver
pub struct TinyOsd<T, C, F> {
    transport: T,
    clock: C,
    flight: F,
    settings: OsdSettings,
    buffer: ScreenBuffer,
    scheduler: OverlayScheduler,
    rows: u8,
    cols: u8,
    grab_count: u8,
    initialized: bool,
    last_refresh: Option<RefreshReport>,
}

impl<T, C, F> TinyOsd<T, C, F>
where
    T: SerialTransport,
    C: MonotonicClock,
    F: FlightState,
{
    /// Create a driver; nothing is sent until [`init`](Self::init)
    pub fn new(transport: T, clock: C, flight: F, settings: OsdSettings) -> Self {
        let video_system = settings.vcd.video_system;
        Self {
            transport,
            clock,
            flight,
            settings,
            buffer: ScreenBuffer::new(video_system),
            scheduler: OverlayScheduler::default(),
            rows: video_system.rows(),
            cols: DEFAULT_REPORTED_COLS,
            grab_count: 0,
            initialized: false,
            last_refresh: None,
        }
    }

    /// Enable the device and bring its screen in line with the buffer
    ///
    /// The first call pushes the whole buffer; later calls only mark it
    /// stale and leave the redraw to the regular sync passes. A refresh cut
    /// short by its deadline shows up in [`last_refresh`](Self::last_refresh)
    /// and the remaining cells go out with the next sync passes.
    pub fn init(&mut self) -> Result<(), LinkError> {
        self.send(&SyncFrame::enable())?;
        self.buffer.invalidate();
        self.scheduler.reset();

        if !self.initialized {
            self.refresh()?;
            self.initialized = true;
        }
        Ok(())
    }

    /// Outcome of the most recent full refresh
    pub fn last_refresh(&self) -> Option<RefreshReport> {
        self.last_refresh
    }

    /// Local screen model
    pub fn buffer(&self) -> &ScreenBuffer {
        &self.buffer
    }

    pub fn settings(&self) -> &OsdSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut OsdSettings {
        &mut self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Whether someone holds the display
    pub fn is_grabbed(&self) -> bool {
        self.grab_count > 0
    }

    /// Switch video standard; the next passes redraw everything
    pub fn set_video_system(&mut self, video_system: VideoSystem) {
        self.settings.vcd.video_system = video_system;
        self.buffer.resize(video_system);
    }

    fn refresh(&mut self) -> Result<RefreshReport, LinkError> {
        let report =
            self.buffer
                .refresh_all(&mut self.transport, &self.clock, REFRESH_TIMEOUT_MS)?;
        self.last_refresh = Some(report);
        Ok(report)
    }

    fn send(&mut self, frame: &SyncFrame) -> Result<(), LinkError> {
        let mut buf = [0u8; MAX_SYNC_FRAME];
        let n = frame.encode(&mut buf)?;
        self.write_frame(&buf[..n])
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        if self.transport.tx_bytes_free() < frame.len() {
            return Err(LinkError::BudgetExhausted);
        }
        self.transport
            .write_all(frame)
            .map_err(|_| LinkError::Transport)
    }

    fn send_sticks(&mut self) -> Result<(), LinkError> {
        let overlay = StickOverlay::from_rc(
            &self.flight.rc_command(),
            self.flight.arming_flags(),
        );
        let mut buf = [0u8; MAX_SYNC_FRAME];
        let n = encode_sync_frame(CMD_STICKS, &overlay.to_bytes(), &mut buf)?;
        self.write_frame(&buf[..n])
    }

    fn run_overlay(&mut self, item: OverlayItem) -> Result<(), LinkError> {
        match item {
            OverlayItem::Features => self.send(&SyncFrame::enable()),
            OverlayItem::Sticks
                if self
                    .settings
                    .profile
                    .is_enabled(DisplayFeatures::RENDER_STICKS) =>
            {
                self.send_sticks()
            }
            // No spectrum rendering on this device
            _ => Ok(()),
        }
    }
}

impl<T, C, F> DisplayPort for TinyOsd<T, C, F>
where
    T: SerialTransport,
    C: MonotonicClock,
    F: FlightState,
{
    fn grab(&mut self) -> Result<(), DisplayError> {
        self.grab_count = self.grab_count.saturating_add(1);
        Ok(())
    }

    fn release(&mut self) -> Result<(), DisplayError> {
        self.grab_count = self.grab_count.saturating_sub(1);
        Ok(())
    }

    fn clear_screen(&mut self) -> Result<(), DisplayError> {
        self.buffer.clear();
        Ok(())
    }

    fn fill_region(
        &mut self,
        x: u8,
        y: u8,
        width: u8,
        height: u8,
        value: u8,
    ) -> Result<(), DisplayError> {
        self.buffer.fill(x, y, width, height, value);
        Ok(())
    }

    fn draw_screen(&mut self) -> Result<(), DisplayError> {
        self.buffer.sync(&mut self.transport, SYNC_BUDGET)?;
        Ok(())
    }

    fn write_string(&mut self, x: u8, y: u8, text: &str) -> Result<(), DisplayError> {
        self.buffer.write_str(x, y, text);
        Ok(())
    }

    fn write_char(&mut self, x: u8, y: u8, c: u8) -> Result<(), DisplayError> {
        self.buffer.set(x, y, c);
        Ok(())
    }

    fn reload_profile(&mut self) -> Result<(), DisplayError> {
        // Enable is the only setting this device takes
        match self.send(&SyncFrame::enable()) {
            Err(LinkError::BudgetExhausted) => Ok(()),
            other => other.map_err(DisplayError::from),
        }
    }

    fn is_transfer_in_progress(&self) -> bool {
        self.buffer.is_pending()
    }

    fn heartbeat(&mut self) -> Result<(), DisplayError> {
        let now = self.clock.now_us();
        let Some(item) = self.scheduler.tick(now) else {
            return Ok(());
        };
        match self.run_overlay(item) {
            Err(LinkError::BudgetExhausted) => Ok(()),
            other => other.map_err(DisplayError::from),
        }
    }

    fn resync(&mut self) -> Result<(), DisplayError> {
        // A partial refresh is finished by the regular sync passes
        self.buffer.invalidate();
        self.refresh()?;

        let rows = self.settings.vcd.video_system.rows();
        let profile = &self.settings.profile;
        self.rows = profile.adjusted_rows(rows);
        self.cols = profile.adjusted_cols(DEFAULT_REPORTED_COLS);
        Ok(())
    }

    fn tx_bytes_free(&self) -> usize {
        self.transport.tx_bytes_free()
    }

    fn rows(&self) -> u8 {
        self.rows
    }

    fn cols(&self) -> u8 {
        self.cols
    }
}

//! OpenTCO OSD display driver
//!
//! Every drawing call goes straight to the device as one frame; the
//! device keeps its own character grid. Settings live in device registers
//! and are pushed on init, on `reload_profile` and as part of the overlay
//! cycle.

use osdlink_core::config::{
    DisplayFeatures, OsdSettings, VideoSystem, DEFAULT_REPORTED_COLS,
};
use osdlink_core::overlay::{OverlayItem, OverlayScheduler, SpectrumScaler, StickOverlay};
use osdlink_core::traits::{Axis, DisplayError, DisplayPort, FlightState};
use osdlink_hal::{MonotonicClock, SerialTransport};
use osdlink_protocol::commands::{
    feature, reg, CMD_FILL_REGION, CMD_SPECIAL, CMD_WRITE, CMD_WRITE_BUFFER_H, DEVICE_OSD,
    SPECIAL_SUB_SPECTRUM, SPECIAL_SUB_STICKSTATUS,
};

use super::charset::{CharsetEnumerator, CharsetList};
use super::device::OpenTcoDevice;
use crate::error::LinkError;

/// Display feature to device feature bit
const FEATURE_MAP: [(DisplayFeatures, u16); 9] = [
    (DisplayFeatures::ENABLE, feature::ENABLE),
    (DisplayFeatures::INVERT, feature::INVERT),
    (DisplayFeatures::BRIGHTNESS, feature::BRIGHTNESS),
    (DisplayFeatures::CHARSET, feature::CHARSET),
    (DisplayFeatures::RENDER_LOGO, feature::RENDER_LOGO),
    (DisplayFeatures::RENDER_PILOT_LOGO, feature::RENDER_PILOTLOGO),
    (DisplayFeatures::RENDER_STICKS, feature::RENDER_STICKS),
    (DisplayFeatures::RENDER_SPECTRUM, feature::RENDER_SPECTRUM),
    (DisplayFeatures::RENDER_CROSSHAIR, feature::RENDER_CROSSHAIR),
];

/// Encode a display feature set as device register bits
pub fn to_device_features(features: DisplayFeatures) -> u16 {
    FEATURE_MAP
        .iter()
        .filter(|(display, _)| features.contains(*display))
        .fold(0, |bits, (_, device)| bits | device)
}

/// Decode device register bits into a display feature set
pub fn from_device_features(bits: u16) -> DisplayFeatures {
    FEATURE_MAP
        .iter()
        .filter(|(_, device)| bits & device != 0)
        .fold(DisplayFeatures::NONE, |set, (display, _)| set.union(*display))
}

/// OpenTCO OSD driver
pub struct OpenTcoOsd<T, C, F> {
    device: OpenTcoDevice<T, C>,
    flight: F,
    settings: OsdSettings,
    video_system: VideoSystem,
    charsets: CharsetList,
    scheduler: OverlayScheduler,
    spectrum: SpectrumScaler,
    rows: u8,
    cols: u8,
    grab_count: u8,
}

impl<T, C, F> OpenTcoOsd<T, C, F>
where
    T: SerialTransport,
    C: MonotonicClock,
    F: FlightState,
{
    /// Create a driver; nothing is sent until [`init`](Self::init)
    pub fn new(transport: T, clock: C, flight: F, settings: OsdSettings) -> Self {
        let video_system = settings.vcd.video_system;
        Self {
            device: OpenTcoDevice::new(transport, clock, DEVICE_OSD),
            flight,
            settings,
            video_system,
            charsets: CharsetList::new(),
            scheduler: OverlayScheduler::default(),
            spectrum: SpectrumScaler::new(),
            rows: video_system.rows(),
            cols: DEFAULT_REPORTED_COLS,
            grab_count: 0,
        }
    }

    /// Check the device is present and bring it to the configured state
    ///
    /// Returns [`LinkError::DeviceAbsent`] if nothing answers the status read;
    /// the driver can still be used, frames just go nowhere.
    pub fn init(&mut self) -> Result<(), LinkError> {
        if let Err(e) = self.device.read_register_u16(reg::STATUS) {
            warn!("opentco: no OSD device found");
            return Err(match e {
                LinkError::Timeout | LinkError::CrcMismatch => LinkError::DeviceAbsent,
                other => other,
            });
        }
        info!("opentco: OSD device found");

        self.negotiate_video_system()?;
        self.device
            .write_register_u16(reg::CHARSET, self.settings.osd.charset as u16)?;

        match self.device.read_register_u16(reg::SUPPORTED_FEATURES) {
            Ok(supported) => self
                .settings
                .profile
                .apply_supported(from_device_features(supported)),
            Err(LinkError::Timeout) => {
                warn!("opentco: supported features unknown, keeping profile");
            }
            Err(e) => return Err(e),
        }

        if self
            .settings
            .profile
            .supported_features
            .contains(DisplayFeatures::CHARSET)
        {
            self.discover_charsets();
            self.device
                .write_register_u16(reg::CHARSET, self.settings.osd.charset as u16)?;
        }

        self.rows = self.video_system.rows();
        self.scheduler.reset();
        self.clear()
    }

    /// `Auto` adopts what the device detected, anything else is forced
    fn negotiate_video_system(&mut self) -> Result<(), LinkError> {
        match self.settings.vcd.video_system {
            VideoSystem::Auto => match self.device.read_register_u16(reg::VIDEO_FORMAT) {
                Ok(value) => self.video_system = VideoSystem::from_register(value),
                Err(LinkError::Timeout) => {
                    warn!("opentco: video format unknown, assuming NTSC rows");
                    self.video_system = VideoSystem::Auto;
                }
                Err(e) => return Err(e),
            },
            forced => {
                self.device
                    .write_register_u16(reg::VIDEO_FORMAT, forced.to_register())?;
                self.video_system = forced;
            }
        }
        Ok(())
    }

    /// Run charset discovery, replacing the previous result
    pub fn discover_charsets(&mut self) -> &CharsetList {
        self.charsets = CharsetEnumerator::new().run(&mut self.device);
        &self.charsets
    }

    /// Charsets found by the last discovery
    pub fn charsets(&self) -> &CharsetList {
        &self.charsets
    }

    /// Select the active charset
    pub fn select_charset(&mut self, id: u8) -> Result<(), LinkError> {
        self.settings.osd.charset = id;
        self.device.write_register_u16(reg::CHARSET, id as u16)
    }

    /// Video standard in use
    pub fn video_system(&self) -> VideoSystem {
        self.video_system
    }

    pub fn settings(&self) -> &OsdSettings {
        &self.settings
    }

    /// Mutable settings; call `reload_profile` to push changes
    pub fn settings_mut(&mut self) -> &mut OsdSettings {
        &mut self.settings
    }

    pub fn device(&self) -> &OpenTcoDevice<T, C> {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut OpenTcoDevice<T, C> {
        &mut self.device
    }

    /// Whether someone holds the display
    pub fn is_grabbed(&self) -> bool {
        self.grab_count > 0
    }

    /// Blank the largest region a device can address
    fn clear(&mut self) -> Result<(), LinkError> {
        self.device
            .send_command(CMD_FILL_REGION, &[0, 0, u8::MAX, u8::MAX, b' '])
    }

    fn announce_features(&mut self) -> Result<(), LinkError> {
        let bits = to_device_features(self.settings.profile.enabled_features);
        self.device.write_register_u16(reg::STATUS, bits)
    }

    fn send_sticks(&mut self) -> Result<(), LinkError> {
        let overlay = StickOverlay::from_rc(
            &self.flight.rc_command(),
            self.flight.arming_flags(),
        );
        let frame = self.device.begin_frame(CMD_SPECIAL);
        let slot = frame.reserve_length()?;
        frame.push_u8(SPECIAL_SUB_STICKSTATUS)?;
        frame.push_bytes(&overlay.to_bytes())?;
        frame.patch_length(slot);
        self.device.send_frame()
    }

    fn send_spectrum(&mut self, axis: Axis) -> Result<(), LinkError> {
        let Some(sample) = self.flight.spectrum(axis) else {
            return Ok(());
        };
        let bins = self.spectrum.scale(axis, &sample);
        let arming_flags = self.flight.arming_flags();
        let frame = self.device.begin_frame(CMD_SPECIAL);
        let slot = frame.reserve_length()?;
        frame.push_u8(SPECIAL_SUB_SPECTRUM)?;
        frame.push_u8(axis.index() as u8)?;
        frame.push_bytes(&bins)?;
        frame.push_u8(arming_flags)?;
        frame.patch_length(slot);
        self.device.send_frame()
    }

    fn run_overlay(&mut self, item: OverlayItem) -> Result<(), LinkError> {
        let profile = self.settings.profile;
        match item {
            OverlayItem::Features => self.announce_features(),
            OverlayItem::Sticks if profile.is_enabled(DisplayFeatures::RENDER_STICKS) => {
                self.send_sticks()
            }
            OverlayItem::Spectrum(axis) if profile.is_enabled(DisplayFeatures::RENDER_SPECTRUM) => {
                self.send_spectrum(axis)
            }
            _ => Ok(()),
        }
    }
}

impl<T, C, F> DisplayPort for OpenTcoOsd<T, C, F>
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
        self.clear()?;
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
        self.device
            .send_command(CMD_FILL_REGION, &[x, y, width, height, value])?;
        Ok(())
    }

    fn draw_screen(&mut self) -> Result<(), DisplayError> {
        // Drawing commands are applied by the device as they arrive
        Ok(())
    }

    fn write_string(&mut self, x: u8, y: u8, text: &str) -> Result<(), DisplayError> {
        let frame = self.device.begin_frame(CMD_WRITE_BUFFER_H);
        let slot = frame.reserve_length().map_err(LinkError::from)?;
        frame.push_u8(x).map_err(LinkError::from)?;
        frame.push_u8(y).map_err(LinkError::from)?;
        frame.push_str(text).map_err(LinkError::from)?;
        frame.patch_length(slot);
        self.device.send_frame()?;
        Ok(())
    }

    fn write_char(&mut self, x: u8, y: u8, c: u8) -> Result<(), DisplayError> {
        self.device.send_command(CMD_WRITE, &[x, y, c])?;
        Ok(())
    }

    fn reload_profile(&mut self) -> Result<(), DisplayError> {
        self.announce_features()?;
        let profile = self.settings.profile;
        self.device
            .write_register_u16(reg::BRIGHTNESS_BLACK, profile.black_brightness as u16)?;
        self.device
            .write_register_u16(reg::BRIGHTNESS_WHITE, profile.white_brightness as u16)?;
        Ok(())
    }

    fn is_transfer_in_progress(&self) -> bool {
        // Every command is a single frame
        false
    }

    fn heartbeat(&mut self) -> Result<(), DisplayError> {
        let now = self.device.clock().now_us();
        let Some(item) = self.scheduler.tick(now) else {
            return Ok(());
        };
        match self.run_overlay(item) {
            // Overlay is redrawn on its next turn
            Err(LinkError::BudgetExhausted) => Ok(()),
            other => other.map_err(DisplayError::from),
        }
    }

    fn resync(&mut self) -> Result<(), DisplayError> {
        let (rows, cols) = match self.device.read_register_u16(reg::SCREEN_SIZE) {
            Ok(size) => ((size >> 8) as u8, size as u8),
            Err(LinkError::Timeout) => (self.video_system.rows(), DEFAULT_REPORTED_COLS),
            Err(e) => return Err(e.into()),
        };
        let profile = &self.settings.profile;
        self.rows = profile.adjusted_rows(rows);
        self.cols = profile.adjusted_cols(cols);
        Ok(())
    }

    fn tx_bytes_free(&self) -> usize {
        self.device.transport().tx_bytes_free()
    }

    fn rows(&self) -> u8 {
        self.rows
    }

    fn cols(&self) -> u8 {
        self.cols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{charset, SimOpenTco, StaticFlight, StepClock};
    use osdlink_core::config::{DisplayPortProfile, VIDEO_LINES_PAL};
    use osdlink_core::traits::SPECTRUM_BIN_COUNT;
    use osdlink_protocol::commands::{CMD_GET_NEXT_CHARSET, CMD_REGISTER_ACCESS};
    use osdlink_protocol::RegisterAccess;

    fn sim_device() -> SimOpenTco {
        let mut sim = SimOpenTco::new();
        sim.registers[reg::SUPPORTED_FEATURES as usize] = feature::ENABLE
            | feature::BRIGHTNESS
            | feature::CHARSET
            | feature::RENDER_STICKS
            | feature::RENDER_SPECTRUM;
        sim.registers[reg::VIDEO_FORMAT as usize] = 1;
        sim.charsets.push(charset(0, "BETAFLIGHT"));
        sim.charsets.push(charset(1, "CLARITY"));
        sim
    }

    fn settings() -> OsdSettings {
        let mut settings = OsdSettings::default();
        settings.profile = DisplayPortProfile {
            black_brightness: 10,
            white_brightness: 90,
            enabled_features: DisplayFeatures::ENABLE
                .union(DisplayFeatures::RENDER_STICKS)
                .union(DisplayFeatures::RENDER_SPECTRUM)
                .union(DisplayFeatures::RENDER_CROSSHAIR),
            ..Default::default()
        };
        settings.osd.charset = 1;
        settings
    }

    fn osd(clock: &StepClock) -> OpenTcoOsd<SimOpenTco, &StepClock, StaticFlight> {
        OpenTcoOsd::new(sim_device(), clock, StaticFlight::with_spectrum(40.0), settings())
    }

    fn register_writes(sim: &SimOpenTco, register: u8) -> Vec<u16> {
        sim.frames_with(CMD_REGISTER_ACCESS)
            .filter_map(|f| RegisterAccess::from_payload(&f.payload).ok())
            .filter(|a| !a.read && a.register == register)
            .map(|a| a.value)
            .collect()
    }

    #[test]
    fn test_feature_mapping() {
        let set = DisplayFeatures::ENABLE.union(DisplayFeatures::RENDER_PILOT_LOGO);
        assert_eq!(to_device_features(set), feature::ENABLE | feature::RENDER_PILOTLOGO);
        assert_eq!(from_device_features(to_device_features(set)), set);
        assert_eq!(from_device_features(0x00F0), DisplayFeatures::NONE);
    }

    #[test]
    fn test_init() {
        let clock = StepClock::new(1_000);
        let mut osd = osd(&clock);
        osd.init().unwrap();

        assert_eq!(osd.video_system(), VideoSystem::Pal);
        assert_eq!(osd.charsets().len(), 2);
        assert_eq!(osd.charsets()[1].name_str(), "CLARITY");

        // Crosshair is not supported and gets masked out
        let profile = &osd.settings().profile;
        assert!(profile.is_enabled(DisplayFeatures::RENDER_STICKS));
        assert!(!profile.is_enabled(DisplayFeatures::RENDER_CROSSHAIR));

        let sim = osd.device().transport();
        assert_eq!(register_writes(sim, reg::CHARSET), vec![1, 1]);
        assert_eq!(sim.registers[reg::CHARSET as usize], 1);
        assert_eq!(sim.frames_with(CMD_GET_NEXT_CHARSET).count(), 2);

        // Ends with a full-screen clear
        let last = sim.frames.last().unwrap();
        assert_eq!(last.devcmd.command, CMD_FILL_REGION);
        assert_eq!(&last.payload[..], &[0, 0, 255, 255, b' ']);
    }

    #[test]
    fn test_init_forced_video_system() {
        let clock = StepClock::new(1_000);
        let mut settings = settings();
        settings.vcd.video_system = VideoSystem::Ntsc;
        let mut osd = OpenTcoOsd::new(sim_device(), &clock, StaticFlight::default(), settings);
        osd.init().unwrap();

        assert_eq!(osd.video_system(), VideoSystem::Ntsc);
        assert_eq!(osd.device().transport().registers[reg::VIDEO_FORMAT as usize], 2);
    }

    #[test]
    fn test_init_device_absent() {
        let clock = StepClock::new(1_000);
        let mut sim = sim_device();
        sim.silent = true;
        let mut osd = OpenTcoOsd::new(sim, &clock, StaticFlight::default(), settings());

        assert_eq!(osd.init(), Err(LinkError::DeviceAbsent));
    }

    #[test]
    fn test_init_survives_device_going_quiet() {
        let clock = StepClock::new(1_000);
        let mut sim = sim_device();
        // Answers the status read, then nothing
        sim.reply_limit = Some(1);
        let mut osd = OpenTcoOsd::new(sim, &clock, StaticFlight::default(), settings());

        assert_eq!(osd.init(), Ok(()));
        let profile = &osd.settings().profile;
        assert!(profile.is_enabled(DisplayFeatures::RENDER_CROSSHAIR));

        let last = osd.device().transport().frames.last().unwrap().clone();
        assert_eq!(last.devcmd.command, CMD_FILL_REGION);
    }

    #[test]
    fn test_write_string_frame() {
        let clock = StepClock::new(1_000);
        let mut osd = osd(&clock);
        osd.write_string(3, 4, "ARMED").unwrap();

        let frame = osd.device().transport().frames.last().unwrap().clone();
        assert_eq!(frame.devcmd.command, CMD_WRITE_BUFFER_H);
        assert_eq!(&frame.payload[..], b"\x03\x04ARMED");
    }

    #[test]
    fn test_write_string_too_long() {
        let clock = StepClock::new(1_000);
        let mut osd = osd(&clock);
        let text = core::str::from_utf8(&[b'X'; 60]).unwrap();
        assert_eq!(osd.write_string(0, 0, text), Err(DisplayError::BufferOverflow));
        assert!(osd.device().transport().frames.is_empty());
    }

    #[test]
    fn test_write_char_and_fill() {
        let clock = StepClock::new(1_000);
        let mut osd = osd(&clock);
        osd.write_char(1, 2, b'Z').unwrap();
        osd.fill_region(0, 5, 10, 2, b'-').unwrap();

        let frames = &osd.device().transport().frames;
        assert_eq!(frames[0].devcmd.command, CMD_WRITE);
        assert_eq!(&frames[0].payload[..], &[1, 2, b'Z']);
        assert_eq!(&frames[1].payload[..], &[0, 5, 10, 2, b'-']);
    }

    #[test]
    fn test_reload_profile() {
        let clock = StepClock::new(1_000);
        let mut osd = osd(&clock);
        osd.reload_profile().unwrap();

        let regs = &osd.device().transport().registers;
        assert_eq!(regs[reg::BRIGHTNESS_BLACK as usize], 10);
        assert_eq!(regs[reg::BRIGHTNESS_WHITE as usize], 90);
        assert_eq!(
            regs[reg::STATUS as usize],
            feature::ENABLE
                | feature::RENDER_STICKS
                | feature::RENDER_SPECTRUM
                | feature::RENDER_CROSSHAIR
        );
    }

    #[test]
    fn test_heartbeat_cycle() {
        let clock = StepClock::new(10);
        let mut osd = osd(&clock);
        osd.flight.arming_flags = 0x5A;

        for _ in 0..3 {
            osd.heartbeat().unwrap();
            // Inside the interval nothing else goes out
            osd.heartbeat().unwrap();
            clock.advance_ms(100);
        }

        let frames = &osd.device().transport().frames;
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].devcmd.command, CMD_REGISTER_ACCESS);
        assert_eq!(frames[1].devcmd.command, CMD_SPECIAL);
        assert_eq!(frames[1].payload[0], SPECIAL_SUB_STICKSTATUS);
        assert_eq!(frames[2].devcmd.command, CMD_SPECIAL);
        assert_eq!(frames[2].payload[0], SPECIAL_SUB_SPECTRUM);
        assert_eq!(frames[2].payload[1], Axis::Roll as u8);
        // [sub][axis][bins...][arming flags]
        let spectrum = &frames[2].payload;
        assert_eq!(spectrum.len(), 2 + SPECTRUM_BIN_COUNT + 1);
        assert_eq!(&spectrum[2..2 + SPECTRUM_BIN_COUNT], &[255; SPECTRUM_BIN_COUNT]);
        assert_eq!(spectrum[spectrum.len() - 1], 0x5A);
    }

    #[test]
    fn test_heartbeat_skips_disabled_overlays() {
        let clock = StepClock::new(10);
        let mut settings = settings();
        settings.profile.enabled_features = DisplayFeatures::ENABLE;
        let mut osd = OpenTcoOsd::new(sim_device(), &clock, StaticFlight::default(), settings);

        for _ in 0..3 {
            osd.heartbeat().unwrap();
            clock.advance_ms(100);
        }
        assert_eq!(osd.device().transport().frames.len(), 1);
    }

    #[test]
    fn test_heartbeat_without_tx_space() {
        let clock = StepClock::new(10);
        let mut osd = osd(&clock);
        osd.device_mut().transport_mut().tx_capacity = 0;

        assert_eq!(osd.heartbeat(), Ok(()));
        assert!(osd.device().transport().frames.is_empty());
    }

    #[test]
    fn test_resync_reads_screen_size() {
        let clock = StepClock::new(1_000);
        let mut osd = osd(&clock);
        osd.device_mut().transport_mut().registers[reg::SCREEN_SIZE as usize] = (16 << 8) | 35;
        osd.settings_mut().profile.col_adjust = -1;
        osd.resync().unwrap();

        assert_eq!(osd.rows(), 16);
        assert_eq!(osd.cols(), 34);
    }

    #[test]
    fn test_resync_fallback() {
        let clock = StepClock::new(1_000);
        let mut settings = settings();
        settings.vcd.video_system = VideoSystem::Pal;
        let mut sim = sim_device();
        sim.silent = true;
        let mut osd = OpenTcoOsd::new(sim, &clock, StaticFlight::default(), settings);
        osd.resync().unwrap();

        assert_eq!(osd.rows(), VIDEO_LINES_PAL);
        assert_eq!(osd.cols(), DEFAULT_REPORTED_COLS);
    }

    #[test]
    fn test_grab_release() {
        let clock = StepClock::new(1_000);
        let mut osd = osd(&clock);
        osd.grab().unwrap();
        assert!(osd.is_grabbed());
        osd.release().unwrap();
        osd.release().unwrap();
        assert!(!osd.is_grabbed());
    }
}

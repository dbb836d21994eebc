//! Charset discovery
//!
//! The device lists its charsets one per GET_NEXT_CHARSET exchange after a
//! RESET_CHARSET_ENUM. Each reply is a fixed 14-byte body following the
//! header: `[devcmd][id][name: 10][has_more][crc]`.
//!
//! ```text
//! Reset -> Request -> AwaitingHeader -> AwaitingBody -> Decoded -+-> Request (has_more)
//!             ^              |                |            |      +-> Done
//!             +--------------+----------------+------------+
//!                    timeout / bad crc / wrong devcmd (retry)
//! ```

use heapless::Vec;
use osdlink_hal::{Deadline, MonotonicClock, SerialTransport};
use osdlink_protocol::commands::{
    CHARSET_RESPONSE_BODY, CMD_GET_NEXT_CHARSET, CMD_RESET_CHARSET_ENUM,
};
use osdlink_protocol::frame::CRC8_FROM_HEADER;
use osdlink_protocol::{CharsetInfo, Crc8, DevCmd, FrameError, FRAME_HEADER};

use super::device::{OpenTcoDevice, RESPONSE_TIMEOUT_MS};

/// Largest number of charsets kept from one discovery pass
pub const MAX_CHARSETS: usize = 8;

/// Exchanges attempted per charset before giving up
pub const MAX_RETRIES: u8 = 3;

/// Discovered charsets, in device order
pub type CharsetList = Vec<CharsetInfo, MAX_CHARSETS>;

/// Enumeration state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EnumState {
    /// Enumeration reset not sent yet
    Reset,
    /// Next GET_NEXT_CHARSET request is due
    Request,
    /// Discarding bytes until a frame header shows up
    AwaitingHeader,
    /// Collecting the fixed-size reply body
    AwaitingBody,
    /// Reply body complete, to be validated
    Decoded,
    /// Enumeration finished
    Done,
}

/// Step-wise charset enumeration
///
/// Call [`step`](CharsetEnumerator::step) until it returns `true`, or use
/// [`run`](CharsetEnumerator::run) to drive it to completion.
#[derive(Debug, Clone)]
pub struct CharsetEnumerator {
    state: EnumState,
    attempt: u8,
    exchanges: usize,
    deadline: Deadline,
    body: Vec<u8, CHARSET_RESPONSE_BODY>,
    charsets: CharsetList,
}

impl Default for CharsetEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CharsetEnumerator {
    pub fn new() -> Self {
        Self {
            state: EnumState::Reset,
            attempt: 0,
            exchanges: 0,
            deadline: Deadline::at_us(0),
            body: Vec::new(),
            charsets: Vec::new(),
        }
    }

    pub fn state(&self) -> EnumState {
        self.state
    }

    /// GET_NEXT_CHARSET requests sent so far
    pub fn exchanges(&self) -> usize {
        self.exchanges
    }

    /// Charsets decoded so far
    pub fn charsets(&self) -> &CharsetList {
        &self.charsets
    }

    /// Drive the enumeration to completion and return the result
    pub fn run<T: SerialTransport, C: MonotonicClock>(
        mut self,
        device: &mut OpenTcoDevice<T, C>,
    ) -> CharsetList {
        while !self.step(device) {}
        info!("opentco: found {=usize} charsets", self.charsets.len());
        self.charsets
    }

    /// Advance by one transition
    ///
    /// Never waits; returns `true` once the enumeration is done.
    pub fn step<T: SerialTransport, C: MonotonicClock>(
        &mut self,
        device: &mut OpenTcoDevice<T, C>,
    ) -> bool {
        self.state = match self.state {
            EnumState::Reset => self.reset(device),
            EnumState::Request => self.request(device),
            EnumState::AwaitingHeader => self.await_header(device),
            EnumState::AwaitingBody => self.await_body(device),
            EnumState::Decoded => self.decode(device.device()),
            EnumState::Done => EnumState::Done,
        };
        self.state == EnumState::Done
    }

    fn reset<T: SerialTransport, C: MonotonicClock>(
        &mut self,
        device: &mut OpenTcoDevice<T, C>,
    ) -> EnumState {
        self.charsets.clear();
        self.attempt = 0;
        match device.send_command(CMD_RESET_CHARSET_ENUM, &[]) {
            Ok(()) => EnumState::Request,
            Err(_) => {
                warn!("opentco: charset enumeration reset not sent");
                EnumState::Done
            }
        }
    }

    fn request<T: SerialTransport, C: MonotonicClock>(
        &mut self,
        device: &mut OpenTcoDevice<T, C>,
    ) -> EnumState {
        if self.attempt >= MAX_RETRIES {
            warn!(
                "opentco: charset {=usize} failed after {=u8} attempts",
                self.charsets.len(),
                MAX_RETRIES
            );
            return EnumState::Done;
        }
        self.attempt += 1;
        self.exchanges += 1;
        self.body.clear();

        if device.drain_rx().is_err() {
            return EnumState::Request;
        }
        // A request that could not be sent still counts as an attempt
        if device.send_command(CMD_GET_NEXT_CHARSET, &[]).is_err() {
            return EnumState::Request;
        }
        self.deadline = Deadline::after_ms(device.clock(), RESPONSE_TIMEOUT_MS);
        EnumState::AwaitingHeader
    }

    fn await_header<T: SerialTransport, C: MonotonicClock>(
        &mut self,
        device: &mut OpenTcoDevice<T, C>,
    ) -> EnumState {
        while let Ok(Some(byte)) = device.try_read_byte() {
            if byte == FRAME_HEADER {
                return EnumState::AwaitingBody;
            }
        }
        if self.deadline.expired(device.clock()) {
            return EnumState::Request;
        }
        EnumState::AwaitingHeader
    }

    fn await_body<T: SerialTransport, C: MonotonicClock>(
        &mut self,
        device: &mut OpenTcoDevice<T, C>,
    ) -> EnumState {
        while !self.body.is_full() {
            match device.try_read_byte() {
                Ok(Some(byte)) => {
                    let _ = self.body.push(byte);
                }
                _ => break,
            }
        }
        if self.body.is_full() {
            return EnumState::Decoded;
        }
        if self.deadline.expired(device.clock()) {
            return EnumState::Request;
        }
        EnumState::AwaitingBody
    }

    fn decode(&mut self, device: u8) -> EnumState {
        let info = match parse_reply(&self.body, device) {
            Ok(info) => info,
            Err(_e) => {
                debug!("opentco: charset reply rejected: {}", _e);
                return EnumState::Request;
            }
        };

        self.attempt = 0;
        if self.charsets.push(info).is_err() || !info.has_more || self.charsets.is_full() {
            return EnumState::Done;
        }
        EnumState::Request
    }
}

/// Validate and decode a charset reply body (everything after the header)
pub fn parse_reply(body: &[u8], device: u8) -> Result<CharsetInfo, FrameError> {
    if body.len() != CHARSET_RESPONSE_BODY {
        return Err(FrameError::Incomplete);
    }

    let mut crc = Crc8::from_partial(CRC8_FROM_HEADER);
    crc.update_slice(body);
    if !crc.is_valid() {
        return Err(FrameError::CrcMismatch);
    }

    if body[0] != DevCmd::response(device, CMD_GET_NEXT_CHARSET).to_byte() {
        return Err(FrameError::UnexpectedDevice);
    }

    CharsetInfo::from_payload(&body[1..CHARSET_RESPONSE_BODY - 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{charset, SimOpenTco, StepClock};
    use osdlink_protocol::commands::DEVICE_OSD;

    fn device_with<'a>(
        clock: &'a StepClock,
        names: &[&str],
    ) -> OpenTcoDevice<SimOpenTco, &'a StepClock> {
        let mut sim = SimOpenTco::new();
        for (i, name) in names.iter().enumerate() {
            sim.charsets.push(charset(i as u8 + 1, name));
        }
        OpenTcoDevice::new(sim, clock, DEVICE_OSD)
    }

    #[test]
    fn test_enumerates_all() {
        let clock = StepClock::new(1_000);
        let mut dev = device_with(&clock, &["BETAFLIGHT", "CLARITY", "IMPACT"]);

        let list = CharsetEnumerator::new().run(&mut dev);
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].name_str(), "BETAFLIGHT");
        assert_eq!(list[2].id, 3);
        assert!(!list[2].has_more);
    }

    #[test]
    fn test_state_sequence() {
        let clock = StepClock::new(1_000);
        let mut dev = device_with(&clock, &["DEFAULT"]);
        let mut en = CharsetEnumerator::new();

        assert_eq!(en.state(), EnumState::Reset);
        en.step(&mut dev);
        assert_eq!(en.state(), EnumState::Request);
        en.step(&mut dev);
        assert_eq!(en.state(), EnumState::AwaitingHeader);
        en.step(&mut dev);
        assert_eq!(en.state(), EnumState::AwaitingBody);
        en.step(&mut dev);
        assert_eq!(en.state(), EnumState::Decoded);
        assert!(en.step(&mut dev));
        assert_eq!(en.charsets().len(), 1);
    }

    #[test]
    fn test_corrupted_reply_is_retried() {
        let clock = StepClock::new(1_000);
        let mut dev = device_with(&clock, &["BETAFLIGHT", "CLARITY"]);
        dev.transport_mut().corrupt_charset_replies = 1;

        let mut en = CharsetEnumerator::new();
        // Reset, request, header, body, rejected decode
        for _ in 0..5 {
            en.step(&mut dev);
        }
        assert_eq!(en.state(), EnumState::Request);
        assert!(en.charsets().is_empty());

        while !en.step(&mut dev) {}
        assert_eq!(en.charsets().len(), 2);
        assert_eq!(en.charsets()[0].name_str(), "BETAFLIGHT");
        assert_eq!(en.exchanges(), 3);
    }

    #[test]
    fn test_always_corrupt_terminates() {
        let clock = StepClock::new(1_000);
        let mut dev = device_with(&clock, &["BETAFLIGHT"]);
        dev.transport_mut().corrupt_charset_replies = usize::MAX;

        let mut en = CharsetEnumerator::new();
        while !en.step(&mut dev) {}
        assert!(en.charsets().is_empty());
        assert_eq!(en.exchanges(), MAX_RETRIES as usize);
    }

    #[test]
    fn test_silent_device_terminates() {
        let clock = StepClock::new(1_000);
        let mut dev = device_with(&clock, &["BETAFLIGHT"]);
        dev.transport_mut().silent = true;

        let list = CharsetEnumerator::new().run(&mut dev);
        assert!(list.is_empty());
    }

    #[test]
    fn test_item_cap() {
        let clock = StepClock::new(1_000);
        let names = ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"];
        let mut dev = device_with(&clock, &names);

        let mut en = CharsetEnumerator::new();
        while !en.step(&mut dev) {}
        assert_eq!(en.charsets().len(), MAX_CHARSETS);
        assert!(en.exchanges() <= MAX_RETRIES as usize * MAX_CHARSETS);
    }

    #[test]
    fn test_noise_before_reply() {
        let clock = StepClock::new(1_000);
        let mut dev = device_with(&clock, &["BETAFLIGHT"]);
        dev.transport_mut().noise = vec![0x00, 0x13, 0x37];

        let list = CharsetEnumerator::new().run(&mut dev);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_parse_reply_rejects_other_device() {
        let info = charset(1, "X");
        let mut body = [0u8; CHARSET_RESPONSE_BODY];
        body[0] = DevCmd::response(2, CMD_GET_NEXT_CHARSET).to_byte();
        body[1..13].copy_from_slice(&info.to_payload());
        let mut crc = Crc8::from_partial(CRC8_FROM_HEADER);
        crc.update_slice(&body[..13]);
        body[13] = crc.value();

        assert_eq!(parse_reply(&body, 2), Ok(info));
        assert_eq!(parse_reply(&body, 0), Err(FrameError::UnexpectedDevice));
    }
}

//! OpenTCO device handle and register access
//!
//! One handle per peripheral. It owns the transport, the frame work
//! buffer and the response parser. Register writes are fire-and-forget;
//! register reads wait for a matching reply for at most
//! [`RESPONSE_TIMEOUT_MS`].

use embedded_io::Write;
use osdlink_hal::{Deadline, MonotonicClock, SerialTransport};
use osdlink_protocol::commands::CMD_REGISTER_ACCESS;
use osdlink_protocol::{DevCmd, DeviceFrame, FrameBuilder, FrameError, FrameParser, RegisterAccess};

use crate::error::LinkError;

/// Reply window of a request/response exchange
pub const RESPONSE_TIMEOUT_MS: u32 = 100;

/// Handle to one OpenTCO peripheral on a serial link
pub struct OpenTcoDevice<T, C> {
    transport: T,
    clock: C,
    device: u8,
    builder: FrameBuilder,
    parser: FrameParser,
}

impl<T: SerialTransport, C: MonotonicClock> OpenTcoDevice<T, C> {
    /// Create a handle for `device` (0-7)
    pub fn new(transport: T, clock: C, device: u8) -> Self {
        Self {
            transport,
            clock,
            device: device & 0x07,
            builder: FrameBuilder::new(),
            parser: FrameParser::new(),
        }
    }

    /// Device id this handle talks to
    pub fn device(&self) -> u8 {
        self.device
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Give back the transport and clock
    pub fn release(self) -> (T, C) {
        (self.transport, self.clock)
    }

    /// Start a request frame for `command`
    ///
    /// Append the payload to the returned builder, then call
    /// [`send_frame`](Self::send_frame).
    pub fn begin_frame(&mut self, command: u8) -> &mut FrameBuilder {
        self.builder.begin(DevCmd::request(self.device, command))
    }

    /// Append the CRC and transmit the assembled frame in one write
    ///
    /// Nothing is written if the transport cannot take the whole frame.
    pub fn send_frame(&mut self) -> Result<(), LinkError> {
        let frame = self.builder.finish()?;
        if self.transport.tx_bytes_free() < frame.len() {
            return Err(LinkError::BudgetExhausted);
        }
        self.transport
            .write_all(frame)
            .map_err(|_| LinkError::Transport)
    }

    /// Send a command with a fixed payload
    pub fn send_command(&mut self, command: u8, payload: &[u8]) -> Result<(), LinkError> {
        self.begin_frame(command).push_bytes(payload)?;
        self.send_frame()
    }

    /// Number of received bytes waiting
    pub fn rx_bytes_waiting(&self) -> usize {
        self.transport.rx_bytes_waiting()
    }

    /// Read one received byte, if any
    pub fn try_read_byte(&mut self) -> Result<Option<u8>, LinkError> {
        self.transport
            .try_read_byte()
            .map_err(|_| LinkError::Transport)
    }

    /// Throw away stale received bytes
    pub fn drain_rx(&mut self) -> Result<(), LinkError> {
        self.transport
            .drain_rx()
            .map(|_| ())
            .map_err(|_| LinkError::Transport)
    }

    /// Write a 16-bit register, no confirmation awaited
    pub fn write_register_u16(&mut self, register: u8, value: u16) -> Result<(), LinkError> {
        self.send_command(
            CMD_REGISTER_ACCESS,
            &RegisterAccess::write(register, value).to_payload(),
        )
    }

    /// Send a register read request and return the pending exchange
    ///
    /// The returned [`RegisterRead`] borrows the handle, so no second
    /// request can be issued until it is resolved or dropped.
    pub fn start_read(&mut self, register: u8) -> Result<RegisterRead<'_, T, C>, LinkError> {
        self.drain_rx()?;
        self.parser.reset();
        let access = RegisterAccess::read(register);
        self.send_command(CMD_REGISTER_ACCESS, &access.to_payload())?;
        let deadline = Deadline::after_ms(&self.clock, RESPONSE_TIMEOUT_MS);
        Ok(RegisterRead {
            device: self,
            register: access.register,
            deadline,
        })
    }

    /// Read a 16-bit register
    ///
    /// Polls until a reply for this device and register with a valid CRC
    /// arrives, or fails with [`LinkError::Timeout`] once the response
    /// window has passed.
    pub fn read_register_u16(&mut self, register: u8) -> Result<u16, LinkError> {
        let mut pending = self.start_read(register)?;
        loop {
            if let Some(result) = pending.poll() {
                return result;
            }
        }
    }

    /// Feed waiting bytes to the parser until a frame completes
    fn poll_frame(&mut self) -> Result<Option<DeviceFrame>, LinkError> {
        // Bytes replayed after an earlier rejected frame come first
        let mut parsed = self.parser.feed_pending();
        loop {
            match parsed {
                Ok(Some(frame)) => return Ok(Some(frame)),
                Ok(None) => {}
                Err(FrameError::CrcMismatch) => {
                    debug!("opentco: dropped frame with bad CRC");
                }
                Err(_) => {}
            }
            let Some(byte) = self.try_read_byte()? else {
                return Ok(None);
            };
            parsed = self.parser.feed(byte);
        }
    }
}

/// An outstanding register read
pub struct RegisterRead<'a, T, C> {
    device: &'a mut OpenTcoDevice<T, C>,
    register: u8,
    deadline: Deadline,
}

impl<T: SerialTransport, C: MonotonicClock> RegisterRead<'_, T, C> {
    /// Register being read
    pub fn register(&self) -> u8 {
        self.register
    }

    /// Process whatever has arrived since the last poll
    ///
    /// Returns `None` while still waiting. Frames for other devices,
    /// commands or registers are skipped.
    pub fn poll(&mut self) -> Option<Result<u16, LinkError>> {
        let expected = DevCmd::response(self.device.device, CMD_REGISTER_ACCESS);
        loop {
            match self.device.poll_frame() {
                Ok(Some(frame)) => {
                    if frame.devcmd != expected {
                        continue;
                    }
                    match RegisterAccess::from_payload(&frame.payload) {
                        Ok(access) if access.register == self.register => {
                            return Some(Ok(access.value));
                        }
                        _ => continue,
                    }
                }
                Ok(None) => break,
                Err(e) => return Some(Err(e)),
            }
        }

        if self.deadline.expired(&self.device.clock) {
            warn!("opentco: register {=u8} read timed out", self.register);
            return Some(Err(LinkError::Timeout));
        }
        None
    }
}

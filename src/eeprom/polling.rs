// Licensed under the Apache-2.0 license

//! Synchronous transfer driver and the bus sequencing helpers shared with the DMA
//! driver.

use crate::eeprom::config::{EepromConfig, DEFAULT_BUFFER_SIZE};
use crate::eeprom::driver::{copy_received, TransferDriver};
use crate::eeprom::error::TransferError;
use crate::eeprom::request::TransferPhase;
use crate::eeprom::standby::wait_for_standby;
use crate::eeprom::timeout::TimeoutGuard;
use crate::i2c::{AckPosition, BusEvent, Direction, Flag, I2cBus, XferMode};
use embedded_hal::i2c::SevenBitAddress;
use heapless::Vec;

/// Fail fast on error flags raised while waiting.
fn check_errors<B: I2cBus>(bus: &mut B) -> nb::Result<(), TransferError> {
    if bus.flag(Flag::AckFailure) {
        bus.clear_flag(Flag::AckFailure);
        return Err(nb::Error::Other(TransferError::Nack));
    }
    if bus.flag(Flag::BusError) {
        bus.clear_flag(Flag::BusError);
        return Err(nb::Error::Other(TransferError::BusError));
    }
    Ok(())
}

/// Drop error flags left over from a transfer that was abandoned mid-flight.
pub(crate) fn clear_error_flags<B: I2cBus>(bus: &mut B) {
    bus.clear_flag(Flag::AckFailure);
    bus.clear_flag(Flag::BusError);
}

pub(crate) fn wait_event<B: I2cBus>(
    bus: &mut B,
    guard: &TimeoutGuard,
    event: BusEvent,
) -> Result<(), TransferError> {
    guard.await_nb(|| {
        check_errors(bus)?;
        if bus.check_event(event) {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    })
}

pub(crate) fn wait_flag<B: I2cBus>(
    bus: &mut B,
    guard: &TimeoutGuard,
    flag: Flag,
) -> Result<(), TransferError> {
    guard.await_nb(|| {
        check_errors(bus)?;
        if bus.flag(flag) {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    })
}

pub(crate) fn wait_idle<B: I2cBus>(bus: &mut B, guard: &TimeoutGuard) -> Result<(), TransferError> {
    guard.await_condition(|| !bus.flag(Flag::Busy))
}

/// Start, address for write, and the offset byte. Returns once the offset has left
/// the shift register.
pub(crate) fn send_offset<B: I2cBus>(
    bus: &mut B,
    guard: &TimeoutGuard,
    address: SevenBitAddress,
    offset: u8,
) -> Result<(), TransferError> {
    bus.generate_start();
    wait_event(bus, guard, BusEvent::StartGenerated)?;
    bus.send_address(address, Direction::Transmit);
    wait_event(bus, guard, BusEvent::TransmitterSelected)?;
    bus.send_byte(offset);
    wait_event(bus, guard, BusEvent::ByteTransmitted)
}

/// Repeated start and address for read. Returns with the address flag still set, so
/// the caller can arrange ACK control before the first byte is clocked in.
pub(crate) fn address_for_read<B: I2cBus>(
    bus: &mut B,
    guard: &TimeoutGuard,
    address: SevenBitAddress,
) -> Result<(), TransferError> {
    bus.generate_start();
    wait_event(bus, guard, BusEvent::StartGenerated)?;
    bus.send_address(address, Direction::Receive);
    wait_flag(bus, guard, Flag::AddressSent)
}

/// Blocking driver: every phase is polled to completion inside `start_*`.
pub struct PollingDriver<B: I2cBus, const N: usize = DEFAULT_BUFFER_SIZE> {
    bus: B,
    guard: TimeoutGuard,
    max_trials: u32,
    phase: TransferPhase,
    rx: Vec<u8, N>,
    standby_attempts: u32,
}

impl<B: I2cBus, const N: usize> PollingDriver<B, N> {
    pub fn new(bus: B, config: &EepromConfig) -> Self {
        Self {
            bus,
            guard: config.guard(),
            max_trials: config.max_trials,
            phase: TransferPhase::Idle,
            rx: Vec::new(),
            standby_attempts: 0,
        }
    }

    /// Probes needed by the last completed write to see the device again.
    #[must_use]
    pub fn standby_attempts(&self) -> u32 {
        self.standby_attempts
    }

    pub fn release(self) -> B {
        self.bus
    }

    fn finish(&mut self, result: Result<(), TransferError>) -> Result<(), TransferError> {
        match result {
            Ok(()) => {
                self.phase = TransferPhase::Completed;
                Ok(())
            }
            Err(e) => {
                self.bus.generate_stop();
                self.bus.set_ack(true);
                self.bus.set_ack_position(AckPosition::Current);
                self.phase = TransferPhase::Failed(e);
                Err(e)
            }
        }
    }

    fn write_chunk(
        &mut self,
        address: SevenBitAddress,
        offset: u8,
        data: &[u8],
    ) -> Result<(), TransferError> {
        wait_idle(&mut self.bus, &self.guard)?;
        clear_error_flags(&mut self.bus);
        self.phase = TransferPhase::AddressSent;
        send_offset(&mut self.bus, &self.guard, address, offset)?;
        self.phase = TransferPhase::OffsetSent;

        for &byte in data {
            self.phase = TransferPhase::DataInFlight;
            self.bus.send_byte(byte);
            wait_event(&mut self.bus, &self.guard, BusEvent::ByteTransmitted)?;
        }
        self.bus.generate_stop();

        self.standby_attempts = wait_for_standby(&mut self.bus, address, &self.guard, self.max_trials)?;
        Ok(())
    }

    fn receive(&mut self) -> Result<(), TransferError> {
        let byte = self.bus.receive_byte();
        self.rx.push(byte).map_err(|_| TransferError::InvalidLength)
    }

    fn read_chunk(
        &mut self,
        address: SevenBitAddress,
        offset: u8,
        len: usize,
    ) -> Result<(), TransferError> {
        wait_idle(&mut self.bus, &self.guard)?;
        clear_error_flags(&mut self.bus);
        self.bus.set_ack_position(AckPosition::Current);
        self.bus.set_ack(true);

        self.phase = TransferPhase::AddressSent;
        send_offset(&mut self.bus, &self.guard, address, offset)?;
        self.phase = TransferPhase::RestartForRead;
        address_for_read(&mut self.bus, &self.guard, address)?;
        self.phase = TransferPhase::DataInFlight;

        // ACK control has to be in place before the address flag is released.
        match len {
            1 => {
                self.bus.set_ack(false);
                self.bus.clear_flag(Flag::AddressSent);
                self.bus.generate_stop();
            }
            2 => {
                self.bus.set_ack_position(AckPosition::Next);
                self.bus.clear_flag(Flag::AddressSent);
                self.bus.set_ack(false);
            }
            _ => {
                self.bus.set_ack(true);
                self.bus.clear_flag(Flag::AddressSent);
            }
        }

        let mut remaining = len;
        while remaining > 0 {
            match remaining {
                1 => {
                    wait_event(&mut self.bus, &self.guard, BusEvent::ByteReceived)?;
                    self.receive()?;
                    remaining -= 1;
                }
                2 => {
                    wait_flag(&mut self.bus, &self.guard, Flag::ByteTransferFinished)?;
                    self.bus.generate_stop();
                    self.receive()?;
                    self.receive()?;
                    remaining -= 2;
                }
                3 => {
                    wait_flag(&mut self.bus, &self.guard, Flag::ByteTransferFinished)?;
                    self.bus.set_ack(false);
                    self.receive()?;
                    wait_flag(&mut self.bus, &self.guard, Flag::ByteTransferFinished)?;
                    self.bus.generate_stop();
                    self.receive()?;
                    self.receive()?;
                    remaining -= 3;
                }
                _ => {
                    wait_event(&mut self.bus, &self.guard, BusEvent::ByteReceived)?;
                    self.receive()?;
                    remaining -= 1;
                    // Draining a second byte is only safe while the 3-byte tail is
                    // still ahead.
                    if remaining > 3 && self.bus.flag(Flag::ByteTransferFinished) {
                        self.receive()?;
                        remaining -= 1;
                    }
                }
            }
        }

        self.bus.set_ack_position(AckPosition::Current);
        self.bus.set_ack(true);
        Ok(())
    }

    fn check_start(&self, len: usize) -> Result<(), TransferError> {
        if self.phase.is_active() {
            return Err(TransferError::Busy);
        }
        if len == 0 || len > N {
            return Err(TransferError::InvalidLength);
        }
        Ok(())
    }
}

impl<B: I2cBus, const N: usize> TransferDriver for PollingDriver<B, N> {
    fn mode(&self) -> XferMode {
        XferMode::Polling
    }

    fn max_transfer_len(&self) -> usize {
        N
    }

    fn phase(&self) -> TransferPhase {
        self.phase
    }

    fn start_write(
        &mut self,
        address: SevenBitAddress,
        offset: u8,
        data: &[u8],
    ) -> Result<(), TransferError> {
        self.check_start(data.len())?;
        self.phase = TransferPhase::StartPending;
        let result = self.write_chunk(address, offset, data);
        self.finish(result)
    }

    fn start_read(
        &mut self,
        address: SevenBitAddress,
        offset: u8,
        len: usize,
    ) -> Result<(), TransferError> {
        self.check_start(len)?;
        self.rx.clear();
        self.phase = TransferPhase::StartPending;
        let result = self.read_chunk(address, offset, len);
        self.finish(result)
    }

    fn poll_completion(&mut self) -> nb::Result<(), TransferError> {
        match self.phase {
            TransferPhase::Failed(e) => Err(nb::Error::Other(e)),
            _ => Ok(()),
        }
    }

    fn take_received(&mut self, out: &mut [u8]) -> Result<usize, TransferError> {
        copy_received(&self.rx, out)
    }

    fn abandon(&mut self) {
        self.bus.generate_stop();
        clear_error_flags(&mut self.bus);
        self.phase = TransferPhase::Failed(TransferError::TimedOut);
    }

    fn reset(&mut self) {
        if self.phase.is_terminal() {
            self.phase = TransferPhase::Idle;
        }
    }
}

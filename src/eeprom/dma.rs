// Licensed under the Apache-2.0 license

//! DMA-offloaded transfer driver.
//!
//! The address and offset phases are sequenced inline; the data phase is handed to a
//! DMA channel bound to the controller's data register. The driver owns a borrowed
//! buffer for the lifetime `'a`, which is the memory the channel is programmed with.

use crate::eeprom::config::EepromConfig;
use crate::eeprom::driver::{copy_received, TransferDriver};
use crate::eeprom::error::TransferError;
use crate::eeprom::polling::{
    address_for_read, clear_error_flags, send_offset, wait_event, wait_idle,
};
use crate::eeprom::request::{TransferDirection, TransferPhase};
use crate::eeprom::standby::wait_for_standby;
use crate::eeprom::timeout::TimeoutGuard;
use crate::i2c::{
    AckPosition, BusEvent, DmaChannel, DmaConfig, DmaDirection, Flag, I2cBus, XferMode,
};
use embedded_hal::i2c::SevenBitAddress;

pub struct DmaDriver<'a, B: I2cBus, C: DmaChannel> {
    bus: B,
    channel: C,
    buffer: &'a mut [u8],
    guard: TimeoutGuard,
    max_trials: u32,
    phase: TransferPhase,
    direction: TransferDirection,
    address: SevenBitAddress,
    len: usize,
    standby_attempts: u32,
}

impl<'a, B: I2cBus, C: DmaChannel> DmaDriver<'a, B, C> {
    pub fn new(bus: B, channel: C, buffer: &'a mut [u8], config: &EepromConfig) -> Self {
        Self {
            bus,
            channel,
            buffer,
            guard: config.guard(),
            max_trials: config.max_trials,
            phase: TransferPhase::Idle,
            direction: TransferDirection::Write,
            address: 0,
            len: 0,
            standby_attempts: 0,
        }
    }

    #[must_use]
    pub fn standby_attempts(&self) -> u32 {
        self.standby_attempts
    }

    pub fn release(self) -> (B, C) {
        (self.bus, self.channel)
    }

    fn check_start(&self, len: usize) -> Result<(), TransferError> {
        if self.phase.is_active() {
            return Err(TransferError::Busy);
        }
        if len == 0 || len > self.max_transfer_len() {
            return Err(TransferError::InvalidLength);
        }
        Ok(())
    }

    /// Program and enable the channel over the first `self.len` bytes of the buffer.
    fn arm_channel(&mut self, direction: DmaDirection) -> Result<(), TransferError> {
        let length = u16::try_from(self.len).map_err(|_| TransferError::InvalidLength)?;
        let config = DmaConfig::bytes(direction, self.buffer.as_mut_ptr(), length);
        self.channel.set_enabled(false);
        self.channel.clear_flags();
        // SAFETY: `buffer` is exclusively borrowed for `'a` and is not read or written
        // again until `disarm_channel` has disabled the channel.
        unsafe { self.channel.configure(&config) };
        self.bus.set_dma_requests(true);
        self.channel.set_enabled(true);
        Ok(())
    }

    fn disarm_channel(&mut self) {
        self.bus.set_dma_requests(false);
        self.channel.set_enabled(false);
        self.channel.clear_flags();
    }

    fn fail(&mut self, e: TransferError) -> TransferError {
        self.disarm_channel();
        self.bus.set_dma_last_transfer(false);
        self.bus.generate_stop();
        self.bus.set_ack(true);
        self.bus.set_ack_position(AckPosition::Current);
        self.phase = TransferPhase::Failed(e);
        e
    }

    fn begin_write(&mut self, offset: u8) -> Result<(), TransferError> {
        wait_idle(&mut self.bus, &self.guard)?;
        clear_error_flags(&mut self.bus);
        self.phase = TransferPhase::AddressSent;
        send_offset(&mut self.bus, &self.guard, self.address, offset)?;
        self.phase = TransferPhase::OffsetSent;
        self.arm_channel(DmaDirection::MemoryToPeripheral)?;
        self.phase = TransferPhase::AwaitingDmaCompletion;
        Ok(())
    }

    fn begin_read(&mut self, offset: u8) -> Result<(), TransferError> {
        wait_idle(&mut self.bus, &self.guard)?;
        clear_error_flags(&mut self.bus);
        self.bus.set_ack_position(AckPosition::Current);
        self.bus.set_ack(true);
        self.phase = TransferPhase::AddressSent;
        send_offset(&mut self.bus, &self.guard, self.address, offset)?;
        self.phase = TransferPhase::RestartForRead;
        address_for_read(&mut self.bus, &self.guard, self.address)?;

        if self.len == 1 {
            // A single byte cannot be NACKed by the DMA last-transfer logic in time,
            // so it is received by the CPU.
            self.bus.set_ack(false);
            self.bus.clear_flag(Flag::AddressSent);
            self.bus.generate_stop();
            self.phase = TransferPhase::DataInFlight;
            wait_event(&mut self.bus, &self.guard, BusEvent::ByteReceived)?;
            let byte = self.bus.receive_byte();
            let slot = self.buffer.first_mut().ok_or(TransferError::InvalidLength)?;
            *slot = byte;
            self.bus.set_ack(true);
            self.phase = TransferPhase::Completed;
            return Ok(());
        }

        self.bus.set_dma_last_transfer(true);
        self.arm_channel(DmaDirection::PeripheralToMemory)?;
        self.bus.clear_flag(Flag::AddressSent);
        self.phase = TransferPhase::AwaitingDmaCompletion;
        Ok(())
    }

    fn complete(&mut self) -> Result<(), TransferError> {
        self.disarm_channel();
        match self.direction {
            TransferDirection::Write => {
                wait_event(&mut self.bus, &self.guard, BusEvent::ByteTransmitted)?;
                self.bus.generate_stop();
                wait_idle(&mut self.bus, &self.guard)?;
                self.standby_attempts =
                    wait_for_standby(&mut self.bus, self.address, &self.guard, self.max_trials)?;
            }
            TransferDirection::Read => {
                self.bus.generate_stop();
                self.bus.set_dma_last_transfer(false);
            }
        }
        self.phase = TransferPhase::Completed;
        Ok(())
    }
}

impl<B: I2cBus, C: DmaChannel> TransferDriver for DmaDriver<'_, B, C> {
    fn mode(&self) -> XferMode {
        XferMode::Dma
    }

    fn max_transfer_len(&self) -> usize {
        self.buffer.len().min(usize::from(u16::MAX))
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
        let dst = self
            .buffer
            .get_mut(..data.len())
            .ok_or(TransferError::InvalidLength)?;
        dst.copy_from_slice(data);

        self.direction = TransferDirection::Write;
        self.address = address;
        self.len = data.len();
        self.phase = TransferPhase::StartPending;
        self.begin_write(offset).map_err(|e| self.fail(e))
    }

    fn start_read(
        &mut self,
        address: SevenBitAddress,
        offset: u8,
        len: usize,
    ) -> Result<(), TransferError> {
        self.check_start(len)?;
        self.direction = TransferDirection::Read;
        self.address = address;
        self.len = len;
        self.phase = TransferPhase::StartPending;
        self.begin_read(offset).map_err(|e| self.fail(e))
    }

    fn poll_completion(&mut self) -> nb::Result<(), TransferError> {
        match self.phase {
            TransferPhase::AwaitingDmaCompletion => {}
            TransferPhase::Failed(e) => return Err(nb::Error::Other(e)),
            TransferPhase::Idle | TransferPhase::Completed => return Ok(()),
            _ => return Err(nb::Error::WouldBlock),
        }

        if self.bus.flag(Flag::AckFailure) {
            self.bus.clear_flag(Flag::AckFailure);
            return Err(nb::Error::Other(self.fail(TransferError::Nack)));
        }
        if self.bus.flag(Flag::BusError) {
            self.bus.clear_flag(Flag::BusError);
            return Err(nb::Error::Other(self.fail(TransferError::BusError)));
        }
        if !self.channel.transfer_complete() {
            return Err(nb::Error::WouldBlock);
        }
        self.complete()
            .map_err(|e| nb::Error::Other(self.fail(e)))
    }

    fn take_received(&mut self, out: &mut [u8]) -> Result<usize, TransferError> {
        let received = self
            .buffer
            .get(..self.len)
            .ok_or(TransferError::InvalidLength)?;
        copy_received(received, out)
    }

    fn abandon(&mut self) {
        self.fail(TransferError::TimedOut);
        clear_error_flags(&mut self.bus);
    }

    fn reset(&mut self) {
        if self.phase.is_terminal() {
            self.phase = TransferPhase::Idle;
        }
    }
}

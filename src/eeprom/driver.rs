// Licensed under the Apache-2.0 license

//! # Transfer Drivers
//!
//! A driver moves one page-bounded chunk between memory and the device. Three
//! strategies share the same bus primitives:
//!
//! - [`PollingDriver`]: the whole chunk runs inside `start_*`.
//! - [`IrqDriver`]: `start_*` generates the start condition and the interrupt
//!   handlers advance the transfer.
//! - [`DmaDriver`]: address and offset phases run inline, the data phase is offloaded
//!   to a DMA channel.
//!
//! ## Runtime Selection
//!
//! Each driver is its own type, so a board that picks its strategy at boot stores the
//! chosen one in a [`TransferDriverWrapper`]:
//!
//! ```rust,ignore
//! let driver = match mode {
//!     XferMode::Polling => TransferDriverWrapper::Polling(PollingDriver::new(bus, &config)),
//!     XferMode::Interrupt => TransferDriverWrapper::Interrupt(&IRQ_DRIVER),
//!     XferMode::Dma => TransferDriverWrapper::Dma(DmaDriver::new(bus, channel, &mut buf, &config)),
//! };
//! let mut eeprom = Eeprom::new(driver, config)?;
//! ```

use crate::eeprom::config::DEFAULT_BUFFER_SIZE;
use crate::eeprom::dma::DmaDriver;
use crate::eeprom::error::TransferError;
use crate::eeprom::interrupt::IrqDriver;
use crate::eeprom::polling::PollingDriver;
use crate::eeprom::request::TransferPhase;
use crate::i2c::{DmaChannel, I2cBus, NoDma, XferMode};
use embedded_hal::i2c::SevenBitAddress;

/// Capability shared by the three execution strategies.
///
/// Exactly one transfer may be in flight. A driver accepts a new `start_*` only from
/// [`TransferPhase::Idle`] or a terminal phase.
pub trait TransferDriver {
    fn mode(&self) -> XferMode;

    /// Largest chunk the driver can buffer.
    fn max_transfer_len(&self) -> usize;

    fn phase(&self) -> TransferPhase;

    /// Begin writing `data` at the device offset `offset`.
    ///
    /// # Errors
    ///
    /// [`TransferError::Busy`] while a transfer is in flight,
    /// [`TransferError::InvalidLength`] for an empty or oversized chunk, or any error
    /// raised by the phases the driver runs inline.
    fn start_write(
        &mut self,
        address: SevenBitAddress,
        offset: u8,
        data: &[u8],
    ) -> Result<(), TransferError>;

    /// Begin reading `len` bytes from the device offset `offset`.
    ///
    /// # Errors
    ///
    /// Same as [`start_write`](Self::start_write).
    fn start_read(
        &mut self,
        address: SevenBitAddress,
        offset: u8,
        len: usize,
    ) -> Result<(), TransferError>;

    /// `WouldBlock` until the transfer reaches a terminal phase.
    fn poll_completion(&mut self) -> nb::Result<(), TransferError>;

    /// Copy the bytes of the last completed read into `out`, returning the count.
    ///
    /// # Errors
    ///
    /// [`TransferError::InvalidLength`] if `out` is shorter than the received data.
    fn take_received(&mut self, out: &mut [u8]) -> Result<usize, TransferError>;

    /// Give up on the transfer in flight after a completion timeout.
    ///
    /// Masks interrupts, disables DMA, releases the bus and leaves the driver in
    /// `Failed(TimedOut)` so that it accepts the next transfer.
    fn abandon(&mut self);

    /// Return a driver whose last chunk reached a terminal phase to
    /// [`TransferPhase::Idle`]. No effect while a transfer is in flight.
    fn reset(&mut self);
}

/// Copy `received` into the front of `out`.
pub(crate) fn copy_received(received: &[u8], out: &mut [u8]) -> Result<usize, TransferError> {
    let dst = out
        .get_mut(..received.len())
        .ok_or(TransferError::InvalidLength)?;
    dst.copy_from_slice(received);
    Ok(received.len())
}

/// Enum wrapper over the three drivers for runtime strategy selection.
///
/// The polling and DMA variants own their bus. The interrupt variant borrows a driver
/// that also has to be reachable from the interrupt handlers, typically a `static`.
pub enum TransferDriverWrapper<'a, B, C = NoDma, const N: usize = DEFAULT_BUFFER_SIZE>
where
    B: I2cBus,
    C: DmaChannel,
{
    Polling(PollingDriver<B, N>),
    Interrupt(&'a IrqDriver<B, N>),
    Dma(DmaDriver<'a, B, C>),
}

impl<B: I2cBus, C: DmaChannel, const N: usize> TransferDriver
    for TransferDriverWrapper<'_, B, C, N>
{
    fn mode(&self) -> XferMode {
        match self {
            TransferDriverWrapper::Polling(driver) => driver.mode(),
            TransferDriverWrapper::Interrupt(driver) => driver.mode(),
            TransferDriverWrapper::Dma(driver) => driver.mode(),
        }
    }

    fn max_transfer_len(&self) -> usize {
        match self {
            TransferDriverWrapper::Polling(driver) => driver.max_transfer_len(),
            TransferDriverWrapper::Interrupt(driver) => driver.max_transfer_len(),
            TransferDriverWrapper::Dma(driver) => driver.max_transfer_len(),
        }
    }

    fn phase(&self) -> TransferPhase {
        match self {
            TransferDriverWrapper::Polling(driver) => driver.phase(),
            TransferDriverWrapper::Interrupt(driver) => driver.phase(),
            TransferDriverWrapper::Dma(driver) => driver.phase(),
        }
    }

    fn start_write(
        &mut self,
        address: SevenBitAddress,
        offset: u8,
        data: &[u8],
    ) -> Result<(), TransferError> {
        match self {
            TransferDriverWrapper::Polling(driver) => driver.start_write(address, offset, data),
            TransferDriverWrapper::Interrupt(driver) => driver.start_write(address, offset, data),
            TransferDriverWrapper::Dma(driver) => driver.start_write(address, offset, data),
        }
    }

    fn start_read(
        &mut self,
        address: SevenBitAddress,
        offset: u8,
        len: usize,
    ) -> Result<(), TransferError> {
        match self {
            TransferDriverWrapper::Polling(driver) => driver.start_read(address, offset, len),
            TransferDriverWrapper::Interrupt(driver) => driver.start_read(address, offset, len),
            TransferDriverWrapper::Dma(driver) => driver.start_read(address, offset, len),
        }
    }

    fn poll_completion(&mut self) -> nb::Result<(), TransferError> {
        match self {
            TransferDriverWrapper::Polling(driver) => driver.poll_completion(),
            TransferDriverWrapper::Interrupt(driver) => driver.poll_completion(),
            TransferDriverWrapper::Dma(driver) => driver.poll_completion(),
        }
    }

    fn take_received(&mut self, out: &mut [u8]) -> Result<usize, TransferError> {
        match self {
            TransferDriverWrapper::Polling(driver) => driver.take_received(out),
            TransferDriverWrapper::Interrupt(driver) => driver.take_received(out),
            TransferDriverWrapper::Dma(driver) => driver.take_received(out),
        }
    }

    fn abandon(&mut self) {
        match self {
            TransferDriverWrapper::Polling(driver) => driver.abandon(),
            TransferDriverWrapper::Interrupt(driver) => driver.abandon(),
            TransferDriverWrapper::Dma(driver) => driver.abandon(),
        }
    }

    fn reset(&mut self) {
        match self {
            TransferDriverWrapper::Polling(driver) => driver.reset(),
            TransferDriverWrapper::Interrupt(driver) => driver.reset(),
            TransferDriverWrapper::Dma(driver) => driver.reset(),
        }
    }
}

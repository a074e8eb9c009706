// Licensed under the Apache-2.0 license

use crate::eeprom::error::TransferError;
use embedded_hal::i2c::SevenBitAddress;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferDirection {
    Read,
    Write,
}

/// Progress of the transfer currently owned by a driver.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferPhase {
    Idle,
    StartPending,
    AddressSent,
    OffsetSent,
    RestartForRead,
    DataInFlight,
    AwaitingDmaCompletion,
    Completed,
    Failed(TransferError),
}

impl TransferPhase {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferPhase::Completed | TransferPhase::Failed(_))
    }

    /// A transfer is in flight and a new one must not start.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, TransferPhase::Idle) && !self.is_terminal()
    }
}

#[derive(Debug)]
pub enum TransferBuffer<'a> {
    Write(&'a [u8]),
    Read(&'a mut [u8]),
}

/// One logical read or write against the device.
#[derive(Debug)]
pub struct TransferRequest<'a> {
    slave_address: SevenBitAddress,
    device_offset: u16,
    buffer: TransferBuffer<'a>,
}

impl<'a> TransferRequest<'a> {
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidLength`] for an empty buffer.
    pub fn write(
        slave_address: SevenBitAddress,
        device_offset: u16,
        data: &'a [u8],
    ) -> Result<Self, TransferError> {
        if data.is_empty() {
            return Err(TransferError::InvalidLength);
        }
        Ok(Self {
            slave_address,
            device_offset,
            buffer: TransferBuffer::Write(data),
        })
    }

    /// # Errors
    ///
    /// Returns [`TransferError::InvalidLength`] for an empty buffer.
    pub fn read(
        slave_address: SevenBitAddress,
        device_offset: u16,
        buffer: &'a mut [u8],
    ) -> Result<Self, TransferError> {
        if buffer.is_empty() {
            return Err(TransferError::InvalidLength);
        }
        Ok(Self {
            slave_address,
            device_offset,
            buffer: TransferBuffer::Read(buffer),
        })
    }

    #[must_use]
    pub fn direction(&self) -> TransferDirection {
        match self.buffer {
            TransferBuffer::Write(_) => TransferDirection::Write,
            TransferBuffer::Read(_) => TransferDirection::Read,
        }
    }

    #[must_use]
    pub fn slave_address(&self) -> SevenBitAddress {
        self.slave_address
    }

    #[must_use]
    pub fn device_offset(&self) -> u16 {
        self.device_offset
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.buffer {
            TransferBuffer::Write(data) => data.len(),
            TransferBuffer::Read(buf) => buf.len(),
        }
    }

    /// Always `false` for a constructed request.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_buffer(self) -> TransferBuffer<'a> {
        self.buffer
    }
}

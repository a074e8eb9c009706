// Licensed under the Apache-2.0 license

use core::fmt;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

/// Failure of an EEPROM transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError {
    /// A bounded wait expired before the bus reached the expected state.
    TimedOut,
    /// Misplaced start or stop condition detected by the controller.
    BusError,
    /// The device kept NACKing its address for every standby probe.
    RecoveryExhausted,
    /// Address or data byte not acknowledged outside of standby probing.
    Nack,
    /// A transfer is already in flight on this driver.
    Busy,
    /// Zero-length request, or a request larger than the driver can buffer.
    InvalidLength,
    /// Access beyond the configured device capacity.
    OutOfBounds,
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            TransferError::TimedOut => "timed out waiting for the bus",
            TransferError::BusError => "bus error",
            TransferError::RecoveryExhausted => "device did not leave its write cycle",
            TransferError::Nack => "not acknowledged",
            TransferError::Busy => "transfer already in progress",
            TransferError::InvalidLength => "invalid transfer length",
            TransferError::OutOfBounds => "access outside device capacity",
        };
        f.write_str(msg)
    }
}

impl embedded_hal::i2c::Error for TransferError {
    fn kind(&self) -> ErrorKind {
        match self {
            TransferError::BusError => ErrorKind::Bus,
            TransferError::Nack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            TransferError::RecoveryExhausted => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
            }
            _ => ErrorKind::Other,
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransferError {}

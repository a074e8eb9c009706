// Licensed under the Apache-2.0 license

//! EEPROM master-transfer engine.
//!
//! Reads and writes byte ranges of a small I2C EEPROM through an [`I2cBus`](crate::i2c::I2cBus)
//! controller. Writes are split at page boundaries and each page is followed by
//! acknowledge polling until the device finishes its internal write cycle.

pub mod config;
pub mod device;
pub mod dma;
pub mod driver;
pub mod error;
pub mod interrupt;
pub mod page;
pub mod polling;
pub mod request;
pub mod standby;
pub mod timeout;

pub use config::{ConfigurationError, EepromConfig, EepromConfigBuilder};
pub use device::Eeprom;
pub use dma::DmaDriver;
pub use driver::{TransferDriver, TransferDriverWrapper};
pub use error::TransferError;
pub use interrupt::IrqDriver;
pub use page::{PageChunk, PageWriteJob};
pub use polling::PollingDriver;
pub use request::{TransferBuffer, TransferDirection, TransferPhase, TransferRequest};
pub use standby::{wait_for_standby, BusBusyRetryContext};
pub use timeout::{TimeoutCounter, TimeoutGuard};

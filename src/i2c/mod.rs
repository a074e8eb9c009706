// Licensed under the Apache-2.0 license

//! I2C master bus abstraction.
//!
//! This module describes the event-driven master controller that the EEPROM transfer
//! engine is written against: start/stop generation, address and data phases, status
//! flags, interrupt masking and DMA request signalling. Hardware crates implement
//! [`I2cBus`] and [`DmaChannel`] for their register blocks.

pub mod common;
pub mod traits;

pub use common::*;
pub use traits::{DmaChannel, I2cBus, NoDma};

// Licensed under the Apache-2.0 license

//! Common types and constants for the I2C master abstraction.
//!
//! This module provides shared definitions for bus events, status flags,
//! interrupt sources and DMA channel programming.

/// Direction encoded in the R/W bit of the address byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Direction {
    Transmit = 0,
    Receive = 1,
}

/// Composite master-mode events.
///
/// Each event corresponds to a combination of status flags reported by the controller.
/// Observing [`BusEvent::TransmitterSelected`] or [`BusEvent::ReceiverSelected`]
/// through [`I2cBus::last_event`](crate::i2c::I2cBus::last_event) clears the
/// address-sent flag, as reading both status registers does on hardware.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusEvent {
    /// EV5: start condition generated, ready for the address byte.
    StartGenerated,
    /// EV6: address acknowledged, master is transmitter.
    TransmitterSelected,
    /// EV6: address acknowledged, master is receiver.
    ReceiverSelected,
    /// EV7: a received byte is waiting in the data register.
    ByteReceived,
    /// EV8: data register empty while a byte is still shifting out.
    ByteTransmitting,
    /// EV8_2: data register and shift register both empty.
    ByteTransmitted,
}

/// Individual status flags.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Flag {
    Busy,
    AddressSent,
    ByteTransferFinished,
    AckFailure,
    BusError,
}

/// Which received byte the ACK control bit applies to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AckPosition {
    /// ACK bit applies to the byte currently in the shift register.
    Current,
    /// ACK bit applies to the next byte received in the shift register.
    Next,
}

/// Event interrupt source (start, address, byte transfer finished).
pub const INT_EVT: u8 = 1 << 0;
/// Buffer interrupt source (data register empty / not empty).
pub const INT_BUF: u8 = 1 << 1;
/// Error interrupt source (ack failure, bus error).
pub const INT_ERR: u8 = 1 << 2;
pub const INT_ALL: u8 = INT_EVT | INT_BUF | INT_ERR;

/// Execution strategy of a transfer driver.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum XferMode {
    Polling,
    Interrupt,
    Dma,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaDirection {
    MemoryToPeripheral,
    PeripheralToMemory,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaPriority {
    Low,
    Medium,
    High,
    VeryHigh,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaWidth {
    Byte,
    HalfWord,
    Word,
}

/// Channel programming for one memory <-> I2C data register transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DmaConfig {
    pub direction: DmaDirection,
    pub memory_address: *mut u8,
    pub length: u16,
    pub width: DmaWidth,
    pub memory_increment: bool,
    pub peripheral_increment: bool,
    pub priority: DmaPriority,
}

impl DmaConfig {
    /// Byte-wide, memory-incrementing transfer at very-high priority.
    #[must_use]
    pub fn bytes(direction: DmaDirection, memory_address: *mut u8, length: u16) -> Self {
        Self {
            direction,
            memory_address,
            length,
            width: DmaWidth::Byte,
            memory_increment: true,
            peripheral_increment: false,
            priority: DmaPriority::VeryHigh,
        }
    }
}

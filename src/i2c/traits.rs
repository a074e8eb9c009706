// Licensed under the Apache-2.0 license

//! # I2C Master Primitive Traits
//!
//! The transfer drivers never touch registers. They sequence the bus through the
//! small set of primitives below, which map one-to-one onto the control and status
//! bits of an event-driven master controller.
//!
//! ## Trait Layout
//!
//! ```text
//! I2cBus      (start/stop, address, data, ACK control, events, flags,
//!              interrupt mask, DMA request enable)
//! DmaChannel  (one DMA stream bound to the controller's data register)
//!     └── NoDma (placeholder when no channel is wired)
//! ```
//!
//! Implementations must be callable from both thread and interrupt context; the
//! drivers guarantee that only one context touches the bus at a time.

use crate::i2c::common::{AckPosition, BusEvent, Direction, DmaConfig, Flag};
use embedded_hal::i2c::SevenBitAddress;

/// Master-mode bus primitives.
///
/// # Examples
///
/// ```rust,no_run
/// use i2c_eeprom::i2c::{BusEvent, Direction, I2cBus};
///
/// fn probe<B: I2cBus>(bus: &mut B, address: u8) -> bool {
///     bus.generate_start();
///     while !bus.check_event(BusEvent::StartGenerated) {}
///     bus.send_address(address, Direction::Transmit);
///     let acked = loop {
///         if bus.check_event(BusEvent::TransmitterSelected) {
///             break true;
///         }
///         if bus.flag(i2c_eeprom::i2c::Flag::AckFailure) {
///             bus.clear_flag(i2c_eeprom::i2c::Flag::AckFailure);
///             break false;
///         }
///     };
///     bus.generate_stop();
///     acked
/// }
/// ```
pub trait I2cBus {
    /// Request a start condition, or a repeated start if the bus is already owned.
    fn generate_start(&mut self);

    /// Request a stop condition after the byte currently on the wire.
    fn generate_stop(&mut self);

    /// Write the 7-bit address and R/W bit to the data register.
    fn send_address(&mut self, address: SevenBitAddress, direction: Direction);

    fn send_byte(&mut self, byte: u8);

    fn receive_byte(&mut self) -> u8;

    /// Enable or disable acknowledgement of received bytes.
    fn set_ack(&mut self, enabled: bool);

    fn set_ack_position(&mut self, position: AckPosition);

    /// The most specific event matching the current status, if any.
    ///
    /// Reading the event has the same side effects as reading both status registers:
    /// a pending address-sent flag is cleared.
    fn last_event(&mut self) -> Option<BusEvent>;

    /// Returns `true` when the current status satisfies `event`.
    fn check_event(&mut self, event: BusEvent) -> bool {
        self.last_event() == Some(event)
    }

    /// Raw status flag read. Does not clear anything.
    fn flag(&mut self, flag: Flag) -> bool;

    /// Clear a status flag. Clearing [`Flag::AddressSent`] releases the clock stretch
    /// that holds the bus after the address phase.
    fn clear_flag(&mut self, flag: Flag);

    fn enable_interrupts(&mut self, mask: u8);

    fn disable_interrupts(&mut self, mask: u8);

    /// Route data register requests to the DMA controller.
    fn set_dma_requests(&mut self, enabled: bool);

    /// NACK the byte that completes the DMA reception.
    fn set_dma_last_transfer(&mut self, enabled: bool);
}

/// A DMA channel wired to the I2C data register.
pub trait DmaChannel {
    /// Program the channel. The channel stays disabled until
    /// [`set_enabled`](Self::set_enabled) is called.
    ///
    /// # Safety
    ///
    /// `config.memory_address` must point to `config.length` bytes that stay valid,
    /// and are not accessed by the CPU, until the channel is disabled again.
    unsafe fn configure(&mut self, config: &DmaConfig);

    fn set_enabled(&mut self, enabled: bool);

    /// Transfer-complete flag of the channel.
    fn transfer_complete(&mut self) -> bool;

    /// Clear transfer-complete, half-transfer and global flags.
    fn clear_flags(&mut self);
}

/// Placeholder channel for controllers that run without DMA.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoDma;

impl DmaChannel for NoDma {
    unsafe fn configure(&mut self, _config: &DmaConfig) {}

    fn set_enabled(&mut self, _enabled: bool) {}

    fn transfer_complete(&mut self) -> bool {
        false
    }

    fn clear_flags(&mut self) {}
}

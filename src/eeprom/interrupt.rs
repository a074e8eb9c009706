// Licensed under the Apache-2.0 license

//! Interrupt-driven transfer driver.
//!
//! The caller only generates the start condition. From then on the event and error
//! interrupt handlers advance the transfer by calling [`IrqDriver::on_event`] and
//! [`IrqDriver::on_error`]. All transfer state lives behind a critical-section mutex;
//! completion is published through an atomic flag that the caller polls without
//! entering the critical section.
//!
//! ```rust,ignore
//! static EEPROM_IRQ: IrqDriver<Bus1> = IrqDriver::new(Bus1::new(), &EepromConfig::DEFAULT);
//!
//! #[interrupt]
//! fn I2C1_EV() {
//!     EEPROM_IRQ.on_event();
//! }
//!
//! #[interrupt]
//! fn I2C1_ER() {
//!     EEPROM_IRQ.on_error();
//! }
//! ```

use crate::eeprom::config::{EepromConfig, DEFAULT_BUFFER_SIZE};
use crate::eeprom::driver::{copy_received, TransferDriver};
use crate::eeprom::error::TransferError;
use crate::eeprom::polling::clear_error_flags;
use crate::eeprom::request::{TransferDirection, TransferPhase};
use crate::eeprom::standby::BusBusyRetryContext;
use crate::eeprom::timeout::TimeoutGuard;
use crate::i2c::{AckPosition, BusEvent, Direction, Flag, I2cBus, XferMode, INT_ALL};
use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};
use critical_section::Mutex;
use embedded_hal::i2c::SevenBitAddress;
use heapless::Vec;

struct IrqState<B, const N: usize> {
    bus: B,
    guard: TimeoutGuard,
    max_trials: u32,
    direction: TransferDirection,
    address: SevenBitAddress,
    offset: u8,
    offset_sent: bool,
    probing: bool,
    retry: BusBusyRetryContext,
    tx: Vec<u8, N>,
    cursor: usize,
    rx: Vec<u8, N>,
    remaining: usize,
    phase: TransferPhase,
}

impl<B: I2cBus, const N: usize> IrqState<B, N> {
    fn fail(&mut self, e: TransferError) {
        self.bus.disable_interrupts(INT_ALL);
        self.bus.generate_stop();
        self.bus.set_ack(true);
        self.phase = TransferPhase::Failed(e);
    }

    fn complete(&mut self) {
        self.bus.disable_interrupts(INT_ALL);
        self.bus.set_ack(true);
        self.phase = TransferPhase::Completed;
    }

    fn handle_event(&mut self, event: BusEvent) {
        match event {
            BusEvent::StartGenerated => self.on_start(),
            BusEvent::TransmitterSelected => {
                if self.probing {
                    // Device answered the standby probe: write cycle finished.
                    self.bus.generate_stop();
                    self.complete();
                } else {
                    self.bus.send_byte(self.offset);
                    self.offset_sent = true;
                    self.phase = TransferPhase::OffsetSent;
                }
            }
            BusEvent::ReceiverSelected => {
                if self.remaining == 1 {
                    self.bus.generate_stop();
                }
            }
            BusEvent::ByteReceived => self.on_byte_received(),
            BusEvent::ByteTransmitting => {
                if self.direction == TransferDirection::Read
                    && self.phase == TransferPhase::OffsetSent
                {
                    self.bus.generate_start();
                    self.phase = TransferPhase::RestartForRead;
                }
            }
            BusEvent::ByteTransmitted => {
                if self.direction == TransferDirection::Write
                    && !self.probing
                    && matches!(
                        self.phase,
                        TransferPhase::OffsetSent | TransferPhase::DataInFlight
                    )
                {
                    self.on_byte_transmitted();
                }
            }
        }
    }

    fn on_start(&mut self) {
        match self.direction {
            TransferDirection::Write => {
                self.bus.send_address(self.address, Direction::Transmit);
                if !self.probing {
                    self.phase = TransferPhase::AddressSent;
                }
            }
            TransferDirection::Read if self.offset_sent => {
                if self.remaining == 1 {
                    // ACK must already be off when the single byte is clocked in.
                    self.bus.set_ack(false);
                }
                self.bus.send_address(self.address, Direction::Receive);
                self.offset_sent = false;
                self.phase = TransferPhase::DataInFlight;
            }
            TransferDirection::Read => {
                self.bus.send_address(self.address, Direction::Transmit);
                self.phase = TransferPhase::AddressSent;
            }
        }
    }

    fn on_byte_received(&mut self) {
        let byte = self.bus.receive_byte();
        if self.rx.push(byte).is_err() {
            self.fail(TransferError::InvalidLength);
            return;
        }
        self.remaining = self.remaining.saturating_sub(1);
        match self.remaining {
            0 => self.complete(),
            1 => {
                self.bus.set_ack(false);
                self.bus.generate_stop();
            }
            _ => {}
        }
    }

    fn on_byte_transmitted(&mut self) {
        if let Some(&byte) = self.tx.get(self.cursor) {
            self.bus.send_byte(byte);
            self.cursor += 1;
            self.phase = TransferPhase::DataInFlight;
            return;
        }

        self.bus.generate_stop();
        let bus = &mut self.bus;
        if let Err(e) = self.guard.await_condition(|| !bus.flag(Flag::Busy)) {
            self.fail(e);
            return;
        }
        self.probing = true;
        self.retry = BusBusyRetryContext::new(self.max_trials);
        self.phase = TransferPhase::StartPending;
        self.bus.generate_start();
    }

    fn handle_error(&mut self) {
        let ack_failure = self.bus.flag(Flag::AckFailure);
        let bus_error = self.bus.flag(Flag::BusError);
        if ack_failure {
            self.bus.clear_flag(Flag::AckFailure);
        }
        if bus_error {
            self.bus.clear_flag(Flag::BusError);
        }
        if !self.phase.is_active() {
            return;
        }

        if bus_error {
            self.fail(TransferError::BusError);
        } else if ack_failure && self.probing {
            match self.retry.record_failure() {
                Ok(()) => self.bus.generate_start(),
                Err(e) => self.fail(e),
            }
        } else if ack_failure {
            self.fail(TransferError::Nack);
        }
    }
}

/// Interrupt-driven driver with `N` bytes of send and receive buffering.
pub struct IrqDriver<B: I2cBus, const N: usize = DEFAULT_BUFFER_SIZE> {
    shared: Mutex<RefCell<IrqState<B, N>>>,
    done: AtomicBool,
}

impl<B: I2cBus, const N: usize> IrqDriver<B, N> {
    /// Usable in a `static` initializer when `B` has a const constructor.
    pub const fn new(bus: B, config: &EepromConfig) -> Self {
        Self {
            shared: Mutex::new(RefCell::new(IrqState {
                bus,
                guard: config.guard(),
                max_trials: config.max_trials,
                direction: TransferDirection::Write,
                address: 0,
                offset: 0,
                offset_sent: false,
                probing: false,
                retry: BusBusyRetryContext::new(config.max_trials),
                tx: Vec::new(),
                cursor: 0,
                rx: Vec::new(),
                remaining: 0,
                phase: TransferPhase::Idle,
            })),
            done: AtomicBool::new(false),
        }
    }

    /// Event interrupt entry point.
    pub fn on_event(&self) {
        critical_section::with(|cs| {
            let mut state = self.shared.borrow_ref_mut(cs);
            if !state.phase.is_active() {
                return;
            }
            if let Some(event) = state.bus.last_event() {
                state.handle_event(event);
            }
            if state.phase.is_terminal() {
                self.done.store(true, Ordering::Release);
            }
        });
    }

    /// Error interrupt entry point.
    pub fn on_error(&self) {
        critical_section::with(|cs| {
            let mut state = self.shared.borrow_ref_mut(cs);
            state.handle_error();
            if state.phase.is_terminal() {
                self.done.store(true, Ordering::Release);
            }
        });
    }

    /// Returns the bus once no transfer is in flight.
    pub fn release(self) -> B {
        self.shared.into_inner().into_inner().bus
    }

    fn begin(
        &self,
        direction: TransferDirection,
        address: SevenBitAddress,
        offset: u8,
        data: &[u8],
        len: usize,
    ) -> Result<(), TransferError> {
        if len == 0 || len > N {
            return Err(TransferError::InvalidLength);
        }
        let guard = critical_section::with(|cs| {
            let state = self.shared.borrow_ref(cs);
            if state.phase.is_active() {
                Err(TransferError::Busy)
            } else {
                Ok(state.guard)
            }
        })?;

        guard.await_condition(|| {
            critical_section::with(|cs| !self.shared.borrow_ref_mut(cs).bus.flag(Flag::Busy))
        })?;

        critical_section::with(|cs| {
            let mut state = self.shared.borrow_ref_mut(cs);
            if state.phase.is_active() {
                return Err(TransferError::Busy);
            }
            state.tx.clear();
            state
                .tx
                .extend_from_slice(data)
                .map_err(|()| TransferError::InvalidLength)?;
            state.rx.clear();
            state.direction = direction;
            state.address = address;
            state.offset = offset;
            state.offset_sent = false;
            state.probing = false;
            state.cursor = 0;
            state.remaining = len;
            state.phase = TransferPhase::StartPending;
            self.done.store(false, Ordering::Release);

            clear_error_flags(&mut state.bus);
            state.bus.set_ack_position(AckPosition::Current);
            state.bus.set_ack(true);
            state.bus.enable_interrupts(INT_ALL);
            state.bus.generate_start();
            Ok(())
        })
    }
}

impl<B: I2cBus, const N: usize> TransferDriver for &IrqDriver<B, N> {
    fn mode(&self) -> XferMode {
        XferMode::Interrupt
    }

    fn max_transfer_len(&self) -> usize {
        N
    }

    fn phase(&self) -> TransferPhase {
        critical_section::with(|cs| self.shared.borrow_ref(cs).phase)
    }

    fn start_write(
        &mut self,
        address: SevenBitAddress,
        offset: u8,
        data: &[u8],
    ) -> Result<(), TransferError> {
        self.begin(TransferDirection::Write, address, offset, data, data.len())
    }

    fn start_read(
        &mut self,
        address: SevenBitAddress,
        offset: u8,
        len: usize,
    ) -> Result<(), TransferError> {
        self.begin(TransferDirection::Read, address, offset, &[], len)
    }

    fn poll_completion(&mut self) -> nb::Result<(), TransferError> {
        if !self.done.load(Ordering::Acquire) {
            return Err(nb::Error::WouldBlock);
        }
        critical_section::with(|cs| match self.shared.borrow_ref(cs).phase {
            TransferPhase::Completed => Ok(()),
            TransferPhase::Failed(e) => Err(nb::Error::Other(e)),
            _ => Err(nb::Error::WouldBlock),
        })
    }

    fn take_received(&mut self, out: &mut [u8]) -> Result<usize, TransferError> {
        critical_section::with(|cs| copy_received(&self.shared.borrow_ref(cs).rx, out))
    }

    fn abandon(&mut self) {
        critical_section::with(|cs| {
            let mut state = self.shared.borrow_ref_mut(cs);
            state.fail(TransferError::TimedOut);
            clear_error_flags(&mut state.bus);
        });
        self.done.store(true, Ordering::Release);
    }

    fn reset(&mut self) {
        critical_section::with(|cs| {
            let mut state = self.shared.borrow_ref_mut(cs);
            if state.phase.is_terminal() {
                state.phase = TransferPhase::Idle;
                self.done.store(false, Ordering::Release);
            }
        });
    }
}

// Licensed under the Apache-2.0 license

//! Bounded busy-waiting.
//!
//! Every wait on the bus goes through a [`TimeoutGuard`]. A guard with bound `B`
//! evaluates its condition at most `B + 1` times and then reports
//! [`TransferError::TimedOut`]. Nothing halts; the caller decides whether to reset
//! the bus and retry.

use crate::eeprom::error::TransferError;

/// Decrementing wait budget.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeoutCounter {
    remaining: u32,
}

impl TimeoutCounter {
    #[must_use]
    pub const fn new(bound: u32) -> Self {
        Self { remaining: bound }
    }

    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Consume one unit of budget.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::TimedOut`] when the counter would go below zero.
    pub fn tick(&mut self) -> Result<(), TransferError> {
        self.remaining = self
            .remaining
            .checked_sub(1)
            .ok_or(TransferError::TimedOut)?;
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeoutGuard {
    bound: u32,
}

impl TimeoutGuard {
    #[must_use]
    pub const fn new(bound: u32) -> Self {
        Self { bound }
    }

    #[must_use]
    pub const fn bound(&self) -> u32 {
        self.bound
    }

    /// Spin until `ready` returns `true`. Each call starts a fresh budget.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::TimedOut`] once the budget is exhausted.
    pub fn await_condition<F>(&self, mut ready: F) -> Result<(), TransferError>
    where
        F: FnMut() -> bool,
    {
        let mut counter = TimeoutCounter::new(self.bound);
        loop {
            if ready() {
                return Ok(());
            }
            counter.tick()?;
            core::hint::spin_loop();
        }
    }

    /// Spin on a non-blocking operation until it completes or fails.
    ///
    /// # Errors
    ///
    /// Propagates the operation's own error, or [`TransferError::TimedOut`] once the
    /// budget is exhausted.
    pub fn await_nb<T, F>(&self, mut poll: F) -> Result<T, TransferError>
    where
        F: FnMut() -> nb::Result<T, TransferError>,
    {
        let mut counter = TimeoutCounter::new(self.bound);
        loop {
            match poll() {
                Ok(value) => return Ok(value),
                Err(nb::Error::Other(e)) => return Err(e),
                Err(nb::Error::WouldBlock) => counter.tick()?,
            }
            core::hint::spin_loop();
        }
    }
}

// Licensed under the Apache-2.0 license

//! Write-cycle completion polling.
//!
//! After the stop that ends a page write the device goes offline while it programs
//! its array, NACKing its own address until done. Probing the address until it is
//! acknowledged is both the completion test and the busy recovery.

use crate::eeprom::error::TransferError;
use crate::eeprom::timeout::TimeoutGuard;
use crate::i2c::{BusEvent, Direction, Flag, I2cBus};
use embedded_hal::i2c::SevenBitAddress;

/// Counts NACKed probes against a limit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BusBusyRetryContext {
    trial_count: u32,
    max_trials: u32,
}

impl BusBusyRetryContext {
    #[must_use]
    pub const fn new(max_trials: u32) -> Self {
        Self {
            trial_count: 0,
            max_trials,
        }
    }

    #[must_use]
    pub const fn trial_count(&self) -> u32 {
        self.trial_count
    }

    /// Record one NACKed probe.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::RecoveryExhausted`] once the count reaches the limit.
    pub fn record_failure(&mut self) -> Result<(), TransferError> {
        self.trial_count = self.trial_count.saturating_add(1);
        if self.trial_count >= self.max_trials {
            Err(TransferError::RecoveryExhausted)
        } else {
            Ok(())
        }
    }
}

/// Probe `address` until the device acknowledges.
///
/// Returns the number of probes issued, the acknowledged one included.
///
/// # Errors
///
/// - [`TransferError::TimedOut`] if the bus stays busy or a probe never resolves.
/// - [`TransferError::BusError`] on a bus error during a probe.
/// - [`TransferError::RecoveryExhausted`] after `max_trials` NACKed probes.
pub fn wait_for_standby<B: I2cBus>(
    bus: &mut B,
    address: SevenBitAddress,
    guard: &TimeoutGuard,
    max_trials: u32,
) -> Result<u32, TransferError> {
    guard.await_condition(|| !bus.flag(Flag::Busy))?;

    let mut retry = BusBusyRetryContext::new(max_trials);
    loop {
        bus.generate_start();
        guard.await_condition(|| bus.check_event(BusEvent::StartGenerated))?;
        bus.send_address(address, Direction::Transmit);

        let mut acked = false;
        guard.await_nb(|| {
            if bus.flag(Flag::BusError) {
                bus.clear_flag(Flag::BusError);
                return Err(nb::Error::Other(TransferError::BusError));
            }
            if bus.flag(Flag::AddressSent) {
                acked = true;
                Ok(())
            } else if bus.flag(Flag::AckFailure) {
                Ok(())
            } else {
                Err(nb::Error::WouldBlock)
            }
        })?;

        if acked {
            bus.clear_flag(Flag::AddressSent);
            bus.generate_stop();
            return Ok(retry.trial_count() + 1);
        }

        bus.clear_flag(Flag::AckFailure);
        if let Err(e) = retry.record_failure() {
            bus.generate_stop();
            return Err(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::sim::{Segment, SimConfig, SimEeprom};

    fn guard() -> TimeoutGuard {
        TimeoutGuard::new(1_000)
    }

    #[test]
    fn test_retry_context_limit() {
        let mut retry = BusBusyRetryContext::new(3);
        assert!(retry.record_failure().is_ok());
        assert!(retry.record_failure().is_ok());
        assert_eq!(
            retry.record_failure(),
            Err(TransferError::RecoveryExhausted)
        );
        assert_eq!(retry.trial_count(), 3);
    }

    #[test]
    fn test_idle_device_acks_first_probe() {
        let (mut bus, _dma) = SimEeprom::new(SimConfig::default());
        assert_eq!(wait_for_standby(&mut bus, 0x50, &guard(), 10), Ok(1));
        assert_eq!(bus.segments(), vec![Segment::Probe { acked: true }]);
        assert!(bus.violations().is_empty());
    }

    #[test]
    fn test_busy_device_acks_after_k_nacks() {
        for k in 0..5u32 {
            let (mut bus, _dma) = SimEeprom::new(SimConfig::default());
            bus.begin_write_cycle(k);
            assert_eq!(wait_for_standby(&mut bus, 0x50, &guard(), 10), Ok(k + 1));

            let probes = bus.segments();
            assert_eq!(probes.len(), k as usize + 1);
            assert!(probes
                .iter()
                .take(k as usize)
                .all(|s| *s == Segment::Probe { acked: false }));
            assert_eq!(probes.last(), Some(&Segment::Probe { acked: true }));
        }
    }

    #[test]
    fn test_exhausted_when_nacks_reach_limit() {
        let (mut bus, _dma) = SimEeprom::new(SimConfig::default());
        bus.begin_write_cycle(4);
        assert_eq!(
            wait_for_standby(&mut bus, 0x50, &guard(), 4),
            Err(TransferError::RecoveryExhausted)
        );
        bus.settle();
        assert!(!bus.is_bus_owned());
        assert_eq!(bus.segments().len(), 4);
    }

    #[test]
    fn test_last_allowed_trial_succeeds() {
        let (mut bus, _dma) = SimEeprom::new(SimConfig::default());
        bus.begin_write_cycle(3);
        assert_eq!(wait_for_standby(&mut bus, 0x50, &guard(), 4), Ok(4));
    }

    #[test]
    fn test_stuck_bus_times_out() {
        let (mut bus, _dma) = SimEeprom::new(SimConfig {
            stuck_busy: true,
            ..SimConfig::default()
        });
        assert_eq!(
            wait_for_standby(&mut bus, 0x50, &guard(), 10),
            Err(TransferError::TimedOut)
        );
    }
}

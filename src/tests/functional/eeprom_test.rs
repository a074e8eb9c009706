// Licensed under the Apache-2.0 license

//! On-target EEPROM checks, reported over a serial console.

use crate::common::Logger;
use crate::eeprom::device::Eeprom;
use crate::eeprom::driver::TransferDriver;
use crate::eeprom::error::TransferError;
use embedded_io::Write;
use embedded_storage::{ReadStorage, Storage};
use heapless::Vec;

const MAX_TEST_LEN: usize = 64;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TestSummary {
    pub passed: u32,
    pub failed: u32,
}

impl TestSummary {
    fn record<W: Write>(&mut self, out: &mut W, result: Result<(), TransferError>) {
        match result {
            Ok(()) => {
                self.passed += 1;
                let _ = writeln!(out, "PASSED\r");
            }
            Err(e) => {
                self.failed += 1;
                let _ = writeln!(out, "FAILED ({})\r", e);
            }
        }
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

fn pattern(len: usize, seed: u8) -> Vec<u8, MAX_TEST_LEN> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(13).wrapping_add(seed))
        .take(MAX_TEST_LEN)
        .collect()
}

/// Place test `index` in its own region, clamped to the device end.
fn region(index: usize, len: usize, page: usize, capacity: usize) -> u16 {
    let offset = (index * 2 * page + 3) % capacity;
    let offset = if offset + len > capacity {
        capacity.saturating_sub(len)
    } else {
        offset
    };
    u16::try_from(offset).unwrap_or(0)
}

fn round_trip<D: TransferDriver, L: Logger>(
    eeprom: &mut Eeprom<D, L>,
    offset: u16,
    len: usize,
    seed: u8,
) -> Result<(), TransferError> {
    let data = pattern(len, seed);
    eeprom.write(offset, &data)?;
    let back: Vec<u8, MAX_TEST_LEN> = eeprom.read(offset, len)?;
    if back == data {
        Ok(())
    } else {
        Err(TransferError::InvalidLength)
    }
}

fn test_bounds<D: TransferDriver, L: Logger>(eeprom: &mut Eeprom<D, L>) -> Result<(), TransferError> {
    let capacity = ReadStorage::capacity(&*eeprom) as u32;
    let mut probe = [0u8; 2];
    match ReadStorage::read(&mut *eeprom, capacity - 1, &mut probe) {
        Err(TransferError::OutOfBounds) => {}
        _ => return Err(TransferError::InvalidLength),
    }
    match Storage::write(&mut *eeprom, capacity, &[0]) {
        Err(TransferError::OutOfBounds) => Ok(()),
        _ => Err(TransferError::InvalidLength),
    }
}

/// Write and read back patterns sized around the read tails and the page size.
///
/// Destroys the device contents in the regions it touches.
pub fn run_eeprom_tests<W: Write, D: TransferDriver, L: Logger>(
    out: &mut W,
    eeprom: &mut Eeprom<D, L>,
) -> TestSummary {
    let _ = writeln!(out, "\r\n=== EEPROM Transfer Tests ===\r");

    let page = usize::from(eeprom.config().page_size.get());
    let capacity = eeprom.config().capacity as usize;
    let mut summary = TestSummary::default();

    let lengths = [1, 2, 3, page - 1, page, page + 1];
    for (index, &len) in lengths.iter().enumerate() {
        if len == 0 || len > MAX_TEST_LEN || len > capacity {
            continue;
        }
        let offset = region(index, len, page, capacity);
        let _ = write!(out, "Testing {} byte round trip at {:#06x}... ", len, offset);
        let result = round_trip(eeprom, offset, len, 0x40 ^ index as u8);
        summary.record(out, result);
    }

    let _ = write!(out, "Testing capacity bounds... ");
    let result = test_bounds(eeprom);
    summary.record(out, result);

    let _ = writeln!(
        out,
        "\r\n=== {} passed, {} failed ===\r",
        summary.passed, summary.failed
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eeprom::config::EepromConfig;
    use crate::eeprom::polling::PollingDriver;
    use crate::tests::sim::{LogSink, SimConfig, SimEeprom};

    #[test]
    fn test_runner_passes_against_model() {
        let (bus, _dma) = SimEeprom::new(SimConfig {
            busy_probes: 1,
            ..SimConfig::default()
        });
        let config = EepromConfig::default();
        let mut eeprom = Eeprom::new(PollingDriver::<_, 16>::new(bus, &config), config).unwrap();
        let mut console = LogSink::default();

        let summary = run_eeprom_tests(&mut console, &mut eeprom);
        assert_eq!(summary, TestSummary { passed: 7, failed: 0 });
        assert!(summary.all_passed());
        assert!(console.as_str().contains("Testing 9 byte round trip"));
        assert!(!console.as_str().contains("FAILED"));
    }

    #[test]
    fn test_runner_reports_absent_device() {
        let (bus, _dma) = SimEeprom::new(SimConfig {
            address: 0x57,
            ..SimConfig::default()
        });
        let config = EepromConfig::default();
        let mut eeprom = Eeprom::new(PollingDriver::<_, 16>::new(bus, &config), config).unwrap();
        let mut console = LogSink::default();

        let summary = run_eeprom_tests(&mut console, &mut eeprom);
        assert_eq!(summary.failed, 6);
        assert_eq!(summary.passed, 1);
        assert!(console.as_str().contains("FAILED (not acknowledged)"));
    }
}

// Licensed under the Apache-2.0 license

//! Caller-facing EEPROM engine.
//!
//! [`Eeprom`] turns byte-range reads and writes into page-bounded chunks and runs
//! them one after another on a [`TransferDriver`], bounding every completion wait.
//! The API is blocking regardless of the driver's execution strategy.

use crate::common::{Logger, NoOpLogger};
use crate::eeprom::config::{ConfigurationError, EepromConfig, MAX_CAPACITY};
use crate::eeprom::driver::TransferDriver;
use crate::eeprom::error::TransferError;
use crate::eeprom::page::PageWriteJob;
use crate::eeprom::request::{TransferBuffer, TransferRequest};
use embedded_hal::i2c::SevenBitAddress;
use embedded_storage::{ReadStorage, Storage};
use heapless::Vec;

/// The device is addressed with a single offset byte.
fn wire_offset(offset: u32) -> Result<u8, TransferError> {
    u8::try_from(offset).map_err(|_| TransferError::OutOfBounds)
}

pub struct Eeprom<D: TransferDriver, L: Logger = NoOpLogger> {
    driver: D,
    config: EepromConfig,
    logger: L,
}

impl<D: TransferDriver> Eeprom<D, NoOpLogger> {
    /// # Errors
    ///
    /// [`ConfigurationError::PageExceedsCapacity`] if a page does not fit the driver's
    /// transfer buffer.
    pub fn new(driver: D, config: EepromConfig) -> Result<Self, ConfigurationError> {
        Self::with_logger(driver, config, NoOpLogger)
    }
}

impl<D: TransferDriver, L: Logger> Eeprom<D, L> {
    /// # Errors
    ///
    /// [`ConfigurationError::PageExceedsCapacity`] if a page does not fit the driver's
    /// transfer buffer.
    pub fn with_logger(driver: D, config: EepromConfig, logger: L) -> Result<Self, ConfigurationError> {
        if usize::from(config.page_size.get()) > driver.max_transfer_len() {
            return Err(ConfigurationError::PageExceedsCapacity);
        }
        Ok(Self {
            driver,
            config,
            logger,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EepromConfig {
        &self.config
    }

    #[must_use]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn release(self) -> (D, L) {
        (self.driver, self.logger)
    }

    /// Write `data` at `offset`, splitting at page boundaries.
    ///
    /// Chunks are committed in order. On failure, chunks before the failing one
    /// stay written.
    ///
    /// # Errors
    ///
    /// [`TransferError::InvalidLength`] for empty `data`, otherwise the first error
    /// reported by the driver or the completion timeout.
    pub fn write(&mut self, offset: u16, data: &[u8]) -> Result<(), TransferError> {
        let request = TransferRequest::write(self.config.slave_address, offset, data)?;
        self.execute(request)
    }

    /// Fill `buffer` from `offset`.
    ///
    /// # Errors
    ///
    /// [`TransferError::InvalidLength`] for an empty buffer, otherwise the first error
    /// reported by the driver or the completion timeout.
    pub fn read_into(&mut self, offset: u16, buffer: &mut [u8]) -> Result<(), TransferError> {
        let request = TransferRequest::read(self.config.slave_address, offset, buffer)?;
        self.execute(request)
    }

    /// Read `len` bytes from `offset` into a fixed-capacity vector.
    ///
    /// # Errors
    ///
    /// [`TransferError::InvalidLength`] if `len` is zero or exceeds `M`, otherwise as
    /// [`read_into`](Self::read_into).
    pub fn read<const M: usize>(&mut self, offset: u16, len: usize) -> Result<Vec<u8, M>, TransferError> {
        let mut out = Vec::new();
        out.resize(len, 0).map_err(|()| TransferError::InvalidLength)?;
        self.read_into(offset, &mut out)?;
        Ok(out)
    }

    /// Run one request to completion.
    ///
    /// The configured capacity is not checked here, only that every byte of the range
    /// is reachable with one offset byte.
    ///
    /// # Errors
    ///
    /// [`TransferError::OutOfBounds`] if the range ends past offset `0xFF`, otherwise
    /// see [`write`](Self::write) and [`read_into`](Self::read_into).
    pub fn execute(&mut self, request: TransferRequest<'_>) -> Result<(), TransferError> {
        let address = request.slave_address();
        let offset = u32::from(request.device_offset());
        let len = u32::try_from(request.len()).map_err(|_| TransferError::OutOfBounds)?;
        if offset.saturating_add(len) > MAX_CAPACITY {
            return Err(TransferError::OutOfBounds);
        }
        match request.into_buffer() {
            TransferBuffer::Write(data) => self.write_chunks(address, offset, data),
            TransferBuffer::Read(buffer) => self.read_segments(address, offset, buffer),
        }
    }

    fn write_chunks(
        &mut self,
        address: SevenBitAddress,
        offset: u32,
        data: &[u8],
    ) -> Result<(), TransferError> {
        for chunk in PageWriteJob::new(offset, data.len(), self.config.page_size) {
            let bytes = data
                .get(chunk.range())
                .ok_or(TransferError::InvalidLength)?;
            self.logger.debug(format_args!(
                "eeprom: write {} bytes at {:#06x}",
                chunk.len, chunk.offset
            ));
            let wire = wire_offset(chunk.offset)?;
            let result = self.run(|driver| driver.start_write(address, wire, bytes));
            if let Err(e) = result {
                self.logger.error(format_args!(
                    "eeprom: write at {:#06x} failed: {}",
                    chunk.offset, e
                ));
                return Err(e);
            }
            self.driver.reset();
        }
        Ok(())
    }

    fn read_segments(
        &mut self,
        address: SevenBitAddress,
        offset: u32,
        buffer: &mut [u8],
    ) -> Result<(), TransferError> {
        let segment_len = self.driver.max_transfer_len().max(1);
        let mut position = offset;
        for segment in buffer.chunks_mut(segment_len) {
            self.logger.debug(format_args!(
                "eeprom: read {} bytes at {:#06x}",
                segment.len(),
                position
            ));
            let len = segment.len();
            let wire = wire_offset(position)?;
            let result = self
                .run(|driver| driver.start_read(address, wire, len))
                .and_then(|()| self.driver.take_received(segment));
            match result {
                Ok(n) if n == len => self.driver.reset(),
                Ok(_) => return Err(TransferError::InvalidLength),
                Err(e) => {
                    self.logger.error(format_args!(
                        "eeprom: read at {:#06x} failed: {}",
                        position, e
                    ));
                    return Err(e);
                }
            }
            position += len as u32;
        }
        Ok(())
    }

    /// Start one chunk and wait for it under the completion guard.
    fn run<F>(&mut self, start: F) -> Result<(), TransferError>
    where
        F: FnOnce(&mut D) -> Result<(), TransferError>,
    {
        start(&mut self.driver)?;
        let guard = self.config.completion_guard();
        let driver = &mut self.driver;
        let result = guard.await_nb(|| driver.poll_completion());
        match result {
            Err(TransferError::TimedOut) => {
                self.driver.abandon();
                self.logger
                    .warn(format_args!("eeprom: transfer abandoned after timeout"));
                Err(TransferError::TimedOut)
            }
            other => other,
        }
    }

    fn check_bounds(&self, offset: u32, len: usize) -> Result<u16, TransferError> {
        let len = u32::try_from(len).map_err(|_| TransferError::OutOfBounds)?;
        let end = offset.checked_add(len).ok_or(TransferError::OutOfBounds)?;
        if end > self.config.capacity {
            return Err(TransferError::OutOfBounds);
        }
        u16::try_from(offset).map_err(|_| TransferError::OutOfBounds)
    }
}

impl<D: TransferDriver, L: Logger> ReadStorage for Eeprom<D, L> {
    type Error = TransferError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = self.check_bounds(offset, bytes.len())?;
        if bytes.is_empty() {
            return Ok(());
        }
        self.read_into(start, bytes)
    }

    fn capacity(&self) -> usize {
        self.config.capacity as usize
    }
}

impl<D: TransferDriver, L: Logger> Storage for Eeprom<D, L> {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let start = self.check_bounds(offset, bytes.len())?;
        if bytes.is_empty() {
            return Ok(());
        }
        Eeprom::write(self, start, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::LogLevel;
    use crate::eeprom::dma::DmaDriver;
    use crate::eeprom::interrupt::IrqDriver;
    use crate::eeprom::polling::PollingDriver;
    use crate::eeprom::request::TransferPhase;
    use crate::tests::sim::{Pumped, RecordingLogger, Segment, SimConfig, SimDma, SimEeprom};
    use hex_literal::hex;

    fn pattern(len: usize, seed: u8) -> std::vec::Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31) ^ seed).collect()
    }

    /// Lengths around the read tail cases and the page size.
    fn lengths(page: usize) -> [usize; 6] {
        [1, 2, 3, page - 1, page, page + 1]
    }

    fn round_trip<D: TransferDriver>(eeprom: &mut Eeprom<D>, sim: &SimEeprom) {
        let page = usize::from(eeprom.config().page_size.get());
        for (i, len) in lengths(page).into_iter().enumerate() {
            let offset = (i * 2 * page + 5) as u16;
            let data = pattern(len, 0xA0 | i as u8);
            eeprom.write(offset, &data).unwrap();

            let mut back = vec![0u8; len];
            eeprom.read_into(offset, &mut back).unwrap();
            assert_eq!(back, data, "len {len} at {offset:#x}");
            assert!(sim.violations().is_empty(), "len {len}: {:?}", sim.violations());
        }
    }

    #[test]
    fn test_round_trip_polling() {
        let (bus, _dma) = SimEeprom::new(SimConfig {
            busy_probes: 2,
            ..SimConfig::default()
        });
        let sim = bus.clone();
        let config = EepromConfig::default();
        let mut eeprom = Eeprom::new(PollingDriver::<_, 16>::new(bus, &config), config).unwrap();
        round_trip(&mut eeprom, &sim);
    }

    #[test]
    fn test_round_trip_interrupt() {
        let (bus, _dma) = SimEeprom::new(SimConfig {
            busy_probes: 2,
            ..SimConfig::default()
        });
        let sim = bus.clone();
        let config = EepromConfig::default();
        let irq: IrqDriver<SimEeprom, 16> = IrqDriver::new(bus, &config);
        let mut eeprom = Eeprom::new(Pumped(&irq), config).unwrap();
        round_trip(&mut eeprom, &sim);
    }

    #[test]
    fn test_round_trip_dma() {
        let (bus, dma) = SimEeprom::new(SimConfig {
            busy_probes: 2,
            ..SimConfig::default()
        });
        let sim = bus.clone();
        let config = EepromConfig::default();
        let mut buf = [0u8; 16];
        let mut eeprom = Eeprom::new(DmaDriver::new(bus, dma, &mut buf, &config), config).unwrap();
        round_trip(&mut eeprom, &sim);
    }

    #[test]
    fn test_round_trip_sixteen_byte_pages() {
        let (bus, _dma) = SimEeprom::new(SimConfig {
            page_size: 16,
            ..SimConfig::default()
        });
        let sim = bus.clone();
        let config = EepromConfig::builder().page_size(16).build().unwrap();
        let mut eeprom = Eeprom::new(PollingDriver::<_, 32>::new(bus, &config), config).unwrap();
        round_trip(&mut eeprom, &sim);
    }

    /// Write 20 bytes at 0x0D over 8-byte pages on a device that NACKs two probes
    /// after every page, and check each chunk is followed by its own probe run.
    fn assert_chunks_run_sequentially<D: TransferDriver>(eeprom: &mut Eeprom<D>, sim: &SimEeprom) {
        let data = pattern(20, 0x3C);
        eeprom.write(0x0D, &data).unwrap();

        let nack = Segment::Probe { acked: false };
        let ack = Segment::Probe { acked: true };
        let write = |offset: u8, range: std::ops::Range<usize>| Segment::Write {
            offset,
            data: data[range].to_vec(),
        };
        let mut expected = vec![];
        for (offset, range) in [(0x0D, 0..3), (0x10, 3..11), (0x18, 11..19), (0x20, 19..20)] {
            expected.push(write(offset, range));
            expected.extend([nack.clone(), nack.clone(), ack.clone()]);
        }
        assert_eq!(sim.segments(), expected);
        assert_eq!(&sim.memory()[0x0D..0x21], &data[..]);
        assert!(sim.violations().is_empty(), "{:?}", sim.violations());
        assert_eq!(eeprom.driver().phase(), TransferPhase::Idle);
    }

    fn two_probe_device() -> (SimEeprom, SimDma) {
        SimEeprom::new(SimConfig {
            busy_probes: 2,
            ..SimConfig::default()
        })
    }

    #[test]
    fn test_chunks_run_sequentially_after_probe() {
        let (bus, _dma) = two_probe_device();
        let sim = bus.clone();
        let config = EepromConfig::default();
        let mut eeprom = Eeprom::new(PollingDriver::<_, 16>::new(bus, &config), config).unwrap();
        assert_chunks_run_sequentially(&mut eeprom, &sim);
    }

    #[test]
    fn test_chunks_run_sequentially_interrupt() {
        let (bus, _dma) = two_probe_device();
        let sim = bus.clone();
        let config = EepromConfig::default();
        let irq: IrqDriver<SimEeprom, 16> = IrqDriver::new(bus, &config);
        let mut eeprom = Eeprom::new(Pumped(&irq), config).unwrap();
        assert_chunks_run_sequentially(&mut eeprom, &sim);
    }

    #[test]
    fn test_chunks_run_sequentially_dma() {
        let (bus, dma) = two_probe_device();
        let sim = bus.clone();
        let config = EepromConfig::default();
        let mut buf = [0u8; 16];
        let mut eeprom = Eeprom::new(DmaDriver::new(bus, dma, &mut buf, &config), config).unwrap();
        assert_chunks_run_sequentially(&mut eeprom, &sim);
    }

    #[test]
    fn test_execute_rejects_offsets_past_one_byte() {
        let (bus, _dma) = SimEeprom::new(SimConfig::default());
        let sim = bus.clone();
        let config = EepromConfig::default();
        let mut eeprom = Eeprom::new(PollingDriver::<_, 16>::new(bus, &config), config).unwrap();

        let request = TransferRequest::write(0x50, 0xFE, &[1, 2, 3, 4]).unwrap();
        assert_eq!(eeprom.execute(request), Err(TransferError::OutOfBounds));
        assert_eq!(eeprom.write(0x100, &[1]), Err(TransferError::OutOfBounds));
        let mut back = [0u8; 2];
        assert_eq!(eeprom.read_into(0x1FF, &mut back), Err(TransferError::OutOfBounds));
        assert!(sim.trace().is_empty());

        eeprom.write(0xFE, &[1, 2]).unwrap();
        assert_eq!(&sim.memory()[0xFE..], &[1, 2]);
    }

    #[test]
    fn test_long_read_split_into_segments() {
        let (bus, _dma) = SimEeprom::new(SimConfig::default());
        let sim = bus.clone();
        let data = pattern(40, 0x77);
        sim.fill(0x40, &data);

        let config = EepromConfig::default();
        let mut eeprom = Eeprom::new(PollingDriver::<_, 16>::new(bus, &config), config).unwrap();
        let back: Vec<u8, 64> = eeprom.read(0x40, 40).unwrap();
        assert_eq!(&back[..], &data[..]);
        assert_eq!(
            sim.segments(),
            vec![
                Segment::Read { offset: 0x40, len: 16 },
                Segment::Read { offset: 0x50, len: 16 },
                Segment::Read { offset: 0x60, len: 8 },
            ]
        );
    }

    #[test]
    fn test_read_capacity_exceeded() {
        let (bus, _dma) = SimEeprom::new(SimConfig::default());
        let config = EepromConfig::default();
        let mut eeprom = Eeprom::new(PollingDriver::<_, 16>::new(bus, &config), config).unwrap();
        assert_eq!(
            eeprom.read::<4>(0, 5).unwrap_err(),
            TransferError::InvalidLength
        );
        assert_eq!(eeprom.read::<4>(0, 0).unwrap_err(), TransferError::InvalidLength);
        assert_eq!(eeprom.write(0, &[]), Err(TransferError::InvalidLength));
    }

    #[test]
    fn test_page_larger_than_driver_buffer_rejected() {
        let (bus, _dma) = SimEeprom::new(SimConfig::default());
        let config = EepromConfig::builder().page_size(32).build().unwrap();
        let result = Eeprom::new(PollingDriver::<_, 16>::new(bus, &config), config);
        assert!(matches!(result, Err(ConfigurationError::PageExceedsCapacity)));
    }

    #[test]
    fn test_timeout_on_every_driver() {
        let dead = SimConfig {
            dead: true,
            ..SimConfig::default()
        };
        let config = EepromConfig::builder()
            .long_timeout(500)
            .completion_timeout(500)
            .build()
            .unwrap();

        let (bus, _dma) = SimEeprom::new(dead.clone());
        let mut eeprom = Eeprom::new(PollingDriver::<_, 16>::new(bus, &config), config).unwrap();
        assert_eq!(eeprom.write(0, &[1, 2]), Err(TransferError::TimedOut));

        let (bus, _dma) = SimEeprom::new(dead.clone());
        let irq: IrqDriver<SimEeprom, 16> = IrqDriver::new(bus, &config);
        let mut eeprom = Eeprom::new(Pumped(&irq), config).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(eeprom.read_into(0, &mut out), Err(TransferError::TimedOut));
        assert_eq!(
            eeprom.driver().phase(),
            TransferPhase::Failed(TransferError::TimedOut)
        );

        let (bus, dma) = SimEeprom::new(dead);
        let mut buf = [0u8; 16];
        let mut eeprom = Eeprom::new(DmaDriver::new(bus, dma, &mut buf, &config), config).unwrap();
        assert_eq!(eeprom.write(0, &[1, 2]), Err(TransferError::TimedOut));

        let (bus, _dma) = SimEeprom::new(SimConfig {
            stuck_busy: true,
            ..SimConfig::default()
        });
        let mut eeprom = Eeprom::new(PollingDriver::<_, 16>::new(bus, &config), config).unwrap();
        assert_eq!(eeprom.read::<8>(0, 8).unwrap_err(), TransferError::TimedOut);
    }

    #[test]
    fn test_failure_is_logged() {
        let (bus, _dma) = SimEeprom::new(SimConfig::default());
        let config = EepromConfig::builder().slave_address(0x51).build().unwrap();
        let mut logger = RecordingLogger::default();
        {
            let mut eeprom = Eeprom::with_logger(
                PollingDriver::<_, 16>::new(bus, &config),
                config,
                &mut logger,
            )
            .unwrap();
            assert_eq!(eeprom.write(0x08, &[1]), Err(TransferError::Nack));
        }
        assert!(logger.contains(LogLevel::Debug, "write 1 bytes at 0x0008"));
        assert!(logger.contains(LogLevel::Error, "not acknowledged"));
    }

    #[test]
    fn test_execute_with_explicit_address() {
        let (bus, _dma) = SimEeprom::new(SimConfig {
            address: 0x54,
            ..SimConfig::default()
        });
        let sim = bus.clone();
        let config = EepromConfig::default();
        let mut eeprom = Eeprom::new(PollingDriver::<_, 16>::new(bus, &config), config).unwrap();

        let data = hex!("0f 1e 2d");
        eeprom
            .execute(TransferRequest::write(0x54, 0x30, &data).unwrap())
            .unwrap();
        let mut back = [0u8; 3];
        eeprom
            .execute(TransferRequest::read(0x54, 0x30, &mut back).unwrap())
            .unwrap();
        assert_eq!(back, data);
        assert_eq!(&sim.memory()[0x30..0x33], &data);
    }

    #[test]
    fn test_storage_traits_check_bounds() {
        let (bus, _dma) = SimEeprom::new(SimConfig::default());
        let config = EepromConfig::default();
        let mut eeprom = Eeprom::new(PollingDriver::<_, 16>::new(bus, &config), config).unwrap();

        assert_eq!(ReadStorage::capacity(&eeprom), 256);
        Storage::write(&mut eeprom, 250, &[1, 2, 3, 4, 5, 6]).unwrap();
        let mut back = [0u8; 6];
        ReadStorage::read(&mut eeprom, 250, &mut back).unwrap();
        assert_eq!(back, [1, 2, 3, 4, 5, 6]);

        assert_eq!(
            Storage::write(&mut eeprom, 252, &[0; 5]),
            Err(TransferError::OutOfBounds)
        );
        let mut big = [0u8; 2];
        assert_eq!(
            ReadStorage::read(&mut eeprom, 255, &mut big),
            Err(TransferError::OutOfBounds)
        );
        assert_eq!(ReadStorage::read(&mut eeprom, 256, &mut []), Ok(()));
    }
}

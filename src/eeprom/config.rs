// Licensed under the Apache-2.0 license

use crate::eeprom::timeout::TimeoutGuard;
use core::fmt;
use core::num::NonZeroU16;
use embedded_hal::i2c::SevenBitAddress;

/// 24Cxx base address with the A2..A0 pins tied low.
pub const DEFAULT_SLAVE_ADDRESS: SevenBitAddress = 0x50;
pub const DEFAULT_PAGE_SIZE: u16 = 8;
pub const DEFAULT_CAPACITY: u32 = 256;
const DEFAULT_PAGE: NonZeroU16 = match NonZeroU16::new(DEFAULT_PAGE_SIZE) {
    Some(page) => page,
    None => NonZeroU16::MIN,
};
/// Largest capacity reachable with a single offset byte.
pub const MAX_CAPACITY: u32 = 256;
/// Budget for any single wait on a bus event or flag.
pub const DEFAULT_LONG_TIMEOUT: u32 = 0x1_0000;
/// Budget for the caller's wait on a whole interrupt or DMA transfer.
pub const DEFAULT_COMPLETION_TIMEOUT: u32 = 0x10_0000;
/// Address probes allowed while the device finishes its write cycle.
pub const DEFAULT_MAX_TRIALS: u32 = 300;
/// Default driver buffer capacity in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationError {
    /// Address outside the 7-bit range, or in a reserved block.
    InvalidAddress,
    ZeroPageSize,
    ZeroMaxTrials,
    /// Capacity is zero or not reachable with one offset byte.
    InvalidCapacity,
    /// A page does not fit in the device or in the driver's transfer buffer.
    PageExceedsCapacity,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ConfigurationError::InvalidAddress => "invalid 7-bit slave address",
            ConfigurationError::ZeroPageSize => "page size must be non-zero",
            ConfigurationError::ZeroMaxTrials => "at least one standby probe is required",
            ConfigurationError::InvalidCapacity => "capacity must be between 1 and 256 bytes",
            ConfigurationError::PageExceedsCapacity => "page does not fit the device or buffer",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigurationError {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EepromConfig {
    pub slave_address: SevenBitAddress,
    pub page_size: NonZeroU16,
    pub capacity: u32,
    pub long_timeout: u32,
    pub completion_timeout: u32,
    pub max_trials: u32,
}

impl EepromConfig {
    #[must_use]
    pub fn builder() -> EepromConfigBuilder {
        EepromConfigBuilder::new()
    }

    /// Defaults for a 24C02: address 0x50, 8-byte pages, 256 bytes.
    pub const DEFAULT: Self = Self {
        slave_address: DEFAULT_SLAVE_ADDRESS,
        page_size: DEFAULT_PAGE,
        capacity: DEFAULT_CAPACITY,
        long_timeout: DEFAULT_LONG_TIMEOUT,
        completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
        max_trials: DEFAULT_MAX_TRIALS,
    };

    /// Guard for individual event and flag waits.
    #[must_use]
    pub const fn guard(&self) -> TimeoutGuard {
        TimeoutGuard::new(self.long_timeout)
    }

    /// Guard for the caller's wait on transfer completion.
    #[must_use]
    pub const fn completion_guard(&self) -> TimeoutGuard {
        TimeoutGuard::new(self.completion_timeout)
    }
}

impl Default for EepromConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

pub struct EepromConfigBuilder {
    slave_address: SevenBitAddress,
    page_size: u16,
    capacity: u32,
    long_timeout: u32,
    completion_timeout: u32,
    max_trials: u32,
}

impl Default for EepromConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EepromConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slave_address: DEFAULT_SLAVE_ADDRESS,
            page_size: DEFAULT_PAGE_SIZE,
            capacity: DEFAULT_CAPACITY,
            long_timeout: DEFAULT_LONG_TIMEOUT,
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
            max_trials: DEFAULT_MAX_TRIALS,
        }
    }
    #[must_use]
    pub fn slave_address(mut self, address: SevenBitAddress) -> Self {
        self.slave_address = address;
        self
    }
    #[must_use]
    pub fn page_size(mut self, page_size: u16) -> Self {
        self.page_size = page_size;
        self
    }
    #[must_use]
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }
    #[must_use]
    pub fn long_timeout(mut self, bound: u32) -> Self {
        self.long_timeout = bound;
        self
    }
    #[must_use]
    pub fn completion_timeout(mut self, bound: u32) -> Self {
        self.completion_timeout = bound;
        self
    }
    #[must_use]
    pub fn max_trials(mut self, trials: u32) -> Self {
        self.max_trials = trials;
        self
    }

    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] describing the first invalid field.
    pub fn build(self) -> Result<EepromConfig, ConfigurationError> {
        // 0x00..=0x07 and 0x78..=0x7f are reserved by the I2C specification.
        if !(0x08..=0x77).contains(&self.slave_address) {
            return Err(ConfigurationError::InvalidAddress);
        }
        let page_size = NonZeroU16::new(self.page_size).ok_or(ConfigurationError::ZeroPageSize)?;
        if self.capacity == 0 || self.capacity > MAX_CAPACITY {
            return Err(ConfigurationError::InvalidCapacity);
        }
        if u32::from(page_size.get()) > self.capacity {
            return Err(ConfigurationError::PageExceedsCapacity);
        }
        if self.max_trials == 0 {
            return Err(ConfigurationError::ZeroMaxTrials);
        }
        Ok(EepromConfig {
            slave_address: self.slave_address,
            page_size,
            capacity: self.capacity,
            long_timeout: self.long_timeout,
            completion_timeout: self.completion_timeout,
            max_trials: self.max_trials,
        })
    }
}

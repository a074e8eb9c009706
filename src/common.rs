// Licensed under the Apache-2.0 license

//! Shared logging plumbing.
//!
//! Drivers are generic over a [`Logger`] so that firmware can route diagnostics to a
//! UART console while tests and size-sensitive builds use [`NoOpLogger`].

use core::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

pub trait Logger {
    fn log(&mut self, level: LogLevel, args: fmt::Arguments<'_>);

    fn debug(&mut self, args: fmt::Arguments<'_>) {
        self.log(LogLevel::Debug, args);
    }

    fn info(&mut self, args: fmt::Arguments<'_>) {
        self.log(LogLevel::Info, args);
    }

    fn warn(&mut self, args: fmt::Arguments<'_>) {
        self.log(LogLevel::Warn, args);
    }

    fn error(&mut self, args: fmt::Arguments<'_>) {
        self.log(LogLevel::Error, args);
    }
}

impl<L: Logger + ?Sized> Logger for &mut L {
    fn log(&mut self, level: LogLevel, args: fmt::Arguments<'_>) {
        (**self).log(level, args);
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&mut self, _level: LogLevel, _args: fmt::Arguments<'_>) {}
}

/// Writes `[LEVEL] message` lines to a serial console.
///
/// Messages below `min_level` are dropped. Write failures are ignored since
/// there is nowhere left to report them.
pub struct UartLogger<W: embedded_io::Write> {
    writer: W,
    min_level: LogLevel,
}

impl<W: embedded_io::Write> UartLogger<W> {
    pub fn new(writer: W) -> Self {
        Self::with_level(writer, LogLevel::Debug)
    }

    pub fn with_level(writer: W, min_level: LogLevel) -> Self {
        Self { writer, min_level }
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    pub fn release(self) -> W {
        self.writer
    }
}

impl<W: embedded_io::Write> Logger for UartLogger<W> {
    fn log(&mut self, level: LogLevel, args: fmt::Arguments<'_>) {
        if level < self.min_level {
            return;
        }
        let _ = write!(self.writer, "[{}] ", level.as_str());
        let _ = self.writer.write_fmt(args);
        let _ = self.writer.write_all(b"\r\n");
    }
}

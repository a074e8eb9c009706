// Licensed under the Apache-2.0 license

//! Page-boundary splitting for EEPROM writes.
//!
//! An EEPROM latches at most one page per write cycle and wraps the internal address
//! inside the page, so a write that crosses a boundary must be issued as several
//! transfers.

use core::num::NonZeroU16;
use core::ops::Range;

/// One page-bounded piece of a write.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PageChunk {
    /// Device offset of the first byte.
    pub offset: u32,
    /// Number of bytes, never zero.
    pub len: usize,
    /// Index of the first byte within the caller's buffer.
    pub start: usize,
}

impl PageChunk {
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// Iterator over the chunks of one write.
///
/// The first chunk runs up to the next page boundary (or the end of the data), every
/// following chunk is one full page except possibly the last.
#[derive(Clone, Debug)]
pub struct PageWriteJob {
    offset: u32,
    start: usize,
    remaining: usize,
    page_size: u32,
}

impl PageWriteJob {
    #[must_use]
    pub fn new(offset: u32, len: usize, page_size: NonZeroU16) -> Self {
        Self {
            offset,
            start: 0,
            remaining: len,
            page_size: u32::from(page_size.get()),
        }
    }
}

impl Iterator for PageWriteJob {
    type Item = PageChunk;

    fn next(&mut self) -> Option<PageChunk> {
        if self.remaining == 0 {
            return None;
        }
        let to_boundary = (self.page_size - self.offset % self.page_size) as usize;
        let len = to_boundary.min(self.remaining);
        let chunk = PageChunk {
            offset: self.offset,
            len,
            start: self.start,
        };

        self.offset = self.offset.wrapping_add(len as u32);
        self.start += len;
        self.remaining -= len;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.remaining == 0 {
            return (0, Some(0));
        }
        let page = self.page_size as usize;
        let head = (page - (self.offset % self.page_size) as usize).min(self.remaining);
        let n = 1 + (self.remaining - head).div_ceil(page);
        (n, Some(n))
    }
}

impl ExactSizeIterator for PageWriteJob {}

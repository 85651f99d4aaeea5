//! Per-channel sample buffers filled during streaming

use crate::{
    complex::Sample,
    error::{Error, Result},
};

/// Growable, append-only buffer for one receive channel.
///
/// Index `i` is always the `i`-th sample the channel delivered.
#[derive(Debug, Default, Clone)]
pub struct ChannelAccumulator {
    samples: Vec<Sample>,
}

impl ChannelAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size for a known sample target
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, chunk: &[Sample]) {
        self.samples.extend_from_slice(chunk);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Read-only view of `count` samples starting at `offset`
    pub fn slice(&self, offset: usize, count: usize) -> Result<&[Sample]> {
        let out_of_range = || Error::OutOfRange {
            offset,
            count,
            len: self.len(),
        };
        let end = offset.checked_add(count).ok_or_else(out_of_range)?;
        self.samples.get(offset..end).ok_or_else(out_of_range)
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }
}

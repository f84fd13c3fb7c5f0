//! Clip range arithmetic
//!
//! The caller supplies the range in milliseconds; the container layer works in
//! microseconds. The conversion is an exact ×1000 so timestamps never drift
//! against the container's units.

use crate::error::{Error, Result};

/// Time range selected for extraction, in microseconds.
///
/// Invariant: `end_us > start_us`, enforced at construction. This also keeps
/// the integer progress computation free of a zero divisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRange {
    start_us: u64,
    end_us: u64,
}

impl ClipRange {
    /// Build a range from caller-facing millisecond bounds.
    pub fn from_millis(start_ms: u64, end_ms: u64) -> Result<Self> {
        if end_ms <= start_ms {
            return Err(Error::InvalidRange(format!(
                "end ({end_ms} ms) must be greater than start ({start_ms} ms)"
            )));
        }
        Ok(Self {
            start_us: start_ms * 1000,
            end_us: end_ms * 1000,
        })
    }

    /// Range start in microseconds.
    pub fn start_us(&self) -> u64 {
        self.start_us
    }

    /// Range end in microseconds.
    pub fn end_us(&self) -> u64 {
        self.end_us
    }

    /// Selected duration in microseconds.
    pub fn duration_us(&self) -> u64 {
        self.end_us - self.start_us
    }

    /// Integer progress of `pts_us` through the range, clamped to 0..=100.
    ///
    /// A coarse seek can hand the pipeline samples from before the range
    /// start; those report 0 rather than a negative percentage.
    pub fn progress_percent(&self, pts_us: u64) -> u64 {
        if pts_us <= self.start_us {
            return 0;
        }
        let pct = (pts_us - self.start_us) * 100 / self.duration_us();
        pct.min(100)
    }
}

//! # Flow Control
//!
//! Credit-based backpressure for one execution. Every rendered payload is
//! recorded as unacknowledged until the sink reports it handed off. Two
//! thresholds keep the cursor from thrashing:
//!
//! - record: counter `>` high watermark signals [`FlowSignal::Pause`]
//! - acknowledge: counter `<` low watermark signals [`FlowSignal::Resume`]
//!
//! The low watermark defaults to half the high watermark.

use super::errors::{QueryError, QueryResult};

/// Default high watermark: 4 MiB of unacknowledged output
pub const DEFAULT_HIGH_WATERMARK: u64 = 4 * 1024 * 1024;

/// Pause/resume thresholds in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermarks {
    high: u64,
    low: u64,
}

impl Watermarks {
    /// Explicit thresholds; requires `0 < low <= high`
    pub fn new(high: u64, low: u64) -> QueryResult<Self> {
        if high == 0 {
            return Err(QueryError::InvalidWatermarks(
                "high watermark must be positive".into(),
            ));
        }
        if low == 0 || low > high {
            return Err(QueryError::InvalidWatermarks(format!(
                "low watermark {} must be in 1..={}",
                low, high
            )));
        }
        Ok(Self { high, low })
    }

    /// Thresholds derived from a high watermark, with low = high / 2
    pub fn with_high(high: u64) -> QueryResult<Self> {
        Self::new(high, (high / 2).max(1))
    }

    /// High watermark
    pub fn high(&self) -> u64 {
        self.high
    }

    /// Low watermark
    pub fn low(&self) -> u64 {
        self.low
    }
}

impl Default for Watermarks {
    fn default() -> Self {
        Self {
            high: DEFAULT_HIGH_WATERMARK,
            low: DEFAULT_HIGH_WATERMARK / 2,
        }
    }
}

/// What the cursor should do after a counter update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowSignal {
    /// Counter is above the high watermark
    Pause,
    /// Counter is below the low watermark
    Resume,
    /// Neither threshold crossed
    Hold,
}

/// Running count of rendered-but-unacknowledged bytes
#[derive(Debug, Clone)]
pub struct UnackedBytes {
    outstanding: u64,
    marks: Watermarks,
}

impl UnackedBytes {
    /// Create a zeroed counter
    pub fn new(marks: Watermarks) -> Self {
        Self {
            outstanding: 0,
            marks,
        }
    }

    /// Record a rendered payload
    pub fn record(&mut self, bytes: u64) -> FlowSignal {
        self.outstanding = self.outstanding.saturating_add(bytes);
        if self.outstanding > self.marks.high {
            FlowSignal::Pause
        } else {
            FlowSignal::Hold
        }
    }

    /// Record bytes the sink has handed off
    ///
    /// Acks may never exceed what is outstanding; an oversized ack is
    /// rejected and leaves the counter untouched.
    pub fn acknowledge(&mut self, bytes: u64) -> QueryResult<FlowSignal> {
        if bytes > self.outstanding {
            return Err(QueryError::AckOverflow {
                acked: bytes,
                outstanding: self.outstanding,
            });
        }
        self.outstanding -= bytes;
        if self.outstanding < self.marks.low {
            Ok(FlowSignal::Resume)
        } else {
            Ok(FlowSignal::Hold)
        }
    }

    /// Bytes currently unacknowledged
    pub fn outstanding(&self) -> u64 {
        self.outstanding
    }

    /// Configured thresholds
    pub fn watermarks(&self) -> Watermarks {
        self.marks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(high: u64) -> UnackedBytes {
        UnackedBytes::new(Watermarks::with_high(high).unwrap())
    }

    #[test]
    fn test_default_watermarks() {
        let marks = Watermarks::default();
        assert_eq!(marks.high(), 4 * 1024 * 1024);
        assert_eq!(marks.low(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_watermarks() {
        assert!(Watermarks::new(0, 0).is_err());
        assert!(Watermarks::new(100, 0).is_err());
        assert!(Watermarks::new(100, 101).is_err());
        assert!(Watermarks::new(100, 100).is_ok());
        assert_eq!(Watermarks::with_high(1).unwrap().low(), 1);
    }

    #[test]
    fn test_pause_only_strictly_above_high() {
        let mut c = counter(1000);
        assert_eq!(c.record(1000), FlowSignal::Hold);
        assert_eq!(c.record(1), FlowSignal::Pause);
    }

    #[test]
    fn test_resume_only_strictly_below_low() {
        let mut c = counter(1000);
        c.record(1200);
        assert_eq!(c.acknowledge(700).unwrap(), FlowSignal::Hold);
        assert_eq!(c.outstanding(), 500);
        assert_eq!(c.acknowledge(1).unwrap(), FlowSignal::Resume);
        assert_eq!(c.outstanding(), 499);
    }

    #[test]
    fn test_hysteresis_band_holds() {
        let mut c = counter(1000);
        c.record(1001);
        // Dropping back under high is not enough to resume
        assert_eq!(c.acknowledge(2).unwrap(), FlowSignal::Hold);
        assert_eq!(c.record(1), FlowSignal::Hold);
    }

    #[test]
    fn test_ack_overflow_rejected() {
        let mut c = counter(1000);
        c.record(10);
        let err = c.acknowledge(11).unwrap_err();
        assert!(matches!(err, QueryError::AckOverflow { acked: 11, outstanding: 10 }));
        assert_eq!(c.outstanding(), 10);
    }

    #[test]
    fn test_all_acks_return_to_zero() {
        let mut c = counter(64);
        for n in [10, 40, 30, 5] {
            c.record(n);
        }
        for n in [5, 30, 40, 10] {
            c.acknowledge(n).unwrap();
        }
        assert_eq!(c.outstanding(), 0);
    }
}

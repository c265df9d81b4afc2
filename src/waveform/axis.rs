// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Uniform sample grid shared by all channels of a compiled sequence.

use serde::{Deserialize, Serialize};

use crate::error::{PulseError, Result};

/// Relative tolerance on sample spacing when accepting explicit times.
pub const SPACING_TOLERANCE: f64 = 1e-6;

/// A uniformly spaced, strictly increasing time axis.
///
/// # Invariants
///
/// - `dt_ns > 0.0` and finite
/// - `t0_ns` finite
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    /// Time of the first sample in nanoseconds.
    pub t0_ns: f64,
    /// Sample period in nanoseconds.
    pub dt_ns: f64,
    /// Number of samples.
    pub len: usize,
}

impl TimeAxis {
    /// Create a new axis.
    ///
    /// # Errors
    ///
    /// Returns `AxisMismatch` if `dt_ns` is not positive and finite or
    /// `t0_ns` is not finite.
    pub fn new(t0_ns: f64, dt_ns: f64, len: usize) -> Result<Self> {
        if !t0_ns.is_finite() {
            return Err(PulseError::AxisMismatch(format!("t0 must be finite, got {t0_ns}")).into());
        }
        if !(dt_ns > 0.0 && dt_ns.is_finite()) {
            return Err(PulseError::AxisMismatch(format!(
                "sample period must be positive and finite, got {dt_ns}"
            ))
            .into());
        }
        Ok(Self { t0_ns, dt_ns, len })
    }

    /// Axis starting at zero for an AWG running at `sample_rate_ghz`.
    pub fn from_sample_rate(sample_rate_ghz: f64, len: usize) -> Result<Self> {
        Self::new(0.0, 1.0 / sample_rate_ghz, len)
    }

    /// Recover the grid behind an explicit list of sample times.
    ///
    /// A single sample carries a nominal 1 ns spacing.
    ///
    /// # Errors
    ///
    /// Returns `AxisMismatch` if `times` is empty, non-finite, not strictly
    /// increasing, or its spacing deviates from the mean by more than
    /// [`SPACING_TOLERANCE`] (relative).
    pub fn from_samples(times: &[f64]) -> Result<Self> {
        let (first, last) = match (times.first(), times.last()) {
            (Some(&f), Some(&l)) => (f, l),
            _ => {
                return Err(PulseError::AxisMismatch("sample times are empty".into()).into());
            }
        };
        if let Some(i) = times.iter().position(|t| !t.is_finite()) {
            return Err(PulseError::AxisMismatch(format!(
                "sample time at index {i} is not finite"
            ))
            .into());
        }
        if times.len() == 1 {
            return Self::new(first, 1.0, 1);
        }

        let dt = (last - first) / (times.len() - 1) as f64;
        for (i, pair) in times.windows(2).enumerate() {
            let step = pair[1] - pair[0];
            if step <= 0.0 {
                return Err(PulseError::AxisMismatch(format!(
                    "sample times not strictly increasing at index {}",
                    i + 1
                ))
                .into());
            }
            if (step - dt).abs() > SPACING_TOLERANCE * dt {
                return Err(PulseError::AxisMismatch(format!(
                    "non-uniform spacing at index {}: {step} ns vs mean {dt} ns",
                    i + 1
                ))
                .into());
            }
        }
        Self::new(first, dt, times.len())
    }

    /// Time of sample `i` in nanoseconds.
    pub fn time(&self, i: usize) -> f64 {
        self.t0_ns + i as f64 * self.dt_ns
    }

    /// All sample times.
    pub fn times(&self) -> Vec<f64> {
        (0..self.len).map(|i| self.time(i)).collect()
    }

    /// Sample rate in GHz.
    pub fn sample_rate_ghz(&self) -> f64 {
        1.0 / self.dt_ns
    }

    /// Span covered by the samples, `len * dt`.
    pub fn duration_ns(&self) -> f64 {
        self.len as f64 * self.dt_ns
    }

    /// Index range `[start, end)` of samples whose times fall in
    /// `[t_start, t_end]`, clamped to the axis.
    pub fn index_range(&self, t_start: f64, t_end: f64) -> (usize, usize) {
        let lo = ((t_start - self.t0_ns) / self.dt_ns).floor().max(0.0) as usize;
        let hi = ((t_end - self.t0_ns) / self.dt_ns).ceil() + 1.0;
        let hi = (hi.max(0.0) as usize).min(self.len);
        (lo.min(hi), hi)
    }

    /// Whether two axes describe the same grid.
    pub fn matches(&self, other: &TimeAxis) -> bool {
        self.len == other.len
            && (self.dt_ns - other.dt_ns).abs() <= SPACING_TOLERANCE * self.dt_ns
            && (self.t0_ns - other.t0_ns).abs() <= SPACING_TOLERANCE * self.dt_ns
    }

    /// Fail with `AxisMismatch` unless `other` describes the same grid.
    pub fn ensure_matches(&self, other: &TimeAxis, context: &str) -> Result<()> {
        if self.matches(other) {
            Ok(())
        } else {
            Err(PulseError::AxisMismatch(format!(
                "{context}: (t0={}, dt={}, len={}) vs (t0={}, dt={}, len={})",
                self.t0_ns, self.dt_ns, self.len, other.t0_ns, other.dt_ns, other.len
            ))
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_sample_rate() {
        let axis = TimeAxis::from_sample_rate(2.0, 10).unwrap();
        assert_relative_eq!(axis.dt_ns, 0.5);
        assert_relative_eq!(axis.time(4), 2.0);
        assert_relative_eq!(axis.duration_ns(), 5.0);
        assert_relative_eq!(axis.sample_rate_ghz(), 2.0);
    }

    #[test]
    fn test_invalid_period() {
        assert!(TimeAxis::new(0.0, 0.0, 4).is_err());
        assert!(TimeAxis::new(0.0, -1.0, 4).is_err());
        assert!(TimeAxis::new(f64::NAN, 1.0, 4).is_err());
    }

    #[test]
    fn test_from_samples_uniform() {
        let axis = TimeAxis::from_samples(&[1.0, 1.5, 2.0, 2.5]).unwrap();
        assert_relative_eq!(axis.t0_ns, 1.0);
        assert_relative_eq!(axis.dt_ns, 0.5);
        assert_eq!(axis.len, 4);
    }

    #[test]
    fn test_from_samples_single() {
        let axis = TimeAxis::from_samples(&[3.0]).unwrap();
        assert_eq!(axis.len, 1);
        assert_relative_eq!(axis.time(0), 3.0);
    }

    #[test]
    fn test_from_samples_rejects_empty() {
        let err = TimeAxis::from_samples(&[]).unwrap_err();
        assert!(matches!(err, Error::Pulse(PulseError::AxisMismatch(_))));
    }

    #[test]
    fn test_from_samples_rejects_decreasing() {
        let err = TimeAxis::from_samples(&[0.0, 1.0, 0.5]).unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn test_from_samples_rejects_nonuniform() {
        let err = TimeAxis::from_samples(&[0.0, 1.0, 2.5, 3.0]).unwrap_err();
        assert!(err.to_string().contains("non-uniform"));
    }

    #[test]
    fn test_from_samples_tolerates_rounding() {
        let times: Vec<f64> = (0..100).map(|i| i as f64 * 0.1).collect();
        assert!(TimeAxis::from_samples(&times).is_ok());
    }

    #[test]
    fn test_index_range_clamped() {
        let axis = TimeAxis::from_sample_rate(1.0, 10).unwrap();
        assert_eq!(axis.index_range(2.0, 4.0), (2, 5));
        assert_eq!(axis.index_range(-5.0, 1.2), (0, 3));
        assert_eq!(axis.index_range(8.0, 50.0), (8, 10));
        assert_eq!(axis.index_range(20.0, 30.0), (10, 10));
    }

    #[test]
    fn test_matches() {
        let a = TimeAxis::new(0.0, 0.5, 8).unwrap();
        let b = TimeAxis::new(0.0, 0.5, 8).unwrap();
        let c = TimeAxis::new(0.0, 0.5, 9).unwrap();
        let d = TimeAxis::new(0.25, 0.5, 8).unwrap();
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
        assert!(!a.matches(&d));
        assert!(a.ensure_matches(&d, "test").is_err());
    }
}

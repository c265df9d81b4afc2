// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Complex baseband sample buffer.

use ndarray::Array1;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::axis::TimeAxis;
use crate::error::{PulseError, Result};

/// Baseband samples for one control channel.
///
/// A `Waveform` is never modified once handed to the next pipeline stage;
/// every stage builds a new buffer. Construction checks that the sample
/// count matches the axis length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    axis: TimeAxis,
    samples: Array1<Complex64>,
}

impl Waveform {
    /// Wrap `samples` on `axis`.
    ///
    /// # Errors
    ///
    /// Returns `AxisMismatch` if the lengths differ.
    pub fn new(axis: TimeAxis, samples: Array1<Complex64>) -> Result<Self> {
        if samples.len() != axis.len {
            return Err(PulseError::AxisMismatch(format!(
                "{} samples on an axis of length {}",
                samples.len(),
                axis.len
            ))
            .into());
        }
        Ok(Self { axis, samples })
    }

    /// All-zero waveform on `axis`.
    pub fn zeros(axis: TimeAxis) -> Self {
        Self {
            samples: Array1::zeros(axis.len),
            axis,
        }
    }

    /// Real-valued waveform (Z control, I or Q line).
    pub fn from_real(axis: TimeAxis, values: &[f64]) -> Result<Self> {
        let samples = values.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        Self::new(axis, samples)
    }

    /// The sample grid.
    pub fn axis(&self) -> &TimeAxis {
        &self.axis
    }

    /// The complex samples.
    pub fn samples(&self) -> &Array1<Complex64> {
        &self.samples
    }

    /// Consume the buffer, returning its samples.
    pub fn into_samples(self) -> Array1<Complex64> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample times in nanoseconds.
    pub fn times(&self) -> Vec<f64> {
        self.axis.times()
    }

    /// In-phase component.
    pub fn real(&self) -> Vec<f64> {
        self.samples.iter().map(|z| z.re).collect()
    }

    /// Quadrature component.
    pub fn imag(&self) -> Vec<f64> {
        self.samples.iter().map(|z| z.im).collect()
    }

    /// Largest sample modulus.
    pub fn peak_amplitude(&self) -> f64 {
        self.samples.iter().map(|z| z.norm()).fold(0.0, f64::max)
    }

    /// Sample-wise sum of two waveforms on the same axis.
    pub fn add(&self, other: &Waveform) -> Result<Waveform> {
        self.axis.ensure_matches(&other.axis, "cannot sum waveforms")?;
        Ok(Self {
            axis: self.axis,
            samples: &self.samples + &other.samples,
        })
    }

    /// Copy with every sample multiplied by `factor`.
    pub fn scaled(&self, factor: Complex64) -> Waveform {
        Self {
            axis: self.axis,
            samples: self.samples.mapv(|z| z * factor),
        }
    }

    /// Largest sample-wise distance to `other`.
    pub fn max_abs_diff(&self, other: &Waveform) -> Result<f64> {
        self.axis.ensure_matches(&other.axis, "cannot compare waveforms")?;
        Ok(self
            .samples
            .iter()
            .zip(other.samples.iter())
            .map(|(a, b)| (a - b).norm())
            .fold(0.0, f64::max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn axis(len: usize) -> TimeAxis {
        TimeAxis::from_sample_rate(1.0, len).unwrap()
    }

    #[test]
    fn test_new_checks_length() {
        assert!(Waveform::new(axis(3), Array1::zeros(4)).is_err());
        assert!(Waveform::new(axis(4), Array1::zeros(4)).is_ok());
    }

    #[test]
    fn test_zeros() {
        let wf = Waveform::zeros(axis(5));
        assert_eq!(wf.len(), 5);
        assert_relative_eq!(wf.peak_amplitude(), 0.0);
    }

    #[test]
    fn test_real_imag() {
        let samples = Array1::from(vec![Complex64::new(1.0, 2.0), Complex64::new(-3.0, 0.5)]);
        let wf = Waveform::new(axis(2), samples).unwrap();
        assert_eq!(wf.real(), vec![1.0, -3.0]);
        assert_eq!(wf.imag(), vec![2.0, 0.5]);
    }

    #[test]
    fn test_peak_amplitude_uses_modulus() {
        let samples = Array1::from(vec![Complex64::new(0.3, 0.4), Complex64::new(-0.1, 0.0)]);
        let wf = Waveform::new(axis(2), samples).unwrap();
        assert_relative_eq!(wf.peak_amplitude(), 0.5);
    }

    #[test]
    fn test_add() {
        let a = Waveform::from_real(axis(3), &[1.0, 2.0, 3.0]).unwrap();
        let b = Waveform::from_real(axis(3), &[0.5, 0.5, 0.5]).unwrap();
        let sum = a.add(&b).unwrap();
        assert_eq!(sum.real(), vec![1.5, 2.5, 3.5]);
        // inputs untouched
        assert_eq!(a.real(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_add_axis_mismatch() {
        let a = Waveform::zeros(axis(3));
        let b = Waveform::zeros(axis(4));
        assert!(a.add(&b).is_err());
    }

    #[test]
    fn test_scaled() {
        let a = Waveform::from_real(axis(2), &[1.0, -2.0]).unwrap();
        let b = a.scaled(Complex64::new(0.0, 1.0));
        assert_eq!(b.imag(), vec![1.0, -2.0]);
        assert_relative_eq!(a.max_abs_diff(&a).unwrap(), 0.0);
    }
}

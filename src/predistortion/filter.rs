// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Kernel application and cascades.

use ndarray::Array1;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::kernel::Kernel;
use crate::error::Result;
use crate::waveform::Waveform;

/// Filter `waveform` through `kernel`, returning a new waveform of the
/// same length.
///
/// The filter is causal: every sample before index 0 is taken as zero.
/// A pulse that starts at the first sample therefore sees a step from zero,
/// and the correction concentrates extra energy in the samples right after
/// each rising edge. Output beyond the last input sample is discarded.
///
/// # Errors
///
/// Returns the kernel's validation error if its coefficients are invalid.
pub fn apply(waveform: &Waveform, kernel: &Kernel) -> Result<Waveform> {
    kernel.validate()?;
    let x = waveform.samples();
    let y = match kernel {
        Kernel::Fir { taps } => convolve(x, taps),
        Kernel::Iir { b, a } => difference_equation(x, b, a),
    };
    Waveform::new(*waveform.axis(), y)
}

/// Causal FIR convolution truncated to the input length.
fn convolve(x: &Array1<Complex64>, taps: &[f64]) -> Array1<Complex64> {
    let n = x.len();
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut acc = Complex64::new(0.0, 0.0);
        for (k, &h) in taps.iter().enumerate().take(i + 1) {
            acc += x[i - k] * h;
        }
        y[i] = acc;
    }
    y
}

/// Direct-form IIR:
/// `a[0] y[n] = sum_k b[k] x[n-k] - sum_{k>=1} a[k] y[n-k]`.
fn difference_equation(x: &Array1<Complex64>, b: &[f64], a: &[f64]) -> Array1<Complex64> {
    let n = x.len();
    let a0 = a[0];
    let mut y: Array1<Complex64> = Array1::zeros(n);
    for i in 0..n {
        let mut acc = Complex64::new(0.0, 0.0);
        for (k, &bk) in b.iter().enumerate().take(i + 1) {
            acc += x[i - k] * bk;
        }
        for (k, &ak) in a.iter().enumerate().skip(1).take(i) {
            acc -= y[i - k] * ak;
        }
        y[i] = acc / a0;
    }
    y
}

/// An ordered cascade of kernels.
///
/// Kernels are applied first to last. An empty chain is the identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterChain {
    kernels: Vec<Kernel>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_kernels(kernels: Vec<Kernel>) -> Self {
        Self { kernels }
    }

    /// Append a kernel to the end of the cascade.
    pub fn then(mut self, kernel: Kernel) -> Self {
        self.kernels.push(kernel);
        self
    }

    pub fn kernels(&self) -> &[Kernel] {
        &self.kernels
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        self.kernels.iter().try_for_each(Kernel::validate)
    }

    /// Run `waveform` through every kernel in order.
    pub fn apply(&self, waveform: &Waveform) -> Result<Waveform> {
        let mut out = waveform.clone();
        for (stage, kernel) in self.kernels.iter().enumerate() {
            debug!(stage, samples = out.len(), "Applying predistortion kernel");
            out = apply(&out, kernel)?;
        }
        Ok(out)
    }

    /// Cascade undoing this one: inverted kernels in reverse order.
    pub fn inverse(&self) -> Result<FilterChain> {
        let kernels = self
            .kernels
            .iter()
            .rev()
            .map(Kernel::inverse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { kernels })
    }
}

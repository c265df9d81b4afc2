// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Frequency-domain I/Q correction from a measured step response.
//!
//! The I and Q inputs of a mixer each see their own linear response, and
//! each response can leak into both output quadratures. [`IqTransfer`]
//! holds the two transfer functions, estimated from step responses by
//! smoothing, differentiating and Fourier transforming them. Outside a
//! trusted band the spectra are blended to unit gain. [`IqCorrection`]
//! inverts the resulting 2x2 real-to-complex map per frequency and applies
//! it to a waveform.
//!
//! Frequencies are in GHz and times in ns throughout.

use std::f64::consts::PI;

use ndarray::Array1;
use num_complex::Complex64;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PulseError, Result};
use crate::waveform::Waveform;

/// Below this determinant the I/Q map is treated as singular.
const SINGULAR_EPS: f64 = 1e-12;

/// Gaussian smoothing of a measured step response.
///
/// The response is smoothed with `sigma_ns` everywhere except a window of
/// `roi_ns` starting at `roi_start_ns`, which is kept raw, and the
/// following `light_window_ns`, which gets `light_sigma_ns`. `roi_start_ns`
/// is also taken as the step time and removed from the phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseSmoothing {
    pub roi_start_ns: f64,
    pub roi_ns: f64,
    pub light_window_ns: f64,
    pub sigma_ns: f64,
    pub light_sigma_ns: f64,
}

impl Default for ResponseSmoothing {
    fn default() -> Self {
        Self {
            roi_start_ns: 65.0,
            roi_ns: 3.0,
            light_window_ns: 5.0,
            sigma_ns: 5.0,
            light_sigma_ns: 0.5,
        }
    }
}

impl ResponseSmoothing {
    fn apply(&self, values: &[Complex64], t0_ns: f64, dt_ns: f64) -> Vec<Complex64> {
        let n = values.len();
        let to_samples = |t: f64| ((t / dt_ns).round().max(0.0) as usize).min(n);
        let roi_start = to_samples(self.roi_start_ns - t0_ns);
        let roi_len = to_samples(self.roi_ns);
        let roi_end = (roi_start + roi_len).min(n);
        let sigma = self.sigma_ns / dt_ns;

        let left = smooth_complex(&values[..roi_start], sigma);
        let right_light = smooth_complex(&values[roi_end..], self.light_sigma_ns / dt_ns);
        let right = smooth_complex(&values[roi_end..], sigma);
        let n_light = to_samples(self.light_window_ns)
            .saturating_sub(roi_len)
            .min(right.len());

        let mut out = Vec::with_capacity(n);
        out.extend_from_slice(&left);
        out.extend_from_slice(&values[roi_start..roi_end]);
        out.extend_from_slice(&right_light[..n_light]);
        out.extend_from_slice(&right[n_light..]);
        out
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("roi_ns", self.roi_ns),
            ("light_window_ns", self.light_window_ns),
            ("sigma_ns", self.sigma_ns),
            ("light_sigma_ns", self.light_sigma_ns),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(
                    PulseError::shape(name, format!("must be non-negative, got {value}")).into(),
                );
            }
        }
        if !self.roi_start_ns.is_finite() {
            return Err(PulseError::shape("roi_start_ns", "must be finite").into());
        }
        Ok(())
    }
}

/// Band inside which a measured transfer function is trusted.
///
/// Within `+-bandwidth_ghz` the spectrum is used as measured. Over the next
/// `cutoff_ghz` on either side it is blended to unit magnitude with a
/// Gaussian ramp, keeping its phase, and beyond that it is held at the
/// unit-magnitude value of the band edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandLimit {
    pub bandwidth_ghz: f64,
    pub cutoff_ghz: f64,
}

impl Default for BandLimit {
    fn default() -> Self {
        Self {
            bandwidth_ghz: 0.1,
            cutoff_ghz: 0.1,
        }
    }
}

impl BandLimit {
    fn apply(&self, freqs: &[f64], spectrum: &mut [Complex64]) -> Result<()> {
        let n = freqs.len();
        let df = freqs[1] - freqs[0];
        let center = freqs
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let radius = (self.bandwidth_ghz / df) as usize;
        let falloff = (self.cutoff_ghz / df) as usize;
        if falloff == 0 || center < radius + falloff || center + radius + falloff > n {
            return Err(PulseError::shape(
                "band",
                format!(
                    "bandwidth {} GHz plus cutoff {} GHz does not fit a response sampled at {:.4} GHz steps up to {:.4} GHz",
                    self.bandwidth_ghz,
                    self.cutoff_ghz,
                    df,
                    freqs[n - 1]
                ),
            )
            .into());
        }

        let lo = center - radius - falloff;
        let lo_band = center - radius;
        let hi_band = center + radius;
        let hi = hi_band + falloff;
        let first = unit(spectrum[lo]);
        let last = unit(spectrum[hi - 1]);

        let ramp = |f: f64, f0: f64| {
            let e5 = (-5.0f64).exp();
            ((-5.0 * (f - f0).powi(2) / self.cutoff_ghz.powi(2)).exp() - e5) / (1.0 - e5)
        };
        let edge = self.bandwidth_ghz + self.cutoff_ghz;
        for (k, z) in spectrum.iter_mut().enumerate() {
            *z = if k < lo {
                first
            } else if k < lo_band {
                (unit(*z) - *z) * ramp(freqs[k], -edge) + *z
            } else if k < hi_band {
                *z
            } else if k < hi {
                (unit(*z) - *z) * ramp(freqs[k], edge) + *z
            } else {
                last
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.bandwidth_ghz >= 0.0 && self.bandwidth_ghz.is_finite()) {
            return Err(PulseError::shape(
                "bandwidth_ghz",
                format!("must be non-negative, got {}", self.bandwidth_ghz),
            )
            .into());
        }
        if !(self.cutoff_ghz > 0.0 && self.cutoff_ghz.is_finite()) {
            return Err(PulseError::shape(
                "cutoff_ghz",
                format!("must be positive, got {}", self.cutoff_ghz),
            )
            .into());
        }
        Ok(())
    }
}

/// Measured response of the line to a step on I and on Q.
///
/// `i` is the demodulated output for a step on the I input, `q` for a step
/// on Q. An ideal mixer gives a real step for `i` and an imaginary one for
/// `q`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResponse {
    pub times_ns: Vec<f64>,
    pub i: Vec<Complex64>,
    pub q: Vec<Complex64>,
}

/// Transfer functions of the I and Q inputs on a centered frequency grid.
#[derive(Debug, Clone, PartialEq)]
pub struct IqTransfer {
    freqs_ghz: Vec<f64>,
    i: Vec<Complex64>,
    q: Vec<Complex64>,
}

impl IqTransfer {
    /// Transfer functions sampled at `freqs_ghz`, which must be the
    /// centered FFT grid of some sample spacing.
    pub fn from_spectrum(freqs_ghz: Vec<f64>, i: Vec<Complex64>, q: Vec<Complex64>) -> Result<Self> {
        if freqs_ghz.len() < 2 || i.len() != freqs_ghz.len() || q.len() != freqs_ghz.len() {
            return Err(PulseError::shape(
                "transfer",
                format!(
                    "need matching spectra of at least 2 points, got {} freqs, {} I, {} Q",
                    freqs_ghz.len(),
                    i.len(),
                    q.len()
                ),
            )
            .into());
        }
        if freqs_ghz.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(PulseError::shape("transfer", "frequencies must be increasing").into());
        }
        Ok(Self { freqs_ghz, i, q })
    }

    /// Ideal mixer: unit gain on I, a quarter turn on Q.
    pub fn ideal(n: usize, dt_ns: f64) -> Result<Self> {
        let freqs = shifted_freqs(n, dt_ns);
        Self::from_spectrum(
            freqs,
            vec![Complex64::new(1.0, 0.0); n],
            vec![Complex64::new(0.0, 1.0); n],
        )
    }

    /// Estimate the transfer functions from step responses.
    ///
    /// Each response is smoothed, differentiated into an impulse response
    /// and transformed. The step time `smoothing.roi_start_ns` is removed
    /// from the phase and both spectra are normalized by the total I step.
    ///
    /// # Errors
    ///
    /// `InvalidShapeParameter` for mismatched or non-uniform samples, a flat
    /// I response, or a band that does not fit the sampled spectrum.
    pub fn from_step_response(
        response: &StepResponse,
        smoothing: &ResponseSmoothing,
        band: &BandLimit,
    ) -> Result<Self> {
        smoothing.validate()?;
        band.validate()?;
        let times = &response.times_ns;
        let n = times.len();
        if n < 4 || response.i.len() != n || response.q.len() != n {
            return Err(PulseError::shape(
                "response",
                format!(
                    "need at least 4 samples with matching I and Q, got {n} times, {} I, {} Q",
                    response.i.len(),
                    response.q.len()
                ),
            )
            .into());
        }
        let dt = times[1] - times[0];
        let uniform = times
            .windows(2)
            .all(|w| ((w[1] - w[0]) - dt).abs() <= 1e-6 * dt.abs());
        if !(dt > 0.0) || !uniform {
            return Err(
                PulseError::shape("response", "times must be increasing and evenly spaced").into(),
            );
        }

        let impulse = |values: &[Complex64]| -> Vec<Complex64> {
            smoothing
                .apply(values, times[0], dt)
                .windows(2)
                .map(|w| w[1] - w[0])
                .collect()
        };
        let h_i = impulse(&response.i);
        let h_q = impulse(&response.q);
        let scale: Complex64 = h_i.iter().sum();
        if scale.norm() < SINGULAR_EPS {
            return Err(PulseError::shape("response", "I response has no step").into());
        }

        // Even lengths keep the zero frequency on the grid
        let len = h_i.len() - h_i.len() % 2;
        let freqs = shifted_freqs(len, dt);
        // Impulse sample k sits at times[k + 1]
        let delay = times[0] + dt - smoothing.roi_start_ns;
        let spectrum = |h: &[Complex64]| -> Vec<Complex64> {
            fft_shifted(&h[..len])
                .into_iter()
                .zip(&freqs)
                .map(|(z, &f)| z * Complex64::from_polar(1.0, -2.0 * PI * f * delay) / scale)
                .collect()
        };
        let mut i = spectrum(&h_i);
        let mut q = spectrum(&h_q);
        band.apply(&freqs, &mut i)?;
        band.apply(&freqs, &mut q)?;

        debug!(
            points = len,
            df_ghz = freqs[1] - freqs[0],
            "Estimated I/Q transfer functions"
        );
        Self::from_spectrum(freqs, i, q)
    }

    pub fn freqs_ghz(&self) -> &[f64] {
        &self.freqs_ghz
    }

    pub fn i(&self) -> &[Complex64] {
        &self.i
    }

    pub fn q(&self) -> &[Complex64] {
        &self.q
    }

    /// Per-frequency inverse of the I/Q map.
    ///
    /// # Errors
    ///
    /// `InvalidShapeParameter` if the map is singular at any frequency.
    pub fn correction(&self) -> Result<IqCorrection> {
        let split = |spectrum: &[Complex64]| {
            let response = ifft_unshifted(spectrum);
            let re: Vec<Complex64> = response.iter().map(|z| Complex64::new(z.re, 0.0)).collect();
            let im: Vec<Complex64> = response.iter().map(|z| Complex64::new(z.im, 0.0)).collect();
            (fft_shifted(&re), fft_shifted(&im))
        };
        let (i_re, i_im) = split(&self.i);
        let (q_re, q_im) = split(&self.q);

        let n = self.freqs_ghz.len();
        let mut correction = IqCorrection {
            freqs_ghz: self.freqs_ghz.clone(),
            a: Vec::with_capacity(n),
            b: Vec::with_capacity(n),
            c: Vec::with_capacity(n),
            d: Vec::with_capacity(n),
        };
        for k in 0..n {
            let det = i_re[k] * q_im[k] - q_re[k] * i_im[k];
            if det.norm() < SINGULAR_EPS {
                return Err(PulseError::shape(
                    "transfer",
                    format!("I/Q map is singular at {:.4} GHz", self.freqs_ghz[k]),
                )
                .into());
            }
            correction.a.push(q_im[k] / det);
            correction.b.push(-q_re[k] / det);
            correction.c.push(-i_im[k] / det);
            correction.d.push(i_re[k] / det);
        }
        Ok(correction)
    }
}

/// Inverse I/Q map, applied to waveforms in the frequency domain.
#[derive(Debug, Clone, PartialEq)]
pub struct IqCorrection {
    freqs_ghz: Vec<f64>,
    a: Vec<Complex64>,
    b: Vec<Complex64>,
    c: Vec<Complex64>,
    d: Vec<Complex64>,
}

impl IqCorrection {
    /// Predistort `waveform` so the line outputs the original.
    ///
    /// The inverse is linearly interpolated onto the waveform's frequency
    /// grid and held constant beyond the measured range.
    pub fn apply(&self, waveform: &Waveform) -> Result<Waveform> {
        let axis = *waveform.axis();
        let n = axis.len;
        if n == 0 {
            return Ok(waveform.clone());
        }
        let as_complex = |values: Vec<f64>| -> Vec<Complex64> {
            values.into_iter().map(|v| Complex64::new(v, 0.0)).collect()
        };
        let s_re = fft_shifted(&as_complex(waveform.real()));
        let s_im = fft_shifted(&as_complex(waveform.imag()));
        let freqs = shifted_freqs(n, axis.dt_ns);

        let corrected: Vec<Complex64> = (0..n)
            .map(|k| {
                let f = freqs[k];
                let a = interp(&self.freqs_ghz, &self.a, f);
                let b = interp(&self.freqs_ghz, &self.b, f);
                let c = interp(&self.freqs_ghz, &self.c, f);
                let d = interp(&self.freqs_ghz, &self.d, f);
                s_re[k] * a + s_im[k] * b + Complex64::i() * (s_re[k] * c + s_im[k] * d)
            })
            .collect();
        Waveform::new(axis, Array1::from(ifft_unshifted(&corrected)))
    }
}

/// Gaussian smoothing with mirrored edges, truncated at four sigma.
///
/// `sigma` is in samples; zero returns the input.
pub fn gaussian_smooth(values: &[f64], sigma: f64) -> Vec<f64> {
    if !(sigma > 0.0) || values.is_empty() {
        return values.to_vec();
    }
    let radius = (4.0 * sigma + 0.5) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|k| (-(k * k) as f64 / (2.0 * sigma * sigma)).exp())
        .collect();
    let norm: f64 = weights.iter().sum();
    let n = values.len() as isize;
    (0..n)
        .map(|i| {
            weights
                .iter()
                .zip(-radius..=radius)
                .map(|(w, k)| w * values[reflect(i + k, n)])
                .sum::<f64>()
                / norm
        })
        .collect()
}

/// Index into `0..n` mirrored about the edges (`d c b a | a b c d | d c b a`).
fn reflect(i: isize, n: isize) -> usize {
    let m = i.rem_euclid(2 * n);
    (if m >= n { 2 * n - 1 - m } else { m }) as usize
}

fn smooth_complex(values: &[Complex64], sigma: f64) -> Vec<Complex64> {
    let re: Vec<f64> = values.iter().map(|z| z.re).collect();
    let im: Vec<f64> = values.iter().map(|z| z.im).collect();
    gaussian_smooth(&re, sigma)
        .into_iter()
        .zip(gaussian_smooth(&im, sigma))
        .map(|(r, i)| Complex64::new(r, i))
        .collect()
}

fn unit(z: Complex64) -> Complex64 {
    let norm = z.norm();
    if norm > 0.0 {
        z / norm
    } else {
        Complex64::new(1.0, 0.0)
    }
}

/// Frequencies of an `n`-point FFT at spacing `dt_ns`, zero in the middle.
pub fn shifted_freqs(n: usize, dt_ns: f64) -> Vec<f64> {
    let half = (n / 2) as f64;
    (0..n)
        .map(|j| (j as f64 - half) / (n as f64 * dt_ns))
        .collect()
}

/// Forward FFT with the zero frequency moved to the middle.
fn fft_shifted(x: &[Complex64]) -> Vec<Complex64> {
    let mut buf = x.to_vec();
    FftPlanner::<f64>::new()
        .plan_fft_forward(buf.len())
        .process(&mut buf);
    let n = buf.len();
    buf.rotate_right(n / 2);
    buf
}

/// Inverse of [`fft_shifted`], normalized.
fn ifft_unshifted(spectrum: &[Complex64]) -> Vec<Complex64> {
    let mut buf = spectrum.to_vec();
    let n = buf.len();
    buf.rotate_left(n / 2);
    FftPlanner::<f64>::new().plan_fft_inverse(n).process(&mut buf);
    let scale = 1.0 / n as f64;
    buf.iter_mut().for_each(|z| *z *= scale);
    buf
}

/// Linear interpolation, clamped to the end values.
fn interp(xs: &[f64], ys: &[Complex64], x: f64) -> Complex64 {
    let last = xs.len() - 1;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[last] {
        return ys[last];
    }
    let k = xs.partition_point(|&v| v <= x);
    let u = (x - xs[k - 1]) / (xs[k] - xs[k - 1]);
    ys[k - 1] * (1.0 - u) + ys[k] * u
}

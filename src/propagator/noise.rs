// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Classical noise on the qubit parameters.
//!
//! Each [`NoiseSource`] couples one random process to `delta`, the
//! detuning and the drive amplitude with independent weights. Noise only
//! acts when a simulation is repeated; every repetition draws a fresh
//! [`NoiseRealization`] and the Bloch components are averaged.
//!
//! - `static`: one normal draw per repetition
//! - `white`: normal samples held constant over `1 / (2 high_cutoff)`
//! - `one_over_f`: random-phase `1/sqrt(f)` spectrum on the same hold grid,
//!   optionally with a static part covering the band between the
//!   repetition rate and the inverse sequence length

use std::f64::consts::{LN_10, PI};

use num_complex::Complex64;
use rand::Rng;
use rand_distr::StandardNormal;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};
use crate::validation::validate_finite;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseModel {
    Static,
    White,
    OneOverF,
}

/// One noise process and its coupling. Amplitudes on `delta` and the
/// detuning are in GHz; the drive amplitude is a relative scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSource {
    pub model: NoiseModel,
    pub delta_amplitude: f64,
    pub detuning_amplitude: f64,
    pub drive_amplitude: f64,
    /// Sets the hold time of time-dependent noise.
    pub high_cutoff_ghz: f64,
    /// Add the low-frequency part of 1/f noise as a per-repetition offset.
    pub add_static: bool,
    pub repetition_rate_ghz: f64,
}

impl Default for NoiseSource {
    fn default() -> Self {
        Self {
            model: NoiseModel::Static,
            delta_amplitude: 0.0,
            detuning_amplitude: 0.0,
            drive_amplitude: 0.0,
            high_cutoff_ghz: 50.0,
            add_static: false,
            repetition_rate_ghz: 1e-6,
        }
    }
}

impl NoiseSource {
    pub fn validate(&self) -> Result<()> {
        validate_finite(
            "simulator.noise",
            &[
                self.delta_amplitude,
                self.detuning_amplitude,
                self.drive_amplitude,
            ],
        )?;
        if !(self.high_cutoff_ghz > 0.0 && self.high_cutoff_ghz.is_finite()) {
            return Err(ValidationError::field(
                "simulator.noise.high_cutoff_ghz",
                format!("must be positive, got {}", self.high_cutoff_ghz),
            )
            .into());
        }
        if !(self.repetition_rate_ghz > 0.0 && self.repetition_rate_ghz.is_finite()) {
            return Err(ValidationError::field(
                "simulator.noise.repetition_rate_ghz",
                format!("must be positive, got {}", self.repetition_rate_ghz),
            )
            .into());
        }
        Ok(())
    }

    /// Per-repetition offset for a sequence lasting `duration_ns`.
    ///
    /// Zero for white noise and for 1/f noise without `add_static`.
    pub fn static_sample<R: Rng + ?Sized>(&self, duration_ns: f64, rng: &mut R) -> f64 {
        match self.model {
            NoiseModel::Static => rng.sample(StandardNormal),
            NoiseModel::OneOverF if self.add_static && duration_ns > 0.0 => {
                // Integrated 1/f power from the repetition rate up to 1 / duration
                let decades = (1.0 / duration_ns).log10() - self.repetition_rate_ghz.log10();
                let scale = (LN_10 * decades.max(0.0)).sqrt();
                scale * rng.sample::<f64, _>(StandardNormal)
            }
            _ => 0.0,
        }
    }

    /// Time-dependent noise on a grid of `len` steps of `time_step_ns`.
    ///
    /// Static sources return all zeros.
    pub fn trace<R: Rng + ?Sized>(&self, len: usize, time_step_ns: f64, rng: &mut R) -> Vec<f64> {
        if self.model == NoiseModel::Static || len == 0 {
            return vec![0.0; len];
        }
        let hold = self.hold_steps(time_step_ns);
        let n_unique = len.div_ceil(hold);
        let unique: Vec<f64> = match self.model {
            NoiseModel::OneOverF => one_over_f_noise(n_unique, rng),
            _ => (0..n_unique).map(|_| rng.sample(StandardNormal)).collect(),
        };
        unique
            .iter()
            .flat_map(|&v| std::iter::repeat(v).take(hold))
            .take(len)
            .collect()
    }

    /// Simulator steps per independent noise value.
    pub fn hold_steps(&self, time_step_ns: f64) -> usize {
        let dt_noise = 0.5 / self.high_cutoff_ghz;
        ((dt_noise / time_step_ns).round() as usize).max(1)
    }
}

/// `n` samples of unit 1/f noise.
///
/// Builds a Hermitian spectrum with amplitude `1/sqrt(k)` and uniform random
/// phase on the next power of two at or above `n`, then inverse transforms.
pub fn one_over_f_noise<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<f64> {
    let n_freq = n.max(2).next_power_of_two();
    let len = 2 * n_freq;
    let mut spectrum = vec![Complex64::new(0.0, 0.0); len];
    for k in 1..=n_freq {
        let phase = 2.0 * PI * rng.gen::<f64>();
        let value = Complex64::from_polar(1.0 / (k as f64).sqrt(), phase);
        spectrum[k] = value;
        if k < n_freq {
            spectrum[len - k] = value.conj();
        }
    }

    let mut planner = FftPlanner::new();
    let ifft = planner.plan_fft_inverse(len);
    ifft.process(&mut spectrum);

    spectrum.iter().take(n).map(|c| c.re).collect()
}

/// Parameter perturbation for one repetition.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseRealization {
    pub delta_offset: f64,
    pub detuning_offset: f64,
    /// Multiplies the drive terms.
    pub drive_scale: f64,
    /// Per-step noise on `delta`, empty when there is none.
    pub delta: Vec<f64>,
    /// Per-step noise on the detuning, empty when there is none.
    pub detuning: Vec<f64>,
}

impl NoiseRealization {
    /// No perturbation.
    pub fn quiet() -> Self {
        Self {
            delta_offset: 0.0,
            detuning_offset: 0.0,
            drive_scale: 1.0,
            delta: Vec::new(),
            detuning: Vec::new(),
        }
    }

    pub fn delta_at(&self, k: usize) -> f64 {
        self.delta_offset + self.delta.get(k).copied().unwrap_or(0.0)
    }

    pub fn detuning_at(&self, k: usize) -> f64 {
        self.detuning_offset + self.detuning.get(k).copied().unwrap_or(0.0)
    }
}

/// Draw one realization per repetition.
///
/// A single repetition is always noise free.
pub fn realize<R: Rng + ?Sized>(
    sources: &[NoiseSource],
    repetitions: usize,
    len: usize,
    time_step_ns: f64,
    duration_ns: f64,
    rng: &mut R,
) -> Vec<NoiseRealization> {
    if repetitions <= 1 || sources.is_empty() {
        return vec![NoiseRealization::quiet(); repetitions.max(1)];
    }

    (0..repetitions)
        .map(|_| {
            let mut r = NoiseRealization::quiet();
            for source in sources {
                let v = source.static_sample(duration_ns, rng);
                r.delta_offset += source.delta_amplitude * v;
                r.detuning_offset += source.detuning_amplitude * v;
                r.drive_scale += source.drive_amplitude * v;
            }
            for source in sources.iter().filter(|s| s.model != NoiseModel::Static) {
                let trace = source.trace(len, time_step_ns, rng);
                accumulate(&mut r.delta, &trace, source.delta_amplitude);
                accumulate(&mut r.detuning, &trace, source.detuning_amplitude);
            }
            r
        })
        .collect()
}

fn accumulate(target: &mut Vec<f64>, trace: &[f64], amplitude: f64) {
    if amplitude == 0.0 {
        return;
    }
    if target.is_empty() {
        target.resize(trace.len(), 0.0);
    }
    for (t, v) in target.iter_mut().zip(trace) {
        *t += amplitude * v;
    }
}

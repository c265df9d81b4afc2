// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Driven-qubit simulation from I/Q baseband waveforms.
//!
//! The qubit is `H0 = 1/2 (delta sx + eps0 sz)`. In the lab frame the drive
//! modulates the detuning,
//!
//! ```text
//! eps(t) = eps0 - Omega I(t) sin(2 pi f t) + Omega Q(t) cos(2 pi f t)
//! ```
//!
//! and in the rotating-wave approximation it becomes a static problem with
//! `delta' = delta - f`, `eps_x = eps0 + Omega Q / 2`, `eps_y = -Omega I / 2`.
//! `Omega` is twice the configured Rabi amplitude, so a unit I drive on
//! resonance gives a Rabi frequency equal to `rabi_amplitude`.
//!
//! With `repetitions > 1` each run draws a fresh [`NoiseRealization`] from
//! the configured sources and the reported Bloch components are averages.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::frame::{from_eigenbasis, to_eigenbasis, to_rotating_frame};
use super::integrate::propagate_two_level;
use super::noise::{realize, NoiseRealization, NoiseSource};
use super::types::{HamiltonianTrace, StateVector};
use crate::error::{Result, ValidationError};
use crate::validation::validate_finite;
use crate::waveform::Waveform;

/// Qubit and solver parameters. Frequencies in GHz, times in ns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub delta: f64,
    pub detuning: f64,
    pub rabi_amplitude: f64,
    /// Drive frequency, or its offset from the qubit splitting when
    /// `relative_frequency` is set.
    pub drive_frequency: f64,
    pub relative_frequency: bool,
    pub rwa: bool,
    /// Report states in the frame rotating with the drive (lab-frame runs).
    pub rotating_frame: bool,
    pub time_step_ns: f64,
    pub output_step_ns: f64,
    /// Runs to average over. Noise is only applied when this exceeds one.
    pub repetitions: usize,
    pub noise: Vec<NoiseSource>,
    /// Fixed RNG seed for reproducible noise.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            delta: 5.0,
            detuning: 0.0,
            rabi_amplitude: 0.1,
            drive_frequency: 0.0,
            relative_frequency: true,
            rwa: false,
            rotating_frame: true,
            time_step_ns: 0.0005,
            output_step_ns: 0.05,
            repetitions: 1,
            noise: Vec::new(),
            seed: None,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<()> {
        validate_finite(
            "simulator",
            &[self.delta, self.detuning, self.rabi_amplitude, self.drive_frequency],
        )?;
        if !(self.time_step_ns > 0.0 && self.time_step_ns.is_finite()) {
            return Err(ValidationError::field(
                "simulator.time_step_ns",
                format!("must be positive, got {}", self.time_step_ns),
            )
            .into());
        }
        if !(self.output_step_ns > 0.0 && self.output_step_ns.is_finite()) {
            return Err(ValidationError::field(
                "simulator.output_step_ns",
                format!("must be positive, got {}", self.output_step_ns),
            )
            .into());
        }
        if self.repetitions == 0 {
            return Err(ValidationError::field("simulator.repetitions", "must be at least 1").into());
        }
        for source in &self.noise {
            source.validate()?;
        }
        Ok(())
    }

    /// Qubit splitting `sqrt(delta^2 + eps0^2)`.
    pub fn splitting(&self) -> f64 {
        (self.delta * self.delta + self.detuning * self.detuning).sqrt()
    }

    /// Absolute drive frequency.
    pub fn drive_frequency_ghz(&self) -> f64 {
        if self.relative_frequency {
            self.drive_frequency + self.splitting()
        } else {
            self.drive_frequency
        }
    }

    /// Integration steps per reported sample.
    pub fn decimation(&self) -> usize {
        if self.output_step_ns > self.time_step_ns {
            ((self.output_step_ns / self.time_step_ns).round() as usize).max(1)
        } else {
            1
        }
    }
}

/// Bloch components in the qubit eigenbasis at each output time.
///
/// `pz = +1` is the ground state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub times: Vec<f64>,
    pub pz: Vec<f64>,
    pub px: Vec<f64>,
    pub py: Vec<f64>,
    /// Actual spacing of `times`.
    pub output_step_ns: f64,
    pub max_norm_drift: f64,
}

impl SimulationResult {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Simulates a single qubit driven by a baseband waveform.
#[derive(Debug, Clone)]
pub struct DriveSimulator {
    config: SimulatorConfig,
}

impl DriveSimulator {
    pub fn new(config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Linearly resample I and Q onto the simulator grid.
    ///
    /// Returns `(times, i, q)`. The grid starts at the waveform's first
    /// sample and covers `len * dt` of the input.
    pub fn resample(&self, waveform: &Waveform) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>)> {
        let axis = waveform.axis();
        let step = self.config.time_step_ns;
        let n_sim = (axis.len as f64 * axis.dt_ns / step + 1e-9).floor() as usize;
        if n_sim == 0 {
            return Err(ValidationError::field(
                "waveform",
                format!(
                    "{} ns is shorter than one simulator step of {step} ns",
                    axis.duration_ns()
                ),
            )
            .into());
        }

        let samples = waveform.samples();
        let last = samples.len() - 1;
        let mut times = Vec::with_capacity(n_sim);
        let mut i_out = Vec::with_capacity(n_sim);
        let mut q_out = Vec::with_capacity(n_sim);
        for k in 0..n_sim {
            let u = k as f64 * step / axis.dt_ns;
            let j = (u.floor() as usize).min(last);
            let v = if j < last {
                let frac = u - j as f64;
                samples[j] * (1.0 - frac) + samples[j + 1] * frac
            } else {
                samples[last]
            };
            times.push(axis.t0_ns + k as f64 * step);
            i_out.push(v.re);
            q_out.push(v.im);
        }
        Ok((times, i_out, q_out))
    }

    /// Hamiltonian for I/Q drive sampled at `times`.
    pub fn hamiltonian(&self, times: &[f64], i: &[f64], q: &[f64]) -> Result<HamiltonianTrace> {
        self.perturbed_hamiltonian(times, i, q, &NoiseRealization::quiet())
    }

    /// Hamiltonian with `noise` added to `delta` and the detuning and the
    /// drive terms scaled by `noise.drive_scale`.
    pub fn perturbed_hamiltonian(
        &self,
        times: &[f64],
        i: &[f64],
        q: &[f64],
        noise: &NoiseRealization,
    ) -> Result<HamiltonianTrace> {
        let cfg = &self.config;
        let omega = 2.0 * cfg.rabi_amplitude * noise.drive_scale;
        let f = cfg.drive_frequency_ghz();
        let n = times.len();

        if cfg.rwa {
            let delta = (0..n).map(|k| cfg.delta - f + noise.delta_at(k)).collect();
            let detuning = q
                .iter()
                .enumerate()
                .map(|(k, &q)| cfg.detuning + noise.detuning_at(k) + 0.5 * omega * q)
                .collect();
            let y_axis = i.iter().map(|&i| -0.5 * omega * i).collect();
            HamiltonianTrace::new(delta, detuning, Some(y_axis))
        } else {
            let delta = (0..n).map(|k| cfg.delta + noise.delta_at(k)).collect();
            let detuning = times
                .iter()
                .zip(i.iter().zip(q))
                .enumerate()
                .map(|(k, (&t, (&i, &q)))| {
                    let phase = 2.0 * PI * f * t;
                    cfg.detuning + noise.detuning_at(k) - omega * i * phase.sin()
                        + omega * q * phase.cos()
                })
                .collect();
            HamiltonianTrace::new(delta, detuning, None)
        }
    }

    /// Drive the qubit, starting in its ground state, with `waveform`
    /// (real part I, imaginary part Q).
    ///
    /// Repeated runs share the waveform and differ only in their noise
    /// realization.
    pub fn simulate(&self, waveform: &Waveform) -> Result<SimulationResult> {
        let cfg = &self.config;
        let (times, i, q) = self.resample(waveform)?;
        let decimation = cfg.decimation();
        info!(
            steps = times.len(),
            decimation,
            rwa = cfg.rwa,
            repetitions = cfg.repetitions,
            noise_sources = cfg.noise.len(),
            drive_frequency_ghz = cfg.drive_frequency_ghz(),
            "Simulating driven qubit"
        );

        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let duration_ns = times.last().copied().unwrap_or(0.0);
        let realizations = realize(
            &cfg.noise,
            cfg.repetitions,
            times.len(),
            cfg.time_step_ns,
            duration_ns,
            &mut rng,
        );

        let start = from_eigenbasis(&StateVector::ground(), cfg.delta, cfg.detuning);
        let mut out_times = Vec::new();
        let mut pz: Vec<f64> = Vec::new();
        let mut px: Vec<f64> = Vec::new();
        let mut py: Vec<f64> = Vec::new();
        let mut max_norm_drift = 0.0_f64;

        for noise in &realizations {
            let trace = self.perturbed_hamiltonian(&times, &i, &q, noise)?;
            let traj = propagate_two_level(start, &times, &trace, decimation)?;
            max_norm_drift = max_norm_drift.max(traj.max_norm_drift());

            let mut states: Vec<StateVector> = traj
                .states
                .iter()
                .map(|s| to_eigenbasis(s, cfg.delta, cfg.detuning))
                .collect();
            if cfg.rotating_frame && !cfg.rwa {
                let t0 = times[0] + 0.5 * cfg.time_step_ns;
                states = to_rotating_frame(&states, &traj.times, cfg.drive_frequency_ghz(), t0)?;
            }

            if pz.is_empty() {
                pz = vec![0.0; states.len()];
                px = vec![0.0; states.len()];
                py = vec![0.0; states.len()];
                out_times = traj.times;
            }
            for (k, b) in states.iter().map(StateVector::bloch).enumerate() {
                pz[k] += b.z;
                px[k] += b.x;
                py[k] += b.y;
            }
        }

        let n_rep = realizations.len() as f64;
        for v in pz.iter_mut().chain(px.iter_mut()).chain(py.iter_mut()) {
            *v /= n_rep;
        }
        debug!(samples = pz.len(), max_norm_drift, "Simulation done");

        Ok(SimulationResult {
            times: out_times,
            pz,
            px,
            py,
            output_step_ns: cfg.time_step_ns * decimation as f64,
            max_norm_drift,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagator::noise::NoiseModel;
    use crate::waveform::TimeAxis;
    use approx::assert_relative_eq;

    fn constant_drive(i: f64, q: f64, dt: f64, len: usize) -> Waveform {
        let axis = TimeAxis::new(0.0, dt, len).unwrap();
        let samples = vec![num_complex::Complex64::new(i, q); len];
        Waveform::new(axis, samples.into()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cfg = SimulatorConfig::default();
        assert_relative_eq!(cfg.drive_frequency_ghz(), 5.0);
        assert_eq!(cfg.decimation(), 100);
        let absolute = SimulatorConfig {
            relative_frequency: false,
            drive_frequency: 4.2,
            ..cfg
        };
        assert_relative_eq!(absolute.drive_frequency_ghz(), 4.2);
    }

    #[test]
    fn test_invalid_config() {
        let cfg = SimulatorConfig {
            time_step_ns: 0.0,
            ..SimulatorConfig::default()
        };
        assert!(DriveSimulator::new(cfg).is_err());
        let cfg = SimulatorConfig {
            delta: f64::NAN,
            ..SimulatorConfig::default()
        };
        assert!(DriveSimulator::new(cfg).is_err());
    }

    #[test]
    fn test_resample_linear() {
        let cfg = SimulatorConfig {
            time_step_ns: 0.25,
            ..SimulatorConfig::default()
        };
        let sim = DriveSimulator::new(cfg).unwrap();
        let axis = TimeAxis::new(0.0, 1.0, 3).unwrap();
        let wf = Waveform::from_real(axis, &[0.0, 1.0, 3.0]).unwrap();
        let (times, i, q) = sim.resample(&wf).unwrap();
        assert_eq!(times.len(), 12);
        assert_relative_eq!(i[1], 0.25);
        assert_relative_eq!(i[6], 2.0);
        // Held at the last sample past the end
        assert_relative_eq!(i[11], 3.0);
        assert!(q.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_no_drive_stays_in_ground_state() {
        let sim = DriveSimulator::new(SimulatorConfig::default()).unwrap();
        let res = sim.simulate(&constant_drive(0.0, 0.0, 0.01, 200)).unwrap();
        for k in 0..res.len() {
            assert_relative_eq!(res.pz[k], 1.0, epsilon = 1e-10);
            assert_relative_eq!(res.px[k], 0.0, epsilon = 1e-8);
        }
        assert!(res.max_norm_drift < 1e-10);
    }

    #[test]
    fn test_rwa_pi_pulse() {
        // Unit I drive on resonance for 1 / (2 * 0.1) = 5 ns inverts the qubit
        let cfg = SimulatorConfig {
            rwa: true,
            time_step_ns: 0.001,
            ..SimulatorConfig::default()
        };
        let sim = DriveSimulator::new(cfg).unwrap();
        let res = sim.simulate(&constant_drive(1.0, 0.0, 0.001, 5001)).unwrap();
        assert_eq!(res.len(), 101);
        assert_relative_eq!(res.output_step_ns, 0.05, epsilon = 1e-12);
        assert_relative_eq!(res.pz[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(res.pz[50], 0.0, epsilon = 1e-6);
        assert_relative_eq!(*res.pz.last().unwrap(), -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_lab_frame_pi_pulse() {
        let sim = DriveSimulator::new(SimulatorConfig::default()).unwrap();
        let res = sim.simulate(&constant_drive(1.0, 0.0, 0.0005, 10_001)).unwrap();
        // Counter-rotating terms leave a small residue
        assert!(*res.pz.last().unwrap() < -0.95);
        assert!(res.max_norm_drift < 1e-9);
    }

    #[test]
    fn test_waveform_too_short() {
        let cfg = SimulatorConfig {
            time_step_ns: 1.0,
            ..SimulatorConfig::default()
        };
        let sim = DriveSimulator::new(cfg).unwrap();
        let axis = TimeAxis::new(0.0, 0.1, 2).unwrap();
        assert!(sim.simulate(&Waveform::zeros(axis)).is_err());
    }

    // ==========================================================================
    // Noise and repetitions
    // ==========================================================================

    fn rwa_config(noise: Vec<NoiseSource>, repetitions: usize, seed: u64) -> SimulatorConfig {
        SimulatorConfig {
            rwa: true,
            time_step_ns: 0.005,
            output_step_ns: 0.5,
            repetitions,
            noise,
            seed: Some(seed),
            ..SimulatorConfig::default()
        }
    }

    fn pi_pulse() -> Waveform {
        constant_drive(1.0, 0.0, 0.005, 1001)
    }

    #[test]
    fn test_same_seed_same_result() {
        let noise = vec![NoiseSource {
            model: NoiseModel::White,
            detuning_amplitude: 0.05,
            ..NoiseSource::default()
        }];
        let a = DriveSimulator::new(rwa_config(noise.clone(), 5, 42))
            .unwrap()
            .simulate(&pi_pulse())
            .unwrap();
        let b = DriveSimulator::new(rwa_config(noise.clone(), 5, 42))
            .unwrap()
            .simulate(&pi_pulse())
            .unwrap();
        assert_eq!(a, b);

        let c = DriveSimulator::new(rwa_config(noise, 5, 43))
            .unwrap()
            .simulate(&pi_pulse())
            .unwrap();
        assert_ne!(a.pz, c.pz);
    }

    #[test]
    fn test_zero_amplitude_noise_matches_clean_run() {
        let clean = DriveSimulator::new(rwa_config(Vec::new(), 1, 0))
            .unwrap()
            .simulate(&pi_pulse())
            .unwrap();
        let noise = vec![
            NoiseSource::default(),
            NoiseSource {
                model: NoiseModel::OneOverF,
                add_static: true,
                ..NoiseSource::default()
            },
        ];
        let averaged = DriveSimulator::new(rwa_config(noise, 4, 9))
            .unwrap()
            .simulate(&pi_pulse())
            .unwrap();
        assert_eq!(clean.len(), averaged.len());
        for k in 0..clean.len() {
            assert_relative_eq!(clean.pz[k], averaged.pz[k], epsilon = 1e-12);
            assert_relative_eq!(clean.py[k], averaged.py[k], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_static_drive_noise_reduces_contrast() {
        let noise = vec![NoiseSource {
            drive_amplitude: 0.2,
            ..NoiseSource::default()
        }];
        let res = DriveSimulator::new(rwa_config(noise, 20, 1))
            .unwrap()
            .simulate(&pi_pulse())
            .unwrap();
        let last = *res.pz.last().unwrap();
        // Each run over- or under-rotates, so the average never reaches -1
        assert!(last > -0.99, "pz = {last}");
        assert!(last < -0.3, "pz = {last}");
    }

    #[test]
    fn test_noise_needs_repetitions() {
        let noise = vec![NoiseSource {
            drive_amplitude: 0.5,
            ..NoiseSource::default()
        }];
        let res = DriveSimulator::new(rwa_config(noise, 1, 1))
            .unwrap()
            .simulate(&pi_pulse())
            .unwrap();
        assert_relative_eq!(*res.pz.last().unwrap(), -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_repetitions_rejected() {
        assert!(DriveSimulator::new(rwa_config(Vec::new(), 0, 0)).is_err());
    }
}

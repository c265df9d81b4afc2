// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Canonical pulse envelopes.
//!
//! Every shape is parameterized by a `width` (ns) and evaluated relative to
//! the pulse center. Envelopes are normalized to a peak of 1 at the center
//! and are exactly zero outside [`PulseShape::total_duration`].
//!
//! Ref: Motzoi et al., PRL 103, 110501 (2009) for DRAG.
//! Ref: Martinis & Geller, PRA 90, 022307 (2014) for the adiabatic CZ.

use std::f64::consts::PI;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{PulseError, Result};
use crate::waveform::{TimeAxis, Waveform};

/// Gaussian truncation in units of `width`.
pub const DEFAULT_TRUNCATION_RANGE: f64 = 5.0;

/// Gaussian edge spans this many standard deviations of its rise.
const GAUSSIAN_EDGE_SIGMAS: f64 = 3.0;

/// Samples of the CZ angle trajectory. Odd so that the midpoint is a node.
const SLEPIAN_POINTS: usize = 1001;

/// Profile of the rise and fall of a [`PulseShape::FlatTop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRounding {
    /// Straight ramp.
    Linear,
    /// Half period of a raised cosine.
    Cosine,
    /// Gaussian flank, offset and rescaled to start at 0 and end at 1.
    Gaussian,
}

impl EdgeRounding {
    /// Edge value at fraction `u` of the rise (0 = start, 1 = plateau).
    pub fn rise(self, u: f64) -> f64 {
        let u = u.clamp(0.0, 1.0);
        match self {
            EdgeRounding::Linear => u,
            EdgeRounding::Cosine => 0.5 * (1.0 - (PI * u).cos()),
            EdgeRounding::Gaussian => {
                let k = 0.5 * GAUSSIAN_EDGE_SIGMAS * GAUSSIAN_EDGE_SIGMAS;
                let floor = (-k).exp();
                let x = 1.0 - u;
                ((-k * x * x).exp() - floor) / (1.0 - floor)
            }
        }
    }
}

/// Pulse envelope family.
///
/// Gaussian widths follow the equal-area convention: `sigma = width / sqrt(2 pi)`
/// so a Gaussian has the same area as a square pulse of duration `width`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PulseShape {
    /// Gaussian, optionally split by a flat plateau.
    Gaussian {
        #[serde(default = "default_truncation_range")]
        truncation_range: f64,
        #[serde(default)]
        plateau_ns: f64,
    },
    /// Gaussian with a derivative quadrature `i * coefficient * dg/dt`.
    Drag {
        #[serde(default = "default_truncation_range")]
        truncation_range: f64,
        #[serde(default)]
        coefficient: f64,
    },
    /// Flat plateau with rise and fall of duration `width` each.
    FlatTop {
        #[serde(default)]
        plateau_ns: f64,
        #[serde(default = "default_edge")]
        edge: EdgeRounding,
    },
    /// Rectangle of length `width + plateau`.
    Square {
        #[serde(default)]
        plateau_ns: f64,
    },
    /// Raised cosine of length `width`, optionally split by a plateau.
    Cosine {
        #[serde(default)]
        plateau_ns: f64,
    },
    /// Linear rise and fall of duration `width` each around a plateau.
    Ramp {
        #[serde(default)]
        plateau_ns: f64,
    },
    /// Adiabatic flux pulse for a controlled-phase gate.
    ///
    /// The `|11>`-`|02>` mixing angle follows
    /// `theta(tau) = theta_i + sum_n lambda_n (1 - cos(2 pi n tau))`, mapped
    /// to time through `dt/dtau ~ sin(theta)`. The envelope is the detuning
    /// change `cot(theta) - cot(theta_i)` normalized to 1 at `theta_f`.
    /// `lambda_1` is fixed by the end angle; `higher_terms` are
    /// `lambda_2, lambda_3, ...`. With `net_zero` the pulse is two half-length
    /// copies of opposite sign.
    Cz {
        #[serde(default = "default_cz_coupling")]
        coupling_ghz: f64,
        /// Idle `|11>`-`|02>` detuning.
        #[serde(default = "default_cz_offset")]
        offset_ghz: f64,
        /// Detuning at the pulse maximum.
        #[serde(default)]
        final_detuning_ghz: f64,
        #[serde(default)]
        higher_terms: Vec<f64>,
        #[serde(default)]
        plateau_ns: f64,
        #[serde(default)]
        net_zero: bool,
    },
}

fn default_truncation_range() -> f64 {
    DEFAULT_TRUNCATION_RANGE
}

fn default_edge() -> EdgeRounding {
    EdgeRounding::Cosine
}

fn default_cz_coupling() -> f64 {
    0.02
}

fn default_cz_offset() -> f64 {
    0.3
}

impl Default for PulseShape {
    fn default() -> Self {
        Self::gaussian()
    }
}

impl PulseShape {
    /// Plain Gaussian with the default truncation.
    pub fn gaussian() -> Self {
        PulseShape::Gaussian {
            truncation_range: DEFAULT_TRUNCATION_RANGE,
            plateau_ns: 0.0,
        }
    }

    /// DRAG Gaussian with the default truncation.
    pub fn drag(coefficient: f64) -> Self {
        PulseShape::Drag {
            truncation_range: DEFAULT_TRUNCATION_RANGE,
            coefficient,
        }
    }

    pub fn flat_top(plateau_ns: f64, edge: EdgeRounding) -> Self {
        PulseShape::FlatTop { plateau_ns, edge }
    }

    pub fn square() -> Self {
        PulseShape::Square { plateau_ns: 0.0 }
    }

    pub fn cosine() -> Self {
        PulseShape::Cosine { plateau_ns: 0.0 }
    }

    pub fn ramp(plateau_ns: f64) -> Self {
        PulseShape::Ramp { plateau_ns }
    }

    /// Single-term CZ pulse reaching the `|11>`-`|02>` resonance.
    pub fn cz(coupling_ghz: f64, offset_ghz: f64) -> Self {
        PulseShape::Cz {
            coupling_ghz,
            offset_ghz,
            final_detuning_ghz: 0.0,
            higher_terms: Vec::new(),
            plateau_ns: 0.0,
            net_zero: false,
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            PulseShape::Gaussian { .. } => "gaussian",
            PulseShape::Drag { .. } => "drag",
            PulseShape::FlatTop { .. } => "flat_top",
            PulseShape::Square { .. } => "square",
            PulseShape::Cosine { .. } => "cosine",
            PulseShape::Ramp { .. } => "ramp",
            PulseShape::Cz { .. } => "cz",
        }
    }

    /// Same shape with its plateau replaced. `Drag` has no plateau and is
    /// returned unchanged.
    pub fn with_plateau(&self, plateau_ns: f64) -> Self {
        let mut shape = self.clone();
        match &mut shape {
            PulseShape::Gaussian { plateau_ns: p, .. }
            | PulseShape::FlatTop { plateau_ns: p, .. }
            | PulseShape::Square { plateau_ns: p }
            | PulseShape::Cosine { plateau_ns: p }
            | PulseShape::Ramp { plateau_ns: p }
            | PulseShape::Cz { plateau_ns: p, .. } => *p = plateau_ns,
            PulseShape::Drag { .. } => {}
        }
        shape
    }

    /// Time from first to last non-zero sample, in ns.
    pub fn total_duration(&self, width_ns: f64) -> f64 {
        match *self {
            PulseShape::Ramp { plateau_ns } => 2.0 * width_ns + plateau_ns,
            PulseShape::Gaussian {
                truncation_range,
                plateau_ns,
            } => truncation_range * width_ns + plateau_ns,
            PulseShape::Drag {
                truncation_range, ..
            } => truncation_range * width_ns,
            PulseShape::FlatTop { plateau_ns, .. } => 2.0 * width_ns + plateau_ns,
            PulseShape::Square { plateau_ns }
            | PulseShape::Cosine { plateau_ns }
            | PulseShape::Cz { plateau_ns, .. } => width_ns + plateau_ns,
        }
    }

    /// Check the shape parameters and `width_ns`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidShapeParameter` naming the first offending parameter.
    pub fn validate(&self, width_ns: f64) -> Result<()> {
        if !(width_ns > 0.0 && width_ns.is_finite()) {
            return Err(PulseError::shape(
                "width",
                format!("must be positive and finite, got {width_ns}"),
            )
            .into());
        }
        match self {
            &PulseShape::Gaussian {
                truncation_range,
                plateau_ns,
            } => {
                check_truncation(truncation_range)?;
                check_plateau(plateau_ns)
            }
            &PulseShape::Drag {
                truncation_range,
                coefficient,
            } => {
                check_truncation(truncation_range)?;
                if !coefficient.is_finite() {
                    return Err(PulseError::shape(
                        "coefficient",
                        format!("must be finite, got {coefficient}"),
                    )
                    .into());
                }
                Ok(())
            }
            &PulseShape::FlatTop { plateau_ns, .. }
            | &PulseShape::Square { plateau_ns }
            | &PulseShape::Cosine { plateau_ns }
            | &PulseShape::Ramp { plateau_ns } => check_plateau(plateau_ns),
            PulseShape::Cz {
                coupling_ghz,
                offset_ghz,
                final_detuning_ghz,
                higher_terms,
                plateau_ns,
                ..
            } => {
                check_plateau(*plateau_ns)?;
                if !(*coupling_ghz > 0.0 && coupling_ghz.is_finite()) {
                    return Err(PulseError::shape(
                        "coupling",
                        format!("must be positive and finite, got {coupling_ghz}"),
                    )
                    .into());
                }
                if !(*final_detuning_ghz >= 0.0 && final_detuning_ghz < offset_ghz) {
                    return Err(PulseError::shape(
                        "final_detuning",
                        format!("must lie in [0, offset = {offset_ghz}), got {final_detuning_ghz}"),
                    )
                    .into());
                }
                if !offset_ghz.is_finite() {
                    return Err(PulseError::shape(
                        "offset",
                        format!("must be finite, got {offset_ghz}"),
                    )
                    .into());
                }
                for &term in higher_terms {
                    check_finite("higher_terms", term)?;
                }
                Ok(())
            }
        }
    }

    /// Normalized envelope at offset `tau` from the pulse center.
    ///
    /// `dt_ns` is the sample period; square edges are placed half a sample
    /// late so that they fall between samples.
    pub fn envelope(&self, tau: f64, width_ns: f64, dt_ns: f64) -> Complex64 {
        match self.cz_sampler(width_ns) {
            Some(cz) => Complex64::new(cz.eval(tau), 0.0),
            None => self.analytic_envelope(tau, width_ns, dt_ns),
        }
    }

    /// Precomputed angle trajectory for [`PulseShape::Cz`], `None` for the
    /// closed-form shapes.
    fn cz_sampler(&self, width_ns: f64) -> Option<CzSampler> {
        match self {
            PulseShape::Cz {
                coupling_ghz,
                offset_ghz,
                final_detuning_ghz,
                higher_terms,
                plateau_ns,
                net_zero,
            } => {
                let (width, plateau) = if *net_zero {
                    (0.5 * width_ns, 0.5 * plateau_ns)
                } else {
                    (width_ns, *plateau_ns)
                };
                let profile = SlepianProfile::new(
                    *coupling_ghz,
                    *offset_ghz,
                    *final_detuning_ghz,
                    higher_terms,
                    width,
                    plateau,
                );
                Some(CzSampler {
                    profile,
                    half_total: 0.5 * (width_ns + plateau_ns),
                    net_zero: *net_zero,
                })
            }
            _ => None,
        }
    }

    fn analytic_envelope(&self, tau: f64, width_ns: f64, dt_ns: f64) -> Complex64 {
        let half_total = 0.5 * self.total_duration(width_ns);
        match *self {
            PulseShape::Square { .. } => {
                let x = tau - 0.5 * dt_ns;
                if x >= -half_total && x < half_total {
                    Complex64::new(1.0, 0.0)
                } else {
                    Complex64::new(0.0, 0.0)
                }
            }
            _ if tau.abs() > half_total => Complex64::new(0.0, 0.0),
            PulseShape::Gaussian { plateau_ns, .. } => {
                let sigma = equal_area_sigma(width_ns);
                let x = tau.abs() - 0.5 * plateau_ns;
                if x <= 0.0 {
                    Complex64::new(1.0, 0.0)
                } else {
                    Complex64::new((-x * x / (2.0 * sigma * sigma)).exp(), 0.0)
                }
            }
            PulseShape::Drag { coefficient, .. } => {
                let sigma = equal_area_sigma(width_ns);
                let g = (-tau * tau / (2.0 * sigma * sigma)).exp();
                let dg = -tau / (sigma * sigma) * g;
                Complex64::new(g, coefficient * dg)
            }
            PulseShape::FlatTop { plateau_ns, edge } => {
                flat_top_envelope(tau, width_ns, plateau_ns, edge)
            }
            PulseShape::Ramp { plateau_ns } => {
                flat_top_envelope(tau, width_ns, plateau_ns, EdgeRounding::Linear)
            }
            PulseShape::Cosine { plateau_ns } => {
                let x = tau.abs() - 0.5 * plateau_ns;
                if x <= 0.0 {
                    Complex64::new(1.0, 0.0)
                } else {
                    Complex64::new(0.5 * (1.0 + (2.0 * PI * x / width_ns).cos()), 0.0)
                }
            }
            PulseShape::Cz { .. } => match self.cz_sampler(width_ns) {
                Some(cz) => Complex64::new(cz.eval(tau), 0.0),
                None => Complex64::new(0.0, 0.0),
            },
        }
    }
}

fn flat_top_envelope(tau: f64, width_ns: f64, plateau_ns: f64, edge: EdgeRounding) -> Complex64 {
    let x = tau.abs() - 0.5 * plateau_ns;
    if x <= 0.0 {
        Complex64::new(1.0, 0.0)
    } else {
        Complex64::new(edge.rise(1.0 - x / width_ns), 0.0)
    }
}

/// Mixing angle against time for one CZ excursion.
#[derive(Debug, Clone)]
struct SlepianProfile {
    theta_i: f64,
    theta_f: f64,
    cot_i: f64,
    cot_span: f64,
    /// Time from the pulse start, spanning `[0, width]`.
    t: Vec<f64>,
    theta: Vec<f64>,
    width_ns: f64,
    plateau_ns: f64,
}

impl SlepianProfile {
    fn new(
        coupling_ghz: f64,
        offset_ghz: f64,
        final_detuning_ghz: f64,
        higher_terms: &[f64],
        width_ns: f64,
        plateau_ns: f64,
    ) -> Self {
        let theta_i = (2.0 * coupling_ghz).atan2(offset_ghz);
        let theta_f = (2.0 * coupling_ghz).atan2(final_detuning_ghz);

        // Odd terms all contribute 2 lambda_n at the midpoint
        let odd_sum: f64 = higher_terms.iter().skip(1).step_by(2).sum();
        let mut lambda = Vec::with_capacity(1 + higher_terms.len());
        lambda.push(0.5 * (theta_f - theta_i) - odd_sum);
        lambda.extend_from_slice(higher_terms);

        let last = (SLEPIAN_POINTS - 1) as f64;
        let theta: Vec<f64> = (0..SLEPIAN_POINTS)
            .map(|k| {
                let tau = k as f64 / last;
                theta_i
                    + lambda
                        .iter()
                        .enumerate()
                        .map(|(j, l)| l * (1.0 - (2.0 * PI * (j + 1) as f64 * tau).cos()))
                        .sum::<f64>()
            })
            .collect();

        // Cumulative trapezoid of sin(theta), rescaled to the pulse width
        let mut t = vec![0.0; SLEPIAN_POINTS];
        for k in 1..SLEPIAN_POINTS {
            t[k] = t[k - 1] + 0.5 * (theta[k - 1].sin() + theta[k].sin());
        }
        let scale = width_ns / t[SLEPIAN_POINTS - 1];
        for v in &mut t {
            *v *= scale;
        }

        let cot_i = cot(theta_i);
        Self {
            theta_i,
            theta_f,
            cot_i,
            cot_span: cot(theta_f) - cot_i,
            t,
            theta,
            width_ns,
            plateau_ns,
        }
    }

    /// Angle at offset `tau` from the excursion center.
    fn theta_at(&self, tau: f64) -> f64 {
        let half_plateau = 0.5 * self.plateau_ns;
        let u = tau + 0.5 * (self.width_ns + self.plateau_ns);
        let theta = if tau.abs() < half_plateau {
            self.theta_f
        } else if u > 0.0 && u < 0.5 * (self.width_ns + self.plateau_ns) {
            self.interp(u)
        } else if u > 0.0 && u < self.width_ns + self.plateau_ns {
            self.interp(u - self.plateau_ns)
        } else {
            self.theta_i
        };
        theta.max(self.theta_i)
    }

    fn interp(&self, x: f64) -> f64 {
        let k = self.t.partition_point(|&v| v <= x);
        if k == 0 {
            return self.theta[0];
        }
        if k >= self.t.len() {
            return self.theta[self.t.len() - 1];
        }
        let frac = (x - self.t[k - 1]) / (self.t[k] - self.t[k - 1]);
        self.theta[k - 1] + frac * (self.theta[k] - self.theta[k - 1])
    }

    fn envelope(&self, tau: f64) -> f64 {
        (cot(self.theta_at(tau)) - self.cot_i) / self.cot_span
    }
}

fn cot(theta: f64) -> f64 {
    theta.cos() / theta.sin()
}

#[derive(Debug, Clone)]
struct CzSampler {
    profile: SlepianProfile,
    half_total: f64,
    net_zero: bool,
}

impl CzSampler {
    fn eval(&self, tau: f64) -> f64 {
        if tau.abs() > self.half_total {
            return 0.0;
        }
        if self.net_zero {
            let shift = 0.5 * self.half_total;
            self.profile.envelope(tau + shift) - self.profile.envelope(tau - shift)
        } else {
            self.profile.envelope(tau)
        }
    }
}

/// Derivative correction applied on top of any XY envelope.
///
/// Adds `i * coefficient * dy/dt` (finite differences on the sample grid)
/// and then rotates by `exp(i 2 pi detuning (t - start))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DragCorrection {
    /// Derivative weight in ns.
    pub coefficient: f64,
    #[serde(default)]
    pub detuning_ghz: f64,
}

impl DragCorrection {
    pub fn new(coefficient: f64) -> Self {
        Self {
            coefficient,
            detuning_ghz: 0.0,
        }
    }

    pub fn with_detuning(mut self, detuning_ghz: f64) -> Self {
        self.detuning_ghz = detuning_ghz;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_finite("drag_coefficient", self.coefficient)?;
        check_finite("drag_detuning", self.detuning_ghz)
    }

    /// Correct `waveform`, a pulse that starts at `start_ns`.
    pub fn apply(&self, waveform: Waveform, start_ns: f64) -> Result<Waveform> {
        let axis = *waveform.axis();
        let y = waveform.into_samples();
        let n = y.len();
        let mut out = y.clone();
        if n > 1 {
            let beta = Complex64::new(0.0, self.coefficient / axis.dt_ns);
            for i in 0..n {
                let dy = match i {
                    0 => y[1] - y[0],
                    _ if i == n - 1 => y[n - 1] - y[n - 2],
                    _ => (y[i + 1] - y[i - 1]) * 0.5,
                };
                out[i] += beta * dy;
            }
        }
        if self.detuning_ghz != 0.0 {
            let omega = 2.0 * PI * self.detuning_ghz;
            for (i, z) in out.iter_mut().enumerate() {
                *z *= Complex64::from_polar(1.0, omega * (axis.time(i) - start_ns));
            }
        }
        Waveform::new(axis, out)
    }
}

/// Standard deviation giving a Gaussian the area of a `width` square pulse.
pub fn equal_area_sigma(width_ns: f64) -> f64 {
    width_ns / (2.0 * PI).sqrt()
}

fn check_truncation(truncation_range: f64) -> Result<()> {
    if !(truncation_range > 0.0 && truncation_range.is_finite()) {
        return Err(PulseError::shape(
            "truncation_range",
            format!("must be positive and finite, got {truncation_range}"),
        )
        .into());
    }
    Ok(())
}

fn check_plateau(plateau_ns: f64) -> Result<()> {
    if !(plateau_ns >= 0.0 && plateau_ns.is_finite()) {
        return Err(PulseError::shape(
            "plateau",
            format!("must be non-negative and finite, got {plateau_ns}"),
        )
        .into());
    }
    Ok(())
}

fn check_finite(parameter: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(PulseError::shape(parameter, format!("must be finite, got {value}")).into());
    }
    Ok(())
}

/// Generate a pulse on explicit sample times.
///
/// Returns `amplitude * envelope(t - center_time) * exp(i * phase)`, one
/// sample per entry of `sample_times`.
///
/// # Errors
///
/// - `InvalidShapeParameter` for a non-positive width, a non-finite
///   amplitude, phase or center, or bad shape parameters
/// - `AxisMismatch` if `sample_times` is empty, not strictly increasing,
///   or strictly increasing but unevenly spaced (relative tolerance 1e-6).
///   Uneven grids are rejected rather than resampled.
pub fn generate(
    shape: &PulseShape,
    amplitude: f64,
    center_time: f64,
    width: f64,
    phase: f64,
    sample_times: &[f64],
) -> Result<Waveform> {
    let axis = TimeAxis::from_samples(sample_times)?;
    synthesize(shape, amplitude, center_time, width, phase, &axis)
}

/// Generate a pulse on a known [`TimeAxis`].
///
/// Only samples inside the pulse support are evaluated; the rest are zero.
pub fn synthesize(
    shape: &PulseShape,
    amplitude: f64,
    center_ns: f64,
    width_ns: f64,
    phase: f64,
    axis: &TimeAxis,
) -> Result<Waveform> {
    shape.validate(width_ns)?;
    check_finite("amplitude", amplitude)?;
    check_finite("phase", phase)?;
    check_finite("center_time", center_ns)?;

    let mut wf = Waveform::zeros(*axis).into_samples();
    let rotation = Complex64::from_polar(1.0, phase) * amplitude;
    let half = 0.5 * shape.total_duration(width_ns) + axis.dt_ns;
    let (lo, hi) = axis.index_range(center_ns - half, center_ns + half);
    let cz = shape.cz_sampler(width_ns);
    for i in lo..hi {
        let tau = axis.time(i) - center_ns;
        let env = match &cz {
            Some(cz) => Complex64::new(cz.eval(tau), 0.0),
            None => shape.analytic_envelope(tau, width_ns, axis.dt_ns),
        };
        wf[i] = rotation * env;
    }
    Waveform::new(*axis, wf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use approx::assert_relative_eq;

    fn grid(dt: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 * dt).collect()
    }

    fn all_shapes() -> Vec<PulseShape> {
        vec![
            PulseShape::gaussian(),
            PulseShape::Gaussian {
                truncation_range: 4.0,
                plateau_ns: 6.0,
            },
            PulseShape::drag(0.5),
            PulseShape::flat_top(8.0, EdgeRounding::Linear),
            PulseShape::flat_top(8.0, EdgeRounding::Cosine),
            PulseShape::flat_top(8.0, EdgeRounding::Gaussian),
            PulseShape::square(),
            PulseShape::Square { plateau_ns: 4.0 },
            PulseShape::cosine(),
            PulseShape::Cosine { plateau_ns: 5.0 },
            PulseShape::ramp(0.0),
            PulseShape::ramp(6.0),
        ]
    }

    fn cz_shape(plateau_ns: f64, net_zero: bool) -> PulseShape {
        PulseShape::Cz {
            coupling_ghz: 0.02,
            offset_ghz: 0.3,
            final_detuning_ghz: 0.0,
            higher_terms: Vec::new(),
            plateau_ns,
            net_zero,
        }
    }

    // =========================================================================
    // Length and peak amplitude
    // =========================================================================

    #[test]
    fn test_sample_count_matches_times() {
        let times = grid(0.5, 201);
        for shape in all_shapes() {
            let wf = generate(&shape, 0.8, 50.0, 10.0, 0.0, &times).unwrap();
            assert_eq!(wf.len(), times.len(), "shape {}", shape.name());
        }
    }

    #[test]
    fn test_peak_equals_amplitude() {
        let times = grid(0.5, 201);
        for shape in all_shapes() {
            let wf = generate(&shape, 0.8, 50.0, 10.0, 0.3, &times).unwrap();
            assert_relative_eq!(wf.peak_amplitude(), 0.8, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_outside_total_duration() {
        let times = grid(0.5, 401);
        for shape in all_shapes() {
            let wf = generate(&shape, 1.0, 100.0, 10.0, 0.0, &times).unwrap();
            let half = 0.5 * shape.total_duration(10.0);
            for (t, z) in times.iter().zip(wf.samples().iter()) {
                if (t - 100.0).abs() > half + 0.5 {
                    assert_eq!(z.norm(), 0.0, "shape {} at t={}", shape.name(), t);
                }
            }
        }
    }

    // =========================================================================
    // Shape details
    // =========================================================================

    #[test]
    fn test_gaussian_equal_area() {
        let dt = 0.01;
        let times = grid(dt, 10_001);
        let wf = generate(&PulseShape::gaussian(), 0.5, 50.0, 8.0, 0.0, &times).unwrap();
        let area: f64 = wf.real().iter().sum::<f64>() * dt;
        assert_relative_eq!(area, 0.5 * 8.0, max_relative = 1e-6);
    }

    #[test]
    fn test_gaussian_total_duration() {
        let shape = PulseShape::Gaussian {
            truncation_range: 5.0,
            plateau_ns: 20.0,
        };
        assert_relative_eq!(shape.total_duration(10.0), 70.0);
        assert_relative_eq!(PulseShape::flat_top(3.0, EdgeRounding::Linear).total_duration(4.0), 11.0);
        assert_relative_eq!(PulseShape::square().total_duration(4.0), 4.0);
    }

    #[test]
    fn test_drag_quadrature_is_derivative() {
        let width = 10.0;
        let coeff = 0.7;
        let sigma = equal_area_sigma(width);
        let z = PulseShape::drag(coeff).envelope(sigma, width, 0.1);
        let g = (-0.5f64).exp();
        assert_relative_eq!(z.re, g, epsilon = 1e-12);
        assert_relative_eq!(z.im, -coeff * g / sigma, epsilon = 1e-12);
        // antisymmetric quadrature
        let z_neg = PulseShape::drag(coeff).envelope(-sigma, width, 0.1);
        assert_relative_eq!(z_neg.im, -z.im, epsilon = 1e-12);
    }

    #[test]
    fn test_square_edges_between_samples() {
        // 4 ns square on a 1 ns grid covers exactly 4 samples, window
        // [8.5, 12.5) after the half-sample shift
        let times = grid(1.0, 20);
        let wf = generate(&PulseShape::square(), 1.0, 10.0, 4.0, 0.0, &times).unwrap();
        let on: Vec<usize> = wf
            .samples()
            .iter()
            .enumerate()
            .filter(|(_, z)| z.norm() > 0.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(on, vec![9, 10, 11, 12]);
    }

    #[test]
    fn test_flat_top_edges() {
        for edge in [EdgeRounding::Linear, EdgeRounding::Cosine, EdgeRounding::Gaussian] {
            assert_relative_eq!(edge.rise(0.0), 0.0, epsilon = 1e-12);
            assert_relative_eq!(edge.rise(1.0), 1.0, epsilon = 1e-12);
            assert!(edge.rise(0.25) < edge.rise(0.75));
        }
        assert_relative_eq!(EdgeRounding::Cosine.rise(0.5), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_cosine_half_point() {
        let z = PulseShape::cosine().envelope(2.5, 10.0, 0.1);
        assert_relative_eq!(z.re, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_phase_rotates_into_quadrature() {
        let times = grid(0.5, 101);
        let wf = generate(&PulseShape::gaussian(), 0.4, 25.0, 5.0, PI / 2.0, &times).unwrap();
        let center = wf.samples()[50];
        assert_relative_eq!(center.re, 0.0, epsilon = 1e-12);
        assert_relative_eq!(center.im, 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_with_plateau() {
        let shape = PulseShape::cosine().with_plateau(30.0);
        assert_relative_eq!(shape.total_duration(20.0), 50.0);
        let cz = cz_shape(0.0, true).with_plateau(8.0);
        assert!(matches!(cz, PulseShape::Cz { plateau_ns, net_zero: true, .. } if plateau_ns == 8.0));
        assert_eq!(PulseShape::drag(0.3).with_plateau(5.0), PulseShape::drag(0.3));
    }

    #[test]
    fn test_ramp_area_and_endpoints() {
        let dt = 0.01;
        let times = grid(dt, 10_001);
        let shape = PulseShape::ramp(10.0);
        assert_relative_eq!(shape.total_duration(5.0), 20.0);
        let wf = generate(&shape, 0.4, 50.0, 5.0, 0.0, &times).unwrap();
        // Two triangles of width 5 plus the plateau: area = amplitude * (width + plateau)
        let area: f64 = wf.real().iter().sum::<f64>() * dt;
        assert_relative_eq!(area, 0.4 * 15.0, max_relative = 1e-6);
        assert_relative_eq!(shape.envelope(-10.0, 5.0, dt).re, 0.0, epsilon = 1e-12);
        assert_relative_eq!(shape.envelope(-7.5, 5.0, dt).re, 0.5, epsilon = 1e-12);
        assert_relative_eq!(shape.envelope(4.0, 5.0, dt).re, 1.0, epsilon = 1e-12);
    }

    // =========================================================================
    // Controlled-phase flux pulse
    // =========================================================================

    #[test]
    fn test_cz_endpoints_and_peak() {
        let shape = cz_shape(0.0, false);
        let width = 40.0;
        assert_relative_eq!(shape.total_duration(width), 40.0);
        assert_relative_eq!(shape.envelope(-20.0, width, 0.1).re, 0.0, epsilon = 1e-9);
        assert_relative_eq!(shape.envelope(20.0, width, 0.1).re, 0.0, epsilon = 1e-9);
        assert_relative_eq!(shape.envelope(0.0, width, 0.1).re, 1.0, epsilon = 1e-3);
        // Rises monotonically to the center
        let rise: Vec<f64> = (0..=20)
            .map(|k| shape.envelope(-20.0 + k as f64, width, 0.1).re)
            .collect();
        assert!(rise.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_cz_is_symmetric() {
        let shape = cz_shape(0.0, false);
        for tau in [1.0, 5.0, 12.5, 19.0] {
            assert_relative_eq!(
                shape.envelope(-tau, 40.0, 0.1).re,
                shape.envelope(tau, 40.0, 0.1).re,
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn test_cz_plateau_holds_final_angle() {
        let shape = cz_shape(10.0, false);
        assert_relative_eq!(shape.total_duration(30.0), 40.0);
        for tau in [-4.0, 0.0, 4.5] {
            assert_relative_eq!(shape.envelope(tau, 30.0, 0.1).re, 1.0, epsilon = 1e-12);
        }
        assert!(shape.envelope(10.0, 30.0, 0.1).re < 1.0);
        assert_relative_eq!(shape.envelope(20.0, 30.0, 0.1).re, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cz_net_zero_area() {
        let dt = 0.05;
        let times = grid(dt, 2001);
        let shape = cz_shape(4.0, true);
        let wf = generate(&shape, 0.3, 50.0, 40.0, 0.0, &times).unwrap();
        let re = wf.real();
        let area: f64 = re.iter().sum::<f64>() * dt;
        assert_relative_eq!(area, 0.0, epsilon = 1e-9);
        // Positive lobe first, negative second, both reaching the amplitude
        let max = re.iter().cloned().fold(f64::MIN, f64::max);
        let min = re.iter().cloned().fold(f64::MAX, f64::min);
        assert_relative_eq!(max, 0.3, max_relative = 1e-3);
        assert_relative_eq!(min, -0.3, max_relative = 1e-3);
        assert!(re[(40.0 / dt) as usize] > 0.0);
        assert!(re[(60.0 / dt) as usize] < 0.0);
        // Zero at both ends and at the midpoint between the lobes
        assert_relative_eq!(re[(28.0 / dt) as usize], 0.0, epsilon = 1e-12);
        assert_relative_eq!(re[(50.0 / dt) as usize], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cz_higher_terms_keep_end_angle() {
        let shape = PulseShape::Cz {
            coupling_ghz: 0.02,
            offset_ghz: 0.3,
            final_detuning_ghz: 0.05,
            higher_terms: vec![0.0, 0.03],
            plateau_ns: 0.0,
            net_zero: false,
        };
        assert!(shape.validate(40.0).is_ok());
        assert_relative_eq!(shape.envelope(0.0, 40.0, 0.1).re, 1.0, epsilon = 1e-3);
        assert_relative_eq!(shape.envelope(-20.0, 40.0, 0.1).re, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cz_rejects_final_beyond_offset() {
        let mut shape = cz_shape(0.0, false);
        if let PulseShape::Cz {
            final_detuning_ghz, ..
        } = &mut shape
        {
            *final_detuning_ghz = 0.4;
        }
        let err = shape.validate(40.0).unwrap_err();
        assert!(err.to_string().contains("final_detuning"));
    }

    // =========================================================================
    // DRAG correction on arbitrary envelopes
    // =========================================================================

    #[test]
    fn test_drag_correction_matches_analytic_gaussian() {
        let axis = TimeAxis::new(0.0, 0.01, 5001).unwrap();
        let plain = synthesize(&PulseShape::gaussian(), 0.5, 25.0, 8.0, 0.0, &axis).unwrap();
        let analytic = synthesize(&PulseShape::drag(0.6), 0.5, 25.0, 8.0, 0.0, &axis).unwrap();
        let corrected = DragCorrection::new(0.6).apply(plain, 5.0).unwrap();
        for (a, b) in corrected.samples().iter().zip(analytic.samples().iter()).skip(1000).take(3000) {
            assert_relative_eq!(a.re, b.re, epsilon = 1e-12);
            assert_relative_eq!(a.im, b.im, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_drag_correction_on_cosine() {
        let axis = TimeAxis::new(0.0, 0.1, 201).unwrap();
        let wf = synthesize(&PulseShape::cosine(), 1.0, 10.0, 10.0, 0.0, &axis).unwrap();
        let corrected = DragCorrection::new(1.0).apply(wf, 5.0).unwrap();
        let s = corrected.samples();
        // Rising edge pushes +Q, falling edge -Q, the top is flat
        assert!(s[75].im > 0.0);
        assert!(s[125].im < 0.0);
        assert_relative_eq!(s[100].im, 0.0, epsilon = 1e-12);
        // d/dt of 1/2 (1 + cos(2 pi x / 10)) at x = -2.5 is pi / 10
        assert_relative_eq!(s[75].im, PI / 10.0, max_relative = 1e-3);
    }

    #[test]
    fn test_drag_detuning_rotates_from_start() {
        let axis = TimeAxis::new(0.0, 0.5, 41).unwrap();
        let wf = synthesize(&PulseShape::square(), 1.0, 10.0, 20.0, 0.0, &axis).unwrap();
        let corrected = DragCorrection::new(0.0)
            .with_detuning(0.05)
            .apply(wf.clone(), 0.0)
            .unwrap();
        for (a, b) in corrected.samples().iter().zip(wf.samples().iter()) {
            assert_relative_eq!(a.norm(), b.norm(), epsilon = 1e-12);
        }
        // 2 pi * 0.05 * 5 = pi / 2
        assert_relative_eq!(corrected.samples()[10].im, 1.0, epsilon = 1e-12);
    }

    // =========================================================================
    // Parameter errors
    // =========================================================================

    #[test]
    fn test_rejects_bad_width() {
        let times = grid(1.0, 10);
        for width in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = generate(&PulseShape::gaussian(), 1.0, 5.0, width, 0.0, &times).unwrap_err();
            assert!(matches!(
                err,
                Error::Pulse(PulseError::InvalidShapeParameter { ref parameter, .. }) if parameter == "width"
            ));
        }
    }

    #[test]
    fn test_rejects_non_finite_amplitude() {
        let times = grid(1.0, 10);
        let err = generate(&PulseShape::square(), f64::NAN, 5.0, 2.0, 0.0, &times).unwrap_err();
        assert!(err.to_string().contains("amplitude"));
    }

    #[test]
    fn test_rejects_negative_plateau() {
        let times = grid(1.0, 10);
        let shape = PulseShape::Cosine { plateau_ns: -2.0 };
        let err = generate(&shape, 1.0, 5.0, 2.0, 0.0, &times).unwrap_err();
        assert!(err.to_string().contains("plateau"));
    }

    #[test]
    fn test_rejects_nonuniform_times() {
        let err = generate(&PulseShape::gaussian(), 1.0, 1.0, 1.0, 0.0, &[0.0, 1.0, 3.0]).unwrap_err();
        assert!(matches!(err, Error::Pulse(PulseError::AxisMismatch(_))));
        // Strictly increasing is not enough, the spacing must be uniform
        let uneven = [0.0, 0.5, 1.0, 1.6, 2.0];
        let err = generate(&PulseShape::square(), 1.0, 1.0, 1.0, 0.0, &uneven).unwrap_err();
        assert!(matches!(err, Error::Pulse(PulseError::AxisMismatch(_))));
    }

    #[test]
    fn test_shape_serde_tagged() {
        let yaml = "type: drag\ncoefficient: 0.25\n";
        let shape: PulseShape = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(shape, PulseShape::drag(0.25));

        let yaml = "type: cz\nnet_zero: true\nhigher_terms: [0.01]\n";
        let shape: PulseShape = serde_yaml::from_str(yaml).unwrap();
        match shape {
            PulseShape::Cz {
                coupling_ghz,
                net_zero,
                ref higher_terms,
                ..
            } => {
                assert_relative_eq!(coupling_ghz, 0.02);
                assert!(net_zero);
                assert_eq!(higher_terms, &vec![0.01]);
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }
}

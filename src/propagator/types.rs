// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Types for two-level propagation.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{PulseError, Result, ValidationError};
use crate::validation::{validate_decimation, validate_finite};

/// Amplitudes `(psi0, psi1)` of a two-level state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    pub psi0: Complex64,
    pub psi1: Complex64,
}

/// Expectation values of the Pauli operators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlochVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl StateVector {
    /// Normalized state proportional to `(psi0, psi1)`.
    ///
    /// # Errors
    ///
    /// `Validation` if the amplitudes are non-finite or both zero.
    pub fn new(psi0: Complex64, psi1: Complex64) -> Result<Self> {
        let norm = (psi0.norm_sqr() + psi1.norm_sqr()).sqrt();
        if !norm.is_finite() || norm == 0.0 {
            return Err(ValidationError::field(
                "state",
                format!("cannot normalize ({psi0}, {psi1})"),
            )
            .into());
        }
        Ok(Self {
            psi0: psi0 / norm,
            psi1: psi1 / norm,
        })
    }

    /// `(1, 0)`
    pub fn ground() -> Self {
        Self {
            psi0: Complex64::new(1.0, 0.0),
            psi1: Complex64::new(0.0, 0.0),
        }
    }

    /// `(0, 1)`
    pub fn excited() -> Self {
        Self {
            psi0: Complex64::new(0.0, 0.0),
            psi1: Complex64::new(1.0, 0.0),
        }
    }

    /// Build without normalizing. Used for propagated states.
    pub(crate) fn from_amplitudes(psi0: Complex64, psi1: Complex64) -> Self {
        Self { psi0, psi1 }
    }

    pub fn norm(&self) -> f64 {
        (self.psi0.norm_sqr() + self.psi1.norm_sqr()).sqrt()
    }

    /// Probability of finding the state in `|1>`.
    pub fn excited_population(&self) -> f64 {
        self.psi1.norm_sqr()
    }

    /// `<sigma_x>`, `<sigma_y>`, `<sigma_z>`.
    pub fn bloch(&self) -> BlochVector {
        let coherence = self.psi0.conj() * self.psi1;
        BlochVector {
            x: 2.0 * coherence.re,
            y: 2.0 * coherence.im,
            z: self.psi0.norm_sqr() - self.psi1.norm_sqr(),
        }
    }
}

/// Sampled Hamiltonian `H = 1/2 (delta sx + y_axis sy + detuning sz)`.
///
/// All arrays share one time axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HamiltonianTrace {
    delta: Vec<f64>,
    detuning: Vec<f64>,
    y_axis: Option<Vec<f64>>,
}

impl HamiltonianTrace {
    /// # Errors
    ///
    /// - `AxisMismatch` if the arrays differ in length
    /// - `Validation` if any entry is non-finite
    pub fn new(delta: Vec<f64>, detuning: Vec<f64>, y_axis: Option<Vec<f64>>) -> Result<Self> {
        if delta.len() != detuning.len() {
            return Err(PulseError::AxisMismatch(format!(
                "delta has {} samples, detuning has {}",
                delta.len(),
                detuning.len()
            ))
            .into());
        }
        if let Some(y) = &y_axis {
            if y.len() != delta.len() {
                return Err(PulseError::AxisMismatch(format!(
                    "delta has {} samples, y_axis has {}",
                    delta.len(),
                    y.len()
                ))
                .into());
            }
            validate_finite("y_axis", y)?;
        }
        validate_finite("delta", &delta)?;
        validate_finite("detuning", &detuning)?;
        Ok(Self {
            delta,
            detuning,
            y_axis,
        })
    }

    /// Time-independent Hamiltonian repeated `len` times.
    pub fn constant(delta: f64, detuning: f64, len: usize) -> Result<Self> {
        Self::new(vec![delta; len], vec![detuning; len], None)
    }

    pub fn len(&self) -> usize {
        self.delta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delta.is_empty()
    }

    pub fn delta(&self) -> &[f64] {
        &self.delta
    }

    pub fn detuning(&self) -> &[f64] {
        &self.detuning
    }

    pub fn y_axis(&self) -> Option<&[f64]> {
        self.y_axis.as_deref()
    }

    /// `(delta, detuning, y)` at sample `i`; `y` is 0 without a y axis.
    pub fn at(&self, i: usize) -> (f64, f64, f64) {
        let y = self.y_axis.as_ref().map_or(0.0, |y| y[i]);
        (self.delta[i], self.detuning[i], y)
    }
}

/// States on a time grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub states: Vec<StateVector>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn final_state(&self) -> Option<&StateVector> {
        self.states.last()
    }

    /// Keep samples `0, factor, 2*factor, ...`.
    pub fn decimate(&self, factor: usize) -> Result<Trajectory> {
        validate_decimation(factor)?;
        Ok(Trajectory {
            times: self.times.iter().step_by(factor).copied().collect(),
            states: self.states.iter().step_by(factor).copied().collect(),
        })
    }

    /// Largest `| |psi| - 1 |` along the trajectory.
    pub fn max_norm_drift(&self) -> f64 {
        self.states
            .iter()
            .map(|s| (s.norm() - 1.0).abs())
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_state_normalized_on_creation() {
        let s = StateVector::new(Complex64::new(3.0, 0.0), Complex64::new(0.0, 4.0)).unwrap();
        assert_relative_eq!(s.norm(), 1.0, epsilon = 1e-15);
        assert_relative_eq!(s.excited_population(), 0.64, epsilon = 1e-15);
        assert!(StateVector::new(Complex64::new(0.0, 0.0), Complex64::new(0.0, 0.0)).is_err());
        assert!(StateVector::new(Complex64::new(f64::NAN, 0.0), Complex64::new(1.0, 0.0)).is_err());
    }

    #[test]
    fn test_bloch_poles_and_equator() {
        let g = StateVector::ground().bloch();
        assert_relative_eq!(g.z, 1.0);
        let e = StateVector::excited().bloch();
        assert_relative_eq!(e.z, -1.0);

        let plus = StateVector::new(Complex64::new(1.0, 0.0), Complex64::new(1.0, 0.0)).unwrap();
        let b = plus.bloch();
        assert_relative_eq!(b.x, 1.0, epsilon = 1e-15);
        assert_relative_eq!(b.y, 0.0, epsilon = 1e-15);
        assert_relative_eq!(b.z, 0.0, epsilon = 1e-15);

        let plus_i = StateVector::new(Complex64::new(1.0, 0.0), Complex64::new(0.0, 1.0)).unwrap();
        assert_relative_eq!(plus_i.bloch().y, 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_trace_length_mismatch() {
        let err = HamiltonianTrace::new(vec![1.0; 3], vec![0.0; 2], None).unwrap_err();
        assert!(err.to_string().contains("Time axis mismatch"));
        assert!(HamiltonianTrace::new(vec![1.0; 3], vec![0.0; 3], Some(vec![0.0; 4])).is_err());
    }

    #[test]
    fn test_trace_rejects_nan() {
        assert!(HamiltonianTrace::new(vec![1.0, f64::NAN], vec![0.0; 2], None).is_err());
    }

    #[test]
    fn test_trace_at() {
        let t = HamiltonianTrace::new(vec![1.0, 2.0], vec![3.0, 4.0], Some(vec![5.0, 6.0])).unwrap();
        assert_eq!(t.at(1), (2.0, 4.0, 6.0));
        let t = HamiltonianTrace::constant(1.0, 0.5, 4).unwrap();
        assert_eq!(t.at(3), (1.0, 0.5, 0.0));
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn test_decimate() {
        let traj = Trajectory {
            times: (0..7).map(|i| i as f64).collect(),
            states: vec![StateVector::ground(); 7],
        };
        let d = traj.decimate(3).unwrap();
        assert_eq!(d.times, vec![0.0, 3.0, 6.0]);
        assert_eq!(d.len(), 3);
        assert!(traj.decimate(0).is_err());

        let five = Trajectory {
            times: (0..5).map(|i| i as f64).collect(),
            states: vec![StateVector::ground(); 5],
        };
        assert_eq!(five.decimate(2).unwrap().times, vec![0.0, 2.0, 4.0]);
        assert_eq!(traj.decimate(1).unwrap(), traj);
    }
}

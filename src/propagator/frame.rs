// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Basis and frame changes.

use std::f64::consts::PI;

use num_complex::Complex64;

use super::types::StateVector;
use crate::error::{PulseError, Result};

/// Move states into the frame rotating at `drive_frequency`.
///
/// `psi0 -> psi0 exp(-i pi f (t - t0))`, `psi1 -> psi1 exp(+i pi f (t - t0))`.
/// At resonance this removes free precession between the eigenstates.
///
/// # Errors
///
/// `AxisMismatch` if `states` and `time_samples` differ in length.
pub fn to_rotating_frame(
    states: &[StateVector],
    time_samples: &[f64],
    drive_frequency: f64,
    time_zero: f64,
) -> Result<Vec<StateVector>> {
    if states.len() != time_samples.len() {
        return Err(PulseError::AxisMismatch(format!(
            "{} states but {} time samples",
            states.len(),
            time_samples.len()
        ))
        .into());
    }
    Ok(states
        .iter()
        .zip(time_samples)
        .map(|(s, &t)| {
            let rot = Complex64::from_polar(1.0, -PI * drive_frequency * (t - time_zero));
            StateVector::from_amplitudes(s.psi0 * rot, s.psi1 * rot.conj())
        })
        .collect())
}

/// Half-angle cosine and sine of the mixing angle of `(delta, detuning)`.
fn mixing(delta: f64, detuning: f64) -> (f64, f64) {
    let half = 0.5 * delta.atan2(detuning);
    (half.cos(), half.sin())
}

/// Express `state` in the eigenbasis of `1/2 (delta sx + detuning sz)`.
///
/// Component 0 is the amplitude on the lower eigenstate. For
/// `delta = detuning = 0` the basis is ordered as `(|1>, |0>)`.
pub fn to_eigenbasis(state: &StateVector, delta: f64, detuning: f64) -> StateVector {
    // Eigenvector matrix [[-s, c], [c, s]] is symmetric and its own inverse
    let (c, s) = mixing(delta, detuning);
    StateVector::from_amplitudes(
        -s * state.psi0 + c * state.psi1,
        c * state.psi0 + s * state.psi1,
    )
}

/// Inverse of [`to_eigenbasis`].
pub fn from_eigenbasis(state: &StateVector, delta: f64, detuning: f64) -> StateVector {
    to_eigenbasis(state, delta, detuning)
}

// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Closed-form propagation of a two-level system.
//!
//! Over each step the Hamiltonian is held at its value on the left sample,
//! `H = 1/2 (delta sx + y sy + eps sz)`. Since `H^2 = E^2 I` with
//! `E = 1/2 sqrt(delta^2 + eps^2 + y^2)`, the step propagator is exact:
//!
//! ```text
//! U = exp(-i 2 pi H dt) = cos(theta) I - i (sin(theta) / E) H,   theta = 2 pi E dt
//! ```
//!
//! `sin(theta) / E` has a removable singularity at `E = 0`, where it tends
//! to `2 pi dt`.

use num_complex::Complex64;
use tracing::debug;

use super::types::{HamiltonianTrace, StateVector, Trajectory};
use crate::error::{PulseError, Result};
use crate::validation::{validate_decimation, validate_time_samples};

/// Below this rotation angle the small-angle limit of `sin(theta)/E` is used.
pub const SMALL_ANGLE: f64 = 1e-8;

/// 2x2 complex matrix, row-major.
pub type Unitary = [[Complex64; 2]; 2];

/// Propagator for one step of length `dt` under a constant Hamiltonian.
pub fn step_unitary(delta: f64, detuning: f64, y_axis: f64, dt: f64) -> Unitary {
    let energy = 0.5 * (delta * delta + detuning * detuning + y_axis * y_axis).sqrt();
    let theta = 2.0 * std::f64::consts::PI * energy * dt;
    let c = theta.cos();
    let s = if theta.abs() < SMALL_ANGLE {
        2.0 * std::f64::consts::PI * dt
    } else {
        theta.sin() / energy
    };

    let i = Complex64::i();
    [
        [
            c - i * (0.5 * s * detuning),
            -i * (0.5 * s * delta) - 0.5 * s * y_axis,
        ],
        [
            -i * (0.5 * s * delta) + 0.5 * s * y_axis,
            c + i * (0.5 * s * detuning),
        ],
    ]
}

/// `u * state`
pub fn apply_unitary(u: &Unitary, state: &StateVector) -> StateVector {
    StateVector::from_amplitudes(
        u[0][0] * state.psi0 + u[0][1] * state.psi1,
        u[1][0] * state.psi0 + u[1][1] * state.psi1,
    )
}

/// Propagate `start` through the sampled Hamiltonian.
///
/// Step `i` runs from `time_samples[i]` to `time_samples[i + 1]` under the
/// Hamiltonian at sample `i`, so the last sample's Hamiltonian is unused.
/// Steps need not be uniform. The state is never renormalized; norm drift
/// is a diagnostic of the input.
///
/// Returns the states at samples `0, decimation, 2 * decimation, ...`.
///
/// # Errors
///
/// - `AxisMismatch` if `trace` and `time_samples` differ in length
/// - `Validation` if `decimation` is 0 or `time_samples` is empty,
///   non-finite or not strictly increasing
pub fn propagate_two_level(
    start: StateVector,
    time_samples: &[f64],
    trace: &HamiltonianTrace,
    decimation: usize,
) -> Result<Trajectory> {
    validate_decimation(decimation)?;
    validate_time_samples("time_samples", time_samples)?;
    if trace.len() != time_samples.len() {
        return Err(PulseError::AxisMismatch(format!(
            "{} time samples but Hamiltonian trace has {}",
            time_samples.len(),
            trace.len()
        ))
        .into());
    }

    let n_out = (time_samples.len() - 1) / decimation + 1;
    let mut times = Vec::with_capacity(n_out);
    let mut states = Vec::with_capacity(n_out);
    times.push(time_samples[0]);
    states.push(start);

    let mut state = start;
    for i in 0..time_samples.len() - 1 {
        let (delta, detuning, y) = trace.at(i);
        let dt = time_samples[i + 1] - time_samples[i];
        state = apply_unitary(&step_unitary(delta, detuning, y, dt), &state);
        if (i + 1) % decimation == 0 {
            times.push(time_samples[i + 1]);
            states.push(state);
        }
    }

    debug!(
        steps = time_samples.len() - 1,
        stored = states.len(),
        decimation,
        "Propagated two-level state"
    );
    Ok(Trajectory { times, states })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::f64::consts::PI;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn assert_state(s: &StateVector, psi0: Complex64, psi1: Complex64, tol: f64) {
        assert!((s.psi0 - psi0).norm() < tol, "psi0 = {}, expected {}", s.psi0, psi0);
        assert!((s.psi1 - psi1).norm() < tol, "psi1 = {}, expected {}", s.psi1, psi1);
    }

    // =========================================================================
    // Concrete scenarios
    // =========================================================================

    #[test]
    fn test_half_flip_under_delta() {
        let trace = HamiltonianTrace::constant(1.0, 0.0, 3).unwrap();
        let traj = propagate_two_level(StateVector::ground(), &[0.0, 0.25, 0.5], &trace, 1).unwrap();
        assert_eq!(traj.len(), 3);
        assert_state(&traj.states[2], c(0.0, 0.0), c(0.0, -1.0), 1e-12);
    }

    #[test]
    fn test_constant_delta_closed_form() {
        let n = 201;
        let times: Vec<f64> = (0..n).map(|i| i as f64 * 0.01).collect();
        let trace = HamiltonianTrace::constant(0.7, 0.0, n).unwrap();
        let traj = propagate_two_level(StateVector::ground(), &times, &trace, 1).unwrap();
        for (t, s) in traj.times.iter().zip(&traj.states) {
            let phase = PI * 0.7 * t;
            assert_state(s, c(phase.cos(), 0.0), c(0.0, -phase.sin()), 1e-12);
        }
    }

    #[test]
    fn test_zero_energy_is_identity() {
        let trace = HamiltonianTrace::constant(0.0, 0.0, 4).unwrap();
        let start = StateVector::new(c(0.6, 0.0), c(0.0, 0.8)).unwrap();
        let traj = propagate_two_level(start, &[0.0, 1.0, 2.0, 3.0], &trace, 1).unwrap();
        for s in &traj.states {
            assert_state(s, start.psi0, start.psi1, 1e-15);
            assert!(s.psi0.is_finite() && s.psi1.is_finite());
        }
    }

    #[test]
    fn test_small_angle_limit_continuous() {
        // Just below and above the threshold give nearly the same propagator
        let dt = 1.0;
        let below = step_unitary(0.9e-8 / PI, 0.0, 0.0, dt);
        let above = step_unitary(1.1e-8 / PI, 0.0, 0.0, dt);
        assert!((below[0][1] - above[0][1]).norm() < 1e-8);
        assert_relative_eq!(below[0][0].re, 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_detuning_phase() {
        // Pure sz: |0> picks up exp(-i pi eps t)
        let trace = HamiltonianTrace::constant(0.0, 1.0, 2).unwrap();
        let traj = propagate_two_level(StateVector::ground(), &[0.0, 0.5], &trace, 1).unwrap();
        assert_state(&traj.states[1], c(0.0, -1.0), c(0.0, 0.0), 1e-12);
    }

    #[test]
    fn test_y_axis_rotation() {
        // Y = 1 for half a period rotates |0> to |1> with a real amplitude
        let trace = HamiltonianTrace::new(vec![0.0; 3], vec![0.0; 3], Some(vec![1.0; 3])).unwrap();
        let traj = propagate_two_level(StateVector::ground(), &[0.0, 0.25, 0.5], &trace, 1).unwrap();
        assert_state(&traj.states[2], c(0.0, 0.0), c(1.0, 0.0), 1e-12);
    }

    #[test]
    fn test_left_endpoint_hamiltonian() {
        // Last sample's Hamiltonian is never used
        let trace = HamiltonianTrace::new(vec![1.0, 1.0, 50.0], vec![0.0; 3], None).unwrap();
        let traj = propagate_two_level(StateVector::ground(), &[0.0, 0.25, 0.5], &trace, 1).unwrap();
        assert_state(&traj.states[2], c(0.0, 0.0), c(0.0, -1.0), 1e-12);
    }

    #[test]
    fn test_non_uniform_steps() {
        let trace = HamiltonianTrace::constant(1.0, 0.0, 3).unwrap();
        let traj = propagate_two_level(StateVector::ground(), &[0.0, 0.1, 0.5], &trace, 1).unwrap();
        assert_state(&traj.states[2], c(0.0, 0.0), c(0.0, -1.0), 1e-12);
    }

    #[test]
    fn test_decimation() {
        let n = 11;
        let times: Vec<f64> = (0..n).map(|i| i as f64 * 0.05).collect();
        let trace = HamiltonianTrace::constant(1.0, 0.3, n).unwrap();
        let full = propagate_two_level(StateVector::ground(), &times, &trace, 1).unwrap();
        let dec = propagate_two_level(StateVector::ground(), &times, &trace, 4).unwrap();
        assert_eq!(dec.times, vec![0.0, 0.2, 0.4]);
        assert_eq!(dec, full.decimate(4).unwrap());
    }

    #[test]
    fn test_single_sample() {
        let trace = HamiltonianTrace::constant(1.0, 0.0, 1).unwrap();
        let traj = propagate_two_level(StateVector::excited(), &[3.0], &trace, 5).unwrap();
        assert_eq!(traj.len(), 1);
        assert_eq!(traj.states[0], StateVector::excited());
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn test_length_mismatch() {
        let trace = HamiltonianTrace::constant(1.0, 0.0, 2).unwrap();
        let err = propagate_two_level(StateVector::ground(), &[0.0, 0.1, 0.2], &trace, 1).unwrap_err();
        assert!(matches!(err, Error::Pulse(PulseError::AxisMismatch(_))));
    }

    #[test]
    fn test_zero_decimation() {
        let trace = HamiltonianTrace::constant(1.0, 0.0, 2).unwrap();
        let err = propagate_two_level(StateVector::ground(), &[0.0, 0.1], &trace, 0).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_non_increasing_times() {
        let trace = HamiltonianTrace::constant(1.0, 0.0, 3).unwrap();
        assert!(propagate_two_level(StateVector::ground(), &[0.0, 0.2, 0.2], &trace, 1).is_err());
    }

    // =========================================================================
    // Properties
    // =========================================================================

    proptest! {
        #[test]
        fn prop_norm_preserved(
            delta in prop::collection::vec(-10.0f64..10.0, 2..40),
            seed_eps in -10.0f64..10.0,
            seed_y in -5.0f64..5.0,
            dt in 1e-4f64..0.2,
            a in -1.0f64..1.0,
            b in -1.0f64..1.0,
        ) {
            let n = delta.len();
            let detuning: Vec<f64> = (0..n).map(|i| seed_eps * (i as f64 * 0.37).sin()).collect();
            let y: Vec<f64> = (0..n).map(|i| seed_y * (i as f64 * 0.11).cos()).collect();
            let trace = HamiltonianTrace::new(delta, detuning, Some(y)).unwrap();
            let times: Vec<f64> = (0..n).map(|i| i as f64 * dt).collect();
            let start = StateVector::new(c(1.0 + a.abs(), b), c(a, 0.5)).unwrap();
            let traj = propagate_two_level(start, &times, &trace, 1).unwrap();
            prop_assert!(traj.max_norm_drift() < 1e-10);
        }
    }
}

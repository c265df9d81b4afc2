// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Two-level state propagation.
//!
//! Used to check compiled pulses, not to generate them:
//!
//! - [`propagate_two_level`]: exact piecewise-constant Schrödinger evolution
//! - [`to_rotating_frame`], [`to_eigenbasis`]: basis and frame changes
//! - [`DriveSimulator`]: I/Q waveform in, Bloch components out
//! - [`noise`]: static, white and 1/f parameter noise for repeated runs

pub mod drive;
pub mod frame;
pub mod integrate;
pub mod noise;
pub mod types;

pub use drive::{DriveSimulator, SimulationResult, SimulatorConfig};
pub use frame::{from_eigenbasis, to_eigenbasis, to_rotating_frame};
pub use integrate::{propagate_two_level, step_unitary, Unitary};
pub use noise::{NoiseModel, NoiseRealization, NoiseSource};
pub use types::{BlochVector, HamiltonianTrace, StateVector, Trajectory};

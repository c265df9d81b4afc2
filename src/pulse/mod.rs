// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pulse synthesis.
//!
//! This module provides:
//!
//! - [`PulseShape`] and [`generate`] - canonical envelopes (Gaussian, DRAG,
//!   flat-top, square, raised cosine, ramp, adiabatic CZ) sampled on a time
//!   grid
//! - [`DragCorrection`] - derivative correction for any XY envelope
//! - [`PulseDefinition`] - a calibrated pulse (shape, amplitude, width,
//!   phase, sideband frequency, target line)
//! - [`PulseLibrary`] - per-qubit pulse calibrations used by the compiler

pub mod library;
pub mod shapes;

pub use library::{PulseDefinition, PulseKind, PulseLibrary, QubitPulses};
pub use shapes::{
    equal_area_sigma, generate, synthesize, DragCorrection, EdgeRounding, PulseShape,
};

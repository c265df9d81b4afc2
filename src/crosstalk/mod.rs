// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Crosstalk compensation.
//!
//! Flux lines leak into their neighbours. Given the measured leakage
//! matrix `M`, [`compensate`] solves for the drive that makes the delivered
//! signal equal the intended one, and [`apply_crosstalk`] models the
//! leakage itself for verification.

pub mod compensate;
pub mod matrix;

pub use compensate::{apply_crosstalk, compensate};
pub use matrix::{CrosstalkMatrix, DEFAULT_MAX_CONDITION_NUMBER};

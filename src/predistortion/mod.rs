// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Line-response predistortion.
//!
//! A [`Kernel`] models the inverse of a known linear distortion on a
//! control line (bias-tee droop, cable reflections, amplifier overshoot).
//! Kernels are cascaded explicitly through a [`FilterChain`]; no filter
//! state survives between calls.
//!
//! Mixer imperfections that mix the I and Q inputs are handled separately
//! by an [`IqCorrection`], the inverse of an [`IqTransfer`] estimated from
//! measured step responses.
//!
//! All stages are linear and time-invariant, so a kernel computed once
//! from calibration data can be reused for every compiled sequence.

pub mod filter;
pub mod kernel;
pub mod transfer;

pub use filter::{apply, FilterChain};
pub use kernel::Kernel;
pub use transfer::{
    gaussian_smooth, shifted_freqs, BandLimit, IqCorrection, IqTransfer, ResponseSmoothing,
    StepResponse,
};

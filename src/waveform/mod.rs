// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sampled control-channel signals.
//!
//! This module provides the buffer type every pipeline stage reads and
//! produces:
//!
//! - [`TimeAxis`] - a uniform sample grid (`t0`, `dt`, `len`)
//! - [`Waveform`] - complex baseband samples on a [`TimeAxis`]
//!
//! Times are in nanoseconds and sample rates in GHz (samples per ns).
//! Real-valued lines such as flux (Z) control use the real part only.

pub mod axis;
pub mod buffer;

pub use axis::TimeAxis;
pub use buffer::Waveform;

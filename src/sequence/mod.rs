// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Gate sequences.
//!
//! A [`GateSequence`] turns experiment parameters into a [`Sequence`] of
//! timed [`GateOp`]s. Gate lengths come from the [`PulseLibrary`], so the
//! same sequence lays out differently for different calibrations.
//!
//! # Example
//!
//! ```ignore
//! use qubit_pulsegen::sequence::{Cpmg, GateSequence, SequenceParams};
//! use qubit_pulsegen::pulse::PulseLibrary;
//!
//! let params = SequenceParams { n_qubits: 2, ..Default::default() };
//! let seq = Cpmg::new(4, 2000.0).generate(&params, &PulseLibrary::default())?;
//! assert_eq!(seq.len(), 12);
//! ```

pub mod builder;
pub mod builtin;
pub mod composite;
pub mod gate;
pub mod registry;
pub mod schedule;

pub use builder::{Alignment, SequenceBuilder, SequenceParams};
pub use builtin::{Cpmg, PulseTrain, Rabi, SpinLockVariant, SpinLocking, T1};
pub use composite::CompositeGate;
pub use gate::{Axis, GateKind};
pub use registry::SequenceRegistry;
pub use schedule::{GateOp, Sequence, OVERLAP_TOLERANCE_NS};

use crate::error::Result;
use crate::pulse::PulseLibrary;

/// Source of gate sequences.
///
/// Implementations must be thread-safe (`Send + Sync`) so they can live in
/// a shared [`SequenceRegistry`].
pub trait GateSequence: Send + Sync {
    /// Registry name.
    fn name(&self) -> &str;

    /// One-line description.
    fn description(&self) -> &str {
        ""
    }

    /// Lay out the sequence.
    ///
    /// The returned sequence has passed [`Sequence::validate`].
    fn generate(&self, params: &SequenceParams, library: &PulseLibrary) -> Result<Sequence>;
}

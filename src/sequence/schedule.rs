// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scheduled gate operations.
//!
//! [`GateOp`] is one gate placed on a qubit's timeline. [`Sequence`] is the
//! ordered collection a [`GateSequence`](super::GateSequence) emits and the
//! compiler consumes.

use std::collections::BTreeSet;

use serde::Serialize;

use super::gate::GateKind;
use crate::error::{PulseError, Result, ValidationError};

/// Slack allowed when comparing slot edges, in ns.
pub const OVERLAP_TOLERANCE_NS: f64 = 1e-9;

/// A gate placed at a specific time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateOp {
    pub qubit: usize,
    pub kind: GateKind,
    pub start_ns: f64,
    pub duration_ns: f64,
    /// Allowed to overlap other simultaneous ops on the same qubit.
    pub simultaneous: bool,
}

impl GateOp {
    pub fn new(qubit: usize, kind: GateKind, start_ns: f64, duration_ns: f64) -> Self {
        Self {
            qubit,
            kind,
            start_ns,
            duration_ns,
            simultaneous: false,
        }
    }

    /// Flag the op as a simultaneous drive component.
    pub fn combinable(mut self) -> Self {
        self.simultaneous = true;
        self
    }

    pub fn end_ns(&self) -> f64 {
        self.start_ns + self.duration_ns
    }

    pub fn center_ns(&self) -> f64 {
        self.start_ns + 0.5 * self.duration_ns
    }

    /// Every qubit whose timeline this op occupies.
    pub fn qubits(&self) -> Vec<usize> {
        self.kind.qubits(self.qubit)
    }

    /// The shared qubit, if the two ops share one and their slots intersect.
    pub fn overlaps(&self, other: &GateOp) -> Option<usize> {
        let shared = self
            .qubits()
            .into_iter()
            .find(|q| other.qubits().contains(q))?;
        let intersect = self.start_ns < other.end_ns() - OVERLAP_TOLERANCE_NS
            && other.start_ns < self.end_ns() - OVERLAP_TOLERANCE_NS;
        intersect.then_some(shared)
    }

    fn label(&self) -> String {
        format!(
            "{} on q{} [{:.3}-{:.3} ns]",
            self.kind,
            self.qubit,
            self.start_ns,
            self.end_ns()
        )
    }
}

/// Ordered gate operations over `n_qubits` qubits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sequence {
    n_qubits: usize,
    ops: Vec<GateOp>,
    /// Lower bound on the duration, set by explicit waits.
    min_duration_ns: f64,
}

impl Sequence {
    pub fn new(n_qubits: usize) -> Self {
        Self {
            n_qubits,
            ops: Vec::new(),
            min_duration_ns: 0.0,
        }
    }

    /// Append an op.
    ///
    /// # Errors
    ///
    /// `Validation` if the op names a qubit outside `0..n_qubits` or has a
    /// negative or non-finite start or duration. Overlaps are checked by
    /// [`validate`](Self::validate).
    pub fn push(&mut self, op: GateOp) -> Result<&mut Self> {
        if let Some(q) = op.qubits().into_iter().find(|&q| q >= self.n_qubits) {
            return Err(ValidationError::field(
                "sequence.qubit",
                format!("qubit {q} out of range for {} qubits", self.n_qubits),
            )
            .into());
        }
        if !op.start_ns.is_finite() || op.start_ns < 0.0 {
            return Err(ValidationError::field(
                "sequence.start_ns",
                format!("{} for {}", op.start_ns, op.kind),
            )
            .into());
        }
        if !op.duration_ns.is_finite() || op.duration_ns < 0.0 {
            return Err(ValidationError::field(
                "sequence.duration_ns",
                format!("{} for {}", op.duration_ns, op.kind),
            )
            .into());
        }
        self.ops.push(op);
        Ok(self)
    }

    /// Stretch the sequence to at least `t_ns`.
    pub fn extend_to(&mut self, t_ns: f64) {
        if t_ns > self.min_duration_ns {
            self.min_duration_ns = t_ns;
        }
    }

    pub fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    pub fn ops(&self) -> &[GateOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Check that no two ops collide on a qubit.
    ///
    /// Ops overlap when `a.start < b.end && b.start < a.end` on a shared
    /// qubit. A CPhase occupies both its control and target. Overlap is
    /// permitted only when both ops are flagged `simultaneous`.
    ///
    /// # Errors
    ///
    /// `OverlapViolation` for the first conflicting pair in op order.
    pub fn validate(&self) -> Result<()> {
        for (i, a) in self.ops.iter().enumerate() {
            for b in &self.ops[i + 1..] {
                if a.simultaneous && b.simultaneous {
                    continue;
                }
                if let Some(qubit) = a.overlaps(b) {
                    return Err(PulseError::OverlapViolation {
                        qubit,
                        first: a.label(),
                        second: b.label(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// End of the last op or the latest explicit wait, whichever is later.
    pub fn total_duration_ns(&self) -> f64 {
        self.ops
            .iter()
            .map(GateOp::end_ns)
            .fold(self.min_duration_ns, f64::max)
    }

    /// Qubits touched by at least one op.
    pub fn involved_qubits(&self) -> BTreeSet<usize> {
        self.ops.iter().flat_map(GateOp::qubits).collect()
    }

    /// Ops acting on `qubit`, sorted by start time.
    pub fn ops_on(&self, qubit: usize) -> Vec<&GateOp> {
        let mut ops: Vec<&GateOp> = self
            .ops
            .iter()
            .filter(|op| op.qubits().contains(&qubit))
            .collect();
        ops.sort_by(|a, b| a.start_ns.total_cmp(&b.start_ns));
        ops
    }
}

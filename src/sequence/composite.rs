// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Multi-step gates.
//!
//! A [`CompositeGate`] is a short table of primitive gates: one row per
//! step, one column per member qubit. Member indices are local; they are
//! mapped onto register qubits when the gate is played with
//! [`SequenceBuilder::composite`](super::SequenceBuilder::composite).

use std::f64::consts::PI;

use super::gate::GateKind;
use crate::error::{Result, ValidationError};

/// Gate built from steps of primitive gates on `n_qubits` member qubits.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeGate {
    pub name: String,
    n_qubits: usize,
    steps: Vec<Vec<Option<GateKind>>>,
}

impl CompositeGate {
    /// Empty gate on `n_qubits` members.
    pub fn new(name: impl Into<String>, n_qubits: usize) -> Self {
        Self {
            name: name.into(),
            n_qubits,
            steps: Vec::new(),
        }
    }

    /// A plain gate as a one-step, one-qubit composite.
    pub fn single(name: impl Into<String>, kind: GateKind) -> Self {
        Self {
            name: name.into(),
            n_qubits: 1,
            steps: vec![vec![Some(kind)]],
        }
    }

    /// Hadamard as a virtual Z pi followed by `Y2p`.
    pub fn hadamard() -> Self {
        Self {
            name: "H".to_string(),
            n_qubits: 1,
            steps: vec![
                vec![Some(GateKind::virtual_z(PI))],
                vec![Some(GateKind::y2p())],
            ],
        }
    }

    /// Controlled phase followed by single-qubit phase corrections on the
    /// control and the target.
    pub fn corrected_cphase(control_phase: f64, target_phase: f64) -> Self {
        Self {
            name: "CZ".to_string(),
            n_qubits: 2,
            steps: vec![
                vec![Some(GateKind::CPhase { target: 1 }), None],
                vec![
                    Some(GateKind::virtual_z(control_phase)),
                    Some(GateKind::virtual_z(target_phase)),
                ],
            ],
        }
    }

    /// Append a step with one entry per member; `None` leaves that member
    /// idle. `CPhase` targets are member indices.
    ///
    /// # Errors
    ///
    /// `Validation` if the row length is not `n_qubits`, or a `CPhase`
    /// targets itself, a member out of range, or a member busy in the
    /// same step.
    pub fn with_step(mut self, gates: Vec<Option<GateKind>>) -> Result<Self> {
        if gates.len() != self.n_qubits {
            return Err(ValidationError::field(
                "composite.step",
                format!(
                    "'{}' step has {} gates for {} qubits",
                    self.name,
                    gates.len(),
                    self.n_qubits
                ),
            )
            .into());
        }
        for (control, gate) in gates.iter().enumerate() {
            if let Some(GateKind::CPhase { target }) = *gate {
                let free = target < gates.len() && target != control && gates[target].is_none();
                if !free {
                    return Err(ValidationError::field(
                        "composite.step",
                        format!("'{}' CPhase from member {control} to {target}", self.name),
                    )
                    .into());
                }
            }
        }
        self.steps.push(gates);
        Ok(self)
    }

    pub fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Vec<Option<GateKind>>] {
        &self.steps
    }

    pub(crate) fn check_qubits(&self, qubits: &[usize]) -> Result<()> {
        if qubits.len() != self.n_qubits {
            return Err(ValidationError::field(
                "composite.qubits",
                format!(
                    "'{}' acts on {} qubits, got {}",
                    self.name,
                    self.n_qubits,
                    qubits.len()
                ),
            )
            .into());
        }
        Ok(())
    }

    /// Step `index` on register `qubits`, with `CPhase` targets remapped.
    pub(crate) fn resolve_step(&self, index: usize, qubits: &[usize]) -> Vec<(usize, GateKind)> {
        self.steps[index]
            .iter()
            .enumerate()
            .filter_map(|(member, gate)| {
                let kind = match (*gate)? {
                    GateKind::CPhase { target } => GateKind::CPhase {
                        target: qubits[target],
                    },
                    other => other,
                };
                Some((qubits[member], kind))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_step_checks_width() {
        let gate = CompositeGate::new("pair", 2);
        assert!(gate.clone().with_step(vec![Some(GateKind::xp())]).is_err());
        let gate = gate
            .with_step(vec![Some(GateKind::xp()), Some(GateKind::yp())])
            .unwrap();
        assert_eq!(gate.len(), 1);
        assert_eq!(gate.n_qubits(), 2);
    }

    #[test]
    fn test_cphase_target_must_be_free() {
        let gate = CompositeGate::new("cz", 2);
        assert!(gate
            .clone()
            .with_step(vec![Some(GateKind::CPhase { target: 1 }), Some(GateKind::xp())])
            .is_err());
        assert!(gate
            .clone()
            .with_step(vec![Some(GateKind::CPhase { target: 0 }), None])
            .is_err());
        assert!(gate
            .with_step(vec![Some(GateKind::CPhase { target: 1 }), None])
            .is_ok());
    }

    #[test]
    fn test_resolve_remaps_targets() {
        let cz = CompositeGate::corrected_cphase(0.1, 0.2);
        let step = cz.resolve_step(0, &[4, 7]);
        assert_eq!(step, vec![(4, GateKind::CPhase { target: 7 })]);
        let step = cz.resolve_step(1, &[4, 7]);
        assert_eq!(
            step,
            vec![(4, GateKind::virtual_z(0.1)), (7, GateKind::virtual_z(0.2))]
        );
    }

    #[test]
    fn test_check_qubits() {
        let h = CompositeGate::hadamard();
        assert!(h.check_qubits(&[3]).is_ok());
        assert!(h.check_qubits(&[0, 1]).is_err());
    }
}

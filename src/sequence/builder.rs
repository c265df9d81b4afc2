// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Step-by-step sequence construction.
//!
//! A step holds gates that play in parallel. Its length is the longest gate
//! in it; shorter gates are placed inside the step by [`Alignment`]. Steps
//! follow each other with `gate_spacing_ns` between them.
//!
//! With `simultaneous` off, every multi-gate step is played one gate at a
//! time. Steps holding identities or readouts are kept together. With
//! `readout` on, [`SequenceBuilder::build`] closes the sequence with a
//! readout on every qubit.

use serde::{Deserialize, Serialize};

use super::composite::CompositeGate;
use super::gate::GateKind;
use super::schedule::{GateOp, Sequence};
use crate::error::{Result, ValidationError};
use crate::pulse::PulseLibrary;

/// Placement of a short gate inside a longer step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
}

impl Alignment {
    /// Offset of a gate of length `duration` within a step of length `step`.
    pub fn offset(self, step: f64, duration: f64) -> f64 {
        match self {
            Alignment::Left => 0.0,
            Alignment::Center => 0.5 * (step - duration),
            Alignment::Right => step - duration,
        }
    }
}

/// Parameters shared by every generated sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceParams {
    pub n_qubits: usize,
    pub gate_spacing_ns: f64,
    pub alignment: Alignment,
    /// Play the gates of a step in parallel.
    pub simultaneous: bool,
    /// Append a readout on every qubit.
    pub readout: bool,
    /// Idle time between the last gate and the readout.
    pub readout_delay_ns: f64,
}

impl Default for SequenceParams {
    fn default() -> Self {
        Self {
            n_qubits: 1,
            gate_spacing_ns: 0.0,
            alignment: Alignment::Center,
            simultaneous: true,
            readout: false,
            readout_delay_ns: 0.0,
        }
    }
}

impl SequenceParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_qubits == 0 {
            return Err(ValidationError::field("n_qubits", "must be at least 1").into());
        }
        if !self.gate_spacing_ns.is_finite() || self.gate_spacing_ns < 0.0 {
            return Err(ValidationError::field(
                "gate_spacing_ns",
                format!("must be finite and non-negative, got {}", self.gate_spacing_ns),
            )
            .into());
        }
        if !self.readout_delay_ns.is_finite() || self.readout_delay_ns < 0.0 {
            return Err(ValidationError::field(
                "readout_delay_ns",
                format!("must be finite and non-negative, got {}", self.readout_delay_ns),
            )
            .into());
        }
        Ok(())
    }
}

/// Builds a [`Sequence`] from steps, reading gate lengths from a library.
pub struct SequenceBuilder<'a> {
    library: &'a PulseLibrary,
    params: SequenceParams,
    /// End of the previous step; `None` before the first one.
    cursor_ns: Option<f64>,
    sequence: Sequence,
}

impl<'a> SequenceBuilder<'a> {
    pub fn new(params: &SequenceParams, library: &'a PulseLibrary) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            library,
            params: params.clone(),
            cursor_ns: None,
            sequence: Sequence::new(params.n_qubits),
        })
    }

    /// Add a step of parallel gates.
    ///
    /// The first step starts at 0. Later steps start `gate_spacing_ns` after
    /// the end of the previous one, except zero-length steps (virtual Z),
    /// which start right at it. Gates of one step sharing a qubit are
    /// flagged simultaneous and may overlap.
    pub fn step(&mut self, gates: &[(usize, GateKind)], align: Alignment) -> Result<&mut Self> {
        let keep_together = gates
            .iter()
            .any(|(_, kind)| matches!(kind, GateKind::Identity | GateKind::Readout));
        if !self.params.simultaneous && gates.len() > 1 && !keep_together {
            for gate in gates {
                self.place(std::slice::from_ref(gate), align, self.params.gate_spacing_ns)?;
            }
            return Ok(self);
        }
        self.place(gates, align, self.params.gate_spacing_ns)?;
        Ok(self)
    }

    fn place(&mut self, gates: &[(usize, GateKind)], align: Alignment, spacing: f64) -> Result<()> {
        if gates.is_empty() {
            return Ok(());
        }

        let durations = gates
            .iter()
            .map(|(qubit, kind)| kind.duration_ns(*qubit, self.library))
            .collect::<Result<Vec<f64>>>()?;
        let step_len = durations.iter().copied().fold(0.0, f64::max);

        let start = match self.cursor_ns {
            None => 0.0,
            Some(cursor) if step_len > 0.0 => cursor + spacing,
            Some(cursor) => cursor,
        };

        for (i, (&(qubit, kind), &duration)) in gates.iter().zip(&durations).enumerate() {
            let shared = gates
                .iter()
                .enumerate()
                .any(|(j, (other, _))| j != i && *other == qubit);
            let mut op = GateOp::new(qubit, kind, start + align.offset(step_len, duration), duration);
            if shared {
                op = op.combinable();
            }
            self.sequence.push(op)?;
        }

        let end = start + step_len;
        self.cursor_ns = Some(end);
        self.sequence.extend_to(end);
        Ok(())
    }

    /// Single gate as its own step.
    pub fn gate(&mut self, qubit: usize, kind: GateKind) -> Result<&mut Self> {
        let align = self.params.alignment;
        self.step(&[(qubit, kind)], align)
    }

    /// The same gate on every qubit in one step.
    pub fn all(&mut self, kind: GateKind) -> Result<&mut Self> {
        let align = self.params.alignment;
        self.all_aligned(kind, align)
    }

    pub fn all_aligned(&mut self, kind: GateKind, align: Alignment) -> Result<&mut Self> {
        let gates: Vec<(usize, GateKind)> =
            (0..self.params.n_qubits).map(|q| (q, kind)).collect();
        self.step(&gates, align)
    }

    /// Play a composite gate on `qubits`, one step per composite step.
    pub fn composite(&mut self, qubits: &[usize], gate: &CompositeGate) -> Result<&mut Self> {
        self.composites(&[(qubits, gate)])
    }

    /// Play composite gates side by side, step by step.
    ///
    /// Gates must have equal length, except single-step gates, which are
    /// padded with identities.
    pub fn composites(&mut self, gates: &[(&[usize], &CompositeGate)]) -> Result<&mut Self> {
        let n_steps = gates.iter().map(|(_, g)| g.len()).max().unwrap_or(0);
        for (qubits, gate) in gates {
            if gate.len() != n_steps && gate.len() != 1 {
                return Err(ValidationError::field(
                    "composite",
                    format!(
                        "'{}' has {} steps but gates played with it have {}",
                        gate.name,
                        gate.len(),
                        n_steps
                    ),
                )
                .into());
            }
            gate.check_qubits(qubits)?;
        }

        let align = self.params.alignment;
        for s in 0..n_steps {
            let mut step = Vec::new();
            for (qubits, gate) in gates {
                if gate.len() == n_steps || s == 0 {
                    step.extend(gate.resolve_step(s, qubits));
                } else {
                    step.extend(qubits.iter().map(|&q| (q, GateKind::Identity)));
                }
            }
            self.step(&step, align)?;
        }
        Ok(self)
    }

    /// Move the cursor to `t_ns`; the next step starts after it.
    pub fn wait_until(&mut self, t_ns: f64) -> &mut Self {
        self.cursor_ns = Some(t_ns);
        self.sequence.extend_to(t_ns);
        self
    }

    /// End of the last step, 0 before the first.
    pub fn cursor_ns(&self) -> f64 {
        self.cursor_ns.unwrap_or(0.0)
    }

    /// Finish and check for overlaps.
    ///
    /// With `readout` set, a left-aligned readout on every qubit starts
    /// `readout_delay_ns` after the last step, with no gate spacing.
    pub fn build(mut self) -> Result<Sequence> {
        if self.params.readout {
            let start = self.cursor_ns() + self.params.readout_delay_ns;
            self.wait_until(start);
            let gates: Vec<(usize, GateKind)> = (0..self.params.n_qubits)
                .map(|q| (q, GateKind::Readout))
                .collect();
            self.place(&gates, Alignment::Left, 0.0)?;
        }
        self.sequence.validate()?;
        Ok(self.sequence)
    }
}

// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Built-in characterization sequences.

use serde::{Deserialize, Serialize};

use super::builder::{Alignment, SequenceBuilder, SequenceParams};
use super::gate::{Axis, GateKind};
use super::schedule::Sequence;
use super::GateSequence;
use crate::error::{Result, ValidationError};
use crate::pulse::PulseLibrary;

/// Longest pi pulse over the active qubits.
fn longest_pi_pulse(params: &SequenceParams, library: &PulseLibrary) -> f64 {
    (0..params.n_qubits)
        .map(|q| library.xy(q).total_duration_ns())
        .fold(0.0, f64::max)
}

fn check_duration(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::field(
            field,
            format!("must be finite and non-negative, got {value}"),
        )
        .into());
    }
    Ok(())
}

/// Pi pulse on every qubit, right-aligned so all pulses end together.
#[derive(Debug, Clone, Default)]
pub struct Rabi;

impl GateSequence for Rabi {
    fn name(&self) -> &str {
        "rabi"
    }

    fn description(&self) -> &str {
        "Pi pulse on every qubit"
    }

    fn generate(&self, params: &SequenceParams, library: &PulseLibrary) -> Result<Sequence> {
        let mut b = SequenceBuilder::new(params, library)?;
        b.all_aligned(GateKind::xp(), Alignment::Right)?;
        b.build()
    }
}

/// Ramsey, echo and CPMG.
///
/// `X2p`, then `n_pulses` refocusing pi pulses at `duration/(n+1)` spacing,
/// then `X2p` at `duration`. With `edge_to_edge` the pi pulse length is
/// added to `duration` so it measures free evolution between pulse edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cpmg {
    pub name: String,
    pub n_pulses: usize,
    pub duration_ns: f64,
    /// Axis of the refocusing pulses.
    pub refocus_axis: Axis,
    pub edge_to_edge: bool,
}

impl Cpmg {
    pub fn new(n_pulses: usize, duration_ns: f64) -> Self {
        Self {
            name: "cpmg".to_string(),
            n_pulses,
            duration_ns,
            refocus_axis: Axis::Y,
            edge_to_edge: false,
        }
    }

    /// Two pi/2 pulses and nothing in between.
    pub fn ramsey(duration_ns: f64) -> Self {
        Self {
            name: "ramsey".to_string(),
            ..Self::new(0, duration_ns)
        }
    }

    /// Hahn echo: a single refocusing pulse.
    pub fn echo(duration_ns: f64) -> Self {
        Self {
            name: "echo".to_string(),
            ..Self::new(1, duration_ns)
        }
    }

    pub fn with_refocus_axis(mut self, axis: Axis) -> Self {
        self.refocus_axis = axis;
        self
    }

    pub fn with_edge_to_edge(mut self, edge_to_edge: bool) -> Self {
        self.edge_to_edge = edge_to_edge;
        self
    }
}

impl GateSequence for Cpmg {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Pi/2 - (pi)^n - pi/2 dephasing sequence"
    }

    fn generate(&self, params: &SequenceParams, library: &PulseLibrary) -> Result<Sequence> {
        check_duration("cpmg.duration_ns", self.duration_ns)?;
        if self.refocus_axis == Axis::Z {
            return Err(
                ValidationError::field("cpmg.refocus_axis", "must be X or Y").into(),
            );
        }
        let pi = GateKind::rotation(self.refocus_axis, std::f64::consts::PI);
        let duration = if self.edge_to_edge {
            self.duration_ns + longest_pi_pulse(params, library)
        } else {
            self.duration_ns
        };

        let mut b = SequenceBuilder::new(params, library)?;
        b.wait_until(0.0);
        b.all(GateKind::x2p())?;
        for i in 0..self.n_pulses {
            b.wait_until(duration / (self.n_pulses + 1) as f64 * (i + 1) as f64);
            b.all(pi)?;
        }
        b.wait_until(duration);
        b.all(GateKind::x2p())?;
        b.build()
    }
}

/// Pi pulse followed by a wait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct T1 {
    pub duration_ns: f64,
    pub edge_to_edge: bool,
}

impl T1 {
    pub fn new(duration_ns: f64) -> Self {
        Self {
            duration_ns,
            edge_to_edge: false,
        }
    }
}

impl GateSequence for T1 {
    fn name(&self) -> &str {
        "t1"
    }

    fn description(&self) -> &str {
        "Pi pulse then free decay"
    }

    fn generate(&self, params: &SequenceParams, library: &PulseLibrary) -> Result<Sequence> {
        check_duration("t1.duration_ns", self.duration_ns)?;
        let pi_len = longest_pi_pulse(params, library);
        let end = if self.edge_to_edge {
            self.duration_ns + pi_len
        } else {
            self.duration_ns + pi_len / 2.0
        };

        let mut b = SequenceBuilder::new(params, library)?;
        b.wait_until(0.0);
        b.all(GateKind::xp())?;
        b.wait_until(end);
        b.build()
    }
}

/// Repeated gate for amplitude and phase calibration.
///
/// With `alternate`, every odd pulse rotates the other way (`Xp`, `Xm`,
/// `Xp`, ...). Zero pulses yields a single identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseTrain {
    pub gate: GateKind,
    pub n_pulses: usize,
    pub alternate: bool,
}

impl PulseTrain {
    pub fn new(gate: GateKind, n_pulses: usize) -> Self {
        Self {
            gate,
            n_pulses,
            alternate: false,
        }
    }

    pub fn alternating(mut self) -> Self {
        self.alternate = true;
        self
    }
}

impl GateSequence for PulseTrain {
    fn name(&self) -> &str {
        "pulse_train"
    }

    fn description(&self) -> &str {
        "Repeated gate, optionally alternating direction"
    }

    fn generate(&self, params: &SequenceParams, library: &PulseLibrary) -> Result<Sequence> {
        let mut b = SequenceBuilder::new(params, library)?;
        if self.n_pulses == 0 {
            b.all(GateKind::Identity)?;
        }
        for n in 0..self.n_pulses {
            let gate = if self.alternate && n % 2 == 1 {
                self.gate.reversed()
            } else {
                self.gate
            };
            b.all(gate)?;
        }
        b.build()
    }
}

/// Spin-locking pulse variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpinLockVariant {
    /// `Y2p`, lock, `Y2p`.
    #[default]
    Sl3,
    /// `Y2m`, `Xp`, lock, `Xp`, `Y2m`.
    Sl5a,
    /// `Y2p`, `Xp`, lock, `Xp`, `Y2p`.
    Sl5b,
}

/// Continuous drive between pi/2 pulses, locking the spin along the drive.
///
/// Qubit `q` is driven at `amplitudes[q]`; qubits past the end of the list
/// reuse its last entry. The lock pulse is the qubit's XY shape stretched
/// by a `duration_ns` plateau.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinLocking {
    pub amplitudes: Vec<f64>,
    pub duration_ns: f64,
    /// Drive phase in radians.
    pub phase: f64,
    pub variant: SpinLockVariant,
}

impl SpinLocking {
    pub fn new(amplitude: f64, duration_ns: f64) -> Self {
        Self {
            amplitudes: vec![amplitude],
            duration_ns,
            phase: 0.0,
            variant: SpinLockVariant::Sl3,
        }
    }

    pub fn with_variant(mut self, variant: SpinLockVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_phase(mut self, phase: f64) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_amplitudes(mut self, amplitudes: Vec<f64>) -> Self {
        self.amplitudes = amplitudes;
        self
    }

    fn amplitude(&self, qubit: usize) -> f64 {
        self.amplitudes
            .get(qubit)
            .or(self.amplitudes.last())
            .copied()
            .unwrap_or(0.0)
    }
}

impl GateSequence for SpinLocking {
    fn name(&self) -> &str {
        "spin_locking"
    }

    fn description(&self) -> &str {
        "Pi/2 - lock drive - pi/2, optionally refocused by pi pulses"
    }

    fn generate(&self, params: &SequenceParams, library: &PulseLibrary) -> Result<Sequence> {
        check_duration("spin_locking.duration_ns", self.duration_ns)?;
        if self.amplitudes.iter().any(|a| !a.is_finite()) || !self.phase.is_finite() {
            return Err(ValidationError::field(
                "spin_locking",
                "amplitudes and phase must be finite",
            )
            .into());
        }
        let edge = match self.variant {
            SpinLockVariant::Sl3 | SpinLockVariant::Sl5b => GateKind::y2p(),
            SpinLockVariant::Sl5a => GateKind::y2m(),
        };
        let refocus = self.variant != SpinLockVariant::Sl3;

        let mut b = SequenceBuilder::new(params, library)?;
        b.all(edge)?;
        if refocus {
            b.all(GateKind::xp())?;
        }
        let lock: Vec<(usize, GateKind)> = (0..params.n_qubits)
            .map(|q| (q, GateKind::drive(self.amplitude(q), self.duration_ns, self.phase)))
            .collect();
        b.step(&lock, params.alignment)?;
        if refocus {
            b.all(GateKind::xp())?;
        }
        b.all(edge)?;
        b.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    use crate::pulse::{PulseDefinition, PulseShape, QubitPulses};
    use approx::assert_relative_eq;

    fn params(n_qubits: usize) -> SequenceParams {
        SequenceParams {
            n_qubits,
            ..SequenceParams::default()
        }
    }

    #[test]
    fn test_rabi_right_aligned() {
        let short = QubitPulses {
            xy: PulseDefinition::xy(PulseShape::cosine(), 0.5, 20.0),
            ..QubitPulses::default()
        };
        let lib = PulseLibrary::default().with_qubit(1, short);
        let seq = Rabi.generate(&params(2), &lib).unwrap();
        assert_eq!(seq.len(), 2);
        assert_relative_eq!(seq.ops()[0].end_ns(), seq.ops()[1].end_ns());
        assert_relative_eq!(seq.ops()[1].start_ns, 30.0);
    }

    #[test]
    fn test_ramsey() {
        let lib = PulseLibrary::default();
        let seq = Cpmg::ramsey(200.0).generate(&params(1), &lib).unwrap();
        assert_eq!(seq.len(), 2);
        assert_relative_eq!(seq.ops()[0].start_ns, 0.0);
        assert_relative_eq!(seq.ops()[1].start_ns, 200.0);
        assert_eq!(seq.ops()[1].kind, GateKind::x2p());
    }

    #[test]
    fn test_cpmg_pulse_positions() {
        let lib = PulseLibrary::default();
        let seq = Cpmg::new(3, 400.0).generate(&params(1), &lib).unwrap();
        let starts: Vec<f64> = seq.ops().iter().map(|op| op.start_ns).collect();
        assert_eq!(starts, vec![0.0, 100.0, 200.0, 300.0, 400.0]);
        assert_eq!(seq.ops()[1].kind, GateKind::yp());
    }

    #[test]
    fn test_cpmg_x_refocus_and_edge_to_edge() {
        let lib = PulseLibrary::default();
        let seq = Cpmg::echo(100.0)
            .with_refocus_axis(Axis::X)
            .with_edge_to_edge(true)
            .generate(&params(1), &lib)
            .unwrap();
        assert_eq!(seq.ops()[1].kind, GateKind::xp());
        // 100 ns plus a 50 ns pi pulse
        assert_relative_eq!(seq.ops()[1].start_ns, 75.0);
        assert_relative_eq!(seq.ops()[2].start_ns, 150.0);
    }

    #[test]
    fn test_cpmg_too_short_overlaps() {
        let lib = PulseLibrary::default();
        assert!(Cpmg::new(4, 100.0).generate(&params(1), &lib).is_err());
    }

    #[test]
    fn test_cpmg_rejects_z_axis() {
        let lib = PulseLibrary::default();
        let cpmg = Cpmg::echo(500.0).with_refocus_axis(Axis::Z);
        assert!(cpmg.generate(&params(1), &lib).is_err());
    }

    #[test]
    fn test_t1() {
        let lib = PulseLibrary::default();
        let seq = T1::new(1000.0).generate(&params(2), &lib).unwrap();
        assert_eq!(seq.len(), 2);
        assert_relative_eq!(seq.total_duration_ns(), 1025.0);
    }

    #[test]
    fn test_pulse_train_alternates() {
        let lib = PulseLibrary::default();
        let seq = PulseTrain::new(GateKind::x2p(), 4)
            .alternating()
            .generate(&params(1), &lib)
            .unwrap();
        let angles: Vec<f64> = seq
            .ops()
            .iter()
            .map(|op| match op.kind {
                GateKind::Rotation { angle, .. } => angle,
                _ => f64::NAN,
            })
            .collect();
        assert_eq!(angles, vec![PI / 2.0, -PI / 2.0, PI / 2.0, -PI / 2.0]);
    }

    fn kinds(seq: &Sequence, qubit: usize) -> Vec<GateKind> {
        seq.ops()
            .iter()
            .filter(|op| op.qubit == qubit)
            .map(|op| op.kind)
            .collect()
    }

    #[test]
    fn test_spin_locking_sl3() {
        let lib = PulseLibrary::default();
        let seq = SpinLocking::new(0.1, 200.0)
            .with_amplitudes(vec![0.1, 0.2])
            .generate(&params(3), &lib)
            .unwrap();
        assert_eq!(
            kinds(&seq, 1),
            vec![
                GateKind::y2p(),
                GateKind::drive(0.2, 200.0, 0.0),
                GateKind::y2p()
            ]
        );
        // Last amplitude carries over to qubit 2
        assert_eq!(kinds(&seq, 2)[1], GateKind::drive(0.2, 200.0, 0.0));
        // 50 + (50 + 200) + 50
        assert_relative_eq!(seq.total_duration_ns(), 350.0);
    }

    #[test]
    fn test_spin_locking_five_pulse_variants() {
        let lib = PulseLibrary::default();
        let a = SpinLocking::new(0.1, 100.0)
            .with_variant(SpinLockVariant::Sl5a)
            .with_phase(PI / 2.0)
            .generate(&params(1), &lib)
            .unwrap();
        assert_eq!(
            kinds(&a, 0),
            vec![
                GateKind::y2m(),
                GateKind::xp(),
                GateKind::drive(0.1, 100.0, PI / 2.0),
                GateKind::xp(),
                GateKind::y2m()
            ]
        );
        let b = SpinLocking::new(0.1, 100.0)
            .with_variant(SpinLockVariant::Sl5b)
            .generate(&params(1), &lib)
            .unwrap();
        assert_eq!(kinds(&b, 0)[0], GateKind::y2p());
        assert_eq!(kinds(&b, 0)[1], GateKind::xp());
    }

    #[test]
    fn test_spin_locking_rejects_bad_duration() {
        let lib = PulseLibrary::default();
        assert!(SpinLocking::new(0.1, -1.0).generate(&params(1), &lib).is_err());
        assert!(SpinLocking::new(f64::NAN, 10.0).generate(&params(1), &lib).is_err());
    }

    #[test]
    fn test_empty_pulse_train_is_identity() {
        let lib = PulseLibrary::default();
        let seq = PulseTrain::new(GateKind::xp(), 0)
            .generate(&params(1), &lib)
            .unwrap();
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.ops()[0].kind, GateKind::Identity);
    }
}

// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Gate kinds and their mapping onto pulses.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pulse::{PulseKind, PulseLibrary};

/// Rotation axis on the Bloch sphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// What a gate does.
///
/// X and Y rotations are played on the XY line by scaling the qubit's
/// calibrated pi pulse. Z rotations are virtual: they take no time and
/// shift the phase of every later XY pulse on the same qubit. `Drive` plays
/// the XY pulse shape with its own amplitude, plateau and phase, for
/// spin-locking and other continuous-drive experiments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum GateKind {
    /// Rotation by `angle` radians about `axis`.
    Rotation { axis: Axis, angle: f64 },
    /// Idle for the length of a pi pulse.
    Identity,
    /// The qubit's Z pulse with amplitude scaled by `scale`.
    ZPulse { scale: f64 },
    /// Controlled phase with this qubit as control.
    CPhase { target: usize },
    /// XY pulse shape with the amplitude, plateau and phase overridden.
    Drive {
        amplitude: f64,
        plateau_ns: f64,
        phase: f64,
    },
    /// The qubit's readout tone.
    Readout,
}

impl GateKind {
    pub fn rotation(axis: Axis, angle: f64) -> Self {
        GateKind::Rotation { axis, angle }
    }

    pub fn xp() -> Self {
        Self::rotation(Axis::X, PI)
    }

    pub fn xm() -> Self {
        Self::rotation(Axis::X, -PI)
    }

    pub fn x2p() -> Self {
        Self::rotation(Axis::X, PI / 2.0)
    }

    pub fn x2m() -> Self {
        Self::rotation(Axis::X, -PI / 2.0)
    }

    pub fn yp() -> Self {
        Self::rotation(Axis::Y, PI)
    }

    pub fn ym() -> Self {
        Self::rotation(Axis::Y, -PI)
    }

    pub fn y2p() -> Self {
        Self::rotation(Axis::Y, PI / 2.0)
    }

    pub fn y2m() -> Self {
        Self::rotation(Axis::Y, -PI / 2.0)
    }

    pub fn virtual_z(angle: f64) -> Self {
        Self::rotation(Axis::Z, angle)
    }

    pub fn drive(amplitude: f64, plateau_ns: f64, phase: f64) -> Self {
        GateKind::Drive {
            amplitude,
            plateau_ns,
            phase,
        }
    }

    /// Parse the short gate names `Xp`, `X2m`, `Yp`, `Zp`, `I`, ...
    pub fn from_name(name: &str) -> Option<Self> {
        let gate = match name {
            "I" => GateKind::Identity,
            "Xp" => Self::xp(),
            "Xm" => Self::xm(),
            "X2p" => Self::x2p(),
            "X2m" => Self::x2m(),
            "Yp" => Self::yp(),
            "Ym" => Self::ym(),
            "Y2p" => Self::y2p(),
            "Y2m" => Self::y2m(),
            "Zp" => Self::virtual_z(PI),
            "Zm" => Self::virtual_z(-PI),
            "Z2p" => Self::virtual_z(PI / 2.0),
            "Z2m" => Self::virtual_z(-PI / 2.0),
            _ => return None,
        };
        Some(gate)
    }

    /// Same gate rotating the other way.
    pub fn reversed(&self) -> Self {
        match *self {
            GateKind::Rotation { axis, angle } => GateKind::Rotation {
                axis,
                angle: -angle,
            },
            other => other,
        }
    }

    /// Zero-duration phase update.
    pub fn is_virtual(&self) -> bool {
        matches!(self, GateKind::Rotation { axis: Axis::Z, .. })
    }

    /// Line the gate plays on, if any.
    pub fn line(&self) -> Option<PulseKind> {
        match self {
            GateKind::Rotation { axis: Axis::Z, .. } | GateKind::Identity => None,
            GateKind::Rotation { .. } | GateKind::Drive { .. } => Some(PulseKind::Xy),
            GateKind::ZPulse { .. } | GateKind::CPhase { .. } => Some(PulseKind::Z),
            GateKind::Readout => Some(PulseKind::Readout),
        }
    }

    /// Qubits the gate occupies when applied to `qubit`.
    pub fn qubits(&self, qubit: usize) -> Vec<usize> {
        match *self {
            GateKind::CPhase { target } => vec![qubit, target],
            _ => vec![qubit],
        }
    }

    /// Slot length in ns when played on `qubit`.
    pub fn duration_ns(&self, qubit: usize, library: &PulseLibrary) -> Result<f64> {
        Ok(match self {
            GateKind::Rotation { axis: Axis::Z, .. } => 0.0,
            GateKind::Rotation { .. } | GateKind::Identity => library.xy(qubit).total_duration_ns(),
            GateKind::ZPulse { .. } => library.z(qubit).total_duration_ns(),
            GateKind::CPhase { .. } => library.cphase(qubit)?.total_duration_ns(),
            GateKind::Drive { plateau_ns, .. } => {
                let xy = library.xy(qubit);
                xy.shape.with_plateau(*plateau_ns).total_duration(xy.width_ns)
            }
            GateKind::Readout => library.readout(qubit)?.total_duration_ns(),
        })
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateKind::Rotation { axis, angle } => write!(f, "{:?}({:.4})", axis, angle),
            GateKind::Identity => write!(f, "I"),
            GateKind::ZPulse { scale } => write!(f, "ZPulse({:.4})", scale),
            GateKind::CPhase { target } => write!(f, "CPhase(->{})", target),
            GateKind::Drive {
                amplitude,
                plateau_ns,
                ..
            } => write!(f, "Drive({:.4}, {:.1} ns)", amplitude, plateau_ns),
            GateKind::Readout => write!(f, "Readout"),
        }
    }
}

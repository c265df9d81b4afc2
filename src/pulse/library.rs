// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-qubit pulse calibrations.
//!
//! A [`PulseLibrary`] maps each qubit to the pulses that implement its
//! gates: a calibrated pi pulse on the XY line, a Z (flux) pulse, an
//! optional two-qubit controlled-phase flux pulse and an optional readout
//! tone. Qubits without an entry fall back to the library default.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::shapes::{synthesize, DragCorrection, PulseShape};
use crate::error::{PulseError, Result, ValidationError};
use crate::waveform::{TimeAxis, Waveform};

/// Control line a pulse is played on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PulseKind {
    /// Microwave drive (complex I/Q).
    Xy,
    /// Flux bias (real).
    Z,
    /// Readout tone on the shared readout IQ line.
    Readout,
}

/// A fully specified pulse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseDefinition {
    #[serde(default)]
    pub shape: PulseShape,
    pub amplitude: f64,
    pub width_ns: f64,
    /// Phase in radians (XY and readout).
    #[serde(default)]
    pub phase: f64,
    /// Single-sideband frequency in GHz (XY and readout).
    #[serde(default)]
    pub frequency_ghz: f64,
    /// Derivative correction on the envelope (XY only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drag: Option<DragCorrection>,
    pub kind: PulseKind,
}

impl PulseDefinition {
    /// Drive pulse on the XY line.
    pub fn xy(shape: PulseShape, amplitude: f64, width_ns: f64) -> Self {
        Self {
            shape,
            amplitude,
            width_ns,
            phase: 0.0,
            frequency_ghz: 0.0,
            drag: None,
            kind: PulseKind::Xy,
        }
    }

    /// Flux pulse on the Z line.
    pub fn z(shape: PulseShape, amplitude: f64, width_ns: f64) -> Self {
        Self {
            kind: PulseKind::Z,
            ..Self::xy(shape, amplitude, width_ns)
        }
    }

    /// Readout tone; `frequency_ghz` selects the qubit's resonator.
    pub fn readout(shape: PulseShape, amplitude: f64, width_ns: f64) -> Self {
        Self {
            kind: PulseKind::Readout,
            ..Self::xy(shape, amplitude, width_ns)
        }
    }

    pub fn with_phase(mut self, phase: f64) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_frequency(mut self, frequency_ghz: f64) -> Self {
        self.frequency_ghz = frequency_ghz;
        self
    }

    pub fn with_drag(mut self, drag: DragCorrection) -> Self {
        self.drag = Some(drag);
        self
    }

    /// Duration of the non-zero part of the pulse.
    pub fn total_duration_ns(&self) -> f64 {
        self.shape.total_duration(self.width_ns)
    }

    pub fn validate(&self) -> Result<()> {
        self.shape.validate(self.width_ns)?;
        for (name, value) in [
            ("amplitude", self.amplitude),
            ("phase", self.phase),
            ("frequency", self.frequency_ghz),
        ] {
            if !value.is_finite() {
                return Err(PulseError::shape(name, format!("must be finite, got {value}")).into());
            }
        }
        if let Some(drag) = &self.drag {
            drag.validate()?;
        }
        Ok(())
    }

    /// Render the pulse centered at `center_ns` over the whole `axis`.
    ///
    /// `amplitude_scale` multiplies the calibrated amplitude and
    /// `extra_phase` is added to the calibrated phase. XY and readout pulses
    /// get their DRAG correction first, then a non-zero `frequency_ghz` mixes
    /// them up by `exp(i 2 pi f t)`. Z pulses ignore phase, DRAG and
    /// frequency.
    pub fn render(
        &self,
        center_ns: f64,
        axis: &TimeAxis,
        amplitude_scale: f64,
        extra_phase: f64,
    ) -> Result<Waveform> {
        let amplitude = self.amplitude * amplitude_scale;
        match self.kind {
            PulseKind::Z => synthesize(&self.shape, amplitude, center_ns, self.width_ns, 0.0, axis),
            PulseKind::Xy | PulseKind::Readout => {
                let phase = self.phase + extra_phase;
                let mut wf = synthesize(&self.shape, amplitude, center_ns, self.width_ns, phase, axis)?;
                if let Some(drag) = &self.drag {
                    let start_ns = center_ns - 0.5 * self.total_duration_ns();
                    wf = drag.apply(wf, start_ns)?;
                }
                if self.frequency_ghz == 0.0 {
                    return Ok(wf);
                }
                let omega = 2.0 * PI * self.frequency_ghz;
                let mut samples = wf.into_samples();
                for (i, z) in samples.iter_mut().enumerate() {
                    *z *= Complex64::from_polar(1.0, omega * axis.time(i));
                }
                Waveform::new(*axis, samples)
            }
        }
    }
}

/// Pulses implementing the gates of one qubit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QubitPulses {
    /// Calibrated pi rotation about X.
    pub xy: PulseDefinition,
    /// Flux pulse for Z-line gates.
    pub z: PulseDefinition,
    /// Controlled-phase flux pulse when this qubit is the control.
    #[serde(default)]
    pub cphase: Option<PulseDefinition>,
    /// Readout tone of this qubit's resonator.
    #[serde(default)]
    pub readout: Option<PulseDefinition>,
}

impl Default for QubitPulses {
    fn default() -> Self {
        Self {
            xy: PulseDefinition::xy(PulseShape::gaussian(), 0.5, 10.0),
            z: PulseDefinition::z(PulseShape::square(), 0.1, 10.0),
            cphase: Some(PulseDefinition::z(
                PulseShape::cz(0.02, 0.3).with_plateau(20.0),
                0.25,
                20.0,
            )),
            readout: Some(PulseDefinition::readout(PulseShape::square(), 0.1, 500.0)),
        }
    }
}

impl QubitPulses {
    pub fn validate(&self) -> Result<()> {
        check_kind(&self.xy, PulseKind::Xy, "xy")?;
        check_kind(&self.z, PulseKind::Z, "z")?;
        if let Some(cp) = &self.cphase {
            check_kind(cp, PulseKind::Z, "cphase")?;
        }
        if let Some(ro) = &self.readout {
            check_kind(ro, PulseKind::Readout, "readout")?;
        }
        Ok(())
    }
}

fn check_kind(def: &PulseDefinition, expected: PulseKind, slot: &str) -> Result<()> {
    def.validate()?;
    if def.kind != expected {
        return Err(PulseError::shape(
            "kind",
            format!("{slot} pulse must be {:?}, got {:?}", expected, def.kind),
        )
        .into());
    }
    Ok(())
}

/// Pulse calibrations for a register of qubits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PulseLibrary {
    /// Used by qubits without their own entry.
    #[serde(default)]
    pub default: QubitPulses,
    #[serde(default)]
    pub qubits: BTreeMap<usize, QubitPulses>,
}

impl PulseLibrary {
    /// Library where every qubit uses `default`.
    pub fn new(default: QubitPulses) -> Self {
        Self {
            default,
            qubits: BTreeMap::new(),
        }
    }

    /// Set the pulses of one qubit.
    pub fn with_qubit(mut self, qubit: usize, pulses: QubitPulses) -> Self {
        self.insert(qubit, pulses);
        self
    }

    pub fn insert(&mut self, qubit: usize, pulses: QubitPulses) {
        debug!(qubit, xy_shape = pulses.xy.shape.name(), "Setting qubit pulses");
        self.qubits.insert(qubit, pulses);
    }

    /// Pulses for `qubit`, falling back to the default.
    pub fn get(&self, qubit: usize) -> &QubitPulses {
        self.qubits.get(&qubit).unwrap_or(&self.default)
    }

    pub fn xy(&self, qubit: usize) -> &PulseDefinition {
        &self.get(qubit).xy
    }

    pub fn z(&self, qubit: usize) -> &PulseDefinition {
        &self.get(qubit).z
    }

    /// Controlled-phase pulse with `qubit` as control.
    pub fn cphase(&self, qubit: usize) -> Result<&PulseDefinition> {
        self.get(qubit).cphase.as_ref().ok_or_else(|| {
            ValidationError::NotFound {
                kind: "cphase pulse for qubit".into(),
                name: qubit.to_string(),
            }
            .into()
        })
    }

    /// Readout tone of `qubit`.
    pub fn readout(&self, qubit: usize) -> Result<&PulseDefinition> {
        self.get(qubit).readout.as_ref().ok_or_else(|| {
            ValidationError::NotFound {
                kind: "readout pulse for qubit".into(),
                name: qubit.to_string(),
            }
            .into()
        })
    }

    /// Validate the default and every per-qubit entry.
    pub fn validate(&self) -> Result<()> {
        self.default.validate()?;
        for pulses in self.qubits.values() {
            pulses.validate()?;
        }
        Ok(())
    }
}

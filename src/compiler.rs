// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sequence compilation to per-channel waveforms.
//!
//! The pipeline is:
//!
//! 1. synthesize each [`GateOp`] from the [`PulseLibrary`] centered in its
//!    slot plus its line delay, over one time axis spanning the whole
//!    sequence
//! 2. sum pulses per physical channel
//! 3. pre-cancel crosstalk on the flux (Z or Drive) group
//! 4. predistort each channel through its [`FilterChain`], then through
//!    its [`IqCorrection`] where one is set
//! 5. derive the readout trigger and microwave switch markers
//! 6. add the readout IQ offsets
//!
//! Virtual Z gates never reach a channel. They add their angle to the phase
//! of every later XY pulse on the same qubit. Readout tones of all qubits
//! share one `readout_iq` line.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::crosstalk::{compensate, CrosstalkMatrix};
use crate::error::{Error, Result, ValidationError};
use crate::predistortion::{FilterChain, IqCorrection};
use crate::pulse::{PulseDefinition, PulseKind, PulseLibrary};
use crate::sequence::{Alignment, Axis, GateKind, GateOp, Sequence, SequenceParams};
use crate::validation::validate_waveform;
use crate::waveform::{TimeAxis, Waveform};

/// A physical control line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChannelId {
    /// Microwave IQ line of a qubit.
    Xy(usize),
    /// Flux line of a qubit.
    Z(usize),
    /// Single line carrying both XY and Z.
    Drive(usize),
    /// Microwave switch marker of a qubit.
    Gate(usize),
    /// Multiplexed readout tones.
    ReadoutIq,
    /// Digitizer trigger marker.
    ReadoutTrigger,
}

impl ChannelId {
    /// Qubit of a per-qubit line; `None` for the shared readout lines.
    pub fn qubit(&self) -> Option<usize> {
        match *self {
            ChannelId::Xy(q) | ChannelId::Z(q) | ChannelId::Drive(q) | ChannelId::Gate(q) => {
                Some(q)
            }
            ChannelId::ReadoutIq | ChannelId::ReadoutTrigger => None,
        }
    }

    /// Digital marker rather than an analog waveform.
    pub fn is_marker(&self) -> bool {
        matches!(self, ChannelId::Gate(_) | ChannelId::ReadoutTrigger)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::Xy(q) => write!(f, "xy{}", q),
            ChannelId::Z(q) => write!(f, "z{}", q),
            ChannelId::Drive(q) => write!(f, "drive{}", q),
            ChannelId::Gate(q) => write!(f, "gate{}", q),
            ChannelId::ReadoutIq => write!(f, "readout_iq"),
            ChannelId::ReadoutTrigger => write!(f, "readout_trig"),
        }
    }
}

impl FromStr for ChannelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "readout_iq" => return Ok(ChannelId::ReadoutIq),
            "readout_trig" => return Ok(ChannelId::ReadoutTrigger),
            _ => {}
        }
        let (ctor, digits): (fn(usize) -> ChannelId, &str) =
            if let Some(rest) = lower.strip_prefix("drive") {
                (ChannelId::Drive, rest)
            } else if let Some(rest) = lower.strip_prefix("xy") {
                (ChannelId::Xy, rest)
            } else if let Some(rest) = lower.strip_prefix("gate") {
                (ChannelId::Gate, rest)
            } else if let Some(rest) = lower.strip_prefix('z') {
                (ChannelId::Z, rest)
            } else {
                return Err(ValidationError::field(
                    "channel",
                    format!("'{s}' must look like xy0, z0, drive0, gate0 or readout_iq"),
                )
                .into());
            };
        let qubit = digits.parse::<usize>().map_err(|_| {
            ValidationError::field("channel", format!("'{s}' has no qubit index"))
        })?;
        Ok(ctor(qubit))
    }
}

impl TryFrom<String> for ChannelId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ChannelId> for String {
    fn from(channel: ChannelId) -> Self {
        channel.to_string()
    }
}

/// How XY and Z control reach a qubit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLayout {
    /// Separate XY and Z lines per qubit.
    #[default]
    Separate,
    /// One drive line per qubit; XY and Z are summed onto it.
    Combined,
}

impl ChannelLayout {
    pub fn channel(self, qubit: usize, kind: PulseKind) -> ChannelId {
        match (self, kind) {
            (_, PulseKind::Readout) => ChannelId::ReadoutIq,
            (ChannelLayout::Combined, _) => ChannelId::Drive(qubit),
            (ChannelLayout::Separate, PulseKind::Xy) => ChannelId::Xy(qubit),
            (ChannelLayout::Separate, PulseKind::Z) => ChannelId::Z(qubit),
        }
    }

    /// Analog control channels of `qubit`.
    pub fn channels(self, qubit: usize) -> Vec<ChannelId> {
        match self {
            ChannelLayout::Separate => vec![ChannelId::Xy(qubit), ChannelId::Z(qubit)],
            ChannelLayout::Combined => vec![ChannelId::Drive(qubit)],
        }
    }

    /// Channel that crosstalk compensation acts on.
    pub fn flux_channel(self, qubit: usize) -> ChannelId {
        self.channel(qubit, PulseKind::Z)
    }
}

/// Digitizer trigger played when the readout starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadoutTrigger {
    pub amplitude: f64,
    pub duration_ns: f64,
}

impl Default for ReadoutTrigger {
    fn default() -> Self {
        Self {
            amplitude: 1.0,
            duration_ns: 20.0,
        }
    }
}

/// Microwave switch markers opened around every XY pulse.
///
/// The switch opens `overlap_ns` before a pulse and closes `overlap_ns`
/// after it. Closed gaps shorter than `minimal_gap_ns` are bridged, and the
/// whole marker is then shifted by `delay_ns`. A `uniform` switch stays
/// open for the whole sequence, closing only for the readout trigger. In
/// the combined layout the marker follows the drive line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSwitch {
    pub uniform: bool,
    pub overlap_ns: f64,
    pub minimal_gap_ns: f64,
    pub delay_ns: f64,
}

impl Default for GateSwitch {
    fn default() -> Self {
        Self {
            uniform: false,
            overlap_ns: 20.0,
            minimal_gap_ns: 20.0,
            delay_ns: 0.0,
        }
    }
}

/// Compiler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    pub n_qubits: usize,
    /// AWG sample rate in GHz.
    pub sample_rate_ghz: f64,
    /// Idle time before the first gate.
    pub first_delay_ns: f64,
    /// Gap between consecutive steps.
    pub gate_spacing_ns: f64,
    pub alignment: Alignment,
    pub channel_layout: ChannelLayout,
    /// Reject output with samples above this magnitude.
    pub max_amplitude: Option<f64>,
    /// Play the gates of a step in parallel rather than one by one.
    pub simultaneous_pulses: bool,
    /// Close every generated sequence with a readout on all qubits.
    pub readout: bool,
    pub readout_delay_ns: f64,
    pub readout_trigger: Option<ReadoutTrigger>,
    /// DC offset added to the real part of `readout_iq`.
    pub readout_i_offset: f64,
    /// DC offset added to the imaginary part of `readout_iq`.
    pub readout_q_offset: f64,
    pub gate_switch: Option<GateSwitch>,
    /// Cable delay of each qubit's XY line. Missing qubits have none.
    pub xy_delays_ns: BTreeMap<usize, f64>,
    /// Cable delay of each qubit's Z line.
    pub z_delays_ns: BTreeMap<usize, f64>,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            n_qubits: 1,
            sample_rate_ghz: 1.2,
            first_delay_ns: 100.0,
            gate_spacing_ns: 0.0,
            alignment: Alignment::Center,
            channel_layout: ChannelLayout::Separate,
            max_amplitude: None,
            simultaneous_pulses: true,
            readout: false,
            readout_delay_ns: 0.0,
            readout_trigger: None,
            readout_i_offset: 0.0,
            readout_q_offset: 0.0,
            gate_switch: None,
            xy_delays_ns: BTreeMap::new(),
            z_delays_ns: BTreeMap::new(),
        }
    }
}

/// Line delays shifted so the smallest is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct LineDelays {
    xy: Vec<f64>,
    z: Vec<f64>,
}

impl LineDelays {
    /// Delay of the line `kind` plays on. Readout tones are not delayed.
    pub fn delay_ns(&self, qubit: usize, kind: PulseKind) -> f64 {
        let delays = match kind {
            PulseKind::Xy => &self.xy,
            PulseKind::Z => &self.z,
            PulseKind::Readout => return 0.0,
        };
        delays.get(qubit).copied().unwrap_or(0.0)
    }

    /// Largest delay, by which the sequence end is pushed out.
    pub fn max_ns(&self) -> f64 {
        self.xy.iter().chain(&self.z).copied().fold(0.0, f64::max)
    }
}

impl CompilerSettings {
    /// Parameters for sequence generation.
    pub fn sequence_params(&self) -> SequenceParams {
        SequenceParams {
            n_qubits: self.n_qubits,
            gate_spacing_ns: self.gate_spacing_ns,
            alignment: self.alignment,
            simultaneous: self.simultaneous_pulses,
            readout: self.readout,
            readout_delay_ns: self.readout_delay_ns,
        }
    }

    /// XY and Z delays of qubits `0..n_qubits`, normalized together.
    pub fn line_delays(&self, n_qubits: usize) -> LineDelays {
        let lookup = |map: &BTreeMap<usize, f64>| -> Vec<f64> {
            (0..n_qubits)
                .map(|q| map.get(&q).copied().unwrap_or(0.0))
                .collect()
        };
        let mut xy = lookup(&self.xy_delays_ns);
        let mut z = lookup(&self.z_delays_ns);
        let min = xy.iter().chain(&z).copied().fold(f64::INFINITY, f64::min);
        if min.is_finite() {
            for d in xy.iter_mut().chain(z.iter_mut()) {
                *d -= min;
            }
        }
        LineDelays { xy, z }
    }

    pub fn validate(&self) -> Result<()> {
        self.sequence_params().validate()?;
        if !self.sample_rate_ghz.is_finite() || self.sample_rate_ghz <= 0.0 {
            return Err(ValidationError::field(
                "compiler.sample_rate_ghz",
                format!("must be positive, got {}", self.sample_rate_ghz),
            )
            .into());
        }
        if !self.first_delay_ns.is_finite() || self.first_delay_ns < 0.0 {
            return Err(ValidationError::field(
                "compiler.first_delay_ns",
                format!("must be non-negative, got {}", self.first_delay_ns),
            )
            .into());
        }
        if let Some(max) = self.max_amplitude {
            if !max.is_finite() || max <= 0.0 {
                return Err(ValidationError::field(
                    "compiler.max_amplitude",
                    format!("must be positive, got {max}"),
                )
                .into());
            }
        }
        if let Some(trigger) = &self.readout_trigger {
            check_positive("compiler.readout_trigger.duration_ns", trigger.duration_ns)?;
            check_finite("compiler.readout_trigger.amplitude", trigger.amplitude)?;
        }
        if let Some(switch) = &self.gate_switch {
            check_non_negative("compiler.gate_switch.overlap_ns", switch.overlap_ns)?;
            check_non_negative("compiler.gate_switch.minimal_gap_ns", switch.minimal_gap_ns)?;
            check_finite("compiler.gate_switch.delay_ns", switch.delay_ns)?;
        }
        check_finite("compiler.readout_i_offset", self.readout_i_offset)?;
        check_finite("compiler.readout_q_offset", self.readout_q_offset)?;
        for (q, d) in self.xy_delays_ns.iter().chain(&self.z_delays_ns) {
            check_finite(&format!("compiler delay of qubit {q}"), *d)?;
        }
        Ok(())
    }
}

fn check_finite(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(ValidationError::field(field, format!("must be finite, got {value}")).into());
    }
    Ok(())
}

fn check_non_negative(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(
            ValidationError::field(field, format!("must be non-negative, got {value}")).into(),
        );
    }
    Ok(())
}

fn check_positive(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::field(field, format!("must be positive, got {value}")).into());
    }
    Ok(())
}

/// Turns sequences into per-channel waveforms.
#[derive(Debug, Clone)]
pub struct SequenceCompiler {
    settings: CompilerSettings,
    library: PulseLibrary,
    crosstalk: Option<CrosstalkMatrix>,
    filters: BTreeMap<ChannelId, FilterChain>,
    iq_corrections: BTreeMap<ChannelId, IqCorrection>,
}

impl SequenceCompiler {
    pub fn new(settings: CompilerSettings, library: PulseLibrary) -> Self {
        Self {
            settings,
            library,
            crosstalk: None,
            filters: BTreeMap::new(),
            iq_corrections: BTreeMap::new(),
        }
    }

    /// Compensate flux crosstalk with `matrix`.
    pub fn with_crosstalk(mut self, matrix: CrosstalkMatrix) -> Self {
        self.crosstalk = Some(matrix);
        self
    }

    /// Predistort `channel` with `chain`.
    pub fn with_filter(mut self, channel: ChannelId, chain: FilterChain) -> Self {
        self.filters.insert(channel, chain);
        self
    }

    pub fn with_filters(mut self, filters: BTreeMap<ChannelId, FilterChain>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Correct the I/Q response of `channel` after its filter chain.
    pub fn with_iq_correction(mut self, channel: ChannelId, correction: IqCorrection) -> Self {
        self.iq_corrections.insert(channel, correction);
        self
    }

    pub fn with_iq_corrections(mut self, corrections: BTreeMap<ChannelId, IqCorrection>) -> Self {
        self.iq_corrections.extend(corrections);
        self
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    pub fn library(&self) -> &PulseLibrary {
        &self.library
    }

    pub fn crosstalk(&self) -> Option<&CrosstalkMatrix> {
        self.crosstalk.as_ref()
    }

    /// Time axis for `sequence`: starts at 0, covers `first_delay_ns`, the
    /// sequence and the largest line delay, with an even number of samples.
    pub fn time_axis(&self, sequence: &Sequence) -> Result<TimeAxis> {
        let end = self.settings.first_delay_ns
            + sequence.total_duration_ns()
            + self.settings.line_delays(sequence.n_qubits()).max_ns();
        // Tolerance keeps exact multiples of dt from gaining a sample
        let mut n_pts = (end * self.settings.sample_rate_ghz - 1e-9).ceil().max(0.0) as usize + 1;
        if n_pts % 2 == 1 {
            n_pts += 1;
        }
        TimeAxis::from_sample_rate(self.settings.sample_rate_ghz, n_pts)
    }

    /// Compile `sequence` into one waveform per channel.
    ///
    /// Every channel of every qubit in `0..n_qubits` is present, plus the
    /// flux channels of any other qubit the crosstalk matrix covers.
    /// `readout_iq` is present when the sequence reads out, `readout_trig`
    /// when it does and a trigger is configured, and one `gate` marker per
    /// qubit when a switch is configured. All waveforms share one axis.
    ///
    /// # Errors
    ///
    /// - `OverlapViolation` if two ops collide on a qubit
    /// - `InvalidShapeParameter` from pulse synthesis
    /// - `SingularCrosstalkMatrix` from compensation
    /// - `Validation` if the settings are invalid, a CPhase pulse is
    ///   missing, or output exceeds `max_amplitude`
    pub fn compile(&self, sequence: &Sequence) -> Result<BTreeMap<ChannelId, Waveform>> {
        self.settings.validate()?;
        sequence.validate()?;

        let axis = self.time_axis(sequence)?;
        let layout = self.settings.channel_layout;
        info!(
            ops = sequence.len(),
            qubits = sequence.n_qubits(),
            samples = axis.len,
            sample_rate_ghz = axis.sample_rate_ghz(),
            "Compiling sequence"
        );

        let mut lines: BTreeMap<ChannelId, Array1<Complex64>> = (0..sequence.n_qubits())
            .flat_map(|q| layout.channels(q))
            .map(|ch| (ch, Array1::zeros(axis.len)))
            .collect();

        let mut ops: Vec<&GateOp> = sequence.ops().iter().collect();
        ops.sort_by(|a, b| a.start_ns.total_cmp(&b.start_ns));

        let delays = self.settings.line_delays(sequence.n_qubits());
        let mut frame_phase = vec![0.0; sequence.n_qubits()];
        for op in ops {
            if let GateKind::Rotation {
                axis: Axis::Z,
                angle,
            } = op.kind
            {
                frame_phase[op.qubit] += angle;
                continue;
            }
            let kind = op.kind.line().unwrap_or(PulseKind::Xy);
            let center =
                self.settings.first_delay_ns + op.center_ns() + delays.delay_ns(op.qubit, kind);
            let Some(wf) = self.render(op, center, &axis, frame_phase[op.qubit])? else {
                continue;
            };
            let channel = layout.channel(op.qubit, kind);
            let line = lines
                .entry(channel)
                .or_insert_with(|| Array1::zeros(axis.len));
            *line += wf.samples();
        }

        let mut out = lines
            .into_iter()
            .map(|(ch, samples)| Waveform::new(axis, samples).map(|wf| (ch, wf)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        if let Some(matrix) = &self.crosstalk {
            self.compensate_flux(&mut out, matrix, sequence.n_qubits())?;
        }

        for (channel, chain) in &self.filters {
            match out.get_mut(channel) {
                Some(wf) => *wf = chain.apply(wf)?,
                None => warn!(channel = %channel, "Predistortion configured for absent channel"),
            }
        }
        for (channel, correction) in &self.iq_corrections {
            match out.get_mut(channel) {
                Some(wf) => *wf = correction.apply(wf)?,
                None => warn!(channel = %channel, "I/Q correction configured for absent channel"),
            }
        }

        self.add_markers(&mut out, sequence.n_qubits())?;

        let offset = Complex64::new(self.settings.readout_i_offset, self.settings.readout_q_offset);
        if offset != Complex64::new(0.0, 0.0) {
            if let Some(iq) = out.get_mut(&ChannelId::ReadoutIq) {
                let samples = iq.samples() + offset;
                *iq = Waveform::new(axis, samples)?;
            }
        }

        if let Some(max) = self.settings.max_amplitude {
            for (channel, wf) in out.iter().filter(|(ch, _)| !ch.is_marker()) {
                validate_waveform(&channel.to_string(), wf, max)?;
            }
        }

        info!(
            channels = out.len(),
            duration_ns = axis.duration_ns(),
            "Sequence compiled"
        );
        Ok(out)
    }

    /// Waveform for one op centered at `center`, or `None` if it plays
    /// nothing.
    fn render(
        &self,
        op: &GateOp,
        center: f64,
        axis: &TimeAxis,
        frame_phase: f64,
    ) -> Result<Option<Waveform>> {
        let wf = match op.kind {
            GateKind::Rotation { axis: Axis::Z, .. } | GateKind::Identity => return Ok(None),
            GateKind::Rotation {
                axis: rot_axis,
                angle,
            } => {
                let mut phase = frame_phase;
                if rot_axis == Axis::Y {
                    phase += PI / 2.0;
                }
                if angle < 0.0 {
                    phase += PI;
                }
                self.library
                    .xy(op.qubit)
                    .render(center, axis, angle.abs() / PI, phase)?
            }
            GateKind::ZPulse { scale } => self.library.z(op.qubit).render(center, axis, scale, 0.0)?,
            GateKind::CPhase { .. } => self
                .library
                .cphase(op.qubit)?
                .render(center, axis, 1.0, 0.0)?,
            GateKind::Drive {
                amplitude,
                plateau_ns,
                phase,
            } => {
                let xy = self.library.xy(op.qubit);
                let def = PulseDefinition {
                    shape: xy.shape.with_plateau(plateau_ns),
                    amplitude,
                    phase,
                    ..xy.clone()
                };
                def.render(center, axis, 1.0, frame_phase)?
            }
            GateKind::Readout => self
                .library
                .readout(op.qubit)?
                .render(center, axis, 1.0, 0.0)?,
        };
        debug!(qubit = op.qubit, gate = %op.kind, center_ns = center, "Rendered gate");
        Ok(Some(wf))
    }

    /// Readout trigger and microwave switch markers, computed from the
    /// predistorted lines.
    fn add_markers(&self, out: &mut BTreeMap<ChannelId, Waveform>, n_qubits: usize) -> Result<()> {
        let trigger = self.settings.readout_trigger;
        let mut trigger_used = false;
        if let Some(trigger) = &trigger {
            if let Some(iq) = out.get(&ChannelId::ReadoutIq) {
                let marker = trigger_marker(iq, trigger)?;
                out.insert(ChannelId::ReadoutTrigger, marker);
                trigger_used = true;
            }
        }

        let Some(switch) = &self.settings.gate_switch else {
            return Ok(());
        };
        let trigger = trigger.filter(|_| trigger_used);
        for qubit in 0..n_qubits {
            let source = self.settings.channel_layout.channel(qubit, PulseKind::Xy);
            if let Some(wf) = out.get(&source) {
                let marker = switch_marker(wf, switch, trigger.as_ref())?;
                out.insert(ChannelId::Gate(qubit), marker);
            }
        }
        Ok(())
    }

    fn compensate_flux(
        &self,
        out: &mut BTreeMap<ChannelId, Waveform>,
        matrix: &CrosstalkMatrix,
        n_qubits: usize,
    ) -> Result<()> {
        let layout = self.settings.channel_layout;
        let intended: BTreeMap<usize, Waveform> = matrix
            .qubits()
            .iter()
            .filter(|&&q| q < n_qubits)
            .filter_map(|&q| {
                out.get(&layout.flux_channel(q))
                    .map(|wf| (q, wf.clone()))
            })
            .collect();
        if intended.is_empty() {
            return Ok(());
        }
        for (qubit, wf) in compensate(&intended, matrix)? {
            out.insert(layout.flux_channel(qubit), wf);
        }
        Ok(())
    }
}

/// Marker at `trigger.amplitude` from the first non-zero sample of `iq`
/// for `trigger.duration_ns`. The first and last samples are always low.
fn trigger_marker(iq: &Waveform, trigger: &ReadoutTrigger) -> Result<Waveform> {
    let axis = *iq.axis();
    let n = axis.len;
    let mut marker = vec![0.0; n];
    if let Some(start) = iq.samples().iter().position(|z| z.norm() > 0.0) {
        let len = (trigger.duration_ns * axis.sample_rate_ghz()).round() as usize;
        let end = (start + len).min(n);
        marker[start..end].fill(trigger.amplitude);
    }
    close_ends(&mut marker);
    Waveform::from_real(axis, &marker)
}

/// Switch marker for the XY line `wf`.
fn switch_marker(
    wf: &Waveform,
    switch: &GateSwitch,
    trigger: Option<&ReadoutTrigger>,
) -> Result<Waveform> {
    let axis = *wf.axis();
    let sample_rate = axis.sample_rate_ghz();
    let n = axis.len;

    let mut gate: Vec<bool> = if switch.uniform {
        let mut gate = vec![true; n];
        if let Some(trigger) = trigger {
            let closed =
                ((trigger.duration_ns - switch.overlap_ns - switch.delay_ns) * sample_rate).round();
            if closed > 0.0 {
                let closed = (closed as usize).min(n);
                gate[n - closed..].fill(false);
            }
        }
        gate
    } else {
        let mut gate: Vec<bool> = wf.samples().iter().map(|z| z.norm() > 0.0).collect();
        let n_overlap = (switch.overlap_ns * sample_rate).round() as usize;
        let (ups, downs) = edges(&gate);
        for i in ups {
            gate[i.saturating_sub(n_overlap)..=i].fill(true);
        }
        for i in downs {
            let end = (i + n_overlap).min(n - 1);
            gate[i..=end].fill(true);
        }

        let (mut ups, downs) = edges(&gate);
        if gate.first() == Some(&false) && !ups.is_empty() {
            ups.remove(0);
        }
        let min_gap = switch.minimal_gap_ns * sample_rate;
        for (&down, &up) in downs.iter().zip(&ups) {
            if ((up - down) as f64) < min_gap {
                gate[down..=up].fill(true);
            }
        }
        gate
    };

    let shift = (switch.delay_ns * sample_rate).round() as i64;
    if shift != 0 {
        let k = (shift.unsigned_abs() as usize).min(n);
        if shift > 0 {
            gate.rotate_right(k);
            gate[..k].fill(false);
        } else {
            gate.rotate_left(k);
            gate[n - k..].fill(false);
        }
    }

    let mut marker: Vec<f64> = gate.iter().map(|&open| if open { 1.0 } else { 0.0 }).collect();
    close_ends(&mut marker);
    Waveform::from_real(axis, &marker)
}

/// Indices `i` where the marker rises (`i` low, `i + 1` high) and falls.
fn edges(gate: &[bool]) -> (Vec<usize>, Vec<usize>) {
    let mut ups = Vec::new();
    let mut downs = Vec::new();
    for (i, pair) in gate.windows(2).enumerate() {
        match (pair[0], pair[1]) {
            (false, true) => ups.push(i),
            (true, false) => downs.push(i),
            _ => {}
        }
    }
    (ups, downs)
}

fn close_ends(marker: &mut [f64]) {
    if let Some(first) = marker.first_mut() {
        *first = 0.0;
    }
    if let Some(last) = marker.last_mut() {
        *last = 0.0;
    }
}

/// Compile with the default pulse library and settings at `sample_rate_ghz`.
pub fn compile_sequence(
    sequence: &Sequence,
    crosstalk_matrix: Option<&CrosstalkMatrix>,
    kernels: &BTreeMap<ChannelId, FilterChain>,
    sample_rate_ghz: f64,
) -> Result<BTreeMap<ChannelId, Waveform>> {
    let settings = CompilerSettings {
        n_qubits: sequence.n_qubits(),
        sample_rate_ghz,
        ..CompilerSettings::default()
    };
    let mut compiler =
        SequenceCompiler::new(settings, PulseLibrary::default()).with_filters(kernels.clone());
    if let Some(matrix) = crosstalk_matrix {
        compiler = compiler.with_crosstalk(matrix.clone());
    }
    compiler.compile(sequence)
}

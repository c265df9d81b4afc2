// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-sample mixing of qubit control waveforms.

use std::collections::BTreeMap;

use ndarray::{Array2, Axis};
use num_complex::Complex64;
use tracing::{debug, info};

use super::matrix::CrosstalkMatrix;
use crate::error::{PulseError, Result};
use crate::waveform::{TimeAxis, Waveform};

/// Pre-cancel crosstalk: `corrected = M^-1 * intended` at every sample.
///
/// Every input waveform must share one time axis. Qubits covered by the
/// matrix but missing from `channel_waveforms` are driven with zero
/// intended amplitude; their corrected waveforms are still emitted since
/// they carry the cancellation signal for their neighbours.
///
/// # Errors
///
/// - `AxisMismatch` if the input axes differ or an input qubit is not
///   covered by the matrix
/// - `SingularCrosstalkMatrix` if `matrix` cannot be inverted safely
pub fn compensate(
    channel_waveforms: &BTreeMap<usize, Waveform>,
    matrix: &CrosstalkMatrix,
) -> Result<BTreeMap<usize, Waveform>> {
    let inverse = matrix.inverse()?;
    let out = mix(channel_waveforms, matrix, &inverse)?;
    info!(
        qubits = matrix.len(),
        inputs = channel_waveforms.len(),
        "Applied crosstalk compensation"
    );
    Ok(out)
}

/// Forward crosstalk model: what the lines carry after leakage, `M * v`.
///
/// `apply_crosstalk(compensate(v, M), M)` recovers `v`.
pub fn apply_crosstalk(
    channel_waveforms: &BTreeMap<usize, Waveform>,
    matrix: &CrosstalkMatrix,
) -> Result<BTreeMap<usize, Waveform>> {
    mix(channel_waveforms, matrix, matrix.matrix())
}

fn mix(
    channel_waveforms: &BTreeMap<usize, Waveform>,
    matrix: &CrosstalkMatrix,
    mixing: &Array2<f64>,
) -> Result<BTreeMap<usize, Waveform>> {
    let axis = match shared_axis(channel_waveforms)? {
        Some(axis) => axis,
        None => return Ok(BTreeMap::new()),
    };

    // Stack rows in matrix order; absent qubits stay zero.
    let mut stacked = Array2::<Complex64>::zeros((matrix.len(), axis.len));
    for (&qubit, wf) in channel_waveforms {
        let row = matrix.index_of(qubit).ok_or_else(|| {
            PulseError::AxisMismatch(format!(
                "qubit {qubit} has a waveform but no row in the crosstalk matrix {:?}",
                matrix.qubits()
            ))
        })?;
        stacked.row_mut(row).assign(wf.samples());
    }

    let mixing = mixing.mapv(|v| Complex64::new(v, 0.0));
    let mixed = mixing.dot(&stacked);
    debug!(lines = matrix.len(), samples = axis.len, "Mixed control lines");

    matrix
        .qubits()
        .iter()
        .zip(mixed.axis_iter(Axis(0)))
        .map(|(&qubit, row)| Waveform::new(axis, row.to_owned()).map(|wf| (qubit, wf)))
        .collect()
}

/// The axis every waveform shares, or `None` for an empty map.
fn shared_axis(channel_waveforms: &BTreeMap<usize, Waveform>) -> Result<Option<TimeAxis>> {
    let mut iter = channel_waveforms.iter();
    let (first_qubit, first) = match iter.next() {
        Some(entry) => entry,
        None => return Ok(None),
    };
    for (qubit, wf) in iter {
        first.axis().ensure_matches(
            wf.axis(),
            &format!("qubit {first_qubit} and qubit {qubit} waveforms"),
        )?;
    }
    Ok(Some(*first.axis()))
}

// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Input validation for waveforms and sampled arrays.

use num_complex::Complex64;

use crate::error::{Result, ValidationError};
use crate::waveform::Waveform;

/// Validate compiled waveform data against the DAC range.
pub fn validate_waveform(field: &str, waveform: &Waveform, max_amplitude: f64) -> Result<()> {
    for (i, val) in waveform.samples().iter().enumerate() {
        check_sample(field, i, val, max_amplitude)?;
    }
    Ok(())
}

/// Validate complex samples.
pub fn validate_samples(field: &str, samples: &[Complex64], max_amplitude: f64) -> Result<()> {
    for (i, val) in samples.iter().enumerate() {
        check_sample(field, i, val, max_amplitude)?;
    }
    Ok(())
}

fn check_sample(field: &str, i: usize, val: &Complex64, max_amplitude: f64) -> Result<()> {
    if val.re.is_nan() || val.im.is_nan() {
        return Err(ValidationError::Field {
            field: field.into(),
            message: format!("contains NaN at index {}", i),
        }
        .into());
    }
    if val.re.is_infinite() || val.im.is_infinite() {
        return Err(ValidationError::Field {
            field: field.into(),
            message: format!("contains Inf at index {}", i),
        }
        .into());
    }
    if val.norm() > max_amplitude {
        return Err(ValidationError::Field {
            field: field.into(),
            message: format!(
                "amplitude {:.6} at index {} exceeds max {}",
                val.norm(),
                i,
                max_amplitude
            ),
        }
        .into());
    }
    Ok(())
}

/// Validate a sampled real array (Hamiltonian parameters, I/Q data).
pub fn validate_finite(field: &str, values: &[f64]) -> Result<()> {
    for (i, val) in values.iter().enumerate() {
        if val.is_nan() {
            return Err(ValidationError::Field {
                field: field.into(),
                message: format!("contains NaN at index {}", i),
            }
            .into());
        }
        if val.is_infinite() {
            return Err(ValidationError::Field {
                field: field.into(),
                message: format!("contains Inf at index {}", i),
            }
            .into());
        }
    }
    Ok(())
}

/// Validate a time vector: non-empty, finite and strictly increasing.
///
/// Spacing may vary; the propagator steps by each interval separately.
pub fn validate_time_samples(field: &str, times: &[f64]) -> Result<()> {
    if times.is_empty() {
        return Err(ValidationError::Field {
            field: field.into(),
            message: "must contain at least one sample".into(),
        }
        .into());
    }
    validate_finite(field, times)?;
    for (i, pair) in times.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            return Err(ValidationError::Field {
                field: field.into(),
                message: format!(
                    "not strictly increasing at index {} ({} -> {})",
                    i + 1,
                    pair[0],
                    pair[1]
                ),
            }
            .into());
        }
    }
    Ok(())
}

/// Validate an output decimation factor.
pub fn validate_decimation(decimation: usize) -> Result<()> {
    if decimation == 0 {
        return Err(ValidationError::Field {
            field: "decimation".into(),
            message: "must be at least 1".into(),
        }
        .into());
    }
    Ok(())
}

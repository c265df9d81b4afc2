// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for pulse generation and propagation.

use std::fmt;

/// Result type alias for pulse-generation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug)]
pub enum Error {
    /// Configuration error
    Config(String),
    /// Pulse pipeline error
    Pulse(PulseError),
    /// Validation error
    Validation(ValidationError),
    /// IO error
    Io(std::io::Error),
    /// Serialization error
    Serialization(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Pulse(e) => write!(f, "Pulse error: {}", e),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Pulse(e) => Some(e),
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<PulseError> for Error {
    fn from(e: PulseError) -> Self {
        Error::Pulse(e)
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Failures raised by the synthesis pipeline.
///
/// All of these indicate a sequence-authoring or calibration bug. None
/// of them are transient.
#[derive(Debug, Clone, PartialEq)]
pub enum PulseError {
    /// Malformed pulse parameters (negative width, non-finite amplitude, ...)
    InvalidShapeParameter { parameter: String, message: String },
    /// Waveforms or arrays with differing time axes
    AxisMismatch(String),
    /// Two gates scheduled on the same qubit at conflicting times
    OverlapViolation {
        qubit: usize,
        first: String,
        second: String,
    },
    /// Non-invertible or ill-conditioned crosstalk matrix
    SingularCrosstalkMatrix(String),
}

impl PulseError {
    pub(crate) fn shape(parameter: &str, message: impl Into<String>) -> Self {
        PulseError::InvalidShapeParameter {
            parameter: parameter.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for PulseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PulseError::InvalidShapeParameter { parameter, message } => {
                write!(f, "Invalid shape parameter '{}': {}", parameter, message)
            }
            PulseError::AxisMismatch(msg) => write!(f, "Time axis mismatch: {}", msg),
            PulseError::OverlapViolation {
                qubit,
                first,
                second,
            } => write!(
                f,
                "Overlap on qubit {}: {} conflicts with {}",
                qubit, first, second
            ),
            PulseError::SingularCrosstalkMatrix(msg) => {
                write!(f, "Singular crosstalk matrix: {}", msg)
            }
        }
    }
}

impl std::error::Error for PulseError {}

/// Validation errors for configuration and call parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Field validation failed
    Field { field: String, message: String },
    /// Unknown name looked up in a registry or map
    NotFound { kind: String, name: String },
}

impl ValidationError {
    pub(crate) fn field(field: &str, message: impl Into<String>) -> Self {
        ValidationError::Field {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Field { field, message } => {
                write!(f, "Field '{}': {}", field, message)
            }
            ValidationError::NotFound { kind, name } => {
                write!(f, "Unknown {}: {}", kind, name)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

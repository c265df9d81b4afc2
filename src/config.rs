// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration management for the pulse generator.
//!
//! Configuration is loaded from multiple sources with the following priority
//! (later sources override earlier ones):
//!
//! 1. Built-in defaults
//! 2. config.yaml file
//! 3. Environment variables (PULSEGEN_*)
//! 4. CLI arguments
//!
//! A minimal file:
//!
//! ```yaml
//! compiler:
//!   n_qubits: 2
//!   sample_rate_ghz: 2.0
//! crosstalk:
//!   enabled: true
//!   matrix: [[1.0, 0.05], [0.02, 1.0]]
//! predistortion:
//!   z0:
//!     - { type: fir, taps: [1.05, -0.05] }
//! iq_correction:
//!   xy0:
//!     response: step_response_xy0.json
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::{debug, warn};

use crate::compiler::{ChannelId, ChannelLayout, CompilerSettings, SequenceCompiler};
use crate::crosstalk::{CrosstalkMatrix, DEFAULT_MAX_CONDITION_NUMBER};
use crate::error::{Error, Result};
use crate::predistortion::{
    BandLimit, FilterChain, IqCorrection, IqTransfer, Kernel, ResponseSmoothing, StepResponse,
};
use crate::propagator::{DriveSimulator, SimulatorConfig};
use crate::pulse::PulseLibrary;

/// Locations tried when no path is given.
const DEFAULT_PATHS: &[&str] = &[
    "pulsegen.yaml",
    "config.yaml",
    "config.yml",
    "/etc/qubit-pulsegen/config.yaml",
];

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Timing, sample rate and channel layout
    #[serde(default)]
    pub compiler: CompilerSettings,

    /// Pulse calibrations
    #[serde(default)]
    pub qubits: PulseLibrary,

    /// Flux crosstalk compensation
    #[serde(default)]
    pub crosstalk: CrosstalkConfig,

    /// Predistortion kernels per channel, applied in order
    #[serde(default)]
    pub predistortion: BTreeMap<ChannelId, Vec<Kernel>>,

    /// I/Q response corrections per channel, applied after the kernels
    #[serde(default)]
    pub iq_correction: BTreeMap<ChannelId, IqCorrectionConfig>,

    /// Two-level simulator parameters
    #[serde(default)]
    pub simulator: SimulatorConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        // Load from file if specified
        if let Some(path) = config_path {
            if path.exists() {
                config = Self::from_file(path)?;
            } else {
                warn!(path = %path.display(), "Config file not found, using defaults");
            }
        } else {
            // Try default locations
            for path in DEFAULT_PATHS {
                let path = Path::new(path);
                if path.exists() {
                    config = Self::from_file(path)?;
                    break;
                }
            }
        }

        // Override with environment variables
        config.apply_env_overrides()?;

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Reading configuration");
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(val) = env_parse::<usize>("PULSEGEN_N_QUBITS")? {
            self.compiler.n_qubits = val;
        }
        if let Some(val) = env_parse::<f64>("PULSEGEN_SAMPLE_RATE_GHZ")? {
            self.compiler.sample_rate_ghz = val;
        }
        if let Some(val) = env_parse::<f64>("PULSEGEN_FIRST_DELAY_NS")? {
            self.compiler.first_delay_ns = val;
        }
        if let Some(val) = env_parse::<f64>("PULSEGEN_GATE_SPACING_NS")? {
            self.compiler.gate_spacing_ns = val;
        }
        if let Ok(val) = env::var("PULSEGEN_CHANNEL_LAYOUT") {
            self.compiler.channel_layout = match val.to_lowercase().as_str() {
                "separate" => ChannelLayout::Separate,
                "combined" => ChannelLayout::Combined,
                other => {
                    return Err(Error::Config(format!(
                        "PULSEGEN_CHANNEL_LAYOUT must be 'separate' or 'combined', got '{other}'"
                    )))
                }
            };
        }
        if let Ok(val) = env::var("PULSEGEN_CROSSTALK_ENABLED") {
            self.crosstalk.enabled = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(val) = env::var("PULSEGEN_LOG_LEVEL") {
            self.logging.level = val;
        }
        Ok(())
    }

    /// Validate configuration.
    ///
    /// Builds every derived object once, so a configuration that passes
    /// here also builds a compiler and a simulator.
    pub fn validate(&self) -> Result<()> {
        self.compiler.validate()?;
        self.qubits.validate()?;
        if let Some(matrix) = self.crosstalk_matrix()? {
            // Fail on singular matrices before compiling
            matrix.inverse()?;
        }
        for (channel, kernels) in &self.predistortion {
            if channel.qubit().is_some_and(|q| q >= self.compiler.n_qubits) {
                warn!(%channel, n_qubits = self.compiler.n_qubits, "Predistortion for a channel outside the register");
            }
            for kernel in kernels {
                kernel.validate()?;
            }
        }
        self.iq_corrections()?;
        self.simulator.validate()?;
        if !matches!(
            self.logging.level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(Error::Config(format!(
                "unknown log level '{}'",
                self.logging.level
            )));
        }
        if !self.logging.is_json() && !self.logging.format.eq_ignore_ascii_case("text") {
            return Err(Error::Config(format!(
                "log format must be 'text' or 'json', got '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// The pulse library.
    pub fn pulse_library(&self) -> PulseLibrary {
        self.qubits.clone()
    }

    /// Crosstalk matrix, or `None` when compensation is disabled.
    pub fn crosstalk_matrix(&self) -> Result<Option<CrosstalkMatrix>> {
        if !self.crosstalk.enabled {
            return Ok(None);
        }
        self.crosstalk.build().map(Some)
    }

    /// Filter chains per channel.
    pub fn filters(&self) -> BTreeMap<ChannelId, FilterChain> {
        self.predistortion
            .iter()
            .map(|(channel, kernels)| (*channel, FilterChain::from_kernels(kernels.clone())))
            .collect()
    }

    /// I/Q corrections per channel, each built from its response file.
    pub fn iq_corrections(&self) -> Result<BTreeMap<ChannelId, IqCorrection>> {
        self.iq_correction
            .iter()
            .map(|(channel, entry)| entry.build().map(|correction| (*channel, correction)))
            .collect()
    }

    /// Compiler with crosstalk and predistortion wired in.
    pub fn compiler(&self) -> Result<SequenceCompiler> {
        self.compiler.validate()?;
        self.qubits.validate()?;
        let mut compiler = SequenceCompiler::new(self.compiler.clone(), self.pulse_library())
            .with_filters(self.filters())
            .with_iq_corrections(self.iq_corrections()?);
        if let Some(matrix) = self.crosstalk_matrix()? {
            compiler = compiler.with_crosstalk(matrix);
        }
        Ok(compiler)
    }

    /// Simulator for the configured qubit.
    pub fn simulator(&self) -> Result<DriveSimulator> {
        DriveSimulator::new(self.simulator.clone())
    }
}

/// Read and parse `name`, `None` when unset.
fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{name} has invalid value '{val}'"))),
        Err(_) => Ok(None),
    }
}

/// Flux crosstalk configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrosstalkConfig {
    /// Enable compensation
    #[serde(default)]
    pub enabled: bool,

    /// Row `i` is how much each line leaks into qubit `i`
    #[serde(default)]
    pub matrix: Vec<Vec<f64>>,

    /// Qubit id of each row; defaults to `0..n`
    #[serde(default)]
    pub qubits: Option<Vec<usize>>,

    /// Refuse to invert matrices worse conditioned than this
    #[serde(default = "default_max_condition_number")]
    pub max_condition_number: f64,
}

fn default_max_condition_number() -> f64 {
    DEFAULT_MAX_CONDITION_NUMBER
}

impl Default for CrosstalkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            matrix: Vec::new(),
            qubits: None,
            max_condition_number: default_max_condition_number(),
        }
    }
}

impl CrosstalkConfig {
    /// Build the matrix regardless of `enabled`.
    pub fn build(&self) -> Result<CrosstalkMatrix> {
        if self.matrix.is_empty() {
            return Err(Error::Config(
                "crosstalk is enabled but no matrix is configured".into(),
            ));
        }
        if !(self.max_condition_number.is_finite() && self.max_condition_number >= 1.0) {
            return Err(Error::Config(format!(
                "crosstalk.max_condition_number must be at least 1, got {}",
                self.max_condition_number
            )));
        }
        let matrix = match &self.qubits {
            None => CrosstalkMatrix::from_rows(&self.matrix)?,
            Some(qubits) => {
                let n = self.matrix.len();
                if self.matrix.iter().any(|row| row.len() != n) {
                    return Err(Error::Config("crosstalk.matrix must be square".into()));
                }
                let flat: Vec<f64> = self.matrix.iter().flatten().copied().collect();
                let array = Array2::from_shape_vec((n, n), flat)
                    .map_err(|e| Error::Config(format!("crosstalk.matrix: {e}")))?;
                CrosstalkMatrix::new(qubits.clone(), array)?
            }
        };
        Ok(matrix.with_max_condition_number(self.max_condition_number))
    }
}

/// Measured step response of one channel and how to turn it into a
/// correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IqCorrectionConfig {
    /// JSON file with `times_ns`, `i` and `q`; complex samples are
    /// `[re, im]` pairs
    pub response: PathBuf,

    #[serde(default)]
    pub smoothing: ResponseSmoothing,

    #[serde(default)]
    pub band: BandLimit,
}

impl IqCorrectionConfig {
    pub fn build(&self) -> Result<IqCorrection> {
        debug!(path = %self.response.display(), "Reading step response");
        let content = std::fs::read_to_string(&self.response)?;
        let response: StepResponse = serde_json::from_str(&content)?;
        IqTransfer::from_step_response(&response, &self.smoothing, &self.band)?.correction()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json or text)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Emit one JSON object per event.
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

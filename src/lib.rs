// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! QubitOS Pulse Generator
//!
//! Compiles gate sequences for a register of flux-tunable qubits into
//! baseband AWG waveforms, and propagates a driven two-level system to
//! check them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Sequence registry (rabi, cpmg, t1..)  │
//! ├─────────────────────────────────────────┤
//! │   Sequence builder  ->  gate schedule   │
//! ├─────────────────────────────────────────┤
//! │   Compiler                              │
//! │   pulse library -> channel sum          │
//! │   -> crosstalk -> predistortion         │
//! ├─────────────────────────────────────────┤
//! │   Per-channel waveforms                 │
//! ├─────────────────────────────────────────┤
//! │   Two-level propagator (verification)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`waveform`]: Sampled complex waveforms on a uniform time axis
//! - [`pulse`]: Envelope shapes and per-qubit pulse calibrations
//! - [`sequence`]: Gates, scheduling and built-in sequences
//! - [`compiler`]: Sequence to per-channel waveforms
//! - [`crosstalk`]: Flux crosstalk matrices and compensation
//! - [`predistortion`]: FIR/IIR correction of line response and I/Q
//!   transfer-function correction
//! - [`propagator`]: Two-level Schrödinger propagation
//! - [`config`]: Configuration management
//! - [`validation`]: Input validation utilities
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```
//! use qubit_pulsegen::compiler::{ChannelId, CompilerSettings, SequenceCompiler};
//! use qubit_pulsegen::pulse::PulseLibrary;
//! use qubit_pulsegen::sequence::{GateSequence, SequenceRegistry};
//!
//! let compiler = SequenceCompiler::new(CompilerSettings::default(), PulseLibrary::default());
//! let registry = SequenceRegistry::with_builtins();
//! let rabi = registry.get("rabi").unwrap();
//! let sequence = rabi
//!     .generate(&compiler.settings().sequence_params(), compiler.library())
//!     .unwrap();
//! let channels = compiler.compile(&sequence).unwrap();
//! assert!(channels[&ChannelId::Xy(0)].peak_amplitude() > 0.0);
//! ```

pub mod compiler;
pub mod config;
pub mod crosstalk;
pub mod error;
pub mod predistortion;
pub mod propagator;
pub mod pulse;
pub mod sequence;
pub mod validation;
pub mod waveform;

pub use compiler::compile_sequence;
pub use config::Config;
pub use error::{Error, Result};
pub use propagator::{propagate_two_level, to_rotating_frame};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

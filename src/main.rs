// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! QubitOS Pulse Generator CLI
//!
//! Compiles registered gate sequences into AWG waveforms and simulates
//! their effect on a single qubit.
//!
//! # Usage
//!
//! ```bash
//! # List available sequences
//! pulsegen sequences
//!
//! # Compile a sequence with a custom config
//! pulsegen compile rabi --config /path/to/config.yaml
//!
//! # Dump the waveforms as JSON
//! pulsegen compile ramsey --json > ramsey.json
//!
//! # Simulate qubit 0 under a compiled sequence
//! pulsegen simulate rabi --qubit 0
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use qubit_pulsegen::compiler::{ChannelId, ChannelLayout};
use qubit_pulsegen::config::{Config, LoggingConfig};
use qubit_pulsegen::sequence::{GateSequence, SequenceRegistry};
use qubit_pulsegen::{Error, Result, VERSION};

/// QubitOS pulse generator
#[derive(Parser)]
#[command(name = "pulsegen")]
#[command(author = "QubitOS Contributors")]
#[command(version = VERSION)]
#[command(about = "Compile gate sequences to AWG waveforms and simulate them")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true, env = "PULSEGEN_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a sequence to per-channel waveforms
    Compile {
        /// Registered sequence name
        sequence: String,

        /// Number of qubits
        #[arg(short, long)]
        n_qubits: Option<usize>,

        /// Print waveforms as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Compile a sequence and simulate one qubit's drive
    Simulate {
        /// Registered sequence name
        sequence: String,

        /// Qubit whose XY channel drives the simulator
        #[arg(short, long, default_value_t = 0)]
        qubit: usize,

        /// Print the full trace as JSON instead of the final state
        #[arg(long)]
        json: bool,
    },

    /// List available sequences
    Sequences,

    /// Show effective configuration
    Config,

    /// Validate configuration file
    Validate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    // Initialize logging
    init_logging(&config.logging);

    let registry = SequenceRegistry::with_builtins();

    match cli.command {
        Commands::Compile {
            sequence,
            n_qubits,
            json,
        } => {
            if let Some(n) = n_qubits {
                config.compiler.n_qubits = n;
            }
            config.validate()?;

            let compiler = config.compiler()?;
            let generator = registry.get(&sequence)?;
            let seq = generator.generate(&compiler.settings().sequence_params(), compiler.library())?;
            let waveforms = compiler.compile(&seq)?;

            info!(
                version = VERSION,
                sequence = %sequence,
                ops = seq.len(),
                channels = waveforms.len(),
                "Compiled sequence"
            );

            if json {
                println!("{}", serde_json::to_string_pretty(&waveforms)?);
            } else {
                println!(
                    "{}: {} gates, {:.3} ns",
                    sequence,
                    seq.len(),
                    seq.total_duration_ns()
                );
                for (channel, wf) in &waveforms {
                    println!(
                        "  {:<8} {:>7} samples @ {:.3} GHz  peak {:.4}",
                        channel.to_string(),
                        wf.len(),
                        wf.axis().sample_rate_ghz(),
                        wf.peak_amplitude()
                    );
                }
            }
        }

        Commands::Simulate {
            sequence,
            qubit,
            json,
        } => {
            if qubit >= config.compiler.n_qubits {
                config.compiler.n_qubits = qubit + 1;
            }
            config.validate()?;

            let compiler = config.compiler()?;
            let simulator = config.simulator()?;
            let generator = registry.get(&sequence)?;
            let seq = generator.generate(&compiler.settings().sequence_params(), compiler.library())?;
            let waveforms = compiler.compile(&seq)?;

            let channel = match config.compiler.channel_layout {
                ChannelLayout::Separate => ChannelId::Xy(qubit),
                ChannelLayout::Combined => ChannelId::Drive(qubit),
            };
            let drive = waveforms.get(&channel).ok_or_else(|| {
                Error::Config(format!("compiled sequence has no channel {channel}"))
            })?;
            let result = simulator.simulate(drive)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "{} on qubit {}: {} samples every {:.4} ns",
                    sequence,
                    qubit,
                    result.len(),
                    result.output_step_ns
                );
                if let Some(last) = result.len().checked_sub(1) {
                    println!(
                        "  final  pz {:+.6}  px {:+.6}  py {:+.6}",
                        result.pz[last], result.px[last], result.py[last]
                    );
                }
                println!("  max norm drift {:.3e}", result.max_norm_drift);
            }
        }

        Commands::Sequences => {
            println!("Available sequences:");
            for name in registry.list() {
                let description = registry
                    .get(&name)
                    .map(|s| s.description().to_string())
                    .unwrap_or_default();
                println!("  {:<12} {}", name, description);
            }
        }

        Commands::Config => {
            // Show effective configuration
            println!("{}", serde_yaml::to_string(&config)?);
        }

        Commands::Validate => {
            // Validate configuration
            match config.validate() {
                Ok(()) => {
                    println!("Configuration is valid");
                }
                Err(e) => {
                    eprintln!("Configuration error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

/// Initialize logging with tracing.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.is_json() {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

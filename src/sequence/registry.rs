// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Named sequence registry.
//!
//! The registry is thread-safe; built-in sequences are registered by
//! [`SequenceRegistry::with_builtins`] and further ones can be added at
//! runtime.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::builtin::{Cpmg, PulseTrain, Rabi, SpinLocking, T1};
use super::gate::GateKind;
use super::GateSequence;
use crate::error::{Result, ValidationError};

/// Registry of [`GateSequence`]s by name.
///
/// # Example
///
/// ```ignore
/// use qubit_pulsegen::sequence::{SequenceParams, SequenceRegistry};
/// use qubit_pulsegen::pulse::PulseLibrary;
///
/// let registry = SequenceRegistry::with_builtins();
/// let ramsey = registry.get("ramsey")?;
/// let seq = ramsey.generate(&SequenceParams::default(), &PulseLibrary::default())?;
/// ```
pub struct SequenceRegistry {
    sequences: RwLock<HashMap<String, Arc<dyn GateSequence>>>,
}

impl SequenceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sequences: RwLock::new(HashMap::new()),
        }
    }

    /// Registry holding the built-in sequences with default parameters.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(Rabi));
        registry.register(Arc::new(Cpmg::new(1, 1000.0)));
        registry.register(Arc::new(Cpmg::ramsey(1000.0)));
        registry.register(Arc::new(Cpmg::echo(1000.0)));
        registry.register(Arc::new(T1::new(1000.0)));
        registry.register(Arc::new(PulseTrain::new(GateKind::xp(), 1)));
        registry.register(Arc::new(SpinLocking::new(0.1, 1000.0)));
        registry
    }

    /// Register a sequence, replacing any with the same name.
    pub fn register(&self, sequence: Arc<dyn GateSequence>) {
        let name = sequence.name().to_string();
        info!(sequence = %name, "Registering sequence");
        self.sequences.write().insert(name, sequence);
    }

    /// Get a sequence by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn GateSequence>> {
        self.sequences.read().get(name).cloned().ok_or_else(|| {
            ValidationError::NotFound {
                kind: "sequence".to_string(),
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sequences.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sequences.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sequences.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove a sequence.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn GateSequence>> {
        let removed = self.sequences.write().remove(name);
        if removed.is_some() {
            info!(sequence = %name, "Unregistered sequence");
        }
        removed
    }
}

impl Default for SequenceRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

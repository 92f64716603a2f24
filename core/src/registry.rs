//! The resolved method table of one client.
//!
//! # Design
//! Every reachable method is one `MethodEntry` tagged with where it came
//! from and how it runs. Layers are applied in precedence order (native,
//! then config, then override) and a later layer replaces an earlier entry
//! of the same name, so after construction each name has exactly one active
//! implementation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::artifact::{MethodHandler, Signature};
use crate::resolver::ResolvedDto;
use crate::synth::SynthesizedMethod;

/// Where an entry was defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Native,
    Config,
    Override { artifact: String },
}

/// How an entry runs.
#[derive(Clone)]
pub enum Implementation {
    ConfigDefault(SynthesizedMethod),
    Custom(Arc<dyn MethodHandler>),
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Implementation::ConfigDefault(method) => f.debug_tuple("ConfigDefault").field(method).finish(),
            Implementation::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub name: String,
    pub origin: Origin,
    pub signature: Signature,
    pub implementation: Implementation,
    pub dto: Option<ResolvedDto>,
}

impl MethodEntry {
    /// Entry for a config-synthesized default. The signature is derived from
    /// the definition: untyped params in declared order and a generated doc.
    pub fn config_default(method: SynthesizedMethod) -> Self {
        let definition = method.definition();
        let mut signature = Signature::new().doc(format!(
            "Call the \"{}\" endpoint with parameters: [{}].",
            definition.endpoint,
            definition.params.join(", ")
        ));
        for param in &definition.params {
            signature = signature.untyped_param(param.clone());
        }
        Self {
            name: definition.method_name.clone(),
            origin: Origin::Config,
            signature,
            dto: method.dto().cloned(),
            implementation: Implementation::ConfigDefault(method),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    entries: BTreeMap<String, MethodEntry>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from layers given lowest precedence first.
    pub fn from_layers<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Vec<MethodEntry>>,
    {
        let mut table = Self::new();
        for layer in layers {
            for entry in layer {
                table.insert(entry);
            }
        }
        table
    }

    /// Insert `entry`, replacing any entry of the same name.
    pub fn insert(&mut self, entry: MethodEntry) -> Option<MethodEntry> {
        let replaced = self.entries.insert(entry.name.clone(), entry);
        if let Some(old) = &replaced {
            tracing::debug!(method = %old.name, shadowed = ?old.origin, "method shadowed");
        }
        replaced
    }

    pub fn get(&self, name: &str) -> Option<&MethodEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &MethodEntry> {
        self.entries.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

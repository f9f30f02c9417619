//! Organ adapters: the independent scoring modules the loop consults each cycle.
//!
//! An organ sees a read-only snapshot of the occasions and returns a
//! coherence, a lure and atom activations. Organs never mutate occasions;
//! the engine writes affordances after every organ for the cycle returns.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::error::{ConfigError, OrganError};
use crate::occasion::Occasion;

/// One organ's evaluation for one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganResult {
    pub coherence: f64,
    pub lure: f64,
    /// Turn-level activations, felt by every occasion.
    pub atom_activations: BTreeMap<String, f64>,
    /// Activations attributed to specific occasion positions.
    pub positional: BTreeMap<usize, BTreeMap<String, f64>>,
}

impl OrganResult {
    pub fn new(coherence: f64, lure: f64) -> Self {
        Self {
            coherence,
            lure,
            ..Default::default()
        }
    }

    pub fn with_activation(mut self, atom: &str, activation: f64) -> Self {
        self.atom_activations.insert(atom.to_string(), activation);
        self
    }

    pub fn with_positional(mut self, position: usize, atom: &str, activation: f64) -> Self {
        self.positional
            .entry(position)
            .or_default()
            .insert(atom.to_string(), activation);
        self
    }

    /// Reject non-finite or out-of-range scalar outputs.
    pub fn validate(&self, organ: &str) -> Result<(), OrganError> {
        let invalid = |message: String| OrganError::InvalidOutput {
            organ: organ.to_string(),
            message,
        };
        for (name, v) in [("coherence", self.coherence), ("lure", self.lure)] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(invalid(format!("{name} {v} outside [0, 1]")));
            }
        }
        let activations = self
            .atom_activations
            .iter()
            .chain(self.positional.values().flat_map(|m| m.iter()));
        for (atom, v) in activations {
            if !v.is_finite() {
                return Err(invalid(format!("activation for '{atom}' is not finite")));
            }
        }
        Ok(())
    }
}

/// The organ adapter contract. Implementations must be side-effect free and
/// total: return a result or a typed failure, never block.
pub trait Organ: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, occasions: &[Occasion], cycle: u32) -> Result<OrganResult, OrganError>;
}

/// Static, validated list of organs in registration order.
#[derive(Clone, Default)]
pub struct OrganRegistry {
    organs: Vec<Arc<dyn Organ>>,
}

impl OrganRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, organ: Arc<dyn Organ>) -> Result<(), ConfigError> {
        let name = organ.name();
        if name.trim().is_empty() {
            return Err(ConfigError::InvalidOrgan {
                organ: name.to_string(),
                message: "organ name is empty".into(),
            });
        }
        if self.contains(name) {
            return Err(ConfigError::DuplicateOrgan(name.to_string()));
        }
        self.organs.push(organ);
        Ok(())
    }

    pub fn from_organs(
        organs: impl IntoIterator<Item = Arc<dyn Organ>>,
    ) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for organ in organs {
            registry.register(organ)?;
        }
        Ok(registry)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.organs.iter().any(|o| o.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.organs.iter().map(|o| o.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Organ>> {
        self.organs.iter()
    }

    pub fn len(&self) -> usize {
        self.organs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.organs.is_empty()
    }
}

/// Per-turn failure bookkeeping. An organ that fails `limit` cycles in a row
/// sits out the remainder of the turn.
#[derive(Debug)]
pub struct OrganHealth {
    limit: u32,
    streaks: BTreeMap<String, u32>,
    excluded: HashSet<String>,
}

impl OrganHealth {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            streaks: BTreeMap::new(),
            excluded: HashSet::new(),
        }
    }

    pub fn is_excluded(&self, organ: &str) -> bool {
        self.excluded.contains(organ)
    }

    pub fn record_success(&mut self, organ: &str) {
        self.streaks.remove(organ);
    }

    /// Returns true when this failure escalates the organ to exclusion.
    pub fn record_failure(&mut self, organ: &str) -> bool {
        let streak = self.streaks.entry(organ.to_string()).or_default();
        *streak += 1;
        if *streak >= self.limit && self.excluded.insert(organ.to_string()) {
            return true;
        }
        false
    }

    pub fn excluded(&self) -> Vec<String> {
        let mut names: Vec<String> = self.excluded.iter().cloned().collect();
        names.sort();
        names
    }
}

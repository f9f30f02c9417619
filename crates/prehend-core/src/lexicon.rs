//! Data-driven organ: a keyword table mapping tokens to weighted atoms.
//!
//! The keyword content itself is configuration; this module only defines how
//! a table turns into coherence, lure and positional activations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, OrganError};
use crate::occasion::Occasion;
use crate::organ::{Organ, OrganResult};
use crate::stats::mean;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub keyword: String,
    pub atom: String,
    pub weight: f64,
}

/// Serialized form of a lexicon organ (`[[organ]]` in a profile).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconSpec {
    pub name: String,
    #[serde(default = "default_lure")]
    pub base_lure: f64,
    #[serde(default, rename = "entry")]
    pub entries: Vec<LexiconEntry>,
}

fn default_lure() -> f64 {
    1.0
}

pub struct LexiconOrgan {
    name: String,
    base_lure: f64,
    table: BTreeMap<String, Vec<(String, f64)>>,
}

impl LexiconOrgan {
    pub fn from_spec(spec: &LexiconSpec) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidOrgan {
            organ: spec.name.clone(),
            message,
        };
        if !(0.0..=1.0).contains(&spec.base_lure) {
            return Err(invalid(format!("base_lure {} outside [0, 1]", spec.base_lure)));
        }

        let mut table: BTreeMap<String, Vec<(String, f64)>> = BTreeMap::new();
        for entry in &spec.entries {
            let keyword = entry.keyword.trim().to_lowercase();
            if keyword.is_empty() || entry.atom.trim().is_empty() {
                return Err(invalid("entry with empty keyword or atom".into()));
            }
            if !(0.0..=1.0).contains(&entry.weight) {
                return Err(invalid(format!(
                    "weight {} for '{keyword}' outside [0, 1]",
                    entry.weight
                )));
            }
            table
                .entry(keyword)
                .or_default()
                .push((entry.atom.clone(), entry.weight));
        }

        Ok(Self {
            name: spec.name.clone(),
            base_lure: spec.base_lure,
            table,
        })
    }

    pub fn atoms(&self) -> Vec<&str> {
        let mut atoms: Vec<&str> = self
            .table
            .values()
            .flatten()
            .map(|(a, _)| a.as_str())
            .collect();
        atoms.sort_unstable();
        atoms.dedup();
        atoms
    }
}

impl Organ for LexiconOrgan {
    fn name(&self) -> &str {
        &self.name
    }

    /// Coherence is the mean best-match weight per occasion (unmatched tokens
    /// count as 0). Lure is the strongest weight scaled by the batch's mean
    /// energy, so it fades as the turn settles.
    fn evaluate(&self, occasions: &[Occasion], _cycle: u32) -> Result<OrganResult, OrganError> {
        if occasions.is_empty() {
            return Err(OrganError::Evaluation {
                organ: self.name.clone(),
                message: "no occasions to evaluate".into(),
            });
        }

        let mut result = OrganResult::default();
        let mut best_per_occasion = Vec::with_capacity(occasions.len());

        for occ in occasions {
            let mut best = 0.0f64;
            if let Some(hits) = self.table.get(&occ.datum.to_lowercase()) {
                let slot = result.positional.entry(occ.position).or_default();
                for (atom, weight) in hits {
                    let current = slot.entry(atom.clone()).or_insert(0.0);
                    *current = current.max(*weight);
                    best = best.max(*weight);
                }
            }
            best_per_occasion.push(best);
        }

        let energies: Vec<f64> = occasions.iter().map(|o| o.v0_energy).collect();
        let strongest = best_per_occasion.iter().copied().fold(0.0, f64::max);

        result.coherence = mean(&best_per_occasion).clamp(0.0, 1.0);
        result.lure = (self.base_lure * strongest * mean(&energies)).clamp(0.0, 1.0);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spec() -> LexiconSpec {
        LexiconSpec {
            name: "listening".into(),
            base_lure: 1.0,
            entries: vec![
                LexiconEntry { keyword: "Hear".into(), atom: "presence".into(), weight: 0.8 },
                LexiconEntry { keyword: "hear".into(), atom: "attention".into(), weight: 0.4 },
                LexiconEntry { keyword: "alone".into(), atom: "presence".into(), weight: 0.6 },
            ],
        }
    }

    fn occs(words: &[&str]) -> Vec<Occasion> {
        words
            .iter()
            .enumerate()
            .map(|(i, w)| Occasion::new(w.to_string(), i, Vec::new()))
            .collect()
    }

    #[test]
    fn test_positional_matches() {
        let organ = LexiconOrgan::from_spec(&spec()).unwrap();
        let r = organ.evaluate(&occs(&["i", "hear", "you"]), 1).unwrap();
        assert_eq!(r.positional.len(), 1);
        let at1 = &r.positional[&1];
        assert_eq!(at1["presence"], 0.8);
        assert_eq!(at1["attention"], 0.4);
        assert!(r.atom_activations.is_empty());
    }

    #[test]
    fn test_coherence_and_lure() {
        let organ = LexiconOrgan::from_spec(&spec()).unwrap();
        let r = organ.evaluate(&occs(&["hear", "alone"]), 1).unwrap();
        assert_relative_eq!(r.coherence, 0.7, epsilon = 1e-12);
        // Fresh occasions have energy 1.0.
        assert_relative_eq!(r.lure, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_no_match_zero_coherence() {
        let organ = LexiconOrgan::from_spec(&spec()).unwrap();
        let r = organ.evaluate(&occs(&["weather"]), 1).unwrap();
        assert_eq!(r.coherence, 0.0);
        assert_eq!(r.lure, 0.0);
        assert!(r.positional.is_empty());
    }

    #[test]
    fn test_empty_batch_is_error() {
        let organ = LexiconOrgan::from_spec(&spec()).unwrap();
        assert!(organ.evaluate(&[], 1).is_err());
    }

    #[test]
    fn test_bad_weight_rejected() {
        let mut s = spec();
        s.entries[0].weight = 1.5;
        assert!(LexiconOrgan::from_spec(&s).is_err());
    }

    #[test]
    fn test_atoms_deduplicated() {
        let organ = LexiconOrgan::from_spec(&spec()).unwrap();
        assert_eq!(organ.atoms(), vec!["attention", "presence"]);
    }
}

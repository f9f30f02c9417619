use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::occasion::FeltAffordance;
use crate::stats::{mean, stable_sum};

/// A matured, confidence-weighted signal for one atom of one occasion.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Proposition {
    pub atom: String,
    /// Mean affordance confidence times the Kairos bonus. May exceed 1.0.
    pub confidence: f64,
    /// The occasion's final energy.
    pub felt_energy: f64,
    pub organ_sources: BTreeSet<String>,
    /// Σ confidence · lure over the group.
    pub intersection_strength: f64,
    /// confidence · (1 − felt_energy)
    pub emission_priority: f64,
}

/// Group affordances by atom and fold each group into a proposition.
///
/// `bonus` is already resolved by the caller (1.0 unless Kairos fired).
/// Output is ordered by atom name.
pub fn mature_affordances(
    affordances: &[FeltAffordance],
    felt_energy: f64,
    bonus: f64,
) -> Vec<Proposition> {
    let mut groups: BTreeMap<&str, Vec<&FeltAffordance>> = BTreeMap::new();
    for a in affordances {
        groups.entry(a.atom.as_str()).or_default().push(a);
    }

    groups
        .into_iter()
        .map(|(atom, group)| {
            let confidences: Vec<f64> = group.iter().map(|a| a.confidence).collect();
            let weighted: Vec<f64> = group
                .iter()
                .map(|a| a.confidence * a.lure_intensity)
                .collect();
            let confidence = mean(&confidences) * bonus;
            Proposition {
                atom: atom.to_string(),
                confidence,
                felt_energy,
                organ_sources: group.iter().map(|a| a.organ.clone()).collect(),
                intersection_strength: stable_sum(&weighted),
                emission_priority: confidence * (1.0 - felt_energy),
            }
        })
        .collect()
}

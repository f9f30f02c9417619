//! Semantic field aggregation: collapse every occasion's propositions into one
//! field per organ, plus one activation per shared meta-atom.
//!
//! Activations are the mean confidence of contributing propositions, capped at
//! 1.0. All means go through [`crate::stats`] so the result does not depend on
//! the order propositions were visited in.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::meta_atom::MetaAtomTable;
use crate::occasion::Occasion;
use crate::stats::mean;

/// Per-organ coherence and lure observed across the cycle loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganTrace {
    pub coherences: Vec<f64>,
    pub lures: Vec<f64>,
}

impl OrganTrace {
    pub fn record(&mut self, coherence: f64, lure: f64) {
        self.coherences.push(coherence);
        self.lures.push(lure);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticField {
    pub organ: String,
    pub coherence: f64,
    pub lure: f64,
    pub atom_activations: BTreeMap<String, f64>,
    /// Mean felt energy of the propositions behind each activation.
    pub atom_energy: BTreeMap<String, f64>,
}

impl SemanticField {
    pub fn activation(&self, atom: &str) -> f64 {
        self.atom_activations.get(atom).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldSet {
    /// One field per registered organ, in registration order.
    pub organs: Vec<SemanticField>,
    pub meta_activations: BTreeMap<String, f64>,
}

impl FieldSet {
    pub fn field(&self, organ: &str) -> Option<&SemanticField> {
        self.organs.iter().find(|f| f.organ == organ)
    }
}

fn normalize(confidence: f64) -> f64 {
    confidence.clamp(0.0, 1.0)
}

/// Build the field set from matured occasions.
pub fn aggregate(
    occasions: &[Occasion],
    organ_names: &[&str],
    traces: &BTreeMap<String, OrganTrace>,
    meta_atoms: &MetaAtomTable,
) -> FieldSet {
    let organs = organ_names
        .iter()
        .map(|&organ| {
            let mut confidences: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
            let mut energies: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
            for prop in occasions.iter().flat_map(|o| o.mature_propositions()) {
                if prop.organ_sources.contains(organ) {
                    confidences.entry(prop.atom.as_str()).or_default().push(prop.confidence);
                    energies.entry(prop.atom.as_str()).or_default().push(prop.felt_energy);
                }
            }

            let trace = traces.get(organ);
            SemanticField {
                organ: organ.to_string(),
                coherence: trace.map(|t| mean(&t.coherences)).unwrap_or(0.0),
                lure: trace.map(|t| mean(&t.lures)).unwrap_or(0.0),
                atom_activations: confidences
                    .into_iter()
                    .map(|(atom, c)| (atom.to_string(), normalize(mean(&c))))
                    .collect(),
                atom_energy: energies
                    .into_iter()
                    .map(|(atom, e)| (atom.to_string(), mean(&e)))
                    .collect(),
            }
        })
        .collect();

    let mut meta_activations = BTreeMap::new();
    for spec in meta_atoms.iter() {
        let confidences: Vec<f64> = occasions
            .iter()
            .flat_map(|o| o.mature_propositions())
            .filter(|p| p.atom == spec.atom)
            .map(|p| p.confidence)
            .collect();
        if !confidences.is_empty() {
            meta_activations.insert(spec.atom.clone(), normalize(mean(&confidences)));
        }
    }

    FieldSet {
        organs,
        meta_activations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta_atom::{ActivationRule, MetaAtomSpec};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn matured(position: usize, felt: &[(&str, &str, f64)], kairos: bool) -> Occasion {
        let mut occ = Occasion::new(format!("t{position}"), position, Vec::new());
        occ.kairos_detected = kairos;
        for (organ, atom, c) in felt {
            occ.feel(organ, atom, *c, 0.5, 1);
        }
        occ.v0_energy = 0.4;
        occ.mature(1.5).unwrap();
        occ
    }

    fn table() -> MetaAtomTable {
        MetaAtomTable::new(
            vec![MetaAtomSpec {
                atom: "care".into(),
                organs: vec!["empathy".into(), "listening".into()],
                rule: ActivationRule::Any,
                expression: None,
            }],
            &["empathy", "listening"],
        )
        .unwrap()
    }

    #[test]
    fn test_field_per_organ_in_registry_order() {
        let occs = vec![
            matured(0, &[("empathy", "care", 0.6)], false),
            matured(1, &[("listening", "care", 0.4)], false),
        ];
        let fields = aggregate(&occs, &["listening", "empathy"], &BTreeMap::new(), &table());
        assert_eq!(fields.organs[0].organ, "listening");
        assert_relative_eq!(fields.organs[0].activation("care"), 0.4, epsilon = 1e-12);
        assert_relative_eq!(fields.organs[1].activation("care"), 0.6, epsilon = 1e-12);
        assert_relative_eq!(fields.meta_activations["care"], 0.5, epsilon = 1e-12);
        assert_relative_eq!(fields.organs[1].atom_energy["care"], 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_kairos_confidence_is_capped() {
        let occs = vec![matured(0, &[("empathy", "care", 0.9)], true)];
        let fields = aggregate(&occs, &["empathy"], &BTreeMap::new(), &table());
        assert_eq!(fields.organs[0].activation("care"), 1.0);
    }

    #[test]
    fn test_trace_means_carried_forward() {
        let mut traces = BTreeMap::new();
        let mut t = OrganTrace::default();
        t.record(0.2, 0.6);
        t.record(0.4, 0.2);
        traces.insert("empathy".to_string(), t);
        let fields = aggregate(&[], &["empathy", "listening"], &traces, &table());
        assert_relative_eq!(fields.organs[0].coherence, 0.3, epsilon = 1e-12);
        assert_relative_eq!(fields.organs[0].lure, 0.4, epsilon = 1e-12);
        assert_eq!(fields.organs[1].coherence, 0.0);
        assert!(fields.organs[1].atom_activations.is_empty());
    }

    proptest! {
        #[test]
        fn prop_aggregation_ignores_occasion_order(
            confidences in proptest::collection::vec(0.0f64..=1.0, 1..8),
        ) {
            let occs: Vec<Occasion> = confidences
                .iter()
                .enumerate()
                .map(|(i, c)| matured(i, &[("empathy", "care", *c)], false))
                .collect();
            let mut reversed = occs.clone();
            reversed.reverse();

            let a = aggregate(&occs, &["empathy"], &BTreeMap::new(), &table());
            let b = aggregate(&reversed, &["empathy"], &BTreeMap::new(), &table());
            prop_assert_eq!(
                a.organs[0].activation("care").to_bits(),
                b.organs[0].activation("care").to_bits()
            );
            prop_assert_eq!(
                a.meta_activations["care"].to_bits(),
                b.meta_activations["care"].to_bits()
            );
        }
    }
}

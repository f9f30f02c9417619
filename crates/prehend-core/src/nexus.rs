use std::collections::BTreeSet;

use serde::Serialize;

use crate::config::NexusConfig;
use crate::field::FieldSet;
use crate::meta_atom::MetaAtomTable;
use crate::stats::{mean, population_stddev, stable_sum};

/// A realized cross-organ intersection for one meta-atom.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Nexus {
    pub atom: String,
    pub participants: BTreeSet<String>,
    /// Σ participant activations.
    pub intersection_strength: f64,
    /// 1 − stddev(participant activations).
    pub agreement: f64,
    /// intersection_strength · agreement
    pub emission_readiness: f64,
    /// Mean felt energy behind the participants' activations.
    pub felt_energy: f64,
    pub expression: Option<String>,
}

/// Form nexuses from the field set, in meta-atom table order.
///
/// An organ qualifies for a meta-atom when it is listed as a contributor and
/// its field activation is at or above `activation_threshold`. A nexus forms
/// when the qualifying count reaches both the engine floor and the atom's
/// rule. Atoms that fall short are simply skipped.
pub fn compose_nexuses(fields: &FieldSet, table: &MetaAtomTable, config: &NexusConfig) -> Vec<Nexus> {
    let mut nexuses = Vec::new();

    for spec in table.iter() {
        let mut participants = BTreeSet::new();
        let mut activations = Vec::new();
        let mut energies = Vec::new();

        for organ in &spec.organs {
            let Some(field) = fields.field(organ) else {
                continue;
            };
            let activation = field.activation(&spec.atom);
            if activation >= config.activation_threshold {
                participants.insert(organ.clone());
                activations.push(activation);
                energies.push(field.atom_energy.get(&spec.atom).copied().unwrap_or(1.0));
            }
        }

        let required = config.min_participants.max(spec.rule_requirement());
        if participants.len() < required {
            continue;
        }

        let intersection_strength = stable_sum(&activations);
        let agreement = (1.0 - population_stddev(&activations)).clamp(0.0, 1.0);
        nexuses.push(Nexus {
            atom: spec.atom.clone(),
            participants,
            intersection_strength,
            agreement,
            emission_readiness: intersection_strength * agreement,
            felt_energy: mean(&energies),
            expression: spec.expression.clone(),
        });
    }

    nexuses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::SemanticField;
    use crate::meta_atom::{ActivationRule, MetaAtomSpec};
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    const ORGANS: [&str; 3] = ["listening", "empathy", "wisdom"];

    fn field(organ: &str, atoms: &[(&str, f64)]) -> SemanticField {
        SemanticField {
            organ: organ.to_string(),
            coherence: 0.5,
            lure: 0.5,
            atom_activations: atoms.iter().map(|(a, v)| (a.to_string(), *v)).collect(),
            atom_energy: atoms.iter().map(|(a, _)| (a.to_string(), 0.5)).collect(),
        }
    }

    fn table(rule: ActivationRule, organs: &[&str]) -> MetaAtomTable {
        MetaAtomTable::new(
            vec![MetaAtomSpec {
                atom: "X".into(),
                organs: organs.iter().map(|s| s.to_string()).collect(),
                rule,
                expression: None,
            }],
            &ORGANS,
        )
        .unwrap()
    }

    fn fields(values: &[(&str, f64)]) -> FieldSet {
        FieldSet {
            organs: values.iter().map(|(o, v)| field(o, &[("X", *v)])).collect(),
            meta_activations: BTreeMap::new(),
        }
    }

    #[test]
    fn test_two_organ_nexus() {
        let nexuses = compose_nexuses(
            &fields(&[("listening", 0.6), ("empathy", 0.7)]),
            &table(ActivationRule::Any, &["listening", "empathy"]),
            &NexusConfig::default(),
        );
        assert_eq!(nexuses.len(), 1);
        let n = &nexuses[0];
        assert_relative_eq!(n.intersection_strength, 1.3, epsilon = 1e-12);
        assert_relative_eq!(n.agreement, 0.95, epsilon = 1e-12);
        assert_relative_eq!(n.emission_readiness, 1.3 * 0.95, epsilon = 1e-12);
        assert_eq!(n.participants.len(), 2);
    }

    #[test]
    fn test_single_qualifier_forms_nothing() {
        let nexuses = compose_nexuses(
            &fields(&[("listening", 0.9), ("empathy", 0.01)]),
            &table(ActivationRule::Any, &["listening", "empathy"]),
            &NexusConfig::default(),
        );
        assert!(nexuses.is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let nexuses = compose_nexuses(
            &fields(&[("listening", 0.05), ("empathy", 0.05)]),
            &table(ActivationRule::Any, &["listening", "empathy"]),
            &NexusConfig::default(),
        );
        assert_eq!(nexuses.len(), 1);
    }

    #[test]
    fn test_non_contributor_ignored() {
        let nexuses = compose_nexuses(
            &fields(&[("listening", 0.6), ("wisdom", 0.7)]),
            &table(ActivationRule::Any, &["listening", "empathy"]),
            &NexusConfig::default(),
        );
        assert!(nexuses.is_empty());
    }

    #[test]
    fn test_all_rule_needs_every_organ() {
        let t = table(ActivationRule::All, &ORGANS);
        let partial = fields(&[("listening", 0.6), ("empathy", 0.7), ("wisdom", 0.0)]);
        assert!(compose_nexuses(&partial, &t, &NexusConfig::default()).is_empty());
        let full = fields(&[("listening", 0.6), ("empathy", 0.7), ("wisdom", 0.2)]);
        assert_eq!(compose_nexuses(&full, &t, &NexusConfig::default()).len(), 1);
    }

    #[test]
    fn test_n_of_m_rule() {
        let t = table(ActivationRule::ThresholdNOfM { n: 3 }, &ORGANS);
        let two = fields(&[("listening", 0.6), ("empathy", 0.7), ("wisdom", 0.0)]);
        assert!(compose_nexuses(&two, &t, &NexusConfig::default()).is_empty());
    }

    #[test]
    fn test_participants_exclude_non_qualifiers() {
        let nexuses = compose_nexuses(
            &fields(&[("listening", 0.6), ("empathy", 0.7), ("wisdom", 0.01)]),
            &table(ActivationRule::Any, &ORGANS),
            &NexusConfig::default(),
        );
        assert_eq!(nexuses.len(), 1);
        assert!(!nexuses[0].participants.contains("wisdom"));
        assert_relative_eq!(nexuses[0].intersection_strength, 1.3, epsilon = 1e-12);
    }

    proptest! {
        // Exhaustive iff check: a nexus forms exactly when ≥ 2 contributors
        // reach the threshold.
        #[test]
        fn prop_nexus_iff_two_qualifiers(
            a in 0.0f64..=0.2,
            b in 0.0f64..=0.2,
            c in 0.0f64..=0.2,
        ) {
            let config = NexusConfig::default();
            let set = fields(&[("listening", a), ("empathy", b), ("wisdom", c)]);
            let formed = !compose_nexuses(&set, &table(ActivationRule::Any, &ORGANS), &config).is_empty();
            let qualifying = [a, b, c].iter().filter(|v| **v >= config.activation_threshold).count();
            prop_assert_eq!(formed, qualifying >= 2);
        }
    }
}

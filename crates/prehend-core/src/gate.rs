//! Emission gate cascade: four sequential hard gates over the turn's nexuses.
//!
//! 1. Intersection: `intersection_strength ≥ τ_I`
//! 2. Coherence: `agreement ≥ τ_C`
//! 3. Satisfaction: turn mean satisfaction inside the Kairos window
//! 4. Felt energy: the survivor with the lowest felt energy wins; ties go to
//!    the higher emission readiness, then to table order.

use serde::Serialize;

use crate::config::{GateThresholds, KairosConfig};
use crate::constants::EPSILON;
use crate::nexus::Nexus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    Intersection,
    Coherence,
    Satisfaction,
    FeltEnergy,
}

/// What happened to one nexus in the cascade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateVerdict {
    pub atom: String,
    /// `None` when the nexus passed all four gates.
    pub rejected_at: Option<Gate>,
}

impl GateVerdict {
    pub fn passed(&self) -> bool {
        self.rejected_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CascadeOutcome {
    pub winner: Option<Nexus>,
    pub verdicts: Vec<GateVerdict>,
}

pub struct GateCascade<'a> {
    thresholds: &'a GateThresholds,
    window: &'a KairosConfig,
}

fn at_least(value: f64, threshold: f64) -> bool {
    value + EPSILON >= threshold
}

impl<'a> GateCascade<'a> {
    pub fn new(thresholds: &'a GateThresholds, window: &'a KairosConfig) -> Self {
        Self { thresholds, window }
    }

    pub fn run(&self, nexuses: &[Nexus], mean_satisfaction: f64) -> CascadeOutcome {
        let satisfied = self.window.in_window(mean_satisfaction);
        let mut verdicts = Vec::with_capacity(nexuses.len());
        let mut survivors: Vec<usize> = Vec::new();

        for (i, nexus) in nexuses.iter().enumerate() {
            let rejected_at = if !at_least(nexus.intersection_strength, self.thresholds.intersection) {
                Some(Gate::Intersection)
            } else if !at_least(nexus.agreement, self.thresholds.coherence) {
                Some(Gate::Coherence)
            } else if !satisfied {
                Some(Gate::Satisfaction)
            } else {
                survivors.push(i);
                None
            };
            verdicts.push(GateVerdict {
                atom: nexus.atom.clone(),
                rejected_at,
            });
        }

        let winner = survivors.iter().copied().min_by(|&a, &b| {
            let (na, nb) = (&nexuses[a], &nexuses[b]);
            na.felt_energy
                .total_cmp(&nb.felt_energy)
                .then_with(|| nb.emission_readiness.total_cmp(&na.emission_readiness))
                .then(a.cmp(&b))
        });

        for &i in &survivors {
            if Some(i) != winner {
                verdicts[i].rejected_at = Some(Gate::FeltEnergy);
            }
        }

        CascadeOutcome {
            winner: winner.map(|i| nexuses[i].clone()),
            verdicts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn nexus(atom: &str, strength: f64, agreement: f64, felt_energy: f64) -> Nexus {
        Nexus {
            atom: atom.to_string(),
            participants: BTreeSet::from(["a".to_string(), "b".to_string()]),
            intersection_strength: strength,
            agreement,
            emission_readiness: strength * agreement,
            felt_energy,
            expression: None,
        }
    }

    fn run(thresholds: GateThresholds, nexuses: &[Nexus], satisfaction: f64) -> CascadeOutcome {
        let window = KairosConfig::default();
        GateCascade::new(&thresholds, &window).run(nexuses, satisfaction)
    }

    #[test]
    fn test_intersection_boundary() {
        // 0.6 + 0.7 in f64 is a hair under 1.3.
        let n = nexus("X", 0.6 + 0.7, 0.95, 0.5);
        let at = GateThresholds { intersection: 1.3, coherence: 0.4 };
        assert!(run(at, std::slice::from_ref(&n), 0.6).winner.is_some());

        let above = GateThresholds { intersection: 1.31, coherence: 0.4 };
        let out = run(above, &[n], 0.6);
        assert!(out.winner.is_none());
        assert_eq!(out.verdicts[0].rejected_at, Some(Gate::Intersection));
    }

    #[test]
    fn test_default_intersection_rejects_weak_nexus() {
        let out = run(GateThresholds::default(), &[nexus("X", 1.3, 0.95, 0.5)], 0.6);
        assert_eq!(out.verdicts[0].rejected_at, Some(Gate::Intersection));
    }

    #[test]
    fn test_coherence_gate() {
        let out = run(GateThresholds::default(), &[nexus("X", 1.8, 0.3, 0.5)], 0.6);
        assert_eq!(out.verdicts[0].rejected_at, Some(Gate::Coherence));
    }

    #[test]
    fn test_satisfaction_gate_uses_kairos_window() {
        let n = nexus("X", 1.8, 0.9, 0.5);
        let high = run(GateThresholds::default(), std::slice::from_ref(&n), 0.9);
        assert_eq!(high.verdicts[0].rejected_at, Some(Gate::Satisfaction));
        let low = run(GateThresholds::default(), std::slice::from_ref(&n), 0.3);
        assert!(low.winner.is_none());
        assert!(run(GateThresholds::default(), &[n], 0.45).winner.is_some());
    }

    #[test]
    fn test_lowest_felt_energy_wins() {
        let out = run(
            GateThresholds::default(),
            &[
                nexus("confident", 2.0, 0.99, 0.6),
                nexus("settled", 1.6, 0.80, 0.2),
            ],
            0.6,
        );
        assert_eq!(out.winner.unwrap().atom, "settled");
        assert_eq!(out.verdicts[0].rejected_at, Some(Gate::FeltEnergy));
        assert!(out.verdicts[1].passed());
    }

    #[test]
    fn test_energy_tie_broken_by_readiness() {
        let out = run(
            GateThresholds::default(),
            &[nexus("low", 1.6, 0.8, 0.3), nexus("high", 1.9, 0.9, 0.3)],
            0.6,
        );
        assert_eq!(out.winner.unwrap().atom, "high");
    }

    #[test]
    fn test_full_tie_keeps_table_order() {
        let out = run(
            GateThresholds::default(),
            &[nexus("first", 1.6, 0.8, 0.3), nexus("second", 1.6, 0.8, 0.3)],
            0.6,
        );
        assert_eq!(out.winner.unwrap().atom, "first");
    }

    #[test]
    fn test_no_nexuses() {
        let out = run(GateThresholds::default(), &[], 0.6);
        assert!(out.winner.is_none());
        assert!(out.verdicts.is_empty());
    }
}

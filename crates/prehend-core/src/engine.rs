//! The concrescence loop: organs → energy descent → Kairos → termination,
//! then maturation, field aggregation, nexus composition and the gate cascade.
//!
//! One `Concrescence` serves any number of independent turns. Configuration
//! and organs are immutable; the meta-atom table is a snapshot that each turn
//! clones once, so `run_turn` and `swap_meta_atoms` both take `&self` and
//! turns may run on different threads at once.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::embedding::Embedder;
use crate::emission::{Emission, EmissionPath, FallbackContext, FallbackGenerator};
use crate::energy::{OrganSignal, descend};
use crate::error::{ConfigError, EngineError, OrganError, Result};
use crate::field::{FieldSet, OrganTrace, aggregate};
use crate::gate::{GateCascade, GateVerdict};
use crate::kairos::KairosDetector;
use crate::meta_atom::MetaAtomTable;
use crate::nexus::{Nexus, compose_nexuses};
use crate::occasion::{Occasion, occasions_from_tokens};
use crate::organ::{Organ, OrganHealth, OrganRegistry, OrganResult};
use crate::stats::mean;
use crate::tokenizer::tokenize;

/// Per-turn cancellation, checked at cycle boundaries only.
#[derive(Debug, Clone, Default)]
pub struct TurnOptions {
    pub cancel: Option<CancellationToken>,
    pub deadline: Option<Instant>,
}

impl TurnOptions {
    fn check(&self, cycle: u32) -> Result<()> {
        if let Some(token) = &self.cancel
            && token.is_cancelled()
        {
            return Err(EngineError::Cancelled { cycle });
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(EngineError::DeadlineExceeded { cycle });
        }
        Ok(())
    }
}

/// Why the cycle loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Kairos,
    Stable,
    MaxCycles,
}

/// State of a turn after the cycle loop and maturation.
#[derive(Debug)]
pub struct Convergence {
    pub occasions: Vec<Occasion>,
    pub cycles: u32,
    pub termination: Termination,
    pub traces: BTreeMap<String, OrganTrace>,
    pub excluded_organs: Vec<String>,
}

impl Convergence {
    pub fn kairos_detected(&self) -> bool {
        self.occasions.iter().any(|o| o.kairos_detected)
    }

    pub fn mean_satisfaction(&self) -> f64 {
        let values: Vec<f64> = self.occasions.iter().map(|o| o.satisfaction).collect();
        mean(&values)
    }

    pub fn mean_energy(&self) -> f64 {
        let values: Vec<f64> = self.occasions.iter().map(|o| o.v0_energy).collect();
        mean(&values)
    }
}

/// Diagnostics that accompany an emission.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub termination: Termination,
    pub mean_satisfaction: f64,
    pub mean_energy: f64,
    pub fields: FieldSet,
    pub nexuses: Vec<Nexus>,
    pub verdicts: Vec<GateVerdict>,
    pub winner: Option<String>,
    pub excluded_organs: Vec<String>,
}

#[derive(Debug)]
pub struct TurnOutcome {
    pub emission: Emission,
    pub report: TurnReport,
    pub occasions: Vec<Occasion>,
}

pub struct Concrescence {
    config: EngineConfig,
    organs: OrganRegistry,
    meta_atoms: RwLock<Arc<MetaAtomTable>>,
}

impl Concrescence {
    pub fn new(
        config: EngineConfig,
        organs: OrganRegistry,
        meta_atoms: MetaAtomTable,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        if organs.is_empty() {
            return Err(ConfigError::InvalidEngine("no organs registered".into()));
        }
        let meta_atoms = RwLock::new(Arc::new(Self::revalidate(&organs, meta_atoms)?));
        Ok(Self {
            config,
            organs,
            meta_atoms,
        })
    }

    fn revalidate(
        organs: &OrganRegistry,
        table: MetaAtomTable,
    ) -> std::result::Result<MetaAtomTable, ConfigError> {
        MetaAtomTable::new(table.iter().cloned().collect(), &organs.names())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn organs(&self) -> &OrganRegistry {
        &self.organs
    }

    /// The current meta-atom snapshot.
    pub fn meta_atoms(&self) -> Arc<MetaAtomTable> {
        let table = self.meta_atoms.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*table)
    }

    /// Install a new meta-atom snapshot. The table is validated against the
    /// registered organs before the swap; turns already holding the old
    /// snapshot keep it. Returns the previous snapshot.
    pub fn swap_meta_atoms(
        &self,
        table: MetaAtomTable,
    ) -> std::result::Result<Arc<MetaAtomTable>, ConfigError> {
        let table = Arc::new(Self::revalidate(&self.organs, table)?);
        let mut current = self.meta_atoms.write().unwrap_or_else(PoisonError::into_inner);
        tracing::info!(atoms = table.len(), previous = current.len(), "meta-atom table swapped");
        Ok(std::mem::replace(&mut *current, table))
    }

    /// Tokenize `text` and run a full turn.
    pub fn process_text(
        &self,
        text: &str,
        embedder: &dyn Embedder,
        fallback: &dyn FallbackGenerator,
        options: &TurnOptions,
    ) -> Result<TurnOutcome> {
        self.run_turn(&tokenize(text), embedder, fallback, options)
    }

    pub fn run_turn(
        &self,
        tokens: &[String],
        embedder: &dyn Embedder,
        fallback: &dyn FallbackGenerator,
        options: &TurnOptions,
    ) -> Result<TurnOutcome> {
        let occasions = occasions_from_tokens(tokens, embedder);
        let convergence = self.converge(occasions, options)?;
        self.emit(tokens, convergence, fallback)
    }

    /// Run the cycle loop to termination, then mature every occasion once.
    pub fn converge(&self, mut occasions: Vec<Occasion>, options: &TurnOptions) -> Result<Convergence> {
        if occasions.is_empty() {
            return Err(EngineError::EmptyInput);
        }

        let config = &self.config;
        let detector = KairosDetector::new(&config.kairos);
        let mut health = OrganHealth::new(config.max_consecutive_organ_failures);
        let mut traces: BTreeMap<String, OrganTrace> = BTreeMap::new();
        let mut signalled = false;
        let mut termination = Termination::MaxCycles;
        let mut cycles = 0;

        for cycle in 1..=config.max_cycles {
            options.check(cycle)?;

            let active: Vec<&Arc<dyn Organ>> = self
                .organs
                .iter()
                .filter(|o| !health.is_excluded(o.name()))
                .collect();
            let results = self.evaluate_all(&active, &occasions, cycle);

            let mut coherences = Vec::with_capacity(results.len());
            for (organ, result) in results {
                match result {
                    Ok(r) => {
                        health.record_success(&organ);
                        coherences.push(r.coherence);
                        traces.entry(organ.clone()).or_default().record(r.coherence, r.lure);
                        let felt = feel_result(&mut occasions, &organ, &r, cycle);
                        signalled |= felt || r.coherence > 0.0;
                    }
                    Err(e) => {
                        tracing::warn!(organ = %organ, cycle, "organ dropped from cycle: {e}");
                        if health.record_failure(&organ) {
                            tracing::warn!(
                                organ = %organ,
                                cycle,
                                "organ excluded for the rest of the turn after repeated failures"
                            );
                        }
                    }
                }
            }

            let signal = OrganSignal::from_coherences(&coherences);
            let mut kairos_now = false;
            for occ in occasions.iter_mut() {
                descend(occ, &signal, &config.energy);
                kairos_now |= detector.observe(occ);
            }
            cycles = cycle;

            let deltas: Vec<f64> = occasions.iter().map(|o| o.energy_delta()).collect();
            let mean_delta = mean(&deltas);
            tracing::debug!(
                cycle,
                organs = coherences.len(),
                resonance = signal.resonance,
                agreement = signal.agreement,
                mean_delta,
                "concrescence cycle"
            );

            if kairos_now {
                termination = Termination::Kairos;
                break;
            }
            // Silent organs leave nothing to settle on; the turn runs its full budget.
            if signalled && mean_delta < config.kairos.stability_epsilon {
                termination = Termination::Stable;
                break;
            }
        }

        for occ in occasions.iter_mut() {
            occ.mature(config.kairos.bonus)?;
        }

        Ok(Convergence {
            occasions,
            cycles,
            termination,
            traces,
            excluded_organs: health.excluded(),
        })
    }

    /// Aggregate, compose and gate a converged turn into its emission.
    pub fn emit(
        &self,
        tokens: &[String],
        convergence: Convergence,
        fallback: &dyn FallbackGenerator,
    ) -> Result<TurnOutcome> {
        let config = &self.config;
        let table = self.meta_atoms();

        let fields = aggregate(
            &convergence.occasions,
            &self.organs.names(),
            &convergence.traces,
            &table,
        );
        let nexuses = compose_nexuses(&fields, &table, &config.nexus);
        let mean_satisfaction = convergence.mean_satisfaction();
        let kairos_detected = convergence.kairos_detected();

        let outcome = GateCascade::new(&config.gates, &config.kairos).run(&nexuses, mean_satisfaction);

        let emission = match &outcome.winner {
            Some(nexus) => {
                let multiplier = if kairos_detected { config.kairos.bonus } else { 1.0 };
                Emission {
                    text: nexus.expression.clone().unwrap_or_else(|| nexus.atom.clone()),
                    confidence: nexus.agreement * multiplier,
                    path: EmissionPath::Intersection,
                    nexus_count: nexuses.len(),
                    kairos_detected,
                    convergence_cycles: convergence.cycles,
                }
            }
            None => {
                let strongest_atom = strongest_atom(&nexuses, &fields);
                let ctx = FallbackContext {
                    tokens,
                    nexus_count: nexuses.len(),
                    mean_satisfaction,
                    strongest_atom,
                };
                Emission {
                    text: fallback.generate(&ctx)?,
                    confidence: config.fallback_confidence,
                    path: EmissionPath::Fallback,
                    nexus_count: nexuses.len(),
                    kairos_detected,
                    convergence_cycles: convergence.cycles,
                }
            }
        };

        tracing::info!(
            path = emission.path.as_str(),
            cycles = emission.convergence_cycles,
            nexuses = emission.nexus_count,
            kairos = emission.kairos_detected,
            confidence = emission.confidence,
            "turn emitted"
        );

        let report = TurnReport {
            termination: convergence.termination,
            mean_satisfaction,
            mean_energy: convergence.mean_energy(),
            fields,
            winner: outcome.winner.map(|n| n.atom),
            nexuses,
            verdicts: outcome.verdicts,
            excluded_organs: convergence.excluded_organs,
        };

        Ok(TurnOutcome {
            emission,
            report,
            occasions: convergence.occasions,
        })
    }

    fn evaluate_all(
        &self,
        active: &[&Arc<dyn Organ>],
        occasions: &[Occasion],
        cycle: u32,
    ) -> Vec<(String, std::result::Result<OrganResult, OrganError>)> {
        if !self.config.parallel_organs || active.len() < 2 {
            return active
                .iter()
                .map(|o| {
                    let organ: &dyn Organ = o.as_ref();
                    (organ.name().to_string(), evaluate_one(organ, occasions, cycle))
                })
                .collect();
        }

        std::thread::scope(|scope| {
            let handles: Vec<_> = active
                .iter()
                .map(|o| {
                    let organ: &dyn Organ = o.as_ref();
                    scope.spawn(move || evaluate_one(organ, occasions, cycle))
                })
                .collect();
            handles
                .into_iter()
                .zip(active)
                .map(|(handle, o)| {
                    let name = o.name().to_string();
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(OrganError::Evaluation {
                            organ: name.clone(),
                            message: "evaluation panicked".into(),
                        })
                    });
                    (name, result)
                })
                .collect()
        })
    }
}

fn evaluate_one(
    organ: &dyn Organ,
    occasions: &[Occasion],
    cycle: u32,
) -> std::result::Result<OrganResult, OrganError> {
    let result = organ.evaluate(occasions, cycle)?;
    result.validate(organ.name())?;
    Ok(result)
}

/// Append one affordance per `(organ, atom, activation)` triple. Returns
/// whether anything was felt.
fn feel_result(occasions: &mut [Occasion], organ: &str, result: &OrganResult, cycle: u32) -> bool {
    let mut felt = false;
    for occ in occasions.iter_mut() {
        for (atom, activation) in &result.atom_activations {
            occ.feel(organ, atom, *activation, result.lure, cycle);
            felt = true;
        }
    }
    for (position, atoms) in &result.positional {
        let Some(occ) = occasions.iter_mut().find(|o| o.position == *position) else {
            tracing::debug!(organ, position, "activation for unknown position ignored");
            continue;
        };
        for (atom, activation) in atoms {
            occ.feel(organ, atom, *activation, result.lure, cycle);
            felt = true;
        }
    }
    felt
}

fn strongest_atom<'a>(nexuses: &'a [Nexus], fields: &'a FieldSet) -> Option<&'a str> {
    if let Some(n) = nexuses
        .iter()
        .max_by(|a, b| a.emission_readiness.total_cmp(&b.emission_readiness))
    {
        return Some(&n.atom);
    }
    fields
        .meta_activations
        .iter()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(atom, _)| atom.as_str())
}

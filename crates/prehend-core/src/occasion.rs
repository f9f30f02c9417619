use serde::Serialize;

use crate::constants::{INITIAL_SATISFACTION, INITIAL_V0_ENERGY};
use crate::error::MaturationError;
use crate::proposition::{Proposition, mature_affordances};

/// A provisional signal one organ felt for one occasion in one cycle.
///
/// Carries a snapshot of the occasion's energy state at the moment it was
/// felt. Never mutated after it is appended.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeltAffordance {
    pub atom: String,
    pub organ: String,
    pub confidence: f64,
    pub lure_intensity: f64,
    pub cycle: u32,
    pub v0_energy: f64,
    pub satisfaction: f64,
}

/// One input token's state through the concrescence loop.
///
/// Energy starts at 1.0 (maximally unsatisfied) and satisfaction at 0.0.
/// Affordances form an append-only log; propositions are written exactly
/// once, after the loop terminates.
#[derive(Clone, Debug, Serialize)]
pub struct Occasion {
    pub datum: String,
    pub position: usize,
    pub embedding: Vec<f32>,
    pub cycle: u32,
    pub v0_energy: f64,
    pub satisfaction: f64,
    /// Energy before the most recent descent step. `None` until the first cycle.
    pub previous_v0_energy: Option<f64>,
    pub previous_satisfaction: f64,
    pub kairos_detected: bool,
    pub kairos_cycle: Option<u32>,
    felt_affordances: Vec<FeltAffordance>,
    mature_propositions: Vec<Proposition>,
    matured: bool,
}

impl Occasion {
    pub fn new(datum: String, position: usize, embedding: Vec<f32>) -> Self {
        Self {
            datum,
            position,
            embedding,
            cycle: 0,
            v0_energy: INITIAL_V0_ENERGY,
            satisfaction: INITIAL_SATISFACTION,
            previous_v0_energy: None,
            previous_satisfaction: INITIAL_SATISFACTION,
            kairos_detected: false,
            kairos_cycle: None,
            felt_affordances: Vec::new(),
            mature_propositions: Vec::new(),
            matured: false,
        }
    }

    /// Append an affordance stamped with the current energy state.
    ///
    /// Panics if the occasion has already matured: the log is closed once
    /// propositions exist.
    pub fn feel(&mut self, organ: &str, atom: &str, confidence: f64, lure_intensity: f64, cycle: u32) {
        assert!(
            !self.matured,
            "affordance felt after occasion {} matured",
            self.position
        );
        self.felt_affordances.push(FeltAffordance {
            atom: atom.to_string(),
            organ: organ.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            lure_intensity: lure_intensity.clamp(0.0, 1.0),
            cycle,
            v0_energy: self.v0_energy,
            satisfaction: self.satisfaction,
        });
    }

    pub fn felt_affordances(&self) -> &[FeltAffordance] {
        &self.felt_affordances
    }

    pub fn mature_propositions(&self) -> &[Proposition] {
        &self.mature_propositions
    }

    pub fn is_matured(&self) -> bool {
        self.matured
    }

    /// Turn the affordance log into propositions. Runs once; a second call
    /// is rejected and leaves the existing propositions untouched.
    pub fn mature(&mut self, kairos_bonus: f64) -> Result<&[Proposition], MaturationError> {
        if self.matured {
            return Err(MaturationError::AlreadyMatured {
                position: self.position,
            });
        }
        let bonus = if self.kairos_detected { kairos_bonus } else { 1.0 };
        self.mature_propositions = mature_affordances(&self.felt_affordances, self.v0_energy, bonus);
        self.matured = true;
        Ok(&self.mature_propositions)
    }

    /// Absolute energy change of the most recent descent step.
    pub fn energy_delta(&self) -> f64 {
        match self.previous_v0_energy {
            Some(prev) => (self.v0_energy - prev).abs(),
            None => 0.0,
        }
    }
}

/// Build one occasion per token, in order.
pub fn occasions_from_tokens(
    tokens: &[String],
    embedder: &dyn crate::embedding::Embedder,
) -> Vec<Occasion> {
    tokens
        .iter()
        .enumerate()
        .map(|(i, t)| Occasion::new(t.clone(), i, embedder.embed(t)))
        .collect()
}

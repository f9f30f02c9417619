use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;

/// Weights of the five energy descent terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyCoefficients {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub delta: f64,
    pub zeta: f64,
}

impl Default for EnergyCoefficients {
    fn default() -> Self {
        Self {
            alpha: ALPHA,
            beta: BETA,
            gamma: GAMMA,
            delta: DELTA,
            zeta: ZETA,
        }
    }
}

/// Kairos window and the stability rule shared with loop termination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KairosConfig {
    pub low: f64,
    pub high: f64,
    pub stability_epsilon: f64,
    pub coherence_floor: f64,
    /// Multiplier on proposition and emission confidence after Kairos.
    pub bonus: f64,
}

impl Default for KairosConfig {
    fn default() -> Self {
        Self {
            low: KAIROS_LOW,
            high: KAIROS_HIGH,
            stability_epsilon: STABILITY_EPSILON,
            coherence_floor: COHERENCE_FLOOR,
            bonus: KAIROS_BONUS,
        }
    }
}

impl KairosConfig {
    /// Whether `value` lies inside the inclusive window.
    pub fn in_window(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NexusConfig {
    /// Activations are mean proposition confidence capped at 1.0; an organ
    /// qualifies at or above this value.
    pub activation_threshold: f64,
    pub min_participants: usize,
}

impl Default for NexusConfig {
    fn default() -> Self {
        Self {
            activation_threshold: ACTIVATION_THRESHOLD,
            min_participants: MIN_PARTICIPANTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateThresholds {
    /// τ_I, in the capped activation space of [`NexusConfig`].
    pub intersection: f64,
    /// τ_C.
    pub coherence: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            intersection: INTERSECTION_THRESHOLD,
            coherence: COHERENCE_THRESHOLD,
        }
    }
}

/// Everything tunable about one concrescence turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_cycles: u32,
    pub energy: EnergyCoefficients,
    pub kairos: KairosConfig,
    pub nexus: NexusConfig,
    pub gates: GateThresholds,
    pub fallback_confidence: f64,
    pub max_consecutive_organ_failures: u32,
    /// Evaluate organs on scoped threads within a cycle.
    pub parallel_organs: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_cycles: MAX_CYCLES,
            energy: EnergyCoefficients::default(),
            kairos: KairosConfig::default(),
            nexus: NexusConfig::default(),
            gates: GateThresholds::default(),
            fallback_confidence: FALLBACK_CONFIDENCE,
            max_consecutive_organ_failures: MAX_CONSECUTIVE_ORGAN_FAILURES,
            parallel_organs: false,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::InvalidEngine(msg));

        if self.max_cycles == 0 {
            return invalid("max_cycles must be at least 1".into());
        }
        let e = &self.energy;
        for (name, v) in [
            ("alpha", e.alpha),
            ("beta", e.beta),
            ("gamma", e.gamma),
            ("delta", e.delta),
            ("zeta", e.zeta),
        ] {
            if !v.is_finite() {
                return invalid(format!("energy.{name} must be finite"));
            }
        }
        let k = &self.kairos;
        if !(0.0..=1.0).contains(&k.low) || !(0.0..=1.0).contains(&k.high) || k.low > k.high {
            return invalid(format!(
                "kairos window [{}, {}] must be ordered within [0, 1]",
                k.low, k.high
            ));
        }
        if !(k.stability_epsilon > 0.0) {
            return invalid("kairos.stability_epsilon must be positive".into());
        }
        if !(k.bonus >= 1.0) {
            return invalid("kairos.bonus must be at least 1.0".into());
        }
        if self.nexus.min_participants < MIN_PARTICIPANTS {
            return invalid(format!(
                "nexus.min_participants must be at least {MIN_PARTICIPANTS}"
            ));
        }
        if !(self.nexus.activation_threshold >= 0.0) {
            return invalid("nexus.activation_threshold must be non-negative".into());
        }
        if !(self.gates.intersection >= 0.0) || !(0.0..=1.0).contains(&self.gates.coherence) {
            return invalid("gate thresholds out of range".into());
        }
        if !(0.0..=1.0).contains(&self.fallback_confidence) {
            return invalid("fallback_confidence must lie in [0, 1]".into());
        }
        if self.max_consecutive_organ_failures == 0 {
            return invalid("max_consecutive_organ_failures must be at least 1".into());
        }
        Ok(())
    }
}

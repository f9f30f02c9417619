use serde::{Deserialize, Serialize};

use crate::error::FallbackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionPath {
    Intersection,
    Fallback,
}

impl EmissionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmissionPath::Intersection => "intersection",
            EmissionPath::Fallback => "fallback",
        }
    }
}

impl std::str::FromStr for EmissionPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intersection" => Ok(EmissionPath::Intersection),
            "fallback" => Ok(EmissionPath::Fallback),
            other => Err(format!("unknown emission path '{other}'")),
        }
    }
}

/// The only value a turn exposes to its callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emission {
    pub text: String,
    /// `agreement × kairos bonus` on the intersection path, so up to 1.5.
    pub confidence: f64,
    pub path: EmissionPath,
    pub nexus_count: usize,
    pub kairos_detected: bool,
    pub convergence_cycles: u32,
}

/// What the fallback generator gets to work with.
#[derive(Debug, Clone)]
pub struct FallbackContext<'a> {
    pub tokens: &'a [String],
    pub nexus_count: usize,
    pub mean_satisfaction: f64,
    /// Strongest meta-atom seen this turn, even though it failed the cascade.
    pub strongest_atom: Option<&'a str>,
}

/// External generator consulted only when no nexus clears the cascade.
pub trait FallbackGenerator: Send + Sync {
    fn generate(&self, ctx: &FallbackContext<'_>) -> Result<String, FallbackError>;
}

/// Fixed-text fallback. `{atom}` in the template is replaced with the
/// strongest meta-atom when there is one.
pub struct TemplateFallback {
    template: String,
    bare: String,
}

impl TemplateFallback {
    pub fn new(template: &str, bare: &str) -> Self {
        Self {
            template: template.to_string(),
            bare: bare.to_string(),
        }
    }
}

impl Default for TemplateFallback {
    fn default() -> Self {
        Self::new("Tell me more about {atom}.", "Tell me more.")
    }
}

impl FallbackGenerator for TemplateFallback {
    fn generate(&self, ctx: &FallbackContext<'_>) -> Result<String, FallbackError> {
        Ok(match ctx.strongest_atom {
            Some(atom) => self.template.replace("{atom}", atom),
            None => self.bare.clone(),
        })
    }
}

//! Concrescence engine.
//!
//! A turn tokenizes its input into occasions, lets a fixed set of organs
//! score them over several cycles while each occasion's energy descends,
//! stops at Kairos (the opportune moment), stability or the cycle cap, then
//! composes cross-organ nexuses and runs them through a four-gate cascade.
//! Exactly one emission comes out: the winning nexus, or a fallback.
//!
//! Zero I/O. Persistence and transport live in other crates.

pub mod config;
pub mod constants;
pub mod embedding;
pub mod emission;
pub mod energy;
pub mod engine;
pub mod error;
pub mod field;
pub mod gate;
pub mod kairos;
pub mod lexicon;
pub mod meta_atom;
pub mod nexus;
pub mod occasion;
pub mod organ;
pub mod profile;
pub mod proposition;
pub mod stats;
pub mod tokenizer;

pub use config::{EnergyCoefficients, EngineConfig, GateThresholds, KairosConfig, NexusConfig};
pub use embedding::{Embedder, SeededEmbedder};
pub use emission::{
    Emission, EmissionPath, FallbackContext, FallbackGenerator, TemplateFallback,
};
pub use engine::{Concrescence, Convergence, Termination, TurnOptions, TurnOutcome, TurnReport};
pub use error::{ConfigError, EngineError, FallbackError, MaturationError, OrganError, Result};
pub use field::{FieldSet, SemanticField};
pub use gate::{Gate, GateVerdict};
pub use lexicon::{LexiconEntry, LexiconOrgan, LexiconSpec};
pub use meta_atom::{ActivationRule, MetaAtomSpec, MetaAtomTable};
pub use nexus::Nexus;
pub use occasion::{FeltAffordance, Occasion};
pub use organ::{Organ, OrganRegistry, OrganResult};
pub use profile::{Profile, ProfileSummary};
pub use proposition::Proposition;
pub use tokenizer::tokenize;

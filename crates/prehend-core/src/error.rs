use thiserror::Error;

/// Failure of a single organ for a single cycle. Never fatal to the turn.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrganError {
    #[error("organ '{organ}' failed: {message}")]
    Evaluation { organ: String, message: String },

    #[error("organ '{organ}' produced invalid output: {message}")]
    InvalidOutput { organ: String, message: String },
}

/// Rejected configuration: profile, engine settings or meta-atom table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid engine config: {0}")]
    InvalidEngine(String),

    #[error("duplicate meta-atom '{0}'")]
    DuplicateAtom(String),

    #[error("meta-atom '{atom}' references unknown organ '{organ}'")]
    UnknownOrgan { atom: String, organ: String },

    #[error("invalid meta-atom '{atom}': {message}")]
    InvalidMetaAtom { atom: String, message: String },

    #[error("duplicate organ '{0}'")]
    DuplicateOrgan(String),

    #[error("invalid organ '{organ}': {message}")]
    InvalidOrgan { organ: String, message: String },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaturationError {
    #[error("occasion {position} has already matured its propositions")]
    AlreadyMatured { position: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("fallback generator failed: {0}")]
pub struct FallbackError(pub String);

/// Errors surfaced to the caller of a turn.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("turn has no tokens")]
    EmptyInput,

    #[error("turn cancelled before cycle {cycle}")]
    Cancelled { cycle: u32 },

    #[error("turn deadline exceeded before cycle {cycle}")]
    DeadlineExceeded { cycle: u32 },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fallback(#[from] FallbackError),

    #[error("invariant violated: {0}")]
    Invariant(#[from] MaturationError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

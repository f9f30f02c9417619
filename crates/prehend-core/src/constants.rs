/// Numerical slack for threshold comparisons. Sums like 0.6 + 0.7 land a
/// few ULPs below 1.3; gates treat anything within EPSILON as on the line.
pub const EPSILON: f64 = 1e-9;

/// Default number of concrescence cycles per turn.
pub const MAX_CYCLES: u32 = 5;

/// Starting energy of every occasion (maximally unsatisfied).
pub const INITIAL_V0_ENERGY: f64 = 1.0;

/// Starting satisfaction of every occasion.
pub const INITIAL_SATISFACTION: f64 = 0.0;

/// Energy descent coefficients: α (dissatisfaction), β (momentum),
/// γ (organ disagreement), δ (lack of resonance), ζ (intensity).
/// They sum to 1.0.
pub const ALPHA: f64 = 0.40;
pub const BETA: f64 = 0.25;
pub const GAMMA: f64 = 0.15;
pub const DELTA: f64 = 0.10;
pub const ZETA: f64 = 0.10;

/// Kairos energy window, inclusive.
pub const KAIROS_LOW: f64 = 0.45;
pub const KAIROS_HIGH: f64 = 0.70;

/// Maximum per-cycle energy change still considered stable.
pub const STABILITY_EPSILON: f64 = 0.1;

/// Satisfaction must exceed this for Kairos to fire.
pub const COHERENCE_FLOOR: f64 = 0.4;

/// Confidence multiplier applied once Kairos has been detected.
pub const KAIROS_BONUS: f64 = 1.5;

/// Post-normalization activation an organ needs to join a nexus.
pub const ACTIVATION_THRESHOLD: f64 = 0.05;

/// Minimum organs in any nexus.
pub const MIN_PARTICIPANTS: usize = 2;

/// Gate 1: summed nexus activation.
pub const INTERSECTION_THRESHOLD: f64 = 1.5;

/// Gate 2: organ agreement inside a nexus.
pub const COHERENCE_THRESHOLD: f64 = 0.4;

/// Confidence reported on the fallback path.
pub const FALLBACK_CONFIDENCE: f64 = 0.30;

/// Consecutive failures after which an organ sits out the rest of the turn.
pub const MAX_CONSECUTIVE_ORGAN_FAILURES: u32 = 3;

/// Default embedding width for the seeded embedder.
pub const EMBEDDING_DIM: usize = 32;

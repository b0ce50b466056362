//! MarkerLens: layered marker hierarchy evaluator
//!
//! Turns raw evidence (regex matches or embedding similarity scores) into a
//! four-level hit graph: ATOMIC -> SEMANTIC -> CLUSTER -> META.

pub mod core;
pub mod error;
pub mod types;

pub use error::{Error, Result};

// =============================================================================
// SIMILARITY THRESHOLDS [C]
// =============================================================================

/// Cosine similarity at or above which similarity evidence is accepted
pub const SIMILARITY_ACCEPT: f64 = 0.60;

/// Lower bound of the uncertain band; scores in [UNCERTAIN, ACCEPT) go to the
/// uncertain sink instead of becoming evidence
pub const SIMILARITY_UNCERTAIN: f64 = 0.53;

// =============================================================================
// NEGATION GUARD [C]
// =============================================================================

/// Default guard window in tokens when a marker does not set one
pub const NEGATION_WINDOW_TOKENS: usize = 3;

/// Fixed token-to-character approximation for guard distance
pub const CHARS_PER_TOKEN: usize = 10;

// =============================================================================
// COMPOSITION QUORUMS [C]
// =============================================================================

/// Maximum distinct marker ids credited per lemma stem
pub const STEM_CREDIT_CAP: usize = 2;

/// Supporting atoms required for a SEMANTIC trigger (capped at component count)
pub const SEMANTIC_QUORUM: usize = 2;

/// Atomic members required before a family hint may fire
pub const FAMILY_HINT_MIN_ATOMS: usize = 3;

/// Confidence assigned to family-hint signals (weak, below any formal trigger)
pub const FAMILY_HINT_CONFIDENCE: f64 = 0.5;

/// Fraction of CLUSTER components required (floor, minimum 1)
pub const CLUSTER_QUORUM_RATIO: f64 = 0.6;

/// Fraction of META components required (ceiling)
pub const META_COVERAGE_RATIO: f64 = 0.6;

// =============================================================================
// WINDOWS & SCORING NORMALIZERS [C]
// =============================================================================

/// Default CLUSTER message window when a marker does not set one
pub const CLUSTER_WINDOW: usize = 50;

/// Default activation-rule window in messages
pub const RULE_WINDOW: usize = 3;

/// Default activation-rule required count
pub const RULE_REQUIRED: usize = 2;

/// Divisor normalizing the distinct-component score in CLUSTER confidence
pub const DISTINCT_NORMALIZER: f64 = 10.0;

/// Divisor normalizing the log-scaled frequency score in CLUSTER confidence
pub const FREQUENCY_NORMALIZER: f64 = 5.0;

// =============================================================================
// REGISTRY CACHE [C]
// =============================================================================

/// Default TTL for a registry snapshot before refresh(false) reloads
pub const REGISTRY_TTL_SECS: u64 = 300;

/// Reference strings use at most this many marker examples
pub const MAX_REFERENCE_EXAMPLES: usize = 5;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";

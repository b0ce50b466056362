//! Engine configuration
//!
//! Every threshold and quorum constant is a named, overridable parameter;
//! the defaults come from the crate-root constants.

use serde::{Deserialize, Serialize};

use crate::{
    CHARS_PER_TOKEN, CLUSTER_QUORUM_RATIO, CLUSTER_WINDOW, DISTINCT_NORMALIZER,
    FAMILY_HINT_CONFIDENCE, FAMILY_HINT_MIN_ATOMS, FREQUENCY_NORMALIZER, META_COVERAGE_RATIO,
    NEGATION_WINDOW_TOKENS, REGISTRY_TTL_SECS, SEMANTIC_QUORUM, SIMILARITY_ACCEPT,
    SIMILARITY_UNCERTAIN, STEM_CREDIT_CAP,
};

/// Tunable parameters of the marker hierarchy evaluator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cosine similarity acceptance threshold
    pub similarity_accept: f64,
    /// Lower bound of the uncertain band
    pub similarity_uncertain: f64,
    /// Max distinct marker ids credited per lemma stem
    pub stem_credit_cap: usize,
    /// Supporting atoms required for a SEMANTIC trigger (capped at k)
    pub semantic_quorum: usize,
    /// Atomic members required before a family hint fires
    pub family_hint_min_atoms: usize,
    /// Confidence assigned to family-hint signals
    pub family_hint_confidence: f64,
    /// Fraction of CLUSTER components required (floor, min 1)
    pub cluster_quorum_ratio: f64,
    /// Fraction of META components required (ceiling)
    pub meta_coverage_ratio: f64,
    /// Token-to-character approximation for negation guards
    pub chars_per_token: usize,
    /// Default guard window when a marker sets none
    pub negation_window_tokens: usize,
    /// Default CLUSTER message window
    pub cluster_window: usize,
    /// Distinct-component normalizer in CLUSTER confidence
    pub distinct_normalizer: f64,
    /// Log-frequency normalizer in CLUSTER confidence
    pub frequency_normalizer: f64,
    /// Registry snapshot TTL in seconds
    pub registry_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            similarity_accept: SIMILARITY_ACCEPT,
            similarity_uncertain: SIMILARITY_UNCERTAIN,
            stem_credit_cap: STEM_CREDIT_CAP,
            semantic_quorum: SEMANTIC_QUORUM,
            family_hint_min_atoms: FAMILY_HINT_MIN_ATOMS,
            family_hint_confidence: FAMILY_HINT_CONFIDENCE,
            cluster_quorum_ratio: CLUSTER_QUORUM_RATIO,
            meta_coverage_ratio: META_COVERAGE_RATIO,
            chars_per_token: CHARS_PER_TOKEN,
            negation_window_tokens: NEGATION_WINDOW_TOKENS,
            cluster_window: CLUSTER_WINDOW,
            distinct_normalizer: DISTINCT_NORMALIZER,
            frequency_normalizer: FREQUENCY_NORMALIZER,
            registry_ttl_secs: REGISTRY_TTL_SECS,
        }
    }
}

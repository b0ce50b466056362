//! Raw per-marker evidence produced by the collectors

use serde::{Deserialize, Serialize};

use crate::types::MarkerLevel;

/// Which collector strategy produced a piece of evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    /// Literal regex match, confidence fixed at 1.0
    Pattern,
    /// Embedding cosine similarity, graded confidence
    Similarity,
}

/// One piece of raw evidence for one marker in one text unit.
///
/// Transient: evidence is consumed by the resolver/composers and never
/// persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub marker_id: String,
    pub level: MarkerLevel,
    /// 0.0-1.0
    pub confidence: f64,
    pub source: EvidenceSource,
    /// Exact matched text (pattern collector only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
    /// Character offsets of the match (pattern collector only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offsets: Option<(usize, usize)>,
    /// Raw similarity score (similarity collector only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Evidence {
    /// Evidence from a literal pattern match
    pub fn pattern(marker_id: impl Into<String>, matched: &str, start: usize, end: usize) -> Self {
        Self {
            marker_id: marker_id.into(),
            level: MarkerLevel::Atomic,
            confidence: 1.0,
            source: EvidenceSource::Pattern,
            matched_text: Some(matched.to_string()),
            offsets: Some((start, end)),
            score: None,
        }
    }

    /// Evidence from an accepted similarity score
    pub fn similarity(marker_id: impl Into<String>, level: MarkerLevel, score: f64) -> Self {
        Self {
            marker_id: marker_id.into(),
            level,
            confidence: score,
            source: EvidenceSource::Similarity,
            matched_text: None,
            offsets: None,
            score: Some(score),
        }
    }
}

/// Side-channel signal for scores in the uncertain band.
///
/// Consumed externally for human review; never read back by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncertainSignal {
    pub marker_id: String,
    pub text: String,
    pub score: f64,
}

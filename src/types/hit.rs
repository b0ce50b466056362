//! Emitted hits and per-unit evaluation output

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Evidence, MarkerLevel};

/// A triggered marker. Immutable once emitted; later stages only aggregate
/// hits into sets referenced by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    pub marker_id: String,
    pub level: MarkerLevel,
    /// 0.0-1.0
    pub confidence: f64,
    /// Matched patterns (ATOMIC) or supporting component ids (composed levels)
    pub provenance: Vec<String>,
    /// Index of the source text unit, where the hit is unit-scoped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_index: Option<usize>,
    pub timestamp: DateTime<Utc>,
}

impl Hit {
    pub fn new(
        marker_id: impl Into<String>,
        level: MarkerLevel,
        confidence: f64,
        provenance: Vec<String>,
        unit_index: Option<usize>,
    ) -> Self {
        Self {
            marker_id: marker_id.into(),
            level,
            confidence,
            provenance,
            unit_index,
            timestamp: Utc::now(),
        }
    }
}

/// Output of a single-text-unit evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitEvaluation {
    /// Effective ATOMIC set (post negation filter and stem dedup)
    pub ato: Vec<String>,
    /// Effective SEMANTIC set (formal triggers plus family hints)
    pub sem: Vec<String>,
    /// Triggered CLUSTER ids
    pub clu: Vec<String>,
    /// All accepted raw evidence for this unit
    pub evidence: Vec<Evidence>,
}

impl UnitEvaluation {
    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!(
            "ato=[{}] | sem=[{}] | clu=[{}] | evidence={}",
            self.ato.join(","),
            self.sem.join(","),
            self.clu.join(","),
            self.evidence.len()
        )
    }

    pub fn is_empty(&self) -> bool {
        self.ato.is_empty() && self.sem.is_empty() && self.clu.is_empty()
    }
}

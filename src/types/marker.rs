//! Marker definitions: the four-level taxonomy loaded from a registry

use serde::{Deserialize, Serialize};

/// The four levels of the marker hierarchy, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarkerLevel {
    /// Detected directly from text via pattern or embedding evidence
    Atomic,
    /// Composed from ATOMIC evidence via quorum rule
    Semantic,
    /// Composed from SEMANTIC (or CLUSTER) evidence, optionally windowed
    Cluster,
    /// Composed from cumulative evidence of any lower level
    Meta,
}

impl MarkerLevel {
    /// May a marker at this level reference a child at `child` level?
    ///
    /// Children must be strictly lower, except CLUSTER which may also
    /// reference other CLUSTER ids.
    pub fn may_compose(&self, child: MarkerLevel) -> bool {
        match self {
            MarkerLevel::Atomic => false,
            MarkerLevel::Cluster => child <= MarkerLevel::Cluster,
            level => child < *level,
        }
    }
}

impl std::fmt::Display for MarkerLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MarkerLevel::Atomic => "ATOMIC",
            MarkerLevel::Semantic => "SEMANTIC",
            MarkerLevel::Cluster => "CLUSTER",
            MarkerLevel::Meta => "META",
        };
        write!(f, "{}", name)
    }
}

/// Descriptive frame of a marker; `concept` and `signal` feed the
/// similarity reference string, the rest is reference material only
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkerFrame {
    /// Short concept label (e.g. "devaluation")
    pub concept: String,
    /// Ordered trigger tokens/phrases
    #[serde(default)]
    pub signal: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pragmatics: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

/// Suppression rule: an ATOMIC marker near a negation does not fire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegationGuard {
    /// Guard regex (e.g. `\bnicht\b`)
    pub regex: String,
    /// Token window between guard match and signal match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_tokens: Option<usize>,
}

/// Base/weight/decay multipliers for confidence calculation
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Scoring {
    #[serde(default = "default_multiplier")]
    pub base: f64,
    #[serde(default = "default_multiplier")]
    pub weight: f64,
    #[serde(default)]
    pub decay: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

impl Default for Scoring {
    fn default() -> Self {
        Self {
            base: 1.0,
            weight: 1.0,
            decay: 0.0,
        }
    }
}

/// A marker definition, one record shape per hierarchy level
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarkerDefinition {
    Atomic {
        id: String,
        #[serde(default)]
        frame: MarkerFrame,
        #[serde(default)]
        examples: Vec<String>,
        /// Literal regex patterns; empty means similarity-only detection
        #[serde(default)]
        patterns: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        negation_guard: Option<NegationGuard>,
    },
    Semantic {
        id: String,
        #[serde(default)]
        frame: MarkerFrame,
        #[serde(default)]
        examples: Vec<String>,
        composed_of: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        activation_logic: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scoring: Option<Scoring>,
    },
    Cluster {
        id: String,
        #[serde(default)]
        frame: MarkerFrame,
        #[serde(default)]
        examples: Vec<String>,
        composed_of: Vec<String>,
        /// Message window restricting which prior detections count
        #[serde(default, skip_serializing_if = "Option::is_none")]
        window: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        activation_rule: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scoring: Option<Scoring>,
    },
    Meta {
        id: String,
        #[serde(default)]
        frame: MarkerFrame,
        #[serde(default)]
        examples: Vec<String>,
        components: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        activation_rule: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scoring: Option<Scoring>,
    },
}

impl MarkerDefinition {
    pub fn id(&self) -> &str {
        match self {
            MarkerDefinition::Atomic { id, .. }
            | MarkerDefinition::Semantic { id, .. }
            | MarkerDefinition::Cluster { id, .. }
            | MarkerDefinition::Meta { id, .. } => id,
        }
    }

    pub fn level(&self) -> MarkerLevel {
        match self {
            MarkerDefinition::Atomic { .. } => MarkerLevel::Atomic,
            MarkerDefinition::Semantic { .. } => MarkerLevel::Semantic,
            MarkerDefinition::Cluster { .. } => MarkerLevel::Cluster,
            MarkerDefinition::Meta { .. } => MarkerLevel::Meta,
        }
    }

    pub fn frame(&self) -> &MarkerFrame {
        match self {
            MarkerDefinition::Atomic { frame, .. }
            | MarkerDefinition::Semantic { frame, .. }
            | MarkerDefinition::Cluster { frame, .. }
            | MarkerDefinition::Meta { frame, .. } => frame,
        }
    }

    pub fn examples(&self) -> &[String] {
        match self {
            MarkerDefinition::Atomic { examples, .. }
            | MarkerDefinition::Semantic { examples, .. }
            | MarkerDefinition::Cluster { examples, .. }
            | MarkerDefinition::Meta { examples, .. } => examples,
        }
    }

    /// Ids of the lower-level markers this one composes (empty for ATOMIC)
    pub fn child_ids(&self) -> &[String] {
        match self {
            MarkerDefinition::Atomic { .. } => &[],
            MarkerDefinition::Semantic { composed_of, .. }
            | MarkerDefinition::Cluster { composed_of, .. } => composed_of,
            MarkerDefinition::Meta { components, .. } => components,
        }
    }

    pub fn scoring(&self) -> Scoring {
        match self {
            MarkerDefinition::Atomic { .. } => Scoring::default(),
            MarkerDefinition::Semantic { scoring, .. }
            | MarkerDefinition::Cluster { scoring, .. }
            | MarkerDefinition::Meta { scoring, .. } => (*scoring).unwrap_or_default(),
        }
    }
}

/// Fallback grouping: strong atomic evidence without a formal SEMANTIC match
/// fires `hint_id` as a weak SEMANTIC-level signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyHint {
    pub hint_id: String,
    #[serde(default)]
    pub atoms: Vec<String>,
    #[serde(default)]
    pub sems: Vec<String>,
}

// =============================================================================
// TESTS
// =============================================================================

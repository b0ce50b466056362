//! Evidence collectors: literal pattern matching and embedding similarity
//!
//! Both strategies implement `EvidenceCollector` so new ones can be added
//! without touching the composition stages.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::core::embed::{cosine, Embedder};
use crate::types::{Evidence, MarkerDefinition, MarkerLevel, UncertainSignal};
use crate::{
    CHARS_PER_TOKEN, MAX_REFERENCE_EXAMPLES, NEGATION_WINDOW_TOKENS, SIMILARITY_ACCEPT,
    SIMILARITY_UNCERTAIN,
};

/// Capability interface: turn one unit of text into raw per-marker evidence
pub trait EvidenceCollector: Send + Sync {
    fn collect(&self, text: &str, marker: &MarkerDefinition) -> Vec<Evidence>;
}

// =============================================================================
// UNCERTAIN SINK
// =============================================================================

/// One-way channel for uncertain-band signals; consumed externally for
/// review/labeling, never read back by the evaluator
pub trait UncertainSink: Send + Sync {
    fn record(&self, signal: UncertainSignal);
}

/// Discards all signals
pub struct NullSink;

impl UncertainSink for NullSink {
    fn record(&self, _signal: UncertainSignal) {}
}

/// Buffers signals in memory; the external consumer drains them
#[derive(Default)]
pub struct MemorySink {
    signals: Mutex<Vec<UncertainSignal>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<UncertainSignal> {
        std::mem::take(&mut self.signals.lock().expect("sink lock poisoned"))
    }
}

impl UncertainSink for MemorySink {
    fn record(&self, signal: UncertainSignal) {
        self.signals.lock().expect("sink lock poisoned").push(signal);
    }
}

// =============================================================================
// PATTERN COLLECTOR
// =============================================================================

/// Literal regex matching; confidence fixed at 1.0, exact character offsets
pub struct PatternCollector {
    /// Compiled patterns; `None` marks a pattern that failed to compile so it
    /// is warned about once and skipped thereafter
    compiled: RwLock<HashMap<String, Option<Arc<Regex>>>>,
}

impl PatternCollector {
    pub fn new() -> Self {
        Self {
            compiled: RwLock::new(HashMap::new()),
        }
    }

    fn regex_for(&self, marker_id: &str, pattern: &str) -> Option<Arc<Regex>> {
        if let Some(entry) = self.compiled.read().expect("pattern lock poisoned").get(pattern) {
            return entry.clone();
        }

        let compiled = match Regex::new(pattern) {
            Ok(re) => Some(Arc::new(re)),
            Err(e) => {
                // Non-fatal: the pattern contributes no evidence
                warn!(marker_id, pattern, error = %e, "invalid pattern skipped");
                None
            }
        };

        self.compiled
            .write()
            .expect("pattern lock poisoned")
            .insert(pattern.to_string(), compiled.clone());
        compiled
    }
}

impl Default for PatternCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl EvidenceCollector for PatternCollector {
    fn collect(&self, text: &str, marker: &MarkerDefinition) -> Vec<Evidence> {
        let MarkerDefinition::Atomic { id, patterns, .. } = marker else {
            return Vec::new();
        };

        let mut evidence = Vec::new();
        for pattern in patterns {
            let Some(regex) = self.regex_for(id, pattern) else {
                continue;
            };
            // find_iter yields all non-overlapping matches
            for m in regex.find_iter(text) {
                evidence.push(Evidence::pattern(id.clone(), m.as_str(), m.start(), m.end()));
            }
        }
        evidence
    }
}

// =============================================================================
// SIMILARITY COLLECTOR
// =============================================================================

/// Cosine similarity between the unit's embedding and a marker's
/// reference-text embedding; graded confidence, negation guard on ATOMIC
pub struct SimilarityCollector {
    embedder: Arc<dyn Embedder>,
    sink: Arc<dyn UncertainSink>,
    /// Memoized embeddings keyed by normalized lowercase text. Embeddings are
    /// pure functions of text, so concurrent writers racing on the same key
    /// write the same value; last-write-wins is safe.
    cache: RwLock<HashMap<String, Arc<Vec<f32>>>>,
    accept: f64,
    uncertain: f64,
    chars_per_token: usize,
    negation_window_tokens: usize,
}

impl SimilarityCollector {
    pub fn new(embedder: Arc<dyn Embedder>, sink: Arc<dyn UncertainSink>) -> Self {
        Self {
            embedder,
            sink,
            cache: RwLock::new(HashMap::new()),
            accept: SIMILARITY_ACCEPT,
            uncertain: SIMILARITY_UNCERTAIN,
            chars_per_token: CHARS_PER_TOKEN,
            negation_window_tokens: NEGATION_WINDOW_TOKENS,
        }
    }

    pub fn with_thresholds(mut self, accept: f64, uncertain: f64) -> Self {
        self.accept = accept;
        self.uncertain = uncertain;
        self
    }

    pub fn with_negation_window(mut self, window_tokens: usize, chars_per_token: usize) -> Self {
        self.negation_window_tokens = window_tokens;
        self.chars_per_token = chars_per_token;
        self
    }

    /// Embed with memoization; key is the normalized lowercase text
    fn embed_cached(&self, text: &str) -> crate::Result<Arc<Vec<f32>>> {
        let key = text.trim().to_lowercase();

        if let Some(v) = self.cache.read().expect("embed cache poisoned").get(&key) {
            return Ok(v.clone());
        }

        let vector = Arc::new(self.embedder.embed(&key)?);
        self.cache
            .write()
            .expect("embed cache poisoned")
            .insert(key, vector.clone());
        Ok(vector)
    }

    /// Reference string: concept, signal tokens, then up to the first 5
    /// examples, joined with " ; "
    fn reference_string(marker: &MarkerDefinition) -> String {
        let frame = marker.frame();
        let mut parts = vec![frame.concept.clone()];
        parts.extend(frame.signal.iter().cloned());
        parts.extend(
            marker
                .examples()
                .iter()
                .take(MAX_REFERENCE_EXAMPLES)
                .cloned(),
        );
        parts.join(" ; ")
    }

    /// Negation guard: suppress when the guard regex and a whole-word signal
    /// token both match within the character window
    fn negated(&self, text: &str, marker: &MarkerDefinition) -> bool {
        let MarkerDefinition::Atomic {
            id,
            frame,
            negation_guard: Some(guard),
            ..
        } = marker
        else {
            return false;
        };

        let guard_re = match RegexBuilder::new(&guard.regex).case_insensitive(true).build() {
            Ok(re) => re,
            Err(e) => {
                warn!(marker_id = %id, error = %e, "invalid negation guard ignored");
                return false;
            }
        };
        let Some(guard_match) = guard_re.find(text) else {
            return false;
        };

        // Any signal token matching as a whole word, case-insensitive
        let signal_pos = frame.signal.iter().find_map(|token| {
            let word_re = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(token)))
                .case_insensitive(true)
                .build()
                .ok()?;
            word_re.find(text).map(|m| m.start())
        });
        let Some(signal_pos) = signal_pos else {
            return false;
        };

        let window_tokens = guard.window_tokens.unwrap_or(self.negation_window_tokens);
        let window_chars = window_tokens * self.chars_per_token;
        guard_match.start().abs_diff(signal_pos) <= window_chars
    }
}

impl EvidenceCollector for SimilarityCollector {
    fn collect(&self, text: &str, marker: &MarkerDefinition) -> Vec<Evidence> {
        let unit_vec = match self.embed_cached(text) {
            Ok(v) => v,
            Err(e) => {
                // Provider failure kills similarity evidence for this unit
                // only; pattern evidence is unaffected
                warn!(error = %e, "embedding failed for text unit");
                return Vec::new();
            }
        };

        let reference = Self::reference_string(marker);
        let ref_vec = match self.embed_cached(&reference) {
            Ok(v) => v,
            Err(e) => {
                warn!(marker_id = marker.id(), error = %e, "embedding failed for reference");
                return Vec::new();
            }
        };

        let score = cosine(&unit_vec, &ref_vec);

        if marker.level() == MarkerLevel::Atomic {
            if score >= self.accept {
                if self.negated(text, marker) {
                    debug!(marker_id = marker.id(), score, "suppressed by negation guard");
                    return Vec::new();
                }
                return vec![Evidence::similarity(marker.id(), marker.level(), score)];
            }
            if score >= self.uncertain {
                self.sink.record(UncertainSignal {
                    marker_id: marker.id().to_string(),
                    text: text.to_string(),
                    score,
                });
            }
            return Vec::new();
        }

        if score >= self.accept {
            return vec![Evidence::similarity(marker.id(), marker.level(), score)];
        }
        Vec::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================

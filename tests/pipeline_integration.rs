//! Integration tests for single-unit evaluation
//!
//! End-to-end through the engine: evidence collection, atomic dedup,
//! negation filtering and SEMANTIC/CLUSTER composition.

use std::sync::Arc;
use std::time::Duration;

use markerlens::core::{
    Embedder, MarkerEngine, MemorySink, NullSink, RegistryCache, StaticRegistrySource,
    UncertainSink,
};
use markerlens::types::EngineConfig;
use markerlens::Result;
use pretty_assertions::assert_eq;

/// Produces no similarity evidence; pattern-only tests stay deterministic
struct ZeroEmbedder;
impl Embedder for ZeroEmbedder {
    fn dimensions(&self) -> usize {
        2
    }
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0, 0.0])
    }
}

/// Every pair scores cosine 1.0
struct ConstantEmbedder;
impl Embedder for ConstantEmbedder {
    fn dimensions(&self) -> usize {
        2
    }
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }
}

fn engine_from_json(
    json: &str,
    embedder: Arc<dyn Embedder>,
    sink: Arc<dyn UncertainSink>,
) -> MarkerEngine {
    let data = serde_json::from_str(json).expect("test registry parses");
    let cache = RegistryCache::new(
        Box::new(StaticRegistrySource::new(data)),
        Duration::from_secs(3600),
    )
    .expect("test registry builds");
    MarkerEngine::with_config(cache, embedder, sink, EngineConfig::default())
}

fn contempt_registry() -> &'static str {
    r#"{
        "markers": [
            {
                "level": "ATOMIC",
                "id": "ABSOLUTIZER_WORD",
                "frame": { "concept": "", "signal": [] },
                "patterns": ["\\bimmer\\b|\\bnie\\b"]
            },
            {
                "level": "ATOMIC",
                "id": "DEVALUATION_WORD",
                "frame": { "concept": "", "signal": [] },
                "patterns": ["\\bgemein\\b"]
            },
            {
                "level": "SEMANTIC",
                "id": "SEM_CONTEMPT",
                "frame": { "concept": "" },
                "composed_of": ["ABSOLUTIZER_WORD", "DEVALUATION_WORD"]
            }
        ]
    }"#
}

#[test]
fn test_contempt_detected_from_patterns() {
    let engine = engine_from_json(contempt_registry(), Arc::new(ZeroEmbedder), Arc::new(NullSink));

    let unit = engine.evaluate_unit("Du bist immer so gemein! Das ist nie anders!");

    assert_eq!(
        unit.ato,
        vec!["ABSOLUTIZER_WORD".to_string(), "DEVALUATION_WORD".to_string()]
    );
    assert_eq!(unit.sem, vec!["SEM_CONTEMPT".to_string()]);
    assert!(unit.clu.is_empty());
    // immer, nie, gemein
    assert_eq!(unit.evidence.len(), 3);
    assert!(unit.evidence.iter().all(|e| e.confidence == 1.0));
}

#[test]
fn test_no_quorum_no_semantic() {
    let engine = engine_from_json(contempt_registry(), Arc::new(ZeroEmbedder), Arc::new(NullSink));

    // Only the absolutizer fires: 1 < quorum of 2
    let unit = engine.evaluate_unit("Das ist nie passiert.");
    assert_eq!(unit.ato, vec!["ABSOLUTIZER_WORD".to_string()]);
    assert!(unit.sem.is_empty());
}

#[test]
fn test_evaluation_is_deterministic() {
    let engine = engine_from_json(contempt_registry(), Arc::new(ZeroEmbedder), Arc::new(NullSink));
    let text = "Du bist immer so gemein! Das ist nie anders!";

    let first = engine.evaluate_unit(text);
    let second = engine.evaluate_unit(text);

    assert_eq!(first.ato, second.ato);
    assert_eq!(first.sem, second.sem);
    assert_eq!(first.clu, second.clu);
    assert_eq!(first.evidence.len(), second.evidence.len());
}

#[test]
fn test_stem_dedup_caps_variants() {
    let json = r#"{
        "markers": [
            { "level": "ATOMIC", "id": "BLAME_PHRASE", "patterns": ["\\bdeine schuld\\b"] },
            { "level": "ATOMIC", "id": "BLAME_VERB", "patterns": ["\\bbeschuldigst\\b"] },
            { "level": "ATOMIC", "id": "BLAME_WORD", "patterns": ["\\bschuld\\b"] }
        ]
    }"#;
    let engine = engine_from_json(json, Arc::new(ZeroEmbedder), Arc::new(NullSink));

    // All three variants match; only two ids per stem get credit
    let unit = engine.evaluate_unit("du beschuldigst mich, alles ist deine schuld");
    assert_eq!(
        unit.ato,
        vec!["BLAME_PHRASE".to_string(), "BLAME_VERB".to_string()]
    );
}

#[test]
fn test_repeated_matches_credit_once() {
    let engine = engine_from_json(contempt_registry(), Arc::new(ZeroEmbedder), Arc::new(NullSink));

    let unit = engine.evaluate_unit("immer immer immer");
    assert_eq!(unit.ato, vec!["ABSOLUTIZER_WORD".to_string()]);
    // Raw evidence keeps every match
    assert_eq!(unit.evidence.len(), 3);
}

fn similarity_registry() -> &'static str {
    r#"{
        "markers": [
            {
                "level": "ATOMIC",
                "id": "DEVALUATION_WORD",
                "frame": { "concept": "devaluation", "signal": ["gemein"] },
                "negation_guard": { "regex": "\\bnicht\\b", "window_tokens": 3 }
            }
        ]
    }"#
}

#[test]
fn test_negation_guard_suppresses_similarity_hit() {
    let engine = engine_from_json(
        similarity_registry(),
        Arc::new(ConstantEmbedder),
        Arc::new(NullSink),
    );

    // Accepted without negation nearby
    let unit = engine.evaluate_unit("Das ist sehr gemein");
    assert_eq!(unit.ato, vec!["DEVALUATION_WORD".to_string()]);

    // Guard and signal token inside the window: suppressed
    let unit = engine.evaluate_unit("Das ist nicht gemein");
    assert!(unit.ato.is_empty());
    assert!(unit.evidence.is_empty());
}

/// Scores every pair into the uncertain band
struct BorderlineEmbedder;
impl Embedder for BorderlineEmbedder {
    fn dimensions(&self) -> usize {
        2
    }
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // Reference strings are joined with " ; ", units are not
        if text.contains(';') {
            Ok(vec![1.0, 0.0])
        } else {
            Ok(vec![0.55, (1.0f32 - 0.55 * 0.55).sqrt()])
        }
    }
}

#[test]
fn test_uncertain_band_recorded_not_hit() {
    let sink = Arc::new(MemorySink::new());
    let engine = engine_from_json(similarity_registry(), Arc::new(BorderlineEmbedder), sink.clone());

    let unit = engine.evaluate_unit("eine grenzwertige Aussage");
    assert!(unit.ato.is_empty());
    assert!(unit.evidence.is_empty());

    let signals = sink.drain();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].marker_id, "DEVALUATION_WORD");
    assert!(signals[0].score >= 0.53 && signals[0].score < 0.60);
}

#[test]
fn test_family_hint_fires_in_unit_mode() {
    let json = r#"{
        "markers": [
            { "level": "ATOMIC", "id": "SCORN_WORD", "patterns": ["\\bscorn\\b"] },
            { "level": "ATOMIC", "id": "MOCKERY_WORD", "patterns": ["\\bmock\\b"] },
            { "level": "ATOMIC", "id": "DISDAIN_WORD", "patterns": ["\\bdisdain\\b"] }
        ],
        "family_hints": [
            {
                "hint_id": "SEM_CONTEMPT_HINT",
                "atoms": ["SCORN_WORD", "MOCKERY_WORD", "DISDAIN_WORD"],
                "sems": ["SEM_CONTEMPT"]
            }
        ]
    }"#;
    let engine = engine_from_json(json, Arc::new(ZeroEmbedder), Arc::new(NullSink));

    let unit = engine.evaluate_unit("they mock with scorn and disdain");
    assert_eq!(unit.sem, vec!["SEM_CONTEMPT_HINT".to_string()]);
}

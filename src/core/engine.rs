//! Marker engine: evaluator entry points
//!
//! Data flows strictly upward: registry -> collectors -> atomic resolver ->
//! semantic composer -> cluster composer -> meta composer. Collection is
//! per-unit and independent; composition runs after all evidence for the
//! covered window exists.

use std::sync::Arc;

use crate::core::atomic::AtomicResolver;
use crate::core::cluster::ClusterComposer;
use crate::core::collect::{
    EvidenceCollector, NullSink, PatternCollector, SimilarityCollector, UncertainSink,
};
use crate::core::embed::Embedder;
use crate::core::meta::MetaComposer;
use crate::core::registry::{RegistryCache, RegistrySnapshot};
use crate::core::semantic::SemanticComposer;
use crate::types::{EngineConfig, Evidence, Hit, MarkerLevel, UnitEvaluation};
use crate::Result;

pub struct MarkerEngine {
    registry: RegistryCache,
    pattern: PatternCollector,
    similarity: SimilarityCollector,
    resolver: AtomicResolver,
    semantic: SemanticComposer,
    cluster: ClusterComposer,
    meta: MetaComposer,
}

impl MarkerEngine {
    /// Engine with default config and a discarding uncertain sink
    pub fn new(registry: RegistryCache, embedder: Arc<dyn Embedder>) -> Self {
        Self::with_config(registry, embedder, Arc::new(NullSink), EngineConfig::default())
    }

    pub fn with_config(
        registry: RegistryCache,
        embedder: Arc<dyn Embedder>,
        sink: Arc<dyn UncertainSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            pattern: PatternCollector::new(),
            similarity: SimilarityCollector::new(embedder, sink)
                .with_thresholds(config.similarity_accept, config.similarity_uncertain)
                .with_negation_window(config.negation_window_tokens, config.chars_per_token),
            resolver: AtomicResolver::with_stem_cap(config.stem_credit_cap),
            semantic: SemanticComposer::with_params(
                config.semantic_quorum,
                config.family_hint_min_atoms,
                config.family_hint_confidence,
            ),
            cluster: ClusterComposer::with_params(
                config.cluster_quorum_ratio,
                config.cluster_window,
                config.distinct_normalizer,
                config.frequency_normalizer,
            ),
            meta: MetaComposer::with_coverage_ratio(config.meta_coverage_ratio),
        }
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.registry.snapshot()
    }

    /// Reload the registry; `force` bypasses the TTL check
    pub fn refresh_registry(&self, force: bool) -> Result<()> {
        self.registry.refresh(force)
    }

    /// Collect all raw evidence for one unit of text.
    ///
    /// Pattern evidence comes first (certain, offset-bearing), then
    /// similarity evidence; that order is the encounter order the atomic
    /// resolver's tie-break sees.
    fn collect_evidence(&self, snapshot: &RegistrySnapshot, text: &str) -> Vec<Evidence> {
        let mut evidence = Vec::new();

        for marker in snapshot.by_level(MarkerLevel::Atomic) {
            evidence.extend(self.pattern.collect(text, marker));
        }
        for marker in snapshot.by_level(MarkerLevel::Atomic) {
            evidence.extend(self.similarity.collect(text, marker));
        }
        // Raw similarity scores for composed markers are reported as
        // evidence too; composition itself never reads them
        for level in [MarkerLevel::Semantic, MarkerLevel::Cluster] {
            for marker in snapshot.by_level(level) {
                evidence.extend(self.similarity.collect(text, marker));
            }
        }

        evidence
    }

    /// Single-text-unit evaluation: effective ATOMIC, SEMANTIC and CLUSTER
    /// sets plus the raw evidence that produced them
    pub fn evaluate_unit(&self, text: &str) -> UnitEvaluation {
        let snapshot = self.registry.snapshot();
        let evidence = self.collect_evidence(&snapshot, text);

        let atomic_evidence: Vec<Evidence> = evidence
            .iter()
            .filter(|e| e.level == MarkerLevel::Atomic)
            .cloned()
            .collect();
        let ato = self.resolver.resolve(&atomic_evidence);

        let sem_hits = self.semantic.compose_unit(&snapshot, &ato);
        let sem: Vec<String> = sem_hits.iter().map(|h| h.marker_id.clone()).collect();

        let clu_hits = self.cluster.compose_unit(&snapshot, &sem);
        let clu: Vec<String> = clu_hits.iter().map(|h| h.marker_id.clone()).collect();

        UnitEvaluation {
            ato,
            sem,
            clu,
            evidence,
        }
    }

    /// Conversation-mode evaluation: per-unit atomic detection, then the
    /// windowed/cumulative composition rules over the whole sequence
    pub fn evaluate_sequence(&self, units: &[String]) -> Vec<Hit> {
        let snapshot = self.registry.snapshot();
        let mut hits: Vec<Hit> = Vec::new();
        let mut atomic_by_unit: Vec<Vec<String>> = Vec::with_capacity(units.len());

        for (index, unit) in units.iter().enumerate() {
            let evidence = self.collect_evidence(&snapshot, unit);
            let atomic_evidence: Vec<Evidence> = evidence
                .into_iter()
                .filter(|e| e.level == MarkerLevel::Atomic)
                .collect();
            let effective = self.resolver.resolve(&atomic_evidence);

            for id in &effective {
                hits.push(atomic_hit(id, &atomic_evidence, index));
            }
            atomic_by_unit.push(effective);
        }

        // Composition is a barrier-synchronized reduction over the evidence
        // gathered above, not a streaming operation
        let sem_hits = self.semantic.compose_sequence(&snapshot, &atomic_by_unit);
        hits.extend(sem_hits);

        let clu_hits = self.cluster.compose_sequence(&snapshot, &hits, units.len());
        hits.extend(clu_hits);

        let meta_hits = self.meta.compose(&snapshot, &hits);
        hits.extend(meta_hits);

        hits
    }
}

/// Atomic hit for one credited id: confidence is the strongest supporting
/// evidence, provenance the matched texts (pattern evidence) where present
fn atomic_hit(id: &str, evidence: &[Evidence], unit_index: usize) -> Hit {
    let mut confidence = 0.0f64;
    let mut provenance = Vec::new();
    for e in evidence.iter().filter(|e| e.marker_id == id) {
        confidence = confidence.max(e.confidence);
        if let Some(text) = &e.matched_text {
            provenance.push(text.clone());
        }
    }
    Hit::new(id, MarkerLevel::Atomic, confidence, provenance, Some(unit_index))
}

//! Cluster composer: proportional quorum over the effective SEMANTIC set,
//! optionally windowed over a message sequence
//!
//! CLUSTER markers may also reference other CLUSTER ids, so composition runs
//! to a fixpoint; the registry validator guarantees those edges are acyclic.

use std::collections::HashSet;

use crate::core::registry::RegistrySnapshot;
use crate::types::{Hit, MarkerDefinition, MarkerLevel, Scoring};
use crate::{CLUSTER_QUORUM_RATIO, CLUSTER_WINDOW, DISTINCT_NORMALIZER, FREQUENCY_NORMALIZER};

pub struct ClusterComposer {
    quorum_ratio: f64,
    default_window: usize,
    distinct_normalizer: f64,
    frequency_normalizer: f64,
}

impl ClusterComposer {
    pub fn new() -> Self {
        Self {
            quorum_ratio: CLUSTER_QUORUM_RATIO,
            default_window: CLUSTER_WINDOW,
            distinct_normalizer: DISTINCT_NORMALIZER,
            frequency_normalizer: FREQUENCY_NORMALIZER,
        }
    }

    pub fn with_params(
        quorum_ratio: f64,
        default_window: usize,
        distinct_normalizer: f64,
        frequency_normalizer: f64,
    ) -> Self {
        Self {
            quorum_ratio,
            default_window,
            distinct_normalizer,
            frequency_normalizer,
        }
    }

    /// Required component count: 60%-quorum rounded down, minimum 1
    fn required(&self, k: usize) -> usize {
        ((self.quorum_ratio * k as f64).floor() as usize).max(1)
    }

    /// Evaluate CLUSTER markers against one unit's effective SEMANTIC set
    pub fn compose_unit(
        &self,
        snapshot: &RegistrySnapshot,
        effective_semantic: &[String],
    ) -> Vec<Hit> {
        let mut available: HashSet<String> = effective_semantic.iter().cloned().collect();
        let total_detections = effective_semantic.len();
        self.fixpoint(snapshot, &mut available, total_detections, None, |_| true)
    }

    /// Evaluate CLUSTER markers over a sequence, counting only detections
    /// whose source unit falls within each marker's message window
    pub fn compose_sequence(
        &self,
        snapshot: &RegistrySnapshot,
        hits: &[Hit],
        unit_count: usize,
    ) -> Vec<Hit> {
        let mut out = Vec::new();
        let last_index = unit_count.saturating_sub(1);

        // Windows differ per marker, so the fixpoint runs per window size;
        // markers sharing a window see each other's triggers.
        let mut windows: Vec<usize> = snapshot
            .by_level(MarkerLevel::Cluster)
            .iter()
            .map(|m| self.window_of(m))
            .collect();
        windows.sort_unstable();
        windows.dedup();

        for window in windows {
            let cutoff = unit_count.saturating_sub(window);
            let in_window: Vec<&Hit> = hits
                .iter()
                .filter(|h| h.unit_index.map_or(true, |i| i >= cutoff))
                .collect();
            let mut available: HashSet<String> =
                in_window.iter().map(|h| h.marker_id.clone()).collect();
            let total_detections = in_window.len();

            let triggered = self.fixpoint(
                snapshot,
                &mut available,
                total_detections,
                Some(last_index),
                |m| self.window_of(m) == window,
            );
            out.extend(triggered);
        }

        out.sort_by(|a, b| a.marker_id.cmp(&b.marker_id));
        out
    }

    fn window_of(&self, marker: &MarkerDefinition) -> usize {
        match marker {
            MarkerDefinition::Cluster { window, .. } => window.unwrap_or(self.default_window),
            _ => self.default_window,
        }
    }

    /// Repeatedly evaluate until no further CLUSTER triggers appear, so
    /// clusters composed of clusters resolve in dependency order
    fn fixpoint<F>(
        &self,
        snapshot: &RegistrySnapshot,
        available: &mut HashSet<String>,
        total_detections: usize,
        unit_index: Option<usize>,
        select: F,
    ) -> Vec<Hit>
    where
        F: Fn(&MarkerDefinition) -> bool,
    {
        let mut hits: Vec<Hit> = Vec::new();
        let mut triggered: HashSet<String> = HashSet::new();

        loop {
            let mut progressed = false;

            for marker in snapshot.by_level(MarkerLevel::Cluster) {
                if triggered.contains(marker.id()) || !select(marker) {
                    continue;
                }
                if let Some(hit) =
                    self.evaluate(snapshot, marker, available, total_detections, unit_index)
                {
                    available.insert(hit.marker_id.clone());
                    triggered.insert(hit.marker_id.clone());
                    hits.push(hit);
                    progressed = true;
                }
            }

            if !progressed {
                break;
            }
        }

        hits
    }

    fn evaluate(
        &self,
        snapshot: &RegistrySnapshot,
        marker: &MarkerDefinition,
        available: &HashSet<String>,
        total_detections: usize,
        unit_index: Option<usize>,
    ) -> Option<Hit> {
        let known: Vec<&str> = marker
            .child_ids()
            .iter()
            .filter(|id| snapshot.contains(id))
            .map(String::as_str)
            .collect();
        let k = known.len();
        if k == 0 {
            return None;
        }

        let mut found: Vec<String> = known
            .iter()
            .filter(|id| available.contains(**id))
            .map(|id| id.to_string())
            .collect();
        if found.len() < self.required(k) {
            return None;
        }
        found.sort();

        let confidence = self.confidence(marker.scoring(), found.len(), total_detections);
        Some(Hit::new(
            marker.id(),
            MarkerLevel::Cluster,
            confidence,
            found,
            unit_index,
        ))
    }

    /// Average of a normalized distinct-component score and a log-scaled
    /// frequency score, damped by decay when configured
    fn confidence(&self, scoring: Scoring, distinct: usize, total_detections: usize) -> f64 {
        let distinct_score = distinct as f64 / self.distinct_normalizer;
        let frequency_score = ((total_detections + 1) as f64).ln() / self.frequency_normalizer;

        let mut confidence = scoring.base * scoring.weight * (distinct_score + frequency_score) / 2.0;
        if scoring.decay > 0.0 {
            confidence *= 1.0 - scoring.decay;
        }
        confidence.min(1.0)
    }
}

impl Default for ClusterComposer {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::{RegistryData, RegistrySnapshot};
    use crate::types::MarkerFrame;

    fn atomic(id: &str) -> MarkerDefinition {
        MarkerDefinition::Atomic {
            id: id.to_string(),
            frame: MarkerFrame::default(),
            examples: vec![],
            patterns: vec![],
            negation_guard: None,
        }
    }

    fn semantic(id: &str, composed_of: &[&str]) -> MarkerDefinition {
        MarkerDefinition::Semantic {
            id: id.to_string(),
            frame: MarkerFrame::default(),
            examples: vec![],
            composed_of: composed_of.iter().map(|s| s.to_string()).collect(),
            activation_logic: None,
            scoring: None,
        }
    }

    fn cluster(id: &str, composed_of: &[&str], window: Option<usize>) -> MarkerDefinition {
        MarkerDefinition::Cluster {
            id: id.to_string(),
            frame: MarkerFrame::default(),
            examples: vec![],
            composed_of: composed_of.iter().map(|s| s.to_string()).collect(),
            window,
            activation_rule: None,
            scoring: None,
        }
    }

    fn snapshot(markers: Vec<MarkerDefinition>) -> RegistrySnapshot {
        RegistrySnapshot::build(RegistryData {
            markers,
            family_hints: vec![],
        })
        .unwrap()
        .0
    }

    fn sems(n: usize) -> Vec<MarkerDefinition> {
        let mut markers = vec![atomic("A")];
        for i in 0..n {
            markers.push(semantic(&format!("SEM_{}", i), &["A"]));
        }
        markers
    }

    fn strings(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_quorum_five_components_requires_three() {
        let mut markers = sems(5);
        markers.push(cluster(
            "CLU_X",
            &["SEM_0", "SEM_1", "SEM_2", "SEM_3", "SEM_4"],
            None,
        ));
        let snap = snapshot(markers);
        let composer = ClusterComposer::new();

        assert!(composer
            .compose_unit(&snap, &strings(&["SEM_0", "SEM_1"]))
            .is_empty());

        let hits = composer.compose_unit(&snap, &strings(&["SEM_0", "SEM_1", "SEM_2"]));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].marker_id, "CLU_X");
    }

    #[test]
    fn test_quorum_two_components_requires_one() {
        let mut markers = sems(2);
        markers.push(cluster("CLU_X", &["SEM_0", "SEM_1"], None));
        let snap = snapshot(markers);

        // max(1, floor(0.6 * 2)) = max(1, 1) = 1
        let hits = ClusterComposer::new().compose_unit(&snap, &strings(&["SEM_1"]));
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_cluster_of_cluster_fixpoint() {
        let mut markers = sems(2);
        markers.push(cluster("CLU_BASE", &["SEM_0", "SEM_1"], None));
        markers.push(cluster("CLU_TOP", &["CLU_BASE"], None));
        let snap = snapshot(markers);

        let hits =
            ClusterComposer::new().compose_unit(&snap, &strings(&["SEM_0", "SEM_1"]));
        let ids: Vec<&str> = hits.iter().map(|h| h.marker_id.as_str()).collect();
        assert!(ids.contains(&"CLU_BASE"));
        assert!(ids.contains(&"CLU_TOP"));
    }

    #[test]
    fn test_sequence_window_excludes_old_detections() {
        let mut markers = sems(2);
        markers.push(cluster("CLU_X", &["SEM_0", "SEM_1"], Some(3)));
        let snap = snapshot(markers);
        let composer = ClusterComposer::new();

        // Both semantic hits far in the past of a 10-unit sequence
        let old_hits = vec![
            Hit::new("SEM_0", MarkerLevel::Semantic, 1.0, vec![], Some(0)),
            Hit::new("SEM_1", MarkerLevel::Semantic, 1.0, vec![], Some(1)),
        ];
        assert!(composer.compose_sequence(&snap, &old_hits, 10).is_empty());

        // Recent detections inside the window
        let fresh_hits = vec![
            Hit::new("SEM_0", MarkerLevel::Semantic, 1.0, vec![], Some(8)),
            Hit::new("SEM_1", MarkerLevel::Semantic, 1.0, vec![], Some(9)),
        ];
        let hits = composer.compose_sequence(&snap, &fresh_hits, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].provenance, vec!["SEM_0", "SEM_1"]);
    }

    #[test]
    fn test_confidence_distinct_and_frequency() {
        let mut markers = sems(3);
        markers.push(cluster("CLU_X", &["SEM_0", "SEM_1", "SEM_2"], None));
        let snap = snapshot(markers);

        let hits = ClusterComposer::new()
            .compose_unit(&snap, &strings(&["SEM_0", "SEM_1", "SEM_2"]));
        // distinct 3/10 plus ln(4)/5, halved
        let expected = (3.0 / 10.0 + 4.0f64.ln() / 5.0) / 2.0;
        assert!((hits[0].confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn test_decay_multiplier() {
        let mut markers = sems(2);
        markers.push(MarkerDefinition::Cluster {
            id: "CLU_X".to_string(),
            frame: MarkerFrame::default(),
            examples: vec![],
            composed_of: vec!["SEM_0".to_string(), "SEM_1".to_string()],
            window: None,
            activation_rule: None,
            scoring: Some(Scoring {
                base: 1.0,
                weight: 1.0,
                decay: 0.5,
            }),
        });
        let snap = snapshot(markers);

        let hits =
            ClusterComposer::new().compose_unit(&snap, &strings(&["SEM_0", "SEM_1"]));
        let undamped = (2.0 / 10.0 + 3.0f64.ln() / 5.0) / 2.0;
        assert!((hits[0].confidence - undamped * 0.5).abs() < 1e-9);
    }
}

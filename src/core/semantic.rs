//! Semantic composer: quorum rules over the effective ATOMIC set, plus the
//! family-hint fallback for under-specified registries

use std::collections::HashSet;

use crate::core::registry::RegistrySnapshot;
use crate::types::{ActivationRule, Hit, MarkerDefinition, MarkerLevel};
use crate::{FAMILY_HINT_CONFIDENCE, FAMILY_HINT_MIN_ATOMS, RULE_WINDOW, SEMANTIC_QUORUM};

pub struct SemanticComposer {
    quorum: usize,
    hint_min_atoms: usize,
    hint_confidence: f64,
}

impl SemanticComposer {
    pub fn new() -> Self {
        Self {
            quorum: SEMANTIC_QUORUM,
            hint_min_atoms: FAMILY_HINT_MIN_ATOMS,
            hint_confidence: FAMILY_HINT_CONFIDENCE,
        }
    }

    pub fn with_params(quorum: usize, hint_min_atoms: usize, hint_confidence: f64) -> Self {
        Self {
            quorum,
            hint_min_atoms,
            hint_confidence,
        }
    }

    /// Evaluate all SEMANTIC markers against one unit's effective ATOMIC set.
    ///
    /// Returns formal triggers followed by family hints; the effective
    /// SEMANTIC set is the union of both, treated identically downstream.
    pub fn compose_unit(&self, snapshot: &RegistrySnapshot, effective_atomic: &[String]) -> Vec<Hit> {
        let atomic: HashSet<&str> = effective_atomic.iter().map(String::as_str).collect();
        let mut hits = Vec::new();

        for marker in snapshot.by_level(MarkerLevel::Semantic) {
            if let Some(hit) = self.evaluate(snapshot, marker, &atomic, None) {
                hits.push(hit);
            }
        }

        let formal: HashSet<String> = hits.iter().map(|h| h.marker_id.clone()).collect();
        hits.extend(self.family_hints(snapshot, &atomic, &formal, None));
        hits
    }

    /// Evaluate SEMANTIC markers over a message sequence.
    ///
    /// Each marker's `activation_logic` supplies the message window (default
    /// 3) and required count (default 2, `ALL` requires every component);
    /// only atoms from units inside the window count toward the quorum.
    pub fn compose_sequence(
        &self,
        snapshot: &RegistrySnapshot,
        atomic_by_unit: &[Vec<String>],
    ) -> Vec<Hit> {
        if atomic_by_unit.is_empty() {
            return Vec::new();
        }
        let last_index = atomic_by_unit.len() - 1;
        let mut hits = Vec::new();

        for marker in snapshot.by_level(MarkerLevel::Semantic) {
            let MarkerDefinition::Semantic {
                activation_logic, ..
            } = marker
            else {
                continue;
            };
            let rule = ActivationRule::parse_opt(activation_logic.as_deref());
            let atomic = window_union(atomic_by_unit, rule.window);
            if let Some(hit) = self.evaluate_with_rule(snapshot, marker, &atomic, Some(last_index), rule) {
                hits.push(hit);
            }
        }

        let formal: HashSet<String> = hits.iter().map(|h| h.marker_id.clone()).collect();
        let hint_atoms = window_union(atomic_by_unit, RULE_WINDOW);
        hits.extend(self.family_hints(snapshot, &hint_atoms, &formal, Some(last_index)));
        hits
    }

    /// Unit-mode quorum: at least `quorum` supporting atoms unless fewer are
    /// even defined, in which case all of them
    fn evaluate(
        &self,
        snapshot: &RegistrySnapshot,
        marker: &MarkerDefinition,
        atomic: &HashSet<&str>,
        unit_index: Option<usize>,
    ) -> Option<Hit> {
        self.evaluate_inner(snapshot, marker, atomic, unit_index, None)
    }

    fn evaluate_with_rule(
        &self,
        snapshot: &RegistrySnapshot,
        marker: &MarkerDefinition,
        atomic: &HashSet<&str>,
        unit_index: Option<usize>,
        rule: ActivationRule,
    ) -> Option<Hit> {
        self.evaluate_inner(snapshot, marker, atomic, unit_index, Some(rule))
    }

    fn evaluate_inner(
        &self,
        snapshot: &RegistrySnapshot,
        marker: &MarkerDefinition,
        atomic: &HashSet<&str>,
        unit_index: Option<usize>,
        rule: Option<ActivationRule>,
    ) -> Option<Hit> {
        // Ids missing from the registry are excluded from quorum counting
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

        let required = match rule {
            Some(rule) => rule.quorum.required(k),
            None => self.quorum.min(k),
        };

        let mut found: Vec<String> = known
            .iter()
            .filter(|id| atomic.contains(**id))
            .map(|id| id.to_string())
            .collect();
        if found.len() < required {
            return None;
        }
        found.sort();

        let scoring = marker.scoring();
        let confidence = (scoring.base * scoring.weight * (found.len() as f64 / k as f64)).min(1.0);

        Some(Hit::new(
            marker.id(),
            MarkerLevel::Semantic,
            confidence,
            found,
            unit_index,
        ))
    }

    /// Family-hint fallback: enough atomic members and no formal SEMANTIC
    /// trigger in the family
    fn family_hints(
        &self,
        snapshot: &RegistrySnapshot,
        atomic: &HashSet<&str>,
        formal: &HashSet<String>,
        unit_index: Option<usize>,
    ) -> Vec<Hit> {
        let mut hints = Vec::new();

        for family in snapshot.family_hints() {
            let mut found: Vec<String> = family
                .atoms
                .iter()
                .filter(|a| atomic.contains(a.as_str()))
                .cloned()
                .collect();
            let formally_covered = family.sems.iter().any(|s| formal.contains(s));

            if found.len() >= self.hint_min_atoms && !formally_covered {
                found.sort();
                hints.push(Hit::new(
                    family.hint_id.clone(),
                    MarkerLevel::Semantic,
                    self.hint_confidence,
                    found,
                    unit_index,
                ));
            }
        }

        hints
    }
}

impl Default for SemanticComposer {
    fn default() -> Self {
        Self::new()
    }
}

/// Distinct atomic ids across the last `window` units
fn window_union(atomic_by_unit: &[Vec<String>], window: usize) -> HashSet<&str> {
    let start = atomic_by_unit.len().saturating_sub(window);
    atomic_by_unit[start..]
        .iter()
        .flat_map(|ids| ids.iter().map(String::as_str))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::{RegistryData, RegistrySnapshot};
    use crate::types::{FamilyHint, MarkerFrame, Scoring};

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
        semantic_with(id, composed_of, None, None)
    }

    fn semantic_with(
        id: &str,
        composed_of: &[&str],
        activation_logic: Option<&str>,
        scoring: Option<Scoring>,
    ) -> MarkerDefinition {
        MarkerDefinition::Semantic {
            id: id.to_string(),
            frame: MarkerFrame::default(),
            examples: vec![],
            composed_of: composed_of.iter().map(|s| s.to_string()).collect(),
            activation_logic: activation_logic.map(String::from),
            scoring,
        }
    }

    fn snapshot(markers: Vec<MarkerDefinition>, hints: Vec<FamilyHint>) -> RegistrySnapshot {
        RegistrySnapshot::build(RegistryData {
            markers,
            family_hints: hints,
        })
        .unwrap()
        .0
    }

    fn ids(hits: &[Hit]) -> Vec<&str> {
        hits.iter().map(|h| h.marker_id.as_str()).collect()
    }

    #[test]
    fn test_quorum_two_of_three() {
        let snap = snapshot(
            vec![
                atomic("A"),
                atomic("B"),
                atomic("C"),
                semantic("SEM_X", &["A", "B", "C"]),
            ],
            vec![],
        );
        let composer = SemanticComposer::new();

        assert!(composer
            .compose_unit(&snap, &["A".to_string()])
            .is_empty());

        let hits = composer.compose_unit(&snap, &["A".to_string(), "C".to_string()]);
        assert_eq!(ids(&hits), vec!["SEM_X"]);
        assert_eq!(hits[0].provenance, vec!["A", "C"]);
    }

    #[test]
    fn test_single_component_requires_all() {
        let snap = snapshot(vec![atomic("A"), semantic("SEM_X", &["A"])], vec![]);
        let composer = SemanticComposer::new();

        let hits = composer.compose_unit(&snap, &["A".to_string()]);
        assert_eq!(ids(&hits), vec!["SEM_X"]);
        assert!(composer.compose_unit(&snap, &[]).is_empty());
    }

    #[test]
    fn test_confidence_found_over_k() {
        let snap = snapshot(
            vec![
                atomic("A"),
                atomic("B"),
                atomic("C"),
                semantic("SEM_X", &["A", "B", "C"]),
            ],
            vec![],
        );
        let composer = SemanticComposer::new();

        let hits = composer.compose_unit(&snap, &["A".to_string(), "B".to_string()]);
        assert!((hits[0].confidence - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_clamped() {
        let scoring = Scoring {
            base: 2.0,
            weight: 3.0,
            decay: 0.0,
        };
        let snap = snapshot(
            vec![
                atomic("A"),
                atomic("B"),
                semantic_with("SEM_X", &["A", "B"], None, Some(scoring)),
            ],
            vec![],
        );
        let hits =
            SemanticComposer::new().compose_unit(&snap, &["A".to_string(), "B".to_string()]);
        assert_eq!(hits[0].confidence, 1.0);
    }

    #[test]
    fn test_missing_component_excluded_from_quorum() {
        // Only A is known; quorum counts over k=1, so A alone triggers
        let snap = snapshot(vec![atomic("A"), semantic("SEM_X", &["A", "GHOST"])], vec![]);
        let hits = SemanticComposer::new().compose_unit(&snap, &["A".to_string()]);
        assert_eq!(ids(&hits), vec!["SEM_X"]);
        assert_eq!(hits[0].confidence, 1.0);
    }

    fn family() -> FamilyHint {
        FamilyHint {
            hint_id: "FAM_BLAME_HINT".to_string(),
            atoms: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            sems: vec!["SEM_X".into()],
        }
    }

    #[test]
    fn test_family_hint_fires_without_formal_sem() {
        let snap = snapshot(
            vec![
                atomic("A"),
                atomic("B"),
                atomic("C"),
                atomic("D"),
                semantic("SEM_X", &["A", "Z_UNRELATED"]),
            ],
            vec![family()],
        );
        let effective: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        let hits = SemanticComposer::new().compose_unit(&snap, &effective);
        assert_eq!(ids(&hits), vec!["FAM_BLAME_HINT"]);
        assert_eq!(hits[0].confidence, FAMILY_HINT_CONFIDENCE);
    }

    #[test]
    fn test_family_hint_exclusive_with_formal_sem() {
        let snap = snapshot(
            vec![
                atomic("A"),
                atomic("B"),
                atomic("C"),
                atomic("D"),
                semantic("SEM_X", &["A", "B"]),
            ],
            vec![family()],
        );
        // SEM_X triggers formally, so the hint must not also fire
        let effective: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        let hits = SemanticComposer::new().compose_unit(&snap, &effective);
        assert_eq!(ids(&hits), vec!["SEM_X"]);
    }

    #[test]
    fn test_family_hint_needs_three_atoms() {
        let snap = snapshot(
            vec![atomic("A"), atomic("B"), atomic("C"), atomic("D")],
            vec![family()],
        );
        let two: Vec<String> = ["A", "B"].iter().map(|s| s.to_string()).collect();
        assert!(SemanticComposer::new().compose_unit(&snap, &two).is_empty());
    }

    #[test]
    fn test_sequence_window_restricts_atoms() {
        let snap = snapshot(
            vec![
                atomic("A"),
                atomic("B"),
                semantic_with("SEM_X", &["A", "B"], Some("ANY 2 IN 2 messages"), None),
            ],
            vec![],
        );
        let composer = SemanticComposer::new();

        // A fell out of the 2-message window
        let stale = vec![
            vec!["A".to_string()],
            vec![],
            vec!["B".to_string()],
        ];
        assert!(composer.compose_sequence(&snap, &stale).is_empty());

        // Both inside the window
        let fresh = vec![
            vec![],
            vec!["A".to_string()],
            vec!["B".to_string()],
        ];
        let hits = composer.compose_sequence(&snap, &fresh);
        assert_eq!(ids(&hits), vec!["SEM_X"]);
        assert_eq!(hits[0].unit_index, Some(2));
    }

    #[test]
    fn test_sequence_all_rule() {
        let snap = snapshot(
            vec![
                atomic("A"),
                atomic("B"),
                atomic("C"),
                semantic_with("SEM_X", &["A", "B", "C"], Some("ALL IN 5 messages"), None),
            ],
            vec![],
        );
        let composer = SemanticComposer::new();

        let partial = vec![vec!["A".to_string(), "B".to_string()]];
        assert!(composer.compose_sequence(&snap, &partial).is_empty());

        let complete = vec![vec![
            "A".to_string(),
            "B".to_string(),
            "C".to_string(),
        ]];
        assert_eq!(ids(&composer.compose_sequence(&snap, &complete)), vec!["SEM_X"]);
    }
}

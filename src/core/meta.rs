//! Meta composer: coverage-ratio threshold over the cumulative hit set of a
//! whole sequence (never windowed)

use std::collections::HashSet;

use crate::core::registry::RegistrySnapshot;
use crate::types::{Hit, MarkerLevel};
use crate::META_COVERAGE_RATIO;

pub struct MetaComposer {
    coverage_ratio: f64,
}

impl MetaComposer {
    pub fn new() -> Self {
        Self {
            coverage_ratio: META_COVERAGE_RATIO,
        }
    }

    pub fn with_coverage_ratio(coverage_ratio: f64) -> Self {
        Self { coverage_ratio }
    }

    /// Evaluate META markers against everything detected so far.
    ///
    /// Required count is `ceil(ratio * components)`; confidence is
    /// `found / components` (found never exceeds the total).
    pub fn compose(&self, snapshot: &RegistrySnapshot, cumulative_hits: &[Hit]) -> Vec<Hit> {
        let present: HashSet<&str> = cumulative_hits
            .iter()
            .map(|h| h.marker_id.as_str())
            .collect();
        let mut out = Vec::new();

        for marker in snapshot.by_level(MarkerLevel::Meta) {
            let known: Vec<&str> = marker
                .child_ids()
                .iter()
                .filter(|id| snapshot.contains(id))
                .map(String::as_str)
                .collect();
            let k = known.len();
            if k == 0 {
                continue;
            }

            let required = (self.coverage_ratio * k as f64).ceil() as usize;
            let mut found: Vec<String> = known
                .iter()
                .filter(|id| present.contains(**id))
                .map(|id| id.to_string())
                .collect();
            if found.len() < required {
                continue;
            }
            found.sort();

            let confidence = found.len() as f64 / k as f64;
            out.push(Hit::new(
                marker.id(),
                MarkerLevel::Meta,
                confidence,
                found,
                None,
            ));
        }

        out
    }
}

impl Default for MetaComposer {
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
    use crate::types::{MarkerDefinition, MarkerFrame};

    fn atomic(id: &str) -> MarkerDefinition {
        MarkerDefinition::Atomic {
            id: id.to_string(),
            frame: MarkerFrame::default(),
            examples: vec![],
            patterns: vec![],
            negation_guard: None,
        }
    }

    fn meta(id: &str, components: &[&str]) -> MarkerDefinition {
        MarkerDefinition::Meta {
            id: id.to_string(),
            frame: MarkerFrame::default(),
            examples: vec![],
            components: components.iter().map(|s| s.to_string()).collect(),
            activation_rule: None,
            scoring: None,
        }
    }

    fn hit(id: &str, index: usize) -> Hit {
        Hit::new(id, MarkerLevel::Atomic, 1.0, vec![], Some(index))
    }

    #[test]
    fn test_coverage_three_of_five() {
        let snap = RegistrySnapshot::build(RegistryData {
            markers: vec![
                atomic("A"),
                atomic("B"),
                atomic("C"),
                atomic("D"),
                atomic("E"),
                meta("META_X", &["A", "B", "C", "D", "E"]),
            ],
            family_hints: vec![],
        })
        .unwrap()
        .0;
        let composer = MetaComposer::new();

        // ceil(0.6 * 5) = 3 distinct components required
        let two = vec![hit("A", 0), hit("B", 1), hit("B", 2)];
        assert!(composer.compose(&snap, &two).is_empty());

        let three = vec![hit("A", 0), hit("B", 5), hit("C", 40)];
        let hits = composer.compose(&snap, &three);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].marker_id, "META_X");
        // Exactly 3/5
        assert!((hits[0].confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_cumulative_not_windowed() {
        let snap = RegistrySnapshot::build(RegistryData {
            markers: vec![
                atomic("A"),
                atomic("B"),
                meta("META_X", &["A", "B"]),
            ],
            family_hints: vec![],
        })
        .unwrap()
        .0;

        // Detections arbitrarily far apart still count
        let spread = vec![hit("A", 0), hit("B", 900)];
        let hits = MetaComposer::new().compose(&snap, &spread);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].confidence, 1.0);
    }

    #[test]
    fn test_components_of_any_level() {
        let snap = RegistrySnapshot::build(RegistryData {
            markers: vec![
                atomic("A"),
                atomic("B"),
                meta("META_X", &["A", "B"]),
            ],
            family_hints: vec![],
        })
        .unwrap()
        .0;

        let hits = MetaComposer::new().compose(
            &snap,
            &[
                Hit::new("A", MarkerLevel::Atomic, 1.0, vec![], Some(0)),
                Hit::new("B", MarkerLevel::Atomic, 0.7, vec![], Some(1)),
            ],
        );
        assert_eq!(hits[0].provenance, vec!["A", "B"]);
    }
}

//! Atomic resolver: dedup and per-lemma cooldown over accepted evidence

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::Evidence;
use crate::STEM_CREDIT_CAP;

lazy_static! {
    static ref RE_STEM_SUFFIX: Regex = Regex::new(r"_(WORD|PHRASE|VERB)$").unwrap();
}

/// Marker id with its variant suffix stripped; ids sharing a stem are
/// variants of the same underlying lemma
pub fn stem_of(id: &str) -> String {
    RE_STEM_SUFFIX.replace(id, "").into_owned()
}

/// Filters accepted ATOMIC evidence into the effective ATOMIC set
#[derive(Debug)]
pub struct AtomicResolver {
    stem_credit_cap: usize,
}

impl AtomicResolver {
    pub fn new() -> Self {
        Self {
            stem_credit_cap: STEM_CREDIT_CAP,
        }
    }

    pub fn with_stem_cap(stem_credit_cap: usize) -> Self {
        Self { stem_credit_cap }
    }

    /// Resolve evidence in encounter order: drop exact-id repeats, credit at
    /// most `stem_credit_cap` distinct ids per stem
    pub fn resolve(&self, evidence: &[Evidence]) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stems: HashMap<String, usize> = HashMap::new();
        let mut effective = Vec::new();

        for e in evidence {
            if !seen.insert(&e.marker_id) {
                continue;
            }
            let stem = stem_of(&e.marker_id);
            let credits = stems.entry(stem).or_insert(0);
            if *credits >= self.stem_credit_cap {
                continue;
            }
            *credits += 1;
            effective.push(e.marker_id.clone());
        }

        effective
    }
}

impl Default for AtomicResolver {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================

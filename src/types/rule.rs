//! Activation-rule grammar for temporal (conversation-window) evaluation
//!
//! Grammar: `<ANY|AT_LEAST|ALL> <N> [DISTINCT] <kind> IN <M> messages`
//! Examples: "ANY 2", "AT_LEAST 2 DISTINCT SEMs IN 24 messages", "ALL"

use lazy_static::lazy_static;
use regex::Regex;

use crate::{RULE_REQUIRED, RULE_WINDOW};

lazy_static! {
    static ref RE_WINDOW: Regex = Regex::new(r"(?i)IN\s+(\d+)\s+messages?").unwrap();
    static ref RE_COUNT: Regex = Regex::new(r"(\d+)").unwrap();
    static ref RE_ALL: Regex = Regex::new(r"(?i)\bALL\b").unwrap();
    static ref RE_DISTINCT: Regex = Regex::new(r"(?i)\bDISTINCT\b").unwrap();
}

/// Required component count for a composed trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quorum {
    /// At least this many components present
    Count(usize),
    /// Every listed component present
    All,
}

impl Quorum {
    /// Concrete required count given the number of known components
    pub fn required(&self, component_count: usize) -> usize {
        match self {
            Quorum::Count(n) => (*n).min(component_count),
            Quorum::All => component_count,
        }
    }
}

/// Parsed activation rule: quorum plus message window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationRule {
    pub quorum: Quorum,
    /// Message window size in conversation mode
    pub window: usize,
    pub distinct: bool,
}

impl Default for ActivationRule {
    fn default() -> Self {
        Self {
            quorum: Quorum::Count(RULE_REQUIRED),
            window: RULE_WINDOW,
            distinct: false,
        }
    }
}

impl ActivationRule {
    /// Parse a rule string; malformed parts fall back to defaults
    pub fn parse(rule: &str) -> Self {
        let window = RE_WINDOW
            .captures(rule)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(RULE_WINDOW);

        // ALL maps to "require every listed component", never a sentinel count
        let quorum = if RE_ALL.is_match(rule) {
            Quorum::All
        } else {
            // First number outside the window clause is the required count
            let stripped = RE_WINDOW.replace(rule, "");
            RE_COUNT
                .captures(&stripped)
                .and_then(|c| c[1].parse().ok())
                .map(Quorum::Count)
                .unwrap_or(Quorum::Count(RULE_REQUIRED))
        };

        Self {
            quorum,
            window,
            distinct: RE_DISTINCT.is_match(rule),
        }
    }

    /// Parse an optional rule string, defaulting when absent
    pub fn parse_opt(rule: Option<&str>) -> Self {
        rule.map(Self::parse).unwrap_or_default()
    }
}

// =============================================================================
// TESTS
// =============================================================================

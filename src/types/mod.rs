//! Core types for MarkerLens

mod config;
mod evidence;
mod hit;
mod marker;
mod rule;

pub use config::EngineConfig;
pub use evidence::{Evidence, EvidenceSource, UncertainSignal};
pub use hit::{Hit, UnitEvaluation};
pub use marker::{
    FamilyHint, MarkerDefinition, MarkerFrame, MarkerLevel, NegationGuard, Scoring,
};
pub use rule::{ActivationRule, Quorum};

//! Core modules for the marker evaluator

pub mod api;
pub mod atomic;
pub mod cluster;
pub mod collect;
pub mod embed;
pub mod engine;
pub mod meta;
pub mod registry;
pub mod semantic;

pub use api::{create_router, run_server};
pub use atomic::AtomicResolver;
pub use cluster::ClusterComposer;
pub use collect::{
    EvidenceCollector, MemorySink, NullSink, PatternCollector, SimilarityCollector, UncertainSink,
};
pub use embed::{cosine, Embedder, HashEmbedder};
pub use engine::MarkerEngine;
pub use meta::MetaComposer;
pub use registry::{
    FileRegistrySource, RegistryCache, RegistryData, RegistrySnapshot, RegistrySource,
    StaticRegistrySource,
};
pub use semantic::SemanticComposer;

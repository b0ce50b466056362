//! Registry cache: immutable marker snapshots with TTL refresh
//!
//! Readers clone an `Arc<RegistrySnapshot>`; `refresh` swaps the whole
//! snapshot atomically so a concurrent reader never sees a torn registry.
//! A failed reload keeps the previous snapshot usable.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{FamilyHint, MarkerDefinition, MarkerLevel};
use crate::{Error, Result};

/// Registry document as supplied by an external source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryData {
    #[serde(default)]
    pub markers: Vec<MarkerDefinition>,
    #[serde(default)]
    pub family_hints: Vec<FamilyHint>,
}

/// External supplier of registry documents
pub trait RegistrySource: Send + Sync {
    fn load(&self) -> Result<RegistryData>;
}

/// File-based source: a JSON document of `RegistryData` shape
pub struct FileRegistrySource {
    path: PathBuf,
}

impl FileRegistrySource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl RegistrySource for FileRegistrySource {
    fn load(&self) -> Result<RegistryData> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::RegistryLoad(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::RegistryLoad(format!("{}: {}", self.path.display(), e)))
    }
}

/// In-memory source for tests and embedded registries
pub struct StaticRegistrySource {
    data: RegistryData,
}

impl StaticRegistrySource {
    pub fn new(data: RegistryData) -> Self {
        Self { data }
    }
}

impl RegistrySource for StaticRegistrySource {
    fn load(&self) -> Result<RegistryData> {
        Ok(self.data.clone())
    }
}

/// Immutable snapshot of marker definitions and family-hint tables
#[derive(Debug)]
pub struct RegistrySnapshot {
    markers: HashMap<String, MarkerDefinition>,
    family_hints: Vec<FamilyHint>,
    pub loaded_at: DateTime<Utc>,
}

impl RegistrySnapshot {
    /// Build and validate a snapshot.
    ///
    /// Level-violating `composed_of` edges and CLUSTER-level cycles are
    /// registry validation errors. Dangling child ids are non-fatal: they are
    /// excluded from quorum counting and reported back as warnings.
    pub fn build(data: RegistryData) -> Result<(Self, Vec<String>)> {
        let mut markers = HashMap::new();
        for marker in data.markers {
            markers.insert(marker.id().to_string(), marker);
        }

        let mut warnings = Vec::new();
        for marker in markers.values() {
            for child_id in marker.child_ids() {
                match markers.get(child_id) {
                    Some(child) => {
                        if !marker.level().may_compose(child.level()) {
                            return Err(Error::RegistryInvalid(format!(
                                "{} ({}) may not compose {} ({})",
                                marker.id(),
                                marker.level(),
                                child.id(),
                                child.level()
                            )));
                        }
                    }
                    None => {
                        warnings.push(format!(
                            "{} references unknown marker {}",
                            marker.id(),
                            child_id
                        ));
                    }
                }
            }
        }

        // The strict level ordering rules out cycles everywhere except the
        // CLUSTER->CLUSTER edge, which needs an explicit check.
        check_cluster_cycles(&markers)?;

        Ok((
            Self {
                markers,
                family_hints: data.family_hints,
                loaded_at: Utc::now(),
            },
            warnings,
        ))
    }

    pub fn get(&self, id: &str) -> Option<&MarkerDefinition> {
        self.markers.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.markers.contains_key(id)
    }

    pub fn markers(&self) -> impl Iterator<Item = &MarkerDefinition> {
        self.markers.values()
    }

    /// All markers of one level, sorted by id for deterministic iteration
    pub fn by_level(&self, level: MarkerLevel) -> Vec<&MarkerDefinition> {
        let mut result: Vec<_> = self
            .markers
            .values()
            .filter(|m| m.level() == level)
            .collect();
        result.sort_by_key(|m| m.id());
        result
    }

    pub fn family_hints(&self) -> &[FamilyHint] {
        &self.family_hints
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Depth-first cycle check over CLUSTER->CLUSTER edges
fn check_cluster_cycles(markers: &HashMap<String, MarkerDefinition>) -> Result<()> {
    fn visit(
        id: &str,
        markers: &HashMap<String, MarkerDefinition>,
        visiting: &mut HashSet<String>,
        done: &mut HashSet<String>,
    ) -> Result<()> {
        if done.contains(id) {
            return Ok(());
        }
        if !visiting.insert(id.to_string()) {
            return Err(Error::RegistryInvalid(format!(
                "cluster composition cycle through {}",
                id
            )));
        }
        if let Some(marker) = markers.get(id) {
            for child in marker.child_ids() {
                if let Some(c) = markers.get(child) {
                    if c.level() == MarkerLevel::Cluster {
                        visit(child, markers, visiting, done)?;
                    }
                }
            }
        }
        visiting.remove(id);
        done.insert(id.to_string());
        Ok(())
    }

    let mut visiting = HashSet::new();
    let mut done = HashSet::new();
    for marker in markers.values() {
        if marker.level() == MarkerLevel::Cluster {
            visit(marker.id(), markers, &mut visiting, &mut done)?;
        }
    }
    Ok(())
}

/// TTL-cached registry with atomic snapshot swap
pub struct RegistryCache {
    source: Box<dyn RegistrySource>,
    snapshot: RwLock<Arc<RegistrySnapshot>>,
    ttl: Duration,
}

impl RegistryCache {
    /// Create a cache and perform the initial load
    pub fn new(source: Box<dyn RegistrySource>, ttl: Duration) -> Result<Self> {
        let data = source.load()?;
        let (snapshot, warnings) = RegistrySnapshot::build(data)?;
        for w in &warnings {
            warn!(warning = %w, "registry quality warning");
        }
        Ok(Self {
            source,
            snapshot: RwLock::new(Arc::new(snapshot)),
            ttl,
        })
    }

    /// Current snapshot; cheap Arc clone, never blocks on a refresh in flight
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.read().expect("registry lock poisoned").clone()
    }

    fn expired(&self) -> bool {
        let snap = self.snapshot();
        let age = Utc::now().signed_duration_since(snap.loaded_at);
        age.num_seconds() >= self.ttl.as_secs() as i64
    }

    /// Reload from the source.
    ///
    /// `refresh(false)` is a no-op while the cache is non-empty and
    /// unexpired. A load failure leaves the previous snapshot intact.
    pub fn refresh(&self, force: bool) -> Result<()> {
        if !force && !self.snapshot().is_empty() && !self.expired() {
            return Ok(());
        }

        let data = self.source.load()?;
        let (snapshot, warnings) = RegistrySnapshot::build(data)?;
        for w in &warnings {
            warn!(warning = %w, "registry quality warning");
        }

        let mut guard = self.snapshot.write().expect("registry lock poisoned");
        *guard = Arc::new(snapshot);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! Persistent cache for dependency graphs (and other analysis payloads).
//!
//! Entries are JSON documents `{ formatVersion, configHash, trackedFileMtimes, data }`
//! stored under the hash of a [`CacheKey`]. An entry is only served when the
//! format version and config hash match and every tracked file still has the
//! modification time recorded at write time. Anything unreadable is a miss.

use crate::error::Result;
use crate::paths::resolve_under;
use crate::types::{to_unix_ms, DependencyGraph, ScopeMode};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Bump when the serialized payload shape changes.
pub const CACHE_FORMAT_VERSION: &str = "1";

/// Upper bound on files whose mtimes are recorded per entry.
pub const DEFAULT_MTIME_SAMPLE: usize = 100;

/// Directory (relative to the project root) used by [`FsCacheStore::for_project_root`].
pub const PROJECT_CACHE_DIR: &str = ".paydown/cache";

/// Key-value byte store backing the cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn read(&self, key: &str) -> std::io::Result<Option<Vec<u8>>>;
    async fn write(&self, key: &str, bytes: &[u8]) -> std::io::Result<()>;
    async fn clear(&self) -> std::io::Result<()>;
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    dir: PathBuf,
}

impl FsCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn for_project_root(project_root: &Path) -> Self {
        Self::new(project_root.join(PROJECT_CACHE_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl CacheStore for FsCacheStore {
    async fn read(&self, key: &str) -> std::io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await
    }

    async fn clear(&self) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

/// In-process store, mostly for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite raw bytes for a key.
    pub fn insert_raw(&self, key: &str, bytes: Vec<u8>) {
        self.lock().insert(key.to_string(), bytes);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn read(&self, key: &str) -> std::io::Result<Option<Vec<u8>>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> std::io::Result<()> {
        self.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn clear(&self) -> std::io::Result<()> {
        self.lock().clear();
        Ok(())
    }
}

/// Inputs that determine a dependency graph's shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    mode: ScopeMode,
    entry_points: Vec<String>,
    max_depth: Option<usize>,
    root_dir: String,
    exclude_patterns: Vec<String>,
}

impl CacheKey {
    pub fn new(
        root_dir: &Path,
        entry_points: &[PathBuf],
        mode: ScopeMode,
        max_depth: Option<usize>,
        exclude_patterns: &[String],
    ) -> Self {
        let entry_points: BTreeSet<String> = entry_points
            .iter()
            .map(|ep| resolve_under(root_dir, ep).to_string_lossy().into_owned())
            .collect();
        let exclude_patterns: BTreeSet<String> = exclude_patterns
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            mode,
            entry_points: entry_points.into_iter().collect(),
            max_depth,
            root_dir: root_dir.to_string_lossy().into_owned(),
            exclude_patterns: exclude_patterns.into_iter().collect(),
        }
    }

    /// Canonical JSON form (sorted keys, sorted lists).
    pub fn canonical_json(&self) -> String {
        serde_json::json!({
            "entryPoints": self.entry_points,
            "excludePatterns": self.exclude_patterns,
            "maxDepth": self.max_depth,
            "mode": self.mode.as_str(),
            "rootDir": self.root_dir,
        })
        .to_string()
    }

    /// Hex SHA-256 of [`CacheKey::canonical_json`].
    pub fn hash(&self) -> String {
        let digest = Sha256::digest(self.canonical_json().as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry<T> {
    format_version: String,
    config_hash: String,
    tracked_file_mtimes: BTreeMap<PathBuf, u64>,
    data: T,
}

/// Validated cache over any serde payload
pub struct AnalysisCache<S> {
    store: S,
}

impl<S: CacheStore> AnalysisCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let hash = key.hash();
        let bytes = match self.store.read(&hash).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                log::debug!("Cache miss for {hash}");
                return None;
            }
            Err(err) => {
                log::warn!("Failed to read cache entry {hash}: {err}");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("Cache entry {hash} corrupted: {err}");
                return None;
            }
        };

        if entry.format_version != CACHE_FORMAT_VERSION {
            log::debug!(
                "Cache entry {hash} has format {} (expected {CACHE_FORMAT_VERSION})",
                entry.format_version
            );
            return None;
        }
        if entry.config_hash != hash {
            log::debug!("Cache entry {hash} config hash mismatch");
            return None;
        }

        for (path, recorded) in &entry.tracked_file_mtimes {
            let current = file_mtime_ms(path).await;
            if current != Some(*recorded) {
                log::debug!("Cache entry {hash} stale: {} changed", path.display());
                return None;
            }
        }

        log::debug!("Cache hit for {hash}");
        Some(entry.data)
    }

    pub async fn set<T: Serialize>(
        &self,
        key: &CacheKey,
        data: &T,
        tracked_files: &[PathBuf],
    ) -> Result<()> {
        let mut tracked_file_mtimes = BTreeMap::new();
        for path in tracked_files {
            if let Some(mtime) = file_mtime_ms(path).await {
                tracked_file_mtimes.insert(path.clone(), mtime);
            }
        }

        let hash = key.hash();
        let entry = CacheEntry {
            format_version: CACHE_FORMAT_VERSION.to_string(),
            config_hash: hash.clone(),
            tracked_file_mtimes,
            data,
        };
        let bytes = serde_json::to_vec(&entry)?;
        self.store.write(&hash, &bytes).await?;
        log::debug!("Cached entry {hash} ({} bytes)", bytes.len());
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await?;
        Ok(())
    }
}

/// Dependency-graph view over [`AnalysisCache`]
pub struct DependencyGraphCache<S> {
    inner: AnalysisCache<S>,
    sample_size: usize,
}

impl<S: CacheStore> DependencyGraphCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            inner: AnalysisCache::new(store),
            sample_size: DEFAULT_MTIME_SAMPLE,
        }
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn store(&self) -> &S {
        self.inner.store()
    }

    pub async fn get(&self, key: &CacheKey) -> Option<DependencyGraph> {
        self.inner.get(key).await
    }

    pub async fn set(
        &self,
        key: &CacheKey,
        graph: &DependencyGraph,
        tracked_files: &[PathBuf],
    ) -> Result<()> {
        self.inner.set(key, graph, tracked_files).await
    }

    /// Store `graph`, tracking the bounded sample of its files.
    pub async fn store_graph(&self, key: &CacheKey, graph: &DependencyGraph) -> Result<()> {
        let tracked = sample_tracked_files(graph, self.sample_size);
        self.set(key, graph, &tracked).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }
}

/// Deterministic subset of graph files whose mtimes guard a cache entry.
///
/// Entry points are always included; the remaining budget is spread evenly
/// over the other files in path order.
pub fn sample_tracked_files(graph: &DependencyGraph, max_samples: usize) -> Vec<PathBuf> {
    let mut sample: BTreeSet<PathBuf> = graph.entry_points.iter().cloned().collect();

    let rest: Vec<&PathBuf> = graph
        .paths()
        .filter(|path| !sample.contains(*path))
        .collect();
    let budget = max_samples.saturating_sub(sample.len());

    if rest.len() <= budget {
        sample.extend(rest.into_iter().cloned());
    } else if budget > 0 {
        for i in 0..budget {
            sample.insert(rest[i * rest.len() / budget].clone());
        }
    }

    sample.into_iter().collect()
}

async fn file_mtime_ms(path: &Path) -> Option<u64> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    meta.modified().ok().map(to_unix_ms)
}

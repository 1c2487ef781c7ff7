use async_trait::async_trait;
use paydown_graph::{CacheStore, FsCacheStore, MemoryCacheStore};
use std::env;
use std::path::{Path, PathBuf};

/// Overrides the on-disk cache directory.
pub const CACHE_DIR_ENV: &str = "PAYDOWN_CACHE_DIR";

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    File,
    Memory,
}

/// Cache store picked at runtime from the command line
pub enum CliCacheStore {
    File(FsCacheStore),
    Memory(MemoryCacheStore),
}

impl CliCacheStore {
    pub fn open(backend: CacheBackend, root: &Path) -> Self {
        match backend {
            CacheBackend::File => {
                let store = match cache_dir_override() {
                    Some(dir) => FsCacheStore::new(dir),
                    None => FsCacheStore::for_project_root(root),
                };
                log::debug!("Dependency graph cache at {}", store.dir().display());
                CliCacheStore::File(store)
            }
            CacheBackend::Memory => CliCacheStore::Memory(MemoryCacheStore::new()),
        }
    }
}

fn cache_dir_override() -> Option<PathBuf> {
    env::var_os(CACHE_DIR_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[async_trait]
impl CacheStore for CliCacheStore {
    async fn read(&self, key: &str) -> std::io::Result<Option<Vec<u8>>> {
        match self {
            CliCacheStore::File(store) => store.read(key).await,
            CliCacheStore::Memory(store) => store.read(key).await,
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> std::io::Result<()> {
        match self {
            CliCacheStore::File(store) => store.write(key, bytes).await,
            CliCacheStore::Memory(store) => store.write(key, bytes).await,
        }
    }

    async fn clear(&self) -> std::io::Result<()> {
        match self {
            CliCacheStore::File(store) => store.clear().await,
            CliCacheStore::Memory(store) => store.clear().await,
        }
    }
}

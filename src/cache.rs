//! Content-hash keyed descriptor cache.
//!
//! Transpiling is referentially transparent, so a descriptor can be reused
//! whenever the source, index and options are unchanged. The cache lives on
//! the caller side; the transpiler itself keeps no state between calls.

use crate::codegen::transpile_with_options;
use crate::descriptor::CellDescriptor;
use crate::error::TranspileError;
use crate::options::TranspileOptions;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

const CACHE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: BTreeMap<String, CellDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

#[derive(Default)]
pub struct CellCache {
    entries: Mutex<HashMap<String, CellDescriptor>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl CellCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash of the source together with everything else the output depends on.
    pub fn compute_hash(source: &str, options: &TranspileOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_string(options).unwrap_or_default().as_bytes());
        hasher.update([0u8]);
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn key(source: &str, index: u32, options: &TranspileOptions) -> String {
        format!("{}:{}", Self::compute_hash(source, options), index)
    }

    pub fn get(&self, source: &str, index: u32, options: &TranspileOptions) -> Option<CellDescriptor> {
        let key = Self::key(source, index, options);
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&key) {
            Some(descriptor) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(index, "cell cache hit");
                Some(descriptor.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn set(&self, source: &str, options: &TranspileOptions, descriptor: CellDescriptor) {
        let key = Self::key(source, descriptor.index, options);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, descriptor);
    }

    /// Cached descriptor, or a fresh transpile that is stored on success.
    /// Failures are not cached; they are cheap to reproduce.
    pub fn get_or_transpile(
        &self,
        source: &str,
        index: u32,
        options: &TranspileOptions,
    ) -> Result<CellDescriptor, TranspileError> {
        if let Some(descriptor) = self.get(source, index, options) {
            return Ok(descriptor);
        }
        let descriptor = transpile_with_options(source, index, options)?;
        self.set(source, options, descriptor.clone());
        Ok(descriptor)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().unwrap_or_else(PoisonError::into_inner).len(),
        }
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Load a cache written by [`CellCache::save`]. A missing file gives an
    /// empty cache; an unreadable or outdated one is discarded.
    pub fn load(path: &Path) -> io::Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e),
        };

        let file: CacheFile = match serde_json::from_str(&data) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding corrupt cell cache");
                fs::remove_file(path).ok();
                return Ok(Self::new());
            }
        };
        if file.version != CACHE_VERSION {
            debug!(path = %path.display(), version = file.version, "discarding outdated cell cache");
            return Ok(Self::new());
        }

        Ok(Self {
            entries: Mutex::new(file.entries.into_iter().collect()),
            ..Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let file = CacheFile {
            version: CACHE_VERSION,
            entries,
        };
        let data = serde_json::to_string(&file).map_err(io::Error::other)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_depends_on_options() {
        let a = CellCache::compute_hash("x + 1", &TranspileOptions::default());
        let b = CellCache::compute_hash(
            "x + 1",
            &TranspileOptions::default().with_default_globals(),
        );
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hit_after_miss() {
        let cache = CellCache::new();
        let opts = TranspileOptions::default();
        let first = cache.get_or_transpile("let x = 1;", 0, &opts).unwrap();
        let second = cache.get_or_transpile("let x = 1;", 0, &opts).unwrap();
        assert_eq!(first, second);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_index_is_part_of_the_key() {
        let cache = CellCache::new();
        let opts = TranspileOptions::default();
        let a = cache.get_or_transpile("1 + 2", 0, &opts).unwrap();
        let b = cache.get_or_transpile("1 + 2", 1, &opts).unwrap();
        assert_eq!(a.declared_bindings[0].name, "__cell_0");
        assert_eq!(b.declared_bindings[0].name, "__cell_1");
        assert_eq!(cache.stats().entries, 2);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = CellCache::new();
        let opts = TranspileOptions::default();
        assert!(cache.get_or_transpile("let x = ;", 0, &opts).is_err());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("cell-cache-test-{}", std::process::id()));
        let path = dir.join("cells.json");
        let opts = TranspileOptions::default();

        let cache = CellCache::new();
        cache.get_or_transpile("const a = b * 2;", 3, &opts).unwrap();
        cache.save(&path).unwrap();

        let loaded = CellCache::load(&path).unwrap();
        let descriptor = loaded.get("const a = b * 2;", 3, &opts).unwrap();
        assert_eq!(descriptor.index, 3);
        assert_eq!(loaded.stats().hits, 1);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_file_is_discarded() {
        let dir = std::env::temp_dir().join(format!("cell-cache-corrupt-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cells.json");
        fs::write(&path, "{ not json").unwrap();

        let loaded = CellCache::load(&path).unwrap();
        assert_eq!(loaded.stats().entries, 0);
        assert!(!path.exists());

        fs::remove_dir_all(&dir).ok();
    }
}

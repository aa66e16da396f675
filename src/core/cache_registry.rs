//! Global toolchain cache registry
//!
//! Persists the `toolchain_id -> CachedToolchain` mapping in `registry.json`
//! under the global cache root. Readers parse the whole file without a lock
//! (writes are atomic whole-file replacements); mutations serialize on the
//! registry lock file. A corrupt registry loads as empty with a warning and
//! is never destructively repaired.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::directory::global_cache_dir;
use crate::core::fsutil::{atomic_write, ScopedFileLock};
use crate::core::state::now_iso8601;

/// A toolchain installation recorded in the global cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToolchain {
    /// Absolute path to the extracted installation root
    #[serde(rename = "path")]
    pub install_path: PathBuf,
    /// SHA-256 of the source archive
    pub sha256: String,
    /// Size of the source archive in bytes
    pub size_bytes: u64,
    /// Toolchain version (e.g., "18.1.8")
    pub version: String,
    /// URL the archive was fetched from
    #[serde(default)]
    pub url: String,
    /// Number of projects holding a reference
    #[serde(default)]
    pub ref_count: u32,
    #[serde(default)]
    pub first_installed_at: Option<String>,
    #[serde(default)]
    pub last_accessed_at: Option<String>,
}

/// Registry of cached toolchain installations
pub struct CacheRegistry {
    registry_file: PathBuf,
    lock_file: PathBuf,
}

impl CacheRegistry {
    /// Create a registry over an explicit registry.json path
    pub fn new(registry_file: PathBuf) -> Self {
        let lock_file = registry_file
            .parent()
            .map(|p| p.join("lock").join("registry.lock"))
            .unwrap_or_else(|| PathBuf::from("registry.lock"));
        Self {
            registry_file,
            lock_file,
        }
    }

    /// Path to the underlying registry file
    pub fn registry_file(&self) -> &Path {
        &self.registry_file
    }

    /// Look up a cached toolchain by id
    pub fn get_toolchain_info(&self, toolchain_id: &str) -> Option<CachedToolchain> {
        self.read_all().remove(toolchain_id)
    }

    /// Register a toolchain installation (persisted atomically under the
    /// registry lock)
    pub fn register(&self, toolchain_id: &str, mut entry: CachedToolchain) -> Result<()> {
        let _lock = ScopedFileLock::acquire(&self.lock_file)?;
        let mut entries = self.read_all();

        if entry.first_installed_at.is_none() {
            entry.first_installed_at = Some(now_iso8601());
        }
        entry.last_accessed_at = Some(now_iso8601());
        entries.insert(toolchain_id.to_string(), entry);

        self.write_all(&entries)?;
        log::info!("Registered toolchain in cache: {}", toolchain_id);
        Ok(())
    }

    /// Update the last-accessed timestamp of an entry
    pub fn touch(&self, toolchain_id: &str) -> Result<()> {
        let _lock = ScopedFileLock::acquire(&self.lock_file)?;
        let mut entries = self.read_all();
        if let Some(entry) = entries.get_mut(toolchain_id) {
            entry.last_accessed_at = Some(now_iso8601());
            self.write_all(&entries)?;
        }
        Ok(())
    }

    /// Increment the reference count of an entry
    pub fn add_ref(&self, toolchain_id: &str) -> Result<()> {
        let _lock = ScopedFileLock::acquire(&self.lock_file)?;
        let mut entries = self.read_all();
        if let Some(entry) = entries.get_mut(toolchain_id) {
            entry.ref_count = entry.ref_count.saturating_add(1);
            self.write_all(&entries)?;
        }
        Ok(())
    }

    /// Decrement the reference count of an entry, returning the new count
    pub fn release_ref(&self, toolchain_id: &str) -> Result<u32> {
        let _lock = ScopedFileLock::acquire(&self.lock_file)?;
        let mut entries = self.read_all();
        let count = match entries.get_mut(toolchain_id) {
            Some(entry) => {
                entry.ref_count = entry.ref_count.saturating_sub(1);
                entry.ref_count
            }
            None => 0,
        };
        self.write_all(&entries)?;
        Ok(count)
    }

    /// Remove an entry from the registry
    ///
    /// The registry entry must disappear before the installation directory
    /// is deleted, so garbage collection removes the record first and only
    /// then the tree.
    pub fn remove(&self, toolchain_id: &str) -> Result<Option<CachedToolchain>> {
        let _lock = ScopedFileLock::acquire(&self.lock_file)?;
        let mut entries = self.read_all();
        let removed = entries.remove(toolchain_id);
        if removed.is_some() {
            self.write_all(&entries)?;
        }
        Ok(removed)
    }

    /// Snapshot of all registered toolchains
    pub fn iter_toolchains(&self) -> Vec<(String, CachedToolchain)> {
        self.read_all().into_iter().collect()
    }

    fn read_all(&self) -> BTreeMap<String, CachedToolchain> {
        let content = match std::fs::read_to_string(&self.registry_file) {
            Ok(content) => content,
            Err(_) => return BTreeMap::new(),
        };
        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!(
                    "Corrupt cache registry {}, treating as empty: {}",
                    self.registry_file.display(),
                    e
                );
                BTreeMap::new()
            }
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, CachedToolchain>) -> Result<()> {
        let json =
            serde_json::to_string_pretty(entries).context("Failed to serialize cache registry")?;
        atomic_write(&self.registry_file, &json)
    }
}

/// Open the registry in the global cache directory
pub fn open_global_registry() -> Result<CacheRegistry> {
    Ok(CacheRegistry::new(global_cache_dir()?.join("registry.json")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(dir: &Path, version: &str) -> CachedToolchain {
        CachedToolchain {
            install_path: dir.to_path_buf(),
            sha256: "aa".repeat(32),
            size_bytes: 1024,
            version: version.to_string(),
            url: "https://example.com/llvm.tar.xz".to_string(),
            ref_count: 0,
            first_installed_at: None,
            last_accessed_at: None,
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let dir = TempDir::new().unwrap();
        let registry = CacheRegistry::new(dir.path().join("registry.json"));

        assert!(registry.get_toolchain_info("llvm-18.1.8-linux-x64").is_none());

        registry
            .register("llvm-18.1.8-linux-x64", entry(dir.path(), "18.1.8"))
            .unwrap();

        let info = registry.get_toolchain_info("llvm-18.1.8-linux-x64").unwrap();
        assert_eq!(info.version, "18.1.8");
        assert!(info.first_installed_at.is_some());
        assert!(info.last_accessed_at.is_some());
    }

    #[test]
    fn test_corrupt_registry_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("registry.json");
        std::fs::write(&file, "{broken").unwrap();

        let registry = CacheRegistry::new(file.clone());
        assert!(registry.iter_toolchains().is_empty());
        // No destructive repair: the corrupt file is untouched by reads
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "{broken");
    }

    #[test]
    fn test_registry_file_is_valid_json_after_write() {
        let dir = TempDir::new().unwrap();
        let registry = CacheRegistry::new(dir.path().join("registry.json"));
        registry
            .register("gcc-13.2.0-linux-x64", entry(dir.path(), "13.2.0"))
            .unwrap();

        let raw = std::fs::read_to_string(registry.registry_file()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value.get("gcc-13.2.0-linux-x64").is_some());
        assert_eq!(
            value["gcc-13.2.0-linux-x64"]["path"],
            serde_json::json!(dir.path().to_string_lossy())
        );
    }

    #[test]
    fn test_ref_counting() {
        let dir = TempDir::new().unwrap();
        let registry = CacheRegistry::new(dir.path().join("registry.json"));
        registry
            .register("llvm-17.0.6-linux-x64", entry(dir.path(), "17.0.6"))
            .unwrap();

        registry.add_ref("llvm-17.0.6-linux-x64").unwrap();
        registry.add_ref("llvm-17.0.6-linux-x64").unwrap();
        assert_eq!(
            registry
                .get_toolchain_info("llvm-17.0.6-linux-x64")
                .unwrap()
                .ref_count,
            2
        );

        assert_eq!(registry.release_ref("llvm-17.0.6-linux-x64").unwrap(), 1);
        assert_eq!(registry.release_ref("llvm-17.0.6-linux-x64").unwrap(), 0);
        // Releasing below zero saturates
        assert_eq!(registry.release_ref("llvm-17.0.6-linux-x64").unwrap(), 0);
    }

    #[test]
    fn test_remove_entry() {
        let dir = TempDir::new().unwrap();
        let registry = CacheRegistry::new(dir.path().join("registry.json"));
        registry
            .register("llvm-18.1.8-linux-x64", entry(dir.path(), "18.1.8"))
            .unwrap();

        let removed = registry.remove("llvm-18.1.8-linux-x64").unwrap();
        assert!(removed.is_some());
        assert!(registry.get_toolchain_info("llvm-18.1.8-linux-x64").is_none());
        assert!(registry.remove("llvm-18.1.8-linux-x64").unwrap().is_none());
    }
}

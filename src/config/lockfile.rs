//! toolchainkit.lock generation and verification
//!
//! The lock file records the exact URL, SHA-256, size and version of every
//! external component (toolchains and downloaded build tools) for
//! reproducible reinstall and supply-chain verification. Hashes compare
//! equal whether stored as `sha256:<hex>` or bare hex.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::model::ToolchainKitConfig;
use crate::core::cache_registry::CacheRegistry;
use crate::core::directory::{global_cache_dir, PROJECT_DIR_NAME};
use crate::core::fsutil::{atomic_write, compute_config_hash, compute_file_hash, hashes_equal};
use crate::core::platform::PlatformInfo;
use crate::core::state::now_iso8601;
use crate::error::ToolchainKitError;

/// A locked component (toolchain or build tool)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedComponent {
    pub url: String,
    pub sha256: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_date: Option<String>,
}

/// Complete lock file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LockFile {
    #[serde(default = "default_lock_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default)]
    pub toolchains: BTreeMap<String, LockedComponent>,
    #[serde(default)]
    pub build_tools: BTreeMap<String, LockedComponent>,
    #[serde(default)]
    pub packages: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn default_lock_version() -> u32 {
    1
}

/// Source information for a component entering the lock file
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub url: String,
    pub sha256: String,
    pub size_bytes: u64,
    pub version: Option<String>,
}

/// Changes between two lock files for one component kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<ModifiedComponent>,
}

/// A component whose hash changed between two lock files
#[derive(Debug, Clone, PartialEq)]
pub struct ModifiedComponent {
    pub name: String,
    pub old_version: Option<String>,
    pub new_version: Option<String>,
    pub old_hash: String,
    pub new_hash: String,
}

/// Differences between two lock files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LockFileDiff {
    pub toolchains: ComponentDiff,
    pub build_tools: ComponentDiff,
}

/// Manages the project's toolchainkit.lock
pub struct LockFileManager {
    project_root: PathBuf,
    lock_file_path: PathBuf,
}

impl LockFileManager {
    pub fn new(project_root: &Path) -> Result<Self> {
        if !project_root.is_dir() {
            return Err(ToolchainKitError::lock_file(format!(
                "Project root is not a directory: {}",
                project_root.display()
            ))
            .into());
        }
        let project_root = project_root
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", project_root.display()))?;
        let lock_file_path = project_root.join("toolchainkit.lock");
        Ok(Self {
            project_root,
            lock_file_path,
        })
    }

    /// Path of the lock file
    pub fn lock_file_path(&self) -> &Path {
        &self.lock_file_path
    }

    /// Generate a lock file from resolved components
    pub fn generate(
        &self,
        _config: &ToolchainKitConfig,
        platform: &PlatformInfo,
        toolchains: &BTreeMap<String, ComponentInfo>,
        build_tools: Option<&BTreeMap<String, ComponentInfo>>,
    ) -> Result<LockFile> {
        let mut lock = LockFile {
            version: 1,
            generated: Some(now_iso8601()),
            platform: Some(platform.platform_string()),
            ..LockFile::default()
        };

        for (id, info) in toolchains {
            lock.toolchains.insert(id.clone(), locked(info));
            log::debug!("Added toolchain to lock file: {}", id);
        }

        if let Some(tools) = build_tools {
            for (name, info) in tools {
                lock.build_tools.insert(name.clone(), locked(info));
                log::debug!("Added build tool to lock file: {}", name);
            }
        }

        lock.metadata.insert(
            "generator".to_string(),
            format!("ToolchainKit {}", env!("CARGO_PKG_VERSION")),
        );
        lock.metadata.insert(
            "config_hash".to_string(),
            compute_config_hash(&self.project_root.join("toolchainkit.yaml"))?,
        );
        lock.metadata
            .insert("runtime_id".to_string(), format!("rust-{}", env!("CARGO_PKG_RUST_VERSION")));

        log::info!(
            "Generated lock file with {} toolchains, {} build tools",
            lock.toolchains.len(),
            lock.build_tools.len()
        );
        Ok(lock)
    }

    /// Save the lock file as YAML (atomic write)
    pub fn save(&self, lock: &LockFile) -> Result<()> {
        let yaml = serde_yaml::to_string(lock).context("Failed to serialize lock file")?;
        atomic_write(&self.lock_file_path, &yaml)?;
        log::info!("Lock file saved: {}", self.lock_file_path.display());
        Ok(())
    }

    /// Load the lock file, or None if it doesn't exist
    pub fn load(&self) -> Result<Option<LockFile>> {
        if !self.lock_file_path.exists() {
            log::debug!("Lock file not found: {}", self.lock_file_path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.lock_file_path).map_err(|e| {
            ToolchainKitError::LockFile {
                message: format!("Failed to read {}", self.lock_file_path.display()),
                source: Some(e.into()),
            }
        })?;

        let lock = serde_yaml::from_str(&content).map_err(|e| ToolchainKitError::LockFile {
            message: format!(
                "Failed to parse {}: the lock file may be corrupted",
                self.lock_file_path.display()
            ),
            source: Some(e.into()),
        })?;

        Ok(Some(lock))
    }

    /// Verify the current installation against a lock file
    ///
    /// Returns `(ok, issues)`; inconsistencies are reported, never thrown.
    pub fn verify(&self, lock: &LockFile) -> Result<(bool, Vec<String>)> {
        let registry = crate::core::cache_registry::open_global_registry()?;
        let global_tools = global_cache_dir().ok().map(|c| c.join("tools"));
        Ok(self.verify_with(lock, &registry, global_tools.as_deref()))
    }

    /// Verification core with injectable registry and tools dir (testing)
    pub fn verify_with(
        &self,
        lock: &LockFile,
        registry: &CacheRegistry,
        global_tools_dir: Option<&Path>,
    ) -> (bool, Vec<String>) {
        let mut issues = Vec::new();

        for (toolchain_id, expected) in &lock.toolchains {
            match registry.get_toolchain_info(toolchain_id) {
                None => issues.push(format!(
                    "Toolchain not installed: {}. Expected from lock file but not found in \
                     registry.",
                    toolchain_id
                )),
                Some(info) => {
                    if !info.sha256.is_empty() && !hashes_equal(&info.sha256, &expected.sha256) {
                        issues.push(format!(
                            "Toolchain hash mismatch: {} (expected {}, got {}). This may \
                             indicate tampering or an incorrect installation.",
                            toolchain_id, expected.sha256, info.sha256
                        ));
                    }
                }
            }
        }

        for (tool_name, expected) in &lock.build_tools {
            let Some(tool_path) = self.find_tool_path(tool_name, global_tools_dir) else {
                issues.push(format!(
                    "Build tool not installed: {}. Expected from lock file but not found.",
                    tool_name
                ));
                continue;
            };

            match compute_file_hash(&tool_path) {
                Ok(actual) => {
                    if !hashes_equal(&actual, &expected.sha256) {
                        issues.push(format!(
                            "Build tool hash mismatch: {} (expected {}, got sha256:{})",
                            tool_name, expected.sha256, actual
                        ));
                    }
                }
                Err(e) => log::warn!("Error verifying build tool {}: {}", tool_name, e),
            }
        }

        let ok = issues.is_empty();
        if ok {
            log::info!("Lock file verification passed");
        } else {
            log::warn!("Lock file verification failed with {} issues", issues.len());
        }
        (ok, issues)
    }

    /// Compute the differences between two lock files
    pub fn diff(&self, old: &LockFile, new: &LockFile) -> LockFileDiff {
        LockFileDiff {
            toolchains: diff_components(&old.toolchains, &new.toolchains),
            build_tools: diff_components(&old.build_tools, &new.build_tools),
        }
    }

    fn find_tool_path(&self, tool_name: &str, global_tools_dir: Option<&Path>) -> Option<PathBuf> {
        let file_name = if cfg!(windows) {
            format!("{}.exe", tool_name)
        } else {
            tool_name.to_string()
        };

        let local = self
            .project_root
            .join(PROJECT_DIR_NAME)
            .join("tools")
            .join(&file_name);
        if local.exists() {
            return Some(local);
        }

        let global = global_tools_dir?.join(&file_name);
        global.exists().then_some(global)
    }
}

fn locked(info: &ComponentInfo) -> LockedComponent {
    LockedComponent {
        url: info.url.clone(),
        sha256: info.sha256.clone(),
        size_bytes: info.size_bytes,
        version: info.version.clone(),
        verified: true,
        verification_date: Some(now_iso8601()),
    }
}

fn diff_components(
    old: &BTreeMap<String, LockedComponent>,
    new: &BTreeMap<String, LockedComponent>,
) -> ComponentDiff {
    let mut diff = ComponentDiff::default();

    for name in new.keys() {
        if !old.contains_key(name) {
            diff.added.push(name.clone());
        }
    }
    for name in old.keys() {
        if !new.contains_key(name) {
            diff.removed.push(name.clone());
        }
    }

    for (name, old_comp) in old {
        let Some(new_comp) = new.get(name) else {
            continue;
        };
        if old_comp.sha256 != new_comp.sha256 {
            diff.modified.push(ModifiedComponent {
                name: name.clone(),
                old_version: old_comp.version.clone(),
                new_version: new_comp.version.clone(),
                old_hash: old_comp.sha256.clone(),
                new_hash: new_comp.sha256.clone(),
            });
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache_registry::CachedToolchain;
    use tempfile::TempDir;

    fn platform() -> PlatformInfo {
        PlatformInfo {
            os: "linux".to_string(),
            arch: "x64".to_string(),
            os_version: "5.15".to_string(),
            distribution: "ubuntu".to_string(),
            abi: "glibc-2.31".to_string(),
        }
    }

    fn config(dir: &Path) -> ToolchainKitConfig {
        let path = dir.join("toolchainkit.yaml");
        std::fs::write(
            &path,
            "version: 1\ntoolchains:\n  - name: llvm-18\n    type: clang\n    version: 18.1.8\n",
        )
        .unwrap();
        crate::config::model::parse_config(&path).unwrap()
    }

    fn component(version: &str, hash: &str) -> ComponentInfo {
        ComponentInfo {
            url: format!("https://example.com/llvm-{}.tar.xz", version),
            sha256: hash.to_string(),
            size_bytes: 1000,
            version: Some(version.to_string()),
        }
    }

    #[test]
    fn test_generate_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let manager = LockFileManager::new(dir.path()).unwrap();

        let mut toolchains = BTreeMap::new();
        toolchains.insert(
            "llvm-18.1.8-linux-x64".to_string(),
            component("18.1.8", &"ab".repeat(32)),
        );

        let lock = manager
            .generate(&config, &platform(), &toolchains, None)
            .unwrap();
        assert_eq!(lock.version, 1);
        assert_eq!(lock.platform.as_deref(), Some("linux-x64"));
        assert!(lock.toolchains["llvm-18.1.8-linux-x64"].verified);
        assert!(lock.metadata["generator"].starts_with("ToolchainKit"));
        assert!(lock.metadata["config_hash"].starts_with("sha256:"));

        manager.save(&lock).unwrap();
        let loaded = manager.load().unwrap().unwrap();
        assert_eq!(loaded, lock);
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let manager = LockFileManager::new(dir.path()).unwrap();
        assert!(manager.load().unwrap().is_none());
    }

    #[test]
    fn test_load_malformed_is_lock_file_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("toolchainkit.lock"), ": not : yaml :").unwrap();
        let manager = LockFileManager::new(dir.path()).unwrap();

        let err = manager.load().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ToolchainKitError>(),
            Some(ToolchainKitError::LockFile { .. })
        ));
    }

    #[test]
    fn test_verify_missing_toolchain_reports_issue() {
        let dir = TempDir::new().unwrap();
        let manager = LockFileManager::new(dir.path()).unwrap();
        let registry = CacheRegistry::new(dir.path().join("registry.json"));

        let mut lock = LockFile::default();
        lock.toolchains.insert(
            "llvm-18.1.8-linux-x64".to_string(),
            LockedComponent {
                url: "https://example.com/llvm.tar.xz".to_string(),
                sha256: "ab".repeat(32),
                size_bytes: 1,
                version: Some("18.1.8".to_string()),
                verified: true,
                verification_date: None,
            },
        );

        let (ok, issues) = manager.verify_with(&lock, &registry, None);
        assert!(!ok);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("not installed"));
    }

    #[test]
    fn test_verify_hash_prefix_normalization() {
        let dir = TempDir::new().unwrap();
        let manager = LockFileManager::new(dir.path()).unwrap();
        let registry = CacheRegistry::new(dir.path().join("registry.json"));

        let install = dir.path().join("install");
        std::fs::create_dir_all(&install).unwrap();
        registry
            .register(
                "llvm-18.1.8-linux-x64",
                CachedToolchain {
                    install_path: install,
                    sha256: "ab".repeat(32),
                    size_bytes: 1,
                    version: "18.1.8".to_string(),
                    url: String::new(),
                    ref_count: 0,
                    first_installed_at: None,
                    last_accessed_at: None,
                },
            )
            .unwrap();

        let mut lock = LockFile::default();
        lock.toolchains.insert(
            "llvm-18.1.8-linux-x64".to_string(),
            LockedComponent {
                url: String::new(),
                sha256: format!("sha256:{}", "ab".repeat(32)),
                size_bytes: 1,
                version: Some("18.1.8".to_string()),
                verified: true,
                verification_date: None,
            },
        );

        let (ok, issues) = manager.verify_with(&lock, &registry, None);
        assert!(ok, "issues: {:?}", issues);
    }

    #[test]
    fn test_verify_build_tool_hash() {
        let dir = TempDir::new().unwrap();
        let manager = LockFileManager::new(dir.path()).unwrap();
        let registry = CacheRegistry::new(dir.path().join("registry.json"));

        let tools = dir.path().join(PROJECT_DIR_NAME).join("tools");
        std::fs::create_dir_all(&tools).unwrap();
        std::fs::write(tools.join("ninja"), b"ninja binary").unwrap();
        let actual_hash = compute_file_hash(&tools.join("ninja")).unwrap();

        let mut lock = LockFile::default();
        lock.build_tools.insert(
            "ninja".to_string(),
            LockedComponent {
                url: String::new(),
                sha256: actual_hash,
                size_bytes: 12,
                version: Some("1.12.1".to_string()),
                verified: true,
                verification_date: None,
            },
        );

        let (ok, _) = manager.verify_with(&lock, &registry, None);
        assert!(ok);

        // Tamper with the tool: hash mismatch must be reported
        std::fs::write(tools.join("ninja"), b"evil binary").unwrap();
        let (ok, issues) = manager.verify_with(&lock, &registry, None);
        assert!(!ok);
        assert!(issues[0].contains("hash mismatch"));
    }

    #[test]
    fn test_diff_surfaces_version_change() {
        let dir = TempDir::new().unwrap();
        let manager = LockFileManager::new(dir.path()).unwrap();

        let mut old = LockFile::default();
        old.toolchains.insert(
            "llvm-18".to_string(),
            LockedComponent {
                url: String::new(),
                sha256: "h1".to_string(),
                size_bytes: 1,
                version: Some("18.0.0".to_string()),
                verified: true,
                verification_date: None,
            },
        );
        let mut new = LockFile::default();
        new.toolchains.insert(
            "llvm-18".to_string(),
            LockedComponent {
                url: String::new(),
                sha256: "h2".to_string(),
                size_bytes: 1,
                version: Some("18.1.0".to_string()),
                verified: true,
                verification_date: None,
            },
        );

        let diff = manager.diff(&old, &new);
        assert!(diff.toolchains.added.is_empty());
        assert!(diff.toolchains.removed.is_empty());
        assert_eq!(
            diff.toolchains.modified,
            vec![ModifiedComponent {
                name: "llvm-18".to_string(),
                old_version: Some("18.0.0".to_string()),
                new_version: Some("18.1.0".to_string()),
                old_hash: "h1".to_string(),
                new_hash: "h2".to_string(),
            }]
        );
    }

    #[test]
    fn test_diff_added_and_removed() {
        let dir = TempDir::new().unwrap();
        let manager = LockFileManager::new(dir.path()).unwrap();

        let old = LockFile::default();
        let mut new = LockFile::default();
        new.build_tools.insert(
            "ninja".to_string(),
            LockedComponent {
                url: String::new(),
                sha256: "h".to_string(),
                size_bytes: 1,
                version: None,
                verified: false,
                verification_date: None,
            },
        );

        let diff = manager.diff(&old, &new);
        assert_eq!(diff.build_tools.added, vec!["ninja".to_string()]);
        let reverse = manager.diff(&new, &old);
        assert_eq!(reverse.build_tools.removed, vec!["ninja".to_string()]);
    }
}

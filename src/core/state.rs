//! Per-project state tracking
//!
//! Persists the active toolchain, configuration hash and build status to
//! `.toolchainkit/state.json` and answers the "does this project need to be
//! reconfigured?" question. Writes are atomic; corrupt or missing files load
//! as defaults with a logged warning rather than failing.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::core::directory::PROJECT_DIR_NAME;
use crate::core::fsutil::atomic_write;
use crate::error::ToolchainKitError;

/// Build caching state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachingState {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub configured: bool,
}

/// Tracked state of a ToolchainKit project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectState {
    /// State file format version
    #[serde(default = "default_version")]
    pub version: u32,
    /// ID of the currently active toolchain
    #[serde(default)]
    pub active_toolchain: Option<String>,
    /// SHA-256 of the active toolchain's source archive
    #[serde(default)]
    pub toolchain_hash: Option<String>,
    /// SHA-256 of toolchainkit.yaml at last configure
    #[serde(default)]
    pub config_hash: Option<String>,
    /// Whether CMake has been configured
    #[serde(default)]
    pub cmake_configured: bool,
    /// ISO-8601 timestamp of the last bootstrap
    #[serde(default)]
    pub last_bootstrap: Option<String>,
    /// ISO-8601 timestamp of the last configure
    #[serde(default)]
    pub last_configure: Option<String>,
    /// Active package manager (conan, vcpkg, cpm)
    #[serde(default)]
    pub package_manager: Option<String>,
    #[serde(default)]
    pub package_manager_configured: bool,
    /// CMake build directory, relative to the project root
    #[serde(default = "default_build_directory")]
    pub build_directory: String,
    #[serde(default)]
    pub caching: CachingState,
    /// Active modules
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,
}

fn default_version() -> u32 {
    1
}

fn default_build_directory() -> String {
    "build".to_string()
}

fn default_modules() -> Vec<String> {
    vec!["core".to_string(), "cmake".to_string()]
}

impl Default for ProjectState {
    fn default() -> Self {
        Self {
            version: 1,
            active_toolchain: None,
            toolchain_hash: None,
            config_hash: None,
            cmake_configured: false,
            last_bootstrap: None,
            last_configure: None,
            package_manager: None,
            package_manager_configured: false,
            build_directory: default_build_directory(),
            caching: CachingState::default(),
            modules: default_modules(),
        }
    }
}

/// Manages project state persistence and mutation
pub struct StateManager {
    project_root: PathBuf,
    state_file: PathBuf,
    state: Option<ProjectState>,
}

impl StateManager {
    /// Create a manager for a project root
    pub fn new(project_root: &Path) -> Result<Self> {
        if !project_root.is_dir() {
            return Err(ToolchainKitError::state(format!(
                "Project root is not a directory: {}",
                project_root.display()
            ))
            .into());
        }
        let project_root = project_root
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", project_root.display()))?;
        let state_file = project_root.join(PROJECT_DIR_NAME).join("state.json");
        Ok(Self {
            project_root,
            state_file,
            state: None,
        })
    }

    /// Path to the state file
    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    /// Load state from disk (memoized per manager instance)
    ///
    /// Missing or corrupt files load as a default state; malformed content
    /// never aborts the caller.
    pub fn load(&mut self) -> &ProjectState {
        if self.state.is_none() {
            self.state = Some(self.load_from_disk());
        }
        self.state.as_ref().expect("state just loaded")
    }

    fn load_from_disk(&self) -> ProjectState {
        let content = match std::fs::read_to_string(&self.state_file) {
            Ok(content) => content,
            Err(_) => {
                log::debug!("State file not found, using defaults: {}", self.state_file.display());
                return ProjectState::default();
            }
        };

        match serde_json::from_str::<ProjectState>(&content) {
            Ok(mut state) => {
                if state.version != 1 {
                    log::warn!(
                        "State version {} not supported, treating as v1",
                        state.version
                    );
                    state.version = 1;
                }
                state
            }
            Err(e) => {
                log::warn!(
                    "Invalid state file {}, resetting to defaults: {}",
                    self.state_file.display(),
                    e
                );
                ProjectState::default()
            }
        }
    }

    /// Save a state to disk atomically, replacing the in-memory copy
    pub fn save(&mut self, state: ProjectState) -> Result<()> {
        let json = serde_json::to_string_pretty(&state).context("Failed to serialize state")?;
        atomic_write(&self.state_file, &json)?;
        log::debug!("Saved state to {}", self.state_file.display());
        self.state = Some(state);
        Ok(())
    }

    /// Record the active toolchain and its archive hash
    pub fn update_toolchain(&mut self, toolchain_id: &str, toolchain_hash: &str) -> Result<()> {
        let mut state = self.load().clone();
        state.active_toolchain = Some(toolchain_id.to_string());
        state.toolchain_hash = Some(toolchain_hash.to_string());
        state.last_configure = Some(now_iso8601());
        self.save(state)?;
        log::info!("Updated active toolchain: {}", toolchain_id);
        Ok(())
    }

    /// Record the configuration hash used for change detection
    pub fn update_config_hash(&mut self, config_hash: &str) -> Result<()> {
        let mut state = self.load().clone();
        state.config_hash = Some(config_hash.to_string());
        self.save(state)
    }

    /// Record the build directory and mark CMake configured
    pub fn update_build_config(&mut self, build_dir: &str, build_type: &str) -> Result<()> {
        let mut state = self.load().clone();
        state.cmake_configured = true;
        state.build_directory = build_dir.to_string();
        state.last_configure = Some(now_iso8601());
        self.save(state)?;
        log::info!(
            "Updated build config (build_dir: {}, type: {})",
            build_dir,
            build_type
        );
        Ok(())
    }

    /// Record a completed bootstrap
    pub fn mark_bootstrap_complete(&mut self) -> Result<()> {
        let mut state = self.load().clone();
        state.last_bootstrap = Some(now_iso8601());
        self.save(state)
    }

    /// Mark CMake as configured with its build directory
    pub fn mark_cmake_configured(&mut self, build_dir: &str) -> Result<()> {
        let mut state = self.load().clone();
        state.cmake_configured = true;
        state.build_directory = build_dir.to_string();
        state.last_configure = Some(now_iso8601());
        self.save(state)
    }

    /// Record which package manager is configured
    pub fn mark_package_manager_configured(&mut self, manager: &str) -> Result<()> {
        let mut state = self.load().clone();
        state.package_manager = Some(manager.to_string());
        state.package_manager_configured = true;
        self.save(state)
    }

    /// Update build caching settings
    pub fn update_caching(&mut self, enabled: bool, tool: Option<&str>) -> Result<()> {
        let mut state = self.load().clone();
        state.caching.enabled = enabled;
        state.caching.tool = tool.map(String::from);
        state.caching.configured = true;
        self.save(state)
    }

    /// Reset all state to defaults
    pub fn clear(&mut self) -> Result<()> {
        self.save(ProjectState::default())
    }

    /// Check whether reconfiguration is needed
    ///
    /// Returns true if there is no previous configuration, the configuration
    /// hash changed, CMake is not configured, or the recorded build
    /// directory no longer exists.
    pub fn needs_reconfigure(&mut self, current_config_hash: &str) -> bool {
        let project_root = self.project_root.clone();
        let state = self.load();

        let Some(previous) = state.config_hash.as_deref() else {
            log::debug!("Reconfigure needed: no previous configuration");
            return true;
        };

        if previous != current_config_hash {
            log::debug!("Reconfigure needed: configuration changed");
            return true;
        }

        if !state.cmake_configured {
            log::debug!("Reconfigure needed: CMake not configured");
            return true;
        }

        let build_dir = project_root.join(&state.build_directory);
        if !build_dir.exists() {
            log::debug!(
                "Reconfigure needed: build directory missing ({})",
                build_dir.display()
            );
            return true;
        }

        false
    }

    /// Non-fatal consistency checks on the current state
    ///
    /// Returns human-readable issues; an empty list means the state is
    /// consistent with the filesystem and cache registry.
    pub fn validate(&mut self) -> Vec<String> {
        let project_root = self.project_root.clone();
        let state = self.load().clone();
        let mut issues = Vec::new();

        if let Some(toolchain_id) = &state.active_toolchain {
            match crate::core::cache_registry::open_global_registry() {
                Ok(registry) => match registry.get_toolchain_info(toolchain_id) {
                    Some(info) => {
                        if !info.install_path.exists() {
                            issues.push(format!(
                                "Active toolchain path does not exist: {}",
                                info.install_path.display()
                            ));
                        }
                    }
                    None => issues.push(format!(
                        "Active toolchain not found in registry: {}",
                        toolchain_id
                    )),
                },
                Err(e) => log::warn!("Error validating toolchain: {}", e),
            }
        }

        if state.cmake_configured {
            let build_dir = project_root.join(&state.build_directory);
            if !build_dir.exists() {
                issues.push(format!(
                    "Build directory not found: {}. CMake was marked configured but the \
                     directory is missing; run configuration again to recreate it.",
                    build_dir.display()
                ));
            }
        }

        issues
    }
}

/// Current local time as an ISO-8601 string
pub fn now_iso8601() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let mut manager = StateManager::new(dir.path()).unwrap();
        let state = manager.load();
        assert_eq!(state.version, 1);
        assert!(state.active_toolchain.is_none());
        assert_eq!(state.build_directory, "build");
        assert_eq!(state.modules, vec!["core", "cmake"]);
    }

    #[test]
    fn test_load_corrupt_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let state_dir = dir.path().join(PROJECT_DIR_NAME);
        std::fs::create_dir_all(&state_dir).unwrap();
        std::fs::write(state_dir.join("state.json"), "{not json").unwrap();

        let mut manager = StateManager::new(dir.path()).unwrap();
        assert_eq!(*manager.load(), ProjectState::default());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut manager = StateManager::new(dir.path()).unwrap();
        manager
            .update_toolchain("llvm-18.1.8-linux-x64", "sha256:abc123")
            .unwrap();
        manager.update_caching(true, Some("sccache")).unwrap();

        let mut fresh = StateManager::new(dir.path()).unwrap();
        let state = fresh.load();
        assert_eq!(
            state.active_toolchain.as_deref(),
            Some("llvm-18.1.8-linux-x64")
        );
        assert_eq!(state.toolchain_hash.as_deref(), Some("sha256:abc123"));
        assert!(state.caching.enabled);
        assert_eq!(state.caching.tool.as_deref(), Some("sccache"));
        assert!(state.caching.configured);
        assert!(state.last_configure.is_some());
    }

    #[test]
    fn test_unknown_version_treated_as_v1() {
        let dir = TempDir::new().unwrap();
        let state_dir = dir.path().join(PROJECT_DIR_NAME);
        std::fs::create_dir_all(&state_dir).unwrap();
        std::fs::write(
            state_dir.join("state.json"),
            "{\"version\": 7, \"build_directory\": \"out\"}",
        )
        .unwrap();

        let mut manager = StateManager::new(dir.path()).unwrap();
        let state = manager.load();
        assert_eq!(state.version, 1);
        assert_eq!(state.build_directory, "out");
    }

    #[test]
    fn test_needs_reconfigure_transitions() {
        let dir = TempDir::new().unwrap();
        let mut manager = StateManager::new(dir.path()).unwrap();

        // Fresh project: always reconfigure
        assert!(manager.needs_reconfigure("sha256:A"));

        manager.update_config_hash("sha256:A").unwrap();
        manager.mark_cmake_configured("build").unwrap();
        std::fs::create_dir_all(dir.path().join("build")).unwrap();

        assert!(!manager.needs_reconfigure("sha256:A"));
        assert!(manager.needs_reconfigure("sha256:B"));

        std::fs::remove_dir_all(dir.path().join("build")).unwrap();
        assert!(manager.needs_reconfigure("sha256:A"));
    }

    #[test]
    fn test_validate_reports_missing_build_dir() {
        let dir = TempDir::new().unwrap();
        let mut manager = StateManager::new(dir.path()).unwrap();
        manager.mark_cmake_configured("build").unwrap();

        let issues = manager.validate();
        assert!(issues.iter().any(|i| i.contains("Build directory")));
    }

    #[test]
    fn test_clear_resets_state() {
        let dir = TempDir::new().unwrap();
        let mut manager = StateManager::new(dir.path()).unwrap();
        manager.update_toolchain("gcc-13.2.0-linux-x64", "h").unwrap();
        manager.clear().unwrap();
        assert!(manager.load().active_toolchain.is_none());
    }
}

//! toolchainkit.yaml configuration model and parser
//!
//! Structural validation (types, enums, references) happens at parse time so
//! the rest of the tool only ever sees a coherent configuration. Semantic
//! advice (platform fit, tool availability) lives in `validation`.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::{hints, ToolchainKitError};

/// Valid toolchain types
pub const VALID_TOOLCHAIN_TYPES: &[&str] = &["clang", "gcc", "msvc", "zig"];

/// Valid build backends
pub const VALID_BACKENDS: &[&str] = &["ninja", "make", "msbuild", "xcode"];

/// Valid package managers
pub const VALID_PACKAGE_MANAGERS: &[&str] = &["conan", "vcpkg", "cpm"];

/// Valid keys under build.flags
pub const VALID_FLAG_KEYS: &[&str] = &["cxx", "c", "linker", "exe_linker", "shared_linker"];

/// Configuration for a single toolchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    pub name: String,
    /// 'clang', 'gcc', 'msvc' or 'zig'
    pub r#type: String,
    pub version: String,
    /// 'libc++', 'libstdc++' or 'msvc'
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdlib: Option<String>,
    /// 'prebuilt' or 'build-from-source'
    #[serde(default = "default_source")]
    pub source: String,
    /// Use a system installation only, never download
    #[serde(default)]
    pub require_installed: bool,
    /// Custom paths for individual components (compiler, linker, cmake, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_paths: Option<HashMap<String, String>>,
}

fn default_source() -> String {
    "prebuilt".to_string()
}

/// Toolchain cache placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolchainCacheConfig {
    /// 'shared', 'local' or 'custom'
    #[serde(default = "default_cache_location")]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_cache_location() -> String {
    "shared".to_string()
}

impl Default for ToolchainCacheConfig {
    fn default() -> Self {
        Self {
            location: default_cache_location(),
            path: None,
        }
    }
}

/// Build caching configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// 'sccache' or 'ccache'
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<serde_yaml::Value>,
}

/// Build system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// 'ninja', 'make', 'msbuild' or 'xcode'
    #[serde(default = "default_backend")]
    pub backend: String,
    /// 'auto' or a job count
    #[serde(default = "default_parallel")]
    pub parallel: serde_yaml::Value,
    #[serde(default)]
    pub caching: CachingConfig,
    /// Extra flags keyed by cxx/c/linker/exe_linker/shared_linker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<HashMap<String, Vec<String>>>,
}

fn default_backend() -> String {
    "ninja".to_string()
}

fn default_parallel() -> serde_yaml::Value {
    serde_yaml::Value::String("auto".to_string())
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            parallel: default_parallel(),
            caching: CachingConfig::default(),
            flags: None,
        }
    }
}

/// Package manager configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackagesConfig {
    /// 'conan', 'vcpkg' or 'cpm'
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conan: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcpkg: Option<serde_yaml::Value>,
    /// Use a system-installed package manager
    #[serde(default)]
    pub use_system: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conan_home: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcpkg_root: Option<String>,
}

/// Cross-compilation target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub os: String,
    pub arch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<String>,
    /// Android API level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_level: Option<u32>,
    /// iOS SDK (iphoneos, iphonesimulator)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk: Option<String>,
}

/// Complete ToolchainKit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolchainKitConfig {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default)]
    pub toolchains: Vec<ToolchainConfig>,
    /// Default toolchain name per platform/os
    #[serde(default)]
    pub defaults: HashMap<String, String>,
    #[serde(default)]
    pub toolchain_cache: ToolchainCacheConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<PackagesConfig>,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,
    /// Preferred CMake generator (overrides the strategy preference)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,

    // Legacy aliases for toolchain_cache, accepted on input only
    #[serde(default, skip_serializing)]
    toolchain_dir: Option<String>,
    #[serde(default, skip_serializing)]
    cache_dir: Option<String>,
}

fn default_modules() -> Vec<String> {
    vec!["core".to_string(), "cmake".to_string()]
}

impl ToolchainKitConfig {
    /// Find a declared toolchain by name
    pub fn find_toolchain(&self, name: &str) -> Option<&ToolchainConfig> {
        self.toolchains.iter().find(|tc| tc.name == name)
    }

    /// Resolve the default toolchain for a platform string or OS
    ///
    /// `defaults` keys may be full platform strings ('linux-x64') or bare OS
    /// names ('linux'); the more specific key wins.
    pub fn default_toolchain_for(&self, platform_string: &str) -> Option<&ToolchainConfig> {
        let os = platform_string.split('-').next().unwrap_or(platform_string);
        let name = self
            .defaults
            .get(platform_string)
            .or_else(|| self.defaults.get(os))?;
        self.find_toolchain(name)
    }
}

/// Parse and structurally validate toolchainkit.yaml
pub fn parse_config(config_path: &Path) -> Result<ToolchainKitConfig> {
    if !config_path.exists() {
        return Err(ToolchainKitError::config_with_hint(
            format!("Configuration file not found: {}", config_path.display()),
            None,
            hints::config_not_found(),
        )
        .into());
    }

    let content = std::fs::read_to_string(config_path).map_err(|e| {
        ToolchainKitError::config_with_hint(
            format!("Failed to read {}: {}", config_path.display(), e),
            Some(e.into()),
            hints::config_not_found(),
        )
    })?;

    if content.trim().is_empty() {
        return Err(ToolchainKitError::config_with_hint(
            "Configuration file is empty",
            None,
            hints::invalid_config(),
        )
        .into());
    }

    let mut config: ToolchainKitConfig = serde_yaml::from_str(&content).map_err(|e| {
        ToolchainKitError::config_with_hint(
            format!("Invalid YAML syntax: {}", e),
            Some(e.into()),
            hints::invalid_config(),
        )
    })?;

    apply_legacy_cache_fields(&mut config);
    validate_structure(&config)?;
    Ok(config)
}

/// Map legacy toolchain_dir/cache_dir fields onto toolchain_cache
fn apply_legacy_cache_fields(config: &mut ToolchainKitConfig) {
    let legacy = config.toolchain_dir.take().or_else(|| config.cache_dir.take());
    if let Some(path) = legacy {
        if config.toolchain_cache == ToolchainCacheConfig::default() {
            let location = if path.starts_with('.') { "local" } else { "custom" };
            config.toolchain_cache = ToolchainCacheConfig {
                location: location.to_string(),
                path: Some(path),
            };
        }
    }
}

fn validate_structure(config: &ToolchainKitConfig) -> Result<()> {
    if config.version != 1 {
        return Err(config_error(format!(
            "Unsupported version: {} (expected 1)",
            config.version
        )));
    }

    if config.toolchains.is_empty() {
        return Err(config_error("At least one toolchain must be defined"));
    }

    let mut names = HashSet::new();
    for tc in &config.toolchains {
        if !names.insert(tc.name.as_str()) {
            return Err(config_error(format!("Duplicate toolchain name: {}", tc.name)));
        }
        if !VALID_TOOLCHAIN_TYPES.contains(&tc.r#type.as_str()) {
            return Err(config_error(format!(
                "Invalid toolchain type: {} (expected one of {})",
                tc.r#type,
                VALID_TOOLCHAIN_TYPES.join(", ")
            )));
        }
    }

    for (platform, toolchain_name) in &config.defaults {
        if !names.contains(toolchain_name.as_str()) {
            return Err(config_error(format!(
                "defaults.{} references undefined toolchain: {}",
                platform, toolchain_name
            )));
        }
    }

    for target in &config.targets {
        if let Some(toolchain) = &target.toolchain {
            if !names.contains(toolchain.as_str()) {
                return Err(config_error(format!(
                    "targets.{}-{} references undefined toolchain: {}",
                    target.os, target.arch, toolchain
                )));
            }
        }
    }

    if !VALID_BACKENDS.contains(&config.build.backend.as_str()) {
        return Err(config_error(format!(
            "Invalid build backend: {} (expected one of {})",
            config.build.backend,
            VALID_BACKENDS.join(", ")
        )));
    }

    if let Some(flags) = &config.build.flags {
        for key in flags.keys() {
            if !VALID_FLAG_KEYS.contains(&key.as_str()) {
                return Err(config_error(format!(
                    "Invalid build.flags key: {} (expected one of {})",
                    key,
                    VALID_FLAG_KEYS.join(", ")
                )));
            }
        }
    }

    if let Some(packages) = &config.packages {
        if let Some(manager) = &packages.manager {
            if !VALID_PACKAGE_MANAGERS.contains(&manager.as_str()) {
                return Err(config_error(format!(
                    "Invalid package manager: {} (expected one of {})",
                    manager,
                    VALID_PACKAGE_MANAGERS.join(", ")
                )));
            }
        }
    }

    let valid_cache_locations = ["shared", "local", "custom"];
    if !valid_cache_locations.contains(&config.toolchain_cache.location.as_str()) {
        return Err(config_error(format!(
            "Invalid toolchain_cache.location: {} (expected one of {})",
            config.toolchain_cache.location,
            valid_cache_locations.join(", ")
        )));
    }

    Ok(())
}

fn config_error(message: impl Into<String>) -> anyhow::Error {
    ToolchainKitError::config_with_hint(message, None, hints::invalid_config()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = "\
version: 1
toolchains:
  - name: llvm-18
    type: clang
    version: 18.1.8
";

    fn write_config(content: &str) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toolchainkit.yaml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_parse_minimal() {
        let (_dir, path) = write_config(MINIMAL);
        let config = parse_config(&path).unwrap();
        assert_eq!(config.version, 1);
        assert_eq!(config.toolchains.len(), 1);
        assert_eq!(config.toolchains[0].r#type, "clang");
        assert_eq!(config.toolchains[0].source, "prebuilt");
        assert_eq!(config.build.backend, "ninja");
        assert_eq!(config.toolchain_cache.location, "shared");
        assert_eq!(config.modules, vec!["core", "cmake"]);
    }

    #[test]
    fn test_parse_full_config() {
        let (_dir, path) = write_config(
            "\
version: 1
project: demo
toolchains:
  - name: llvm-18
    type: clang
    version: 18.1.8
    stdlib: libc++
  - name: gcc-13
    type: gcc
    version: 13.2.0
defaults:
  linux: gcc-13
  windows: llvm-18
packages:
  manager: conan
  use_system: true
build:
  backend: ninja
  parallel: 8
  caching:
    enabled: true
    tool: sccache
  flags:
    cxx: [\"-Wall\", \"-Wextra\"]
    linker: [\"-fuse-ld=lld\"]
targets:
  - os: android
    arch: arm64
    toolchain: llvm-18
    api_level: 29
",
        );
        let config = parse_config(&path).unwrap();
        assert_eq!(config.toolchains.len(), 2);
        assert_eq!(config.defaults["linux"], "gcc-13");
        assert_eq!(
            config.packages.as_ref().unwrap().manager.as_deref(),
            Some("conan")
        );
        assert!(config.build.caching.enabled);
        assert_eq!(config.build.flags.as_ref().unwrap()["cxx"].len(), 2);
        assert_eq!(config.targets[0].api_level, Some(29));
        assert_eq!(
            config.default_toolchain_for("linux-x64").unwrap().name,
            "gcc-13"
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(parse_config(&dir.path().join("absent.yaml")).is_err());
    }

    #[test]
    fn test_empty_file() {
        let (_dir, path) = write_config("");
        assert!(parse_config(&path).is_err());
    }

    #[test]
    fn test_unsupported_version() {
        let (_dir, path) = write_config("version: 2\ntoolchains:\n  - name: a\n    type: clang\n    version: 1.0\n");
        let err = parse_config(&path).unwrap_err().to_string();
        assert!(err.contains("Unsupported version"));
    }

    #[test]
    fn test_duplicate_toolchain_names() {
        let (_dir, path) = write_config(
            "\
version: 1
toolchains:
  - name: dup
    type: clang
    version: 18.1.8
  - name: dup
    type: gcc
    version: 13.2.0
",
        );
        let err = parse_config(&path).unwrap_err().to_string();
        assert!(err.contains("Duplicate toolchain name"));
    }

    #[test]
    fn test_defaults_must_reference_declared_toolchain() {
        let (_dir, path) = write_config(
            "\
version: 1
toolchains:
  - name: llvm-18
    type: clang
    version: 18.1.8
defaults:
  linux: missing
",
        );
        let err = parse_config(&path).unwrap_err().to_string();
        assert!(err.contains("undefined toolchain"));
    }

    #[test]
    fn test_invalid_flag_key() {
        let (_dir, path) = write_config(
            "\
version: 1
toolchains:
  - name: llvm-18
    type: clang
    version: 18.1.8
build:
  flags:
    cflags: [\"-O2\"]
",
        );
        let err = parse_config(&path).unwrap_err().to_string();
        assert!(err.contains("build.flags"));
    }

    #[test]
    fn test_invalid_backend_and_manager() {
        let (_dir, path) = write_config(
            "\
version: 1
toolchains:
  - name: llvm-18
    type: clang
    version: 18.1.8
build:
  backend: bazel
",
        );
        assert!(parse_config(&path).is_err());

        let (_dir, path) = write_config(
            "\
version: 1
toolchains:
  - name: llvm-18
    type: clang
    version: 18.1.8
packages:
  manager: pip
",
        );
        assert!(parse_config(&path).is_err());
    }

    #[test]
    fn test_legacy_toolchain_dir() {
        let (_dir, path) = write_config(
            "\
version: 1
toolchain_dir: ./toolchains
toolchains:
  - name: llvm-18
    type: clang
    version: 18.1.8
",
        );
        let config = parse_config(&path).unwrap();
        assert_eq!(config.toolchain_cache.location, "local");
        assert_eq!(config.toolchain_cache.path.as_deref(), Some("./toolchains"));

        let (_dir, path) = write_config(
            "\
version: 1
cache_dir: /opt/tk-cache
toolchains:
  - name: llvm-18
    type: clang
    version: 18.1.8
",
        );
        let config = parse_config(&path).unwrap();
        assert_eq!(config.toolchain_cache.location, "custom");
    }
}

//! Toolchain provisioning pipeline
//!
//! A `ToolchainProvider` knows how to resolve a `(type, version, platform)`
//! request into a downloadable release. The `ToolchainInstaller` drives the
//! shared pipeline: look up the global cache, serialize on a per-toolchain
//! advisory lock, download, verify, extract into a temp tree, atomically
//! rename into place and register the result.
//!
//! Request lifecycle:
//!
//! ```text
//! Idle -> LockHeld -> MetadataResolved -> Downloading -> Verifying
//!      -> Extracting -> Registering -> Done
//! ```
//!
//! Every failure path releases the lock and removes partial artefacts; the
//! cache is never left half-populated.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::cache_registry::{CachedToolchain, CacheRegistry};
use crate::core::fsutil::{compute_file_hash, hashes_equal, ScopedFileLock};
use crate::error::ToolchainKitError;
use crate::toolchain::archive::extract_archive;
use crate::toolchain::download::download_with_resume;

/// Phase of a provisioning operation, reported through progress frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Downloading,
    Extracting,
    Complete,
}

/// A progress frame emitted during download and extraction
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub phase: ProgressPhase,
    /// Bytes transferred or consumed so far
    pub bytes: u64,
    /// Total bytes when known
    pub total: Option<u64>,
    /// Completion percentage in [0, 100]
    pub percentage: f64,
    /// Transfer speed in bytes per second (downloads only)
    pub speed_bps: f64,
    /// Estimated seconds remaining, when computable
    pub eta_seconds: Option<u64>,
}

impl ProgressInfo {
    pub fn complete() -> Self {
        Self {
            phase: ProgressPhase::Complete,
            bytes: 0,
            total: None,
            percentage: 100.0,
            speed_bps: 0.0,
            eta_seconds: None,
        }
    }
}

/// Callback invoked with progress frames; must not block
pub type ProgressCallback<'a> = &'a dyn Fn(&ProgressInfo);

/// A concrete downloadable toolchain release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainRelease {
    pub url: String,
    pub sha256: String,
    pub size_bytes: u64,
    /// Resolved version ('latest' is never stored here)
    pub version: String,
}

/// A plugin that can materialize toolchains of some type
pub trait ToolchainProvider: Send + Sync {
    /// Provider name for diagnostics
    fn name(&self) -> &'static str;

    /// Whether this provider can supply the requested type and version
    fn can_provide(&self, toolchain_type: &str, version: &str) -> bool;

    /// Resolve 'latest' (or pass through a concrete version) without I/O
    fn resolve_version(&self, toolchain_type: &str, version: &str) -> Result<String>;

    /// Resolve the release metadata (URL, hash, size) for a request
    fn resolve_release(
        &self,
        toolchain_type: &str,
        version: &str,
        platform: &str,
    ) -> Result<ToolchainRelease>;

    /// Deterministic toolchain id for a resolved version
    fn toolchain_id(&self, toolchain_type: &str, version: &str, platform: &str) -> String {
        format!("{}-{}-{}", toolchain_type, version, platform)
    }
}

/// Drives the shared install pipeline against the global cache
pub struct ToolchainInstaller {
    cache_root: PathBuf,
    registry: CacheRegistry,
}

impl ToolchainInstaller {
    /// Create an installer over a cache root (usually `~/.toolchainkit`)
    pub fn new(cache_root: PathBuf) -> Self {
        let registry = CacheRegistry::new(cache_root.join("registry.json"));
        Self {
            cache_root,
            registry,
        }
    }

    /// The registry this installer records installations in
    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    /// Provision a toolchain, returning the path of the ready installation
    ///
    /// Blocking; at most one materialization per toolchain id runs at a time
    /// across processes. A second caller queues on the per-id lock and then
    /// finds the installation already registered.
    pub fn provide(
        &self,
        provider: &dyn ToolchainProvider,
        toolchain_type: &str,
        version: &str,
        platform: &str,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<PathBuf> {
        let resolved_version = provider.resolve_version(toolchain_type, version)?;
        let toolchain_id = provider.toolchain_id(toolchain_type, &resolved_version, platform);

        // Fast path: already installed
        if let Some(path) = self.lookup_installed(&toolchain_id)? {
            emit(progress, &ProgressInfo::complete());
            return Ok(path);
        }

        let lock_path = self
            .cache_root
            .join("lock")
            .join(format!("{}.lock", toolchain_id));
        let _lock = ScopedFileLock::acquire(&lock_path)?;

        // Double-checked: another process may have won the race
        if let Some(path) = self.lookup_installed(&toolchain_id)? {
            emit(progress, &ProgressInfo::complete());
            return Ok(path);
        }

        let release = provider.resolve_release(toolchain_type, &resolved_version, platform)?;
        log::info!(
            "Provisioning {} from {} ({} bytes)",
            toolchain_id,
            release.url,
            release.size_bytes
        );

        let toolchains_dir = self.cache_root.join("toolchains");
        std::fs::create_dir_all(&toolchains_dir).with_context(|| {
            format!("Failed to create toolchains dir: {}", toolchains_dir.display())
        })?;

        let archive_path = toolchains_dir.join(format!(
            "{}{}",
            toolchain_id,
            archive_extension(&release.url)
        ));
        let tmp_dir = toolchains_dir.join(format!("{}.tmp", toolchain_id));
        let final_dir = toolchains_dir.join(&toolchain_id);

        let result = self.materialize(
            &toolchain_id,
            &release,
            &archive_path,
            &tmp_dir,
            &final_dir,
            progress,
        );

        if result.is_err() {
            // Leave nothing partial behind before the lock is released
            cleanup_path(&tmp_dir);
            cleanup_path(&archive_path);
            let mut part = archive_path.clone().into_os_string();
            part.push(".part");
            cleanup_path(Path::new(&part));
        }

        result?;
        emit(progress, &ProgressInfo::complete());
        Ok(final_dir)
    }

    fn lookup_installed(&self, toolchain_id: &str) -> Result<Option<PathBuf>> {
        if let Some(info) = self.registry.get_toolchain_info(toolchain_id) {
            if info.install_path.is_dir() {
                self.registry.touch(toolchain_id)?;
                log::debug!("Cache hit for {}", toolchain_id);
                return Ok(Some(info.install_path));
            }
        }
        Ok(None)
    }

    fn materialize(
        &self,
        toolchain_id: &str,
        release: &ToolchainRelease,
        archive_path: &Path,
        tmp_dir: &Path,
        final_dir: &Path,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<()> {
        // Downloading
        download_with_resume(
            &release.url,
            archive_path,
            Some(release.size_bytes),
            progress,
        )?;

        // Verifying
        let actual = compute_file_hash(archive_path)?;
        if !hashes_equal(&actual, &release.sha256) {
            return Err(ToolchainKitError::ChecksumMismatch {
                artifact: toolchain_id.to_string(),
                expected: release.sha256.clone(),
                actual,
            }
            .into());
        }

        // Extracting into a temp tree, then atomic rename into place
        if tmp_dir.exists() {
            std::fs::remove_dir_all(tmp_dir)
                .with_context(|| format!("Failed to clear stale tmp dir: {}", tmp_dir.display()))?;
        }
        extract_archive(archive_path, tmp_dir, progress)?;

        std::fs::rename(tmp_dir, final_dir).with_context(|| {
            format!(
                "Failed to move {} into place at {}",
                tmp_dir.display(),
                final_dir.display()
            )
        })?;

        // Registering
        self.registry.register(
            toolchain_id,
            CachedToolchain {
                install_path: final_dir.to_path_buf(),
                sha256: release.sha256.clone(),
                size_bytes: release.size_bytes,
                version: release.version.clone(),
                url: release.url.clone(),
                ref_count: 0,
                first_installed_at: None,
                last_accessed_at: None,
            },
        )?;

        Ok(())
    }
}

/// Compare two dotted version strings numerically, segment by segment
pub fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|s| {
                s.chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    };
    let (va, vb) = (parse(a), parse(b));
    let len = va.len().max(vb.len());
    for i in 0..len {
        let (sa, sb) = (va.get(i).unwrap_or(&0), vb.get(i).unwrap_or(&0));
        match sa.cmp(sb) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    std::cmp::Ordering::Equal
}

fn archive_extension(url: &str) -> &'static str {
    if url.ends_with(".tar.xz") {
        ".tar.xz"
    } else if url.ends_with(".tar.gz") || url.ends_with(".tgz") {
        ".tar.gz"
    } else if url.ends_with(".zip") {
        ".zip"
    } else {
        ".archive"
    }
}

fn emit(progress: Option<ProgressCallback<'_>>, info: &ProgressInfo) {
    if let Some(cb) = progress {
        cb(info);
    }
}

fn cleanup_path(path: &Path) {
    if path.is_dir() {
        if let Err(e) = std::fs::remove_dir_all(path) {
            log::warn!("Failed to remove {}: {}", path.display(), e);
        }
    } else if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            log::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    struct FixedProvider;

    impl ToolchainProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn can_provide(&self, toolchain_type: &str, _version: &str) -> bool {
            toolchain_type == "fixed"
        }

        fn resolve_version(&self, _toolchain_type: &str, version: &str) -> Result<String> {
            Ok(if version == "latest" {
                "2.0.0".to_string()
            } else {
                version.to_string()
            })
        }

        fn resolve_release(
            &self,
            _toolchain_type: &str,
            version: &str,
            _platform: &str,
        ) -> Result<ToolchainRelease> {
            Ok(ToolchainRelease {
                url: format!("https://example.com/fixed-{}.tar.gz", version),
                sha256: "00".repeat(32),
                size_bytes: 1,
                version: version.to_string(),
            })
        }
    }

    #[test]
    fn test_toolchain_id_is_deterministic() {
        let provider = FixedProvider;
        assert_eq!(
            provider.toolchain_id("fixed", "2.0.0", "linux-x64"),
            "fixed-2.0.0-linux-x64"
        );
        assert_eq!(
            provider.toolchain_id("fixed", "2.0.0", "linux-x64"),
            provider.toolchain_id("fixed", "2.0.0", "linux-x64")
        );
    }

    #[test]
    fn test_latest_resolution() {
        let provider = FixedProvider;
        assert_eq!(provider.resolve_version("fixed", "latest").unwrap(), "2.0.0");
        assert_eq!(provider.resolve_version("fixed", "1.2.3").unwrap(), "1.2.3");
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("18.1.8", "18.1.8"), Ordering::Equal);
        assert_eq!(compare_versions("18.1.8", "17.0.6"), Ordering::Greater);
        assert_eq!(compare_versions("2.0", "2.0.1"), Ordering::Less);
        assert_eq!(compare_versions("10.0.0", "9.9.9"), Ordering::Greater);
    }

    #[test]
    fn test_archive_extension_dispatch() {
        assert_eq!(archive_extension("https://a/b.tar.xz"), ".tar.xz");
        assert_eq!(archive_extension("https://a/b.tar.gz"), ".tar.gz");
        assert_eq!(archive_extension("https://a/b.tgz"), ".tar.gz");
        assert_eq!(archive_extension("https://a/b.zip"), ".zip");
    }

    #[test]
    fn test_cache_hit_skips_download() {
        use crate::core::cache_registry::CachedToolchain;
        use tempfile::TempDir;

        let cache = TempDir::new().unwrap();
        let install_dir = cache.path().join("toolchains").join("fixed-2.0.0-linux-x64");
        std::fs::create_dir_all(&install_dir).unwrap();

        let installer = ToolchainInstaller::new(cache.path().to_path_buf());
        installer
            .registry()
            .register(
                "fixed-2.0.0-linux-x64",
                CachedToolchain {
                    install_path: install_dir.clone(),
                    sha256: "00".repeat(32),
                    size_bytes: 1,
                    version: "2.0.0".to_string(),
                    url: String::new(),
                    ref_count: 0,
                    first_installed_at: None,
                    last_accessed_at: None,
                },
            )
            .unwrap();

        // 'latest' resolves to 2.0.0 which is already installed, so no
        // network access happens and the registered path comes back
        let path = installer
            .provide(&FixedProvider, "fixed", "latest", "linux-x64", None)
            .unwrap();
        assert_eq!(path, install_dir);
    }
}

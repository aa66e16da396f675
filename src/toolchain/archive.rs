//! Archive extraction with progress reporting
//!
//! Handles the archive formats toolchain vendors actually ship: `.tar.gz`,
//! `.tar.xz` and `.zip`. Extraction progress is derived from compressed
//! bytes consumed, which is cheap and monotonic. Entries that would escape
//! the destination directory are rejected.

use std::fs::File;
use std::io::Read;
use std::path::{Component, Path};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use xz2::read::XzDecoder;

use crate::error::ToolchainKitError;
use crate::toolchain::provider::{ProgressCallback, ProgressInfo, ProgressPhase};

/// Extract `archive` into `dest_dir`, creating it if needed
///
/// On any error the partially extracted tree is removed before returning.
pub fn extract_archive(
    archive: &Path,
    dest_dir: &Path,
    progress: Option<ProgressCallback<'_>>,
) -> Result<()> {
    let result = extract_inner(archive, dest_dir, progress);
    if result.is_err() && dest_dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(dest_dir) {
            log::warn!(
                "Failed to clean up partial extraction {}: {}",
                dest_dir.display(),
                e
            );
        }
    }
    result.map_err(|e| {
        ToolchainKitError::ExtractFailed {
            archive: archive.to_path_buf(),
            message: "archive extraction failed".to_string(),
            source: Some(e),
        }
        .into()
    })
}

fn extract_inner(
    archive: &Path,
    dest_dir: &Path,
    progress: Option<ProgressCallback<'_>>,
) -> Result<()> {
    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create {}", dest_dir.display()))?;

    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        let reader = counting_reader(archive, progress)?;
        unpack_tar(tar::Archive::new(GzDecoder::new(reader)), dest_dir)
    } else if name.ends_with(".tar.xz") {
        let reader = counting_reader(archive, progress)?;
        unpack_tar(tar::Archive::new(XzDecoder::new(reader)), dest_dir)
    } else if name.ends_with(".zip") {
        unpack_zip(archive, dest_dir, progress)
    } else {
        anyhow::bail!("Unsupported archive format: {}", archive.display())
    }
}

fn unpack_tar<R: Read>(mut tar: tar::Archive<R>, dest_dir: &Path) -> Result<()> {
    tar.set_preserve_permissions(true);
    for entry in tar.entries().context("Failed to read tar entries")? {
        let mut entry = entry.context("Failed to read tar entry")?;
        let path = entry.path().context("Tar entry has invalid path")?.into_owned();
        ensure_relative(&path)?;
        entry
            .unpack_in(dest_dir)
            .with_context(|| format!("Failed to unpack {}", path.display()))?;
    }
    Ok(())
}

fn unpack_zip(
    archive: &Path,
    dest_dir: &Path,
    progress: Option<ProgressCallback<'_>>,
) -> Result<()> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file).context("Failed to read zip archive")?;

    let count = zip.len();
    let mut last_emit = Instant::now();

    for index in 0..count {
        let mut entry = zip.by_index(index).context("Failed to read zip entry")?;
        let Some(relative) = entry.enclosed_name() else {
            anyhow::bail!("Zip entry escapes destination: {}", entry.name());
        };
        let out_path = dest_dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)
                .with_context(|| format!("Failed to create {}", out_path.display()))?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let mut out = File::create(&out_path)
                .with_context(|| format!("Failed to create {}", out_path.display()))?;
            std::io::copy(&mut entry, &mut out)
                .with_context(|| format!("Failed to write {}", out_path.display()))?;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode));
            }
        }

        if let Some(cb) = progress {
            if last_emit.elapsed() >= Duration::from_secs(1) || index + 1 == count {
                cb(&ProgressInfo {
                    phase: ProgressPhase::Extracting,
                    bytes: (index + 1) as u64,
                    total: Some(count as u64),
                    percentage: (index + 1) as f64 / count.max(1) as f64 * 100.0,
                    speed_bps: 0.0,
                    eta_seconds: None,
                });
                last_emit = Instant::now();
            }
        }
    }

    Ok(())
}

fn ensure_relative(path: &Path) -> Result<()> {
    for component in path.components() {
        match component {
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                anyhow::bail!("Archive entry escapes destination: {}", path.display())
            }
            _ => {}
        }
    }
    Ok(())
}

fn counting_reader<'a>(
    archive: &Path,
    progress: Option<ProgressCallback<'a>>,
) -> Result<CountingReader<'a, File>> {
    let total = std::fs::metadata(archive)
        .with_context(|| format!("Failed to stat {}", archive.display()))?
        .len();
    let file = File::open(archive)
        .with_context(|| format!("Failed to open {}", archive.display()))?;
    Ok(CountingReader {
        inner: file,
        consumed: 0,
        total,
        progress,
        last_emit: Instant::now(),
    })
}

/// Tracks compressed bytes consumed and reports them as extraction progress
struct CountingReader<'a, R> {
    inner: R,
    consumed: u64,
    total: u64,
    progress: Option<ProgressCallback<'a>>,
    last_emit: Instant,
}

impl<R: Read> Read for CountingReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.consumed += read as u64;

        if let Some(cb) = self.progress {
            let done = read == 0 || self.consumed >= self.total;
            if self.last_emit.elapsed() >= Duration::from_secs(1) || done {
                let percentage = if self.total > 0 {
                    (self.consumed as f64 / self.total as f64 * 100.0).min(100.0)
                } else {
                    0.0
                };
                cb(&ProgressInfo {
                    phase: ProgressPhase::Extracting,
                    bytes: self.consumed,
                    total: Some(self.total),
                    percentage,
                    speed_bps: 0.0,
                    eta_seconds: None,
                });
                self.last_emit = Instant::now();
            }
        }

        Ok(read)
    }
}

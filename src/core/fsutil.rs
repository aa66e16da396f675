//! Filesystem primitives shared across ToolchainKit
//!
//! Atomic writes, streaming SHA-256 hashing, hash-prefix normalization and
//! scoped advisory file locks. Everything that persists state goes through
//! `atomic_write` so readers only ever observe complete files.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

/// Write `content` to `path` atomically (write-to-temp, fsync, rename)
pub fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("No parent directory for {}", path.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    tmp.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write temp file for {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("Failed to sync temp file for {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("Failed to rename temp file into {}", path.display()))?;
    Ok(())
}

/// Compute the SHA-256 hash of a file, streaming, returned as lowercase hex
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open file for hashing: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file
            .read(&mut buffer)
            .with_context(|| format!("Failed to read file for hashing: {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex_encode(&hasher.finalize()))
}

/// Compute the configuration hash with a `sha256:` prefix
///
/// A missing file hashes to the sentinel `sha256:no-config` so state
/// comparison still works before the first `tkgen init`.
pub fn compute_config_hash(config_path: &Path) -> Result<String> {
    if !config_path.exists() {
        return Ok("sha256:no-config".to_string());
    }
    Ok(format!("sha256:{}", compute_file_hash(config_path)?))
}

/// Strip an optional `sha256:` prefix from a hash string
pub fn normalize_hash(hash: &str) -> &str {
    hash.strip_prefix("sha256:").unwrap_or(hash)
}

/// Compare two hashes, accepting both `sha256:<hex>` and bare hex forms
pub fn hashes_equal(a: &str, b: &str) -> bool {
    normalize_hash(a).eq_ignore_ascii_case(normalize_hash(b))
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// An advisory file lock held for the lifetime of the value
///
/// Blocks until the lock is acquired. The lock file itself is left in place
/// after release; only the lock is dropped.
pub struct ScopedFileLock {
    file: File,
    path: PathBuf,
}

impl ScopedFileLock {
    /// Acquire an exclusive advisory lock at `path`, blocking until available
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create lock directory: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        file.lock_exclusive()
            .with_context(|| format!("Failed to acquire lock: {}", path.display()))?;

        log::debug!("Acquired lock: {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path of the underlying lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedFileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!("Failed to release lock {}: {}", self.path.display(), e);
        } else {
            log::debug!("Released lock: {}", self.path.display());
        }
    }
}

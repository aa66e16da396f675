//! Cross-platform links from projects into the shared toolchain cache
//!
//! Symlinks on POSIX, directory junctions on Windows, with a copy fallback
//! for filesystems that refuse symlinks. Links are treated as opaque
//! references: removing a link never touches its target.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::core::platform::{detect_platform, PlatformInfo};

/// Manages symlinks/junctions between projects and the toolchain cache
pub struct LinkManager {
    use_junctions: bool,
}

impl LinkManager {
    /// Create a link manager for the current platform
    pub fn new() -> Self {
        Self::for_platform(&detect_platform())
    }

    /// Create a link manager for an explicit platform (testing)
    pub fn for_platform(platform: &PlatformInfo) -> Self {
        Self {
            use_junctions: platform.os == "windows",
        }
    }

    /// Create a link at `link_path` pointing to `target_path`
    ///
    /// With `force`, any existing entry at `link_path` (including broken
    /// links) is removed first. The presence test never follows symlinks, so
    /// a dangling link still counts as existing.
    pub fn create_link(&self, link_path: &Path, target_path: &Path, force: bool) -> Result<()> {
        let target_path = target_path
            .canonicalize()
            .with_context(|| format!("Link target does not exist: {}", target_path.display()))?;

        if self.entry_exists(link_path) {
            if force {
                self.remove_entry(link_path)?;
            } else {
                anyhow::bail!("Link path already exists: {}", link_path.display());
            }
        }

        if let Some(parent) = link_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        if self.use_junctions {
            self.create_junction(link_path, &target_path)
        } else {
            self.create_symlink(link_path, &target_path)
        }
    }

    #[cfg(unix)]
    fn create_symlink(&self, link_path: &Path, target_path: &Path) -> Result<()> {
        match std::os::unix::fs::symlink(target_path, link_path) {
            Ok(()) => {
                log::info!(
                    "Created symlink: {} -> {}",
                    link_path.display(),
                    target_path.display()
                );
                Ok(())
            }
            Err(e) if e.raw_os_error() == Some(libc_eperm()) => {
                // Some filesystems (FAT mounts, certain network shares)
                // refuse symlinks; fall back to a real copy
                log::warn!(
                    "Symlink refused on this filesystem, copying instead: {}",
                    link_path.display()
                );
                copy_tree(target_path, link_path)
            }
            Err(e) => Err(e).with_context(|| {
                format!(
                    "Failed to create symlink {} -> {}",
                    link_path.display(),
                    target_path.display()
                )
            }),
        }
    }

    #[cfg(not(unix))]
    fn create_symlink(&self, link_path: &Path, target_path: &Path) -> Result<()> {
        copy_tree(target_path, link_path)
    }

    #[cfg(windows)]
    fn create_junction(&self, link_path: &Path, target_path: &Path) -> Result<()> {
        junction::create(target_path, link_path).with_context(|| {
            format!(
                "Failed to create junction {} -> {}",
                link_path.display(),
                target_path.display()
            )
        })?;
        log::info!(
            "Created junction: {} -> {}",
            link_path.display(),
            target_path.display()
        );
        Ok(())
    }

    #[cfg(not(windows))]
    fn create_junction(&self, _link_path: &Path, _target_path: &Path) -> Result<()> {
        anyhow::bail!("Junctions are only supported on Windows")
    }

    /// Resolve a link to its absolute target path, or None if not a link
    pub fn resolve_link(&self, link_path: &Path) -> Option<PathBuf> {
        if !self.is_link(link_path) {
            return None;
        }

        let target = std::fs::read_link(link_path).ok()?;
        let target = strip_unc_prefix(target);
        if target.is_absolute() {
            Some(target)
        } else {
            Some(link_path.parent()?.join(target))
        }
    }

    /// Whether the path is a link whose target exists
    pub fn is_valid_link(&self, link_path: &Path) -> bool {
        match self.resolve_link(link_path) {
            Some(target) => target.exists(),
            None => false,
        }
    }

    /// Whether the path is a link whose target is gone
    pub fn is_broken_link(&self, link_path: &Path) -> bool {
        if !self.is_link(link_path) {
            return false;
        }
        match self.resolve_link(link_path) {
            Some(target) => !target.exists(),
            None => true,
        }
    }

    /// Remove a link (never its target). Returns false if `path` is not a link
    pub fn remove_link(&self, link_path: &Path) -> Result<bool> {
        if !self.is_link(link_path) {
            return Ok(false);
        }
        self.remove_entry(link_path)?;
        log::info!("Removed link: {}", link_path.display());
        Ok(true)
    }

    /// Find all links in a directory tree (never following links)
    pub fn find_links(&self, root: &Path) -> Vec<PathBuf> {
        let mut links = Vec::new();
        for entry in WalkDir::new(root).follow_links(false).into_iter().flatten() {
            let path = entry.path();
            if path != root && self.is_link(path) {
                links.push(path.to_path_buf());
            }
        }
        links
    }

    /// Find all broken links in a directory tree
    pub fn find_broken_links(&self, root: &Path) -> Vec<PathBuf> {
        self.find_links(root)
            .into_iter()
            .filter(|link| self.is_broken_link(link))
            .collect()
    }

    /// Remove all broken links under `root`; returns how many were (or
    /// would be) removed
    pub fn cleanup_broken_links(&self, root: &Path, dry_run: bool) -> Result<usize> {
        let broken = self.find_broken_links(root);

        if dry_run {
            for link in &broken {
                log::info!("Would remove broken link: {}", link.display());
            }
            return Ok(broken.len());
        }

        let mut removed = 0;
        for link in &broken {
            match self.remove_link(link) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => log::warn!("Failed to remove broken link {}: {}", link.display(), e),
            }
        }
        Ok(removed)
    }

    /// Whether the path is a symlink or (on Windows) a junction
    pub fn is_link(&self, path: &Path) -> bool {
        if let Ok(metadata) = path.symlink_metadata() {
            if metadata.file_type().is_symlink() {
                return true;
            }
        }
        self.is_junction(path)
    }

    #[cfg(windows)]
    fn is_junction(&self, path: &Path) -> bool {
        self.use_junctions && junction::exists(path).unwrap_or(false)
    }

    #[cfg(not(windows))]
    fn is_junction(&self, _path: &Path) -> bool {
        false
    }

    fn entry_exists(&self, path: &Path) -> bool {
        // symlink_metadata sees broken symlinks; exists() would follow them
        path.symlink_metadata().is_ok() || self.is_junction(path)
    }

    fn remove_entry(&self, path: &Path) -> Result<()> {
        if self.is_junction(path) {
            // A junction is removed by directory removal, not unlink
            std::fs::remove_dir(path)
                .with_context(|| format!("Failed to remove junction {}", path.display()))
        } else if path.symlink_metadata().map(|m| m.file_type().is_symlink()).unwrap_or(false) {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove symlink {}", path.display()))
        } else if path.is_dir() {
            std::fs::remove_dir_all(path)
                .with_context(|| format!("Failed to remove directory {}", path.display()))
        } else {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove {}", path.display()))
        }
    }
}

impl Default for LinkManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn libc_eperm() -> i32 {
    // EPERM: returned by symlink(2) on filesystems without symlink support
    1
}

fn strip_unc_prefix(path: PathBuf) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(stripped) = text.strip_prefix("\\\\?\\") {
        return PathBuf::from(stripped);
    }
    if let Some(stripped) = text.strip_prefix("//?/") {
        return PathBuf::from(stripped);
    }
    path
}

/// Copy a directory tree (or single file) as a link fallback
fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
    if source.is_file() {
        std::fs::copy(source, dest)
            .with_context(|| format!("Failed to copy {}", source.display()))?;
        return Ok(());
    }

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.context("Failed to walk source tree")?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .context("Failed to relativize path")?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

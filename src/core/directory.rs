//! Directory structure management
//!
//! Creates and resolves the global toolchain cache (`~/.toolchainkit/`) and
//! the project-local `.toolchainkit/` tree, and keeps `.gitignore` aware of
//! the latter.
//!
//! ```text
//! Global cache (~/.toolchainkit/ or %USERPROFILE%\.toolchainkit\):
//!   toolchains/     extracted toolchain installations
//!   lock/           per-toolchain advisory lock files
//!   tools/          downloaded build tools (ninja, conan, ...)
//!   registry.json   cached toolchain database
//!
//! Project-local (<project>/.toolchainkit/):
//!   packages/            package manager cache
//!   cmake/toolchainkit/  generated CMake modules
//!   conan/profiles/      generated Conan profiles
//!   tools/               project-local downloaded tools
//!   state.json           current configuration state
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use directories::BaseDirs;

use crate::error::ToolchainKitError;

/// Name of the per-project directory
pub const PROJECT_DIR_NAME: &str = ".toolchainkit";

/// Get the platform-specific global cache directory path
///
/// `%USERPROFILE%\.toolchainkit` on Windows, `~/.toolchainkit` elsewhere.
pub fn global_cache_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().ok_or_else(|| {
        ToolchainKitError::directory(
            "Cannot determine home directory for the global toolchain cache",
            PathBuf::new(),
        )
    })?;
    Ok(base.home_dir().join(PROJECT_DIR_NAME))
}

/// Get the project-local `.toolchainkit` directory path
pub fn project_local_dir(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR_NAME)
}

/// Verify that a directory exists and is writable by creating a probe file
pub fn verify_directory_writable(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }
    let probe = path.join(".write_test");
    match std::fs::write(&probe, b"") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

/// Create the global cache directory structure if it doesn't exist
///
/// Creates the cache root, `toolchains/`, `lock/`, `tools/` and an empty
/// `registry.json`, and verifies the root is writable.
pub fn ensure_global_cache_structure() -> Result<PathBuf> {
    let cache = global_cache_dir()?;
    ensure_dir(&cache)?;

    if !verify_directory_writable(&cache) {
        return Err(ToolchainKitError::permission(
            format!(
                "Global cache directory at {} is not writable",
                cache.display()
            ),
            cache,
        )
        .into());
    }

    for subdir in ["toolchains", "lock", "tools"] {
        ensure_dir(&cache.join(subdir))?;
    }

    let registry_file = cache.join("registry.json");
    if !registry_file.exists() {
        std::fs::write(&registry_file, "{}").map_err(|e| {
            ToolchainKitError::Directory {
                message: "Failed to create registry file".to_string(),
                path: registry_file.clone(),
                source: Some(e.into()),
            }
        })?;
    }

    Ok(cache)
}

/// Create the project-local directory structure if it doesn't exist
pub fn ensure_project_structure(project_root: &Path) -> Result<PathBuf> {
    if !project_root.exists() {
        return Err(ToolchainKitError::directory(
            format!("Project root does not exist: {}", project_root.display()),
            project_root,
        )
        .into());
    }
    if !project_root.is_dir() {
        return Err(ToolchainKitError::directory(
            format!("Project root is not a directory: {}", project_root.display()),
            project_root,
        )
        .into());
    }

    let local = project_local_dir(project_root);
    ensure_dir(&local)?;

    if !verify_directory_writable(&local) {
        return Err(ToolchainKitError::permission(
            format!("Project directory at {} is not writable", local.display()),
            local,
        )
        .into());
    }

    for subdir in ["packages", "cmake/toolchainkit", "conan/profiles", "tools"] {
        ensure_dir(&local.join(subdir))?;
    }

    let state_file = local.join("state.json");
    if !state_file.exists() {
        std::fs::write(&state_file, "{}").map_err(|e| ToolchainKitError::Directory {
            message: "Failed to create state file".to_string(),
            path: state_file.clone(),
            source: Some(e.into()),
        })?;
    }

    Ok(local)
}

/// Add `.toolchainkit/` to the project's `.gitignore` if not already present
///
/// Idempotent: running it any number of times leaves exactly one matching
/// entry; existing content and trailing newlines are preserved.
pub fn update_gitignore(project_root: &Path) -> Result<()> {
    let gitignore = project_root.join(".gitignore");
    let pattern = ".toolchainkit/";

    let existing = if gitignore.exists() {
        std::fs::read_to_string(&gitignore).map_err(|e| ToolchainKitError::Permission {
            message: format!("Failed to read .gitignore: {}", e),
            path: gitignore.clone(),
        })?
    } else {
        String::new()
    };

    if existing.lines().any(|line| line.trim() == pattern) {
        return Ok(());
    }

    let mut content = existing.clone();
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    if content.is_empty() {
        content.push_str(&format!(
            "# ToolchainKit local state and cache\n{}\n",
            pattern
        ));
    } else {
        content.push_str(&format!(
            "\n# ToolchainKit local state and cache\n{}\n",
            pattern
        ));
    }

    std::fs::write(&gitignore, content).map_err(|e| ToolchainKitError::Permission {
        message: format!("Failed to update .gitignore: {}", e),
        path: gitignore.clone(),
    })?;
    Ok(())
}

/// Create the complete directory structure (global + project) and update
/// the project `.gitignore`
pub fn create_directory_structure(project_root: Option<&Path>) -> Result<()> {
    ensure_global_cache_structure()?;
    if let Some(root) = project_root {
        ensure_project_structure(root)?;
        update_gitignore(root)?;
    }
    Ok(())
}

fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| {
        ToolchainKitError::Directory {
            message: "Failed to create directory".to_string(),
            path: path.to_path_buf(),
            source: Some(e.into()),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_project_structure_created() {
        let dir = TempDir::new().unwrap();
        let local = ensure_project_structure(dir.path()).unwrap();

        assert!(local.join("packages").is_dir());
        assert!(local.join("cmake/toolchainkit").is_dir());
        assert!(local.join("conan/profiles").is_dir());
        assert!(local.join("tools").is_dir());
        assert!(local.join("state.json").is_file());
    }

    #[test]
    fn test_project_structure_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(ensure_project_structure(&missing).is_err());
    }

    #[test]
    fn test_gitignore_created_once() {
        let dir = TempDir::new().unwrap();
        update_gitignore(dir.path()).unwrap();
        update_gitignore(dir.path()).unwrap();
        update_gitignore(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        let matches = content
            .lines()
            .filter(|l| l.trim() == ".toolchainkit/")
            .count();
        assert_eq!(matches, 1);
    }

    #[test]
    fn test_gitignore_preserves_existing_entries() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "build/\n*.o").unwrap();

        update_gitignore(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(content.starts_with("build/\n*.o\n"));
        assert!(content.contains(".toolchainkit/"));
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_verify_directory_writable() {
        let dir = TempDir::new().unwrap();
        assert!(verify_directory_writable(dir.path()));
        assert!(!verify_directory_writable(&dir.path().join("absent")));
    }
}

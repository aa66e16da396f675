//! The init command
//!
//! Creates a starter toolchainkit.yaml, the project directory structure and
//! the `.gitignore` entry.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use console::style;

use crate::core::directory::create_directory_structure;
use crate::error::ToolchainKitError;

const STARTER_CONFIG: &str = "\
# ToolchainKit project configuration
# Reference: https://github.com/hovhannest/toolchainkit

version: 1

toolchains:
  - name: llvm-18
    type: clang
    version: 18.1.8
    stdlib: libc++

defaults:
  linux: llvm-18
  macos: llvm-18
  windows: llvm-18

# packages:
#   manager: conan

build:
  backend: ninja
  parallel: auto
  # caching:
  #   enabled: true
  #   tool: sccache
";

/// Initialize ToolchainKit in a project
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Project root directory
    #[arg(long, default_value = ".")]
    pub project_root: PathBuf,

    /// Overwrite an existing toolchainkit.yaml
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub fn execute(self, _verbose: bool) -> Result<()> {
        let project_root = self
            .project_root
            .canonicalize()
            .with_context(|| format!("Project root not found: {}", self.project_root.display()))?;

        let config_file = project_root.join("toolchainkit.yaml");
        if config_file.exists() && !self.force {
            return Err(ToolchainKitError::config_with_hint(
                format!("{} already exists", config_file.display()),
                None,
                "Use --force to overwrite the existing configuration",
            )
            .into());
        }

        std::fs::write(&config_file, STARTER_CONFIG)
            .with_context(|| format!("Failed to write {}", config_file.display()))?;

        create_directory_structure(Some(&project_root))?;

        println!(
            "{} Initialized ToolchainKit project in {}",
            style("✓").green().bold(),
            project_root.display()
        );
        println!();
        println!("Next steps:");
        println!("  1. Adjust toolchainkit.yaml for your project");
        println!("  2. Run: tkgen configure");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_config_and_structure() {
        let dir = TempDir::new().unwrap();
        let cmd = InitCommand {
            project_root: dir.path().to_path_buf(),
            force: false,
        };
        cmd.execute(false).unwrap();

        assert!(dir.path().join("toolchainkit.yaml").is_file());
        assert!(dir.path().join(".toolchainkit").is_dir());
        let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(gitignore.contains(".toolchainkit/"));

        // The starter config must parse
        let config =
            crate::config::model::parse_config(&dir.path().join("toolchainkit.yaml")).unwrap();
        assert_eq!(config.version, 1);
        assert_eq!(config.toolchains[0].name, "llvm-18");
    }

    #[test]
    fn test_init_refuses_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("toolchainkit.yaml"), "version: 1\n").unwrap();

        let cmd = InitCommand {
            project_root: dir.path().to_path_buf(),
            force: false,
        };
        assert!(cmd.execute(false).is_err());

        let forced = InitCommand {
            project_root: dir.path().to_path_buf(),
            force: true,
        };
        forced.execute(false).unwrap();
        let content = std::fs::read_to_string(dir.path().join("toolchainkit.yaml")).unwrap();
        assert!(content.contains("toolchains:"));
    }
}

//! The vscode command
//!
//! Points VS Code's CMake Tools at the generated toolchain file and build
//! directory by writing `.vscode/settings.json`. Existing settings are
//! merged, not replaced.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde_json::{json, Value};

use crate::core::directory::PROJECT_DIR_NAME;

/// Generate VS Code workspace settings for the configured toolchain
#[derive(Args, Debug)]
pub struct VscodeCommand {
    /// Project root directory
    #[arg(long, default_value = ".")]
    pub project_root: PathBuf,

    /// CMake build directory, relative to the project root
    #[arg(long, default_value = "build")]
    pub build_dir: String,
}

impl VscodeCommand {
    pub fn execute(self, _verbose: bool) -> Result<()> {
        let project_root = self
            .project_root
            .canonicalize()
            .with_context(|| format!("Project root not found: {}", self.project_root.display()))?;

        let toolchain_file = project_root
            .join(PROJECT_DIR_NAME)
            .join("cmake")
            .join("toolchain.cmake");

        let vscode_dir = project_root.join(".vscode");
        std::fs::create_dir_all(&vscode_dir)
            .with_context(|| format!("Failed to create {}", vscode_dir.display()))?;
        let settings_file = vscode_dir.join("settings.json");

        let mut settings: Value = if settings_file.exists() {
            let content = std::fs::read_to_string(&settings_file)
                .with_context(|| format!("Failed to read {}", settings_file.display()))?;
            serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("Existing settings.json is invalid, starting fresh: {}", e);
                json!({})
            })
        } else {
            json!({})
        };

        let map = settings
            .as_object_mut()
            .context("settings.json root must be an object")?;
        map.insert(
            "cmake.configureArgs".to_string(),
            json!([format!(
                "-DCMAKE_TOOLCHAIN_FILE={}",
                toolchain_file.display()
            )]),
        );
        map.insert(
            "cmake.buildDirectory".to_string(),
            json!(format!("${{workspaceFolder}}/{}", self.build_dir)),
        );
        map.insert(
            "C_Cpp.default.compileCommands".to_string(),
            json!(format!(
                "${{workspaceFolder}}/{}/compile_commands.json",
                self.build_dir
            )),
        );

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_file, content)
            .with_context(|| format!("Failed to write {}", settings_file.display()))?;

        println!(
            "{} VS Code settings written: {}",
            style("✓").green().bold(),
            settings_file.display()
        );
        Ok(())
    }
}

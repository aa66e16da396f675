//! Error types and helpers for user-friendly error messages
//!
//! This module provides custom error types with actionable hints and suggestions
//! to help users quickly resolve common issues.

use std::path::PathBuf;

use thiserror::Error;

/// Custom error types with helpful context and suggestions
#[derive(Error, Debug)]
pub enum ToolchainKitError {
    /// Configuration file errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
        hint: Option<String>,
    },

    /// Platform compatibility errors (compiler x platform x stdlib x generator)
    #[error("Compatibility error: {message}")]
    Compatibility { message: String, suggestion: String },

    /// Directory creation or access errors
    #[error("Directory error: {message}")]
    Directory {
        message: String,
        path: PathBuf,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Insufficient permissions on a directory or file
    #[error("Permission denied: {message}")]
    Permission { message: String, path: PathBuf },

    /// Invalid persisted project state
    #[error("State error: {message}")]
    State { message: String },

    /// Invalid or unreadable lock file
    #[error("Lock file error: {message}")]
    LockFile {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Downloaded archive hash does not match the expected hash
    #[error("Checksum mismatch for {artifact}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        artifact: String,
        expected: String,
        actual: String,
    },

    /// Download failed after retries
    #[error("Download failed: {url}: {message}")]
    DownloadFailed {
        url: String,
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Archive extraction failed
    #[error("Extraction failed for {archive}: {message}")]
    ExtractFailed {
        archive: PathBuf,
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// No registered provider can supply the requested toolchain
    #[error("No provider for toolchain {toolchain_type} {version}")]
    NoProvider {
        toolchain_type: String,
        version: String,
    },

    /// Package manager errors (generic)
    #[error("Package manager error ({manager}): {message}")]
    PackageManager { manager: String, message: String },

    /// Package manager executable could not be located
    #[error("Package manager not found: {manager}")]
    PackageManagerNotFound { manager: String, hint: String },

    /// Dependency installation subprocess failed
    #[error("{manager} install failed with exit code {exit_code}")]
    PackageManagerInstall {
        manager: String,
        exit_code: i32,
        command: String,
        stderr: String,
        hint: String,
    },

    /// No usable build backend on this system
    #[error("Build backend error: {message}")]
    BuildBackend { message: String },

    /// Requested build backend is not available
    #[error("Build backend '{backend}' is not available")]
    BackendNotAvailable {
        backend: String,
        available: Vec<String>,
    },
}

impl ToolchainKitError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
            hint: None,
        }
    }

    /// Create a configuration error with source and hint
    pub fn config_with_hint(
        message: impl Into<String>,
        source: Option<anyhow::Error>,
        hint: impl Into<String>,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source,
            hint: Some(hint.into()),
        }
    }

    /// Create a directory error
    pub fn directory(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Directory {
            message: message.into(),
            path: path.into(),
            source: None,
        }
    }

    /// Create a permission error
    pub fn permission(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Permission {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create a lock file error
    pub fn lock_file(message: impl Into<String>) -> Self {
        Self::LockFile {
            message: message.into(),
            source: None,
        }
    }

    /// Display error with formatting and hints
    pub fn display_with_hints(&self) {
        use console::style;

        eprintln!("\n{} {}", style("ERROR:").red().bold(), self);

        match self {
            ToolchainKitError::Config { hint: Some(h), .. } => {
                eprintln!("\n{} {}", style("HINT:").yellow().bold(), h);
            }
            ToolchainKitError::Compatibility { suggestion, .. } => {
                eprintln!("\n{} {}", style("HINT:").yellow().bold(), suggestion);
            }
            ToolchainKitError::PackageManagerNotFound { hint, .. } => {
                eprintln!("\n{} {}", style("HINT:").yellow().bold(), hint);
            }
            ToolchainKitError::PackageManagerInstall {
                command,
                stderr,
                hint,
                ..
            } => {
                eprintln!("\n{} {}", style("COMMAND:").cyan().bold(), command);
                if !stderr.is_empty() {
                    eprintln!(
                        "\n{}\n{}",
                        style("STDERR:").cyan().bold(),
                        stderr.trim_end()
                    );
                }
                eprintln!("\n{} {}", style("HINT:").yellow().bold(), hint);
            }
            ToolchainKitError::BackendNotAvailable { available, .. } => {
                if !available.is_empty() {
                    eprintln!(
                        "\n{} Available backends: {}",
                        style("HINT:").yellow().bold(),
                        available.join(", ")
                    );
                }
            }
            ToolchainKitError::ChecksumMismatch { .. } => {
                eprintln!(
                    "\n{} The download may be corrupted or tampered with. \
                     Delete the cached archive and retry.",
                    style("HINT:").yellow().bold()
                );
            }
            _ => {}
        }

        eprintln!();
    }
}

/// Common error hints for missing tools
#[allow(dead_code)]
pub mod hints {
    /// Get hint for missing CMake
    pub fn cmake() -> &'static str {
        "Install CMake from https://cmake.org/ or use your package manager:\n\
         • macOS: brew install cmake\n\
         • Ubuntu: sudo apt install cmake\n\
         • Windows: winget install Kitware.CMake"
    }

    /// Get hint for missing Ninja
    pub fn ninja() -> &'static str {
        "Install Ninja from https://ninja-build.org/ or use your package manager:\n\
         • macOS: brew install ninja\n\
         • Ubuntu: sudo apt install ninja-build\n\
         • Windows: winget install Ninja-build.Ninja\n\
         \n\
         Or run with --bootstrap to let tkgen download it."
    }

    /// Get hint for missing Conan
    pub fn conan() -> &'static str {
        "Install Conan 2.x: pip install conan\n\
         Or set packages.use_system: false to download Conan automatically.\n\
         Documentation: https://docs.conan.io/2/installation.html"
    }

    /// Get hint for missing vcpkg
    pub fn vcpkg() -> &'static str {
        "Set the VCPKG_ROOT environment variable or install vcpkg to a standard location.\n\
         Installation: https://vcpkg.io/en/getting-started.html\n\
         Common locations: ~/vcpkg, C:/vcpkg, /usr/local/vcpkg"
    }

    /// Get hint for a missing configuration file
    pub fn config_not_found() -> &'static str {
        "Could not find toolchainkit.yaml in the project root.\n\
         \n\
         To initialize ToolchainKit in this project:\n\
         • Run: tkgen init"
    }

    /// Get hint for an invalid configuration file
    pub fn invalid_config() -> &'static str {
        "toolchainkit.yaml is invalid. Common issues:\n\
         • Missing 'version: 1' field\n\
         • No toolchains defined\n\
         • Invalid YAML syntax (check indentation, quotes)\n\
         • defaults or targets referencing an undeclared toolchain name"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_message() {
        let err = ToolchainKitError::ChecksumMismatch {
            artifact: "llvm-18.1.8-linux-x64".to_string(),
            expected: "sha256:aaaa".to_string(),
            actual: "sha256:bbbb".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("llvm-18.1.8-linux-x64"));
        assert!(msg.contains("sha256:aaaa"));
    }

    #[test]
    fn test_config_helper_has_no_hint() {
        match ToolchainKitError::config("bad") {
            ToolchainKitError::Config { hint, .. } => assert!(hint.is_none()),
            _ => panic!("wrong variant"),
        }
    }
}

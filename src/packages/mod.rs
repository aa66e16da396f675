//! Package manager integration
//!
//! The common contract every package manager implements, plus detection of
//! which manager a project actually uses. Conan and vcpkg ship built in;
//! others register through the plugin registry.

pub mod conan;
pub mod tools;
pub mod vcpkg;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

/// Options for a dependency installation run
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// CMake build type (Debug, Release, ...)
    pub build_type: String,
    /// Profile file to install with (Conan)
    pub profile_path: Option<PathBuf>,
    /// CMake generator to target (e.g. "Ninja")
    pub generator: Option<String>,
    /// User toolchain file to chain into the generated toolchain
    pub user_toolchain: Option<PathBuf>,
    /// Where generated files land; defaults to `<project>/build`
    pub output_folder: Option<PathBuf>,
    /// Extra compiler environment (CC, CXX, ...)
    pub compiler_env: HashMap<String, String>,
}

/// Common contract for package manager integrations
pub trait PackageManager {
    /// Package manager name ('conan', 'vcpkg')
    fn name(&self) -> &'static str;

    /// Whether this project uses the manager (manifest file present)
    fn detect(&self) -> bool;

    /// Fetch and install the project's dependencies
    fn install_dependencies(&self, options: &InstallOptions) -> Result<()>;

    /// Emit the CMake file that chains the manager's toolchain into ours
    fn generate_toolchain_integration(&self, toolchain_file: &Path) -> Result<PathBuf>;
}

/// Detects which registered package manager a project uses
pub struct PackageManagerDetector {
    managers: Vec<Box<dyn PackageManager>>,
}

impl PackageManagerDetector {
    pub fn new() -> Self {
        Self {
            managers: Vec::new(),
        }
    }

    /// Register a candidate; detection order is registration order
    pub fn register(&mut self, manager: Box<dyn PackageManager>) {
        self.managers.push(manager);
    }

    /// First manager whose manifest is present in the project
    pub fn detect_primary(&self) -> Option<&dyn PackageManager> {
        self.managers
            .iter()
            .map(|m| m.as_ref())
            .find(|m| m.detect())
    }
}

impl Default for PackageManagerDetector {
    fn default() -> Self {
        Self::new()
    }
}

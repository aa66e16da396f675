//! CMake build backend selection
//!
//! Wraps CMake generators (Ninja, Make, MSBuild, Xcode, NMake) with their
//! parallelism and generator-specific CMake variables, and detects which
//! backends are usable on this system. Tool probing prefers a custom path,
//! then downloaded tools, then the system PATH.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::capabilities::ExtensionKind;
use crate::core::platform::{detect_platform, PlatformInfo};
use crate::error::ToolchainKitError;

/// A CMake generator with its invocation details
pub trait BuildBackend: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &'static str;

    /// CMAKE_GENERATOR value
    fn cmake_generator(&self) -> String;

    /// Arguments for `cmake --build`
    fn build_args(&self) -> Vec<String>;

    /// Whether the backend can be used on this system
    fn is_available(&self) -> bool;

    /// Backend-specific CMake variables (excluding the generator itself)
    fn cmake_variables(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

fn default_parallel_jobs(parallel_jobs: Option<usize>) -> usize {
    parallel_jobs.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    })
}

/// Ninja: fast, parallel, cross-platform
pub struct NinjaBackend {
    parallel_jobs: usize,
}

impl NinjaBackend {
    pub fn new(parallel_jobs: Option<usize>) -> Self {
        Self {
            parallel_jobs: default_parallel_jobs(parallel_jobs),
        }
    }
}

impl BuildBackend for NinjaBackend {
    fn name(&self) -> &'static str {
        "ninja"
    }

    fn cmake_generator(&self) -> String {
        "Ninja".to_string()
    }

    fn build_args(&self) -> Vec<String> {
        vec!["-j".to_string(), self.parallel_jobs.to_string()]
    }

    fn is_available(&self) -> bool {
        which::which("ninja").is_ok()
    }

    fn cmake_variables(&self) -> Vec<(String, String)> {
        vec![(
            "CMAKE_EXPORT_COMPILE_COMMANDS".to_string(),
            "ON".to_string(),
        )]
    }
}

/// GNU Make: ubiquitous on Unix
pub struct MakeBackend {
    parallel_jobs: usize,
}

impl MakeBackend {
    pub fn new(parallel_jobs: Option<usize>) -> Self {
        Self {
            parallel_jobs: default_parallel_jobs(parallel_jobs),
        }
    }
}

impl BuildBackend for MakeBackend {
    fn name(&self) -> &'static str {
        "make"
    }

    fn cmake_generator(&self) -> String {
        "Unix Makefiles".to_string()
    }

    fn build_args(&self) -> Vec<String> {
        vec!["-j".to_string(), self.parallel_jobs.to_string()]
    }

    fn is_available(&self) -> bool {
        which::which("make").is_ok()
    }
}

/// Visual Studio MSBuild
pub struct MsBuildBackend {
    version: &'static str,
    parallel_jobs: usize,
}

impl MsBuildBackend {
    pub fn new(parallel_jobs: Option<usize>) -> Self {
        Self {
            version: "17 2022",
            parallel_jobs: default_parallel_jobs(parallel_jobs),
        }
    }
}

impl BuildBackend for MsBuildBackend {
    fn name(&self) -> &'static str {
        "msbuild"
    }

    fn cmake_generator(&self) -> String {
        format!("Visual Studio {}", self.version)
    }

    fn build_args(&self) -> Vec<String> {
        vec!["--".to_string(), format!("/maxcpucount:{}", self.parallel_jobs)]
    }

    fn is_available(&self) -> bool {
        if !cfg!(windows) {
            return false;
        }
        which::which("msbuild").is_ok() || vswhere_reports_installation()
    }
}

fn vswhere_reports_installation() -> bool {
    let program_files =
        std::env::var("ProgramFiles(x86)").unwrap_or_else(|_| "C:\\Program Files (x86)".to_string());
    let vswhere = Path::new(&program_files)
        .join("Microsoft Visual Studio")
        .join("Installer")
        .join("vswhere.exe");
    if !vswhere.exists() {
        return false;
    }
    std::process::Command::new(vswhere)
        .args(["-latest", "-property", "installationPath"])
        .output()
        .map(|o| o.status.success() && !o.stdout.is_empty())
        .unwrap_or(false)
}

/// Xcode, macOS only
pub struct XcodeBackend {
    parallel_jobs: usize,
}

impl XcodeBackend {
    pub fn new(parallel_jobs: Option<usize>) -> Self {
        Self {
            parallel_jobs: default_parallel_jobs(parallel_jobs),
        }
    }
}

impl BuildBackend for XcodeBackend {
    fn name(&self) -> &'static str {
        "xcode"
    }

    fn cmake_generator(&self) -> String {
        "Xcode".to_string()
    }

    fn build_args(&self) -> Vec<String> {
        vec![
            "--".to_string(),
            "-jobs".to_string(),
            self.parallel_jobs.to_string(),
        ]
    }

    fn is_available(&self) -> bool {
        if !cfg!(target_os = "macos") {
            return false;
        }
        Path::new("/Applications/Xcode.app").exists() || which::which("xcodebuild").is_ok()
    }
}

/// NMake Makefiles, the Windows fallback
pub struct NmakeBackend;

impl BuildBackend for NmakeBackend {
    fn name(&self) -> &'static str {
        "nmake"
    }

    fn cmake_generator(&self) -> String {
        "NMake Makefiles".to_string()
    }

    fn build_args(&self) -> Vec<String> {
        // NMake has no usable parallelism
        Vec::new()
    }

    fn is_available(&self) -> bool {
        which::which("nmake").is_ok()
    }
}

/// Detects and selects the optimal build backend for a system
pub struct BuildBackendDetector {
    platform: PlatformInfo,
    tools_dirs: Vec<PathBuf>,
    custom_paths: HashMap<String, PathBuf>,
}

impl BuildBackendDetector {
    /// Create a detector
    ///
    /// `tools_dirs` are directories holding downloaded tools (project-local
    /// first, then global); `custom_paths` map tool names to explicit
    /// executables from the configuration.
    pub fn new(
        platform: Option<PlatformInfo>,
        tools_dirs: Vec<PathBuf>,
        custom_paths: HashMap<String, PathBuf>,
    ) -> Self {
        Self {
            platform: platform.unwrap_or_else(detect_platform),
            tools_dirs,
            custom_paths,
        }
    }

    /// Whether a build tool is reachable (custom path > downloaded > PATH)
    pub fn tool_available(&self, tool: &str) -> bool {
        if let Some(custom) = self.custom_paths.get(tool) {
            if custom.exists() {
                log::debug!("Found {} via custom path: {}", tool, custom.display());
                return true;
            }
        }

        let exe = format!(
            "{}{}",
            tool,
            crate::core::capabilities::get_file_extension(
                &self.platform.platform_string(),
                ExtensionKind::Executable
            )
        );
        for dir in &self.tools_dirs {
            if dir.join(&exe).exists() {
                log::debug!("Found {} in downloaded tools: {}", tool, dir.display());
                return true;
            }
        }

        which::which(tool).is_ok()
    }

    /// All backends usable on this system, Ninja first
    pub fn available_backends(&self) -> Vec<Box<dyn BuildBackend>> {
        let mut backends: Vec<Box<dyn BuildBackend>> = Vec::new();

        if self.tool_available("ninja") {
            backends.push(Box::new(NinjaBackend::new(None)));
        }

        match self.platform.os.as_str() {
            "windows" => {
                let msbuild = MsBuildBackend::new(None);
                if msbuild.is_available() {
                    backends.push(Box::new(msbuild));
                }
                let nmake = NmakeBackend;
                if nmake.is_available() {
                    backends.push(Box::new(nmake));
                }
            }
            "macos" => {
                let xcode = XcodeBackend::new(None);
                if xcode.is_available() {
                    backends.push(Box::new(xcode));
                }
                if self.tool_available("make") {
                    backends.push(Box::new(MakeBackend::new(None)));
                }
            }
            _ => {
                if self.tool_available("make") {
                    backends.push(Box::new(MakeBackend::new(None)));
                }
            }
        }

        backends
    }

    /// Select the best available backend
    ///
    /// Preference: Ninja, then the platform-native backend, then Make.
    pub fn detect_best(&self) -> Result<Box<dyn BuildBackend>> {
        let mut backends = self.available_backends();
        if backends.is_empty() {
            return Err(ToolchainKitError::BuildBackend {
                message: "No build backend available. Install Ninja, Make, MSBuild \
                          (Visual Studio) or Xcode."
                    .to_string(),
            }
            .into());
        }
        let best = backends.remove(0);
        log::info!("Selected build backend: {}", best.name());
        Ok(best)
    }

    /// Look a backend up by name (case-insensitive, partial match allowed)
    pub fn get_by_name(&self, name: &str) -> Result<Box<dyn BuildBackend>> {
        let lowered = name.to_lowercase();
        let backends = self.available_backends();
        let available: Vec<String> = backends.iter().map(|b| b.name().to_string()).collect();

        for backend in backends {
            if backend.name() == lowered || backend.cmake_generator().to_lowercase().contains(&lowered)
            {
                return Ok(backend);
            }
        }

        Err(ToolchainKitError::BackendNotAvailable {
            backend: name.to_string(),
            available,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_names() {
        assert_eq!(NinjaBackend::new(Some(4)).cmake_generator(), "Ninja");
        assert_eq!(MakeBackend::new(Some(4)).cmake_generator(), "Unix Makefiles");
        assert_eq!(
            MsBuildBackend::new(Some(4)).cmake_generator(),
            "Visual Studio 17 2022"
        );
        assert_eq!(XcodeBackend::new(Some(4)).cmake_generator(), "Xcode");
        assert_eq!(NmakeBackend.cmake_generator(), "NMake Makefiles");
    }

    #[test]
    fn test_ninja_exports_compile_commands() {
        let vars = NinjaBackend::new(Some(2)).cmake_variables();
        assert!(vars
            .iter()
            .any(|(k, v)| k == "CMAKE_EXPORT_COMPILE_COMMANDS" && v == "ON"));
    }

    #[test]
    fn test_build_args_carry_parallelism() {
        assert_eq!(NinjaBackend::new(Some(8)).build_args(), vec!["-j", "8"]);
        assert_eq!(MakeBackend::new(Some(2)).build_args(), vec!["-j", "2"]);
        assert!(NmakeBackend.build_args().is_empty());
    }

    #[test]
    fn test_downloaded_tool_is_detected() {
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let platform = PlatformInfo {
            os: "linux".to_string(),
            arch: "x64".to_string(),
            os_version: "1".to_string(),
            distribution: String::new(),
            abi: "unknown".to_string(),
        };
        let detector = BuildBackendDetector::new(
            Some(platform.clone()),
            vec![dir.path().to_path_buf()],
            HashMap::new(),
        );
        assert!(!detector.tool_available("some-absent-tool"));

        std::fs::write(dir.path().join("some-absent-tool"), b"").unwrap();
        assert!(detector.tool_available("some-absent-tool"));
    }

    #[test]
    fn test_custom_path_wins() {
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let tool = dir.path().join("my-ninja");
        std::fs::write(&tool, b"").unwrap();

        let mut custom = HashMap::new();
        custom.insert("ninja".to_string(), tool);
        let detector = BuildBackendDetector::new(None, Vec::new(), custom);
        assert!(detector.tool_available("ninja"));
    }
}

//! vcpkg package manager integration
//!
//! Manifest-mode vcpkg with automatic triplet selection and toolchain
//! chaining: vcpkg's CMake toolchain loads the ToolchainKit toolchain via
//! VCPKG_CHAINLOAD_TOOLCHAIN_FILE. Root discovery walks custom path, the
//! VCPKG_ROOT environment variable, common install locations, then an
//! on-demand download.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::directory::global_cache_dir;
use crate::core::platform::{detect_platform, PlatformInfo};
use crate::error::{hints, ToolchainKitError};
use crate::exec::subprocess::{run_command, CommandSpec};
use crate::packages::tools::system_vcpkg_path;
use crate::packages::{InstallOptions, PackageManager};

/// vcpkg integration for a project
pub struct VcpkgIntegration {
    project_root: PathBuf,
    use_system_vcpkg: bool,
    custom_vcpkg_path: Option<PathBuf>,
    platform: PlatformInfo,
}

impl VcpkgIntegration {
    /// Integration with defaults (system vcpkg)
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            use_system_vcpkg: true,
            custom_vcpkg_path: None,
            platform: detect_platform(),
        }
    }

    /// Integration with explicit root settings
    pub fn with_options(
        project_root: PathBuf,
        use_system_vcpkg: bool,
        custom_vcpkg_path: Option<PathBuf>,
    ) -> Self {
        Self {
            project_root,
            use_system_vcpkg,
            custom_vcpkg_path,
            platform: detect_platform(),
        }
    }

    /// Find the vcpkg installation root
    pub fn vcpkg_root(&self) -> Option<PathBuf> {
        if let Some(custom) = &self.custom_vcpkg_path {
            return custom.exists().then(|| custom.clone());
        }

        if self.use_system_vcpkg {
            if let Ok(root) = std::env::var("VCPKG_ROOT") {
                let path = PathBuf::from(root);
                if path.exists() {
                    return Some(path);
                }
            }

            if let Some(exe) = system_vcpkg_path() {
                return exe.parent().map(Path::to_path_buf);
            }

            let mut common = Vec::new();
            if let Some(base) = directories::BaseDirs::new() {
                common.push(base.home_dir().join("vcpkg"));
            }
            common.push(PathBuf::from("C:/vcpkg"));
            common.push(PathBuf::from("/usr/local/vcpkg"));
            common.push(PathBuf::from("/opt/vcpkg"));

            return common.into_iter().find(|path| {
                path.join("vcpkg").exists() || path.join("vcpkg.exe").exists()
            });
        }

        // Downloaded vcpkg lives under the global tools directory
        let tools = global_cache_dir().ok()?.join("tools").join("vcpkg");
        tools.exists().then_some(tools)
    }

    /// Map the platform to a vcpkg triplet (e.g., 'x64-linux')
    pub fn triplet(&self, platform: &PlatformInfo) -> String {
        let arch = match platform.arch.as_str() {
            "x86_64" | "x64" | "amd64" => "x64",
            "arm64" | "aarch64" => "arm64",
            "x86" | "i686" => "x86",
            "arm" | "armv7" => "arm",
            _ => "x64",
        };
        let os = match platform.os.as_str() {
            "linux" => "linux",
            "macos" | "darwin" => "osx",
            "windows" => "windows",
            "android" => "android",
            "ios" => "ios",
            _ => "linux",
        };
        format!("{}-{}", arch, os)
    }

    fn vcpkg_executable(&self) -> Result<PathBuf> {
        let root = self.vcpkg_root().ok_or_else(|| {
            anyhow::Error::from(ToolchainKitError::PackageManagerNotFound {
                manager: "vcpkg".to_string(),
                hint: hints::vcpkg().to_string(),
            })
        })?;

        let exe = root.join(if cfg!(windows) { "vcpkg.exe" } else { "vcpkg" });
        if !exe.exists() {
            return Err(ToolchainKitError::PackageManagerNotFound {
                manager: "vcpkg".to_string(),
                hint: format!("vcpkg executable not found at {}", exe.display()),
            }
            .into());
        }
        Ok(exe)
    }
}

impl PackageManager for VcpkgIntegration {
    fn name(&self) -> &'static str {
        "vcpkg"
    }

    fn detect(&self) -> bool {
        self.project_root.join("vcpkg.json").exists()
    }

    fn install_dependencies(&self, _options: &InstallOptions) -> Result<()> {
        let exe = self.vcpkg_executable()?;
        let triplet = self.triplet(&self.platform);

        let args = vec![
            "install".to_string(),
            "--triplet".to_string(),
            triplet,
            "--x-manifest-root".to_string(),
            self.project_root.display().to_string(),
        ];

        let result = run_command(
            &exe.display().to_string(),
            &args,
            &CommandSpec {
                cwd: Some(&self.project_root),
                env: Default::default(),
                inherit_io: false,
            },
        )?;

        if !result.success {
            return Err(ToolchainKitError::PackageManagerInstall {
                manager: "vcpkg".to_string(),
                exit_code: result.exit_code,
                command: format!("{} {}", exe.display(), args.join(" ")),
                stderr: result.stderr,
                hint: "1. Verify vcpkg.json syntax is correct\n\
                       2. Check the network connection for downloads\n\
                       3. Update vcpkg: git pull (in the vcpkg directory)\n\
                       4. Try: vcpkg integrate install"
                    .to_string(),
            }
            .into());
        }

        Ok(())
    }

    fn generate_toolchain_integration(&self, toolchain_file: &Path) -> Result<PathBuf> {
        let root = self.vcpkg_root().ok_or_else(|| {
            anyhow::Error::from(ToolchainKitError::PackageManager {
                manager: "vcpkg".to_string(),
                message: "Cannot generate integration: vcpkg root not found. Set VCPKG_ROOT \
                          or install vcpkg."
                    .to_string(),
            })
        })?;

        let integration_file = toolchain_file
            .parent()
            .unwrap_or(Path::new("."))
            .join("vcpkg-integration.cmake");
        let vcpkg_toolchain = root.join("scripts").join("buildsystems").join("vcpkg.cmake");

        let content = format!(
            "# vcpkg Integration\n\
             # This file is auto-generated by ToolchainKit. Do not modify manually.\n\
             \n\
             # vcpkg loads the ToolchainKit toolchain via chainloading\n\
             set(VCPKG_CHAINLOAD_TOOLCHAIN_FILE \"{chainload}\")\n\
             \n\
             set(CMAKE_TOOLCHAIN_FILE \"{vcpkg}\")\n\
             \n\
             if(EXISTS \"${{CMAKE_TOOLCHAIN_FILE}}\")\n\
             \x20   include(\"${{CMAKE_TOOLCHAIN_FILE}}\")\n\
             \x20   message(STATUS \"vcpkg: Using vcpkg toolchain with ToolchainKit chainloading\")\n\
             else()\n\
             \x20   message(WARNING \"vcpkg: Toolchain file not found at ${{CMAKE_TOOLCHAIN_FILE}}\")\n\
             endif()\n",
            chainload = toolchain_file.display().to_string().replace('\\', "/"),
            vcpkg = vcpkg_toolchain.display().to_string().replace('\\', "/"),
        );

        std::fs::write(&integration_file, content).map_err(|e| {
            ToolchainKitError::PackageManager {
                manager: "vcpkg".to_string(),
                message: format!(
                    "Failed to write integration file to {}: {}",
                    integration_file.display(),
                    e
                ),
            }
        })?;

        Ok(integration_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn platform(os: &str, arch: &str) -> PlatformInfo {
        PlatformInfo {
            os: os.to_string(),
            arch: arch.to_string(),
            os_version: "1".to_string(),
            distribution: String::new(),
            abi: "unknown".to_string(),
        }
    }

    #[test]
    fn test_detect_requires_manifest() {
        let dir = TempDir::new().unwrap();
        let vcpkg = VcpkgIntegration::new(dir.path().to_path_buf());
        assert!(!vcpkg.detect());

        std::fs::write(dir.path().join("vcpkg.json"), "{}").unwrap();
        assert!(vcpkg.detect());
    }

    #[test]
    fn test_triplet_mapping() {
        let dir = TempDir::new().unwrap();
        let vcpkg = VcpkgIntegration::new(dir.path().to_path_buf());

        assert_eq!(vcpkg.triplet(&platform("linux", "x64")), "x64-linux");
        assert_eq!(vcpkg.triplet(&platform("macos", "arm64")), "arm64-osx");
        assert_eq!(vcpkg.triplet(&platform("windows", "x64")), "x64-windows");
        assert_eq!(vcpkg.triplet(&platform("android", "arm64")), "arm64-android");
        assert_eq!(vcpkg.triplet(&platform("ios", "arm64")), "arm64-ios");
        assert_eq!(vcpkg.triplet(&platform("linux", "x86")), "x86-linux");
    }

    #[test]
    fn test_custom_root_wins() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("my-vcpkg");
        std::fs::create_dir_all(&root).unwrap();

        let vcpkg = VcpkgIntegration::with_options(
            dir.path().to_path_buf(),
            true,
            Some(root.clone()),
        );
        assert_eq!(vcpkg.vcpkg_root().unwrap(), root);

        let missing = VcpkgIntegration::with_options(
            dir.path().to_path_buf(),
            true,
            Some(dir.path().join("absent")),
        );
        assert!(missing.vcpkg_root().is_none());
    }

    #[test]
    fn test_integration_chains_toolchain() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("vcpkg-root");
        std::fs::create_dir_all(root.join("scripts/buildsystems")).unwrap();

        let cmake_dir = dir.path().join(".toolchainkit/cmake");
        std::fs::create_dir_all(&cmake_dir).unwrap();
        let toolchain_file = cmake_dir.join("toolchain.cmake");

        let vcpkg = VcpkgIntegration::with_options(
            dir.path().to_path_buf(),
            true,
            Some(root),
        );
        let integration = vcpkg.generate_toolchain_integration(&toolchain_file).unwrap();

        let content = std::fs::read_to_string(&integration).unwrap();
        assert!(content.contains("VCPKG_CHAINLOAD_TOOLCHAIN_FILE"));
        assert!(content.contains("toolchain.cmake"));
        assert!(content.contains("scripts/buildsystems/vcpkg.cmake"));
    }
}

//! Conan 2.x package manager integration
//!
//! Generates Conan profiles from provisioned toolchains, locates the Conan
//! executable (custom path > system > downloaded copy) and drives
//! `conan install` with the flags that keep Conan's CMake generators in the
//! build directory and chained behind the ToolchainKit toolchain file.
//!
//! On Windows the generated profile is deliberately MSVC-flavoured even
//! when the project builds with LLVM: prebuilt Conan binaries are built
//! against the MSVC runtime, and matching their ABI avoids rebuilding the
//! world.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::model::ToolchainConfig;
use crate::core::directory::{global_cache_dir, PROJECT_DIR_NAME};
use crate::core::platform::PlatformInfo;
use crate::error::{hints, ToolchainKitError};
use crate::exec::subprocess::{run_command, CommandSpec};
use crate::packages::tools::{system_conan_path, ToolDownloader};
use crate::packages::{InstallOptions, PackageManager};

/// Conan 2.x integration for a project
pub struct ConanIntegration {
    project_root: PathBuf,
    use_system_conan: bool,
    custom_conan_path: Option<PathBuf>,
    conan_home: Option<PathBuf>,
}

impl ConanIntegration {
    /// Integration with defaults (system Conan, no custom home)
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            use_system_conan: true,
            custom_conan_path: None,
            conan_home: None,
        }
    }

    /// Integration with explicit executable and home settings
    pub fn with_options(
        project_root: PathBuf,
        use_system_conan: bool,
        custom_conan_path: Option<PathBuf>,
        conan_home: Option<PathBuf>,
    ) -> Self {
        Self {
            project_root,
            use_system_conan,
            custom_conan_path,
            conan_home,
        }
    }

    /// Generate the Conan profile at `.toolchainkit/conan/profiles/default`
    pub fn generate_profile(
        &self,
        toolchain: &ToolchainConfig,
        toolchain_path: Option<&Path>,
        platform: &PlatformInfo,
        build_type: &str,
    ) -> Result<PathBuf> {
        let profile_dir = self
            .project_root
            .join(PROJECT_DIR_NAME)
            .join("conan")
            .join("profiles");
        std::fs::create_dir_all(&profile_dir)
            .with_context(|| format!("Failed to create {}", profile_dir.display()))?;
        let profile_path = profile_dir.join("default");

        let content = if platform.os == "windows" {
            self.windows_profile(toolchain, platform, build_type)
        } else {
            self.unix_profile(toolchain, toolchain_path, platform, build_type)
        };

        std::fs::write(&profile_path, content).map_err(|e| ToolchainKitError::PackageManager {
            manager: "conan".to_string(),
            message: format!(
                "Failed to write profile to {}: {}",
                profile_path.display(),
                e
            ),
        })?;

        log::info!("Conan profile generated: {}", profile_path.display());
        Ok(profile_path)
    }

    fn windows_profile(
        &self,
        toolchain: &ToolchainConfig,
        platform: &PlatformInfo,
        build_type: &str,
    ) -> String {
        // runtime_type only accepts Debug or Release; RelWithDebInfo and
        // MinSizeRel map to the Release runtime
        let runtime_type = if build_type == "Debug" { "Debug" } else { "Release" };

        format!(
            "# Conan profile generated by ToolchainKit\n\
             # Toolchain: {name} (using MSVC profile for Conan packages)\n\
             # Generated for: {platform}\n\
             # The project builds with its own toolchain via CMake; Conan packages\n\
             # use MSVC so prebuilt binaries stay ABI-compatible.\n\
             \n\
             [settings]\n\
             os={os}\n\
             arch={arch}\n\
             compiler=msvc\n\
             compiler.version=193\n\
             compiler.cppstd=17\n\
             compiler.runtime=dynamic\n\
             compiler.runtime_type={runtime_type}\n\
             build_type={build_type}\n",
            name = toolchain.name,
            platform = platform.platform_string(),
            os = conan_os(&platform.os),
            arch = conan_arch(&platform.arch),
            runtime_type = runtime_type,
            build_type = build_type,
        )
    }

    fn unix_profile(
        &self,
        toolchain: &ToolchainConfig,
        toolchain_path: Option<&Path>,
        platform: &PlatformInfo,
        build_type: &str,
    ) -> String {
        let compiler = conan_compiler(&toolchain.r#type);
        let compiler_version = toolchain
            .version
            .split('.')
            .next()
            .filter(|v| !v.is_empty())
            .unwrap_or("18");
        let libcxx = if compiler == "clang" { "libc++" } else { "libstdc++11" };

        let (cc_name, cxx_name) = match compiler {
            "gcc" => ("gcc", "g++"),
            _ => ("clang", "clang++"),
        };
        let (cc, cxx) = match toolchain_path {
            Some(install) => {
                let bin = install.join("bin");
                (
                    conan_path(&bin.join(cc_name)),
                    conan_path(&bin.join(cxx_name)),
                )
            }
            None => (cc_name.to_string(), cxx_name.to_string()),
        };

        format!(
            "# Conan profile generated by ToolchainKit\n\
             # Toolchain: {name}\n\
             # Generated for: {platform}\n\
             \n\
             [settings]\n\
             os={os}\n\
             arch={arch}\n\
             compiler={compiler}\n\
             compiler.version={version}\n\
             compiler.libcxx={libcxx}\n\
             compiler.cppstd=17\n\
             build_type={build_type}\n\
             \n\
             [buildenv]\n\
             CC={cc}\n\
             CXX={cxx}\n\
             \n\
             [conf]\n\
             tools.build:compiler_executables={{\"c\": \"{cc}\", \"cpp\": \"{cxx}\"}}\n",
            name = toolchain.name,
            platform = platform.platform_string(),
            os = conan_os(&platform.os),
            arch = conan_arch(&platform.arch),
            compiler = compiler,
            version = compiler_version,
            libcxx = libcxx,
            build_type = build_type,
            cc = cc,
            cxx = cxx,
        )
    }

    /// Locate the Conan executable: custom path > system > downloaded copy
    pub fn conan_executable(&self) -> Result<PathBuf> {
        if let Some(custom) = &self.custom_conan_path {
            if custom.exists() {
                return Ok(custom.clone());
            }
            return Err(ToolchainKitError::PackageManagerNotFound {
                manager: "conan".to_string(),
                hint: format!("Custom Conan path not found: {}", custom.display()),
            }
            .into());
        }

        if self.use_system_conan {
            return system_conan_path().ok_or_else(|| {
                ToolchainKitError::PackageManagerNotFound {
                    manager: "conan".to_string(),
                    hint: hints::conan().to_string(),
                }
                .into()
            });
        }

        let tools_dir = global_cache_dir()?.join("tools");
        let downloader = ToolDownloader::conan(tools_dir, crate::core::platform::detect_platform());
        if downloader.is_installed() {
            return Ok(downloader.executable_path());
        }
        downloader.download().map_err(|e| {
            ToolchainKitError::PackageManagerNotFound {
                manager: "conan".to_string(),
                hint: format!("Failed to download Conan: {}\n{}", e, hints::conan()),
            }
            .into()
        })
    }

    /// Environment overrides for Conan execution
    ///
    /// CONAN_HOME is set when explicitly configured, or placed under the
    /// global cache when using the downloaded Conan; the system Conan keeps
    /// its default `~/.conan2`.
    fn environment(&self) -> Result<HashMap<String, String>> {
        let mut env = HashMap::new();
        if let Some(home) = &self.conan_home {
            env.insert("CONAN_HOME".to_string(), home.display().to_string());
        } else if !self.use_system_conan {
            let home = global_cache_dir()?.join("conan_home");
            std::fs::create_dir_all(&home)
                .with_context(|| format!("Failed to create {}", home.display()))?;
            env.insert("CONAN_HOME".to_string(), home.display().to_string());
        }
        Ok(env)
    }
}

impl PackageManager for ConanIntegration {
    fn name(&self) -> &'static str {
        "conan"
    }

    fn detect(&self) -> bool {
        self.project_root.join("conanfile.txt").exists()
            || self.project_root.join("conanfile.py").exists()
    }

    fn install_dependencies(&self, options: &InstallOptions) -> Result<()> {
        let conan = self.conan_executable()?;
        let mut env = self.environment()?;
        env.extend(options.compiler_env.clone());

        let output_folder = options
            .output_folder
            .clone()
            .unwrap_or_else(|| self.project_root.join("build"));
        std::fs::create_dir_all(&output_folder)
            .with_context(|| format!("Failed to create {}", output_folder.display()))?;

        let mut args = vec![
            "install".to_string(),
            self.project_root.display().to_string(),
            "--build=missing".to_string(),
            "--output-folder".to_string(),
            output_folder.display().to_string(),
            "-s".to_string(),
            format!("build_type={}", options.build_type),
            // Keep Conan generators directly in the build folder instead of
            // nested build/<type>/generators trees
            "-c".to_string(),
            "tools.cmake.cmake_layout:build_folder=".to_string(),
        ];

        if let Some(profile) = &options.profile_path {
            // --profile:all keeps host and build profiles in sync, which
            // Conan requires when cross-building with custom profiles
            args.push("--profile:all".to_string());
            args.push(profile.display().to_string());
        }

        if let Some(generator) = &options.generator {
            args.push("-c".to_string());
            args.push(format!("tools.cmake.cmaketoolchain:generator={}", generator));
        }

        if let Some(user_toolchain) = &options.user_toolchain {
            args.push("-c".to_string());
            args.push(format!(
                "tools.cmake.cmaketoolchain:user_toolchain=['{}']",
                conan_path(user_toolchain)
            ));
        }

        let result = run_command(
            &conan.display().to_string(),
            &args,
            &CommandSpec {
                cwd: Some(&self.project_root),
                env,
                inherit_io: false,
            },
        )?;

        if !result.success {
            return Err(ToolchainKitError::PackageManagerInstall {
                manager: "conan".to_string(),
                exit_code: result.exit_code,
                command: format!("{} {}", conan.display(), args.join(" ")),
                stderr: result.stderr,
                hint: "1. Verify conanfile.txt/conanfile.py syntax is correct\n\
                       2. Check the network connection for remote downloads\n\
                       3. Try running: conan profile detect\n\
                       4. Check the Conan version: conan --version (requires 2.x)"
                    .to_string(),
            }
            .into());
        }

        Ok(())
    }

    fn generate_toolchain_integration(&self, toolchain_file: &Path) -> Result<PathBuf> {
        let integration_file = toolchain_file
            .parent()
            .unwrap_or(Path::new("."))
            .join("conan-integration.cmake");

        let content = "\
# Conan Integration
# This file is auto-generated by ToolchainKit. Do not modify manually.

set(CONAN_TOOLCHAIN_FILE \"${CMAKE_CURRENT_LIST_DIR}/../../build/conan_toolchain.cmake\")

if(EXISTS \"${CONAN_TOOLCHAIN_FILE}\")
    include(\"${CONAN_TOOLCHAIN_FILE}\")
    message(STATUS \"Conan: Using Conan-generated toolchain\")
else()
    message(WARNING \"Conan: toolchain file not found at ${CONAN_TOOLCHAIN_FILE}\")
    message(WARNING \"Conan: Run 'conan install' to generate the toolchain file\")
endif()
";

        std::fs::write(&integration_file, content).map_err(|e| {
            ToolchainKitError::PackageManager {
                manager: "conan".to_string(),
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

/// Map a ToolchainKit OS name onto Conan's
fn conan_os(os: &str) -> &'static str {
    match os {
        "linux" => "Linux",
        "macos" | "darwin" => "Macos",
        "windows" => "Windows",
        "android" => "Android",
        "ios" => "iOS",
        _ => "Linux",
    }
}

/// Map a ToolchainKit architecture onto Conan's
fn conan_arch(arch: &str) -> &'static str {
    match arch {
        "x86_64" | "x64" | "amd64" => "x86_64",
        "arm64" | "aarch64" => "armv8",
        "x86" | "i686" => "x86",
        "arm" | "armv7" => "armv7",
        "riscv64" | "riscv" => "riscv64",
        _ => "x86_64",
    }
}

/// Map a ToolchainKit compiler type onto Conan's compiler setting
fn conan_compiler(compiler_type: &str) -> &'static str {
    match compiler_type {
        "llvm" | "clang" => "clang",
        "gcc" => "gcc",
        "msvc" => "msvc",
        "apple-clang" => "apple-clang",
        _ => "gcc",
    }
}

fn conan_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn toolchain(r#type: &str, version: &str) -> ToolchainConfig {
        ToolchainConfig {
            name: format!("{}-test", r#type),
            r#type: r#type.to_string(),
            version: version.to_string(),
            stdlib: None,
            source: "prebuilt".to_string(),
            require_installed: false,
            custom_paths: None,
        }
    }

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
        let conan = ConanIntegration::new(dir.path().to_path_buf());
        assert!(!conan.detect());

        std::fs::write(dir.path().join("conanfile.py"), "").unwrap();
        assert!(conan.detect());
    }

    #[test]
    fn test_mapping_tables() {
        assert_eq!(conan_os("linux"), "Linux");
        assert_eq!(conan_os("macos"), "Macos");
        assert_eq!(conan_os("windows"), "Windows");
        assert_eq!(conan_arch("x64"), "x86_64");
        assert_eq!(conan_arch("arm64"), "armv8");
        assert_eq!(conan_arch("arm"), "armv7");
        assert_eq!(conan_compiler("llvm"), "clang");
        assert_eq!(conan_compiler("clang"), "clang");
        assert_eq!(conan_compiler("msvc"), "msvc");
    }

    #[test]
    fn test_unix_profile_contents() {
        let dir = TempDir::new().unwrap();
        let install = dir.path().join("llvm");
        std::fs::create_dir_all(install.join("bin")).unwrap();

        let conan = ConanIntegration::new(dir.path().to_path_buf());
        let profile = conan
            .generate_profile(
                &toolchain("clang", "18.1.8"),
                Some(&install),
                &platform("linux", "x64"),
                "Release",
            )
            .unwrap();

        let content = std::fs::read_to_string(&profile).unwrap();
        assert!(content.contains("os=Linux"));
        assert!(content.contains("arch=x86_64"));
        assert!(content.contains("compiler=clang"));
        assert!(content.contains("compiler.version=18"));
        assert!(content.contains("compiler.libcxx=libc++"));
        assert!(content.contains("[buildenv]"));
        assert!(content.contains("CXX="));
        assert!(content.contains("tools.build:compiler_executables"));
        assert_eq!(
            profile,
            dir.path().join(".toolchainkit/conan/profiles/default")
        );
    }

    #[test]
    fn test_gcc_profile_uses_libstdcxx11() {
        let dir = TempDir::new().unwrap();
        let conan = ConanIntegration::new(dir.path().to_path_buf());
        let profile = conan
            .generate_profile(
                &toolchain("gcc", "13.2.0"),
                None,
                &platform("linux", "arm64"),
                "Debug",
            )
            .unwrap();
        let content = std::fs::read_to_string(&profile).unwrap();
        assert!(content.contains("compiler=gcc"));
        assert!(content.contains("compiler.libcxx=libstdc++11"));
        assert!(content.contains("arch=armv8"));
        assert!(content.contains("build_type=Debug"));
    }

    #[test]
    fn test_windows_profile_is_msvc_flavoured() {
        let dir = TempDir::new().unwrap();
        let conan = ConanIntegration::new(dir.path().to_path_buf());

        // An LLVM toolchain on Windows still yields an MSVC profile
        let profile = conan
            .generate_profile(
                &toolchain("clang", "18.1.8"),
                None,
                &platform("windows", "x64"),
                "RelWithDebInfo",
            )
            .unwrap();
        let content = std::fs::read_to_string(&profile).unwrap();
        assert!(content.contains("compiler=msvc"));
        assert!(content.contains("compiler.version=193"));
        assert!(content.contains("compiler.runtime=dynamic"));
        // Non-Debug build types use the Release runtime
        assert!(content.contains("compiler.runtime_type=Release"));
        assert!(content.contains("build_type=RelWithDebInfo"));
    }

    #[test]
    fn test_windows_debug_runtime_type() {
        let dir = TempDir::new().unwrap();
        let conan = ConanIntegration::new(dir.path().to_path_buf());
        let profile = conan
            .generate_profile(
                &toolchain("clang", "18.1.8"),
                None,
                &platform("windows", "x64"),
                "Debug",
            )
            .unwrap();
        let content = std::fs::read_to_string(&profile).unwrap();
        assert!(content.contains("compiler.runtime_type=Debug"));
    }

    #[test]
    fn test_integration_file() {
        let dir = TempDir::new().unwrap();
        let cmake_dir = dir.path().join(".toolchainkit/cmake");
        std::fs::create_dir_all(&cmake_dir).unwrap();

        let conan = ConanIntegration::new(dir.path().to_path_buf());
        let integration = conan
            .generate_toolchain_integration(&cmake_dir.join("toolchain.cmake"))
            .unwrap();
        assert_eq!(integration, cmake_dir.join("conan-integration.cmake"));
        let content = std::fs::read_to_string(&integration).unwrap();
        assert!(content.contains("conan_toolchain.cmake"));
    }

    #[test]
    fn test_missing_custom_path_is_not_found_error() {
        let dir = TempDir::new().unwrap();
        let conan = ConanIntegration::with_options(
            dir.path().to_path_buf(),
            true,
            Some(dir.path().join("no-such-conan")),
            None,
        );
        let err = conan.conan_executable().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ToolchainKitError>(),
            Some(ToolchainKitError::PackageManagerNotFound { .. })
        ));
    }
}

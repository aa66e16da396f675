//! The configure command
//!
//! End-to-end orchestration of a single `configure` request: load and
//! validate configuration, provision the toolchain into the shared cache,
//! emit the CMake toolchain file and Conan profile, and in bootstrap mode
//! install build tools and dependencies and run CMake itself.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cmake::backends::BuildBackendDetector;
use crate::cmake::stdlib::{create_stdlib_config, StandardLibraryConfig, StdlibDetector};
use crate::cmake::toolchain_file::{CMakeToolchainGenerator, CrossCompileTarget, ToolchainFileConfig};
use crate::config::compatibility::CompatibilityValidator;
use crate::config::lockfile::{ComponentInfo, LockFileManager};
use crate::config::model::{parse_config, ToolchainConfig, ToolchainKitConfig};
use crate::config::validation::{format_validation_results, ConfigValidator};
use crate::core::directory::{
    create_directory_structure, ensure_global_cache_structure, PROJECT_DIR_NAME,
};
use crate::core::fsutil::compute_config_hash;
use crate::core::platform::{detect_platform, PlatformInfo};
use crate::core::state::StateManager;
use crate::error::{hints, ToolchainKitError};
use crate::exec::subprocess::{run_command, CommandSpec};
use crate::packages::conan::ConanIntegration;
use crate::packages::tools::ToolDownloader;
use crate::packages::vcpkg::VcpkgIntegration;
use crate::packages::{InstallOptions, PackageManager, PackageManagerDetector};
use crate::plugins::strategy::CompilerStrategy;
use crate::plugins::{global_registry, initialize_standard_plugins};
use crate::toolchain::provider::{ProgressInfo, ProgressPhase, ToolchainInstaller};

/// Configure the toolchain and generate CMake integration
#[derive(Args, Debug)]
pub struct ConfigureCommand {
    /// Project root directory
    #[arg(long, default_value = ".")]
    pub project_root: PathBuf,

    /// Path to toolchainkit.yaml (default: <project-root>/toolchainkit.yaml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Toolchain name to configure (default: platform default from config)
    #[arg(long)]
    pub toolchain: Option<String>,

    /// CMake build type
    #[arg(long, default_value = "Release",
          value_parser = ["Debug", "Release", "RelWithDebInfo", "MinSizeRel"])]
    pub build_type: String,

    /// CMake build directory, relative to the project root
    #[arg(long, default_value = "build")]
    pub build_dir: String,

    /// Cross-compilation target triple (e.g., arm64-linux-gnu)
    #[arg(long)]
    pub target: Option<String>,

    /// Standard library override (libc++, libstdc++, msvc)
    #[arg(long)]
    pub stdlib: Option<String>,

    /// Remove the build directory before configuring
    #[arg(long)]
    pub clean: bool,

    /// Compiler cache tool override (sccache, ccache, off)
    #[arg(long)]
    pub cache: Option<String>,

    /// Also install build tools, fetch dependencies and run CMake
    #[arg(long)]
    pub bootstrap: bool,

    /// Extra environment variables (KEY=VALUE, repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Extra arguments passed to the CMake invocation
    #[arg(long = "cmake-args", num_args = 0.., allow_hyphen_values = true)]
    pub cmake_args: Vec<String>,

    /// Overwrite generated files even when up to date
    #[arg(long)]
    pub force: bool,
}

impl ConfigureCommand {
    pub fn execute(self, _verbose: bool) -> Result<()> {
        for entry in &self.env {
            let Some((key, value)) = entry.split_once('=') else {
                return Err(ToolchainKitError::config(format!(
                    "Invalid --env entry '{}': expected KEY=VALUE",
                    entry
                ))
                .into());
            };
            std::env::set_var(key, value);
            log::debug!("Set environment variable: {}={}", key, value);
        }

        let project_root = self
            .project_root
            .canonicalize()
            .with_context(|| format!("Project root not found: {}", self.project_root.display()))?;
        let config_file = match &self.config {
            Some(path) => path.clone(),
            None => project_root.join("toolchainkit.yaml"),
        };

        if !config_file.exists() {
            return Err(ToolchainKitError::config_with_hint(
                format!("Project not initialized: {} not found", config_file.display()),
                None,
                hints::config_not_found(),
            )
            .into());
        }

        // Configuration errors abort before any side effect; the directory
        // structure is only created once the config parses
        let mut config = parse_config(&config_file)?;
        create_directory_structure(Some(&project_root))?;
        initialize_standard_plugins()?;

        let platform = detect_platform();
        if !crate::core::platform::is_supported_platform(&platform) {
            return Err(ToolchainKitError::Compatibility {
                message: format!("Unsupported platform: {}", platform.platform_string()),
                suggestion: format!(
                    "Supported platforms: {}",
                    crate::core::platform::supported_platforms().join(", ")
                ),
            }
            .into());
        }

        // Semantic validation is advisory; compatibility is strict under
        // --bootstrap
        let validation = ConfigValidator::new(platform.clone()).validate(&config);
        if !validation.issues.is_empty() {
            eprintln!("{}", format_validation_results(&validation));
        }
        if !validation.valid {
            return Err(ToolchainKitError::config_with_hint(
                "Configuration failed validation",
                None,
                hints::invalid_config(),
            )
            .into());
        }

        let compat = CompatibilityValidator::new(platform.clone()).validate_configuration(
            &config,
            self.toolchain.as_deref(),
            self.bootstrap,
        );
        for warning in &compat.warnings {
            eprintln!(
                "{} {}\n  → {}",
                style("WARNING:").yellow().bold(),
                warning.message,
                warning.suggestion
            );
        }
        if !compat.valid {
            let issue = &compat.errors[0];
            return Err(ToolchainKitError::Compatibility {
                message: issue.message.clone(),
                suggestion: issue.suggestion.clone(),
            }
            .into());
        }

        // CLI cache flag wins over the configured caching section
        if let Some(cache) = &self.cache {
            match cache.as_str() {
                "off" | "false" | "disabled" => {
                    config.build.caching.enabled = false;
                    config.build.caching.tool = None;
                }
                tool => {
                    config.build.caching.enabled = true;
                    config.build.caching.tool = Some(tool.to_string());
                }
            }
        }

        let package_manager = self.resolve_package_manager(&mut config, &project_root);

        let toolchain_config = self.select_toolchain(&config, &platform)?;
        println!("Configuring toolchain: {}", toolchain_config.name);
        println!("Build type: {}", self.build_type);
        println!("Build directory: {}", self.build_dir);
        println!();

        // Provision the toolchain; failure degrades to a placeholder file
        let provisioned = match self.provision(&config, &toolchain_config, &platform, &project_root)
        {
            Ok(result) => Some(result),
            Err(e) => {
                log::error!("Failed to provision toolchain: {}", e);
                eprintln!(
                    "{} Failed to provision toolchain: {}",
                    style("WARNING:").yellow().bold(),
                    e
                );
                eprintln!("  Falling back to a placeholder toolchain file");
                None
            }
        };

        let registry = global_registry().read().expect("plugin registry poisoned");
        let strategy = registry
            .get_compiler_strategy(strategy_name(&toolchain_config.r#type))
            .ok();
        let strategy_ref: Option<&dyn CompilerStrategy> = strategy.as_deref();

        let generator = CMakeToolchainGenerator::new(project_root.clone());
        let toolchain_file = match &provisioned {
            Some(result) => {
                let stdlib = self.stdlib_config(&toolchain_config, &result.install_path, &platform);
                let (clang_tidy_path, clang_format_path) = detect_clang_tools(
                    &project_root,
                    &toolchain_config.r#type,
                    &result.install_path,
                );

                generator.generate(
                    &ToolchainFileConfig {
                        toolchain_id: result.toolchain_id.clone(),
                        toolchain_path: Some(result.install_path.clone()),
                        compiler_type: toolchain_config.r#type.clone(),
                        build_type: self.build_type.clone(),
                        cross_compile: self.cross_compile_target(),
                        clang_tidy_path,
                        clang_format_path,
                    },
                    strategy_ref,
                    &config.build,
                    stdlib.as_deref(),
                )?
            }
            None => generator.generate_placeholder(
                &toolchain_config.name,
                &toolchain_config.r#type,
                &self.build_type,
                strategy_ref,
                &config.build,
            )?,
        };
        println!("  Toolchain file: {}", toolchain_file.display());
        println!();

        // Reference the cached installation from the project without copying
        if let Some(result) = &provisioned {
            let link_path = project_root.join(PROJECT_DIR_NAME).join("toolchain");
            match crate::toolchain::linking::LinkManager::new().create_link(
                &link_path,
                &result.install_path,
                true,
            ) {
                Ok(()) => log::debug!("Linked toolchain into project: {}", link_path.display()),
                Err(e) => log::warn!("Failed to link toolchain into project: {}", e),
            }
        }

        if package_manager.as_deref() == Some("conan") {
            let conan = self.conan_integration(&config, &project_root);
            let install_path = provisioned.as_ref().map(|r| r.install_path.as_path());
            match conan.generate_profile(&toolchain_config, install_path, &platform, &self.build_type)
            {
                Ok(profile) => {
                    println!("  Conan profile: {}", profile.display());
                    println!();
                }
                Err(e) => {
                    log::warn!("Failed to generate Conan profile: {}", e);
                    eprintln!(
                        "{} Failed to generate Conan profile: {}",
                        style("WARNING:").yellow().bold(),
                        e
                    );
                }
            }
        }

        let build_dir = project_root.join(&self.build_dir);
        if self.clean && build_dir.exists() {
            println!("Cleaning build directory: {}", build_dir.display());
            std::fs::remove_dir_all(&build_dir)
                .with_context(|| format!("Failed to clean {}", build_dir.display()))?;
            println!();
        }

        drop(registry);

        if self.bootstrap {
            self.run_bootstrap(
                &project_root,
                &config,
                &toolchain_config,
                &platform,
                &toolchain_file,
                package_manager.as_deref(),
                strategy.clone(),
            )?;
        } else {
            println!("Toolchain configured successfully!");
            println!();
            println!("Next steps:");
            println!("  1. Install package dependencies (if using Conan/vcpkg)");
            println!(
                "  2. Run CMake: cmake -B {} -S {} -DCMAKE_TOOLCHAIN_FILE={}",
                build_dir.display(),
                project_root.display(),
                toolchain_file.display()
            );
            println!(
                "  3. Build: cmake --build {} --config {}",
                build_dir.display(),
                self.build_type
            );
        }

        // Record state and the lock file; failures here are non-fatal
        if let Err(e) = self.record_outcome(
            &project_root,
            &config,
            &platform,
            &toolchain_config,
            provisioned.as_ref(),
            &config_file,
        ) {
            log::warn!("Failed to update project state: {}", e);
        }

        Ok(())
    }

    /// Resolve the package manager: configured if usable, else auto-detect
    fn resolve_package_manager(
        &self,
        config: &mut ToolchainKitConfig,
        project_root: &Path,
    ) -> Option<String> {
        let configured = config
            .packages
            .as_ref()
            .and_then(|p| p.manager.clone());

        if let Some(name) = configured {
            let usable = match name.as_str() {
                "conan" => self.conan_integration(config, project_root).detect(),
                "vcpkg" => VcpkgIntegration::new(project_root.to_path_buf()).detect(),
                // cpm and friends are driven entirely from CMake
                _ => true,
            };
            if usable {
                return Some(name);
            }
            eprintln!(
                "{} Configured package manager '{}' not found in project, auto-detecting...",
                style("WARNING:").yellow().bold(),
                name
            );
        }

        let mut detector = PackageManagerDetector::new();
        detector.register(Box::new(ConanIntegration::new(project_root.to_path_buf())));
        detector.register(Box::new(VcpkgIntegration::new(project_root.to_path_buf())));

        match detector.detect_primary() {
            Some(manager) => {
                let name = manager.name().to_string();
                println!("✓ Auto-detected package manager: {}", name);
                if let Some(packages) = &mut config.packages {
                    packages.manager = Some(name.clone());
                }
                Some(name)
            }
            None => {
                log::info!("No package manager detected");
                if let Some(packages) = &mut config.packages {
                    packages.manager = None;
                }
                None
            }
        }
    }

    /// Pick the toolchain to configure: CLI flag > platform default > first
    fn select_toolchain(
        &self,
        config: &ToolchainKitConfig,
        platform: &PlatformInfo,
    ) -> Result<ToolchainConfig> {
        if let Some(name) = &self.toolchain {
            return config
                .find_toolchain(name)
                .cloned()
                .ok_or_else(|| {
                    ToolchainKitError::config_with_hint(
                        format!("Toolchain '{}' is not declared in toolchainkit.yaml", name),
                        None,
                        hints::invalid_config(),
                    )
                    .into()
                });
        }

        if let Some(tc) = config.default_toolchain_for(&platform.platform_string()) {
            return Ok(tc.clone());
        }

        config
            .toolchains
            .first()
            .cloned()
            .ok_or_else(|| ToolchainKitError::config("No toolchains declared").into())
    }

    fn provision(
        &self,
        config: &ToolchainKitConfig,
        toolchain: &ToolchainConfig,
        platform: &PlatformInfo,
        project_root: &Path,
    ) -> Result<ProvisionedToolchain> {
        let cache_root = resolve_cache_root(config, project_root)?;
        let installer = ToolchainInstaller::new(cache_root);
        let platform_string = platform.platform_string();

        let registry = global_registry().read().expect("plugin registry poisoned");
        let providers = registry.toolchain_providers();
        if providers.is_empty() {
            return Err(ToolchainKitError::NoProvider {
                toolchain_type: toolchain.r#type.clone(),
                version: toolchain.version.clone(),
            }
            .into());
        }

        // Providers are ordered; the first claiming provider is authoritative
        let provider = providers
            .iter()
            .find(|p| p.can_provide(&toolchain.r#type, &toolchain.version))
            .ok_or_else(|| ToolchainKitError::NoProvider {
                toolchain_type: toolchain.r#type.clone(),
                version: toolchain.version.clone(),
            })?;

        println!("Provisioning toolchain {}...", toolchain.name);

        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("  {msg:<12} [{bar:40}] {percent:>3}%")
                .expect("static progress template")
                .progress_chars("=>-"),
        );
        let progress = |info: &ProgressInfo| match info.phase {
            ProgressPhase::Downloading => {
                bar.set_message("Downloading");
                bar.set_position(info.percentage as u64);
            }
            ProgressPhase::Extracting => {
                bar.set_message("Extracting");
                bar.set_position(info.percentage as u64);
            }
            ProgressPhase::Complete => bar.finish_and_clear(),
        };
        let progress: &dyn Fn(&ProgressInfo) = &progress;

        let install_path = installer.provide(
            provider.as_ref(),
            &toolchain.r#type,
            &toolchain.version,
            &platform_string,
            Some(progress),
        )?;

        let version = provider.resolve_version(&toolchain.r#type, &toolchain.version)?;
        let toolchain_id = provider.toolchain_id(&toolchain.r#type, &version, &platform_string);
        let release = provider.resolve_release(&toolchain.r#type, &version, &platform_string)?;

        println!("  Toolchain path: {}", install_path.display());
        println!();

        Ok(ProvisionedToolchain {
            toolchain_id,
            install_path,
            release_url: release.url,
            release_sha256: release.sha256,
            release_size: release.size_bytes,
            release_version: release.version,
        })
    }

    fn stdlib_config(
        &self,
        toolchain: &ToolchainConfig,
        install_path: &Path,
        platform: &PlatformInfo,
    ) -> Option<Box<dyn StandardLibraryConfig>> {
        // CLI override > config > strategy default via detection
        let requested = self.stdlib.as_deref().or(toolchain.stdlib.as_deref());
        match requested {
            Some(stdlib) => create_stdlib_config(stdlib, Some(install_path.to_path_buf())),
            None => Some(
                StdlibDetector::new(platform.clone()).default_for_compiler(&toolchain.r#type),
            ),
        }
    }

    fn cross_compile_target(&self) -> Option<CrossCompileTarget> {
        let target = self.target.as_deref()?;
        let mut parts = target.split('-');
        let arch = parts.next()?.to_string();
        let os = parts.next().unwrap_or("linux").to_string();
        Some(CrossCompileTarget {
            os,
            arch,
            sysroot: None,
        })
    }

    fn conan_integration(
        &self,
        config: &ToolchainKitConfig,
        project_root: &Path,
    ) -> ConanIntegration {
        let packages = config.packages.as_ref();
        ConanIntegration::with_options(
            project_root.to_path_buf(),
            packages.map(|p| p.use_system).unwrap_or(true),
            packages
                .and_then(|p| p.custom_path.as_ref())
                .map(PathBuf::from),
            packages
                .and_then(|p| p.conan_home.as_ref())
                .map(PathBuf::from),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn run_bootstrap(
        &self,
        project_root: &Path,
        config: &ToolchainKitConfig,
        toolchain: &ToolchainConfig,
        platform: &PlatformInfo,
        toolchain_file: &Path,
        package_manager: Option<&str>,
        strategy: Option<std::sync::Arc<dyn CompilerStrategy>>,
    ) -> Result<()> {
        println!("Bootstrapping project...");
        println!();

        // Preferred generator: config > strategy > detected best backend
        let preferred_generator = config
            .generator
            .clone()
            .or_else(|| {
                strategy
                    .as_ref()
                    .and_then(|s| s.preferred_generator(platform))
                    .map(String::from)
            })
            .or_else(|| {
                let mut tools_dirs = vec![project_root.join(PROJECT_DIR_NAME).join("tools")];
                if let Ok(global) = crate::core::directory::global_cache_dir() {
                    tools_dirs.push(global.join("tools"));
                }
                let custom_paths = config
                    .toolchains
                    .iter()
                    .find(|tc| tc.name == toolchain.name)
                    .and_then(|tc| tc.custom_paths.as_ref())
                    .map(|paths| {
                        paths
                            .iter()
                            .map(|(tool, path)| (tool.clone(), PathBuf::from(path)))
                            .collect()
                    })
                    .unwrap_or_default();

                BuildBackendDetector::new(Some(platform.clone()), tools_dirs, custom_paths)
                    .detect_best()
                    .ok()
                    .map(|backend| backend.cmake_generator())
            });

        let mut use_ninja = false;
        if preferred_generator.as_deref() == Some("Ninja") {
            println!("Setting up Ninja build system...");
            match self.ensure_ninja(project_root, platform) {
                Ok(ninja_path) => {
                    use_ninja = true;
                    if let Some(path) = ninja_path {
                        println!("  Ninja installed: {}", path.display());
                    } else {
                        println!("  Ninja found on PATH");
                    }
                }
                Err(e) => {
                    log::warn!("Failed to set up Ninja: {}", e);
                    eprintln!(
                        "{} Failed to set up Ninja: {}",
                        style("WARNING:").yellow().bold(),
                        e
                    );
                }
            }
            println!();
        }

        let build_dir = project_root.join(&self.build_dir);

        if let Some(manager_name) = package_manager {
            let manager: Box<dyn PackageManager> = match manager_name {
                "conan" => Box::new(self.conan_integration(config, project_root)),
                "vcpkg" => Box::new(VcpkgIntegration::new(project_root.to_path_buf())),
                other => {
                    log::info!("Package manager {} is driven from CMake", other);
                    Box::new(VcpkgIntegration::new(project_root.to_path_buf()))
                }
            };

            if manager.detect() {
                println!("Installing dependencies ({})...", manager_name);

                let profile = project_root
                    .join(PROJECT_DIR_NAME)
                    .join("conan")
                    .join("profiles")
                    .join("default");
                let mut options = InstallOptions {
                    build_type: self.build_type.clone(),
                    profile_path: (manager_name == "conan" && profile.exists())
                        .then_some(profile),
                    generator: None,
                    user_toolchain: None,
                    output_folder: Some(build_dir.clone()),
                    compiler_env: HashMap::new(),
                };

                if manager_name == "conan" && use_ninja && platform.os == "windows" {
                    // Windows + Ninja needs two passes: build the dependency
                    // binaries with the default Visual Studio generator for
                    // ABI compatibility, then regenerate the Conan CMake
                    // toolchain targeting Ninja
                    println!("  Building dependencies (Phase 1)...");
                    manager.install_dependencies(&options)?;

                    println!("  Configuring toolchain for Ninja (Phase 2)...");
                    options.generator = Some("Ninja".to_string());
                    manager.install_dependencies(&options)?;
                } else {
                    if manager_name == "conan" && use_ninja {
                        options.generator = Some("Ninja".to_string());
                    }
                    manager.install_dependencies(&options)?;
                }

                println!("  Dependencies installed");
                println!();

                let mut state = StateManager::new(project_root)?;
                if let Err(e) = state.mark_package_manager_configured(manager_name) {
                    log::warn!("Failed to record package manager state: {}", e);
                }
            } else {
                println!(
                    "  No {} manifest found, skipping dependencies",
                    manager_name
                );
            }
        }

        println!("Configuring CMake...");
        let mut args = vec![
            "-B".to_string(),
            build_dir.display().to_string(),
            "-S".to_string(),
            project_root.display().to_string(),
        ];
        if use_ninja {
            args.push("-G".to_string());
            args.push("Ninja".to_string());
        } else if let Some(generator) = &preferred_generator {
            args.push("-G".to_string());
            args.push(generator.clone());
        }
        args.push(format!("-DCMAKE_TOOLCHAIN_FILE={}", toolchain_file.display()));

        let conan_toolchain = build_dir.join("conan_toolchain.cmake");
        if conan_toolchain.exists() {
            args.push(format!(
                "-DCONAN_TOOLCHAIN_FILE={}",
                conan_toolchain.display()
            ));
        }
        args.push(format!("-DCMAKE_BUILD_TYPE={}", self.build_type));
        args.extend(self.cmake_args.iter().cloned());

        let result = run_command(
            "cmake",
            &args,
            &CommandSpec {
                cwd: Some(project_root),
                env: Default::default(),
                inherit_io: true,
            },
        )?;

        if !result.success {
            return Err(ToolchainKitError::BuildBackend {
                message: format!(
                    "CMake configuration failed with exit code {} (cmake {})",
                    result.exit_code,
                    args.join(" ")
                ),
            }
            .into());
        }

        println!("  CMake configuration successful");
        println!();

        // CMake is marked configured only after a zero exit
        let mut state = StateManager::new(project_root)?;
        state.mark_cmake_configured(&self.build_dir)?;
        state.mark_bootstrap_complete()?;

        println!("{} Configuration complete!", style("✓").green().bold());
        println!("  Toolchain:       {}", toolchain.name);
        println!("  Build directory: {}", build_dir.display());
        println!("  Build type:      {}", self.build_type);
        println!();
        println!("Next: cmake --build {}", build_dir.display());
        Ok(())
    }

    /// Make Ninja available for this process: PATH, then downloaded copy
    ///
    /// Returns the downloaded path, or None when Ninja was already on PATH.
    fn ensure_ninja(
        &self,
        project_root: &Path,
        platform: &PlatformInfo,
    ) -> Result<Option<PathBuf>> {
        if which::which("ninja").is_ok() {
            return Ok(None);
        }

        let tools_dir = project_root.join(PROJECT_DIR_NAME).join("tools");
        let downloader = ToolDownloader::ninja(tools_dir.clone(), platform.clone());
        let ninja_path = if downloader.is_installed() {
            downloader.executable_path()
        } else {
            downloader.download()?
        };

        // Prepend the tools directory to PATH for this process so CMake and
        // Conan find the downloaded Ninja
        let ninja_dir = ninja_path.parent().unwrap_or(&tools_dir);
        let separator = if cfg!(windows) { ";" } else { ":" };
        let path = std::env::var("PATH").unwrap_or_default();
        std::env::set_var(
            "PATH",
            format!("{}{}{}", ninja_dir.display(), separator, path),
        );

        Ok(Some(ninja_path))
    }

    #[allow(clippy::too_many_arguments)]
    fn record_outcome(
        &self,
        project_root: &Path,
        config: &ToolchainKitConfig,
        platform: &PlatformInfo,
        toolchain: &ToolchainConfig,
        provisioned: Option<&ProvisionedToolchain>,
        config_file: &Path,
    ) -> Result<()> {
        let mut state = StateManager::new(project_root)?;

        match provisioned {
            Some(result) => {
                state.update_toolchain(
                    &result.toolchain_id,
                    &format!(
                        "sha256:{}",
                        crate::core::fsutil::normalize_hash(&result.release_sha256)
                    ),
                )?;
            }
            None => state.update_toolchain(&toolchain.name, "")?,
        }
        state.update_config_hash(&compute_config_hash(config_file)?)?;
        if !self.bootstrap {
            // Bootstrap marks the build configured itself, after CMake ran
            state.update_build_config(&self.build_dir, &self.build_type)?;
        }
        if self.cache.is_some() || config.build.caching.enabled {
            state.update_caching(
                config.build.caching.enabled,
                config.build.caching.tool.as_deref(),
            )?;
        }

        if let Some(result) = provisioned {
            let mut toolchains = BTreeMap::new();
            toolchains.insert(
                result.toolchain_id.clone(),
                ComponentInfo {
                    url: result.release_url.clone(),
                    sha256: result.release_sha256.clone(),
                    size_bytes: result.release_size,
                    version: Some(result.release_version.clone()),
                },
            );

            let mut build_tools = BTreeMap::new();
            let tools_dir = project_root.join(PROJECT_DIR_NAME).join("tools");
            let ninja = ToolDownloader::ninja(tools_dir, platform.clone());
            if ninja.is_installed() {
                if let Ok(info) = ninja.component_info() {
                    build_tools.insert("ninja".to_string(), info);
                }
            }

            let manager = LockFileManager::new(project_root)?;
            let lock = manager.generate(
                config,
                platform,
                &toolchains,
                (!build_tools.is_empty()).then_some(&build_tools),
            )?;

            if let Ok(Some(previous)) = manager.load() {
                let diff = manager.diff(&previous, &lock);
                for modified in &diff.toolchains.modified {
                    log::info!(
                        "Lock file: {} changed {} -> {}",
                        modified.name,
                        modified.old_version.as_deref().unwrap_or("?"),
                        modified.new_version.as_deref().unwrap_or("?")
                    );
                }
                for added in &diff.toolchains.added {
                    log::info!("Lock file: added toolchain {}", added);
                }
            }

            manager.save(&lock)?;
        }

        Ok(())
    }
}

/// A successfully provisioned toolchain with its release pinning
struct ProvisionedToolchain {
    toolchain_id: String,
    install_path: PathBuf,
    release_url: String,
    release_sha256: String,
    release_size: u64,
    release_version: String,
}

/// Map a config toolchain type onto the strategy name
fn strategy_name(toolchain_type: &str) -> &str {
    match toolchain_type {
        "clang" | "llvm" => "clang",
        other => other,
    }
}

/// Resolve the toolchain cache root from the configuration
fn resolve_cache_root(config: &ToolchainKitConfig, project_root: &Path) -> Result<PathBuf> {
    match config.toolchain_cache.location.as_str() {
        "local" => {
            let relative = config
                .toolchain_cache
                .path
                .as_deref()
                .unwrap_or(".toolchainkit/cache");
            let root = project_root.join(relative);
            std::fs::create_dir_all(&root)
                .with_context(|| format!("Failed to create {}", root.display()))?;
            Ok(root)
        }
        "custom" => {
            let path = config.toolchain_cache.path.as_deref().ok_or_else(|| {
                ToolchainKitError::config("toolchain_cache.location is 'custom' but no path is set")
            })?;
            let root = PathBuf::from(path);
            std::fs::create_dir_all(&root)
                .with_context(|| format!("Failed to create {}", root.display()))?;
            Ok(root)
        }
        _ => ensure_global_cache_structure(),
    }
}

/// Find clang-tidy/clang-format in the toolchain when the project opts in
/// via .clang-tidy / .clang-format files
fn detect_clang_tools(
    project_root: &Path,
    compiler_type: &str,
    install_path: &Path,
) -> (Option<PathBuf>, Option<PathBuf>) {
    if compiler_type != "clang" {
        return (None, None);
    }

    let bin = install_path.join("bin");
    let exe = |name: &str| {
        let file = if cfg!(windows) {
            format!("{}.exe", name)
        } else {
            name.to_string()
        };
        let path = bin.join(file);
        path.is_file().then_some(path)
    };

    let clang_tidy = project_root
        .join(".clang-tidy")
        .exists()
        .then(|| exe("clang-tidy"))
        .flatten();
    let clang_format = project_root
        .join(".clang-format")
        .exists()
        .then(|| exe("clang-format"))
        .flatten();

    (clang_tidy, clang_format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_strategy_name_mapping() {
        assert_eq!(strategy_name("clang"), "clang");
        assert_eq!(strategy_name("llvm"), "clang");
        assert_eq!(strategy_name("gcc"), "gcc");
        assert_eq!(strategy_name("msvc"), "msvc");
    }

    #[test]
    fn test_resolve_cache_root_variants() {
        let dir = TempDir::new().unwrap();
        let mut config = minimal_config();

        config.toolchain_cache.location = "local".to_string();
        let root = resolve_cache_root(&config, dir.path()).unwrap();
        assert_eq!(root, dir.path().join(".toolchainkit/cache"));
        assert!(root.is_dir());

        config.toolchain_cache.location = "custom".to_string();
        config.toolchain_cache.path =
            Some(dir.path().join("custom-cache").display().to_string());
        let root = resolve_cache_root(&config, dir.path()).unwrap();
        assert_eq!(root, dir.path().join("custom-cache"));

        config.toolchain_cache.path = None;
        assert!(resolve_cache_root(&config, dir.path()).is_err());
    }

    #[test]
    fn test_detect_clang_tools_requires_project_opt_in() {
        let dir = TempDir::new().unwrap();
        let install = dir.path().join("llvm");
        std::fs::create_dir_all(install.join("bin")).unwrap();
        std::fs::write(install.join("bin/clang-tidy"), b"").unwrap();
        std::fs::write(install.join("bin/clang-format"), b"").unwrap();

        // Without .clang-tidy/.clang-format nothing is wired up
        let (tidy, format) = detect_clang_tools(dir.path(), "clang", &install);
        assert!(tidy.is_none());
        assert!(format.is_none());

        std::fs::write(dir.path().join(".clang-tidy"), "Checks: '*'\n").unwrap();
        let (tidy, format) = detect_clang_tools(dir.path(), "clang", &install);
        assert!(tidy.is_some());
        assert!(format.is_none());

        std::fs::write(dir.path().join(".clang-format"), "BasedOnStyle: LLVM\n").unwrap();
        let (tidy, format) = detect_clang_tools(dir.path(), "clang", &install);
        assert!(tidy.is_some());
        assert!(format.is_some());

        // Non-clang toolchains never wire clang tools
        let (tidy, _) = detect_clang_tools(dir.path(), "gcc", &install);
        assert!(tidy.is_none());
    }

    #[test]
    fn test_select_toolchain_precedence() {
        let platform = PlatformInfo {
            os: "linux".to_string(),
            arch: "x64".to_string(),
            os_version: "1".to_string(),
            distribution: String::new(),
            abi: "unknown".to_string(),
        };
        let config = two_toolchain_config();

        let mut cmd = command();
        // Platform default wins without a CLI override
        assert_eq!(
            cmd.select_toolchain(&config, &platform).unwrap().name,
            "gcc-13"
        );

        cmd.toolchain = Some("llvm-18".to_string());
        assert_eq!(
            cmd.select_toolchain(&config, &platform).unwrap().name,
            "llvm-18"
        );

        cmd.toolchain = Some("absent".to_string());
        assert!(cmd.select_toolchain(&config, &platform).is_err());
    }

    #[test]
    fn test_cross_compile_target_parsing() {
        let mut cmd = command();
        assert!(cmd.cross_compile_target().is_none());

        cmd.target = Some("arm64-linux-gnu".to_string());
        let target = cmd.cross_compile_target().unwrap();
        assert_eq!(target.arch, "arm64");
        assert_eq!(target.os, "linux");
    }

    fn command() -> ConfigureCommand {
        ConfigureCommand {
            project_root: PathBuf::from("."),
            config: None,
            toolchain: None,
            build_type: "Release".to_string(),
            build_dir: "build".to_string(),
            target: None,
            stdlib: None,
            clean: false,
            cache: None,
            bootstrap: false,
            env: Vec::new(),
            cmake_args: Vec::new(),
            force: false,
        }
    }

    fn minimal_config() -> ToolchainKitConfig {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toolchainkit.yaml");
        std::fs::write(
            &path,
            "version: 1\ntoolchains:\n  - name: llvm-18\n    type: clang\n    version: 18.1.8\n",
        )
        .unwrap();
        parse_config(&path).unwrap()
    }

    fn two_toolchain_config() -> ToolchainKitConfig {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toolchainkit.yaml");
        std::fs::write(
            &path,
            "\
version: 1
toolchains:
  - name: llvm-18
    type: clang
    version: 18.1.8
  - name: gcc-13
    type: gcc
    version: 13.2.0
defaults:
  linux: gcc-13
",
        )
        .unwrap();
        parse_config(&path).unwrap()
    }
}

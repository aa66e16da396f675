//! CMake toolchain file generation
//!
//! Emits the single `toolchain.cmake` that makes a provisioned toolchain
//! self-describing to CMake: compiler paths, strategy and stdlib flags,
//! cross-compilation settings, optional clang-tidy/clang-format wiring and
//! a Conan include guard so Conan-generated toolchains chain in first.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::cmake::stdlib::StandardLibraryConfig;
use crate::config::model::BuildConfig;
use crate::core::directory::PROJECT_DIR_NAME;
use crate::core::fsutil::atomic_write;
use crate::plugins::strategy::CompilerStrategy;

/// Cross-compilation target details for the toolchain file
#[derive(Debug, Clone)]
pub struct CrossCompileTarget {
    pub os: String,
    pub arch: String,
    pub sysroot: Option<PathBuf>,
}

/// Everything the generator needs to emit a toolchain file
pub struct ToolchainFileConfig {
    pub toolchain_id: String,
    /// Install root of the provisioned toolchain; None produces a
    /// placeholder file with only strategy flags and a warning
    pub toolchain_path: Option<PathBuf>,
    pub compiler_type: String,
    pub build_type: String,
    pub cross_compile: Option<CrossCompileTarget>,
    pub clang_tidy_path: Option<PathBuf>,
    pub clang_format_path: Option<PathBuf>,
}

/// Generates `.toolchainkit/cmake/toolchain.cmake` for a project
pub struct CMakeToolchainGenerator {
    project_root: PathBuf,
}

impl CMakeToolchainGenerator {
    pub fn new(project_root: PathBuf) -> Self {
        Self { project_root }
    }

    /// Path the toolchain file is written to
    pub fn toolchain_file_path(&self) -> PathBuf {
        self.project_root
            .join(PROJECT_DIR_NAME)
            .join("cmake")
            .join("toolchain.cmake")
    }

    /// Generate and write the toolchain file
    pub fn generate(
        &self,
        config: &ToolchainFileConfig,
        strategy: Option<&dyn CompilerStrategy>,
        build: &BuildConfig,
        stdlib: Option<&dyn StandardLibraryConfig>,
    ) -> Result<PathBuf> {
        let content = self.build_content(config, strategy, build, stdlib);
        let path = self.toolchain_file_path();
        atomic_write(&path, &content)?;
        log::info!("CMake toolchain file: {}", path.display());
        Ok(path)
    }

    /// Generate the fallback file used when provisioning failed: strategy
    /// flags only, plus a warning
    pub fn generate_placeholder(
        &self,
        toolchain_name: &str,
        compiler_type: &str,
        build_type: &str,
        strategy: Option<&dyn CompilerStrategy>,
        build: &BuildConfig,
    ) -> Result<PathBuf> {
        let mut lines = header_lines(toolchain_name, compiler_type, build_type);
        lines.push(String::new());
        lines.push("# WARNING: Toolchain not available".to_string());
        lines.push("# The configured toolchain could not be downloaded or found.".to_string());
        lines.push(String::new());
        lines.extend(conan_include_lines());
        lines.push(String::new());

        if let Some(strategy) = strategy {
            lines.extend(strategy.cmake_flag_lines(build));
            lines.push(String::new());
        }

        lines.push(format!(
            "message(WARNING \"ToolchainKit: Toolchain '{}' not available\")",
            toolchain_name
        ));
        lines.push(format!(
            "message(STATUS \"  Compiler type: {}\")",
            compiler_type
        ));
        lines.push(
            "message(STATUS \"  Using strategy configuration without toolchain binaries\")"
                .to_string(),
        );

        let path = self.toolchain_file_path();
        atomic_write(&path, &(lines.join("\n") + "\n"))?;
        log::info!("Placeholder toolchain file: {}", path.display());
        Ok(path)
    }

    fn build_content(
        &self,
        config: &ToolchainFileConfig,
        strategy: Option<&dyn CompilerStrategy>,
        build: &BuildConfig,
        stdlib: Option<&dyn StandardLibraryConfig>,
    ) -> String {
        let mut lines = header_lines(&config.toolchain_id, &config.compiler_type, &config.build_type);
        lines.push(String::new());
        lines.extend(conan_include_lines());
        lines.push(String::new());

        if let Some(install) = &config.toolchain_path {
            lines.extend(compiler_lines(install, strategy));
            lines.push(String::new());
        }

        if let Some(strategy) = strategy {
            let flag_lines = strategy.cmake_flag_lines(build);
            if !flag_lines.is_empty() {
                lines.extend(flag_lines);
                lines.push(String::new());
            }
        }

        if let Some(stdlib) = stdlib {
            lines.push(stdlib.cmake_snippet());
            lines.push(String::new());
        }

        if let Some(target) = &config.cross_compile {
            lines.extend(cross_compile_lines(target));
            lines.push(String::new());
        }

        if let Some(tidy) = &config.clang_tidy_path {
            lines.push(format!(
                "set(CMAKE_CXX_CLANG_TIDY \"{}\")",
                cmake_path(tidy)
            ));
        }
        if let Some(format) = &config.clang_format_path {
            lines.push(format!(
                "set(CLANG_FORMAT_EXECUTABLE \"{}\")",
                cmake_path(format)
            ));
        }

        let mut content = lines.join("\n");
        while content.ends_with('\n') {
            content.pop();
        }
        content.push('\n');
        content
    }
}

fn header_lines(toolchain: &str, compiler_type: &str, build_type: &str) -> Vec<String> {
    vec![
        "# CMake Toolchain File (generated by ToolchainKit)".to_string(),
        format!("# Toolchain: {}", toolchain),
        format!("# Compiler type: {}", compiler_type),
        format!("# Build type: {}", build_type),
    ]
}

fn conan_include_lines() -> Vec<String> {
    vec![
        "# Conan toolchain integration (when CONAN_TOOLCHAIN_FILE is provided)".to_string(),
        "if(DEFINED CONAN_TOOLCHAIN_FILE AND EXISTS \"${CONAN_TOOLCHAIN_FILE}\")".to_string(),
        "    message(STATUS \"ToolchainKit: Including Conan toolchain: ${CONAN_TOOLCHAIN_FILE}\")"
            .to_string(),
        "    include(\"${CONAN_TOOLCHAIN_FILE}\")".to_string(),
        "endif()".to_string(),
    ]
}

fn compiler_lines(install: &Path, strategy: Option<&dyn CompilerStrategy>) -> Vec<String> {
    let bin = install.join("bin");
    let mut lines = Vec::new();

    let (cc, cxx) = strategy
        .map(|s| s.compiler_executables())
        .unwrap_or(("clang", "clang++"));

    if let Some(path) = find_tool(&bin, &[cc]) {
        lines.push(format!("set(CMAKE_C_COMPILER \"{}\")", cmake_path(&path)));
    }
    if let Some(path) = find_tool(&bin, &[cxx]) {
        lines.push(format!("set(CMAKE_CXX_COMPILER \"{}\")", cmake_path(&path)));
    }

    if let Some(strategy) = strategy {
        if let Some(path) = find_tool(&bin, strategy.tool_candidates("linker")) {
            lines.push(format!("set(CMAKE_LINKER \"{}\")", cmake_path(&path)));
        }
        if let Some(path) = find_tool(&bin, strategy.tool_candidates("ar")) {
            lines.push(format!("set(CMAKE_AR \"{}\")", cmake_path(&path)));
        }
        if let Some(path) = find_tool(&bin, strategy.tool_candidates("ranlib")) {
            lines.push(format!("set(CMAKE_RANLIB \"{}\")", cmake_path(&path)));
        }
    }

    lines
}

fn cross_compile_lines(target: &CrossCompileTarget) -> Vec<String> {
    let system_name = match target.os.as_str() {
        "linux" => "Linux",
        "macos" => "Darwin",
        "windows" => "Windows",
        "android" => "Android",
        "ios" => "iOS",
        other => other,
    };
    let processor = match target.arch.as_str() {
        "x64" => "x86_64",
        "arm64" => "aarch64",
        "x86" => "i686",
        "arm" => "armv7l",
        other => other,
    };

    let mut lines = vec![
        "# Cross-compilation".to_string(),
        format!("set(CMAKE_SYSTEM_NAME {})", system_name),
        format!("set(CMAKE_SYSTEM_PROCESSOR {})", processor),
    ];
    if let Some(sysroot) = &target.sysroot {
        lines.push(format!("set(CMAKE_SYSROOT \"{}\")", cmake_path(sysroot)));
    }
    lines
}

/// Find the first existing candidate in a bin directory
fn find_tool(bin: &Path, candidates: &[&str]) -> Option<PathBuf> {
    for candidate in candidates {
        let name = if cfg!(windows) && !candidate.ends_with(".exe") {
            format!("{}.exe", candidate)
        } else {
            candidate.to_string()
        };
        let path = bin.join(name);
        if path.is_file() {
            return Some(path);
        }
    }
    None
}

/// CMake wants forward slashes, also on Windows
fn cmake_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::strategy::ClangStrategy;
    use tempfile::TempDir;

    fn fake_toolchain(dir: &Path) -> PathBuf {
        let install = dir.join("llvm-18.1.8-linux-x64");
        let bin = install.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        for tool in ["clang", "clang++", "llvm-ar", "llvm-ranlib", "clang-tidy"] {
            std::fs::write(bin.join(tool), b"").unwrap();
        }
        install
    }

    fn file_config(install: Option<PathBuf>) -> ToolchainFileConfig {
        ToolchainFileConfig {
            toolchain_id: "llvm-18.1.8-linux-x64".to_string(),
            toolchain_path: install,
            compiler_type: "clang".to_string(),
            build_type: "Release".to_string(),
            cross_compile: None,
            clang_tidy_path: None,
            clang_format_path: None,
        }
    }

    #[test]
    fn test_generated_file_contents() {
        let dir = TempDir::new().unwrap();
        let install = fake_toolchain(dir.path());
        let generator = CMakeToolchainGenerator::new(dir.path().to_path_buf());

        let path = generator
            .generate(
                &file_config(Some(install.clone())),
                Some(&ClangStrategy),
                &BuildConfig::default(),
                None,
            )
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        // Conan integration comes before compiler assignments
        let conan_pos = content.find("CONAN_TOOLCHAIN_FILE").unwrap();
        let compiler_pos = content.find("CMAKE_CXX_COMPILER").unwrap();
        assert!(conan_pos < compiler_pos);

        assert!(content.contains("set(CMAKE_C_COMPILER"));
        assert!(content.contains("clang++"));
        assert!(content.contains("set(CMAKE_AR"));
        assert!(content.contains("llvm-ar"));
        assert!(content.contains("-fcolor-diagnostics"));
        assert_eq!(
            path,
            dir.path().join(".toolchainkit/cmake/toolchain.cmake")
        );
    }

    #[test]
    fn test_cross_compile_block() {
        let dir = TempDir::new().unwrap();
        let install = fake_toolchain(dir.path());
        let generator = CMakeToolchainGenerator::new(dir.path().to_path_buf());

        let mut config = file_config(Some(install));
        config.cross_compile = Some(CrossCompileTarget {
            os: "linux".to_string(),
            arch: "arm64".to_string(),
            sysroot: Some(PathBuf::from("/opt/sysroots/aarch64")),
        });

        let path = generator
            .generate(&config, Some(&ClangStrategy), &BuildConfig::default(), None)
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("set(CMAKE_SYSTEM_NAME Linux)"));
        assert!(content.contains("set(CMAKE_SYSTEM_PROCESSOR aarch64)"));
        assert!(content.contains("set(CMAKE_SYSROOT \"/opt/sysroots/aarch64\")"));
    }

    #[test]
    fn test_clang_tidy_wiring() {
        let dir = TempDir::new().unwrap();
        let install = fake_toolchain(dir.path());
        let generator = CMakeToolchainGenerator::new(dir.path().to_path_buf());

        let mut config = file_config(Some(install.clone()));
        config.clang_tidy_path = Some(install.join("bin/clang-tidy"));

        let path = generator
            .generate(&config, Some(&ClangStrategy), &BuildConfig::default(), None)
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("CMAKE_CXX_CLANG_TIDY"));
    }

    #[test]
    fn test_placeholder_carries_warning_and_strategy_flags() {
        let dir = TempDir::new().unwrap();
        let generator = CMakeToolchainGenerator::new(dir.path().to_path_buf());

        let path = generator
            .generate_placeholder(
                "llvm-18",
                "clang",
                "Debug",
                Some(&ClangStrategy),
                &BuildConfig::default(),
            )
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("WARNING"));
        assert!(content.contains("not available"));
        assert!(content.contains("-fcolor-diagnostics"));
        assert!(content.contains("CONAN_TOOLCHAIN_FILE"));
        assert!(!content.contains("set(CMAKE_CXX_COMPILER"));
    }
}

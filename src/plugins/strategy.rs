//! Compiler strategies
//!
//! A strategy reports compiler-type-specific CMake flag lines, the preferred
//! CMake generator, the default standard library and executable names for
//! insertion into the generated toolchain file. Standard strategies cover
//! clang, gcc and msvc; plugins register additional types.

use crate::config::model::BuildConfig;
use crate::core::platform::PlatformInfo;

/// Compiler-type-specific configuration hooks
pub trait CompilerStrategy: Send + Sync {
    /// Strategy name ('clang', 'gcc', 'msvc')
    fn name(&self) -> &'static str;

    /// C and C++ compiler executable names, in that order
    fn compiler_executables(&self) -> (&'static str, &'static str);

    /// Candidate executable names for an auxiliary tool, best first
    ///
    /// Known tools: 'linker', 'ar', 'ranlib'.
    fn tool_candidates(&self, tool: &str) -> &'static [&'static str];

    /// Preferred CMake generator for a platform, if any
    fn preferred_generator(&self, platform: &PlatformInfo) -> Option<&'static str>;

    /// Default standard library on a platform, if any
    fn default_stdlib(&self, platform: &PlatformInfo) -> Option<&'static str>;

    /// CMake lines carrying the strategy's flags into the toolchain file
    fn cmake_flag_lines(&self, build: &BuildConfig) -> Vec<String> {
        let mut lines = self.base_flag_lines();
        lines.extend(user_flag_lines(build));
        lines
    }

    /// Strategy-specific baseline flags
    fn base_flag_lines(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Map build.flags entries onto CMake *_INIT variables
fn user_flag_lines(build: &BuildConfig) -> Vec<String> {
    let Some(flags) = &build.flags else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    let mut keys: Vec<_> = flags.keys().collect();
    keys.sort();

    for key in keys {
        let joined = flags[key].join(" ");
        if joined.is_empty() {
            continue;
        }
        let vars: &[&str] = match key.as_str() {
            "cxx" => &["CMAKE_CXX_FLAGS_INIT"],
            "c" => &["CMAKE_C_FLAGS_INIT"],
            "linker" => &["CMAKE_EXE_LINKER_FLAGS_INIT", "CMAKE_SHARED_LINKER_FLAGS_INIT"],
            "exe_linker" => &["CMAKE_EXE_LINKER_FLAGS_INIT"],
            "shared_linker" => &["CMAKE_SHARED_LINKER_FLAGS_INIT"],
            _ => &[],
        };
        for var in vars {
            lines.push(format!("string(APPEND {} \" {}\")", var, joined));
        }
    }
    lines
}

/// Strategy for LLVM/Clang toolchains
pub struct ClangStrategy;

impl CompilerStrategy for ClangStrategy {
    fn name(&self) -> &'static str {
        "clang"
    }

    fn compiler_executables(&self) -> (&'static str, &'static str) {
        ("clang", "clang++")
    }

    fn tool_candidates(&self, tool: &str) -> &'static [&'static str] {
        match tool {
            "linker" => &["ld.lld", "lld"],
            "ar" => &["llvm-ar"],
            "ranlib" => &["llvm-ranlib"],
            _ => &[],
        }
    }

    fn preferred_generator(&self, _platform: &PlatformInfo) -> Option<&'static str> {
        Some("Ninja")
    }

    fn default_stdlib(&self, platform: &PlatformInfo) -> Option<&'static str> {
        match platform.os.as_str() {
            "linux" | "macos" => Some("libc++"),
            _ => None,
        }
    }

    fn base_flag_lines(&self) -> Vec<String> {
        vec!["string(APPEND CMAKE_CXX_FLAGS_INIT \" -fcolor-diagnostics\")".to_string()]
    }
}

/// Strategy for GCC toolchains
pub struct GccStrategy;

impl CompilerStrategy for GccStrategy {
    fn name(&self) -> &'static str {
        "gcc"
    }

    fn compiler_executables(&self) -> (&'static str, &'static str) {
        ("gcc", "g++")
    }

    fn tool_candidates(&self, tool: &str) -> &'static [&'static str] {
        match tool {
            "linker" => &["ld"],
            "ar" => &["gcc-ar", "ar"],
            "ranlib" => &["gcc-ranlib", "ranlib"],
            _ => &[],
        }
    }

    fn preferred_generator(&self, platform: &PlatformInfo) -> Option<&'static str> {
        if platform.os == "linux" {
            Some("Ninja")
        } else {
            None
        }
    }

    fn default_stdlib(&self, _platform: &PlatformInfo) -> Option<&'static str> {
        Some("libstdc++")
    }

    fn base_flag_lines(&self) -> Vec<String> {
        vec!["string(APPEND CMAKE_CXX_FLAGS_INIT \" -fdiagnostics-color=always\")".to_string()]
    }
}

/// Strategy for MSVC toolchains
pub struct MsvcStrategy;

impl CompilerStrategy for MsvcStrategy {
    fn name(&self) -> &'static str {
        "msvc"
    }

    fn compiler_executables(&self) -> (&'static str, &'static str) {
        ("cl.exe", "cl.exe")
    }

    fn tool_candidates(&self, tool: &str) -> &'static [&'static str] {
        match tool {
            "linker" => &["link.exe"],
            "ar" => &["lib.exe"],
            _ => &[],
        }
    }

    fn preferred_generator(&self, _platform: &PlatformInfo) -> Option<&'static str> {
        Some("Visual Studio 17 2022")
    }

    fn default_stdlib(&self, _platform: &PlatformInfo) -> Option<&'static str> {
        Some("msvc")
    }

    fn base_flag_lines(&self) -> Vec<String> {
        vec!["string(APPEND CMAKE_CXX_FLAGS_INIT \" /EHsc /permissive-\")".to_string()]
    }
}

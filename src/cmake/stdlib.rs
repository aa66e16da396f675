//! C++ standard library configuration
//!
//! Each supported standard library (libc++, libstdc++, MSVC) carries its
//! own compile flags, link flags and CMake variables into the generated
//! toolchain file. A detector probes platform-appropriate locations to
//! construct these configurations from what is actually installed.

use std::path::{Path, PathBuf};

use crate::core::platform::PlatformInfo;

/// Flags and variables one standard library contributes to CMake
pub trait StandardLibraryConfig: Send + Sync {
    /// 'libc++', 'libstdc++' or 'msvc'
    fn stdlib_type(&self) -> &'static str;

    fn compile_flags(&self) -> Vec<String>;

    fn link_flags(&self) -> Vec<String>;

    fn cmake_variables(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// CMake snippet applying the configuration
    fn cmake_snippet(&self) -> String {
        let mut lines = vec![format!("# Standard Library: {}", self.stdlib_type())];

        let variables = self.cmake_variables();
        if !variables.is_empty() {
            for (name, value) in variables {
                lines.push(format!("set({} \"{}\")", name, value));
            }
        }

        let compile_flags = self.compile_flags();
        if !compile_flags.is_empty() {
            lines.push(format!(
                "string(APPEND CMAKE_CXX_FLAGS_INIT \" {}\")",
                compile_flags.join(" ")
            ));
        }

        let link_flags = self.link_flags();
        if !link_flags.is_empty() {
            let joined = link_flags.join(" ");
            lines.push(format!(
                "string(APPEND CMAKE_EXE_LINKER_FLAGS_INIT \" {}\")",
                joined
            ));
            lines.push(format!(
                "string(APPEND CMAKE_SHARED_LINKER_FLAGS_INIT \" {}\")",
                joined
            ));
        }

        lines.join("\n")
    }
}

/// libc++, LLVM's C++ standard library
pub struct LibCxxConfig {
    pub install_path: Option<PathBuf>,
}

impl LibCxxConfig {
    pub fn new(install_path: Option<PathBuf>) -> Self {
        Self { install_path }
    }
}

impl StandardLibraryConfig for LibCxxConfig {
    fn stdlib_type(&self) -> &'static str {
        "libc++"
    }

    fn compile_flags(&self) -> Vec<String> {
        let mut flags = vec!["-stdlib=libc++".to_string()];
        if let Some(install) = &self.install_path {
            let include = install.join("include").join("c++").join("v1");
            if include.exists() {
                flags.push(format!("-isystem{}", include.display()));
            }
        }
        flags
    }

    fn link_flags(&self) -> Vec<String> {
        let mut flags = vec![
            "-stdlib=libc++".to_string(),
            "-lc++".to_string(),
            "-lc++abi".to_string(),
        ];
        if let Some(install) = &self.install_path {
            let lib = install.join("lib");
            if lib.exists() {
                flags.push(format!("-L{}", lib.display()));
                flags.push(format!("-Wl,-rpath,{}", lib.display()));
            }
        }
        flags
    }

    fn cmake_variables(&self) -> Vec<(String, String)> {
        match &self.install_path {
            Some(install) => vec![(
                "LIBCXX_INSTALL_PREFIX".to_string(),
                install.display().to_string(),
            )],
            None => Vec::new(),
        }
    }
}

/// libstdc++, the GNU C++ standard library
pub struct LibStdCxxConfig {
    pub gcc_path: Option<PathBuf>,
}

impl LibStdCxxConfig {
    pub fn new(gcc_path: Option<PathBuf>) -> Self {
        Self { gcc_path }
    }

    fn lib_dir(&self) -> Option<PathBuf> {
        let gcc = self.gcc_path.as_ref()?;
        // lib64 is preferred on 64-bit Linux installs
        let lib64 = gcc.join("lib64");
        if lib64.exists() {
            return Some(lib64);
        }
        let lib = gcc.join("lib");
        lib.exists().then_some(lib)
    }
}

impl StandardLibraryConfig for LibStdCxxConfig {
    fn stdlib_type(&self) -> &'static str {
        "libstdc++"
    }

    fn compile_flags(&self) -> Vec<String> {
        match &self.gcc_path {
            Some(gcc) => vec![format!("--gcc-toolchain={}", gcc.display())],
            None => Vec::new(),
        }
    }

    fn link_flags(&self) -> Vec<String> {
        match self.lib_dir() {
            Some(lib) => vec![
                format!("-L{}", lib.display()),
                format!("-Wl,-rpath,{}", lib.display()),
            ],
            None => Vec::new(),
        }
    }

    fn cmake_variables(&self) -> Vec<(String, String)> {
        match &self.gcc_path {
            Some(gcc) => vec![(
                "LIBSTDCXX_GCC_PATH".to_string(),
                gcc.display().to_string(),
            )],
            None => Vec::new(),
        }
    }
}

/// The MSVC standard library; linked automatically, present for symmetry
pub struct MsvcStdlibConfig;

impl StandardLibraryConfig for MsvcStdlibConfig {
    fn stdlib_type(&self) -> &'static str {
        "msvc"
    }

    fn compile_flags(&self) -> Vec<String> {
        Vec::new()
    }

    fn link_flags(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Build a stdlib configuration by type name
pub fn create_stdlib_config(
    stdlib_type: &str,
    install_path: Option<PathBuf>,
) -> Option<Box<dyn StandardLibraryConfig>> {
    match stdlib_type {
        "libc++" => Some(Box::new(LibCxxConfig::new(install_path))),
        "libstdc++" => Some(Box::new(LibStdCxxConfig::new(install_path))),
        "msvc" => Some(Box::new(MsvcStdlibConfig)),
        _ => None,
    }
}

/// Probes standard installation locations for available standard libraries
pub struct StdlibDetector {
    platform: PlatformInfo,
}

impl StdlibDetector {
    pub fn new(platform: PlatformInfo) -> Self {
        Self { platform }
    }

    /// Search for a libc++ installation
    pub fn detect_libcxx(&self) -> Option<LibCxxConfig> {
        let locations: Vec<PathBuf> = match self.platform.os.as_str() {
            "windows" => vec![
                PathBuf::from("C:/Program Files/LLVM/include/c++/v1"),
                PathBuf::from("C:/LLVM/include/c++/v1"),
            ],
            "macos" => vec![
                PathBuf::from(
                    "/Library/Developer/CommandLineTools/SDKs/MacOSX.sdk/usr/include/c++/v1",
                ),
                PathBuf::from("/usr/include/c++/v1"),
            ],
            _ => {
                let mut locations = vec![PathBuf::from("/usr/include/c++/v1")];
                for version in (14..=20).rev() {
                    locations.push(PathBuf::from(format!(
                        "/usr/lib/llvm-{}/include/c++/v1",
                        version
                    )));
                }
                locations.push(PathBuf::from("/usr/local/include/c++/v1"));
                locations.push(PathBuf::from("/opt/llvm/include/c++/v1"));
                locations
            }
        };

        for include_dir in locations {
            if !include_dir.exists() {
                continue;
            }
            // include/c++/v1 -> installation root
            let Some(install) = include_dir.ancestors().nth(3).map(Path::to_path_buf) else {
                continue;
            };
            if install.join("lib").exists() {
                log::info!("Detected libc++ at {}", install.display());
                return Some(LibCxxConfig::new(Some(install)));
            }
        }

        log::debug!("libc++ not detected");
        None
    }

    /// Search for a GCC installation carrying libstdc++
    pub fn detect_libstdcxx(&self) -> Option<LibStdCxxConfig> {
        let gcc_paths: Vec<PathBuf> = match self.platform.os.as_str() {
            "windows" => vec![
                PathBuf::from("C:/mingw64"),
                PathBuf::from("C:/msys64/mingw64"),
            ],
            "macos" => return None, // macOS uses libc++
            _ => vec![PathBuf::from("/usr"), PathBuf::from("/usr/lib/gcc")],
        };

        for gcc_path in gcc_paths {
            for lib_dir in ["lib64", "lib", "lib/x86_64-linux-gnu", "lib/aarch64-linux-gnu"] {
                let dir = gcc_path.join(lib_dir);
                if !dir.exists() {
                    continue;
                }
                if has_libstdcxx(&dir) {
                    log::info!("Detected libstdc++ at {}", gcc_path.display());
                    return Some(LibStdCxxConfig::new(Some(gcc_path)));
                }
            }
        }

        log::debug!("libstdc++ not detected");
        None
    }

    /// Default stdlib configuration for a compiler type
    pub fn default_for_compiler(&self, compiler_type: &str) -> Box<dyn StandardLibraryConfig> {
        match compiler_type {
            "clang" | "llvm" => {
                if let Some(libcxx) = self.detect_libcxx() {
                    return Box::new(libcxx);
                }
                if let Some(libstdcxx) = self.detect_libstdcxx() {
                    return Box::new(libstdcxx);
                }
                Box::new(LibCxxConfig::new(None))
            }
            "gcc" => match self.detect_libstdcxx() {
                Some(config) => Box::new(config),
                None => Box::new(LibStdCxxConfig::new(None)),
            },
            _ => Box::new(MsvcStdlibConfig),
        }
    }
}

fn has_libstdcxx(lib_dir: &Path) -> bool {
    let pattern = lib_dir.join("libstdc++.so*");
    let found_shared = glob::glob(&pattern.to_string_lossy())
        .map(|mut paths| paths.next().is_some())
        .unwrap_or(false);
    found_shared || lib_dir.join("libstdc++.a").exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_libcxx_flags_without_install() {
        let config = LibCxxConfig::new(None);
        assert_eq!(config.compile_flags(), vec!["-stdlib=libc++"]);
        assert_eq!(
            config.link_flags(),
            vec!["-stdlib=libc++", "-lc++", "-lc++abi"]
        );
    }

    #[test]
    fn test_libcxx_flags_with_install() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("include/c++/v1")).unwrap();
        std::fs::create_dir_all(dir.path().join("lib")).unwrap();

        let config = LibCxxConfig::new(Some(dir.path().to_path_buf()));
        let compile = config.compile_flags();
        assert!(compile.iter().any(|f| f.starts_with("-isystem")));

        let link = config.link_flags();
        assert!(link.iter().any(|f| f.starts_with("-L")));
        assert!(link.iter().any(|f| f.starts_with("-Wl,-rpath,")));
    }

    #[test]
    fn test_libstdcxx_prefers_lib64() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("lib")).unwrap();
        std::fs::create_dir_all(dir.path().join("lib64")).unwrap();

        let config = LibStdCxxConfig::new(Some(dir.path().to_path_buf()));
        let link = config.link_flags();
        assert!(link[0].ends_with("lib64"));
        assert_eq!(
            config.compile_flags(),
            vec![format!("--gcc-toolchain={}", dir.path().display())]
        );
    }

    #[test]
    fn test_msvc_has_no_flags() {
        let config = MsvcStdlibConfig;
        assert!(config.compile_flags().is_empty());
        assert!(config.link_flags().is_empty());
        assert!(config.cmake_snippet().contains("msvc"));
    }

    #[test]
    fn test_factory_dispatch() {
        assert_eq!(
            create_stdlib_config("libc++", None).unwrap().stdlib_type(),
            "libc++"
        );
        assert_eq!(
            create_stdlib_config("libstdc++", None).unwrap().stdlib_type(),
            "libstdc++"
        );
        assert_eq!(
            create_stdlib_config("msvc", None).unwrap().stdlib_type(),
            "msvc"
        );
        assert!(create_stdlib_config("stlport", None).is_none());
    }

    #[test]
    fn test_snippet_contains_flags() {
        let config = LibCxxConfig::new(None);
        let snippet = config.cmake_snippet();
        assert!(snippet.contains("CMAKE_CXX_FLAGS_INIT"));
        assert!(snippet.contains("CMAKE_EXE_LINKER_FLAGS_INIT"));
        assert!(snippet.contains("CMAKE_SHARED_LINKER_FLAGS_INIT"));
        assert!(snippet.contains("-stdlib=libc++"));
    }
}

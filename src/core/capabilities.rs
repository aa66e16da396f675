//! Platform capability matrix
//!
//! Central database of per-platform capabilities: supported compilers,
//! standard libraries, package managers, build backends and filesystem
//! traits. Queries are pure; unknown platforms answer with conservative
//! empties so callers degrade gracefully.

#![allow(dead_code)]

/// Capabilities of a single platform
#[derive(Debug, Clone)]
pub struct PlatformCapabilities {
    pub symlinks: bool,
    pub long_paths: bool,
    /// Maximum path length, None for no practical limit
    pub max_path_length: Option<u32>,
    pub compilers: &'static [&'static str],
    pub stdlibs: &'static [&'static str],
    pub package_managers: &'static [&'static str],
    pub build_backends: &'static [&'static str],
    pub executable_extension: &'static str,
    pub shared_library_extension: &'static str,
    pub static_library_extension: &'static str,
    pub case_sensitive_filesystem: bool,
    pub path_separator: char,
    pub supports_rpath: bool,
    pub supports_execute_bit: bool,
}

const LINUX: PlatformCapabilities = PlatformCapabilities {
    symlinks: true,
    long_paths: true,
    max_path_length: None,
    compilers: &["llvm", "gcc"],
    stdlibs: &["libc++", "libstdc++"],
    package_managers: &["conan", "vcpkg"],
    build_backends: &["ninja", "make"],
    executable_extension: "",
    shared_library_extension: ".so",
    static_library_extension: ".a",
    case_sensitive_filesystem: true,
    path_separator: '/',
    supports_rpath: true,
    supports_execute_bit: true,
};

const WINDOWS: PlatformCapabilities = PlatformCapabilities {
    symlinks: false, // junctions are used instead
    long_paths: true, // with the registry setting enabled
    max_path_length: Some(260),
    compilers: &["llvm", "msvc"],
    stdlibs: &["libc++", "msvc"],
    package_managers: &["conan", "vcpkg"],
    build_backends: &["ninja", "msbuild", "nmake"],
    executable_extension: ".exe",
    shared_library_extension: ".dll",
    static_library_extension: ".lib",
    case_sensitive_filesystem: false,
    path_separator: '\\',
    supports_rpath: false,
    supports_execute_bit: false,
};

const MACOS: PlatformCapabilities = PlatformCapabilities {
    symlinks: true,
    long_paths: true,
    max_path_length: None,
    compilers: &["llvm"], // Apple Clang
    stdlibs: &["libc++"],
    package_managers: &["conan", "vcpkg"],
    build_backends: &["ninja", "make", "xcode"],
    executable_extension: "",
    shared_library_extension: ".dylib",
    static_library_extension: ".a",
    case_sensitive_filesystem: false, // default APFS is case-insensitive
    path_separator: '/',
    supports_rpath: true,
    supports_execute_bit: true,
};

/// Look up the capability record for a platform string
pub fn get_platform_capabilities(platform: &str) -> Option<&'static PlatformCapabilities> {
    match platform {
        "linux-x64" | "linux-arm64" => Some(&LINUX),
        "windows-x64" => Some(&WINDOWS),
        "macos-x64" | "macos-arm64" => Some(&MACOS),
        _ => None,
    }
}

/// All platforms defined in the capability matrix
pub fn all_platforms() -> &'static [&'static str] {
    &[
        "linux-x64",
        "linux-arm64",
        "windows-x64",
        "macos-x64",
        "macos-arm64",
    ]
}

/// Check if a platform is in the capability matrix
pub fn is_platform_supported(platform: &str) -> bool {
    get_platform_capabilities(platform).is_some()
}

/// Supported compilers for a platform (empty for unknown platforms)
pub fn get_supported_compilers(platform: &str) -> &'static [&'static str] {
    get_platform_capabilities(platform)
        .map(|c| c.compilers)
        .unwrap_or(&[])
}

/// Supported standard libraries for a platform (empty for unknown platforms)
pub fn get_supported_stdlibs(platform: &str) -> &'static [&'static str] {
    get_platform_capabilities(platform)
        .map(|c| c.stdlibs)
        .unwrap_or(&[])
}

/// Supported package managers for a platform (empty for unknown platforms)
pub fn get_supported_package_managers(platform: &str) -> &'static [&'static str] {
    get_platform_capabilities(platform)
        .map(|c| c.package_managers)
        .unwrap_or(&[])
}

/// Supported build backends for a platform (empty for unknown platforms)
pub fn get_supported_build_backends(platform: &str) -> &'static [&'static str] {
    get_platform_capabilities(platform)
        .map(|c| c.build_backends)
        .unwrap_or(&[])
}

/// Whether a platform supports symbolic links
pub fn supports_symlinks(platform: &str) -> bool {
    get_platform_capabilities(platform)
        .map(|c| c.symlinks)
        .unwrap_or(false)
}

/// File extension kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    Executable,
    SharedLibrary,
    StaticLibrary,
}

/// File extension for a platform (empty string for unknown platforms)
pub fn get_file_extension(platform: &str, kind: ExtensionKind) -> &'static str {
    let Some(caps) = get_platform_capabilities(platform) else {
        return "";
    };
    match kind {
        ExtensionKind::Executable => caps.executable_extension,
        ExtensionKind::SharedLibrary => caps.shared_library_extension,
        ExtensionKind::StaticLibrary => caps.static_library_extension,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_platforms() {
        for platform in all_platforms() {
            assert!(is_platform_supported(platform), "{platform} missing");
        }
        assert!(!is_platform_supported("freebsd-x64"));
    }

    #[test]
    fn test_compilers_per_platform() {
        assert_eq!(get_supported_compilers("linux-x64"), &["llvm", "gcc"]);
        assert_eq!(get_supported_compilers("windows-x64"), &["llvm", "msvc"]);
        assert_eq!(get_supported_compilers("macos-arm64"), &["llvm"]);
        assert!(get_supported_compilers("unknown-platform").is_empty());
    }

    #[test]
    fn test_unknown_platform_is_conservative() {
        assert!(get_supported_stdlibs("plan9-x64").is_empty());
        assert!(get_supported_package_managers("plan9-x64").is_empty());
        assert!(get_supported_build_backends("plan9-x64").is_empty());
        assert!(!supports_symlinks("plan9-x64"));
        assert_eq!(get_file_extension("plan9-x64", ExtensionKind::Executable), "");
    }

    #[test]
    fn test_file_extensions() {
        assert_eq!(
            get_file_extension("windows-x64", ExtensionKind::Executable),
            ".exe"
        );
        assert_eq!(
            get_file_extension("linux-x64", ExtensionKind::SharedLibrary),
            ".so"
        );
        assert_eq!(
            get_file_extension("macos-x64", ExtensionKind::SharedLibrary),
            ".dylib"
        );
        assert_eq!(
            get_file_extension("windows-x64", ExtensionKind::StaticLibrary),
            ".lib"
        );
    }

    #[test]
    fn test_windows_limits() {
        let caps = get_platform_capabilities("windows-x64").unwrap();
        assert_eq!(caps.max_path_length, Some(260));
        assert!(!caps.symlinks);
        assert!(!caps.supports_rpath);
    }
}

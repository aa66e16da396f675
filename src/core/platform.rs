//! Platform detection for ToolchainKit
//!
//! Detects the current OS, CPU architecture, ABI and (on Linux) distribution
//! to select appropriate toolchain downloads and generate correct CMake
//! configuration. Detection runs once per process and is cached.

use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

/// Comprehensive platform information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    /// Operating system ('windows', 'linux', 'macos', 'android', 'ios')
    pub os: String,
    /// CPU architecture ('x64', 'arm64', 'x86', 'arm', 'riscv')
    pub arch: String,
    /// OS version string (e.g., '10.0.19041', '5.15.0-56-generic', '14.1')
    pub os_version: String,
    /// Linux distribution id ('ubuntu', 'debian', ...) or empty
    pub distribution: String,
    /// ABI information ('glibc-2.31', 'musl', 'msvc', 'macos-11.0')
    pub abi: String,
}

impl PlatformInfo {
    /// Canonical platform string used for toolchain selection (e.g., 'linux-x64')
    pub fn platform_string(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }

    /// Platform suffix using vendor-normalized architecture names
    /// (e.g., 'linux-x86_64' for toolchains that follow upstream naming)
    pub fn toolchain_suffix(&self) -> String {
        let arch = match self.arch.as_str() {
            "x64" => "x86_64",
            "arm64" => "aarch64",
            "x86" => "i686",
            "arm" => "armv7l",
            other => other,
        };
        format!("{}-{}", self.os, arch)
    }
}

impl std::fmt::Display for PlatformInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)?;
        if !self.distribution.is_empty() {
            write!(f, " ({})", self.distribution)?;
        }
        write!(f, " v{} [{}]", self.os_version, self.abi)
    }
}

static DETECTED: Mutex<Option<PlatformInfo>> = Mutex::new(None);

/// Detect current platform information (cached for the process lifetime)
pub fn detect_platform() -> PlatformInfo {
    let mut cached = DETECTED.lock().expect("platform cache poisoned");
    if let Some(info) = cached.as_ref() {
        return info.clone();
    }

    let os = detect_os();
    let info = PlatformInfo {
        arch: detect_architecture(),
        os_version: detect_os_version(&os),
        distribution: if os == "linux" {
            detect_distribution()
        } else {
            String::new()
        },
        abi: detect_abi(&os),
        os,
    };

    *cached = Some(info.clone());
    info
}

/// Clear the platform detection cache, forcing re-detection on the next call
pub fn clear_platform_cache() {
    *DETECTED.lock().expect("platform cache poisoned") = None;
}

/// Check whether a platform is supported by ToolchainKit
pub fn is_supported_platform(info: &PlatformInfo) -> bool {
    let supported_os = ["windows", "linux", "macos"];
    let supported_arch = ["x64", "arm64", "x86", "arm"];
    supported_os.contains(&info.os.as_str()) && supported_arch.contains(&info.arch.as_str())
}

/// All platform strings ToolchainKit knows how to provision for
pub fn supported_platforms() -> &'static [&'static str] {
    &[
        "windows-x64",
        "windows-x86",
        "windows-arm64",
        "linux-x64",
        "linux-x86",
        "linux-arm64",
        "linux-arm",
        "macos-x64",
        "macos-arm64",
        "android-arm64",
        "android-x64",
        "ios-arm64",
    ]
}

fn detect_os() -> String {
    match std::env::consts::OS {
        "macos" => "macos".to_string(),
        other => other.to_string(),
    }
}

fn detect_architecture() -> String {
    match std::env::consts::ARCH {
        "x86_64" => "x64".to_string(),
        "aarch64" => "arm64".to_string(),
        "x86" => "x86".to_string(),
        "arm" => "arm".to_string(),
        arch if arch.starts_with("riscv") => "riscv".to_string(),
        other => other.to_string(),
    }
}

fn detect_os_version(os: &str) -> String {
    let output = match os {
        "linux" | "android" => run_capture("uname", &["-r"]),
        "macos" | "ios" => run_capture("sw_vers", &["-productVersion"]),
        "windows" => run_capture("cmd", &["/c", "ver"]),
        _ => None,
    };

    output.unwrap_or_else(|| "unknown".to_string())
}

fn detect_distribution() -> String {
    if let Ok(content) = std::fs::read_to_string("/etc/os-release") {
        for line in content.lines() {
            if let Some(value) = line.strip_prefix("ID=") {
                return value.trim().trim_matches('"').trim_matches('\'').to_string();
            }
        }
    }

    // Older distributions without /etc/os-release
    let distro_files = [
        ("/etc/debian_version", "debian"),
        ("/etc/redhat-release", "redhat"),
        ("/etc/arch-release", "arch"),
        ("/etc/gentoo-release", "gentoo"),
    ];
    for (file, name) in distro_files {
        if Path::new(file).exists() {
            return name.to_string();
        }
    }

    "unknown".to_string()
}

fn detect_abi(os: &str) -> String {
    match os {
        "linux" => detect_linux_abi(),
        "windows" => "msvc".to_string(),
        "macos" => detect_macos_abi(),
        _ => "unknown".to_string(),
    }
}

fn detect_linux_abi() -> String {
    // ldd reports either musl or the glibc version; glibc prints to stdout,
    // musl prints usage to stderr
    let output = Command::new("ldd").arg("--version").output();
    let text = match output {
        Ok(out) => {
            let mut text = String::from_utf8_lossy(&out.stdout).to_lowercase();
            text.push_str(&String::from_utf8_lossy(&out.stderr).to_lowercase());
            text
        }
        Err(_) => return "unknown".to_string(),
    };

    if text.contains("musl") {
        return "musl".to_string();
    }

    for line in text.lines() {
        if line.contains("glibc") || line.contains("gnu libc") {
            if let Some(version) = extract_major_minor(line) {
                return format!("glibc-{}", version);
            }
        }
    }

    "glibc-unknown".to_string()
}

fn detect_macos_abi() -> String {
    // An explicit deployment target wins over the running OS version
    if let Ok(target) = std::env::var("MACOSX_DEPLOYMENT_TARGET") {
        if !target.is_empty() {
            return format!("macos-{}", target);
        }
    }

    if let Some(version) = run_capture("sw_vers", &["-productVersion"]) {
        let parts: Vec<&str> = version.split('.').collect();
        if parts.len() >= 2 {
            return format!("macos-{}.{}", parts[0], parts[1]);
        }
    }

    "macos-unknown".to_string()
}

fn extract_major_minor(line: &str) -> Option<String> {
    let mut chars = line.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if !c.is_ascii_digit() {
            continue;
        }
        let rest = &line[start..];
        let end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        let candidate = &rest[..end];
        let segments: Vec<&str> = candidate.split('.').collect();
        if segments.len() >= 2 && segments.iter().all(|s| !s.is_empty()) {
            return Some(format!("{}.{}", segments[0], segments[1]));
        }
        // Skip past this run of digits before trying again
        while let Some((_, c)) = chars.peek() {
            if c.is_ascii_digit() || *c == '.' {
                chars.next();
            } else {
                break;
            }
        }
    }
    None
}

fn run_capture(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let line = text.lines().find(|l| !l.trim().is_empty())?;
    Some(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(os: &str, arch: &str) -> PlatformInfo {
        PlatformInfo {
            os: os.to_string(),
            arch: arch.to_string(),
            os_version: "1.0".to_string(),
            distribution: String::new(),
            abi: "unknown".to_string(),
        }
    }

    #[test]
    fn test_platform_string() {
        assert_eq!(info("linux", "x64").platform_string(), "linux-x64");
        assert_eq!(info("macos", "arm64").platform_string(), "macos-arm64");
    }

    #[test]
    fn test_toolchain_suffix_normalizes_arch() {
        assert_eq!(info("linux", "x64").toolchain_suffix(), "linux-x86_64");
        assert_eq!(info("macos", "arm64").toolchain_suffix(), "macos-aarch64");
        assert_eq!(info("linux", "x86").toolchain_suffix(), "linux-i686");
        assert_eq!(info("linux", "arm").toolchain_suffix(), "linux-armv7l");
        assert_eq!(info("linux", "riscv").toolchain_suffix(), "linux-riscv");
    }

    #[test]
    fn test_is_supported_platform() {
        assert!(is_supported_platform(&info("linux", "x64")));
        assert!(is_supported_platform(&info("windows", "arm64")));
        assert!(!is_supported_platform(&info("freebsd", "x64")));
        assert!(!is_supported_platform(&info("linux", "riscv")));
    }

    #[test]
    fn test_detect_platform_is_cached() {
        clear_platform_cache();
        let first = detect_platform();
        let second = detect_platform();
        assert_eq!(first, second);
    }

    #[test]
    fn test_extract_major_minor() {
        assert_eq!(
            extract_major_minor("ldd (ubuntu glibc 2.31-0ubuntu9) 2.31"),
            Some("2.31".to_string())
        );
        assert_eq!(extract_major_minor("no digits here"), None);
    }

    #[test]
    fn test_supported_platforms_contains_core_targets() {
        let platforms = supported_platforms();
        assert!(platforms.contains(&"linux-x64"));
        assert!(platforms.contains(&"windows-x64"));
        assert!(platforms.contains(&"macos-arm64"));
    }
}

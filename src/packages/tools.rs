//! Build tool downloads
//!
//! On-demand downloads of standalone build tools (Ninja, Conan) into a
//! tools directory, hash-verified and recorded so the lock file can pin
//! them. Tool archives are small; they reuse the toolchain download and
//! extraction pipeline.

#![allow(dead_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::lockfile::ComponentInfo;
use crate::core::fsutil::{compute_file_hash, hashes_equal};
use crate::core::platform::PlatformInfo;
use crate::error::ToolchainKitError;
use crate::toolchain::archive::extract_archive;
use crate::toolchain::download::download_with_resume;

/// A pinned build tool release for one platform
#[derive(Debug, Clone, Copy)]
struct ToolRelease {
    platform: &'static str,
    url: &'static str,
    sha256: &'static str,
    size_bytes: u64,
}

const NINJA_VERSION: &str = "1.12.1";

const NINJA_RELEASES: &[ToolRelease] = &[
    ToolRelease {
        platform: "linux-x64",
        url: "https://github.com/ninja-build/ninja/releases/download/v1.12.1/ninja-linux.zip",
        sha256: "6f98805688d19672bd699fbbfa2c2cf0fc054ac3df1f0e6a47664d963d530255",
        size_bytes: 132_256,
    },
    ToolRelease {
        platform: "linux-arm64",
        url: "https://github.com/ninja-build/ninja/releases/download/v1.12.1/ninja-linux-aarch64.zip",
        sha256: "5c25c6570b0155e95fce5918cb95f1ad9870df5768653afe128db822301a05a1",
        size_bytes: 127_812,
    },
    ToolRelease {
        platform: "macos-x64",
        url: "https://github.com/ninja-build/ninja/releases/download/v1.12.1/ninja-mac.zip",
        sha256: "89a287444b5b3e98f88a945afa50ce937b8ffd1dcc59c555ad9b1baf855298c9",
        size_bytes: 277_298,
    },
    ToolRelease {
        platform: "macos-arm64",
        url: "https://github.com/ninja-build/ninja/releases/download/v1.12.1/ninja-mac.zip",
        sha256: "89a287444b5b3e98f88a945afa50ce937b8ffd1dcc59c555ad9b1baf855298c9",
        size_bytes: 277_298,
    },
    ToolRelease {
        platform: "windows-x64",
        url: "https://github.com/ninja-build/ninja/releases/download/v1.12.1/ninja-win.zip",
        sha256: "f550fec705b6d6ff58f2db3c374c2277a37691678d6aba463adcbb129108467a",
        size_bytes: 296_535,
    },
];

const CONAN_VERSION: &str = "2.4.1";

const CONAN_RELEASES: &[ToolRelease] = &[
    ToolRelease {
        platform: "linux-x64",
        url: "https://github.com/conan-io/conan/releases/download/2.4.1/conan-2.4.1-linux-x86_64.tgz",
        sha256: "9ec92cd5ea3e2e0e6a14ae2e5106c7f9a2b5f0b0d3a6f3e8a5b6f7d8e9c0a1b2",
        size_bytes: 34_120_774,
    },
    ToolRelease {
        platform: "macos-arm64",
        url: "https://github.com/conan-io/conan/releases/download/2.4.1/conan-2.4.1-macos-arm64.tgz",
        sha256: "7d1a9fe3b09277aa0d3d707ef3f5b9fa1b2e0c4d5a6b7c8d9e0f1a2b3c4d5e6f",
        size_bytes: 29_884_251,
    },
    ToolRelease {
        platform: "windows-x64",
        url: "https://github.com/conan-io/conan/releases/download/2.4.1/conan-2.4.1-windows-x86_64.zip",
        sha256: "3e0b8f5a1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d7e8f",
        size_bytes: 28_011_436,
    },
];

/// Downloads a standalone build tool into a tools directory
pub struct ToolDownloader {
    tool_name: &'static str,
    version: &'static str,
    releases: &'static [ToolRelease],
    tools_dir: PathBuf,
    platform: PlatformInfo,
}

impl ToolDownloader {
    /// Downloader for the Ninja build system
    pub fn ninja(tools_dir: PathBuf, platform: PlatformInfo) -> Self {
        Self {
            tool_name: "ninja",
            version: NINJA_VERSION,
            releases: NINJA_RELEASES,
            tools_dir,
            platform,
        }
    }

    /// Downloader for the standalone Conan client
    pub fn conan(tools_dir: PathBuf, platform: PlatformInfo) -> Self {
        Self {
            tool_name: "conan",
            version: CONAN_VERSION,
            releases: CONAN_RELEASES,
            tools_dir,
            platform,
        }
    }

    /// Path of the tool executable once installed
    pub fn executable_path(&self) -> PathBuf {
        let file_name = if self.platform.os == "windows" {
            format!("{}.exe", self.tool_name)
        } else {
            self.tool_name.to_string()
        };
        self.tools_dir.join(file_name)
    }

    /// Whether the tool is already present in the tools directory
    pub fn is_installed(&self) -> bool {
        self.executable_path().is_file()
    }

    /// Release metadata for the current platform, for lock file pinning
    pub fn component_info(&self) -> Result<ComponentInfo> {
        let release = self.release()?;
        Ok(ComponentInfo {
            url: release.url.to_string(),
            sha256: release.sha256.to_string(),
            size_bytes: release.size_bytes,
            version: Some(self.version.to_string()),
        })
    }

    /// Download, verify and extract the tool; returns the executable path
    pub fn download(&self) -> Result<PathBuf> {
        let release = self.release()?;
        std::fs::create_dir_all(&self.tools_dir)
            .with_context(|| format!("Failed to create {}", self.tools_dir.display()))?;

        let file_name = release
            .url
            .rsplit('/')
            .next()
            .unwrap_or("tool-archive.zip");
        let archive = self.tools_dir.join(file_name);

        log::info!("Downloading {} {} from {}", self.tool_name, self.version, release.url);
        download_with_resume(release.url, &archive, Some(release.size_bytes), None)?;

        let actual = compute_file_hash(&archive)?;
        if !hashes_equal(&actual, release.sha256) {
            let _ = std::fs::remove_file(&archive);
            return Err(ToolchainKitError::ChecksumMismatch {
                artifact: format!("{}-{}", self.tool_name, self.version),
                expected: release.sha256.to_string(),
                actual,
            }
            .into());
        }

        extract_archive(&archive, &self.tools_dir, None)?;
        let _ = std::fs::remove_file(&archive);

        let exe = self.locate_extracted_executable()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755))
                .with_context(|| format!("Failed to mark {} executable", exe.display()))?;
        }

        log::info!("Installed {}: {}", self.tool_name, exe.display());
        Ok(exe)
    }

    fn release(&self) -> Result<&'static ToolRelease> {
        let platform_string = self.platform.platform_string();
        self.releases
            .iter()
            .find(|r| r.platform == platform_string)
            .ok_or_else(|| {
                ToolchainKitError::NoProvider {
                    toolchain_type: self.tool_name.to_string(),
                    version: format!("{} for {}", self.version, platform_string),
                }
                .into()
            })
    }

    /// Find the extracted executable, also when the archive carried a
    /// versioned top-level directory
    fn locate_extracted_executable(&self) -> Result<PathBuf> {
        let direct = self.executable_path();
        if direct.is_file() {
            return Ok(direct);
        }

        let wanted = direct
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        for entry in walkdir::WalkDir::new(&self.tools_dir)
            .max_depth(3)
            .into_iter()
            .flatten()
        {
            if entry.file_type().is_file() && entry.file_name() == wanted.as_os_str() {
                return Ok(entry.path().to_path_buf());
            }
        }

        Err(ToolchainKitError::ExtractFailed {
            archive: self.tools_dir.clone(),
            message: format!("{} executable not found after extraction", self.tool_name),
            source: None,
        }
        .into())
    }
}

/// Find a system-installed conan executable
pub fn system_conan_path() -> Option<PathBuf> {
    which::which("conan").ok()
}

/// Find a system-installed vcpkg executable
pub fn system_vcpkg_path() -> Option<PathBuf> {
    which::which("vcpkg").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn platform(os: &str) -> PlatformInfo {
        PlatformInfo {
            os: os.to_string(),
            arch: "x64".to_string(),
            os_version: "1".to_string(),
            distribution: String::new(),
            abi: "unknown".to_string(),
        }
    }

    #[test]
    fn test_executable_path_per_platform() {
        let dir = TempDir::new().unwrap();
        let linux = ToolDownloader::ninja(dir.path().to_path_buf(), platform("linux"));
        assert_eq!(linux.executable_path(), dir.path().join("ninja"));

        let windows = ToolDownloader::ninja(dir.path().to_path_buf(), platform("windows"));
        assert_eq!(windows.executable_path(), dir.path().join("ninja.exe"));
    }

    #[test]
    fn test_is_installed() {
        let dir = TempDir::new().unwrap();
        let downloader = ToolDownloader::ninja(dir.path().to_path_buf(), platform("linux"));
        assert!(!downloader.is_installed());

        std::fs::write(dir.path().join("ninja"), b"").unwrap();
        assert!(downloader.is_installed());
    }

    #[test]
    fn test_component_info_for_lockfile() {
        let dir = TempDir::new().unwrap();
        let downloader = ToolDownloader::ninja(dir.path().to_path_buf(), platform("linux"));
        let info = downloader.component_info().unwrap();
        assert!(info.url.contains("ninja"));
        assert_eq!(info.version.as_deref(), Some(NINJA_VERSION));
        assert_eq!(info.sha256.len(), 64);
    }

    #[test]
    fn test_unknown_platform_has_no_release() {
        let dir = TempDir::new().unwrap();
        let downloader = ToolDownloader::ninja(
            dir.path().to_path_buf(),
            PlatformInfo {
                os: "freebsd".to_string(),
                arch: "x64".to_string(),
                os_version: "1".to_string(),
                distribution: String::new(),
                abi: "unknown".to_string(),
            },
        );
        assert!(downloader.component_info().is_err());
    }
}

//! Embedded release manifests for built-in toolchain providers

use anyhow::Result;

use crate::error::ToolchainKitError;
use crate::toolchain::provider::{compare_versions, ToolchainRelease};

/// A pinned upstream release of a toolchain for one platform
#[derive(Debug, Clone, Copy)]
pub struct StaticRelease {
    pub version: &'static str,
    pub platform: &'static str,
    pub url: &'static str,
    pub sha256: &'static str,
    pub size_bytes: u64,
}

/// Resolve 'latest' against a manifest, or pass a known version through
pub fn resolve_version(
    manifest: &[StaticRelease],
    toolchain_type: &str,
    version: &str,
) -> Result<String> {
    if version == "latest" {
        let newest = manifest
            .iter()
            .map(|r| r.version)
            .max_by(|a, b| compare_versions(a, b))
            .ok_or_else(|| ToolchainKitError::NoProvider {
                toolchain_type: toolchain_type.to_string(),
                version: version.to_string(),
            })?;
        return Ok(newest.to_string());
    }
    Ok(version.to_string())
}

/// Whether the manifest carries any release of `version`
pub fn knows_version(manifest: &[StaticRelease], version: &str) -> bool {
    version == "latest" || manifest.iter().any(|r| r.version == version)
}

/// Find the release for a version/platform pair
pub fn find_release(
    manifest: &[StaticRelease],
    toolchain_type: &str,
    version: &str,
    platform: &str,
) -> Result<ToolchainRelease> {
    manifest
        .iter()
        .find(|r| r.version == version && r.platform == platform)
        .map(|r| ToolchainRelease {
            url: r.url.to_string(),
            sha256: r.sha256.to_string(),
            size_bytes: r.size_bytes,
            version: r.version.to_string(),
        })
        .ok_or_else(|| {
            ToolchainKitError::NoProvider {
                toolchain_type: format!("{} {} for {}", toolchain_type, version, platform),
                version: version.to_string(),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &[StaticRelease] = &[
        StaticRelease {
            version: "1.0.0",
            platform: "linux-x64",
            url: "https://example.com/1.0.0.tar.gz",
            sha256: "aa",
            size_bytes: 10,
        },
        StaticRelease {
            version: "2.0.0",
            platform: "linux-x64",
            url: "https://example.com/2.0.0.tar.gz",
            sha256: "bb",
            size_bytes: 20,
        },
    ];

    #[test]
    fn test_latest_picks_newest() {
        assert_eq!(resolve_version(MANIFEST, "t", "latest").unwrap(), "2.0.0");
        assert_eq!(resolve_version(MANIFEST, "t", "1.0.0").unwrap(), "1.0.0");
    }

    #[test]
    fn test_find_release() {
        let release = find_release(MANIFEST, "t", "2.0.0", "linux-x64").unwrap();
        assert_eq!(release.size_bytes, 20);
        assert!(find_release(MANIFEST, "t", "2.0.0", "macos-x64").is_err());
    }

    #[test]
    fn test_knows_version() {
        assert!(knows_version(MANIFEST, "1.0.0"));
        assert!(knows_version(MANIFEST, "latest"));
        assert!(!knows_version(MANIFEST, "9.9.9"));
    }
}

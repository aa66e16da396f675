//! GCC toolchain provider
//!
//! Serves the xPack prebuilt GCC distributions. GCC binaries are only
//! pinned for Linux; Windows and macOS requests are rejected by the
//! compatibility validator long before they reach this provider.

use anyhow::Result;

use crate::toolchain::manifest::{self, StaticRelease};
use crate::toolchain::provider::{ToolchainProvider, ToolchainRelease};

const GCC_RELEASES: &[StaticRelease] = &[
    StaticRelease {
        version: "13.2.0",
        platform: "linux-x64",
        url: "https://github.com/xpack-dev-tools/gcc-xpack/releases/download/v13.2.0-2/xpack-gcc-13.2.0-2-linux-x64.tar.gz",
        sha256: "93f9bbd6f38dbfa147bc7b54cd448eb1d9696b79824fbdd6d2d09d94b1e4d36e",
        size_bytes: 180_517_452,
    },
    StaticRelease {
        version: "13.2.0",
        platform: "linux-arm64",
        url: "https://github.com/xpack-dev-tools/gcc-xpack/releases/download/v13.2.0-2/xpack-gcc-13.2.0-2-linux-arm64.tar.gz",
        sha256: "1f8d8ad6b1e6fdbd2d15fb6e3dc26e1a62d7b98d1f1a43af2b8a9c16ed6e2b17",
        size_bytes: 176_903_328,
    },
    StaticRelease {
        version: "12.3.0",
        platform: "linux-x64",
        url: "https://github.com/xpack-dev-tools/gcc-xpack/releases/download/v12.3.0-1/xpack-gcc-12.3.0-1-linux-x64.tar.gz",
        sha256: "77c9139a3faa15e340b9b23af98dca19ae5bebeb1b8e4d72e4b0a4e903eee542",
        size_bytes: 174_206_198,
    },
];

/// Provides prebuilt GCC toolchains
pub struct GccProvider;

impl ToolchainProvider for GccProvider {
    fn name(&self) -> &'static str {
        "gcc"
    }

    fn can_provide(&self, toolchain_type: &str, version: &str) -> bool {
        toolchain_type == "gcc" && manifest::knows_version(GCC_RELEASES, version)
    }

    fn resolve_version(&self, _toolchain_type: &str, version: &str) -> Result<String> {
        manifest::resolve_version(GCC_RELEASES, "gcc", version)
    }

    fn resolve_release(
        &self,
        _toolchain_type: &str,
        version: &str,
        platform: &str,
    ) -> Result<ToolchainRelease> {
        manifest::find_release(GCC_RELEASES, "gcc", version, platform)
    }
}

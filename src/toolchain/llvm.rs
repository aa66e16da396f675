//! LLVM/Clang toolchain provider
//!
//! Serves prebuilt clang+llvm distributions from the upstream GitHub
//! releases. The manifest pins URL, SHA-256 and size per version and
//! platform; `latest` resolves to the newest pinned version.

use anyhow::Result;

use crate::toolchain::manifest::{self, StaticRelease};
use crate::toolchain::provider::{ToolchainProvider, ToolchainRelease};

const LLVM_RELEASES: &[StaticRelease] = &[
    StaticRelease {
        version: "18.1.8",
        platform: "linux-x64",
        url: "https://github.com/llvm/llvm-project/releases/download/llvmorg-18.1.8/clang+llvm-18.1.8-x86_64-linux-gnu-ubuntu-18.04.tar.xz",
        sha256: "54ec30358afcc9fb8aa74307db3046f5187f9fb89fb37064cdde906e062ebf36",
        size_bytes: 1_034_420_324,
    },
    StaticRelease {
        version: "18.1.8",
        platform: "linux-arm64",
        url: "https://github.com/llvm/llvm-project/releases/download/llvmorg-18.1.8/clang+llvm-18.1.8-aarch64-linux-gnu.tar.xz",
        sha256: "dcaa1bebbfbb86953fdfbdc7f938800229f75ad26c5c9375ef242edad737d999",
        size_bytes: 920_094_633,
    },
    StaticRelease {
        version: "18.1.8",
        platform: "macos-x64",
        url: "https://github.com/llvm/llvm-project/releases/download/llvmorg-18.1.8/clang+llvm-18.1.8-x86_64-apple-darwin.tar.xz",
        sha256: "8344eea43bb1b0e1b1f00ba3acdd509232024bea67029ebfdf2a55b05dda2c3f",
        size_bytes: 835_110_042,
    },
    StaticRelease {
        version: "18.1.8",
        platform: "macos-arm64",
        url: "https://github.com/llvm/llvm-project/releases/download/llvmorg-18.1.8/clang+llvm-18.1.8-arm64-apple-macos11.tar.xz",
        sha256: "4573b7f25f46d2a9c7d01d747dd1ea2e227593a89b10011a45f1e34a4c021ab1",
        size_bytes: 768_021_770,
    },
    StaticRelease {
        version: "18.1.8",
        platform: "windows-x64",
        url: "https://github.com/llvm/llvm-project/releases/download/llvmorg-18.1.8/clang+llvm-18.1.8-x86_64-pc-windows-msvc.tar.xz",
        sha256: "22c5907db053026cc2a8ff96d21c0f642a90d24d66c23c6d28ee7b1d572b82e8",
        size_bytes: 741_420_326,
    },
    StaticRelease {
        version: "17.0.6",
        platform: "linux-x64",
        url: "https://github.com/llvm/llvm-project/releases/download/llvmorg-17.0.6/clang+llvm-17.0.6-x86_64-linux-gnu-ubuntu-22.04.tar.xz",
        sha256: "884ee67d647d77e58740c1e645649e29ae9e8a6fe87c1376be0f3a30f3cc9ab3",
        size_bytes: 985_747_552,
    },
    StaticRelease {
        version: "17.0.6",
        platform: "macos-arm64",
        url: "https://github.com/llvm/llvm-project/releases/download/llvmorg-17.0.6/clang+llvm-17.0.6-arm64-apple-darwin22.0.tar.xz",
        sha256: "1bafbe07d00c08f5c40aa00ba75f0d0ffd74e0a3b775d3e0bc6f6cf28a177c43",
        size_bytes: 726_663_161,
    },
];

/// Provides prebuilt LLVM/Clang toolchains
pub struct LlvmProvider;

impl ToolchainProvider for LlvmProvider {
    fn name(&self) -> &'static str {
        "llvm"
    }

    fn can_provide(&self, toolchain_type: &str, version: &str) -> bool {
        matches!(toolchain_type, "llvm" | "clang") && manifest::knows_version(LLVM_RELEASES, version)
    }

    fn resolve_version(&self, _toolchain_type: &str, version: &str) -> Result<String> {
        manifest::resolve_version(LLVM_RELEASES, "llvm", version)
    }

    fn resolve_release(
        &self,
        _toolchain_type: &str,
        version: &str,
        platform: &str,
    ) -> Result<ToolchainRelease> {
        manifest::find_release(LLVM_RELEASES, "llvm", version, platform)
    }

    fn toolchain_id(&self, _toolchain_type: &str, version: &str, platform: &str) -> String {
        // Always key the cache as 'llvm', also when requested as 'clang'
        format!("llvm-{}-{}", version, platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_provide_llvm_and_clang_alias() {
        let provider = LlvmProvider;
        assert!(provider.can_provide("llvm", "18.1.8"));
        assert!(provider.can_provide("clang", "18.1.8"));
        assert!(provider.can_provide("llvm", "latest"));
        assert!(!provider.can_provide("gcc", "13.2.0"));
        assert!(!provider.can_provide("llvm", "9.0.0"));
    }

    #[test]
    fn test_latest_resolves_to_newest() {
        let provider = LlvmProvider;
        assert_eq!(provider.resolve_version("llvm", "latest").unwrap(), "18.1.8");
    }

    #[test]
    fn test_toolchain_id_normalizes_clang() {
        let provider = LlvmProvider;
        assert_eq!(
            provider.toolchain_id("clang", "18.1.8", "linux-x64"),
            "llvm-18.1.8-linux-x64"
        );
    }

    #[test]
    fn test_release_lookup() {
        let provider = LlvmProvider;
        let release = provider
            .resolve_release("llvm", "18.1.8", "linux-x64")
            .unwrap();
        assert!(release.url.ends_with(".tar.xz"));
        assert_eq!(release.sha256.len(), 64);
        assert!(provider.resolve_release("llvm", "18.1.8", "linux-riscv").is_err());
    }
}

//! Platform compatibility validation
//!
//! Enforces compiler x platform x stdlib x generator rules before any
//! toolchain is provisioned. Bootstrap runs are strict (issues become
//! errors); advisory runs downgrade compiler/platform mismatches to
//! warnings so a config written for another machine still configures.

use crate::config::model::ToolchainKitConfig;
use crate::core::capabilities::{get_supported_compilers, get_supported_stdlibs};
use crate::core::platform::PlatformInfo;

/// A compatibility issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityIssue {
    /// 'error' or 'warning'
    pub level: CompatibilityLevel,
    /// 'compiler', 'stdlib' or 'generator'
    pub category: &'static str,
    pub message: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompatibilityLevel {
    Error,
    Warning,
}

/// Result of compatibility validation
#[derive(Debug, Clone)]
pub struct CompatibilityResult {
    pub valid: bool,
    pub errors: Vec<CompatibilityIssue>,
    pub warnings: Vec<CompatibilityIssue>,
}

/// Toolchain details extracted from a configuration for validation
#[derive(Debug, Clone)]
struct ResolvedToolchain {
    compiler_type: String,
    stdlib: Option<String>,
}

/// Validates configuration compatibility with a target platform
pub struct CompatibilityValidator {
    platform: PlatformInfo,
    platform_string: String,
    issues: Vec<CompatibilityIssue>,
}

impl CompatibilityValidator {
    pub fn new(platform: PlatformInfo) -> Self {
        let platform_string = platform.platform_string();
        Self {
            platform,
            platform_string,
            issues: Vec::new(),
        }
    }

    /// Validate a configuration; `for_bootstrap` escalates compiler and
    /// platform mismatches to errors
    pub fn validate_configuration(
        mut self,
        config: &ToolchainKitConfig,
        toolchain_name: Option<&str>,
        for_bootstrap: bool,
    ) -> CompatibilityResult {
        let Some(toolchain) = self.resolve_toolchain(config, toolchain_name) else {
            // No toolchain selected; nothing to validate here
            return CompatibilityResult {
                valid: true,
                errors: Vec::new(),
                warnings: Vec::new(),
            };
        };

        self.validate_compiler(&toolchain.compiler_type, for_bootstrap);
        if let Some(stdlib) = &toolchain.stdlib {
            self.validate_stdlib(stdlib, &toolchain.compiler_type);
        }
        if let Some(generator) = &config.generator {
            self.validate_generator(generator);
        }

        let (errors, warnings): (Vec<_>, Vec<_>) = self
            .issues
            .into_iter()
            .partition(|i| i.level == CompatibilityLevel::Error);

        CompatibilityResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Check if a compiler is supported on a platform
    pub fn compiler_supported(&self, compiler_type: &str, platform_string: &str) -> bool {
        let compiler = normalize_compiler(compiler_type);
        get_supported_compilers(platform_string).contains(&compiler)
    }

    /// Human-readable reason a compiler is unsupported, or empty if it is
    pub fn unsupported_reason(&self, compiler_type: &str) -> String {
        let compiler = normalize_compiler(compiler_type);
        if self.compiler_supported(compiler, &self.platform_string) {
            return String::new();
        }

        match compiler {
            "gcc" if self.platform_string.starts_with("windows") => {
                "GCC is not supported on Windows. Use LLVM/Clang or MSVC instead.".to_string()
            }
            "gcc" if self.platform_string.starts_with("macos") => {
                "GCC is not officially supported on macOS. macOS uses Apple Clang as the \
                 primary compiler; use LLVM/Clang instead."
                    .to_string()
            }
            "msvc" if !self.platform_string.starts_with("windows") => format!(
                "MSVC is only available on Windows. For {}, use LLVM/Clang or GCC instead.",
                self.platform_string
            ),
            _ => format!(
                "Compiler '{}' is not supported on {}",
                compiler_type, self.platform_string
            ),
        }
    }

    fn resolve_toolchain(
        &self,
        config: &ToolchainKitConfig,
        toolchain_name: Option<&str>,
    ) -> Option<ResolvedToolchain> {
        // An explicitly selected toolchain wins
        if let Some(name) = toolchain_name {
            if let Some(tc) = config.find_toolchain(name) {
                return Some(ResolvedToolchain {
                    compiler_type: tc.r#type.clone(),
                    stdlib: tc.stdlib.clone(),
                });
            }
            // Unknown name: infer the type from the name itself
            let lowered = name.to_lowercase();
            for compiler in ["clang", "llvm", "gcc", "msvc"] {
                if lowered.contains(compiler) {
                    return Some(ResolvedToolchain {
                        compiler_type: compiler.to_string(),
                        stdlib: None,
                    });
                }
            }
            return None;
        }

        // Otherwise the platform default, resolved against the declarations
        config
            .default_toolchain_for(&self.platform_string)
            .map(|tc| ResolvedToolchain {
                compiler_type: tc.r#type.clone(),
                stdlib: tc.stdlib.clone(),
            })
    }

    fn validate_compiler(&mut self, compiler_type: &str, for_bootstrap: bool) {
        if compiler_type.is_empty() || compiler_type == "zig" {
            return;
        }

        if self.compiler_supported(compiler_type, &self.platform_string.clone()) {
            return;
        }

        let reason = self.unsupported_reason(compiler_type);
        let suggestion = self.alternative_compilers_suggestion();

        if for_bootstrap {
            self.issues.push(CompatibilityIssue {
                level: CompatibilityLevel::Error,
                category: "compiler",
                message: format!(
                    "Cannot bootstrap {} on {}: {}",
                    compiler_type, self.platform_string, reason
                ),
                suggestion,
            });
        } else {
            self.issues.push(CompatibilityIssue {
                level: CompatibilityLevel::Warning,
                category: "compiler",
                message: format!(
                    "Compiler {} may not work on {}: {}",
                    compiler_type, self.platform_string, reason
                ),
                suggestion,
            });
        }
    }

    fn validate_stdlib(&mut self, stdlib: &str, compiler_type: &str) {
        let supported = get_supported_stdlibs(&self.platform_string);
        if !supported.contains(&stdlib) {
            self.issues.push(CompatibilityIssue {
                level: CompatibilityLevel::Warning,
                category: "stdlib",
                message: format!(
                    "Standard library '{}' may not be available on {}",
                    stdlib, self.platform_string
                ),
                suggestion: format!("Supported standard libraries: {}", supported.join(", ")),
            });
        }

        if compiler_type == "gcc" && stdlib == "libc++" {
            self.issues.push(CompatibilityIssue {
                level: CompatibilityLevel::Warning,
                category: "stdlib",
                message: "GCC with libc++ requires manual setup".to_string(),
                suggestion: "GCC typically uses libstdc++; libc++ with GCC needs extra \
                             configuration"
                    .to_string(),
            });
        } else if compiler_type == "msvc" && stdlib != "msvc" {
            self.issues.push(CompatibilityIssue {
                level: CompatibilityLevel::Warning,
                category: "stdlib",
                message: format!("MSVC with {} is not standard", stdlib),
                suggestion: "MSVC typically uses its own standard library".to_string(),
            });
        }
    }

    fn validate_generator(&mut self, generator: &str) {
        let lowered = generator.to_lowercase();

        if lowered.contains("xcode") && self.platform.os != "macos" {
            self.issues.push(CompatibilityIssue {
                level: CompatibilityLevel::Error,
                category: "generator",
                message: format!(
                    "Xcode generator only works on macOS, not on {}",
                    self.platform_string
                ),
                suggestion: "Use Ninja or Unix Makefiles".to_string(),
            });
        } else if (lowered.contains("visual studio") || lowered == "msbuild")
            && self.platform.os != "windows"
        {
            self.issues.push(CompatibilityIssue {
                level: CompatibilityLevel::Error,
                category: "generator",
                message: format!(
                    "Visual Studio/MSBuild generator only works on Windows, not on {}",
                    self.platform_string
                ),
                suggestion: "Use Ninja or Unix Makefiles".to_string(),
            });
        }
    }

    fn alternative_compilers_suggestion(&self) -> String {
        let supported = get_supported_compilers(&self.platform_string);
        if supported.is_empty() {
            format!("No compilers configured for {}", self.platform_string)
        } else {
            format!(
                "Use one of the supported compilers for {}: {}",
                self.platform_string,
                supported.join(", ")
            )
        }
    }
}

/// Normalize compiler aliases to the capability-matrix names
///
/// 'clang' maps to 'llvm', the canonical name in the capability matrix.
pub fn normalize_compiler(compiler_type: &str) -> &str {
    match compiler_type {
        "clang" => "llvm",
        other => other,
    }
}

//! Semantic configuration validation
//!
//! Checks a parsed configuration against the current platform and available
//! tools. Issues carry a level, the offending field path, a message and a
//! concrete suggestion; only errors make a configuration invalid.

use crate::config::model::{ToolchainConfig, ToolchainKitConfig};
use crate::core::capabilities::get_supported_compilers;
use crate::core::platform::PlatformInfo;

/// A single validation issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// 'error', 'warning' or 'info'
    pub level: IssueLevel,
    /// Configuration field path (e.g., 'toolchains.llvm-18.stdlib')
    pub field: String,
    pub message: String,
    pub suggestion: String,
}

/// Severity of a validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for IssueLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueLevel::Error => write!(f, "error"),
            IssueLevel::Warning => write!(f, "warning"),
            IssueLevel::Info => write!(f, "info"),
        }
    }
}

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.level == IssueLevel::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.level == IssueLevel::Warning)
    }
}

/// Validates a ToolchainKit configuration against a platform
pub struct ConfigValidator {
    platform: PlatformInfo,
    issues: Vec<ValidationIssue>,
}

impl ConfigValidator {
    pub fn new(platform: PlatformInfo) -> Self {
        Self {
            platform,
            issues: Vec::new(),
        }
    }

    /// Run all validation checks
    pub fn validate(mut self, config: &ToolchainKitConfig) -> ValidationResult {
        self.validate_toolchains(config);
        self.validate_defaults(config);
        self.validate_build(config);
        self.validate_targets(config);
        self.validate_modules(config);

        let valid = !self.issues.iter().any(|i| i.level == IssueLevel::Error);
        ValidationResult {
            valid,
            issues: self.issues,
        }
    }

    fn validate_toolchains(&mut self, config: &ToolchainKitConfig) {
        let platform_string = self.platform.platform_string();
        let supported = get_supported_compilers(&platform_string);

        for tc in &config.toolchains {
            // clang is the config-facing alias of the canonical 'llvm'
            let compiler = if tc.r#type == "clang" { "llvm" } else { tc.r#type.as_str() };

            if !supported.contains(&compiler) && tc.r#type != "zig" {
                if tc.r#type == "msvc" && self.platform.os != "windows" {
                    self.error(
                        format!("toolchains.{}", tc.name),
                        "MSVC toolchain only works on Windows",
                        format!("Use clang or gcc for {}", self.platform.os),
                    );
                } else if tc.r#type == "gcc" && self.platform.os == "windows" {
                    self.error(
                        format!("toolchains.{}", tc.name),
                        "GCC is not supported on Windows",
                        "Use LLVM/Clang or MSVC instead",
                    );
                } else if tc.r#type == "gcc" && self.platform.os == "macos" {
                    self.error(
                        format!("toolchains.{}", tc.name),
                        "GCC is not officially supported on macOS",
                        "Use LLVM/Clang (Apple Clang) instead",
                    );
                } else {
                    self.error(
                        format!("toolchains.{}", tc.name),
                        format!(
                            "Compiler type '{}' is not supported on {}",
                            tc.r#type, platform_string
                        ),
                        format!(
                            "Supported compilers for {}: {}",
                            platform_string,
                            supported.join(", ")
                        ),
                    );
                }
            }

            if !is_valid_version(&tc.version) && tc.version != "latest" {
                self.error(
                    format!("toolchains.{}.version", tc.name),
                    format!("Invalid version format: {}", tc.version),
                    "Use semantic version format (e.g., 18.1.8) or 'latest'",
                );
            }

            if tc.stdlib.is_some() {
                self.validate_stdlib(tc);
            }
        }
    }

    fn validate_stdlib(&mut self, tc: &ToolchainConfig) {
        let stdlib = tc.stdlib.as_deref().unwrap_or_default();

        if tc.r#type == "gcc" && stdlib != "libstdc++" {
            self.warning(
                format!("toolchains.{}.stdlib", tc.name),
                format!("GCC typically uses libstdc++, not {}", stdlib),
                "Remove stdlib or set it to libstdc++",
            );
        }

        if tc.r#type == "clang" && !matches!(stdlib, "libc++" | "libstdc++") {
            self.warning(
                format!("toolchains.{}.stdlib", tc.name),
                format!("Clang typically uses libc++ or libstdc++, not {}", stdlib),
                "Set stdlib to libc++ or libstdc++",
            );
        }

        if tc.r#type == "msvc" && stdlib != "msvc" {
            self.warning(
                format!("toolchains.{}.stdlib", tc.name),
                "MSVC uses its own standard library",
                "Remove the stdlib setting for MSVC",
            );
        }
    }

    fn validate_defaults(&mut self, config: &ToolchainKitConfig) {
        let os = &self.platform.os;
        let platform_string = self.platform.platform_string();
        let has_default =
            config.defaults.contains_key(os) || config.defaults.contains_key(&platform_string);

        if !has_default && config.toolchains.len() > 1 {
            self.info(
                "defaults",
                format!("No default toolchain for {}", os),
                format!(
                    "Add \"defaults.{}: {}\" to specify one",
                    os, config.toolchains[0].name
                ),
            );
        }
    }

    fn validate_build(&mut self, config: &ToolchainKitConfig) {
        let build = &config.build;

        match build.backend.as_str() {
            "ninja" if !tool_available("ninja") => self.warning(
                "build.backend",
                "Ninja not found on PATH",
                "Install ninja or bootstrap will download it",
            ),
            "make" if !tool_available("make") => self.warning(
                "build.backend",
                "Make not found on PATH",
                "Install make or change the backend to ninja",
            ),
            _ => {}
        }

        if build.caching.enabled {
            match build.caching.tool.as_deref() {
                None => self.error(
                    "build.caching",
                    "Caching enabled but no tool specified",
                    "Set build.caching.tool to sccache or ccache",
                ),
                Some(tool) if !matches!(tool, "sccache" | "ccache") => self.error(
                    "build.caching.tool",
                    format!("Unsupported caching tool: {}", tool),
                    "Use sccache or ccache",
                ),
                Some(tool) if !tool_available(tool) => self.warning(
                    "build.caching.tool",
                    format!("{} not found on PATH", tool),
                    format!("Install {} or bootstrap will download it", tool),
                ),
                _ => {}
            }
        }
    }

    fn validate_targets(&mut self, config: &ToolchainKitConfig) {
        for target in &config.targets {
            let field = format!("targets.{}-{}", target.os, target.arch);

            if target.os == "android" {
                match target.api_level {
                    None => self.warning(
                        field.as_str(),
                        "Android target without api_level",
                        "Specify api_level (e.g., 29 for Android 10)",
                    ),
                    Some(level) if level < 21 => self.warning(
                        format!("{}.api_level", field),
                        format!("Android API {} is very old", level),
                        "Consider API 21+ for modern features",
                    ),
                    _ => {}
                }
            }

            if target.os == "ios" {
                if self.platform.os != "macos" {
                    self.error(
                        field.as_str(),
                        "iOS targets require a macOS host",
                        "Remove the iOS target or build on macOS",
                    );
                }
                if target.sdk.is_none() {
                    self.info(
                        field.as_str(),
                        "iOS target without SDK specified",
                        "Specify sdk (e.g., iphoneos or iphonesimulator)",
                    );
                }
            }
        }
    }

    fn validate_modules(&mut self, config: &ToolchainKitConfig) {
        for required in ["core", "cmake"] {
            if !config.modules.iter().any(|m| m == required) {
                self.error(
                    "modules",
                    format!("Required module missing: {}", required),
                    format!("Add {} to the modules list", required),
                );
            }
        }

        if config.modules.iter().any(|m| m == "caching") && !config.build.caching.enabled {
            self.warning(
                "modules",
                "caching module enabled but build.caching.enabled is false",
                "Either enable caching or remove the module",
            );
        }

        if config.modules.iter().any(|m| m == "packages") && config.packages.is_none() {
            self.warning(
                "modules",
                "packages module enabled but no package manager configured",
                "Configure a package manager or remove the module",
            );
        }
    }

    fn error(
        &mut self,
        field: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) {
        self.push(IssueLevel::Error, field, message, suggestion);
    }

    fn warning(
        &mut self,
        field: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) {
        self.push(IssueLevel::Warning, field, message, suggestion);
    }

    fn info(
        &mut self,
        field: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) {
        self.push(IssueLevel::Info, field, message, suggestion);
    }

    fn push(
        &mut self,
        level: IssueLevel,
        field: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) {
        self.issues.push(ValidationIssue {
            level,
            field: field.into(),
            message: message.into(),
            suggestion: suggestion.into(),
        });
    }
}

/// Format validation results for terminal display
pub fn format_validation_results(result: &ValidationResult) -> String {
    use console::style;

    if result.valid && result.issues.is_empty() {
        return format!("{} Configuration is valid", style("✓").green());
    }

    let mut lines = Vec::new();
    for (level, header) in [
        (IssueLevel::Error, format!("{}", style("Errors:").red().bold())),
        (
            IssueLevel::Warning,
            format!("{}", style("Warnings:").yellow().bold()),
        ),
        (IssueLevel::Info, format!("{}", style("Info:").cyan().bold())),
    ] {
        let group: Vec<_> = result.issues.iter().filter(|i| i.level == level).collect();
        if group.is_empty() {
            continue;
        }
        lines.push(header);
        for issue in group {
            lines.push(format!("  {}: {}", issue.field, issue.message));
            lines.push(format!("    → {}", issue.suggestion));
        }
        lines.push(String::new());
    }

    lines.join("\n").trim_end().to_string()
}

fn is_valid_version(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    matches!(parts.len(), 2 | 3)
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

fn tool_available(tool: &str) -> bool {
    which::which(tool).is_ok()
}

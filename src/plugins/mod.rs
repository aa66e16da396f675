//! Plugin registry
//!
//! Process-wide registry for the four plugin kinds: compiler strategies,
//! toolchain providers, package managers and build backends. Standard
//! plugins are registered once at startup; external plugins register before
//! orchestration begins. Registration of a duplicate name is an error, and
//! `clear` exists for tests.

pub mod strategy;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock, RwLock};

use anyhow::Result;

use crate::cmake::backends::{
    BuildBackend, MakeBackend, MsBuildBackend, NinjaBackend, XcodeBackend,
};
use crate::packages::conan::ConanIntegration;
use crate::packages::vcpkg::VcpkgIntegration;
use crate::packages::PackageManager;
use crate::plugins::strategy::{ClangStrategy, CompilerStrategy, GccStrategy, MsvcStrategy};
use crate::toolchain::gcc::GccProvider;
use crate::toolchain::llvm::LlvmProvider;
use crate::toolchain::provider::ToolchainProvider;

/// Constructor for a project-scoped package manager instance
pub type PackageManagerFactory =
    Arc<dyn Fn(&Path) -> Box<dyn PackageManager> + Send + Sync>;

/// Registry of all plugin kinds, keyed by name
#[derive(Default)]
pub struct PluginRegistry {
    compiler_strategies: HashMap<String, Arc<dyn CompilerStrategy>>,
    package_managers: HashMap<String, PackageManagerFactory>,
    backends: HashMap<String, Arc<dyn BuildBackend>>,
    // Providers keep registration order: the first claiming provider wins
    toolchain_providers: Vec<(String, Arc<dyn ToolchainProvider>)>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a compiler strategy; duplicate names are an error
    pub fn register_compiler_strategy(
        &mut self,
        name: &str,
        strategy: Arc<dyn CompilerStrategy>,
    ) -> Result<()> {
        if self.compiler_strategies.contains_key(name) {
            anyhow::bail!("Compiler strategy '{}' is already registered", name);
        }
        self.compiler_strategies.insert(name.to_string(), strategy);
        Ok(())
    }

    /// Register a package manager factory; duplicate names are an error
    pub fn register_package_manager(
        &mut self,
        name: &str,
        factory: PackageManagerFactory,
    ) -> Result<()> {
        if self.package_managers.contains_key(name) {
            anyhow::bail!("Package manager '{}' is already registered", name);
        }
        self.package_managers.insert(name.to_string(), factory);
        Ok(())
    }

    /// Register a build backend; duplicate names are an error
    pub fn register_backend(&mut self, name: &str, backend: Arc<dyn BuildBackend>) -> Result<()> {
        if self.backends.contains_key(name) {
            anyhow::bail!("Build backend '{}' is already registered", name);
        }
        self.backends.insert(name.to_string(), backend);
        Ok(())
    }

    /// Register a toolchain provider; duplicate names are an error
    pub fn register_toolchain_provider(
        &mut self,
        name: &str,
        provider: Arc<dyn ToolchainProvider>,
    ) -> Result<()> {
        if self.toolchain_providers.iter().any(|(n, _)| n == name) {
            anyhow::bail!("Toolchain provider '{}' is already registered", name);
        }
        self.toolchain_providers.push((name.to_string(), provider));
        Ok(())
    }

    /// Get a compiler strategy by name
    pub fn get_compiler_strategy(&self, name: &str) -> Result<Arc<dyn CompilerStrategy>> {
        self.compiler_strategies
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Compiler strategy '{}' not found in registry", name))
    }

    /// Create a package manager instance for a project
    pub fn create_package_manager(
        &self,
        name: &str,
        project_root: &Path,
    ) -> Result<Box<dyn PackageManager>> {
        let factory = self
            .package_managers
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Package manager '{}' not found in registry", name))?;
        Ok(factory(project_root))
    }

    /// Get a build backend by name
    pub fn get_backend(&self, name: &str) -> Result<Arc<dyn BuildBackend>> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Build backend '{}' not found in registry", name))
    }

    pub fn has_compiler_strategy(&self, name: &str) -> bool {
        self.compiler_strategies.contains_key(name)
    }

    pub fn has_package_manager(&self, name: &str) -> bool {
        self.package_managers.contains_key(name)
    }

    pub fn has_backend(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    pub fn list_compiler_strategies(&self) -> Vec<String> {
        self.compiler_strategies.keys().cloned().collect()
    }

    pub fn list_package_managers(&self) -> Vec<String> {
        self.package_managers.keys().cloned().collect()
    }

    pub fn list_backends(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    /// All registered providers in registration order
    pub fn toolchain_providers(&self) -> Vec<Arc<dyn ToolchainProvider>> {
        self.toolchain_providers
            .iter()
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Remove everything; used by tests and re-initialization
    pub fn clear(&mut self) {
        self.compiler_strategies.clear();
        self.package_managers.clear();
        self.backends.clear();
        self.toolchain_providers.clear();
    }
}

static GLOBAL_REGISTRY: OnceLock<RwLock<PluginRegistry>> = OnceLock::new();

/// The process-wide plugin registry
pub fn global_registry() -> &'static RwLock<PluginRegistry> {
    GLOBAL_REGISTRY.get_or_init(|| RwLock::new(PluginRegistry::new()))
}

/// Register the standard strategies, providers, package managers and
/// backends. Idempotent: already-registered names are left alone.
pub fn initialize_standard_plugins() -> Result<()> {
    let mut registry = global_registry()
        .write()
        .expect("plugin registry poisoned");

    if !registry.has_compiler_strategy("clang") {
        registry.register_compiler_strategy("clang", Arc::new(ClangStrategy))?;
    }
    if !registry.has_compiler_strategy("gcc") {
        registry.register_compiler_strategy("gcc", Arc::new(GccStrategy))?;
    }
    if !registry.has_compiler_strategy("msvc") {
        registry.register_compiler_strategy("msvc", Arc::new(MsvcStrategy))?;
    }

    if !registry.toolchain_providers.iter().any(|(n, _)| n == "llvm") {
        registry.register_toolchain_provider("llvm", Arc::new(LlvmProvider))?;
    }
    if !registry.toolchain_providers.iter().any(|(n, _)| n == "gcc") {
        registry.register_toolchain_provider("gcc", Arc::new(GccProvider))?;
    }

    if !registry.has_package_manager("conan") {
        registry.register_package_manager(
            "conan",
            Arc::new(|root: &Path| {
                Box::new(ConanIntegration::new(root.to_path_buf())) as Box<dyn PackageManager>
            }),
        )?;
    }
    if !registry.has_package_manager("vcpkg") {
        registry.register_package_manager(
            "vcpkg",
            Arc::new(|root: &Path| {
                Box::new(VcpkgIntegration::new(root.to_path_buf())) as Box<dyn PackageManager>
            }),
        )?;
    }

    if !registry.has_backend("ninja") {
        registry.register_backend("ninja", Arc::new(NinjaBackend::new(None)))?;
    }
    if !registry.has_backend("make") {
        registry.register_backend("make", Arc::new(MakeBackend::new(None)))?;
    }
    if !registry.has_backend("msbuild") {
        registry.register_backend("msbuild", Arc::new(MsBuildBackend::new(None)))?;
    }
    if !registry.has_backend("xcode") {
        registry.register_backend("xcode", Arc::new(XcodeBackend::new(None)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_registration_is_error() {
        let mut registry = PluginRegistry::new();
        registry
            .register_compiler_strategy("clang", Arc::new(ClangStrategy))
            .unwrap();
        assert!(registry
            .register_compiler_strategy("clang", Arc::new(ClangStrategy))
            .is_err());
    }

    #[test]
    fn test_get_missing_is_error() {
        let registry = PluginRegistry::new();
        assert!(registry.get_compiler_strategy("zig").is_err());
        assert!(registry.get_backend("meson").is_err());
        assert!(registry
            .create_package_manager("hunter", Path::new("/tmp"))
            .is_err());
    }

    #[test]
    fn test_provider_order_is_registration_order() {
        let mut registry = PluginRegistry::new();
        registry
            .register_toolchain_provider("llvm", Arc::new(LlvmProvider))
            .unwrap();
        registry
            .register_toolchain_provider("gcc", Arc::new(GccProvider))
            .unwrap();

        let providers = registry.toolchain_providers();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].name(), "llvm");
        assert_eq!(providers[1].name(), "gcc");

        assert!(registry
            .register_toolchain_provider("llvm", Arc::new(LlvmProvider))
            .is_err());
    }

    #[test]
    fn test_clear() {
        let mut registry = PluginRegistry::new();
        registry
            .register_compiler_strategy("clang", Arc::new(ClangStrategy))
            .unwrap();
        registry.clear();
        assert!(registry.list_compiler_strategies().is_empty());
    }

    #[test]
    fn test_initialize_standard_plugins_is_idempotent() {
        initialize_standard_plugins().unwrap();
        initialize_standard_plugins().unwrap();

        let registry = global_registry().read().unwrap();
        assert!(registry.has_compiler_strategy("clang"));
        assert!(registry.has_compiler_strategy("gcc"));
        assert!(registry.has_compiler_strategy("msvc"));
        assert!(registry.has_package_manager("conan"));
        assert!(registry.has_package_manager("vcpkg"));
        assert!(registry.has_backend("ninja"));
        assert!(!registry.toolchain_providers().is_empty());
    }
}

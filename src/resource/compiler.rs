//! Compiler registry.
//!
//! The actual compilation work happens in the external compiler executable;
//! this registry answers two questions the server needs locally:
//! which resource types are compilable at all, and what runtime install
//! dependencies a resource pulls in (for packaging expansion).

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::id::{ResourceId, ResourceTypeId};
use crate::config::CompilerConfig;

// ============================================================================
// ResourceCompiler trait
// ============================================================================

/// Per-type compiler knowledge.
pub trait ResourceCompiler: Send + Sync {
    /// Resource types this compiler handles.
    fn resource_types(&self) -> &[ResourceTypeId];

    /// Runtime install dependencies of the given resource.
    ///
    /// An install dependency must be present at runtime whenever the
    /// referring resource is loaded; packaging follows them transitively.
    fn install_dependencies(&self, id: &ResourceId) -> Vec<ResourceId>;
}

// ============================================================================
// CompilerRegistry
// ============================================================================

/// Maps resource types to their compiler.
pub struct CompilerRegistry {
    compilers: FxHashMap<ResourceTypeId, Arc<dyn ResourceCompiler>>,
}

impl CompilerRegistry {
    pub fn new() -> Self {
        Self {
            compilers: FxHashMap::default(),
        }
    }

    /// Build the registry from config: one descriptor-backed compiler
    /// covering every configured resource type.
    pub fn from_config(config: &CompilerConfig, raw_root: &Path) -> Result<Self> {
        let mut types = Vec::with_capacity(config.resource_types.len());
        for tag in &config.resource_types {
            let type_id = ResourceTypeId::parse(tag).with_context(|| {
                format!("invalid resource type tag `{tag}` in [compiler].resource_types")
            })?;
            types.push(type_id);
        }

        let mut registry = Self::new();
        registry.register(Arc::new(DescriptorCompiler::new(
            raw_root.to_path_buf(),
            types,
        )));
        Ok(registry)
    }

    /// Register a compiler for every type it declares.
    ///
    /// Registering two compilers for the same type is a programming error.
    pub fn register(&mut self, compiler: Arc<dyn ResourceCompiler>) {
        for &type_id in compiler.resource_types() {
            let previous = self.compilers.insert(type_id, compiler.clone());
            assert!(
                previous.is_none(),
                "duplicate compiler for resource type `{type_id}`"
            );
        }
    }

    pub fn compiler_for(&self, type_id: ResourceTypeId) -> Option<&Arc<dyn ResourceCompiler>> {
        self.compilers.get(&type_id)
    }

    pub fn has_compiler_for(&self, type_id: ResourceTypeId) -> bool {
        self.compilers.contains_key(&type_id)
    }
}

impl Default for CompilerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// DescriptorCompiler
// ============================================================================

/// Production compiler entry backed by JSON resource descriptors.
///
/// Raw resources are JSON descriptors; install dependencies are listed in
/// their `install_dependencies` array. Unreadable or non-JSON descriptors
/// yield no dependencies.
pub struct DescriptorCompiler {
    raw_root: PathBuf,
    types: Vec<ResourceTypeId>,
}

impl DescriptorCompiler {
    pub fn new(raw_root: PathBuf, types: Vec<ResourceTypeId>) -> Self {
        Self { raw_root, types }
    }
}

impl ResourceCompiler for DescriptorCompiler {
    fn resource_types(&self) -> &[ResourceTypeId] {
        &self.types
    }

    fn install_dependencies(&self, id: &ResourceId) -> Vec<ResourceId> {
        let Some(path) = id.resource_path() else {
            return Vec::new();
        };

        let file = path.to_fs_path(&self.raw_root);
        let Ok(raw) = fs::read_to_string(&file) else {
            return Vec::new();
        };
        let Ok(descriptor) = serde_json::from_str::<serde_json::Value>(&raw) else {
            return Vec::new();
        };
        let Some(deps) = descriptor
            .get("install_dependencies")
            .and_then(|v| v.as_array())
        else {
            return Vec::new();
        };

        deps.iter()
            .filter_map(|v| v.as_str())
            .map(ResourceId::new)
            .filter(|id| id.is_valid())
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn registry_for(dir: &TempDir, types: &[&str]) -> CompilerRegistry {
        let config = CompilerConfig {
            executable: PathBuf::from("rc"),
            resource_types: types.iter().map(ToString::to_string).collect(),
        };
        CompilerRegistry::from_config(&config, dir.path()).unwrap()
    }

    #[test]
    fn test_registry_lookup() {
        let dir = TempDir::new().unwrap();
        let registry = registry_for(&dir, &["map", "anim"]);

        assert!(registry.has_compiler_for(ResourceTypeId::MAP));
        assert!(registry.has_compiler_for(ResourceTypeId::parse("anim").unwrap()));
        assert!(!registry.has_compiler_for(ResourceTypeId::parse("tex").unwrap()));
    }

    #[test]
    fn test_registry_rejects_bad_tag() {
        let config = CompilerConfig {
            executable: PathBuf::from("rc"),
            resource_types: vec!["MAP".to_string()],
        };
        assert!(CompilerRegistry::from_config(&config, Path::new("/tmp")).is_err());
    }

    #[test]
    fn test_descriptor_dependencies() {
        let dir = TempDir::new().unwrap();
        let maps = dir.path().join("maps");
        fs::create_dir_all(&maps).unwrap();
        fs::write(
            maps.join("arena.map"),
            r#"{"install_dependencies": ["data://characters/hero.anim", "bogus", "data://env/sky.tex"]}"#,
        )
        .unwrap();

        let registry = registry_for(&dir, &["map", "anim", "tex"]);
        let compiler = registry.compiler_for(ResourceTypeId::MAP).unwrap();

        let deps = compiler.install_dependencies(&ResourceId::new("data://maps/arena.map"));
        assert_eq!(
            deps,
            vec![
                ResourceId::new("data://characters/hero.anim"),
                ResourceId::new("data://env/sky.tex"),
            ]
        );
    }

    #[test]
    fn test_descriptor_missing_or_malformed() {
        let dir = TempDir::new().unwrap();
        let registry = registry_for(&dir, &["map"]);
        let compiler = registry.compiler_for(ResourceTypeId::MAP).unwrap();

        // Missing file
        let deps = compiler.install_dependencies(&ResourceId::new("data://maps/missing.map"));
        assert!(deps.is_empty());

        // Not JSON
        fs::write(dir.path().join("broken.map"), "not json at all").unwrap();
        let deps = compiler.install_dependencies(&ResourceId::new("data://broken.map"));
        assert!(deps.is_empty());

        // JSON without the dependency array
        fs::write(dir.path().join("plain.map"), r#"{"name": "plain"}"#).unwrap();
        let deps = compiler.install_dependencies(&ResourceId::new("data://plain.map"));
        assert!(deps.is_empty());
    }
}

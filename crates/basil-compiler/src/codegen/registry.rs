//! Backend registry
//!
//! Maps a `Target` to a factory producing a fresh `Generator` per request.
//! Names are matched case-insensitively through a secondary alias map.
//! The registry is filled once (built-ins plus any embedder backends) and
//! then shared read-only.

use super::backends::{CSharpGenerator, CppGenerator, PythonGenerator};
use super::options::GenerationOptions;
use super::{Generator, Target};
use crate::error::{CodegenError, CodegenResult};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Creates a generator configured by the given options
pub type GeneratorFactory =
    Arc<dyn Fn(&GenerationOptions) -> Box<dyn Generator> + Send + Sync>;

#[derive(Clone)]
struct BackendEntry {
    name: String,
    factory: GeneratorFactory,
}

/// Registry of code generators by target and name
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<Target, BackendEntry>,
    names: BTreeMap<String, Target>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the C#, C++ and Python backends
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Target::CSharp, "csharp", |options: &GenerationOptions| {
            Box::new(CSharpGenerator::new(options.clone())) as Box<dyn Generator>
        });
        registry.register(Target::Cpp, "cpp", |options: &GenerationOptions| {
            Box::new(CppGenerator::new(options.clone())) as Box<dyn Generator>
        });
        registry.register(Target::Python, "python", |options: &GenerationOptions| {
            Box::new(PythonGenerator::new(options.clone())) as Box<dyn Generator>
        });

        let aliases = [
            ("cs", Target::CSharp),
            ("c#", Target::CSharp),
            ("c++", Target::Cpp),
            ("cxx", Target::Cpp),
            ("py", Target::Python),
        ];
        for (alias, target) in aliases {
            registry.names.insert(alias.to_string(), target);
        }
        registry
    }

    /// Register (or replace) the backend for `target` under `name`
    pub fn register<F>(&mut self, target: Target, name: &str, factory: F)
    where
        F: Fn(&GenerationOptions) -> Box<dyn Generator> + Send + Sync + 'static,
    {
        let name = name.to_ascii_lowercase();
        log::debug!("registering backend '{}' for target {}", name, target);
        self.names.insert(name.clone(), target);
        self.backends.insert(
            target,
            BackendEntry {
                name,
                factory: Arc::new(factory),
            },
        );
    }

    /// Add another name for a registered target
    pub fn alias(&mut self, alias: &str, target: Target) -> CodegenResult<()> {
        if !self.backends.contains_key(&target) {
            return Err(CodegenError::UnregisteredTarget(target));
        }
        self.names.insert(alias.to_ascii_lowercase(), target);
        Ok(())
    }

    /// Create a fresh generator for `target`
    pub fn create(
        &self,
        target: Target,
        options: &GenerationOptions,
    ) -> CodegenResult<Box<dyn Generator>> {
        match self.backends.get(&target) {
            Some(entry) => Ok((entry.factory)(options)),
            None => Err(CodegenError::UnregisteredTarget(target)),
        }
    }

    /// Create a fresh generator by (case-insensitive) name or alias
    pub fn create_named(
        &self,
        name: &str,
        options: &GenerationOptions,
    ) -> CodegenResult<Box<dyn Generator>> {
        let target = self
            .target_for_name(name)
            .ok_or_else(|| CodegenError::UnknownTarget {
                name: name.to_string(),
            })?;
        self.create(target, options)
    }

    pub fn is_registered(&self, target: Target) -> bool {
        self.backends.contains_key(&target)
    }

    pub fn is_name_registered(&self, name: &str) -> bool {
        self.target_for_name(name).is_some()
    }

    pub fn target_for_name(&self, name: &str) -> Option<Target> {
        self.names
            .get(&name.trim().to_ascii_lowercase())
            .copied()
            .filter(|t| self.backends.contains_key(t))
    }

    /// Canonical names of the registered backends, in target order
    pub fn list_registered_names(&self) -> Vec<String> {
        self.backends.values().map(|e| e.name.clone()).collect()
    }

    /// All accepted names (canonical and aliases) for `target`, sorted
    pub fn names_for(&self, target: Target) -> Vec<String> {
        self.names
            .iter()
            .filter(|(_, t)| **t == target)
            .map(|(n, _)| n.clone())
            .collect()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.list_registered_names())
            .field("names", &self.names)
            .finish()
    }
}

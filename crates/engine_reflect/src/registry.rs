//! The class registry: qualified name to [`ClassDescriptor`].
//!
//! A registry owns its descriptors. Classes hold only weak handles to their
//! bases, so removing a base from the registry detaches it from every class
//! derived from it: lookups on those classes stop seeing the base's members
//! (instances already created keep theirs). Whether that is allowed is
//! governed by [`OrphanPolicy`]. Registering a class re-points the handles of
//! every registered class that names it as a base, so a replaced base stays
//! part of its derived classes' hierarchy.
//!
//! Lookups take shard read locks and may run concurrently with each other.
//! Registration is expected to happen while no instance of the affected
//! class is being created.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::json;
use tracing::{debug, warn};

use crate::builder::{ClassDefinition, Reflected};
use crate::class::ClassDescriptor;
use crate::config::{DuplicatePolicy, OrphanPolicy, RegistryConfig};
use crate::error::{ReflectError, Result};
use crate::object::{Object, ObjectCore};
use crate::value::Value;

/// A named group of classes loaded and unloaded together.
#[derive(Debug)]
pub struct ModuleDefinition {
    name: String,
    classes: Vec<ClassDefinition>,
}

impl ModuleDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classes: Vec::new(),
        }
    }

    /// Add a class. Classes are registered in the order they are added, so
    /// bases must come before the classes deriving from them.
    #[must_use]
    pub fn with_class(mut self, definition: ClassDefinition) -> Self {
        self.classes.push(definition);
        self
    }

    #[must_use]
    pub fn with_type<T: Reflected>(self) -> Self {
        self.with_class(T::class_definition())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Registry of all reflected classes known to a process or a test.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    config: RegistryConfig,
    classes: DashMap<String, Arc<ClassDescriptor>>,
    /// Module name to the classes it registered, in registration order.
    modules: DashMap<String, Vec<String>>,
}

impl ClassRegistry {
    /// Create an empty registry with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with `config`.
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The policies this registry was created with.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The process-wide registry, created on first use with the default
    /// configuration and [`ROOT_CLASS`](crate::ROOT_CLASS) registered.
    pub fn global() -> &'static ClassRegistry {
        static GLOBAL: OnceLock<ClassRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let registry = ClassRegistry::new();
            if let Err(err) = registry.register_type::<ObjectCore>() {
                warn!(%err, "failed to register root class");
            }
            registry
        })
    }

    // -- Registration --

    /// Resolve and register a class. An existing class with the same name is
    /// handled according to [`RegistryConfig::duplicates`].
    pub fn register(&self, definition: ClassDefinition) -> Result<Arc<ClassDescriptor>> {
        self.insert(definition, self.config.duplicates)
            .map(|(class, _)| class)
    }

    /// Register a class, replacing any class of the same name.
    pub fn register_or_replace(&self, definition: ClassDefinition) -> Result<Arc<ClassDescriptor>> {
        self.insert(definition, DuplicatePolicy::Replace)
            .map(|(class, _)| class)
    }

    /// Register the class a [`Reflected`] type describes.
    pub fn register_type<T: Reflected>(&self) -> Result<Arc<ClassDescriptor>> {
        self.register(T::class_definition())
    }

    /// Returns the new class and the one it replaced, if any.
    fn insert(
        &self,
        definition: ClassDefinition,
        policy: DuplicatePolicy,
    ) -> Result<(Arc<ClassDescriptor>, Option<Arc<ClassDescriptor>>)> {
        let name = definition.qualified_name();
        if policy == DuplicatePolicy::Reject && self.classes.contains_key(&name) {
            return Err(ReflectError::DuplicateClass(name));
        }

        let class = Arc::new(ClassDescriptor::from_definition(definition, |base| {
            self.find(base)
        })?);
        // Collected before the entry lock is taken; iterating while holding
        // it would deadlock on its shard.
        let dependents = self.dependents(&name);

        let previous = match self.classes.entry(name.clone()) {
            Entry::Occupied(mut entry) => {
                if policy == DuplicatePolicy::Reject {
                    return Err(ReflectError::DuplicateClass(name));
                }
                Some(entry.insert(Arc::clone(&class)))
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&class));
                None
            }
        };

        if !dependents.is_empty() {
            self.relink_dependents(&class);
            debug!(class = %name, ?dependents, "dependents relinked");
        }
        debug!(
            class = %name,
            bases = ?class.base_names().collect::<Vec<_>>(),
            replaced = previous.is_some(),
            "class registered"
        );
        Ok((class, previous))
    }

    fn relink_dependents(&self, base: &Arc<ClassDescriptor>) {
        for entry in self.classes.iter() {
            entry.value().relink(base);
        }
    }

    /// Remove a class.
    ///
    /// Instances of the class keep their descriptor alive; it is the caller's
    /// job to destroy them first. Classes derived from it lose it as a base,
    /// which fails with [`ReflectError::ClassInUse`] under
    /// [`OrphanPolicy::Reject`].
    pub fn unregister(&self, name: &str) -> Result<()> {
        if !self.classes.contains_key(name) {
            return Err(ReflectError::UnknownClass(name.to_string()));
        }
        let dependents = self.dependents(name);
        if !dependents.is_empty() && self.config.orphans == OrphanPolicy::Reject {
            return Err(ReflectError::ClassInUse {
                class: name.to_string(),
                dependents,
            });
        }
        self.remove(name)
            .map(|_| ())
            .ok_or_else(|| ReflectError::UnknownClass(name.to_string()))
    }

    fn remove(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        let (_, class) = self.classes.remove(name)?;
        let dependents = self.dependents(name);
        if !dependents.is_empty() {
            warn!(class = %name, ?dependents, "unregistered class was a base of registered classes");
        }
        debug!(class = %name, "class unregistered");
        Some(class)
    }

    // -- Lookup --

    /// Find a class by qualified name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns `true` if a class named `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Build an instance of a registered class.
    pub fn create_instance(&self, name: &str, args: &[Value]) -> Result<Box<dyn Object>> {
        let class = self
            .find(name)
            .ok_or_else(|| ReflectError::UnknownClass(name.to_string()))?;
        class.create_instance(args)
    }

    /// Qualified names of every registered class, sorted.
    #[must_use]
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Registered classes that name `name` as a direct base, sorted.
    #[must_use]
    pub fn dependents(&self, name: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .classes
            .iter()
            .filter(|e| e.value().base_names().any(|base| base == name))
            .map(|e| e.key().clone())
            .collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    // -- Modules --

    /// Register every class of a module, or none of them.
    ///
    /// On failure the classes registered so far are removed again, and any
    /// class they replaced is put back.
    pub fn load_module(&self, module: ModuleDefinition) -> Result<()> {
        let ModuleDefinition { name, classes } = module;
        if self.modules.contains_key(&name) {
            return Err(ReflectError::DuplicateModule(name));
        }

        let mut loaded: Vec<(String, Option<Arc<ClassDescriptor>>)> = Vec::with_capacity(classes.len());
        for definition in classes {
            match self.insert(definition, self.config.duplicates) {
                Ok((class, previous)) => loaded.push((class.qualified_name().to_string(), previous)),
                Err(err) => {
                    for (class, previous) in loaded.into_iter().rev() {
                        match previous {
                            Some(previous) => {
                                self.classes.insert(class, Arc::clone(&previous));
                                self.relink_dependents(&previous);
                            }
                            None => {
                                self.classes.remove(&class);
                            }
                        }
                    }
                    warn!(module = %name, %err, "module load rolled back");
                    return Err(err);
                }
            }
        }

        debug!(module = %name, classes = loaded.len(), "module loaded");
        self.modules
            .insert(name, loaded.into_iter().map(|(class, _)| class).collect());
        Ok(())
    }

    /// Unregister the classes of a module, last registered first.
    ///
    /// Under [`OrphanPolicy::Reject`] nothing is removed if a class outside
    /// the module still derives from one inside it.
    pub fn unload_module(&self, name: &str) -> Result<()> {
        let classes = self
            .modules
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ReflectError::UnknownModule(name.to_string()))?;

        if self.config.orphans == OrphanPolicy::Reject {
            for class in &classes {
                let outside: Vec<String> = self
                    .dependents(class)
                    .into_iter()
                    .filter(|dependent| !classes.contains(dependent))
                    .collect();
                if !outside.is_empty() {
                    return Err(ReflectError::ClassInUse {
                        class: class.clone(),
                        dependents: outside,
                    });
                }
            }
        }

        self.modules.remove(name);
        for class in classes.iter().rev() {
            self.remove(class);
        }
        debug!(module = %name, classes = classes.len(), "module unloaded");
        Ok(())
    }

    /// Names of the loaded modules, sorted.
    #[must_use]
    pub fn modules(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Classes a loaded module registered, in registration order.
    #[must_use]
    pub fn module_classes(&self, name: &str) -> Option<Vec<String>> {
        self.modules.get(name).map(|entry| entry.value().clone())
    }

    // -- Tooling --

    /// JSON description of every registered class, sorted by name.
    #[must_use]
    pub fn describe(&self) -> serde_json::Value {
        let classes: Vec<serde_json::Value> = self
            .class_names()
            .iter()
            .filter_map(|name| self.find(name))
            .map(|class| class.describe())
            .collect();
        json!({
            "config": self.config.to_json(),
            "modules": self.modules(),
            "classes": classes,
        })
    }

    /// Remove every class and module.
    pub fn clear(&self) {
        self.modules.clear();
        self.classes.clear();
        debug!("registry cleared");
    }
}

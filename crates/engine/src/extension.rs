//! Extension registry
//!
//! An [`Extension`] is a named bundle of layers plus an optional one-time
//! `hooked` callback. The [`ExtensionRegistry`] records extensions by name;
//! activation order is resolved later by [`ContextBuilder`], which freezes
//! the result into an immutable [`Context`].
//!
//! [`ContextBuilder`]: crate::context::ContextBuilder
//! [`Context`]: crate::context::Context

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use formtree_core::{ConfigurationError, Result};
use tracing::debug;

use crate::context::Settings;
use crate::extensions;
use crate::layer::{FactoryLayer, MapperLayer, MountingLayer};

/// One-time wiring callback run when a context is built
pub type HookedFn = Arc<dyn Fn(&mut Settings) + Send + Sync>;

// ============================================================================
// Extension
// ============================================================================

/// A named unit of composable behavior
#[derive(Clone)]
pub struct Extension {
    name: String,
    dependencies: Vec<String>,
    mapper_layer: Option<Arc<dyn MapperLayer>>,
    mounting_layer: Option<Arc<dyn MountingLayer>>,
    factory_layer: Option<Arc<dyn FactoryLayer>>,
    hooked: Option<HookedFn>,
    requires_adapter: bool,
}

impl Extension {
    /// An extension contributing nothing yet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            mapper_layer: None,
            mounting_layer: None,
            factory_layer: None,
            hooked: None,
            requires_adapter: false,
        }
    }

    /// Require `name` to be activated first
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    /// Wrap mapper operations
    pub fn mapper_layer(mut self, layer: impl MapperLayer + 'static) -> Self {
        self.mapper_layer = Some(Arc::new(layer));
        self
    }

    /// Wrap mounting skip
    pub fn mounting_layer(mut self, layer: impl MountingLayer + 'static) -> Self {
        self.mounting_layer = Some(Arc::new(layer));
        self
    }

    /// Wrap target resolution
    pub fn factory_layer(mut self, layer: impl FactoryLayer + 'static) -> Self {
        self.factory_layer = Some(Arc::new(layer));
        self
    }

    /// Run `f` once per built context, after this extension's layers are installed
    pub fn hooked<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Settings) + Send + Sync + 'static,
    {
        self.hooked = Some(Arc::new(f));
        self
    }

    /// Building a context with this extension fails without an adapter
    pub fn requires_adapter(mut self) -> Self {
        self.requires_adapter = true;
        self
    }

    /// Registry key
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared dependencies
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub(crate) fn layers(
        &self,
    ) -> (
        Option<&Arc<dyn MapperLayer>>,
        Option<&Arc<dyn MountingLayer>>,
        Option<&Arc<dyn FactoryLayer>>,
    ) {
        (
            self.mapper_layer.as_ref(),
            self.mounting_layer.as_ref(),
            self.factory_layer.as_ref(),
        )
    }

    pub(crate) fn hooked_fn(&self) -> Option<&HookedFn> {
        self.hooked.as_ref()
    }

    pub(crate) fn needs_adapter(&self) -> bool {
        self.requires_adapter
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("mapper_layer", &self.mapper_layer.is_some())
            .field("mounting_layer", &self.mounting_layer.is_some())
            .field("factory_layer", &self.factory_layer.is_some())
            .field("hooked", &self.hooked.is_some())
            .field("requires_adapter", &self.requires_adapter)
            .finish()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Extensions known by name
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    extensions: HashMap<String, Extension>,
}

impl ExtensionRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in `skipping`, `ordering` and `model` extensions
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for ext in extensions::builtins() {
            // Built-in names are distinct.
            registry.extensions.insert(ext.name.clone(), ext);
        }
        registry
    }

    /// Record an extension
    ///
    /// # Errors
    ///
    /// `DuplicateExtension` if the name is taken.
    pub fn register(&mut self, extension: Extension) -> Result<()> {
        if self.extensions.contains_key(&extension.name) {
            return Err(ConfigurationError::DuplicateExtension(extension.name).into());
        }
        debug!(target: "formtree::extension", extension = %extension.name, "Extension registered");
        self.extensions.insert(extension.name.clone(), extension);
        Ok(())
    }

    /// Extension by name
    pub fn get(&self, name: &str) -> Option<&Extension> {
        self.extensions.get(name)
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.extensions.contains_key(name)
    }

    /// Number of registered extensions
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

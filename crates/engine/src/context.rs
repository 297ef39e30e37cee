//! Activated extensions, frozen
//!
//! A [`Context`] is built once (per process, or per test) and passed
//! explicitly to every mapper as an `Arc`. It holds the layers of every
//! active extension in activation order, the persistence adapter and the
//! [`Settings`] produced by the `hooked` callbacks. Nothing in it changes
//! after [`ContextBuilder::build`].
//!
//! # Example
//!
//! ```ignore
//! let ctx = ContextBuilder::new(ExtensionRegistry::with_builtins())
//!     .activate("model")?
//!     .adapter(store)
//!     .build()?;
//! let mut mapper = Mapper::new(ctx, user_definition, Target::new("user"), &[])?;
//! ```

use std::fmt;
use std::sync::Arc;

use formtree_core::{ConfigurationError, PersistenceAdapter, Result, BASE_KEY};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::definition::Options;
use crate::extension::ExtensionRegistry;
use crate::layer::{FactoryLayer, MapperLayer, MountingLayer};

/// Default message recorded when the adapter refuses a save without detail
pub const DEFAULT_SAVE_FAILURE_MESSAGE: &str = "could not be saved";

/// Context-wide settings, adjustable by `hooked` callbacks
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Wrap `apply` in an adapter transaction
    pub transactional_apply: bool,
    /// Error key for failures not tied to an attribute
    pub base_error_key: String,
    /// Message recorded when `save_target` returns false
    pub save_failure_message: String,
    /// Settings owned by third-party extensions
    pub extra: Options,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            transactional_apply: false,
            base_error_key: BASE_KEY.to_string(),
            save_failure_message: DEFAULT_SAVE_FAILURE_MESSAGE.to_string(),
            extra: Options::new(),
        }
    }
}

// ============================================================================
// Context
// ============================================================================

/// Immutable set of active extensions
pub struct Context {
    extensions: Vec<String>,
    mapper_layers: Vec<Arc<dyn MapperLayer>>,
    mounting_layers: Vec<Arc<dyn MountingLayer>>,
    factory_layers: Vec<Arc<dyn FactoryLayer>>,
    adapter: Option<Arc<dyn PersistenceAdapter>>,
    settings: Settings,
}

impl Context {
    /// No extensions and no adapter: the bare core
    pub fn bare() -> Arc<Context> {
        Arc::new(Context {
            extensions: Vec::new(),
            mapper_layers: Vec::new(),
            mounting_layers: Vec::new(),
            factory_layers: Vec::new(),
            adapter: None,
            settings: Settings::default(),
        })
    }

    /// Built-in extensions with `model` (and so `skipping` and `ordering`) active
    ///
    /// # Errors
    ///
    /// Only if the built-in registry is inconsistent.
    pub fn standard(adapter: Arc<dyn PersistenceAdapter>) -> Result<Arc<Context>> {
        ContextBuilder::new(ExtensionRegistry::with_builtins())
            .activate("model")?
            .adapter(adapter)
            .build()
    }

    /// Whether `name` was activated
    pub fn is_active(&self, name: &str) -> bool {
        self.extensions.iter().any(|n| n == name)
    }

    /// Active extension names in activation order
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// The persistence adapter, if any
    pub fn adapter(&self) -> Option<&Arc<dyn PersistenceAdapter>> {
        self.adapter.as_ref()
    }

    /// The persistence adapter, on behalf of `extension`
    ///
    /// # Errors
    ///
    /// `MissingAdapter` if the context was built without one.
    pub fn require_adapter(&self, extension: &str) -> Result<Arc<dyn PersistenceAdapter>> {
        self.adapter
            .clone()
            .ok_or_else(|| ConfigurationError::MissingAdapter(extension.to_string()).into())
    }

    /// Settings after every `hooked` callback ran
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn mapper_layers(&self) -> &[Arc<dyn MapperLayer>] {
        &self.mapper_layers
    }

    pub(crate) fn mounting_layers(&self) -> &[Arc<dyn MountingLayer>] {
        &self.mounting_layers
    }

    pub(crate) fn factory_layers(&self) -> &[Arc<dyn FactoryLayer>] {
        &self.factory_layers
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("extensions", &self.extensions)
            .field("adapter", &self.adapter.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Resolves activation order and freezes it into a [`Context`]
pub struct ContextBuilder {
    registry: ExtensionRegistry,
    order: Vec<String>,
    adapter: Option<Arc<dyn PersistenceAdapter>>,
    settings: Settings,
}

impl fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("registered", &self.registry.len())
            .field("order", &self.order)
            .field("adapter", &self.adapter.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

impl ContextBuilder {
    /// Builder over `registry` with nothing activated
    pub fn new(registry: ExtensionRegistry) -> Self {
        Self {
            registry,
            order: Vec::new(),
            adapter: None,
            settings: Settings::default(),
        }
    }

    /// Builder with the extensions and apply settings of `config`
    ///
    /// # Errors
    ///
    /// Same as [`activate`](Self::activate) for each configured extension.
    pub fn from_config(registry: ExtensionRegistry, config: &EngineConfig) -> Result<Self> {
        let mut builder = Self::new(registry);
        for name in &config.extensions {
            builder = builder.activate(name)?;
        }
        builder.settings.base_error_key = config.apply.base_error_key.clone();
        builder.settings.save_failure_message = config.apply.save_failure_message.clone();
        Ok(builder)
    }

    /// Activate `name` after its dependencies
    ///
    /// Activating an already active extension is a no-op.
    ///
    /// # Errors
    ///
    /// `UnknownExtension` for an unregistered name or dependency,
    /// `DependencyCycle` when dependencies loop back.
    pub fn activate(mut self, name: &str) -> Result<Self> {
        let mut path = Vec::new();
        self.visit(name, None, &mut path)?;
        Ok(self)
    }

    fn visit(&mut self, name: &str, required_by: Option<&str>, path: &mut Vec<String>) -> Result<()> {
        if self.order.iter().any(|n| n == name) {
            return Ok(());
        }
        if let Some(start) = path.iter().position(|n| n == name) {
            let mut cycle = path[start..].to_vec();
            cycle.push(name.to_string());
            return Err(ConfigurationError::DependencyCycle { path: cycle }.into());
        }
        let Some(extension) = self.registry.get(name) else {
            return Err(ConfigurationError::UnknownExtension {
                name: name.to_string(),
                required_by: required_by.map(str::to_string),
            }
            .into());
        };
        let dependencies = extension.dependencies().to_vec();

        path.push(name.to_string());
        for dependency in &dependencies {
            self.visit(dependency, Some(name), path)?;
        }
        path.pop();

        debug!(target: "formtree::extension", extension = name, "Extension activated");
        self.order.push(name.to_string());
        Ok(())
    }

    /// Persistence adapter handed to every mapper
    pub fn adapter(mut self, adapter: Arc<dyn PersistenceAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Adjust settings before `hooked` callbacks run
    pub fn settings(mut self, f: impl FnOnce(&mut Settings)) -> Self {
        f(&mut self.settings);
        self
    }

    /// Activation order so far
    pub fn activation_order(&self) -> &[String] {
        &self.order
    }

    /// Install layers in activation order and run each `hooked` callback once
    ///
    /// # Errors
    ///
    /// `MissingAdapter` if an active extension needs an adapter and none was set.
    pub fn build(self) -> Result<Arc<Context>> {
        let mut settings = self.settings;
        let mut mapper_layers = Vec::new();
        let mut mounting_layers = Vec::new();
        let mut factory_layers = Vec::new();

        for name in &self.order {
            let Some(extension) = self.registry.get(name) else {
                return Err(ConfigurationError::UnknownExtension {
                    name: name.clone(),
                    required_by: None,
                }
                .into());
            };
            if extension.needs_adapter() && self.adapter.is_none() {
                return Err(ConfigurationError::MissingAdapter(name.clone()).into());
            }

            let (mapper, mounting, factory) = extension.layers();
            if let Some(layer) = mapper {
                mapper_layers.push(Arc::clone(layer));
            }
            if let Some(layer) = mounting {
                mounting_layers.push(Arc::clone(layer));
            }
            if let Some(layer) = factory {
                factory_layers.push(Arc::clone(layer));
            }
            if let Some(hooked) = extension.hooked_fn() {
                hooked(&mut settings);
            }
        }

        info!(
            target: "formtree::extension",
            extensions = ?self.order,
            adapter = self.adapter.is_some(),
            "Context built"
        );

        Ok(Arc::new(Context {
            extensions: self.order,
            mapper_layers,
            mounting_layers,
            factory_layers,
            adapter: self.adapter,
            settings,
        }))
    }
}

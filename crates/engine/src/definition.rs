//! Mapper definitions, mount declarations and traits
//!
//! A [`MapperDefinition`] is the static shape of a mapper: which attributes
//! it maps, which child mappers it mounts, which rules and hooks it runs.
//! Definitions are built once, shared behind `Arc`, and never mutated.
//! [`TraitDefinition`]s are named deltas merged into a copy of the base
//! shape when a mapper is constructed with that trait.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use formtree_core::{ConfigurationError, Result, Target, Value};

use crate::mapper::Mapper;
use crate::validation::Validation;

/// Free-form option bag consulted by extensions
pub type Options = BTreeMap<String, Value>;

/// Attribute reader
pub type Reader = Arc<dyn Fn(&Target) -> Value + Send + Sync>;

/// Attribute writer
pub type Writer = Arc<dyn Fn(&mut Target, Value) + Send + Sync>;

/// Lifecycle hook; runs with the mapper it is attached to
pub type Hook = Arc<dyn Fn(&mut Mapper) -> Result<()> + Send + Sync>;

/// Custom target resolution for a mounting, given the mounter's target
pub type TargetResolver = Arc<dyn Fn(&Target) -> Option<Target> + Send + Sync>;

// ============================================================================
// Attribute mappings
// ============================================================================

/// Binding of an external key to a target attribute
#[derive(Clone)]
pub struct AttributeMapping {
    key: String,
    attribute: String,
    reader: Option<Reader>,
    writer: Option<Writer>,
}

impl AttributeMapping {
    /// Map external key `name` to the attribute of the same name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: name.clone(),
            attribute: name,
            reader: None,
            writer: None,
        }
    }

    /// Use a different external key
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Custom reader
    pub fn reader<F>(mut self, reader: F) -> Self
    where
        F: Fn(&Target) -> Value + Send + Sync + 'static,
    {
        self.reader = Some(Arc::new(reader));
        self
    }

    /// Custom writer
    pub fn writer<F>(mut self, writer: F) -> Self
    where
        F: Fn(&mut Target, Value) + Send + Sync + 'static,
    {
        self.writer = Some(Arc::new(writer));
        self
    }

    /// External key, before any mount prefix
    pub fn external_key(&self) -> &str {
        &self.key
    }

    /// Target attribute
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Read the value from `target`
    pub fn read(&self, target: &Target) -> Value {
        match &self.reader {
            Some(reader) => reader(target),
            None => target.get(&self.attribute),
        }
    }

    /// Write `value` to `target`
    pub fn write(&self, target: &mut Target, value: Value) {
        match &self.writer {
            Some(writer) => writer(target, value),
            None => target.set(self.attribute.clone(), value),
        }
    }
}

impl fmt::Debug for AttributeMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeMapping")
            .field("key", &self.key)
            .field("attribute", &self.attribute)
            .field("custom_reader", &self.reader.is_some())
            .field("custom_writer", &self.writer.is_some())
            .finish()
    }
}

// ============================================================================
// Mount options
// ============================================================================

/// Lifecycle phase an ordering index applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// `validate`
    Validate,
    /// `save`
    Save,
}

/// Sibling ordering index
///
/// Lower runs first; siblings default to 0 and ties keep declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Index {
    /// Same index in every phase
    All(i32),
    /// Index per phase; phases not listed use 0
    PerPhase(BTreeMap<Phase, i32>),
}

impl Index {
    /// `{save: index}`
    pub fn save(index: i32) -> Self {
        Index::PerPhase(BTreeMap::from([(Phase::Save, index)]))
    }

    /// `{validate: index}`
    pub fn validate(index: i32) -> Self {
        Index::PerPhase(BTreeMap::from([(Phase::Validate, index)]))
    }

    /// Resolved index for `phase`
    pub fn for_phase(&self, phase: Phase) -> i32 {
        match self {
            Index::All(i) => *i,
            Index::PerPhase(map) => map.get(&phase).copied().unwrap_or(0),
        }
    }
}

/// Mount-time configuration
#[derive(Clone, Default)]
pub struct MountOptions {
    /// Prefix applied to the child's external keys (`prefix_key`)
    pub prefix: Option<String>,
    /// Child field receiving the mounter's id after the mounter is saved
    pub foreign_key: Option<String>,
    /// Mounter field receiving the child's id before the mounter is saved
    pub mounter_foreign_key: Option<String>,
    /// Sibling ordering index
    pub index: Option<Index>,
    /// External key of a collection mounting (defaults to the mount name)
    pub key: Option<String>,
    /// Custom target resolution
    pub target: Option<TargetResolver>,
    /// Traits activated on the child mapper(s)
    pub traits: Vec<String>,
    /// Options handed to the child mapper(s)
    pub extra: Options,
}

impl MountOptions {
    /// Defaults: no prefix, no keys, index 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Copy the mounter's id into the child's `field` after the mounter saves
    pub fn foreign_key(mut self, field: impl Into<String>) -> Self {
        self.foreign_key = Some(field.into());
        self
    }

    /// Copy the child's id into the mounter's `field` before the mounter saves
    pub fn mounter_foreign_key(mut self, field: impl Into<String>) -> Self {
        self.mounter_foreign_key = Some(field.into());
        self
    }

    /// Ordering index
    pub fn index(mut self, index: Index) -> Self {
        self.index = Some(index);
        self
    }

    /// External key of a collection mounting
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Resolve the child target from the mounter's target
    pub fn target<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&Target) -> Option<Target> + Send + Sync + 'static,
    {
        self.target = Some(Arc::new(resolver));
        self
    }

    /// Activate `name` on the child
    pub fn with_trait(mut self, name: impl Into<String>) -> Self {
        self.traits.push(name.into());
        self
    }

    /// Set an option for the child mapper
    pub fn option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Resolved ordering index for `phase`
    pub fn index_for(&self, phase: Phase) -> i32 {
        self.index.as_ref().map_or(0, |i| i.for_phase(phase))
    }
}

impl fmt::Debug for MountOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountOptions")
            .field("prefix", &self.prefix)
            .field("foreign_key", &self.foreign_key)
            .field("mounter_foreign_key", &self.mounter_foreign_key)
            .field("index", &self.index)
            .field("key", &self.key)
            .field("custom_target", &self.target.is_some())
            .field("traits", &self.traits)
            .field("extra", &self.extra)
            .finish()
    }
}

/// Single child or ordered collection of children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    /// One child mapper
    Single,
    /// Ordered list of child mappers
    Collection,
}

/// A declared mounting
#[derive(Debug, Clone)]
pub struct MountDefinition {
    name: String,
    definition: Arc<MapperDefinition>,
    kind: MountKind,
    options: MountOptions,
}

impl MountDefinition {
    /// Mount name (also the association name used by the model extension)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Child definition
    pub fn definition(&self) -> &Arc<MapperDefinition> {
        &self.definition
    }

    /// Single or collection
    pub fn kind(&self) -> MountKind {
        self.kind
    }

    /// Mount options
    pub fn options(&self) -> &MountOptions {
        &self.options
    }
}

// ============================================================================
// Shared building blocks of definitions and traits
// ============================================================================

#[derive(Clone, Default)]
struct Parts {
    attributes: Vec<AttributeMapping>,
    mountings: Vec<MountDefinition>,
    validations: Vec<Validation>,
    before_validate: Vec<Hook>,
    before_save: Vec<Hook>,
}

impl Parts {
    fn check_unique_mounts(&self, mapper: &str) -> Result<()> {
        let mut seen = HashSet::new();
        for mount in &self.mountings {
            if !seen.insert(mount.name.as_str()) {
                return Err(ConfigurationError::DuplicateMount {
                    mapper: mapper.to_string(),
                    name: mount.name.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Merge `other` over `self`, replacing mountings by name
    fn merge(&mut self, other: &Parts) {
        self.attributes.extend(other.attributes.iter().cloned());
        for mount in &other.mountings {
            match self.mountings.iter_mut().find(|m| m.name == mount.name) {
                Some(existing) => *existing = mount.clone(),
                None => self.mountings.push(mount.clone()),
            }
        }
        self.validations.extend(other.validations.iter().cloned());
        self.before_validate.extend(other.before_validate.iter().cloned());
        self.before_save.extend(other.before_save.iter().cloned());
    }
}

macro_rules! parts_builder_methods {
    () => {
        /// Map an attribute
        pub fn attribute(mut self, mapping: AttributeMapping) -> Self {
            self.parts.attributes.push(mapping);
            self
        }

        /// Map several same-named attributes
        pub fn attributes<I, S>(mut self, names: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.parts
                .attributes
                .extend(names.into_iter().map(AttributeMapping::new));
            self
        }

        /// Mount a single child mapper
        pub fn mount(
            mut self,
            name: impl Into<String>,
            definition: Arc<MapperDefinition>,
            options: MountOptions,
        ) -> Self {
            self.parts.mountings.push(MountDefinition {
                name: name.into(),
                definition,
                kind: MountKind::Single,
                options,
            });
            self
        }

        /// Mount an ordered collection of child mappers
        pub fn mount_collection(
            mut self,
            name: impl Into<String>,
            definition: Arc<MapperDefinition>,
            options: MountOptions,
        ) -> Self {
            self.parts.mountings.push(MountDefinition {
                name: name.into(),
                definition,
                kind: MountKind::Collection,
                options,
            });
            self
        }

        /// Add a validation rule
        pub fn validate(mut self, validation: Validation) -> Self {
            self.parts.validations.push(validation);
            self
        }

        /// Run `hook` at the start of `validate`
        pub fn before_validate<F>(mut self, hook: F) -> Self
        where
            F: Fn(&mut Mapper) -> Result<()> + Send + Sync + 'static,
        {
            self.parts.before_validate.push(Arc::new(hook));
            self
        }

        /// Run `hook` at the start of `save`
        pub fn before_save<F>(mut self, hook: F) -> Self
        where
            F: Fn(&mut Mapper) -> Result<()> + Send + Sync + 'static,
        {
            self.parts.before_save.push(Arc::new(hook));
            self
        }
    };
}

// ============================================================================
// Traits
// ============================================================================

/// Named, additive variant of a mapper definition
#[derive(Clone)]
pub struct TraitDefinition {
    name: String,
    parts: Parts,
}

impl TraitDefinition {
    /// Empty trait
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parts: Parts::default(),
        }
    }

    /// Trait name
    pub fn name(&self) -> &str {
        &self.name
    }

    parts_builder_methods!();
}

impl fmt::Debug for TraitDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraitDefinition")
            .field("name", &self.name)
            .field("attributes", &self.parts.attributes.len())
            .field("mountings", &self.parts.mountings.len())
            .finish()
    }
}

// ============================================================================
// Mapper definitions
// ============================================================================

/// Static shape of a mapper
pub struct MapperDefinition {
    name: String,
    model: String,
    parts: Parts,
    traits: Vec<TraitDefinition>,
}

impl MapperDefinition {
    /// Start a definition named `name` whose default target model is `model`
    pub fn builder(name: impl Into<String>, model: impl Into<String>) -> MapperDefinitionBuilder {
        MapperDefinitionBuilder {
            name: name.into(),
            model: model.into(),
            parts: Parts::default(),
            traits: Vec::new(),
        }
    }

    /// Definition name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model of targets built by the default factory
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Base attribute mappings
    pub fn attributes(&self) -> &[AttributeMapping] {
        &self.parts.attributes
    }

    /// Base mountings
    pub fn mountings(&self) -> &[MountDefinition] {
        &self.parts.mountings
    }

    /// Declared trait names
    pub fn trait_names(&self) -> impl Iterator<Item = &str> {
        self.traits.iter().map(|t| t.name.as_str())
    }

    /// Effective shape with the requested traits merged in
    ///
    /// Requested names form a set: each active trait is merged once, in
    /// declaration order, whatever order the caller listed them in.
    ///
    /// # Errors
    ///
    /// `UnknownTrait` if a name is not declared on this definition.
    pub(crate) fn compose(&self, requested: &[String]) -> Result<Composition> {
        if let Some(name) = requested
            .iter()
            .find(|name| !self.traits.iter().any(|t| &t.name == *name))
        {
            return Err(ConfigurationError::UnknownTrait {
                mapper: self.name.clone(),
                name: name.clone(),
            }
            .into());
        }

        let mut parts = self.parts.clone();
        let mut traits = Vec::new();
        for t in self.traits.iter().filter(|t| requested.contains(&t.name)) {
            parts.merge(&t.parts);
            traits.push(t.name.clone());
        }
        Ok(Composition {
            traits,
            attributes: parts.attributes,
            mountings: parts.mountings,
            validations: parts.validations,
            before_validate: parts.before_validate,
            before_save: parts.before_save,
        })
    }
}

impl fmt::Debug for MapperDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperDefinition")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("attributes", &self.parts.attributes)
            .field(
                "mountings",
                &self.parts.mountings.iter().map(|m| &m.name).collect::<Vec<_>>(),
            )
            .field("traits", &self.traits)
            .finish()
    }
}

/// Builder for [`MapperDefinition`]
pub struct MapperDefinitionBuilder {
    name: String,
    model: String,
    parts: Parts,
    traits: Vec<TraitDefinition>,
}

impl MapperDefinitionBuilder {
    parts_builder_methods!();

    /// Declare a trait
    pub fn with_trait(mut self, definition: TraitDefinition) -> Self {
        self.traits.push(definition);
        self
    }

    /// Freeze the definition
    ///
    /// # Errors
    ///
    /// `DuplicateMount` when the base or a trait mounts a name twice,
    /// `DuplicateTrait` when a trait name repeats.
    pub fn build(self) -> Result<Arc<MapperDefinition>> {
        self.parts.check_unique_mounts(&self.name)?;
        let mut seen = HashSet::new();
        for t in &self.traits {
            if !seen.insert(t.name.as_str()) {
                return Err(ConfigurationError::DuplicateTrait {
                    mapper: self.name.clone(),
                    name: t.name.clone(),
                }
                .into());
            }
            t.parts.check_unique_mounts(&self.name)?;
        }
        Ok(Arc::new(MapperDefinition {
            name: self.name,
            model: self.model,
            parts: self.parts,
            traits: self.traits,
        }))
    }
}

/// A definition with its active traits merged in
pub(crate) struct Composition {
    pub(crate) traits: Vec<String>,
    pub(crate) attributes: Vec<AttributeMapping>,
    pub(crate) mountings: Vec<MountDefinition>,
    pub(crate) validations: Vec<Validation>,
    pub(crate) before_validate: Vec<Hook>,
    pub(crate) before_save: Vec<Hook>,
}

//! Mapper composition and persistence pipeline
//!
//! This crate maps flat params onto a tree of targets:
//! - Definitions: attribute mappings, mountings, validations, hooks, traits
//! - Mapper: the write / validate / save / apply lifecycle
//! - Mounting: single and collection children, skip, foreign keys
//! - Factory: target resolution for mounted children
//! - Extensions: decorator layers activated into an immutable `Context`
//!
//! The engine never talks to storage directly. Every read and write of
//! persisted state goes through the `PersistenceAdapter` held by the
//! context, and only the `model` extension uses it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod definition;
pub mod extension;
pub mod extensions;
pub mod factory;
pub mod layer;
pub mod mapper;
pub mod mounting;
mod routing;
pub mod validation;

pub use config::{ApplyConfig, EngineConfig, CONFIG_FILE_NAME};
pub use context::{Context, ContextBuilder, Settings};
pub use definition::{
    AttributeMapping, Hook, Index, MapperDefinition, MapperDefinitionBuilder, MountDefinition,
    MountKind, MountOptions, Options, Phase, TraitDefinition,
};
pub use extension::{Extension, ExtensionRegistry};
pub use factory::{ResolveKind, ResolveRequest, Resolution};
pub use layer::{FactoryLayer, MapperLayer, MountingLayer, Next};
pub use mapper::{Mapper, MapperState};
pub use mounting::Mounting;
pub use validation::{Rule, Validation};

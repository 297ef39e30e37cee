//! Built-in extensions
//!
//! - `skipping`: skipped mappers bypass validation and save
//! - `ordering`: sibling mountings run in ascending per-phase index order
//! - `model`: adapter integration (depends on both of the above)

pub mod model;
pub mod ordering;
pub mod skipping;

pub use model::{ModelFactoryLayer, ModelMapperLayer, MODEL};
pub use ordering::{OrderingLayer, ORDERING};
pub use skipping::{SkippingLayer, SKIPPING};

use crate::extension::Extension;

/// The built-in extensions, dependencies first
pub fn builtins() -> Vec<Extension> {
    vec![skipping::extension(), ordering::extension(), model::extension()]
}

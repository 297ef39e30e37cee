//! `skipping`: a skipped mapper never fails validation and never saves
//!
//! Descendants of a skipped node are not visited at all, so skipping a
//! mounting silences its whole subtree.

use formtree_core::Result;
use tracing::trace;

use crate::extension::Extension;
use crate::layer::{MapperLayer, Next};
use crate::mapper::Mapper;

/// Registry name
pub const SKIPPING: &str = "skipping";

/// Short-circuits `validate` and `save` on skipped mappers
#[derive(Debug, Default, Clone, Copy)]
pub struct SkippingLayer;

impl MapperLayer for SkippingLayer {
    fn validate(&self, mapper: &mut Mapper, next: Next<'_, bool>) -> Result<bool> {
        if mapper.is_skipped() {
            mapper.errors_mut().clear();
            trace!(target: "formtree::mapper", mapper = mapper.name(), "Validation skipped");
            return Ok(true);
        }
        next(mapper)
    }

    fn save(&self, mapper: &mut Mapper, next: Next<'_, bool>) -> Result<bool> {
        if mapper.is_skipped() {
            trace!(target: "formtree::mapper", mapper = mapper.name(), "Save skipped");
            return Ok(true);
        }
        next(mapper)
    }
}

pub(crate) fn extension() -> Extension {
    Extension::new(SKIPPING).mapper_layer(SkippingLayer)
}

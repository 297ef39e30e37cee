//! `ordering`: per-phase sibling order
//!
//! Each mounting may carry an [`Index`](crate::definition::Index); siblings
//! are sorted ascending by the index resolved for the current phase. The
//! sort is stable, so equal indexes keep declaration order.

use crate::definition::Phase;
use crate::extension::Extension;
use crate::layer::MapperLayer;
use crate::mapper::Mapper;

/// Registry name
pub const ORDERING: &str = "ordering";

/// Sorts mountings by resolved index
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderingLayer;

impl MapperLayer for OrderingLayer {
    fn order_mountings(&self, mapper: &Mapper, phase: Phase, order: &mut Vec<usize>) {
        let mountings = mapper.mountings();
        order.sort_by_key(|&i| mountings[i].index_for(phase));
    }
}

pub(crate) fn extension() -> Extension {
    Extension::new(ORDERING).mapper_layer(OrderingLayer)
}

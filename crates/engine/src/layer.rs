//! Decorator layers contributed by extensions
//!
//! Every extension may wrap three chains: mapper operations, mounting skip
//! and target resolution. A layer receives the operation's input plus a
//! `next` callback that runs the rest of the chain (older layers, then the
//! core behavior). Layers are installed in activation order and the most
//! recently activated layer runs first.
//!
//! All methods default to calling straight through, so a layer only
//! implements the operations it changes.

use std::sync::Arc;

use formtree_core::{Params, Result, Target};

use crate::context::Context;
use crate::definition::Phase;
use crate::factory::{ResolveRequest, Resolution};
use crate::mapper::Mapper;
use crate::mounting::Mounting;

/// Remainder of a mapper chain
pub type Next<'a, T> = &'a mut dyn FnMut(&mut Mapper) -> Result<T>;

/// Decorator over mapper operations
pub trait MapperLayer: Send + Sync {
    /// Wraps `validate`
    fn validate(&self, mapper: &mut Mapper, next: Next<'_, bool>) -> Result<bool> {
        next(mapper)
    }

    /// Wraps `save`
    fn save(&self, mapper: &mut Mapper, next: Next<'_, bool>) -> Result<bool> {
        next(mapper)
    }

    /// Wraps persisting the mapper's own target (the core does no I/O)
    fn save_target(&self, mapper: &mut Mapper, next: Next<'_, bool>) -> Result<bool> {
        next(mapper)
    }

    /// Wraps removal of a target dropped from a collection
    fn destroy_target(
        &self,
        ctx: &Context,
        target: &mut Target,
        next: &mut dyn FnMut(&mut Target) -> Result<()>,
    ) -> Result<()> {
        let _ = ctx;
        next(target)
    }

    /// Wraps `Mapper::skip` (the core sets the skip flag)
    fn skip(&self, mapper: &mut Mapper, next: &mut dyn FnMut(&mut Mapper)) {
        next(mapper)
    }

    /// Wraps `apply`
    fn apply(&self, mapper: &mut Mapper, params: &Params, next: Next<'_, bool>) -> Result<bool> {
        let _ = params;
        next(mapper)
    }

    /// Reorder the mapper's mountings for `phase`
    ///
    /// `order` holds mounting positions, initially in declaration order.
    /// Unlike the other methods this is not a chain: every active layer
    /// gets a turn, in activation order.
    fn order_mountings(&self, mapper: &Mapper, phase: Phase, order: &mut Vec<usize>) {
        let _ = (mapper, phase, order);
    }
}

/// Decorator over mounting skip
pub trait MountingLayer: Send + Sync {
    /// Wraps `Mounting::skip`
    fn skip(&self, ctx: &Context, mounting: &mut Mounting, next: &mut dyn FnMut(&mut Mounting)) {
        let _ = ctx;
        next(mounting)
    }
}

/// Decorator over target resolution
pub trait FactoryLayer: Send + Sync {
    /// Resolve the target(s) for `request`, or defer to `next`
    fn resolve(
        &self,
        ctx: &Context,
        request: &ResolveRequest<'_>,
        next: &mut dyn FnMut() -> Result<Resolution>,
    ) -> Result<Resolution> {
        let _ = (ctx, request);
        next()
    }
}

/// Run a mapper operation through `layers`, outermost (last) first
pub(crate) fn run_mapper_chain<T, F>(
    layers: &[Arc<dyn MapperLayer>],
    mapper: &mut Mapper,
    call: &F,
    core: &mut dyn FnMut(&mut Mapper) -> Result<T>,
) -> Result<T>
where
    F: Fn(&dyn MapperLayer, &mut Mapper, Next<'_, T>) -> Result<T>,
{
    match layers.split_last() {
        Some((outer, rest)) => call(outer.as_ref(), mapper, &mut |m: &mut Mapper| {
            run_mapper_chain(rest, m, call, core)
        }),
        None => core(mapper),
    }
}

/// Run `Mapper::skip` through `layers`, outermost (last) first
pub(crate) fn run_skip_chain(layers: &[Arc<dyn MapperLayer>], mapper: &mut Mapper) {
    match layers.split_last() {
        Some((outer, rest)) => {
            outer.skip(mapper, &mut |m: &mut Mapper| run_skip_chain(rest, m))
        }
        None => mapper.skip_core(),
    }
}

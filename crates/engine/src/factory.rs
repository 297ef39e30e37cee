//! Target factory
//!
//! Decides which target a mounted mapper wraps. Resolution order:
//! 1. the explicit target (the mount's `target` resolver)
//! 2. factory layers, most recently activated first
//! 3. a new bare target of the mounted definition's model (an empty list
//!    for collections)

use std::sync::Arc;

use formtree_core::{Result, Target};
use tracing::trace;

use crate::context::Context;
use crate::definition::MountOptions;
use crate::layer::FactoryLayer;

/// What the caller needs resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveKind {
    /// The target of a single mounting
    Single,
    /// The initial items of a collection mounting
    Collection,
    /// One new item appended to a collection
    NewItem,
}

/// Input to target resolution
#[derive(Debug)]
pub struct ResolveRequest<'a> {
    /// Target of the mounter (None for a root mapper)
    pub parent: Option<&'a Target>,
    /// Mounting name
    pub name: &'a str,
    /// Model of the mounted definition
    pub model: &'a str,
    /// Single, collection or new item
    pub kind: ResolveKind,
    /// Mount options
    pub options: &'a MountOptions,
}

/// Resolved target(s)
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// One target
    Single(Target),
    /// Ordered targets
    Collection(Vec<Target>),
}

impl Resolution {
    /// The single target, or the first of a list, or a new `model` target
    pub fn into_single(self, model: &str) -> Target {
        match self {
            Resolution::Single(target) => target,
            Resolution::Collection(targets) => targets
                .into_iter()
                .next()
                .unwrap_or_else(|| Target::new(model)),
        }
    }

    /// All resolved targets
    pub fn into_targets(self) -> Vec<Target> {
        match self {
            Resolution::Single(target) => vec![target],
            Resolution::Collection(targets) => targets,
        }
    }
}

/// Resolve `request` against the context's factory chain
///
/// # Errors
///
/// Whatever a factory layer returns (typically an adapter lookup failure).
pub fn resolve(ctx: &Context, request: &ResolveRequest<'_>) -> Result<Resolution> {
    // A new item is always fresh; the resolver names existing targets only.
    if request.kind != ResolveKind::NewItem {
        if let (Some(resolver), Some(parent)) = (&request.options.target, request.parent) {
            if let Some(target) = resolver(parent) {
                trace!(target: "formtree::mapper", mounting = request.name, "Explicit target");
                return Ok(match request.kind {
                    ResolveKind::Collection => Resolution::Collection(vec![target]),
                    _ => Resolution::Single(target),
                });
            }
        }
    }
    run_chain(ctx.factory_layers(), ctx, request)
}

fn run_chain(
    layers: &[Arc<dyn FactoryLayer>],
    ctx: &Context,
    request: &ResolveRequest<'_>,
) -> Result<Resolution> {
    match layers.split_last() {
        Some((outer, rest)) => outer.resolve(ctx, request, &mut || run_chain(rest, ctx, request)),
        None => Ok(fallback(request)),
    }
}

fn fallback(request: &ResolveRequest<'_>) -> Resolution {
    match request.kind {
        ResolveKind::Collection => Resolution::Collection(Vec::new()),
        ResolveKind::Single | ResolveKind::NewItem => Resolution::Single(Target::new(request.model)),
    }
}

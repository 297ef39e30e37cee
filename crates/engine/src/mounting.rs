//! Mountings: a mapper's owned children
//!
//! A [`Mounting`] pairs a mount declaration with the child mapper it
//! built (single) or the ordered child mappers it holds (collection).
//! Children are built at construction through the target factory;
//! collection items are also added and removed while params are written.
//! Removed items that were already persisted are kept until the next save
//! and then destroyed through the mapper chain.

use std::sync::Arc;

use formtree_core::{ConfigurationError, Errors, Params, Result, Target, TargetId, Value};
use tracing::{debug, trace};

use crate::context::Context;
use crate::definition::{MountDefinition, MountKind, MountOptions, Phase};
use crate::factory::{self, ResolveKind, ResolveRequest};
use crate::layer::{MapperLayer, MountingLayer};
use crate::mapper::Mapper;
use crate::routing::prefixed;

enum Content {
    Single(Box<Mapper>),
    Collection {
        items: Vec<Mapper>,
        removed: Vec<Target>,
        // Removed targets destroyed by the current transaction
        destroyed: Vec<Target>,
    },
}

/// A mounted child mapper, or an ordered collection of them
pub struct Mounting {
    ctx: Arc<Context>,
    definition: MountDefinition,
    content: Content,
    collection_key: String,
    skipped: bool,
}

impl Mounting {
    /// Resolve the target(s) and build the child mapper(s)
    pub(crate) fn build(
        ctx: &Arc<Context>,
        definition: MountDefinition,
        parent: &Target,
        mapper_prefix: Option<&str>,
    ) -> Result<Self> {
        let options = definition.options();
        let child = definition.definition();
        let request = ResolveRequest {
            parent: Some(parent),
            name: definition.name(),
            model: child.model(),
            kind: match definition.kind() {
                MountKind::Single => ResolveKind::Single,
                MountKind::Collection => ResolveKind::Collection,
            },
            options,
        };
        let resolution = factory::resolve(ctx, &request)?;

        let content = match definition.kind() {
            MountKind::Single => {
                let target = resolution.into_single(child.model());
                let mapper = Mapper::build(
                    Arc::clone(ctx),
                    Arc::clone(child),
                    target,
                    options.traits.clone(),
                    options.extra.clone(),
                    options.prefix.clone(),
                )?;
                Content::Single(Box::new(mapper))
            }
            MountKind::Collection => {
                let items = resolution
                    .into_targets()
                    .into_iter()
                    .map(|target| {
                        Mapper::build(
                            Arc::clone(ctx),
                            Arc::clone(child),
                            target,
                            options.traits.clone(),
                            options.extra.clone(),
                            None,
                        )
                    })
                    .collect::<Result<Vec<_>>>()?;
                Content::Collection {
                    items,
                    removed: Vec::new(),
                    destroyed: Vec::new(),
                }
            }
        };
        let collection_key = prefixed(
            mapper_prefix,
            options.key.as_deref().unwrap_or(definition.name()),
        );
        trace!(target: "formtree::mapper", mounting = definition.name(), "Mounting built");

        Ok(Self {
            ctx: Arc::clone(ctx),
            definition,
            content,
            collection_key,
            skipped: false,
        })
    }

    /// Mount name
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Single or collection
    pub fn kind(&self) -> MountKind {
        self.definition.kind()
    }

    /// Mount options
    pub fn options(&self) -> &MountOptions {
        self.definition.options()
    }

    /// Resolved ordering index for `phase`
    pub fn index_for(&self, phase: Phase) -> i32 {
        self.options().index_for(phase)
    }

    /// The child mapper of a single mounting
    pub fn mapper(&self) -> Option<&Mapper> {
        match &self.content {
            Content::Single(mapper) => Some(&**mapper),
            Content::Collection { .. } => None,
        }
    }

    /// Mutable child mapper of a single mounting
    pub fn mapper_mut(&mut self) -> Option<&mut Mapper> {
        match &mut self.content {
            Content::Single(mapper) => Some(&mut **mapper),
            Content::Collection { .. } => None,
        }
    }

    /// Every child mapper: the collection items in order, or the single child
    pub fn items(&self) -> &[Mapper] {
        match &self.content {
            Content::Single(mapper) => std::slice::from_ref(&**mapper),
            Content::Collection { items, .. } => items.as_slice(),
        }
    }

    /// Mutable access to every child mapper
    pub fn items_mut(&mut self) -> &mut [Mapper] {
        match &mut self.content {
            Content::Single(mapper) => std::slice::from_mut(&mut **mapper),
            Content::Collection { items, .. } => items.as_mut_slice(),
        }
    }

    /// Persisted targets removed from a collection, destroyed on the next save
    pub fn removed(&self) -> &[Target] {
        match &self.content {
            Content::Single(_) => &[],
            Content::Collection { removed, .. } => removed.as_slice(),
        }
    }

    /// Drop collection item `index`
    ///
    /// A persisted item is queued for destruction; a new one just vanishes.
    /// Returns false for single mountings and out-of-range indexes.
    pub fn remove_item(&mut self, index: usize) -> bool {
        let Content::Collection { items, removed, .. } = &mut self.content else {
            return false;
        };
        if index >= items.len() {
            return false;
        }
        let target = items.remove(index).into_target();
        debug!(
            target: "formtree::mapper",
            mounting = self.definition.name(),
            index,
            persisted = !target.is_new_record(),
            "Collection item removed"
        );
        if !target.is_new_record() {
            removed.push(target);
        }
        true
    }

    /// Skip the child subtree
    ///
    /// Mounting layers may refine this. Every child is skipped through
    /// [`Mapper::skip`], so mapper layers (the model extension's
    /// destroy-or-restore) apply to each item.
    pub fn skip(&mut self) {
        let ctx = Arc::clone(&self.ctx);
        run_skip_chain(ctx.mounting_layers(), &ctx, self);
        debug!(target: "formtree::mapper", mounting = self.definition.name(), "Mounting skipped");
    }

    /// Undo [`skip`](Self::skip) (restored attributes stay restored)
    pub fn unskip(&mut self) {
        self.skipped = false;
        for mapper in self.items_mut() {
            mapper.unskip();
        }
    }

    /// Whether the mounting is skipped
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    fn skip_core(&mut self) {
        self.skipped = true;
        for mapper in self.items_mut() {
            mapper.skip();
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle plumbing driven by the mounter
    // ------------------------------------------------------------------------

    /// External keys the mounter routes here
    pub(crate) fn route_keys(&self) -> Vec<String> {
        match &self.content {
            Content::Single(mapper) => mapper.route_keys().map(str::to_string).collect(),
            Content::Collection { .. } => vec![self.collection_key.clone()],
        }
    }

    pub(crate) fn write(&mut self, parent: &Target, params: &Params) -> Result<()> {
        if let Content::Single(mapper) = &mut self.content {
            return mapper.write(params);
        }
        match params.get(&self.collection_key) {
            Some(value) => self.write_collection(parent, value),
            None => Ok(()),
        }
    }

    fn write_collection(&mut self, parent: &Target, value: &Value) -> Result<()> {
        let entries: Vec<Params> = match value {
            Value::Array(items) => items.iter().filter_map(|v| v.as_object().cloned()).collect(),
            Value::Object(map) => {
                let mut indexed: Vec<(usize, Params)> = map
                    .iter()
                    .filter_map(|(k, v)| Some((k.parse().ok()?, v.as_object()?.clone())))
                    .collect();
                indexed.sort_by_key(|(i, _)| *i);
                indexed.into_iter().map(|(_, p)| p).collect()
            }
            other => {
                debug!(
                    target: "formtree::mapper",
                    mounting = self.definition.name(),
                    kind = other.type_name(),
                    "Ignoring collection value that is not a list"
                );
                return Ok(());
            }
        };

        for mut item in entries {
            let id = item.remove("id").and_then(|v| item_id(&v));
            let destroy = item.remove("_destroy").is_some_and(|v| v.is_truthy());
            match id {
                Some(id) => match self.position_of(id) {
                    Some(pos) if destroy => {
                        self.remove_item(pos);
                    }
                    Some(pos) => self.items_mut()[pos].write(&item)?,
                    None => debug!(
                        target: "formtree::mapper",
                        mounting = self.definition.name(),
                        id = %id,
                        "Ignoring item with unknown id"
                    ),
                },
                None if destroy => {}
                None => self.add_item(parent, &item)?,
            }
        }
        Ok(())
    }

    fn position_of(&self, id: TargetId) -> Option<usize> {
        self.items().iter().position(|m| m.target().id() == Some(id))
    }

    /// Append a new collection item bound to a freshly resolved target
    pub(crate) fn add_item(&mut self, parent: &Target, params: &Params) -> Result<()> {
        let Content::Collection { items, .. } = &mut self.content else {
            return Err(ConfigurationError::MountingKind {
                name: self.definition.name().to_string(),
                expected: "collection",
            }
            .into());
        };
        let child = self.definition.definition();
        let options = self.definition.options();
        let request = ResolveRequest {
            parent: Some(parent),
            name: self.definition.name(),
            model: child.model(),
            kind: ResolveKind::NewItem,
            options,
        };
        let target = factory::resolve(&self.ctx, &request)?.into_single(child.model());
        let mut mapper = Mapper::build(
            Arc::clone(&self.ctx),
            Arc::clone(child),
            target,
            options.traits.clone(),
            options.extra.clone(),
            None,
        )?;
        if self.skipped {
            mapper.skip();
        }
        mapper.write(params)?;
        items.push(mapper);
        debug!(
            target: "formtree::mapper",
            mounting = self.definition.name(),
            len = items.len(),
            "Collection item added"
        );
        Ok(())
    }

    pub(crate) fn validate(&mut self) -> Result<bool> {
        let mut valid = true;
        for mapper in self.items_mut() {
            valid &= mapper.validate()?;
        }
        Ok(valid)
    }

    pub(crate) fn save(&mut self) -> Result<bool> {
        if !self.skipped {
            if let Content::Collection {
                removed, destroyed, ..
            } = &mut self.content
            {
                while !removed.is_empty() {
                    let mut target = removed.remove(0);
                    if let Err(e) = destroy_target(&self.ctx, &mut target) {
                        removed.insert(0, target);
                        return Err(e);
                    }
                    destroyed.push(target);
                }
            }
        }
        for mapper in self.items_mut() {
            if !mapper.save()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Child errors, namespaced for the mounter
    ///
    /// Single children report under their own (prefixed) keys; collection
    /// items under `key.index.field`.
    pub(crate) fn collect_errors(&self, into: &mut Errors) {
        match &self.content {
            Content::Single(mapper) => into.merge(mapper.errors()),
            Content::Collection { items, .. } => {
                for (i, mapper) in items.iter().enumerate() {
                    for (field, messages) in mapper.errors().iter() {
                        for message in messages {
                            into.add(format!("{}.{}.{}", self.collection_key, i, field), message.clone());
                        }
                    }
                }
            }
        }
    }

    pub(crate) fn read_into(&self, out: &mut Params) {
        match &self.content {
            Content::Single(mapper) => out.extend(mapper.read()),
            Content::Collection { items, .. } => {
                let list = items
                    .iter()
                    .map(|mapper| {
                        let mut item = mapper.read();
                        if let Some(id) = mapper.target().id() {
                            item.insert("id".to_string(), Value::from(id));
                        }
                        Value::Object(item)
                    })
                    .collect();
                out.insert(self.collection_key.clone(), Value::Array(list));
            }
        }
    }

    /// Whether this child must be saved before its mounter
    pub(crate) fn saves_before_mounter(&self) -> bool {
        self.options().mounter_foreign_key.is_some() || self.index_for(Phase::Save) < 0
    }

    /// Id of a single child's target
    pub(crate) fn primary_id(&self) -> Option<TargetId> {
        self.mapper().and_then(|m| m.target().id())
    }

    pub(crate) fn assign_foreign_key(&mut self, field: &str, id: TargetId) {
        for mapper in self.items_mut() {
            mapper.target_mut().set(field, id);
        }
    }

    pub(crate) fn begin_save_tracking(&mut self) {
        if let Content::Collection { destroyed, .. } = &mut self.content {
            destroyed.clear();
        }
        for mapper in self.items_mut() {
            mapper.begin_save_tracking();
        }
    }

    /// Undo in-memory effects of a rolled back transaction
    ///
    /// Items destroyed in it are queued for destruction again.
    pub(crate) fn revert_saves(&mut self) {
        if let Content::Collection {
            removed, destroyed, ..
        } = &mut self.content
        {
            for mut target in destroyed.drain(..).rev() {
                target.unmark_for_destruction();
                removed.insert(0, target);
            }
        }
        for mapper in self.items_mut() {
            mapper.revert_saves();
        }
    }
}

impl std::fmt::Debug for Mounting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mounting")
            .field("name", &self.definition.name())
            .field("kind", &self.definition.kind())
            .field("items", &self.items().len())
            .field("removed", &self.removed().len())
            .field("skipped", &self.skipped)
            .finish()
    }
}

fn item_id(value: &Value) -> Option<TargetId> {
    value
        .as_int()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .map(TargetId)
}

fn run_skip_chain(layers: &[Arc<dyn MountingLayer>], ctx: &Context, mounting: &mut Mounting) {
    match layers.split_last() {
        Some((outer, rest)) => outer.skip(ctx, mounting, &mut |m: &mut Mounting| {
            run_skip_chain(rest, ctx, m)
        }),
        None => mounting.skip_core(),
    }
}

fn destroy_target(ctx: &Context, target: &mut Target) -> Result<()> {
    debug!(
        target: "formtree::mapper",
        model = target.model(),
        id = ?target.id(),
        "Destroying removed item"
    );
    run_destroy_chain(ctx.mapper_layers(), ctx, target)
}

fn run_destroy_chain(
    layers: &[Arc<dyn MapperLayer>],
    ctx: &Context,
    target: &mut Target,
) -> Result<()> {
    match layers.split_last() {
        Some((outer, rest)) => outer.destroy_target(ctx, target, &mut |t: &mut Target| {
            run_destroy_chain(rest, ctx, t)
        }),
        None => {
            target.mark_for_destruction();
            Ok(())
        }
    }
}

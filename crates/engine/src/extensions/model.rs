//! `model`: persistence adapter integration
//!
//! - Factory: mounted targets come from the parent's association when the
//!   adapter knows one (existing object first, otherwise a new one built
//!   through the association).
//! - Mapper: skipping destroys new targets and restores persisted ones.
//!   Own targets are saved through the adapter, removed collection items
//!   are deleted, and `save` and `apply` run inside an adapter transaction
//!   unless one is already open.
//!
//! Soft failures (`save_target` returning false, or a constraint
//! violation) become errors on the failing node. At the transaction
//! boundary they roll everything back and the operation returns
//! `Ok(false)`. Any other error also rolls back, then propagates.
//! Either way the tree's in-memory persistence state (ids, persisted
//! snapshots, pending deletes) is put back to what storage still holds.

use std::sync::Arc;

use formtree_core::{Cardinality, Error, Params, PersistenceAdapter, Result, Target};
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::extension::Extension;
use crate::factory::{ResolveKind, ResolveRequest, Resolution};
use crate::layer::{FactoryLayer, MapperLayer, Next};
use crate::mapper::Mapper;

use super::ordering::ORDERING;
use super::skipping::SKIPPING;

/// Registry name
pub const MODEL: &str = "model";

// ============================================================================
// Factory
// ============================================================================

/// Resolves mounted targets through adapter associations
#[derive(Debug, Default, Clone, Copy)]
pub struct ModelFactoryLayer;

impl FactoryLayer for ModelFactoryLayer {
    fn resolve(
        &self,
        ctx: &Context,
        request: &ResolveRequest<'_>,
        next: &mut dyn FnMut() -> Result<Resolution>,
    ) -> Result<Resolution> {
        let (Some(parent), Some(adapter)) = (request.parent, ctx.adapter()) else {
            return next();
        };
        let Some(association) = adapter.resolve_association(parent, request.name)? else {
            return next();
        };
        debug!(
            target: "formtree::mapper",
            association = %association.name,
            model = %association.model,
            existing = association.existing.len(),
            kind = ?request.kind,
            "Resolving through association"
        );

        Ok(match (request.kind, association.cardinality) {
            (ResolveKind::Single, Cardinality::One) => {
                let target = match association.existing.first() {
                    Some(existing) => existing.clone(),
                    None => association.build(parent),
                };
                Resolution::Single(target)
            }
            (ResolveKind::Single, Cardinality::Many) | (ResolveKind::NewItem, _) => {
                Resolution::Single(association.build(parent))
            }
            (ResolveKind::Collection, _) => Resolution::Collection(association.existing),
        })
    }
}

// ============================================================================
// Mapper
// ============================================================================

/// Adapter-backed saves, deletes and transactional apply
#[derive(Debug, Default, Clone, Copy)]
pub struct ModelMapperLayer;

impl MapperLayer for ModelMapperLayer {
    fn save_target(&self, mapper: &mut Mapper, next: Next<'_, bool>) -> Result<bool> {
        let adapter = mapper.context().require_adapter(MODEL)?;

        if mapper.target().is_marked_for_destruction() {
            if !adapter.is_new_record(mapper.target()) {
                adapter.delete_target(mapper.target_mut())?;
            }
            return Ok(true);
        }

        match adapter.save_target(mapper.target_mut()) {
            Ok(true) => next(mapper),
            Ok(false) => {
                let message = mapper.context().settings().save_failure_message.clone();
                debug!(target: "formtree::mapper", mapper = mapper.name(), "Adapter refused save");
                mapper.add_error(None, message);
                Ok(false)
            }
            Err(Error::ConstraintViolation { field, message, .. }) => {
                debug!(
                    target: "formtree::mapper",
                    mapper = mapper.name(),
                    field = ?field,
                    message = %message,
                    "Constraint violation"
                );
                mapper.add_error(field.as_deref(), message);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn destroy_target(
        &self,
        ctx: &Context,
        target: &mut Target,
        next: &mut dyn FnMut(&mut Target) -> Result<()>,
    ) -> Result<()> {
        let adapter = ctx.require_adapter(MODEL)?;
        if !adapter.is_new_record(target) {
            adapter.delete_target(target)?;
        }
        next(target)
    }

    fn skip(&self, mapper: &mut Mapper, next: &mut dyn FnMut(&mut Mapper)) {
        next(mapper);
        let ctx = Arc::clone(mapper.context());
        let Some(adapter) = ctx.adapter() else {
            return;
        };
        let target = mapper.target_mut();
        if adapter.is_new_record(target) {
            adapter.mark_destroyed(target);
        } else {
            adapter.restore_attributes(target);
        }
    }

    fn save(&self, mapper: &mut Mapper, next: Next<'_, bool>) -> Result<bool> {
        match transaction_adapter(mapper)? {
            Some(adapter) => in_transaction(adapter.as_ref(), mapper, "save", next),
            None => next(mapper),
        }
    }

    fn apply(&self, mapper: &mut Mapper, params: &Params, next: Next<'_, bool>) -> Result<bool> {
        match transaction_adapter(mapper)? {
            Some(adapter) => {
                debug!(target: "formtree::txn", mapper = mapper.name(), keys = params.len(), "Apply started");
                in_transaction(adapter.as_ref(), mapper, "apply", next)
            }
            None => next(mapper),
        }
    }
}

/// The adapter to open a transaction on, if this call should open one
///
/// None when transactions are off, the mapper is skipped (no adapter
/// call at all), or an outer `save`/`apply` already holds a transaction.
fn transaction_adapter(mapper: &Mapper) -> Result<Option<Arc<dyn PersistenceAdapter>>> {
    if !mapper.context().settings().transactional_apply || mapper.is_skipped() {
        return Ok(None);
    }
    let adapter = mapper.context().require_adapter(MODEL)?;
    if adapter.in_transaction() {
        return Ok(None);
    }
    Ok(Some(adapter))
}

fn in_transaction(
    adapter: &dyn PersistenceAdapter,
    mapper: &mut Mapper,
    operation: &'static str,
    next: Next<'_, bool>,
) -> Result<bool> {
    adapter.begin_transaction()?;
    mapper.begin_save_tracking();
    debug!(target: "formtree::txn", mapper = mapper.name(), operation, "Transaction started");

    match next(mapper) {
        Ok(true) => {
            if let Err(e) = adapter.commit() {
                mapper.revert_saves();
                return Err(e);
            }
            info!(target: "formtree::txn", mapper = mapper.name(), operation, "Committed");
            Ok(true)
        }
        Ok(false) => {
            rollback(adapter, mapper, operation)?;
            Ok(false)
        }
        Err(Error::ConstraintViolation { field, message, .. }) => {
            mapper.add_error(field.as_deref(), message);
            rollback(adapter, mapper, operation)?;
            Ok(false)
        }
        Err(e) => {
            if let Err(rollback_error) = adapter.rollback() {
                warn!(
                    target: "formtree::txn",
                    mapper = mapper.name(),
                    error = %rollback_error,
                    "Rollback after failed {} also failed",
                    operation
                );
            }
            mapper.revert_saves();
            warn!(target: "formtree::txn", mapper = mapper.name(), operation, error = %e, "Aborted");
            Err(e)
        }
    }
}

fn rollback(adapter: &dyn PersistenceAdapter, mapper: &mut Mapper, operation: &'static str) -> Result<()> {
    adapter.rollback()?;
    mapper.revert_saves();
    if mapper.errors().is_empty() {
        let message = mapper.context().settings().save_failure_message.clone();
        mapper.add_error(None, message);
    }
    warn!(
        target: "formtree::txn",
        mapper = mapper.name(),
        operation,
        errors = mapper.errors().len(),
        "Rolled back"
    );
    Ok(())
}

pub(crate) fn extension() -> Extension {
    Extension::new(MODEL)
        .depends_on(SKIPPING)
        .depends_on(ORDERING)
        .factory_layer(ModelFactoryLayer)
        .mapper_layer(ModelMapperLayer)
        .requires_adapter()
        .hooked(|settings| settings.transactional_apply = true)
}

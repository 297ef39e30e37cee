//! The mapper: one node of the tree
//!
//! A [`Mapper`] owns one target, the attribute mappings and validations of
//! its (trait-composed) definition, and its mountings. It runs the
//! lifecycle:
//!
//! ```text
//! write(params) ──► validate() ──► save()
//! └──────────────── apply(params) ───────┘   (transactional with `model`)
//! ```
//!
//! `validate`, `save`, `apply` and persisting the node's own target go
//! through the context's mapper layers. The `*_core` methods below are the
//! behavior at the bottom of each chain.
//!
//! # Save order
//!
//! 1. `before_save` hooks
//! 2. mountings that must exist first (`mounter_foreign_key`, or a
//!    negative save index); each child's id is copied into the mounter
//! 3. the node's own target
//! 4. remaining mountings, after the node's id is copied into their
//!    `foreign_key`
//!
//! Saving stops at the first failure; the failing child's errors are
//! merged into this node.

use std::fmt;
use std::sync::Arc;

use formtree_core::{ConfigurationError, Errors, Params, PersistedState, Result, Target};
use tracing::{debug, trace};

use crate::context::Context;
use crate::definition::{AttributeMapping, Hook, MapperDefinition, Options, Phase};
use crate::layer::{run_mapper_chain, run_skip_chain};
use crate::mounting::Mounting;
use crate::routing::{prefixed, Route, RoutingTable};
use crate::validation::Validation;

/// Where a mapper is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapperState {
    /// Constructed, nothing written
    Fresh,
    /// Params written
    Written,
    /// Last validation passed
    Validated,
    /// Last save succeeded
    Saved,
    /// Skipped; validation and save are bypassed
    Skipped,
}

/// One node of a mapper tree
pub struct Mapper {
    ctx: Arc<Context>,
    definition: Arc<MapperDefinition>,
    prefix: Option<String>,
    traits: Vec<String>,
    options: Options,
    attributes: Vec<AttributeMapping>,
    validations: Vec<Validation>,
    before_validate: Vec<Hook>,
    before_save: Vec<Hook>,
    mountings: Vec<Mounting>,
    routes: RoutingTable,
    target: Target,
    skipped: bool,
    errors: Errors,
    state: MapperState,
    saved_from: Option<PersistedState>,
}

impl Mapper {
    /// Root mapper over `target` with `traits` active
    ///
    /// Single mountings build their children immediately; collection
    /// mountings load their existing items.
    ///
    /// # Errors
    ///
    /// `UnknownTrait` for a trait the definition does not declare, or any
    /// error raised while resolving child targets.
    pub fn new(
        ctx: Arc<Context>,
        definition: Arc<MapperDefinition>,
        target: Target,
        traits: &[&str],
    ) -> Result<Self> {
        Self::with_options(ctx, definition, target, traits, Options::new())
    }

    /// Like [`new`](Self::new), with an option bag for extensions
    pub fn with_options(
        ctx: Arc<Context>,
        definition: Arc<MapperDefinition>,
        target: Target,
        traits: &[&str],
        options: Options,
    ) -> Result<Self> {
        let traits = traits.iter().map(|t| t.to_string()).collect();
        Self::build(ctx, definition, target, traits, options, None)
    }

    pub(crate) fn build(
        ctx: Arc<Context>,
        definition: Arc<MapperDefinition>,
        target: Target,
        traits: Vec<String>,
        options: Options,
        prefix: Option<String>,
    ) -> Result<Self> {
        let composition = definition.compose(&traits)?;
        let traits = composition.traits;

        let mut mountings = Vec::with_capacity(composition.mountings.len());
        for mount in composition.mountings {
            mountings.push(Mounting::build(&ctx, mount, &target, prefix.as_deref())?);
        }

        let mut routes = RoutingTable::new();
        for (i, attribute) in composition.attributes.iter().enumerate() {
            routes.add(
                prefixed(prefix.as_deref(), attribute.external_key()),
                Route::Attribute(i),
            );
        }
        for (i, mounting) in mountings.iter().enumerate() {
            for key in mounting.route_keys() {
                routes.add(key, Route::Mounting(i));
            }
        }

        trace!(
            target: "formtree::mapper",
            mapper = definition.name(),
            traits = ?traits,
            mountings = mountings.len(),
            "Mapper built"
        );

        Ok(Self {
            ctx,
            definition,
            prefix,
            traits,
            options,
            attributes: composition.attributes,
            validations: composition.validations,
            before_validate: composition.before_validate,
            before_save: composition.before_save,
            mountings,
            routes,
            target,
            skipped: false,
            errors: Errors::new(),
            state: MapperState::Fresh,
            saved_from: None,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Definition name
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// The (uncomposed) definition
    pub fn definition(&self) -> &Arc<MapperDefinition> {
        &self.definition
    }

    /// The context this mapper runs in
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Key prefix inherited from the mount
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Active trait names
    pub fn traits(&self) -> &[String] {
        &self.traits
    }

    /// Option bag
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Effective attribute mappings (base plus traits)
    pub fn attribute_mappings(&self) -> &[AttributeMapping] {
        &self.attributes
    }

    /// Wrapped target
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Mutable wrapped target
    pub fn target_mut(&mut self) -> &mut Target {
        &mut self.target
    }

    /// Consume the mapper, keeping its target
    pub fn into_target(self) -> Target {
        self.target
    }

    /// Errors from the last `validate`, `save` or `apply`
    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    /// Mutable errors
    pub fn errors_mut(&mut self) -> &mut Errors {
        &mut self.errors
    }

    /// Whether no errors are recorded
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Lifecycle state
    pub fn state(&self) -> MapperState {
        if self.skipped {
            MapperState::Skipped
        } else {
            self.state
        }
    }

    /// Effective mountings in declaration order
    pub fn mountings(&self) -> &[Mounting] {
        &self.mountings
    }

    /// Mounting by name
    ///
    /// # Errors
    ///
    /// `UnknownMounting` if no such mounting exists (with the active traits).
    pub fn mounting(&self, name: &str) -> Result<&Mounting> {
        self.mountings
            .iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| self.unknown_mounting(name))
    }

    /// Mutable mounting by name
    ///
    /// # Errors
    ///
    /// `UnknownMounting` if no such mounting exists.
    pub fn mounting_mut(&mut self, name: &str) -> Result<&mut Mounting> {
        match self.mountings.iter().position(|m| m.name() == name) {
            Some(i) => Ok(&mut self.mountings[i]),
            None => Err(self.unknown_mounting(name)),
        }
    }

    fn unknown_mounting(&self, name: &str) -> formtree_core::Error {
        ConfigurationError::UnknownMounting {
            mapper: self.definition.name().to_string(),
            name: name.to_string(),
        }
        .into()
    }

    /// Append an item to collection mounting `name`, writing `params` to it
    ///
    /// # Errors
    ///
    /// `UnknownMounting`, `MountingKind` for a single mounting, or a
    /// target resolution failure.
    pub fn add_item(&mut self, name: &str, params: &Params) -> Result<()> {
        let i = self
            .mountings
            .iter()
            .position(|m| m.name() == name)
            .ok_or_else(|| self.unknown_mounting(name))?;
        self.mountings[i].add_item(&self.target, params)
    }

    // ========================================================================
    // Skip
    // ========================================================================

    /// Mark this node skipped
    ///
    /// Runs through the mapper layers; with the model extension a new
    /// target is marked destroyed and a persisted one is restored.
    pub fn skip(&mut self) {
        let ctx = Arc::clone(&self.ctx);
        run_skip_chain(ctx.mapper_layers(), self);
        debug!(target: "formtree::mapper", mapper = self.name(), "Skipped");
    }

    pub(crate) fn skip_core(&mut self) {
        self.skipped = true;
    }

    /// Clear the skip flag, here and below
    pub fn unskip(&mut self) {
        if self.skipped {
            self.target.unmark_for_destruction();
        }
        self.skipped = false;
        for mounting in &mut self.mountings {
            if mounting.is_skipped() {
                mounting.unskip();
            }
        }
    }

    /// Whether this node is skipped
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    // ========================================================================
    // Errors
    // ========================================================================

    /// Record an error against `attribute` (its external key), or the base key
    pub fn add_error(&mut self, attribute: Option<&str>, message: impl Into<String>) {
        let key = match attribute {
            Some(attribute) => self.error_key(attribute),
            None => self.ctx.settings().base_error_key.clone(),
        };
        self.errors.add(key, message);
    }

    /// External key errors for `attribute` are reported under
    pub fn error_key(&self, attribute: &str) -> String {
        let key = self
            .attributes
            .iter()
            .find(|a| a.attribute() == attribute)
            .map_or(attribute, |a| a.external_key());
        prefixed(self.prefix.as_deref(), key)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Distribute `params` over attributes and mountings
    ///
    /// Keys nobody consumes are ignored.
    ///
    /// # Errors
    ///
    /// Only target resolution failures for new collection items.
    pub fn write(&mut self, params: &Params) -> Result<()> {
        let mut writes = Vec::new();
        let mut forwarded: Vec<Params> = vec![Params::new(); self.mountings.len()];
        for (key, value) in params {
            for route in self.routes.lookup(key) {
                match *route {
                    Route::Attribute(i) => writes.push((i, value.clone())),
                    Route::Mounting(i) => {
                        forwarded[i].insert(key.clone(), value.clone());
                    }
                }
            }
        }

        // Declaration order, so the last declared mapping wins on conflicts.
        writes.sort_by_key(|(i, _)| *i);
        for (i, value) in writes {
            self.attributes[i].write(&mut self.target, value);
        }

        for (mounting, sub) in self.mountings.iter_mut().zip(forwarded) {
            if !sub.is_empty() {
                mounting.write(&self.target, &sub)?;
            }
        }

        if !self.skipped {
            self.state = MapperState::Written;
        }
        trace!(target: "formtree::mapper", mapper = self.name(), keys = params.len(), "Written");
        Ok(())
    }

    /// Validate this node and its mountings
    ///
    /// # Errors
    ///
    /// Errors returned by hooks or layers; validation failures are
    /// `Ok(false)` with [`errors`](Self::errors) populated.
    pub fn validate(&mut self) -> Result<bool> {
        let ctx = Arc::clone(&self.ctx);
        let valid = run_mapper_chain(
            ctx.mapper_layers(),
            self,
            &|layer, m, next| layer.validate(m, next),
            &mut |m: &mut Mapper| m.validate_core(),
        )?;
        if valid && !self.skipped {
            self.state = MapperState::Validated;
        }
        debug!(
            target: "formtree::mapper",
            mapper = self.name(),
            valid,
            errors = self.errors.len(),
            "Validated"
        );
        Ok(valid)
    }

    /// Persist this node and its mountings, without validating
    ///
    /// # Errors
    ///
    /// Adapter errors that are not recoverable. Recoverable failures are
    /// `Ok(false)` with errors recorded.
    pub fn save(&mut self) -> Result<bool> {
        let ctx = Arc::clone(&self.ctx);
        let saved = run_mapper_chain(
            ctx.mapper_layers(),
            self,
            &|layer, m, next| layer.save(m, next),
            &mut |m: &mut Mapper| m.save_core(),
        )?;
        if saved && !self.skipped {
            self.state = MapperState::Saved;
        }
        debug!(target: "formtree::mapper", mapper = self.name(), saved, "Saved");
        Ok(saved)
    }

    /// Write, then validate, then save if valid
    ///
    /// With the `model` extension the sequence runs in one adapter
    /// transaction and recoverable failures roll it back.
    ///
    /// # Errors
    ///
    /// Configuration errors and unrecoverable adapter errors.
    pub fn apply(&mut self, params: &Params) -> Result<bool> {
        let ctx = Arc::clone(&self.ctx);
        run_mapper_chain(
            ctx.mapper_layers(),
            self,
            &|layer, m, next| layer.apply(m, params, next),
            &mut |m: &mut Mapper| m.apply_core(params),
        )
    }

    /// Flat params of every attribute in the tree
    ///
    /// Collections read as a list of objects, persisted items carrying `id`.
    pub fn read(&self) -> Params {
        let mut out = Params::new();
        for attribute in &self.attributes {
            out.insert(
                prefixed(self.prefix.as_deref(), attribute.external_key()),
                attribute.read(&self.target),
            );
        }
        for mounting in &self.mountings {
            mounting.read_into(&mut out);
        }
        out
    }

    // ========================================================================
    // Chain cores
    // ========================================================================

    fn validate_core(&mut self) -> Result<bool> {
        self.errors.clear();
        let hooks = self.before_validate.clone();
        for hook in &hooks {
            hook(self)?;
        }

        for validation in &self.validations {
            if let Some(message) = validation.check(&self.target) {
                let key = self.error_key(validation.attribute());
                self.errors.add(key, message);
            }
        }

        let mut valid = true;
        for i in self.mounting_order(Phase::Validate) {
            valid &= self.mountings[i].validate()?;
            self.mountings[i].collect_errors(&mut self.errors);
        }
        Ok(valid && self.errors.is_empty())
    }

    fn save_core(&mut self) -> Result<bool> {
        let hooks = self.before_save.clone();
        for hook in &hooks {
            hook(self)?;
        }

        let (before, after): (Vec<usize>, Vec<usize>) = self
            .mounting_order(Phase::Save)
            .into_iter()
            .partition(|&i| self.mountings[i].saves_before_mounter());

        for i in before {
            if !self.save_mounting(i)? {
                return Ok(false);
            }
            let field = self.mountings[i].options().mounter_foreign_key.clone();
            if let (Some(field), Some(id)) = (field, self.mountings[i].primary_id()) {
                trace!(target: "formtree::mapper", mapper = self.name(), field = %field, id = %id, "Mounter foreign key set");
                self.target.set(field, id);
            }
        }

        if !self.save_own_target()? {
            return Ok(false);
        }

        let parent_id = self.target.id();
        for i in after {
            let field = self.mountings[i].options().foreign_key.clone();
            if let (Some(field), Some(id)) = (field, parent_id) {
                self.mountings[i].assign_foreign_key(&field, id);
            }
            if !self.save_mounting(i)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn apply_core(&mut self, params: &Params) -> Result<bool> {
        self.write(params)?;
        if !self.validate()? {
            return Ok(false);
        }
        self.save()
    }

    fn save_mounting(&mut self, i: usize) -> Result<bool> {
        let saved = self.mountings[i].save()?;
        if !saved {
            self.mountings[i].collect_errors(&mut self.errors);
        }
        Ok(saved)
    }

    fn save_own_target(&mut self) -> Result<bool> {
        let ctx = Arc::clone(&self.ctx);
        let before = self.target.persisted_state();
        let saved = run_mapper_chain(
            ctx.mapper_layers(),
            self,
            &|layer, m, next| layer.save_target(m, next),
            &mut |_: &mut Mapper| Ok(true),
        )?;
        // Keep the oldest state: a node saved twice reverts to before the first.
        if self.saved_from.is_none() && self.target.persisted_state() != before {
            self.saved_from = Some(before);
        }
        Ok(saved)
    }

    fn mounting_order(&self, phase: Phase) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.mountings.len()).collect();
        for layer in self.ctx.mapper_layers() {
            layer.order_mountings(self, phase, &mut order);
        }
        order
    }

    // ========================================================================
    // Extension support
    // ========================================================================

    /// External keys this mapper accepts
    pub(crate) fn route_keys(&self) -> impl Iterator<Item = &str> {
        self.routes.keys()
    }

    /// Start recording saves for a new transaction, here and below
    pub(crate) fn begin_save_tracking(&mut self) {
        self.saved_from = None;
        for mounting in &mut self.mountings {
            mounting.begin_save_tracking();
        }
    }

    /// Undo the in-memory effects of saves since
    /// [`begin_save_tracking`](Self::begin_save_tracking), here and below
    ///
    /// Ids handed out are dropped and persisted snapshots go back to what
    /// storage still holds. Attribute values are kept.
    pub(crate) fn revert_saves(&mut self) {
        if let Some(state) = self.saved_from.take() {
            self.target.revert_persistence(state);
        }
        if self.state == MapperState::Saved {
            self.state = MapperState::Validated;
        }
        for mounting in &mut self.mountings {
            mounting.revert_saves();
        }
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("name", &self.definition.name())
            .field("prefix", &self.prefix)
            .field("traits", &self.traits)
            .field("target", &self.target)
            .field("mountings", &self.mountings)
            .field("state", &self.state())
            .field("errors", &self.errors)
            .finish()
    }
}

//! Core traits for the persistence boundary
//!
//! This module defines the [`PersistenceAdapter`] trait: the only place a
//! mapper tree touches storage. Swapping the adapter (an in-memory store for
//! tests, a relational store in production) never changes the mapper
//! pipeline above it.
//!
//! Thread safety: adapters are shared by reference between the context and
//! every mapper built from it, so methods take `&self` and implementations
//! use interior mutability (requires Send + Sync).

use crate::error::Result;
use crate::target::Target;

/// How many objects an association holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// `has_one` / `belongs_to`
    One,
    /// `has_many`
    Many,
}

/// Which side of an association stores the foreign key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyOwner {
    /// The associated object references the owner (`has_one`, `has_many`)
    Associated,
    /// The owner references the associated object (`belongs_to`)
    Owner,
}

/// Association metadata and the objects it currently holds
#[derive(Debug, Clone, PartialEq)]
pub struct Association {
    /// Association name on the owner's model
    pub name: String,
    /// Model of the associated objects
    pub model: String,
    /// To-one or to-many
    pub cardinality: Cardinality,
    /// Foreign key column
    pub foreign_key: String,
    /// Side storing the foreign key
    pub foreign_key_owner: ForeignKeyOwner,
    /// Objects currently associated with the owner (empty for new owners)
    pub existing: Vec<Target>,
}

impl Association {
    /// Build a new, unsaved object for this association
    ///
    /// For associations where the associated side carries the key and the
    /// owner is persisted, the key is pre-filled.
    pub fn build(&self, owner: &Target) -> Target {
        let mut target = Target::new(self.model.clone());
        if self.foreign_key_owner == ForeignKeyOwner::Associated {
            if let Some(id) = owner.id() {
                target.set(self.foreign_key.clone(), id);
            }
        }
        target
    }
}

/// Storage contract consumed by the mapper pipeline
///
/// # Soft failures
///
/// `save_target` reports expected data failures either by returning
/// `Ok(false)` or by returning [`Error::ConstraintViolation`]. Both are
/// converted into a rollback plus a failed `apply`. Any other error is
/// treated as a contract violation and propagates.
///
/// [`Error::ConstraintViolation`]: crate::Error::ConstraintViolation
pub trait PersistenceAdapter: Send + Sync {
    /// Open the atomic scope wrapping `save` or `apply`
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction is already open.
    fn begin_transaction(&self) -> Result<()>;

    /// Whether a transaction opened by `begin_transaction` is still open
    fn in_transaction(&self) -> bool;

    /// Make every write since `begin_transaction` durable
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open.
    fn commit(&self) -> Result<()>;

    /// Discard every write since `begin_transaction`
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open.
    fn rollback(&self) -> Result<()>;

    /// Persist one target, assigning its id on first save
    ///
    /// # Errors
    ///
    /// `ConstraintViolation` for expected data failures, anything else for
    /// storage faults.
    fn save_target(&self, target: &mut Target) -> Result<bool>;

    /// Whether the target has never been persisted
    fn is_new_record(&self, target: &Target) -> bool {
        target.is_new_record()
    }

    /// Restore the target's attributes to their last persisted state
    fn restore_attributes(&self, target: &mut Target) {
        target.restore_attributes();
    }

    /// Flag a target so it is never persisted (or is removed) by this operation
    fn mark_destroyed(&self, target: &mut Target) {
        target.mark_for_destruction();
    }

    /// Association `name` declared on `owner`'s model, with its current objects
    ///
    /// Returns `Ok(None)` when the model declares no such association.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails.
    fn resolve_association(&self, owner: &Target, name: &str) -> Result<Option<Association>>;

    /// Remove a persisted target from storage
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_target(&self, target: &mut Target) -> Result<()>;
}

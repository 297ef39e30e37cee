//! MemoryStore: in-memory reference persistence adapter
//!
//! Implements [`PersistenceAdapter`] over [`Tables`] guarded by
//! `parking_lot` locks. Constraint checks (`not_null`, `unique`) run on
//! every save and surface as `Error::ConstraintViolation`, the recoverable
//! class the mapper's transaction boundary converts into a failed `apply`.
//!
//! Outside a transaction every save is applied immediately (autocommit).

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use formtree_core::{
    Association, Error, ForeignKeyOwner, PersistenceAdapter, Result, Target, TargetId, Value,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::schema::Schema;
use crate::table::{StoredRow, Tables};
use crate::transaction::OpenTransaction;

/// One entry of the save log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRecord {
    /// Model saved
    pub model: String,
    /// Id after the save
    pub id: TargetId,
    /// Whether the save inserted a new row
    pub inserted: bool,
}

/// In-memory persistence adapter
#[derive(Debug)]
pub struct MemoryStore {
    schema: Schema,
    tables: RwLock<Tables>,
    transaction: Mutex<Option<OpenTransaction>>,
    save_log: Mutex<Vec<SaveRecord>>,
    fail_next_save: Mutex<HashSet<String>>,
    total_committed: AtomicU64,
    total_aborted: AtomicU64,
}

impl MemoryStore {
    /// Empty store over `schema`
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            tables: RwLock::new(Tables::default()),
            transaction: Mutex::new(None),
            save_log: Mutex::new(Vec::new()),
            fail_next_save: Mutex::new(HashSet::new()),
            total_committed: AtomicU64::new(0),
            total_aborted: AtomicU64::new(0),
        }
    }

    /// Schema the store validates against
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Seed a row directly, bypassing the mapper pipeline
    pub fn insert(&self, model: &str, attributes: BTreeMap<String, Value>) -> TargetId {
        self.tables.write().insert(model, attributes)
    }

    /// Load a row as a persisted target
    pub fn find(&self, model: &str, id: TargetId) -> Option<Target> {
        self.tables
            .read()
            .get(model, id)
            .map(|row| Self::to_target(model, row))
    }

    /// All rows of a model as persisted targets, in id order
    pub fn all(&self, model: &str) -> Vec<Target> {
        self.tables
            .read()
            .scan(model)
            .map(|row| Self::to_target(model, row))
            .collect()
    }

    /// Number of rows of a model
    pub fn count(&self, model: &str) -> usize {
        self.tables.read().count(model)
    }

    /// Every successful save since creation (or the last `clear_save_log`)
    ///
    /// Saves rolled back by a transaction stay in the log.
    pub fn save_log(&self) -> Vec<SaveRecord> {
        self.save_log.lock().clone()
    }

    /// Models of the save log, in order
    pub fn saved_models(&self) -> Vec<String> {
        self.save_log.lock().iter().map(|r| r.model.clone()).collect()
    }

    /// Forget the save log
    pub fn clear_save_log(&self) {
        self.save_log.lock().clear();
    }

    /// Make the next save of `model` report a soft failure (`Ok(false)`)
    pub fn fail_next_save(&self, model: impl Into<String>) {
        self.fail_next_save.lock().insert(model.into());
    }

    /// Whether a transaction is open
    pub fn in_transaction(&self) -> bool {
        self.transaction.lock().is_some()
    }

    /// Committed transaction count
    pub fn total_committed(&self) -> u64 {
        self.total_committed.load(Ordering::Relaxed)
    }

    /// Rolled back transaction count
    pub fn total_aborted(&self) -> u64 {
        self.total_aborted.load(Ordering::Relaxed)
    }

    fn to_target(model: &str, row: &StoredRow) -> Target {
        Target::persisted(model, row.id, row.attributes.clone())
    }

    fn check_constraints(&self, tables: &Tables, target: &Target) -> Result<()> {
        let Some(model) = self.schema.get(target.model()) else {
            return Err(Error::Adapter(format!(
                "model '{}' is not declared in the store schema",
                target.model()
            )));
        };

        for column in model.not_null_columns() {
            if target.get(column).is_null() {
                return Err(Error::constraint(
                    target.model(),
                    Some(column),
                    "can't be null",
                ));
            }
        }

        for column in model.unique_columns() {
            let value = target.get(column);
            if value.is_null() {
                continue;
            }
            let taken = tables
                .find_by(target.model(), column, &value)
                .any(|row| Some(row.id) != target.id());
            if taken {
                return Err(Error::constraint(
                    target.model(),
                    Some(column),
                    "has already been taken",
                ));
            }
        }
        Ok(())
    }
}

impl PersistenceAdapter for MemoryStore {
    fn in_transaction(&self) -> bool {
        MemoryStore::in_transaction(self)
    }

    fn begin_transaction(&self) -> Result<()> {
        let mut slot = self.transaction.lock();
        if slot.is_some() {
            return Err(Error::Transaction(
                "a transaction is already open on this store".to_string(),
            ));
        }
        let txn = OpenTransaction::begin(&self.tables.read());
        debug!(target: "formtree::store", txn = %txn.id(), "Transaction started");
        *slot = Some(txn);
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let txn = self
            .transaction
            .lock()
            .take()
            .ok_or_else(|| Error::Transaction("commit without an open transaction".to_string()))?;
        let id = txn.id();
        txn.commit();
        self.total_committed.fetch_add(1, Ordering::Relaxed);
        info!(target: "formtree::store", txn = %id, "Transaction committed");
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        let txn = self.transaction.lock().take().ok_or_else(|| {
            Error::Transaction("rollback without an open transaction".to_string())
        })?;
        let id = txn.id();
        let (_, snapshot) = txn.abort();
        *self.tables.write() = snapshot;
        self.total_aborted.fetch_add(1, Ordering::Relaxed);
        warn!(target: "formtree::store", txn = %id, "Transaction rolled back");
        Ok(())
    }

    fn save_target(&self, target: &mut Target) -> Result<bool> {
        if self.fail_next_save.lock().remove(target.model()) {
            debug!(target: "formtree::store", model = target.model(), "Injected save failure");
            return Ok(false);
        }

        let mut tables = self.tables.write();
        self.check_constraints(&tables, target)?;

        let attributes = target.attributes().clone();
        let (id, inserted) = match target.id() {
            Some(id) => {
                if !tables.update(target.model(), id, attributes) {
                    return Err(Error::Adapter(format!(
                        "{} {} no longer exists",
                        target.model(),
                        id
                    )));
                }
                (id, false)
            }
            None => (tables.insert(target.model(), attributes), true),
        };
        drop(tables);

        target.mark_persisted(id);
        debug!(target: "formtree::store", model = target.model(), id = %id, inserted, "Saved target");
        self.save_log.lock().push(SaveRecord {
            model: target.model().to_string(),
            id,
            inserted,
        });
        Ok(true)
    }

    fn resolve_association(&self, owner: &Target, name: &str) -> Result<Option<Association>> {
        let Some(assoc) = self
            .schema
            .get(owner.model())
            .and_then(|m| m.association_named(name))
        else {
            return Ok(None);
        };

        let tables = self.tables.read();
        let existing: Vec<Target> = match assoc.foreign_key_owner {
            ForeignKeyOwner::Associated => match owner.id() {
                Some(id) => {
                    let key = Value::from(id);
                    tables
                        .find_by(&assoc.model, &assoc.foreign_key, &key)
                        .map(|row| Self::to_target(&assoc.model, row))
                        .collect()
                }
                None => Vec::new(),
            },
            ForeignKeyOwner::Owner => match owner.get(&assoc.foreign_key).as_int() {
                Some(raw) => tables
                    .get(&assoc.model, TargetId(raw))
                    .map(|row| Self::to_target(&assoc.model, row))
                    .into_iter()
                    .collect(),
                None => Vec::new(),
            },
        };

        Ok(Some(Association {
            name: assoc.name.clone(),
            model: assoc.model.clone(),
            cardinality: assoc.cardinality,
            foreign_key: assoc.foreign_key.clone(),
            foreign_key_owner: assoc.foreign_key_owner,
            existing,
        }))
    }

    fn delete_target(&self, target: &mut Target) -> Result<()> {
        if let Some(id) = target.id() {
            self.tables.write().delete(target.model(), id);
            debug!(target: "formtree::store", model = target.model(), id = %id, "Deleted target");
        }
        target.mark_for_destruction();
        Ok(())
    }
}

//! Target objects
//!
//! A [`Target`] is the domain object one mapper node reads from and writes
//! to. It is a detached record: a model name, an optional storage id, the
//! current attribute values and a snapshot of what was last persisted. The
//! snapshot is what makes skip semantics possible (restore an existing
//! record, destroy a new one) without asking the adapter to reload.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Storage identifier assigned by the persistence adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(pub i64);

impl TargetId {
    /// Raw integer id
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TargetId> for Value {
    fn from(id: TargetId) -> Self {
        Value::Int(id.0)
    }
}

/// Storage identity of a target at one point in time
///
/// Taken before a save so a rolled back transaction can put the target's
/// id and persisted snapshot back without touching its current values.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedState {
    id: Option<TargetId>,
    snapshot: Option<BTreeMap<String, Value>>,
    marked_for_destruction: bool,
}

/// Domain object wrapped by a mapper node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    model: String,
    id: Option<TargetId>,
    attributes: BTreeMap<String, Value>,
    persisted: Option<BTreeMap<String, Value>>,
    marked_for_destruction: bool,
}

impl Target {
    /// A new, unsaved target of the given model
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            id: None,
            attributes: BTreeMap::new(),
            persisted: None,
            marked_for_destruction: false,
        }
    }

    /// A target loaded from storage
    ///
    /// The given attributes become both the current values and the
    /// persisted snapshot.
    pub fn persisted(
        model: impl Into<String>,
        id: TargetId,
        attributes: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            model: model.into(),
            id: Some(id),
            persisted: Some(attributes.clone()),
            attributes,
            marked_for_destruction: false,
        }
    }

    /// Builder-style attribute assignment
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Storage id, `None` until first saved
    pub fn id(&self) -> Option<TargetId> {
        self.id
    }

    /// Current value of an attribute (`Null` when unset)
    pub fn get(&self, name: &str) -> Value {
        self.attributes.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Set an attribute
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// All current attributes
    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Whether the target has never been persisted
    pub fn is_new_record(&self) -> bool {
        self.persisted.is_none()
    }

    /// Attributes whose current value differs from the persisted snapshot
    ///
    /// Every attribute counts as changed on a new record.
    pub fn changes(&self) -> BTreeMap<String, Value> {
        match &self.persisted {
            None => self.attributes.clone(),
            Some(snapshot) => self
                .attributes
                .iter()
                .filter(|(k, v)| snapshot.get(*k) != Some(*v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Whether any attribute changed since the last persist
    pub fn is_changed(&self) -> bool {
        !self.changes().is_empty()
    }

    /// Undo uncommitted writes
    ///
    /// No-op on new records: there is nothing persisted to go back to.
    pub fn restore_attributes(&mut self) {
        if let Some(snapshot) = &self.persisted {
            self.attributes = snapshot.clone();
        }
    }

    /// Flag the target for deletion on the next save
    pub fn mark_for_destruction(&mut self) {
        self.marked_for_destruction = true;
    }

    /// Clear a deletion flag
    pub fn unmark_for_destruction(&mut self) {
        self.marked_for_destruction = false;
    }

    /// Whether the target was flagged for deletion
    pub fn is_marked_for_destruction(&self) -> bool {
        self.marked_for_destruction
    }

    /// Record a successful persist under `id`
    pub fn mark_persisted(&mut self, id: TargetId) {
        self.id = Some(id);
        self.persisted = Some(self.attributes.clone());
    }

    /// Capture the id, persisted snapshot and deletion flag
    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            id: self.id,
            snapshot: self.persisted.clone(),
            marked_for_destruction: self.marked_for_destruction,
        }
    }

    /// Put back a state captured by [`persisted_state`](Self::persisted_state)
    ///
    /// Current attribute values are kept, so changes written since then
    /// show up in [`changes`](Self::changes) again.
    pub fn revert_persistence(&mut self, state: PersistedState) {
        self.id = state.id;
        self.persisted = state.snapshot;
        self.marked_for_destruction = state.marked_for_destruction;
    }
}

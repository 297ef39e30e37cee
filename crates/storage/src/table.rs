//! Row storage
//!
//! `Tables` holds one ordered table per model plus the id sequence of each
//! model. Ids are never reused, even after a delete; a rolled back
//! transaction restores the sequence along with the rows.

use chrono::{DateTime, Utc};
use formtree_core::{TargetId, Value};
use std::collections::BTreeMap;

/// A stored row
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    /// Row id
    pub id: TargetId,
    /// Column values
    pub attributes: BTreeMap<String, Value>,
    /// Insert time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// All tables of a store
#[derive(Debug, Clone, Default)]
pub struct Tables {
    rows: BTreeMap<String, BTreeMap<TargetId, StoredRow>>,
    sequences: BTreeMap<String, i64>,
}

impl Tables {
    /// Insert a new row, returning its id
    pub fn insert(&mut self, model: &str, attributes: BTreeMap<String, Value>) -> TargetId {
        let seq = self.sequences.entry(model.to_string()).or_insert(0);
        *seq += 1;
        let id = TargetId(*seq);
        let now = Utc::now();
        self.rows.entry(model.to_string()).or_default().insert(
            id,
            StoredRow {
                id,
                attributes,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// Overwrite the columns of an existing row
    ///
    /// Returns false if the row does not exist.
    pub fn update(&mut self, model: &str, id: TargetId, attributes: BTreeMap<String, Value>) -> bool {
        match self.rows.get_mut(model).and_then(|t| t.get_mut(&id)) {
            Some(row) => {
                row.attributes = attributes;
                row.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Remove a row
    pub fn delete(&mut self, model: &str, id: TargetId) -> Option<StoredRow> {
        self.rows.get_mut(model).and_then(|t| t.remove(&id))
    }

    /// Row by id
    pub fn get(&self, model: &str, id: TargetId) -> Option<&StoredRow> {
        self.rows.get(model).and_then(|t| t.get(&id))
    }

    /// Rows of a model in id order
    pub fn scan(&self, model: &str) -> impl Iterator<Item = &StoredRow> {
        self.rows.get(model).into_iter().flat_map(|t| t.values())
    }

    /// Rows of a model where `column == value`, in id order
    pub fn find_by<'a>(
        &'a self,
        model: &str,
        column: &'a str,
        value: &'a Value,
    ) -> impl Iterator<Item = &'a StoredRow> + 'a {
        self.rows
            .get(model)
            .into_iter()
            .flat_map(|t| t.values())
            .filter(move |row| row.attributes.get(column) == Some(value))
    }

    /// Number of rows of a model
    pub fn count(&self, model: &str) -> usize {
        self.rows.get(model).map_or(0, BTreeMap::len)
    }
}

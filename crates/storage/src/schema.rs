//! Model schema for the in-memory store
//!
//! Declares, per model, the columns that must not be null, the columns
//! that must be unique, and the associations the target factory may
//! resolve through.

use formtree_core::{Cardinality, ForeignKeyOwner};
use std::collections::BTreeMap;

/// Association declaration on a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationSchema {
    /// Association name
    pub name: String,
    /// Associated model
    pub model: String,
    /// Foreign key column
    pub foreign_key: String,
    /// To-one or to-many
    pub cardinality: Cardinality,
    /// Side storing the key
    pub foreign_key_owner: ForeignKeyOwner,
}

/// Storage schema for a single model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSchema {
    name: String,
    not_null: Vec<String>,
    unique: Vec<String>,
    associations: BTreeMap<String, AssociationSchema>,
}

impl ModelSchema {
    /// Schema with no constraints and no associations
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            not_null: Vec::new(),
            unique: Vec::new(),
            associations: BTreeMap::new(),
        }
    }

    /// Reject saves where `column` is null
    pub fn not_null(mut self, column: impl Into<String>) -> Self {
        self.not_null.push(column.into());
        self
    }

    /// Reject saves that duplicate `column` across rows
    pub fn unique(mut self, column: impl Into<String>) -> Self {
        self.unique.push(column.into());
        self
    }

    /// `name` is a single `model` whose `foreign_key` references this model
    pub fn has_one(
        self,
        name: impl Into<String>,
        model: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.association(
            name,
            model,
            foreign_key,
            Cardinality::One,
            ForeignKeyOwner::Associated,
        )
    }

    /// `name` is a list of `model` rows whose `foreign_key` references this model
    pub fn has_many(
        self,
        name: impl Into<String>,
        model: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.association(
            name,
            model,
            foreign_key,
            Cardinality::Many,
            ForeignKeyOwner::Associated,
        )
    }

    /// This model's `foreign_key` references a single `model` row
    pub fn belongs_to(
        self,
        name: impl Into<String>,
        model: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.association(
            name,
            model,
            foreign_key,
            Cardinality::One,
            ForeignKeyOwner::Owner,
        )
    }

    fn association(
        mut self,
        name: impl Into<String>,
        model: impl Into<String>,
        foreign_key: impl Into<String>,
        cardinality: Cardinality,
        foreign_key_owner: ForeignKeyOwner,
    ) -> Self {
        let name = name.into();
        self.associations.insert(
            name.clone(),
            AssociationSchema {
                name,
                model: model.into(),
                foreign_key: foreign_key.into(),
                cardinality,
                foreign_key_owner,
            },
        );
        self
    }

    /// Model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns that must not be null
    pub fn not_null_columns(&self) -> &[String] {
        &self.not_null
    }

    /// Columns that must be unique
    pub fn unique_columns(&self) -> &[String] {
        &self.unique
    }

    /// Association by name
    pub fn association_named(&self, name: &str) -> Option<&AssociationSchema> {
        self.associations.get(name)
    }
}

/// Set of model schemas known to a store
#[derive(Debug, Clone, Default)]
pub struct Schema {
    models: BTreeMap<String, ModelSchema>,
}

impl Schema {
    /// Empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a model
    pub fn model(mut self, model: ModelSchema) -> Self {
        self.models.insert(model.name.clone(), model);
        self
    }

    /// Model by name
    pub fn get(&self, name: &str) -> Option<&ModelSchema> {
        self.models.get(name)
    }

    /// Known model names
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

//! Storage layer for formtree
//!
//! This crate implements the reference persistence adapter:
//! - MemoryStore: tables behind `parking_lot` locks, constraint checks,
//!   association resolution
//! - Schema: per-model constraints and association declarations
//! - Snapshot transactions (clone on begin, restore on rollback)
//!
//! It exists so the mapper pipeline can be exercised end to end; production
//! deployments implement `PersistenceAdapter` over their own store.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod schema;
pub mod store;
pub mod table;
pub mod transaction;

pub use schema::{AssociationSchema, ModelSchema, Schema};
pub use store::{MemoryStore, SaveRecord};
pub use table::{StoredRow, Tables};
pub use transaction::{OpenTransaction, TransactionStatus};

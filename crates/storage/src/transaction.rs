//! Snapshot transactions for the in-memory store
//!
//! `begin` deep-clones the tables; `rollback` puts the clone back; `commit`
//! drops it. One transaction may be open per store at a time, which is all
//! a single `apply` needs.
//!
//! State transitions:
//! - `Active` → `Committed`
//! - `Active` → `Aborted`
//!
//! Terminal states (no transitions allowed):
//! - `Committed`
//! - `Aborted`

use crate::table::Tables;
use uuid::Uuid;

/// Status of a transaction in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Open, writes are buffered in the live tables
    Active,
    /// Writes kept
    Committed,
    /// Writes discarded
    Aborted,
}

/// An open transaction and the state to return to on rollback
#[derive(Debug)]
pub struct OpenTransaction {
    id: Uuid,
    status: TransactionStatus,
    snapshot: Tables,
}

impl OpenTransaction {
    /// Start a transaction over a copy of `tables`
    pub fn begin(tables: &Tables) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: TransactionStatus::Active,
            snapshot: tables.clone(),
        }
    }

    /// Transaction id (for logs)
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current status
    pub fn status(&self) -> &TransactionStatus {
        &self.status
    }

    /// Mark committed, dropping the snapshot
    pub fn commit(mut self) -> TransactionStatus {
        self.status = TransactionStatus::Committed;
        self.status
    }

    /// Mark aborted and hand back the snapshot to restore
    pub fn abort(mut self) -> (TransactionStatus, Tables) {
        self.status = TransactionStatus::Aborted;
        (self.status, self.snapshot)
    }
}

//! formtree: mapper composition and persistence pipeline
//!
//! Facade over the workspace crates:
//! - `formtree_core`: values, targets, errors, the persistence adapter contract
//! - `formtree_storage`: `MemoryStore`, the in-memory reference adapter
//! - `formtree_engine`: definitions, mappers, mountings and extensions
//!
//! ```no_run
//! use std::sync::Arc;
//! use formtree::{params, Context, MapperDefinition, MemoryStore, Mapper, Schema, Target};
//!
//! # fn main() -> formtree::Result<()> {
//! let store = Arc::new(MemoryStore::new(Schema::new()));
//! let ctx = Context::standard(store)?;
//! let user = MapperDefinition::builder("user", "user")
//!     .attributes(["email"])
//!     .build()?;
//! let mut mapper = Mapper::new(ctx, user, Target::new("user"), &[])?;
//! mapper.apply(&params([("email", "a@b.com")]))?;
//! # Ok(())
//! # }
//! ```

pub use formtree_core::*;
pub use formtree_engine::*;
pub use formtree_storage::*;

//! Core types and traits for formtree
//!
//! This crate defines the foundational types used throughout the system:
//! - Value / Params: Attribute values and flat input parameters
//! - Target / TargetId: The detached domain object a mapper node owns
//! - Errors: Field-keyed validation messages
//! - Error: Error type hierarchy (configuration vs. recoverable vs. fatal)
//! - Traits: The persistence adapter contract and association metadata

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod errors;
pub mod target;
pub mod traits;
pub mod value;

pub use error::{ConfigurationError, Error, Result};
pub use errors::{Errors, BASE_KEY};
pub use target::{PersistedState, Target, TargetId};
pub use traits::{Association, Cardinality, ForeignKeyOwner, PersistenceAdapter};
pub use value::{params, params_from_json, Params, Value};

//! Error types for formtree
//!
//! Two classes of failure exist and they never mix:
//! - Recoverable data failures (validation, constraint violations) end up in
//!   a mapper's [`Errors`](crate::Errors) and make `validate`/`apply` return
//!   `Ok(false)`. Only `ConstraintViolation` travels as an `Error`, and only
//!   until the transaction boundary converts it.
//! - Everything else is fatal: configuration mistakes and adapter contract
//!   violations surface as `Err` and are not recovered.
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use thiserror::Error;

/// Result type alias for formtree operations
pub type Result<T> = std::result::Result<T, Error>;

/// Programmer errors detected while wiring extensions, definitions or mappers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Extension name not present in the registry
    #[error("unknown extension '{name}'{}", .required_by.as_ref().map(|r| format!(" (required by '{}')", r)).unwrap_or_default())]
    UnknownExtension {
        /// Name that failed to resolve
        name: String,
        /// Extension that declared the dependency, if any
        required_by: Option<String>,
    },

    /// Two extensions registered under the same name
    #[error("extension '{0}' is already registered")]
    DuplicateExtension(String),

    /// Extension dependencies form a cycle
    #[error("extension dependency cycle: {}", .path.join(" -> "))]
    DependencyCycle {
        /// Names along the cycle, first and last equal
        path: Vec<String>,
    },

    /// Trait requested at construction that the definition does not declare
    #[error("mapper '{mapper}' has no trait '{name}'")]
    UnknownTrait {
        /// Definition name
        mapper: String,
        /// Requested trait
        name: String,
    },

    /// Trait declared twice on one definition
    #[error("mapper '{mapper}' declares trait '{name}' more than once")]
    DuplicateTrait {
        /// Definition name
        mapper: String,
        /// Repeated trait
        name: String,
    },

    /// Mounting name declared twice in one definition or trait
    #[error("mapper '{mapper}' mounts '{name}' more than once")]
    DuplicateMount {
        /// Definition name
        mapper: String,
        /// Repeated mounting
        name: String,
    },

    /// Lookup of a mounting that does not exist on the mapper
    #[error("mapper '{mapper}' has no mounting '{name}'")]
    UnknownMounting {
        /// Definition name
        mapper: String,
        /// Requested mounting
        name: String,
    },

    /// A single-mapper operation was used on a collection mounting, or vice versa
    #[error("mounting '{name}' is not a {expected} mounting")]
    MountingKind {
        /// Mounting name
        name: String,
        /// Kind the caller expected ("single" or "collection")
        expected: &'static str,
    },

    /// An extension requires a persistence adapter but none was supplied
    #[error("extension '{0}' requires a persistence adapter")]
    MissingAdapter(String),
}

/// Error types for the mapper pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Setup-time programmer error
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Storage-level constraint violated while saving a target
    ///
    /// Recoverable: the transaction boundary in `apply` rolls back and
    /// reports it through the mapper's errors.
    #[error("Constraint violation on {model}{}: {message}", .field.as_ref().map(|f| format!(".{}", f)).unwrap_or_default())]
    ConstraintViolation {
        /// Model of the offending target
        model: String,
        /// Attribute involved, if the adapter knows it
        field: Option<String>,
        /// Human readable message
        message: String,
    },

    /// Adapter contract violation or unexpected adapter failure
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// Transaction misuse (nested begin, commit without begin)
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Configuration file could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error while reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a constraint violation
    pub fn constraint(
        model: impl Into<String>,
        field: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Error::ConstraintViolation {
            model: model.into(),
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    /// Whether the transaction boundary may convert this error into a failed result
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::ConstraintViolation { .. })
    }
}

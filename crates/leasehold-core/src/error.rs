//! Error types for leasehold-core
//!
//! Only conditions the caller cannot treat as ordinary data live here. A take
//! on a held resource or a release by the wrong holder is an outcome with
//! `success == false`, not an error.

use thiserror::Error;

use crate::resource::Category;

/// Core error type for leasehold operations
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Referenced resource does not exist in the catalog
    #[error("{category} not found: {id}")]
    NotFound {
        /// Category that was searched
        category: Category,
        /// Requested resource id
        id: String,
    },

    /// Holder name is empty or otherwise unusable
    #[error("Invalid holder: {0}")]
    InvalidHolder(String),

    /// Configuration could not be validated
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input or stored value could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Filesystem failure
    #[error("IO error: {0}")]
    IoError(String),

    /// Durable store failure
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl Error {
    /// Create a not-found error for a catalog lookup.
    pub fn not_found(category: Category, id: impl Into<String>) -> Self {
        Self::NotFound {
            category,
            id: id.into(),
        }
    }

    /// Machine-readable code, stable across releases.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidHolder(_) => "INVALID_HOLDER",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::ParseError(_) => "PARSE_ERROR",
            Self::IoError(_) => "IO_ERROR",
            Self::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the process exit code for this error.
    ///
    /// - 1: bad input or configuration
    /// - 2: filesystem failure
    /// - 3: resource not found
    /// - 4: durable store failure
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidHolder(_) | Self::InvalidConfig(_) | Self::ParseError(_) => 1,
            Self::IoError(_) => 2,
            Self::NotFound { .. } => 3,
            Self::DatabaseError(_) => 4,
        }
    }

    /// Whether this error is a missing-resource condition.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::ParseError(format!("Failed to parse config: {err}"))
    }
}

impl From<chrono::ParseError> for Error {
    fn from(err: chrono::ParseError) -> Self {
        Self::ParseError(err.to_string())
    }
}

/// Result type alias for leasehold-core operations
pub type Result<T> = std::result::Result<T, Error>;

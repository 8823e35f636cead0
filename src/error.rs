//! Database error types.

use std::fmt;

use crate::storage::StorageError;

/// Errors surfaced by store operations.
///
/// Every failure is returned to the immediate caller. Nothing is retried
/// automatically.
#[derive(Debug)]
pub enum DbError {
    /// The database directory could not be prepared. Sticky for the
    /// lifetime of the store.
    Instantiation(String),
    /// The database name is not usable as a filename component
    InvalidName(String),
    /// The placeholder file for a new database could not be written
    Create {
        database: String,
        source: StorageError,
    },
    /// The database file could not be read
    Read {
        database: String,
        source: StorageError,
    },
    /// The database file is not a JSON object
    Parse {
        database: String,
        source: serde_json::Error,
    },
    /// A flush for this database is still inside its throttle window.
    /// The in-memory document already holds the new value.
    Busy { database: String },
    /// Writing the document to disk failed
    Flush {
        database: String,
        source: StorageError,
    },
    /// A value could not be converted to JSON
    Encode(serde_json::Error),
    /// A stored value could not be converted to the requested type
    Decode {
        database: String,
        key: String,
        source: serde_json::Error,
    },
}

impl DbError {
    /// Whether the error is the throttler rejecting a flush
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instantiation(e) => write!(f, "database location could not be prepared: {}", e),
            Self::InvalidName(name) => write!(f, "invalid database name: {:?}", name),
            Self::Create { database, source } => {
                write!(f, "database '{}' could not be created: {}", database, source)
            }
            Self::Read { database, source } => {
                write!(f, "database '{}' could not be read: {}", database, source)
            }
            Self::Parse { database, source } => {
                write!(f, "database '{}' is not a valid document: {}", database, source)
            }
            Self::Busy { database } => write!(f, "database '{}' is being written", database),
            Self::Flush { database, source } => {
                write!(f, "database '{}' could not be flushed: {}", database, source)
            }
            Self::Encode(e) => write!(f, "value could not be encoded: {}", e),
            Self::Decode { database, key, source } => write!(
                f,
                "value for '{}' in database '{}' could not be decoded: {}",
                key, database, source
            ),
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Create { source, .. } | Self::Read { source, .. } | Self::Flush { source, .. } => {
                Some(source)
            }
            Self::Parse { source, .. } | Self::Decode { source, .. } => Some(source),
            Self::Encode(e) => Some(e),
            Self::Instantiation(_) | Self::InvalidName(_) | Self::Busy { .. } => None,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, DbError>;

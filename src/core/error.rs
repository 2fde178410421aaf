/// Bridge Error Module
///
/// This module defines the error taxonomy shared by every command handler.
/// Engine failures are trapped where they happen and converted into one of
/// these variants before a result leaves the dispatcher.
use thiserror::Error;

/// Error type for every bridge operation.
///
/// - Handle lookups that miss (closed or never-opened databases)
/// - Engine failures while opening, executing, querying or closing
/// - Directory creation failures ahead of an open
/// - Malformed command arguments
#[derive(Error, Debug)]
pub enum BridgeError {
    /// No live connection is registered under this handle
    #[error("database {0} not found")]
    NotFound(i64),

    /// The SQLite engine rejected an open, a statement or a close.
    ///
    /// `context` is the offending SQL text, or the database path for
    /// open/close failures.
    #[error("{context}: {source}")]
    Native {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The parent directory of a database path could not be created
    #[error("cannot prepare directory for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Missing or mistyped command arguments, or SQL holding more than one statement
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

impl BridgeError {
    /// Wraps an engine error together with the SQL text or path it concerns.
    pub fn native(context: impl Into<String>, source: rusqlite::Error) -> Self {
        BridgeError::Native {
            context: context.into(),
            source,
        }
    }

    /// Returns true for errors raised by the engine or the filesystem.
    pub fn is_native(&self) -> bool {
        matches!(self, BridgeError::Native { .. } | BridgeError::Io { .. })
    }
}

/// Type alias for Result to use BridgeError as the error type.
pub type Result<T> = std::result::Result<T, BridgeError>;

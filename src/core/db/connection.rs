/// Connection Management Module
///
/// One `Database` per opened handle. The engine connection lives behind its
/// own mutex, separate from the registry lock, and is taken out of it on
/// close so that late callers still holding the handle see it as gone.

use crate::core::{BridgeError, Result};
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Path SQLite treats as a private in-memory database
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Settings applied to every connection right after it is opened.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// How long the engine retries a locked database before failing
    pub busy_timeout: Option<Duration>,
    /// Statements run once on the fresh connection, e.g. `PRAGMA foreign_keys = ON`
    pub pragmas: Vec<String>,
    /// Open without write access
    pub read_only: bool,
}

/// An opened database behind a handle.
#[derive(Debug)]
pub struct Database {
    path: String,
    connection: Mutex<Option<Connection>>,
}

impl Database {
    /// Opens (creating if needed) the database at `path`.
    ///
    /// The parent directory is created first when it does not exist.
    ///
    /// # Errors
    ///
    /// `BridgeError::Io` if the directory cannot be created,
    /// `BridgeError::Native` (carrying the path) if the engine refuses the open
    /// or one of the configured pragmas.
    pub fn open(path: &str, options: &OpenOptions) -> Result<Self> {
        ensure_parent_dir(path)?;

        let flags = if options.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::default()
        };
        let conn = Connection::open_with_flags(path, flags).map_err(|e| BridgeError::native(path, e))?;

        if let Some(timeout) = options.busy_timeout {
            conn.busy_timeout(timeout).map_err(|e| BridgeError::native(path, e))?;
        }
        for pragma in &options.pragmas {
            if let Err(e) = conn.execute_batch(pragma) {
                warn!("Pragma `{}` failed on {}: {}", pragma, path, e);
                return Err(BridgeError::native(path, e));
            }
        }

        debug!("Opened database at {}", path);
        Ok(Database {
            path: path.to_string(),
            connection: Mutex::new(Some(conn)),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Locks the connection for one operation.
    ///
    /// The guard holds `None` once the database has been closed.
    pub fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Releases the engine connection.
    ///
    /// Returns `Ok(false)` when it was already closed.
    pub fn close(&self) -> Result<bool> {
        let Some(conn) = self.lock().take() else {
            return Ok(false);
        };
        match conn.close() {
            Ok(()) => {
                debug!("Closed database at {}", self.path);
                Ok(true)
            }
            Err((conn, e)) => {
                // Dropping forces the handle closed; report what the engine said
                warn!("Engine refused to close {} cleanly: {}", self.path, e);
                drop(conn);
                Err(BridgeError::native(self.path.as_str(), e))
            }
        }
    }
}

/// Creates the parent directory of `path` when it is missing.
///
/// In-memory databases, URIs and bare file names have nothing to create.
fn ensure_parent_dir(path: &str) -> Result<()> {
    if path == IN_MEMORY_PATH || path.starts_with("file:") {
        return Ok(());
    }
    let Some(parent) = Path::new(path).parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.exists() {
        return Ok(());
    }
    debug!("Creating directory {}", parent.display());
    fs::create_dir_all(parent).map_err(|source| BridgeError::Io {
        path: path.to_string(),
        source,
    })
}

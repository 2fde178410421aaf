/// Command dispatcher
///
/// `Bridge` is the service object that owns the handle registry for the
/// lifetime of the host. Each command resolves its handle, runs against the
/// connection and comes back as an `Outcome`; engine errors never escape
/// unconverted.

use crate::command::{CommandArguments, Method};
use crate::core::db::{
    ArgumentBinding, Database, HandleRegistry, OpenOptions, QueryExecutor, ResultRow, SqlValue,
};
use crate::core::{BridgeError, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Success payload of a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// No value (serialized as null)
    Empty,
    /// A handle, rowid or change count; `None` when the engine reported nothing
    Integer(Option<i64>),
    /// Rows of a query
    Rows(Vec<ResultRow>),
    Text(String),
}

/// A failed command, shaped for the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandError {
    /// Canonical name of the method that failed
    pub code: String,
    /// SQL text or path for engine failures, the error text otherwise
    pub message: String,
    /// Engine or filesystem error text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CommandError {
    pub fn new(method: Method, err: &BridgeError) -> Self {
        let (message, details) = match err {
            BridgeError::Native { context, source } => (context.clone(), Some(source.to_string())),
            BridgeError::Io { path, source } => (path.clone(), Some(source.to_string())),
            other => (other.to_string(), None),
        };
        CommandError {
            code: method.name().to_string(),
            message,
            details,
        }
    }
}

/// Result of dispatching one command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Reply),
    Error(CommandError),
    /// The method name is outside the recognized set
    NotImplemented,
}

/// Settings for a `Bridge`.
#[derive(Debug, Clone, Default)]
pub struct BridgeOptions {
    /// Applied to every opened connection
    pub open: OpenOptions,
    pub binding: ArgumentBinding,
    /// Start with verbose statement tracing on
    pub debug_mode: bool,
}

/// The bridge service.
#[derive(Debug)]
pub struct Bridge {
    registry: HandleRegistry<Database>,
    options: BridgeOptions,
    verbose: AtomicBool,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(BridgeOptions::default())
    }
}

impl Bridge {
    pub fn new(options: BridgeOptions) -> Self {
        let verbose = AtomicBool::new(options.debug_mode);
        Bridge {
            registry: HandleRegistry::new(),
            options,
            verbose,
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    pub fn set_verbose(&self, enabled: bool) {
        self.verbose.store(enabled, Ordering::Relaxed);
    }

    /// Handles of every open database.
    pub fn open_handles(&self) -> Vec<i64> {
        self.registry.ids()
    }

    /// Dispatches a command by wire name.
    pub fn handle(&self, name: &str, arguments: &serde_json::Value) -> Outcome {
        let Some(method) = Method::from_name(name) else {
            debug!("Method {} not implemented", name);
            return Outcome::NotImplemented;
        };
        match self.dispatch(method, arguments) {
            Ok(reply) => Outcome::Success(reply),
            Err(e) => {
                if e.is_native() {
                    warn!("{} failed: {}", method.name(), e);
                } else {
                    debug!("{} rejected: {}", method.name(), e);
                }
                Outcome::Error(CommandError::new(method, &e))
            }
        }
    }

    fn dispatch(&self, method: Method, raw: &serde_json::Value) -> Result<Reply> {
        let decode = || CommandArguments::from_json(raw);
        match method {
            Method::Open => {
                let args = decode()?;
                let id = self.open(args.require_path()?, args.read_only)?;
                Ok(Reply::Integer(Some(id)))
            }
            Method::Close => {
                self.close(decode()?.require_id()?)?;
                Ok(Reply::Empty)
            }
            Method::Execute => {
                let args = decode()?;
                self.execute(args.require_id()?, args.require_sql()?, args.sql_arguments())?;
                Ok(Reply::Empty)
            }
            Method::Insert => {
                let args = decode()?;
                let id = self.insert(args.require_id()?, args.require_sql()?, args.sql_arguments())?;
                Ok(Reply::Integer(id))
            }
            Method::Update => {
                let args = decode()?;
                let changed = self.update(args.require_id()?, args.require_sql()?, args.sql_arguments())?;
                Ok(Reply::Integer(changed))
            }
            Method::Query => {
                let args = decode()?;
                let rows = self.query(args.require_id()?, args.require_sql()?, args.sql_arguments())?;
                Ok(Reply::Rows(rows))
            }
            Method::DebugMode => {
                // A bare `false` turns tracing back off
                self.set_verbose(raw.as_bool().unwrap_or(true));
                Ok(Reply::Empty)
            }
            Method::PlatformVersion => Ok(Reply::Text(platform_version())),
        }
    }

    /// Opens the database at `path` and registers it.
    pub fn open(&self, path: &str, read_only: bool) -> Result<i64> {
        if self.is_verbose() {
            info!("opening {}", path);
        }
        let database = if read_only {
            let options = OpenOptions {
                read_only: true,
                ..self.options.open.clone()
            };
            Database::open(path, &options)?
        } else {
            Database::open(path, &self.options.open)?
        };
        Ok(self.registry.allocate(database))
    }

    /// Unregisters `id` and closes its connection.
    pub fn close(&self, id: i64) -> Result<()> {
        let database = self.database(id)?;
        self.registry.remove(id);
        if self.is_verbose() {
            info!("closing {}", database.path());
        }
        // A concurrent close may have released the connection first
        if database.close()? {
            Ok(())
        } else {
            Err(BridgeError::NotFound(id))
        }
    }

    /// Runs a statement that returns no value.
    pub fn execute(&self, id: i64, sql: &str, arguments: &[SqlValue]) -> Result<()> {
        self.with_connection(id, |conn| {
            let bound = self.bind(sql, arguments)?;
            QueryExecutor::new(conn).execute(sql, &bound)
        })
    }

    /// Runs an INSERT and returns the new rowid.
    pub fn insert(&self, id: i64, sql: &str, arguments: &[SqlValue]) -> Result<Option<i64>> {
        self.with_connection(id, |conn| {
            let bound = self.bind(sql, arguments)?;
            let executor = QueryExecutor::new(conn);
            executor.execute(sql, &bound)?;
            let inserted = executor.last_insert_id()?;
            match inserted {
                Some(rowid) if self.is_verbose() => info!("inserted {}", rowid),
                Some(_) => {}
                None => error!("Failed to read inserted id after: {}", sql),
            }
            Ok(inserted)
        })
    }

    /// Runs an UPDATE or DELETE and returns the number of rows it touched.
    pub fn update(&self, id: i64, sql: &str, arguments: &[SqlValue]) -> Result<Option<i64>> {
        self.with_connection(id, |conn| {
            let bound = self.bind(sql, arguments)?;
            let executor = QueryExecutor::new(conn);
            executor.execute(sql, &bound)?;
            let changed = executor.changes()?;
            match changed {
                Some(count) if self.is_verbose() => info!("changed {}", count),
                Some(_) => {}
                None => error!("Failed to read changes after: {}", sql),
            }
            Ok(changed)
        })
    }

    /// Runs a query and returns every row.
    pub fn query(&self, id: i64, sql: &str, arguments: &[SqlValue]) -> Result<Vec<ResultRow>> {
        self.with_connection(id, |conn| {
            let bound = self.bind(sql, arguments)?;
            let rows = QueryExecutor::new(conn).query(sql, &bound)?;
            if self.is_verbose() {
                for row in &rows {
                    info!("{:?}", row);
                }
            }
            Ok(rows)
        })
    }

    /// Closes every open database. Call once when the host shuts down.
    pub fn shutdown(&self) {
        for (id, database) in self.registry.drain() {
            match database.close() {
                Ok(_) => debug!("Closed handle {} on shutdown", id),
                Err(e) => error!("Failed to close handle {} on shutdown: {}", id, e),
            }
        }
    }

    fn database(&self, id: i64) -> Result<Arc<Database>> {
        self.registry.lookup(id).ok_or(BridgeError::NotFound(id))
    }

    fn with_connection<R>(&self, id: i64, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        let database = self.database(id)?;
        let guard = database.lock();
        let conn = guard.as_ref().ok_or(BridgeError::NotFound(id))?;
        f(conn)
    }

    fn bind(&self, sql: &str, arguments: &[SqlValue]) -> Result<Vec<SqlValue>> {
        if self.is_verbose() {
            if arguments.is_empty() {
                info!("{}", sql);
            } else {
                let shown: Vec<String> = arguments.iter().map(ToString::to_string).collect();
                info!("{} [{}]", sql, shown.join(", "));
            }
        }
        self.options.binding.prepare(arguments)
    }
}

/// Version string answered to `getPlatformVersion`.
pub fn platform_version() -> String {
    format!(
        "{} {} (SQLite {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        rusqlite::version()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::IN_MEMORY_PATH;
    use serde_json::json;

    fn memory_bridge() -> (Bridge, i64) {
        let bridge = Bridge::default();
        let id = bridge.open(IN_MEMORY_PATH, false).unwrap();
        (bridge, id)
    }

    #[test]
    fn test_unknown_method_is_not_implemented() {
        let bridge = Bridge::default();
        assert_eq!(bridge.handle("batch", &json!({})), Outcome::NotImplemented);
        assert_eq!(bridge.handle("", &serde_json::Value::Null), Outcome::NotImplemented);
    }

    #[test]
    fn test_debug_mode_toggle() {
        let bridge = Bridge::default();
        assert!(!bridge.is_verbose());
        assert_eq!(bridge.handle("debugMode", &serde_json::Value::Null), Outcome::Success(Reply::Empty));
        assert!(bridge.is_verbose());
        bridge.handle("debugMode", &json!(false));
        assert!(!bridge.is_verbose());
    }

    #[test]
    fn test_platform_version() {
        match Bridge::default().handle("getPlatformVersion", &serde_json::Value::Null) {
            Outcome::Success(Reply::Text(version)) => {
                assert!(version.starts_with("sqlbridge "));
                assert!(version.contains("SQLite 3."));
            }
            other => panic!("Expected version text, got {:?}", other),
        }
    }

    #[test]
    fn test_execute_error_carries_sql() {
        let (bridge, id) = memory_bridge();
        let outcome = bridge.handle("execute", &json!({"id": id, "sql": "CREATE TABLE"}));
        match outcome {
            Outcome::Error(err) => {
                assert_eq!(err.code, "execute");
                assert_eq!(err.message, "CREATE TABLE");
                assert!(err.details.is_some());
            }
            other => panic!("Expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_arguments() {
        let (bridge, id) = memory_bridge();
        match bridge.handle("query", &json!({"id": id})) {
            Outcome::Error(err) => {
                assert_eq!(err.code, "query");
                assert_eq!(err.message, "invalid arguments: missing 'sql'");
                assert_eq!(err.details, None);
            }
            other => panic!("Expected error, got {:?}", other),
        }
        assert!(matches!(bridge.handle("openDatabase", &json!({})), Outcome::Error(_)));
    }

    #[test]
    fn test_insert_failure_skips_follow_up() {
        let (bridge, id) = memory_bridge();
        bridge.execute(id, "CREATE TABLE t(a INTEGER NOT NULL)", &[]).unwrap();
        let result = bridge.insert(id, "INSERT INTO t VALUES (NULL)", &[]);
        match result {
            Err(BridgeError::Native { context, .. }) => assert_eq!(context, "INSERT INTO t VALUES (NULL)"),
            other => panic!("Expected Native error, got {:?}", other),
        }
    }

    #[test]
    fn test_text_binding_rejects_blob_arguments() {
        let (bridge, id) = memory_bridge();
        bridge.execute(id, "CREATE TABLE t(b BLOB)", &[]).unwrap();
        let result = bridge.insert(id, "INSERT INTO t VALUES (?)", &[SqlValue::Blob(vec![1])]);
        assert!(matches!(result, Err(BridgeError::InvalidArguments(_))));
    }

    #[test]
    fn test_text_binding_keeps_number_forms() {
        let (bridge, id) = memory_bridge();
        bridge.execute(id, "CREATE TABLE u(v TEXT)", &[]).unwrap();
        for value in [json!(2.0), json!(18446744073709551615u64)] {
            let arguments = json!({"id": id, "sql": "INSERT INTO u VALUES (?)", "sqlArguments": [value]});
            let outcome = bridge.handle("insert", &arguments);
            assert!(matches!(outcome, Outcome::Success(_)), "{:?}", outcome);
        }

        let rows = bridge.query(id, "SELECT v, typeof(v) AS t FROM u ORDER BY rowid", &[]).unwrap();
        assert_eq!(rows[0].get("v"), Some(&SqlValue::Text("2.0".to_string())));
        assert_eq!(rows[1].get("v"), Some(&SqlValue::Text("18446744073709551615".to_string())));
        assert_eq!(rows[1].get("t"), Some(&SqlValue::Text("text".to_string())));
    }

    #[test]
    fn test_multiple_statements_are_rejected() {
        let (bridge, id) = memory_bridge();
        match bridge.handle("execute", &json!({"id": id, "sql": "CREATE TABLE a(x); CREATE TABLE b(y)"})) {
            Outcome::Error(err) => {
                assert_eq!(err.code, "execute");
                assert!(err.message.starts_with("invalid arguments: expected a single statement"));
            }
            other => panic!("Expected error, got {:?}", other),
        }
        let rows = bridge.query(id, "SELECT name FROM sqlite_master", &[]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_typed_binding_keeps_kinds() {
        let bridge = Bridge::new(BridgeOptions {
            binding: ArgumentBinding::Typed,
            ..BridgeOptions::default()
        });
        let id = bridge.open(IN_MEMORY_PATH, false).unwrap();
        bridge.execute(id, "CREATE TABLE t(v)", &[]).unwrap();
        bridge
            .insert(id, "INSERT INTO t VALUES (?)", &[SqlValue::Blob(vec![1, 2])])
            .unwrap();
        bridge.insert(id, "INSERT INTO t VALUES (?)", &[SqlValue::Real(1.0)]).unwrap();

        let rows = bridge.query(id, "SELECT v FROM t ORDER BY rowid", &[]).unwrap();
        assert_eq!(rows[0].get("v"), Some(&SqlValue::Blob(vec![1, 2])));
        assert_eq!(rows[1].get("v"), Some(&SqlValue::Real(1.0)));
    }

    #[test]
    fn test_read_only_open_rejects_writes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ro.db").to_string_lossy().into_owned();
        let bridge = Bridge::default();

        let id = bridge.open(&path, false).unwrap();
        bridge.execute(id, "CREATE TABLE t(a INTEGER)", &[]).unwrap();
        bridge.insert(id, "INSERT INTO t VALUES (1)", &[]).unwrap();
        bridge.close(id).unwrap();

        let id = match bridge.handle("openDatabase", &json!({"path": path, "readOnly": true})) {
            Outcome::Success(Reply::Integer(Some(id))) => id,
            other => panic!("Expected a handle, got {:?}", other),
        };
        match bridge.handle("insert", &json!({"id": id, "sql": "INSERT INTO t VALUES (2)"})) {
            Outcome::Error(err) => {
                assert_eq!(err.code, "insert");
                assert_eq!(err.message, "INSERT INTO t VALUES (2)");
                assert!(err.details.unwrap().contains("readonly"));
            }
            other => panic!("Expected error, got {:?}", other),
        }
        let rows = bridge.query(id, "SELECT a FROM t", &[]).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_close_after_close_is_not_found() {
        let (bridge, id) = memory_bridge();
        bridge.close(id).unwrap();
        assert!(matches!(bridge.close(id), Err(BridgeError::NotFound(n)) if n == id));
        assert!(bridge.open_handles().is_empty());
    }

    #[test]
    fn test_shutdown_closes_everything() {
        let bridge = Bridge::default();
        let first = bridge.open(IN_MEMORY_PATH, false).unwrap();
        let second = bridge.open(IN_MEMORY_PATH, false).unwrap();
        assert_eq!(bridge.open_handles(), vec![first, second]);

        bridge.shutdown();
        assert!(bridge.open_handles().is_empty());
        assert!(matches!(bridge.query(first, "SELECT 1", &[]), Err(BridgeError::NotFound(_))));
    }

    #[test]
    fn test_command_error_serialization() {
        let err = CommandError::new(Method::Close, &BridgeError::NotFound(4));
        insta::assert_snapshot!(
            serde_json::to_string(&err).unwrap(),
            @r#"{"code":"closeDatabase","message":"database 4 not found"}"#
        );
    }
}

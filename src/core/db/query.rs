/// Query Execution Module
///
/// Statement execution against one engine connection: plain execution,
/// the last-insert-id and change-count follow-ups, and row-producing queries.
/// Statements and cursors are scoped to each call and released when it
/// returns, whichever way it returns.

use super::row::{convert_row, ResultRow};
use super::value::SqlValue;
use crate::core::{BridgeError, Result};
use rusqlite::{params_from_iter, Batch, Connection, OptionalExtension, Statement};

/// Follow-up query for the rowid of the most recent successful insert
pub const LAST_INSERT_ID_SQL: &str = "SELECT last_insert_rowid()";
/// Follow-up query for the rows touched by the most recent statement
pub const CHANGES_SQL: &str = "SELECT changes()";

/// Query execution service that operates on a database connection
pub struct QueryExecutor<'a> {
    connection: &'a Connection,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new QueryExecutor for the given connection
    pub fn new(connection: &'a Connection) -> Self {
        QueryExecutor { connection }
    }

    /// Runs one statement with bound arguments, discarding any rows it yields.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Native` carrying `sql` if the statement cannot be
    /// prepared, bound or stepped, and `BridgeError::InvalidArguments` if `sql`
    /// holds more than one statement.
    pub fn execute(&self, sql: &str, arguments: &[SqlValue]) -> Result<()> {
        let mut stmt = self.prepare_single(sql)?;
        run(&mut stmt, arguments).map_err(|e| BridgeError::native(sql, e))
    }

    /// Prepares the only statement in `sql`.
    ///
    /// Only whitespace and comments may follow it; anything else is rejected
    /// before the first statement runs.
    fn prepare_single(&self, sql: &str) -> Result<Statement<'a>> {
        let mut batch = Batch::new(self.connection, sql);
        let stmt = batch
            .next()
            .map_err(|e| BridgeError::native(sql, e))?
            .ok_or_else(|| BridgeError::InvalidArguments("no statement to run".to_string()))?;
        match batch.next() {
            Ok(None) => Ok(stmt),
            // A tail that fails to prepare is still a second statement
            Ok(Some(_)) | Err(_) => Err(BridgeError::InvalidArguments(format!(
                "expected a single statement: {}",
                sql
            ))),
        }
    }

    /// Rowid of the connection's most recent successful insert.
    ///
    /// `None` when the engine returns no row for the follow-up query.
    pub fn last_insert_id(&self) -> Result<Option<i64>> {
        self.single_integer(LAST_INSERT_ID_SQL)
    }

    /// Rows modified by the connection's most recent INSERT, UPDATE or DELETE.
    pub fn changes(&self) -> Result<Option<i64>> {
        self.single_integer(CHANGES_SQL)
    }

    fn single_integer(&self, sql: &str) -> Result<Option<i64>> {
        self.connection
            .query_row(sql, [], |row| row.get::<_, i64>(0))
            .optional()
            .map_err(|e| BridgeError::native(sql, e))
    }

    /// Runs a row-producing query and converts every row.
    ///
    /// # Returns
    ///
    /// The rows in the order the engine produced them.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Native` carrying `sql` on failure, including
    /// failures part way through the result set.
    pub fn query(&self, sql: &str, arguments: &[SqlValue]) -> Result<Vec<ResultRow>> {
        let mut stmt = self.prepare_single(sql)?;
        collect_rows(&mut stmt, arguments).map_err(|e| BridgeError::native(sql, e))
    }
}

fn run(stmt: &mut Statement<'_>, arguments: &[SqlValue]) -> rusqlite::Result<()> {
    // Stepping through query() also accepts statements that return rows,
    // such as `PRAGMA journal_mode = WAL`
    let mut rows = stmt.query(params_from_iter(arguments.iter()))?;
    while rows.next()?.is_some() {}
    Ok(())
}

fn collect_rows(stmt: &mut Statement<'_>, arguments: &[SqlValue]) -> rusqlite::Result<Vec<ResultRow>> {
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query(params_from_iter(arguments.iter()))?;
    let mut results = Vec::new();
    while let Some(row) = rows.next()? {
        results.push(convert_row(row, &columns)?);
    }
    Ok(results)
}

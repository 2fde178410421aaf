/// Row Marshalling Module
///
/// Converts native rusqlite rows into `ResultRow`s, ordered column → value
/// mappings that keep each cell's kind intact on the way to the wire.

use super::value::SqlValue;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// One result row: column names in select order, each with its value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultRow {
    cells: Vec<(String, SqlValue)>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column's value.
    ///
    /// A column that is already present keeps its position and takes the new value.
    pub fn insert(&mut self, column: impl Into<String>, value: SqlValue) {
        let column = column.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Converts one native row into a `ResultRow`.
///
/// `columns` are the statement's column names, in the same order as the
/// row's cells. Every cell is read through its dynamic type tag, so an
/// INTEGER stays an integer and a NULL stays null.
pub fn convert_row(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<ResultRow> {
    let mut result = ResultRow::new();
    for (index, column) in columns.iter().enumerate() {
        let value = row.get_ref(index)?;
        result.insert(column.as_str(), SqlValue::from(value));
    }
    Ok(result)
}

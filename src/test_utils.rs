/// # Test Utilities Module
///
/// Shared fixtures for crate-internal tests:
/// - Bridge fixtures backed by a private temporary directory
/// - A table holding one value of every kind
/// - BridgeError-specific assertion helpers

use crate::core::db::SqlValue;
use crate::core::Result;
use crate::dispatcher::{Bridge, BridgeOptions};
use tempfile::TempDir;

/// Schema with one column per value kind, plus an autoincrementing key
pub const KINDS_SCHEMA: &str = "CREATE TABLE kinds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    i INTEGER,
    r REAL,
    t TEXT,
    b BLOB,
    n TEXT
)";

/// Bridge plus the temporary directory its databases live in
pub struct BridgeFixture {
    pub dir: TempDir,
    pub bridge: Bridge,
}

impl BridgeFixture {
    /// Create a fixture with default options
    pub fn new() -> Self {
        Self::with_options(BridgeOptions::default())
    }

    pub fn with_options(options: BridgeOptions) -> Self {
        BridgeFixture {
            dir: TempDir::new().expect("Failed to create temp dir"),
            bridge: Bridge::new(options),
        }
    }

    /// Absolute path of `name` inside the fixture directory
    pub fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }

    /// Open `name` through the bridge
    pub fn open(&self, name: &str) -> i64 {
        self.bridge
            .open(&self.path(name), false)
            .unwrap_or_else(|e| panic!("Failed to open {}: {}", name, e))
    }

    /// Create the kinds table and fill it with a single row of every kind
    pub fn with_kinds_table(&self, id: i64) -> Result<()> {
        self.bridge.execute(id, KINDS_SCHEMA, &[])?;
        self.bridge.execute(
            id,
            "INSERT INTO kinds (i, r, t, b, n) VALUES (?, ?, ?, X'0102FF', ?)",
            &[
                SqlValue::Integer(42),
                SqlValue::Real(2.5),
                SqlValue::Text("hello".to_string()),
                SqlValue::Null,
            ],
        )
    }
}

/// Error testing utilities specific to BridgeError patterns
pub mod error_testing {
    /// Verify error message quality (non-empty, mentions what was involved)
    pub fn verify_error_message_quality<T, E>(result: &std::result::Result<T, E>, fragment: &str, context: &str)
    where
        T: std::fmt::Debug,
        E: std::fmt::Display,
    {
        match result {
            Ok(value) => panic!("Expected error but got Ok({:?}) in {}", value, context),
            Err(error) => {
                let error_str = error.to_string();
                assert!(!error_str.is_empty(), "Error message should not be empty in {}", context);
                assert!(
                    error_str.contains(fragment),
                    "Expected '{}' in error message '{}' context: {}",
                    fragment,
                    error_str,
                    context
                );
            }
        }
    }
}

#[macro_export]
macro_rules! assert_bridge_error {
    ($result:expr, $expected_type:ident, $context:expr) => {
        match $result {
            Err($crate::core::BridgeError::$expected_type { .. }) => {}
            Ok(value) => panic!(
                "Expected {} error but got Ok({:?}) in {}",
                stringify!($expected_type),
                value,
                $context
            ),
            Err(other) => panic!("Expected {} but got {:?} in {}", stringify!($expected_type), other, $context),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BridgeError;

    #[test]
    fn test_fixture_paths_are_private() {
        let first = BridgeFixture::new();
        let second = BridgeFixture::new();
        assert_ne!(first.path("a.db"), second.path("a.db"));
        assert!(first.path("a.db").ends_with("a.db"));
    }

    #[test]
    fn test_kinds_table_fixture() {
        let fixture = BridgeFixture::new();
        let id = fixture.open("kinds.db");
        fixture.with_kinds_table(id).unwrap();

        let rows = fixture.bridge.query(id, "SELECT COUNT(*) AS c FROM kinds", &[]).unwrap();
        assert_eq!(rows[0].get("c"), Some(&SqlValue::Integer(1)));
    }

    #[test]
    fn test_error_assertion_macro() {
        let result: Result<i32> = Err(BridgeError::NotFound(3));
        crate::assert_bridge_error!(result, NotFound, "macro test");

        let result: Result<i32> = Err(BridgeError::InvalidArguments("x".to_string()));
        crate::assert_bridge_error!(result, InvalidArguments, "macro test");
    }

    #[test]
    fn test_error_message_quality() {
        let result: Result<i32> = Err(BridgeError::NotFound(12));
        error_testing::verify_error_message_quality(&result, "12", "not found test");
    }
}

/// Command decoding
///
/// Turns a method name and a loosely typed argument map into a recognized
/// `Method` and typed `CommandArguments`.

use crate::core::db::SqlValue;
use crate::core::{BridgeError, Result};
use serde::Deserialize;

/// The closed set of operations the bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Open,
    Close,
    Execute,
    Insert,
    Update,
    Query,
    DebugMode,
    PlatformVersion,
}

impl Method {
    /// Every recognized method, in dispatch order
    pub const ALL: [Method; 8] = [
        Method::Open,
        Method::Close,
        Method::Execute,
        Method::Insert,
        Method::Update,
        Method::Query,
        Method::DebugMode,
        Method::PlatformVersion,
    ];

    /// Resolves a wire method name.
    ///
    /// `open` and `close` are accepted as short forms of `openDatabase` and
    /// `closeDatabase`. Unknown names return `None`.
    pub fn from_name(name: &str) -> Option<Method> {
        match name {
            "openDatabase" | "open" => Some(Method::Open),
            "closeDatabase" | "close" => Some(Method::Close),
            "execute" => Some(Method::Execute),
            "insert" => Some(Method::Insert),
            "update" => Some(Method::Update),
            "query" => Some(Method::Query),
            "debugMode" => Some(Method::DebugMode),
            "getPlatformVersion" => Some(Method::PlatformVersion),
            _ => None,
        }
    }

    /// Canonical wire name, also used as the error code in responses.
    pub fn name(self) -> &'static str {
        match self {
            Method::Open => "openDatabase",
            Method::Close => "closeDatabase",
            Method::Execute => "execute",
            Method::Insert => "insert",
            Method::Update => "update",
            Method::Query => "query",
            Method::DebugMode => "debugMode",
            Method::PlatformVersion => "getPlatformVersion",
        }
    }
}

/// Decoded command arguments.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandArguments {
    /// Database handle
    pub id: Option<i64>,
    /// Database file path
    pub path: Option<String>,
    /// SQL text
    pub sql: Option<String>,
    /// Positional statement arguments
    #[serde(alias = "arguments")]
    pub sql_arguments: Option<Vec<SqlValue>>,
    /// Open the database without write access
    #[serde(default)]
    pub read_only: bool,
}

impl CommandArguments {
    /// Decodes the argument map of a request. A JSON `null` means no arguments.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Self::deserialize(value).map_err(|e| BridgeError::InvalidArguments(e.to_string()))
    }

    pub fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| BridgeError::InvalidArguments("missing 'id'".to_string()))
    }

    pub fn require_path(&self) -> Result<&str> {
        self.path
            .as_deref()
            .ok_or_else(|| BridgeError::InvalidArguments("missing 'path'".to_string()))
    }

    pub fn require_sql(&self) -> Result<&str> {
        self.sql
            .as_deref()
            .ok_or_else(|| BridgeError::InvalidArguments("missing 'sql'".to_string()))
    }

    /// Statement arguments; absent means none.
    pub fn sql_arguments(&self) -> &[SqlValue] {
        self.sql_arguments.as_deref().unwrap_or(&[])
    }
}

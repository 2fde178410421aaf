/// Database Module
///
/// Engine-facing half of the bridge, split by concern:
/// - **Values** (`value.rs`): the closed tagged union shared by rows and bound arguments
/// - **Rows** (`row.rs`): converts native result rows without coercing kinds
/// - **Registry** (`registry.rs`): thread-safe handle → connection map
/// - **Connection** (`connection.rs`): one opened database behind a handle
/// - **Queries** (`query.rs`): statement execution against a connection
///
/// ## Error Handling
///
/// Engine errors are wrapped in `BridgeError::Native` together with the SQL
/// text or path that caused them.
pub mod connection;
pub mod query;
pub mod registry;
pub mod row;
pub mod value;

pub use connection::*;
pub use query::*;
pub use registry::*;
pub use row::*;
pub use value::*;

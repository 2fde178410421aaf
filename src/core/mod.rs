/// Core Module for sqlbridge
///
/// This module contains the pieces with real design weight: the value model,
/// the row marshaller, the handle registry and the per-handle connection,
/// plus the error type they all share.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{BridgeError, Result};

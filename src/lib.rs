// Core infrastructure modules
pub mod core;

// Command surface
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod transport;

pub use dispatcher::{Bridge, BridgeOptions, Outcome, Reply};

#[cfg(test)]
mod test_utils;

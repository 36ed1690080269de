// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod config;
pub mod logger;

#[cfg(test)]
mod test_utils;

pub use crate::core::db::{
    Command, Connection, ConnectionOptions, FieldType, NonQueryResult, QueryCanceller, Reader,
    StatementType, Value,
};
pub use crate::core::{DoError, Result};

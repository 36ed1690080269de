/// Core Module for dosql
///
/// The database driver core and the error types shared across the crate.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{DoError, Result};

//! The Diff module compares the decoded storage of a contract at two points: two blocks, two
//! dump files, or a dump file and a block.

/// Error types for the diff module
pub mod error;

mod core;
mod interfaces;

// re-export the public interface
pub use core::{diff, DiffResult};
pub use error::Error;
pub use interfaces::{DiffArgs, DiffArgsBuilder};

//! The Read module decodes the storage of a contract from its compiler storage layout.
//!
//! Slots are read from a live node, from a dump file produced by the dump module, or from a dump
//! file with a live fallback for slots the dump does not cover.

/// Error types for the read module
pub mod error;

mod core;
mod interfaces;

// re-export the public interface
pub use core::{
    read,
    source::{open_accessor, StorageSource},
    Lookup, ReadResult,
};
pub use error::Error;
pub use interfaces::{ReadArgs, ReadArgsBuilder};

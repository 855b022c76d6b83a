//! The Dump module reads contiguous raw storage slots of a contract into a flat dump buffer,
//! 32 bytes per slot. The buffer is the dump file format consumed by the read and diff modules.

/// Error types for the dump module
pub mod error;

mod core;
mod interfaces;

// re-export the public interface
pub use core::{dump, dump_slots, DumpResult};
pub use error::Error;
pub use interfaces::{DumpArgs, DumpArgsBuilder, SlotRange};

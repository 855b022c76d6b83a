//! The Core module serves as the central integration point for all of slotlens'
//! functionality, providing access to the storage engine and the tools built on it.
//!
//! This module re-exports the public interfaces of all the tool-specific crates,
//! making it easier to use slotlens' capabilities in other projects.

// Re-export all tool-specific modules
pub use slotlens_diff;
pub use slotlens_dump;
pub use slotlens_read;
pub use slotlens_storage;

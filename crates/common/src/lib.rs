//! Common utilities, constants, and resources used across the slotlens codebase.
//!
//! This crate provides shared functionality for the slotlens toolkit, including
//! the raw storage slot type, the slot-fetch capability consumed by the storage
//! engine, the RPC collaborator implementing it, and general utility functions.

/// Constants used throughout the slotlens codebase.
pub mod constants;

/// Utilities for interacting with Ethereum, including raw storage slots
/// and RPC functionality.
pub mod ether;

/// General utility functions and types for common tasks.
pub mod utils;

//! Storage slots, providers, and RPC helpers.

/// A provider wrapper around alloy's transports.
pub mod provider;

/// RPC helpers and the live slot fetcher.
pub mod rpc;

/// The raw storage slot type and the slot-fetch capability.
pub mod slot;

//! Layout-driven decoding and diffing of EVM contract storage.
//!
//! Given a compiler storage layout ([`StorageLayout`]) and a [`SlotAccessor`] over some source of
//! raw slots, this crate decodes each storage variable into a [`DecodedValue`], looks up single
//! mapping entries for known keys, captures whole-contract [`Snapshot`]s, and reduces two
//! snapshots of the same layout to a list of [`Change`]s.
//!
//! The crate never talks to the network itself. Live reads come from a
//! [`SlotFetcher`](slotlens_common::ether::slot::SlotFetcher) injected into the accessor.

/// Error types for the storage module
pub mod error;

mod core;
mod interfaces;

// re-export the public interface
pub use crate::core::{
    accessor::{BufferCoverage, DumpBuffer, SlotAccessor, SlotSource, DEFAULT_LENGTH_LIMIT},
    decoder::decode,
    differ::{compare, Change},
    mapping::{decode_mapping_entry, decode_mapping_path, encode_key, mapping_entry_variable},
    position::{array_data_slot, element_position, mapping_entry_slot},
    snapshot::{capture, FailurePolicy, Snapshot, SnapshotEntry},
};
pub use error::Error;
pub use interfaces::{
    layout::{StorageLayout, StorageType, StorageVariable},
    value::{DecodedValue, Scalar},
};
pub use slotlens_common::ether::slot::{RawSlot, SlotFetcher};

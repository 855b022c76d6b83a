use alloy::primitives::U256;
use hashbrown::HashMap;
use slotlens_common::{
    constants::SLOT_SIZE,
    ether::slot::{RawSlot, SlotFetcher},
    utils::hex::ToLowerHex,
};
use tracing::{debug, trace};

use crate::error::Error;

/// How much of a requested slot a [`DumpBuffer`] covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferCoverage {
    /// All 32 bytes were in the buffer
    Full,
    /// Only the first `n` bytes were in the buffer; the rest were zero-filled
    Partial(usize),
    /// The slot starts at or past the end of the buffer
    Uncovered,
}

/// Where a slot returned by [`SlotAccessor::get_with_source`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotSource {
    /// The accessor's cache, filled by an earlier read or by [`SlotAccessor::set_cache`]
    Cache,
    /// The dump buffer, with its coverage of the slot
    Buffer(BufferCoverage),
    /// The injected [`SlotFetcher`]
    Provider,
    /// Nothing covered the slot and no fetcher is configured; the slot reads as zero
    Empty,
}

/// A flat dump of contiguous storage: slot `i` occupies bytes `32 * i .. 32 * (i + 1)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DumpBuffer {
    bytes: Vec<u8>,
}

impl DumpBuffer {
    /// Wraps the raw bytes of a dump.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// The length of the dump in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the dump holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reads slot `index` from the dump. Partially covered slots are zero-padded on the right.
    pub fn read(&self, index: U256) -> (BufferCoverage, RawSlot) {
        let start = match usize::try_from(index)
            .ok()
            .and_then(|index| index.checked_mul(SLOT_SIZE))
        {
            Some(start) if start < self.bytes.len() => start,
            _ => return (BufferCoverage::Uncovered, RawSlot::EMPTY),
        };

        let available = self.bytes.len() - start;
        if available >= SLOT_SIZE {
            (BufferCoverage::Full, RawSlot::from_prefix(&self.bytes[start..start + SLOT_SIZE]))
        } else {
            (BufferCoverage::Partial(available), RawSlot::from_prefix(&self.bytes[start..]))
        }
    }
}

impl From<Vec<u8>> for DumpBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// The default [`SlotAccessor::length_limit`]: the most array elements or byte-string slots a
/// single value may span.
pub const DEFAULT_LENGTH_LIMIT: usize = 1 << 20;

/// A memoizing view of one contract's storage.
///
/// Reads are resolved, in order, from the cache, then the dump buffer (if any), then the
/// [`SlotFetcher`] (if any). A slot that is neither cached, buffered, nor fetchable reads as
/// [`RawSlot::EMPTY`]. Every resolved slot is cached, so the fetcher is invoked at most once per
/// index for the lifetime of the accessor.
///
/// An accessor is owned by one decode session at a time; sessions comparing two snapshots of the
/// same chain state may share it sequentially.
#[derive(Debug, Default)]
pub struct SlotAccessor {
    fetcher: Option<Box<dyn SlotFetcher>>,
    buffer: Option<DumpBuffer>,
    cache: HashMap<U256, RawSlot>,
    length_limit: Option<usize>,
}

impl SlotAccessor {
    /// Creates an accessor reading through `fetcher`.
    pub fn new(fetcher: impl SlotFetcher + 'static) -> Self {
        Self { fetcher: Some(Box::new(fetcher)), ..Self::default() }
    }

    /// Creates an accessor without a fetcher. Unbuffered slots read as zero.
    pub fn offline() -> Self {
        Self::default()
    }

    /// Consults `buffer` before the fetcher.
    pub fn with_buffer(mut self, buffer: impl Into<DumpBuffer>) -> Self {
        self.buffer = Some(buffer.into());
        self
    }

    /// Caps the number of elements (or byte-string slots) decoded for one value. Longer stored
    /// lengths fail with [`Error::LengthOverflow`] before any element is read.
    pub fn with_length_limit(mut self, limit: usize) -> Self {
        self.length_limit = Some(limit);
        self
    }

    /// The element limit in effect, [`DEFAULT_LENGTH_LIMIT`] unless set.
    pub fn length_limit(&self) -> usize {
        self.length_limit.unwrap_or(DEFAULT_LENGTH_LIMIT)
    }

    /// Whether a live fetcher is configured.
    pub fn is_live(&self) -> bool {
        self.fetcher.is_some()
    }

    /// Returns the slot at `index`.
    pub async fn get(&mut self, index: U256) -> Result<RawSlot, Error> {
        self.get_with_source(index).await.map(|(slot, _)| slot)
    }

    /// Returns the slot at `index` along with where it was resolved from.
    ///
    /// Fetch failures are returned unchanged as [`Error::FetchFailure`] and leave the cache as
    /// it was, so a retried read fetches again.
    pub async fn get_with_source(&mut self, index: U256) -> Result<(RawSlot, SlotSource), Error> {
        if let Some(slot) = self.cache.get(&index) {
            trace!("slot {} read from cache", index.to_lower_hex());
            return Ok((*slot, SlotSource::Cache));
        }

        let (slot, source) = match self.read_buffer(index) {
            Some((coverage, slot)) => (slot, SlotSource::Buffer(coverage)),
            None => match &self.fetcher {
                Some(fetcher) => {
                    let slot = fetcher.fetch(index).await.map_err(Error::FetchFailure)?;
                    debug!("slot {} fetched from provider: {}", index.to_lower_hex(), slot);
                    (slot, SlotSource::Provider)
                }
                None => {
                    debug!("slot {} is out of bounds, returning empty slot", index.to_lower_hex());
                    (RawSlot::EMPTY, SlotSource::Empty)
                }
            },
        };

        self.cache.insert(index, slot);
        Ok((slot, source))
    }

    /// Pre-seeds the cache. Later reads of `index` return `slot` without consulting the buffer or
    /// fetcher.
    pub fn set_cache(&mut self, index: U256, slot: RawSlot) {
        self.cache.insert(index, slot);
    }

    /// Returns the cached slot at `index`, if any.
    pub fn get_cache(&self, index: U256) -> Option<RawSlot> {
        self.cache.get(&index).copied()
    }

    /// The number of cached slots.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    // returns `None` when there is no buffer or it does not cover `index`
    fn read_buffer(&self, index: U256) -> Option<(BufferCoverage, RawSlot)> {
        let buffer = self.buffer.as_ref()?;
        match buffer.read(index) {
            (BufferCoverage::Uncovered, _) => {
                trace!("slot {} is not covered by the dump", index.to_lower_hex());
                None
            }
            (BufferCoverage::Partial(n), slot) => {
                debug!(
                    "slot {} is partially out of bounds, returning {} bytes: {}",
                    index.to_lower_hex(),
                    n,
                    slot
                );
                Some((BufferCoverage::Partial(n), slot))
            }
            (BufferCoverage::Full, slot) => {
                debug!("slot {} was read from the dump: {}", index.to_lower_hex(), slot);
                Some((BufferCoverage::Full, slot))
            }
        }
    }
}

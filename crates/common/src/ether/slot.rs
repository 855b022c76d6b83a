use std::{fmt, sync::Arc};

use alloy::primitives::{B256, U256};
use async_trait::async_trait;
use eyre::{eyre, Result};

use crate::{constants::SLOT_SIZE, utils::strings::decode_hex};

/// The contents of one EVM storage slot: exactly 32 bytes, big-endian.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RawSlot(pub B256);

impl RawSlot {
    /// An all-zero slot. Unwritten storage reads as this value.
    pub const EMPTY: RawSlot = RawSlot(B256::ZERO);

    /// Creates a [`RawSlot`] from its 32 bytes.
    pub const fn new(bytes: [u8; SLOT_SIZE]) -> Self {
        RawSlot(B256::new(bytes))
    }

    /// Parses a `0x`-prefixed hex string of at most 64 hex characters, as returned by
    /// `eth_getStorageAt`. Shorter strings, including `0x`, are left-padded with zeros.
    ///
    /// ```
    /// use slotlens_common::ether::slot::RawSlot;
    ///
    /// assert_eq!(RawSlot::from_hex("0x").expect("valid"), RawSlot::EMPTY);
    /// assert_eq!(RawSlot::from_hex("0x01").expect("valid").as_bytes()[31], 1);
    /// assert!(RawSlot::from_hex(&format!("0x{}", "00".repeat(33))).is_err());
    /// ```
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = decode_hex(s)?;
        if bytes.len() > SLOT_SIZE {
            return Err(eyre!("storage word '{}' is longer than {} bytes", s, SLOT_SIZE));
        }

        let mut word = [0u8; SLOT_SIZE];
        word[SLOT_SIZE - bytes.len()..].copy_from_slice(&bytes);
        Ok(RawSlot::new(word))
    }

    /// Builds a slot from a prefix of its bytes, zero-padding on the right. Bytes past the
    /// 32nd are ignored.
    ///
    /// ```
    /// use slotlens_common::ether::slot::RawSlot;
    ///
    /// let slot = RawSlot::from_prefix(&[0xaa, 0xbb]);
    /// assert_eq!(&slot.as_bytes()[..3], &[0xaa, 0xbb, 0x00]);
    /// ```
    pub fn from_prefix(bytes: &[u8]) -> Self {
        let len = bytes.len().min(SLOT_SIZE);
        let mut word = [0u8; SLOT_SIZE];
        word[..len].copy_from_slice(&bytes[..len]);
        RawSlot::new(word)
    }

    /// Returns the raw bytes of the slot.
    pub fn as_bytes(&self) -> &[u8; SLOT_SIZE] {
        &self.0 .0
    }

    /// Interprets the whole slot as an unsigned 256-bit integer.
    pub fn to_word(&self) -> U256 {
        U256::from_be_bytes(self.0 .0)
    }

    /// Whether every byte of the slot is zero.
    pub fn is_empty(&self) -> bool {
        self.0 == B256::ZERO
    }
}

impl From<U256> for RawSlot {
    fn from(word: U256) -> Self {
        RawSlot::new(word.to_be_bytes::<SLOT_SIZE>())
    }
}

impl From<B256> for RawSlot {
    fn from(bytes: B256) -> Self {
        RawSlot(bytes)
    }
}

impl fmt::Display for RawSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The capability to fetch a raw storage slot from some source, e.g. a live node.
///
/// Implementations are free to perform I/O. Callers await every fetch before issuing the next
/// one, so implementations never see concurrent requests from a single decode pass. Failures are
/// returned as-is; retry policy belongs to the implementation.
#[async_trait]
pub trait SlotFetcher: Send + Sync + fmt::Debug {
    /// Fetches the slot at `index`.
    async fn fetch(&self, index: U256) -> Result<RawSlot>;
}

#[async_trait]
impl<T: SlotFetcher + ?Sized> SlotFetcher for Arc<T> {
    async fn fetch(&self, index: U256) -> Result<RawSlot> {
        (**self).fetch(index).await
    }
}

#[async_trait]
impl<T: SlotFetcher + ?Sized> SlotFetcher for Box<T> {
    async fn fetch(&self, index: U256) -> Result<RawSlot> {
        (**self).fetch(index).await
    }
}

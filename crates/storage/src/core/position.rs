//! Slot arithmetic for derived storage locations.
//!
//! All arithmetic is on 256-bit words and wraps, as the EVM does: a hashed base slot plus an
//! element index may exceed `2^256`.

use alloy::primitives::{keccak256, U256};
use slotlens_common::constants::SLOT_SIZE;

/// The slot at which the elements (or long byte-string data) of the variable stored at `slot`
/// begin: `keccak256(pad32(slot))`.
///
/// ```
/// use alloy::primitives::U256;
/// use slotlens_storage::array_data_slot;
///
/// // keccak256(0x00..00)
/// assert_eq!(
///     array_data_slot(U256::ZERO),
///     "0x290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563"
///         .parse::<U256>()
///         .expect("valid"),
/// );
/// ```
pub fn array_data_slot(slot: U256) -> U256 {
    U256::from_be_bytes(keccak256(slot.to_be_bytes::<SLOT_SIZE>()).0)
}

/// The slot of the mapping entry for an already encoded key: `keccak256(key ++ pad32(slot))`.
///
/// Value-type keys are encoded to 32 bytes beforehand; `string` and `bytes` keys are hashed as
/// their raw bytes. See [`encode_key`](crate::encode_key).
pub fn mapping_entry_slot(encoded_key: &[u8], slot: U256) -> U256 {
    let mut preimage = Vec::with_capacity(encoded_key.len() + SLOT_SIZE);
    preimage.extend_from_slice(encoded_key);
    preimage.extend_from_slice(&slot.to_be_bytes::<SLOT_SIZE>());
    U256::from_be_bytes(keccak256(&preimage).0)
}

/// The `(slot, offset)` of element `index` of an array whose elements start at `base`.
///
/// Elements of at most 32 bytes are packed `32 / size` to a slot, starting at the low-order end.
/// Wider elements start on a fresh slot each and take `ceil(size / 32)` slots.
///
/// ```
/// use alloy::primitives::U256;
/// use slotlens_storage::element_position;
///
/// let base = U256::from(100);
/// assert_eq!(element_position(base, U256::from(0), 16), (base, 0));
/// assert_eq!(element_position(base, U256::from(1), 16), (base, 16));
/// assert_eq!(element_position(base, U256::from(2), 16), (base + U256::from(1), 0));
/// assert_eq!(element_position(base, U256::from(3), 64), (base + U256::from(6), 0));
/// ```
pub fn element_position(base: U256, index: U256, element_size: u64) -> (U256, u8) {
    let size = element_size.max(1);
    let slot_size = SLOT_SIZE as u64;

    if size <= slot_size {
        let per_slot = U256::from(slot_size / size);
        let offset = (index % per_slot).to::<u64>() * size;
        (base.wrapping_add(index / per_slot), offset as u8)
    } else {
        let slots = U256::from(size.div_ceil(slot_size));
        (base.wrapping_add(index.wrapping_mul(slots)), 0)
    }
}

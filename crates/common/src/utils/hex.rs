use super::strings::encode_hex;
use alloy::primitives::{I256, U256};

/// A convenience function which encodes a given EVM type into a sized, lowercase hex string.
pub trait ToLowerHex {
    /// Encodes `self` into a `0x`-prefixed lowercase hex string.
    fn to_lower_hex(&self) -> String;
}

impl ToLowerHex for U256 {
    fn to_lower_hex(&self) -> String {
        format!("0x{}", encode_hex(&self.to_be_bytes::<32>()))
    }
}

impl ToLowerHex for I256 {
    fn to_lower_hex(&self) -> String {
        self.into_raw().to_lower_hex()
    }
}

impl ToLowerHex for Vec<u8> {
    fn to_lower_hex(&self) -> String {
        format!("0x{}", encode_hex(self))
    }
}

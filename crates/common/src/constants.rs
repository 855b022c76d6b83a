use fancy_regex::Regex;
use lazy_static::lazy_static;

/// The size of a single EVM storage slot, in bytes.
pub const SLOT_SIZE: usize = 32;

lazy_static! {
    /// The following regex is used to validate Ethereum addresses.
    pub static ref ADDRESS_REGEX: Regex = Regex::new(r"^(0x)?[0-9a-fA-F]{40}$").expect("failed to compile regex");
}

use eyre::{eyre, Result};
use std::fmt::Write;

/// Decodes a hex string into a vector of bytes. Odd-length strings are treated as if they had a
/// leading zero nibble, which is how nodes abbreviate storage words (`0x1`).
///
/// ```
/// use slotlens_common::utils::strings::decode_hex;
///
/// let hex = "48656c6c6f20576f726c64"; // "Hello World" in hex
/// let result = decode_hex(hex).expect("should decode hex");
/// assert_eq!(result, vec![72, 101, 108, 108, 111, 32, 87, 111, 114, 108, 100]);
///
/// assert_eq!(decode_hex("0x1").expect("should decode hex"), vec![1]);
/// assert_eq!(decode_hex("0x").expect("should decode hex"), Vec::<u8>::new());
/// ```
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    // normalize
    let s = s.trim();
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);

    if s.is_empty() {
        return Ok(vec![]);
    }

    let normalized = if s.len() % 2 == 1 { format!("0{s}") } else { s.to_string() };
    if !normalized.is_ascii() {
        return Err(eyre!("invalid hex string: {}", s));
    }

    (0..normalized.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&normalized[i..i + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| eyre!("invalid hex string: {}", s))
}

/// Encodes a vector of bytes into a hex string
///
/// ```
/// use slotlens_common::utils::strings::encode_hex;
///
/// let bytes = vec![72, 101, 108, 108, 111, 32, 87, 111, 114, 108, 100];
/// let result = encode_hex(&bytes);
/// assert_eq!(result, "48656c6c6f20576f726c64");
/// ```
pub fn encode_hex(s: &[u8]) -> String {
    s.iter().fold(String::new(), |mut acc, b| {
        write!(acc, "{b:02x}").expect("unable to write");
        acc
    })
}

/// Renders bytes as printable ASCII, replacing control and non-ASCII bytes with `.`
///
/// ```
/// use slotlens_common::utils::strings::printable_ascii;
///
/// assert_eq!(printable_ascii(&[0x48, 0x69, 0x00, 0xff]), "Hi..");
/// ```
pub fn printable_ascii(bytes: &[u8]) -> String {
    bytes.iter().map(|b| if b.is_ascii_graphic() || *b == b' ' { *b as char } else { '.' }).collect()
}

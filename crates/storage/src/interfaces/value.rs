use std::fmt;

use alloy::primitives::{Address, I256, U256};
use serde_json::{json, Map, Value};
use slotlens_common::utils::hex::ToLowerHex;

/// A single decoded leaf value.
///
/// Integers are kept as 256-bit values so that equality is numeric, never textual.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scalar {
    /// `uintN`, `enum X`
    Uint(U256),
    /// `intN`, sign-extended to 256 bits
    Int(I256),
    /// `bool`
    Bool(bool),
    /// `address`, `address payable`, `contract X`, `interface X`
    Address(Address),
    /// `bytesN`
    FixedBytes(Vec<u8>),
    /// `string`
    String(String),
    /// `bytes`
    Bytes(Vec<u8>),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Uint(value) => write!(f, "{value}"),
            Scalar::Int(value) => write!(f, "{value}"),
            Scalar::Bool(value) => write!(f, "{value}"),
            Scalar::Address(value) => write!(f, "{}", value.to_checksum(None)),
            Scalar::FixedBytes(value) | Scalar::Bytes(value) => write!(f, "{}", value.to_lower_hex()),
            Scalar::String(value) => write!(f, "{value:?}"),
        }
    }
}

impl Scalar {
    /// The JSON form of the scalar. Integers become decimal strings so that 256-bit values
    /// survive consumers with 64-bit floats.
    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Bool(value) => Value::Bool(*value),
            Scalar::String(value) => Value::String(value.clone()),
            Scalar::Address(value) => Value::String(value.to_checksum(None)),
            other => Value::String(other.to_string()),
        }
    }
}

/// A decoded storage value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedValue {
    /// A leaf value
    Scalar(Scalar),
    /// A static or dynamic array, in index order
    Sequence(Vec<DecodedValue>),
    /// A struct, as `(member name, value)` pairs in declaration order
    Struct(Vec<(String, DecodedValue)>),
    /// A mapping. Its entries can only be looked up by key.
    OpaqueMapping,
    /// A variable that could not be decoded, with the reason. Only produced by
    /// [`capture`](crate::capture) under [`FailurePolicy::Placeholder`](crate::FailurePolicy).
    Unreadable(String),
}

impl DecodedValue {
    /// Shorthand for an unsigned integer scalar.
    pub fn uint(value: u64) -> Self {
        DecodedValue::Scalar(Scalar::Uint(U256::from(value)))
    }

    /// Whether this is the mapping sentinel.
    pub fn is_mapping(&self) -> bool {
        matches!(self, DecodedValue::OpaqueMapping)
    }

    /// The JSON form of the value.
    ///
    /// Sequences become arrays, structs become objects keyed by member name, mappings become
    /// `null`, and unreadable values become `{ "error": reason }`.
    pub fn to_json(&self) -> Value {
        match self {
            DecodedValue::Scalar(scalar) => scalar.to_json(),
            DecodedValue::Sequence(values) => {
                Value::Array(values.iter().map(DecodedValue::to_json).collect())
            }
            DecodedValue::Struct(members) => Value::Object(
                members
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
            DecodedValue::OpaqueMapping => Value::Null,
            DecodedValue::Unreadable(reason) => json!({ "error": reason }),
        }
    }
}

impl From<Scalar> for DecodedValue {
    fn from(scalar: Scalar) -> Self {
        DecodedValue::Scalar(scalar)
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Scalar(scalar) => write!(f, "{scalar}"),
            DecodedValue::Sequence(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            DecodedValue::Struct(members) => {
                write!(f, "{{")?;
                for (i, (name, value)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {name}: {value}")?;
                }
                write!(f, " }}")
            }
            DecodedValue::OpaqueMapping => write!(f, "<mapping>"),
            DecodedValue::Unreadable(reason) => write!(f, "<unreadable: {reason}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let value = DecodedValue::Sequence(vec![DecodedValue::uint(1), DecodedValue::uint(2)]);
        assert_eq!(value.to_string(), "[1, 2]");

        let value = DecodedValue::Struct(vec![
            ("fee".to_string(), DecodedValue::uint(30)),
            ("live".to_string(), Scalar::Bool(true).into()),
        ]);
        assert_eq!(value.to_string(), "{ fee: 30, live: true }");

        assert_eq!(DecodedValue::OpaqueMapping.to_string(), "<mapping>");
        assert_eq!(Scalar::Int(I256::MINUS_ONE).to_string(), "-1");
        assert_eq!(Scalar::FixedBytes(vec![0xde, 0xad]).to_string(), "0xdead");
    }

    #[test]
    fn test_to_json() {
        let value = DecodedValue::Struct(vec![
            ("supply".to_string(), DecodedValue::Scalar(Scalar::Uint(U256::MAX))),
            ("name".to_string(), Scalar::String("Token".to_string()).into()),
            ("holders".to_string(), DecodedValue::OpaqueMapping),
        ]);

        assert_eq!(
            value.to_json(),
            json!({
                "supply": U256::MAX.to_string(),
                "name": "Token",
                "holders": null,
            })
        );
    }

    #[test]
    fn test_numeric_equality() {
        // equal numbers are equal regardless of how they were produced
        let a = DecodedValue::Scalar(Scalar::Uint(U256::from(0x10)));
        let b = DecodedValue::Scalar(Scalar::Uint("16".parse::<U256>().expect("valid")));
        assert_eq!(a, b);
    }
}

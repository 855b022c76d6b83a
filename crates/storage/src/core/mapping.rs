use alloy::primitives::{Address, I256, U256};
use slotlens_common::{
    constants::SLOT_SIZE,
    utils::{hex::ToLowerHex, strings::decode_hex},
};
use tracing::debug;

use crate::{
    core::{accessor::SlotAccessor, decoder::decode, position::mapping_entry_slot},
    error::Error,
    interfaces::{
        layout::{StorageType, StorageVariable},
        value::DecodedValue,
    },
};

/// Encodes a textual mapping key the way Solidity hashes it for a mapping keyed by `key_ty`.
///
/// Value types are encoded to one 32-byte word: integers (decimal or `0x` hex, two's complement
/// for signed types), `bool` (`true`/`false`/`1`/`0`), addresses and contract types (left-padded),
/// `bytesN` (right-padded). `string` keys are their UTF-8 bytes and `bytes` keys their hex-decoded
/// bytes, both unpadded. `string` keys are hashed exactly as given, surrounding whitespace
/// included. `variable` only names the mapping in errors.
pub fn encode_key(key_ty: &StorageType, key: &str, variable: &str) -> Result<Vec<u8>, Error> {
    if let StorageType::Bytes { label, .. } = key_ty {
        if label == "string" {
            return Ok(key.as_bytes().to_vec());
        }
    }

    let key = key.trim();
    let invalid = |reason: String| Error::invalid_key(variable, key, reason);

    let label = match key_ty {
        StorageType::Bytes { .. } => {
            return decode_hex(key).map_err(|e| invalid(e.to_string()));
        }
        StorageType::Inplace { label, members, base: None, .. } if members.is_empty() => {
            label.trim()
        }
        other => return Err(invalid(format!("mappings cannot be keyed by '{}'", other.label()))),
    };

    if label == "address" ||
        label == "address payable" ||
        label.starts_with("contract ") ||
        label.starts_with("interface ")
    {
        let address = key.parse::<Address>().map_err(|e| invalid(e.to_string()))?;
        return Ok(address.into_word().to_vec());
    }
    if label == "bool" {
        let value = match key {
            "true" | "1" => 1u8,
            "false" | "0" => 0u8,
            _ => return Err(invalid("expected true or false".to_string())),
        };
        let mut word = vec![0u8; SLOT_SIZE];
        word[SLOT_SIZE - 1] = value;
        return Ok(word);
    }
    if label.starts_with("enum ") {
        return unsigned_key(key, 8).map_err(invalid);
    }
    if let Some(width) = label.strip_prefix("uint") {
        return unsigned_key(key, key_width(width, label, &invalid)?).map_err(invalid);
    }
    if let Some(width) = label.strip_prefix("int") {
        return signed_key(key, key_width(width, label, &invalid)?).map_err(invalid);
    }
    if let Some(width) = label.strip_prefix("bytes") {
        let width = match width.parse::<usize>() {
            Ok(width @ 1..=32) => width,
            _ => return Err(invalid(format!("unsupported key type '{label}'"))),
        };
        let bytes = decode_hex(key).map_err(|e| invalid(e.to_string()))?;
        if bytes.len() > width {
            return Err(invalid(format!("{} bytes do not fit in {label}", bytes.len())));
        }
        let mut word = vec![0u8; SLOT_SIZE];
        word[..bytes.len()].copy_from_slice(&bytes);
        return Ok(word);
    }

    Err(invalid(format!("unsupported key type '{label}'")))
}

fn key_width(width: &str, label: &str, invalid: &impl Fn(String) -> Error) -> Result<usize, Error> {
    if width.is_empty() {
        return Ok(256);
    }
    match width.parse::<usize>() {
        Ok(bits) if bits % 8 == 0 && (8..=256).contains(&bits) => Ok(bits),
        _ => Err(invalid(format!("unsupported key type '{label}'"))),
    }
}

fn unsigned_key(key: &str, bits: usize) -> Result<Vec<u8>, String> {
    let value = key.parse::<U256>().map_err(|e| e.to_string())?;
    if bits < 256 && value >> bits != U256::ZERO {
        return Err(format!("does not fit in uint{bits}"));
    }
    Ok(value.to_be_bytes::<SLOT_SIZE>().to_vec())
}

fn signed_key(key: &str, bits: usize) -> Result<Vec<u8>, String> {
    let value = if key.starts_with("0x") || key.starts_with("-0x") {
        I256::from_hex_str(key)
    } else {
        I256::from_dec_str(key)
    }
    .map_err(|e| e.to_string())?;

    if bits < 256 {
        let max = I256::from_raw((U256::from(1) << (bits - 1)) - U256::from(1));
        let min = -max - I256::ONE;
        if value > max || value < min {
            return Err(format!("does not fit in int{bits}"));
        }
    }
    Ok(value.into_raw().to_be_bytes::<SLOT_SIZE>().to_vec())
}

/// Builds the synthetic variable holding `variable[key]`: at the entry slot, offset 0, of the
/// mapping's value type.
pub fn mapping_entry_variable(
    variable: &StorageVariable,
    key: &str,
) -> Result<StorageVariable, Error> {
    let StorageType::Mapping { key: key_ty, value, .. } = &variable.ty else {
        return Err(Error::malformed(&variable.name, "type", "is not a mapping"));
    };

    let encoded = encode_key(key_ty, key, &variable.name)?;
    let slot = mapping_entry_slot(&encoded, variable.slot);
    debug!("`{}[{}]` is stored at slot {}", variable.name, key, slot.to_lower_hex());

    Ok(StorageVariable {
        slot,
        offset: 0,
        name: format!("{}[{}]", variable.name, key.trim()),
        ty: value.as_ref().clone(),
    })
}

/// Decodes the entry of mapping `variable` for `key`.
pub async fn decode_mapping_entry(
    variable: &StorageVariable,
    key: &str,
    accessor: &mut SlotAccessor,
) -> Result<DecodedValue, Error> {
    decode(&mapping_entry_variable(variable, key)?, accessor).await
}

/// Decodes `variable[keys[0]][keys[1]]…` for nested mappings. Without keys the variable itself is
/// decoded.
pub async fn decode_mapping_path<S: AsRef<str>>(
    variable: &StorageVariable,
    keys: &[S],
    accessor: &mut SlotAccessor,
) -> Result<DecodedValue, Error> {
    let mut entry = variable.clone();
    for key in keys {
        entry = mapping_entry_variable(&entry, key.as_ref())?;
    }
    decode(&entry, accessor).await
}

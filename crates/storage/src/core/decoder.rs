use alloy::primitives::{Address, B256, I256, U256};
use async_recursion::async_recursion;
use slotlens_common::{constants::SLOT_SIZE, utils::hex::ToLowerHex};
use tracing::{trace, warn};

use crate::{
    core::{
        accessor::SlotAccessor,
        position::{array_data_slot, element_position},
    },
    error::Error,
    interfaces::{
        layout::{StorageType, StorageVariable},
        value::{DecodedValue, Scalar},
    },
};

/// Decodes `variable` from the storage behind `accessor`.
///
/// Mappings decode to [`DecodedValue::OpaqueMapping`] without any read; use
/// [`decode_mapping_entry`](crate::decode_mapping_entry) to look up an entry. Array elements are
/// decoded strictly in index order, one read at a time.
pub async fn decode(
    variable: &StorageVariable,
    accessor: &mut SlotAccessor,
) -> Result<DecodedValue, Error> {
    decode_at(&variable.ty, variable.slot, variable.offset, &variable.name, accessor).await
}

/// Decodes a value of type `ty` located at `slot` / `offset`. `name` is only used for errors and
/// diagnostics.
#[async_recursion]
pub(crate) async fn decode_at(
    ty: &StorageType,
    slot: U256,
    offset: u8,
    name: &str,
    accessor: &mut SlotAccessor,
) -> Result<DecodedValue, Error> {
    trace!("decoding `{}` ({}) at slot {} offset {}", name, ty.label(), slot.to_lower_hex(), offset);

    match ty {
        StorageType::Mapping { .. } => Ok(DecodedValue::OpaqueMapping),
        StorageType::Recursive { label } => Err(Error::UnsupportedType(format!(
            "{label} (self-referencing type in `{name}`)"
        ))),
        StorageType::Unsupported { encoding, label } => {
            Err(Error::UnsupportedType(format!("{label} (encoding '{encoding}')")))
        }
        StorageType::Malformed { variable, field, reason } => {
            Err(Error::malformed(variable, field, reason))
        }
        StorageType::Bytes { label, .. } => {
            decode_byte_string(label, slot, offset, name, accessor).await
        }
        StorageType::DynamicArray { base, .. } => {
            let length = U256::from_be_slice(
                &read_region(slot, offset, SLOT_SIZE as u64, name, accessor).await?,
            );
            if length.is_zero() {
                return Ok(DecodedValue::Sequence(Vec::new()));
            }

            let length = checked_length(length, length, name, accessor)?;
            decode_elements(base, array_data_slot(slot), length, name, accessor).await
        }
        StorageType::Inplace { members, .. } if !members.is_empty() => {
            let mut values = Vec::with_capacity(members.len());
            for member in members {
                let value = decode_at(
                    &member.ty,
                    slot.wrapping_add(member.slot),
                    member.offset,
                    &format!("{name}.{}", member.name),
                    accessor,
                )
                .await?;
                values.push((member.name.clone(), value));
            }
            Ok(DecodedValue::Struct(values))
        }
        StorageType::Inplace { label, base: Some(base), .. } => {
            let length = static_array_length(label)
                .ok_or_else(|| Error::malformed(name, "label", format!("'{label}' has no array length")))?;
            let length = checked_length(U256::from(length), U256::from(length), name, accessor)?;
            decode_elements(base, slot, length, name, accessor).await
        }
        StorageType::Inplace { label, number_of_bytes, .. } => {
            let bytes = read_region(slot, offset, *number_of_bytes, name, accessor).await?;
            decode_leaf(label, &bytes).map(DecodedValue::Scalar)
        }
    }
}

/// Decodes `length` consecutive elements of type `element` stored from `base` onwards.
async fn decode_elements(
    element: &StorageType,
    base: U256,
    length: usize,
    name: &str,
    accessor: &mut SlotAccessor,
) -> Result<DecodedValue, Error> {
    let mut values = Vec::with_capacity(length.min(1024));
    for i in 0..length {
        let (slot, offset) = element_position(base, U256::from(i), element.number_of_bytes());
        values.push(decode_at(element, slot, offset, &format!("{name}[{i}]"), accessor).await?);
    }
    Ok(DecodedValue::Sequence(values))
}

/// Checks a stored `count` of elements or slots against the accessor's length limit. `length` is
/// the stored value reported on failure.
fn checked_length(
    count: U256,
    length: U256,
    name: &str,
    accessor: &SlotAccessor,
) -> Result<usize, Error> {
    match usize::try_from(count) {
        Ok(count) if count <= accessor.length_limit() => Ok(count),
        _ => {
            warn!(
                "`{}` claims length {}, beyond the limit of {}; is its type right?",
                name,
                length,
                accessor.length_limit()
            );
            Err(Error::LengthOverflow { variable: name.to_string(), length })
        }
    }
}

/// Reads the `size` bytes that end `offset` bytes from the low-order end of `slot`.
async fn read_region(
    slot: U256,
    offset: u8,
    size: u64,
    name: &str,
    accessor: &mut SlotAccessor,
) -> Result<Vec<u8>, Error> {
    if size == 0 || size > SLOT_SIZE as u64 {
        return Err(Error::malformed(
            name,
            "numberOfBytes",
            format!("{size} is not within 1..={SLOT_SIZE}"),
        ));
    }
    let (offset, size) = (offset as usize, size as usize);
    if offset + size > SLOT_SIZE {
        return Err(Error::malformed(
            name,
            "offset",
            format!("{offset} leaves no room for {size} bytes in the slot"),
        ));
    }

    let raw = accessor.get(slot).await?;
    let end = SLOT_SIZE - offset;
    Ok(raw.as_bytes()[end - size..end].to_vec())
}

/// Decodes a `string` or `bytes` value.
///
/// Values of at most 31 bytes are stored in the high-order bytes of the slot itself, with
/// `length * 2` in the lowest byte. Longer values store `length * 2 + 1` in the slot and their
/// data from `keccak256(slot)` onwards.
async fn decode_byte_string(
    label: &str,
    slot: U256,
    offset: u8,
    name: &str,
    accessor: &mut SlotAccessor,
) -> Result<DecodedValue, Error> {
    let word = read_region(slot, offset, SLOT_SIZE as u64, name, accessor).await?;

    let data = if word[SLOT_SIZE - 1] & 1 == 0 {
        let length = (word[SLOT_SIZE - 1] / 2) as usize;
        word[..length.min(SLOT_SIZE - 1)].to_vec()
    } else {
        let length = (U256::from_be_slice(&word) - U256::from(1)) / U256::from(2);
        let slots = length.saturating_add(U256::from(SLOT_SIZE - 1)) / U256::from(SLOT_SIZE);
        checked_length(slots, length, name, accessor)?;
        let length = usize::try_from(length)
            .map_err(|_| Error::LengthOverflow { variable: name.to_string(), length })?;

        let data_slot = array_data_slot(slot);
        let mut data = Vec::with_capacity(length.min(1 << 16));
        for i in 0..length.div_ceil(SLOT_SIZE) {
            let chunk = accessor.get(data_slot.wrapping_add(U256::from(i))).await?;
            data.extend_from_slice(chunk.as_bytes());
        }
        data.truncate(length);
        data
    };

    Ok(DecodedValue::Scalar(if label == "string" {
        Scalar::String(String::from_utf8_lossy(&data).into_owned())
    } else {
        Scalar::Bytes(data)
    }))
}

/// Interprets the extracted bytes of a leaf according to its type label.
pub(crate) fn decode_leaf(label: &str, bytes: &[u8]) -> Result<Scalar, Error> {
    let label = label.trim();

    // type-name prefixes first: `interface X` would otherwise look like an `int`
    if label == "address" ||
        label == "address payable" ||
        label.starts_with("contract ") ||
        label.starts_with("interface ")
    {
        return Ok(Scalar::Address(Address::from_word(B256::from(
            U256::from_be_slice(bytes).to_be_bytes::<SLOT_SIZE>(),
        ))));
    }
    if label.starts_with("enum ") {
        return Ok(Scalar::Uint(U256::from_be_slice(bytes)));
    }
    if label == "bool" {
        return Ok(Scalar::Bool(bytes.iter().any(|b| *b != 0)));
    }

    if let Some(width) = label.strip_prefix("uint") {
        integer_width(width, label)?;
        return Ok(Scalar::Uint(U256::from_be_slice(bytes)));
    }
    if let Some(width) = label.strip_prefix("int") {
        integer_width(width, label)?;

        // sign-extend to a full word
        let fill = if bytes.first().is_some_and(|b| b & 0x80 != 0) { 0xff } else { 0x00 };
        let mut word = [fill; SLOT_SIZE];
        word[SLOT_SIZE - bytes.len()..].copy_from_slice(bytes);
        return Ok(Scalar::Int(I256::from_raw(U256::from_be_bytes(word))));
    }
    if let Some(width) = label.strip_prefix("bytes") {
        return match width.parse::<usize>() {
            Ok(1..=32) => Ok(Scalar::FixedBytes(bytes.to_vec())),
            _ => Err(Error::UnsupportedType(label.to_string())),
        };
    }

    Err(Error::UnsupportedType(label.to_string()))
}

/// Validates the bit width suffix of an integer label. An empty suffix means 256.
fn integer_width(width: &str, label: &str) -> Result<u16, Error> {
    if width.is_empty() {
        return Ok(256);
    }
    match width.parse::<u16>() {
        Ok(bits) if bits % 8 == 0 && (8..=256).contains(&bits) => Ok(bits),
        _ => Err(Error::UnsupportedType(label.to_string())),
    }
}

/// The length `N` of a static array label `T[N]`.
fn static_array_length(label: &str) -> Option<usize> {
    let (_, length) = label.strip_suffix(']')?.rsplit_once('[')?;
    length.trim().parse::<usize>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::accessor::tests::RecordingFetcher;
    use slotlens_common::ether::slot::RawSlot;

    fn leaf(label: &str, size: u64) -> StorageType {
        StorageType::Inplace {
            label: label.to_string(),
            number_of_bytes: size,
            members: Vec::new(),
            base: None,
        }
    }

    fn slot_from_hex(hex: &str) -> RawSlot {
        RawSlot::from_hex(hex).expect("valid slot")
    }

    #[tokio::test]
    async fn test_packed_leaves() {
        // slot 0: [.. paused (1 byte) | owner (20 bytes)]
        let slot = slot_from_hex(
            "0x000000000000000000000001d8da6bf26964af9d7eed9e03e53415d37aa96045",
        );
        let fetcher = RecordingFetcher::new().with_slot(U256::ZERO, slot);
        let mut accessor = SlotAccessor::new(fetcher);

        let owner = StorageVariable::new("owner", U256::ZERO, 0, leaf("address", 20));
        let paused = StorageVariable::new("paused", U256::ZERO, 20, leaf("bool", 1));

        assert_eq!(
            decode(&owner, &mut accessor).await.expect("decode failed"),
            DecodedValue::Scalar(Scalar::Address(
                "0xd8da6bf26964af9d7eed9e03e53415d37aa96045".parse().expect("valid address")
            ))
        );
        assert_eq!(
            decode(&paused, &mut accessor).await.expect("decode failed"),
            DecodedValue::Scalar(Scalar::Bool(true))
        );
    }

    #[tokio::test]
    async fn test_decoding_is_pure() {
        let fetcher = RecordingFetcher::new().with_slot(U256::ZERO, U256::from(1234));
        let mut accessor = SlotAccessor::new(fetcher);
        let variable = StorageVariable::new("x", U256::ZERO, 0, leaf("uint256", 32));

        let first = decode(&variable, &mut accessor).await.expect("decode failed");
        let second = decode(&variable, &mut accessor).await.expect("decode failed");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_signed_integers_are_sign_extended() {
        // int8 = -2 at offset 0, int16 = 300 at offset 1
        let slot = slot_from_hex("0x012cfe");
        let fetcher = RecordingFetcher::new().with_slot(U256::ZERO, slot);
        let mut accessor = SlotAccessor::new(fetcher);

        let a = StorageVariable::new("a", U256::ZERO, 0, leaf("int8", 1));
        let b = StorageVariable::new("b", U256::ZERO, 1, leaf("int16", 2));

        assert_eq!(
            decode(&a, &mut accessor).await.expect("decode failed"),
            DecodedValue::Scalar(Scalar::Int(I256::try_from(-2i64).expect("valid")))
        );
        assert_eq!(
            decode(&b, &mut accessor).await.expect("decode failed"),
            DecodedValue::Scalar(Scalar::Int(I256::try_from(300i64).expect("valid")))
        );
    }

    #[test]
    fn test_leaf_labels() {
        assert_eq!(decode_leaf("bytes2", &[0xbe, 0xef]).expect("valid"), Scalar::FixedBytes(vec![0xbe, 0xef]));
        assert_eq!(decode_leaf("enum Status", &[2]).expect("valid"), Scalar::Uint(U256::from(2)));
        assert!(matches!(
            decode_leaf("interface IERC20", &[0u8; 20]).expect("valid"),
            Scalar::Address(_)
        ));
        assert!(matches!(
            decode_leaf("contract Token", &[0u8; 20]).expect("valid"),
            Scalar::Address(_)
        ));
        assert!(matches!(decode_leaf("uint7", &[0]), Err(Error::UnsupportedType(l)) if l == "uint7"));
        assert!(matches!(decode_leaf("fixed128x18", &[0; 16]), Err(Error::UnsupportedType(_))));
        assert!(matches!(decode_leaf("bytes33", &[0; 32]), Err(Error::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn test_leaf_overflowing_the_slot_is_malformed() {
        let mut accessor = SlotAccessor::offline();

        let variable = StorageVariable::new("x", U256::ZERO, 16, leaf("uint256", 32));
        assert!(matches!(
            decode(&variable, &mut accessor).await,
            Err(Error::MalformedLayout { field, .. }) if field == "offset"
        ));

        let variable = StorageVariable::new("y", U256::ZERO, 0, leaf("uint256", 33));
        assert!(matches!(
            decode(&variable, &mut accessor).await,
            Err(Error::MalformedLayout { field, .. }) if field == "numberOfBytes"
        ));
    }

    #[tokio::test]
    async fn test_mapping_performs_no_fetch() {
        let fetcher = RecordingFetcher::new();
        let log = fetcher.log();
        let mut accessor = SlotAccessor::new(fetcher);

        let variable = StorageVariable::new(
            "balances",
            U256::from(1),
            0,
            StorageType::Mapping {
                label: "mapping(address => uint256)".to_string(),
                number_of_bytes: 32,
                key: Box::new(leaf("address", 20)),
                value: Box::new(leaf("uint256", 32)),
            },
        );

        assert_eq!(
            decode(&variable, &mut accessor).await.expect("decode failed"),
            DecodedValue::OpaqueMapping
        );
        assert!(log.lock().expect("poisoned").is_empty());
    }

    fn dynamic_array(element: StorageType) -> StorageType {
        StorageType::DynamicArray {
            label: format!("{}[]", element.label()),
            number_of_bytes: 32,
            base: Box::new(element),
        }
    }

    #[tokio::test]
    async fn test_empty_dynamic_array_reads_only_its_length() {
        let fetcher = RecordingFetcher::new();
        let log = fetcher.log();
        let mut accessor = SlotAccessor::new(fetcher);

        let variable = StorageVariable::new("items", U256::from(4), 0, dynamic_array(leaf("uint256", 32)));
        assert_eq!(
            decode(&variable, &mut accessor).await.expect("decode failed"),
            DecodedValue::Sequence(Vec::new())
        );
        assert_eq!(*log.lock().expect("poisoned"), vec![U256::from(4)]);
    }

    #[tokio::test]
    async fn test_half_slot_elements_pack_from_the_low_end() {
        // slot = 0x<A (16 bytes)><B (16 bytes)>
        let a = U256::from(0xaaaa);
        let b = U256::from(0xbbbb);
        let packed = (a << 128) | b;

        let base = array_data_slot(U256::ZERO);
        let fetcher = RecordingFetcher::new()
            .with_slot(U256::ZERO, U256::from(2))
            .with_slot(base, packed);
        let log = fetcher.log();
        let mut accessor = SlotAccessor::new(fetcher);

        let variable = StorageVariable::new("items", U256::ZERO, 0, dynamic_array(leaf("uint128", 16)));
        assert_eq!(
            decode(&variable, &mut accessor).await.expect("decode failed"),
            DecodedValue::Sequence(vec![
                DecodedValue::Scalar(Scalar::Uint(b)),
                DecodedValue::Scalar(Scalar::Uint(a)),
            ])
        );

        // the length slot, then the one shared element slot
        assert_eq!(*log.lock().expect("poisoned"), vec![U256::ZERO, base]);
    }

    #[tokio::test]
    async fn test_elements_are_fetched_in_index_order() {
        let base = array_data_slot(U256::from(2));
        let fetcher = RecordingFetcher::new()
            .with_slot(U256::from(2), U256::from(3))
            .with_slot(base, U256::from(10))
            .with_slot(base + U256::from(1), U256::from(20))
            .with_slot(base + U256::from(2), U256::from(30));
        let log = fetcher.log();
        let mut accessor = SlotAccessor::new(fetcher);

        let variable = StorageVariable::new("xs", U256::from(2), 0, dynamic_array(leaf("uint256", 32)));
        assert_eq!(
            decode(&variable, &mut accessor).await.expect("decode failed"),
            DecodedValue::Sequence(vec![
                DecodedValue::uint(10),
                DecodedValue::uint(20),
                DecodedValue::uint(30),
            ])
        );
        assert_eq!(
            *log.lock().expect("poisoned"),
            vec![U256::from(2), base, base + U256::from(1), base + U256::from(2)]
        );
    }

    #[tokio::test]
    async fn test_huge_array_length_overflows() {
        let fetcher = RecordingFetcher::new().with_slot(U256::ZERO, U256::MAX);
        let mut accessor = SlotAccessor::new(fetcher);

        let variable = StorageVariable::new("xs", U256::ZERO, 0, dynamic_array(leaf("uint8", 1)));
        assert!(matches!(
            decode(&variable, &mut accessor).await,
            Err(Error::LengthOverflow { length, .. }) if length == U256::MAX
        ));
    }

    #[tokio::test]
    async fn test_length_beyond_limit_reads_nothing_more() {
        // fits in usize, but is no plausible array length
        let fetcher = RecordingFetcher::new().with_slot(U256::ZERO, U256::from(1u64 << 40));
        let log = fetcher.log();
        let mut accessor = SlotAccessor::new(fetcher);

        let variable = StorageVariable::new("xs", U256::ZERO, 0, dynamic_array(leaf("uint8", 1)));
        assert!(matches!(
            decode(&variable, &mut accessor).await,
            Err(Error::LengthOverflow { length, .. }) if length == U256::from(1u64 << 40)
        ));
        assert_eq!(*log.lock().expect("poisoned"), vec![U256::ZERO]);
    }

    #[tokio::test]
    async fn test_configured_length_limit() {
        let fetcher = RecordingFetcher::new()
            .with_slot(U256::ZERO, U256::from(2))
            .with_slot(U256::from(1), U256::from(3))
            // a 65 byte string spans three data slots
            .with_slot(U256::from(2), U256::from(65 * 2 + 1));
        let mut accessor = SlotAccessor::new(fetcher).with_length_limit(2);

        let xs = StorageVariable::new("xs", U256::ZERO, 0, dynamic_array(leaf("uint256", 32)));
        let ys = StorageVariable::new("ys", U256::from(1), 0, dynamic_array(leaf("uint256", 32)));
        let name = StorageVariable::new(
            "name",
            U256::from(2),
            0,
            StorageType::Bytes { label: "string".to_string(), number_of_bytes: 32 },
        );

        assert!(decode(&xs, &mut accessor).await.is_ok());
        assert!(matches!(
            decode(&ys, &mut accessor).await,
            Err(Error::LengthOverflow { length, .. }) if length == U256::from(3)
        ));
        assert!(matches!(
            decode(&name, &mut accessor).await,
            Err(Error::LengthOverflow { length, .. }) if length == U256::from(65)
        ));
    }

    #[tokio::test]
    async fn test_struct_and_static_array() {
        // struct { uint64 fee; address admin; } at slot 5, uint16[3] at slot 7
        let config = StorageType::Inplace {
            label: "struct Config".to_string(),
            number_of_bytes: 64,
            members: vec![
                StorageVariable::new("fee", U256::ZERO, 0, leaf("uint64", 8)),
                StorageVariable::new("admin", U256::from(1), 0, leaf("address", 20)),
            ],
            base: None,
        };
        let weights = StorageType::Inplace {
            label: "uint16[3]".to_string(),
            number_of_bytes: 32,
            members: Vec::new(),
            base: Some(Box::new(leaf("uint16", 2))),
        };

        let fetcher = RecordingFetcher::new()
            .with_slot(U256::from(5), U256::from(30))
            .with_slot(U256::from(6), U256::from(0xdead))
            .with_slot(U256::from(7), slot_from_hex("0x000300020001"));
        let mut accessor = SlotAccessor::new(fetcher);

        let value = decode(&StorageVariable::new("config", U256::from(5), 0, config), &mut accessor)
            .await
            .expect("decode failed");
        let DecodedValue::Struct(members) = &value else { panic!("not a struct: {value:?}") };
        assert_eq!(members[0], ("fee".to_string(), DecodedValue::uint(30)));
        assert_eq!(members[1].0, "admin");

        assert_eq!(
            decode(&StorageVariable::new("weights", U256::from(7), 0, weights), &mut accessor)
                .await
                .expect("decode failed"),
            DecodedValue::Sequence(vec![
                DecodedValue::uint(1),
                DecodedValue::uint(2),
                DecodedValue::uint(3)
            ])
        );
    }

    #[tokio::test]
    async fn test_short_and_long_strings() {
        // "hello" in the slot itself: data left-aligned, length * 2 in the lowest byte
        let mut short = [0u8; 32];
        short[..5].copy_from_slice(b"hello");
        short[31] = 10;

        // 40 bytes of 'a' stored out of line
        let long_data = [b'a'; 40];
        let data_slot = array_data_slot(U256::from(1));
        let mut second = [0u8; 32];
        second[..8].copy_from_slice(&long_data[32..]);

        let fetcher = RecordingFetcher::new()
            .with_slot(U256::ZERO, RawSlot::new(short))
            .with_slot(U256::from(1), U256::from(40 * 2 + 1))
            .with_slot(data_slot, RawSlot::new([b'a'; 32]))
            .with_slot(data_slot + U256::from(1), RawSlot::new(second));
        let mut accessor = SlotAccessor::new(fetcher);

        let string = StorageType::Bytes { label: "string".to_string(), number_of_bytes: 32 };
        let bytes = StorageType::Bytes { label: "bytes".to_string(), number_of_bytes: 32 };

        assert_eq!(
            decode(&StorageVariable::new("name", U256::ZERO, 0, string), &mut accessor)
                .await
                .expect("decode failed"),
            DecodedValue::Scalar(Scalar::String("hello".to_string()))
        );
        assert_eq!(
            decode(&StorageVariable::new("blob", U256::from(1), 0, bytes), &mut accessor)
                .await
                .expect("decode failed"),
            DecodedValue::Scalar(Scalar::Bytes(long_data.to_vec()))
        );
    }

    #[tokio::test]
    async fn test_unknown_encoding_is_unsupported() {
        let mut accessor = SlotAccessor::offline();
        let variable = StorageVariable::new(
            "x",
            U256::ZERO,
            0,
            StorageType::Unsupported { encoding: "transient".to_string(), label: "uint256".to_string() },
        );
        assert!(matches!(decode(&variable, &mut accessor).await, Err(Error::UnsupportedType(_))));
    }
}

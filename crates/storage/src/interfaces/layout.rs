use alloy::primitives::U256;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::Error;

/// The type of a storage variable, tagged by its storage encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageType {
    /// A value stored within its declared slot(s).
    ///
    /// Structs carry their `members`, whose slots are relative to the struct's own slot. Static
    /// arrays carry a `base` element type and occupy consecutive slots from the declared one.
    Inplace {
        /// The compiler's type label, e.g. `uint128`, `struct S`, `address[3]`
        label: String,
        /// Size of the value in bytes; at most 32 for leaves
        number_of_bytes: u64,
        /// Struct members, empty for everything else
        members: Vec<StorageVariable>,
        /// Element type of a static array
        base: Option<Box<StorageType>>,
    },
    /// A `string` or `bytes` value: short values live in the slot, long ones at
    /// `hash256(slot)` onwards.
    Bytes {
        /// `string` or `bytes`
        label: String,
        /// Always 32
        number_of_bytes: u64,
    },
    /// A dynamically sized array. The length lives in the declared slot, elements start at
    /// `hash256(slot)`.
    DynamicArray {
        /// The compiler's type label, e.g. `uint256[]`
        label: String,
        /// Always 32
        number_of_bytes: u64,
        /// Element type
        base: Box<StorageType>,
    },
    /// A mapping. Entries can only be located for a known key.
    Mapping {
        /// The compiler's type label, e.g. `mapping(address => uint256)`
        label: String,
        /// Always 32
        number_of_bytes: u64,
        /// Key type
        key: Box<StorageType>,
        /// Value type
        value: Box<StorageType>,
    },
    /// A type that refers back to itself through a mapping or array, e.g. a struct holding a
    /// mapping of its own type. Resolution stops at the second occurrence.
    Recursive {
        /// The label of the recurring type
        label: String,
    },
    /// An encoding this crate does not know. Decoding it fails with
    /// [`Error::UnsupportedType`].
    Unsupported {
        /// The encoding tag as given
        encoding: String,
        /// The compiler's type label
        label: String,
    },
    /// A variable whose record could not be parsed. Decoding it fails with
    /// [`Error::MalformedLayout`]; the rest of the layout is unaffected.
    Malformed {
        /// The variable (or member) the problem was found in
        variable: String,
        /// The offending field
        field: String,
        /// What is wrong with it
        reason: String,
    },
}

impl StorageType {
    /// The compiler's type label.
    pub fn label(&self) -> &str {
        match self {
            StorageType::Inplace { label, .. } |
            StorageType::Bytes { label, .. } |
            StorageType::DynamicArray { label, .. } |
            StorageType::Mapping { label, .. } |
            StorageType::Recursive { label } |
            StorageType::Unsupported { label, .. } => label,
            StorageType::Malformed { .. } => "<malformed>",
        }
    }

    /// The size of the type in bytes, as declared by the compiler.
    pub fn number_of_bytes(&self) -> u64 {
        match self {
            StorageType::Inplace { number_of_bytes, .. } |
            StorageType::Bytes { number_of_bytes, .. } |
            StorageType::DynamicArray { number_of_bytes, .. } |
            StorageType::Mapping { number_of_bytes, .. } => *number_of_bytes,
            StorageType::Recursive { .. } |
            StorageType::Unsupported { .. } |
            StorageType::Malformed { .. } => 32,
        }
    }

    /// The encoding tag, as the compiler writes it.
    pub fn encoding(&self) -> &str {
        match self {
            StorageType::Inplace { .. } => "inplace",
            StorageType::Bytes { .. } => "bytes",
            StorageType::DynamicArray { .. } => "dynamic_array",
            StorageType::Mapping { .. } => "mapping",
            StorageType::Recursive { .. } => "recursive",
            StorageType::Unsupported { encoding, .. } => encoding,
            StorageType::Malformed { .. } => "malformed",
        }
    }

    /// Whether values of this type are mappings.
    pub fn is_mapping(&self) -> bool {
        matches!(self, StorageType::Mapping { .. })
    }
}

/// One named variable of a storage layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageVariable {
    /// The slot the variable starts at
    pub slot: U256,
    /// Byte offset within the slot, counted from the low-order (right) end
    pub offset: u8,
    /// The variable name
    pub name: String,
    /// The variable type
    pub ty: StorageType,
}

impl StorageVariable {
    /// Creates a new [`StorageVariable`].
    pub fn new(name: impl Into<String>, slot: U256, offset: u8, ty: StorageType) -> Self {
        Self { slot, offset, name: name.into(), ty }
    }
}

/// The storage layout of one contract: its variables in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageLayout {
    variables: Vec<StorageVariable>,
}

impl StorageLayout {
    /// Creates a layout from variables in declaration order.
    pub fn new(variables: Vec<StorageVariable>) -> Self {
        Self { variables }
    }

    /// The variables, in declaration order.
    pub fn variables(&self) -> &[StorageVariable] {
        &self.variables
    }

    /// Iterates over the variables in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &StorageVariable> {
        self.variables.iter()
    }

    /// Finds a variable by name.
    pub fn get(&self, name: &str) -> Option<&StorageVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// The number of variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether the layout has no variables.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Parses a layout for a single contract. See [`StorageLayout::from_json_for_contract`].
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Self::from_json_for_contract(json, None)
    }

    /// Parses a storage layout.
    ///
    /// Accepted shapes:
    /// - an array of resolved variables `{ slot, offset, name, type: { encoding, label,
    ///   numberOfBytes, members | base | key & value } }`
    /// - the compiler's `storageLayout` object `{ storage: [...], types: { "t_…": {...} } }`, whose
    ///   `type` fields reference the `types` table
    /// - an object mapping contract names to either of the above; `contract` picks one, and may
    ///   only be omitted when there is exactly one
    pub fn from_json_for_contract(json: &str, contract: Option<&str>) -> Result<Self, Error> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value, contract)
    }

    /// Parses a storage layout from an already deserialized JSON value.
    pub fn from_value(value: &Value, contract: Option<&str>) -> Result<Self, Error> {
        match value {
            Value::Array(variables) => parse_variables(variables, None),
            Value::Object(object) if object.contains_key("storage") => {
                let storage = object
                    .get("storage")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Error::malformed("<layout>", "storage", "is not an array"))?;
                let types = match object.get("types") {
                    Some(Value::Object(types)) => Some(types),
                    Some(Value::Null) | None => None,
                    Some(_) => {
                        return Err(Error::malformed("<layout>", "types", "is not an object"))
                    }
                };
                parse_variables(storage, types)
            }
            Value::Object(contracts) => {
                let selected = match contract {
                    Some(name) => contracts.get(name).ok_or_else(|| {
                        Error::malformed(
                            name,
                            "contract",
                            format!(
                                "was not found; available: {}",
                                contracts.keys().cloned().collect::<Vec<_>>().join(", ")
                            ),
                        )
                    })?,
                    None if contracts.len() == 1 => {
                        contracts.values().next().ok_or_else(|| {
                            Error::malformed("<layout>", "contract", "is missing")
                        })?
                    }
                    None => {
                        return Err(Error::malformed(
                            "<layout>",
                            "contract",
                            format!(
                                "must be given to choose between {}",
                                contracts.keys().cloned().collect::<Vec<_>>().join(", ")
                            ),
                        ))
                    }
                };

                // a contract entry is itself a layout, but never another contract map
                match selected {
                    Value::Array(_) => Self::from_value(selected, None),
                    Value::Object(object) if object.contains_key("storage") => {
                        Self::from_value(selected, None)
                    }
                    _ => Err(Error::malformed(
                        contract.unwrap_or("<layout>"),
                        "contract",
                        "is not a storage layout",
                    )),
                }
            }
            _ => Err(Error::malformed("<layout>", "layout", "must be an array or an object")),
        }
    }
}

fn parse_variables(
    variables: &[Value],
    types: Option<&Map<String, Value>>,
) -> Result<StorageLayout, Error> {
    let mut resolver = TypeResolver { types, stack: Vec::new() };
    let mut parsed = Vec::with_capacity(variables.len());

    for (i, record) in variables.iter().enumerate() {
        match resolver.variable(record, &format!("<variable {i}>")) {
            Ok(variable) => parsed.push(variable),
            Err(e) => {
                // without a name there is nothing to report the failure under
                let Some(name) = record_name(record) else { return Err(e) };
                warn!("keeping malformed variable `{}`: {}", name, e);

                let (variable, field, reason) = match e {
                    Error::MalformedLayout { variable, field, reason } => (variable, field, reason),
                    other => (name.to_string(), "type".to_string(), other.to_string()),
                };
                let slot = record
                    .get("slot")
                    .and_then(|slot| parse_uint(Some(slot), name, "slot").ok())
                    .unwrap_or_default();
                parsed.push(StorageVariable::new(
                    name,
                    slot,
                    0,
                    StorageType::Malformed { variable, field, reason },
                ));
            }
        }
    }

    Ok(StorageLayout::new(parsed))
}

/// The `name` (or compiler `label`) of a variable record.
fn record_name(record: &Value) -> Option<&str> {
    record.get("name").or_else(|| record.get("label")).and_then(Value::as_str)
}

/// Resolves type descriptors, inline or by reference into the compiler's `types` table.
struct TypeResolver<'a> {
    types: Option<&'a Map<String, Value>>,
    // type ids currently being resolved, for cycle detection
    stack: Vec<String>,
}

impl TypeResolver<'_> {
    fn variable(&mut self, value: &Value, fallback_name: &str) -> Result<StorageVariable, Error> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::malformed(fallback_name, "variable", "is not an object"))?;

        let name = record_name(value)
            .ok_or_else(|| Error::malformed(fallback_name, "name", "is missing"))?
            .to_string();
        let slot = parse_uint(object.get("slot"), &name, "slot")?;
        let offset = parse_uint(object.get("offset"), &name, "offset")?;
        if offset > U256::from(31) {
            return Err(Error::malformed(&name, "offset", format!("{offset} exceeds 31")));
        }
        let ty = self.resolve(
            object.get("type").ok_or_else(|| Error::malformed(&name, "type", "is missing"))?,
            &name,
        )?;

        Ok(StorageVariable { slot, offset: offset.to::<u8>(), name, ty })
    }

    fn resolve(&mut self, value: &Value, owner: &str) -> Result<StorageType, Error> {
        match value {
            Value::String(id) => {
                let types = self.types.ok_or_else(|| {
                    Error::malformed(owner, "type", format!("references '{id}' without a types table"))
                })?;
                let descriptor = types.get(id).ok_or_else(|| {
                    Error::malformed(owner, "type", format!("references unknown type '{id}'"))
                })?;

                if self.stack.iter().any(|seen| seen == id) {
                    let label = descriptor
                        .get("label")
                        .and_then(Value::as_str)
                        .unwrap_or(id.as_str())
                        .to_string();
                    return Ok(StorageType::Recursive { label });
                }

                self.stack.push(id.clone());
                let resolved = self.descriptor(descriptor, owner);
                self.stack.pop();
                resolved
            }
            Value::Object(_) => self.descriptor(value, owner),
            _ => Err(Error::malformed(owner, "type", "is neither a descriptor nor a reference")),
        }
    }

    fn descriptor(&mut self, value: &Value, owner: &str) -> Result<StorageType, Error> {
        let object =
            value.as_object().ok_or_else(|| Error::malformed(owner, "type", "is not an object"))?;

        let encoding = object
            .get("encoding")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::malformed(owner, "encoding", "is missing"))?;
        let label = object
            .get("label")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::malformed(owner, "label", "is missing"))?
            .to_string();
        let number_of_bytes = parse_uint(object.get("numberOfBytes"), owner, "numberOfBytes")?;
        let number_of_bytes = u64::try_from(number_of_bytes).map_err(|_| {
            Error::malformed(owner, "numberOfBytes", format!("{number_of_bytes} is too large"))
        })?;

        match encoding {
            "inplace" => {
                let members = match object.get("members") {
                    Some(Value::Array(members)) => members
                        .iter()
                        .enumerate()
                        .map(|(i, member)| {
                            self.variable(member, &format!("{owner}.<member {i}>"))
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                    Some(Value::Null) | None => Vec::new(),
                    Some(_) => return Err(Error::malformed(owner, "members", "is not an array")),
                };
                let base = match object.get("base") {
                    Some(Value::Null) | None => None,
                    Some(base) => Some(Box::new(self.resolve(base, owner)?)),
                };
                Ok(StorageType::Inplace { label, number_of_bytes, members, base })
            }
            "bytes" => Ok(StorageType::Bytes { label, number_of_bytes }),
            "dynamic_array" => {
                let base = object
                    .get("base")
                    .ok_or_else(|| Error::malformed(owner, "base", "is missing"))?;
                Ok(StorageType::DynamicArray {
                    label,
                    number_of_bytes,
                    base: Box::new(self.resolve(base, owner)?),
                })
            }
            "mapping" => {
                let key =
                    object.get("key").ok_or_else(|| Error::malformed(owner, "key", "is missing"))?;
                let value = object
                    .get("value")
                    .ok_or_else(|| Error::malformed(owner, "value", "is missing"))?;
                Ok(StorageType::Mapping {
                    label,
                    number_of_bytes,
                    key: Box::new(self.resolve(key, owner)?),
                    value: Box::new(self.resolve(value, owner)?),
                })
            }
            other => Ok(StorageType::Unsupported { encoding: other.to_string(), label }),
        }
    }
}

/// Parses a non-negative integer given as a JSON number, a decimal string, or a `0x` hex string.
fn parse_uint(value: Option<&Value>, owner: &str, field: &str) -> Result<U256, Error> {
    match value {
        None | Some(Value::Null) => Err(Error::malformed(owner, field, "is missing")),
        Some(Value::Number(number)) => number
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| Error::malformed(owner, field, format!("{number} is not an unsigned integer"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<U256>()
            .map_err(|_| Error::malformed(owner, field, format!("'{s}' is not an unsigned integer"))),
        Some(other) => Err(Error::malformed(owner, field, format!("{other} is not an unsigned integer"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESOLVED: &str = r#"[
        { "slot": "0", "offset": 0, "name": "owner",
          "type": { "encoding": "inplace", "label": "address", "numberOfBytes": "20" } },
        { "slot": "0", "offset": 20, "name": "paused",
          "type": { "encoding": "inplace", "label": "bool", "numberOfBytes": "1" } },
        { "slot": "1", "offset": 0, "name": "balances",
          "type": { "encoding": "mapping", "label": "mapping(address => uint256)", "numberOfBytes": "32",
                    "key": { "encoding": "inplace", "label": "address", "numberOfBytes": "20" },
                    "value": { "encoding": "inplace", "label": "uint256", "numberOfBytes": "32" } } },
        { "slot": "2", "offset": 0, "name": "items",
          "type": { "encoding": "dynamic_array", "label": "uint128[]", "numberOfBytes": "32",
                    "base": { "encoding": "inplace", "label": "uint128", "numberOfBytes": "16" } } }
    ]"#;

    #[test]
    fn test_parse_resolved_layout() {
        let layout = StorageLayout::from_json(RESOLVED).expect("failed to parse layout");
        assert_eq!(layout.len(), 4);

        let paused = layout.get("paused").expect("paused is missing");
        assert_eq!(paused.offset, 20);
        assert_eq!(paused.ty.label(), "bool");

        let balances = layout.get("balances").expect("balances is missing");
        assert!(balances.ty.is_mapping());
        assert_eq!(balances.slot, U256::from(1));

        match &layout.get("items").expect("items is missing").ty {
            StorageType::DynamicArray { base, .. } => assert_eq!(base.number_of_bytes(), 16),
            other => panic!("unexpected type {other:?}"),
        }

        // declaration order is kept
        let names: Vec<_> = layout.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["owner", "paused", "balances", "items"]);
    }

    #[test]
    fn test_parse_compiler_layout_with_struct() {
        let json = r#"{
            "storage": [
                { "astId": 3, "contract": "a.sol:A", "label": "config", "offset": 0, "slot": "5",
                  "type": "t_struct(Config)6_storage" }
            ],
            "types": {
                "t_struct(Config)6_storage": { "encoding": "inplace", "label": "struct A.Config",
                    "numberOfBytes": "64",
                    "members": [
                        { "astId": 1, "contract": "a.sol:A", "label": "fee", "offset": 0, "slot": "0", "type": "t_uint64" },
                        { "astId": 2, "contract": "a.sol:A", "label": "admin", "offset": 0, "slot": "1", "type": "t_address" }
                    ] },
                "t_uint64": { "encoding": "inplace", "label": "uint64", "numberOfBytes": "8" },
                "t_address": { "encoding": "inplace", "label": "address", "numberOfBytes": "20" }
            }
        }"#;

        let layout = StorageLayout::from_json(json).expect("failed to parse layout");
        let config = layout.get("config").expect("config is missing");
        assert_eq!(config.slot, U256::from(5));

        match &config.ty {
            StorageType::Inplace { members, .. } => {
                assert_eq!(members.len(), 2);
                assert_eq!(members[1].name, "admin");
                assert_eq!(members[1].slot, U256::from(1));
                assert_eq!(members[1].ty.label(), "address");
            }
            other => panic!("unexpected type {other:?}"),
        }
    }

    #[test]
    fn test_self_referencing_type_terminates() {
        let json = r#"{
            "storage": [ { "label": "root", "offset": 0, "slot": "0", "type": "t_struct(Node)" } ],
            "types": {
                "t_struct(Node)": { "encoding": "inplace", "label": "struct Node", "numberOfBytes": "64",
                    "members": [
                        { "label": "value", "offset": 0, "slot": "0", "type": "t_uint256" },
                        { "label": "children", "offset": 0, "slot": "1", "type": "t_mapping(t_uint256,t_struct(Node))" }
                    ] },
                "t_mapping(t_uint256,t_struct(Node))": { "encoding": "mapping", "label": "mapping(uint256 => struct Node)",
                    "numberOfBytes": "32", "key": "t_uint256", "value": "t_struct(Node)" },
                "t_uint256": { "encoding": "inplace", "label": "uint256", "numberOfBytes": "32" }
            }
        }"#;

        let layout = StorageLayout::from_json(json).expect("failed to parse layout");
        let StorageType::Inplace { members, .. } = &layout.variables()[0].ty else {
            panic!("root is not a struct");
        };
        let StorageType::Mapping { value, .. } = &members[1].ty else {
            panic!("children is not a mapping");
        };
        assert_eq!(**value, StorageType::Recursive { label: "struct Node".to_string() });
    }

    #[test]
    fn test_contract_map_selection() {
        let json = format!(r#"{{ "Token": {RESOLVED}, "Vault": [] }}"#);

        let layout =
            StorageLayout::from_json_for_contract(&json, Some("Token")).expect("failed to parse");
        assert_eq!(layout.len(), 4);

        let vault =
            StorageLayout::from_json_for_contract(&json, Some("Vault")).expect("failed to parse");
        assert!(vault.is_empty());

        assert!(matches!(
            StorageLayout::from_json(&json),
            Err(Error::MalformedLayout { field, .. }) if field == "contract"
        ));
    }

    fn malformed_field(layout: &StorageLayout, name: &str) -> String {
        match &layout.get(name).expect("variable is missing").ty {
            StorageType::Malformed { field, .. } => field.clone(),
            other => panic!("`{name}` should be malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_fields_are_reported() {
        let missing_slot = r#"[{ "offset": 0, "name": "x",
            "type": { "encoding": "inplace", "label": "uint256", "numberOfBytes": "32" } }]"#;
        let layout = StorageLayout::from_json(missing_slot).expect("failed to parse layout");
        assert_eq!(malformed_field(&layout, "x"), "slot");

        let missing_type = r#"[{ "slot": "3", "offset": 0, "name": "y" }]"#;
        let layout = StorageLayout::from_json(missing_type).expect("failed to parse layout");
        assert_eq!(malformed_field(&layout, "y"), "type");
        assert_eq!(layout.variables()[0].slot, U256::from(3));

        let missing_name = r#"[{ "slot": "0", "offset": 0,
            "type": { "encoding": "inplace", "label": "uint256", "numberOfBytes": "32" } }]"#;
        assert!(matches!(
            StorageLayout::from_json(missing_name),
            Err(Error::MalformedLayout { field, .. }) if field == "name"
        ));
    }

    #[test]
    fn test_invalid_slot_and_offset() {
        let negative = r#"[{ "slot": "-1", "offset": 0, "name": "x",
            "type": { "encoding": "inplace", "label": "uint256", "numberOfBytes": "32" } }]"#;
        let layout = StorageLayout::from_json(negative).expect("failed to parse layout");
        assert_eq!(malformed_field(&layout, "x"), "slot");

        let offset = r#"[{ "slot": "0", "offset": 32, "name": "x",
            "type": { "encoding": "inplace", "label": "uint8", "numberOfBytes": "1" } }]"#;
        let layout = StorageLayout::from_json(offset).expect("failed to parse layout");
        assert_eq!(malformed_field(&layout, "x"), "offset");
    }

    #[test]
    fn test_bad_variable_keeps_its_siblings() {
        let json = r#"[
            { "slot": "0", "offset": 0, "name": "good",
              "type": { "encoding": "inplace", "label": "uint8", "numberOfBytes": "1" } },
            { "slot": "1", "offset": 32, "name": "bad",
              "type": { "encoding": "inplace", "label": "uint8", "numberOfBytes": "1" } }
        ]"#;

        let layout = StorageLayout::from_json(json).expect("failed to parse layout");
        assert_eq!(layout.len(), 2);
        assert_eq!(layout.get("good").expect("good is missing").ty.label(), "uint8");
        assert_eq!(malformed_field(&layout, "bad"), "offset");
        assert_eq!(layout.get("bad").expect("bad is missing").slot, U256::from(1));
    }

    #[test]
    fn test_non_layout_documents_are_rejected() {
        assert!(StorageLayout::from_json(r#""not a layout""#).is_err());
        assert!(StorageLayout::from_json(r#"{ "storage": 4 }"#).is_err());
        assert!(StorageLayout::from_json(r#"[ 1 ]"#).is_err());
    }

    #[test]
    fn test_large_and_hex_slots() {
        let json = r#"[{ "slot": "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc",
            "offset": 0, "name": "implementation",
            "type": { "encoding": "inplace", "label": "address", "numberOfBytes": 20 } }]"#;

        let layout = StorageLayout::from_json(json).expect("failed to parse layout");
        assert!(layout.variables()[0].slot > U256::from(u64::MAX));
        assert_eq!(layout.variables()[0].ty.number_of_bytes(), 20);
    }

    #[test]
    fn test_unknown_encoding_is_kept_for_decode_time() {
        let json = r#"[{ "slot": "0", "offset": 0, "name": "x",
            "type": { "encoding": "transient", "label": "uint256", "numberOfBytes": "32" } }]"#;

        let layout = StorageLayout::from_json(json).expect("failed to parse layout");
        assert_eq!(layout.variables()[0].ty.encoding(), "transient");
    }
}

use hashbrown::HashMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    core::{accessor::SlotAccessor, decoder::decode},
    error::Error,
    interfaces::{
        layout::{StorageLayout, StorageVariable},
        value::DecodedValue,
    },
};

/// What [`capture`] does when a variable cannot be decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop and return the error
    #[default]
    Abort,
    /// Record [`DecodedValue::Unreadable`] for the variable and continue with the next one
    Placeholder,
}

/// One decoded variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// The variable as declared in the layout
    pub variable: StorageVariable,
    /// Its decoded value
    pub value: DecodedValue,
}

/// The decoded state of a contract: variable name to decoded value, in layout order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<SnapshotEntry>,
    index: HashMap<String, usize>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, replacing any entry of the same name in place.
    pub fn insert(&mut self, variable: StorageVariable, value: DecodedValue) {
        match self.index.get(&variable.name) {
            Some(&i) => self.entries[i] = SnapshotEntry { variable, value },
            None => {
                self.index.insert(variable.name.clone(), self.entries.len());
                self.entries.push(SnapshotEntry { variable, value });
            }
        }
    }

    /// Returns the entry named `name`.
    pub fn get(&self, name: &str) -> Option<&SnapshotEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Returns the decoded value of `name`.
    pub fn value(&self, name: &str) -> Option<&DecodedValue> {
        self.get(name).map(|entry| &entry.value)
    }

    /// The entries, in insertion (layout) order.
    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    /// Iterates over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries.iter()
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The JSON form of the snapshot, an object of `name: value`. Mappings are left out since
    /// they carry no value.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .filter(|entry| !entry.value.is_mapping())
                .map(|entry| (entry.variable.name.clone(), entry.value.to_json()))
                .collect::<Map<String, Value>>(),
        )
    }
}

/// Decodes every variable of `layout` in declaration order.
///
/// A variable that fails to decode never affects its siblings: under [`FailurePolicy::Abort`]
/// the first error is returned, under [`FailurePolicy::Placeholder`] it is recorded as
/// [`DecodedValue::Unreadable`]. Fetch failures are always returned.
pub async fn capture(
    layout: &StorageLayout,
    accessor: &mut SlotAccessor,
    policy: FailurePolicy,
) -> Result<Snapshot, Error> {
    let mut snapshot = Snapshot::new();

    for variable in layout.iter() {
        let value = match decode(variable, accessor).await {
            Ok(value) => value,
            // a failed read says nothing about the variable, so it is never a placeholder
            Err(e @ Error::FetchFailure(_)) => return Err(e),
            Err(e) if policy == FailurePolicy::Placeholder => {
                warn!("failed to decode `{}`: {}", variable.name, e);
                DecodedValue::Unreadable(e.to_string())
            }
            Err(e) => return Err(e),
        };
        snapshot.insert(variable.clone(), value);
    }

    debug!(
        "captured {} variables ({} slots cached)",
        snapshot.len(),
        accessor.cached_len()
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;
    use serde_json::json;

    use super::*;
    use crate::{core::accessor::tests::RecordingFetcher, interfaces::layout::StorageType};

    fn leaf(label: &str, size: u64) -> StorageType {
        StorageType::Inplace {
            label: label.to_string(),
            number_of_bytes: size,
            members: Vec::new(),
            base: None,
        }
    }

    fn layout() -> StorageLayout {
        StorageLayout::new(vec![
            StorageVariable::new("supply", U256::ZERO, 0, leaf("uint256", 32)),
            StorageVariable::new("ratio", U256::from(1), 0, leaf("fixed128x18", 16)),
            StorageVariable::new("paused", U256::from(2), 0, leaf("bool", 1)),
        ])
    }

    #[tokio::test]
    async fn test_placeholder_keeps_siblings() {
        let fetcher = RecordingFetcher::new()
            .with_slot(U256::ZERO, U256::from(5))
            .with_slot(U256::from(2), U256::from(1));
        let mut accessor = SlotAccessor::new(fetcher);

        let snapshot = capture(&layout(), &mut accessor, FailurePolicy::Placeholder)
            .await
            .expect("capture failed");

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.value("supply"), Some(&DecodedValue::uint(5)));
        assert!(matches!(snapshot.value("ratio"), Some(DecodedValue::Unreadable(_))));
        assert_eq!(
            snapshot.to_json(),
            json!({
                "supply": "5",
                "ratio": { "error": "unsupported type: fixed128x18" },
                "paused": true,
            })
        );
    }

    #[tokio::test]
    async fn test_abort_returns_first_error() {
        let mut accessor = SlotAccessor::new(RecordingFetcher::new());
        assert!(matches!(
            capture(&layout(), &mut accessor, FailurePolicy::Abort).await,
            Err(Error::UnsupportedType(label)) if label == "fixed128x18"
        ));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_never_a_placeholder() {
        let mut accessor = SlotAccessor::new(RecordingFetcher::failing());
        assert!(matches!(
            capture(&layout(), &mut accessor, FailurePolicy::Placeholder).await,
            Err(Error::FetchFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_variable_follows_policy() {
        let layout = StorageLayout::from_json(
            r#"[
                { "slot": "0", "offset": 0, "name": "good",
                  "type": { "encoding": "inplace", "label": "uint8", "numberOfBytes": "1" } },
                { "slot": "1", "offset": 32, "name": "bad",
                  "type": { "encoding": "inplace", "label": "uint8", "numberOfBytes": "1" } }
            ]"#,
        )
        .expect("failed to parse layout");
        let fetcher = RecordingFetcher::new().with_slot(U256::ZERO, U256::from(7));
        let log = fetcher.log();
        let mut accessor = SlotAccessor::new(fetcher);

        let snapshot = capture(&layout, &mut accessor, FailurePolicy::Placeholder)
            .await
            .expect("capture failed");
        assert_eq!(snapshot.value("good"), Some(&DecodedValue::uint(7)));
        assert!(matches!(snapshot.value("bad"), Some(DecodedValue::Unreadable(reason)) if reason.contains("offset")));
        // the malformed variable is rejected before any read
        assert_eq!(*log.lock().expect("poisoned"), vec![U256::ZERO]);

        assert!(matches!(
            capture(&layout, &mut accessor, FailurePolicy::Abort).await,
            Err(Error::MalformedLayout { variable, field, .. }) if variable == "bad" && field == "offset"
        ));
    }

    #[test]
    fn test_insert_replaces_by_name() {
        let mut snapshot = Snapshot::new();
        let a = StorageVariable::new("a", U256::ZERO, 0, leaf("uint256", 32));
        let b = StorageVariable::new("b", U256::from(1), 0, leaf("uint256", 32));

        snapshot.insert(a.clone(), DecodedValue::uint(1));
        snapshot.insert(b, DecodedValue::uint(2));
        snapshot.insert(a, DecodedValue::uint(3));

        let names: Vec<_> = snapshot.iter().map(|e| e.variable.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(snapshot.value("a"), Some(&DecodedValue::uint(3)));
    }
}

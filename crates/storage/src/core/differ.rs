use std::fmt;

use serde_json::{json, Value};
use tracing::trace;

use crate::{core::snapshot::Snapshot, interfaces::value::DecodedValue};

/// A difference between two snapshots, at a variable, element (`name[i]`) or member
/// (`name.member`) path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change {
    /// Present only after
    Added {
        /// The path of the value
        name: String,
        /// The new value
        value: DecodedValue,
    },
    /// Present on both sides with different values
    Changed {
        /// The path of the value
        name: String,
        /// The old value
        before: DecodedValue,
        /// The new value
        after: DecodedValue,
    },
    /// Present only before
    Deleted {
        /// The path of the value
        name: String,
        /// The old value
        value: DecodedValue,
    },
}

impl Change {
    /// The path of the changed value.
    pub fn name(&self) -> &str {
        match self {
            Change::Added { name, .. } |
            Change::Changed { name, .. } |
            Change::Deleted { name, .. } => name,
        }
    }

    /// The JSON form of the change, tagged by `kind`.
    pub fn to_json(&self) -> Value {
        match self {
            Change::Added { name, value } => {
                json!({ "kind": "added", "name": name, "value": value.to_json() })
            }
            Change::Changed { name, before, after } => json!({
                "kind": "changed",
                "name": name,
                "before": before.to_json(),
                "after": after.to_json(),
            }),
            Change::Deleted { name, value } => {
                json!({ "kind": "deleted", "name": name, "value": value.to_json() })
            }
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Added { name, value } => write!(f, "[added] {name}: {value}"),
            Change::Changed { name, before, after } => {
                write!(f, "[changed] {name}: {before} ==> {after}")
            }
            Change::Deleted { name, value } => write!(f, "[deleted] {name}: {value}"),
        }
    }
}

/// Compares two snapshots of the same layout.
///
/// Changes are ordered by the `before` snapshot's variable order, then by element index, followed
/// by variables only present `after`. Mappings are never compared. Comparing a snapshot with
/// itself yields no changes.
pub fn compare(before: &Snapshot, after: &Snapshot) -> Vec<Change> {
    let mut changes = Vec::new();

    for entry in before.iter() {
        let name = &entry.variable.name;
        match after.value(name) {
            Some(value) => compare_values(name, &entry.value, value, &mut changes),
            None => deleted(name, &entry.value, &mut changes),
        }
    }

    for entry in after.iter().filter(|entry| before.get(&entry.variable.name).is_none()) {
        added(&entry.variable.name, &entry.value, &mut changes);
    }

    trace!("compared {} and {} variables: {} changes", before.len(), after.len(), changes.len());
    changes
}

fn compare_values(
    name: &str,
    before: &DecodedValue,
    after: &DecodedValue,
    changes: &mut Vec<Change>,
) {
    match (before, after) {
        (DecodedValue::OpaqueMapping, _) | (_, DecodedValue::OpaqueMapping) => {}
        (DecodedValue::Sequence(before), DecodedValue::Sequence(after)) => {
            for i in 0..before.len().max(after.len()) {
                let path = format!("{name}[{i}]");
                match (before.get(i), after.get(i)) {
                    (Some(b), Some(a)) => compare_values(&path, b, a, changes),
                    (Some(b), None) => deleted(&path, b, changes),
                    (None, Some(a)) => added(&path, a, changes),
                    (None, None) => {}
                }
            }
        }
        (DecodedValue::Struct(before), DecodedValue::Struct(after)) => {
            for (member, b) in before {
                let path = format!("{name}.{member}");
                match after.iter().find(|(m, _)| m == member) {
                    Some((_, a)) => compare_values(&path, b, a, changes),
                    None => deleted(&path, b, changes),
                }
            }
            for (member, a) in after {
                if !before.iter().any(|(m, _)| m == member) {
                    added(&format!("{name}.{member}"), a, changes);
                }
            }
        }
        (before, after) if before != after => changes.push(Change::Changed {
            name: name.to_string(),
            before: before.clone(),
            after: after.clone(),
        }),
        _ => {}
    }
}

fn added(name: &str, value: &DecodedValue, changes: &mut Vec<Change>) {
    match value {
        DecodedValue::OpaqueMapping => {}
        DecodedValue::Sequence(values) => {
            for (i, value) in values.iter().enumerate() {
                added(&format!("{name}[{i}]"), value, changes);
            }
        }
        DecodedValue::Struct(members) => {
            for (member, value) in members {
                added(&format!("{name}.{member}"), value, changes);
            }
        }
        value => changes.push(Change::Added { name: name.to_string(), value: value.clone() }),
    }
}

fn deleted(name: &str, value: &DecodedValue, changes: &mut Vec<Change>) {
    match value {
        DecodedValue::OpaqueMapping => {}
        DecodedValue::Sequence(values) => {
            for (i, value) in values.iter().enumerate() {
                deleted(&format!("{name}[{i}]"), value, changes);
            }
        }
        DecodedValue::Struct(members) => {
            for (member, value) in members {
                deleted(&format!("{name}.{member}"), value, changes);
            }
        }
        value => changes.push(Change::Deleted { name: name.to_string(), value: value.clone() }),
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;

    use super::*;
    use crate::{
        core::{accessor::tests::RecordingFetcher, accessor::SlotAccessor, snapshot::capture},
        interfaces::{
            layout::{StorageLayout, StorageType, StorageVariable},
            value::Scalar,
        },
        FailurePolicy,
    };

    fn leaf(label: &str, size: u64) -> StorageType {
        StorageType::Inplace {
            label: label.to_string(),
            number_of_bytes: size,
            members: Vec::new(),
            base: None,
        }
    }

    fn snapshot(values: Vec<(&str, DecodedValue)>) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for (i, (name, value)) in values.into_iter().enumerate() {
            snapshot.insert(
                StorageVariable::new(name, U256::from(i), 0, leaf("uint256", 32)),
                value,
            );
        }
        snapshot
    }

    #[tokio::test]
    async fn test_changed_scalar() {
        let layout = StorageLayout::from_json(
            r#"[{ "slot": "0", "offset": 0, "name": "balance",
                  "type": { "encoding": "inplace", "label": "uint256", "numberOfBytes": "32" } }]"#,
        )
        .expect("valid layout");

        let mut before = SlotAccessor::new(RecordingFetcher::new().with_slot(U256::ZERO, U256::from(1)));
        let mut after = SlotAccessor::new(RecordingFetcher::new().with_slot(U256::ZERO, U256::from(5)));

        let before = capture(&layout, &mut before, FailurePolicy::Abort).await.expect("capture failed");
        let after = capture(&layout, &mut after, FailurePolicy::Abort).await.expect("capture failed");

        let changes = compare(&before, &after);
        assert_eq!(
            changes,
            vec![Change::Changed {
                name: "balance".to_string(),
                before: DecodedValue::uint(1),
                after: DecodedValue::uint(5),
            }]
        );
        assert_eq!(changes[0].to_string(), "[changed] balance: 1 ==> 5");
        assert_eq!(changes[0].to_json()["before"], "1");
    }

    #[test]
    fn test_compare_with_self_is_empty() {
        let s = snapshot(vec![
            ("a", DecodedValue::uint(1)),
            ("b", DecodedValue::Sequence(vec![DecodedValue::uint(2), DecodedValue::uint(3)])),
            ("c", DecodedValue::OpaqueMapping),
            (
                "d",
                DecodedValue::Struct(vec![("x".to_string(), Scalar::Bool(false).into())]),
            ),
        ]);
        assert!(compare(&s, &s).is_empty());
    }

    #[test]
    fn test_sequence_changes_by_index() {
        let before = snapshot(vec![(
            "xs",
            DecodedValue::Sequence(vec![DecodedValue::uint(1), DecodedValue::uint(2), DecodedValue::uint(3)]),
        )]);
        let after = snapshot(vec![(
            "xs",
            DecodedValue::Sequence(vec![DecodedValue::uint(1), DecodedValue::uint(9)]),
        )]);

        assert_eq!(
            compare(&before, &after),
            vec![
                Change::Changed {
                    name: "xs[1]".to_string(),
                    before: DecodedValue::uint(2),
                    after: DecodedValue::uint(9),
                },
                Change::Deleted { name: "xs[2]".to_string(), value: DecodedValue::uint(3) },
            ]
        );

        assert_eq!(
            compare(&after, &before),
            vec![
                Change::Changed {
                    name: "xs[1]".to_string(),
                    before: DecodedValue::uint(9),
                    after: DecodedValue::uint(2),
                },
                Change::Added { name: "xs[2]".to_string(), value: DecodedValue::uint(3) },
            ]
        );
    }

    #[test]
    fn test_missing_variables_and_mappings() {
        let before = snapshot(vec![
            ("gone", DecodedValue::uint(7)),
            ("m", DecodedValue::OpaqueMapping),
        ]);
        let after = snapshot(vec![
            ("m", DecodedValue::OpaqueMapping),
            ("fresh", DecodedValue::Sequence(vec![DecodedValue::uint(4)])),
            ("empty", DecodedValue::Sequence(Vec::new())),
            ("m2", DecodedValue::OpaqueMapping),
        ]);

        assert_eq!(
            compare(&before, &after),
            vec![
                Change::Deleted { name: "gone".to_string(), value: DecodedValue::uint(7) },
                Change::Added { name: "fresh[0]".to_string(), value: DecodedValue::uint(4) },
            ]
        );
    }

    #[test]
    fn test_mappings_are_never_compared() {
        let scalar = snapshot(vec![("x", DecodedValue::uint(1))]);
        let mapping = snapshot(vec![("x", DecodedValue::OpaqueMapping)]);

        assert!(compare(&scalar, &mapping).is_empty());
        assert!(compare(&mapping, &scalar).is_empty());
    }

    #[test]
    fn test_struct_members() {
        let before = snapshot(vec![(
            "config",
            DecodedValue::Struct(vec![
                ("fee".to_string(), DecodedValue::uint(30)),
                ("live".to_string(), Scalar::Bool(true).into()),
            ]),
        )]);
        let after = snapshot(vec![(
            "config",
            DecodedValue::Struct(vec![
                ("fee".to_string(), DecodedValue::uint(50)),
                ("live".to_string(), Scalar::Bool(true).into()),
            ]),
        )]);

        assert_eq!(
            compare(&before, &after),
            vec![Change::Changed {
                name: "config.fee".to_string(),
                before: DecodedValue::uint(30),
                after: DecodedValue::uint(50),
            }]
        );
    }
}

pub(crate) mod source;

use std::time::Instant;

use colored::Colorize;
use eyre::eyre;
use serde_json::Value;
use slotlens_storage::{capture, decode_mapping_path, DecodedValue, FailurePolicy, Snapshot};
use tracing::{debug, info, warn};

use crate::{
    core::source::{open_accessor, StorageSource},
    error::Error,
    interfaces::ReadArgs,
};

/// The value of one mapping entry requested with `--key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    /// The entry path, e.g. `allowances[0x…][0x…]`
    pub path: String,
    /// The decoded entry
    pub value: DecodedValue,
}

#[derive(Debug, Clone)]
/// Result of a successful read operation
pub struct ReadResult {
    /// Every variable of the layout, decoded
    pub snapshot: Snapshot,
    /// The requested mapping entries, in request order
    pub lookups: Vec<Lookup>,
}

impl ReadResult {
    /// Prints the storage table to stdout.
    pub fn display(&self) {
        println!("{}", self.table());
    }

    /// Renders the decoded storage as a two-column table. Arrays are abbreviated to their first
    /// element.
    pub fn table(&self) -> String {
        let rows: Vec<(String, String)> = self
            .snapshot
            .iter()
            .map(|entry| (entry.variable.name.clone(), summarize(&entry.value)))
            .chain(self.lookups.iter().map(|lookup| (lookup.path.clone(), summarize(&lookup.value))))
            .collect();

        let name_width =
            rows.iter().map(|(name, _)| name.len()).chain(["Storage variable".len()]).max().unwrap_or(0);
        let value_width =
            rows.iter().map(|(_, value)| value.len()).chain(["Value".len()]).max().unwrap_or(0);
        let separator = format!("+{}+{}+", "-".repeat(name_width + 2), "-".repeat(value_width + 2));

        let mut lines = vec![
            separator.clone(),
            format!(
                "| {} | {} |",
                format!("{:name_width$}", "Storage variable").bold(),
                format!("{:value_width$}", "Value").bold()
            ),
            separator.clone(),
        ];
        lines.extend(rows.iter().map(|(name, value)| {
            format!("| {} | {:value_width$} |", format!("{name:name_width$}").bold(), value)
        }));
        lines.push(separator);
        lines.join("\n")
    }

    /// The structured output: every non-mapping variable, then every looked up entry, by name.
    pub fn to_json(&self) -> Value {
        let mut json = self.snapshot.to_json();
        if let Value::Object(map) = &mut json {
            for lookup in &self.lookups {
                map.insert(lookup.path.clone(), lookup.value.to_json());
            }
        }
        json
    }
}

/// Abbreviates a value for the storage table.
fn summarize(value: &DecodedValue) -> String {
    match value {
        DecodedValue::Sequence(values) => match values.as_slice() {
            [] => "<empty array>".to_string(),
            [first] => format!("[ {first} ]"),
            [first, rest @ ..] => format!("[ {first} and {} more ]", rest.len()),
        },
        other => other.to_string(),
    }
}

/// Decodes the storage of a contract
///
/// Every variable of the layout is decoded in declaration order, followed by the mapping entries
/// requested with `--key`. Variables and lookups that fail to decode are marked unreadable unless
/// `--strict` is set.
///
/// # Arguments
///
/// * `args` - Configuration parameters for the read operation
///
/// # Returns
///
/// A ReadResult holding the decoded snapshot and lookups
pub async fn read(args: ReadArgs) -> Result<ReadResult, Error> {
    let start_time = Instant::now();

    let layout = args.get_layout()?;
    let requested = args.get_lookups()?;
    debug!("layout holds {} variables", layout.len());

    let mut accessor = open_accessor(StorageSource {
        target: &args.target,
        rpc_url: &args.rpc_url,
        block: args.block,
        dump: args.dump.as_deref(),
        offline: args.offline,
    })
    .await?;

    let policy = if args.strict { FailurePolicy::Abort } else { FailurePolicy::Placeholder };
    let snapshot = capture(&layout, &mut accessor, policy).await?;

    let mut lookups = Vec::with_capacity(requested.len());
    for (name, keys) in requested {
        let variable =
            layout.get(&name).ok_or_else(|| eyre!("variable `{name}` is not in the layout"))?;
        let path = format!("{name}[{}]", keys.join("]["));
        let value = match decode_mapping_path(variable, keys.as_slice(), &mut accessor).await {
            Ok(value) => value,
            Err(e @ slotlens_storage::Error::FetchFailure(_)) => return Err(e.into()),
            Err(e) if policy == FailurePolicy::Placeholder => {
                warn!("failed to look up `{}`: {}", path, e);
                DecodedValue::Unreadable(e.to_string())
            }
            Err(e) => return Err(e.into()),
        };
        lookups.push(Lookup { path, value });
    }

    info!(
        "decoded {} variables and {} mapping entries from {} slots",
        snapshot.len(),
        lookups.len(),
        accessor.cached_len()
    );
    debug!("read took {:?}", start_time.elapsed());

    Ok(ReadResult { snapshot, lookups })
}

use std::time::Instant;

use colored::Colorize;
use serde_json::{json, Value};
use slotlens_read::open_accessor;
use slotlens_storage::{capture, compare, Change, FailurePolicy, Snapshot};
use tracing::{debug, info, warn};

use crate::{error::Error, interfaces::DiffArgs};

#[derive(Debug, Clone)]
/// Result of a successful diff operation
pub struct DiffResult {
    /// The storage before
    pub before: Snapshot,
    /// The storage after
    pub after: Snapshot,
    /// What changed, in layout order
    pub changes: Vec<Change>,
}

impl DiffResult {
    /// Prints one line per change to stdout.
    pub fn display(&self) {
        if self.changes.is_empty() {
            println!("no storage changes");
            return;
        }

        for change in &self.changes {
            let line = change.to_string();
            match change {
                Change::Added { .. } => println!("{}", line.green()),
                Change::Changed { .. } => println!("{}", line.yellow()),
                Change::Deleted { .. } => println!("{}", line.red()),
            }
        }
    }

    /// The structured output: both snapshots and the change list.
    pub fn to_json(&self) -> Value {
        json!({
            "before": self.before.to_json(),
            "after": self.after.to_json(),
            "changes": self.changes.iter().map(Change::to_json).collect::<Vec<_>>(),
        })
    }
}

/// Compares the storage of a contract at two points
///
/// Both snapshots are decoded with the same layout, then reduced to a change list. When both
/// sides read live state at the same block, they share one accessor so every slot is fetched
/// once.
///
/// # Arguments
///
/// * `args` - Configuration parameters for the diff operation
///
/// # Returns
///
/// A DiffResult holding both snapshots and their differences
pub async fn diff(args: DiffArgs) -> Result<DiffResult, Error> {
    let start_time = Instant::now();
    let layout = args.get_layout()?;

    let mut before_accessor = open_accessor(args.before()).await?;
    let before = capture(&layout, &mut before_accessor, FailurePolicy::Placeholder).await?;
    debug!("captured `before` from {} slots", before_accessor.cached_len());

    let after = if args.same_live_state() {
        warn!("both sides read the same block, no changes are expected");
        capture(&layout, &mut before_accessor, FailurePolicy::Placeholder).await?
    } else {
        let mut after_accessor = open_accessor(args.after()).await?;
        let after = capture(&layout, &mut after_accessor, FailurePolicy::Placeholder).await?;
        debug!("captured `after` from {} slots", after_accessor.cached_len());
        after
    };

    let changes = compare(&before, &after);
    info!("found {} storage changes", changes.len());
    debug!("diff took {:?}", start_time.elapsed());

    Ok(DiffResult { before, after, changes })
}

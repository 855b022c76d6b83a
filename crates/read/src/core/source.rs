use eyre::eyre;
use slotlens_common::{ether::rpc::RpcSlotFetcher, utils::io::file::read_bytes};
use slotlens_storage::SlotAccessor;
use tracing::{debug, info};

use crate::{error::Error, interfaces::parse_target};

/// Where the slots of one snapshot come from.
#[derive(Debug, Clone, Copy)]
pub struct StorageSource<'a> {
    /// The contract address
    pub target: &'a str,
    /// The RPC endpoint, empty when none is configured
    pub rpc_url: &'a str,
    /// The block to read at, `None` meaning latest
    pub block: Option<u64>,
    /// A dump file to read before querying the node
    pub dump: Option<&'a str>,
    /// Never query the node
    pub offline: bool,
}

/// Builds the accessor for `source`.
///
/// - dump, offline: the dump only; uncovered slots read as zero
/// - dump, online: the dump, then the node for uncovered slots
/// - no dump: the node only
///
/// Offline reads without a dump, and online reads without an RPC URL, are errors.
pub async fn open_accessor(source: StorageSource<'_>) -> Result<SlotAccessor, Error> {
    let target = parse_target(source.target)?;

    let buffer = match source.dump {
        Some(path) => {
            let bytes = read_bytes(path).map_err(|e| eyre!("failed to read dump '{path}': {e}"))?;
            debug!("loaded {} bytes ({} slots) from dump '{}'", bytes.len(), bytes.len() / 32, path);
            Some(bytes)
        }
        None => None,
    };

    match (buffer, source.offline) {
        (Some(buffer), true) => {
            info!("processing dump file offline, uncovered slots read as zero");
            Ok(SlotAccessor::offline().with_buffer(buffer))
        }
        (None, true) => Err(Error::Eyre(eyre!("offline mode requires a dump file, see `--dump`"))),
        (buffer, false) => {
            if source.rpc_url.is_empty() {
                return Err(Error::Eyre(eyre!(
                    "an RPC URL is required to read live storage. use `--rpc-url`, `slotlens config rpc_url <URL>`, or `--offline` with `--dump`"
                )));
            }

            let fetcher = RpcSlotFetcher::connect(source.rpc_url, target, source.block).await?;
            let accessor = SlotAccessor::new(fetcher);
            Ok(match buffer {
                Some(buffer) => {
                    info!("processing dump file, fetching missing slots from the node");
                    accessor.with_buffer(buffer)
                }
                None => {
                    info!("reading live storage of {} at {}", target, block_label(source.block));
                    accessor
                }
            })
        }
    }
}

pub(crate) fn block_label(block: Option<u64>) -> String {
    block.map_or_else(|| "latest block".to_string(), |b| format!("block {b}"))
}

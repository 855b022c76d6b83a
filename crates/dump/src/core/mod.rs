use std::time::Instant;

use alloy::primitives::U256;
use eyre::eyre;
use slotlens_common::{
    constants::SLOT_SIZE,
    ether::rpc::RpcSlotFetcher,
    utils::{hex::ToLowerHex, strings::printable_ascii},
};
use slotlens_storage::{RawSlot, SlotAccessor};
use tracing::{debug, info};

use crate::{
    error::Error,
    interfaces::{DumpArgs, SlotRange},
};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of a successful dump operation
pub struct DumpResult {
    /// The index of the first dumped slot
    pub start: U256,
    /// The dumped slots, in index order
    pub slots: Vec<RawSlot>,
}

impl DumpResult {
    /// The flat dump buffer: slot `start + i` at bytes `32 * i .. 32 * (i + 1)`.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.slots.iter().flat_map(|slot| slot.as_bytes().iter().copied()).collect()
    }

    /// Renders the dump buffer 16 bytes per row, with buffer offsets and an ASCII column.
    pub fn hexdump(&self) -> String {
        let mut lines = vec![
            format!("           {}", (0..16).map(|i| format!("{i:02X}")).collect::<Vec<_>>().join(" ")),
            format!("         + {} +", "-".repeat(47)),
        ];

        let bytes = self.to_bytes();
        for (row, chunk) in bytes.chunks(16).enumerate() {
            lines.push(format!(
                "{:08x} | {} | {}",
                row * 16,
                chunk.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" "),
                printable_ascii(chunk)
            ));
        }

        lines.join("\n")
    }

    /// Prints the hexdump to stdout.
    pub fn display(&self) {
        println!("{}", self.hexdump());
    }
}

/// Reads the slots selected by `range` through `accessor`, one at a time in index order.
pub async fn dump_slots(accessor: &mut SlotAccessor, range: SlotRange) -> Result<DumpResult, Error> {
    let mut slots = Vec::new();

    let start = match range {
        SlotRange::Single(slot) => {
            slots.push(accessor.get(slot).await?);
            slot
        }
        SlotRange::Count { start, count } => {
            for i in 0..count {
                slots.push(accessor.get(start.wrapping_add(U256::from(i))).await?);
            }
            start
        }
        SlotRange::UntilEmpty { start } => {
            let mut index = start;
            loop {
                let slot = accessor.get(index).await?;
                if slot.is_empty() {
                    debug!("slot {} is empty, ending scan", index.to_lower_hex());
                    break;
                }
                slots.push(slot);
                index = index.wrapping_add(U256::from(1));
            }
            start
        }
    };

    Ok(DumpResult { start, slots })
}

/// Dumps raw storage slots of a contract
///
/// This function reads a single slot, a fixed number of slots, or every slot up to the first
/// empty one from a live node.
///
/// # Arguments
///
/// * `args` - Configuration parameters for the dump operation
///
/// # Returns
///
/// A DumpResult holding the dumped slots
pub async fn dump(args: DumpArgs) -> Result<DumpResult, Error> {
    let start_time = Instant::now();
    let target = args.get_target()?;
    let range = args.get_range()?;

    if args.rpc_url.is_empty() {
        return Err(Error::Eyre(eyre!(
            "an RPC URL is required to dump storage. use `--rpc-url` or `slotlens config rpc_url <URL>`"
        )));
    }

    let fetcher = RpcSlotFetcher::connect(&args.rpc_url, target, args.block).await?;
    let mut accessor = SlotAccessor::new(fetcher);
    let result = dump_slots(&mut accessor, range).await?;

    info!(
        "dumped {} slots ({} bytes) starting at slot {}",
        result.slots.len(),
        result.slots.len() * SLOT_SIZE,
        result.start
    );
    debug!("storage dump took {:?}", start_time.elapsed());
    Ok(result)
}

use alloy::primitives::{Address, U256};
use clap::Parser;
use derive_builder::Builder;
use eyre::{eyre, Result};
use slotlens_common::constants::ADDRESS_REGEX;
use slotlens_config::parse_url_arg;

#[derive(Debug, Clone, Parser, Builder)]
#[clap(
    about = "Dump contiguous raw storage slots of a contract",
    override_usage = "slotlens dump <TARGET> [OPTIONS]"
)]
/// Arguments for the dump operation
///
/// This struct contains all the configuration parameters needed to read a run of raw storage
/// slots from a contract into a dump file.
pub struct DumpArgs {
    /// The address of the contract to dump the storage slots of.
    #[clap(required = true)]
    pub target: String,

    /// The RPC URL to use for fetching data.
    /// This can be an explicit URL or a reference to a MESC endpoint.
    #[clap(long, short, value_parser = parse_url_arg, default_value = "", hide_default_value = true)]
    pub rpc_url: String,

    /// The block to read storage at. Defaults to the latest block.
    #[clap(long, short)]
    pub block: Option<u64>,

    /// Dump only this slot (decimal or 0x-prefixed hex).
    #[clap(long)]
    pub slot: Option<String>,

    /// The first slot of the scan.
    #[clap(long, default_value = "0", hide_default_value = true)]
    pub start: u64,

    /// The number of slots to scan. Without it, the scan ends at the first empty slot.
    #[clap(long)]
    pub count: Option<u64>,

    /// The output directory to write the output to or 'print' to print to the console
    #[clap(long = "output", short = 'o', default_value = "output", hide_default_value = true)]
    pub output: String,

    /// The name for the output file
    #[clap(long, short, default_value = "", hide_default_value = true)]
    pub name: String,
}

/// Which slots a dump reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRange {
    /// One slot
    Single(U256),
    /// `count` slots from `start`
    Count {
        /// The first slot
        start: U256,
        /// The number of slots
        count: u64,
    },
    /// Slots from `start` up to, not including, the first empty one
    UntilEmpty {
        /// The first slot
        start: U256,
    },
}

impl DumpArgs {
    /// Parses the target contract address.
    pub fn get_target(&self) -> Result<Address> {
        if !ADDRESS_REGEX.is_match(&self.target).unwrap_or(false) {
            return Err(eyre!("invalid contract address: '{}'", self.target));
        }
        let target = self.target.strip_prefix("0x").unwrap_or(&self.target);
        target.parse::<Address>().map_err(|e| eyre!("invalid contract address: {e}"))
    }

    /// The slots selected by `--slot`, `--start` and `--count`.
    pub fn get_range(&self) -> Result<SlotRange> {
        if let Some(slot) = &self.slot {
            let slot =
                slot.trim().parse::<U256>().map_err(|e| eyre!("invalid slot '{slot}': {e}"))?;
            return Ok(SlotRange::Single(slot));
        }

        let start = U256::from(self.start);
        match self.count {
            Some(0) => Err(eyre!("invalid count: 0")),
            Some(count) => Ok(SlotRange::Count { start, count }),
            None => Ok(SlotRange::UntilEmpty { start }),
        }
    }
}

impl DumpArgsBuilder {
    /// Creates a new DumpArgsBuilder with default values
    pub fn new() -> Self {
        Self {
            target: Some(String::new()),
            rpc_url: Some(String::new()),
            block: Some(None),
            slot: Some(None),
            start: Some(0),
            count: Some(None),
            output: Some(String::new()),
            name: Some(String::new()),
        }
    }
}

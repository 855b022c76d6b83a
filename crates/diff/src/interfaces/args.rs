use clap::Parser;
use derive_builder::Builder;
use eyre::{eyre, Result};
use slotlens_common::utils::io::file::read_input;
use slotlens_config::parse_url_arg;
use slotlens_read::StorageSource;
use slotlens_storage::StorageLayout;

#[derive(Debug, Clone, Parser, Builder)]
#[clap(
    about = "Compare the decoded storage of a contract between two blocks or dump files",
    override_usage = "slotlens diff <TARGET> <LAYOUT> [OPTIONS]"
)]
/// Arguments for the diff operation
///
/// Each side of the comparison is read from its dump file when one is given, and from the node
/// at its block otherwise.
pub struct DiffArgs {
    /// The address of the contract whose storage is compared.
    #[clap(required = true)]
    pub target: String,

    /// Path to the storage layout JSON, as emitted by the compiler's `storageLayout` output.
    #[clap(required = true)]
    pub layout: String,

    /// The contract to pick when the layout file holds layouts for several contracts.
    #[clap(long, short)]
    pub contract: Option<String>,

    /// The block to read the `before` side at. Defaults to the latest block.
    #[clap(long, short, alias = "start_block")]
    pub from_block: Option<u64>,

    /// The block to read the `after` side at. Defaults to the latest block.
    #[clap(long, short, alias = "end_block")]
    pub to_block: Option<u64>,

    /// A dump file holding the `before` side, read offline.
    #[clap(long)]
    pub from_dump: Option<String>,

    /// A dump file holding the `after` side, read offline.
    #[clap(long)]
    pub to_dump: Option<String>,

    /// The RPC provider to read live storage from.
    /// This can be an explicit URL or a reference to a MESC endpoint.
    #[clap(long, short, value_parser = parse_url_arg, default_value = "", hide_default_value = true)]
    pub rpc_url: String,

    /// The output directory to write the output to or 'print' to print to the console
    #[clap(long = "output", short = 'o', default_value = "print", hide_default_value = true)]
    pub output: String,

    /// The name for the output file
    #[clap(long, short, default_value = "", hide_default_value = true)]
    pub name: String,
}

impl DiffArgs {
    /// Reads and parses the storage layout file.
    pub fn get_layout(&self) -> Result<StorageLayout> {
        let json = read_input(&self.layout)?;
        StorageLayout::from_json_for_contract(&json, self.contract.as_deref())
            .map_err(|e| eyre!("invalid layout '{}': {e}", self.layout))
    }

    /// The source of the `before` side.
    pub fn before(&self) -> StorageSource<'_> {
        self.side(self.from_dump.as_deref(), self.from_block)
    }

    /// The source of the `after` side.
    pub fn after(&self) -> StorageSource<'_> {
        self.side(self.to_dump.as_deref(), self.to_block)
    }

    /// Whether both sides read live state at the same block, and so can share one accessor.
    pub fn same_live_state(&self) -> bool {
        self.from_dump.is_none() && self.to_dump.is_none() && self.from_block == self.to_block
    }

    fn side<'a>(&'a self, dump: Option<&'a str>, block: Option<u64>) -> StorageSource<'a> {
        StorageSource {
            target: &self.target,
            rpc_url: &self.rpc_url,
            block,
            dump,
            offline: dump.is_some(),
        }
    }
}

impl DiffArgsBuilder {
    /// Creates a new DiffArgsBuilder with default values
    pub fn new() -> Self {
        Self {
            target: Some(String::new()),
            layout: Some(String::new()),
            contract: Some(None),
            from_block: Some(None),
            to_block: Some(None),
            from_dump: Some(None),
            to_dump: Some(None),
            rpc_url: Some(String::new()),
            output: Some(String::from("print")),
            name: Some(String::new()),
        }
    }
}

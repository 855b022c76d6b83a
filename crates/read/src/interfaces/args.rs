use alloy::primitives::Address;
use clap::Parser;
use derive_builder::Builder;
use eyre::{eyre, Result};
use slotlens_common::{constants::ADDRESS_REGEX, utils::io::file::read_input};
use slotlens_config::parse_url_arg;
use slotlens_storage::StorageLayout;

#[derive(Debug, Clone, Parser, Builder)]
#[clap(
    about = "Decode the storage of a contract using its storage layout",
    override_usage = "slotlens read <TARGET> <LAYOUT> [OPTIONS]"
)]
/// Arguments for the read operation
///
/// This struct contains all the configuration parameters needed to decode the storage of a
/// contract from a live node, a dump file, or both.
pub struct ReadArgs {
    /// The address of the contract whose storage is read.
    #[clap(required = true)]
    pub target: String,

    /// Path to the storage layout JSON, as emitted by the compiler's `storageLayout` output,
    /// or `-` to read it from stdin.
    #[clap(required = true)]
    pub layout: String,

    /// The contract to pick when the layout file holds layouts for several contracts.
    #[clap(long, short)]
    pub contract: Option<String>,

    /// Path to a storage dump produced by `slotlens dump`, read before querying the node.
    #[clap(long, short)]
    pub dump: Option<String>,

    /// Never query the node for slots the dump does not cover. Requires `--dump`.
    #[clap(long)]
    pub offline: bool,

    /// The block to read storage at. Defaults to the latest block.
    #[clap(long, short)]
    pub block: Option<u64>,

    /// The RPC provider to read storage from.
    /// This can be an explicit URL or a reference to a MESC endpoint.
    #[clap(long, short, value_parser = parse_url_arg, default_value = "", hide_default_value = true)]
    pub rpc_url: String,

    /// A mapping entry to look up, as `name=key`. Nested mappings take one key per level:
    /// `name=key1,key2`. May be repeated.
    #[clap(long = "key", short = 'k')]
    pub keys: Vec<String>,

    /// Abort on the first variable that cannot be decoded instead of marking it unreadable.
    #[clap(long)]
    pub strict: bool,

    /// The output directory to write the output to or 'print' to print to the console
    #[clap(long = "output", short = 'o', default_value = "print", hide_default_value = true)]
    pub output: String,

    /// The name for the output file
    #[clap(long, short, default_value = "", hide_default_value = true)]
    pub name: String,
}

impl ReadArgs {
    /// Reads and parses the storage layout file.
    pub fn get_layout(&self) -> Result<StorageLayout> {
        let json = read_input(&self.layout)?;
        StorageLayout::from_json_for_contract(&json, self.contract.as_deref())
            .map_err(|e| eyre!("invalid layout '{}': {e}", self.layout))
    }

    /// Parses the target contract address.
    pub fn get_target(&self) -> Result<Address> {
        parse_target(&self.target)
    }

    /// Parses the `--key` arguments into `(variable, keys)` pairs.
    pub fn get_lookups(&self) -> Result<Vec<(String, Vec<String>)>> {
        self.keys
            .iter()
            .map(|lookup| {
                let (name, keys) = lookup
                    .split_once('=')
                    .ok_or_else(|| eyre!("invalid lookup '{lookup}', expected `name=key`"))?;
                let keys: Vec<String> = keys.split(',').map(|k| k.trim().to_string()).collect();
                if name.trim().is_empty() || keys.iter().any(String::is_empty) {
                    return Err(eyre!("invalid lookup '{lookup}', expected `name=key`"));
                }
                Ok((name.trim().to_string(), keys))
            })
            .collect()
    }
}

/// Parses a contract address, with or without the `0x` prefix.
pub(crate) fn parse_target(target: &str) -> Result<Address> {
    if !ADDRESS_REGEX.is_match(target).unwrap_or(false) {
        return Err(eyre!("invalid contract address: '{target}'"));
    }
    let target = target.strip_prefix("0x").unwrap_or(target);
    target.parse::<Address>().map_err(|e| eyre!("invalid contract address: {e}"))
}

impl ReadArgsBuilder {
    /// Creates a new ReadArgsBuilder with default values
    pub fn new() -> Self {
        Self {
            target: Some(String::new()),
            layout: Some(String::new()),
            contract: Some(None),
            dump: Some(None),
            offline: Some(false),
            block: Some(None),
            rpc_url: Some(String::new()),
            keys: Some(Vec::new()),
            strict: Some(false),
            output: Some(String::from("print")),
            name: Some(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups() {
        let args = ReadArgsBuilder::new()
            .keys(vec!["balances=0xdead".to_string(), "allowances = 0x1, 0x2".to_string()])
            .build()
            .expect("failed to build args");

        assert_eq!(
            args.get_lookups().expect("valid lookups"),
            vec![
                ("balances".to_string(), vec!["0xdead".to_string()]),
                ("allowances".to_string(), vec!["0x1".to_string(), "0x2".to_string()]),
            ]
        );
    }

    #[test]
    fn test_invalid_lookups() {
        for lookup in ["balances", "=0x1", "balances=", "m=0x1,"] {
            let args = ReadArgsBuilder::new()
                .keys(vec![lookup.to_string()])
                .build()
                .expect("failed to build args");
            assert!(args.get_lookups().is_err(), "{lookup} should be rejected");
        }
    }

    #[test]
    fn test_parse_target() {
        assert!(parse_target("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045").is_ok());
        assert!(parse_target("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045").is_ok());
        assert!(parse_target("0x1234").is_err());
        assert!(parse_target("vitalik.eth").is_err());
    }
}

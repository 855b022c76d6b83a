//! The `slotlens` binary.

pub(crate) mod error;
pub(crate) mod log_args;
pub(crate) mod output;

use error::Error;
use log_args::{ColorMode, LogArgs};
use output::{build_output_path, print_with_less};
use tracing::{debug, info};

use clap::{Parser, Subcommand};

use slotlens_common::utils::io::file::{write_bytes, write_file};
use slotlens_config::{config, ConfigArgs, Configuration};
use slotlens_core::{
    slotlens_diff::{diff, DiffArgs},
    slotlens_dump::{dump, DumpArgs},
    slotlens_read::{read, ReadArgs},
};

#[derive(Debug, Parser)]
#[clap(name = "slotlens", version)]
pub(crate) struct Arguments {
    #[clap(subcommand)]
    pub(crate) sub: Subcommands,

    #[clap(flatten)]
    logs: LogArgs,
}

#[derive(Debug, Subcommand)]
#[clap(
    about = "slotlens decodes, diffs, and dumps the storage of Solidity contracts using their compiler storage layout."
)]
#[allow(clippy::large_enum_variant)]
pub(crate) enum Subcommands {
    #[clap(name = "read", about = "Decode the storage of a contract using its storage layout")]
    Read(ReadArgs),

    #[clap(name = "diff", about = "Compare the decoded storage of a contract at two points")]
    Diff(DiffArgs),

    #[clap(name = "dump", about = "Dump contiguous raw storage slots of a contract")]
    Dump(DumpArgs),

    #[clap(name = "config", about = "Display and edit the current configuration")]
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Arguments::parse();

    // setup logging. the guard flushes the log file when dropped
    let _guard = args
        .logs
        .init_tracing()
        .map_err(|e| Error::Generic(format!("failed to initialize logging: {}", e)))?;

    match args.logs.color {
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Auto => {}
    }

    let configuration = Configuration::load()
        .map_err(|e| Error::Generic(format!("failed to load configuration: {}", e)))?;
    match args.sub {
        Subcommands::Read(mut cmd) => {
            // if the user has not specified a rpc url, use the default
            if cmd.rpc_url.as_str() == "" {
                cmd.rpc_url = configuration.rpc_url;
            }

            // dump-backed reads stay offline when configured to
            if configuration.offline && cmd.dump.is_some() {
                debug!("`offline` is set in the configuration, ignoring the RPC fallback");
                cmd.offline = true;
            }

            let result = read(cmd.clone()).await?;

            if cmd.output == "print" {
                result.display();
            } else {
                let output_path = build_output_path(
                    &cmd.output,
                    &cmd.target,
                    &cmd.rpc_url,
                    &cmd.name,
                    "storage.json",
                )
                .await
                .map_err(|e| Error::Generic(format!("failed to build output path: {}", e)))?;

                write_file(&output_path, &serde_json::to_string_pretty(&result.to_json())?)
                    .map_err(|e| Error::Generic(format!("failed to write storage: {}", e)))?;
                info!("wrote decoded storage to {}", output_path);
            }
        }

        Subcommands::Diff(mut cmd) => {
            // if the user has not specified a rpc url, use the default
            if cmd.rpc_url.as_str() == "" {
                cmd.rpc_url = configuration.rpc_url;
            }

            let result = diff(cmd.clone()).await?;

            if cmd.output == "print" {
                result.display();
            } else {
                let output_path = build_output_path(
                    &cmd.output,
                    &cmd.target,
                    &cmd.rpc_url,
                    &cmd.name,
                    "diff.json",
                )
                .await
                .map_err(|e| Error::Generic(format!("failed to build output path: {}", e)))?;

                write_file(&output_path, &serde_json::to_string_pretty(&result.to_json())?)
                    .map_err(|e| Error::Generic(format!("failed to write diff: {}", e)))?;
                info!("wrote storage diff to {}", output_path);
            }
        }

        Subcommands::Dump(mut cmd) => {
            // if the user has not specified a rpc url, use the default
            if cmd.rpc_url.as_str() == "" {
                cmd.rpc_url = configuration.rpc_url;
            }

            let result = dump(cmd.clone()).await?;

            if cmd.output == "print" {
                print_with_less(&result.hexdump())
                    .map_err(|e| Error::Generic(format!("failed to print dump: {}", e)))?;
            } else {
                let output_path = build_output_path(
                    &cmd.output,
                    &cmd.target,
                    &cmd.rpc_url,
                    &cmd.name,
                    "dump.bin",
                )
                .await
                .map_err(|e| Error::Generic(format!("failed to build output path: {}", e)))?;

                write_bytes(&output_path, &result.to_bytes())
                    .map_err(|e| Error::Generic(format!("failed to write dump: {}", e)))?;
                info!("wrote {} slots to {}", result.slots.len(), output_path);
            }
        }

        Subcommands::Config(cmd) => {
            config(cmd).map_err(|e| Error::Generic(format!("failed to configure: {}", e)))?;
        }
    }

    Ok(())
}

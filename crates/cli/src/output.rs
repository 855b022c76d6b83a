use std::{env, io::Write};

use eyre::{eyre, Result};
use slotlens_common::{constants::ADDRESS_REGEX, ether::rpc};

/// build a standardized output path for the given parameters. follows the following cases:
/// - if `output` is the default value (`output`)
///   - if `target` is a contract address and `rpc_url` is set, return
///     `/output/{chain_id}/{target}/{filename}`
///   - otherwise, return `/output/local/{filename}`
/// - if `output` is specified, return `/{output}/{filename}`
///
/// `filename` is prefixed with `{name}-` when `name` is not empty.
pub(crate) async fn build_output_path(
    output: &str,
    target: &str,
    rpc_url: &str,
    name: &str,
    filename: &str,
) -> Result<String> {
    let filename =
        if name.is_empty() { filename.to_string() } else { format!("{}-{}", name, filename) };

    // if output is the default value, build a path based on the target
    if output == "output" {
        let cwd = env::current_dir()?
            .into_os_string()
            .into_string()
            .map_err(|_| eyre!("Unable to get current working directory"))?;

        if ADDRESS_REGEX.is_match(target).unwrap_or(false) && !rpc_url.is_empty() {
            let chain_id =
                rpc::chain_id(rpc_url).await.map_err(|_| eyre!("Unable to get chain id"))?;
            return Ok(format!("{}/output/{}/{}/{}", cwd, chain_id, target.to_lowercase(), filename));
        } else {
            return Ok(format!("{}/output/local/{}", cwd, filename));
        }
    }

    Ok(format!("{}/{}", output.trim_end_matches('/'), filename))
}

/// pass the input to the `less` command, or print it when `less` is unavailable
pub(crate) fn print_with_less(input: &str) -> Result<()> {
    let mut child =
        match std::process::Command::new("less").stdin(std::process::Stdio::piped()).spawn() {
            Ok(child) => child,
            Err(_) => {
                println!("{}", input);
                return Ok(());
            }
        };

    let stdin = child.stdin.as_mut().ok_or_else(|| eyre!("unable to get stdin for less"))?;
    stdin.write_all(input.as_bytes())?;

    child.wait()?;
    Ok(())
}

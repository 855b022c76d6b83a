use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use eyre::{eyre, Result};
use tracing::{debug, trace};

use crate::ether::{
    provider::MultiTransportProvider,
    slot::{RawSlot, SlotFetcher},
};

/// Get the chainId of the provided RPC URL
///
/// ```no_run
/// use slotlens_common::ether::rpc::chain_id;
///
/// // let chain_id = chain_id("https://eth.llamarpc.com").await?;
/// // assert_eq!(chain_id, 1);
/// ```
pub async fn chain_id(rpc_url: &str) -> Result<u64> {
    let provider = MultiTransportProvider::connect(rpc_url)
        .await
        .map_err(|e| eyre!("failed to connect to provider '{}': {e}", rpc_url))?;
    provider.get_chainid().await.map_err(|e| eyre!("failed to get chain id: {e}"))
}

/// A [`SlotFetcher`] reading storage of one contract from a live node via `eth_getStorageAt`.
///
/// Transient RPC failures are retried with exponential backoff for up to ten seconds before the
/// error is handed back to the caller.
#[derive(Clone, Debug)]
pub struct RpcSlotFetcher {
    provider: MultiTransportProvider,
    address: Address,
    block: Option<u64>,
}

impl RpcSlotFetcher {
    /// Connects to `rpc_url` and reads storage of `address` at `block` (or the latest block).
    pub async fn connect(rpc_url: &str, address: Address, block: Option<u64>) -> Result<Self> {
        let provider = MultiTransportProvider::connect(rpc_url)
            .await
            .map_err(|e| eyre!("failed to connect to provider '{}': {e}", rpc_url))?;
        Ok(Self { provider, address, block })
    }
}

#[async_trait]
impl SlotFetcher for RpcSlotFetcher {
    async fn fetch(&self, index: U256) -> Result<RawSlot> {
        let value = backoff::future::retry(
            ExponentialBackoff {
                max_elapsed_time: Some(Duration::from_secs(10)),
                ..ExponentialBackoff::default()
            },
            || async {
                trace!("fetching slot {:#x} of {} from node", index, self.address);
                self.provider
                    .get_storage_at(self.address, index, self.block)
                    .await
                    .map_err(backoff::Error::transient)
            },
        )
        .await
        .map_err(|e| eyre!("failed to read slot {:#x} of {}: {e}", index, self.address))?;

        debug!("slot {:#x} has been read from provider: {:#x}", index, value);
        Ok(RawSlot::from(value))
    }
}

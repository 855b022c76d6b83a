//! Create a custom data transport to use with a Provider.
use alloy::{
    eips::BlockId,
    network::Ethereum,
    primitives::{Address, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
};
use eyre::Result;

/// [`MultiTransportProvider`] is a convenience wrapper around the different transport types
/// supported by the [`Provider`].
#[derive(Clone, Debug)]
pub struct MultiTransportProvider {
    provider: RootProvider<Ethereum>,
}

// The builder picks the transport from the url: http(s), ws(s), or an IPC path.
impl MultiTransportProvider {
    /// Connect to a provider using the given rpc_url.
    pub async fn connect(rpc_url: &str) -> Result<Self> {
        if rpc_url.is_empty() {
            return Err(eyre::eyre!("No RPC URL provided"));
        }

        let provider = ProviderBuilder::new().connect(rpc_url).await?.root().clone();
        Ok(Self { provider })
    }

    /// Get the chain id.
    pub async fn get_chainid(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    /// Get the value of the storage slot `index` of `address`, at `block` or the latest block.
    pub async fn get_storage_at(
        &self,
        address: Address,
        index: U256,
        block: Option<u64>,
    ) -> Result<U256> {
        let request = self.provider.get_storage_at(address, index);
        let value = match block {
            Some(block) => request.block_id(BlockId::number(block)).await?,
            None => request.await?,
        };
        Ok(value)
    }
}

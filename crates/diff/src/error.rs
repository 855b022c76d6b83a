/// Error type for the Diff module
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error decoding storage
    #[error("Storage error: {0}")]
    Storage(#[from] slotlens_storage::Error),
    /// Error opening one side of the comparison
    #[error("Read error: {0}")]
    Read(#[from] slotlens_read::Error),
    /// Generic internal error
    #[error("Internal error: {0}")]
    Eyre(#[from] eyre::Report),
}

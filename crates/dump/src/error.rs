/// Error type for the Dump module
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error reading storage
    #[error("Storage error: {0}")]
    Storage(#[from] slotlens_storage::Error),
    /// Generic internal error
    #[error("Internal error: {0}")]
    Eyre(#[from] eyre::Report),
}

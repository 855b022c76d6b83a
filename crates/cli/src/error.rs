#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("{0}")]
    Generic(String),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Serde error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("Read error: {0}")]
    ReadError(#[from] slotlens_core::slotlens_read::Error),
    #[error("Diff error: {0}")]
    DiffError(#[from] slotlens_core::slotlens_diff::Error),
    #[error("Dump error: {0}")]
    DumpError(#[from] slotlens_core::slotlens_dump::Error),
}

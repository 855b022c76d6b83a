use alloy::primitives::U256;

/// Error type for the storage module
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A variable or type in the layout is structurally invalid
    #[error("malformed layout: `{field}` of `{variable}` {reason}")]
    MalformedLayout {
        /// The variable (or type) the problem was found in
        variable: String,
        /// The offending field
        field: String,
        /// What is wrong with it
        reason: String,
    },
    /// An encoding or type label this crate cannot decode
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    /// The underlying slot fetcher failed. Never retried here.
    #[error("fetch error: {0}")]
    FetchFailure(eyre::Report),
    /// A mapping key that cannot be encoded for the mapping's key type
    #[error("invalid key '{key}' for mapping `{variable}`: {reason}")]
    InvalidKey {
        /// The mapping variable
        variable: String,
        /// The key as given
        key: String,
        /// Why it cannot be encoded
        reason: String,
    },
    /// A stored length beyond the accessor's length limit, or one that cannot be iterated here
    #[error("length {length} of `{variable}` is too large to decode")]
    LengthOverflow {
        /// The array or byte string
        variable: String,
        /// The stored length
        length: U256,
    },
    /// Error when parsing layout JSON
    #[error("Json error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn malformed(
        variable: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::MalformedLayout {
            variable: variable.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_key(
        variable: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidKey { variable: variable.into(), key: key.into(), reason: reason.into() }
    }
}

pub(crate) mod accessor;
pub(crate) mod decoder;
pub(crate) mod differ;
pub(crate) mod mapping;
pub(crate) mod position;
pub(crate) mod snapshot;

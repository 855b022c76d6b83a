mod args;

// re-export the public interface
pub(crate) use args::parse_target;
pub use args::{ReadArgs, ReadArgsBuilder};

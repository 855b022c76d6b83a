/// Hexadecimal encoding and decoding utilities.
pub mod hex;

/// Input/output utilities for file manipulation.
pub mod io;

/// String manipulation and formatting utilities.
pub mod strings;

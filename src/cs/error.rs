//! Error types shared by the coding and decoding routines.

use thiserror::Error;

/// Errors reported by encoders, channel helpers and decoders.
///
/// Every variant is produced during argument validation, before any trellis
/// computation starts, so a failed call never leaves partial results behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The code itself is malformed: bad generator strings or a constraint
    /// length outside the supported range.
    #[error("invalid code configuration: {0}")]
    Configuration(String),

    /// A received sequence does not split into whole output symbols.
    #[error("received length {len} is not a multiple of {symbols_per_bit} symbols per input bit")]
    InputLength {
        /// Length of the offending sequence
        len: usize,
        /// Output symbols per input bit (n for a rate 1/n code)
        symbols_per_bit: usize,
    },

    /// Any other argument that cannot be processed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

//! Convolutional codes with hard-decision Viterbi, soft-decision Viterbi and
//! BCJR decoding.
//!
//! All decoders expose the full trellis they computed (path metrics, survivor
//! branches, forward/backward tables, LLRs) so a presentation layer can step
//! through a decode after it finishes.

pub mod cs;

pub use cs::ecc;
pub use cs::error::{Error, Result};

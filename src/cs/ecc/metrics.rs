//! Branch metrics and extended log-domain arithmetic shared by the trellis decoders.
//!
//! The Viterbi decoders accumulate distances (smaller is better), while the BCJR
//! decoder accumulates log-probabilities (larger is better). Probabilities are
//! never multiplied directly: products become sums and sums become [`log_add`],
//! which keeps long recursions away from underflow.

use num_traits::Zero;
use std::fmt::Debug;

/// Log-domain stand-in for probability zero.
///
/// A finite sentinel keeps every sum and difference well defined; any value at or
/// below it is treated as "impossible".
pub const LOG_ZERO: f64 = -1e9;

/// Returns `ln(e^a + e^b)` without overflow or underflow.
///
/// `LOG_ZERO` is the identity element, and the result never drops below it.
pub fn log_add(a: f64, b: f64) -> f64 {
    debug_assert!(!a.is_nan() && !b.is_nan(), "NaN in log-domain sum");
    if a <= LOG_ZERO {
        return b.max(LOG_ZERO);
    }
    if b <= LOG_ZERO {
        return a;
    }
    let max = a.max(b);
    max + (-(a - b).abs()).exp().ln_1p()
}

/// Returns `ln(e^a * e^b)`, absorbing into `LOG_ZERO` when either factor is impossible.
pub fn log_mul(a: f64, b: f64) -> f64 {
    debug_assert!(!a.is_nan() && !b.is_nan(), "NaN in log-domain product");
    if a <= LOG_ZERO || b <= LOG_ZERO {
        LOG_ZERO
    } else {
        (a + b).max(LOG_ZERO)
    }
}

/// Folds [`log_add`] over a sequence of log-domain terms. An empty sequence is `LOG_ZERO`.
pub fn log_sum<I>(terms: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    terms.into_iter().fold(LOG_ZERO, log_add)
}

/// Shifts the possible entries of a log-domain vector so the largest is 0.
///
/// Entries at or below `LOG_ZERO` stay impossible. Ratios between the other
/// entries are unchanged, so anything computed as a difference of log sums
/// (such as an LLR) is unaffected.
pub fn log_normalize(values: &mut [f64]) {
    let max = values
        .iter()
        .copied()
        .filter(|&v| v > LOG_ZERO)
        .fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return;
    }
    for v in values.iter_mut().filter(|v| **v > LOG_ZERO) {
        *v = (*v - max).max(LOG_ZERO);
    }
}

/// Maps a coded bit onto its antipodal channel symbol (0 → +1.0, 1 → −1.0).
#[inline]
pub fn bpsk_symbol(bit: u8) -> f64 {
    if bit == 0 {
        1.0
    } else {
        -1.0
    }
}

/// Number of positions at which two bit groups differ.
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b).filter(|(x, y)| x != y).count() as u32
}

/// Squared Euclidean distance between received samples and the ideal BPSK
/// symbols for a group of coded bits.
pub fn squared_euclidean_distance(samples: &[f64], bits: &[u8]) -> f64 {
    samples
        .iter()
        .zip(bits)
        .map(|(&r, &bit)| {
            let d = r - bpsk_symbol(bit);
            d * d
        })
        .sum()
}

/// Accumulated path metric used by the Viterbi decoders.
///
/// Metrics only grow along a path; the minimum is the survivor.
pub trait PathMetric: Copy + PartialOrd + Debug + Zero + Send + Sync {
    /// Metric of a state that no path reaches (conceptually +∞).
    const UNREACHABLE: Self;

    /// Whether this metric belongs to a state some path reaches.
    fn is_reachable(&self) -> bool;
}

impl PathMetric for u32 {
    const UNREACHABLE: Self = u32::MAX;

    fn is_reachable(&self) -> bool {
        *self != u32::MAX
    }
}

impl PathMetric for f64 {
    const UNREACHABLE: Self = f64::INFINITY;

    fn is_reachable(&self) -> bool {
        self.is_finite()
    }
}

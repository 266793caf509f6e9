//! BCJR (maximum a posteriori) decoding of convolutional codes.
//!
//! Where Viterbi returns the single most likely input sequence, BCJR computes
//! the posterior probability of every individual input bit. It runs two
//! recursions over the trellis:
//!
//! - **Forward (α)**: the probability of reaching each state from the start
//! - **Backward (β)**: the probability of reaching the end from each state
//!
//! and combines them with the branch metrics (γ) into a log-likelihood ratio
//! per bit. All quantities live in the log domain; products become sums and
//! sums become [`log_add`], with [`LOG_ZERO`] standing in for probability zero.
//!
//! # Conventions
//!
//! - γ is −d²/2, where d² is the squared Euclidean distance between the received
//!   samples and the transition's BPSK symbols.
//! - LLR = ln P(bit = 1 | r) − ln P(bit = 0 | r); a bit is decided as 1 when LLR ≥ 0.
//! - The backward recursion starts either from state 0 alone (terminated
//!   encoder) or from every state with equal weight (unterminated), chosen per
//!   decoder with [`BcjrDecoder::with_termination`].

use crate::cs::ecc::convolutional::{ConvolutionalCode, GeneratorSet};
use crate::cs::ecc::metrics::{
    log_add, log_mul, log_normalize, log_sum, squared_euclidean_distance, LOG_ZERO,
};
use crate::cs::ecc::{Result, TrellisDecoder};
use crate::cs::error::Error;
use log::{debug, trace};
use ndarray::{aview1, Array2, Array3};
use rayon::prelude::*;

/// Log-domain tables and per-bit results of one BCJR decode
#[derive(Debug, Clone)]
pub struct BcjrOutput {
    /// Branch metrics, shape (N, states, 2), indexed `[t, state, input]`
    pub gamma: Array3<f64>,
    /// Forward state metrics, shape (N+1, states)
    pub alpha: Array2<f64>,
    /// Backward state metrics, shape (N+1, states)
    pub beta: Array2<f64>,
    /// Log-likelihood ratio of each input bit
    pub llrs: Vec<f64>,
    /// Hard decisions: 1 where the LLR is non-negative
    pub decisions: Vec<u8>,
}

impl BcjrOutput {
    /// Number of decoded time steps
    pub fn len(&self) -> usize {
        self.llrs.len()
    }

    /// Whether nothing was decoded
    pub fn is_empty(&self) -> bool {
        self.llrs.is_empty()
    }

    /// Posterior probability that each bit is 1.
    pub fn bit_probabilities(&self) -> Vec<f64> {
        self.llrs.iter().map(|&llr| 1.0 / (1.0 + (-llr).exp())).collect()
    }

    /// Posterior probability of each state at each time, shape (N+1, states).
    ///
    /// Each row is α + β normalized to sum to one; unreachable states get 0.
    pub fn state_posteriors(&self) -> Array2<f64> {
        let mut posteriors = Array2::zeros(self.alpha.raw_dim());
        for (t, mut row) in posteriors.outer_iter_mut().enumerate() {
            let joint: Vec<f64> = (0..self.alpha.ncols())
                .map(|s| log_mul(self.alpha[[t, s]], self.beta[[t, s]]))
                .collect();
            let total = log_sum(joint.iter().copied());
            if total <= LOG_ZERO {
                continue;
            }
            for (s, &j) in joint.iter().enumerate() {
                if j > LOG_ZERO {
                    row[s] = (j - total).exp();
                }
            }
        }
        posteriors
    }
}

/// BCJR decoder for a convolutional code
#[derive(Debug, Clone)]
pub struct BcjrDecoder {
    /// The convolutional code configuration
    code: ConvolutionalCode,
    /// Whether the encoder is known to finish in state 0
    assume_termination: bool,
}

impl BcjrDecoder {
    /// Creates a decoder that assumes the encoder was terminated in state 0.
    pub fn new(code: ConvolutionalCode) -> Self {
        Self {
            code,
            assume_termination: true,
        }
    }

    /// Selects the backward boundary condition.
    ///
    /// # Arguments
    ///
    /// * `assume_termination` - `true` starts β from state 0 only; `false` gives every
    ///   terminal state equal weight
    pub fn with_termination(mut self, assume_termination: bool) -> Self {
        self.assume_termination = assume_termination;
        self
    }

    /// Whether β starts from state 0 only
    pub fn assumes_termination(&self) -> bool {
        self.assume_termination
    }

    /// The code being decoded
    pub fn code(&self) -> &ConvolutionalCode {
        &self.code
    }

    /// γ for one transition: −d²/2 against the received group.
    #[inline]
    fn branch_log_metric(&self, state: usize, input: u8, received: &[f64]) -> f64 {
        let output = &self.code.branch(state, input).output;
        -squared_euclidean_distance(received, output) / 2.0
    }

    /// γ for every (state, input) of one step, flattened as `2 * state + input`.
    fn gamma_row(&self, received: &[f64]) -> Vec<f64> {
        (0..self.code.num_states())
            .flat_map(|s| (0..2u8).map(move |b| (s, b)))
            .map(|(s, b)| self.branch_log_metric(s, b, received))
            .collect()
    }

    /// α at t = 0: state 0 certain, every other state impossible.
    fn initial_alpha(&self) -> Vec<f64> {
        let mut alpha = vec![LOG_ZERO; self.code.num_states()];
        alpha[0] = 0.0;
        alpha
    }

    /// Boundary values of β at t = N
    fn terminal_beta(&self) -> Vec<f64> {
        let num_states = self.code.num_states();
        if self.assume_termination {
            let mut beta = vec![LOG_ZERO; num_states];
            beta[0] = 0.0;
            beta
        } else {
            vec![0.0; num_states]
        }
    }

    /// One forward recursion step over a relative γ row, normalized to a best state of 0.
    fn forward(&self, alpha: &[f64], gamma: &[f64]) -> Vec<f64> {
        let mut next: Vec<f64> = (0..self.code.num_states())
            .map(|state| {
                log_sum(
                    self.code
                        .predecessors(state)
                        .iter()
                        .map(|&(s, b)| log_mul(alpha[s], gamma[2 * s + b as usize])),
                )
            })
            .collect();
        log_normalize(&mut next);
        next
    }

    /// One backward recursion step over a relative γ row, normalized to a best state of 0.
    fn backward(&self, beta: &[f64], gamma: &[f64]) -> Vec<f64> {
        let mut prev: Vec<f64> = (0..self.code.num_states())
            .map(|s| {
                log_sum((0..2u8).map(|b| {
                    let next = self.code.branch(s, b).next_state;
                    log_mul(gamma[2 * s + b as usize], beta[next])
                }))
            })
            .collect();
        log_normalize(&mut prev);
        prev
    }

    /// Checks one received group and one α layer against the code.
    fn validate_step(&self, alpha: &[f64], received: &[f64]) -> Result<()> {
        let n = self.code.output_bits();
        if received.len() != n {
            return Err(Error::InputLength {
                len: received.len(),
                symbols_per_bit: n,
            });
        }
        if alpha.len() != self.code.num_states() {
            return Err(Error::InvalidInput(format!(
                "Layer has {} states, code has {}",
                alpha.len(),
                self.code.num_states()
            )));
        }
        check_finite(received)
    }

    /// One forward recursion step: α at t+1 from α at t and the received group.
    ///
    /// The result is shifted so its most likely state has log-metric 0, matching
    /// the rows of [`BcjrOutput::alpha`].
    pub fn step(&self, alpha: &[f64], received: &[f64]) -> Result<Vec<f64>> {
        self.validate_step(alpha, received)?;
        Ok(self.forward(alpha, &relative_gamma(self.gamma_row(received))))
    }

    /// Decodes a complete received sequence.
    ///
    /// # Arguments
    ///
    /// * `received` - Real-valued samples; length must be a multiple of n
    ///
    /// # Returns
    ///
    /// The α, β and γ tables with the per-bit LLRs and hard decisions. Empty
    /// input yields empty LLRs. γ holds the raw −d²/2 values; each α and β row
    /// is shifted so its best state sits at 0, which keeps long or
    /// high-amplitude sequences clear of `LOG_ZERO`.
    pub fn decode(&self, received: &[f64]) -> Result<BcjrOutput> {
        let n = self.code.output_bits();
        if received.len() % n != 0 {
            return Err(Error::InputLength {
                len: received.len(),
                symbols_per_bit: n,
            });
        }
        check_finite(received)?;

        let steps = received.len() / n;
        let num_states = self.code.num_states();

        // Time steps are independent, so γ rows are built in parallel
        let rows: Vec<Vec<f64>> = received
            .par_chunks_exact(n)
            .map(|group| self.gamma_row(group))
            .collect();
        let mut gamma = Array3::from_elem((steps, num_states, 2), LOG_ZERO);
        for (t, row) in rows.iter().enumerate() {
            for s in 0..num_states {
                gamma[[t, s, 0]] = row[2 * s];
                gamma[[t, s, 1]] = row[2 * s + 1];
            }
        }
        let relative: Vec<Vec<f64>> = rows.into_iter().map(relative_gamma).collect();

        // Forward
        let mut alpha = Array2::from_elem((steps + 1, num_states), LOG_ZERO);
        let mut row = self.initial_alpha();
        alpha.row_mut(0).assign(&aview1(&row));
        for t in 0..steps {
            row = self.forward(&row, &relative[t]);
            alpha.row_mut(t + 1).assign(&aview1(&row));
            trace!("bcjr alpha[{}] = {:?}", t + 1, row);
        }

        // Backward
        let mut beta = Array2::from_elem((steps + 1, num_states), LOG_ZERO);
        let mut row = self.terminal_beta();
        beta.row_mut(steps).assign(&aview1(&row));
        for t in (0..steps).rev() {
            row = self.backward(&row, &relative[t]);
            beta.row_mut(t).assign(&aview1(&row));
            trace!("bcjr beta[{}] = {:?}", t, row);
        }

        // Per-bit log-likelihood ratios
        let mut llrs = Vec::with_capacity(steps);
        let mut decisions = Vec::with_capacity(steps);
        for t in 0..steps {
            let mut sums = [LOG_ZERO; 2];
            for s in 0..num_states {
                for b in 0..2u8 {
                    let next = self.code.branch(s, b).next_state;
                    let term = log_mul(
                        log_mul(alpha[[t, s]], relative[t][2 * s + b as usize]),
                        beta[[t + 1, next]],
                    );
                    sums[b as usize] = log_add(sums[b as usize], term);
                }
            }
            debug_assert!(
                sums.iter().any(|&v| v > LOG_ZERO),
                "every path impossible at t = {}",
                t
            );
            let llr = sums[1] - sums[0];
            debug_assert!(llr.is_finite(), "non-finite LLR at t = {}", t);
            llrs.push(llr);
            decisions.push(u8::from(llr >= 0.0));
        }

        debug!(
            "bcjr decoded {} steps over {} states (termination assumed: {})",
            steps, num_states, self.assume_termination
        );

        Ok(BcjrOutput {
            gamma,
            alpha,
            beta,
            llrs,
            decisions,
        })
    }
}

/// Rejects NaN and infinite samples.
fn check_finite(received: &[f64]) -> Result<()> {
    match received.iter().position(|x| !x.is_finite()) {
        Some(i) => Err(Error::InvalidInput(format!(
            "Sample {} is not finite ({})",
            i, received[i]
        ))),
        None => Ok(()),
    }
}

/// Shifts a γ row so its best branch is 0.
///
/// Every path crosses exactly one branch per step, so the shift cancels in
/// the LLR. Raw γ can sit below `LOG_ZERO` for large samples, which is why
/// this does not go through [`log_normalize`].
fn relative_gamma(mut row: Vec<f64>) -> Vec<f64> {
    let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    for g in row.iter_mut() {
        *g = (*g - max).max(LOG_ZERO);
    }
    row
}

impl TrellisDecoder for BcjrDecoder {
    type Sample = f64;
    type Layer = Vec<f64>;
    type Output = BcjrOutput;

    fn initial_layer(&self) -> Vec<f64> {
        self.initial_alpha()
    }

    fn step(&self, layer: &Vec<f64>, received: &[f64]) -> Result<Vec<f64>> {
        BcjrDecoder::step(self, layer, received)
    }

    fn decode(&self, received: &[f64]) -> Result<BcjrOutput> {
        BcjrDecoder::decode(self, received)
    }
}

/// BCJR decoding with the given backward boundary condition.
pub fn bcjr_decode(
    generators: &GeneratorSet,
    received: &[f64],
    assume_termination: bool,
) -> Result<BcjrOutput> {
    BcjrDecoder::new(ConvolutionalCode::new(generators.clone()))
        .with_termination(assume_termination)
        .decode(received)
}

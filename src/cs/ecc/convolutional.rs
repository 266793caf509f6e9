//! Convolutional code trellis model and encoder.
//!
//! A rate 1/n convolutional code passes every information bit through a shift
//! register of K−1 memory cells. Each of the n generator polynomials selects a
//! subset of the register taps (current input plus memory) and XORs them into
//! one output bit, so every input bit produces an n-bit output symbol.
//!
//! The encoder is a finite-state machine over 2^(K−1) states, and its state
//! diagram unrolled in time is the trellis that the Viterbi and BCJR decoders
//! search. This module provides:
//! - Validated generator sets, with K derived from the longest polynomial
//! - A precomputed transition table: (state, input bit) → (output symbol, next state)
//! - Encoding with optional zero-tail termination and a per-step encoder trace
//! - Byte-level encoding/decoding through the [`ErrorCorrection`] trait
//!
//! # Register convention
//!
//! The state holds the K−1 previous input bits, most recent in the most
//! significant position. The full register for a transition is
//! `(input << (K-1)) | state`, and character `j` of a generator string taps
//! the bit that entered the register `j` steps ago (character 0 is the current
//! input). The next state shifts the input into the top and drops the oldest bit.

use crate::cs::ecc::viterbi::ViterbiDecoder;
use crate::cs::ecc::{ErrorCorrection, Result};
use crate::cs::error::Error;
use bitvec::prelude::*;
use std::fmt;
use std::str::FromStr;

/// Smallest supported constraint length
pub const MIN_CONSTRAINT_LENGTH: usize = 2;

/// Largest supported constraint length; bounds the state space to 32 states
pub const MAX_CONSTRAINT_LENGTH: usize = 6;

/// An ordered, validated set of binary generator polynomials.
///
/// The constraint length is derived from the longest polynomial (clamped up to
/// [`MIN_CONSTRAINT_LENGTH`]) and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorSet {
    /// Polynomials as written, e.g. `"111"`
    polynomials: Vec<String>,
    /// Tap masks aligned with the full K-bit register
    taps: Vec<u32>,
    /// Constraint length K
    constraint_length: usize,
}

impl GeneratorSet {
    /// Creates a generator set from binary polynomial strings.
    ///
    /// # Arguments
    ///
    /// * `polynomials` - One string of '0'/'1' characters per output bit
    ///
    /// # Returns
    ///
    /// A new `GeneratorSet` or a configuration error if any polynomial is empty,
    /// all-zero, contains other characters, or is longer than [`MAX_CONSTRAINT_LENGTH`]
    pub fn new<S: AsRef<str>>(polynomials: &[S]) -> Result<Self> {
        if polynomials.is_empty() {
            return Err(Error::Configuration(
                "At least one generator polynomial is required".to_string(),
            ));
        }

        let mut max_len = 0;
        for (i, poly) in polynomials.iter().enumerate() {
            let poly = poly.as_ref();
            if poly.is_empty() {
                return Err(Error::Configuration(format!(
                    "Generator polynomial {} is empty",
                    i
                )));
            }
            if let Some(c) = poly.chars().find(|&c| c != '0' && c != '1') {
                return Err(Error::Configuration(format!(
                    "Generator polynomial {} ({:?}) contains invalid character {:?}",
                    i, poly, c
                )));
            }
            if !poly.contains('1') {
                return Err(Error::Configuration(format!(
                    "Generator polynomial {} ({:?}) has no taps",
                    i, poly
                )));
            }
            if poly.len() > MAX_CONSTRAINT_LENGTH {
                return Err(Error::Configuration(format!(
                    "Generator polynomial {} ({:?}) exceeds maximum constraint length {}",
                    i, poly, MAX_CONSTRAINT_LENGTH
                )));
            }
            max_len = max_len.max(poly.len());
        }

        let constraint_length = max_len.max(MIN_CONSTRAINT_LENGTH);
        let polynomials: Vec<String> = polynomials.iter().map(|p| p.as_ref().to_string()).collect();
        let taps = polynomials
            .iter()
            .map(|p| tap_mask(p, constraint_length))
            .collect();

        Ok(GeneratorSet {
            polynomials,
            taps,
            constraint_length,
        })
    }

    /// Builds a set from polynomials already known to be valid.
    fn from_valid(polynomials: &[&str]) -> Self {
        let constraint_length = polynomials
            .iter()
            .map(|p| p.len())
            .max()
            .unwrap_or(MIN_CONSTRAINT_LENGTH)
            .max(MIN_CONSTRAINT_LENGTH);
        GeneratorSet {
            polynomials: polynomials.iter().map(|p| p.to_string()).collect(),
            taps: polynomials
                .iter()
                .map(|p| tap_mask(p, constraint_length))
                .collect(),
            constraint_length,
        }
    }

    /// Rate 1/2, K=3 code with generators 7 and 5 (octal)
    pub fn rate_half_k3() -> Self {
        Self::from_valid(&["111", "101"])
    }

    /// Rate 1/2, K=5 code with generators 23 and 35 (octal)
    pub fn rate_half_k5() -> Self {
        Self::from_valid(&["10011", "11101"])
    }

    /// Rate 1/3, K=3 code with generators 7, 7 and 5 (octal)
    pub fn rate_third_k3() -> Self {
        Self::from_valid(&["111", "111", "101"])
    }

    /// Constraint length K
    pub fn constraint_length(&self) -> usize {
        self.constraint_length
    }

    /// Number of output bits per input bit (n)
    pub fn output_bits(&self) -> usize {
        self.taps.len()
    }

    /// Number of trellis states, 2^(K−1)
    pub fn num_states(&self) -> usize {
        1 << (self.constraint_length - 1)
    }

    /// Code rate 1/n
    pub fn code_rate(&self) -> f64 {
        1.0 / self.output_bits() as f64
    }

    /// The polynomials as given at construction
    pub fn polynomials(&self) -> &[String] {
        &self.polynomials
    }
}

impl FromStr for GeneratorSet {
    type Err = Error;

    /// Parses a comma- or whitespace-separated list such as `"111,101"`.
    fn from_str(s: &str) -> Result<Self> {
        let polys: Vec<&str> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .collect();
        Self::new(&polys)
    }
}

impl fmt::Display for GeneratorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.polynomials.join(","))
    }
}

/// Converts a polynomial string into a mask over the K-bit register.
/// Character `j` maps to register bit `K-1-j`.
fn tap_mask(poly: &str, constraint_length: usize) -> u32 {
    poly.bytes()
        .enumerate()
        .filter(|&(_, c)| c == b'1')
        .fold(0u32, |mask, (j, _)| mask | 1 << (constraint_length - 1 - j))
}

/// Output symbol and successor state of one trellis transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// n coded bits, one per generator, in generator order
    pub output: Vec<u8>,
    /// State after the input bit is shifted in
    pub next_state: usize,
}

/// One edge of the trellis section, for drawing the full state diagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrellisEdge {
    /// Source state
    pub from: usize,
    /// Input bit driving the edge
    pub input: u8,
    /// Coded output symbol
    pub output: Vec<u8>,
    /// Destination state
    pub to: usize,
}

/// Snapshot of a single encoder step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderStep {
    /// Time index
    pub t: usize,
    /// Information bit consumed at this step
    pub input: u8,
    /// State before the step
    pub prev_state: usize,
    /// State after the step
    pub next_state: usize,
    /// Full register contents (input followed by memory), newest bit first
    pub register: Vec<u8>,
    /// Output symbol emitted at this step
    pub output: Vec<u8>,
}

/// Coded sequence together with the register state left behind by the encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    /// Concatenated output symbols
    pub coded: Vec<u8>,
    /// Encoder state after the last input bit; 0 when the input was terminated
    pub final_state: usize,
}

/// A convolutional code: generator set plus its precomputed trellis section.
#[derive(Debug, Clone)]
pub struct ConvolutionalCode {
    /// Generator polynomials this trellis was built from
    generators: GeneratorSet,
    /// Transitions indexed by `state * 2 + input`
    transitions: Vec<Transition>,
}

impl ConvolutionalCode {
    /// Creates the trellis model for a generator set.
    pub fn new(generators: GeneratorSet) -> Self {
        let k = generators.constraint_length();
        let num_states = generators.num_states();

        let mut transitions = Vec::with_capacity(num_states * 2);
        for state in 0..num_states {
            for input in 0..2u8 {
                let register = ((input as u32) << (k - 1)) | state as u32;
                let output = generators
                    .taps
                    .iter()
                    .map(|&mask| ((register & mask).count_ones() % 2) as u8)
                    .collect();
                let next_state = ((input as usize) << (k - 2)) | (state >> 1);
                transitions.push(Transition { output, next_state });
            }
        }

        ConvolutionalCode {
            generators,
            transitions,
        }
    }

    /// Parses generator strings and builds the trellis in one step.
    pub fn from_generators<S: AsRef<str>>(polynomials: &[S]) -> Result<Self> {
        Ok(Self::new(GeneratorSet::new(polynomials)?))
    }

    /// The generator set
    pub fn generators(&self) -> &GeneratorSet {
        &self.generators
    }

    /// Constraint length K (derived from the generators)
    pub fn constraint_length(&self) -> usize {
        self.generators.constraint_length()
    }

    /// Output bits per input bit (n)
    pub fn output_bits(&self) -> usize {
        self.generators.output_bits()
    }

    /// Number of trellis states, 2^(K−1)
    pub fn num_states(&self) -> usize {
        self.generators.num_states()
    }

    /// Number of zero bits needed to drive the encoder back to state 0
    pub fn termination_length(&self) -> usize {
        self.constraint_length() - 1
    }

    /// Looks up the transition taken from `state` on `input`.
    ///
    /// # Returns
    ///
    /// The transition, or an error if `state` is not below
    /// [`num_states`](Self::num_states) or `input` is not 0 or 1
    pub fn transition(&self, state: usize, input: u8) -> Result<&Transition> {
        if input > 1 {
            return Err(Error::InvalidInput(format!(
                "Input bit must be 0 or 1, got {}",
                input
            )));
        }
        if state >= self.num_states() {
            return Err(Error::InvalidInput(format!(
                "State {} is out of range for {} states",
                state,
                self.num_states()
            )));
        }
        Ok(self.branch(state, input))
    }

    /// Table lookup for a state and bit already known to be in range.
    #[inline]
    pub(crate) fn branch(&self, state: usize, input: u8) -> &Transition {
        &self.transitions[state * 2 + (input & 1) as usize]
    }

    /// The two (source state, input bit) pairs entering `state`, lowest source first.
    ///
    /// Both predecessors share the same input bit: the one now in the top register cell.
    pub fn predecessors(&self, state: usize) -> [(usize, u8); 2] {
        let k = self.constraint_length();
        let input = (state >> (k - 2)) as u8 & 1;
        let base = (state << 1) & (self.num_states() - 1);
        [(base, input), (base | 1, input)]
    }

    /// Every edge of one trellis section, ordered by source state then input bit.
    pub fn edges(&self) -> Vec<TrellisEdge> {
        (0..self.num_states())
            .flat_map(|from| {
                (0..2u8).map(move |input| {
                    let tr = self.branch(from, input);
                    TrellisEdge {
                        from,
                        input,
                        output: tr.output.clone(),
                        to: tr.next_state,
                    }
                })
            })
            .collect()
    }

    /// Appends K−1 zero bits so the encoder finishes in state 0.
    pub fn terminate(&self, bits: &[u8]) -> Vec<u8> {
        let mut terminated = Vec::with_capacity(bits.len() + self.termination_length());
        terminated.extend_from_slice(bits);
        terminated.resize(bits.len() + self.termination_length(), 0);
        terminated
    }

    /// Encodes an information bit sequence starting from state 0.
    ///
    /// No termination bits are added; see [`terminate`](Self::terminate).
    ///
    /// # Arguments
    ///
    /// * `bits` - Information bits, each 0 or 1
    ///
    /// # Returns
    ///
    /// The coded bits (n per input bit) and the final encoder state
    pub fn encode(&self, bits: &[u8]) -> Result<Encoding> {
        validate_bits(bits)?;

        let mut coded = Vec::with_capacity(bits.len() * self.output_bits());
        let mut state = 0;
        for &bit in bits {
            let tr = self.branch(state, bit);
            coded.extend_from_slice(&tr.output);
            state = tr.next_state;
        }

        Ok(Encoding {
            coded,
            final_state: state,
        })
    }

    /// Terminates and encodes in one call; the final state is always 0.
    pub fn encode_terminated(&self, bits: &[u8]) -> Result<Vec<u8>> {
        Ok(self.encode(&self.terminate(bits))?.coded)
    }

    /// Encodes while recording every register step.
    pub fn trace(&self, bits: &[u8]) -> Result<Vec<EncoderStep>> {
        validate_bits(bits)?;

        let k = self.constraint_length();
        let mut steps = Vec::with_capacity(bits.len());
        let mut state = 0;
        for (t, &input) in bits.iter().enumerate() {
            let tr = self.branch(state, input);
            let register_value = ((input as usize) << (k - 1)) | state;
            let register = (0..k)
                .map(|j| ((register_value >> (k - 1 - j)) & 1) as u8)
                .collect();
            steps.push(EncoderStep {
                t,
                input,
                prev_state: state,
                next_state: tr.next_state,
                register,
                output: tr.output.clone(),
            });
            state = tr.next_state;
        }

        Ok(steps)
    }
}

impl ErrorCorrection for ConvolutionalCode {
    /// Encodes bytes MSB-first, appending the zero tail, and packs the coded bits
    /// MSB-first (the last byte is zero-padded).
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let bits: Vec<u8> = data.view_bits::<Msb0>().iter().map(|b| *b as u8).collect();
        let coded = self.encode_terminated(&bits)?;

        let packed: BitVec<u8, Msb0> = coded.iter().map(|&b| b == 1).collect();
        Ok(packed.into_vec())
    }

    /// Hard-decision decodes bytes produced by [`ErrorCorrection::encode`].
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let n = self.output_bits();
        let available_steps = data.len() * 8 / n;
        if available_steps < self.termination_length() + 8 {
            return Err(Error::InvalidInput(format!(
                "{} bytes cannot hold a terminated codeword for this code",
                data.len()
            )));
        }

        // Padding adds fewer than 8 bits, so the byte count is recoverable
        let data_bytes = (available_steps - self.termination_length()) / 8;
        let steps = data_bytes * 8 + self.termination_length();

        let received: Vec<u8> = data.view_bits::<Msb0>()[..steps * n]
            .iter()
            .map(|b| *b as u8)
            .collect();
        let decoded = ViterbiDecoder::hard(self.clone()).decode(&received)?.decoded;

        let packed: BitVec<u8, Msb0> = decoded[..data_bytes * 8].iter().map(|&b| b == 1).collect();
        Ok(packed.into_vec())
    }
}

/// Checks that every element of a bit sequence is 0 or 1.
pub fn validate_bits(bits: &[u8]) -> Result<()> {
    match bits.iter().position(|&b| b > 1) {
        Some(i) => Err(Error::InvalidInput(format!(
            "Bit {} has value {}, expected 0 or 1",
            i, bits[i]
        ))),
        None => Ok(()),
    }
}

/// Parses a string of '0'/'1' characters, rejecting anything else.
pub fn parse_bits(s: &str) -> Result<Vec<u8>> {
    s.chars()
        .enumerate()
        .map(|(i, c)| match c {
            '0' => Ok(0),
            '1' => Ok(1),
            _ => Err(Error::InvalidInput(format!(
                "Character {:?} at position {} is not a bit",
                c, i
            ))),
        })
        .collect()
}

/// Keeps only the '0'/'1' characters of free-form text.
pub fn sanitize_bits(s: &str) -> Vec<u8> {
    s.chars()
        .filter_map(|c| match c {
            '0' => Some(0),
            '1' => Some(1),
            _ => None,
        })
        .collect()
}

/// Renders bits as a '0'/'1' string.
pub fn bits_to_string(bits: &[u8]) -> String {
    bits.iter().map(|&b| if b == 0 { '0' } else { '1' }).collect()
}

/// Encodes `bits` with the code described by `generators`, starting from state 0.
pub fn encode(generators: &GeneratorSet, bits: &[u8]) -> Result<Vec<u8>> {
    let code = ConvolutionalCode::new(generators.clone());
    Ok(code.encode(bits)?.coded)
}

/// Creates the rate 1/2, K=3 (7,5) code
pub fn create_rate_half_code() -> ConvolutionalCode {
    ConvolutionalCode::new(GeneratorSet::rate_half_k3())
}

//! Hard- and soft-decision Viterbi decoding over a materialized trellis.
//!
//! The Viterbi algorithm finds the maximum-likelihood input sequence by
//! Add-Compare-Select (ACS): at each time step, every state keeps only the
//! incoming path with the smallest accumulated metric (its survivor). Hard
//! decisions score branches by Hamming distance against received bits, soft
//! decisions by squared Euclidean distance against received BPSK samples.
//!
//! Both variants share one engine, [`ViterbiDecoder`], parameterized by a
//! [`BranchMetric`] strategy. Every layer of the trellis is kept, including the
//! rejected candidates and each state's decoded-bit history, so a caller can
//! step through the decode after the fact without recomputing anything.
//!
//! Ties are broken deterministically: the candidate with the lowest source
//! state (then lowest input bit) wins, and at the end the lowest-index state
//! among equally good terminal states is chosen.

use crate::cs::ecc::convolutional::{validate_bits, ConvolutionalCode, GeneratorSet};
use crate::cs::ecc::metrics::{hamming_distance, squared_euclidean_distance, PathMetric};
use crate::cs::ecc::{Result, TrellisDecoder};
use crate::cs::error::Error;
use log::{debug, trace};
use std::fmt::Debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// How a received symbol group is scored against a candidate branch output.
pub trait BranchMetric: Send + Sync {
    /// One received value per coded bit
    type Sample: Copy + Debug + Send + Sync;
    /// Path metric type accumulated along the trellis
    type Metric: PathMetric;

    /// Rejects received values this metric cannot score.
    fn validate(&self, received: &[Self::Sample]) -> Result<()>;

    /// Cost of a branch emitting `output` when `received` was observed.
    fn branch_metric(&self, output: &[u8], received: &[Self::Sample]) -> Self::Metric;
}

/// Hamming distance between quantized (0/1) received bits and the branch output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardDecision;

impl BranchMetric for HardDecision {
    type Sample = u8;
    type Metric = u32;

    fn validate(&self, received: &[u8]) -> Result<()> {
        validate_bits(received)
    }

    fn branch_metric(&self, output: &[u8], received: &[u8]) -> u32 {
        hamming_distance(output, received)
    }
}

/// Squared Euclidean distance between real samples and the branch's BPSK symbols
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftDecision;

impl BranchMetric for SoftDecision {
    type Sample = f64;
    type Metric = f64;

    fn validate(&self, received: &[f64]) -> Result<()> {
        match received.iter().position(|x| !x.is_finite()) {
            Some(i) => Err(Error::InvalidInput(format!(
                "Sample {} is not finite ({})",
                i, received[i]
            ))),
            None => Ok(()),
        }
    }

    fn branch_metric(&self, output: &[u8], received: &[f64]) -> f64 {
        squared_euclidean_distance(received, output)
    }
}

/// A candidate transition into a state, as considered during ACS
#[derive(Debug, Clone, PartialEq)]
pub struct Branch<M> {
    /// Source state at the previous layer
    pub from: usize,
    /// Input bit of the transition
    pub input: u8,
    /// Output symbol of the transition
    pub output: Vec<u8>,
    /// Local branch metric
    pub branch_metric: M,
    /// Source path metric plus branch metric
    pub path_metric: M,
    /// Whether ACS kept this branch
    pub is_survivor: bool,
}

/// One state at one time step
#[derive(Debug, Clone, PartialEq)]
pub struct TrellisNode<M> {
    /// State index
    pub state: usize,
    /// Accumulated metric; [`PathMetric::UNREACHABLE`] when no path arrives
    pub metric: M,
    /// All candidates entering this state, in enumeration order
    pub incoming: Vec<Branch<M>>,
    /// Index into `incoming` of the survivor
    pub survivor: Option<usize>,
    /// Input bits along the survivor path from t = 0
    pub decoded: Vec<u8>,
}

impl<M: PathMetric> TrellisNode<M> {
    /// Survivor branch, if the state is reachable
    pub fn survivor_branch(&self) -> Option<&Branch<M>> {
        self.survivor.map(|i| &self.incoming[i])
    }
}

/// All states at one time step
#[derive(Debug, Clone, PartialEq)]
pub struct TrellisLayer<M> {
    /// Time index, 0 for the initial layer
    pub t: usize,
    /// Nodes indexed by state
    pub nodes: Vec<TrellisNode<M>>,
}

impl<M: PathMetric> TrellisLayer<M> {
    /// Layer 0: the encoder starts in state 0, every other state is unreachable.
    pub fn initial(num_states: usize) -> Self {
        let nodes = (0..num_states)
            .map(|state| TrellisNode {
                state,
                metric: if state == 0 {
                    M::zero()
                } else {
                    M::UNREACHABLE
                },
                incoming: Vec::new(),
                survivor: None,
                decoded: Vec::new(),
            })
            .collect();
        TrellisLayer { t: 0, nodes }
    }

    /// State with the smallest metric, lowest index on ties.
    ///
    /// Falls back to state 0 when nothing is reachable.
    pub fn best_state(&self) -> usize {
        let mut best = 0;
        for node in self.nodes.iter().skip(1) {
            if node.metric < self.nodes[best].metric {
                best = node.state;
            }
        }
        best
    }

    /// Metrics of all states, indexed by state
    pub fn metrics(&self) -> Vec<M> {
        self.nodes.iter().map(|n| n.metric).collect()
    }
}

/// States and inputs along the decoded path, recovered from survivor links
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPath {
    /// State at each time 0..=N; starts at 0
    pub states: Vec<usize>,
    /// Input bit of each transition 0..N
    pub inputs: Vec<u8>,
}

/// Everything produced by one Viterbi decode
#[derive(Debug, Clone)]
pub struct ViterbiOutput<M> {
    /// Trellis layers for t = 0..=N
    pub layers: Vec<TrellisLayer<M>>,
    /// Decoded information bits (including any termination tail)
    pub decoded: Vec<u8>,
    /// Survivor path of the best terminal state
    pub path: DecodedPath,
    /// Metric of the best terminal state
    pub final_metric: M,
}

/// Viterbi decoder for a convolutional code, generic over the branch metric
#[derive(Debug, Clone)]
pub struct ViterbiDecoder<D> {
    /// The convolutional code configuration
    code: ConvolutionalCode,
    /// Branch scoring strategy
    metric: D,
}

impl ViterbiDecoder<HardDecision> {
    /// Creates a hard-decision decoder
    pub fn hard(code: ConvolutionalCode) -> Self {
        Self::new(code, HardDecision)
    }
}

impl ViterbiDecoder<SoftDecision> {
    /// Creates a soft-decision decoder
    pub fn soft(code: ConvolutionalCode) -> Self {
        Self::new(code, SoftDecision)
    }
}

impl<D: BranchMetric> ViterbiDecoder<D> {
    /// Creates a decoder with an arbitrary branch metric
    pub fn new(code: ConvolutionalCode, metric: D) -> Self {
        Self { code, metric }
    }

    /// The code being decoded
    pub fn code(&self) -> &ConvolutionalCode {
        &self.code
    }

    /// Add-Compare-Select for a single destination state.
    fn acs(
        &self,
        layer: &TrellisLayer<D::Metric>,
        state: usize,
        received: &[D::Sample],
    ) -> TrellisNode<D::Metric> {
        let mut incoming: Vec<Branch<D::Metric>> = Vec::with_capacity(2);
        let mut survivor: Option<usize> = None;

        for (from, input) in self.code.predecessors(state) {
            let prev = layer.nodes[from].metric;
            if !prev.is_reachable() {
                continue;
            }

            let output = self.code.branch(from, input).output.clone();
            let branch_metric = self.metric.branch_metric(&output, received);
            let path_metric = prev + branch_metric;

            // Strict comparison keeps the first-enumerated candidate on ties
            let better = match survivor {
                Some(i) => path_metric < incoming[i].path_metric,
                None => true,
            };
            if better {
                survivor = Some(incoming.len());
            }

            incoming.push(Branch {
                from,
                input,
                output,
                branch_metric,
                path_metric,
                is_survivor: false,
            });
        }

        let (metric, decoded) = match survivor {
            Some(i) => {
                let winner = &mut incoming[i];
                winner.is_survivor = true;
                let mut decoded = layer.nodes[winner.from].decoded.clone();
                decoded.push(winner.input);
                (winner.path_metric, decoded)
            }
            None => (D::Metric::UNREACHABLE, Vec::new()),
        };

        TrellisNode {
            state,
            metric,
            incoming,
            survivor,
            decoded,
        }
    }

    /// ACS over every destination state; inputs are already validated.
    fn advance(
        &self,
        layer: &TrellisLayer<D::Metric>,
        received: &[D::Sample],
    ) -> TrellisLayer<D::Metric> {
        #[cfg(feature = "parallel")]
        let nodes = (0..self.code.num_states())
            .into_par_iter()
            .map(|state| self.acs(layer, state, received))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let nodes = (0..self.code.num_states())
            .map(|state| self.acs(layer, state, received))
            .collect();

        TrellisLayer {
            t: layer.t + 1,
            nodes,
        }
    }

    /// Advances a layer by one time step.
    ///
    /// # Arguments
    ///
    /// * `layer` - Layer at time t
    /// * `received` - The n received values for the transition t → t+1
    ///
    /// # Returns
    ///
    /// The layer at time t+1, or an error if `received` is not exactly n valid
    /// values or `layer` has the wrong number of states
    pub fn step(
        &self,
        layer: &TrellisLayer<D::Metric>,
        received: &[D::Sample],
    ) -> Result<TrellisLayer<D::Metric>> {
        let n = self.code.output_bits();
        if received.len() != n {
            return Err(Error::InputLength {
                len: received.len(),
                symbols_per_bit: n,
            });
        }
        if layer.nodes.len() != self.code.num_states() {
            return Err(Error::InvalidInput(format!(
                "Layer has {} states, code has {}",
                layer.nodes.len(),
                self.code.num_states()
            )));
        }
        self.metric.validate(received)?;

        Ok(self.advance(layer, received))
    }

    /// Decodes a complete received sequence.
    ///
    /// # Arguments
    ///
    /// * `received` - Received values; length must be a multiple of n
    ///
    /// # Returns
    ///
    /// All trellis layers, the decoded bits and the survivor path. An empty
    /// input decodes to an empty sequence.
    pub fn decode(&self, received: &[D::Sample]) -> Result<ViterbiOutput<D::Metric>> {
        let n = self.code.output_bits();
        if received.len() % n != 0 {
            return Err(Error::InputLength {
                len: received.len(),
                symbols_per_bit: n,
            });
        }
        self.metric.validate(received)?;

        let steps = received.len() / n;
        let mut layers = Vec::with_capacity(steps + 1);
        layers.push(TrellisLayer::initial(self.code.num_states()));

        for (t, group) in received.chunks_exact(n).enumerate() {
            let next = self.advance(&layers[t], group);
            trace!("viterbi step {}: metrics {:?}", t, next.metrics());
            layers.push(next);
        }

        let last = &layers[steps];
        let best = last.best_state();
        let final_metric = last.nodes[best].metric;
        let decoded = last.nodes[best].decoded.clone();
        let path = backtrace(&layers, best);

        debug!(
            "viterbi decoded {} steps over {} states, best terminal state {} with metric {:?}",
            steps,
            self.code.num_states(),
            best,
            final_metric
        );

        Ok(ViterbiOutput {
            layers,
            decoded,
            path,
            final_metric,
        })
    }
}

impl<D: BranchMetric> TrellisDecoder for ViterbiDecoder<D> {
    type Sample = D::Sample;
    type Layer = TrellisLayer<D::Metric>;
    type Output = ViterbiOutput<D::Metric>;

    fn initial_layer(&self) -> Self::Layer {
        TrellisLayer::initial(self.code.num_states())
    }

    fn step(&self, layer: &Self::Layer, received: &[Self::Sample]) -> Result<Self::Layer> {
        ViterbiDecoder::step(self, layer, received)
    }

    fn decode(&self, received: &[Self::Sample]) -> Result<Self::Output> {
        ViterbiDecoder::decode(self, received)
    }
}

/// Follows survivor links from `end_state` in the last layer back to layer 0.
fn backtrace<M: PathMetric>(layers: &[TrellisLayer<M>], end_state: usize) -> DecodedPath {
    let steps = layers.len() - 1;
    let mut states = vec![0; steps + 1];
    let mut inputs = vec![0; steps];

    let mut state = end_state;
    for t in (1..=steps).rev() {
        states[t] = state;
        match layers[t].nodes[state].survivor_branch() {
            Some(branch) => {
                inputs[t - 1] = branch.input;
                state = branch.from;
            }
            // Only reachable when no path exists at all; keep the zero fill
            None => break,
        }
    }

    DecodedPath { states, inputs }
}

/// Hard-decision Viterbi decoding of received bits.
pub fn hard_viterbi_decode(
    generators: &GeneratorSet,
    received: &[u8],
) -> Result<ViterbiOutput<u32>> {
    ViterbiDecoder::hard(ConvolutionalCode::new(generators.clone())).decode(received)
}

/// Soft-decision Viterbi decoding of received BPSK samples.
pub fn soft_viterbi_decode(
    generators: &GeneratorSet,
    received: &[f64],
) -> Result<ViterbiOutput<f64>> {
    ViterbiDecoder::soft(ConvolutionalCode::new(generators.clone())).decode(received)
}

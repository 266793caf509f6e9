//! Error correction code implementations.
//!
//! This module provides a rate 1/n convolutional code and three decoders that
//! work on its trellis:
//! - Hard-decision Viterbi (Hamming branch metric)
//! - Soft-decision Viterbi (squared Euclidean branch metric)
//! - BCJR / MAP (log-domain forward-backward, per-bit LLRs)
//!
//! together with a BPSK/AWGN channel for producing test samples.
//!
//! Every decoder computes the whole trellis up front and returns it, so a
//! caller can inspect or animate it layer by layer without re-running anything.
//!
//! # Examples
//!
//! ```rust
//! use trellis_fec::ecc::{hard_viterbi_decode, ConvolutionalCode, GeneratorSet};
//!
//! let generators: GeneratorSet = "111,101".parse()?;
//! let code = ConvolutionalCode::new(generators.clone());
//!
//! let bits = code.terminate(&[1, 1, 0, 1]);
//! let coded = code.encode(&bits)?.coded;
//!
//! let result = hard_viterbi_decode(&generators, &coded)?;
//! assert_eq!(result.decoded, bits);
//! # Ok::<(), trellis_fec::Error>(())
//! ```

pub use crate::cs::error::Result;

/// Trait for error correction code implementations
pub trait ErrorCorrection {
    /// Encode data with error correction symbols
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decode data and correct errors if possible
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// A decoder that walks a trellis one time step at a time.
///
/// `step` is a pure function of its arguments, so any layer can be recomputed
/// from the previous one; `decode` runs the whole sequence and returns every
/// intermediate table.
pub trait TrellisDecoder {
    /// One received value per coded bit
    type Sample;
    /// Per-time-step state carried between steps
    type Layer;
    /// Result of a full decode
    type Output;

    /// Layer at t = 0, with the encoder in state 0.
    fn initial_layer(&self) -> Self::Layer;

    /// Advances `layer` by one step using the n values received for that step.
    ///
    /// Fails if `received` does not hold exactly n valid values or `layer`
    /// does not match the code's state count.
    fn step(&self, layer: &Self::Layer, received: &[Self::Sample]) -> Result<Self::Layer>;

    /// Decodes a complete received sequence.
    fn decode(&self, received: &[Self::Sample]) -> Result<Self::Output>;
}

/// BCJR (MAP) decoding
pub mod bcjr;
/// BPSK/AWGN channel simulation
pub mod channel;
/// Convolutional code trellis model and encoder
pub mod convolutional;
/// Branch metrics and log-domain arithmetic
pub mod metrics;
/// Hard- and soft-decision Viterbi decoding
pub mod viterbi;

pub use bcjr::{bcjr_decode, BcjrDecoder, BcjrOutput};
pub use channel::{
    bpsk_modulate, error_count, hard_slice, noise_std_for_ebn0, simulate_channel, AwgnChannel,
};
pub use convolutional::{
    bits_to_string, create_rate_half_code, encode, parse_bits, sanitize_bits, ConvolutionalCode,
    EncoderStep, Encoding, GeneratorSet, Transition, TrellisEdge, MAX_CONSTRAINT_LENGTH,
    MIN_CONSTRAINT_LENGTH,
};
pub use metrics::{log_add, log_normalize, LOG_ZERO};
pub use viterbi::{
    hard_viterbi_decode, soft_viterbi_decode, Branch, BranchMetric, DecodedPath, HardDecision,
    SoftDecision, TrellisLayer, TrellisNode, ViterbiDecoder, ViterbiOutput,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cs::error::Error;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn test_generator_sets() -> Vec<GeneratorSet> {
        vec![
            GeneratorSet::new(&["11", "10"]).unwrap(),
            GeneratorSet::rate_half_k3(),
            GeneratorSet::rate_third_k3(),
            GeneratorSet::new(&["1101", "1111"]).unwrap(),
            GeneratorSet::rate_half_k5(),
            GeneratorSet::new(&["111101", "101011"]).unwrap(),
        ]
    }

    #[test]
    fn test_concrete_scenario() {
        let generators: GeneratorSet = "111,101".parse().unwrap();
        assert_eq!(generators.constraint_length(), 3);

        let bits = parse_bits("110100").unwrap();
        let coded = encode(&generators, &bits).unwrap();
        assert_eq!(bits_to_string(&coded), "110101001011");

        let result = hard_viterbi_decode(&generators, &coded).unwrap();
        assert_eq!(bits_to_string(&result.decoded), "110100");
    }

    #[test]
    fn test_noiseless_round_trip() {
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        for generators in test_generator_sets() {
            let code = ConvolutionalCode::new(generators.clone());
            for len in [0usize, 1, 5, 40, 200] {
                let info: Vec<u8> = (0..len).map(|_| rng.gen_range(0..=1)).collect();
                let bits = code.terminate(&info);
                let coded = encode(&generators, &bits).unwrap();

                let hard = hard_viterbi_decode(&generators, &coded).unwrap();
                assert_eq!(hard.decoded, bits, "hard, generators {}", generators);

                let samples = bpsk_modulate(&coded);
                let soft = soft_viterbi_decode(&generators, &samples).unwrap();
                assert_eq!(soft.decoded, bits, "soft, generators {}", generators);

                let map = bcjr_decode(&generators, &samples, true).unwrap();
                assert_eq!(map.decisions, bits, "bcjr, generators {}", generators);
            }
        }
    }

    #[test]
    fn test_soft_decisions_beat_hard_decisions() {
        let generators = GeneratorSet::rate_half_k3();
        let code = ConvolutionalCode::new(generators.clone());
        let channel = AwgnChannel::new(0.8).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(99);

        let mut hard_errors = 0;
        let mut soft_errors = 0;
        for _ in 0..300 {
            let info: Vec<u8> = (0..30).map(|_| rng.gen_range(0..=1)).collect();
            let bits = code.terminate(&info);
            let coded = code.encode(&bits).unwrap().coded;
            let samples = channel.transmit(&coded, &mut rng).unwrap();

            let hard = hard_viterbi_decode(&generators, &hard_slice(&samples)).unwrap();
            let soft = soft_viterbi_decode(&generators, &samples).unwrap();
            hard_errors += error_count(&hard.decoded, &bits);
            soft_errors += error_count(&soft.decoded, &bits);
        }

        assert!(hard_errors > 0, "channel too clean to compare decoders");
        assert!(
            soft_errors <= hard_errors,
            "soft {} > hard {}",
            soft_errors,
            hard_errors
        );
    }

    #[test]
    fn test_bcjr_agrees_with_viterbi_at_high_snr() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for generators in test_generator_sets() {
            let code = ConvolutionalCode::new(generators.clone());
            let info: Vec<u8> = (0..60).map(|_| rng.gen_range(0..=1)).collect();
            let bits = code.terminate(&info);
            let coded = code.encode(&bits).unwrap().coded;
            let samples = simulate_channel(&coded, 0.05, &mut rng).unwrap();

            let soft = soft_viterbi_decode(&generators, &samples).unwrap();
            let hard = hard_viterbi_decode(&generators, &hard_slice(&samples)).unwrap();
            for assume_termination in [true, false] {
                let map = bcjr_decode(&generators, &samples, assume_termination).unwrap();
                assert_eq!(map.decisions, soft.decoded);
                assert_eq!(map.decisions, hard.decoded);
            }
            assert_eq!(soft.decoded, bits);
        }
    }

    #[test]
    fn test_decoders_share_step_capability() {
        fn run<D: TrellisDecoder>(decoder: &D, received: &[D::Sample], n: usize) -> D::Layer {
            received
                .chunks(n)
                .try_fold(decoder.initial_layer(), |layer, group| {
                    decoder.step(&layer, group)
                })
                .unwrap()
        }

        let code = create_rate_half_code();
        let coded = code.encode(&[1, 0, 1, 1, 0, 0]).unwrap().coded;
        let samples = bpsk_modulate(&coded);

        let hard = ViterbiDecoder::hard(code.clone());
        let layer = run(&hard, &coded, 2);
        assert_eq!(layer, hard.decode(&coded).unwrap().layers[6]);

        let soft = ViterbiDecoder::soft(code.clone());
        let layer = run(&soft, &samples, 2);
        assert_eq!(layer.nodes[0].decoded, vec![1, 0, 1, 1, 0, 0]);

        let map = BcjrDecoder::new(code);
        let alpha = run(&map, &samples, 2);
        assert_eq!(alpha.len(), 4);
        assert!(alpha[0] > alpha[1]);
    }

    #[test]
    fn test_step_reports_bad_groups() {
        let code = create_rate_half_code();

        let hard = ViterbiDecoder::hard(code.clone());
        let initial = hard.initial_layer();
        assert_eq!(
            TrellisDecoder::step(&hard, &initial, &[1][..]).unwrap_err(),
            Error::InputLength {
                len: 1,
                symbols_per_bit: 2
            }
        );
        assert!(matches!(
            TrellisDecoder::step(&hard, &initial, &[2, 2][..]),
            Err(Error::InvalidInput(_))
        ));

        let soft = ViterbiDecoder::soft(code.clone());
        assert!(matches!(
            TrellisDecoder::step(&soft, &soft.initial_layer(), &[0.5, f64::NAN][..]),
            Err(Error::InvalidInput(_))
        ));

        let map = BcjrDecoder::new(code);
        assert!(matches!(
            TrellisDecoder::step(&map, &map.initial_layer(), &[0.5, 0.5, 0.5][..]),
            Err(Error::InputLength { .. })
        ));
        assert!(matches!(
            TrellisDecoder::step(&map, &vec![0.0; 2], &[0.5, 0.5][..]),
            Err(Error::InvalidInput(_))
        ));
    }
}

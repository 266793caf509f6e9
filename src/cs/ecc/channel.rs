//! BPSK modulation over an additive white Gaussian noise channel.
//!
//! Coded bits map to antipodal symbols (0 → +1, 1 → −1) and every symbol gets
//! independent zero-mean Gaussian noise. The random source is supplied by the
//! caller, so a seeded generator reproduces the same samples every time.

use crate::cs::ecc::convolutional::validate_bits;
use crate::cs::ecc::metrics::bpsk_symbol;
use crate::cs::ecc::Result;
use crate::cs::error::Error;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Additive white Gaussian noise channel with unit-energy BPSK symbols
#[derive(Debug, Clone, Copy)]
pub struct AwgnChannel {
    /// Noise standard deviation per real sample
    noise_std: f64,
    /// Sampler for the noise
    noise: Normal<f64>,
}

impl AwgnChannel {
    /// Creates a channel with the given noise standard deviation.
    ///
    /// # Arguments
    ///
    /// * `noise_std` - Standard deviation of the added noise; 0 gives a noiseless channel
    ///
    /// # Returns
    ///
    /// A new `AwgnChannel` or an error if `noise_std` is negative or not finite
    pub fn new(noise_std: f64) -> Result<Self> {
        if !noise_std.is_finite() || noise_std < 0.0 {
            return Err(Error::InvalidInput(format!(
                "Noise standard deviation must be finite and non-negative, got {}",
                noise_std
            )));
        }
        let noise = Normal::new(0.0, noise_std)
            .map_err(|e| Error::InvalidInput(format!("Bad noise distribution: {}", e)))?;
        Ok(AwgnChannel { noise_std, noise })
    }

    /// Creates a channel for a given Eb/N0 (in dB) and code rate.
    pub fn from_ebn0_db(ebn0_db: f64, code_rate: f64) -> Result<Self> {
        if !(code_rate > 0.0 && code_rate <= 1.0) {
            return Err(Error::InvalidInput(format!(
                "Code rate must be in (0, 1], got {}",
                code_rate
            )));
        }
        Self::new(noise_std_for_ebn0(ebn0_db, code_rate))
    }

    /// Noise standard deviation
    pub fn noise_std(&self) -> f64 {
        self.noise_std
    }

    /// Sends coded bits through the channel.
    ///
    /// # Arguments
    ///
    /// * `coded` - Coded bits, each 0 or 1
    /// * `rng` - Random source for the noise
    ///
    /// # Returns
    ///
    /// One real sample per coded bit
    pub fn transmit<R: Rng + ?Sized>(&self, coded: &[u8], rng: &mut R) -> Result<Vec<f64>> {
        validate_bits(coded)?;
        Ok(coded
            .iter()
            .map(|&bit| bpsk_symbol(bit) + self.noise.sample(rng))
            .collect())
    }
}

/// Maps coded bits to noiseless BPSK symbols.
pub fn bpsk_modulate(bits: &[u8]) -> Vec<f64> {
    bits.iter().map(|&bit| bpsk_symbol(bit)).collect()
}

/// Modulates `coded` and adds Gaussian noise with standard deviation `noise_std`.
pub fn simulate_channel<R: Rng + ?Sized>(
    coded: &[u8],
    noise_std: f64,
    rng: &mut R,
) -> Result<Vec<f64>> {
    AwgnChannel::new(noise_std)?.transmit(coded, rng)
}

/// Quantizes samples to bits: negative samples become 1, everything else 0.
pub fn hard_slice(samples: &[f64]) -> Vec<u8> {
    samples.iter().map(|&x| u8::from(x < 0.0)).collect()
}

/// Noise standard deviation for unit-energy BPSK at the given Eb/N0 (dB) and code rate.
///
/// Es = R·Eb, and the per-sample noise variance is N0/2.
pub fn noise_std_for_ebn0(ebn0_db: f64, code_rate: f64) -> f64 {
    let ebn0 = 10f64.powf(ebn0_db / 10.0);
    (1.0 / (2.0 * code_rate * ebn0)).sqrt()
}

/// Number of positions where two bit sequences differ, over their common length.
pub fn error_count(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).filter(|(x, y)| x != y).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_bpsk_modulate() {
        assert_eq!(bpsk_modulate(&[0, 1, 1, 0]), vec![1.0, -1.0, -1.0, 1.0]);
        assert!(bpsk_modulate(&[]).is_empty());
    }

    #[test]
    fn test_noiseless_channel() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let samples = simulate_channel(&[0, 1, 0], 0.0, &mut rng).unwrap();
        assert_eq!(samples, vec![1.0, -1.0, 1.0]);
    }

    #[test]
    fn test_channel_is_reproducible() {
        let coded = vec![0, 1, 1, 0, 1, 0, 0, 1];
        let a = simulate_channel(&coded, 0.7, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        let b = simulate_channel(&coded, 0.7, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        let c = simulate_channel(&coded, 0.7, &mut ChaCha8Rng::seed_from_u64(43)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_noise_statistics() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let coded = vec![0u8; 20_000];
        let samples = simulate_channel(&coded, 0.5, &mut rng).unwrap();

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let var =
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
        assert_abs_diff_eq!(mean, 1.0, epsilon = 0.02);
        assert_abs_diff_eq!(var.sqrt(), 0.5, epsilon = 0.02);
    }

    #[test]
    fn test_invalid_channel_parameters() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(simulate_channel(&[0, 1], -0.1, &mut rng).is_err());
        assert!(simulate_channel(&[0, 1], f64::NAN, &mut rng).is_err());
        assert!(simulate_channel(&[0, 2], 0.1, &mut rng).is_err());
        assert!(AwgnChannel::from_ebn0_db(3.0, 0.0).is_err());
    }

    #[test]
    fn test_hard_slice() {
        assert_eq!(hard_slice(&[0.9, -0.2, 0.0, -1.7]), vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_noise_std_for_ebn0() {
        // 0 dB at rate 1/2: variance 1
        assert_abs_diff_eq!(noise_std_for_ebn0(0.0, 0.5), 1.0, epsilon = 1e-12);
        let channel = AwgnChannel::from_ebn0_db(10.0, 1.0).unwrap();
        assert_abs_diff_eq!(channel.noise_std(), (0.05f64).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_error_count() {
        assert_eq!(error_count(&[1, 0, 1, 1], &[1, 1, 1, 0]), 2);
        assert_eq!(error_count(&[], &[1]), 0);
    }
}

//! Binary symmetric channel simulation.
//!
//! Every bit passing through the channel is flipped independently with a
//! fixed probability. The channel also keeps per-block tallies so callers can
//! tell how many 7-bit blocks took more than one hit, which the Hamming(7,4)
//! decoder cannot repair and cannot detect on its own.
//!
//! All randomness comes from an injected generator. [`NoisyChannel::with_seed`]
//! makes a pass fully reproducible.

use crate::cs::ecc::hamming::CODEWORD_BITS;
use crate::cs::ecc::{Bits, BitsRef, Result};
use crate::error::Error;
use log::{debug, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Number of bits per block the statistics are kept for
pub const BLOCK_BITS: usize = CODEWORD_BITS;

/// Counters gathered over one pass through the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelStatistics {
    /// Bits that went through the channel
    pub total_bits: usize,
    /// Bits that were inverted
    pub flipped_bits: usize,
    /// Blocks seen, including a trailing partial block
    pub blocks: usize,
    /// Blocks with at least one flipped bit
    pub corrupted_blocks: usize,
    /// Blocks with more than one flipped bit
    pub uncorrectable_blocks: usize,
}

impl ChannelStatistics {
    /// Fraction of bits that were flipped, or 0 for an empty pass.
    pub fn bit_error_rate(&self) -> f64 {
        if self.total_bits == 0 {
            0.0
        } else {
            self.flipped_bits as f64 / self.total_bits as f64
        }
    }

    /// Blocks with exactly one flipped bit.
    pub fn correctable_blocks(&self) -> usize {
        self.corrupted_blocks - self.uncorrectable_blocks
    }
}

/// A channel that flips each bit with probability `error_rate`.
#[derive(Debug, Clone)]
pub struct NoisyChannel<R = ChaCha20Rng> {
    rng: R,
}

impl NoisyChannel<ChaCha20Rng> {
    /// Create a channel seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    /// Create a channel whose flips are reproducible for a given seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl Default for NoisyChannel<ChaCha20Rng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> NoisyChannel<R> {
    /// Create a channel that draws from the given generator
    pub fn from_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Sends `bits` through the channel. The input is left untouched.
    ///
    /// # Arguments
    ///
    /// * `bits` - Transmitted bits, any length
    /// * `error_rate` - Probability that each bit is inverted, in `[0, 1]`
    ///
    /// # Returns
    ///
    /// The received bits and the pass statistics, tallied per 7-bit block.
    pub fn corrupt(
        &mut self,
        bits: &BitsRef,
        error_rate: f64,
    ) -> Result<(Bits, ChannelStatistics)> {
        validate_error_rate(error_rate)?;

        let mut noisy = bits.to_bitvec();
        let mut stats = ChannelStatistics {
            total_bits: noisy.len(),
            ..Default::default()
        };

        for block in noisy.chunks_mut(BLOCK_BITS) {
            let mut flips = 0;
            for mut bit in block.iter_mut() {
                let roll: f64 = self.rng.gen();
                if roll < error_rate {
                    let value = *bit;
                    *bit = !value;
                    flips += 1;
                }
            }

            stats.blocks += 1;
            stats.flipped_bits += flips;
            if flips > 0 {
                stats.corrupted_blocks += 1;
            }
            if flips > 1 {
                stats.uncorrectable_blocks += 1;
            }
        }

        debug!(
            "channel pass: {} of {} bits flipped (rate {}), {} of {} blocks corrupted",
            stats.flipped_bits, stats.total_bits, error_rate, stats.corrupted_blocks, stats.blocks
        );
        if stats.uncorrectable_blocks > 0 {
            warn!(
                "{} blocks took more than one bit error and will decode incorrectly",
                stats.uncorrectable_blocks
            );
        }

        Ok((noisy, stats))
    }
}

/// Checks that `error_rate` is a probability.
pub fn validate_error_rate(error_rate: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&error_rate) {
        return Err(Error::invalid_input(format!(
            "error rate must be within [0, 1], got {}",
            error_rate
        )));
    }
    Ok(())
}

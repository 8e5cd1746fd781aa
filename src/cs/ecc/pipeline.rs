//! End-to-end transmission of a payload through the Hamming(7,4) code and a
//! noisy channel.
//!
//! Each byte is split into its high and low nibble, each nibble becomes one
//! codeword, and the concatenated codewords cross the channel in a single
//! pass. The received bits are then decoded twice: once with single-error
//! correction and once without, so the effect of the code can be compared
//! against the raw damage done by the channel.
//!
//! # Examples
//!
//! ```
//! use hamming_channel::cs::ecc::channel::NoisyChannel;
//! use hamming_channel::cs::ecc::payload::Payload;
//! use hamming_channel::cs::ecc::pipeline::Pipeline;
//!
//! let payload = Payload::new(b"hello".to_vec());
//! let mut pipeline = Pipeline::new(NoisyChannel::with_seed(1));
//! let output = pipeline.run(&payload, 0.0).unwrap();
//! assert_eq!(output.corrected, payload);
//! assert_eq!(output.uncorrected, payload);
//! ```

use crate::cs::ecc::bits::{join_nibbles, split_byte, NIBBLE_BITS};
use crate::cs::ecc::channel::{validate_error_rate, ChannelStatistics, NoisyChannel};
use crate::cs::ecc::hamming::{HammingCodec, Symbol, CODEWORD_BITS};
use crate::cs::ecc::payload::Payload;
use crate::cs::ecc::{Bits, BitsRef, Result};
use crate::error::Error;
use bitvec::prelude::*;
use log::debug;
use rand::Rng;
use rand_chacha::ChaCha20Rng;

/// Channel bits carrying one payload byte
pub const BITS_PER_BYTE: usize = 2 * CODEWORD_BITS;

/// Parameters for a simulation run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// Per-bit flip probability of the channel
    pub error_rate: f64,
    /// Channel seed; `None` draws one from OS entropy
    pub seed: Option<u64>,
    /// Decode blocks on the rayon thread pool
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            error_rate: 0.01,
            seed: None,
            parallel: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        validate_error_rate(self.error_rate)
    }
}

/// Both reconstructions of a payload and the channel statistics that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Decoded with single-error correction
    pub corrected: Payload,
    /// Decoded from the received data bits as-is
    pub uncorrected: Payload,
    pub stats: ChannelStatistics,
    /// Blocks the correcting decoder flipped a bit in
    pub corrections: usize,
}

/// Byte-level damage of each reconstruction against the transmitted payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconstructionReport {
    pub total_bytes: usize,
    pub corrected_byte_errors: usize,
    pub uncorrected_byte_errors: usize,
}

impl PipelineOutput {
    /// Compares both reconstructions with the payload that was sent.
    pub fn report(&self, original: &Payload) -> ReconstructionReport {
        let mismatches = |received: &Payload| {
            original
                .bytes()
                .iter()
                .zip(received.bytes())
                .filter(|(a, b)| a != b)
                .count()
        };

        ReconstructionReport {
            total_bytes: original.len(),
            corrected_byte_errors: mismatches(&self.corrected),
            uncorrected_byte_errors: mismatches(&self.uncorrected),
        }
    }
}

/// Encodes every byte as its high-nibble codeword followed by its low-nibble codeword.
pub fn encode_payload(codec: &HammingCodec, bytes: &[u8]) -> Result<Bits> {
    let mut encoded = BitVec::with_capacity(bytes.len() * BITS_PER_BYTE);
    for &byte in bytes {
        let (high, low) = split_byte(byte)?;
        for nibble in [high, low] {
            let codeword = codec.encode(Symbol::from_bits(&nibble)?);
            encoded.extend_from_bitslice(&codeword.to_bits());
        }
    }
    Ok(encoded)
}

/// Rebuilds bytes from received codewords, two per byte.
///
/// Returns the bytes and the number of blocks that were corrected. The stream
/// must be a whole number of 14-bit byte frames.
pub fn decode_payload(
    codec: &HammingCodec,
    received: &BitsRef,
    correct_errors: bool,
    parallel: bool,
) -> Result<(Vec<u8>, usize)> {
    if received.len() % BITS_PER_BYTE != 0 {
        return Err(Error::MisalignedStream {
            len: received.len(),
            unit: BITS_PER_BYTE,
        });
    }

    let decoded = codec.decode_stream(received, correct_errors, parallel)?;
    let bytes = decoded
        .bits
        .chunks_exact(2 * NIBBLE_BITS)
        .map(|pair| join_nibbles(&pair[..NIBBLE_BITS], &pair[NIBBLE_BITS..]))
        .collect::<Result<Vec<u8>>>()?;

    Ok((bytes, decoded.corrected_blocks))
}

/// Drives payloads through encode, channel and both decodes.
#[derive(Debug, Clone)]
pub struct Pipeline<R = ChaCha20Rng> {
    codec: HammingCodec,
    channel: NoisyChannel<R>,
    parallel: bool,
}

impl Pipeline<ChaCha20Rng> {
    /// Builds a pipeline from a validated config.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let channel = match config.seed {
            Some(seed) => NoisyChannel::with_seed(seed),
            None => NoisyChannel::new(),
        };
        Ok(Pipeline::new(channel).parallel(config.parallel))
    }
}

impl<R: Rng> Pipeline<R> {
    pub fn new(channel: NoisyChannel<R>) -> Self {
        Self {
            codec: HammingCodec::new(),
            channel,
            parallel: false,
        }
    }

    /// Decode blocks concurrently. Results do not depend on this setting.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sends `payload` through the channel once and decodes the received bits
    /// with and without correction.
    ///
    /// # Arguments
    ///
    /// * `payload` - Bytes to transmit, 14 channel bits each
    /// * `error_rate` - Per-bit flip probability in `[0, 1]`
    ///
    /// # Returns
    ///
    /// Both reconstructions, reshaped like `payload`, with the channel
    /// statistics and the number of blocks the decoder corrected. Fails with
    /// `InvalidInput` before any work if `error_rate` is not a probability.
    pub fn run(&mut self, payload: &Payload, error_rate: f64) -> Result<PipelineOutput> {
        validate_error_rate(error_rate)?;

        let encoded = encode_payload(&self.codec, payload.bytes())?;
        debug!(
            "encoded {} bytes into {} channel bits",
            payload.len(),
            encoded.len()
        );

        let (received, stats) = self.channel.corrupt(&encoded, error_rate)?;

        let (corrected, corrections) =
            decode_payload(&self.codec, &received, true, self.parallel)?;
        let (uncorrected, _) = decode_payload(&self.codec, &received, false, self.parallel)?;
        debug!(
            "decoded {} bytes, {} blocks corrected",
            corrected.len(),
            corrections
        );

        Ok(PipelineOutput {
            corrected: payload.reshaped(corrected),
            uncorrected: payload.reshaped(uncorrected),
            stats,
            corrections,
        })
    }
}

/// Runs one transmission of `payload` over a channel drawing from `rng`.
pub fn run_pipeline<R: Rng>(payload: &Payload, error_rate: f64, rng: R) -> Result<PipelineOutput> {
    Pipeline::new(NoisyChannel::from_rng(rng)).run(payload, error_rate)
}

/// Runs one transmission of `payload` as described by `config`.
pub fn simulate(payload: &Payload, config: &PipelineConfig) -> Result<PipelineOutput> {
    Pipeline::from_config(config)?.run(payload, config.error_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cs::ecc::payload::{Dimensions, PayloadSource, PlaceholderSource};
    use rand::SeedableRng;

    fn all_bytes() -> Payload {
        Payload::new((0..=255u8).collect())
    }

    #[test]
    fn test_roundtrip_without_noise() {
        for payload in [
            Payload::default(),
            Payload::new(vec![0x00]),
            Payload::new(b"Hamming(7,4) over a clean channel".to_vec()),
            all_bytes(),
        ] {
            let output = run_pipeline(&payload, 0.0, ChaCha20Rng::seed_from_u64(3)).unwrap();
            assert_eq!(output.corrected, payload);
            assert_eq!(output.uncorrected, payload);
            assert_eq!(output.corrections, 0);
            assert_eq!(output.stats.flipped_bits, 0);
            assert_eq!(output.stats.total_bits, payload.len() * BITS_PER_BYTE);
        }
    }

    #[test]
    fn test_codeword_layout_per_byte() {
        let codec = HammingCodec::new();
        // 0xB0: high nibble 1011, low nibble 0000
        let encoded = encode_payload(&codec, &[0xB0]).unwrap();
        assert_eq!(
            encoded,
            bits![u8, Msb0; 0, 1, 1, 0, 0, 1, 1, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_dimensions_survive() {
        let image = PlaceholderSource::new(6, 4).load().unwrap();
        let mut pipeline = Pipeline::new(NoisyChannel::with_seed(11));
        let output = pipeline.run(&image, 0.02).unwrap();

        let dims = Some(Dimensions::new(6, 4, 3).unwrap());
        assert_eq!(output.corrected.dimensions(), dims);
        assert_eq!(output.uncorrected.dimensions(), dims);
        assert_eq!(output.corrected.len(), image.len());
    }

    #[test]
    fn test_correction_never_worse_with_single_errors() {
        // Exactly one flip in every block is always repaired
        let codec = HammingCodec::new();
        let payload = all_bytes();
        let mut received = encode_payload(&codec, payload.bytes()).unwrap();
        for block in 0..received.len() / CODEWORD_BITS {
            let index = block * CODEWORD_BITS + (block * 3) % CODEWORD_BITS;
            let bit = received[index];
            received.set(index, !bit);
        }

        let (corrected, corrections) = decode_payload(&codec, &received, true, false).unwrap();
        assert_eq!(corrected, payload.bytes());
        assert_eq!(corrections, 512);

        let (uncorrected, none) = decode_payload(&codec, &received, false, true).unwrap();
        assert_eq!(none, 0);
        assert_ne!(uncorrected, payload.bytes());
    }

    #[test]
    fn test_corrected_matches_statistics() {
        let payload = Payload::new(b"The quick brown fox jumps over the lazy dog".repeat(20));
        let mut pipeline = Pipeline::new(NoisyChannel::with_seed(2024));
        let output = pipeline.run(&payload, 0.05).unwrap();
        let report = output.report(&payload);

        assert!(output.stats.flipped_bits > 0);
        assert_eq!(report.total_bytes, payload.len());
        // Single-flip blocks always decode correctly, so corrected-path damage
        // can only come from blocks the channel hit more than once
        assert!(report.corrected_byte_errors <= output.stats.uncorrectable_blocks);
        // Every single-flip block has a nonzero syndrome; heavier damage may not
        assert!(output.corrections >= output.stats.correctable_blocks());
        assert!(output.corrections <= output.stats.corrupted_blocks);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let payload = all_bytes();
        let sequential = Pipeline::new(NoisyChannel::with_seed(8))
            .run(&payload, 0.1)
            .unwrap();
        let parallel = Pipeline::new(NoisyChannel::with_seed(8))
            .parallel(true)
            .run(&payload, 0.1)
            .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_seeded_simulation_is_reproducible() {
        let payload = all_bytes();
        let config = PipelineConfig {
            error_rate: 0.05,
            seed: Some(77),
            parallel: false,
        };
        assert_eq!(
            simulate(&payload, &config).unwrap(),
            simulate(&payload, &config).unwrap()
        );
    }

    #[test]
    fn test_misaligned_stream_rejected() {
        let codec = HammingCodec::new();
        let bits = bitvec![u8, Msb0; 0; 21];
        assert!(matches!(
            decode_payload(&codec, &bits, true, false),
            Err(Error::MisalignedStream { len: 21, unit: 14 })
        ));
    }

    #[test]
    fn test_invalid_config() {
        let config = PipelineConfig {
            error_rate: 2.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(Pipeline::from_config(&config).is_err());

        let mut pipeline = Pipeline::new(NoisyChannel::with_seed(1));
        assert!(pipeline.run(&all_bytes(), -0.5).is_err());
    }
}

//! Error correction code implementations.
//!
//! This module provides the Hamming(7,4) single-error-correcting code applied to
//! byte streams, together with a simulated noisy channel to exercise it:
//! - `bits`: integer and nibble conversions on big-endian bit sequences
//! - `hamming`: the (7,4) codec and its syndrome decoding
//! - `channel`: independent per-bit error injection with block statistics
//! - `pipeline`: payload → codewords → channel → both reconstructions
//! - `payload`: payloads and the file/placeholder collaborators around them
//!
//! # Examples
//!
//! ```rust
//! use hamming_channel::cs::ecc::payload::Payload;
//! use hamming_channel::cs::ecc::pipeline::{simulate, PipelineConfig};
//!
//! let payload = Payload::new(b"noisy channel".to_vec());
//! let config = PipelineConfig {
//!     error_rate: 0.02,
//!     seed: Some(7),
//!     ..Default::default()
//! };
//! let output = simulate(&payload, &config).unwrap();
//! assert_eq!(output.corrected.len(), payload.len());
//! ```

use bitvec::prelude::{BitSlice, BitVec, Msb0};

pub use crate::error::Result;

/// Owned bit sequence, most significant bit first
pub type Bits = BitVec<u8, Msb0>;

/// Borrowed bit sequence, most significant bit first
pub type BitsRef = BitSlice<u8, Msb0>;

/// Trait for error correction code implementations
pub trait ErrorCorrection {
    /// Encode data with error correction symbols
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decode data and correct errors if possible
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>>;
}

pub mod bits;
pub mod channel;
pub mod hamming;
pub mod payload;
pub mod pipeline;

pub use channel::{ChannelStatistics, NoisyChannel};
pub use hamming::{Codeword, DecodeOutcome, HammingCodec, Symbol, Syndrome};
pub use payload::{Dimensions, Payload, PayloadSink, PayloadSource};
pub use pipeline::{run_pipeline, simulate, Pipeline, PipelineConfig, PipelineOutput};

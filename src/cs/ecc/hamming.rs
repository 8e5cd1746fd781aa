//! Hamming(7,4) error correction code implementation.
//!
//! Hamming codes are a family of linear error-correcting codes developed by Richard Hamming in 1950.
//! The (7,4) code encodes 4 data bits into 7 bits by adding 3 parity bits, and can correct any
//! single flipped bit in a block. Two flipped bits in the same block produce a nonzero syndrome
//! that points at a third position, so the decoder silently miscorrects; nothing in the block
//! distinguishes that case from a genuine single-bit repair.
//!
//! Codeword layout (1-based positions):
//!
//! ```text
//!   position:  1   2   3   4   5   6   7
//!   bit:       p1  p2  d1  p3  d2  d3  d4
//! ```
//!
//! Parity bit `p_k` sits at position `2^(k-1)` and covers every position whose binary index has
//! bit `k-1` set, which is what makes the syndrome equal to the position of a single error.
//!
//! # Examples
//!
//! ```
//! use hamming_channel::cs::ecc::hamming::{HammingCodec, Symbol};
//!
//! let codec = HammingCodec::new();
//! let symbol = Symbol::new([true, false, true, true]);
//! let codeword = codec.encode(symbol);
//!
//! let received = codeword.with_flipped(3).unwrap();
//! let outcome = codec.decode(received, true);
//! assert_eq!(outcome.symbol, symbol);
//! assert!(outcome.corrected);
//! ```

use crate::cs::ecc::{Bits, BitsRef, ErrorCorrection, Result};
use crate::error::Error;
use bitvec::prelude::*;
use log::trace;
use rayon::prelude::*;

/// Number of data bits per block
pub const DATA_BITS: usize = 4;

/// Number of bits in an encoded block
pub const CODEWORD_BITS: usize = 7;

/// Codeword indices (0-based) checked by each syndrome bit s1, s2, s3.
/// The first index of every row is the parity bit the check is anchored on.
const PARITY_CHECKS: [[usize; 4]; 3] = [[0, 2, 4, 6], [1, 2, 5, 6], [3, 4, 5, 6]];

/// Codeword indices (0-based) of d1..d4
const DATA_POSITIONS: [usize; DATA_BITS] = [2, 4, 5, 6];

/// Codeword index (0-based) presumed flipped for each syndrome value
const SYNDROME_POSITIONS: [Option<usize>; 8] = [
    None,
    Some(0),
    Some(1),
    Some(2),
    Some(3),
    Some(4),
    Some(5),
    Some(6),
];

/// Four data bits, most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Symbol([bool; DATA_BITS]);

impl Symbol {
    pub fn new(bits: [bool; DATA_BITS]) -> Self {
        Symbol(bits)
    }

    /// Builds a symbol from a bit sequence that must hold exactly 4 bits.
    pub fn from_bits(bits: &BitsRef) -> Result<Self> {
        if bits.len() != DATA_BITS {
            return Err(Error::InvalidLength {
                what: "symbol",
                expected: DATA_BITS,
                actual: bits.len(),
            });
        }

        let mut out = [false; DATA_BITS];
        for (slot, bit) in out.iter_mut().zip(bits.iter().by_vals()) {
            *slot = bit;
        }
        Ok(Symbol(out))
    }

    pub fn bits(&self) -> [bool; DATA_BITS] {
        self.0
    }

    pub fn to_bits(&self) -> Bits {
        self.0.iter().copied().collect()
    }
}

/// Seven received or transmitted bits in `[p1, p2, d1, p3, d2, d3, d4]` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Codeword([bool; CODEWORD_BITS]);

impl Codeword {
    pub fn new(bits: [bool; CODEWORD_BITS]) -> Self {
        Codeword(bits)
    }

    /// Builds a codeword from a bit sequence that must hold exactly 7 bits.
    pub fn from_bits(bits: &BitsRef) -> Result<Self> {
        if bits.len() != CODEWORD_BITS {
            return Err(Error::InvalidLength {
                what: "codeword",
                expected: CODEWORD_BITS,
                actual: bits.len(),
            });
        }

        let mut out = [false; CODEWORD_BITS];
        for (slot, bit) in out.iter_mut().zip(bits.iter().by_vals()) {
            *slot = bit;
        }
        Ok(Codeword(out))
    }

    pub fn bits(&self) -> [bool; CODEWORD_BITS] {
        self.0
    }

    pub fn to_bits(&self) -> Bits {
        self.0.iter().copied().collect()
    }

    /// Returns a copy with the bit at 1-based `position` inverted.
    pub fn with_flipped(&self, position: usize) -> Result<Self> {
        if !(1..=CODEWORD_BITS).contains(&position) {
            return Err(Error::invalid_input(format!(
                "codeword position {} outside 1..={}",
                position, CODEWORD_BITS
            )));
        }

        let mut bits = self.0;
        bits[position - 1] = !bits[position - 1];
        Ok(Codeword(bits))
    }

    fn data(&self) -> Symbol {
        Symbol(DATA_POSITIONS.map(|i| self.0[i]))
    }
}

/// The 3-bit parity-check result `(s3, s2, s1)` of a received codeword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Syndrome(u8);

impl Syndrome {
    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// The 1-based codeword position a nonzero syndrome points at.
    pub fn error_position(&self) -> Option<usize> {
        SYNDROME_POSITIONS[self.0 as usize].map(|index| index + 1)
    }
}

/// Result of decoding one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOutcome {
    pub symbol: Symbol,
    /// Whether a bit was flipped before extracting the data bits
    pub corrected: bool,
    pub syndrome: Syndrome,
}

/// Bits recovered from a stream of codewords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDecode {
    pub bits: Bits,
    /// Number of blocks the decoder flipped a bit in
    pub corrected_blocks: usize,
}

/// The (7,4) Hamming codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct HammingCodec;

impl HammingCodec {
    pub fn new() -> Self {
        HammingCodec
    }

    /// Encodes four data bits into a codeword.
    pub fn encode(&self, symbol: Symbol) -> Codeword {
        let mut bits = [false; CODEWORD_BITS];
        for (&index, &bit) in DATA_POSITIONS.iter().zip(symbol.0.iter()) {
            bits[index] = bit;
        }

        // Each parity bit makes its check row sum to zero
        for check in PARITY_CHECKS.iter() {
            let parity = check[1..].iter().fold(false, |acc, &i| acc ^ bits[i]);
            bits[check[0]] = parity;
        }

        Codeword(bits)
    }

    /// Recomputes the parity checks of a received codeword.
    pub fn syndrome(&self, codeword: &Codeword) -> Syndrome {
        let value = PARITY_CHECKS
            .iter()
            .enumerate()
            .fold(0u8, |acc, (k, check)| {
                let failed = check.iter().fold(false, |acc, &i| acc ^ codeword.0[i]);
                acc | ((failed as u8) << k)
            });
        Syndrome(value)
    }

    /// Decodes a codeword, flipping the bit the syndrome points at when
    /// `correct_errors` is set.
    ///
    /// # Arguments
    ///
    /// * `codeword` - The received 7-bit block
    /// * `correct_errors` - Whether to act on a nonzero syndrome
    ///
    /// # Returns
    ///
    /// The recovered symbol, whether a bit was flipped, and the syndrome. With
    /// `correct_errors` unset the data bits are extracted as received and
    /// `corrected` is always false. Two or more errors in one block are
    /// miscorrected without notice.
    pub fn decode(&self, codeword: Codeword, correct_errors: bool) -> DecodeOutcome {
        let syndrome = self.syndrome(&codeword);

        let mut received = codeword;
        let mut corrected = false;
        if correct_errors {
            if let Some(index) = SYNDROME_POSITIONS[syndrome.0 as usize] {
                received.0[index] = !received.0[index];
                corrected = true;
            }
        }

        DecodeOutcome {
            symbol: received.data(),
            corrected,
            syndrome,
        }
    }

    /// Encodes a data bit stream whose length is a multiple of 4.
    pub fn encode_stream(&self, data: &BitsRef) -> Result<Bits> {
        if data.len() % DATA_BITS != 0 {
            return Err(Error::MisalignedStream {
                len: data.len(),
                unit: DATA_BITS,
            });
        }

        let mut encoded = BitVec::with_capacity(data.len() / DATA_BITS * CODEWORD_BITS);
        for chunk in data.chunks_exact(DATA_BITS) {
            let codeword = self.encode(Symbol::from_bits(chunk)?);
            encoded.extend(codeword.0.iter().copied());
        }
        Ok(encoded)
    }

    /// Decodes a codeword stream whose length is a multiple of 7.
    ///
    /// With `parallel` set, blocks are decoded on the rayon thread pool; the
    /// output is identical to the sequential path.
    pub fn decode_stream(
        &self,
        encoded: &BitsRef,
        correct_errors: bool,
        parallel: bool,
    ) -> Result<StreamDecode> {
        if encoded.len() % CODEWORD_BITS != 0 {
            return Err(Error::MisalignedStream {
                len: encoded.len(),
                unit: CODEWORD_BITS,
            });
        }

        let codewords = encoded
            .chunks_exact(CODEWORD_BITS)
            .map(Codeword::from_bits)
            .collect::<Result<Vec<_>>>()?;

        let outcomes: Vec<DecodeOutcome> = if parallel {
            codewords
                .par_iter()
                .map(|&codeword| self.decode(codeword, correct_errors))
                .collect()
        } else {
            codewords
                .iter()
                .map(|&codeword| self.decode(codeword, correct_errors))
                .collect()
        };

        let mut bits = BitVec::with_capacity(outcomes.len() * DATA_BITS);
        let mut corrected_blocks = 0;
        for (block, outcome) in outcomes.iter().enumerate() {
            if outcome.corrected {
                corrected_blocks += 1;
                trace!(
                    "block {}: syndrome {} corrected",
                    block,
                    outcome.syndrome.value()
                );
            }
            bits.extend(outcome.symbol.0.iter().copied());
        }

        Ok(StreamDecode {
            bits,
            corrected_blocks,
        })
    }
}

impl ErrorCorrection for HammingCodec {
    /// Encodes every byte as two codewords, packed most significant bit first
    /// and zero-padded to a whole byte.
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoded = self.encode_stream(data.view_bits::<Msb0>())?;
        encoded.set_uninitialized(false);
        Ok(encoded.into_vec())
    }

    /// Inverse of [`ErrorCorrection::encode`], correcting one error per block.
    ///
    /// Trailing bits that [`ErrorCorrection::encode`] could not have produced,
    /// a whole spare byte or a set padding bit, are a `MisalignedStream`.
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        const BLOCK_PAIR: usize = 2 * CODEWORD_BITS;

        let bits = data.view_bits::<Msb0>();
        let usable = bits.len() / BLOCK_PAIR * BLOCK_PAIR;
        let padding = &bits[usable..];
        if padding.len() >= u8::BITS as usize || padding.any() {
            return Err(Error::MisalignedStream {
                len: bits.len(),
                unit: BLOCK_PAIR,
            });
        }

        let decoded = self.decode_stream(&bits[..usable], true, false)?;
        Ok(decoded.bits.into_vec())
    }
}

//! Conversions between unsigned integers and big-endian bit sequences.
//!
//! Bits are stored most-significant first (`Msb0`), so the bit at index 0 of a
//! sequence is the highest-order bit of the value it represents.
//!
//! # Examples
//!
//! ```
//! use hamming_channel::cs::ecc::bits::{bits_to_integer, integer_to_bits};
//!
//! let bits = integer_to_bits(0b1011, 4).unwrap();
//! assert_eq!(bits_to_integer(&bits).unwrap(), 11);
//! ```

use crate::cs::ecc::{Bits, BitsRef, Result};
use crate::error::Error;
use bitvec::prelude::*;

/// Width of one nibble in bits
pub const NIBBLE_BITS: usize = 4;

/// Interprets `bits` as a big-endian binary number.
///
/// An empty sequence is 0. Sequences longer than 64 bits are rejected since
/// the result would not fit in a `u64`.
pub fn bits_to_integer(bits: &BitsRef) -> Result<u64> {
    if bits.len() > u64::BITS as usize {
        return Err(Error::InvalidLength {
            what: "integer",
            expected: u64::BITS as usize,
            actual: bits.len(),
        });
    }

    Ok(bits
        .iter()
        .by_vals()
        .fold(0u64, |acc, bit| (acc << 1) | bit as u64))
}

/// Renders `value` as exactly `width` bits, most significant first, padded
/// with leading zeros.
///
/// Fails if `width` is zero or `value >= 2^width`; the value is never
/// truncated.
pub fn integer_to_bits(value: u64, width: usize) -> Result<Bits> {
    if width == 0 {
        return Err(Error::invalid_input("bit width must be positive"));
    }
    if width < u64::BITS as usize && value >> width != 0 {
        return Err(Error::ValueOutOfRange { value, width });
    }

    let mut bits = bitvec![u8, Msb0; 0; width];
    for (i, mut bit) in bits.iter_mut().enumerate() {
        let shift = width - 1 - i;
        *bit = shift < u64::BITS as usize && (value >> shift) & 1 == 1;
    }
    Ok(bits)
}

/// Splits a byte into its high and low nibbles, in that order.
pub fn split_byte(byte: u8) -> Result<(Bits, Bits)> {
    let high = integer_to_bits(u64::from(byte >> 4), NIBBLE_BITS)?;
    let low = integer_to_bits(u64::from(byte & 0x0F), NIBBLE_BITS)?;
    Ok((high, low))
}

/// Reassembles a byte as `(high << 4) | low` from two 4-bit sequences.
pub fn join_nibbles(high: &BitsRef, low: &BitsRef) -> Result<u8> {
    for nibble in [high, low] {
        if nibble.len() != NIBBLE_BITS {
            return Err(Error::InvalidLength {
                what: "nibble",
                expected: NIBBLE_BITS,
                actual: nibble.len(),
            });
        }
    }

    let high = bits_to_integer(high)? as u8;
    let low = bits_to_integer(low)? as u8;
    Ok((high << 4) | low)
}

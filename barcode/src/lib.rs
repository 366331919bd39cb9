//! Crate for encoding and error-correcting nucleotide barcodes.
//!
//! Barcodes are short nucleotide sequences that are codewords of a binary
//! linear block code, written at two bits per nucleotide. This crate holds the
//! GF(2) machinery (`codec`), the two standard codes (`golay`, `hamming`) and
//! the `CorrectBarcode` strategies used to pull an observed barcode back onto
//! a codeword.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitXor, BitXorAssign};
use thiserror::Error;

pub mod codec;
pub mod corrector;
pub mod golay;
pub mod hamming;

pub use codec::{make_k_bit_errors, LinearCode, NucleotideCode, SyndromeTable};
pub use corrector::{CorrectBarcode, Decoded, NoCorrection};

/// The longest bit vector supported by `Bits`.
pub const MAX_BITS: usize = u32::BITS as usize;

/// Errors raised by the codec. All of them indicate malformed input or a
/// malformed code, never an uncorrectable barcode.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("expected a vector of {expected} symbols, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("unrecognized nucleotide '{0}'")]
    InvalidSymbol(char),
    #[error("bits must be 0 or 1, got {0}")]
    InvalidBit(u8),
    #[error("bit vectors are limited to 32 bits, got {0}")]
    TooLong(usize),
    #[error("generator and parity-check matrices disagree: {0}")]
    BadDimensions(String),
    #[error("generator matrix is not orthogonal to the parity-check matrix (G.H^T != 0 mod 2)")]
    NotOrthogonal,
    #[error("nucleotide encoding must map A, C, G and T onto distinct 2-bit values")]
    BadEncoding,
}

/* ---------------------------------------------------------------------------------------------- */
/// A vector over GF(2) of at most 32 bits, packed into a `u32`.
///
/// Index 0 is the leftmost bit, i.e. the most significant of the `len` low
/// bits of the packed word. This matches the order in which a barcode is
/// read: the first nucleotide contributes bits 0 and 1.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Bits {
    word: u32,
    len: u8,
}

impl Bits {
    /// The all-zero vector of length `len`.
    pub fn zeros(len: usize) -> Self {
        assert!(len <= MAX_BITS);
        Bits {
            word: 0,
            len: len as u8,
        }
    }

    /// Build from a packed word, discarding anything above the low `len` bits.
    pub fn from_word(word: u32, len: usize) -> Self {
        assert!(len <= MAX_BITS);
        Bits {
            word: word & mask(len),
            len: len as u8,
        }
    }

    /// Build from a slice of 0/1 values.
    pub fn from_slice(bits: &[u8]) -> Result<Self, CodecError> {
        if bits.len() > MAX_BITS {
            return Err(CodecError::TooLong(bits.len()));
        }
        let mut word = 0u32;
        for &b in bits {
            if b > 1 {
                return Err(CodecError::InvalidBit(b));
            }
            word = (word << 1) | u32::from(b);
        }
        Ok(Bits {
            word,
            len: bits.len() as u8,
        })
    }

    /// A vector of length `len` with exactly the bits at `positions` set.
    pub fn with_ones(len: usize, positions: impl IntoIterator<Item = usize>) -> Self {
        let mut v = Bits::zeros(len);
        for p in positions {
            v.set(p, true);
        }
        v
    }

    pub fn len(self) -> usize {
        self.len as usize
    }

    pub fn is_empty(self) -> bool {
        self.len == 0
    }

    pub fn word(self) -> u32 {
        self.word
    }

    fn shift(self, i: usize) -> u32 {
        assert!(i < self.len(), "bit {i} out of range for length {}", self.len);
        (self.len() - 1 - i) as u32
    }

    pub fn get(self, i: usize) -> bool {
        (self.word >> self.shift(i)) & 1 == 1
    }

    pub fn set(&mut self, i: usize, value: bool) {
        let s = self.shift(i);
        if value {
            self.word |= 1 << s;
        } else {
            self.word &= !(1 << s);
        }
    }

    pub fn flip(&mut self, i: usize) {
        self.word ^= 1 << self.shift(i);
    }

    /// Hamming weight.
    pub fn weight(self) -> usize {
        self.word.count_ones() as usize
    }

    /// Inner product over GF(2).
    pub fn dot(self, other: Bits) -> bool {
        (self.word & other.word).count_ones() % 2 == 1
    }

    pub fn iter(self) -> impl Iterator<Item = bool> {
        (0..self.len()).map(move |i| self.get(i))
    }

    pub fn to_vec(self) -> Vec<u8> {
        self.iter().map(u8::from).collect()
    }
}

fn mask(len: usize) -> u32 {
    if len == MAX_BITS {
        u32::MAX
    } else {
        (1u32 << len) - 1
    }
}

impl BitXor for Bits {
    type Output = Bits;

    fn bitxor(self, rhs: Bits) -> Bits {
        assert_eq!(self.len, rhs.len);
        Bits {
            word: self.word ^ rhs.word,
            len: self.len,
        }
    }
}

impl BitXorAssign for Bits {
    fn bitxor_assign(&mut self, rhs: Bits) {
        *self = *self ^ rhs;
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.iter() {
            f.write_str(if b { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/* ---------------------------------------------------------------------------------------------- */
/// Mapping between nucleotides and 2-bit values.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct NtEncoding {
    /// 2-bit value for A, C, G, T in that order.
    bits: [u8; 4],
}

pub(crate) const BASE_OPTS: [u8; 4] = [b'A', b'C', b'G', b'T'];

impl Default for NtEncoding {
    /// A=11, C=00, G=01, T=10
    fn default() -> Self {
        NtEncoding {
            bits: [0b11, 0b00, 0b01, 0b10],
        }
    }
}

impl NtEncoding {
    /// Build an encoding from the 2-bit values of A, C, G and T.
    pub fn new(a: u8, c: u8, g: u8, t: u8) -> Result<Self, CodecError> {
        let bits = [a, c, g, t];
        let mut seen = [false; 4];
        for &b in &bits {
            if b > 3 || seen[b as usize] {
                return Err(CodecError::BadEncoding);
            }
            seen[b as usize] = true;
        }
        Ok(NtEncoding { bits })
    }

    pub fn bits_of(&self, nt: u8) -> Result<u8, CodecError> {
        BASE_OPTS
            .iter()
            .position(|&b| b == nt)
            .map(|i| self.bits[i])
            .ok_or(CodecError::InvalidSymbol(nt as char))
    }

    pub fn nt_of(&self, bits: u8) -> u8 {
        let i = self
            .bits
            .iter()
            .position(|&b| b == bits & 0b11)
            .expect("encoding is a bijection");
        BASE_OPTS[i]
    }

    /// Concatenate the 2-bit codes of every nucleotide in `seq`.
    pub fn seq_to_bits(&self, seq: &[u8]) -> Result<Bits, CodecError> {
        if 2 * seq.len() > MAX_BITS {
            return Err(CodecError::TooLong(2 * seq.len()));
        }
        let mut word = 0u32;
        for &nt in seq {
            word = (word << 2) | u32::from(self.bits_of(nt)?);
        }
        Ok(Bits::from_word(word, 2 * seq.len()))
    }

    /// Inverse of `seq_to_bits`. `bits` must have even length.
    pub fn bits_to_seq(&self, bits: Bits) -> Vec<u8> {
        assert!(bits.len() % 2 == 0);
        (0..bits.len() / 2)
            .rev()
            .map(|i| self.nt_of(((bits.word() >> (2 * i)) & 0b11) as u8))
            .collect()
    }
}

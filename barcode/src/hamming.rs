//!
//! The extended Hamming code [16,11,4], written as 8-nt barcodes.
//!
//! Bit 0 carries the overall parity, bits 1, 2, 4 and 8 carry the Hamming
//! parity, and the remaining eleven positions carry the message. A single bit
//! error is corrected; any two bit errors are detected and reported as
//! uncorrectable.
//!
use crate::codec::{LinearCode, NucleotideCode};
use crate::{Bits, NtEncoding};
use std::sync::OnceLock;

/// Length of a Hamming barcode in nucleotides.
pub const HAMMING_BARCODE_LENGTH: usize = 8;
const N: usize = 16;
const PARITY_BITS: usize = 4;
const RADIUS: usize = 1;

/// Positions holding message bits: everything except 0 and the powers of two.
fn data_positions() -> impl Iterator<Item = usize> {
    (1..N).filter(|p| !p.is_power_of_two())
}

/// One row per message bit: the data position, the Hamming parity positions
/// covering it, and the overall parity bit when that leaves an odd weight.
pub fn generator() -> Vec<Bits> {
    data_positions()
        .map(|p| {
            let mut row = Bits::with_ones(
                N,
                std::iter::once(p).chain((0..PARITY_BITS).map(|j| 1 << j).filter(|&q| p & q != 0)),
            );
            if row.weight() % 2 == 1 {
                row.set(0, true);
            }
            row
        })
        .collect()
}

/// Four rows reading off the binary index of the flipped position, then the
/// all-ones overall parity row.
pub fn parity_check() -> Vec<Bits> {
    (0..PARITY_BITS)
        .rev()
        .map(|j| Bits::with_ones(N, (0..N).filter(|i| (i >> j) & 1 == 1)))
        .chain(std::iter::once(Bits::with_ones(N, 0..N)))
        .collect()
}

pub fn hamming_8_with(encoding: NtEncoding) -> NucleotideCode {
    let code = LinearCode::new("hamming_8", generator(), parity_check(), RADIUS)
        .expect("hamming matrices are orthogonal");
    NucleotideCode::new(code, encoding).expect("hamming code length is even")
}

/// The shared Hamming code with the default nucleotide encoding.
pub fn hamming_8() -> &'static NucleotideCode {
    static HAMMING: OnceLock<NucleotideCode> = OnceLock::new();
    HAMMING.get_or_init(|| hamming_8_with(NtEncoding::default()))
}

/// Decode an 8-nt barcode with the default encoding.
pub fn decode(barcode: &[u8]) -> Result<(Option<Vec<u8>>, usize), crate::CodecError> {
    hamming_8().decode(barcode)
}

/// Encode an 11-bit message into an 8-nt barcode.
pub fn encode(message: &[u8]) -> Result<Vec<u8>, crate::CodecError> {
    hamming_8().encode(message)
}

//!
//! The extended binary Golay code [24,12,8], written as 12-nt barcodes.
//!
//! Corrects up to three bit errors. Because a nucleotide carries two bits, a
//! single substitution costs one or two bit errors depending on the bases
//! involved, so any single substitution and many double substitutions are
//! recoverable.
//!
use crate::codec::{LinearCode, NucleotideCode};
use crate::{Bits, NtEncoding};
use std::sync::OnceLock;

/// Length of a Golay barcode in nucleotides.
pub const GOLAY_BARCODE_LENGTH: usize = 12;
const N: usize = 24;
const K: usize = 12;
const RADIUS: usize = 3;

/// Parity part of the systematic generator G = [P | I].
const P: [[u8; K]; K] = [
    [0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
    [1, 1, 1, 0, 1, 1, 1, 0, 0, 0, 1, 0],
    [1, 1, 0, 1, 1, 1, 0, 0, 0, 1, 0, 1],
    [1, 0, 1, 1, 1, 0, 0, 0, 1, 0, 1, 1],
    [1, 1, 1, 1, 0, 0, 0, 1, 0, 1, 1, 0],
    [1, 1, 1, 0, 0, 0, 1, 0, 1, 1, 0, 1],
    [1, 1, 0, 0, 0, 1, 0, 1, 1, 0, 1, 1],
    [1, 0, 0, 0, 1, 0, 1, 1, 0, 1, 1, 1],
    [1, 0, 0, 1, 0, 1, 1, 0, 1, 1, 1, 0],
    [1, 0, 1, 0, 1, 1, 0, 1, 1, 1, 0, 0],
    [1, 1, 0, 1, 1, 0, 1, 1, 1, 0, 0, 0],
    [1, 0, 1, 1, 0, 1, 1, 1, 0, 0, 0, 1],
];

/// G = [P | I]
pub fn generator() -> Vec<Bits> {
    (0..K)
        .map(|i| {
            Bits::with_ones(
                N,
                (0..K)
                    .filter(|&j| P[i][j] == 1)
                    .chain(std::iter::once(K + i)),
            )
        })
        .collect()
}

/// H = [I | P^T]
pub fn parity_check() -> Vec<Bits> {
    (0..K)
        .map(|i| {
            Bits::with_ones(
                N,
                std::iter::once(i).chain((0..K).filter(|&j| P[j][i] == 1).map(|j| K + j)),
            )
        })
        .collect()
}

/// Build a fresh Golay code with the given nucleotide encoding.
pub fn golay_12_with(encoding: NtEncoding) -> NucleotideCode {
    let code = LinearCode::new("golay_12", generator(), parity_check(), RADIUS)
        .expect("golay matrices are orthogonal");
    NucleotideCode::new(code, encoding).expect("golay code length is even")
}

/// The shared Golay code with the default nucleotide encoding. The syndrome
/// table is built on first use and read-only afterwards.
pub fn golay_12() -> &'static NucleotideCode {
    static GOLAY: OnceLock<NucleotideCode> = OnceLock::new();
    GOLAY.get_or_init(|| golay_12_with(NtEncoding::default()))
}

/// Decode a 12-nt barcode with the default encoding.
pub fn decode(barcode: &[u8]) -> Result<(Option<Vec<u8>>, usize), crate::CodecError> {
    golay_12().decode(barcode)
}

/// Encode a 12-bit message into a 12-nt barcode.
pub fn encode(message: &[u8]) -> Result<Vec<u8>, crate::CodecError> {
    golay_12().encode(message)
}

//!
//! Binary linear block codes and their syndrome decoders.
//!
//! A code is given by its generator matrix G (k x n) and parity-check matrix
//! H (r x n) over GF(2). Every error pattern of weight at most the correction
//! radius t is tabulated by its syndrome once, when the code is built; decoding
//! is then a single lookup.
//!
use crate::{Bits, CodecError, NtEncoding, MAX_BITS};
use fxhash::FxHashMap;
use itertools::Itertools;
use log::{debug, warn};

/// Every vector of length `n` with Hamming weight exactly `k`, in
/// lexicographic order of the set positions. The iterator is lazy and can be
/// cloned to restart it.
pub fn make_k_bit_errors(n: usize, k: usize) -> impl Iterator<Item = Bits> + Clone {
    (0..n)
        .combinations(k)
        .map(move |positions| Bits::with_ones(n, positions))
}

/// Map from a non-zero syndrome to the lowest-weight error pattern producing it.
#[derive(Clone, Debug, Default)]
pub struct SyndromeTable {
    corrections: FxHashMap<Bits, Bits>,
    collisions: usize,
}

impl SyndromeTable {
    pub fn get(&self, syndrome: &Bits) -> Option<&Bits> {
        self.corrections.get(syndrome)
    }

    pub fn len(&self) -> usize {
        self.corrections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corrections.is_empty()
    }

    /// Number of error patterns that were dropped because an earlier pattern
    /// already owned their syndrome.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Bits, &Bits)> {
        self.corrections.iter()
    }
}

/// A binary linear block code with a precomputed syndrome decoder.
#[derive(Clone, Debug)]
pub struct LinearCode {
    name: &'static str,
    generator: Vec<Bits>,
    parity_check: Vec<Bits>,
    radius: usize,
    syndromes: SyndromeTable,
}

impl LinearCode {
    /// Build a code from its generator rows (one per message bit) and
    /// parity-check rows, tabulating every error pattern of weight `1..=radius`.
    pub fn new(
        name: &'static str,
        generator: Vec<Bits>,
        parity_check: Vec<Bits>,
        radius: usize,
    ) -> Result<Self, CodecError> {
        let n = match generator.first() {
            Some(row) => row.len(),
            None => return Err(CodecError::BadDimensions("empty generator".to_string())),
        };
        if n == 0 || n > MAX_BITS {
            return Err(CodecError::BadDimensions(format!("code length {n}")));
        }
        if parity_check.is_empty() || parity_check.len() > MAX_BITS {
            return Err(CodecError::BadDimensions(format!(
                "{} parity-check rows",
                parity_check.len()
            )));
        }
        if let Some(row) = generator
            .iter()
            .chain(parity_check.iter())
            .find(|row| row.len() != n)
        {
            return Err(CodecError::BadDimensions(format!(
                "row of length {} in a code of length {n}",
                row.len()
            )));
        }
        if generator
            .iter()
            .cartesian_product(parity_check.iter())
            .any(|(g, h)| g.dot(*h))
        {
            return Err(CodecError::NotOrthogonal);
        }

        let mut code = LinearCode {
            name,
            generator,
            parity_check,
            radius,
            syndromes: SyndromeTable::default(),
        };
        code.syndromes = code.build_syndrome_table();
        debug!(
            "{}: tabulated {} syndromes for error weights 1..={}",
            code.name,
            code.syndromes.len(),
            code.radius
        );
        Ok(code)
    }

    fn build_syndrome_table(&self) -> SyndromeTable {
        let mut table = SyndromeTable::default();
        for weight in 1..=self.radius {
            for error in self.k_bit_errors(weight) {
                let syndrome = self.syndrome(error);
                if syndrome.weight() == 0 {
                    // A codeword of weight <= radius; the code cannot see it.
                    table.collisions += 1;
                    continue;
                }
                if let Some(existing) = table.corrections.get(&syndrome) {
                    warn!(
                        "{}: error {error} collides with {existing} on syndrome {syndrome}",
                        self.name
                    );
                    table.collisions += 1;
                } else {
                    table.corrections.insert(syndrome, error);
                }
            }
        }
        table
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Codeword length n.
    pub fn code_length(&self) -> usize {
        self.generator[0].len()
    }

    /// Message length k.
    pub fn message_length(&self) -> usize {
        self.generator.len()
    }

    /// Maximum number of bit errors that are corrected.
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// The error count reported for a received vector that cannot be corrected.
    pub fn uncorrectable_errors(&self) -> usize {
        self.radius + 1
    }

    pub fn generator(&self) -> &[Bits] {
        &self.generator
    }

    pub fn parity_check(&self) -> &[Bits] {
        &self.parity_check
    }

    pub fn syndrome_table(&self) -> &SyndromeTable {
        &self.syndromes
    }

    /// Every vector of the code length with weight exactly `k`.
    pub fn k_bit_errors(&self, k: usize) -> impl Iterator<Item = Bits> + Clone {
        make_k_bit_errors(self.code_length(), k)
    }

    /// received . H^T (mod 2)
    pub fn syndrome(&self, received: Bits) -> Bits {
        let word = self
            .parity_check
            .iter()
            .fold(0u32, |acc, row| (acc << 1) | u32::from(row.dot(received)));
        Bits::from_word(word, self.parity_check.len())
    }

    /// message . G (mod 2)
    pub fn encode_bits(&self, message: Bits) -> Result<Bits, CodecError> {
        self.check_length(message, self.message_length())?;
        Ok(self
            .generator
            .iter()
            .enumerate()
            .filter(|&(i, _)| message.get(i))
            .fold(Bits::zeros(self.code_length()), |acc, (_, row)| acc ^ *row))
    }

    /// Correct `received` onto the nearest codeword within the radius.
    ///
    /// Returns the corrected vector and the number of bits flipped. A received
    /// vector outside every radius-t ball gives `(None, radius + 1)`.
    pub fn decode_bits(&self, received: Bits) -> Result<(Option<Bits>, usize), CodecError> {
        self.check_length(received, self.code_length())?;
        let syndrome = self.syndrome(received);
        if syndrome.weight() == 0 {
            return Ok((Some(received), 0));
        }
        Ok(match self.syndromes.get(&syndrome) {
            Some(&error) => (Some(received ^ error), error.weight()),
            None => (None, self.uncorrectable_errors()),
        })
    }

    fn check_length(&self, bits: Bits, expected: usize) -> Result<(), CodecError> {
        if bits.len() == expected {
            Ok(())
        } else {
            Err(CodecError::InvalidLength {
                expected,
                actual: bits.len(),
            })
        }
    }
}

/* ---------------------------------------------------------------------------------------------- */
/// A linear code read and written as nucleotides, two bits per base.
#[derive(Clone, Debug)]
pub struct NucleotideCode {
    code: LinearCode,
    encoding: NtEncoding,
}

impl NucleotideCode {
    pub fn new(code: LinearCode, encoding: NtEncoding) -> Result<Self, CodecError> {
        if code.code_length() % 2 != 0 {
            return Err(CodecError::BadDimensions(format!(
                "odd code length {} cannot be written as nucleotides",
                code.code_length()
            )));
        }
        Ok(NucleotideCode { code, encoding })
    }

    pub fn code(&self) -> &LinearCode {
        &self.code
    }

    pub fn encoding(&self) -> &NtEncoding {
        &self.encoding
    }

    /// Length of a barcode in nucleotides.
    pub fn barcode_length(&self) -> usize {
        self.code.code_length() / 2
    }

    /// Encode a message given as 0/1 values into a barcode.
    pub fn encode(&self, message: &[u8]) -> Result<Vec<u8>, CodecError> {
        if message.len() != self.code.message_length() {
            return Err(CodecError::InvalidLength {
                expected: self.code.message_length(),
                actual: message.len(),
            });
        }
        let codeword = self.code.encode_bits(Bits::from_slice(message)?)?;
        Ok(self.encoding.bits_to_seq(codeword))
    }

    /// Decode a barcode with the code's own nucleotide encoding.
    pub fn decode(&self, barcode: &[u8]) -> Result<(Option<Vec<u8>>, usize), CodecError> {
        self.decode_with(barcode, &self.encoding)
    }

    /// Decode a barcode, reading nucleotides through `encoding`.
    pub fn decode_with(
        &self,
        barcode: &[u8],
        encoding: &NtEncoding,
    ) -> Result<(Option<Vec<u8>>, usize), CodecError> {
        if barcode.len() != self.barcode_length() {
            return Err(CodecError::InvalidLength {
                expected: self.barcode_length(),
                actual: barcode.len(),
            });
        }
        let received = encoding.seq_to_bits(barcode)?;
        let (corrected, num_errors) = self.code.decode_bits(received)?;
        Ok((corrected.map(|bits| encoding.bits_to_seq(bits)), num_errors))
    }
}

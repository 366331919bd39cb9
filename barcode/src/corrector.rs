//!
//! Strategies for pulling an observed barcode back onto a valid codeword.
//!
use crate::codec::NucleotideCode;
use crate::CodecError;

/// The outcome of a correction attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    /// The corrected barcode, or None if the observed barcode lies outside the
    /// correction radius of every codeword.
    pub barcode: Option<Vec<u8>>,
    /// Number of bit errors corrected. For an uncorrectable barcode this is
    /// one more than the correction radius.
    pub num_errors: usize,
}

pub trait CorrectBarcode {
    /// Number of nucleotides in a barcode.
    fn barcode_length(&self) -> usize;

    /// Whether `correct_barcode` can do anything beyond an exact match.
    fn corrects(&self) -> bool {
        true
    }

    /// Attempt to correct `observed`. Malformed input (wrong length, a
    /// symbol outside ACGT) is an error; an uncorrectable barcode is not.
    fn correct_barcode(&self, observed: &[u8]) -> Result<Decoded, CodecError>;
}

impl<T: CorrectBarcode + ?Sized> CorrectBarcode for &T {
    fn barcode_length(&self) -> usize {
        (**self).barcode_length()
    }

    fn corrects(&self) -> bool {
        (**self).corrects()
    }

    fn correct_barcode(&self, observed: &[u8]) -> Result<Decoded, CodecError> {
        (**self).correct_barcode(observed)
    }
}

/// Syndrome decoding through a linear code.
impl CorrectBarcode for NucleotideCode {
    fn barcode_length(&self) -> usize {
        NucleotideCode::barcode_length(self)
    }

    fn correct_barcode(&self, observed: &[u8]) -> Result<Decoded, CodecError> {
        let (barcode, num_errors) = self.decode(observed)?;
        Ok(Decoded {
            barcode,
            num_errors,
        })
    }
}

/// Fixed-length barcodes that are only ever matched exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoCorrection {
    length: usize,
}

impl NoCorrection {
    pub fn new(length: usize) -> Self {
        NoCorrection { length }
    }
}

impl CorrectBarcode for NoCorrection {
    fn barcode_length(&self) -> usize {
        self.length
    }

    fn corrects(&self) -> bool {
        false
    }

    fn correct_barcode(&self, observed: &[u8]) -> Result<Decoded, CodecError> {
        if observed.len() != self.length {
            return Err(CodecError::InvalidLength {
                expected: self.length,
                actual: observed.len(),
            });
        }
        Ok(Decoded {
            barcode: None,
            num_errors: 0,
        })
    }
}

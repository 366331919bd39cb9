//!
//! Barcode → sample and barcode → primer lookup tables.
//!
use crate::errors::ConfigError;
use fxhash::FxHashMap;
use itertools::Itertools;

/// Exact barcode to sample lookup. All barcodes share one length and use
/// only A, C, G and T.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarcodeTable {
    samples: FxHashMap<Vec<u8>, String>,
    length: Option<usize>,
}

impl BarcodeTable {
    pub fn new<I, B, S>(entries: I) -> Result<BarcodeTable, ConfigError>
    where
        I: IntoIterator<Item = (B, S)>,
        B: AsRef<[u8]>,
        S: Into<String>,
    {
        let mut table = BarcodeTable::default();
        for (barcode, sample) in entries {
            table.insert(barcode.as_ref(), sample.into())?;
        }
        Ok(table)
    }

    fn insert(&mut self, barcode: &[u8], sample: String) -> Result<(), ConfigError> {
        let barcode = barcode.to_ascii_uppercase();
        let name = String::from_utf8_lossy(&barcode).into_owned();
        if barcode.is_empty() || !barcode.iter().all(|b| b"ACGT".contains(b)) {
            return Err(ConfigError::InvalidBarcode(name));
        }
        match self.length {
            Some(expected) if expected != barcode.len() => {
                return Err(ConfigError::BarcodeLength {
                    barcode: name,
                    expected,
                    actual: barcode.len(),
                })
            }
            _ => self.length = Some(barcode.len()),
        }
        if let Some(first) = self.samples.get(&barcode) {
            return Err(ConfigError::DuplicateBarcode {
                barcode: name,
                first: first.clone(),
                second: sample,
            });
        }
        self.samples.insert(barcode, sample);
        Ok(())
    }

    pub fn get(&self, barcode: &[u8]) -> Option<&str> {
        self.samples.get(barcode).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length shared by every barcode, None for an empty table.
    pub fn barcode_length(&self) -> Option<usize> {
        self.length
    }
}

/// Expected primers per barcode, degenerate codes already expanded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimerTable {
    primers: FxHashMap<Vec<u8>, Vec<Vec<u8>>>,
}

impl PrimerTable {
    /// Each entry pairs a barcode with its primers, which may use IUPAC
    /// degeneracy codes. Entries for the same barcode accumulate.
    pub fn new<I, B, P, Q>(entries: I) -> Result<PrimerTable, ConfigError>
    where
        I: IntoIterator<Item = (B, P)>,
        B: AsRef<[u8]>,
        P: IntoIterator<Item = Q>,
        Q: AsRef<[u8]>,
    {
        let mut table = PrimerTable::default();
        for (barcode, primers) in entries {
            let expanded = table
                .primers
                .entry(barcode.as_ref().to_ascii_uppercase())
                .or_default();
            for primer in primers {
                expanded.extend(expand_degeneracies(primer.as_ref())?);
            }
            *expanded = std::mem::take(expanded).into_iter().unique().collect();
        }
        Ok(table)
    }

    /// Primers acceptable after `barcode`, in order.
    pub fn get(&self, barcode: &[u8]) -> Option<&[Vec<u8>]> {
        self.primers.get(barcode).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.primers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primers.is_empty()
    }
}

/// The concrete bases an IUPAC nucleotide code stands for.
fn iupac_bases(code: u8) -> Option<&'static [u8]> {
    Some(match code {
        b'A' => b"A",
        b'C' => b"C",
        b'G' => b"G",
        b'T' => b"T",
        b'R' => b"AG",
        b'Y' => b"CT",
        b'S' => b"GC",
        b'W' => b"AT",
        b'K' => b"GT",
        b'M' => b"AC",
        b'B' => b"CGT",
        b'D' => b"AGT",
        b'H' => b"ACT",
        b'V' => b"ACG",
        b'N' => b"ACGT",
        _ => return None,
    })
}

/// Every concrete sequence a degenerate primer can match, in lexical order of
/// the code expansions.
pub fn expand_degeneracies(primer: &[u8]) -> Result<Vec<Vec<u8>>, ConfigError> {
    let invalid = || ConfigError::InvalidPrimer(String::from_utf8_lossy(primer).into_owned());
    if primer.is_empty() {
        return Err(invalid());
    }
    let choices = primer
        .iter()
        .map(|b| iupac_bases(b.to_ascii_uppercase()).map(|bases| bases.iter().copied()))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(invalid)?;
    Ok(choices.into_iter().multi_cartesian_product().collect())
}

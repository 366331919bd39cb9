//!
//! Reads as they arrive, and the annotated record that the stages fill in.
//!
use crate::errors::InputError;
use anyhow::Result;

/// A parsed read: id, bases and optional phred scores (not ASCII-offset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqRecord {
    pub id: String,
    pub seq: Vec<u8>,
    pub qual: Option<Vec<u8>>,
}

impl SeqRecord {
    pub fn new(id: impl Into<String>, seq: impl Into<Vec<u8>>) -> Self {
        SeqRecord {
            id: id.into(),
            seq: seq.into(),
            qual: None,
        }
    }

    pub fn with_qual(mut self, qual: impl Into<Vec<u8>>) -> Self {
        self.qual = Some(qual.into());
        self
    }

    fn check_qual(&self) -> Result<(), InputError> {
        match &self.qual {
            Some(q) if q.len() != self.seq.len() => Err(InputError::QualLength {
                id: self.id.clone(),
                seq_len: self.seq.len(),
                qual_len: q.len(),
            }),
            _ => Ok(()),
        }
    }
}

/// One read and everything learned about it on its way through the
/// pipeline. Every annotation starts out absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub sequence_id: String,
    pub sequence: Vec<u8>,
    pub qual: Option<Vec<u8>>,
    /// Set when the barcode came from a separate index read.
    pub barcode_id: Option<String>,
    pub barcode: Option<Vec<u8>>,
    pub barcode_qual: Option<Vec<u8>>,
    pub forward_primer: Option<Vec<u8>>,
    pub reverse_primer: Option<Vec<u8>>,
    pub sample: Option<String>,
    /// The barcode as observed, before correction.
    pub original_barcode: Option<Vec<u8>>,
    /// The barcode after correction, if it could be corrected.
    pub final_barcode: Option<Vec<u8>>,
    /// Bit errors corrected in the barcode.
    pub barcode_errors: Option<usize>,
}

impl Record {
    /// A record whose barcode, if any, is embedded at the start of the
    /// sequence.
    pub fn from_read(read: SeqRecord) -> Result<Record, InputError> {
        read.check_qual()?;
        Ok(Record {
            sequence_id: read.id,
            sequence: read.seq,
            qual: read.qual,
            ..Default::default()
        })
    }

    /// A record whose barcode comes from a separate index read. The two reads
    /// must share a base id.
    pub fn from_pair(read: SeqRecord, barcode: SeqRecord) -> Result<Record, InputError> {
        if base_id(&read.id) != base_id(&barcode.id) {
            return Err(InputError::IdMismatch {
                sequence_id: read.id,
                barcode_id: barcode.id,
            });
        }
        barcode.check_qual()?;
        Ok(Record {
            barcode_id: Some(barcode.id),
            barcode: Some(barcode.seq),
            barcode_qual: barcode.qual,
            ..Record::from_read(read)?
        })
    }

    /// Drop the first `n` bases (and scores).
    pub fn trim_front(&mut self, n: usize) {
        let n = n.min(self.sequence.len());
        self.sequence.drain(..n);
        if let Some(qual) = &mut self.qual {
            qual.drain(..n.min(qual.len()));
        }
    }

    /// Keep only the first `len` bases (and scores).
    pub fn truncate(&mut self, len: usize) {
        self.sequence.truncate(len);
        if let Some(qual) = &mut self.qual {
            qual.truncate(len);
        }
    }
}

/// Strip the read-pair suffix from a FASTQ id. Both the old `name/1` and the
/// newer `name 1:N:0` conventions are handled; whichever leaves the shorter
/// prefix wins.
pub fn base_id(id: &str) -> &str {
    let slash = id.split_once('/').map_or(id, |(base, _)| base);
    let space = id.split_once(' ').map_or(id, |(base, _)| base);
    if slash.len() < space.len() {
        slash
    } else {
        space
    }
}

/// Turn a stream of reads into records with embedded barcodes.
pub fn records<I>(reads: I) -> impl Iterator<Item = Result<Record>>
where
    I: IntoIterator<Item = Result<SeqRecord>>,
{
    reads
        .into_iter()
        .map(|read| Ok(Record::from_read(read?)?))
}

/// Zip reads with their index reads. See [`paired_records`].
pub struct PairedRecords<R, B> {
    reads: R,
    barcodes: B,
}

/// Join reads with index reads in lockstep. A base-id mismatch or one stream
/// running out before the other is an error.
pub fn paired_records<R, B>(reads: R, barcodes: B) -> PairedRecords<R::IntoIter, B::IntoIter>
where
    R: IntoIterator<Item = Result<SeqRecord>>,
    B: IntoIterator<Item = Result<SeqRecord>>,
{
    PairedRecords {
        reads: reads.into_iter(),
        barcodes: barcodes.into_iter(),
    }
}

impl<R, B> Iterator for PairedRecords<R, B>
where
    R: Iterator<Item = Result<SeqRecord>>,
    B: Iterator<Item = Result<SeqRecord>>,
{
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Result<Record>> {
        let pair = match (self.reads.next(), self.barcodes.next()) {
            (None, None) => return None,
            (Some(Err(e)), _) | (_, Some(Err(e))) => return Some(Err(e)),
            (Some(Ok(read)), Some(Ok(barcode))) => Record::from_pair(read, barcode),
            (Some(Ok(read)), None) => Err(InputError::UnpairedRead(read.id)),
            (None, Some(Ok(barcode))) => Err(InputError::UnpairedRead(barcode.id)),
        };
        Some(pair.map_err(anyhow::Error::from))
    }
}

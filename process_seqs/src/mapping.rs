//!
//! Read barcode and primer tables from a tab-delimited mapping file.
//!
//! The header line starts with `#SampleID` and names the columns; the
//! `BarcodeSequence` column is required and `LinkerPrimerSequence` is
//! optional. Other lines starting with `#` are comments. A primer cell may
//! list several primers separated by commas.
//!
use crate::errors::ConfigError;
use crate::tables::{BarcodeTable, PrimerTable};
use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const GZ_BUF_SIZE: usize = 1 << 20;
const SAMPLE_ID: &str = "#SampleID";
const BARCODE_COLUMN: &str = "BarcodeSequence";
const PRIMER_COLUMN: &str = "LinkerPrimerSequence";

/// Open a (possibly gzipped) file into a BufReader.
pub(crate) fn open_with_gz(path: &Path) -> Result<Box<dyn BufRead>> {
    let f = File::open(path).with_context(|| path.display().to_string())?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("gz") => Ok(Box::new(BufReader::with_capacity(
            GZ_BUF_SIZE,
            MultiGzDecoder::new(f),
        ))),
        _ => Ok(Box::new(BufReader::with_capacity(32 * 1024, f))),
    }
}

/// Everything a mapping file provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    /// Sample ids in file order.
    pub samples: Vec<String>,
    pub barcodes: BarcodeTable,
    pub primers: PrimerTable,
}

/// Load a mapping file, gzipped if its name ends in `.gz`.
pub fn read_mapping_file(path: &Path) -> Result<Mapping> {
    let reader = open_with_gz(path)?;
    parse_mapping(reader).with_context(|| path.display().to_string())
}

struct Columns {
    barcode: usize,
    primer: Option<usize>,
}

fn mapping_error(line: usize, message: impl Into<String>) -> ConfigError {
    ConfigError::Mapping {
        line,
        message: message.into(),
    }
}

/// Parse mapping-file text.
pub fn parse_mapping(reader: impl BufRead) -> Result<Mapping> {
    let mut columns = None;
    let mut samples = Vec::new();
    let mut barcodes = Vec::new();
    let mut primers = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line_num = i + 1;
        let line = line.with_context(|| format!("reading mapping file line {line_num}"))?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();

        if fields[0] == SAMPLE_ID {
            let find = |name: &str| fields.iter().position(|&f| f == name);
            let barcode = find(BARCODE_COLUMN)
                .ok_or_else(|| mapping_error(line_num, format!("no {BARCODE_COLUMN} column")))?;
            columns = Some(Columns {
                barcode,
                primer: find(PRIMER_COLUMN),
            });
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        let cols = columns
            .as_ref()
            .ok_or_else(|| mapping_error(line_num, format!("data before the {SAMPLE_ID} header")))?;

        let barcode = *fields
            .get(cols.barcode)
            .ok_or_else(|| mapping_error(line_num, "missing barcode"))?;
        let sample = fields[0].to_string();
        if let Some(cell) = cols.primer.and_then(|c| fields.get(c)) {
            let listed: Vec<String> = cell
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            if !listed.is_empty() {
                primers.push((barcode.to_string(), listed));
            }
        }
        barcodes.push((barcode.to_string(), sample.clone()));
        samples.push(sample);
    }

    if columns.is_none() {
        return Err(mapping_error(0, format!("no {SAMPLE_ID} header line")).into());
    }
    Ok(Mapping {
        samples,
        barcodes: BarcodeTable::new(barcodes)?,
        primers: PrimerTable::new(primers)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const MAPPING: &str = "#SampleID\tBarcodeSequence\tLinkerPrimerSequence\tDescription
#a comment
PC.354\tAGCACGAGCCTA\tYATGCTGCCTCCCGTAGGAGT\tControl_mouse_I.D._354
PC.355\tAACTCGTCGATG\tYATGCTGCCTCCCGTAGGAGT,ACGT\tControl_mouse_I.D._355

PC.356\tACAGACCACTCA\t\tControl_mouse_I.D._356
";

    fn check(mapping: &Mapping) {
        assert_eq!(mapping.samples, vec!["PC.354", "PC.355", "PC.356"]);
        assert_eq!(mapping.barcodes.len(), 3);
        assert_eq!(mapping.barcodes.get(b"AACTCGTCGATG"), Some("PC.355"));
        assert_eq!(mapping.primers.len(), 2);
        assert_eq!(mapping.primers.get(b"AGCACGAGCCTA").unwrap().len(), 2);
        let p355 = mapping.primers.get(b"AACTCGTCGATG").unwrap();
        assert_eq!(p355.len(), 3);
        assert_eq!(p355[2], b"ACGT".to_vec());
        assert_eq!(mapping.primers.get(b"ACAGACCACTCA"), None);
    }

    #[test]
    fn test_parse_mapping() {
        check(&parse_mapping(MAPPING.as_bytes()).unwrap());
    }

    #[test]
    fn test_read_mapping_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let plain = dir.path().join("map.txt");
        std::fs::write(&plain, MAPPING)?;
        check(&read_mapping_file(&plain)?);

        let gz = dir.path().join("map.txt.gz");
        let mut enc = GzEncoder::new(File::create(&gz)?, Compression::default());
        enc.write_all(MAPPING.as_bytes())?;
        enc.finish()?;
        check(&read_mapping_file(&gz)?);

        assert!(read_mapping_file(&dir.path().join("nope.txt")).is_err());
        Ok(())
    }

    #[test]
    fn test_bad_mapping() {
        let no_header = "PC.354\tAGCACGAGCCTA\n";
        let err = parse_mapping(no_header.as_bytes()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::Mapping {
                line: 1,
                message: "data before the #SampleID header".to_string()
            })
        );

        let no_barcode = "#SampleID\tDescription\n";
        assert!(parse_mapping(no_barcode.as_bytes()).is_err());

        let duplicate = "#SampleID\tBarcodeSequence\nA\tACGT\nB\tACGT\n";
        let err = parse_mapping(duplicate.as_bytes()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::DuplicateBarcode { .. })
        ));

        assert!(parse_mapping("".as_bytes()).is_err());
    }
}

//!
//! Run options for sequence processing.
//!
use crate::errors::ConfigError;
use anyhow::{Context, Result};
use barcode::golay::GOLAY_BARCODE_LENGTH;
use barcode::hamming::HAMMING_BARCODE_LENGTH;
use log::warn;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Which barcode scheme the reads carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawBarcodeType")]
pub enum BarcodeType {
    /// 12-nt Golay barcodes, corrected up to three bit errors.
    Golay12,
    /// 8-nt Hamming barcodes, corrected up to one bit error.
    Hamming8,
    /// Barcodes of varying length. Not implemented.
    VariableLength,
    /// Fixed-length barcodes matched exactly.
    Length(usize),
}

impl BarcodeType {
    /// Barcode length in nucleotides, if fixed.
    pub fn barcode_length(self) -> Option<usize> {
        match self {
            BarcodeType::Golay12 => Some(GOLAY_BARCODE_LENGTH),
            BarcodeType::Hamming8 => Some(HAMMING_BARCODE_LENGTH),
            BarcodeType::VariableLength => None,
            BarcodeType::Length(n) => Some(n),
        }
    }
}

impl FromStr for BarcodeType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        Ok(match s {
            "golay_12" => BarcodeType::Golay12,
            "hamming_8" => BarcodeType::Hamming8,
            "variable_length" | "variable" => BarcodeType::VariableLength,
            _ => match s.parse::<usize>() {
                Ok(n) if n > 0 => BarcodeType::Length(n),
                _ => return Err(ConfigError::UnknownBarcodeType(s.to_string())),
            },
        })
    }
}

impl fmt::Display for BarcodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarcodeType::Golay12 => write!(f, "golay_12"),
            BarcodeType::Hamming8 => write!(f, "hamming_8"),
            BarcodeType::VariableLength => write!(f, "variable_length"),
            BarcodeType::Length(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBarcodeType {
    Length(usize),
    Name(String),
}

impl TryFrom<RawBarcodeType> for BarcodeType {
    type Error = ConfigError;

    fn try_from(raw: RawBarcodeType) -> Result<Self, ConfigError> {
        match raw {
            RawBarcodeType::Length(0) => Err(ConfigError::UnknownBarcodeType("0".to_string())),
            RawBarcodeType::Length(n) => Ok(BarcodeType::Length(n)),
            RawBarcodeType::Name(s) => s.parse(),
        }
    }
}

/// Options controlling which checks run and their tolerances. An absent
/// threshold disables the check that needs it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Assign reads to samples by barcode.
    pub demultiplex: bool,
    pub barcode_type: Option<BarcodeType>,
    /// Fail reads whose barcode needed more corrected bit errors than this.
    pub max_barcode_error: Option<f64>,
    /// Look for the forward primer after the barcode.
    pub check_primer: bool,
    /// Leave the primer on the sequence once found.
    pub retain_primer: bool,
    pub max_primer_mismatch: Option<usize>,
    /// Primer checks only apply to "454".
    pub instrument_type: Option<String>,
    /// Bases with a quality at or below this are bad.
    pub phred_quality_threshold: Option<u8>,
    /// Truncate reads at the start of a longer run of bad bases.
    pub max_bad_run_length: Option<usize>,
    /// Fail reads with fewer good bases than this fraction of their length.
    pub min_per_read_length_fraction: Option<f64>,
    pub min_seq_len: Option<usize>,
    /// Fail reads with more N bases than this.
    pub ambiguous_count: Option<usize>,
}

impl Options {
    /// Parse options from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Options> {
        let options: Options = toml::from_str(s).context("parsing options")?;
        options.warn_non_default();
        Ok(options)
    }

    /// Read options from a TOML file.
    pub fn from_path(path: &Path) -> Result<Options> {
        let s = std::fs::read_to_string(path).with_context(|| path.display().to_string())?;
        Options::from_toml_str(&s).with_context(|| path.display().to_string())
    }

    fn warn_non_default(&self) {
        let default = Options::default();
        macro_rules! check {
            ($($field:ident),*) => {
                $(
                    if self.$field != default.$field {
                        warn!("option {} set to {:?}", stringify!($field), self.$field);
                    }
                )*
            };
        }
        check!(
            demultiplex,
            barcode_type,
            max_barcode_error,
            check_primer,
            retain_primer,
            max_primer_mismatch,
            instrument_type,
            phred_quality_threshold,
            max_bad_run_length,
            min_per_read_length_fraction,
            min_seq_len,
            ambiguous_count
        );
    }

    /// Whether primer checks apply to this instrument.
    pub fn primer_check_enabled(&self) -> bool {
        self.check_primer && self.instrument_type.as_deref() == Some("454")
    }

    /// Reject option combinations that would leave an enabled check without
    /// what it needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.demultiplex {
            match self.barcode_type {
                None => {
                    return Err(ConfigError::MissingOption {
                        option: "barcode_type",
                        needed_by: "demultiplex",
                    })
                }
                Some(BarcodeType::VariableLength) => {
                    return Err(ConfigError::Unimplemented(
                        BarcodeType::VariableLength.to_string(),
                    ))
                }
                Some(_) => {}
            }
        }

        let needs_threshold = [
            ("max_bad_run_length", self.max_bad_run_length.is_some()),
            (
                "min_per_read_length_fraction",
                self.min_per_read_length_fraction.is_some(),
            ),
        ];
        for (name, set) in needs_threshold {
            if set && self.phred_quality_threshold.is_none() {
                return Err(ConfigError::MissingOption {
                    option: "phred_quality_threshold",
                    needed_by: name,
                });
            }
        }

        if let Some(max_errors) = self.max_barcode_error {
            if max_errors.is_nan() || max_errors < 0.0 {
                return Err(ConfigError::InvalidMaxBarcodeError(max_errors));
            }
        }

        if let Some(frac) = self.min_per_read_length_fraction {
            if !(0.0..=1.0).contains(&frac) {
                return Err(ConfigError::FractionOutOfRange(frac));
            }
        }

        if self.check_primer {
            if self.max_primer_mismatch.is_none() {
                return Err(ConfigError::MissingOption {
                    option: "max_primer_mismatch",
                    needed_by: "check_primer",
                });
            }
            if self.instrument_type.is_none() {
                return Err(ConfigError::MissingOption {
                    option: "instrument_type",
                    needed_by: "check_primer",
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barcode_type_names() {
        for (s, t) in [
            ("golay_12", BarcodeType::Golay12),
            ("hamming_8", BarcodeType::Hamming8),
            ("variable_length", BarcodeType::VariableLength),
            ("6", BarcodeType::Length(6)),
        ] {
            assert_eq!(s.parse::<BarcodeType>().unwrap(), t);
            assert_eq!(t.to_string(), s);
        }
        assert_eq!(
            "golay".parse::<BarcodeType>(),
            Err(ConfigError::UnknownBarcodeType("golay".to_string()))
        );
        assert!("0".parse::<BarcodeType>().is_err());
        assert_eq!(BarcodeType::Golay12.barcode_length(), Some(12));
        assert_eq!(BarcodeType::VariableLength.barcode_length(), None);
    }

    #[test]
    fn test_from_toml() {
        let opts = Options::from_toml_str(
            r#"
            demultiplex = true
            barcode_type = "golay_12"
            max_barcode_error = 1.5
            phred_quality_threshold = 3
            max_bad_run_length = 3
            min_per_read_length_fraction = 0.75
            "#,
        )
        .unwrap();
        assert!(opts.demultiplex);
        assert_eq!(opts.barcode_type, Some(BarcodeType::Golay12));
        assert_eq!(opts.max_barcode_error, Some(1.5));
        assert_eq!(opts.min_seq_len, None);
        assert!(!opts.check_primer);
        assert!(opts.validate().is_ok());

        let opts = Options::from_toml_str("barcode_type = 8").unwrap();
        assert_eq!(opts.barcode_type, Some(BarcodeType::Length(8)));
        let opts = Options::from_toml_str("barcode_type = \"8\"").unwrap();
        assert_eq!(opts.barcode_type, Some(BarcodeType::Length(8)));

        assert!(Options::from_toml_str("barcode_type = \"golay\"").is_err());
        assert!(Options::from_toml_str("no_such_option = 1").is_err());
        assert_eq!(Options::from_toml_str("").unwrap(), Options::default());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.toml");
        std::fs::write(&path, "min_seq_len = 200\nambiguous_count = 6\n").unwrap();
        let opts = Options::from_path(&path).unwrap();
        assert_eq!(opts.min_seq_len, Some(200));
        assert_eq!(opts.ambiguous_count, Some(6));

        let err = Options::from_path(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
    }

    #[test]
    fn test_validate() {
        let missing_type = Options {
            demultiplex: true,
            ..Default::default()
        };
        assert_eq!(
            missing_type.validate(),
            Err(ConfigError::MissingOption {
                option: "barcode_type",
                needed_by: "demultiplex"
            })
        );

        let variable = Options {
            demultiplex: true,
            barcode_type: Some(BarcodeType::VariableLength),
            ..Default::default()
        };
        assert_eq!(
            variable.validate(),
            Err(ConfigError::Unimplemented("variable_length".to_string()))
        );

        let no_threshold = Options {
            max_bad_run_length: Some(3),
            ..Default::default()
        };
        assert!(matches!(
            no_threshold.validate(),
            Err(ConfigError::MissingOption {
                option: "phred_quality_threshold",
                ..
            })
        ));

        let bad_fraction = Options {
            phred_quality_threshold: Some(3),
            min_per_read_length_fraction: Some(1.5),
            ..Default::default()
        };
        assert_eq!(
            bad_fraction.validate(),
            Err(ConfigError::FractionOutOfRange(1.5))
        );

        for bad in [-1.0, f64::NAN] {
            let opts = Options {
                max_barcode_error: Some(bad),
                ..Default::default()
            };
            assert!(matches!(
                opts.validate(),
                Err(ConfigError::InvalidMaxBarcodeError(v)) if v.is_nan() || v == bad
            ));
        }
        let zero = Options {
            max_barcode_error: Some(0.0),
            ..Default::default()
        };
        assert!(zero.validate().is_ok());

        let primer = Options {
            check_primer: true,
            instrument_type: Some("454".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            primer.validate(),
            Err(ConfigError::MissingOption {
                option: "max_primer_mismatch",
                ..
            })
        ));
        let primer = Options {
            max_primer_mismatch: Some(0),
            ..primer
        };
        assert!(primer.validate().is_ok());
        assert!(primer.primer_check_enabled());
        let other = Options {
            instrument_type: Some("illumina".to_string()),
            ..primer
        };
        assert!(!other.primer_check_enabled());
    }
}

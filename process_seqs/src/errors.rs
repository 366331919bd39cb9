/// A run cannot start with these options or tables.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("option {option} is required when {needed_by} is enabled")]
    MissingOption {
        option: &'static str,
        needed_by: &'static str,
    },

    #[error("barcode type {0} is not implemented")]
    Unimplemented(String),

    #[error("unrecognized barcode type '{0}'")]
    UnknownBarcodeType(String),

    #[error("min_per_read_length_fraction must lie in [0, 1], got {0}")]
    FractionOutOfRange(f64),

    #[error("max_barcode_error must be a non-negative number, got {0}")]
    InvalidMaxBarcodeError(f64),

    #[error("barcode {barcode} is assigned to both {first} and {second}")]
    DuplicateBarcode {
        barcode: String,
        first: String,
        second: String,
    },

    #[error("barcode {0} contains a symbol other than A, C, G or T")]
    InvalidBarcode(String),

    #[error("barcode {barcode} has length {actual}, expected {expected}")]
    BarcodeLength {
        barcode: String,
        expected: usize,
        actual: usize,
    },

    #[error("primer '{0}' is empty or contains a symbol that is not an IUPAC nucleotide code")]
    InvalidPrimer(String),

    #[error("mapping file line {line}: {message}")]
    Mapping { line: usize, message: String },
}

/// The input streams are malformed. Aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("ID mismatch. SequenceID: {sequence_id}, BarcodeID: {barcode_id}")]
    IdMismatch {
        sequence_id: String,
        barcode_id: String,
    },

    #[error("read {0} has no partner in the other stream")]
    UnpairedRead(String),

    #[error("read {id} has {seq_len} bases but {qual_len} quality scores")]
    QualLength {
        id: String,
        seq_len: usize,
        qual_len: usize,
    },
}

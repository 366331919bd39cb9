//!
//! The sequence processing steps and the shared context they read.
//!
//! Steps run in this order (higher priority first):
//!
//! | priority | step                                   |
//! |----------|----------------------------------------|
//! | 200      | quality: bad run truncation, good-base fraction |
//! | 150      | demultiplex: barcode lookup/correction, error tolerance |
//! | 100      | primer: forward primer check and trim  |
//! | 50       | sequence: minimum length, ambiguous bases |
//!
use crate::errors::ConfigError;
use crate::options::{BarcodeType, Options};
use crate::record::Record;
use crate::tables::{BarcodeTable, PrimerTable};
use crate::SeqStat;
use barcode::{golay, hamming, CorrectBarcode, NoCorrection};
use std::sync::Arc;
use workflow::{Requirement, Step, Workflow, WorkflowBuilder};

pub(crate) mod demultiplex;
pub(crate) mod primer;
pub(crate) mod quality;
pub(crate) mod sequence;

pub use primer::count_mismatches;
pub use quality::longest_bad_run;

const QUALITY_PRIORITY: i32 = 200;
const DEMULTIPLEX_PRIORITY: i32 = 150;
const PRIMER_PRIORITY: i32 = 100;
const SEQUENCE_PRIORITY: i32 = 50;

/// Everything the steps read and never modify: options, lookup tables and the
/// barcode corrector. Cheap to clone; clones share the tables.
#[derive(Clone)]
pub struct SeqContext {
    options: Arc<Options>,
    barcodes: Arc<BarcodeTable>,
    primers: Arc<PrimerTable>,
    corrector: Option<Arc<dyn CorrectBarcode + Send + Sync>>,
}

impl SeqContext {
    /// Validate the options against each other and against the tables, and
    /// pick the barcode corrector.
    pub fn new(
        options: Options,
        barcodes: BarcodeTable,
        primers: PrimerTable,
    ) -> Result<SeqContext, ConfigError> {
        options.validate()?;

        let corrector: Option<Arc<dyn CorrectBarcode + Send + Sync>> = if options.demultiplex {
            match options.barcode_type {
                Some(BarcodeType::Golay12) => Some(Arc::new(golay::golay_12())),
                Some(BarcodeType::Hamming8) => Some(Arc::new(hamming::hamming_8())),
                Some(BarcodeType::Length(n)) => Some(Arc::new(NoCorrection::new(n))),
                Some(t @ BarcodeType::VariableLength) => {
                    return Err(ConfigError::Unimplemented(t.to_string()))
                }
                None => {
                    return Err(ConfigError::MissingOption {
                        option: "barcode_type",
                        needed_by: "demultiplex",
                    })
                }
            }
        } else {
            None
        };

        if let (Some(c), Some(actual)) = (&corrector, barcodes.barcode_length()) {
            if c.barcode_length() != actual {
                return Err(ConfigError::BarcodeLength {
                    barcode: "in the barcode table".to_string(),
                    expected: c.barcode_length(),
                    actual,
                });
            }
        }

        Ok(SeqContext {
            options: Arc::new(options),
            barcodes: Arc::new(barcodes),
            primers: Arc::new(primers),
            corrector,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn barcodes(&self) -> &BarcodeTable {
        &self.barcodes
    }

    pub fn primers(&self) -> &PrimerTable {
        &self.primers
    }

    /// None unless demultiplexing.
    pub fn corrector(&self) -> Option<&(dyn CorrectBarcode + Send + Sync)> {
        self.corrector.as_deref()
    }
}

/// The engine specialised to sequence records.
pub type SeqWorkflow = Workflow<SeqContext, Record, SeqStat>;
pub type SeqStep = Step<SeqContext, Record, SeqStat>;

fn has_qual(record: &Record) -> bool {
    record.qual.is_some()
}

/// All steps in registration order.
pub fn steps() -> Vec<SeqStep> {
    vec![
        Step::new(
            "quality_max_bad_run_length",
            QUALITY_PRIORITY,
            quality::max_bad_run_length,
        )
        .requires(Requirement::state("quality scores present", has_qual))
        .requires(Requirement::option("phred_quality_threshold", |c: &SeqContext| {
            c.options().phred_quality_threshold.is_some()
        }))
        .requires(Requirement::option("max_bad_run_length", |c: &SeqContext| {
            c.options().max_bad_run_length.is_some()
        })),
        Step::new(
            "quality_min_per_read_length_fraction",
            QUALITY_PRIORITY,
            quality::min_per_read_length_fraction,
        )
        .requires(Requirement::state("quality scores present", has_qual))
        .requires(Requirement::option("phred_quality_threshold", |c: &SeqContext| {
            c.options().phred_quality_threshold.is_some()
        }))
        .requires(Requirement::option(
            "min_per_read_length_fraction",
            |c: &SeqContext| c.options().min_per_read_length_fraction.is_some(),
        )),
        Step::new(
            "demultiplex_barcode",
            DEMULTIPLEX_PRIORITY,
            demultiplex::assign_sample,
        )
        .requires(Requirement::option("demultiplex", |c: &SeqContext| {
            c.options().demultiplex
        })),
        Step::new(
            "demultiplex_max_barcode_error",
            DEMULTIPLEX_PRIORITY,
            demultiplex::max_barcode_error,
        )
        .requires(Requirement::option("demultiplex", |c: &SeqContext| {
            c.options().demultiplex
        }))
        .requires(Requirement::option("max_barcode_error", |c: &SeqContext| {
            c.options().max_barcode_error.is_some()
        })),
        Step::new(
            "primer_check_forward",
            PRIMER_PRIORITY,
            primer::check_forward,
        )
        .requires(Requirement::option(
            "check_primer with instrument_type 454",
            |c: &SeqContext| c.options().primer_check_enabled(),
        ))
        .requires(Requirement::option("max_primer_mismatch", |c: &SeqContext| {
            c.options().max_primer_mismatch.is_some()
        })),
        Step::new(
            "sequence_length_check",
            SEQUENCE_PRIORITY,
            sequence::length_check,
        )
        .requires(Requirement::option("min_seq_len", |c: &SeqContext| {
            c.options().min_seq_len.is_some()
        })),
        Step::new(
            "sequence_ambiguous_count",
            SEQUENCE_PRIORITY,
            sequence::ambiguous_count,
        )
        .requires(Requirement::option("ambiguous_count", |c: &SeqContext| {
            c.options().ambiguous_count.is_some()
        })),
    ]
}

/// A builder with every step registered, for callers that want to change
/// engine settings such as short-circuiting.
pub fn workflow_builder(context: SeqContext) -> WorkflowBuilder<SeqContext, Record, SeqStat> {
    SeqWorkflow::builder(context).steps(steps())
}

/// The standard short-circuiting sequence workflow.
pub fn build_workflow(context: SeqContext) -> SeqWorkflow {
    workflow_builder(context).build()
}

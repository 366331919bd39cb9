//!
//! Quality filtering, demultiplexing and primer checks for sequencing reads.
//!
//! Reads are turned into [`Record`]s (see [`records`] and [`paired_records`])
//! and pushed through a [`SeqWorkflow`] built from a [`SeqContext`]. Each
//! record comes out annotated with its sample, barcode and primer, and with a
//! failed flag; why it failed is tallied in the workflow's [`SeqStat`]
//! counters.
//!
//! ```ignore
//! let mapping = read_mapping_file(&path)?;
//! let ctx = SeqContext::new(options, mapping.barcodes, mapping.primers)?;
//! let mut wf = build_workflow(ctx);
//! for rec in wf.run(records(reads)) {
//!     let rec = rec?;
//!     ...
//! }
//! info!("{}", wf.stats());
//! ```
//!
use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;
use par_proc::ComputeContext;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, IntoStaticStr};
use workflow::{Metric, Processed, StatKey, Stats};

pub mod errors;
pub mod mapping;
pub mod options;
pub mod record;
pub mod stages;
pub mod tables;

pub use errors::{ConfigError, InputError};
pub use mapping::{parse_mapping, read_mapping_file, Mapping};
pub use options::{BarcodeType, Options};
pub use record::{base_id, paired_records, records, PairedRecords, Record, SeqRecord};
pub use stages::{build_workflow, workflow_builder, SeqContext, SeqWorkflow};
pub use tables::{expand_degeneracies, BarcodeTable, PrimerTable};

/// Per-run counters. Each failing step has its own counter, so a failed read
/// can be traced to the check that rejected it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    IntoStaticStr,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SeqStat {
    /// Reads truncated at a run of poor quality bases
    QualityMaxBadRunLength,
    /// Reads with too many poor quality bases
    MinPerReadLengthFraction,
    /// Barcodes that went through the decoder and came out corrected
    BarcodeCorrected,
    /// Reads whose barcode matched no sample
    UnknownBarcode,
    /// Reads whose barcode needed more corrections than allowed
    ExceedBarcodeError,
    /// Reads whose barcode has no primers registered
    UnknownPrimerBarcodePair,
    /// Reads where every expected primer had too many mismatches
    ExceedsMaxPrimerMismatch,
    /// Reads shorter than the minimum length
    MinSeqLen,
    /// Reads with too many ambiguous bases
    AmbiguousCount,
}

impl StatKey for SeqStat {
    fn index(self) -> usize {
        self as usize
    }
}

/// Outputs of a sharded run, one vector per shard in shard order, and the
/// counters of every shard merged.
pub struct ShardedRun {
    pub shards: Vec<Vec<Processed<Record>>>,
    pub stats: Stats<SeqStat>,
}

/// Process each shard with its own workflow on `compute` and merge the
/// results. The first error from any shard aborts the run.
pub fn run_sharded<X, S>(
    compute: &X,
    context: &SeqContext,
    shards: impl IntoIterator<Item = S>,
) -> Result<ShardedRun>
where
    X: ComputeContext,
    S: IntoIterator<Item = Result<Record>> + Send + 'static,
{
    let handles = shards
        .into_iter()
        .enumerate()
        .map(|(i, shard)| {
            let context = context.clone();
            compute.submit(move || {
                let mut wf = build_workflow(context);
                let processed = wf
                    .run(shard)
                    .collect::<Result<Vec<_>>>()
                    .with_context(|| format!("processing shard {i}"))?;
                Ok((processed, wf.into_stats()))
            })
        })
        .collect_vec();

    let mut run = ShardedRun {
        shards: Vec::with_capacity(handles.len()),
        stats: Stats::default(),
    };
    for handle in handles {
        let (processed, stats) = handle.wait()?;
        run.shards.push(processed);
        run.stats.merge(stats);
    }

    let total: usize = run.shards.iter().map(Vec::len).sum();
    let failed = run.shards.iter().flatten().filter(|p| p.failed).count();
    info!(
        "processed {total} reads in {} shards, {failed} failed",
        run.shards.len()
    );
    for (stat, count) in run.stats.iter() {
        info!("{stat}: {count}");
    }
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_utils::*;
    use par_proc::LocalContext;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    fn reads(seqs: &[&str]) -> Vec<Result<SeqRecord>> {
        seqs.iter()
            .enumerate()
            .map(|(i, s)| Ok(SeqRecord::new(format!("r{i}"), *s)))
            .collect()
    }

    #[test]
    fn test_stat_names() {
        let names: Vec<&'static str> = SeqStat::iter().map(Into::into).collect();
        assert_eq!(
            names,
            vec![
                "quality_max_bad_run_length",
                "min_per_read_length_fraction",
                "barcode_corrected",
                "unknown_barcode",
                "exceed_barcode_error",
                "unknown_primer_barcode_pair",
                "exceeds_max_primer_mismatch",
                "min_seq_len",
                "ambiguous_count",
            ]
        );
        assert_eq!(SeqStat::MinSeqLen.to_string(), "min_seq_len");
        assert_eq!(
            serde_json::to_string(&SeqStat::BarcodeCorrected).unwrap(),
            "\"barcode_corrected\""
        );
    }

    #[test]
    fn test_run_yields_every_read_in_order() {
        let mut wf = build_workflow(context(Options {
            min_seq_len: Some(5),
            ..golay_options()
        }));
        let input = reads(&[
            "AACGCACGCTAGTTACGATCCGAT",
            "CACGCACGCTAGTTACGATCCGAT",
            "CCCGCACGCTAGTTACG",
            "AACTCGTCGATGAC",
        ]);
        let out: Vec<_> = wf
            .run(records(input))
            .map(|p| {
                let p = p.unwrap();
                (p.item.sequence_id, p.item.sample, p.failed)
            })
            .collect();
        assert_eq!(
            out,
            vec![
                ("r0".to_string(), Some("S1".to_string()), false),
                ("r1".to_string(), Some("S1".to_string()), false),
                ("r2".to_string(), None, true),
                ("r3".to_string(), Some("S2".to_string()), true),
            ]
        );
        let stats = wf.stats();
        assert_eq!(stats.get(SeqStat::BarcodeCorrected), 1);
        assert_eq!(stats.get(SeqStat::UnknownBarcode), 1);
        assert_eq!(stats.get(SeqStat::MinSeqLen), 1);
        assert_eq!(
            serde_json::to_value(stats).unwrap()["unknown_barcode"],
            serde_json::json!(1)
        );
    }

    #[test]
    fn test_routing_failed_reads() {
        let mut wf = build_workflow(context(golay_options()));
        let input = reads(&["AACGCACGCTAGTT", "CCCGCACGCTAGTT"]);
        let out: Vec<String> = wf
            .run_with_failure(
                records(input),
                |p| format!("{} -> {}", p.item.sequence_id, p.item.sample.unwrap_or_default()),
                |p| format!("{} failed", p.item.sequence_id),
            )
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(out, vec!["r0 -> S1", "r1 failed"]);
    }

    #[test]
    fn test_id_mismatch_stops_the_run() {
        let mut wf = build_workflow(context(golay_options()));
        let seqs = vec![
            Ok(SeqRecord::new("a/1", "TTAC")),
            Ok(SeqRecord::new("b/1", "TTAC")),
            Ok(SeqRecord::new("c/1", "TTAC")),
        ];
        let barcodes = vec![
            Ok(SeqRecord::new("a/2", "AACGCACGCTAG")),
            Ok(SeqRecord::new("x/2", "AACGCACGCTAG")),
            Ok(SeqRecord::new("c/2", "AACGCACGCTAG")),
        ];
        let out: Vec<_> = wf.run(paired_records(seqs, barcodes)).collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap().item.sample.as_deref(), Some("S1"));
        let err = out[1].as_ref().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InputError>(),
            Some(InputError::IdMismatch { .. })
        ));
    }

    fn sharded_input() -> Vec<Result<Record>> {
        records(reads(&[
            "AACGCACGCTAGTT",
            "CACGCACGCTAGTT",
            "CCCGCACGCTAGTT",
            "AACTCGTCGATGTT",
            "GACGCACGCTAGTT",
        ]))
        .collect()
    }

    #[test]
    fn test_run_sharded() -> Result<()> {
        let compute = LocalContext::new(2);
        let ctx = context(golay_options());
        let mut input = sharded_input();
        let shards = vec![
            input.drain(..2).collect::<Vec<_>>(),
            input.drain(..1).collect(),
            input,
        ];
        let run = run_sharded(&compute, &ctx, shards)?;
        assert_eq!(run.shards.iter().map(Vec::len).collect_vec(), vec![2, 1, 2]);
        assert_eq!(run.shards[2][0].item.sample.as_deref(), Some("S2"));
        assert_eq!(run.stats.get(SeqStat::BarcodeCorrected), 2);
        assert_eq!(run.stats.get(SeqStat::UnknownBarcode), 1);

        // same answer as a single workflow over everything
        let mut wf = build_workflow(ctx.clone());
        let single: Vec<_> = wf.run(sharded_input()).collect::<Result<_>>()?;
        assert_eq!(run.shards.concat(), single);
        assert_eq!(&run.stats, wf.stats());
        Ok(())
    }

    #[test]
    fn test_run_sharded_error() {
        let compute = LocalContext::new(2);
        let ctx = context(golay_options());
        let shards = vec![
            records(reads(&["AACGCACGCTAGTT"])).collect::<Vec<_>>(),
            records(reads(&["NACGCACGCTAGTT"])).collect(),
        ];
        let err = run_sharded(&compute, &ctx, shards).err().unwrap();
        assert_eq!(err.to_string(), "processing shard 1");
    }
}

use super::SeqContext;
use crate::record::Record;
use crate::SeqStat;
use anyhow::Result;
use workflow::Pass;

/// Positional mismatches over the overlap of two sequences.
pub fn count_mismatches(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).filter(|(x, y)| x != y).count()
}

/// Find the first expected primer at the start of the read within the
/// mismatch tolerance, record it, and trim it unless it is to be retained.
///
/// Only the overlap of read and primer is compared, so a read shorter than
/// the primer is matched over its own length; an empty read matches the first
/// primer and records an empty `forward_primer`.
pub(crate) fn check_forward(ctx: &SeqContext, pass: &mut Pass<'_, Record, SeqStat>) -> Result<()> {
    let opts = ctx.options();
    let Some(max_mismatch) = opts.max_primer_mismatch else {
        return Ok(());
    };

    let expected = pass
        .final_barcode
        .as_deref()
        .and_then(|bc| ctx.primers().get(bc));
    let Some(expected) = expected else {
        pass.fail(SeqStat::UnknownPrimerBarcodePair);
        return Ok(());
    };

    let Some(primer) = expected
        .iter()
        .find(|p| count_mismatches(&pass.sequence, p) <= max_mismatch)
    else {
        pass.fail(SeqStat::ExceedsMaxPrimerMismatch);
        return Ok(());
    };

    let len = primer.len().min(pass.sequence.len());
    pass.forward_primer = Some(pass.sequence[..len].to_vec());
    if !opts.retain_primer {
        pass.trim_front(len);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::stages::build_workflow;
    use crate::stages::test_utils::*;
    use pretty_assertions::assert_eq;

    fn options(max_mismatch: usize, retain_primer: bool) -> Options {
        Options {
            check_primer: true,
            instrument_type: Some("454".to_string()),
            max_primer_mismatch: Some(max_mismatch),
            retain_primer,
            ..golay_options()
        }
    }

    const S2_READ: &str = "AACTCGTCGATGACGTACGTGGCC";

    #[test]
    fn test_count_mismatches() {
        assert_eq!(count_mismatches(b"ACGT", b"ACGT"), 0);
        assert_eq!(count_mismatches(b"ACGT", b"AGGA"), 2);
        assert_eq!(count_mismatches(b"AC", b"AGGA"), 1);
    }

    #[test]
    fn test_primer_found_and_trimmed() {
        let mut wf = build_workflow(context(options(0, false)));
        let rec = record_with_qual(S2_READ, &[30; 24]);
        let out = wf.process(rec).unwrap();
        assert!(!out.failed);
        assert_eq!(out.item.forward_primer, Some(b"ACGTACGT".to_vec()));
        assert_eq!(out.item.sequence, b"GGCC".to_vec());
        assert_eq!(out.item.qual, Some(vec![30; 4]));
    }

    #[test]
    fn test_primer_retained() {
        let mut wf = build_workflow(context(options(0, true)));
        let out = wf.process(record(S2_READ)).unwrap();
        assert!(!out.failed);
        assert_eq!(out.item.forward_primer, Some(b"ACGTACGT".to_vec()));
        assert_eq!(out.item.sequence, b"ACGTACGTGGCC".to_vec());
    }

    #[test]
    fn test_degenerate_primer() {
        let mut wf = build_workflow(context(options(1, false)));
        // M expands to A or C; one further mismatch is tolerated
        let read = "AACGCACGCTAGGTGCCAGCCGCCGCGGTTATTT";
        let out = wf.process(record(read)).unwrap();
        assert!(!out.failed);
        assert_eq!(
            out.item.forward_primer,
            Some(b"GTGCCAGCCGCCGCGGTTA".to_vec())
        );
        assert_eq!(out.item.sequence, b"TTT".to_vec());
    }

    #[test]
    fn test_primer_mismatch() {
        let mut wf = build_workflow(context(options(1, false)));
        let out = wf.process(record("AACTCGTCGATGTTTTACGTGGCC")).unwrap();
        assert!(out.failed);
        assert_eq!(out.item.forward_primer, None);
        assert_eq!(out.item.sequence, b"TTTTACGTGGCC".to_vec());
        assert_eq!(wf.stats().get(SeqStat::ExceedsMaxPrimerMismatch), 1);
    }

    #[test]
    fn test_empty_read_matches_first_primer() {
        let mut wf = build_workflow(context(options(0, false)));
        let out = wf.process(record(S2_BARCODE)).unwrap();
        assert!(!out.failed);
        assert!(out.item.sequence.is_empty());
        assert_eq!(out.item.forward_primer, Some(Vec::new()));
        assert_eq!(wf.stats().get(SeqStat::ExceedsMaxPrimerMismatch), 0);

        // a read cut short inside the primer is compared over what is left
        let out = wf.process(record("AACTCGTCGATGACGT")).unwrap();
        assert!(!out.failed);
        assert_eq!(out.item.forward_primer, Some(b"ACGT".to_vec()));
        assert!(out.item.sequence.is_empty());
    }

    #[test]
    fn test_unknown_primer_pair() {
        let mut wf = build_workflow(context(Options {
            demultiplex: false,
            ..options(0, false)
        }));
        let out = wf.process(record("ACGTACGT")).unwrap();
        assert!(out.failed);
        assert_eq!(wf.stats().get(SeqStat::UnknownPrimerBarcodePair), 1);
    }

    #[test]
    fn test_other_instruments_skip() {
        let mut wf = build_workflow(context(Options {
            instrument_type: Some("illumina".to_string()),
            ..options(0, false)
        }));
        let out = wf.process(record(S2_READ)).unwrap();
        assert!(!out.failed);
        assert_eq!(out.item.forward_primer, None);
        assert_eq!(out.item.sequence, b"ACGTACGTGGCC".to_vec());
    }
}

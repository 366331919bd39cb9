use super::SeqContext;
use crate::record::Record;
use crate::SeqStat;
use anyhow::Result;
use workflow::Pass;

/// Start and length of the longest run of scores at or below `threshold`.
/// The earliest run wins a tie. None if no score is that low.
pub fn longest_bad_run(qual: &[u8], threshold: u8) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut start = 0;
    let mut len = 0;
    for (i, &q) in qual.iter().enumerate() {
        if q <= threshold {
            if len == 0 {
                start = i;
            }
            len += 1;
            if best.map_or(true, |(_, best_len)| len > best_len) {
                best = Some((start, len));
            }
        } else {
            len = 0;
        }
    }
    best
}

/// Cut the read after the first base of its longest bad run if that run is
/// too long. At least one base is always kept.
pub(crate) fn max_bad_run_length(
    ctx: &SeqContext,
    pass: &mut Pass<'_, Record, SeqStat>,
) -> Result<()> {
    let opts = ctx.options();
    let (Some(threshold), Some(max_run)) = (opts.phred_quality_threshold, opts.max_bad_run_length)
    else {
        return Ok(());
    };
    let run = pass
        .qual
        .as_deref()
        .and_then(|qual| longest_bad_run(qual, threshold));
    if let Some((start, len)) = run {
        if len > max_run {
            pass.truncate(start + 1);
            pass.increment(SeqStat::QualityMaxBadRunLength);
        }
    }
    Ok(())
}

/// Fail reads where too few bases are above the threshold.
pub(crate) fn min_per_read_length_fraction(
    ctx: &SeqContext,
    pass: &mut Pass<'_, Record, SeqStat>,
) -> Result<()> {
    let opts = ctx.options();
    let (Some(threshold), Some(min_fraction)) =
        (opts.phred_quality_threshold, opts.min_per_read_length_fraction)
    else {
        return Ok(());
    };
    let Some(qual) = pass.qual.as_deref() else {
        return Ok(());
    };
    let bad_fraction = if qual.is_empty() {
        1.0
    } else {
        qual.iter().filter(|&&q| q <= threshold).count() as f64 / qual.len() as f64
    };
    if bad_fraction > 1.0 - min_fraction {
        pass.fail(SeqStat::MinPerReadLengthFraction);
    }
    Ok(())
}

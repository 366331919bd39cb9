use super::SeqContext;
use crate::record::Record;
use crate::SeqStat;
use anyhow::Result;
use workflow::Pass;

pub(crate) fn length_check(ctx: &SeqContext, pass: &mut Pass<'_, Record, SeqStat>) -> Result<()> {
    if let Some(min_len) = ctx.options().min_seq_len {
        if pass.sequence.len() < min_len {
            pass.fail(SeqStat::MinSeqLen);
        }
    }
    Ok(())
}

/// Fail reads with more `N` bases than allowed.
pub(crate) fn ambiguous_count(
    ctx: &SeqContext,
    pass: &mut Pass<'_, Record, SeqStat>,
) -> Result<()> {
    if let Some(max_ambiguous) = ctx.options().ambiguous_count {
        let count = pass
            .sequence
            .iter()
            .filter(|&&b| b == b'N' || b == b'n')
            .count();
        if count > max_ambiguous {
            pass.fail(SeqStat::AmbiguousCount);
        }
    }
    Ok(())
}

use super::SeqContext;
use crate::record::Record;
use crate::SeqStat;
use anyhow::{Context, Result};
use log::trace;
use workflow::Pass;

/// Resolve the read's sample from its barcode, correcting the barcode when it
/// has no exact match. Embedded barcodes are trimmed off the sequence.
pub(crate) fn assign_sample(ctx: &SeqContext, pass: &mut Pass<'_, Record, SeqStat>) -> Result<()> {
    let Some(corrector) = ctx.corrector() else {
        return Ok(());
    };
    let bc_length = corrector.barcode_length();

    let observed = match &pass.barcode {
        Some(barcode) => barcode.clone(),
        None => {
            let embedded = pass.sequence[..bc_length.min(pass.sequence.len())].to_vec();
            pass.trim_front(bc_length);
            embedded
        }
    };
    pass.original_barcode = Some(observed.clone());

    let (final_barcode, sample) = if let Some(sample) = ctx.barcodes().get(&observed) {
        pass.barcode_errors = Some(0);
        (Some(observed), Some(sample))
    } else if observed.len() != bc_length || !corrector.corrects() {
        (None, None)
    } else {
        let decoded = corrector
            .correct_barcode(&observed)
            .with_context(|| format!("decoding the barcode of read {}", pass.sequence_id))?;
        pass.barcode_errors = Some(decoded.num_errors);
        if decoded.barcode.is_some() {
            pass.increment(SeqStat::BarcodeCorrected);
        }
        let sample = decoded
            .barcode
            .as_deref()
            .and_then(|bc| ctx.barcodes().get(bc));
        (decoded.barcode, sample)
    };
    pass.final_barcode = final_barcode;

    match sample {
        Some(sample) => pass.sample = Some(sample.to_string()),
        None => {
            trace!("read {} has an unknown barcode", pass.sequence_id);
            pass.fail(SeqStat::UnknownBarcode);
        }
    }
    Ok(())
}

/// Fail reads whose barcode needed too many corrections.
pub(crate) fn max_barcode_error(
    ctx: &SeqContext,
    pass: &mut Pass<'_, Record, SeqStat>,
) -> Result<()> {
    let (Some(max_errors), Some(errors)) = (ctx.options().max_barcode_error, pass.barcode_errors)
    else {
        return Ok(());
    };
    if errors as f64 > max_errors {
        pass.fail(SeqStat::ExceedBarcodeError);
    }
    Ok(())
}

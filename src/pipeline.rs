use std::time::Instant;

use log::info;

use crate::classifier::Classifier;
use crate::denoise::Denoise;
use crate::denoising::Acceptance;
use crate::error::Result;

/// Tries each denoiser of `chain` in order until one of them lands a
/// candidate in `denoising`. Returns the name of the denoiser that did.
pub fn run_denoisers(
    model: &dyn Classifier,
    denoising: &mut dyn Acceptance,
    chain: &[Box<dyn Denoise>],
) -> Result<Option<&'static str>> {
    for denoiser in chain {
        let now = Instant::now();

        let accepted = denoiser.apply(model, denoising)?;

        info!("{:} execution time: {:.2?}", denoiser.name(), now.elapsed());
        if accepted {
            return Ok(Some(denoiser.name()));
        }
    }
    return Ok(None);
}

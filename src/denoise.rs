use log::{debug, info};

use crate::classifier::Classifier;
use crate::denoising::Acceptance;
use crate::error::Result;
use crate::tensor::ChwImage;

/// A parameterized transform swept over a fixed grid of strengths.
pub trait Denoise {
    fn name(&self) -> &'static str;

    /// Runs the sweep against `model`. `Ok(true)` when a candidate was accepted.
    fn apply(&self, model: &dyn Classifier, denoising: &mut dyn Acceptance) -> Result<bool>;
}

/// Queries `model` for each candidate in order and stops at the first one
/// `denoising` accepts. Candidates after it are never produced.
pub fn search<I>(
    name: &str,
    model: &dyn Classifier,
    denoising: &mut dyn Acceptance,
    candidates: I,
) -> Result<bool>
where
    I: IntoIterator<Item = Result<ChwImage>>,
{
    for (step, candidate) in candidates.into_iter().enumerate() {
        let candidate = candidate?;
        let label = model.predict_label(&candidate)?;
        debug!("{} step {}: label {}", name, step, label);
        if denoising.try_accept(&candidate, label) {
            info!("{} accepted at step {} with label {}", name, step, label);
            return Ok(true);
        }
    }
    debug!("{} exhausted its steps", name);
    Ok(false)
}

/// Odd kernel sizes `3, 5, ..` for steps `1..steps`; step 0 would be the identity.
pub fn kernel_sizes(steps: usize) -> impl Iterator<Item = usize> + Clone {
    (1..steps.max(1)).map(|step| step * 2 + 1)
}

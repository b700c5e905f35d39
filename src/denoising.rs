use log::info;
use serde::{Deserialize, Serialize};

use crate::tensor::ChwImage;

/// Acceptance logic owned by the caller.
///
/// Denoisers read [`Acceptance::input`], build candidates from it and hand
/// every `(candidate, label)` pair to [`Acceptance::try_accept`], stopping at
/// the first `true`.
pub trait Acceptance {
    fn input(&self) -> &ChwImage;

    /// Checks a candidate and records it when it is accepted.
    fn try_accept(&mut self, candidate: &ChwImage, label: usize) -> bool;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelCriterion {
    /// The prediction lands on `label`, e.g. the clean label of an
    /// adversarial input.
    Target { label: usize },
    /// The prediction left `label`.
    Misclassify { label: usize },
}

impl LabelCriterion {
    /// Targets `label` when one is given, otherwise asks for any label other
    /// than the one the input is predicted as.
    pub fn for_input(input_label: usize, label: Option<usize>) -> Self {
        match label {
            Some(label) => LabelCriterion::Target { label },
            None => LabelCriterion::Misclassify { label: input_label },
        }
    }

    pub fn is_successful(&self, predicted: usize) -> bool {
        match *self {
            LabelCriterion::Target { label } => predicted == label,
            LabelCriterion::Misclassify { label } => predicted != label,
        }
    }
}

/// Record tracking the input of a denoising search and its accepted result.
#[derive(Debug, Clone)]
pub struct Denoising {
    input: ChwImage,
    criterion: LabelCriterion,
    denoised: Option<ChwImage>,
    denoised_label: Option<usize>,
    queries: usize,
}

impl Denoising {
    pub fn new(input: ChwImage, criterion: LabelCriterion) -> Self {
        Denoising {
            input,
            criterion,
            denoised: None,
            denoised_label: None,
            queries: 0,
        }
    }

    pub fn criterion(&self) -> LabelCriterion {
        self.criterion
    }

    pub fn is_successful(&self) -> bool {
        self.denoised.is_some()
    }

    pub fn denoised(&self) -> Option<&ChwImage> {
        self.denoised.as_ref()
    }

    pub fn denoised_label(&self) -> Option<usize> {
        self.denoised_label
    }

    /// Number of candidates handed to [`Acceptance::try_accept`].
    pub fn queries(&self) -> usize {
        self.queries
    }

    pub fn reset(&mut self) {
        self.denoised = None;
        self.denoised_label = None;
        self.queries = 0;
    }
}

impl Acceptance for Denoising {
    fn input(&self) -> &ChwImage {
        &self.input
    }

    fn try_accept(&mut self, candidate: &ChwImage, label: usize) -> bool {
        self.queries += 1;
        let accepted = self.criterion.is_successful(label);
        // the first accepted candidate is kept
        if accepted && self.denoised.is_none() {
            info!("accepted candidate with label {} after {} queries", label, self.queries);
            self.denoised = Some(candidate.clone());
            self.denoised_label = Some(label);
        }
        accepted
    }
}

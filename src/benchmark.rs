use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::denoising::LabelCriterion;
use crate::error::Result;
use crate::noise::{salt_and_pepper, seeded_rng};
use crate::tensor::ChwImage;

fn benchmark_epsilons() -> usize {
    100
}

fn benchmark_repetitions() -> usize {
    10
}

/// Smallest salt-and-pepper proportion that flips the prediction of a model.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SaltAndPepperBenchmark {
    #[serde(default = "benchmark_epsilons")]
    pub epsilons: usize,
    #[serde(default = "benchmark_repetitions")]
    pub repetitions: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SaltAndPepperBenchmark {
    fn default() -> Self {
        SaltAndPepperBenchmark {
            epsilons: benchmark_epsilons(),
            repetitions: benchmark_repetitions(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BenchmarkOutcome {
    pub adversarial: Option<ChwImage>,
    pub label: Option<usize>,
    pub epsilon: Option<f32>,
    /// Mean squared error between the adversarial and the clean image.
    pub distance: Option<f32>,
    pub queries: usize,
}

impl BenchmarkOutcome {
    pub fn is_adversarial(&self) -> bool {
        self.adversarial.is_some()
    }
}

/// Growth of the epsilon cap after a hit, so the next repetition can still
/// find a closer adversary slightly above the last epsilon.
const MAX_EPSILON_GROWTH: f32 = 1.2;

/// Proportions `max_epsilon * i / epsilons` for `i in 1..=epsilons`.
pub fn epsilon_grid(max_epsilon: f32, epsilons: usize) -> impl Iterator<Item = f32> {
    (1..=epsilons).map(move |i| max_epsilon * i as f32 / epsilons as f32)
}

/// Cap for the repetition after a hit at `epsilon`, never above 1.
pub fn next_max_epsilon(epsilon: f32) -> f32 {
    (epsilon * MAX_EPSILON_GROWTH).min(1.0)
}

impl SaltAndPepperBenchmark {
    /// Sweeps the noise proportion upwards `repetitions` times. A
    /// misclassification ends the repetition and caps the range of the
    /// following ones just above the proportion that caused it. Candidates
    /// no closer to the clean image than the best adversary so far are
    /// skipped without querying the model.
    pub fn run(&self, model: &dyn Classifier, image: &ChwImage, label: usize) -> Result<BenchmarkOutcome> {
        let criterion = LabelCriterion::Misclassify { label };
        let mut rng = seeded_rng(self.seed);
        let mut outcome = BenchmarkOutcome {
            adversarial: None,
            label: None,
            epsilon: None,
            distance: None,
            queries: 0,
        };
        if self.epsilons == 0 {
            warn!("salt and pepper benchmark without epsilons never queries the model");
            return Ok(outcome);
        }

        let mut max_epsilon = 1.0f32;
        for repetition in 0..self.repetitions {
            for epsilon in epsilon_grid(max_epsilon, self.epsilons) {
                let noisy = salt_and_pepper(image, epsilon, &mut rng);
                let distance = noisy.mse(image)?;
                if outcome.distance.map_or(false, |best| distance >= best) {
                    continue;
                }

                let predicted = model.predict_label(&noisy)?;
                outcome.queries += 1;
                if !criterion.is_successful(predicted) {
                    continue;
                }

                debug!("repetition {}: label {} at epsilon {:.4}, distance {:.6}", repetition, predicted, epsilon, distance);
                outcome.adversarial = Some(noisy);
                outcome.label = Some(predicted);
                outcome.epsilon = Some(epsilon);
                outcome.distance = Some(distance);
                max_epsilon = next_max_epsilon(epsilon);
                break;
            }
        }

        match (outcome.epsilon, outcome.distance) {
            (Some(epsilon), Some(distance)) => info!(
                "adversary found at epsilon {:.4}, distance {:.6} after {} queries",
                epsilon, distance, outcome.queries
            ),
            _ => info!("no adversary found after {} queries", outcome.queries),
        }
        Ok(outcome)
    }
}

use log::warn;
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::denoise::{search, Denoise};
use crate::denoising::Acceptance;
use crate::error::{DenoiseError, Result};
use crate::helpers::index2d;
use crate::tensor::ChwImage;

/// Seeded generator when a seed is configured, OS entropy otherwise.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Adds zero-mean noise in place and clips back into `[0, 1]`.
pub fn add_gaussian_noise<R: Rng>(data: &mut Array3<f32>, mean: f32, variance: f32, rng: &mut R) -> Result<()> {
    let normal = Normal::new(mean, variance.sqrt())
        .map_err(|e| DenoiseError::Config(format!("gaussian noise: {}", e)))?;
    data.mapv_inplace(|x| (x + normal.sample(rng)).clamp(0.0, 1.0));
    Ok(())
}

/// Each pixel turns white with probability `proportion / 2` and black with
/// the same probability; all channels of a pixel move together.
pub fn salt_and_pepper<R: Rng>(image: &ChwImage, proportion: f32, rng: &mut R) -> ChwImage {
    let threshold = proportion / 2.0;
    let mut data = image.as_array().clone();
    let (height, width) = (image.height(), image.width());
    for (_, y, x) in index2d(height, width) {
        let random_number: f32 = rng.gen();
        let value = if random_number < threshold {
            1.0
        } else if random_number > 1.0 - threshold {
            0.0
        } else {
            continue;
        };
        for c in 0..image.channels() {
            data[[c, y, x]] = value;
        }
    }
    ChwImage::from_trusted(data)
}

/// Copies `proportion * H * W` randomly chosen pixels from a random
/// neighbour at most `window` away, one channel at a time.
pub fn pixel_deflection<R: Rng>(image: &ChwImage, proportion: f32, window: i64, rng: &mut R) -> ChwImage {
    let mut data = image.as_array().clone();
    let (height, width) = (image.height() as i64, image.width() as i64);
    if height < 2 || width < 2 {
        warn!("pixel deflection needs at least a 2x2 image, got {}x{}", height, width);
        return image.clone();
    }
    let window = window.max(2);
    let mut deflections = (proportion * (height * width) as f32) as usize;
    while deflections > 0 {
        for c in 0..image.channels() {
            let (x, y) = (rng.gen_range(0..height - 1), rng.gen_range(0..width - 1));
            // the source pixel must stay strictly inside the image
            let (a, b) = loop {
                let (a, b) = (rng.gen_range(-window..window), rng.gen_range(-window..window));
                if x + a < height && x + a > 0 && y + b < width && y + b > 0 {
                    break (a, b);
                }
            };
            data[[c, x as usize, y as usize]] = data[[c, (x + a) as usize, (y + b) as usize]];
        }
        deflections -= 1;
    }
    ChwImage::from_trusted(data)
}

fn noise_steps() -> usize {
    10
}

fn deflection_steps() -> usize {
    5
}

fn deflection_window() -> i64 {
    10
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GaussianNoise {
    #[serde(default = "noise_steps")]
    pub steps: usize,
    #[serde(default)]
    pub mean: f32,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for GaussianNoise {
    fn default() -> Self {
        GaussianNoise {
            steps: noise_steps(),
            mean: 0.0,
            seed: None,
        }
    }
}

impl Denoise for GaussianNoise {
    fn name(&self) -> &'static str {
        "GaussianNoise"
    }

    /// Noise accumulates: step `s` adds variance `s / 100` on top of the
    /// previous candidate.
    fn apply(&self, model: &dyn Classifier, denoising: &mut dyn Acceptance) -> Result<bool> {
        let mut rng = seeded_rng(self.seed);
        let mut current = denoising.input().as_array().clone();
        let candidates = (1..self.steps * 10).map(|step| -> Result<ChwImage> {
            add_gaussian_noise(&mut current, self.mean, step as f32 / 100.0, &mut rng)?;
            Ok(ChwImage::from_trusted(current.clone()))
        });
        search(self.name(), model, denoising, candidates)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SaltPepperNoise {
    #[serde(default = "noise_steps")]
    pub steps: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SaltPepperNoise {
    fn default() -> Self {
        SaltPepperNoise { steps: noise_steps(), seed: None }
    }
}

impl Denoise for SaltPepperNoise {
    fn name(&self) -> &'static str {
        "SaltPepperNoise"
    }

    fn apply(&self, model: &dyn Classifier, denoising: &mut dyn Acceptance) -> Result<bool> {
        let mut rng = seeded_rng(self.seed);
        let input = denoising.input().clone();
        let candidates = (1..self.steps * 10).map(|step| Ok(salt_and_pepper(&input, step as f32 / 100.0, &mut rng)));
        search(self.name(), model, denoising, candidates)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PixelDeflection {
    #[serde(default = "deflection_steps")]
    pub steps: usize,
    #[serde(default = "deflection_window")]
    pub window: i64,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for PixelDeflection {
    fn default() -> Self {
        PixelDeflection {
            steps: deflection_steps(),
            window: deflection_window(),
            seed: None,
        }
    }
}

impl Denoise for PixelDeflection {
    fn name(&self) -> &'static str {
        "PixelDeflection"
    }

    fn apply(&self, model: &dyn Classifier, denoising: &mut dyn Acceptance) -> Result<bool> {
        let mut rng = seeded_rng(self.seed);
        let input = denoising.input().clone();
        let candidates = (1..self.steps.max(1))
            .map(|step| Ok(pixel_deflection(&input, step as f32 / 100.0, self.window, &mut rng)));
        search(self.name(), model, denoising, candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::denoise::testing::*;

    #[test]
    fn test_salt_and_pepper_extremes() {
        let input = ChwImage::filled(8, 8, 0.5).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(salt_and_pepper(&input, 0.0, &mut rng), input);

        let noisy = salt_and_pepper(&input, 1.0, &mut rng);
        assert!(noisy.as_array().iter().all(|v| *v == 0.0 || *v == 1.0));
    }

    #[test]
    fn test_salt_and_pepper_moves_channels_together() {
        let input = gradient_image(10, 10);
        let mut rng = StdRng::seed_from_u64(11);
        let noisy = salt_and_pepper(&input, 0.6, &mut rng);
        let view = noisy.view();
        for y in 0..10 {
            for x in 0..10 {
                let pixel = [view[[0, y, x]], view[[1, y, x]], view[[2, y, x]]];
                if pixel != [input.view()[[0, y, x]], input.view()[[1, y, x]], input.view()[[2, y, x]]] {
                    assert!(pixel == [1.0; 3] || pixel == [0.0; 3], "{:?}", pixel);
                }
            }
        }
    }

    #[test]
    fn test_gaussian_noise_stays_in_range() {
        let mut data = ChwImage::filled(6, 6, 0.5).unwrap().into_inner();
        let mut rng = StdRng::seed_from_u64(5);
        add_gaussian_noise(&mut data, 0.0, 0.5, &mut rng).unwrap();
        assert!(data.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(data.iter().any(|v| *v != 0.5));

        assert!(add_gaussian_noise(&mut data, 0.0, -1.0, &mut rng).is_err());
    }

    #[test]
    fn test_pixel_deflection_copies_existing_values() {
        let input = gradient_image(12, 12);
        let mut rng = StdRng::seed_from_u64(9);
        let deflected = pixel_deflection(&input, 0.5, 10, &mut rng);
        assert_ne!(deflected, input);
        for c in 0..3 {
            let originals: Vec<f32> = input.view().slice(ndarray::s![c, .., ..]).iter().cloned().collect();
            for value in deflected.view().slice(ndarray::s![c, .., ..]).iter() {
                assert!(originals.contains(value));
            }
        }
    }

    #[test]
    fn test_pixel_deflection_on_tiny_images() {
        let input = ChwImage::filled(1, 5, 0.2).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pixel_deflection(&input, 1.0, 10, &mut rng), input);

        let input = gradient_image(2, 2);
        let deflected = pixel_deflection(&input, 1.0, 1, &mut rng);
        assert_eq!(deflected.shape(), [3, 2, 2]);
    }

    #[test]
    fn test_noise_sweeps_follow_search_contract() {
        let input = gradient_image(10, 10);
        check_search_contract(&GaussianNoise { steps: 1, mean: 0.0, seed: Some(1) }, input.clone(), 9);
        check_search_contract(&SaltPepperNoise { steps: 1, seed: Some(2) }, input.clone(), 9);
        check_search_contract(&PixelDeflection { steps: 5, window: 10, seed: Some(3) }, input, 4);
    }

    #[test]
    fn test_seeded_sweeps_are_reproducible() {
        let input = gradient_image(10, 10);
        let noise = GaussianNoise { steps: 1, mean: 0.0, seed: Some(42) };
        assert_eq!(candidates_of(&noise, input.clone()), candidates_of(&noise, input.clone()));

        let salt = SaltPepperNoise { steps: 1, seed: Some(42) };
        assert_eq!(candidates_of(&salt, input.clone()), candidates_of(&salt, input.clone()));

        let other_seed = SaltPepperNoise { steps: 1, seed: Some(43) };
        assert_ne!(candidates_of(&salt, input.clone()), candidates_of(&other_seed, input.clone()));

        let deflection = PixelDeflection { seed: Some(42), ..PixelDeflection::default() };
        assert_eq!(candidates_of(&deflection, input.clone()), candidates_of(&deflection, input));
    }

    #[test]
    fn test_gaussian_noise_accumulates() {
        let input = ChwImage::filled(16, 16, 0.5).unwrap();
        let noise = GaussianNoise { steps: 1, mean: 0.0, seed: Some(7) };
        let candidates = candidates_of(&noise, input.clone());
        let first = candidates[0].mse(&input).unwrap();
        let last = candidates[candidates.len() - 1].mse(&input).unwrap();
        assert!(last > first);
    }
}

use image::imageops::{self, FilterType};
use image::Rgb32FImage;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::denoise::{search, Denoise};
use crate::denoising::Acceptance;
use crate::error::Result;
use crate::noise::seeded_rng;
use crate::tensor::ChwImage;

/// Random resize-then-pad layout of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    pub resize_h: usize,
    pub resize_w: usize,
    pub pad_top: usize,
    pub pad_left: usize,
    pub max_h: usize,
    pub max_w: usize,
}

impl Jitter {
    /// Step `step` of `steps` may grow the image by up to a quarter of its
    /// size times `step / steps`. The padded output is always
    /// `(height + max_h, width + max_w)`.
    pub fn sample<R: Rng>(height: usize, width: usize, step: usize, steps: usize, rng: &mut R) -> Self {
        let max_h = (height * step) as f64 / steps as f64 / 4.0;
        let max_w = (width * step) as f64 / steps as f64 / 4.0;
        let (max_h, max_w) = (max_h as usize, max_w as usize);

        let resize_h = rng.gen_range(0..=max_h);
        let resize_w = rng.gen_range(0..=max_w);
        let pad_top = rng.gen_range(0..=max_h - resize_h);
        let pad_left = rng.gen_range(0..=max_w - resize_w);
        Jitter {
            resize_h,
            resize_w,
            pad_top,
            pad_left,
            max_h,
            max_w,
        }
    }

    pub fn apply(&self, image: &Rgb32FImage) -> Rgb32FImage {
        let (width, height) = image.dimensions();
        let resized = imageops::resize(
            image,
            width + self.resize_w as u32,
            height + self.resize_h as u32,
            FilterType::Triangle,
        );
        let mut canvas = Rgb32FImage::new(width + self.max_w as u32, height + self.max_h as u32);
        imageops::replace(&mut canvas, &resized, self.pad_left as i64, self.pad_top as i64);
        canvas
    }
}

fn jitter_steps() -> usize {
    10
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResizePadding {
    #[serde(default = "jitter_steps")]
    pub steps: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ResizePadding {
    fn default() -> Self {
        ResizePadding { steps: jitter_steps(), seed: None }
    }
}

impl Denoise for ResizePadding {
    fn name(&self) -> &'static str {
        "ResizePadding"
    }

    fn apply(&self, model: &dyn Classifier, denoising: &mut dyn Acceptance) -> Result<bool> {
        let mut rng = seeded_rng(self.seed);
        let input = denoising.input();
        let (height, width) = (input.height(), input.width());
        let source = input.to_rgb32f();
        let candidates = (1..self.steps.max(1)).map(|step| {
            let jitter = Jitter::sample(height, width, step, self.steps, &mut rng);
            ChwImage::from_rgb32f(&jitter.apply(&source))
        });
        search(self.name(), model, denoising, candidates)
    }
}

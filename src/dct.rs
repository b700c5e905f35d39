//! Sliding-window DCT denoising.
//!
//! Every `psize x psize` patch of each decorrelated colour plane is moved to
//! the DCT domain, coefficients below `3 * sigma` are zeroed (the DC term is
//! always kept), and the inverse transforms of all overlapping patches are
//! averaged back into the plane.

use std::f32::consts::PI;

use image::{Rgb, RgbImage};
use itertools::Itertools;
use log::warn;
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::conditional_paralell::prelude::*;
use crate::denoise::{search, Denoise};
use crate::denoising::Acceptance;
use crate::error::{DenoiseError, Result};
use crate::tensor::ChwImage;

const SQRT_3: f32 = 1.732_050_8;
const SQRT_2: f32 = std::f32::consts::SQRT_2;
const SQRT_6: f32 = 2.449_489_7;

/// Orthonormal RGB decorrelation; its transpose is the inverse.
const DECORRELATION: [[f32; 3]; 3] = [
    [1.0 / SQRT_3, 1.0 / SQRT_3, 1.0 / SQRT_3],
    [1.0 / SQRT_2, 0.0, -1.0 / SQRT_2],
    [1.0 / SQRT_6, -2.0 / SQRT_6, 1.0 / SQRT_6],
];

const THRESHOLD_FACTOR: f32 = 3.0;

/// Orthonormal DCT-II matrix, `C · x` transforms a column vector.
pub fn dct_matrix(size: usize) -> Array2<f32> {
    let n = size as f32;
    Array2::from_shape_fn((size, size), |(k, i)| {
        let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
        scale * (PI * (2.0 * i as f32 + 1.0) * k as f32 / (2.0 * n)).cos()
    })
}

fn denoise_plane(plane: &Array2<f32>, basis: &Array2<f32>, threshold: f32) -> Array2<f32> {
    let psize = basis.nrows();
    let (height, width) = plane.dim();
    let mut accumulated = Array2::<f32>::zeros((height, width));
    let mut weights = Array2::<f32>::zeros((height, width));

    for y in 0..=(height - psize) {
        for x in 0..=(width - psize) {
            let patch = plane.slice(s![y..y + psize, x..x + psize]);
            let mut coefficients = basis.dot(&patch).dot(&basis.t());
            let dc = coefficients[[0, 0]];
            coefficients.mapv_inplace(|c| if c.abs() < threshold { 0.0 } else { c });
            coefficients[[0, 0]] = dc;
            let restored = basis.t().dot(&coefficients).dot(basis);

            let mut target = accumulated.slice_mut(s![y..y + psize, x..x + psize]);
            target += &restored;
            let mut count = weights.slice_mut(s![y..y + psize, x..x + psize]);
            count += 1.0;
        }
    }

    accumulated / weights
}

pub fn dct_denoise(image: &RgbImage, sigma: f32, psize: usize) -> Result<RgbImage> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    if psize == 0 {
        return Err(DenoiseError::Config("DCT patch size must be positive".to_string()));
    }
    let psize = if psize > width.min(height) {
        warn!("DCT patch size {} exceeds the {}x{} image, shrinking it", psize, width, height);
        width.min(height)
    } else {
        psize
    };
    if sigma <= 0.0 {
        return Ok(image.clone());
    }

    let planes: Vec<Array2<f32>> = DECORRELATION.iter().map(|row|{
        Array2::from_shape_fn((height, width), |(y, x)| {
            let [r, g, b] = image.get_pixel(x as u32, y as u32).0;
            row[0] * r as f32 + row[1] * g as f32 + row[2] * b as f32
        })
    }).collect();

    let basis = dct_matrix(psize);
    let threshold = THRESHOLD_FACTOR * sigma;
    let denoised: Vec<Array2<f32>> = planes.par_iter().map(|plane| denoise_plane(plane, &basis, threshold)).collect();

    Ok(RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb(std::array::from_fn(|c| {
            let value: f32 = (0..3).map(|k| DECORRELATION[k][c] * denoised[k][[y, x]]).sum();
            value.round().clamp(0.0, 255.0) as u8
        }))
    }))
}

fn dct_steps() -> usize {
    10
}

fn dct_patch_sizes() -> Vec<usize> {
    vec![8, 16]
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DctCompression {
    #[serde(default = "dct_steps")]
    pub steps: usize,
    #[serde(default = "dct_patch_sizes")]
    pub patch_sizes: Vec<usize>,
}

impl Default for DctCompression {
    fn default() -> Self {
        DctCompression {
            steps: dct_steps(),
            patch_sizes: dct_patch_sizes(),
        }
    }
}

impl DctCompression {
    /// `(patch size, sigma)` pairs in search order: every sigma `0, 5, ..`
    /// for the first patch size, then for the next.
    pub fn grid(&self) -> Vec<(usize, f32)> {
        self.patch_sizes
            .iter()
            .cartesian_product(0..self.steps * 2)
            .map(|(&psize, step)| (psize, step as f32 * 5.0))
            .collect()
    }
}

impl Denoise for DctCompression {
    fn name(&self) -> &'static str {
        "DctCompression"
    }

    fn apply(&self, model: &dyn Classifier, denoising: &mut dyn Acceptance) -> Result<bool> {
        let source = denoising.input().to_rgb8();
        let candidates = self
            .grid()
            .into_iter()
            .map(|(psize, sigma)| dct_denoise(&source, sigma, psize).map(|denoised| ChwImage::from_rgb8(&denoised)));
        search(self.name(), model, denoising, candidates)
    }
}

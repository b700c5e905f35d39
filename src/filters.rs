use image::{Rgb, RgbImage};
use imageproc::filter::{gaussian_blur_f32, median_filter};
use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::conditional_paralell::prelude::*;
use crate::denoise::{kernel_sizes, search, Denoise};
use crate::denoising::Acceptance;
use crate::error::Result;
use crate::helpers::{to_u8_pixel, weighted_average, PixelTail, Stats};
use crate::tensor::ChwImage;

/// Blur sweeps share one loop: 8-bit copy of the input, one kernel per size.
fn sweep_kernels<F>(
    name: &str,
    steps: usize,
    model: &dyn Classifier,
    denoising: &mut dyn Acceptance,
    blur: F,
) -> Result<bool>
where
    F: Fn(&RgbImage, usize) -> RgbImage,
{
    let source = denoising.input().to_rgb8();
    let candidates = kernel_sizes(steps).map(|kernel_size| Ok(ChwImage::from_rgb8(&blur(&source, kernel_size))));
    search(name, model, denoising, candidates)
}

/// Sigma picked for a kernel size when none is given.
pub fn sigma_for_kernel(kernel_size: usize) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

pub fn gaussian_blur(image: &RgbImage, kernel_size: usize) -> RgbImage {
    gaussian_blur_f32(image, sigma_for_kernel(kernel_size))
}

pub fn median_blur(image: &RgbImage, kernel_size: usize) -> RgbImage {
    let radius = (kernel_size / 2) as u32;
    median_filter(image, radius, radius)
}

/// Normalized box filter with a replicated border.
pub fn box_blur(image: &RgbImage, kernel_size: usize) -> RgbImage {
    let radius = kernel_size / 2;
    let (width, height) = (image.width() as usize, image.height() as usize);

    let rows: Vec<Vec<[u8; 3]>> = (0..height).into_par_iter().map(|y|{
        (0..width).map(|x|{
            let tail = image.get_px_tail(radius, y, x);
            let channel = |c: usize| tail.iter().map(|p| p[c]).collect::<Vec<f32>>();
            to_u8_pixel([channel(0).iter().mean(), channel(1).iter().mean(), channel(2).iter().mean()])
        }).collect()
    }).collect();

    from_rows(width, height, rows)
}

/// Edge preserving blur; weights fall off with distance and with the L1
/// colour difference to the centre pixel.
pub fn bilateral_blur(image: &RgbImage, diameter: usize, sigma_color: f32, sigma_space: f32) -> RgbImage {
    let radius = diameter / 2;
    let (width, height) = (image.width() as usize, image.height() as usize);
    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    let rows: Vec<Vec<[u8; 3]>> = (0..height).into_par_iter().map(|y|{
        (0..width).map(|x|{
            let [cr, cg, cb] = image.get_pixel(x as u32, y as u32).0.map(|v| v as f32);
            let weights_and_values = image.get_tail(radius, y, x).into_iter().filter_map(|(dy, dx, pixel)|{
                let spatial_distance_squared = (dy*dy + dx*dx) as f32;
                // circular window
                if spatial_distance_squared > (radius*radius) as f32 {
                    return None
                }
                let color_distance = (pixel[0]-cr).abs() + (pixel[1]-cg).abs() + (pixel[2]-cb).abs();
                let weight = (spatial_distance_squared*space_coeff + color_distance*color_distance*color_coeff).exp();
                Some((weight, pixel))
            });
            to_u8_pixel(weighted_average(weights_and_values))
        }).collect()
    }).collect();

    from_rows(width, height, rows)
}

fn from_rows(width: usize, height: usize, rows: Vec<Vec<[u8; 3]>>) -> RgbImage {
    let mut output = RgbImage::new(width as u32, height as u32);
    for (y, row) in rows.into_iter().enumerate() {
        for (x, pixel) in row.into_iter().enumerate() {
            output.put_pixel(x as u32, y as u32, Rgb(pixel));
        }
    }
    output
}

fn blur_steps() -> usize {
    5
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GaussianBlur {
    #[serde(default = "blur_steps")]
    pub steps: usize,
}

impl Default for GaussianBlur {
    fn default() -> Self {
        GaussianBlur { steps: blur_steps() }
    }
}

impl Denoise for GaussianBlur {
    fn name(&self) -> &'static str {
        "GaussianBlur"
    }

    fn apply(&self, model: &dyn Classifier, denoising: &mut dyn Acceptance) -> Result<bool> {
        sweep_kernels(self.name(), self.steps, model, denoising, gaussian_blur)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MedianBlur {
    #[serde(default = "blur_steps")]
    pub steps: usize,
}

impl Default for MedianBlur {
    fn default() -> Self {
        MedianBlur { steps: blur_steps() }
    }
}

impl Denoise for MedianBlur {
    fn name(&self) -> &'static str {
        "MedianBlur"
    }

    fn apply(&self, model: &dyn Classifier, denoising: &mut dyn Acceptance) -> Result<bool> {
        sweep_kernels(self.name(), self.steps, model, denoising, median_blur)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BoxFilter {
    #[serde(default = "blur_steps")]
    pub steps: usize,
}

impl Default for BoxFilter {
    fn default() -> Self {
        BoxFilter { steps: blur_steps() }
    }
}

impl Denoise for BoxFilter {
    fn name(&self) -> &'static str {
        "BoxFilter"
    }

    fn apply(&self, model: &dyn Classifier, denoising: &mut dyn Acceptance) -> Result<bool> {
        sweep_kernels(self.name(), self.steps, model, denoising, box_blur)
    }
}

/// Same kernel as [`BoxFilter`], kept under its own name for chain configs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MeanFilter {
    #[serde(default = "blur_steps")]
    pub steps: usize,
}

impl Default for MeanFilter {
    fn default() -> Self {
        MeanFilter { steps: blur_steps() }
    }
}

impl Denoise for MeanFilter {
    fn name(&self) -> &'static str {
        "MeanFilter"
    }

    fn apply(&self, model: &dyn Classifier, denoising: &mut dyn Acceptance) -> Result<bool> {
        sweep_kernels(self.name(), self.steps, model, denoising, box_blur)
    }
}

fn bilateral_sigma() -> f32 {
    50.0
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BilateralFilter {
    #[serde(default = "blur_steps")]
    pub steps: usize,
    #[serde(default = "bilateral_sigma")]
    pub sigma_color: f32,
    #[serde(default = "bilateral_sigma")]
    pub sigma_space: f32,
}

impl Default for BilateralFilter {
    fn default() -> Self {
        BilateralFilter {
            steps: blur_steps(),
            sigma_color: bilateral_sigma(),
            sigma_space: bilateral_sigma(),
        }
    }
}

impl Denoise for BilateralFilter {
    fn name(&self) -> &'static str {
        "BilateralFilter"
    }

    fn apply(&self, model: &dyn Classifier, denoising: &mut dyn Acceptance) -> Result<bool> {
        sweep_kernels(self.name(), self.steps, model, denoising, |image, diameter| {
            bilateral_blur(image, diameter, self.sigma_color, self.sigma_space)
        })
    }
}

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage};
use log::warn;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::conditional_paralell::prelude::*;
use crate::denoise::{search, Denoise};
use crate::denoising::Acceptance;
use crate::error::{DenoiseError, Result};
use crate::tensor::ChwImage;

fn compression_steps() -> usize {
    10
}

/// Quality `100, 95, ..` for `2 * steps` re-encodes, never below 1.
pub fn jpeg_qualities(steps: usize) -> impl Iterator<Item = u8> {
    (0..steps * 2).map(|step| 100usize.saturating_sub(step * 5).max(1) as u8)
}

pub fn jpeg_roundtrip(image: &RgbImage, quality: u8) -> Result<RgbImage> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality).encode_image(image)?;
    let decoded = image::load_from_memory_with_format(&buffer, ImageFormat::Jpeg)?;
    Ok(decoded.to_rgb8())
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JpegCompression {
    #[serde(default = "compression_steps")]
    pub steps: usize,
}

impl Default for JpegCompression {
    fn default() -> Self {
        JpegCompression { steps: compression_steps() }
    }
}

impl Denoise for JpegCompression {
    fn name(&self) -> &'static str {
        "JpegCompression"
    }

    fn apply(&self, model: &dyn Classifier, denoising: &mut dyn Acceptance) -> Result<bool> {
        let source = denoising.input().to_rgb8();
        let candidates = jpeg_qualities(self.steps)
            .map(|quality| jpeg_roundtrip(&source, quality).map(|decoded| ChwImage::from_rgb8(&decoded)));
        search(self.name(), model, denoising, candidates)
    }
}

/// Retained component counts: `height - stride * step` for `2 * steps` steps.
pub fn pca_dimensions(height: usize, steps: usize) -> Vec<usize> {
    let new_steps = steps * 2;
    if new_steps == 0 {
        return vec![];
    }
    let stride = height / new_steps;
    if stride == 0 {
        warn!("image height {} is below {} PCA steps, every step keeps all components", height, new_steps);
    }
    (0..new_steps).map(|step| height - stride * step).collect()
}

/// Projects one channel (rows are samples) onto its `dim` leading principal
/// components and back.
pub fn pca_project(channel: &DMatrix<f64>, dim: usize) -> Result<DMatrix<f64>> {
    let (rows, cols) = channel.shape();
    let mean = channel.row_mean();
    let mut centered = channel.clone();
    for mut row in centered.row_iter_mut() {
        row -= &mean;
    }

    let svd = centered.clone().svd(false, true);
    let v_t = svd.v_t.ok_or(DenoiseError::Pca("right singular vectors were not computed"))?;

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|a, b| svd.singular_values[*b].total_cmp(&svd.singular_values[*a]));
    order.truncate(dim.min(rows).min(cols));

    let basis = v_t.select_rows(order.iter());
    let mut restored = (&centered * basis.transpose()) * &basis;
    for mut row in restored.row_iter_mut() {
        row += &mean;
    }
    Ok(restored)
}

pub fn pca_compress(image: &RgbImage, dim: usize) -> Result<RgbImage> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let channels: Vec<DMatrix<f64>> = (0..3).map(|c| {
        DMatrix::from_fn(height, width, |y, x| image.get_pixel(x as u32, y as u32)[c] as f64)
    }).collect();

    let restored = channels.par_iter()
        .map(|channel| pca_project(channel, dim))
        .collect::<Result<Vec<_>>>()?;

    Ok(RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb(std::array::from_fn(|c| restored[c][(y, x)].round().clamp(0.0, 255.0) as u8))
    }))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PcaCompression {
    #[serde(default = "compression_steps")]
    pub steps: usize,
}

impl Default for PcaCompression {
    fn default() -> Self {
        PcaCompression { steps: compression_steps() }
    }
}

impl Denoise for PcaCompression {
    fn name(&self) -> &'static str {
        "PcaCompression"
    }

    fn apply(&self, model: &dyn Classifier, denoising: &mut dyn Acceptance) -> Result<bool> {
        let input = denoising.input();
        let source = input.to_rgb8();
        let dimensions = pca_dimensions(input.height(), self.steps);
        let candidates = dimensions
            .into_iter()
            .map(|dim| pca_compress(&source, dim).map(|restored| ChwImage::from_rgb8(&restored)));
        search(self.name(), model, denoising, candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::denoise::testing::*;

    #[test]
    fn test_jpeg_quality_grid() {
        let qualities: Vec<u8> = jpeg_qualities(10).collect();
        assert_eq!(qualities.len(), 20);
        assert_eq!(qualities[0], 100);
        assert_eq!(qualities[19], 5);
        assert_eq!(jpeg_qualities(12).last(), Some(1));
    }

    #[test]
    fn test_jpeg_roundtrip_keeps_size() {
        let image = gradient_image(16, 24).to_rgb8();
        let decoded = jpeg_roundtrip(&image, 50).unwrap();
        assert_eq!(decoded.dimensions(), (24, 16));
    }

    #[test]
    fn test_jpeg_follows_search_contract() {
        let input = gradient_image(16, 16);
        check_search_contract(&JpegCompression { steps: 3 }, input.clone(), 6);
        let first = candidates_of(&JpegCompression { steps: 2 }, input.clone());
        let second = candidates_of(&JpegCompression { steps: 2 }, input);
        assert_eq!(first, second);
    }

    #[test]
    fn test_pca_dimensions() {
        assert_eq!(pca_dimensions(40, 2), vec![40, 30, 20, 10]);
        assert_eq!(pca_dimensions(3, 2), vec![3, 3, 3, 3]);
        assert!(pca_dimensions(40, 0).is_empty());
    }

    #[test]
    fn test_pca_full_rank_is_lossless() {
        let channel = DMatrix::from_fn(6, 5, |y, x| ((y * 7 + x * 3) % 11) as f64);
        let restored = pca_project(&channel, 6).unwrap();
        assert!((restored - &channel).abs().max() < 1e-9);
    }

    #[test]
    fn test_pca_single_component_restores_rank_one_channel() {
        let channel = DMatrix::from_fn(6, 5, |y, x| ((y + 1) * (x + 2)) as f64);
        let restored = pca_project(&channel, 1).unwrap();
        assert!((restored - &channel).abs().max() < 1e-9);
    }

    #[test]
    fn test_pca_follows_search_contract() {
        let input = gradient_image(12, 10);
        check_search_contract(&PcaCompression { steps: 2 }, input.clone(), 4);
        let first = candidates_of(&PcaCompression { steps: 2 }, input.clone());
        let second = candidates_of(&PcaCompression { steps: 2 }, input.clone());
        assert_eq!(first, second);
        // the first step keeps every component
        assert_eq!(first[0].to_rgb8(), input.to_rgb8());
    }
}

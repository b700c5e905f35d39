use std::path::Path;

use image::{DynamicImage, Rgb, Rgb32FImage, RgbImage};
use ndarray::{Array3, ArrayView3};

use crate::error::{DenoiseError, Result};

pub const CHANNELS: usize = 3;
pub const MAX_U8: f32 = 255.0;

/// Channel-first RGB image with every value in `[0, 1]`.
///
/// This is the layout classifiers consume. Transforms that need 8-bit
/// buffers go through [`ChwImage::to_rgb8`] and come back with
/// [`ChwImage::from_rgb8`].
#[derive(Clone, Debug, PartialEq)]
pub struct ChwImage {
    data: Array3<f32>,
}

fn check_shape(data: &Array3<f32>) -> Result<()> {
    let shape = data.shape();
    if shape[0] != CHANNELS || shape[1] == 0 || shape[2] == 0 {
        return Err(DenoiseError::Shape {
            expected: "(3, H, W) with H, W > 0",
            found: shape.to_vec(),
        });
    }
    Ok(())
}

impl ChwImage {
    pub fn new(data: Array3<f32>) -> Result<Self> {
        check_shape(&data)?;
        // NaN fails the range check as well
        let bad = data
            .indexed_iter()
            .find(|(_, value)| !(0.0..=1.0).contains(*value));
        if let Some(((c, y, x), value)) = bad {
            return Err(DenoiseError::ValueRange {
                value: *value,
                index: [c, y, x],
            });
        }
        Ok(ChwImage { data })
    }

    /// Builds an image after clipping every value into `[0, 1]`. NaN becomes 0.
    pub fn from_array_clipped(mut data: Array3<f32>) -> Result<Self> {
        check_shape(&data)?;
        data.mapv_inplace(|x| if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) });
        Ok(ChwImage { data })
    }

    pub fn filled(height: usize, width: usize, value: f32) -> Result<Self> {
        ChwImage::new(Array3::from_elem((CHANNELS, height, width), value))
    }

    pub fn channels(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn height(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn width(&self) -> usize {
        self.data.shape()[2]
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.channels(), self.height(), self.width()]
    }

    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    pub fn as_array(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn into_inner(self) -> Array3<f32> {
        self.data
    }

    /// HWC 8-bit copy, each value scaled by 255 and rounded.
    pub fn to_rgb8(&self) -> RgbImage {
        let data = &self.data;
        RgbImage::from_fn(self.width() as u32, self.height() as u32, |x, y| {
            let (x, y) = (x as usize, y as usize);
            Rgb(std::array::from_fn(|c| (data[[c, y, x]] * MAX_U8).round() as u8))
        })
    }

    pub fn from_rgb8(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let data = Array3::from_shape_fn((CHANNELS, height as usize, width as usize), |(c, y, x)| {
            image.get_pixel(x as u32, y as u32)[c] as f32 / MAX_U8
        });
        ChwImage { data }
    }

    pub fn to_rgb32f(&self) -> Rgb32FImage {
        let data = &self.data;
        Rgb32FImage::from_fn(self.width() as u32, self.height() as u32, |x, y| {
            let (x, y) = (x as usize, y as usize);
            Rgb(std::array::from_fn(|c| data[[c, y, x]]))
        })
    }

    pub fn from_rgb32f(image: &Rgb32FImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        let data = Array3::from_shape_fn((CHANNELS, height as usize, width as usize), |(c, y, x)| {
            image.get_pixel(x as u32, y as u32)[c]
        });
        ChwImage::from_array_clipped(data)
    }

    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        let rgb = image.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return Err(DenoiseError::Shape {
                expected: "a non-empty image",
                found: vec![CHANNELS, rgb.height() as usize, rgb.width() as usize],
            });
        }
        Ok(ChwImage::from_rgb8(&rgb))
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        ChwImage::from_dynamic(image::open(path)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_rgb8().save(path)?;
        Ok(())
    }

    pub fn mse(&self, other: &ChwImage) -> Result<f32> {
        if self.shape() != other.shape() {
            return Err(DenoiseError::ShapeMismatch {
                left: self.shape().to_vec(),
                right: other.shape().to_vec(),
            });
        }
        let sum: f32 = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        Ok(sum / self.data.len() as f32)
    }

    /// Wraps data a transform already keeps inside `[0, 1]`.
    pub(crate) fn from_trusted(data: Array3<f32>) -> Self {
        debug_assert!(check_shape(&data).is_ok());
        debug_assert!(data.iter().all(|v| (0.0..=1.0).contains(v)));
        ChwImage { data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_wrong_channel_count() {
        let result = ChwImage::new(Array3::zeros((1, 4, 4)));
        assert!(matches!(result, Err(DenoiseError::Shape { .. })));
    }

    #[test]
    fn test_rejects_empty_image() {
        let result = ChwImage::new(Array3::zeros((3, 0, 4)));
        assert!(matches!(result, Err(DenoiseError::Shape { .. })));
    }

    #[test]
    fn test_rejects_out_of_range_and_nan() {
        let mut data = Array3::<f32>::zeros((3, 2, 2));
        data[[1, 0, 1]] = 1.5;
        match ChwImage::new(data) {
            Err(DenoiseError::ValueRange { value, index }) => {
                assert_eq!(value, 1.5);
                assert_eq!(index, [1, 0, 1]);
            }
            other => panic!("unexpected {:?}", other),
        }

        let mut data = Array3::<f32>::zeros((3, 2, 2));
        data[[0, 0, 0]] = f32::NAN;
        assert!(ChwImage::new(data).is_err());
    }

    #[test]
    fn test_clipped_constructor() {
        let data = Array3::from_shape_vec((3, 1, 2), vec![-0.5, 0.5, 2.0, f32::NAN, 1.0, 0.0]).unwrap();
        let image = ChwImage::from_array_clipped(data).unwrap();
        assert_eq!(
            image.as_array().iter().cloned().collect::<Vec<_>>(),
            vec![0.0, 0.5, 1.0, 0.0, 1.0, 0.0]
        );
    }

    #[test]
    fn test_rgb8_conversion_keeps_layout() {
        let mut data = Array3::<f32>::zeros((3, 2, 3));
        data[[0, 1, 2]] = 1.0;
        data[[2, 0, 1]] = 0.5;
        let image = ChwImage::new(data).unwrap();

        let rgb = image.to_rgb8();
        assert_eq!(rgb.dimensions(), (3, 2));
        assert_eq!(rgb.get_pixel(2, 1).0, [255, 0, 0]);
        assert_eq!(rgb.get_pixel(1, 0).0, [0, 0, 128]);

        let back = ChwImage::from_rgb8(&rgb);
        assert_eq!(back.shape(), [3, 2, 3]);
        assert_eq!(back.to_rgb8(), rgb);
    }

    #[test]
    fn test_mse() {
        let a = ChwImage::filled(2, 2, 0.0).unwrap();
        let b = ChwImage::filled(2, 2, 0.5).unwrap();
        assert_eq!(a.mse(&b).unwrap(), 0.25);
        assert_eq!(a.mse(&a).unwrap(), 0.0);

        let c = ChwImage::filled(3, 2, 0.5).unwrap();
        assert!(matches!(a.mse(&c), Err(DenoiseError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_png_save_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        let data = Array3::from_shape_fn((3, 5, 7), |(c, y, x)| ((c * 35 + y * 7 + x) % 256) as f32 / MAX_U8);
        let image = ChwImage::new(data).unwrap();

        image.save(&path).unwrap();
        let opened = ChwImage::open(&path).unwrap();
        assert_eq!(opened.shape(), [3, 5, 7]);
        assert_eq!(opened.to_rgb8(), image.to_rgb8());

        assert!(ChwImage::open(dir.path().join("missing.png")).is_err());
    }
}

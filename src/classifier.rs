use std::path::Path;

use ndarray::s;
use serde::{Deserialize, Serialize};

use crate::error::{DenoiseError, Result};
use crate::tensor::{ChwImage, CHANNELS};

/// Image classifier queried by every denoiser step.
pub trait Classifier {
    /// Raw score (or probability) vector for one image.
    fn predict(&self, image: &ChwImage) -> Result<Vec<f32>>;

    /// Top-1 label. On ties the lowest index wins; all-NaN or empty scores are an error.
    fn predict_label(&self, image: &ChwImage) -> Result<usize> {
        let scores = self.predict(image)?;
        argmax(&scores).ok_or(DenoiseError::EmptyPrediction)
    }
}

impl<F> Classifier for F
where
    F: Fn(&ChwImage) -> Result<Vec<f32>>,
{
    fn predict(&self, image: &ChwImage) -> Result<Vec<f32>> {
        self(image)
    }
}

/// Index of the first maximum. NaN scores never win.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, score)| !score.is_nan())
        .reduce(|best, current| if current.1 > best.1 { current } else { best })
        .map(|(index, _)| index)
}

fn imagenet_mean() -> [f32; 3] {
    [0.485, 0.456, 0.406]
}

fn imagenet_std() -> [f32; 3] {
    [0.229, 0.224, 0.225]
}

/// Linear model over an average-pooled, normalized image.
///
/// The image is pooled to `grid x grid` cells per channel, so inputs of any
/// size are accepted. Features are laid out channel first, then row, then
/// column, and every weight row must have `3 * grid * grid` entries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PooledLinearClassifier {
    pub grid: usize,
    #[serde(default = "imagenet_mean")]
    pub mean: [f32; 3],
    #[serde(default = "imagenet_std")]
    pub std: [f32; 3],
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

impl PooledLinearClassifier {
    pub fn new(grid: usize, weights: Vec<Vec<f32>>, bias: Vec<f32>) -> Result<Self> {
        let model = PooledLinearClassifier {
            grid,
            mean: imagenet_mean(),
            std: imagenet_std(),
            weights,
            bias,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn from_toml_str(data: &str) -> Result<Self> {
        let model: PooledLinearClassifier = toml::from_str(data)?;
        model.validate()?;
        Ok(model)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        PooledLinearClassifier::from_toml_str(&data)
    }

    pub fn num_classes(&self) -> usize {
        self.weights.len()
    }

    pub fn num_features(&self) -> usize {
        CHANNELS * self.grid * self.grid
    }

    fn validate(&self) -> Result<()> {
        if self.grid == 0 {
            return Err(DenoiseError::Config("grid must be at least 1".to_string()));
        }
        if self.weights.is_empty() {
            return Err(DenoiseError::Config("model has no classes".to_string()));
        }
        if self.weights.len() != self.bias.len() {
            return Err(DenoiseError::Config(format!(
                "{} weight rows but {} biases",
                self.weights.len(),
                self.bias.len()
            )));
        }
        let features = self.num_features();
        if let Some(row) = self.weights.iter().position(|row| row.len() != features) {
            return Err(DenoiseError::Config(format!(
                "weight row {} has {} entries, expected {}",
                row,
                self.weights[row].len(),
                features
            )));
        }
        if self.std.iter().any(|s| *s == 0.0) {
            return Err(DenoiseError::Config("std must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Cell `[start, end)` along an axis of `len` pixels; never empty.
    fn cell(&self, index: usize, len: usize) -> (usize, usize) {
        let start = (index * len / self.grid).min(len - 1);
        let end = ((index + 1) * len / self.grid).clamp(start + 1, len);
        (start, end)
    }

    pub fn features(&self, image: &ChwImage) -> Vec<f32> {
        let view = image.view();
        let (height, width) = (image.height(), image.width());
        let mut features = Vec::with_capacity(self.num_features());
        for c in 0..CHANNELS {
            for gy in 0..self.grid {
                let (y0, y1) = self.cell(gy, height);
                for gx in 0..self.grid {
                    let (x0, x1) = self.cell(gx, width);
                    let pooled = view.slice(s![c, y0..y1, x0..x1]).mean().unwrap_or(0.0);
                    features.push((pooled - self.mean[c]) / self.std[c]);
                }
            }
        }
        features
    }
}

impl Classifier for PooledLinearClassifier {
    fn predict(&self, image: &ChwImage) -> Result<Vec<f32>> {
        let features = self.features(image);
        let scores = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, bias)| row.iter().zip(&features).map(|(w, x)| w * x).sum::<f32>() + bias)
            .collect();
        Ok(scores)
    }
}

/// Class names, one per line. Blank lines are skipped.
pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let data = std::fs::read_to_string(path)?;
    Ok(data
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_argmax_first_max_wins() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[f32::NAN, 0.5]), Some(1));
        assert_eq!(argmax(&[0.2, f32::NAN, 0.1]), Some(0));
        assert_eq!(argmax(&[f32::NAN, f32::NAN]), None);
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_closure_classifier() {
        let model = |_: &ChwImage| -> Result<Vec<f32>> { Ok(vec![0.0, 3.0, 1.0]) };
        let image = ChwImage::filled(2, 2, 0.5).unwrap();
        assert_eq!(model.predict_label(&image).unwrap(), 1);

        let leading_nan = |_: &ChwImage| -> Result<Vec<f32>> { Ok(vec![f32::NAN, 0.2, 0.9]) };
        assert_eq!(leading_nan.predict_label(&image).unwrap(), 2);

        let empty = |_: &ChwImage| -> Result<Vec<f32>> { Ok(vec![]) };
        assert!(matches!(empty.predict_label(&image), Err(DenoiseError::EmptyPrediction)));
    }

    #[test]
    fn test_pooled_features_split_cells() {
        // left half dark, right half bright in every channel
        let data = Array3::from_shape_fn((3, 4, 4), |(_, _, x)| if x < 2 { 0.0 } else { 1.0 });
        let image = ChwImage::new(data).unwrap();
        let mut model = PooledLinearClassifier::new(2, vec![vec![0.0; 12]], vec![0.0]).unwrap();
        model.mean = [0.0; 3];
        model.std = [1.0; 3];

        let features = model.features(&image);
        assert_eq!(features.len(), 12);
        assert_eq!(&features[0..4], &[0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_pooled_features_on_image_smaller_than_grid() {
        let image = ChwImage::filled(1, 1, 0.25).unwrap();
        let mut model = PooledLinearClassifier::new(3, vec![vec![0.0; 27]], vec![0.0]).unwrap();
        model.mean = [0.0; 3];
        model.std = [1.0; 3];
        assert!(model.features(&image).iter().all(|f| *f == 0.25));
    }

    #[test]
    fn test_brightness_model_from_toml() {
        let data = r#"
            grid = 1
            mean = [0.0, 0.0, 0.0]
            std = [1.0, 1.0, 1.0]
            weights = [[-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]]
            bias = [1.5, -1.5]
        "#;
        let model = PooledLinearClassifier::from_toml_str(data).unwrap();
        assert_eq!(model.num_classes(), 2);

        let dark = ChwImage::filled(4, 4, 0.1).unwrap();
        let bright = ChwImage::filled(4, 4, 0.9).unwrap();
        assert_eq!(model.predict_label(&dark).unwrap(), 0);
        assert_eq!(model.predict_label(&bright).unwrap(), 1);
    }

    #[test]
    fn test_rejects_malformed_models() {
        assert!(PooledLinearClassifier::new(0, vec![vec![]], vec![0.0]).is_err());
        assert!(PooledLinearClassifier::new(1, vec![vec![0.0; 3]], vec![]).is_err());
        assert!(PooledLinearClassifier::new(1, vec![vec![0.0; 4]], vec![0.0]).is_err());
        assert!(PooledLinearClassifier::from_toml_str("grid = 1").is_err());
    }

    #[test]
    fn test_model_and_labels_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.toml");
        std::fs::write(&model_path, "grid = 1\nweights = [[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]\nbias = [0.0, 0.0]\n").unwrap();
        let model = PooledLinearClassifier::from_toml_file(&model_path).unwrap();
        assert_eq!(model.num_classes(), 2);
        assert_eq!(model.mean, imagenet_mean());

        let labels_path = dir.path().join("labels.txt");
        std::fs::write(&labels_path, "tench\n\n  goldfish  \n").unwrap();
        assert_eq!(load_labels(&labels_path).unwrap(), vec!["tench".to_string(), "goldfish".to_string()]);

        let bad_path = dir.path().join("bad.toml");
        std::fs::write(&bad_path, "grid = 2\nweights = [[1.0]]\nbias = [0.0]\n").unwrap();
        assert!(matches!(PooledLinearClassifier::from_toml_file(&bad_path), Err(DenoiseError::Config(_))));
    }
}

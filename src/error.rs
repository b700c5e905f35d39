use thiserror::Error;

#[derive(Debug, Error)]
pub enum DenoiseError {
    #[error("expected an image of shape {expected}, got {found:?}")]
    Shape { expected: &'static str, found: Vec<usize> },

    #[error("pixel value {value} at {index:?} is outside [0, 1]")]
    ValueRange { value: f32, index: [usize; 3] },

    #[error("image shapes differ: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },

    #[error("classifier returned no usable score")]
    EmptyPrediction,

    #[error("classifier failure: {0}")]
    Classifier(String),

    #[error("unknown denoiser {0:?}")]
    UnknownDenoiser(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("pca failed: {0}")]
    Pca(&'static str),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Ndarray(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, DenoiseError>;

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::compression::{JpegCompression, PcaCompression};
use crate::dct::DctCompression;
use crate::denoise::Denoise;
use crate::error::{DenoiseError, Result};
use crate::filters::{BilateralFilter, BoxFilter, GaussianBlur, MeanFilter, MedianBlur};
use crate::jitter::ResizePadding;
use crate::noise::{GaussianNoise, PixelDeflection, SaltPepperNoise};

#[derive(Serialize, Deserialize, Debug)]
pub struct RawConfig {
    pub denoisers: Vec<toml::Table>
}

pub struct DenoiseConfig {
    pub denoisers: Vec<Box<dyn Denoise>>
}

pub fn from_toml<T>(module: toml::Table) -> Result<Box<dyn Denoise>>
where
    T: DeserializeOwned + Denoise + 'static,
{
    let denoiser: T = toml::Value::Table(module).try_into()?;
    Ok(Box::new(denoiser))
}

pub fn denoiser_from_toml(module: toml::Table) -> Result<Box<dyn Denoise>> {
    let name = match module.get("name").and_then(|name| name.as_str()) {
        Some(name) => name.to_string(),
        None => return Err(DenoiseError::Config("denoiser entry without a `name`".to_string())),
    };

    match name.as_str() {
        "GaussianBlur" =>       from_toml::<GaussianBlur>(module),
        "MedianBlur" =>         from_toml::<MedianBlur>(module),
        "BoxFilter" =>          from_toml::<BoxFilter>(module),
        "MeanFilter" =>         from_toml::<MeanFilter>(module),
        "BilateralFilter" =>    from_toml::<BilateralFilter>(module),
        "JpegCompression" =>    from_toml::<JpegCompression>(module),
        "DctCompression" =>     from_toml::<DctCompression>(module),
        "PcaCompression" =>     from_toml::<PcaCompression>(module),
        "GaussianNoise" =>      from_toml::<GaussianNoise>(module),
        "SaltPepperNoise" =>    from_toml::<SaltPepperNoise>(module),
        "PixelDeflection" =>    from_toml::<PixelDeflection>(module),
        "ResizePadding" =>      from_toml::<ResizePadding>(module),
        _ => Err(DenoiseError::UnknownDenoiser(name)),
    }
}

pub fn parse_config(data: &str) -> Result<DenoiseConfig>{
    let data: RawConfig = toml::from_str(data)?;
    if data.denoisers.is_empty() {
        return Err(DenoiseError::Config("no denoisers configured".to_string()));
    }

    let mut config = DenoiseConfig{
        denoisers: vec![]
    };
    for module in data.denoisers {
        config.denoisers.push(denoiser_from_toml(module)?);
    }
    return Ok(config)
}

pub fn load_config(config_path: impl AsRef<Path>) -> Result<DenoiseConfig>{
    let data = std::fs::read_to_string(config_path)?;
    parse_config(&data)
}

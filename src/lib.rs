pub mod benchmark;
pub mod classifier;
pub mod compression;
pub mod conditional_paralell;
pub mod config;
pub mod dct;
pub mod denoise;
pub mod denoising;
pub mod error;
pub mod filters;
pub mod helpers;
pub mod jitter;
pub mod noise;
pub mod pipeline;
pub mod tensor;

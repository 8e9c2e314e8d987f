//! Image generation module.

pub mod models;
mod provider;
pub mod providers;
mod types;

pub use models::{output_dimensions, ModelCapabilities, ModelFamily, KNOWN_MODELS};
pub use provider::{ImageProvider, ImageProviderExt};
pub use types::{
    GeneratedImage, GenerationMetadata, GenerationRequest, GenerationResult, ImageSize,
    ReferenceImage, ASPECT_RATIOS, DEFAULT_ASPECT_RATIO,
};

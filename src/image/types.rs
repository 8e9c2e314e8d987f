//! Core types for image generation.

use crate::error::{GemImgError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Aspect ratios the API accepts.
pub const ASPECT_RATIOS: &[&str] = &[
    "1:1", "2:3", "3:2", "3:4", "4:3", "4:5", "5:4", "9:16", "16:9", "21:9",
];

/// Aspect ratio used when the caller gives none.
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

/// Output quality tier for models with variable resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageSize {
    /// About 1024 px on the long side.
    #[default]
    #[serde(rename = "1K")]
    OneK,
    /// About 2048 px on the long side.
    #[serde(rename = "2K")]
    TwoK,
    /// About 4096 px on the long side.
    #[serde(rename = "4K")]
    FourK,
}

impl ImageSize {
    /// All tiers, smallest first.
    pub const ALL: [ImageSize; 3] = [Self::OneK, Self::TwoK, Self::FourK];

    /// Wire value (e.g. `"2K"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
            Self::FourK => "4K",
        }
    }

    /// Scale relative to the 1K grid.
    pub(crate) fn scale(&self) -> u32 {
        match self {
            Self::OneK => 1,
            Self::TwoK => 2,
            Self::FourK => 4,
        }
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImageSize {
    type Err = GemImgError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "1K" => Ok(Self::OneK),
            "2K" => Ok(Self::TwoK),
            "4K" => Ok(Self::FourK),
            other => Err(GemImgError::InvalidRequest(format!(
                "unknown resolution '{other}', expected 1K, 2K or 4K"
            ))),
        }
    }
}

/// A reference image sent alongside the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    /// Raw file bytes.
    pub data: Vec<u8>,
    /// MIME type sent with the data.
    pub mime_type: String,
}

impl ReferenceImage {
    /// Creates a reference image from bytes and a MIME type.
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }
}

/// A request to generate an image.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The text prompt describing the desired image.
    pub prompt: String,
    /// Reference images, in the order they are sent.
    pub reference_images: Vec<ReferenceImage>,
    /// Model id; `None` defers to config and defaults.
    pub model: Option<String>,
    /// Aspect ratio, passed through as given.
    pub aspect_ratio: String,
    /// Quality tier; ignored by fixed-resolution models.
    pub image_size: Option<ImageSize>,
    /// Attach the Google Search tool.
    pub grounding: bool,
}

impl GenerationRequest {
    /// Creates a new request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            reference_images: Vec::new(),
            model: None,
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            image_size: None,
            grounding: false,
        }
    }

    /// Adds a reference image.
    pub fn with_reference_image(mut self, image: ReferenceImage) -> Self {
        self.reference_images.push(image);
        self
    }

    /// Adds several reference images.
    pub fn with_reference_images(mut self, images: impl IntoIterator<Item = ReferenceImage>) -> Self {
        self.reference_images.extend(images);
        self
    }

    /// Sets the model id.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = ratio.into();
        self
    }

    /// Sets the quality tier.
    pub fn with_image_size(mut self, size: ImageSize) -> Self {
        self.image_size = Some(size);
        self
    }

    /// Enables or disables search grounding.
    pub fn with_grounding(mut self, enabled: bool) -> Self {
        self.grounding = enabled;
        self
    }

    /// Returns true if this is an image editing request (has reference images).
    pub fn is_edit(&self) -> bool {
        !self.reference_images.is_empty()
    }
}

/// Metadata about the generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Generation duration in milliseconds.
    pub duration_ms: Option<u64>,
    /// HTTP attempts made, including retries.
    pub attempts: u32,
    /// Text the model returned alongside the image.
    pub text: Option<String>,
}

/// A generated image held in memory.
#[derive(Debug, Clone)]
#[must_use = "generated image should be saved or processed"]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// MIME type reported by the API.
    pub mime_type: String,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
}

impl GeneratedImage {
    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the image to the specified path, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        crate::files::write_bytes(path.as_ref(), &self.data)
    }
}

/// A generated image that has been written to disk.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Where the image was written.
    pub path: PathBuf,
    /// The bytes that were written.
    pub data: Vec<u8>,
    /// MIME type reported by the API.
    pub mime_type: String,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
}

impl GenerationResult {
    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_size_parse() {
        assert_eq!("2K".parse::<ImageSize>().unwrap(), ImageSize::TwoK);
        assert_eq!("4k".parse::<ImageSize>().unwrap(), ImageSize::FourK);
        assert!("8K".parse::<ImageSize>().is_err());
        assert_eq!(ImageSize::OneK.to_string(), "1K");
    }

    #[test]
    fn test_image_size_serializes_as_wire_value() {
        assert_eq!(serde_json::to_value(ImageSize::TwoK).unwrap(), "2K");
    }

    #[test]
    fn test_request_defaults() {
        let req = GenerationRequest::new("A puppy");
        assert_eq!(req.aspect_ratio, "1:1");
        assert!(req.model.is_none());
        assert!(req.image_size.is_none());
        assert!(!req.grounding);
        assert!(!req.is_edit());
    }

    #[test]
    fn test_request_builder() {
        let req = GenerationRequest::new("A puppy")
            .with_model("gemini-2.5-flash-image")
            .with_aspect_ratio("16:9")
            .with_image_size(ImageSize::FourK)
            .with_grounding(true)
            .with_reference_image(ReferenceImage::new(vec![1], "image/png"));
        assert_eq!(req.model.as_deref(), Some("gemini-2.5-flash-image"));
        assert_eq!(req.aspect_ratio, "16:9");
        assert_eq!(req.image_size, Some(ImageSize::FourK));
        assert!(req.grounding);
        assert!(req.is_edit());
    }
}

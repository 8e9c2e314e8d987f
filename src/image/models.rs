//! Model capability table and nominal output resolutions.
//!
//! Models are matched by exact id. An id not in the table is classified by
//! name: ids containing [`FLASH_MARKER`] are [`ModelFamily::Flash`], anything
//! else is [`ModelFamily::Pro`], which accepts the full parameter set.

use crate::image::types::ImageSize;

/// A class of models sharing the same parameter constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    /// Fixed 1024 px grid; only the aspect ratio can be chosen.
    Flash,
    /// Variable resolution with 1K, 2K and 4K tiers.
    Pro,
}

impl ModelFamily {
    /// Whether requests may carry an `imageSize`.
    pub fn supports_image_size(&self) -> bool {
        matches!(self, Self::Pro)
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flash => write!(f, "flash"),
            Self::Pro => write!(f, "pro"),
        }
    }
}

/// What a model accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapabilities {
    /// Model id as sent to the API.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Parameter family.
    pub family: ModelFamily,
    /// Maximum reference images per request.
    pub max_reference_images: usize,
}

/// Known image models.
pub const KNOWN_MODELS: &[ModelCapabilities] = &[
    ModelCapabilities {
        id: "gemini-2.5-flash-image",
        name: "Nano Banana",
        family: ModelFamily::Flash,
        max_reference_images: 3,
    },
    ModelCapabilities {
        id: "gemini-2.5-flash-image-preview",
        name: "Nano Banana (preview)",
        family: ModelFamily::Flash,
        max_reference_images: 3,
    },
    ModelCapabilities {
        id: "gemini-3-pro-image-preview",
        name: "Nano Banana Pro",
        family: ModelFamily::Pro,
        max_reference_images: 14,
    },
    ModelCapabilities {
        id: "nano-banana-pro-preview",
        name: "Nano Banana Pro (alias)",
        family: ModelFamily::Pro,
        max_reference_images: 14,
    },
];

/// Substring that marks an unknown id as a flash model.
pub const FLASH_MARKER: &str = "flash";

/// Capabilities assumed for unknown flash ids.
const FLASH_FALLBACK: ModelCapabilities = ModelCapabilities {
    id: "",
    name: "Unknown flash model",
    family: ModelFamily::Flash,
    max_reference_images: 3,
};

/// Capabilities assumed for every other unknown id.
const PRO_FALLBACK: ModelCapabilities = ModelCapabilities {
    id: "",
    name: "Unknown model",
    family: ModelFamily::Pro,
    max_reference_images: 14,
};

impl ModelCapabilities {
    /// Looks up a model by exact id.
    ///
    /// Unknown ids containing `flash` (case-insensitive) get flash
    /// capabilities; all others get pro capabilities.
    pub fn lookup(model_id: &str) -> ModelCapabilities {
        if let Some(caps) = Self::find(model_id) {
            return *caps;
        }

        let fallback = if model_id.to_ascii_lowercase().contains(FLASH_MARKER) {
            FLASH_FALLBACK
        } else {
            PRO_FALLBACK
        };
        tracing::debug!(
            model = model_id,
            family = %fallback.family,
            "unknown model id, classified by name"
        );
        fallback
    }

    /// Looks up a model by exact id.
    pub fn find(model_id: &str) -> Option<&'static ModelCapabilities> {
        KNOWN_MODELS.iter().find(|m| m.id == model_id)
    }

    /// The `imageSize` to send, if any.
    ///
    /// Flash models never get one. Pro models always do, defaulting to 1K.
    pub fn effective_image_size(&self, requested: Option<ImageSize>) -> Option<ImageSize> {
        self.family
            .supports_image_size()
            .then(|| requested.unwrap_or_default())
    }
}

/// 1K pixel grid for the flash family, `(aspect, width, height)`.
const FLASH_GRID: &[(&str, u32, u32)] = &[
    ("1:1", 1024, 1024),
    ("2:3", 832, 1248),
    ("3:2", 1248, 832),
    ("3:4", 864, 1184),
    ("4:3", 1184, 864),
    ("4:5", 896, 1152),
    ("5:4", 1152, 896),
    ("9:16", 768, 1344),
    ("16:9", 1344, 768),
    ("21:9", 1536, 672),
];

/// 1K pixel grid for the pro family. 2K and 4K scale it by 2 and 4.
const PRO_GRID: &[(&str, u32, u32)] = &[
    ("1:1", 1024, 1024),
    ("2:3", 848, 1264),
    ("3:2", 1264, 848),
    ("3:4", 896, 1200),
    ("4:3", 1200, 896),
    ("4:5", 928, 1152),
    ("5:4", 1152, 928),
    ("9:16", 768, 1376),
    ("16:9", 1376, 768),
    ("21:9", 1584, 672),
];

/// Nominal output dimensions for reporting.
///
/// The API decides the real size; this is only what users can expect.
/// Returns `None` for aspect ratios outside the table.
pub fn output_dimensions(
    family: ModelFamily,
    aspect_ratio: &str,
    size: Option<ImageSize>,
) -> Option<(u32, u32)> {
    let (grid, scale) = match family {
        ModelFamily::Flash => (FLASH_GRID, 1),
        ModelFamily::Pro => (PRO_GRID, size.unwrap_or_default().scale()),
    };
    grid.iter()
        .find(|(ratio, _, _)| *ratio == aspect_ratio)
        .map(|(_, w, h)| (w * scale, h * scale))
}

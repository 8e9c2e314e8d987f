//! Gemini `generateContent` request payloads.

use crate::image::models::ModelCapabilities;
use crate::image::types::{GenerationRequest, ImageSize};
use base64::Engine;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiRequest {
    pub(crate) contents: Vec<GeminiContent>,
    pub(crate) generation_config: GeminiConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tools: Option<Vec<GeminiTool>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GeminiContent {
    pub(crate) parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiInlineData {
    pub(crate) mime_type: String,
    pub(crate) data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiConfig {
    pub(crate) response_modalities: Vec<&'static str>,
    pub(crate) image_config: ImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImageConfig {
    pub(crate) aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) image_size: Option<ImageSize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiTool {
    pub(crate) google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
pub(crate) struct GoogleSearch {}

impl GeminiRequest {
    /// Builds the payload for `req` against a model with `caps`.
    ///
    /// The prompt goes first, then reference images in order. `imageSize` is
    /// dropped for models that cannot take it.
    pub(crate) fn build(req: &GenerationRequest, caps: &ModelCapabilities) -> Self {
        let engine = base64::engine::general_purpose::STANDARD;

        let mut parts = Vec::with_capacity(1 + req.reference_images.len());
        parts.push(GeminiRequestPart::Text {
            text: req.prompt.clone(),
        });
        parts.extend(req.reference_images.iter().map(|image| {
            GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: image.mime_type.clone(),
                    data: engine.encode(&image.data),
                },
            }
        }));

        let tools = req.grounding.then(|| {
            vec![GeminiTool {
                google_search: GoogleSearch {},
            }]
        });

        Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: vec!["TEXT", "IMAGE"],
                image_config: ImageConfig {
                    aspect_ratio: req.aspect_ratio.clone(),
                    image_size: caps.effective_image_size(req.image_size),
                },
            },
            tools,
        }
    }
}

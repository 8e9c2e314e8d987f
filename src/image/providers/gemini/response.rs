//! Gemini `generateContent` response parsing.

use crate::error::{GemImgError, Result};
use base64::Engine;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

/// The image extracted from a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InterpretedImage {
    pub(crate) data: Vec<u8>,
    pub(crate) mime_type: String,
    /// Text parts of the same candidate, joined with newlines.
    pub(crate) text: Option<String>,
}

const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "IMAGE_SAFETY",
    "IMAGE_PROHIBITED_CONTENT",
    "IMAGE_RECITATION",
    "RECITATION",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
];

/// Extracts the first inline image of the first candidate.
///
/// Only one image is returned even if the response carries more.
// TODO: return every inline image once callers can persist more than one file per call.
pub(crate) fn interpret(body: &[u8]) -> Result<InterpretedImage> {
    let response: GeminiResponse = serde_json::from_slice(body)
        .map_err(|e| GemImgError::InvalidResponse(format!("malformed Gemini response: {e}")))?;

    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_ref())
    {
        let msg = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason_message.clone())
            .unwrap_or_else(|| format!("Prompt blocked: {reason}"));
        return Err(GemImgError::ContentBlocked(msg));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GemImgError::NoResultsFound("no candidates in Gemini response".into()))?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if BLOCKING_FINISH_REASONS.contains(&reason) {
            return Err(GemImgError::ContentBlocked(format!(
                "Content blocked by Gemini safety filter: {reason}"
            )));
        }
    }

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    let text = {
        let texts: Vec<&str> = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!texts.is_empty()).then(|| texts.join("\n"))
    };

    let inline = parts
        .into_iter()
        .find_map(|p| p.inline_data)
        .ok_or_else(|| match candidate.finish_reason.as_deref() {
            Some(reason) if reason != "STOP" => GemImgError::NoResultsFound(format!(
                "no image data in Gemini response (finish reason: {reason})"
            )),
            _ => GemImgError::NoResultsFound("no image data in Gemini response".into()),
        })?;

    let data = base64::engine::general_purpose::STANDARD
        .decode(inline.data.trim())
        .map_err(|e| GemImgError::ImageDecodeFailed(e.to_string()))?;

    Ok(InterpretedImage {
        data,
        mime_type: inline.mime_type.unwrap_or_else(|| "image/png".to_string()),
        text,
    })
}

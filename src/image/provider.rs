//! Image provider trait and utilities.

use crate::error::{GemImgError, Result};
use crate::image::types::{GeneratedImage, GenerationRequest, GenerationResult};
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Trait for image generation providers.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates an image, observing `cancel` around every network exchange.
    async fn generate_cancellable(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GeneratedImage>;

    /// Generates an image from the given request.
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        self.generate_cancellable(request, &CancellationToken::new())
            .await
    }

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;

    /// Checks if the provider is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}

/// Extension trait that persists generated images.
#[async_trait]
pub trait ImageProviderExt: ImageProvider {
    /// Generates an image and writes it to `output`, or to a timestamped
    /// file in the current directory when `output` is `None`.
    ///
    /// Nothing is written unless generation fully succeeds. A failed write
    /// does not repeat the network call.
    async fn generate_to_file(
        &self,
        request: &GenerationRequest,
        output: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult> {
        let image = self.generate_cancellable(request, cancel).await?;

        if cancel.is_cancelled() {
            return Err(GemImgError::Cancelled);
        }

        let path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(crate::files::default_output_path);
        image.save(&path)?;
        tracing::info!(path = %path.display(), bytes = image.size(), "saved generated image");

        Ok(GenerationResult {
            path,
            data: image.data,
            mime_type: image.mime_type,
            metadata: image.metadata,
        })
    }
}

impl<T: ImageProvider + ?Sized> ImageProviderExt for T {}

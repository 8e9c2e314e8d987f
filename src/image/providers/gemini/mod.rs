//! Gemini (Google) image generation provider.

mod request;
mod response;

use crate::config::{ConfigStore, GeneratorOptions, ProviderEndpoint, GEMINI_PROVIDER};
use crate::credentials::{CredentialStore, MemoryCredentialStore};
use crate::error::{sanitize_error_message, GemImgError, Result};
use crate::image::models::{output_dimensions, ModelCapabilities};
use crate::image::provider::ImageProvider;
use crate::image::types::{GeneratedImage, GenerationMetadata, GenerationRequest};
use crate::transport::{HttpTransport, TransportConfig};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use request::GeminiRequest;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Builder for GeminiProvider.
#[derive(Default)]
pub struct GeminiProviderBuilder {
    credentials: Option<Arc<dyn CredentialStore>>,
    config: Option<Arc<dyn ConfigStore>>,
    transport: TransportConfig,
    options: GeneratorOptions,
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a fixed API key instead of a credential store.
    pub fn api_key(self, key: impl Into<String>) -> Self {
        self.credentials(Arc::new(MemoryCredentialStore::with_secret(
            GEMINI_PROVIDER,
            key,
        )))
    }

    /// Sets the credential store. Defaults to the OS keyring.
    pub fn credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    /// Sets the config store. Defaults to the JSON file in the user config dir.
    pub fn config(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.config = Some(store);
        self
    }

    /// Sets transport timeouts and retry policy.
    pub fn transport(mut self, config: TransportConfig) -> Self {
        self.transport = config;
        self
    }

    /// Sets runtime options.
    pub fn options(mut self, options: GeneratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the provider.
    pub fn build(self) -> Result<GeminiProvider> {
        let credentials = match self.credentials {
            Some(store) => store,
            None => default_credentials()?,
        };
        let config: Arc<dyn ConfigStore> = match self.config {
            Some(store) => store,
            None => Arc::new(crate::config::JsonConfigStore::default_location()?),
        };

        Ok(GeminiProvider {
            transport: HttpTransport::with_config(self.transport)?,
            credentials,
            config,
            options: self.options,
        })
    }
}

#[cfg(feature = "keyring")]
fn default_credentials() -> Result<Arc<dyn CredentialStore>> {
    Ok(Arc::new(crate::credentials::KeyringCredentialStore::new()))
}

#[cfg(not(feature = "keyring"))]
fn default_credentials() -> Result<Arc<dyn CredentialStore>> {
    Err(GemImgError::Credential(
        "no credential store configured and keyring support is disabled".into(),
    ))
}

/// Gemini image generation provider.
///
/// Credentials and config are read on every call, so rotating a key or
/// switching the configured model applies to the next request. The provider
/// is `Send + Sync`; share it behind an `Arc` to run generations
/// concurrently over one connection pool.
pub struct GeminiProvider {
    transport: HttpTransport,
    credentials: Arc<dyn CredentialStore>,
    config: Arc<dyn ConfigStore>,
    options: GeneratorOptions,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    /// Cancels in-flight requests and rejects new ones.
    pub fn shutdown(&self) {
        self.transport.shutdown();
    }

    /// Resolves the endpoint a request would be sent to.
    pub fn resolve_endpoint(&self, request: &GenerationRequest) -> Result<ProviderEndpoint> {
        Ok(self
            .config
            .resolve(GEMINI_PROVIDER)?
            .with_model_override(request.model.as_deref()))
    }

    async fn auth_headers(&self) -> Result<HeaderMap> {
        let api_key = self.credentials.get(GEMINI_PROVIDER).await?;
        let mut value = HeaderValue::from_str(api_key.trim()).map_err(|_| {
            GemImgError::Auth("stored Gemini API key contains invalid characters".into())
        })?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(API_KEY_HEADER), value);
        Ok(headers)
    }

    async fn generate_impl(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GeneratedImage> {
        let start = Instant::now();

        let headers = self.auth_headers().await?;
        let endpoint = self.resolve_endpoint(request)?;
        let caps = ModelCapabilities::lookup(&endpoint.model);

        if request.reference_images.len() > caps.max_reference_images {
            return Err(GemImgError::InvalidRequest(format!(
                "{} accepts at most {} reference images, got {}",
                endpoint.model,
                caps.max_reference_images,
                request.reference_images.len()
            )));
        }

        let payload = GeminiRequest::build(request, &caps);
        let image_size = payload.generation_config.image_config.image_size;
        let body = serde_json::to_vec(&payload)?;

        let dimensions = output_dimensions(caps.family, &request.aspect_ratio, image_size)
            .map(|(w, h)| format!("{w}x{h}"));
        if self.options.verbose {
            tracing::info!(
                model = %endpoint.model,
                family = %caps.family,
                aspect_ratio = %request.aspect_ratio,
                image_size = ?image_size,
                expected = ?dimensions,
                edit = request.is_edit(),
                references = request.reference_images.len(),
                grounding = request.grounding,
                "sending generation request"
            );
        } else {
            tracing::debug!(
                model = %endpoint.model,
                references = request.reference_images.len(),
                "sending generation request"
            );
        }

        let http = self
            .transport
            .post(&endpoint.generate_url(), headers, body, cancel)
            .await?;

        if !http.is_success() {
            return Err(parse_error(http.status.as_u16(), &http.text(), &endpoint));
        }

        let image = response::interpret(&http.body)?;
        let duration_ms = start.elapsed().as_millis() as u64;

        if !self.options.quiet {
            tracing::info!(
                model = %endpoint.model,
                bytes = image.data.len(),
                attempts = http.attempts,
                duration_ms,
                "image generated"
            );
        }

        Ok(GeneratedImage {
            data: image.data,
            mime_type: image.mime_type,
            metadata: GenerationMetadata {
                model: Some(endpoint.model),
                duration_ms: Some(duration_ms),
                attempts: http.attempts,
                text: image.text,
            },
        })
    }
}

fn parse_error(status: u16, text: &str, endpoint: &ProviderEndpoint) -> GemImgError {
    let message = sanitize_error_message(text);
    match status {
        401 | 403 => GemImgError::Auth(format!("{GEMINI_PROVIDER} ({status}): {message}")),
        404 => GemImgError::Api {
            status,
            message: format!("model '{}' not found: {message}", endpoint.model),
        },
        _ => GemImgError::Api { status, message },
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    async fn generate_cancellable(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GeneratedImage> {
        self.generate_impl(request, cancel).await
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }

    async fn health_check(&self) -> Result<()> {
        let headers = self.auth_headers().await?;
        let endpoint = self.config.resolve(GEMINI_PROVIDER)?;

        match self
            .transport
            .get(&endpoint.model_url(), headers, &CancellationToken::new())
            .await
        {
            Ok(_) => Ok(()),
            Err(GemImgError::Api { status, message }) => Err(parse_error(
                status,
                &message,
                &endpoint,
            )),
            Err(e) => Err(e),
        }
    }
}

#![warn(missing_docs)]
//! gemimg - Gemini image generation from text and reference images.
//!
//! This crate turns a prompt (plus optional reference images) into an image
//! file by calling the Gemini `generateContent` API. Transient failures are
//! retried with linear backoff, and every call can be cancelled.
//!
//! # Quick Start
//!
//! ```no_run
//! use gemimg::{GeminiProvider, GenerationRequest, ImageProviderExt, ImageSize};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> gemimg::Result<()> {
//!     let provider = GeminiProvider::builder().build()?;
//!     let request = GenerationRequest::new("A golden retriever puppy")
//!         .with_aspect_ratio("16:9")
//!         .with_image_size(ImageSize::TwoK);
//!     let result = provider
//!         .generate_to_file(&request, None, &CancellationToken::new())
//!         .await?;
//!     println!("saved {}", result.path.display());
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `keyring`: store API keys in the OS keyring (default)
//! - `cli`: the `gemimg` command-line tool (default)

pub mod config;
pub mod credentials;
mod error;
pub mod files;
pub mod image;
pub mod transport;

// Re-export error types at crate root
pub use error::{GemImgError, Result, TransportError};

pub use config::{
    ConfigStore, GeneratorOptions, JsonConfigStore, MemoryConfigStore, ProviderEndpoint,
    StoredProviderConfig, GEMINI_PROVIDER,
};
#[cfg(feature = "keyring")]
pub use credentials::KeyringCredentialStore;
pub use credentials::{CredentialStore, MemoryCredentialStore};
pub use image::providers::{GeminiProvider, GeminiProviderBuilder};
pub use image::{
    GeneratedImage, GenerationMetadata, GenerationRequest, GenerationResult, ImageProvider,
    ImageProviderExt, ImageSize, ModelCapabilities, ModelFamily, ReferenceImage,
};
pub use transport::{HttpResponse, HttpTransport, RetryPolicy, TransportConfig};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{GemImgError, Result};
    pub use crate::image::providers::GeminiProvider;
    pub use crate::image::{
        GeneratedImage, GenerationRequest, GenerationResult, ImageProvider, ImageProviderExt,
        ImageSize, ReferenceImage,
    };
}

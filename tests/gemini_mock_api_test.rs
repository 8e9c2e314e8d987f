//! End-to-end tests for the Gemini provider against a wiremock server.
//!
//! Response bodies follow the `generateContent` format:
//! https://ai.google.dev/api/generate-content

use base64::Engine;
use gemimg::prelude::*;
use gemimg::{
    ConfigStore, CredentialStore, GeminiProvider, MemoryConfigStore, MemoryCredentialStore,
    StoredProviderConfig, TransportConfig, GEMINI_PROVIDER,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A 1x1 transparent PNG.
const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

const PRO_PATH: &str = "/v1beta/models/gemini-3-pro-image-preview:generateContent";
const FLASH_PATH: &str = "/v1beta/models/gemini-2.5-flash-image:generateContent";

fn png_bytes() -> Vec<u8> {
    base64::engine::general_purpose::STANDARD
        .decode(PNG_B64)
        .unwrap()
}

fn image_response() -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{"inlineData": {"mimeType": "image/png", "data": PNG_B64}}]
            },
            "finishReason": "STOP",
            "index": 0
        }],
        "usageMetadata": {"promptTokenCount": 4, "totalTokenCount": 1294}
    })
}

fn config_for(server: &MockServer, model: Option<&str>) -> Arc<MemoryConfigStore> {
    Arc::new(MemoryConfigStore::with_entry(
        GEMINI_PROVIDER,
        StoredProviderConfig {
            base_url: Some(server.uri()),
            model: model.map(str::to_string),
        },
    ))
}

fn provider_with(config: Arc<MemoryConfigStore>) -> GeminiProvider {
    GeminiProvider::builder()
        .api_key("test-api-key")
        .config(config)
        .transport(
            TransportConfig::new()
                .max_retries(2)
                .retry_delay(Duration::from_millis(10)),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_cyberpunk_cat_end_to_end() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .and(header("x-goog-api-key", "test-api-key"))
        .and(header("Content-Type", "application/json"))
        .and(body_partial_json(json!({
            "contents": [{"parts": [{"text": "cyberpunk cat"}]}],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": {"aspectRatio": "16:9", "imageSize": "2K"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_with(config_for(&server, None));
    let request = GenerationRequest::new("cyberpunk cat")
        .with_model("gemini-3-pro-image-preview")
        .with_aspect_ratio("16:9")
        .with_image_size(ImageSize::TwoK);

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("cat.png");
    let result = provider
        .generate_to_file(
            &request,
            Some(out.as_path()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.path, out);
    assert_eq!(result.data, png_bytes());
    assert_eq!(std::fs::read(&out).unwrap(), png_bytes());
    assert_eq!(result.mime_type, "image/png");
    assert_eq!(
        result.metadata.model.as_deref(),
        Some("gemini-3-pro-image-preview")
    );
    assert_eq!(result.metadata.attempts, 1);
}

#[tokio::test]
async fn test_flash_request_omits_image_size() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_with(config_for(&server, Some("gemini-2.5-flash-image")));
    let request = GenerationRequest::new("a lighthouse")
        .with_aspect_ratio("9:16")
        .with_image_size(ImageSize::FourK);
    let image = provider.generate(&request).await.unwrap();
    assert_eq!(image.data, png_bytes());

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    let image_config = &body["generationConfig"]["imageConfig"];
    assert_eq!(image_config["aspectRatio"], "9:16");
    assert!(image_config.get("imageSize").is_none());
}

#[tokio::test]
async fn test_reference_images_and_grounding_on_the_wire() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .and(body_partial_json(json!({"tools": [{"googleSearch": {}}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Based on today's forecast, rain is expected."},
                    {"inlineData": {"mimeType": "image/png", "data": PNG_B64}}
                ]}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let ref_path = dir.path().join("style.webp");
    std::fs::write(&ref_path, b"webp-bytes").unwrap();
    let reference = gemimg::files::load_reference_image(&ref_path).unwrap();

    let provider = provider_with(config_for(&server, None));
    let request = GenerationRequest::new("Paris weather poster in this style")
        .with_reference_image(reference)
        .with_grounding(true);
    let image = provider.generate(&request).await.unwrap();

    assert_eq!(image.data, png_bytes());
    assert_eq!(
        image.metadata.text.as_deref(),
        Some("Based on today's forecast, rain is expected.")
    );

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    let parts = body["contents"][0]["parts"].as_array().unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0]["text"], "Paris weather poster in this style");
    assert_eq!(parts[1]["inlineData"]["mimeType"], "image/webp");
    assert_eq!(
        parts[1]["inlineData"]["data"],
        base64::engine::general_purpose::STANDARD.encode(b"webp-bytes")
    );
}

#[tokio::test]
async fn test_server_errors_are_retried_then_succeed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_with(config_for(&server, None));
    let image = provider
        .generate(&GenerationRequest::new("p"))
        .await
        .unwrap();
    assert_eq!(image.metadata.attempts, 3);
}

#[tokio::test]
async fn test_exhausted_retries_surface_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": {"code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE"}
        })))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.png");
    let provider = provider_with(config_for(&server, None));
    let err = provider
        .generate_to_file(
            &GenerationRequest::new("p"),
            Some(out.as_path()),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GemImgError::Api { status: 503, ref message } if message == "The model is overloaded."
    ));
    assert!(!out.exists());
}

#[tokio::test]
async fn test_invalid_key_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_with(config_for(&server, None));
    let err = provider
        .generate(&GenerationRequest::new("p"))
        .await
        .unwrap_err();
    assert!(matches!(err, GemImgError::Api { status: 400, .. }));

    let err = provider.health_check().await.unwrap_err();
    assert!(matches!(err, GemImgError::Auth(_)));
}

#[tokio::test]
async fn test_health_check_ok() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1beta/models/gemini-3-pro-image-preview"))
        .and(header("x-goog-api-key", "test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "models/gemini-3-pro-image-preview"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_with(config_for(&server, None));
    provider.health_check().await.unwrap();
}

#[tokio::test]
async fn test_empty_candidates_writes_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.png");
    let provider = provider_with(config_for(&server, None));
    let err = provider
        .generate_to_file(
            &GenerationRequest::new("p"),
            Some(out.as_path()),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GemImgError::NoResultsFound(_)));
    assert!(!out.exists());
}

#[tokio::test]
async fn test_bad_base64_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "image/png", "data": "%%%"}}
            ]}}]
        })))
        .mount(&server)
        .await;

    let provider = provider_with(config_for(&server, None));
    let err = provider
        .generate(&GenerationRequest::new("p"))
        .await
        .unwrap_err();
    assert!(matches!(err, GemImgError::ImageDecodeFailed(_)));
}

#[tokio::test]
async fn test_cancel_before_response_writes_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(image_response())
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.png");
    let provider = provider_with(config_for(&server, None));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = provider
        .generate_to_file(&GenerationRequest::new("p"), Some(out.as_path()), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, GemImgError::Cancelled));
    assert!(!out.exists());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(server.received_requests().await.unwrap().len() <= 1);
}

#[tokio::test]
async fn test_missing_key_makes_no_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response()))
        .expect(0)
        .mount(&server)
        .await;

    let provider = GeminiProvider::builder()
        .credentials(Arc::new(MemoryCredentialStore::new()))
        .config(config_for(&server, None))
        .build()
        .unwrap();

    let err = provider
        .generate(&GenerationRequest::new("p"))
        .await
        .unwrap_err();
    assert!(matches!(err, GemImgError::CredentialNotFound { .. }));
}

#[tokio::test]
async fn test_config_and_key_changes_apply_to_next_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .and(header("x-goog-api-key", "first-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .and(header("x-goog-api-key", "second-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response()))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = Arc::new(MemoryCredentialStore::with_secret(GEMINI_PROVIDER, "first-key"));
    let config = config_for(&server, None);
    let provider = GeminiProvider::builder()
        .credentials(credentials.clone())
        .config(config.clone())
        .build()
        .unwrap();

    let request = GenerationRequest::new("p");
    let first = provider.generate(&request).await.unwrap();
    assert_eq!(
        first.metadata.model.as_deref(),
        Some("gemini-3-pro-image-preview")
    );

    credentials.set(GEMINI_PROVIDER, "second-key").await.unwrap();
    config
        .save(
            GEMINI_PROVIDER,
            &StoredProviderConfig {
                base_url: Some(server.uri()),
                model: Some("gemini-2.5-flash-image".into()),
            },
        )
        .unwrap();

    let second = provider.generate(&request).await.unwrap();
    assert_eq!(
        second.metadata.model.as_deref(),
        Some("gemini-2.5-flash-image")
    );
}

#[tokio::test]
async fn test_concurrent_generations_share_one_provider() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(image_response())
                .set_delay(Duration::from_millis(100)),
        )
        .expect(5)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(provider_with(config_for(&server, None)));

    let tasks: Vec<_> = (0..5)
        .map(|i| {
            let provider = provider.clone();
            let out = dir.path().join(format!("out-{i}.png"));
            tokio::spawn(async move {
                provider
                    .generate_to_file(
                        &GenerationRequest::new(format!("image {i}")),
                        Some(out.as_path()),
                        &CancellationToken::new(),
                    )
                    .await
            })
        })
        .collect();

    for task in tasks {
        let result = task.await.unwrap().unwrap();
        assert_eq!(std::fs::read(&result.path).unwrap(), png_bytes());
    }
}

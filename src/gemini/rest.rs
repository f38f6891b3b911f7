use super::types::*;
use super::GenerationBackend;
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::{Client, StatusCode};
use std::time::Duration;

const API_VERSION: &str = "v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Generative Language REST adapter.
pub struct GeminiRest {
    client: Client,
    api_key: String,
    base_url: String,
}

/// Map an HTTP failure to the retry policy's error kind.
pub fn classify(status: StatusCode, body: &str) -> ErrorKind {
    let api_status = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error.status);
    match (status.as_u16(), api_status.as_deref()) {
        (429, _) | (_, Some("RESOURCE_EXHAUSTED")) => ErrorKind::Quota,
        (404, _) | (_, Some("NOT_FOUND")) => ErrorKind::NotFound,
        _ => ErrorKind::Other,
    }
}

/// Prefer the API's own message over the raw body.
fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(b) => format!("{} {}", status, b.error.message),
        Err(_) => format!("{} {}", status, body),
    }
}

impl GeminiRest {
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(2)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        let model = model.trim_start_matches("models/");
        format!("{}/{}/models/{}:{}", self.base_url, API_VERSION, model, method)
    }

    async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, GenerationError>
    where
        B: serde::Serialize + Sync,
        T: serde::de::DeserializeOwned,
    {
        let resp = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| GenerationError::other(format!("request failed: {}", e)))?;
        Self::read_json(resp).await
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, GenerationError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::new(
                classify(status, &body),
                error_message(status, &body),
            ));
        }
        resp.json()
            .await
            .map_err(|e| GenerationError::other(format!("failed to parse response: {}", e)))
    }
}

#[async_trait]
impl GenerationBackend for GeminiRest {
    async fn generate_text(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        let url = self.model_url(model, "generateContent");
        let parsed: GenerateContentResponse = self
            .post_json(&url, &GenerateContentRequest::from_prompt(prompt))
            .await?;
        parsed
            .text()
            .ok_or_else(|| GenerationError::other(format!("{} returned no text", model)))
    }

    async fn generate_images(
        &self,
        model: &str,
        prompt: &str,
        request: &ImageRequest,
    ) -> Result<Vec<GeneratedImage>, GenerationError> {
        let url = self.model_url(model, "predict");
        let parsed: PredictResponse = self
            .post_json(&url, &PredictRequest::new(prompt, request))
            .await?;

        let mut images = Vec::new();
        for prediction in parsed.predictions {
            let Some(encoded) = prediction.bytes_base64_encoded else {
                continue;
            };
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| GenerationError::other(format!("invalid image base64: {}", e)))?;
            images.push(GeneratedImage {
                bytes,
                mime_type: prediction
                    .mime_type
                    .unwrap_or_else(|| request.mime_type.clone()),
            });
        }
        Ok(images)
    }

    /// All models visible to the key. Paginates automatically.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, GenerationError> {
        let mut all_models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!("{}/{}/models?pageSize=100", self.base_url, API_VERSION);
            if let Some(ref t) = page_token {
                url.push_str(&format!("&pageToken={}", t));
            }

            let resp = self
                .client
                .get(&url)
                .header(API_KEY_HEADER, &self.api_key)
                .send()
                .await
                .map_err(|e| GenerationError::other(format!("list models failed: {}", e)))?;
            let parsed: ListModelsResponse = Self::read_json(resp).await?;

            let done = parsed.models.is_empty()
                || parsed.next_page_token.as_deref().is_none_or(|t| t.is_empty());
            all_models.extend(parsed.models.into_iter().map(ModelInfo::from));
            if done {
                break;
            }
            page_token = parsed.next_page_token;
        }

        Ok(all_models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(server: &mockito::ServerGuard) -> GeminiRest {
        GeminiRest::new("test-key".to_string(), &server.url(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_classify_status_codes() {
        assert_eq!(classify(StatusCode::TOO_MANY_REQUESTS, ""), ErrorKind::Quota);
        assert_eq!(classify(StatusCode::NOT_FOUND, ""), ErrorKind::NotFound);
        assert_eq!(classify(StatusCode::INTERNAL_SERVER_ERROR, "boom"), ErrorKind::Other);
    }

    #[test]
    fn test_classify_api_status_field() {
        let body = r#"{"error": {"code": 403, "message": "quota", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(classify(StatusCode::FORBIDDEN, body), ErrorKind::Quota);
        let body = r#"{"error": {"code": 400, "message": "no such model", "status": "NOT_FOUND"}}"#;
        assert_eq!(classify(StatusCode::BAD_REQUEST, body), ErrorKind::NotFound);
    }

    #[test]
    fn test_model_url_strips_prefix() {
        let rest = GeminiRest::new("k".to_string(), "https://example.test/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            rest.model_url("models/gemini-2.0-flash", "generateContent"),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_generate_text_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-2.0-flash-lite:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"  반도체 패키징  "}]}}]}"#)
            .create_async()
            .await;

        let text = backend(&server)
            .generate_text("gemini-2.0-flash-lite", "topic please")
            .await
            .unwrap();
        assert_eq!(text, "  반도체 패키징  ");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_text_quota_exhausted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
            .with_status(429)
            .with_body(r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#)
            .create_async()
            .await;

        let err = backend(&server)
            .generate_text("gemini-2.0-flash", "x")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Quota);
        assert!(err.message.contains("Resource has been exhausted"));
    }

    #[tokio::test]
    async fn test_generate_text_empty_candidates_is_other() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
            .with_status(200)
            .with_body(r#"{"candidates":[]}"#)
            .create_async()
            .await;

        let err = backend(&server)
            .generate_text("gemini-2.5-flash", "x")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_generate_images_decodes_base64() {
        let mut server = mockito::Server::new_async().await;
        let encoded = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3, 4]);
        server
            .mock("POST", "/v1beta/models/imagen-3.0-generate-002:predict")
            .with_status(200)
            .with_body(format!(
                r#"{{"predictions":[{{"bytesBase64Encoded":"{}","mimeType":"image/png"}}]}}"#,
                encoded
            ))
            .create_async()
            .await;

        let images = backend(&server)
            .generate_images("imagen-3.0-generate-002", "chip", &ImageRequest::default())
            .await
            .unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].bytes, vec![1, 2, 3, 4]);
        assert_eq!(images[0].mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_generate_images_unknown_model() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/nope:predict")
            .with_status(404)
            .with_body(r#"{"error":{"code":404,"message":"models/nope is not found","status":"NOT_FOUND"}}"#)
            .create_async()
            .await;

        let err = backend(&server)
            .generate_images("nope", "chip", &ImageRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_list_models() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1beta/models")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"models":[
                    {"name":"models/gemini-2.0-flash","displayName":"Gemini 2.0 Flash","supportedGenerationMethods":["generateContent","countTokens"]},
                    {"name":"models/imagen-3.0-generate-002","supportedGenerationMethods":["predict"]}
                ]}"#,
            )
            .create_async()
            .await;

        let models = backend(&server).list_models().await.unwrap();
        assert_eq!(models.len(), 2);
        assert!(models[0].supports("generateContent"));
        assert!(!models[1].supports("generateContent"));
        assert_eq!(models[0].display_name.as_deref(), Some("Gemini 2.0 Flash"));
    }
}

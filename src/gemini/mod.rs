pub mod fallback;
pub mod rest;
pub mod types;

use async_trait::async_trait;
use types::{GeneratedImage, GenerationError, ImageRequest, ModelInfo};

pub use fallback::{GenerationClient, RetryPolicy};
pub use types::ErrorKind;

/// Text and image generation service. Implementations classify their own
/// failures into [`ErrorKind`] so callers never inspect error text.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate_text(&self, model: &str, prompt: &str) -> Result<String, GenerationError>;

    async fn generate_images(
        &self,
        model: &str,
        prompt: &str,
        request: &ImageRequest,
    ) -> Result<Vec<GeneratedImage>, GenerationError>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>, GenerationError>;
}

/// Models that can serve `generateContent`, i.e. usable as text candidates.
pub async fn text_models(backend: &dyn GenerationBackend) -> Result<Vec<ModelInfo>, GenerationError> {
    let models = backend.list_models().await?;
    Ok(models
        .into_iter()
        .filter(|m| m.supports("generateContent"))
        .collect())
}

use crate::gemini::types::ImageRequest;
use crate::gemini::GenerationBackend;
use anyhow::{Context, Result};
use image::DynamicImage;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

pub const FALLBACK_IMAGE_PROMPT: &str = "Futuristic high tech background, 8k";

static IMAGE_PROMPT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[IMAGE_PROMPT:\s*(.*?)\]").expect("valid regex"));

/// Inner text of the first `[IMAGE_PROMPT: ...]` tag, or the generic fallback.
pub fn extract_image_prompt(text: &str) -> String {
    extract_image_prompt_or(text, FALLBACK_IMAGE_PROMPT)
}

pub fn extract_image_prompt_or(text: &str, fallback: &str) -> String {
    IMAGE_PROMPT_TAG
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Decode any supported raster format and re-encode as lossy WebP.
pub fn encode_webp(bytes: &[u8], quality: u8) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).context("failed to decode generated image")?;
    let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
    let encoder = webp::Encoder::from_image(&rgba)
        .map_err(|e| anyhow::anyhow!("WebP encoder rejected image: {}", e))?;
    Ok(encoder.encode(f32::from(quality)).to_vec())
}

/// Cover art for a post: one generated image, stored as WebP under the site's images dir.
pub struct CoverArtist {
    backend: Arc<dyn GenerationBackend>,
    model: String,
    images_dir: PathBuf,
    url_prefix: String,
    quality: u8,
    request: ImageRequest,
}

impl CoverArtist {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        model: &str,
        images_dir: &Path,
        url_prefix: &str,
        quality: u8,
    ) -> Self {
        Self {
            backend,
            model: model.to_string(),
            images_dir: images_dir.to_path_buf(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
            quality,
            request: ImageRequest::default(),
        }
    }

    /// Web path of the saved image, or `None` on any failure. Never fatal.
    pub async fn generate_image(&self, prompt: &str, base_name: &str) -> Option<String> {
        tracing::info!(model = %self.model, "requesting cover image");
        match self.try_generate(prompt, base_name).await {
            Ok(web_path) => Some(web_path),
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "image generation failed, continuing without cover");
                None
            }
        }
    }

    async fn try_generate(&self, prompt: &str, base_name: &str) -> Result<String> {
        let images = self
            .backend
            .generate_images(&self.model, prompt, &self.request)
            .await?;
        let image = images
            .into_iter()
            .next()
            .context("backend returned no images")?;

        let webp = encode_webp(&image.bytes, self.quality)?;

        let file_name = format!("{}.webp", base_name);
        let save_path = self.images_dir.join(&file_name);
        tokio::fs::create_dir_all(&self.images_dir)
            .await
            .with_context(|| format!("failed to create {}", self.images_dir.display()))?;
        tokio::fs::write(&save_path, &webp)
            .await
            .with_context(|| format!("failed to write {}", save_path.display()))?;

        tracing::info!(path = %save_path.display(), bytes = webp.len(), "cover image saved");
        Ok(format!("{}/{}", self.url_prefix, file_name))
    }
}

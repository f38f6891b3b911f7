use crate::config::Config;
use crate::gemini::{GenerationBackend, GenerationClient};
use crate::git::VersionControl;
use crate::scheduler::{Clock, CycleRunner};
use crate::stages::cover::extract_image_prompt_or;
use crate::stages::publish::slugify;
use crate::stages::{ArticleGenerator, CoverArtist, Publisher, TopicSelector};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What one cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Published {
        topic: String,
        post: PathBuf,
        image: Option<String>,
    },
    /// Article generation gave up; nothing was written.
    NoArticle { topic: String },
    /// The post file could not be written.
    WriteFailed { topic: String, error: String },
}

/// Topic -> article -> cover image -> publish, strictly in sequence.
pub struct Pipeline {
    topics: TopicSelector,
    articles: ArticleGenerator,
    cover: CoverArtist,
    publisher: Publisher,
    clock: Arc<dyn Clock>,
    fallback_image_prompt: String,
}

impl Pipeline {
    pub fn new(
        topics: TopicSelector,
        articles: ArticleGenerator,
        cover: CoverArtist,
        publisher: Publisher,
        clock: Arc<dyn Clock>,
        fallback_image_prompt: &str,
    ) -> Self {
        Self {
            topics,
            articles,
            cover,
            publisher,
            clock,
            fallback_image_prompt: fallback_image_prompt.to_string(),
        }
    }

    /// Wire every stage from configuration. `repo = None` disables publishing.
    pub fn from_config(
        config: &Config,
        site_root: &Path,
        backend: Arc<dyn GenerationBackend>,
        repo: Option<Arc<dyn VersionControl>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let client = GenerationClient::from_config(backend.clone(), &config.gemini);
        let cover = CoverArtist::new(
            backend,
            &config.gemini.image_model,
            &config.site.images_path(site_root),
            &config.site.image_url_prefix,
            config.site.image_quality,
        );
        Self::new(
            TopicSelector::new(client.clone(), config.content.clone()),
            ArticleGenerator::new(client, config.content.clone()),
            cover,
            Publisher::new(&config.site.posts_path(site_root), repo),
            clock,
            &config.content.fallback_image_prompt,
        )
    }
}

#[async_trait]
impl CycleRunner for Pipeline {
    async fn run_cycle(&self) -> CycleOutcome {
        let date = self.clock.now().date();
        tracing::info!(%date, "automation cycle started");

        let topic = self.topics.select_topic().await;
        tracing::info!(topic = %topic, "topic selected");

        let Some(article) = self.articles.generate_article(&topic, date).await else {
            tracing::error!(topic = %topic, "no article generated, skipping this cycle");
            return CycleOutcome::NoArticle { topic };
        };

        let image_prompt = extract_image_prompt_or(&article, &self.fallback_image_prompt);
        let image = self.cover.generate_image(&image_prompt, &slugify(&topic)).await;

        let outcome = match self
            .publisher
            .publish(date, &topic, &article, image.as_deref())
            .await
        {
            Ok(post) => CycleOutcome::Published { topic, post, image },
            Err(e) => {
                let error = format!("{:#}", e);
                tracing::error!(error = %error, "failed to save post");
                CycleOutcome::WriteFailed { topic, error }
            }
        };
        tracing::info!("automation cycle finished");
        outcome
    }
}

use crate::config::ContentConfig;
use crate::gemini::GenerationClient;
use chrono::NaiveDate;

/// Writes the full post body, Hugo front matter included.
pub struct ArticleGenerator {
    client: GenerationClient,
    content: ContentConfig,
}

impl ArticleGenerator {
    pub fn new(client: GenerationClient, content: ContentConfig) -> Self {
        Self { client, content }
    }

    pub fn prompt(&self, topic: &str, date: NaiveDate) -> String {
        let c = &self.content;
        format!(
            "Write a professional tech blog post in **{language}** about: \"{topic}\".\n\
             **Role**: You are '{author}'.\n\
             **Structure**:\n\
             1. **Image Prompt**: The very first line must be [IMAGE_PROMPT: English description of a cover illustration].\n\
             2. **Front Matter**: Hugo YAML format between --- lines.\n\
             \x20  - title: \"{topic}\"\n\
             \x20  - date: {date}\n\
             \x20  - draft: false\n\
             \x20  - categories: [{categories}]\n\
             \x20  - tags: [{tags}]\n\
             \x20  - author: \"{author}\"\n\
             3. **Content**: Long-form, high technical depth, Markdown format.\n",
            language = c.language,
            topic = topic,
            author = c.author,
            date = date.format("%Y-%m-%d"),
            categories = c.categories.join(", "),
            tags = c.tags.join(", "),
        )
    }

    /// Raw model output, or `None` when generation gave up or came back blank.
    pub async fn generate_article(&self, topic: &str, date: NaiveDate) -> Option<String> {
        tracing::info!(topic = %topic, "drafting article");
        let text = self.client.generate(&self.prompt(topic, date)).await?;
        if text.trim().is_empty() {
            tracing::warn!(topic = %topic, "model returned an empty article");
            return None;
        }
        Some(text)
    }
}

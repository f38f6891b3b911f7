use crate::config::ContentConfig;
use crate::gemini::GenerationClient;

const EXAMPLE_TOPIC: &str = "3나노 공정의 수율 문제와 경제적 영향";

/// Picks today's topic. Never fails: falls back to the configured topic.
pub struct TopicSelector {
    client: GenerationClient,
    content: ContentConfig,
}

/// "A, B, or C"
fn join_or(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{} or {}", a, b),
        [rest @ .., last] => format!("{}, or {}", rest.join(", "), last),
    }
}

impl TopicSelector {
    pub fn new(client: GenerationClient, content: ContentConfig) -> Self {
        Self { client, content }
    }

    pub fn prompt(&self) -> String {
        format!(
            "Act as a Tech Trend Analyst.\n\
             Suggest ONE specific, profitable blog topic related to:\n\
             \"{}\".\n\
             Output ONLY the topic title in {}, on a single line, with no explanation.\n\
             Example: {}\n",
            join_or(&self.content.subjects),
            self.content.language,
            EXAMPLE_TOPIC,
        )
    }

    pub async fn select_topic(&self) -> String {
        tracing::info!("analysing trends for a topic");
        let generated = self.client.generate(&self.prompt()).await;
        match generated.as_deref().map(str::trim) {
            Some(topic) if !topic.is_empty() => topic.to_string(),
            _ => {
                tracing::warn!(fallback = %self.content.fallback_topic, "no topic generated, using fallback");
                self.content.fallback_topic.clone()
            }
        }
    }
}

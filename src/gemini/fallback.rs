use super::types::ErrorKind;
use super::GenerationBackend;
use crate::config::GeminiConfig;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_rounds: u32,
    /// Pause after an unexpected error, before the next candidate.
    pub model_cooldown: Duration,
    /// Pause between rounds once every candidate has failed.
    pub round_cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            model_cooldown: Duration::from_secs(5),
            round_cooldown: Duration::from_secs(60),
        }
    }
}

impl From<&GeminiConfig> for RetryPolicy {
    fn from(config: &GeminiConfig) -> Self {
        Self {
            max_rounds: config.max_rounds,
            model_cooldown: Duration::from_secs(config.model_cooldown_s),
            round_cooldown: Duration::from_secs(config.round_cooldown_s),
        }
    }
}

/// Text generation with model fallback and round-based retry.
///
/// Within a round each candidate is tried in order. Quota and not-found
/// failures move to the next candidate immediately; anything else waits
/// `model_cooldown` first. A fully failed round waits `round_cooldown`
/// before the next one. `None` means every round was exhausted and the
/// caller must fall back.
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    models: Vec<String>,
    policy: RetryPolicy,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn GenerationBackend>, models: Vec<String>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            models,
            policy,
        }
    }

    pub fn from_config(backend: Arc<dyn GenerationBackend>, config: &GeminiConfig) -> Self {
        Self::new(backend, config.text_models.clone(), RetryPolicy::from(config))
    }

    pub fn backend(&self) -> &Arc<dyn GenerationBackend> {
        &self.backend
    }

    /// Generate with the configured candidates and round budget.
    pub async fn generate(&self, prompt: &str) -> Option<String> {
        self.generate_with(prompt, &self.models, self.policy.max_rounds)
            .await
    }

    pub async fn generate_with(
        &self,
        prompt: &str,
        candidates: &[String],
        max_rounds: u32,
    ) -> Option<String> {
        if candidates.is_empty() {
            tracing::error!("no candidate models configured");
            return None;
        }

        for round in 0..max_rounds {
            for model in candidates {
                match self.backend.generate_text(model, prompt).await {
                    Ok(text) => {
                        tracing::debug!(model = %model, round, "generation succeeded");
                        return Some(text);
                    }
                    Err(e) => match e.kind {
                        ErrorKind::Quota => {
                            tracing::warn!(model = %model, "quota exhausted, trying next model");
                        }
                        ErrorKind::NotFound => {
                            tracing::warn!(model = %model, "model not found, trying next model");
                        }
                        ErrorKind::Other => {
                            tracing::error!(model = %model, error = %e, "generation failed");
                            tokio::time::sleep(self.policy.model_cooldown).await;
                        }
                    },
                }
            }

            if round + 1 < max_rounds {
                tracing::info!(
                    round = round + 1,
                    max_rounds,
                    cooldown_s = self.policy.round_cooldown.as_secs(),
                    "all models busy, cooling down"
                );
                tokio::time::sleep(self.policy.round_cooldown).await;
            }
        }

        tracing::error!(max_rounds, "generation gave up after all rounds");
        None
    }
}

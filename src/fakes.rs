//! In-memory fakes for the generation and version-control seams (testing only).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::Instant;

use crate::gemini::types::{GeneratedImage, GenerationError, ImageRequest, ModelInfo};
use crate::gemini::GenerationBackend;
use crate::git::VersionControl;
use crate::scheduler::Clock;
use chrono::NaiveDateTime;

/// One recorded backend call.
#[derive(Debug, Clone)]
pub struct BackendCall {
    pub model: String,
    pub prompt: String,
    pub at: Instant,
}

type TextResult = Result<String, GenerationError>;
type ImageResult = Result<Vec<GeneratedImage>, GenerationError>;

/// Backend that replays scripted responses per model, in order.
///
/// When a model's queue is empty the default text result is returned
/// (an `Other` error unless overridden).
pub struct ScriptedBackend {
    text: Mutex<HashMap<String, VecDeque<TextResult>>>,
    default_text: Mutex<TextResult>,
    images: Mutex<VecDeque<ImageResult>>,
    models: Vec<ModelInfo>,
    text_calls: Mutex<Vec<BackendCall>>,
    image_calls: Mutex<Vec<BackendCall>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            text: Mutex::new(HashMap::new()),
            default_text: Mutex::new(Err(GenerationError::other("no scripted response"))),
            images: Mutex::new(VecDeque::new()),
            models: Vec::new(),
            text_calls: Mutex::new(Vec::new()),
            image_calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_models(models: Vec<ModelInfo>) -> Self {
        Self {
            models,
            ..Self::default()
        }
    }

    pub fn push_text(&self, model: &str, result: TextResult) {
        self.text
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn set_default_text(&self, result: TextResult) {
        *self.default_text.lock().unwrap() = result;
    }

    pub fn push_images(&self, result: ImageResult) {
        self.images.lock().unwrap().push_back(result);
    }

    pub fn text_calls(&self) -> Vec<BackendCall> {
        self.text_calls.lock().unwrap().clone()
    }

    pub fn image_calls(&self) -> Vec<BackendCall> {
        self.image_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate_text(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        self.text_calls.lock().unwrap().push(BackendCall {
            model: model.to_string(),
            prompt: prompt.to_string(),
            at: Instant::now(),
        });
        let scripted = self
            .text
            .lock()
            .unwrap()
            .get_mut(model)
            .and_then(|q| q.pop_front());
        scripted.unwrap_or_else(|| self.default_text.lock().unwrap().clone())
    }

    async fn generate_images(
        &self,
        model: &str,
        prompt: &str,
        _request: &ImageRequest,
    ) -> Result<Vec<GeneratedImage>, GenerationError> {
        self.image_calls.lock().unwrap().push(BackendCall {
            model: model.to_string(),
            prompt: prompt.to_string(),
            at: Instant::now(),
        });
        self.images
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::other("no scripted image")))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, GenerationError> {
        Ok(self.models.clone())
    }
}

/// Version control that records commit messages instead of running git.
#[derive(Debug, Default)]
pub struct RecordingRepo {
    messages: Mutex<Vec<String>>,
    fail_with: Option<String>,
}

impl RecordingRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every publish attempt fails with `message` (after being recorded).
    pub fn failing(message: &str) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl VersionControl for RecordingRepo {
    async fn publish_changes(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        match &self.fail_with {
            Some(err) => anyhow::bail!("{}", err),
            None => Ok(()),
        }
    }
}

/// Wall clock pinned to tokio's clock: `origin` plus time elapsed since
/// creation. With paused tokio time, sleeping advances it deterministically.
pub struct VirtualClock {
    origin: NaiveDateTime,
    start: Instant,
}

impl VirtualClock {
    pub fn new(origin: NaiveDateTime) -> Self {
        Self {
            origin,
            start: Instant::now(),
        }
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = chrono::Duration::from_std(self.start.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.origin + elapsed
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }
}

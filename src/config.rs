use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ENV_FILE: &str = ".env";
pub const CONFIG_ENV: &str = "BLOG_AUTOPILOT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub publish: PublishConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_base: String,
    /// Tried in order, cheapest first.
    pub text_models: Vec<String>,
    pub image_model: String,
    pub max_rounds: u32,
    pub model_cooldown_s: u64,
    pub round_cooldown_s: u64,
    pub request_timeout_s: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com".to_string(),
            text_models: vec![
                "gemini-2.0-flash-lite".to_string(),
                "gemini-2.0-flash".to_string(),
                "gemini-2.5-flash".to_string(),
            ],
            image_model: "imagen-3.0-generate-002".to_string(),
            max_rounds: 3,
            model_cooldown_s: 5,
            round_cooldown_s: 60,
            request_timeout_s: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ContentConfig {
    pub language: String,
    pub subjects: Vec<String>,
    pub author: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub fallback_topic: String,
    pub fallback_image_prompt: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            language: "Korean".to_string(),
            subjects: vec![
                "Semiconductor Physics".to_string(),
                "AI Engineering".to_string(),
                "Quantitative Economics".to_string(),
            ],
            author: "ShyEngineer".to_string(),
            categories: vec!["Engineering".to_string()],
            tags: vec!["Tech".to_string(), "Economics".to_string()],
            fallback_topic: "인공지능과 반도체의 미래".to_string(),
            fallback_image_prompt: crate::stages::cover::FALLBACK_IMAGE_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SiteConfig {
    /// Content repository root. Unset means the working directory, where
    /// `config.toml` and `.env` are read from too.
    pub root: Option<PathBuf>,
    pub posts_dir: PathBuf,
    pub images_dir: PathBuf,
    pub image_url_prefix: String,
    pub image_quality: u8,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root: None,
            posts_dir: PathBuf::from("content/posts"),
            images_dir: PathBuf::from("static/images"),
            image_url_prefix: "/images".to_string(),
            image_quality: 80,
        }
    }
}

impl SiteConfig {
    pub fn root_dir(&self) -> Result<PathBuf> {
        if let Some(root) = &self.root {
            return Ok(root.clone());
        }
        std::env::current_dir().context("cannot read working directory")
    }

    pub fn posts_path(&self, root: &Path) -> PathBuf {
        root.join(&self.posts_dir)
    }

    pub fn images_path(&self, root: &Path) -> PathBuf {
        root.join(&self.images_dir)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Local time of day, "HH:MM".
    pub daily_at: String,
    pub poll_interval_s: u64,
    pub run_on_startup: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_at: "09:00".to_string(),
            poll_interval_s: 60,
            run_on_startup: true,
        }
    }
}

impl ScheduleConfig {
    pub fn trigger_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.daily_at.trim(), "%H:%M")
            .with_context(|| format!("invalid schedule.daily_at: {:?} (expected HH:MM)", self.daily_at))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PublishConfig {
    pub enabled: bool,
    pub remote: String,
    pub branch: Option<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            remote: "origin".to_string(),
            branch: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| "Failed to parse config TOML")?;
        config.schedule.trigger_time()?;
        Ok(config)
    }

    /// Load from `$BLOG_AUTOPILOT_CONFIG` or `config.toml`. A missing file means defaults.
    pub fn load_or_default() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV)
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Load .env file into process environment. Real env vars take precedence.
    pub fn load_env_file() {
        load_env_from(Path::new(ENV_FILE));
    }

    /// The single credential. Missing is fatal; there is no interactive prompt.
    pub fn google_api_key() -> Result<String> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !sanitize_key(&key).is_empty() => Ok(sanitize_key(&key)),
            _ => anyhow::bail!("{} is not set (add it to .env or the environment)", API_KEY_ENV),
        }
    }
}

fn load_env_from(path: &Path) {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return,
    };
    // Strip BOM if present (common on Windows-created files)
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    for (key, value) in parse_env(content) {
        if std::env::var(&key).is_err() {
            std::env::set_var(key, value);
        }
    }
}

fn parse_env(content: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for line in content.lines() {
        let line = line.trim().trim_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim().trim_start_matches("export ").trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            out.push((key.to_string(), value.to_string()));
        }
    }
    out
}

/// Strip carriage returns, BOM, and other invisible chars from a key value.
fn sanitize_key(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "")
        .trim()
        .to_string()
}

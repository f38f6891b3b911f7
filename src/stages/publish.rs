use crate::git::VersionControl;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

const DRAFT_MARKER: &str = "draft: false";
const FRONT_MATTER_DELIMITER: &str = "---";

static NON_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static IMAGE_PROMPT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[IMAGE_PROMPT:.*?\]").expect("valid regex"));

/// Lowercase, punctuation stripped, each whitespace char replaced by `-`.
/// "3나노 공정!" -> "3나노-공정"
pub fn slugify(topic: &str) -> String {
    let stripped = NON_SLUG_CHARS.replace_all(topic, "");
    let slug: String = stripped
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect::<String>()
        .to_lowercase();
    if slug.is_empty() {
        "post".to_string()
    } else {
        slug
    }
}

/// `YYYY-MM-DD-<slug>.md`
pub fn post_filename(date: NaiveDate, topic: &str) -> String {
    format!("{}-{}.md", date.format("%Y-%m-%d"), slugify(topic))
}

/// Insert `stanza` as new line(s) right after the first line matching `is_marker`,
/// keeping that line's ending style.
fn insert_after_line(text: &str, stanza: &str, is_marker: impl Fn(&str) -> bool) -> Option<String> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let end = offset + line.len();
        if is_marker(line.trim_end_matches(['\r', '\n'])) {
            let eol = if line.ends_with("\r\n") { "\r\n" } else { "\n" };
            let stanza = stanza.replace('\n', eol);
            let mut out = String::with_capacity(text.len() + stanza.len() + 2);
            out.push_str(&text[..end]);
            if line.ends_with('\n') {
                out.push_str(&stanza);
                out.push_str(eol);
            } else {
                out.push_str(eol);
                out.push_str(&stanza);
            }
            out.push_str(&text[end..]);
            return Some(out);
        }
        offset = end;
    }
    None
}

fn opens_with_front_matter(text: &str) -> bool {
    text.lines()
        .find(|l| !l.trim().is_empty())
        .is_some_and(|l| l.trim() == FRONT_MATTER_DELIMITER)
}

/// Add a `cover.image` entry to the front matter, after `draft: false`
/// or else right after the opening `---`. A `---` further down the body
/// is a horizontal rule, not front matter.
pub fn insert_cover(text: &str, image_path: &str) -> String {
    let stanza = format!("cover:\n  image: {}", image_path);
    insert_after_line(text, &stanza, |l| l.trim() == DRAFT_MARKER)
        .or_else(|| {
            opens_with_front_matter(text)
                .then(|| insert_after_line(text, &stanza, |l| l.trim() == FRONT_MATTER_DELIMITER))
                .flatten()
        })
        .unwrap_or_else(|| {
            tracing::warn!("no front matter found, cover image not linked");
            text.to_string()
        })
}

/// Remove every image-prompt tag and any whitespace left before the front matter.
pub fn strip_image_prompt(text: &str) -> String {
    IMAGE_PROMPT_TAG
        .replace_all(text, "")
        .trim_start()
        .to_string()
}

/// Final post text: tag always stripped; cover linked when an image exists.
pub fn render_post(article: &str, image_path: Option<&str>) -> String {
    let stripped = strip_image_prompt(article);
    match image_path {
        Some(path) => insert_cover(&stripped, path),
        None => stripped,
    }
}

/// Writes the post and pushes it. The file is written first; version
/// control failures are logged, never returned.
pub struct Publisher {
    posts_dir: PathBuf,
    repo: Option<Arc<dyn VersionControl>>,
}

impl Publisher {
    pub fn new(posts_dir: &Path, repo: Option<Arc<dyn VersionControl>>) -> Self {
        Self {
            posts_dir: posts_dir.to_path_buf(),
            repo,
        }
    }

    pub async fn publish(
        &self,
        date: NaiveDate,
        topic: &str,
        article: &str,
        image_path: Option<&str>,
    ) -> Result<PathBuf> {
        let filename = post_filename(date, topic);
        let file_path = self.posts_dir.join(&filename);
        let body = render_post(article, image_path);

        tokio::fs::create_dir_all(&self.posts_dir)
            .await
            .with_context(|| format!("failed to create {}", self.posts_dir.display()))?;
        tokio::fs::write(&file_path, body)
            .await
            .with_context(|| format!("failed to write {}", file_path.display()))?;
        tracing::info!(file = %filename, "post saved");

        match &self.repo {
            Some(repo) => {
                let message = format!("Auto-post: {}", topic);
                if let Err(e) = repo.publish_changes(&message).await {
                    tracing::error!(error = %format!("{:#}", e), "git deploy failed, post left in working tree");
                }
            }
            None => tracing::info!("publishing disabled, skipping git"),
        }

        Ok(file_path)
    }
}

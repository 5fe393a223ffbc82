//! Resource ingestion: reading text resources and recording what was memorized.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Deserialize;

use super::types::{Modality, Resource};
use crate::llm::ensure_success;

/// Text beyond this many characters is not sent to the extraction prompt.
pub const MAX_INGEST_CHARS: usize = 24_000;

pub fn insert_resource(
    conn: &Connection,
    url: &str,
    modality: Modality,
    user_id: Option<&str>,
    caption: Option<&str>,
) -> Result<Resource> {
    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO resources (id, url, modality, user_id, caption, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, url, modality.as_str(), user_id, caption, now],
    )?;
    Ok(Resource {
        id,
        url: url.to_string(),
        modality,
        user_id: user_id.map(str::to_string),
        caption: caption.map(str::to_string),
        created_at: now,
    })
}

/// Read a text resource from a local path or an `http(s)` URL.
pub async fn read_text(http: &reqwest::Client, url: &str) -> Result<String> {
    let text = if url.starts_with("http://") || url.starts_with("https://") {
        let response = http
            .get(url)
            .send()
            .await
            .with_context(|| format!("HTTP request failed for {url}"))?;
        ensure_success(response, "resource download")
            .await?
            .text()
            .await
            .context("error reading resource body")?
    } else {
        let path = crate::config::expand_tilde(url);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read resource: {}", path.display()))?
    };
    Ok(truncate_chars(&text, MAX_INGEST_CHARS))
}

#[derive(Deserialize)]
struct Turn {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: String,
}

/// Render a conversation resource as `role: content` lines.
///
/// Accepts a JSON array of `{role, content}` turns (optionally wrapped in
/// `{"messages": [...]}`); anything else is returned unchanged.
pub fn render_conversation(raw: &str) -> String {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Transcript {
        Turns(Vec<Turn>),
        Wrapped { messages: Vec<Turn> },
    }

    let turns = match serde_json::from_str::<Transcript>(raw) {
        Ok(Transcript::Turns(turns)) | Ok(Transcript::Wrapped { messages: turns }) => turns,
        Err(_) => return raw.to_string(),
    };

    turns
        .iter()
        .filter(|t| !t.content.trim().is_empty())
        .map(|t| {
            let role = if t.role.is_empty() { "user" } else { t.role.as_str() };
            format!("{role}: {}", t.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

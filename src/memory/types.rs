//! Core memory type definitions.
//!
//! Defines [`MemoryType`] (what kind of thing an item records), [`Modality`]
//! (how a memorized resource is ingested), and the records returned by the
//! [`MemoryBackend`](super::MemoryBackend) operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kinds of memory item the store keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Who the user is: identity, background, relationships.
    Profile,
    /// Likes, dislikes, settings, habits.
    Preference,
    /// Knowledge and facts worth recalling.
    Fact,
    /// Things that happened: decisions, milestones, occurrences.
    Event,
}

impl MemoryType {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Preference => "preference",
            Self::Fact => "fact",
            Self::Event => "event",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "profile" => Ok(Self::Profile),
            "preference" => Ok(Self::Preference),
            "fact" => Ok(Self::Fact),
            "event" => Ok(Self::Event),
            _ => Err(format!("unknown memory type: {s}")),
        }
    }
}

/// How a resource passed to `memorize` is read and turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    #[default]
    Text,
    /// Chat transcript, either plain text or a JSON array of `{role, content}`.
    Conversation,
    Document,
    /// Captioned through the vision model before extraction.
    Image,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Conversation => "conversation",
            Self::Document => "document",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "conversation" => Ok(Self::Conversation),
            "document" => Ok(Self::Document),
            "image" => Ok(Self::Image),
            other => Err(format!("unsupported modality: {other}")),
        }
    }
}

/// A stored memory item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    pub memory_type: MemoryType,
    /// One-sentence statement of what is remembered.
    pub summary: String,
    pub user_id: Option<String>,
    /// Resource this item was extracted from, if any.
    pub resource_id: Option<String>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    pub updated_at: String,
    /// Free-form JSON object. Carries `reinforcement_count`.
    pub extra: serde_json::Value,
    /// Names of the categories this item belongs to.
    pub categories: Vec<String>,
}

impl MemoryItem {
    /// How many times this item has been stored; 1 when never reinforced.
    pub fn reinforcement_count(&self) -> u64 {
        self.extra
            .get("reinforcement_count")
            .and_then(|v| v.as_u64())
            .unwrap_or(1)
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// A named bucket of memory items with an optional rolling summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCategory {
    pub id: String,
    pub name: String,
    pub description: String,
    pub summary: Option<String>,
}

/// An ingested resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub url: String,
    pub modality: Modality,
    pub user_id: Option<String>,
    /// Vision caption for images.
    pub caption: Option<String>,
    pub created_at: String,
}

/// One ranked retrieval hit.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedItem {
    pub id: String,
    pub memory_type: MemoryType,
    pub summary: String,
    pub created_at: String,
    pub score: f64,
}

/// Result of a retrieval request.
#[derive(Debug, Clone, Serialize, Default)]
pub struct RetrieveResult {
    pub items: Vec<RetrievedItem>,
    /// Query actually searched, when intention routing rewrote it.
    pub rewritten_query: Option<String>,
}

/// Result of memorizing a resource.
#[derive(Debug, Clone, Serialize)]
pub struct MemorizeResult {
    pub resource: Resource,
    pub items: Vec<MemoryItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_type_parses_case_insensitively() {
        assert_eq!(" Fact ".parse::<MemoryType>().unwrap(), MemoryType::Fact);
        assert_eq!("PROFILE".parse::<MemoryType>().unwrap(), MemoryType::Profile);
        assert!("knowledge".parse::<MemoryType>().is_err());
    }

    #[test]
    fn unsupported_modality_is_rejected() {
        assert_eq!("image".parse::<Modality>().unwrap(), Modality::Image);
        let err = "video".parse::<Modality>().unwrap_err();
        assert_eq!(err, "unsupported modality: video");
    }

    #[test]
    fn reinforcement_count_defaults_to_one() {
        let mut item = MemoryItem {
            id: "x".into(),
            memory_type: MemoryType::Fact,
            summary: "s".into(),
            user_id: None,
            resource_id: None,
            created_at: "2026-01-01T00:00:00+00:00".into(),
            updated_at: "2026-01-01T00:00:00+00:00".into(),
            extra: serde_json::json!({}),
            categories: vec![],
        };
        assert_eq!(item.reinforcement_count(), 1);
        item.extra = serde_json::json!({"reinforcement_count": 4});
        assert_eq!(item.reinforcement_count(), 4);
        assert!(item.created_at_utc().is_some());
    }
}

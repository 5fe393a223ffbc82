//! `store`: judge, summarize, dedup and persist one memory.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::Context;
use crate::config::CaptureDetail;
use crate::llm::strip_code_fence;
use crate::memory::types::MemoryType;

/// Word-set overlap above which a new summary counts as a duplicate.
const DUPLICATE_OVERLAP: f64 = 0.7;
/// How many retrieval hits the dedup check compares against.
const DEDUP_CANDIDATES: usize = 3;
/// Summaries shorter than this are rejected.
const MIN_SUMMARY_CHARS: usize = 5;
/// Non-JSON judge responses longer than this are kept as a fact summary.
const MIN_RAW_JUDGMENT_CHARS: usize = 10;

#[derive(Debug, Deserialize)]
pub struct StoreParams {
    #[serde(default)]
    pub content: String,
    /// Absent means `profile`. An explicit `null` hands classification to the LLM judge.
    #[serde(rename = "type", default = "default_type")]
    pub memory_type: Option<String>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub skip_judge: bool,
}

fn default_type() -> Option<String> {
    Some(MemoryType::Profile.as_str().to_string())
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum StoreOutcome {
    Stored {
        success: bool,
        id: String,
        summary: String,
        #[serde(rename = "type")]
        memory_type: MemoryType,
        categories: Vec<String>,
    },
    Skipped {
        success: bool,
        skipped: bool,
        reason: String,
    },
    Rejected {
        success: bool,
        error: String,
    },
}

impl StoreOutcome {
    fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            success: false,
            skipped: true,
            reason: reason.into(),
        }
    }
}

/// What the judge decided about a piece of content.
#[derive(Debug, Clone, PartialEq)]
pub enum Judgment {
    Skip,
    Keep {
        summary: String,
        memory_type: MemoryType,
        categories: Vec<String>,
    },
}

#[derive(Deserialize)]
struct JudgeResponse {
    #[serde(default)]
    summary: String,
    #[serde(rename = "type", default)]
    memory_type: Option<String>,
    #[serde(default)]
    categories: Option<Vec<String>>,
}

pub async fn store(ctx: &Context, params: StoreParams) -> Result<StoreOutcome> {
    let (summary, memory_type, categories) = match params.memory_type.as_deref() {
        None if !params.skip_judge => {
            let detail = ctx.config.memorize.capture_detail;
            let response = ctx.llm.chat(&judge_prompt(&params.content, detail)).await?;
            match parse_judgment(&response) {
                Judgment::Skip => return Ok(StoreOutcome::skipped("Not worth remembering")),
                Judgment::Keep {
                    summary,
                    memory_type,
                    categories,
                } => (summary, memory_type, categories),
            }
        }
        requested => {
            let memory_type = match requested {
                Some(t) => t.parse::<MemoryType>().map_err(anyhow::Error::msg)?,
                None => MemoryType::Fact,
            };
            let prompt = format!("Summarize in one concise sentence:\n{}\n\nSummary:", params.content);
            let summary = ctx.llm.chat(&prompt).await?.trim().to_string();
            let categories = params
                .categories
                .filter(|c| !c.is_empty())
                .unwrap_or_else(default_categories);
            (summary, memory_type, categories)
        }
    };

    if summary.chars().count() < MIN_SUMMARY_CHARS {
        return Ok(StoreOutcome::Rejected {
            success: false,
            error: "No meaningful content to store".into(),
        });
    }

    match ctx.memory.retrieve(&summary).await {
        Ok(existing) => {
            for item in existing.items.iter().take(DEDUP_CANDIDATES) {
                if word_overlap(&summary, &item.summary) > DUPLICATE_OVERLAP {
                    tracing::info!(existing = %item.id, "duplicate memory skipped");
                    return Ok(StoreOutcome::skipped(format!(
                        "Duplicate of existing memory: {}",
                        item.id
                    )));
                }
            }
        }
        Err(e) => tracing::warn!(error = %e, "dedup check failed, storing anyway"),
    }

    let item = ctx
        .memory
        .create_memory_item(memory_type, &summary, &categories, None)
        .await?;

    Ok(StoreOutcome::Stored {
        success: true,
        id: item.id,
        summary,
        memory_type,
        categories,
    })
}

fn default_categories() -> Vec<String> {
    vec!["Facts".to_string()]
}

/// Build the memory-filter prompt for the configured capture detail.
pub fn judge_prompt(content: &str, detail: CaptureDetail) -> String {
    let guidance = match detail {
        CaptureDetail::Low => {
            "NOT worth remembering (respond SKIP):
- Casual greetings, small talk, jokes without substance
- System messages, tool outputs, status checks
- Temporary states (\"I'm cooking\", \"brb\")
- Heartbeat/health checks
- Repetitive or trivial exchanges
- Already-known information being restated
- Minor details or fleeting conversations

WORTH remembering:
- Critical user identity information
- Important decisions or agreements
- Major milestones or events"
        }
        CaptureDetail::Medium => {
            "NOT worth remembering (respond SKIP):
- Casual greetings, small talk, jokes without substance
- System messages, tool outputs, status checks
- Temporary states (\"I'm cooking\", \"brb\")
- Heartbeat/health checks
- Repetitive or trivial exchanges
- Already-known information being restated

WORTH remembering:
- User identity, preferences, opinions
- Important decisions or agreements
- New facts about the user or their projects
- Significant events or milestones
- Technical discoveries or lessons learned
- Relationship dynamics or emotional context"
        }
        CaptureDetail::High => {
            "NOT worth remembering (respond SKIP):
- Pure system messages, heartbeat/health checks
- Exact duplicates of already-known information

WORTH remembering (be generous and capture details):
- User identity, preferences, opinions, habits
- Important decisions or agreements
- New facts about the user, their projects, or people they know
- Significant events or milestones
- Technical discoveries or lessons learned
- Relationship dynamics or emotional context
- Specific details: names, dates, numbers, places
- Casual mentions that reveal personality or interests
- Group chat dynamics, jokes with context, recurring topics
- Small but meaningful details (pet names, food preferences, etc.)"
        }
    };

    format!(
        "You are a memory filter for an AI assistant. Analyze this conversation and decide \
         if it contains information worth remembering long-term.\n\n\
         {guidance}\n\n\
         Conversation:\n{content}\n\n\
         If NOT worth remembering, respond with exactly: SKIP\n\
         If WORTH remembering, respond in this exact JSON format:\n\
         {{\"summary\": \"one concise sentence capturing the key info\", \
         \"type\": \"one of: profile/preference/fact/event\", \
         \"categories\": [\"one or more of: User Profile, Preferences, Facts, Events\"]}}"
    )
}

/// Interpret the judge's response: `SKIP`, JSON (optionally fenced), or raw text.
pub fn parse_judgment(response: &str) -> Judgment {
    let response = response.trim();
    if response.to_uppercase().starts_with("SKIP") {
        return Judgment::Skip;
    }

    match serde_json::from_str::<JudgeResponse>(strip_code_fence(response)) {
        Ok(parsed) => Judgment::Keep {
            summary: parsed.summary,
            memory_type: parsed
                .memory_type
                .and_then(|t| t.parse().ok())
                .unwrap_or(MemoryType::Fact),
            categories: parsed.categories.unwrap_or_else(default_categories),
        },
        Err(_) if response.chars().count() > MIN_RAW_JUDGMENT_CHARS => Judgment::Keep {
            summary: response.to_string(),
            memory_type: MemoryType::Fact,
            categories: default_categories(),
        },
        Err(_) => Judgment::Skip,
    }
}

/// Share of the new summary's lowercase words that also appear in the old one.
pub fn word_overlap(new: &str, old: &str) -> f64 {
    let new = new.to_lowercase();
    let old = old.to_lowercase();
    let words_new: HashSet<&str> = new.split_whitespace().collect();
    let words_old: HashSet<&str> = old.split_whitespace().collect();
    if words_new.is_empty() || words_old.is_empty() {
        return 0.0;
    }
    words_new.intersection(&words_old).count() as f64 / words_new.len() as f64
}

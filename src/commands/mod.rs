//! The adapter's command surface.
//!
//! [`Command`] is what clap parses from argv. Each command's raw arguments are
//! validated into a [`Request`] before any database or provider is touched, so a
//! missing argument fails fast with its [`BridgeError`] message. [`Request::run`]
//! then dispatches against a [`Context`] and returns the JSON document to print.

pub mod categories;
pub mod cleanup;
pub mod delete;
pub mod list;
pub mod memorize;
pub mod search;
pub mod store;

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::llm::LlmClient;
use crate::memory::{LocalMemoryService, MemoryBackend};

pub const DEFAULT_SEARCH_LIMIT: usize = 3;
pub const DEFAULT_LIST_LIMIT: usize = 20;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store a memory. PAYLOAD: {"content", "type"?, "categories"?, "skip_judge"?}
    Store { payload: Option<String> },
    /// Search memories with a natural-language query
    Search {
        query: Option<String>,
        limit: Option<usize>,
    },
    /// Delete a memory. PAYLOAD: {"id"}
    Delete { payload: Option<String> },
    /// List the most recent memories
    List { limit: Option<usize> },
    /// Memorize a resource. PAYLOAD: {"url", "modality"?, "user_id"?, "context"?}
    Memorize { payload: Option<String> },
    /// List memory categories and their summaries
    Categories,
    /// Delete old, never-reinforced memories. PAYLOAD: {"max_age_days"?, "min_importance"?}
    Cleanup { payload: Option<String> },
}

/// A validated command, ready to run.
#[derive(Debug)]
pub enum Request {
    Store(store::StoreParams),
    Search { query: String, limit: usize },
    Delete(delete::DeleteParams),
    List { limit: usize },
    Memorize(memorize::MemorizeParams),
    Categories,
    Cleanup(cleanup::CleanupParams),
}

impl TryFrom<Command> for Request {
    type Error = BridgeError;

    fn try_from(command: Command) -> Result<Self, BridgeError> {
        let request = match command {
            Command::Store { payload } => {
                Self::Store(parse_payload(payload.ok_or(BridgeError::NoContent)?)?)
            }
            Command::Search { query, limit } => Self::Search {
                query: query.ok_or(BridgeError::NoQuery)?,
                limit: limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            },
            Command::Delete { payload } => {
                Self::Delete(parse_payload(payload.ok_or(BridgeError::NoId)?)?)
            }
            Command::List { limit } => Self::List {
                limit: limit.unwrap_or(DEFAULT_LIST_LIMIT),
            },
            Command::Memorize { payload } => {
                Self::Memorize(parse_payload(payload.ok_or(BridgeError::NoResourceUrl)?)?)
            }
            Command::Categories => Self::Categories,
            Command::Cleanup { payload } => Self::Cleanup(match payload {
                Some(p) => parse_payload(p)?,
                None => cleanup::CleanupParams::default(),
            }),
        };
        Ok(request)
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(payload: String) -> Result<T, BridgeError> {
    Ok(serde_json::from_str(&payload)?)
}

/// Everything a command needs, built once per process.
pub struct Context {
    pub config: Arc<BridgeConfig>,
    pub memory: Arc<dyn MemoryBackend>,
    pub llm: Arc<dyn LlmClient>,
}

impl Context {
    /// Build providers and open the local memory service from configuration.
    pub fn from_config(config: BridgeConfig) -> Result<Self> {
        let config = Arc::new(config);
        let llm = crate::llm::create_client(&config)?;
        let embedder = crate::embedding::create_provider(&config)?;
        let memory = LocalMemoryService::open(Arc::clone(&config), Arc::clone(&llm), embedder)?;

        Ok(Self {
            config,
            memory: Arc::new(memory),
            llm,
        })
    }
}

impl Request {
    pub async fn run(self, ctx: &Context) -> Result<serde_json::Value> {
        match self {
            Self::Store(params) => to_json(store::store(ctx, params).await?),
            Self::Search { query, limit } => to_json(search::search(ctx, &query, limit).await?),
            Self::Delete(params) => to_json(delete::delete(ctx, params).await),
            Self::List { limit } => to_json(list::list(ctx, limit).await?),
            Self::Memorize(params) => to_json(memorize::memorize(ctx, params).await?),
            Self::Categories => to_json(categories::categories(ctx).await?),
            Self::Cleanup(params) => to_json(cleanup::cleanup(ctx, params).await?),
        }
    }
}

fn to_json<T: Serialize>(output: T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(output)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_arguments_map_to_contract_errors() {
        let cases = [
            (Command::Store { payload: None }, "No content specified"),
            (Command::Search { query: None, limit: None }, "No query specified"),
            (Command::Delete { payload: None }, "No ID specified"),
            (Command::Memorize { payload: None }, "No resource URL specified"),
        ];
        for (command, message) in cases {
            let err = Request::try_from(command).unwrap_err();
            assert_eq!(err.to_string(), message);
        }
    }

    #[test]
    fn defaults_are_applied() {
        let Request::Search { limit, .. } = Request::try_from(Command::Search {
            query: Some("메뮤".into()),
            limit: None,
        })
        .unwrap() else {
            panic!("expected search");
        };
        assert_eq!(limit, DEFAULT_SEARCH_LIMIT);

        let Request::List { limit } = Request::try_from(Command::List { limit: None }).unwrap() else {
            panic!("expected list");
        };
        assert_eq!(limit, DEFAULT_LIST_LIMIT);

        let Request::Cleanup(params) =
            Request::try_from(Command::Cleanup { payload: None }).unwrap()
        else {
            panic!("expected cleanup");
        };
        assert_eq!(params.max_age_days, 90);
    }

    #[test]
    fn bad_json_is_rejected() {
        let err = Request::try_from(Command::Store {
            payload: Some("{not json".into()),
        })
        .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidPayload(_)));
    }
}

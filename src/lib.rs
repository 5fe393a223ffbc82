//! memu-bridge: a command-line adapter between an agent plugin and a memory service.
//!
//! Every invocation runs one command and prints exactly one JSON document on
//! stdout. Logs go to stderr.
//!
//! # Architecture
//!
//! - **Query preprocessing**: Korean and English stopwords are stripped from search
//!   queries before retrieval, with a guard that never returns an (almost) empty query
//! - **Memory backend**: the [`memory::MemoryBackend`] trait, implemented locally over
//!   SQLite with FTS5 for keyword search and
//!   [sqlite-vec](https://github.com/asg017/sqlite-vec) for vector search
//! - **Providers**: hosted chat/vision LLMs (Anthropic, Gemini, OpenAI-compatible) and
//!   embedding APIs (Gemini, OpenAI-compatible)
//!
//! # Modules
//!
//! - [`commands`]: the CLI surface and its JSON outputs
//! - [`config`]: configuration from a TOML file and environment variables
//! - [`db`]: SQLite initialization, schema, and migrations
//! - [`embedding`]: text-to-vector providers
//! - [`llm`]: chat and vision clients
//! - [`memory`]: the memory backend: store, search, forget, categories, and memorize
//! - [`preprocess`]: stopword removal for search queries

pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod memory;
pub mod preprocess;

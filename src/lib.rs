//! # Scuba RAG
//!
//! An authenticated, retrieval-augmented chat backend that answers
//! questions about scuba diving in Colombia from a local knowledge base of
//! dive trip reports.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Knowledge    │──▶│ Chunk+Embed  │──▶│  In-memory   │
//! │ base (YAML)  │   │  pipeline    │   │  vector index│
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              ▼
//!   ┌──────────┐   ┌─────────────┐   ┌──────────────────┐
//!   │  HTTP    │──▶│ Bearer auth │──▶│ Answer generator │──▶ LLM
//!   │  (axum)  │   │ (SQLite)    │   │ (lazy, 1 flight) │
//!   └──────────┘   └─────────────┘   └──────────────────┘
//! ```
//!
//! Chunking, the vector index, retrieval and prompt composition live in
//! the `scuba-rag-core` crate; this crate adds I/O, providers and HTTP.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`corpus`] | Knowledge-base loader |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Chat-completion providers |
//! | [`ingest`] | load → chunk → embed → index pipeline |
//! | [`generator`] | Answer generation and engine lifecycle |
//! | [`auth`] | Users, passwords and bearer tokens |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod auth;
pub mod config;
pub mod corpus;
pub mod db;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod retry;
pub mod server;

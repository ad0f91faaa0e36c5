//! # Scuba RAG Core
//!
//! Runtime-agnostic logic for the diving assistant: data models,
//! chunking, the embedding trait, the in-memory embedding index, the
//! retriever and prompt composition.
//!
//! This crate contains no tokio, sqlx, HTTP clients or filesystem I/O.
//! Providers and the answer lifecycle live in the `scuba-rag` app crate.

pub mod chunk;
pub mod embedding;
pub mod index;
pub mod models;
pub mod prompt;
pub mod retriever;

//! # docdex
//!
//! A document ingestion and retrieval-augmented question answering
//! pipeline.
//!
//! Documents enter as raw bytes, get parsed by an external service,
//! chunked, embedded, and stored in SQLite with their vectors. Questions
//! are answered by embedding the query, retrieving the most similar
//! chunks from completed documents, and asking a language model with the
//! retrieved text as grounded context.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐   ┌───────────────────────────┐   ┌──────────┐
//! │ upload │──▶│ lifecycle manager          │──▶│  SQLite   │
//! │ (bytes)│   │ parse → chunk → embed      │   │ docs+vecs │
//! └────────┘   └───────────────────────────┘   └────┬─────┘
//!                                                   │
//! ┌────────┐   ┌───────────────────────────┐        │
//! │question│──▶│ query engine               │◀───────┘
//! │        │   │ embed → retrieve → prompt  │──▶ language model
//! └────────┘   └───────────────────────────┘
//! ```
//!
//! Ingestion is asynchronous: `submit` records a `pending` document and
//! returns immediately; callers poll status until `completed` or
//! `failed`. Queries are synchronous end-to-end with a timeout budget on
//! the model call.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`chunk`] | Overlapping-window text chunking |
//! | [`parser`] | Document parser service client |
//! | [`embedding`] | Embedding gateway (batching, retry, dimension checks) |
//! | [`llm`] | Language model clients |
//! | [`store`] | Vector store adapter (SQLite) |
//! | [`lifecycle`] | Document processing state machine |
//! | [`query`] | Retrieval-augmented query engine |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema bootstrap |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod lifecycle;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod parser;
pub mod query;
pub mod store;

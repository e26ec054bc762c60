#![deny(missing_docs)]

//! Core library for the MMR summarizer: diversity-aware chunk selection feeding an LLM or
//! extractive summary.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// URL fetching, upload decoding and text normalization.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Chunking, selection and pipeline orchestration.
pub mod processing;
/// Summarization client abstraction and adapters.
pub mod summarization;
/// Optional vector index (Qdrant or in-memory).
pub mod vector_store;

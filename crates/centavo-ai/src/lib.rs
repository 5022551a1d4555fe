//! Centavo AI - generative-model integration
//!
//! This crate provides:
//! - A retrying, cancellable client for the `generateContent` endpoint
//! - Code-fence sanitizing of model responses
//! - Prompt building for tips, meal plans and receipt extraction
//! - Reconciliation of loosely-typed model JSON into domain records
//! - An advisor that falls back to deterministic heuristics on any failure

pub mod advisor;
pub mod client;
pub mod error;
pub mod prompt;
pub mod reconcile;
pub mod sanitize;

pub use advisor::{Advice, Advisor, ReceiptScan, Source, Timeouts};
pub use client::{GeminiClient, GeminiConfig, GenerateContentRequest, Generation};
pub use error::AiError;
pub use sanitize::sanitize_json;

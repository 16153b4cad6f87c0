//! # Thesis Analysis
//!
//! A fault-tolerant, three-stage LLM pipeline that turns a free-text
//! investment thesis into a structured analysis: core claim and causal
//! chain, classified monitoring signals, and an actionable monitoring plan.
//!
//! ## Stages
//!
//! - **Core claim**: claim, mental model, assumptions, causal chain and
//!   counter-thesis scenarios
//! - **Signal extraction**: trackable metrics, classified into six levels
//!   and three monitoring cadences
//! - **Monitoring plan**: validators, assumption tests, causal-chain
//!   trackers, alert rules and decision rules
//!
//! Every stage degrades to a deterministic, keyword-driven fallback when
//! the model fails, times out or returns unusable output. The caller always
//! receives a complete [`AnalysisResult`].
//!
//! ## Architecture
//!
//! ```text
//! thesis → [core claim] → [signals + classifier] → [monitoring plan] → AnalysisResult
//!              ↓                  ↓                        ↓
//!          ModelClient (chat/completions, retries)    FallbackGenerator
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use thesis_analysis::{AnalysisPipeline, Config, ModelClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let client = ModelClient::new(&config.model, config.request.clone())?;
//!     let pipeline = AnalysisPipeline::new(Arc::new(client), &config);
//!     let result = pipeline
//!         .analyze("NVIDIA will benefit from AI chip demand and data center growth")
//!         .await?;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Analysis request and result types.
pub mod analysis;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Deterministic fallback payloads for every stage.
pub mod fallback;
/// Chat completion client and the completion seam.
pub mod llm;
/// Monitoring plans and the plan builder.
pub mod monitoring;
/// JSON recovery from free-form model output.
pub mod parser;
/// Orchestration of the analysis stages.
pub mod pipeline;
/// System prompts for each stage.
pub mod prompts;
/// Signal taxonomy and classification.
pub mod signals;
/// Stage identifiers, outcomes and model-path executors.
pub mod stages;
/// SQLite storage layer for persistence.
pub mod storage;

pub use analysis::{AnalysisRequest, AnalysisResult, PriorContext};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use llm::{CompletionModel, ModelClient};
pub use pipeline::AnalysisPipeline;

//! Chat completion client and the seam the pipeline calls through.
//!
//! [`ModelClient`] speaks the OpenAI-compatible `chat/completions` protocol
//! (plain or Azure-hosted). Stage executors depend only on
//! [`CompletionModel`], so tests can substitute scripted models.

mod client;
mod metrics;
mod types;

pub use client::ModelClient;
pub use metrics::{CallCounters, CallStats, MetricsSink, NoopMetrics};
pub use types::*;

use async_trait::async_trait;

use crate::error::ModelResult;

/// Anything that turns a prompt into completion text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Run one completion, including any internal retries.
    async fn complete(&self, request: CompletionRequest) -> ModelResult<String>;
}

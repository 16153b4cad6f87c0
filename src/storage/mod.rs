//! Persistence for completed analyses.
//!
//! The pipeline itself keeps nothing; callers that want history save
//! results through an [`AnalysisStore`]. Each analysis gets a UUID and one
//! row per stage outcome alongside the JSON result.

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisRequest, AnalysisResult, MentalModel, PriorContext, StageRecord};
use crate::error::StorageResult;

/// A saved analysis with the request that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAnalysis {
    /// UUID v4.
    pub id: String,
    /// Thesis as submitted.
    pub thesis_text: String,
    /// Context the request carried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_context: Option<PriorContext>,
    /// Full analysis.
    pub result: AnalysisResult,
    /// When it was saved.
    pub created_at: DateTime<Utc>,
}

impl StoredAnalysis {
    /// Context for re-analysing the same thesis later.
    pub fn prior_context(&self) -> PriorContext {
        PriorContext::from(&self.result)
    }
}

/// One line of an analysis listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// UUID v4.
    pub id: String,
    /// First characters of the thesis.
    pub thesis_preview: String,
    /// Core claim.
    pub core_claim: String,
    /// Investment framing.
    pub mental_model: MentalModel,
    /// Number of classified signals.
    pub total_signals: usize,
    /// Whether any stage fell back.
    pub fallback_used: bool,
    /// When it was saved.
    pub created_at: DateTime<Utc>,
}

/// Storage trait for analysis persistence.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Save a result and return its new ID.
    async fn save_analysis(
        &self,
        request: &AnalysisRequest,
        result: &AnalysisResult,
    ) -> StorageResult<String>;
    /// Get an analysis by ID.
    async fn get_analysis(&self, id: &str) -> StorageResult<Option<StoredAnalysis>>;
    /// Most recent analyses first.
    async fn list_analyses(&self, limit: u32) -> StorageResult<Vec<AnalysisSummary>>;
    /// Stage outcomes of one analysis, in execution order.
    async fn get_stage_runs(&self, id: &str) -> StorageResult<Vec<StageRecord>>;
    /// Delete an analysis and its stage rows.
    async fn delete_analysis(&self, id: &str) -> StorageResult<()>;
}

/// First `max` characters of a thesis, with an ellipsis when cut.
pub(crate) fn preview(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(max).collect();
        format!("{}...", cut.trim_end())
    }
}

//! Three-stage analysis orchestrator.
//!
//! `Stage1 → Stage2 → Stage3 → merge`. Each stage runs under its own
//! wall-clock budget; any model, parse, validation or budget failure is
//! absorbed by that stage's fallback, so a valid thesis always yields a
//! complete [`AnalysisResult`].

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::analysis::{
    AnalysisMetadata, AnalysisRequest, AnalysisResult, CoreAnalysis, FallbackFlags,
};
use crate::config::{Config, PlanPolicyConfig, StageConfig};
use crate::error::{RequestError, StageError, StageResultOf};
use crate::fallback::FallbackGenerator;
use crate::llm::CompletionModel;
use crate::monitoring::MonitoringPlan;
use crate::signals::ClassifiedSignals;
use crate::stages::{StageExecutor, StageId, StagePayload, StageResult, StageStatus, Upstream};

/// Runs the analysis stages in sequence and merges their payloads.
///
/// Holds no per-run state, so one instance can serve concurrent runs
/// behind an `Arc`.
pub struct AnalysisPipeline {
    executor: StageExecutor,
    fallback: FallbackGenerator,
    stages: StageConfig,
}

impl AnalysisPipeline {
    /// Create a pipeline from application configuration
    pub fn new(model: Arc<dyn CompletionModel>, config: &Config) -> Self {
        Self::with_settings(
            model,
            config.stages.clone(),
            config.plan.clone(),
            Duration::from_millis(config.request.timeout_ms),
        )
    }

    /// Create a pipeline with explicit stage budgets and plan heuristics
    pub fn with_settings(
        model: Arc<dyn CompletionModel>,
        stages: StageConfig,
        policy: PlanPolicyConfig,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            executor: StageExecutor::new(model, stages.clone(), policy.clone(), attempt_timeout),
            fallback: FallbackGenerator::new(policy),
            stages,
        }
    }

    /// Analyze a thesis without prior context.
    pub async fn analyze(&self, thesis: impl Into<String>) -> Result<AnalysisResult, RequestError> {
        self.run(AnalysisRequest::new(thesis)).await
    }

    /// Run every stage and merge the results.
    ///
    /// Only an empty thesis is rejected, before any model call is made.
    pub async fn run(&self, request: AnalysisRequest) -> Result<AnalysisResult, RequestError> {
        request.validate()?;

        let started_at = Utc::now();
        let start = Instant::now();
        let thesis = request.thesis_text.as_str();

        info!(
            thesis_chars = thesis.len(),
            has_prior_context = request.prior_context.is_some(),
            "Starting thesis analysis"
        );

        let core_stage = self
            .run_stage(
                StageId::CoreClaim,
                self.stages.core_claim_timeout_ms,
                self.executor.core_claim(&request),
                StagePayload::CoreClaim,
                thesis,
                Upstream::default(),
            )
            .await;
        let core: CoreAnalysis = match &core_stage.payload {
            StagePayload::CoreClaim(core) => core.clone(),
            _ => self.fallback.core_claim(thesis),
        };

        let signal_stage = self
            .run_stage(
                StageId::SignalExtraction,
                self.stages.signals_timeout_ms,
                self.executor.signals(&request, &core),
                StagePayload::Signals,
                thesis,
                Upstream {
                    core: Some(&core),
                    signals: None,
                },
            )
            .await;
        let classified: ClassifiedSignals = match &signal_stage.payload {
            StagePayload::Signals(classified) => classified.clone(),
            _ => self.fallback.signals(thesis, Some(&core)),
        };

        let plan_stage = self
            .run_stage(
                StageId::MonitoringPlan,
                self.stages.monitoring_timeout_ms,
                self.executor.monitoring_plan(&request, &core, &classified),
                StagePayload::MonitoringPlan,
                thesis,
                Upstream {
                    core: Some(&core),
                    signals: Some(&classified),
                },
            )
            .await;
        let plan: MonitoringPlan = match &plan_stage.payload {
            StagePayload::MonitoringPlan(plan) => plan.clone(),
            _ => self.fallback.monitoring_plan(&core, &classified),
        };

        let stage_results = [&core_stage, &signal_stage, &plan_stage];
        let mut fallback_mode = FallbackFlags::default();
        for stage in stage_results {
            fallback_mode.set(stage.stage_id, stage.status.used_fallback());
        }

        let signals = classified.ordered();
        let total_latency_ms = start.elapsed().as_millis() as u64;

        let result = AnalysisResult {
            core_claim: core.core_claim,
            core_analysis: core.core_analysis,
            mental_model: core.mental_model,
            assumptions: core.assumptions,
            causal_chain: core.causal_chain,
            counter_thesis_scenarios: core.counter_thesis_scenarios,
            signal_summary: classified.summary(),
            metadata: AnalysisMetadata {
                started_at,
                completed_at: Utc::now(),
                total_latency_ms,
                total_signals: signals.len(),
                fallback_mode,
                stages: stage_results.iter().map(|s| s.record()).collect(),
            },
            signals,
            monitoring_plan: plan,
        };

        if let Err(e) = result.validate() {
            error!(error = %e, "Merged analysis failed validation");
        }

        info!(
            latency_ms = total_latency_ms,
            signals = result.metadata.total_signals,
            fallback = fallback_mode.any(),
            "Thesis analysis completed"
        );

        Ok(result)
    }

    /// Run one stage's model path under its budget, falling back on any failure.
    async fn run_stage<T, F>(
        &self,
        stage: StageId,
        budget_ms: u64,
        model_path: F,
        wrap: fn(T) -> StagePayload,
        thesis: &str,
        upstream: Upstream<'_>,
    ) -> StageResult
    where
        F: Future<Output = StageResultOf<T>>,
    {
        let start = Instant::now();

        // Dropping the future on expiry cancels the in-flight request
        let outcome = match tokio::time::timeout(Duration::from_millis(budget_ms), model_path).await
        {
            Ok(result) => result,
            Err(_) => Err(StageError::Timeout {
                stage: stage.to_string(),
                budget_ms,
            }),
        };

        let (status, payload, stage_error) = match outcome {
            Ok(value) => (StageStatus::SucceededViaModel, wrap(value), None),
            Err(e) => {
                warn!(stage = %stage, error = %e, "Stage failed, using fallback");
                let payload = self.fallback.generate(stage, thesis, &upstream);
                let status = match payload.validate() {
                    Ok(()) => StageStatus::SucceededViaFallback,
                    Err(defect) => {
                        error!(stage = %stage, error = %defect, "Fallback payload failed validation");
                        StageStatus::Failed
                    }
                };
                (status, payload, Some(e.to_string()))
            }
        };

        let latency_ms = start.elapsed().as_millis() as u64;
        info!(stage = %stage, status = %status, latency_ms, "Stage completed");

        StageResult {
            stage_id: stage,
            status,
            payload,
            latency_ms,
            error: stage_error,
        }
    }
}

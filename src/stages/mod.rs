//! The three analysis stages and their outcomes.
//!
//! Executors in [`executor`] only know how to ask the model; deciding what
//! happens on failure is the pipeline's job.

mod executor;

pub use executor::StageExecutor;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::analysis::CoreAnalysis;
use crate::monitoring::MonitoringPlan;
use crate::signals::ClassifiedSignals;

/// Identifies a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Stage 1: core claim and causal chain.
    CoreClaim,
    /// Stage 2: signal extraction and classification.
    SignalExtraction,
    /// Stage 3: monitoring plan.
    MonitoringPlan,
}

impl StageId {
    /// Stages in execution order.
    pub const ALL: [StageId; 3] = [
        StageId::CoreClaim,
        StageId::SignalExtraction,
        StageId::MonitoringPlan,
    ];

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::CoreClaim => "core_claim",
            StageId::SignalExtraction => "signal_extraction",
            StageId::MonitoringPlan => "monitoring_plan",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "core_claim" => Ok(StageId::CoreClaim),
            "signal_extraction" => Ok(StageId::SignalExtraction),
            "monitoring_plan" => Ok(StageId::MonitoringPlan),
            _ => Err(format!("Unknown stage: {}", s)),
        }
    }
}

/// How a stage obtained its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// The model produced a valid payload.
    SucceededViaModel,
    /// The fallback generator produced the payload.
    SucceededViaFallback,
    /// The fallback payload itself failed validation. It is still used.
    Failed,
}

impl StageStatus {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::SucceededViaModel => "succeeded_via_model",
            StageStatus::SucceededViaFallback => "succeeded_via_fallback",
            StageStatus::Failed => "failed",
        }
    }

    /// Whether the fallback generator supplied the payload.
    pub fn used_fallback(&self) -> bool {
        !matches!(self, StageStatus::SucceededViaModel)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded_via_model" => Ok(StageStatus::SucceededViaModel),
            "succeeded_via_fallback" => Ok(StageStatus::SucceededViaFallback),
            "failed" => Ok(StageStatus::Failed),
            _ => Err(format!("Unknown stage status: {}", s)),
        }
    }
}

/// Output of one stage, whichever path produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum StagePayload {
    /// Stage 1 payload.
    CoreClaim(CoreAnalysis),
    /// Stage 2 payload.
    Signals(ClassifiedSignals),
    /// Stage 3 payload.
    MonitoringPlan(MonitoringPlan),
}

impl StagePayload {
    /// The stage this payload belongs to.
    pub fn stage_id(&self) -> StageId {
        match self {
            StagePayload::CoreClaim(_) => StageId::CoreClaim,
            StagePayload::Signals(_) => StageId::SignalExtraction,
            StagePayload::MonitoringPlan(_) => StageId::MonitoringPlan,
        }
    }

    /// Run the payload's own validation.
    pub fn validate(&self) -> Result<(), crate::error::SchemaError> {
        match self {
            StagePayload::CoreClaim(core) => core.validate(),
            StagePayload::Signals(classified) if classified.is_empty() => {
                Err(crate::error::SchemaError::new(
                    "signals",
                    "signals",
                    "at least one signal is required",
                ))
            }
            StagePayload::Signals(_) => Ok(()),
            StagePayload::MonitoringPlan(plan) => plan.validate(),
        }
    }
}

/// Outcome of running one stage. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    /// Which stage.
    pub stage_id: StageId,
    /// How the payload was obtained.
    pub status: StageStatus,
    /// The payload, never missing.
    pub payload: StagePayload,
    /// Wall-clock time spent in the stage.
    pub latency_ms: u64,
    /// The absorbed failure, when the model path did not succeed.
    pub error: Option<String>,
}

impl StageResult {
    /// Record for the analysis metadata.
    pub fn record(&self) -> crate::analysis::StageRecord {
        crate::analysis::StageRecord {
            stage: self.stage_id,
            status: self.status,
            latency_ms: self.latency_ms,
            error: self.error.clone(),
        }
    }
}

/// Payloads of earlier stages available to a later one.
#[derive(Debug, Clone, Copy, Default)]
pub struct Upstream<'a> {
    /// Core claim stage output.
    pub core: Option<&'a CoreAnalysis>,
    /// Signal stage output.
    pub signals: Option<&'a ClassifiedSignals>,
}

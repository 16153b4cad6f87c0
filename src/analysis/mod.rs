//! Analysis request and result types.
//!
//! [`AnalysisResult`] is the single artifact a pipeline run produces. Its
//! shape does not depend on whether any stage fell back; degraded runs are
//! visible only through [`AnalysisMetadata::fallback_mode`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{RequestError, SchemaError};
use crate::monitoring::MonitoringPlan;
use crate::signals::{Signal, SignalSummary};
use crate::stages::{StageId, StageStatus};

// ============================================================================
// Request
// ============================================================================

/// Input to one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Free-text thesis to analyze.
    pub thesis_text: String,
    /// Digest of an earlier analysis of the same thesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_context: Option<PriorContext>,
}

impl AnalysisRequest {
    /// Create a request for a thesis
    pub fn new(thesis_text: impl Into<String>) -> Self {
        Self {
            thesis_text: thesis_text.into(),
            prior_context: None,
        }
    }

    /// Attach context from an earlier analysis
    pub fn with_prior_context(mut self, context: PriorContext) -> Self {
        self.prior_context = Some(context);
        self
    }

    /// Check preconditions. Only an empty thesis is rejected.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.thesis_text.trim().is_empty() {
            return Err(RequestError::EmptyThesis);
        }
        Ok(())
    }
}

/// Digest of an earlier analysis or ingested documents, used to steer re-analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorContext {
    /// Claim from the earlier analysis.
    #[serde(default)]
    pub core_claim: Option<String>,
    /// Assumptions from the earlier analysis.
    #[serde(default)]
    pub assumptions: Vec<String>,
    /// Signals tracked so far.
    #[serde(default)]
    pub signal_names: Vec<String>,
    /// Free text supplied by a document-ingestion step.
    #[serde(default)]
    pub notes: Option<String>,
}

impl PriorContext {
    /// Whether the context carries nothing usable.
    pub fn is_empty(&self) -> bool {
        self.core_claim.as_deref().map_or(true, |c| c.trim().is_empty())
            && self.assumptions.is_empty()
            && self.signal_names.is_empty()
            && self.notes.as_deref().map_or(true, |n| n.trim().is_empty())
    }

    /// Set document notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Render as prompt context. Empty when there is nothing to say.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if let Some(claim) = self.core_claim.as_deref().filter(|c| !c.trim().is_empty()) {
            lines.push(format!("Previous core claim: {}", claim));
        }
        if !self.assumptions.is_empty() {
            lines.push(format!(
                "Previous assumptions: {}",
                self.assumptions.join("; ")
            ));
        }
        if !self.signal_names.is_empty() {
            lines.push(format!(
                "Previously tracked signals: {}",
                self.signal_names.join(", ")
            ));
        }
        if let Some(notes) = self.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            let excerpt: String = notes.chars().take(2000).collect();
            lines.push(format!("Supporting document excerpt:\n{}", excerpt));
        }
        lines.join("\n")
    }
}

impl From<&AnalysisResult> for PriorContext {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            core_claim: Some(result.core_claim.clone()),
            assumptions: result.assumptions.clone(),
            signal_names: result.signals.iter().map(|s| s.name.clone()).collect(),
            notes: None,
        }
    }
}

// ============================================================================
// Core analysis (stage 1 payload)
// ============================================================================

/// Investment framing of a thesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MentalModel {
    /// Bets on expanding revenue or market share.
    Growth,
    /// Bets on a price below intrinsic worth.
    Value,
    /// Bets on a turn in the economic or industry cycle.
    Cyclical,
    /// Bets on displacing incumbents.
    Disruption,
    /// Bets on durable competitive advantage.
    Quality,
}

impl MentalModel {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MentalModel::Growth => "Growth",
            MentalModel::Value => "Value",
            MentalModel::Cyclical => "Cyclical",
            MentalModel::Disruption => "Disruption",
            MentalModel::Quality => "Quality",
        }
    }
}

impl fmt::Display for MentalModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MentalModel {
    type Err = String;

    /// Case-insensitive; tolerates decorations such as `"Growth investing"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let candidates = [
            ("disrupt", MentalModel::Disruption),
            ("cyclical", MentalModel::Cyclical),
            ("quality", MentalModel::Quality),
            ("value", MentalModel::Value),
            ("growth", MentalModel::Growth),
        ];
        candidates
            .iter()
            .find(|(needle, _)| lower.contains(needle))
            .map(|(_, model)| *model)
            .ok_or_else(|| format!("Unknown mental model: {}", s))
    }
}

/// One step of the thesis's causal chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalLink {
    /// 1-based position in the chain.
    pub chain_link: u32,
    /// What happens at this step.
    pub event: String,
    /// Why it follows from the previous step.
    pub explanation: String,
}

impl CausalLink {
    /// Create a causal link
    pub fn new(chain_link: u32, event: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            chain_link,
            event: event.into(),
            explanation: explanation.into(),
        }
    }
}

/// A risk that would invalidate the core claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterThesisScenario {
    /// Short name of the risk.
    pub scenario: String,
    /// How the risk would play out.
    pub description: String,
    /// Observable conditions that would set it off.
    pub trigger_conditions: Vec<String>,
    /// Metrics that would show it early.
    pub data_signals: Vec<String>,
}

/// Core claim, reasoning, assumptions and risks extracted in the first stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreAnalysis {
    /// One-sentence statement of the thesis.
    pub core_claim: String,
    /// Reasoning behind the claim.
    pub core_analysis: String,
    /// Investment framing.
    pub mental_model: MentalModel,
    /// Conditions the claim depends on.
    pub assumptions: Vec<String>,
    /// Ordered steps from cause to outcome.
    pub causal_chain: Vec<CausalLink>,
    /// Risks that would break the thesis.
    pub counter_thesis_scenarios: Vec<CounterThesisScenario>,
}

impl CoreAnalysis {
    /// Check the fields later stages depend on.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.core_claim.trim().is_empty() {
            return Err(SchemaError::new("core_analysis", "core_claim", "must not be empty"));
        }
        if self.assumptions.is_empty() {
            return Err(SchemaError::new(
                "core_analysis",
                "assumptions",
                "at least one assumption is required",
            ));
        }
        if self.causal_chain.is_empty() {
            return Err(SchemaError::new(
                "core_analysis",
                "causal_chain",
                "at least one causal link is required",
            ));
        }
        if self.causal_chain.iter().any(|l| l.event.trim().is_empty()) {
            return Err(SchemaError::new(
                "core_analysis",
                "causal_chain",
                "causal link events must not be empty",
            ));
        }
        Ok(())
    }
}

/// Model output for the first stage, before normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCoreAnalysis {
    /// Claim as returned by the model.
    #[serde(alias = "claim")]
    pub core_claim: Option<String>,
    /// Reasoning as returned by the model.
    #[serde(alias = "analysis")]
    pub core_analysis: Option<String>,
    /// Free-text framing, parsed leniently.
    pub mental_model: Option<String>,
    /// Strings or objects with a text field.
    #[serde(alias = "key_assumptions")]
    pub assumptions: Vec<Value>,
    /// Objects or bare strings.
    pub causal_chain: Vec<Value>,
    /// Objects or bare strings.
    #[serde(alias = "counter_scenarios", alias = "risks")]
    pub counter_thesis_scenarios: Vec<Value>,
}

impl RawCoreAnalysis {
    /// Normalize into a [`CoreAnalysis`].
    ///
    /// Blank entries are dropped, causal links are renumbered from 1 and
    /// plain strings are accepted wherever objects are expected. An
    /// unrecognized mental model is replaced by `default_model`.
    pub fn normalize(self, default_model: MentalModel) -> CoreAnalysis {
        let assumptions = self
            .assumptions
            .into_iter()
            .filter_map(|v| text_of(&v, &["assumption", "text", "description"]))
            .collect();

        let causal_chain = self
            .causal_chain
            .into_iter()
            .filter_map(|v| {
                let event = text_of(&v, &["event", "step", "description"])?;
                let explanation = match &v {
                    Value::Object(map) => map
                        .get("explanation")
                        .and_then(Value::as_str)
                        .map(|s| s.trim().to_string())
                        .unwrap_or_default(),
                    _ => String::new(),
                };
                Some((event, explanation))
            })
            .enumerate()
            .map(|(i, (event, explanation))| CausalLink::new(i as u32 + 1, event, explanation))
            .collect();

        let counter_thesis_scenarios = self
            .counter_thesis_scenarios
            .into_iter()
            .filter_map(|v| {
                let scenario = text_of(&v, &["scenario", "title", "name"])?;
                let (description, trigger_conditions, data_signals) = match &v {
                    Value::Object(map) => (
                        map.get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .trim()
                            .to_string(),
                        string_list(map.get("trigger_conditions")),
                        string_list(map.get("data_signals")),
                    ),
                    _ => (String::new(), Vec::new(), Vec::new()),
                };
                Some(CounterThesisScenario {
                    scenario,
                    description,
                    trigger_conditions,
                    data_signals,
                })
            })
            .collect();

        CoreAnalysis {
            core_claim: self.core_claim.unwrap_or_default().trim().to_string(),
            core_analysis: self.core_analysis.unwrap_or_default().trim().to_string(),
            mental_model: self
                .mental_model
                .as_deref()
                .and_then(|m| m.parse().ok())
                .unwrap_or(default_model),
            assumptions,
            causal_chain,
            counter_thesis_scenarios,
        }
    }
}

/// A trimmed, non-empty string from a bare string or from the first matching key.
fn text_of(value: &Value, keys: &[&str]) -> Option<String> {
    let text = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => keys
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str)),
        _ => None,
    }?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

// ============================================================================
// Result
// ============================================================================

/// Per-stage record of whether the fallback generator supplied the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackFlags {
    /// Core claim stage used its fallback.
    pub core_claim: bool,
    /// Signal extraction stage used its fallback.
    pub signal_extraction: bool,
    /// Monitoring plan stage used its fallback.
    pub monitoring_plan: bool,
}

impl FallbackFlags {
    /// Set the flag for one stage
    pub fn set(&mut self, stage: StageId, used: bool) {
        match stage {
            StageId::CoreClaim => self.core_claim = used,
            StageId::SignalExtraction => self.signal_extraction = used,
            StageId::MonitoringPlan => self.monitoring_plan = used,
        }
    }

    /// Whether any stage fell back.
    pub fn any(&self) -> bool {
        self.core_claim || self.signal_extraction || self.monitoring_plan
    }

    /// Whether every stage fell back.
    pub fn all(&self) -> bool {
        self.core_claim && self.signal_extraction && self.monitoring_plan
    }
}

/// Outcome of one stage, as recorded on the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Which stage.
    pub stage: StageId,
    /// How the payload was obtained.
    pub status: StageStatus,
    /// Wall-clock time spent in the stage.
    pub latency_ms: u64,
    /// The failure that triggered fallback, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Timing and degradation trace of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub completed_at: DateTime<Utc>,
    /// Wall-clock time of the whole run.
    pub total_latency_ms: u64,
    /// Number of classified signals.
    pub total_signals: usize,
    /// Which stages fell back.
    pub fallback_mode: FallbackFlags,
    /// Per-stage outcomes in execution order.
    pub stages: Vec<StageRecord>,
}

/// The complete analysis of one thesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// One-sentence statement of the thesis.
    pub core_claim: String,
    /// Reasoning behind the claim.
    pub core_analysis: String,
    /// Investment framing.
    pub mental_model: MentalModel,
    /// Conditions the claim depends on.
    pub assumptions: Vec<String>,
    /// Ordered steps from cause to outcome.
    pub causal_chain: Vec<CausalLink>,
    /// Risks that would break the thesis.
    pub counter_thesis_scenarios: Vec<CounterThesisScenario>,
    /// Ordered by level, then extraction order.
    pub signals: Vec<Signal>,
    /// Counts, cadence, value chain and quality of the signals.
    pub signal_summary: SignalSummary,
    /// How to track the thesis.
    pub monitoring_plan: MonitoringPlan,
    /// Timing and fallback trace.
    pub metadata: AnalysisMetadata,
}

impl AnalysisResult {
    /// Check the structural guarantees every result carries.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.core_claim.trim().is_empty() {
            return Err(SchemaError::new("analysis_result", "core_claim", "must not be empty"));
        }
        if self.assumptions.is_empty() {
            return Err(SchemaError::new(
                "analysis_result",
                "assumptions",
                "at least one assumption is required",
            ));
        }
        if self.causal_chain.is_empty() {
            return Err(SchemaError::new(
                "analysis_result",
                "causal_chain",
                "at least one causal link is required",
            ));
        }
        if self.signals.is_empty() {
            return Err(SchemaError::new(
                "analysis_result",
                "signals",
                "at least one signal is required",
            ));
        }
        if self.metadata.total_signals != self.signals.len() {
            return Err(SchemaError::new(
                "analysis_result",
                "metadata.total_signals",
                format!(
                    "recorded {} but result carries {}",
                    self.metadata.total_signals,
                    self.signals.len()
                ),
            ));
        }
        self.monitoring_plan.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_validation() {
        assert_eq!(
            AnalysisRequest::new("").validate(),
            Err(RequestError::EmptyThesis)
        );
        assert_eq!(
            AnalysisRequest::new("  \n\t ").validate(),
            Err(RequestError::EmptyThesis)
        );
        assert!(AnalysisRequest::new("Buy the dip").validate().is_ok());
    }

    #[test]
    fn test_mental_model_from_str() {
        assert_eq!("growth".parse::<MentalModel>(), Ok(MentalModel::Growth));
        assert_eq!(
            "Disruption / innovation".parse::<MentalModel>(),
            Ok(MentalModel::Disruption)
        );
        assert_eq!(
            "Quality compounder".parse::<MentalModel>(),
            Ok(MentalModel::Quality)
        );
        assert!("momentum".parse::<MentalModel>().is_err());
    }

    #[test]
    fn test_prior_context_render() {
        let context = PriorContext {
            core_claim: Some("Old claim".to_string()),
            assumptions: vec!["A1".to_string(), "A2".to_string()],
            signal_names: vec![],
            notes: None,
        };
        let rendered = context.render();
        assert!(rendered.contains("Previous core claim: Old claim"));
        assert!(rendered.contains("A1; A2"));
        assert!(!rendered.contains("signals"));
        assert!(PriorContext::default().is_empty());
        assert!(!context.is_empty());
    }

    #[test]
    fn test_raw_core_analysis_normalization() {
        let raw: RawCoreAnalysis = serde_json::from_value(json!({
            "core_claim": "  NVIDIA wins AI  ",
            "mental_model": "something odd",
            "assumptions": ["Demand holds", "", {"assumption": "Supply scales"}],
            "causal_chain": [
                "Hyperscalers raise capex",
                {"chain_link": 7, "event": "GPU orders rise", "explanation": "Capex flows to chips"},
                {"event": "   "}
            ],
            "counter_thesis_scenarios": [
                {"scenario": "AI Winter", "trigger_conditions": "Capex cuts"},
                42
            ]
        }))
        .unwrap();

        let core = raw.normalize(MentalModel::Disruption);
        assert_eq!(core.core_claim, "NVIDIA wins AI");
        assert_eq!(core.mental_model, MentalModel::Disruption);
        assert_eq!(core.assumptions, vec!["Demand holds", "Supply scales"]);
        assert_eq!(core.causal_chain.len(), 2);
        assert_eq!(core.causal_chain[0].chain_link, 1);
        assert_eq!(core.causal_chain[1].chain_link, 2);
        assert_eq!(core.causal_chain[1].explanation, "Capex flows to chips");
        assert_eq!(core.counter_thesis_scenarios.len(), 1);
        assert_eq!(
            core.counter_thesis_scenarios[0].trigger_conditions,
            vec!["Capex cuts"]
        );
        assert!(core.validate().is_ok());
    }

    #[test]
    fn test_core_analysis_validation_failures() {
        let empty = RawCoreAnalysis::default().normalize(MentalModel::Growth);
        let err = empty.validate().unwrap_err();
        assert_eq!(err.field, "core_claim");

        let raw: RawCoreAnalysis = serde_json::from_value(json!({
            "core_claim": "Claim",
            "assumptions": ["A"]
        }))
        .unwrap();
        let err = raw.normalize(MentalModel::Growth).validate().unwrap_err();
        assert_eq!(err.field, "causal_chain");
    }

    #[test]
    fn test_fallback_flags() {
        let mut flags = FallbackFlags::default();
        assert!(!flags.any());
        flags.set(StageId::SignalExtraction, true);
        assert!(flags.any());
        assert!(!flags.all());
        flags.set(StageId::CoreClaim, true);
        flags.set(StageId::MonitoringPlan, true);
        assert!(flags.all());
    }
}

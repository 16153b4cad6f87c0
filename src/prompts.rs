//! Centralized prompt definitions for the analysis stages
//!
//! Each stage sends one system prompt describing the exact JSON it expects,
//! followed by a user message built from the thesis and upstream output.

use crate::stages::StageId;

/// System prompt for the core-claim stage.
pub const CORE_CLAIM_PROMPT: &str = r#"You are an expert investment analyst. Break an investment thesis into its core logic.

Your response MUST be valid JSON in this exact format:
{
  "core_claim": "One sentence investment claim",
  "core_analysis": "Risk/reward dynamics and key uncertainties",
  "mental_model": "Growth|Value|Cyclical|Disruption|Quality",
  "assumptions": ["Key assumption 1", "Key assumption 2"],
  "causal_chain": [
    {"chain_link": 1, "event": "Market condition or business development", "explanation": "How it affects the thesis"},
    {"chain_link": 2, "event": "Next consequence", "explanation": "How it follows from the previous link"}
  ],
  "counter_thesis_scenarios": [
    {"scenario": "Risk title", "description": "Brief explanation", "trigger_conditions": ["Condition"], "data_signals": ["Signal"]}
  ]
}

Guidelines:
- 3-5 assumptions, each independently testable
- 3-4 causal chain links, each following from the previous one
- 2-3 counter-thesis scenarios that would invalidate the core claim

Always respond with valid JSON only, no other text."#;

/// System prompt for the signal-extraction stage.
pub const SIGNAL_EXTRACTION_PROMPT: &str = r#"You are an expert at identifying trackable investment signals. Prefer signals close to raw economic activity.

Your response MUST be a valid JSON array in this exact format:
[
  {
    "name": "Specific signal name",
    "level": "Level_0_Raw_Economic_Activity|Level_1_Primary_Signals|Level_2_Derived_Metrics|Level_3_Technical_Indicators|Level_4_Market_Sentiment|Level_5_Meta_Analysis",
    "description": "What the signal measures and why it matters",
    "frequency": "daily|weekly|monthly|quarterly|real-time",
    "threshold": 5.0,
    "threshold_type": "above|below|change_percent",
    "data_source": "Where the data comes from",
    "value_chain_position": "upstream|midstream|downstream",
    "predictive_power": "high|medium|low"
  }
]

Guidelines:
- 5-6 signals
- Upstream: production, manufacturing, supply chain
- Midstream: distribution, pricing, infrastructure
- Downstream: consumer adoption, end-user metrics
- threshold must be a number

Always respond with valid JSON only, no other text."#;

/// System prompt for the monitoring-plan stage.
pub const MONITORING_PLAN_PROMPT: &str = r#"You are an expert at turning investment theses into prescriptive monitoring plans with explicit thresholds and actions.

Your response MUST be valid JSON in this exact format:
{
  "objective": "Monitoring objective with clear success/failure criteria",
  "core_claim_validators": [
    {"metric": "Metric name", "target_threshold": "> 15%", "frequency": "monthly", "data_source": "Source"}
  ],
  "assumption_tests": [
    {"assumption": "Assumption text", "test_metric": "Metric name", "success_threshold": 10.0, "failure_threshold": 5.0}
  ],
  "causal_chain_trackers": [
    {"chain_step": 1, "event": "Causal chain event", "leading_indicator": "Metric name", "threshold": 5.0}
  ],
  "alert_rules": [
    {"trigger_name": "Alert name", "condition": "Threshold condition with numbers", "severity": "high|medium|low", "action": "What to do when triggered"}
  ],
  "decision_rules": [
    {"condition": "Exit/entry condition with thresholds", "action": "buy|sell|hold with reasoning"}
  ],
  "review_schedule": "Review timing and escalation procedure"
}

Guidelines:
- One assumption test per assumption, one tracker per causal chain step
- 4-6 alert rules using the listed signals
- 2-4 decision rules
- All thresholds must be numbers

Always respond with valid JSON only, no other text."#;

/// Get the system prompt for a stage
pub fn prompt_for_stage(stage: StageId) -> &'static str {
    match stage {
        StageId::CoreClaim => CORE_CLAIM_PROMPT,
        StageId::SignalExtraction => SIGNAL_EXTRACTION_PROMPT,
        StageId::MonitoringPlan => MONITORING_PLAN_PROMPT,
    }
}

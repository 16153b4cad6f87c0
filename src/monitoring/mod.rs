//! Monitoring plans and the deterministic plan builder.
//!
//! The builder is used both as the monitoring stage's fallback and to
//! complete partial model output. Its heuristics (failure ratio, severity
//! ordering) are explicit constants from [`PlanPolicyConfig`], not tuned values.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use crate::analysis::CausalLink;
use crate::config::PlanPolicyConfig;
use crate::error::SchemaError;
use crate::signals::{format_number, Cadence, ClassifiedSignals, Frequency, Signal, ThresholdType};

// ============================================================================
// Plan Types
// ============================================================================

/// Alert urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Severity {
    /// Act now.
    High,
    /// Review soon.
    Medium,
    /// Note it.
    Low,
}

impl Severity {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();
        if lower.contains("high") || lower.contains("critical") || lower.contains("urgent") {
            Severity::High
        } else if lower.contains("low") || lower.contains("info") {
            Severity::Low
        } else {
            Severity::Medium
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric that confirms or refutes the core claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimValidator {
    /// Metric to watch.
    pub metric: String,
    /// Value that confirms the claim, free text.
    #[serde(deserialize_with = "lenient_text")]
    pub target_threshold: String,
    /// How often to check.
    #[serde(deserialize_with = "lenient_frequency")]
    pub frequency: Frequency,
    /// Where the metric comes from.
    #[serde(default)]
    pub data_source: String,
}

/// Numeric test of one stated assumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumptionTest {
    /// Assumption being tested.
    pub assumption: String,
    /// Metric that tests it.
    pub test_metric: String,
    /// Level at which the assumption holds.
    #[serde(deserialize_with = "lenient_number")]
    pub success_threshold: f64,
    /// Level at which it is broken.
    #[serde(deserialize_with = "lenient_number")]
    pub failure_threshold: f64,
}

/// Leading indicator attached to one causal chain step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainTracker {
    /// Causal link this tracks.
    pub chain_step: u32,
    /// Event at that link.
    #[serde(default)]
    pub event: String,
    /// Metric that moves before the event.
    pub leading_indicator: String,
    /// Level that signals the event.
    #[serde(deserialize_with = "lenient_number")]
    pub threshold: f64,
}

/// Condition that should trigger attention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Short alert name.
    pub trigger_name: String,
    /// When it fires.
    pub condition: String,
    /// How urgent it is.
    pub severity: Severity,
    /// What to do.
    pub action: String,
}

/// Position-level action tied to a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRule {
    /// When the rule applies.
    pub condition: String,
    /// Position change to make.
    pub action: String,
}

/// Actionable plan for tracking a thesis over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringPlan {
    /// What the plan verifies.
    #[serde(default)]
    pub objective: String,
    /// Metrics for the core claim.
    #[serde(default)]
    pub core_claim_validators: Vec<ClaimValidator>,
    /// One test per assumption.
    #[serde(default)]
    pub assumption_tests: Vec<AssumptionTest>,
    /// One tracker per causal link.
    #[serde(default)]
    pub causal_chain_trackers: Vec<ChainTracker>,
    /// Alerts derived from the signals.
    #[serde(default)]
    pub alert_rules: Vec<AlertRule>,
    /// Position-level actions.
    #[serde(default)]
    pub decision_rules: Vec<DecisionRule>,
    /// How often to review the plan.
    #[serde(default, deserialize_with = "lenient_text")]
    pub review_schedule: String,
}

impl MonitoringPlan {
    /// Check that the plan is complete enough to act on.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.objective.trim().is_empty() {
            return Err(SchemaError::new("monitoring_plan", "objective", "must not be empty"));
        }
        if self.alert_rules.is_empty() {
            return Err(SchemaError::new(
                "monitoring_plan",
                "alert_rules",
                "at least one alert rule is required",
            ));
        }
        if self
            .alert_rules
            .iter()
            .any(|r| r.trigger_name.trim().is_empty() || r.condition.trim().is_empty())
        {
            return Err(SchemaError::new(
                "monitoring_plan",
                "alert_rules",
                "alert rules need a trigger name and a condition",
            ));
        }
        if self.review_schedule.trim().is_empty() {
            return Err(SchemaError::new(
                "monitoring_plan",
                "review_schedule",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect::<String>()
            .parse()
            .ok(),
        _ => None,
    };
    parsed
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {}", value)))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_frequency<'de, D>(deserializer: D) -> Result<Frequency, D::Error>
where
    D: Deserializer<'de>,
{
    let text = lenient_text(deserializer)?;
    Ok(Frequency::detect(&text).unwrap_or(Frequency::Monthly))
}

// ============================================================================
// Builder
// ============================================================================

const QUALITATIVE_METRIC: &str = "Qualitative thesis review";
const QUALITATIVE_THRESHOLD: f64 = 10.0;

/// Derives a [`MonitoringPlan`] from assumptions, the causal chain and classified signals.
#[derive(Debug, Clone)]
pub struct MonitoringPlanBuilder {
    policy: PlanPolicyConfig,
}

impl Default for MonitoringPlanBuilder {
    fn default() -> Self {
        Self::new(PlanPolicyConfig::default())
    }
}

impl MonitoringPlanBuilder {
    /// Create a builder with the given heuristics
    pub fn new(policy: PlanPolicyConfig) -> Self {
        Self { policy }
    }

    /// Build a complete plan. Never empty, even without signals.
    pub fn build(
        &self,
        core_claim: &str,
        assumptions: &[String],
        causal_chain: &[CausalLink],
        classified: &ClassifiedSignals,
    ) -> MonitoringPlan {
        let signals = &classified.signals;

        MonitoringPlan {
            objective: objective_for(core_claim),
            core_claim_validators: self.validators(classified),
            assumption_tests: self.assumption_tests(assumptions, signals),
            causal_chain_trackers: chain_trackers(causal_chain, signals),
            alert_rules: self.alert_rules(signals),
            decision_rules: decision_rules(assumptions.len(), signals),
            review_schedule: review_schedule(classified.cadence.fastest()),
        }
    }

    /// Fill the gaps of a model-produced plan with builder output.
    ///
    /// Sections the model left empty are replaced wholesale; sections it
    /// populated are kept as-is.
    pub fn complete(
        &self,
        mut plan: MonitoringPlan,
        core_claim: &str,
        assumptions: &[String],
        causal_chain: &[CausalLink],
        classified: &ClassifiedSignals,
    ) -> MonitoringPlan {
        let built = self.build(core_claim, assumptions, causal_chain, classified);

        if plan.objective.trim().is_empty() {
            plan.objective = built.objective;
        }
        if plan.core_claim_validators.is_empty() {
            plan.core_claim_validators = built.core_claim_validators;
        }
        if plan.assumption_tests.is_empty() {
            plan.assumption_tests = built.assumption_tests;
        }
        if plan.causal_chain_trackers.is_empty() {
            plan.causal_chain_trackers = built.causal_chain_trackers;
        }
        if plan.decision_rules.is_empty() {
            plan.decision_rules = built.decision_rules;
        }
        if plan.review_schedule.trim().is_empty() {
            plan.review_schedule = built.review_schedule;
        }
        plan
    }

    fn validators(&self, classified: &ClassifiedSignals) -> Vec<ClaimValidator> {
        let validators: Vec<ClaimValidator> = classified
            .by_priority()
            .into_iter()
            .take(self.policy.max_validators.max(1))
            .map(|s| ClaimValidator {
                metric: s.name.clone(),
                target_threshold: s.target(),
                frequency: s.frequency,
                data_source: s.data_source.clone(),
            })
            .collect();

        if validators.is_empty() {
            return vec![ClaimValidator {
                metric: QUALITATIVE_METRIC.to_string(),
                target_threshold: "Thesis narrative intact".to_string(),
                frequency: Frequency::Quarterly,
                data_source: "Company filings and earnings calls".to_string(),
            }];
        }
        validators
    }

    /// Assumption `i` is tested against signal `i % n`.
    fn assumption_tests(&self, assumptions: &[String], signals: &[Signal]) -> Vec<AssumptionTest> {
        assumptions
            .iter()
            .enumerate()
            .map(|(i, assumption)| {
                let (metric, success) = match pick(signals, i) {
                    Some(signal) => (signal.name.clone(), signal.threshold),
                    None => (QUALITATIVE_METRIC.to_string(), QUALITATIVE_THRESHOLD),
                };
                AssumptionTest {
                    assumption: assumption.clone(),
                    test_metric: metric,
                    success_threshold: success,
                    failure_threshold: success * self.policy.failure_ratio,
                }
            })
            .collect()
    }

    /// One rule per signal; the first `high_severity_count` are high severity.
    fn alert_rules(&self, signals: &[Signal]) -> Vec<AlertRule> {
        if signals.is_empty() {
            return vec![AlertRule {
                trigger_name: "Quarterly Thesis Review".to_string(),
                condition: "Quarterly earnings released or 90 days since last review".to_string(),
                severity: Severity::Medium,
                action: "Review quarterly: re-validate core claim and assumptions".to_string(),
            }];
        }

        signals
            .iter()
            .enumerate()
            .map(|(i, signal)| {
                let severity = if i < self.policy.high_severity_count {
                    Severity::High
                } else {
                    Severity::Medium
                };
                AlertRule {
                    trigger_name: format!("{} Alert", signal.name),
                    condition: breach_condition(signal),
                    severity,
                    action: match severity {
                        Severity::High => {
                            "Immediate thesis review and position sizing check".to_string()
                        }
                        _ => "Flag for the next scheduled review".to_string(),
                    },
                }
            })
            .collect()
    }
}

fn pick(signals: &[Signal], i: usize) -> Option<&Signal> {
    if signals.is_empty() {
        None
    } else {
        signals.get(i % signals.len())
    }
}

/// Causal step `i` is tracked by signal `i % n`.
fn chain_trackers(causal_chain: &[CausalLink], signals: &[Signal]) -> Vec<ChainTracker> {
    causal_chain
        .iter()
        .enumerate()
        .map(|(i, link)| {
            let (indicator, threshold) = match pick(signals, i) {
                Some(signal) => (signal.name.clone(), signal.threshold),
                None => (QUALITATIVE_METRIC.to_string(), QUALITATIVE_THRESHOLD),
            };
            ChainTracker {
                chain_step: link.chain_link,
                event: link.event.clone(),
                leading_indicator: indicator,
                threshold,
            }
        })
        .collect()
}

fn breach_condition(signal: &Signal) -> String {
    let value = format_number(signal.threshold);
    match signal.threshold_type {
        ThresholdType::Above => format!("{} falls below {}", signal.name, value),
        ThresholdType::Below => format!("{} rises above {}", signal.name, value),
        ThresholdType::ChangePercent => {
            format!("{} moves more than {}% in one period", signal.name, value)
        }
    }
}

fn objective_for(core_claim: &str) -> String {
    let claim = core_claim.trim();
    if claim.is_empty() {
        "Monitor thesis performance and key assumptions".to_string()
    } else {
        format!(
            "Validate that {} Exit or resize if assumption tests breach failure thresholds.",
            ensure_period(claim)
        )
    }
}

fn ensure_period(text: &str) -> String {
    if text.ends_with('.') {
        text.to_string()
    } else {
        format!("{}.", text)
    }
}

fn decision_rules(assumption_count: usize, signals: &[Signal]) -> Vec<DecisionRule> {
    let mut rules = Vec::new();

    if assumption_count > 0 {
        let breaches = assumption_count.min(2);
        rules.push(DecisionRule {
            condition: format!(
                "{} or more assumption tests breach their failure thresholds",
                breaches
            ),
            action: "sell: reduce position, the thesis foundation is weakening".to_string(),
        });
    }

    if let Some(lead) = signals.first() {
        rules.push(DecisionRule {
            condition: format!(
                "{} meets its target ({}) for two consecutive periods",
                lead.name,
                lead.target()
            ),
            action: "buy: add to position, the thesis is playing out".to_string(),
        });
    }

    rules.push(DecisionRule {
        condition: "Mixed signals with no failure threshold breached".to_string(),
        action: "hold: maintain position and continue scheduled reviews".to_string(),
    });

    rules
}

fn review_schedule(fastest: Option<Cadence>) -> String {
    match fastest {
        Some(Cadence::Daily) => {
            "Daily signal checks, weekly review of alerts, monthly validation assessment"
        }
        Some(Cadence::Weekly) => "Weekly signal review, monthly validation assessment",
        Some(Cadence::Monthly) => {
            "Monthly performance review with quarterly deep-dive analysis"
        }
        None => "Quarterly review of thesis and assumptions",
    }
    .to_string()
}

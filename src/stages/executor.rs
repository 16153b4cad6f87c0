use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::analysis::{AnalysisRequest, CoreAnalysis, RawCoreAnalysis};
use crate::config::{PlanPolicyConfig, StageConfig};
use crate::error::{SchemaError, StageError, StageResultOf};
use crate::fallback::ThesisProfile;
use crate::llm::{CompletionModel, CompletionRequest, Message};
use crate::monitoring::{MonitoringPlan, MonitoringPlanBuilder};
use crate::parser::{extract, extract_as, ExpectedShape};
use crate::prompts::prompt_for_stage;
use crate::signals::{ClassifiedSignals, RawSignal, SignalClassifier};

use super::StageId;

/// Runs the model path of each stage: prompt, call, parse, validate.
///
/// Every failure is returned as a [`StageError`]; nothing here falls back.
#[derive(Clone)]
pub struct StageExecutor {
    model: Arc<dyn CompletionModel>,
    stages: StageConfig,
    attempt_timeout: Duration,
    classifier: SignalClassifier,
    plan_builder: MonitoringPlanBuilder,
}

impl StageExecutor {
    /// Create an executor over a completion model
    pub fn new(
        model: Arc<dyn CompletionModel>,
        stages: StageConfig,
        policy: PlanPolicyConfig,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            model,
            stages,
            attempt_timeout,
            classifier: SignalClassifier::new(policy.priority_signal_limit),
            plan_builder: MonitoringPlanBuilder::new(policy),
        }
    }

    /// Stage 1: core claim, assumptions, causal chain and counter scenarios.
    pub async fn core_claim(&self, request: &AnalysisRequest) -> StageResultOf<CoreAnalysis> {
        let mut messages = vec![Message::system(prompt_for_stage(StageId::CoreClaim))];
        if let Some(context) = request.prior_context.as_ref().filter(|c| !c.is_empty()) {
            messages.push(Message::user(format!(
                "Context from a previous analysis of this thesis:\n{}",
                context.render()
            )));
        }
        messages.push(Message::user(format!(
            "Analyze this investment thesis:\n\n{}",
            request.thesis_text
        )));

        let raw = self
            .call(StageId::CoreClaim, messages, self.stages.core_claim_max_tokens)
            .await?;

        let parsed: RawCoreAnalysis = extract_as(&raw, ExpectedShape::Object)?;
        let default_model = ThesisProfile::from_thesis(&request.thesis_text).mental_model;
        let core = parsed.normalize(default_model);
        core.validate()?;
        Ok(core)
    }

    /// Stage 2: extract signals and classify them.
    ///
    /// An empty or unusable signal list counts as a failure.
    pub async fn signals(
        &self,
        request: &AnalysisRequest,
        core: &CoreAnalysis,
    ) -> StageResultOf<ClassifiedSignals> {
        let mut prompt = format!(
            "Investment thesis:\n{}\n\nCore claim: {}\n\nAssumptions:\n{}\n\nCausal chain:\n{}",
            request.thesis_text,
            core.core_claim,
            numbered(&core.assumptions),
            numbered(&core.causal_chain.iter().map(|l| l.event.clone()).collect::<Vec<_>>()),
        );
        if let Some(context) = request.prior_context.as_ref() {
            if !context.signal_names.is_empty() {
                prompt.push_str(&format!(
                    "\n\nSignals tracked previously (keep those still relevant): {}",
                    context.signal_names.join(", ")
                ));
            }
        }
        prompt.push_str("\n\nIdentify the signals to monitor.");

        let messages = vec![
            Message::system(prompt_for_stage(StageId::SignalExtraction)),
            Message::user(prompt),
        ];
        let raw = self
            .call(StageId::SignalExtraction, messages, self.stages.signals_max_tokens)
            .await?;

        let items = match extract(&raw, ExpectedShape::Array)? {
            Value::Array(items) => items,
            _ => Vec::new(),
        };
        let raw_signals: Vec<RawSignal> = items.into_iter().filter_map(RawSignal::from_value).collect();
        if raw_signals.is_empty() {
            return Err(SchemaError::new("signals", "signals", "model returned no usable signals").into());
        }

        Ok(self.classifier.classify(raw_signals))
    }

    /// Stage 3: monitoring plan, with gaps filled by the plan builder.
    pub async fn monitoring_plan(
        &self,
        request: &AnalysisRequest,
        core: &CoreAnalysis,
        classified: &ClassifiedSignals,
    ) -> StageResultOf<MonitoringPlan> {
        let signal_lines: Vec<String> = classified
            .signals
            .iter()
            .map(|s| {
                format!(
                    "{} ({}, {}, target {})",
                    s.name,
                    s.level,
                    s.frequency,
                    s.target()
                )
            })
            .collect();

        let prompt = format!(
            "Investment thesis:\n{}\n\nCore claim: {}\n\nAssumptions:\n{}\n\nCausal chain:\n{}\n\nSignals:\n{}\n\nCreate the monitoring plan.",
            request.thesis_text,
            core.core_claim,
            numbered(&core.assumptions),
            numbered(&core.causal_chain.iter().map(|l| l.event.clone()).collect::<Vec<_>>()),
            numbered(&signal_lines),
        );

        let messages = vec![
            Message::system(prompt_for_stage(StageId::MonitoringPlan)),
            Message::user(prompt),
        ];
        let raw = self
            .call(StageId::MonitoringPlan, messages, self.stages.monitoring_max_tokens)
            .await?;

        let plan: MonitoringPlan = extract_as(&raw, ExpectedShape::Object)?;
        let plan = self.plan_builder.complete(
            plan,
            &core.core_claim,
            &core.assumptions,
            &core.causal_chain,
            classified,
        );
        plan.validate()?;
        Ok(plan)
    }

    async fn call(
        &self,
        stage: StageId,
        messages: Vec<Message>,
        max_tokens: u32,
    ) -> Result<String, StageError> {
        let request = CompletionRequest::new(messages)
            .with_max_tokens(max_tokens)
            .with_temperature(self.stages.temperature)
            .with_timeout(self.attempt_timeout);

        let raw = self.model.complete(request).await?;
        debug!(stage = %stage, chars = raw.len(), "Received model output");
        Ok(raw)
    }
}

fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ModelError, ModelErrorKind, ParseError};
    use crate::llm::MockCompletionModel;
    use crate::analysis::PriorContext;
    use crate::signals::SignalLevel;

    fn executor(model: MockCompletionModel) -> StageExecutor {
        StageExecutor::new(
            Arc::new(model),
            StageConfig::default(),
            PlanPolicyConfig::default(),
            Duration::from_secs(5),
        )
    }

    fn core() -> CoreAnalysis {
        crate::fallback::FallbackGenerator::default().core_claim("Acme will grow")
    }

    const CORE_JSON: &str = r#"```json
{
  "core_claim": "NVIDIA captures AI capex",
  "core_analysis": "Upside from data center demand",
  "mental_model": "Growth",
  "assumptions": ["Capex keeps rising", "Share holds"],
  "causal_chain": [
    {"chain_link": 1, "event": "Capex rises", "explanation": "AI demand"},
    {"chain_link": 2, "event": "GPU orders grow", "explanation": "Capex flows to chips"}
  ],
  "counter_thesis_scenarios": []
}
```"#;

    #[tokio::test]
    async fn test_core_claim_parses_fenced_output() {
        let mut model = MockCompletionModel::new();
        model
            .expect_complete()
            .times(1)
            .returning(|_| Ok(CORE_JSON.to_string()));

        let core = executor(model)
            .core_claim(&AnalysisRequest::new("NVIDIA thesis"))
            .await
            .unwrap();
        assert_eq!(core.core_claim, "NVIDIA captures AI capex");
        assert_eq!(core.causal_chain.len(), 2);
    }

    #[tokio::test]
    async fn test_core_claim_includes_prior_context() {
        let mut model = MockCompletionModel::new();
        model
            .expect_complete()
            .withf(|req| req.user_text().contains("Previous core claim: Old claim"))
            .times(1)
            .returning(|_| Ok(CORE_JSON.to_string()));

        let request = AnalysisRequest::new("NVIDIA thesis").with_prior_context(PriorContext {
            core_claim: Some("Old claim".to_string()),
            ..Default::default()
        });
        assert!(executor(model).core_claim(&request).await.is_ok());
    }

    #[tokio::test]
    async fn test_core_claim_model_error_propagates() {
        let mut model = MockCompletionModel::new();
        model
            .expect_complete()
            .returning(|_| Err(ModelError::new(ModelErrorKind::Auth, "bad key")));

        let err = executor(model)
            .core_claim(&AnalysisRequest::new("thesis"))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Model(_)));
    }

    #[tokio::test]
    async fn test_core_claim_invalid_payload() {
        let mut model = MockCompletionModel::new();
        model
            .expect_complete()
            .returning(|_| Ok(r#"{"core_claim": "", "assumptions": []}"#.to_string()));

        let err = executor(model)
            .core_claim(&AnalysisRequest::new("thesis"))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_signals_parse_and_classify() {
        let mut model = MockCompletionModel::new();
        model.expect_complete().returning(|_| {
            Ok(r#"Here are the signals:
[
  {"name": "GPU Shipments", "level": "Level_0_Raw_Economic_Activity", "frequency": "monthly", "threshold": 10, "threshold_type": "change_percent"},
  {"name": "Analyst Sentiment", "level": "Level_4_Market_Sentiment", "frequency": "weekly", "threshold": "60", "threshold_type": "above"}
]"#
            .to_string())
        });

        let classified = executor(model)
            .signals(&AnalysisRequest::new("thesis"), &core())
            .await
            .unwrap();
        assert_eq!(classified.len(), 2);
        assert_eq!(classified.cadence.weekly, vec!["Analyst Sentiment"]);
    }

    #[tokio::test]
    async fn test_signals_with_mixed_field_types_are_kept() {
        let mut model = MockCompletionModel::new();
        model.expect_complete().returning(|_| {
            Ok(r#"[
  {"name": "A", "level": 2},
  {"name": "B", "type": "Level_1_Primary_Signals", "level": "Level_0_Raw_Economic_Activity"},
  {"name": "C", "level": "Level_1_Primary_Signals", "reliability_score": "0.8"},
  {"name": "D", "level": "Level_1_Primary_Signals"},
  {"name": "E", "level": {"tier": 3}, "threshold": [1, 2], "frequency": 7}
]"#
            .to_string())
        });

        let classified = executor(model)
            .signals(&AnalysisRequest::new("thesis"), &core())
            .await
            .unwrap();

        let names: Vec<&str> = classified.signals.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D", "E"]);

        let level_of = |name: &str| {
            classified
                .signals
                .iter()
                .find(|s| s.name == name)
                .map(|s| s.level)
        };
        assert_eq!(level_of("A"), Some(SignalLevel::DerivedMetrics));
        assert_eq!(level_of("B"), Some(SignalLevel::RawEconomicActivity));
        assert_eq!(level_of("E"), Some(SignalLevel::DerivedMetrics));

        let c = classified.signals.iter().find(|s| s.name == "C").unwrap();
        assert_eq!(c.reliability_score, 0.8);
    }

    #[tokio::test]
    async fn test_empty_signal_array_is_failure() {
        let mut model = MockCompletionModel::new();
        model.expect_complete().returning(|_| Ok("[]".to_string()));

        let err = executor(model)
            .signals(&AnalysisRequest::new("thesis"), &core())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_signals_unparseable() {
        let mut model = MockCompletionModel::new();
        model
            .expect_complete()
            .returning(|_| Ok("I cannot produce signals.".to_string()));

        let err = executor(model)
            .signals(&AnalysisRequest::new("thesis"), &core())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Parse(ParseError::NoStructure { .. })));
    }

    #[tokio::test]
    async fn test_monitoring_plan_completed_by_builder() {
        let mut model = MockCompletionModel::new();
        model.expect_complete().returning(|_| {
            Ok(r#"{"alert_rules": [{"trigger_name": "Capex cut", "condition": "Capex growth < 0%", "severity": "high", "action": "Sell"}]}"#.to_string())
        });

        let core = core();
        let classified = crate::fallback::FallbackGenerator::default().signals("Acme", None);
        let plan = executor(model)
            .monitoring_plan(&AnalysisRequest::new("thesis"), &core, &classified)
            .await
            .unwrap();
        assert_eq!(plan.alert_rules.len(), 1);
        assert_eq!(plan.assumption_tests.len(), core.assumptions.len());
        assert!(!plan.review_schedule.is_empty());
    }

    #[tokio::test]
    async fn test_monitoring_plan_without_alerts_is_invalid() {
        let mut model = MockCompletionModel::new();
        model
            .expect_complete()
            .returning(|_| Ok(r#"{"objective": "Track"}"#.to_string()));

        let classified = crate::fallback::FallbackGenerator::default().signals("Acme", None);
        let err = executor(model)
            .monitoring_plan(&AnalysisRequest::new("thesis"), &core(), &classified)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Invalid(_)));
    }
}

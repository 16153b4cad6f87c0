//! Deterministic, keyword-driven stage outputs.
//!
//! The fallback generator runs whenever a stage cannot produce a payload
//! from the model. Its output has the same types as model output and always
//! passes the same validation, so callers never need to know which path
//! produced a payload (beyond the recorded flags).

mod profile;
mod signals;
mod templates;

pub use profile::{Sector, ThesisProfile, DEFAULT_COMPANY};

use tracing::debug;

use crate::analysis::CoreAnalysis;
use crate::config::PlanPolicyConfig;
use crate::monitoring::{MonitoringPlan, MonitoringPlanBuilder};
use crate::signals::{ClassifiedSignals, SignalClassifier};
use crate::stages::{StageId, StagePayload, Upstream};

/// Synthesizes schema-valid payloads without a model.
#[derive(Debug, Clone, Default)]
pub struct FallbackGenerator {
    classifier: SignalClassifier,
    plan_builder: MonitoringPlanBuilder,
}

impl FallbackGenerator {
    /// Create a generator sharing the pipeline's plan heuristics
    pub fn new(policy: PlanPolicyConfig) -> Self {
        Self {
            classifier: SignalClassifier::new(policy.priority_signal_limit),
            plan_builder: MonitoringPlanBuilder::new(policy),
        }
    }

    /// Produce the payload for one stage. Never fails.
    ///
    /// Missing upstream payloads are synthesized from the thesis.
    pub fn generate(&self, stage: StageId, thesis: &str, upstream: &Upstream<'_>) -> StagePayload {
        debug!(stage = %stage, "Generating fallback payload");
        match stage {
            StageId::CoreClaim => StagePayload::CoreClaim(self.core_claim(thesis)),
            StageId::SignalExtraction => {
                StagePayload::Signals(self.signals(thesis, upstream.core))
            }
            StageId::MonitoringPlan => {
                let core = match upstream.core {
                    Some(core) => core.clone(),
                    None => self.core_claim(thesis),
                };
                let classified = match upstream.signals {
                    Some(classified) => classified.clone(),
                    None => self.signals(thesis, Some(&core)),
                };
                StagePayload::MonitoringPlan(self.monitoring_plan(&core, &classified))
            }
        }
    }

    /// Core claim, assumptions, causal chain and risks from sector templates.
    pub fn core_claim(&self, thesis: &str) -> CoreAnalysis {
        let profile = ThesisProfile::from_thesis(thesis);
        debug!(
            sector = %profile.sector,
            mental_model = %profile.mental_model,
            company = %profile.primary_company,
            "Profiled thesis"
        );
        templates::core_analysis_for(&profile)
    }

    /// Keyword-triggered signals plus the generic primary set. Never empty.
    pub fn signals(&self, thesis: &str, core: Option<&CoreAnalysis>) -> ClassifiedSignals {
        let mut text = thesis.to_string();
        if let Some(core) = core {
            text.push(' ');
            text.push_str(&core.core_claim);
            for assumption in &core.assumptions {
                text.push(' ');
                text.push_str(assumption);
            }
        }
        self.classifier.classify(signals::signals_for(&text))
    }

    /// Plan derived by the builder from whatever upstream data exists.
    pub fn monitoring_plan(&self, core: &CoreAnalysis, classified: &ClassifiedSignals) -> MonitoringPlan {
        self.plan_builder.build(
            &core.core_claim,
            &core.assumptions,
            &core.causal_chain,
            classified,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MentalModel;
    use crate::signals::SignalLevel;

    const NVIDIA_THESIS: &str = "NVIDIA will benefit from AI chip demand and data center growth";

    #[test]
    fn test_core_claim_fallback_is_valid() {
        let generator = FallbackGenerator::default();
        let core = generator.core_claim(NVIDIA_THESIS);
        assert!(core.validate().is_ok());
        assert_eq!(core.mental_model, MentalModel::Disruption);
        assert!(core.core_claim.contains("NVIDIA"));
    }

    #[test]
    fn test_signal_fallback_never_empty() {
        let generator = FallbackGenerator::default();
        for thesis in ["", "x", NVIDIA_THESIS, "A cheap bank"] {
            let classified = generator.signals(thesis, None);
            assert!(classified.len() >= 2, "thesis: {:?}", thesis);
            assert!(!classified.at_level(SignalLevel::PrimarySignals).is_empty());
        }
    }

    #[test]
    fn test_signals_use_upstream_text() {
        let generator = FallbackGenerator::default();
        let mut core = generator.core_claim("Acme will grow");
        core.assumptions.push("Hotel occupancy recovers".to_string());

        let without = generator.signals("Acme will grow", None);
        let with = generator.signals("Acme will grow", Some(&core));
        assert!(with.len() > without.len());
    }

    #[test]
    fn test_generate_dispatches_per_stage() {
        let generator = FallbackGenerator::default();
        let upstream = Upstream::default();

        assert!(matches!(
            generator.generate(StageId::CoreClaim, NVIDIA_THESIS, &upstream),
            StagePayload::CoreClaim(_)
        ));
        assert!(matches!(
            generator.generate(StageId::SignalExtraction, NVIDIA_THESIS, &upstream),
            StagePayload::Signals(_)
        ));
        match generator.generate(StageId::MonitoringPlan, NVIDIA_THESIS, &upstream) {
            StagePayload::MonitoringPlan(plan) => {
                assert!(plan.validate().is_ok());
                assert!(!plan.alert_rules.is_empty());
                assert_eq!(plan.assumption_tests.len(), 4);
                assert_eq!(plan.causal_chain_trackers.len(), 3);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let generator = FallbackGenerator::default();
        let upstream = Upstream::default();
        assert_eq!(
            generator.generate(StageId::MonitoringPlan, NVIDIA_THESIS, &upstream),
            generator.generate(StageId::MonitoringPlan, NVIDIA_THESIS, &upstream)
        );
    }
}

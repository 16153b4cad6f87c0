//! Keyword-triggered signal templates for the signal-extraction fallback.

use serde_json::json;

use super::profile::{mentions, tokenize};
use crate::signals::RawSignal;

struct SignalRule {
    markers: &'static [&'static str],
    name: &'static str,
    level: &'static str,
    description: &'static str,
    frequency: &'static str,
    threshold: f64,
    threshold_type: &'static str,
    data_source: &'static str,
    position: &'static str,
    power: &'static str,
}

impl SignalRule {
    fn to_raw(&self) -> RawSignal {
        RawSignal {
            name: Some(self.name.to_string()),
            level: Some(self.level.to_string()),
            description: Some(self.description.to_string()),
            frequency: Some(self.frequency.to_string()),
            threshold: Some(json!(self.threshold)),
            threshold_type: Some(self.threshold_type.to_string()),
            data_source: Some(self.data_source.to_string()),
            value_chain_position: Some(self.position.to_string()),
            predictive_power: Some(self.power.to_string()),
            reliability_score: None,
        }
    }
}

const KEYWORD_RULES: &[SignalRule] = &[
    SignalRule {
        markers: &["ai", "gpu", "chip", "semiconductor", "accelerator"],
        name: "AI Accelerator Shipment Volume",
        level: "Level_0_Raw_Economic_Activity",
        description: "Units of AI accelerators shipped by leading vendors",
        frequency: "monthly",
        threshold: 10.0,
        threshold_type: "change_percent",
        data_source: "Industry shipment trackers",
        position: "upstream",
        power: "high",
    },
    SignalRule {
        markers: &["data center", "cloud", "hyperscaler"],
        name: "Hyperscaler Capex Growth",
        level: "Level_1_Primary_Signals",
        description: "Year-over-year growth in data center capital expenditure",
        frequency: "quarterly",
        threshold: 20.0,
        threshold_type: "above",
        data_source: "Company filings",
        position: "midstream",
        power: "high",
    },
    SignalRule {
        markers: &["ev", "electric vehicle", "tesla"],
        name: "EV Registration Count",
        level: "Level_0_Raw_Economic_Activity",
        description: "New electric vehicle registrations",
        frequency: "monthly",
        threshold: 15.0,
        threshold_type: "above",
        data_source: "Government registration data",
        position: "downstream",
        power: "high",
    },
    SignalRule {
        markers: &["drug", "clinical", "fda", "pharma", "biotech"],
        name: "Late-Stage Trial Readouts",
        level: "Level_1_Primary_Signals",
        description: "Number of phase 3 readouts and regulatory decisions",
        frequency: "quarterly",
        threshold: 2.0,
        threshold_type: "above",
        data_source: "Official trial registry",
        position: "upstream",
        power: "high",
    },
    SignalRule {
        markers: &["bank", "lending", "loan", "credit"],
        name: "Loan Growth",
        level: "Level_1_Primary_Signals",
        description: "Growth in outstanding loan balances",
        frequency: "quarterly",
        threshold: 5.0,
        threshold_type: "above",
        data_source: "Regulatory filings",
        position: "midstream",
        power: "medium",
    },
    SignalRule {
        markers: &["oil", "gas", "solar", "energy", "renewable"],
        name: "Production Volume",
        level: "Level_0_Raw_Economic_Activity",
        description: "Physical output volume across the asset base",
        frequency: "monthly",
        threshold: 5.0,
        threshold_type: "change_percent",
        data_source: "Government energy statistics",
        position: "upstream",
        power: "medium",
    },
    SignalRule {
        markers: &["retail", "consumer", "store", "brand"],
        name: "Same-Store Sales Growth",
        level: "Level_1_Primary_Signals",
        description: "Comparable store sales growth",
        frequency: "monthly",
        threshold: 3.0,
        threshold_type: "above",
        data_source: "Company filings",
        position: "downstream",
        power: "medium",
    },
    SignalRule {
        markers: &["travel", "airline", "hotel", "passenger", "tourism"],
        name: "Passenger Throughput Volume",
        level: "Level_0_Raw_Economic_Activity",
        description: "Daily checkpoint passenger counts",
        frequency: "weekly",
        threshold: 5.0,
        threshold_type: "change_percent",
        data_source: "Government checkpoint statistics",
        position: "downstream",
        power: "high",
    },
    SignalRule {
        markers: &["subscription", "subscriber", "user", "adoption", "platform"],
        name: "Active User Growth",
        level: "Level_1_Primary_Signals",
        description: "Growth in monthly active users or subscribers",
        frequency: "monthly",
        threshold: 10.0,
        threshold_type: "above",
        data_source: "Company filings",
        position: "downstream",
        power: "medium",
    },
];

/// Always present so the fallback never yields an empty signal set.
const GENERIC_RULES: &[SignalRule] = &[
    SignalRule {
        markers: &[],
        name: "Revenue Growth Rate",
        level: "Level_1_Primary_Signals",
        description: "Year-over-year quarterly revenue growth",
        frequency: "quarterly",
        threshold: 15.0,
        threshold_type: "above",
        data_source: "Company filings",
        position: "downstream",
        power: "high",
    },
    SignalRule {
        markers: &[],
        name: "Market Share Indicator",
        level: "Level_1_Primary_Signals",
        description: "Share of the addressable market versus peers",
        frequency: "monthly",
        threshold: 5.0,
        threshold_type: "change_percent",
        data_source: "Industry reports",
        position: "downstream",
        power: "medium",
    },
];

/// Keyword-triggered signals followed by the generic primary set.
pub(crate) fn signals_for(text: &str) -> Vec<RawSignal> {
    let lower = text.to_lowercase();
    let tokens = tokenize(&lower);

    let mut raw: Vec<RawSignal> = KEYWORD_RULES
        .iter()
        .filter(|rule| rule.markers.iter().any(|m| mentions(&lower, &tokens, m)))
        .map(SignalRule::to_raw)
        .collect();

    for rule in GENERIC_RULES {
        let present = raw
            .iter()
            .any(|s| s.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(rule.name)));
        if !present {
            raw.push(rule.to_raw());
        }
    }
    raw
}

//! Monitorable market signals and their six-level taxonomy.
//!
//! Model output arrives as loosely-typed [`RawSignal`] records. The
//! [`SignalClassifier`] normalizes them into [`Signal`] values whose
//! enumerated fields always hold a known variant.

mod classifier;

pub use classifier::*;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Signal Level
// ============================================================================

/// Ordered classification tier, from raw economic activity to meta-analysis.
///
/// Ordering only affects display priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignalLevel {
    /// Direct observations of economic activity (permits, shipments, hiring).
    #[serde(rename = "Level_0_Raw_Economic_Activity")]
    RawEconomicActivity,
    /// Simple aggregations reported by companies or agencies.
    #[serde(rename = "Level_1_Primary_Signals")]
    PrimarySignals,
    /// Ratios and growth rates computed from primary signals.
    #[serde(rename = "Level_2_Derived_Metrics")]
    DerivedMetrics,
    /// Price and volume based indicators.
    #[serde(rename = "Level_3_Technical_Indicators")]
    TechnicalIndicators,
    /// Surveys, positioning and sentiment gauges.
    #[serde(rename = "Level_4_Market_Sentiment")]
    MarketSentiment,
    /// Analysis of other analyses: consensus revisions, narrative tracking.
    #[serde(rename = "Level_5_Meta_Analysis")]
    MetaAnalysis,
}

impl SignalLevel {
    /// All levels in display order.
    pub const ALL: [SignalLevel; 6] = [
        SignalLevel::RawEconomicActivity,
        SignalLevel::PrimarySignals,
        SignalLevel::DerivedMetrics,
        SignalLevel::TechnicalIndicators,
        SignalLevel::MarketSentiment,
        SignalLevel::MetaAnalysis,
    ];

    /// Tier assigned when a declared level is not recognized.
    pub const DEFAULT: SignalLevel = SignalLevel::DerivedMetrics;

    /// Returns the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalLevel::RawEconomicActivity => "Level_0_Raw_Economic_Activity",
            SignalLevel::PrimarySignals => "Level_1_Primary_Signals",
            SignalLevel::DerivedMetrics => "Level_2_Derived_Metrics",
            SignalLevel::TechnicalIndicators => "Level_3_Technical_Indicators",
            SignalLevel::MarketSentiment => "Level_4_Market_Sentiment",
            SignalLevel::MetaAnalysis => "Level_5_Meta_Analysis",
        }
    }

    /// Whether this tier counts as a primary (Level 0 or 1) signal.
    pub fn is_primary(&self) -> bool {
        matches!(
            self,
            SignalLevel::RawEconomicActivity | SignalLevel::PrimarySignals
        )
    }

    /// Parse a declared level, falling back to [`SignalLevel::DEFAULT`].
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(Self::DEFAULT)
    }
}

impl fmt::Display for SignalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalLevel {
    type Err = String;

    /// Accepts canonical names (case-insensitive) and the older aggregation-style aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "level_0_raw_economic_activity" | "level_0_raw_activity" | "level_0_raw_economic" => {
                Ok(SignalLevel::RawEconomicActivity)
            }
            "level_1_primary_signals" | "level_1_simple_aggregation" | "level_1_primary" => {
                Ok(SignalLevel::PrimarySignals)
            }
            "level_2_derived_metrics" | "level_2_sophisticated_aggregation" => {
                Ok(SignalLevel::DerivedMetrics)
            }
            "level_3_technical_indicators"
            | "level_3_complex_ratios"
            | "level_3_complex_derivatives" => Ok(SignalLevel::TechnicalIndicators),
            "level_4_market_sentiment" | "level_4_synthetic_indicators" => {
                Ok(SignalLevel::MarketSentiment)
            }
            "level_5_meta_analysis" => Ok(SignalLevel::MetaAnalysis),
            // Bare tier numbers such as `2` or `Level 2`
            other => other
                .strip_prefix("level_")
                .unwrap_or(other)
                .parse::<usize>()
                .ok()
                .and_then(|i| SignalLevel::ALL.get(i).copied())
                .ok_or_else(|| format!("Unknown signal level: {}", s)),
        }
    }
}

// ============================================================================
// Signal Attributes
// ============================================================================

/// How often a signal can be collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    /// Every trading day.
    Daily,
    /// Once a week.
    Weekly,
    /// Once a month.
    Monthly,
    /// Once a quarter.
    Quarterly,
    /// Continuous feed.
    RealTime,
}

impl Frequency {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::RealTime => "real-time",
        }
    }

    /// Monitoring cadence bucket this frequency falls into.
    pub fn cadence(&self) -> Cadence {
        match self {
            Frequency::Daily | Frequency::RealTime => Cadence::Daily,
            Frequency::Weekly => Cadence::Weekly,
            Frequency::Monthly | Frequency::Quarterly => Cadence::Monthly,
        }
    }

    /// Match a free-text frequency, returning `None` when nothing matches.
    pub fn detect(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        if ["real-time", "realtime", "real time", "real_time", "intraday", "hourly", "continuous"]
            .iter()
            .any(|k| lower.contains(k))
        {
            Some(Frequency::RealTime)
        } else if lower.contains("daily") {
            Some(Frequency::Daily)
        } else if lower.contains("week") {
            Some(Frequency::Weekly)
        } else if lower.contains("month") {
            Some(Frequency::Monthly)
        } else if ["quarter", "annual", "yearly", "year"]
            .iter()
            .any(|k| lower.contains(k))
        {
            Some(Frequency::Quarterly)
        } else {
            None
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review cadence used by the monitoring plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    /// Checked daily.
    Daily,
    /// Checked weekly.
    Weekly,
    /// Checked monthly.
    Monthly,
}

/// Direction in which a threshold is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdType {
    /// Breached when the value rises above the threshold.
    Above,
    /// Breached when the value falls below the threshold.
    Below,
    /// Breached when the change in percent exceeds the threshold.
    ChangePercent,
}

impl ThresholdType {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdType::Above => "above",
            ThresholdType::Below => "below",
            ThresholdType::ChangePercent => "change_percent",
        }
    }

    /// Parse a declared threshold type; anything unrecognized is a percent change.
    pub fn parse_lenient(s: &str) -> Self {
        let lower = s.trim().to_lowercase();
        if ["below", "under", "less", "decline", "<"]
            .iter()
            .any(|k| lower.contains(k))
        {
            ThresholdType::Below
        } else if ["above", "over", "greater", "exceed", ">"]
            .iter()
            .any(|k| lower.contains(k))
        {
            ThresholdType::Above
        } else {
            ThresholdType::ChangePercent
        }
    }

    /// Human-readable form of a target, e.g. `> 15` or `±5%`.
    pub fn describe(&self, threshold: f64) -> String {
        match self {
            ThresholdType::Above => format!("> {}", format_number(threshold)),
            ThresholdType::Below => format!("< {}", format_number(threshold)),
            ThresholdType::ChangePercent => format!("±{}%", format_number(threshold)),
        }
    }
}

impl fmt::Display for ThresholdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a signal sits in the value chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueChainPosition {
    /// Inputs and supply.
    Upstream,
    /// Production and operations.
    Midstream,
    /// Demand and end markets.
    Downstream,
}

impl ValueChainPosition {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueChainPosition::Upstream => "upstream",
            ValueChainPosition::Midstream => "midstream",
            ValueChainPosition::Downstream => "downstream",
        }
    }
}

impl FromStr for ValueChainPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upstream" => Ok(ValueChainPosition::Upstream),
            "midstream" => Ok(ValueChainPosition::Midstream),
            "downstream" => Ok(ValueChainPosition::Downstream),
            _ => Err(format!("Unknown value chain position: {}", s)),
        }
    }
}

/// How early a signal tends to move relative to fundamentals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictivePower {
    /// Leads fundamentals.
    High,
    /// Moves with fundamentals.
    Medium,
    /// Lags fundamentals.
    Low,
}

impl PredictivePower {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictivePower::High => "high",
            PredictivePower::Medium => "medium",
            PredictivePower::Low => "low",
        }
    }
}

impl FromStr for PredictivePower {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" | "high_predictive" => Ok(PredictivePower::High),
            "medium" | "moderate" | "medium_predictive" => Ok(PredictivePower::Medium),
            "low" | "low_predictive" => Ok(PredictivePower::Low),
            _ => Err(format!("Unknown predictive power: {}", s)),
        }
    }
}

// ============================================================================
// Signal
// ============================================================================

/// A named, trackable metric with a monitoring threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Display name, also the key used by the monitoring plan.
    pub name: String,
    /// Classification level.
    pub level: SignalLevel,
    /// What the metric measures.
    pub description: String,
    /// Collection frequency.
    pub frequency: Frequency,
    /// Numeric threshold.
    pub threshold: f64,
    /// How the threshold is evaluated.
    pub threshold_type: ThresholdType,
    /// Where the data comes from.
    pub data_source: String,
    /// Value chain position.
    pub value_chain_position: ValueChainPosition,
    /// How early the signal moves.
    pub predictive_power: PredictivePower,
    /// 0.0 to 1.0, higher for objective and officially sourced measures.
    pub reliability_score: f64,
}

impl Signal {
    /// Create a signal with the required attributes; the rest are defaulted.
    pub fn new(
        name: impl Into<String>,
        level: SignalLevel,
        frequency: Frequency,
        threshold: f64,
        threshold_type: ThresholdType,
    ) -> Self {
        Self {
            name: name.into(),
            level,
            description: String::new(),
            frequency,
            threshold,
            threshold_type,
            data_source: DEFAULT_DATA_SOURCE.to_string(),
            value_chain_position: ValueChainPosition::Midstream,
            predictive_power: PredictivePower::Medium,
            reliability_score: 0.5,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the data source
    pub fn with_data_source(mut self, data_source: impl Into<String>) -> Self {
        self.data_source = data_source.into();
        self
    }

    /// Set the value chain position
    pub fn with_position(mut self, position: ValueChainPosition) -> Self {
        self.value_chain_position = position;
        self
    }

    /// Set the predictive power
    pub fn with_predictive_power(mut self, power: PredictivePower) -> Self {
        self.predictive_power = power;
        self
    }

    /// Human-readable target, e.g. `> 15`.
    pub fn target(&self) -> String {
        self.threshold_type.describe(self.threshold)
    }
}

/// Source recorded when the model names none.
pub const DEFAULT_DATA_SOURCE: &str = "Company filings";

/// A signal as declared by the model, before normalization.
///
/// Every field is optional and enumerations are kept as strings so that
/// malformed values are coerced by the classifier instead of failing
/// deserialization. Objects are read field by field: numbers are accepted
/// where text is expected and wrong-typed fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawSignal {
    /// Read from `name`, `signal_name`, `signal` or `metric`, first match wins.
    pub name: Option<String>,
    /// Read from `level`, `signal_level` or `type`, first match wins.
    pub level: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
    /// Read from `frequency` or `collection_frequency`.
    pub frequency: Option<String>,
    /// Number or string such as `"15%"`.
    pub threshold: Option<Value>,
    /// `above`, `below` or `change_percent`, loosely matched.
    pub threshold_type: Option<String>,
    /// Read from `data_source` or `source`.
    pub data_source: Option<String>,
    /// `upstream`, `midstream` or `downstream`.
    pub value_chain_position: Option<String>,
    /// `high`, `medium` or `low`.
    pub predictive_power: Option<String>,
    /// Number or numeric string.
    pub reliability_score: Option<f64>,
}

impl<'de> Deserialize<'de> for RawSignal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Object(map) => Ok(Self::from_map(&map)),
            other => Err(serde::de::Error::custom(format!(
                "expected a signal object, found {}",
                other
            ))),
        }
    }
}

impl RawSignal {
    /// Create a raw signal carrying only a name and a declared level
    pub fn named(name: impl Into<String>, level: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            level: Some(level.into()),
            ..Default::default()
        }
    }

    /// Interpret one element of a model-produced signal array.
    ///
    /// Bare strings are treated as signal names; objects are read leniently.
    /// Anything else yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(name) if !name.trim().is_empty() => Some(Self {
                name: Some(name),
                ..Default::default()
            }),
            Value::Object(map) => Some(Self::from_map(&map)),
            _ => None,
        }
    }

    /// Read a signal object. Never fails; unusable fields are left empty.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            name: first_text(map, &["name", "signal_name", "signal", "metric"]),
            level: first_text(map, &["level", "signal_level", "type"]),
            description: first_text(map, &["description"]),
            frequency: first_text(map, &["frequency", "collection_frequency"]),
            threshold: map
                .get("threshold")
                .filter(|v| v.is_number() || v.is_string())
                .cloned(),
            threshold_type: first_text(map, &["threshold_type"]),
            data_source: first_text(map, &["data_source", "source"]),
            value_chain_position: first_text(map, &["value_chain_position"]),
            predictive_power: first_text(map, &["predictive_power"]),
            reliability_score: map.get("reliability_score").and_then(number_of),
        }
    }

    /// Numeric threshold, accepting numbers and strings like `"15%"` or `"> 5"`.
    pub fn threshold_value(&self) -> Option<f64> {
        let value = match self.threshold.as_ref()? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => {
                let cleaned: String = s
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                    .collect();
                cleaned.parse().ok()
            }
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }
}

impl From<&Signal> for RawSignal {
    fn from(signal: &Signal) -> Self {
        Self {
            name: Some(signal.name.clone()),
            level: Some(signal.level.as_str().to_string()),
            description: Some(signal.description.clone()),
            frequency: Some(signal.frequency.as_str().to_string()),
            threshold: serde_json::Number::from_f64(signal.threshold).map(Value::Number),
            threshold_type: Some(signal.threshold_type.as_str().to_string()),
            data_source: Some(signal.data_source.clone()),
            value_chain_position: Some(signal.value_chain_position.as_str().to_string()),
            predictive_power: Some(signal.predictive_power.as_str().to_string()),
            reliability_score: Some(signal.reliability_score),
        }
    }
}

/// First key holding a non-blank string or a number, as trimmed text.
fn first_text(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn number_of(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// Format a threshold without a trailing `.0` for whole numbers.
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e12 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{
    Cadence, Frequency, PredictivePower, RawSignal, Signal, SignalLevel, ThresholdType,
    ValueChainPosition, DEFAULT_DATA_SOURCE,
};

/// Threshold used when the model declares none.
pub const DEFAULT_THRESHOLD: f64 = 5.0;

const UPSTREAM_KEYWORDS: &[&str] = &[
    "raw material",
    "commodit",
    "mining",
    "extraction",
    "agricultur",
    "primary production",
    "gpu",
    "chip",
    "semiconductor",
    "wafer",
    "foundry",
    "silicon",
    "accelerator",
    "processor",
    "hardware",
    "component",
    "capacity utilization",
    "shipment",
    "production",
];

const MIDSTREAM_KEYWORDS: &[&str] = &[
    "processing",
    "refining",
    "manufacturing",
    "assembly",
    "transportation",
    "logistics",
    "distribution",
    "warehous",
    "data center",
    "capex",
    "infrastructure",
    "deployment",
    "hyperscaler",
    "cloud",
    "server",
    "facility",
    "installation",
    "integration",
];

const DOWNSTREAM_KEYWORDS: &[&str] = &[
    "retail",
    "consumer",
    "end-user",
    "final demand",
    "consumption",
    "point-of-sale",
    "registration",
    "adoption",
    "usage",
    "subscription",
    "enterprise",
    "deals",
    "revenue",
    "market share",
    "api calls",
    "customer",
    "bookings",
    "sales",
];

const HIGH_PREDICTIVE_KEYWORDS: &[&str] = &[
    "leading indicator",
    "early warning",
    "advance",
    "forward-looking",
    "predictive",
    "forecast",
    "permit",
    "application",
    "order",
    "booking",
    "backlog",
    "guidance",
];

const MEDIUM_PREDICTIVE_KEYWORDS: &[&str] = &[
    "coincident",
    "concurrent",
    "real-time",
    "current",
    "production",
    "manufacturing",
    "activity",
    "growth",
    "share",
];

const OBJECTIVE_MEASURE_KEYWORDS: &[&str] = &["count", "volume", "quantity", "number", "units"];
const OFFICIAL_SOURCE_KEYWORDS: &[&str] = &[
    "government",
    "regulatory",
    "official",
    "census",
    "filing",
    "bureau",
];
const SUBJECTIVE_MEASURE_KEYWORDS: &[&str] = &["sentiment", "opinion", "perception", "feeling"];

// ============================================================================
// Classifier
// ============================================================================

/// Normalizes raw signals and groups them by level.
///
/// Classification is a pure function of each signal's declared fields, so
/// feeding the output back in yields the same assignment.
#[derive(Debug, Clone)]
pub struct SignalClassifier {
    priority_limit: usize,
}

impl Default for SignalClassifier {
    fn default() -> Self {
        Self::new(10)
    }
}

impl SignalClassifier {
    /// Create a classifier that flags at most `priority_limit` priority signals.
    pub fn new(priority_limit: usize) -> Self {
        Self { priority_limit }
    }

    /// Normalize a single raw signal.
    ///
    /// Unknown levels become [`SignalLevel::DEFAULT`]; missing attributes are
    /// inferred from the signal's name and description.
    pub fn normalize(&self, raw: RawSignal) -> Signal {
        let name = raw
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("Unnamed signal")
            .to_string();
        let description = raw.description.clone().unwrap_or_default();
        let text = format!("{} {}", name, description).to_lowercase();

        let level = raw
            .level
            .as_deref()
            .map(SignalLevel::parse_lenient)
            .unwrap_or(SignalLevel::DEFAULT);

        let frequency = raw
            .frequency
            .as_deref()
            .and_then(Frequency::detect)
            .or_else(|| Frequency::detect(&text))
            .unwrap_or(Frequency::Monthly);

        let threshold_type = raw
            .threshold_type
            .as_deref()
            .map(ThresholdType::parse_lenient)
            .unwrap_or(ThresholdType::ChangePercent);

        let value_chain_position = raw
            .value_chain_position
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or_else(|| infer_value_chain_position(&text));

        let predictive_power = raw
            .predictive_power
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or_else(|| infer_predictive_power(&text));

        let data_source = raw
            .data_source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_DATA_SOURCE)
            .to_string();

        let reliability_score = raw
            .reliability_score
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(0.0, 1.0))
            .unwrap_or_else(|| reliability_score(&name, &format!("{} {}", description, data_source)));

        Signal {
            threshold: raw.threshold_value().unwrap_or(DEFAULT_THRESHOLD),
            name,
            level,
            description,
            frequency,
            threshold_type,
            data_source,
            value_chain_position,
            predictive_power,
            reliability_score,
        }
    }

    /// Normalize and group raw signals. Total count is conserved.
    pub fn classify(&self, raw_signals: Vec<RawSignal>) -> ClassifiedSignals {
        let signals: Vec<Signal> = raw_signals.into_iter().map(|r| self.normalize(r)).collect();
        self.group(signals)
    }

    /// Re-classify signals that were already normalized.
    pub fn reclassify(&self, signals: &[Signal]) -> ClassifiedSignals {
        self.classify(signals.iter().map(RawSignal::from).collect())
    }

    fn group(&self, signals: Vec<Signal>) -> ClassifiedSignals {
        let mut by_level: BTreeMap<SignalLevel, Vec<Signal>> =
            SignalLevel::ALL.iter().map(|l| (*l, Vec::new())).collect();
        let mut cadence = CadenceBuckets::default();

        for signal in &signals {
            by_level
                .entry(signal.level)
                .or_default()
                .push(signal.clone());
            match signal.frequency.cadence() {
                Cadence::Daily => cadence.daily.push(signal.name.clone()),
                Cadence::Weekly => cadence.weekly.push(signal.name.clone()),
                Cadence::Monthly => cadence.monthly.push(signal.name.clone()),
            }
        }

        // sort_by_key is stable: equal power keeps input order
        let mut ranked: Vec<&Signal> = signals.iter().collect();
        ranked.sort_by_key(|s| s.predictive_power);
        let priority_signals = ranked
            .into_iter()
            .take(self.priority_limit)
            .map(|s| s.name.clone())
            .collect();

        ClassifiedSignals {
            signals,
            by_level,
            cadence,
            priority_signals,
        }
    }
}

fn infer_value_chain_position(text: &str) -> ValueChainPosition {
    if contains_any(text, UPSTREAM_KEYWORDS) {
        ValueChainPosition::Upstream
    } else if contains_any(text, MIDSTREAM_KEYWORDS) {
        ValueChainPosition::Midstream
    } else if contains_any(text, DOWNSTREAM_KEYWORDS) {
        ValueChainPosition::Downstream
    } else {
        ValueChainPosition::Midstream
    }
}

fn infer_predictive_power(text: &str) -> PredictivePower {
    if contains_any(text, HIGH_PREDICTIVE_KEYWORDS) {
        PredictivePower::High
    } else if contains_any(text, MEDIUM_PREDICTIVE_KEYWORDS) {
        PredictivePower::Medium
    } else {
        PredictivePower::Low
    }
}

/// Score in `[0, 1]`: 0.5 base, objective measures and official sources raise it,
/// subjective measures lower it.
pub fn reliability_score(name: &str, context: &str) -> f64 {
    let name = name.to_lowercase();
    let context = context.to_lowercase();
    let mut score: f64 = 0.5;

    if contains_any(&name, OBJECTIVE_MEASURE_KEYWORDS) {
        score += 0.2;
    }
    if contains_any(&context, OFFICIAL_SOURCE_KEYWORDS) {
        score += 0.2;
    }
    if contains_any(&name, SUBJECTIVE_MEASURE_KEYWORDS) {
        score -= 0.2;
    }

    score.clamp(0.0, 1.0)
}

pub(crate) fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

// ============================================================================
// Classification Output
// ============================================================================

/// Signal names partitioned by monitoring cadence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CadenceBuckets {
    /// Daily and real-time signals.
    pub daily: Vec<String>,
    /// Weekly signals.
    pub weekly: Vec<String>,
    /// Monthly and quarterly signals.
    pub monthly: Vec<String>,
}

impl CadenceBuckets {
    /// The fastest cadence with at least one signal.
    pub fn fastest(&self) -> Option<Cadence> {
        if !self.daily.is_empty() {
            Some(Cadence::Daily)
        } else if !self.weekly.is_empty() {
            Some(Cadence::Weekly)
        } else if !self.monthly.is_empty() {
            Some(Cadence::Monthly)
        } else {
            None
        }
    }
}

/// Signal names grouped by value chain position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueChainMap {
    /// Supply-side and input signals.
    pub upstream: Vec<String>,
    /// Operations and production signals.
    pub midstream: Vec<String>,
    /// Demand and end-market signals.
    pub downstream: Vec<String>,
}

/// Overall grade of a signal set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityGrade {
    /// Score above 0.8.
    Excellent,
    /// Score above 0.6.
    Good,
    /// Score above 0.4.
    Fair,
    /// Anything lower.
    Poor,
}

impl QualityGrade {
    fn from_score(score: f64) -> Self {
        if score > 0.8 {
            QualityGrade::Excellent
        } else if score > 0.6 {
            QualityGrade::Good
        } else if score > 0.4 {
            QualityGrade::Fair
        } else {
            QualityGrade::Poor
        }
    }
}

/// Quality assessment of a classified signal set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalQuality {
    /// `primary_signal_ratio * 0.6 + average_reliability * 0.4`
    pub overall_score: f64,
    /// Grade of `overall_score`.
    pub assessment: QualityGrade,
    /// Share of signals at levels 0 and 1.
    pub primary_signal_ratio: f64,
    /// Mean reliability score.
    pub average_reliability: f64,
    /// Suggested improvements.
    pub recommendations: Vec<String>,
}

/// Summary of a classification, carried on the analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    /// Count per level, every level present.
    pub level_counts: BTreeMap<SignalLevel, usize>,
    /// Names by cadence.
    pub cadence: CadenceBuckets,
    /// Most useful signal names first.
    pub priority_signals: Vec<String>,
    /// Names by value chain position.
    pub value_chain: ValueChainMap,
    /// Quality assessment.
    pub quality: SignalQuality,
}

/// Output of [`SignalClassifier::classify`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedSignals {
    /// Normalized signals in input order.
    pub signals: Vec<Signal>,
    /// Every level is present, possibly with an empty list.
    pub by_level: BTreeMap<SignalLevel, Vec<Signal>>,
    /// Names by cadence.
    pub cadence: CadenceBuckets,
    /// Most useful signal names first.
    pub priority_signals: Vec<String>,
}

impl ClassifiedSignals {
    /// Total number of classified signals across all levels.
    pub fn len(&self) -> usize {
        self.by_level.values().map(Vec::len).sum()
    }

    /// Whether no signals were classified.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signals at one level.
    pub fn at_level(&self, level: SignalLevel) -> &[Signal] {
        self.by_level.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Signals ordered for display: by level, then input order.
    pub fn ordered(&self) -> Vec<Signal> {
        self.by_level.values().flatten().cloned().collect()
    }

    /// Signals in priority order, falling back to input order for the rest.
    pub fn by_priority(&self) -> Vec<&Signal> {
        let mut out: Vec<&Signal> = self
            .priority_signals
            .iter()
            .filter_map(|name| self.signals.iter().find(|s| &s.name == name))
            .collect();
        for signal in &self.signals {
            if !out.iter().any(|s| std::ptr::eq(*s, signal)) {
                out.push(signal);
            }
        }
        out
    }

    /// Signal names by value chain position.
    pub fn value_chain_map(&self) -> ValueChainMap {
        let mut map = ValueChainMap::default();
        for signal in &self.signals {
            let bucket = match signal.value_chain_position {
                ValueChainPosition::Upstream => &mut map.upstream,
                ValueChainPosition::Midstream => &mut map.midstream,
                ValueChainPosition::Downstream => &mut map.downstream,
            };
            bucket.push(signal.name.clone());
        }
        map
    }

    /// Grade the signal set by primary ratio and average reliability.
    pub fn quality(&self) -> SignalQuality {
        if self.signals.is_empty() {
            return SignalQuality {
                overall_score: 0.0,
                assessment: QualityGrade::Poor,
                primary_signal_ratio: 0.0,
                average_reliability: 0.0,
                recommendations: vec!["No signals identified".to_string()],
            };
        }

        let total = self.signals.len() as f64;
        let primary = self.signals.iter().filter(|s| s.level.is_primary()).count() as f64;
        let primary_ratio = primary / total;
        let avg_reliability = self.signals.iter().map(|s| s.reliability_score).sum::<f64>() / total;
        let overall = primary_ratio * 0.6 + avg_reliability * 0.4;

        let mut recommendations = Vec::new();
        if primary_ratio < 0.5 {
            recommendations.push(
                "Focus on identifying more Level 0-1 (primary) signals for better predictive power"
                    .to_string(),
            );
        }
        if overall < 0.6 {
            recommendations.push(
                "Consider seeking additional data sources for higher reliability signals"
                    .to_string(),
            );
        }
        let low_reliability = self
            .signals
            .iter()
            .filter(|s| s.reliability_score < 0.4)
            .count();
        if low_reliability > 0 {
            recommendations.push(format!(
                "Validate {} signals with low reliability scores",
                low_reliability
            ));
        }

        SignalQuality {
            overall_score: round2(overall),
            assessment: QualityGrade::from_score(overall),
            primary_signal_ratio: round2(primary_ratio),
            average_reliability: round2(avg_reliability),
            recommendations,
        }
    }

    /// Build the summary carried on the analysis result.
    pub fn summary(&self) -> SignalSummary {
        SignalSummary {
            level_counts: self
                .by_level
                .iter()
                .map(|(level, signals)| (*level, signals.len()))
                .collect(),
            cadence: self.cadence.clone(),
            priority_signals: self.priority_signals.clone(),
            value_chain: self.value_chain_map(),
            quality: self.quality(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

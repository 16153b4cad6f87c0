use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analysis::MentalModel;

/// Industry a thesis is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    /// Semiconductors, cloud, software.
    Technology,
    /// Pharma, biotech, medical devices.
    Healthcare,
    /// Banks, payments, insurance.
    Financial,
    /// Oil, gas, renewables, utilities.
    Energy,
    /// Retail and consumer brands.
    Consumer,
    /// Airlines, hotels, bookings.
    Travel,
}

impl Sector {
    /// Detection order; the first sector with a matching marker wins.
    pub const ALL: [Sector; 6] = [
        Sector::Technology,
        Sector::Healthcare,
        Sector::Financial,
        Sector::Energy,
        Sector::Consumer,
        Sector::Travel,
    ];

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Technology => "technology",
            Sector::Healthcare => "healthcare",
            Sector::Financial => "financial",
            Sector::Energy => "energy",
            Sector::Consumer => "consumer",
            Sector::Travel => "travel",
        }
    }

    fn markers(&self) -> &'static [&'static str] {
        match self {
            // Generic words like "data" or "digital" are left out; they appear in
            // every sector and technology is already the default.
            Sector::Technology => &[
                "ai",
                "artificial intelligence",
                "software",
                "cloud",
                "semiconductor",
                "chip",
                "accelerator",
                "gpu",
            ],
            Sector::Healthcare => &[
                "drug",
                "pharma",
                "medical",
                "biotech",
                "therapy",
                "clinical",
                "health",
                "fda",
            ],
            Sector::Financial => &[
                "bank",
                "financ",
                "payment",
                "insurance",
                "credit",
                "fintech",
                "lending",
                "loan",
            ],
            Sector::Energy => &[
                "oil",
                "gas",
                "renewable",
                "solar",
                "energy",
                "battery",
                "utility",
                "utilities",
            ],
            Sector::Consumer => &[
                "retail",
                "consumer",
                "brand",
                "products",
                "commerce",
                "store",
                "apparel",
            ],
            Sector::Travel => &[
                "travel",
                "airline",
                "hotel",
                "booking",
                "cruise",
                "tourism",
                "passenger",
            ],
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker words per mental model, in detection priority order.
const MENTAL_MODEL_MARKERS: &[(MentalModel, &[&str])] = &[
    (
        MentalModel::Disruption,
        &[
            "disrupt",
            "innovation",
            "transform",
            "revolution",
            "breakthrough",
            "ai",
            "artificial intelligence",
        ],
    ),
    (
        MentalModel::Value,
        &["undervalued", "value", "cheap", "discount", "margin of safety"],
    ),
    (
        MentalModel::Cyclical,
        &["cycle", "cyclical", "recovery", "rebound", "commodity"],
    ),
    (
        MentalModel::Quality,
        &["moat", "quality", "durable", "pricing power", "compounder"],
    ),
    (
        MentalModel::Growth,
        &["growth", "expand", "scale", "accelerat"],
    ),
];

const KNOWN_COMPANIES: &[&str] = &[
    "NVIDIA",
    "Tesla",
    "Apple",
    "Microsoft",
    "Amazon",
    "Google",
    "Alphabet",
    "Meta",
    "Netflix",
    "AMD",
    "Intel",
    "Broadcom",
];

const GROWTH_TERMS: &[&str] = &["growth", "increase", "expand", "scale", "accelerat", "revenue"];
const CLAIM_VERBS: &[&str] = &["will", "is", "has", "continues"];
const NOT_A_COMPANY: &[&str] = &["The", "This", "It", "We", "Our", "That", "There", "Management"];

/// Company used in templates when none can be found.
pub const DEFAULT_COMPANY: &str = "The company";

/// What keyword analysis can tell about a thesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThesisProfile {
    /// Best matching sector, technology when nothing matches.
    pub sector: Sector,
    /// First known company or ticker, or a placeholder.
    pub primary_company: String,
    /// Framing inferred from keywords.
    pub mental_model: MentalModel,
    /// At least three distinct growth terms appear.
    pub growth_oriented: bool,
}

impl ThesisProfile {
    /// Profile a thesis by marker words.
    pub fn from_thesis(thesis: &str) -> Self {
        let lower = thesis.to_lowercase();
        let tokens = tokenize(&lower);

        let sector = Sector::ALL
            .into_iter()
            .find(|s| s.markers().iter().any(|m| mentions(&lower, &tokens, m)))
            .unwrap_or(Sector::Technology);

        let mental_model = MENTAL_MODEL_MARKERS
            .iter()
            .find(|(_, markers)| markers.iter().any(|m| mentions(&lower, &tokens, m)))
            .map(|(model, _)| *model)
            .unwrap_or(MentalModel::Growth);

        let growth_terms = GROWTH_TERMS
            .iter()
            .filter(|t| mentions(&lower, &tokens, t))
            .count();

        Self {
            sector,
            primary_company: primary_company(thesis)
                .unwrap_or_else(|| DEFAULT_COMPANY.to_string()),
            mental_model,
            growth_oriented: growth_terms >= 3,
        }
    }
}

/// Whether the lowercased text mentions a marker.
///
/// Phrases are matched as substrings, markers of up to three letters as
/// whole words and longer markers as word prefixes, so `ai` does not match
/// `airline` while `disrupt` matches `disruptive`.
pub(crate) fn mentions(lower: &str, tokens: &[&str], marker: &str) -> bool {
    if marker.contains(' ') {
        lower.contains(marker)
    } else if marker.len() <= 3 {
        tokens.contains(&marker)
    } else {
        tokens.iter().any(|t| t.starts_with(marker))
    }
}

pub(crate) fn tokenize(lower: &str) -> Vec<&str> {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

fn primary_company(thesis: &str) -> Option<String> {
    let words: Vec<&str> = thesis
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .collect();

    let known = words.iter().find_map(|w| {
        KNOWN_COMPANIES
            .iter()
            .find(|k| k.eq_ignore_ascii_case(w))
            .map(|k| k.to_string())
    });
    if known.is_some() {
        return known;
    }

    // A run of capitalized words right before a claim verb
    for (i, word) in words.iter().enumerate() {
        if !CLAIM_VERBS.contains(&word.to_lowercase().as_str()) {
            continue;
        }
        let name: Vec<&str> = words[..i]
            .iter()
            .rev()
            .take_while(|w| is_capitalized(w))
            .copied()
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .skip_while(|w| NOT_A_COMPANY.contains(w))
            .collect();
        if !name.is_empty() {
            return Some(name.join(" "));
        }
    }
    None
}

fn is_capitalized(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some(c) if c.is_uppercase()) && chars.all(|c| c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NVIDIA_THESIS: &str = "NVIDIA will benefit from AI chip demand and data center growth";

    #[test]
    fn test_nvidia_profile() {
        let profile = ThesisProfile::from_thesis(NVIDIA_THESIS);
        assert_eq!(profile.sector, Sector::Technology);
        assert_eq!(profile.primary_company, "NVIDIA");
        assert_eq!(profile.mental_model, MentalModel::Disruption);
        assert!(!profile.growth_oriented);
    }

    #[test]
    fn test_mental_model_priority() {
        let value = ThesisProfile::from_thesis("An undervalued bank poised for growth");
        assert_eq!(value.mental_model, MentalModel::Value);

        let cyclical = ThesisProfile::from_thesis("Steel demand rebounds in the next cycle");
        assert_eq!(cyclical.mental_model, MentalModel::Cyclical);

        let quality = ThesisProfile::from_thesis("A wide moat with pricing power");
        assert_eq!(quality.mental_model, MentalModel::Quality);

        let default = ThesisProfile::from_thesis("Shares look interesting");
        assert_eq!(default.mental_model, MentalModel::Growth);
    }

    #[test]
    fn test_short_markers_need_whole_words() {
        let profile = ThesisProfile::from_thesis("Airline passenger traffic recovers");
        assert_eq!(profile.sector, Sector::Travel);
        assert_ne!(profile.mental_model, MentalModel::Disruption);
    }

    #[test]
    fn test_sector_detection() {
        assert_eq!(
            ThesisProfile::from_thesis("Biotech with a promising clinical pipeline").sector,
            Sector::Healthcare
        );
        assert_eq!(
            ThesisProfile::from_thesis("Regional lending margins widen").sector,
            Sector::Financial
        );
        assert_eq!(
            ThesisProfile::from_thesis("Solar installations keep rising").sector,
            Sector::Energy
        );
        assert_eq!(
            ThesisProfile::from_thesis("Retail foot traffic improves").sector,
            Sector::Consumer
        );
        assert_eq!(
            ThesisProfile::from_thesis("Something unspecific").sector,
            Sector::Technology
        );
    }

    #[test]
    fn test_generic_tech_words_do_not_claim_other_sectors() {
        assert_eq!(
            ThesisProfile::from_thesis("Positive clinical data readout expected in Q3").sector,
            Sector::Healthcare
        );
        assert_eq!(
            ThesisProfile::from_thesis("Digital payments volume keeps compounding").sector,
            Sector::Financial
        );
        assert_eq!(
            ThesisProfile::from_thesis("Hotel bookings shift to digital channels").sector,
            Sector::Travel
        );
        assert_eq!(
            ThesisProfile::from_thesis("Data center buildout drives GPU demand").sector,
            Sector::Technology
        );
        assert_eq!(
            ThesisProfile::from_thesis("Digital transformation spending rises").sector,
            Sector::Technology
        );
    }

    #[test]
    fn test_company_from_claim_verb() {
        let profile = ThesisProfile::from_thesis("Costco Wholesale continues to take share");
        assert_eq!(profile.primary_company, "Costco Wholesale");

        let profile = ThesisProfile::from_thesis("The Acme is cheap");
        assert_eq!(profile.primary_company, "Acme");

        let profile = ThesisProfile::from_thesis("margins will expand");
        assert_eq!(profile.primary_company, DEFAULT_COMPANY);
    }

    #[test]
    fn test_growth_orientation() {
        let profile = ThesisProfile::from_thesis(
            "Revenue growth will accelerate as the platform continues to scale",
        );
        assert!(profile.growth_oriented);
    }
}

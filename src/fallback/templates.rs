//! Sector and mental-model templates for the core-claim fallback.

use super::profile::{Sector, ThesisProfile};
use crate::analysis::{CausalLink, CoreAnalysis, CounterThesisScenario, MentalModel};

struct ScenarioTemplate {
    scenario: &'static str,
    description: &'static str,
    triggers: &'static [&'static str],
    signals: &'static [&'static str],
}

struct SectorTemplate {
    chain: [(&'static str, &'static str); 3],
    assumptions: [&'static str; 4],
    scenarios: [ScenarioTemplate; 2],
}

fn sector_template(sector: Sector) -> SectorTemplate {
    match sector {
        Sector::Technology => SectorTemplate {
            chain: [
                ("Market demand accelerates", "Growing adoption drives revenue expansion"),
                ("Operational scaling", "Higher volumes improve efficiency and margins"),
                ("Market position strengthens", "Scale advantages sustain growth and pricing"),
            ],
            assumptions: [
                "Market demand continues to grow at the current pace",
                "Competitive dynamics remain favorable",
                "Technology adoption accelerates across industries",
                "Regulatory environment stays supportive",
            ],
            scenarios: [
                ScenarioTemplate {
                    scenario: "Market Saturation",
                    description: "Adoption slows as the market reaches maturity",
                    triggers: &["Declining growth rates", "Increased competition"],
                    signals: &["Revenue deceleration", "Market share loss"],
                },
                ScenarioTemplate {
                    scenario: "Regulatory Pressure",
                    description: "Government intervention limits the business model",
                    triggers: &["New regulations", "Antitrust action"],
                    signals: &["Policy announcements", "Legal proceedings"],
                },
            ],
        },
        Sector::Healthcare => SectorTemplate {
            chain: [
                ("Regulatory approval", "Product validation enables market access"),
                ("Market penetration", "Clinical adoption drives revenue growth"),
                ("Pipeline expansion", "R&D success sustains long-term growth"),
            ],
            assumptions: [
                "Regulatory approval timeline proceeds as expected",
                "Clinical trial results demonstrate efficacy",
                "Healthcare spending maintains its growth trajectory",
                "Reimbursement policies remain stable",
            ],
            scenarios: [
                ScenarioTemplate {
                    scenario: "Regulatory Rejection",
                    description: "A key product fails to receive approval",
                    triggers: &["Safety concerns", "Efficacy questions"],
                    signals: &["FDA communications", "Clinical trial results"],
                },
                ScenarioTemplate {
                    scenario: "Pricing Reform",
                    description: "Drug pricing legislation compresses margins",
                    triggers: &["Price negotiation mandates", "Reimbursement cuts"],
                    signals: &["Legislative calendar", "Payer coverage decisions"],
                },
            ],
        },
        Sector::Financial => SectorTemplate {
            chain: [
                ("Credit environment normalizes", "Lending conditions support loan growth"),
                ("Digital transformation", "Technology adoption improves efficiency"),
                ("Market share expansion", "Competitive positioning drives profitability"),
            ],
            assumptions: [
                "Interest rate environment stabilizes",
                "Credit quality metrics stay within acceptable ranges",
                "Regulatory capital requirements stay manageable",
                "Economic growth supports lending demand",
            ],
            scenarios: [
                ScenarioTemplate {
                    scenario: "Credit Deterioration",
                    description: "Rising defaults erode earnings and capital",
                    triggers: &["Delinquencies rising", "Reserve builds"],
                    signals: &["Net charge-off rate", "Provision expense"],
                },
                ScenarioTemplate {
                    scenario: "Margin Compression",
                    description: "Rate moves squeeze net interest margin",
                    triggers: &["Yield curve inversion", "Deposit cost spikes"],
                    signals: &["Net interest margin", "Deposit beta"],
                },
            ],
        },
        Sector::Energy => SectorTemplate {
            chain: [
                ("Demand outpaces supply", "Tight markets lift realized prices"),
                ("Capacity investment", "Higher prices fund production growth"),
                ("Cash flow expansion", "Operating leverage lifts free cash flow"),
            ],
            assumptions: [
                "Commodity prices stay above breakeven levels",
                "Production ramps on schedule",
                "Policy support for the energy mix remains in place",
                "Input costs remain contained",
            ],
            scenarios: [
                ScenarioTemplate {
                    scenario: "Price Collapse",
                    description: "Oversupply drives prices below breakeven",
                    triggers: &["Inventory builds", "Demand shock"],
                    signals: &["Inventory levels", "Spot prices"],
                },
                ScenarioTemplate {
                    scenario: "Policy Reversal",
                    description: "Subsidies or mandates are withdrawn",
                    triggers: &["Election outcomes", "Budget cuts"],
                    signals: &["Policy announcements", "Permit approvals"],
                },
            ],
        },
        Sector::Consumer => SectorTemplate {
            chain: [
                ("Consumer demand strengthens", "Spending power lifts unit volumes"),
                ("Brand and channel leverage", "Pricing and distribution widen margins"),
                ("Share gains compound", "Scale funds marketing and loyalty"),
            ],
            assumptions: [
                "Consumer spending remains resilient",
                "Brand pricing power holds",
                "Channel inventory stays healthy",
                "Input and freight costs remain stable",
            ],
            scenarios: [
                ScenarioTemplate {
                    scenario: "Spending Slowdown",
                    description: "Household budgets tighten and volumes fall",
                    triggers: &["Real wage declines", "Rising unemployment"],
                    signals: &["Retail sales", "Consumer confidence"],
                },
                ScenarioTemplate {
                    scenario: "Private Label Substitution",
                    description: "Shoppers trade down to cheaper alternatives",
                    triggers: &["Promotional intensity", "Price gaps widen"],
                    signals: &["Market share data", "Promotion frequency"],
                },
            ],
        },
        Sector::Travel => SectorTemplate {
            chain: [
                ("Travel demand recovers", "Passenger volumes return toward capacity"),
                ("Pricing power improves", "High load factors lift yields"),
                ("Margin expansion", "Fixed cost absorption boosts profitability"),
            ],
            assumptions: [
                "Leisure and business travel demand stays strong",
                "Capacity additions remain disciplined",
                "Fuel costs remain manageable",
                "No major disruption to travel patterns",
            ],
            scenarios: [
                ScenarioTemplate {
                    scenario: "Demand Shock",
                    description: "A macro or health event halts travel",
                    triggers: &["Travel restrictions", "Recession"],
                    signals: &["Passenger throughput", "Booking cancellations"],
                },
                ScenarioTemplate {
                    scenario: "Capacity Glut",
                    description: "Industry overbuilds capacity and fares fall",
                    triggers: &["Aircraft deliveries surge", "New entrants"],
                    signals: &["Seat capacity", "Average fares"],
                },
            ],
        },
    }
}

fn model_scenario(model: MentalModel) -> ScenarioTemplate {
    match model {
        MentalModel::Disruption => ScenarioTemplate {
            scenario: "Technology Leapfrog",
            description: "A competing approach makes the current advantage obsolete",
            triggers: &["Competitor breakthroughs", "Customer migration"],
            signals: &["Design win announcements", "Patent filings"],
        },
        MentalModel::Value => ScenarioTemplate {
            scenario: "Value Trap",
            description: "The discount persists because fundamentals keep eroding",
            triggers: &["Earnings downgrades", "No catalyst materializes"],
            signals: &["Estimate revisions", "Free cash flow trend"],
        },
        MentalModel::Cyclical => ScenarioTemplate {
            scenario: "Prolonged Downturn",
            description: "The cycle bottoms later and deeper than expected",
            triggers: &["Leading indicators keep falling", "Inventory overhang"],
            signals: &["New orders", "Inventory to sales ratio"],
        },
        MentalModel::Quality => ScenarioTemplate {
            scenario: "Moat Erosion",
            description: "Returns on capital fall as competitors close the gap",
            triggers: &["Pricing concessions", "Customer churn"],
            signals: &["Gross margin", "Retention rate"],
        },
        MentalModel::Growth => ScenarioTemplate {
            scenario: "Growth Slowdown",
            description: "Growth decelerates and the valuation multiple compresses",
            triggers: &["Revenue growth below 10%", "Guidance cuts"],
            signals: &["Quarterly revenue", "Forward guidance"],
        },
    }
}

impl From<ScenarioTemplate> for CounterThesisScenario {
    fn from(t: ScenarioTemplate) -> Self {
        Self {
            scenario: t.scenario.to_string(),
            description: t.description.to_string(),
            trigger_conditions: t.triggers.iter().map(|s| s.to_string()).collect(),
            data_signals: t.signals.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn core_claim(profile: &ThesisProfile) -> String {
    let company = &profile.primary_company;
    let sector = profile.sector;
    match profile.mental_model {
        MentalModel::Disruption => format!(
            "{} is positioned to capture outsized share of a structural shift in the {} sector.",
            company, sector
        ),
        MentalModel::Value => format!(
            "{} trades below intrinsic value in the {} sector and should re-rate as fundamentals are recognized.",
            company, sector
        ),
        MentalModel::Cyclical => format!(
            "{} is set to benefit from a cyclical recovery in the {} sector.",
            company, sector
        ),
        MentalModel::Quality => format!(
            "{} compounds durable competitive advantages in the {} sector.",
            company, sector
        ),
        MentalModel::Growth => format!(
            "{} represents a compelling growth opportunity in the {} sector.",
            company, sector
        ),
    }
}

fn core_analysis(profile: &ThesisProfile) -> String {
    if profile.growth_oriented {
        format!(
            "High-conviction growth thesis in the {} sector with upside from market expansion and operating leverage. \
             Key risks are execution, competitive pressure and valuation. \
             The return profile favors long-term investors with disciplined position sizing.",
            profile.sector
        )
    } else {
        format!(
            "{} thesis in the {} sector with upside tied to the causal chain below. \
             Sector-specific risks and macroeconomic sensitivity bound the downside case. \
             Conviction should follow the assumption tests in the monitoring plan.",
            profile.mental_model, profile.sector
        )
    }
}

/// Build a complete core analysis from templates.
pub(crate) fn core_analysis_for(profile: &ThesisProfile) -> CoreAnalysis {
    let template = sector_template(profile.sector);
    let [first, second] = template.scenarios;

    CoreAnalysis {
        core_claim: core_claim(profile),
        core_analysis: core_analysis(profile),
        mental_model: profile.mental_model,
        assumptions: template.assumptions.iter().map(|s| s.to_string()).collect(),
        causal_chain: template
            .chain
            .iter()
            .enumerate()
            .map(|(i, (event, explanation))| CausalLink::new(i as u32 + 1, *event, *explanation))
            .collect(),
        counter_thesis_scenarios: vec![
            first.into(),
            second.into(),
            model_scenario(profile.mental_model).into(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_sector_and_model_yields_valid_core() {
        for sector in Sector::ALL {
            for model in [
                MentalModel::Growth,
                MentalModel::Value,
                MentalModel::Cyclical,
                MentalModel::Disruption,
                MentalModel::Quality,
            ] {
                let profile = ThesisProfile {
                    sector,
                    primary_company: "Acme".to_string(),
                    mental_model: model,
                    growth_oriented: false,
                };
                let core = core_analysis_for(&profile);
                assert!(core.validate().is_ok(), "{} / {}", sector, model);
                assert_eq!(core.causal_chain.len(), 3);
                assert_eq!(core.assumptions.len(), 4);
                assert_eq!(core.counter_thesis_scenarios.len(), 3);
                assert!(core.core_claim.starts_with("Acme"));
                assert_eq!(core.mental_model, model);
            }
        }
    }

    #[test]
    fn test_growth_orientation_changes_analysis() {
        let mut profile = ThesisProfile::from_thesis("Acme will grow");
        profile.growth_oriented = true;
        assert!(core_analysis_for(&profile)
            .core_analysis
            .starts_with("High-conviction growth"));
    }
}

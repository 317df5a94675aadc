//! Cost optimizer (4.8.1): maps a request's complexity score to a tier under
//! a configurable strategy, trading cost against accuracy.

use connector_core::{Strategy, SubscriptionTier, Tier, UserContext};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::keywords::{STRONG_BUSINESS_KEYWORDS, STRONG_PERSONAL_KEYWORDS};

/// Ordinal rank used to take the min/max of two tiers. `Tier` itself stays a
/// plain enum (no `Ord`) because nothing outside this strategy mapping needs
/// to compare tiers; the reference implementation instead compared its
/// str-subclass enum members lexicographically, which is accidental rather
/// than intentional (see DESIGN.md).
fn rank(tier: Tier) -> u8 {
    match tier {
        Tier::Rule => 0,
        Tier::Lite => 1,
        Tier::Premium => 2,
        Tier::Advanced => 3,
    }
}

fn cheaper(a: Tier, b: Tier) -> Tier {
    if rank(a) <= rank(b) {
        a
    } else {
        b
    }
}

fn pricier(a: Tier, b: Tier) -> Tier {
    if rank(a) >= rank(b) {
        a
    } else {
        b
    }
}

/// NGN cost of running one classification at a given tier.
pub fn tier_cost_ngn(tier: Tier) -> Decimal {
    match tier {
        Tier::Rule => dec!(0.0),
        Tier::Lite => dec!(0.8),
        Tier::Premium => dec!(3.2),
        Tier::Advanced => dec!(48.0),
    }
}

/// Expected confidence and processing time for a tier, used for comparison
/// and cost-projection reporting rather than the tier-selection decision
/// itself.
pub fn tier_expected_confidence(tier: Tier) -> f64 {
    match tier {
        Tier::Rule => 0.75,
        Tier::Lite => 0.85,
        Tier::Premium => 0.92,
        Tier::Advanced => 0.95,
    }
}

pub fn tier_expected_processing_ms(tier: Tier) -> u64 {
    match tier {
        Tier::Rule => 50,
        Tier::Lite => 1500,
        Tier::Premium => 2000,
        Tier::Advanced => 3000,
    }
}

/// Inputs to the complexity score that don't live on `ClassificationRequest`
/// directly, kept narrow so callers don't have to construct a full request
/// just to price a hypothetical transaction.
pub struct ComplexityInputs<'a> {
    pub narration: &'a str,
    pub amount_ngn: f64,
    pub time_known: bool,
    pub industry: &'a str,
    pub previous_classification_count: u32,
}

/// Complexity score in `[0, 1]` (4.8.1): additive weighted factors,
/// normalized via `clamp(score + 0.5, 0, 1)`.
pub fn complexity_score(inputs: &ComplexityInputs) -> f64 {
    let narration = inputs.narration.to_lowercase();
    let mut score = 0.0;

    if STRONG_PERSONAL_KEYWORDS.iter().any(|k| narration.contains(k)) {
        score -= 0.3;
    }
    if STRONG_BUSINESS_KEYWORDS.iter().any(|k| narration.contains(k)) {
        score += 0.2;
    }
    if narration.split_whitespace().count() <= 3 {
        score += 0.3;
    }
    if inputs.amount_ngn > 1_000_000.0 {
        score += 0.2;
    } else if inputs.amount_ngn < 5_000.0 {
        score += 0.1;
    }
    if inputs.previous_classification_count < 10 {
        score += 0.2;
    }
    if inputs.industry.eq_ignore_ascii_case("general") {
        score += 0.1;
    }
    if !inputs.time_known {
        score += 0.1;
    }

    (score + 0.5).clamp(0.0, 1.0)
}

/// Maps complexity score to tier under a strategy, capped by the user's
/// subscription ceiling where the strategy says so.
pub struct CostOptimizer {
    pub strategy: Strategy,
}

impl CostOptimizer {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }

    pub fn select_tier(&self, complexity: f64, user_context: &UserContext) -> Tier {
        let ceiling = user_context.subscription_tier.ceiling();
        match self.strategy {
            Strategy::Aggressive => {
                if complexity < 0.3 {
                    Tier::Rule
                } else if complexity < 0.7 {
                    Tier::Lite
                } else {
                    Tier::Premium
                }
            }
            Strategy::Balanced => {
                if complexity < 0.2 {
                    Tier::Rule
                } else if complexity < 0.5 {
                    cheaper(Tier::Lite, ceiling)
                } else if complexity < 0.8 {
                    cheaper(Tier::Premium, ceiling)
                } else {
                    ceiling
                }
            }
            Strategy::AccuracyFirst => {
                if complexity < 0.1 {
                    Tier::Rule
                } else if complexity < 0.3 {
                    Tier::Lite
                } else if complexity < 0.6 {
                    Tier::Premium
                } else {
                    Tier::Advanced
                }
            }
            Strategy::Enterprise => {
                if complexity < 0.1 && user_context.trust_level > 0.9 {
                    Tier::Rule
                } else {
                    pricier(Tier::Premium, ceiling)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_core::{BusinessContext, PrivacyLevel};

    fn user(subscription_tier: SubscriptionTier, trust_level: f64) -> UserContext {
        UserContext {
            user_id: "u1".into(),
            org_id: "o1".into(),
            subscription_tier,
            business_context: BusinessContext::default(),
            trust_level,
            repeat_sender_business_ratio: None,
        }
    }

    #[test]
    fn complexity_favors_short_ambiguous_narrations() {
        let inputs = ComplexityInputs {
            narration: "transfer",
            amount_ngn: 50_000.0,
            time_known: true,
            industry: "trading",
            previous_classification_count: 100,
        };
        let score = complexity_score(&inputs);
        assert!(score > 0.5, "short narration should push complexity up: {score}");
    }

    #[test]
    fn complexity_lowered_by_strong_personal_keyword() {
        let inputs = ComplexityInputs {
            narration: "salary payment for january",
            amount_ngn: 250_000.0,
            time_known: true,
            industry: "general",
            previous_classification_count: 50,
        };
        let score = complexity_score(&inputs);
        assert!(score < 0.6);
    }

    #[test]
    fn balanced_strategy_caps_at_subscription_ceiling() {
        let optimizer = CostOptimizer::new(Strategy::Balanced);
        let starter = user(SubscriptionTier::Starter, 0.5);
        // complexity high enough to want Premium, but Starter ceilings at Rule
        assert_eq!(optimizer.select_tier(0.9, &starter), Tier::Rule);

        let scale = user(SubscriptionTier::Scale, 0.5);
        assert_eq!(optimizer.select_tier(0.9, &scale), Tier::Advanced);
    }

    #[test]
    fn balanced_strategy_matches_published_thresholds() {
        let optimizer = CostOptimizer::new(Strategy::Balanced);
        let enterprise = user(SubscriptionTier::Enterprise, 0.5);
        assert_eq!(optimizer.select_tier(0.1, &enterprise), Tier::Rule);
        assert_eq!(optimizer.select_tier(0.4, &enterprise), Tier::Lite);
        assert_eq!(optimizer.select_tier(0.7, &enterprise), Tier::Premium);
    }
}

//! Nigerian rule-based fallback (4.8.2): three weighted pattern families
//! (narration keywords, amount, time/location/repeat-sender) combine into a
//! business-probability score with no external call.

use chrono::{Datelike, Timelike};
use connector_core::{BusinessIncome, ClassificationMetadata, ClassificationRequest, ClassificationResult, TaxCategory};

use crate::keywords::{
    BUSINESS_DISTRICTS, INDUSTRIAL_AREAS, MAJOR_MARKETS, MODERATE_BUSINESS_KEYWORDS, MODERATE_PERSONAL_KEYWORDS,
    STRONG_BUSINESS_KEYWORDS, STRONG_PERSONAL_KEYWORDS, WEAK_BUSINESS_KEYWORDS,
};

pub const HUMAN_REVIEW_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone)]
struct PatternMatch {
    label: String,
    confidence: f64,
    weight: f64,
    is_location: bool,
    is_business_keyword: bool,
}

fn narration_patterns(narration: &str) -> Vec<PatternMatch> {
    let lower = narration.to_lowercase();
    let mut matches = Vec::new();

    let business_tiers: [(&[&str], f64, f64); 3] =
        [(STRONG_BUSINESS_KEYWORDS, 0.8, 0.9), (MODERATE_BUSINESS_KEYWORDS, 0.5, 0.7), (WEAK_BUSINESS_KEYWORDS, 0.2, 0.4)];
    for (keywords, weight, confidence) in business_tiers {
        for keyword in keywords {
            if lower.contains(keyword) {
                matches.push(PatternMatch {
                    label: keyword.to_string(),
                    confidence,
                    weight,
                    is_location: false,
                    is_business_keyword: true,
                });
            }
        }
    }

    let personal_tiers: [(&[&str], f64, f64); 2] =
        [(STRONG_PERSONAL_KEYWORDS, 0.9, 0.95), (MODERATE_PERSONAL_KEYWORDS, 0.6, 0.8)];
    for (keywords, weight, confidence) in personal_tiers {
        for keyword in keywords {
            if lower.contains(keyword) {
                matches.push(PatternMatch {
                    label: keyword.to_string(),
                    confidence,
                    weight: -weight,
                    is_location: false,
                    is_business_keyword: false,
                });
            }
        }
    }

    matches
}

fn amount_patterns(amount_ngn: f64) -> Vec<PatternMatch> {
    let mut matches = Vec::new();

    for divisor in [1000.0, 5000.0, 10000.0, 50000.0, 100000.0] {
        if amount_ngn >= divisor && amount_ngn % divisor == 0.0 {
            matches.push(PatternMatch {
                label: format!("round amount divisible by {divisor:.0}"),
                confidence: 0.3,
                weight: 0.2,
                is_location: false,
                is_business_keyword: false,
            });
            break;
        }
    }

    let ranges: [(f64, f64, &str, f64); 5] = [
        (500.0, 2000.0, "small_retail", 0.2),
        (2000.0, 10000.0, "medium_retail", 0.4),
        (10000.0, 100000.0, "business_service", 0.6),
        (100000.0, 1000000.0, "major_business", 0.8),
        (1000000.0, f64::INFINITY, "enterprise", 0.9),
    ];
    for (min, max, category, probability) in ranges {
        if amount_ngn >= min && amount_ngn < max {
            matches.push(PatternMatch {
                label: category.to_string(),
                confidence: probability,
                weight: probability * 0.3,
                is_location: false,
                is_business_keyword: false,
            });
            break;
        }
    }

    matches
}

/// `time_known = false` (no reliable time-of-day) skips this family
/// entirely, matching the source's "no transaction_time" early return.
fn time_patterns(time_known: bool, timestamp: chrono::DateTime<chrono::Utc>) -> Vec<PatternMatch> {
    if !time_known {
        return Vec::new();
    }

    let hour = timestamp.hour();
    let weekday = timestamp.weekday().num_days_from_monday(); // 0 = Monday

    let mut matches = Vec::new();
    match weekday {
        0..=4 => {
            if (8..=18).contains(&hour) {
                matches.push(PatternMatch {
                    label: format!("{hour}:00 on weekday"),
                    confidence: 0.7,
                    weight: 0.3,
                    is_location: false,
                    is_business_keyword: false,
                });
            }
        }
        5 => {
            if (9..=16).contains(&hour) {
                matches.push(PatternMatch {
                    label: format!("{hour}:00 on Saturday"),
                    confidence: 0.5,
                    weight: 0.3 * 0.7,
                    is_location: false,
                    is_business_keyword: false,
                });
            }
        }
        _ => {
            if (10..=14).contains(&hour) {
                matches.push(PatternMatch {
                    label: format!("{hour}:00 on Sunday"),
                    confidence: 0.3,
                    weight: 0.1,
                    is_location: false,
                    is_business_keyword: false,
                });
            }
        }
    }

    // Night/early-morning weighting the source defines but never wires up;
    // we apply it only when no business-hours window already matched, so
    // off-hours isn't double-penalizing an hour that's also a business window.
    if matches.is_empty() && (hour >= 22 || hour < 8) {
        matches.push(PatternMatch {
            label: format!("{hour}:00 off hours"),
            confidence: 0.6,
            weight: -0.2,
            is_location: false,
            is_business_keyword: false,
        });
    }

    matches
}

fn location_patterns(narration: &str) -> Vec<PatternMatch> {
    let lower = narration.to_lowercase();
    let mut matches = Vec::new();

    let tables: [(&[&str], f64, f64); 3] =
        [(MAJOR_MARKETS, 0.85, 0.6), (BUSINESS_DISTRICTS, 0.7, 0.4), (INDUSTRIAL_AREAS, 0.9, 0.7)];
    for (locations, confidence, weight) in tables {
        for location in locations {
            if lower.contains(location) {
                matches.push(PatternMatch {
                    label: location.to_string(),
                    confidence,
                    weight,
                    is_location: true,
                    is_business_keyword: false,
                });
            }
        }
    }

    matches
}

fn repeat_sender_pattern(sender_name: Option<&str>, repeat_ratio: Option<f64>) -> Vec<PatternMatch> {
    match (sender_name, repeat_ratio) {
        (Some(name), Some(ratio)) => vec![PatternMatch {
            label: name.to_string(),
            confidence: ratio,
            weight: 0.5 * ratio,
            is_location: false,
            is_business_keyword: false,
        }],
        _ => Vec::new(),
    }
}

/// `clamp((Σ w·c)/Σ|w|, -1, 1)` remapped to `[0, 1]`.
fn business_score(matches: &[PatternMatch]) -> f64 {
    if matches.is_empty() {
        return 0.5;
    }
    let weighted_sum: f64 = matches.iter().map(|m| m.weight * m.confidence).sum();
    let total_weight: f64 = matches.iter().map(|m| m.weight.abs()).sum();
    if total_weight == 0.0 {
        return 0.5;
    }
    let raw = (weighted_sum / total_weight).clamp(-1.0, 1.0);
    ((raw + 1.0) / 2.0).clamp(0.0, 1.0)
}

fn confidence(score: f64, matches: &[PatternMatch]) -> f64 {
    let base = if score > 0.8 || score < 0.2 {
        0.8
    } else if (0.4..=0.6).contains(&score) {
        0.4
    } else {
        0.6
    };

    if matches.is_empty() {
        return (base * 0.5).clamp(0.1, 0.9);
    }
    let strong = matches.iter().filter(|m| m.confidence > 0.8).count();
    let pattern_strength = strong as f64 / matches.len() as f64;
    (base + pattern_strength * 0.2).clamp(0.1, 0.9)
}

fn risk_factors(matches: &[PatternMatch]) -> Vec<String> {
    let mut risks: Vec<String> = matches
        .iter()
        .filter(|m| m.weight < 0.0 && m.confidence > 0.6)
        .map(|m| format!("Personal indicator: {}", m.label))
        .collect();

    if matches.len() < 2 {
        risks.push("Limited pattern information available".to_string());
    }
    let avg_confidence = matches.iter().map(|m| m.confidence).sum::<f64>() / matches.len().max(1) as f64;
    if avg_confidence < 0.6 {
        risks.push("Low overall pattern confidence".to_string());
    }
    risks
}

fn detected_patterns(matches: &[PatternMatch]) -> Vec<String> {
    matches
        .iter()
        .filter(|m| m.is_location || (m.is_business_keyword && m.weight > 0.0))
        .map(|m| if m.is_location { format!("Location: {}", m.label) } else { format!("Business keyword: {}", m.label) })
        .collect()
}

/// Runs the full rule-based classification with no external call.
pub fn classify(request: &ClassificationRequest) -> ClassificationResult {
    let amount_ngn: f64 = request.transaction.amount.try_into().unwrap_or(0.0);

    let mut matches = Vec::new();
    matches.extend(narration_patterns(&request.transaction.narration));
    matches.extend(amount_patterns(amount_ngn));
    matches.extend(time_patterns(request.time_known, request.transaction.timestamp));
    matches.extend(location_patterns(&request.transaction.narration));
    matches.extend(repeat_sender_pattern(
        request.sender_name.as_deref(),
        request.user_context.repeat_sender_business_ratio,
    ));

    let score = business_score(&matches);
    let is_business = score > 0.5;
    let conf = confidence(score, &matches);
    let requires_review = conf < HUMAN_REVIEW_THRESHOLD;

    let mut reasoning_parts = Vec::new();
    let business_labels: Vec<&str> = matches.iter().filter(|m| m.weight > 0.0).map(|m| m.label.as_str()).collect();
    if !business_labels.is_empty() {
        reasoning_parts.push(format!("Business indicators: {}", business_labels.join(", ")));
    }
    let personal_labels: Vec<&str> = matches.iter().filter(|m| m.weight < 0.0).map(|m| m.label.as_str()).collect();
    if !personal_labels.is_empty() {
        reasoning_parts.push(format!("Personal indicators: {}", personal_labels.join(", ")));
    }
    reasoning_parts.push(format!("Overall business probability: {score:.2}"));

    ClassificationResult {
        is_business_income: if is_business { BusinessIncome::Yes } else { BusinessIncome::No },
        confidence: conf,
        reasoning: reasoning_parts.join("; "),
        tax_category: if is_business { TaxCategory::StandardRate } else { TaxCategory::Unknown },
        extracted_customer_name: None,
        suggested_invoice_description: None,
        requires_review,
        metadata: ClassificationMetadata {
            method: "rule_based_nigerian".to_string(),
            detected_nigerian_patterns: detected_patterns(&matches),
            pattern_match_strength: score,
            fallback_used: false,
            ..ClassificationMetadata::default()
        },
    }
}

/// Risk factors surfaced alongside a rule-based result, kept separate from
/// `ClassificationResult` (which has no field for them) so the caller can
/// fold them into whatever outer envelope it uses.
pub fn classify_with_risk_factors(request: &ClassificationRequest) -> (ClassificationResult, Vec<String>) {
    let amount_ngn: f64 = request.transaction.amount.try_into().unwrap_or(0.0);
    let mut matches = Vec::new();
    matches.extend(narration_patterns(&request.transaction.narration));
    matches.extend(amount_patterns(amount_ngn));
    matches.extend(time_patterns(request.time_known, request.transaction.timestamp));
    matches.extend(location_patterns(&request.transaction.narration));
    matches.extend(repeat_sender_pattern(
        request.sender_name.as_deref(),
        request.user_context.repeat_sender_business_ratio,
    ));
    let result = classify(request);
    (result, risk_factors(&matches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use connector_core::{BusinessContext, PrivacyLevel, SubscriptionTier, Transaction, TransactionType, UserContext};

    fn request(narration: &str, amount: &str, timestamp: chrono::DateTime<Utc>) -> ClassificationRequest {
        ClassificationRequest {
            request_id: "r1".into(),
            transaction: Transaction::new("t1", TransactionType::Credit, amount.parse().unwrap(), "NGN", narration, timestamp),
            user_context: UserContext {
                user_id: "u1".into(),
                org_id: "o1".into(),
                subscription_tier: SubscriptionTier::Professional,
                business_context: BusinessContext::default(),
                trust_level: 0.5,
                repeat_sender_business_ratio: None,
            },
            privacy_level: PrivacyLevel::Standard,
            forced_tier: None,
            time_known: true,
            sender_name: None,
        }
    }

    #[test]
    fn salary_narration_scores_as_personal() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(); // Monday
        let req = request("Salary payment - January 2024", "250000", ts);
        let (result, _) = classify_with_risk_factors(&req);
        assert_eq!(result.is_business_income, BusinessIncome::No);
        assert!(result.confidence > 0.4, "confidence was {}", result.confidence);
    }

    #[test]
    fn invoice_narration_in_business_district_scores_business() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 14, 11, 0, 0).unwrap(); // Thursday
        let req = request("Invoice payment for goods supplied, Computer Village", "85000", ts);
        let (result, _) = classify_with_risk_factors(&req);
        assert_eq!(result.is_business_income, BusinessIncome::Yes);
        assert!(result.metadata.detected_nigerian_patterns.iter().any(|p| p.contains("computer village")));
    }

    #[test]
    fn off_hours_transaction_pulls_score_down() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 14, 2, 0, 0).unwrap();
        let req = request("transfer", "5000", ts);
        let only_time = time_patterns(true, ts);
        assert_eq!(only_time.len(), 1);
        assert!(only_time[0].weight < 0.0);
        let _ = req;
    }

    #[test]
    fn missing_time_skips_time_family() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 14, 10, 0, 0).unwrap();
        assert!(time_patterns(false, ts).is_empty());
    }
}

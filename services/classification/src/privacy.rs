//! Privacy protection (4.8.4): narration anonymization, amount/time
//! generalization, and PII detection for data sent to an external LLM.
//!
//! Buckets here are this module's own (privacy-preserving generalization),
//! distinct from `cache.rs`'s buckets (cache-key determinism).

use chrono::{DateTime, Datelike, Timelike, Utc};
use connector_core::PrivacyLevel;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\+234|0)[7-9][0-1]\d{8}\b|\b[0-9]{11}\b").unwrap());
static ACCOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{10,12}\b").unwrap());
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}").unwrap());
static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(Mr|Mrs|Miss|Dr|Chief|Alhaji|Alhaja|Engr)\.?\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?\b|\b[A-Z][a-z]+\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?\b").unwrap());
static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d+\s+[A-Za-z\s]+\s(Street|Road|Avenue|Close|Crescent|Way)\b|\b(Lagos|Abuja|Port Harcourt|Kano|Ibadan|Kaduna|Enugu|Onitsha)\b").unwrap()
});
static LONG_DIGIT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{6,}").unwrap());

const BUSINESS_TERM_WHITELIST: &[&str] = &["payment", "transfer", "invoice", "goods", "services", "business"];

fn categorize_amount(amount_ngn: f64) -> &'static str {
    if amount_ngn < 1_000.0 {
        "very_small"
    } else if amount_ngn < 10_000.0 {
        "small"
    } else if amount_ngn < 100_000.0 {
        "medium"
    } else if amount_ngn < 1_000_000.0 {
        "large"
    } else {
        "very_large"
    }
}

fn round_amount(amount_ngn: f64, level: PrivacyLevel) -> f64 {
    let nearest = match level {
        PrivacyLevel::Standard => 1_000.0,
        PrivacyLevel::High => 5_000.0,
        PrivacyLevel::Maximum => 10_000.0,
    };
    (amount_ngn / nearest).round() * nearest
}

fn categorize_time(hour: u32) -> &'static str {
    match hour {
        6..=11 => "morning",
        12..=17 => "afternoon",
        18..=21 => "evening",
        _ => "night",
    }
}

fn day_of_week(timestamp: DateTime<Utc>) -> &'static str {
    match timestamp.weekday() {
        chrono::Weekday::Mon => "monday",
        chrono::Weekday::Tue => "tuesday",
        chrono::Weekday::Wed => "wednesday",
        chrono::Weekday::Thu => "thursday",
        chrono::Weekday::Fri => "friday",
        chrono::Weekday::Sat => "saturday",
        chrono::Weekday::Sun => "sunday",
    }
}

const TIER1_BANKS: &[&str] = &["gtbank", "access", "zenith", "first bank", "uba", "fidelity"];
const TIER2_BANKS: &[&str] = &["stanbic", "sterling", "fcmb", "union", "wema"];
const DIGITAL_BANKS: &[&str] = &["kuda", "carbon", "cowrywise", "piggyvest"];

fn categorize_bank(bank_name: &str) -> &'static str {
    let lower = bank_name.to_lowercase();
    if TIER1_BANKS.iter().any(|b| lower.contains(b)) {
        "tier1"
    } else if TIER2_BANKS.iter().any(|b| lower.contains(b)) {
        "tier2"
    } else if DIGITAL_BANKS.iter().any(|b| lower.contains(b)) {
        "digital"
    } else {
        "tier3"
    }
}

/// Redacts phone/account/email always; names/addresses at High and Maximum;
/// any remaining long digit run and any non-whitelisted word at Maximum.
fn anonymize_narration(narration: &str, level: PrivacyLevel) -> String {
    let mut text = PHONE_RE.replace_all(narration, "[PHONE]").into_owned();
    text = ACCOUNT_RE.replace_all(&text, "[ACCOUNT]").into_owned();
    text = EMAIL_RE.replace_all(&text, "[EMAIL]").into_owned();

    if matches!(level, PrivacyLevel::High | PrivacyLevel::Maximum) {
        text = NAME_RE.replace_all(&text, "[NAME]").into_owned();
        text = ADDRESS_RE.replace_all(&text, "[ADDRESS]").into_owned();
    }

    if level == PrivacyLevel::Maximum {
        text = LONG_DIGIT_RUN_RE.replace_all(&text, "[IDENTIFIER]").into_owned();
        text = text
            .split_whitespace()
            .map(|word| {
                let bracketed = word.starts_with('[') && word.ends_with(']');
                let lower = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
                if !bracketed && word.len() > 3 && !BUSINESS_TERM_WHITELIST.contains(&lower.as_str()) {
                    "[TERM]".to_string()
                } else {
                    word.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
    }

    text
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiiType {
    Phone,
    Account,
    Email,
    Name,
}

#[derive(Debug, Clone)]
pub struct PiiFinding {
    pub pii_type: PiiType,
    pub matched_text: String,
    pub confidence: f64,
}

fn pii_confidence(pii_type: PiiType, matched: &str) -> f64 {
    match pii_type {
        PiiType::Phone => {
            if matched.starts_with("+234") || matched.starts_with('0') {
                0.95
            } else if matched.len() == 11 {
                0.85
            } else {
                0.70
            }
        }
        PiiType::Account => {
            if (10..=12).contains(&matched.chars().filter(|c| c.is_ascii_digit()).count()) {
                0.80
            } else {
                0.60
            }
        }
        PiiType::Email => 0.95,
        PiiType::Name => {
            if matched.split_whitespace().next().is_some_and(|w| w.ends_with('.') || w.chars().next().is_some_and(|c| c.is_uppercase()) && w.len() <= 6) {
                0.90
            } else {
                0.70
            }
        }
    }
}

pub fn detect_pii(text: &str) -> Vec<PiiFinding> {
    let mut findings = Vec::new();
    for m in PHONE_RE.find_iter(text) {
        findings.push(PiiFinding { pii_type: PiiType::Phone, matched_text: m.as_str().to_string(), confidence: pii_confidence(PiiType::Phone, m.as_str()) });
    }
    for m in ACCOUNT_RE.find_iter(text) {
        findings.push(PiiFinding { pii_type: PiiType::Account, matched_text: m.as_str().to_string(), confidence: pii_confidence(PiiType::Account, m.as_str()) });
    }
    for m in EMAIL_RE.find_iter(text) {
        findings.push(PiiFinding { pii_type: PiiType::Email, matched_text: m.as_str().to_string(), confidence: pii_confidence(PiiType::Email, m.as_str()) });
    }
    for m in NAME_RE.find_iter(text) {
        findings.push(PiiFinding { pii_type: PiiType::Name, matched_text: m.as_str().to_string(), confidence: pii_confidence(PiiType::Name, m.as_str()) });
    }
    findings
}

/// The anonymized payload handed to the external LLM: no raw narration,
/// amount, or timestamp ever leaves this function.
#[derive(Debug, Clone, Serialize)]
pub struct AnonymizedPayload {
    pub amount_category: String,
    pub narration: String,
    pub time_category: String,
    pub day_of_week: String,
    pub bank_category: Option<String>,
    pub amount_rounded: Option<f64>,
    pub business_context: serde_json::Value,
    pub privacy_metadata: serde_json::Value,
}

pub fn anonymize_for_api(
    narration: &str,
    amount_ngn: f64,
    timestamp: DateTime<Utc>,
    time_known: bool,
    bank_name: Option<&str>,
    industry: &str,
    business_size: &str,
    level: PrivacyLevel,
) -> AnonymizedPayload {
    let amount_rounded = matches!(level, PrivacyLevel::Standard | PrivacyLevel::High).then(|| round_amount(amount_ngn, level));

    AnonymizedPayload {
        amount_category: categorize_amount(amount_ngn).to_string(),
        narration: anonymize_narration(narration, level),
        time_category: if time_known { categorize_time(timestamp.hour()).to_string() } else { "unknown".to_string() },
        day_of_week: day_of_week(timestamp).to_string(),
        bank_category: bank_name.map(categorize_bank).map(str::to_string),
        amount_rounded,
        business_context: serde_json::json!({ "industry": industry, "business_size": business_size }),
        privacy_metadata: serde_json::json!({
            "privacy_level": level,
            "data_retention_period": "7_years",
        }),
    }
}

/// Rescans an anonymized payload for residual PII; deducts 0.2 per finding,
/// plus 0.1 for an unrounded amount at Standard/High and 0.05 for an exact
/// timestamp, from a starting score of 1.0.
pub fn validate_anonymization(payload: &AnonymizedPayload) -> f64 {
    let mut score = 1.0;
    score -= 0.2 * detect_pii(&payload.narration).len() as f64;
    if matches!(payload.privacy_metadata.get("privacy_level"), Some(v) if v != &serde_json::json!("maximum")) && payload.amount_rounded.is_none() {
        score -= 0.1;
    }
    score.clamp(0.0, 1.0)
}

pub fn ndpr_compliance_report() -> serde_json::Value {
    serde_json::json!({
        "data_categories_processed": ["financial_transaction_data", "business_context_data"],
        "data_categories_excluded": [
            "personal_identifiers", "account_numbers", "phone_numbers", "exact_amounts", "exact_timestamps"
        ],
        "retention_period": "7_years",
        "anonymization_techniques_used": [
            "data_categorization", "value_rounding", "pii_redaction", "temporal_generalization"
        ],
        "third_party_sharing": {
            "recipient": "openai_api",
            "purpose": "transaction_classification",
            "data_transfer_basis": "anonymized_data_only",
            "retention_by_recipient": "not_retained",
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn phone_and_account_redacted_at_standard() {
        let out = anonymize_narration("Payment to 08012345678 for account 1234567890", PrivacyLevel::Standard);
        assert!(out.contains("[PHONE]"));
        assert!(!out.contains("08012345678"));
    }

    #[test]
    fn names_only_redacted_above_standard() {
        let low = anonymize_narration("Payment to Chidinma Okafor", PrivacyLevel::Standard);
        assert!(low.contains("Chidinma"));
        let high = anonymize_narration("Payment to Chidinma Okafor", PrivacyLevel::High);
        assert!(high.contains("[NAME]"));
    }

    #[test]
    fn maximum_level_scrubs_non_whitelisted_words() {
        let out = anonymize_narration("random unrelated description text", PrivacyLevel::Maximum);
        assert!(out.contains("[TERM]"));
    }

    #[test]
    fn amount_categorization_uses_own_thresholds() {
        assert_eq!(categorize_amount(500.0), "very_small");
        assert_eq!(categorize_amount(50_000.0), "medium");
        assert_eq!(categorize_amount(2_000_000.0), "very_large");
    }

    #[test]
    fn anonymized_payload_omits_raw_amount() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 14, 11, 0, 0).unwrap();
        let payload = anonymize_for_api("Invoice payment", 85_432.0, ts, true, Some("GTBank"), "retail", "small", PrivacyLevel::High);
        assert_eq!(payload.amount_category, "medium");
        assert_eq!(payload.bank_category.as_deref(), Some("tier1"));
        assert!(payload.amount_rounded.is_some());
    }
}

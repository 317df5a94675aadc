//! Classification cache (4.8.3): a deterministic, narration-free cache key
//! plus a bounded in-memory store with strategy-gated write admission.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Timelike, Utc};
use connector_core::{CacheEntry, ClassificationRequest, ClassificationResult, PrivacyLevel};
use parking_lot::Mutex;

/// How eagerly a result is admitted into the cache. Distinct from
/// `PrivacyLevel`: this gates cache writes, privacy level gates what leaves
/// the process for the LLM call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
    Conservative,
    Balanced,
    Aggressive,
}

/// Deterministic, PII-free key for a classification result. Buckets here are
/// this module's own (cache determinism), distinct from the buckets
/// `privacy.rs` uses for anonymization.
fn amount_category(amount_ngn: f64) -> &'static str {
    if amount_ngn < 5_000.0 {
        "very_small"
    } else if amount_ngn < 25_000.0 {
        "small"
    } else if amount_ngn < 100_000.0 {
        "medium"
    } else if amount_ngn < 500_000.0 {
        "large"
    } else {
        "very_large"
    }
}

const CACHE_BUSINESS_KEYWORDS: &[&str] =
    &["payment", "invoice", "goods", "services", "business", "shop", "market", "contract", "supply", "delivery"];
const CACHE_PERSONAL_KEYWORDS: &[&str] =
    &["salary", "allowance", "family", "personal", "loan", "refund", "reversal", "airtime", "data"];

fn narration_pattern(narration: &str) -> &'static str {
    let lower = narration.to_lowercase();
    let business_hits = CACHE_BUSINESS_KEYWORDS.iter().filter(|k| lower.contains(*k)).count();
    let personal_hits = CACHE_PERSONAL_KEYWORDS.iter().filter(|k| lower.contains(*k)).count();
    if lower.split_whitespace().count() <= 2 {
        "short_description"
    } else if business_hits > personal_hits {
        "business_pattern"
    } else if personal_hits > business_hits {
        "personal_pattern"
    } else {
        "neutral_pattern"
    }
}

fn time_category(time_known: bool, timestamp: DateTime<Utc>) -> &'static str {
    if !time_known {
        return "unknown";
    }
    match timestamp.hour() {
        8..=17 => "business_hours",
        18..=22 => "evening",
        _ => "off_hours",
    }
}

fn day_category(timestamp: DateTime<Utc>) -> &'static str {
    match timestamp.weekday().num_days_from_monday() {
        0..=4 => "weekday",
        5 => "saturday",
        _ => "sunday",
    }
}

/// First 8 hex characters of the md5 of `{industry, business_size,
/// subscription_tier}` serialized with sorted keys.
fn business_context_hash(request: &ClassificationRequest) -> String {
    let value = serde_json::json!({
        "business_size": request.user_context.business_context.business_size,
        "industry": request.user_context.business_context.industry,
        "subscription_tier": request.user_context.subscription_tier,
    });
    let digest = md5::compute(value.to_string());
    format!("{digest:x}")[..8].to_string()
}

pub fn cache_key(request: &ClassificationRequest) -> String {
    let amount_ngn: f64 = request.transaction.amount.try_into().unwrap_or(0.0);
    format!(
        "tx_class:{}:{}:{}:{}:{}:{:?}",
        amount_category(amount_ngn),
        narration_pattern(&request.transaction.narration),
        time_category(request.time_known, request.transaction.timestamp),
        day_category(request.transaction.timestamp),
        business_context_hash(request),
        request.privacy_level,
    )
}

fn should_cache(strategy: CacheStrategy, result: &ClassificationResult, risk_factor_count: usize) -> bool {
    match strategy {
        CacheStrategy::Conservative => result.confidence >= 0.8 && !result.requires_review && risk_factor_count == 0,
        CacheStrategy::Balanced => result.confidence >= 0.6 && risk_factor_count <= 1,
        CacheStrategy::Aggressive => result.confidence >= 0.3,
    }
}

/// Bounded in-memory classification cache. Guarded by a single mutex; the
/// public API never hands out a lock guard, so callers can't hold it across
/// an await point.
pub struct ClassificationCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_entries: usize,
    default_ttl_hours: u32,
    strategy: CacheStrategy,
}

impl ClassificationCache {
    pub fn new(max_entries: usize, strategy: CacheStrategy) -> Self {
        Self { entries: Mutex::new(HashMap::new()), max_entries, default_ttl_hours: 24, strategy }
    }

    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<ClassificationResult> {
        let mut entries = self.entries.lock();
        let expired = entries.get(key).is_some_and(|e| e.is_expired(now));
        if expired {
            entries.remove(key);
            return None;
        }
        let entry = entries.get_mut(key)?;
        entry.access_count += 1;
        entry.last_accessed = now;
        Some(entry.result.clone())
    }

    /// Admits `result` under the cache's strategy. Returns `false` if the
    /// strategy declined to cache it.
    pub fn put(&self, key: String, result: ClassificationResult, risk_factor_count: usize, now: DateTime<Utc>) -> bool {
        if !should_cache(self.strategy, &result, risk_factor_count) {
            return false;
        }
        let mut entries = self.entries.lock();
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            evict_oldest(&mut entries);
        }
        entries.insert(key.clone(), CacheEntry::new(key, result, self.default_ttl_hours, now));
        true
    }

    /// Records user feedback on a cached result; removes the entry outright
    /// once its accuracy drops below 0.5, matching the "bad cache entries
    /// don't linger" contract.
    pub fn record_feedback(&self, key: &str, was_correct: bool) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key) else { return };
        if was_correct {
            entry.user_confirmations += 1;
        } else {
            entry.user_corrections += 1;
        }
        if entry.should_evict_for_accuracy() {
            entries.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Evicts the oldest 10% (at least one) by `last_accessed`.
fn evict_oldest(entries: &mut HashMap<String, CacheEntry>) {
    let evict_count = (entries.len() / 10).max(1);
    let mut victims: Vec<(String, DateTime<Utc>)> =
        entries.iter().map(|(k, v)| (k.clone(), v.last_accessed)).collect();
    victims.sort_by_key(|(_, last_accessed)| *last_accessed);
    for (key, _) in victims.into_iter().take(evict_count) {
        entries.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use connector_core::{
        BusinessContext, BusinessIncome, ClassificationMetadata, SubscriptionTier, TaxCategory, Transaction,
        TransactionType, UserContext,
    };

    fn request(narration: &str, amount: &str) -> ClassificationRequest {
        let ts = Utc.with_ymd_and_hms(2024, 3, 14, 11, 0, 0).unwrap();
        ClassificationRequest {
            request_id: "r1".into(),
            transaction: Transaction::new("t1", TransactionType::Credit, amount.parse().unwrap(), "NGN", narration, ts),
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

    fn result(confidence: f64, requires_review: bool) -> ClassificationResult {
        ClassificationResult {
            is_business_income: BusinessIncome::Yes,
            confidence,
            reasoning: "test".into(),
            tax_category: TaxCategory::StandardRate,
            extracted_customer_name: None,
            suggested_invoice_description: None,
            requires_review,
            metadata: ClassificationMetadata::default(),
        }
    }

    #[test]
    fn same_shaped_request_produces_same_key() {
        let a = request("Invoice payment for goods", "85000");
        let b = request("Invoice for goods supplied this week", "87000");
        assert_eq!(cache_key(&a), cache_key(&b));
    }

    #[test]
    fn conservative_strategy_rejects_low_confidence() {
        assert!(!should_cache(CacheStrategy::Conservative, &result(0.7, false), 0));
        assert!(should_cache(CacheStrategy::Conservative, &result(0.85, false), 0));
        assert!(!should_cache(CacheStrategy::Conservative, &result(0.95, false), 1));
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = ClassificationCache::new(100, CacheStrategy::Balanced);
        let now = Utc::now();
        let key = cache_key(&request("Invoice payment", "85000"));
        assert!(cache.put(key.clone(), result(0.9, false), 0, now));
        let hit = cache.get(&key, now).expect("should hit");
        assert_eq!(hit.confidence, 0.9);
    }

    #[test]
    fn low_accuracy_feedback_evicts_entry() {
        let cache = ClassificationCache::new(100, CacheStrategy::Aggressive);
        let now = Utc::now();
        let key = cache_key(&request("Invoice payment", "85000"));
        cache.put(key.clone(), result(0.5, false), 0, now);
        cache.record_feedback(&key, false);
        cache.record_feedback(&key, false);
        assert!(cache.get(&key, now).is_none());
    }

    #[test]
    fn eviction_trims_oldest_tenth_when_full() {
        let cache = ClassificationCache::new(10, CacheStrategy::Aggressive);
        let now = Utc::now();
        for i in 0..10 {
            cache.put(format!("key-{i}"), result(0.9, false), 0, now + chrono::Duration::seconds(i));
        }
        assert_eq!(cache.len(), 10);
        cache.put("key-overflow".into(), result(0.9, false), 0, now + chrono::Duration::seconds(100));
        assert!(cache.len() <= 10);
    }
}

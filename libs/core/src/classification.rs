//! Types shared by the classification engine: requests, results, user
//! context, and the cache entry shape.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::transaction::{BusinessIncome, TaxCategory, Transaction};

/// Cost/accuracy tier the classifier may run a transaction through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Rule,
    Lite,
    Premium,
    Advanced,
}

/// Cost optimizer policy mapping complexity score to tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Aggressive,
    Balanced,
    AccuracyFirst,
    Enterprise,
}

/// Subscription tier, which caps how expensive a classification tier a user
/// may be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Starter,
    Professional,
    Enterprise,
    Scale,
}

impl SubscriptionTier {
    /// The most expensive classification tier this subscription may reach.
    pub fn ceiling(self) -> Tier {
        match self {
            SubscriptionTier::Starter => Tier::Rule,
            SubscriptionTier::Professional => Tier::Premium,
            SubscriptionTier::Enterprise => Tier::Premium,
            SubscriptionTier::Scale => Tier::Advanced,
        }
    }
}

/// How aggressively narrations and amounts are redacted before leaving the
/// process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    Standard,
    High,
    Maximum,
}

/// Business context folded into a user's classification request: what
/// industry/size/state/tenure they operate under, plus whatever the engine
/// has learned about them so far.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessContext {
    pub industry: String,
    pub business_size: String,
    pub state: String,
    pub years_in_business: Option<u32>,
    pub learned_patterns: HashMap<String, f64>,
    pub previous_classification_count: u32,
    pub previous_business_ratio: f64,
}

/// Caller identity and business context attached to a classification request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub org_id: String,
    pub subscription_tier: SubscriptionTier,
    pub business_context: BusinessContext,
    /// How much weight to give this user's self-reported corrections, in `[0,1]`.
    pub trust_level: f64,
    /// Fraction of this request's sender's previously classified transactions
    /// that were flagged business income, if the sender has been seen
    /// before. `None` on a sender's first transaction.
    pub repeat_sender_business_ratio: Option<f64>,
}

/// A request to classify one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub request_id: String,
    pub transaction: Transaction,
    pub user_context: UserContext,
    pub privacy_level: PrivacyLevel,
    pub forced_tier: Option<Tier>,
    /// Whether `transaction.timestamp`'s time-of-day component is known.
    /// Some upstream feeds (e.g. a bank statement line) carry only a date;
    /// `false` here is the "time missing" signal the cost optimizer and
    /// rule fallback both weight.
    pub time_known: bool,
    /// Counterparty name as reported by the source system, used for the
    /// repeat-sender pattern in the rule fallback.
    pub sender_name: Option<String>,
}

/// Metadata describing how a classification was produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationMetadata {
    pub method: String,
    pub model_version: Option<String>,
    pub processing_ms: u64,
    pub api_cost_estimate_ngn: Decimal,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub cache_hit: bool,
    pub anonymization_level: Option<PrivacyLevel>,
    pub detected_nigerian_patterns: Vec<String>,
    pub pattern_match_strength: f64,
    pub fallback_used: bool,
}

/// The decision produced by the classification engine for one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub is_business_income: BusinessIncome,
    pub confidence: f64,
    pub reasoning: String,
    pub tax_category: TaxCategory,
    pub extracted_customer_name: Option<String>,
    pub suggested_invoice_description: Option<String>,
    pub requires_review: bool,
    pub metadata: ClassificationMetadata,
}

impl ClassificationResult {
    pub fn is_business(&self) -> bool {
        matches!(self.is_business_income, BusinessIncome::Yes)
    }
}

/// A cached classification keyed by the deterministic cache key derived from
/// the request shape (never the raw narration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cache_key: String,
    pub result: ClassificationResult,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    pub user_confirmations: u64,
    pub user_corrections: u64,
    pub ttl_hours: u32,
}

impl CacheEntry {
    pub fn new(cache_key: String, result: ClassificationResult, ttl_hours: u32, now: DateTime<Utc>) -> Self {
        Self {
            cache_key,
            result,
            created_at: now,
            last_accessed: now,
            access_count: 1,
            user_confirmations: 0,
            user_corrections: 0,
            ttl_hours,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.created_at).num_hours() >= i64::from(self.ttl_hours)
    }

    /// Fraction of feedback events that confirmed the cached classification.
    pub fn accuracy(&self) -> Option<f64> {
        let total = self.user_confirmations + self.user_corrections;
        if total == 0 {
            None
        } else {
            Some(self.user_confirmations as f64 / total as f64)
        }
    }

    /// Whether feedback has driven this entry's accuracy below the eviction
    /// threshold, irrespective of TTL.
    pub fn should_evict_for_accuracy(&self) -> bool {
        self.accuracy().is_some_and(|a| a < 0.5)
    }
}

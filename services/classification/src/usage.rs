//! Usage tracking (4.8.5): an append-only, bounded event log plus aggregate
//! metrics over it.

use chrono::{DateTime, Utc};
use connector_core::Tier;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageMetricType {
    ClassificationRequest,
    ApiCall,
    CacheHit,
    CacheMiss,
    RuleFallback,
    UserFeedback,
    CostIncurred,
    ProcessingTime,
    ErrorOccurred,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageEvent {
    pub event_id: String,
    pub event_type: UsageMetricType,
    pub user_id: String,
    pub organization_id: String,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub classification_tier: Option<Tier>,
    pub confidence_score: Option<f64>,
    pub is_business_income: Option<bool>,
    pub cost_ngn: Decimal,
    pub api_tokens_used: u32,
    pub processing_time_ms: u64,
    pub cache_hit: bool,
    pub user_feedback_provided: bool,
    pub user_agreed: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub tier_distribution: Vec<(Tier, u64)>,
    pub average_processing_time_ms: f64,
    pub cache_hit_rate_percent: f64,
    pub total_cost_ngn: Decimal,
    pub average_cost_ngn: Decimal,
    pub business_income_percentage: f64,
    pub user_agreement_rate_percent: f64,
    pub error_count: u64,
}

/// Bounded append-only event log: when full, the oldest half is dropped to
/// make room, per the resource model (not the reference implementation's
/// specific 10000/5000 numbers).
pub struct UsageTracker {
    events: Mutex<Vec<UsageEvent>>,
    max_events: usize,
}

impl UsageTracker {
    pub fn new(max_events: usize) -> Self {
        Self { events: Mutex::new(Vec::new()), max_events }
    }

    pub fn record(&self, event: UsageEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            let keep_from = events.len() / 2;
            events.drain(0..keep_from);
        }
        events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> UsageMetrics {
        let events = self.events.lock();
        let total_requests = events.iter().filter(|e| e.event_type == UsageMetricType::ClassificationRequest).count() as u64;
        let successful_requests = events.iter().filter(|e| e.confidence_score.is_some_and(|c| c > 0.5)).count() as u64;

        let mut tier_counts: Vec<(Tier, u64)> = Vec::new();
        for tier in [Tier::Rule, Tier::Lite, Tier::Premium, Tier::Advanced] {
            let count = events.iter().filter(|e| e.classification_tier == Some(tier)).count() as u64;
            tier_counts.push((tier, count));
        }

        let processing_samples: Vec<u64> = events.iter().map(|e| e.processing_time_ms).filter(|ms| *ms > 0).collect();
        let average_processing_time_ms = if processing_samples.is_empty() {
            0.0
        } else {
            processing_samples.iter().sum::<u64>() as f64 / processing_samples.len() as f64
        };

        let cache_events = events.iter().filter(|e| matches!(e.event_type, UsageMetricType::CacheHit | UsageMetricType::CacheMiss)).count();
        let cache_hits = events.iter().filter(|e| e.event_type == UsageMetricType::CacheHit).count();
        let cache_hit_rate_percent = if cache_events == 0 { 0.0 } else { cache_hits as f64 / cache_events as f64 * 100.0 };

        let total_cost_ngn: Decimal = events.iter().map(|e| e.cost_ngn).sum();
        let average_cost_ngn = if total_requests == 0 { Decimal::ZERO } else { total_cost_ngn / Decimal::from(total_requests.max(1)) };

        let business_classified = events.iter().filter(|e| e.is_business_income == Some(true)).count();
        let classified_total = events.iter().filter(|e| e.is_business_income.is_some()).count();
        let business_income_percentage =
            if classified_total == 0 { 0.0 } else { business_classified as f64 / classified_total as f64 * 100.0 };

        let feedback_events = events.iter().filter(|e| e.user_feedback_provided).count();
        let agreed_feedback = events.iter().filter(|e| e.user_agreed == Some(true)).count();
        let user_agreement_rate_percent =
            if feedback_events == 0 { 0.0 } else { agreed_feedback as f64 / feedback_events as f64 * 100.0 };

        let error_count = events.iter().filter(|e| e.event_type == UsageMetricType::ErrorOccurred).count() as u64;

        UsageMetrics {
            total_requests,
            successful_requests,
            tier_distribution: tier_counts,
            average_processing_time_ms,
            cache_hit_rate_percent,
            total_cost_ngn,
            average_cost_ngn,
            business_income_percentage,
            user_agreement_rate_percent,
            error_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn event(event_type: UsageMetricType, tier: Option<Tier>, confidence: Option<f64>) -> UsageEvent {
        UsageEvent {
            event_id: Uuid::new_v4().to_string(),
            event_type,
            user_id: "u1".into(),
            organization_id: "o1".into(),
            timestamp: Utc::now(),
            request_id: "r1".into(),
            classification_tier: tier,
            confidence_score: confidence,
            is_business_income: Some(true),
            cost_ngn: dec!(0.8),
            api_tokens_used: 0,
            processing_time_ms: 200,
            cache_hit: false,
            user_feedback_provided: false,
            user_agreed: None,
        }
    }

    #[test]
    fn tracker_trims_oldest_half_when_full() {
        let tracker = UsageTracker::new(10);
        for _ in 0..12 {
            tracker.record(event(UsageMetricType::ClassificationRequest, Some(Tier::Lite), Some(0.9)));
        }
        assert!(tracker.len() <= 10);
    }

    #[test]
    fn metrics_compute_cache_hit_rate() {
        let tracker = UsageTracker::new(100);
        tracker.record(event(UsageMetricType::CacheHit, None, None));
        tracker.record(event(UsageMetricType::CacheHit, None, None));
        tracker.record(event(UsageMetricType::CacheMiss, None, None));
        let metrics = tracker.metrics();
        assert!((metrics.cache_hit_rate_percent - 66.66).abs() < 1.0);
    }

    #[test]
    fn metrics_count_successful_requests_above_confidence_half() {
        let tracker = UsageTracker::new(100);
        tracker.record(event(UsageMetricType::ClassificationRequest, Some(Tier::Rule), Some(0.9)));
        tracker.record(event(UsageMetricType::ClassificationRequest, Some(Tier::Rule), Some(0.2)));
        let metrics = tracker.metrics();
        assert_eq!(metrics.successful_requests, 1);
    }
}

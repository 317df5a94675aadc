//! Transaction classification engine: routes a transaction through a
//! cost-tiered LLM call or a local rule-based fallback, with caching,
//! anonymization and usage tracking wrapped around the decision.

pub mod cache;
pub mod cost_optimizer;
pub mod keywords;
pub mod privacy;
pub mod rule_fallback;
pub mod usage;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use connector_core::{ClassificationRequest, ClassificationResult, ConnectorError, Result, Tier};
use uuid::Uuid;

use cache::{CacheStrategy, ClassificationCache};
use cost_optimizer::{ComplexityInputs, CostOptimizer};
use usage::{UsageEvent, UsageMetricType, UsageTracker};

/// Pluggable call to the external classification model. Modeled on
/// `connector-domain`'s capability traits: narrow, async, `Send + Sync`, and
/// returning the shared `Result`. A real implementation wraps an OpenAI (or
/// equivalent) chat-completion call over the anonymized payload.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn classify(&self, payload: &privacy::AnonymizedPayload, tier: Tier) -> Result<(ClassificationResult, u32, u32)>;
}

pub struct ClassificationEngineConfig {
    pub strategy: connector_core::Strategy,
    pub cache_strategy: CacheStrategy,
    pub max_cache_entries: usize,
    pub max_usage_events: usize,
}

impl Default for ClassificationEngineConfig {
    fn default() -> Self {
        Self {
            strategy: connector_core::Strategy::Balanced,
            cache_strategy: CacheStrategy::Balanced,
            max_cache_entries: 10_000,
            max_usage_events: 20_000,
        }
    }
}

/// Orchestrates the full classification flow: tier selection, rule
/// evaluation or cache-then-LLM, anonymization, cache admission and usage
/// event emission.
pub struct ClassificationEngine {
    cost_optimizer: CostOptimizer,
    cache: ClassificationCache,
    usage: UsageTracker,
    llm: Arc<dyn LlmClient>,
}

impl ClassificationEngine {
    pub fn new(config: ClassificationEngineConfig, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            cost_optimizer: CostOptimizer::new(config.strategy),
            cache: ClassificationCache::new(config.max_cache_entries, config.cache_strategy),
            usage: UsageTracker::new(config.max_usage_events),
            llm,
        }
    }

    pub fn usage_metrics(&self) -> usage::UsageMetrics {
        self.usage.metrics()
    }

    /// Records user feedback on a previously returned classification,
    /// updating the cache entry's accuracy tally if it's still cached.
    pub fn record_feedback(&self, request: &ClassificationRequest, was_correct: bool) {
        let key = cache::cache_key(request);
        self.cache.record_feedback(&key, was_correct);
        self.usage.record(UsageEvent {
            event_id: Uuid::new_v4().to_string(),
            event_type: UsageMetricType::UserFeedback,
            user_id: request.user_context.user_id.clone(),
            organization_id: request.user_context.org_id.clone(),
            timestamp: Utc::now(),
            request_id: request.request_id.clone(),
            classification_tier: None,
            confidence_score: None,
            is_business_income: None,
            cost_ngn: rust_decimal::Decimal::ZERO,
            api_tokens_used: 0,
            processing_time_ms: 0,
            cache_hit: false,
            user_feedback_provided: true,
            user_agreed: Some(was_correct),
        });
    }

    pub async fn classify(&self, request: &ClassificationRequest, now: DateTime<Utc>) -> Result<ClassificationResult> {
        let amount_ngn: f64 = request.transaction.amount.try_into().unwrap_or(0.0);
        let complexity = cost_optimizer::complexity_score(&ComplexityInputs {
            narration: &request.transaction.narration,
            amount_ngn,
            time_known: request.time_known,
            industry: &request.user_context.business_context.industry,
            previous_classification_count: request.user_context.business_context.previous_classification_count,
        });
        let tier = request.forced_tier.unwrap_or_else(|| self.cost_optimizer.select_tier(complexity, &request.user_context));

        if tier == Tier::Rule {
            let (result, _risk_factors) = rule_fallback::classify_with_risk_factors(request);
            self.emit(request, UsageMetricType::RuleFallback, tier, &result, now, false);
            return Ok(result);
        }

        let key = cache::cache_key(request);
        if let Some(mut cached) = self.cache.get(&key, now) {
            cached.metadata.cache_hit = true;
            cached.metadata.api_cost_estimate_ngn = rust_decimal::Decimal::ZERO;
            self.emit(request, UsageMetricType::CacheHit, tier, &cached, now, true);
            return Ok(cached);
        }
        self.usage.record(self.event(request, UsageMetricType::CacheMiss, None, None, now, false, None));

        let bank_name = request.transaction.counterparty.as_deref();
        let payload = privacy::anonymize_for_api(
            &request.transaction.narration,
            amount_ngn,
            request.transaction.timestamp,
            request.time_known,
            bank_name,
            &request.user_context.business_context.industry,
            &request.user_context.business_context.business_size,
            request.privacy_level,
        );

        let privacy_score = privacy::validate_anonymization(&payload);
        if privacy_score < 0.6 {
            return Err(ConnectorError::PrivacyViolation(format!(
                "anonymization score {privacy_score:.2} below threshold for tier {tier:?}"
            )));
        }

        match self.llm.classify(&payload, tier).await {
            Ok((mut result, tokens_in, tokens_out)) => {
                result.requires_review = result.confidence < rule_fallback::HUMAN_REVIEW_THRESHOLD;
                result.metadata.tokens_in = tokens_in;
                result.metadata.tokens_out = tokens_out;
                self.emit(request, UsageMetricType::ApiCall, tier, &result, now, false);
                self.cache.put(key, result.clone(), 0, now);
                Ok(result)
            }
            Err(err) => {
                self.usage.record(self.event(request, UsageMetricType::ErrorOccurred, Some(tier), None, now, false, None));
                let (mut fallback, _risk_factors) = rule_fallback::classify_with_risk_factors(request);
                fallback.metadata.fallback_used = true;
                self.emit(request, UsageMetricType::RuleFallback, tier, &fallback, now, false);
                tracing::warn!(error = %err, tier = ?tier, "llm classification failed, used rule fallback");
                Ok(fallback)
            }
        }
    }

    fn emit(
        &self,
        request: &ClassificationRequest,
        event_type: UsageMetricType,
        tier: Tier,
        result: &ClassificationResult,
        now: DateTime<Utc>,
        cache_hit: bool,
    ) {
        let cost = if cache_hit { rust_decimal::Decimal::ZERO } else { cost_optimizer::tier_cost_ngn(tier) };
        self.usage.record(self.event(request, event_type, Some(tier), Some(result), now, cache_hit, Some(cost)));
    }

    fn event(
        &self,
        request: &ClassificationRequest,
        event_type: UsageMetricType,
        tier: Option<Tier>,
        result: Option<&ClassificationResult>,
        now: DateTime<Utc>,
        cache_hit: bool,
        cost_override: Option<rust_decimal::Decimal>,
    ) -> UsageEvent {
        UsageEvent {
            event_id: Uuid::new_v4().to_string(),
            event_type,
            user_id: request.user_context.user_id.clone(),
            organization_id: request.user_context.org_id.clone(),
            timestamp: now,
            request_id: request.request_id.clone(),
            classification_tier: tier,
            confidence_score: result.map(|r| r.confidence),
            is_business_income: result.map(|r| r.is_business()),
            cost_ngn: cost_override.unwrap_or(rust_decimal::Decimal::ZERO),
            api_tokens_used: 0,
            processing_time_ms: 0,
            cache_hit,
            user_feedback_provided: false,
            user_agreed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_core::{BusinessContext, BusinessIncome, ClassificationMetadata, PrivacyLevel, Strategy, SubscriptionTier, TaxCategory, Transaction, TransactionType, UserContext};

    struct StubLlm {
        confidence: f64,
    }

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn classify(&self, _payload: &privacy::AnonymizedPayload, _tier: Tier) -> Result<(ClassificationResult, u32, u32)> {
            Ok((
                ClassificationResult {
                    is_business_income: BusinessIncome::Yes,
                    confidence: self.confidence,
                    reasoning: "stub model call".into(),
                    tax_category: TaxCategory::StandardRate,
                    extracted_customer_name: None,
                    suggested_invoice_description: None,
                    requires_review: false,
                    metadata: ClassificationMetadata::default(),
                },
                120,
                40,
            ))
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn classify(&self, _payload: &privacy::AnonymizedPayload, _tier: Tier) -> Result<(ClassificationResult, u32, u32)> {
            Err(ConnectorError::Classification("upstream 500".into()))
        }
    }

    fn request(forced_tier: Option<Tier>) -> ClassificationRequest {
        ClassificationRequest {
            request_id: Uuid::new_v4().to_string(),
            transaction: Transaction::new(
                "t1",
                TransactionType::Credit,
                "85000".parse().unwrap(),
                "NGN",
                "Invoice payment for goods supplied",
                Utc::now(),
            ),
            user_context: UserContext {
                user_id: "u1".into(),
                org_id: "o1".into(),
                subscription_tier: SubscriptionTier::Professional,
                business_context: BusinessContext { industry: "retail".into(), ..BusinessContext::default() },
                trust_level: 0.5,
                repeat_sender_business_ratio: None,
            },
            privacy_level: PrivacyLevel::High,
            forced_tier,
            time_known: true,
            sender_name: None,
        }
    }

    #[tokio::test]
    async fn forced_rule_tier_skips_the_llm() {
        let engine = ClassificationEngine::new(ClassificationEngineConfig::default(), Arc::new(FailingLlm));
        let result = engine.classify(&request(Some(Tier::Rule)), Utc::now()).await.unwrap();
        assert_eq!(result.metadata.method, "rule_based_nigerian");
    }

    #[tokio::test]
    async fn second_identical_request_hits_cache() {
        let engine = ClassificationEngine::new(ClassificationEngineConfig::default(), Arc::new(StubLlm { confidence: 0.9 }));
        let req = request(Some(Tier::Premium));
        let now = Utc::now();
        let first = engine.classify(&req, now).await.unwrap();
        assert_eq!(first.confidence, 0.9);
        let second = engine.classify(&req, now).await.unwrap();
        assert_eq!(second.confidence, 0.9);
        let metrics = engine.usage_metrics();
        assert!(metrics.cache_hit_rate_percent > 0.0);
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_rules() {
        let engine = ClassificationEngine::new(ClassificationEngineConfig::default(), Arc::new(FailingLlm));
        let result = engine.classify(&request(Some(Tier::Premium)), Utc::now()).await.unwrap();
        assert_eq!(result.metadata.method, "rule_based_nigerian");
        let metrics = engine.usage_metrics();
        assert_eq!(metrics.error_count, 1);
    }
}

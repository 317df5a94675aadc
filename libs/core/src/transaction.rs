//! The financial transaction and its classification overlay.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of movement a transaction represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Debit,
    Credit,
    Transfer,
    Payment,
    Refund,
    Fee,
    Interest,
    Dividend,
}

/// Tri-state business-income flag: the third state is genuinely "we don't know yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessIncome {
    Yes,
    No,
    Unknown,
}

/// VAT treatment assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxCategory {
    StandardRate,
    ZeroRate,
    Exempt,
    Unknown,
}

/// Classification results layered onto a transaction. Starts out empty /
/// `Unknown` and is filled in by the classification engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationOverlay {
    pub is_business_income: BusinessIncome,
    pub confidence: f64,
    pub tax_category: TaxCategory,
    pub vat_applicable: bool,
    pub reasoning: String,
    pub requires_review: bool,
}

impl Default for ClassificationOverlay {
    fn default() -> Self {
        Self {
            is_business_income: BusinessIncome::Unknown,
            confidence: 0.0,
            tax_category: TaxCategory::Unknown,
            vat_applicable: false,
            reasoning: String::new(),
            requires_review: false,
        }
    }
}

impl ClassificationOverlay {
    /// Invariant I-1 from the testable properties: VAT applicability implies
    /// the standard rate, confidence is in `[0, 1]`.
    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.confidence)
            && (!self.vat_applicable || self.tax_category == TaxCategory::StandardRate)
    }
}

/// A single financial transaction observed by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub currency: String,
    pub narration: String,
    pub timestamp: DateTime<Utc>,
    pub account_id: Option<String>,
    pub counterparty: Option<String>,
    pub balance_before: Option<Decimal>,
    pub balance_after: Option<Decimal>,
    pub classification: ClassificationOverlay,
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        transaction_type: TransactionType,
        amount: Decimal,
        currency: impl Into<String>,
        narration: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            transaction_type,
            amount,
            currency: currency.into(),
            narration: narration.into(),
            timestamp,
            account_id: None,
            counterparty: None,
            balance_before: None,
            balance_after: None,
            classification: ClassificationOverlay::default(),
        }
    }
}

/// Banking-specific channel a transaction arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankingChannel {
    Internet,
    Mobile,
    Ussd,
    Atm,
    Pos,
    Branch,
    ApiDirect,
}

/// Payment-specific status for a payment transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Successful,
    Failed,
    Reversed,
}

/// Fields layered onto a `Transaction` when it arrived via a banking connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankingDetails {
    pub channel: BankingChannel,
    pub regulatory_form_reference: Option<String>,
}

/// Fields layered onto a `Transaction` when it arrived via a payment connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub status: PaymentStatus,
    pub fees: Option<Decimal>,
}

/// Fields layered onto a `Transaction` when it arrived via a forex connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForexDetails {
    pub exchange_rate: Decimal,
    pub source_currency: String,
    pub target_currency: String,
    /// Open question #3: the source's PBA/BTA annual-usage helpers index by
    /// `customer_id`, a field the base transaction never defined. We resolve
    /// it by indexing on the counterparty instead of growing a field no other
    /// transaction kind needs; see DESIGN.md.
    pub counterparty_id: Option<String>,
}

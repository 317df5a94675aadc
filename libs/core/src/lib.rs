//! # Connector Core
//!
//! Shared data model for the connector framework that mediates between the
//! invoicing platform and external ERP/CRM/accounting/banking/payment/forex
//! systems.
//!
//! This crate carries no behaviour: it is the vocabulary every other crate in
//! the workspace speaks. `connector-adapters` turns `ConnectorConfig` and
//! `ConnectorRequest` into wire traffic; `classification-engine` turns
//! `ClassificationRequest` into a `ClassificationResult`; `health-monitor` and
//! `connector-factory` read and write the `health` and `config` types
//! respectively.

pub mod auth;
pub mod circuit;
pub mod classification;
pub mod config;
pub mod error;
pub mod health;
pub mod request;
pub mod transaction;

pub use auth::{AuthCredentials, Token, TokenKind};
pub use circuit::{Axis, CircuitState};
pub use classification::{
    BusinessContext, CacheEntry, ClassificationMetadata, ClassificationRequest,
    ClassificationResult, PrivacyLevel, Strategy, SubscriptionTier, Tier, UserContext,
};
pub use config::{AuthScheme, ConnectorConfig, ConnectorKind, DataFormat, Protocol, RateLimit, RetryPolicy};
pub use error::{ConnectorError, Result};
pub use health::{AlertSeverity, HealthStatus, Metric, MetricType};
pub use request::{ConnectorRequest, ConnectorResponse, Method};
pub use transaction::{
    BankingChannel, BankingDetails, BusinessIncome, ClassificationOverlay, ForexDetails,
    PaymentDetails, PaymentStatus, TaxCategory, Transaction, TransactionType,
};

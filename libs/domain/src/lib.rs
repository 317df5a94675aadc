//! # Domain Interfaces
//!
//! The reference implementation this framework replaces modeled banking,
//! payment and forex connectors as a class hierarchy: `BankingConnector
//! extends FinancialConnector extends BaseConnector`. That forces every
//! capability a connector might ever need onto every connector, and makes a
//! connector that is simultaneously a bank feed and a CRM impossible to
//! express.
//!
//! Here a connector is a value that implements [`Connector`] (the narrow
//! capability every connector has: CRUDL plus health) *and* zero or more of
//! the domain capability traits below. Callers depend on the narrowest trait
//! that does what they need, never on a concrete connector type.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use connector_core::{ConnectorRequest, ConnectorResponse, Result, Transaction};
use rust_decimal::Decimal;
use serde_json::Value;

/// The capability every connector provides: generic CRUDL plus a raw escape
/// hatch for operations that don't fit the resource model.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn create(&self, resource_type: &str, data: Value) -> Result<ConnectorResponse>;
    async fn read(&self, resource_type: &str, resource_id: &str) -> Result<ConnectorResponse>;
    async fn update(&self, resource_type: &str, resource_id: &str, data: Value) -> Result<ConnectorResponse>;
    async fn delete(&self, resource_type: &str, resource_id: &str) -> Result<ConnectorResponse>;
    async fn list(&self, resource_type: &str, filters: Option<Value>) -> Result<ConnectorResponse>;
    async fn execute(&self, request: ConnectorRequest) -> Result<ConnectorResponse>;
}

/// Minimal account reference shared by banking and payment capabilities.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub account_id: String,
    pub account_name: String,
    pub balance: Option<Decimal>,
    pub currency: String,
}

/// Capability provided by connectors into bank transaction feeds.
#[async_trait]
pub trait BankingCapability: Connector {
    async fn get_account_info(&self, account_number: &str) -> Result<AccountInfo>;
    async fn get_transactions(&self, account_number: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Transaction>>;
    async fn validate_account(&self, account_number: &str) -> Result<bool>;
}

/// Customer identity as a payment processor reports it.
#[derive(Debug, Clone)]
pub struct CustomerInfo {
    pub customer_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Capability provided by payment processor connectors (Paystack,
/// Flutterwave, Interswitch-style gateways).
#[async_trait]
pub trait PaymentCapability: Connector {
    async fn initiate_payment(&self, amount: Decimal, currency: &str, customer: &CustomerInfo) -> Result<Transaction>;
    async fn verify_payment(&self, payment_reference: &str) -> Result<Transaction>;
    async fn get_customer_info(&self, customer_identifier: &str) -> Result<CustomerInfo>;
}

/// A spot or forward exchange rate quote between two currencies.
#[derive(Debug, Clone)]
pub struct CurrencyRate {
    pub base: String,
    pub quote: String,
    pub rate: Decimal,
    pub as_of: DateTime<Utc>,
}

/// Capability provided by forex/currency-exchange connectors.
#[async_trait]
pub trait ForexCapability: Connector {
    async fn get_exchange_rate(&self, base: &str, quote: &str) -> Result<CurrencyRate>;
    async fn execute_forex_trade(&self, base: &str, quote: &str, amount: Decimal) -> Result<Transaction>;

    /// Open question #3: the source indexed PBA/BTA annual usage by a
    /// `customer_id` the base transaction type never defined. We resolve it
    /// here by indexing on the counterparty recorded on the transaction
    /// rather than growing a field every other transaction kind would have
    /// to carry but never use; see DESIGN.md.
    async fn annual_usage_for_counterparty(&self, counterparty_id: &str) -> Result<Decimal>;
}

/// Capability provided by ERP connectors (invoices, purchase orders, tax codes).
#[async_trait]
pub trait ErpCapability: Connector {
    async fn get_invoices(&self, filters: Option<Value>) -> Result<Vec<Value>>;
    async fn post_invoice(&self, invoice: Value) -> Result<ConnectorResponse>;
}

/// Capability provided by CRM connectors (deals, contacts, pipelines).
#[async_trait]
pub trait CrmCapability: Connector {
    async fn get_deals(&self, filters: Option<Value>) -> Result<Vec<Value>>;
    async fn get_contacts(&self, filters: Option<Value>) -> Result<Vec<Value>>;
    async fn transform_deal_to_invoice(&self, deal_id: &str) -> Result<Value>;
}

/// Capability provided by accounting-system connectors (ledgers, journals).
#[async_trait]
pub trait AccountingCapability: Connector {
    async fn post_journal_entry(&self, entry: Value) -> Result<ConnectorResponse>;
    async fn get_chart_of_accounts(&self) -> Result<Vec<Value>>;
}

/// Capability provided by inventory/warehouse connectors.
#[async_trait]
pub trait InventoryCapability: Connector {
    async fn get_stock_levels(&self, product_id: &str) -> Result<Value>;
    async fn adjust_stock(&self, product_id: &str, delta: Decimal, reason: &str) -> Result<ConnectorResponse>;
}

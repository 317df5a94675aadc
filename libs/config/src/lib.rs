//! # Connector Config
//!
//! Environment-driven process settings and the domain tax constants the
//! classification engine and its callers use verbatim.

pub mod rates;
pub mod settings;

pub use rates::{
    commission_on_turnover, stamp_duty_due, vat_due, COMMISSION_ON_TURNOVER_CAP_NGN,
    COMMISSION_ON_TURNOVER_RATE, STAMP_DUTY_FLAT_NGN, STAMP_DUTY_THRESHOLD_NGN,
    VAT_STANDARD_RATE, WITHHOLDING_TAX_RATE,
};
pub use settings::{CacheSettings, HealthMonitorSettings, UsageTrackerSettings};

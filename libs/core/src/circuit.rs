//! The states a hybrid circuit breaker can be in. The transition logic
//! itself lives in `connector-adapters::circuit_breaker`; this enum is shared
//! so other crates (health monitor, factory) can report on it without
//! depending on the adapters crate.

use serde::{Deserialize, Serialize};

/// One axis of failure tracking inside the hybrid breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Si,
    App,
    Hybrid,
    Domain,
}

/// Circuit breaker state. The state machine only leaves `Closed` via a
/// threshold breach, and only enters/leaves `Maintenance` via explicit
/// operator action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
    SiDegraded,
    AppDegraded,
    HybridDegraded,
    DomainIsolated,
    Maintenance,
}

impl CircuitState {
    /// The axis-degraded state corresponding to a given axis, if any.
    pub fn degraded_for(axis: Axis) -> Self {
        match axis {
            Axis::Si => CircuitState::SiDegraded,
            Axis::App => CircuitState::AppDegraded,
            Axis::Hybrid => CircuitState::HybridDegraded,
            Axis::Domain => CircuitState::DomainIsolated,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            CircuitState::SiDegraded | CircuitState::AppDegraded | CircuitState::HybridDegraded
        )
    }
}

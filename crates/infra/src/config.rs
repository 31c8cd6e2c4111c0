//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::store::in_memory::DEFAULT_RETRY_LIMIT;

/// When request stock is deducted.
///
/// The two upstream deployments of this system disagreed: the relational
/// backend deducted when a request was approved, the document backend when
/// it was fulfilled. Mixing them changes what "approved but not yet
/// fulfilled" means for availability, so the policy is a single
/// engine-level setting, never per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeductionPolicy {
    /// Deduct every item when the request is approved (default).
    OnApproval,
    /// Validate at approval, deduct when the request is fulfilled.
    OnFulfillment,
}

impl Default for DeductionPolicy {
    fn default() -> Self {
        Self::OnApproval
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub deduction_policy: DeductionPolicy,
    /// Day window for the "expiring soon" alert set.
    pub expiry_window_days: i64,
    /// Bound on internal transaction re-execution before `Contention`.
    pub txn_retry_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deduction_policy: DeductionPolicy::default(),
            expiry_window_days: 30,
            txn_retry_limit: DEFAULT_RETRY_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Load from the environment, falling back to defaults per field.
    ///
    /// - `CLINISTOCK_DEDUCTION_POLICY`: `on_approval` | `on_fulfillment`
    /// - `CLINISTOCK_EXPIRY_WINDOW_DAYS`: positive integer
    /// - `CLINISTOCK_TXN_RETRY_LIMIT`: non-negative integer
    pub fn from_env() -> Self {
        let mut config = Self::default();

        match std::env::var("CLINISTOCK_DEDUCTION_POLICY").as_deref() {
            Ok("on_approval") => config.deduction_policy = DeductionPolicy::OnApproval,
            Ok("on_fulfillment") => config.deduction_policy = DeductionPolicy::OnFulfillment,
            Ok(other) => {
                tracing::warn!(value = other, "unknown deduction policy; using default");
            }
            Err(_) => {}
        }

        if let Ok(raw) = std::env::var("CLINISTOCK_EXPIRY_WINDOW_DAYS") {
            match raw.parse::<i64>() {
                Ok(days) if days > 0 => config.expiry_window_days = days,
                _ => tracing::warn!(value = raw, "invalid expiry window; using default"),
            }
        }

        if let Ok(raw) = std::env::var("CLINISTOCK_TXN_RETRY_LIMIT") {
            match raw.parse::<u32>() {
                Ok(limit) => config.txn_retry_limit = limit,
                Err(_) => tracing::warn!(value = raw, "invalid retry limit; using default"),
            }
        }

        config
    }
}

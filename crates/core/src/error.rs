//! Shared error taxonomy for the engine.

use chrono::NaiveDate;
use thiserror::Error;

use crate::id::{ProductId, RequestId};

/// Result type used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level error.
///
/// Every rejected operation identifies which precondition failed and on which
/// entity. All variants except `Contention` are terminal: the engine never
/// retries them, and callers surface them as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An exit would drive stock below zero.
    #[error("insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    /// The product's expiration date is in the past; exits are forbidden.
    #[error("product {product_id} expired on {expired_on}")]
    ProductExpired {
        product_id: ProductId,
        expired_on: NaiveDate,
    },

    /// The request already left `pending` (or `approved`, for fulfill).
    #[error("request {request_id} already processed (current status: {current_status})")]
    AlreadyProcessed {
        request_id: RequestId,
        current_status: String,
    },

    /// Caller-side contract violation (e.g. zero/negative quantity).
    #[error("validation failed for {field}: {reason}")]
    ValidationFailed { field: &'static str, reason: String },

    /// The transaction kept losing conflicts past the internal retry budget.
    ///
    /// Transient: the caller may retry with backoff. No partial state was
    /// committed.
    #[error("transaction aborted after {attempts} attempts due to contention")]
    Contention { attempts: u32 },

    /// Unmapped failure from the underlying record store.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            field,
            reason: reason.into(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether the caller may retry the operation (with backoff).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Contention { .. })
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clinistock_core::{ActorId, EngineError, EngineResult, PatientId, ProductId, RequestId};

/// Request lifecycle status. Transitions are monotonic; no status is ever
/// revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Fulfilled,
}

impl core::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Fulfilled => "fulfilled",
        };
        f.write_str(s)
    }
}

/// Caller-facing line item for `create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub reason: Option<String>,
}

/// Persisted line item, immutable once the parent request leaves `pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedProduct {
    pub product_id: ProductId,
    pub quantity: i64,
    pub reason: Option<String>,
}

/// A user-initiated ask for product quantities, subject to approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRequest {
    pub id: RequestId,
    pub requester_id: ActorId,
    pub patient_id: Option<PatientId>,
    pub status: RequestStatus,
    pub items: Vec<RequestedProduct>,
    pub requested_at: DateTime<Utc>,
    pub approver_id: Option<ActorId>,
    pub approval_date: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub fulfilled_by: Option<ActorId>,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

impl ProductRequest {
    /// Build a pending request. Item-level business checks (product exists,
    /// unexpired, sufficient stock) are the orchestrator's job; here we only
    /// enforce the request's own shape.
    pub fn new(
        requester_id: ActorId,
        items: Vec<RequestItem>,
        patient_id: Option<PatientId>,
        requested_at: DateTime<Utc>,
    ) -> EngineResult<Self> {
        if items.is_empty() {
            return Err(EngineError::validation(
                "items",
                "request must contain at least one item",
            ));
        }
        for item in &items {
            if item.quantity <= 0 {
                return Err(EngineError::validation(
                    "quantity",
                    format!("quantity must be positive for product {}", item.product_id),
                ));
            }
        }

        Ok(Self {
            id: RequestId::new(),
            requester_id,
            patient_id,
            status: RequestStatus::Pending,
            items: items
                .into_iter()
                .map(|i| RequestedProduct {
                    product_id: i.product_id,
                    quantity: i.quantity,
                    reason: i.reason,
                })
                .collect(),
            requested_at,
            approver_id: None,
            approval_date: None,
            rejection_reason: None,
            fulfilled_by: None,
            fulfilled_at: None,
        })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, RequestStatus::Pending)
    }

    /// Total requested quantity across all items; fixed once the request
    /// leaves `pending`.
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// `pending → approved`. Fails with `AlreadyProcessed` from any other
    /// status, leaving the record untouched.
    pub fn approve(&mut self, approver_id: ActorId, at: DateTime<Utc>) -> EngineResult<()> {
        self.ensure_pending()?;
        self.status = RequestStatus::Approved;
        self.approver_id = Some(approver_id);
        self.approval_date = Some(at);
        Ok(())
    }

    /// `pending → rejected`. A non-empty reason is required.
    pub fn reject(
        &mut self,
        approver_id: ActorId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> EngineResult<()> {
        if reason.trim().is_empty() {
            return Err(EngineError::validation(
                "reason",
                "rejection reason is required",
            ));
        }
        self.ensure_pending()?;
        self.status = RequestStatus::Rejected;
        self.approver_id = Some(approver_id);
        self.approval_date = Some(at);
        self.rejection_reason = Some(reason.trim().to_string());
        Ok(())
    }

    /// `approved → fulfilled`. A request can never skip from `pending`
    /// straight to `fulfilled`.
    pub fn fulfill(&mut self, actor_id: ActorId, at: DateTime<Utc>) -> EngineResult<()> {
        if self.status != RequestStatus::Approved {
            return Err(self.already_processed());
        }
        self.status = RequestStatus::Fulfilled;
        self.fulfilled_by = Some(actor_id);
        self.fulfilled_at = Some(at);
        Ok(())
    }

    fn ensure_pending(&self) -> EngineResult<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(self.already_processed())
        }
    }

    fn already_processed(&self) -> EngineError {
        EngineError::AlreadyProcessed {
            request_id: self.id,
            current_status: self.status.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_item() -> Vec<RequestItem> {
        vec![RequestItem {
            product_id: ProductId::new(),
            quantity: 5,
            reason: Some("weekly procedure stock".to_string()),
        }]
    }

    fn pending_request() -> ProductRequest {
        ProductRequest::new(ActorId::new(), one_item(), None, Utc::now()).unwrap()
    }

    #[test]
    fn new_request_starts_pending() {
        let r = pending_request();
        assert_eq!(r.status, RequestStatus::Pending);
        assert!(r.approver_id.is_none());
        assert_eq!(r.total_quantity(), 5);
    }

    #[test]
    fn empty_item_list_is_rejected() {
        let err = ProductRequest::new(ActorId::new(), vec![], None, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::ValidationFailed { field: "items", .. }));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let items = vec![RequestItem {
            product_id: ProductId::new(),
            quantity: 0,
            reason: None,
        }];
        let err = ProductRequest::new(ActorId::new(), items, None, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::ValidationFailed { field: "quantity", .. }));
    }

    #[test]
    fn full_lifecycle_pending_to_approved_to_fulfilled() {
        let mut r = pending_request();
        let approver = ActorId::new();

        r.approve(approver, Utc::now()).unwrap();
        assert_eq!(r.status, RequestStatus::Approved);
        assert_eq!(r.approver_id, Some(approver));
        assert!(r.approval_date.is_some());

        r.fulfill(approver, Utc::now()).unwrap();
        assert_eq!(r.status, RequestStatus::Fulfilled);
        assert_eq!(r.fulfilled_by, Some(approver));
    }

    #[test]
    fn approve_twice_fails_and_leaves_status_unchanged() {
        let mut r = pending_request();
        r.approve(ActorId::new(), Utc::now()).unwrap();

        let err = r.approve(ActorId::new(), Utc::now()).unwrap_err();
        match err {
            EngineError::AlreadyProcessed { request_id, current_status } => {
                assert_eq!(request_id, r.id);
                assert_eq!(current_status, "approved");
            }
            other => panic!("expected AlreadyProcessed, got {other:?}"),
        }
        assert_eq!(r.status, RequestStatus::Approved);
    }

    #[test]
    fn reject_requires_reason() {
        let mut r = pending_request();
        let err = r.reject(ActorId::new(), "   ", Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::ValidationFailed { field: "reason", .. }));
        assert!(r.is_pending());
    }

    #[test]
    fn reject_records_reason_and_blocks_further_transitions() {
        let mut r = pending_request();
        r.reject(ActorId::new(), "duplicate of an earlier request", Utc::now())
            .unwrap();
        assert_eq!(r.status, RequestStatus::Rejected);
        assert_eq!(
            r.rejection_reason.as_deref(),
            Some("duplicate of an earlier request")
        );

        let err = r.approve(ActorId::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyProcessed { .. }));
        assert_eq!(r.status, RequestStatus::Rejected);
    }

    #[test]
    fn fulfill_from_pending_is_illegal() {
        let mut r = pending_request();
        let err = r.fulfill(ActorId::new(), Utc::now()).unwrap_err();
        match err {
            EngineError::AlreadyProcessed { current_status, .. } => {
                assert_eq!(current_status, "pending");
            }
            other => panic!("expected AlreadyProcessed, got {other:?}"),
        }
        assert!(r.is_pending());
    }

    #[test]
    fn fulfill_twice_fails() {
        let mut r = pending_request();
        r.approve(ActorId::new(), Utc::now()).unwrap();
        r.fulfill(ActorId::new(), Utc::now()).unwrap();

        let err = r.fulfill(ActorId::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyProcessed { .. }));
        assert_eq!(r.status, RequestStatus::Fulfilled);
    }
}

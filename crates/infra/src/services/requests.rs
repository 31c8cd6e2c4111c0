use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use clinistock_core::{ActorId, EngineError, EngineResult, PatientId, RequestId};
use clinistock_ledger::{MovementContext, MovementKind};
use clinistock_requests::{ProductRequest, RequestItem, RequestStatus};

use crate::config::DeductionPolicy;
use crate::services::stock::{StockAdjustment, record_movement};
use crate::store::{LedgerStore, TxnView};

/// Result of an approve/fulfill transition, including any stock deductions
/// performed in the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub request_id: RequestId,
    pub status: RequestStatus,
    pub stock_adjustments: Vec<StockAdjustment>,
}

/// Owns the request state machine and orchestrates stock deduction at
/// approval or fulfillment time, per [`DeductionPolicy`].
#[derive(Debug)]
pub struct RequestService<S> {
    store: Arc<S>,
    policy: DeductionPolicy,
}

impl<S> RequestService<S>
where
    S: LedgerStore,
{
    pub fn new(store: Arc<S>, policy: DeductionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> DeductionPolicy {
        self.policy
    }

    /// Create a pending request.
    ///
    /// Every item's product must exist, be unexpired and hold enough stock
    /// *right now*. The check is advisory only — nothing is reserved; it is
    /// repeated against current stock when the request is approved or
    /// fulfilled. Any offending item aborts the whole create.
    pub fn create(
        &self,
        requester: ActorId,
        items: Vec<RequestItem>,
        patient_id: Option<PatientId>,
    ) -> EngineResult<RequestId> {
        let request_id = self.store.with_transaction(&mut |txn| {
            if let Some(patient) = patient_id {
                if !txn.patient_exists(patient) {
                    return Err(EngineError::not_found("patient", patient));
                }
            }

            let now = Utc::now();
            let request = ProductRequest::new(requester, items.clone(), patient_id, now)?;

            for item in &request.items {
                let product = txn
                    .product(item.product_id)
                    .ok_or_else(|| EngineError::not_found("product", item.product_id))?;
                // Plan and drop: full exit validation without reserving.
                product.plan_movement(MovementKind::Exit, item.quantity, now.date_naive())?;
            }

            let id = request.id;
            txn.put_request(request);
            Ok(id)
        })?;

        tracing::info!(%request_id, requester = %requester, "product request created");
        Ok(request_id)
    }

    /// `pending → approved`.
    ///
    /// Stock sufficiency is re-validated against current stock for every
    /// item; under `DeductionPolicy::OnApproval` the deductions and the
    /// status transition commit as one atomic unit.
    pub fn approve(&self, request_id: RequestId, approver: ActorId) -> EngineResult<RequestOutcome> {
        let policy = self.policy;
        let outcome = self.store.with_transaction(&mut |txn| {
            let now = Utc::now();
            let mut request = txn
                .request(request_id)
                .ok_or_else(|| EngineError::not_found("request", request_id))?;
            request.approve(approver, now)?;

            let mut stock_adjustments = Vec::new();
            for item in &request.items {
                match policy {
                    DeductionPolicy::OnApproval => {
                        stock_adjustments.push(record_movement(
                            txn,
                            item.product_id,
                            MovementKind::Exit,
                            item.quantity,
                            approver,
                            now,
                            MovementContext::for_request(request_id, request.patient_id),
                        )?);
                    }
                    DeductionPolicy::OnFulfillment => {
                        // Validate only; the deduction happens at fulfill.
                        let product = txn
                            .product(item.product_id)
                            .ok_or_else(|| EngineError::not_found("product", item.product_id))?;
                        product.plan_movement(MovementKind::Exit, item.quantity, now.date_naive())?;
                    }
                }
            }

            let status = request.status;
            txn.put_request(request);
            Ok(RequestOutcome {
                request_id,
                status,
                stock_adjustments,
            })
        })?;

        tracing::info!(
            %request_id,
            approver = %approver,
            deductions = outcome.stock_adjustments.len(),
            "request approved"
        );
        Ok(outcome)
    }

    /// `pending → rejected`. A non-empty reason is required; no stock effect.
    pub fn reject(
        &self,
        request_id: RequestId,
        approver: ActorId,
        reason: &str,
    ) -> EngineResult<RequestOutcome> {
        let outcome = self.store.with_transaction(&mut |txn| {
            let mut request = txn
                .request(request_id)
                .ok_or_else(|| EngineError::not_found("request", request_id))?;
            request.reject(approver, reason, Utc::now())?;

            let status = request.status;
            txn.put_request(request);
            Ok(RequestOutcome {
                request_id,
                status,
                stock_adjustments: Vec::new(),
            })
        })?;

        tracing::info!(%request_id, approver = %approver, "request rejected");
        Ok(outcome)
    }

    /// `approved → fulfilled`.
    ///
    /// Under `DeductionPolicy::OnFulfillment` this is where the deductions
    /// happen, atomically with the status change; under `OnApproval` the
    /// stock already moved and only the status flips.
    pub fn fulfill(&self, request_id: RequestId, actor: ActorId) -> EngineResult<RequestOutcome> {
        let policy = self.policy;
        let outcome = self.store.with_transaction(&mut |txn| {
            let now = Utc::now();
            let mut request = txn
                .request(request_id)
                .ok_or_else(|| EngineError::not_found("request", request_id))?;
            request.fulfill(actor, now)?;

            let mut stock_adjustments = Vec::new();
            if policy == DeductionPolicy::OnFulfillment {
                for item in &request.items {
                    stock_adjustments.push(record_movement(
                        txn,
                        item.product_id,
                        MovementKind::Exit,
                        item.quantity,
                        actor,
                        now,
                        MovementContext::for_request(request_id, request.patient_id),
                    )?);
                }
            }

            let status = request.status;
            txn.put_request(request);
            Ok(RequestOutcome {
                request_id,
                status,
                stock_adjustments,
            })
        })?;

        tracing::info!(
            %request_id,
            fulfilled_by = %actor,
            deductions = outcome.stock_adjustments.len(),
            "request fulfilled"
        );
        Ok(outcome)
    }
}

impl<S> Clone for RequestService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            policy: self.policy,
        }
    }
}

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clinistock_core::{ActorId, EngineError, EngineResult, PatientId, TreatmentId};
use clinistock_ledger::{MovementContext, MovementKind};
use clinistock_treatments::{Treatment, TreatmentItem};

use crate::services::stock::{StockAdjustment, record_movement};
use crate::store::{LedgerStore, TxnView};

/// Input shape for associating consumed products with a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociateProducts {
    pub patient_id: PatientId,
    pub doctor_id: ActorId,
    pub procedure: String,
    pub items: Vec<TreatmentItem>,
    pub notes: Option<String>,
    /// Defaults to now.
    pub date: Option<DateTime<Utc>>,
    /// Acting user (may differ from the treating doctor).
    pub performed_by: ActorId,
}

/// Confirmation payload: the created treatment plus before/after stock for
/// every affected product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentOutcome {
    pub treatment_id: TreatmentId,
    pub stock_adjustments: Vec<StockAdjustment>,
}

/// Associates a basket of products with a patient treatment, deducting
/// stock for every line item as one unit of work.
#[derive(Debug)]
pub struct TreatmentService<S> {
    store: Arc<S>,
}

impl<S> TreatmentService<S>
where
    S: LedgerStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create the treatment, its used-product children and one exit
    /// movement per item — all or nothing. If any item fails validation
    /// (missing product, expired, insufficient stock), nothing is created.
    pub fn associate(&self, input: AssociateProducts) -> EngineResult<TreatmentOutcome> {
        let outcome = self.store.with_transaction(&mut |txn| {
            if !txn.patient_exists(input.patient_id) {
                return Err(EngineError::not_found("patient", input.patient_id));
            }
            if !txn.staff_exists(input.doctor_id) {
                return Err(EngineError::not_found("doctor", input.doctor_id));
            }

            let date = input.date.unwrap_or_else(Utc::now);
            let treatment = Treatment::new(
                input.patient_id,
                input.doctor_id,
                input.procedure.clone(),
                input.items.clone(),
                input.notes.clone(),
                date,
            )?;

            let mut stock_adjustments = Vec::new();
            for item in &treatment.items {
                let mut context =
                    MovementContext::for_treatment(treatment.id, treatment.patient_id);
                context.note = Some(format!("used in treatment: {}", treatment.procedure));
                stock_adjustments.push(record_movement(
                    txn,
                    item.product_id,
                    MovementKind::Exit,
                    item.quantity,
                    input.performed_by,
                    date,
                    context,
                )?);
            }

            let treatment_id = treatment.id;
            txn.insert_treatment(treatment);
            Ok(TreatmentOutcome {
                treatment_id,
                stock_adjustments,
            })
        })?;

        tracing::info!(
            treatment_id = %outcome.treatment_id,
            patient_id = %input.patient_id,
            doctor_id = %input.doctor_id,
            items = outcome.stock_adjustments.len(),
            "products associated with treatment"
        );
        Ok(outcome)
    }
}

impl<S> Clone for TreatmentService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

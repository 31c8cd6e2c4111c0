use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clinistock_core::{ActorId, MovementId, PatientId, ProductId, RequestId, TreatmentId};

use crate::product::{MovementPlan, Product};

/// Kind of stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    /// Stock received (initial registration or restock).
    Entry,
    /// Stock consumed (request approval/fulfillment, treatment, manual exit).
    Exit,
    /// Manual correction to an absolute value.
    Adjustment,
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            MovementKind::Entry => "entry",
            MovementKind::Exit => "exit",
            MovementKind::Adjustment => "adjustment",
        };
        f.write_str(s)
    }
}

/// Back-references tying a movement to the business event that caused it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementContext {
    pub request_id: Option<RequestId>,
    pub treatment_id: Option<TreatmentId>,
    pub patient_id: Option<PatientId>,
    pub note: Option<String>,
}

impl MovementContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_note(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::default()
        }
    }

    pub fn for_request(request_id: RequestId, patient_id: Option<PatientId>) -> Self {
        Self {
            request_id: Some(request_id),
            patient_id,
            ..Self::default()
        }
    }

    pub fn for_treatment(treatment_id: TreatmentId, patient_id: PatientId) -> Self {
        Self {
            treatment_id: Some(treatment_id),
            patient_id: Some(patient_id),
            ..Self::default()
        }
    }
}

/// One immutable ledger entry.
///
/// Never updated or deleted after commit; the sole source of truth for how a
/// product's `current_stock` was derived. `quantity` is the signed delta
/// (entries positive, exits negative, adjustments either sign).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: i64,
    /// Stock as observed at the moment of commit, before this movement.
    pub previous_stock: i64,
    /// Stock after this movement; always `previous_stock + quantity`.
    pub new_stock: i64,
    pub performed_by: ActorId,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub context: MovementContext,
}

impl StockMovement {
    /// Materialize a planned movement against the product it was planned for.
    pub fn record(
        product: &Product,
        plan: &MovementPlan,
        performed_by: ActorId,
        occurred_at: DateTime<Utc>,
        context: MovementContext,
    ) -> Self {
        Self {
            id: MovementId::new(),
            product_id: product.id,
            kind: plan.kind,
            quantity: plan.delta,
            previous_stock: plan.previous_stock,
            new_stock: plan.new_stock,
            performed_by,
            occurred_at,
            context,
        }
    }
}

/// Fold a product's full movement history from zero.
///
/// The returned value must equal the product's stored `current_stock`; the
/// integration tests assert this after every committed operation.
pub fn replay<'a>(movements: impl IntoIterator<Item = &'a StockMovement>) -> i64 {
    movements.into_iter().map(|m| m.quantity).sum()
}

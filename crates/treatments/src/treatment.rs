use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clinistock_core::{ActorId, EngineError, EngineResult, PatientId, ProductId, TreatmentId};

/// Caller-facing line item for `associate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub batch_number: Option<String>,
}

/// Persisted child of a treatment. Each row corresponds 1:1 to one exit
/// movement created in the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedProduct {
    pub product_id: ProductId,
    pub quantity: i64,
    pub batch_number: Option<String>,
}

/// A clinical event that consumes products against a patient record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treatment {
    pub id: TreatmentId,
    pub patient_id: PatientId,
    pub doctor_id: ActorId,
    pub procedure: String,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
    pub items: Vec<UsedProduct>,
}

impl Treatment {
    /// Shape-level validation only; existence and stock checks belong to the
    /// transaction that persists the treatment.
    pub fn new(
        patient_id: PatientId,
        doctor_id: ActorId,
        procedure: impl Into<String>,
        items: Vec<TreatmentItem>,
        notes: Option<String>,
        date: DateTime<Utc>,
    ) -> EngineResult<Self> {
        let procedure = procedure.into();
        if procedure.trim().is_empty() {
            return Err(EngineError::validation(
                "procedure",
                "procedure cannot be empty",
            ));
        }
        if items.is_empty() {
            return Err(EngineError::validation(
                "items",
                "treatment must consume at least one product",
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
            id: TreatmentId::new(),
            patient_id,
            doctor_id,
            procedure,
            date,
            notes,
            items: items
                .into_iter()
                .map(|i| UsedProduct {
                    product_id: i.product_id,
                    quantity: i.quantity,
                    batch_number: i.batch_number,
                })
                .collect(),
        })
    }
}

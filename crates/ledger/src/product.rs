use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use clinistock_core::{EngineError, EngineResult, ProductId};

use crate::movement::MovementKind;

/// Input shape for registering a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub unit: String,
    pub minimum_stock: i64,
    pub expiration_date: Option<NaiveDate>,
    pub invoice_number: Option<String>,
}

/// Product record: identity plus the materialized stock value.
///
/// `current_stock` always equals the sum of committed movement deltas for
/// this product and is never negative. `active == false` marks a soft-deleted
/// product: it remains readable (its ledger history must stay explicable)
/// but rejects new movements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub minimum_stock: i64,
    pub current_stock: i64,
    pub expiration_date: Option<NaiveDate>,
    pub invoice_number: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A validated stock change, ready to be committed together with its
/// movement record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementPlan {
    pub kind: MovementKind,
    /// Signed delta recorded on the movement.
    pub delta: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
}

impl Product {
    pub fn register(input: NewProduct, created_at: DateTime<Utc>) -> EngineResult<Self> {
        if input.name.trim().is_empty() {
            return Err(EngineError::validation("name", "name cannot be empty"));
        }
        if input.minimum_stock < 0 {
            return Err(EngineError::validation(
                "minimum_stock",
                "minimum stock cannot be negative",
            ));
        }

        Ok(Self {
            id: ProductId::new(),
            name: input.name,
            category: input.category,
            unit: input.unit,
            minimum_stock: input.minimum_stock,
            current_stock: 0,
            expiration_date: input.expiration_date,
            invoice_number: input.invoice_number,
            active: true,
            created_at,
        })
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiration_date.is_some_and(|d| d < today)
    }

    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.minimum_stock
    }

    /// Expiring window check for alerts: unexpired today, but expired within
    /// `days` days, and there is stock left to lose.
    pub fn expires_within(&self, today: NaiveDate, days: i64) -> bool {
        match self.expiration_date {
            Some(d) => d >= today && (d - today).num_days() <= days && self.current_stock > 0,
            None => false,
        }
    }

    /// Validate and price a stock change against the current state.
    ///
    /// Pure decision logic: no mutation here. The caller commits the returned
    /// plan (product update + movement append) as one atomic unit, or drops
    /// it entirely.
    ///
    /// - `Entry`: `quantity > 0`, unconditional increase.
    /// - `Exit`: `quantity > 0`, product must be unexpired and hold at least
    ///   `quantity`; delta is `-quantity`.
    /// - `Adjustment`: `quantity` is the absolute target (`>= 0`); delta is
    ///   the signed difference from the current value.
    pub fn plan_movement(
        &self,
        kind: MovementKind,
        quantity: i64,
        today: NaiveDate,
    ) -> EngineResult<MovementPlan> {
        if !self.active {
            return Err(EngineError::validation(
                "product",
                format!("product {} is inactive", self.id),
            ));
        }

        let delta = match kind {
            MovementKind::Entry => {
                ensure_positive(quantity)?;
                quantity
            }
            MovementKind::Exit => {
                ensure_positive(quantity)?;
                if let Some(expired_on) = self.expiration_date.filter(|d| *d < today) {
                    return Err(EngineError::ProductExpired {
                        product_id: self.id,
                        expired_on,
                    });
                }
                if self.current_stock < quantity {
                    return Err(EngineError::InsufficientStock {
                        product_id: self.id,
                        available: self.current_stock,
                        requested: quantity,
                    });
                }
                -quantity
            }
            MovementKind::Adjustment => {
                if quantity < 0 {
                    return Err(EngineError::validation(
                        "quantity",
                        "adjustment target cannot be negative",
                    ));
                }
                quantity - self.current_stock
            }
        };

        Ok(MovementPlan {
            kind,
            delta,
            previous_stock: self.current_stock,
            new_stock: self.current_stock + delta,
        })
    }

    /// Apply a plan produced by [`Self::plan_movement`] on the same state.
    pub fn apply(&mut self, plan: &MovementPlan) {
        debug_assert_eq!(plan.previous_stock, self.current_stock);
        self.current_stock = plan.new_stock;
    }

    /// Soft delete: keep the record and its ledger, refuse new movements.
    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

fn ensure_positive(quantity: i64) -> EngineResult<()> {
    if quantity <= 0 {
        return Err(EngineError::validation(
            "quantity",
            "quantity must be positive",
        ));
    }
    Ok(())
}


#[cfg(test)]
mod properties {
    use super::*;
    use crate::movement::{MovementContext, StockMovement, replay};
    use clinistock_core::ActorId;
    use proptest::prelude::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn arb_step() -> impl Strategy<Value = (MovementKind, i64)> {
        prop_oneof![
            (1i64..=50).prop_map(|q| (MovementKind::Entry, q)),
            (1i64..=50).prop_map(|q| (MovementKind::Exit, q)),
            (0i64..=100).prop_map(|q| (MovementKind::Adjustment, q)),
        ]
    }

    proptest! {
        /// Applying any sequence of accepted plans keeps `current_stock`
        /// equal to the replayed movement history, and never negative.
        #[test]
        fn replayed_history_matches_materialized_stock(steps in prop::collection::vec(arb_step(), 0..40)) {
            let mut product = Product::register(
                NewProduct {
                    name: "Saline 0.9%".to_string(),
                    category: "consumable".to_string(),
                    unit: "ml".to_string(),
                    minimum_stock: 0,
                    expiration_date: None,
                    invoice_number: None,
                },
                chrono::Utc::now(),
            ).unwrap();
            let actor = ActorId::new();
            let mut history: Vec<StockMovement> = Vec::new();

            for (kind, qty) in steps {
                // Rejected plans must leave no trace; accepted ones commit
                // both the product update and the movement.
                if let Ok(plan) = product.plan_movement(kind, qty, today()) {
                    let movement = StockMovement::record(
                        &product,
                        &plan,
                        actor,
                        chrono::Utc::now(),
                        MovementContext::none(),
                    );
                    product.apply(&plan);
                    history.push(movement);
                }

                prop_assert!(product.current_stock >= 0);
                prop_assert_eq!(replay(&history), product.current_stock);
            }
        }
    }
}

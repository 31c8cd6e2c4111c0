use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clinistock_core::{ActorId, EngineError, EngineResult, MovementId, ProductId};
use clinistock_ledger::{MovementContext, MovementKind, NewProduct, Product, StockMovement};

use crate::store::{LedgerStore, TxnView};

/// Before/after view of one committed stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub movement_id: MovementId,
    pub previous_stock: i64,
    pub new_stock: i64,
}

/// How a product left the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductRemoval {
    /// Hard delete; the product had no movements.
    Deleted,
    /// Soft delete; movements exist, so the record stays and turns inactive.
    Deactivated,
}

/// Validate, apply and log one stock change inside an open transaction.
///
/// The single write path for `current_stock`: the request and treatment
/// services call this too, so the product update and its movement always
/// commit together.
pub(crate) fn record_movement(
    txn: &mut dyn TxnView,
    product_id: ProductId,
    kind: MovementKind,
    quantity: i64,
    performed_by: ActorId,
    now: DateTime<Utc>,
    context: MovementContext,
) -> EngineResult<StockAdjustment> {
    let mut product = txn
        .product(product_id)
        .ok_or_else(|| EngineError::not_found("product", product_id))?;

    let plan = product.plan_movement(kind, quantity, now.date_naive())?;
    let movement = StockMovement::record(&product, &plan, performed_by, now, context);
    let movement_id = movement.id;

    product.apply(&plan);
    txn.put_product(product);
    txn.append_movement(movement);

    Ok(StockAdjustment {
        product_id,
        movement_id,
        previous_stock: plan.previous_stock,
        new_stock: plan.new_stock,
    })
}

/// Applies single signed stock deltas and maintains the movement ledger.
#[derive(Debug)]
pub struct StockService<S> {
    store: Arc<S>,
}

impl<S> StockService<S>
where
    S: LedgerStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Register a product and, when `initial_quantity > 0`, its initial
    /// entry movement — one atomic unit.
    pub fn register_product(
        &self,
        input: NewProduct,
        initial_quantity: i64,
        actor: ActorId,
    ) -> EngineResult<Product> {
        if initial_quantity < 0 {
            return Err(EngineError::validation(
                "quantity",
                "initial quantity cannot be negative",
            ));
        }

        let product = self.store.with_transaction(&mut |txn| {
            let now = Utc::now();
            let mut product = Product::register(input.clone(), now)?;

            if initial_quantity > 0 {
                let plan = product.plan_movement(MovementKind::Entry, initial_quantity, now.date_naive())?;
                let note = match &product.invoice_number {
                    Some(invoice) => format!("initial entry - invoice {invoice}"),
                    None => "initial entry".to_string(),
                };
                let movement = StockMovement::record(
                    &product,
                    &plan,
                    actor,
                    now,
                    MovementContext::with_note(note),
                );
                product.apply(&plan);
                txn.append_movement(movement);
            }

            txn.put_product(product.clone());
            Ok(product)
        })?;

        tracing::info!(
            product_id = %product.id,
            name = %product.name,
            stock = product.current_stock,
            "product registered"
        );
        Ok(product)
    }

    /// Apply one signed stock delta and write its movement, atomically.
    ///
    /// `quantity` is a positive amount for entry/exit and the absolute
    /// target value for adjustment.
    pub fn adjust(
        &self,
        product_id: ProductId,
        kind: MovementKind,
        quantity: i64,
        actor: ActorId,
        context: MovementContext,
    ) -> EngineResult<StockAdjustment> {
        let adjustment = self.store.with_transaction(&mut |txn| {
            record_movement(
                txn,
                product_id,
                kind,
                quantity,
                actor,
                Utc::now(),
                context.clone(),
            )
        })?;

        tracing::info!(
            %product_id,
            %kind,
            quantity,
            previous_stock = adjustment.previous_stock,
            new_stock = adjustment.new_stock,
            performed_by = %actor,
            "stock adjusted"
        );
        Ok(adjustment)
    }

    /// Remove a product: hard delete with zero movements, soft delete
    /// (deactivate) otherwise.
    pub fn remove_product(&self, product_id: ProductId) -> EngineResult<ProductRemoval> {
        let removal = self.store.with_transaction(&mut |txn| {
            let mut product = txn
                .product(product_id)
                .ok_or_else(|| EngineError::not_found("product", product_id))?;

            if txn.movement_count(product_id) == 0 {
                txn.delete_product(product_id);
                Ok(ProductRemoval::Deleted)
            } else {
                product.deactivate();
                txn.put_product(product);
                Ok(ProductRemoval::Deactivated)
            }
        })?;

        tracing::info!(%product_id, ?removal, "product removed");
        Ok(removal)
    }
}

impl<S> Clone for StockService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

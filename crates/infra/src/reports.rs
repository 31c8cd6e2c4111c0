//! Read-only aggregation over the ledger for alerts and audit queries.
//!
//! Everything here reads committed state; no mutation, no transactions.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use clinistock_core::{EngineError, EngineResult, ProductId};
use clinistock_ledger::{Product, StockMovement, replay};

use crate::store::LedgerStore;

/// Counts for the alert dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub low_stock: usize,
    pub expiring: usize,
    pub expired: usize,
}

#[derive(Debug)]
pub struct ReportService<S> {
    store: Arc<S>,
    expiry_window_days: i64,
}

impl<S> ReportService<S>
where
    S: LedgerStore,
{
    pub fn new(store: Arc<S>, expiry_window_days: i64) -> Self {
        Self {
            store,
            expiry_window_days,
        }
    }

    /// Active products at or below their minimum stock, lowest first.
    pub fn low_stock(&self) -> Vec<Product> {
        let mut products: Vec<_> = self
            .store
            .products()
            .into_iter()
            .filter(|p| p.active && p.is_low_stock())
            .collect();
        products.sort_by_key(|p| p.current_stock);
        products
    }

    /// Active products with remaining stock expiring within the configured
    /// window, soonest first.
    pub fn expiring(&self, today: NaiveDate) -> Vec<Product> {
        let mut products: Vec<_> = self
            .store
            .products()
            .into_iter()
            .filter(|p| p.active && p.expires_within(today, self.expiry_window_days))
            .collect();
        products.sort_by_key(|p| p.expiration_date);
        products
    }

    /// Active products whose expiration date has passed.
    pub fn expired(&self, today: NaiveDate) -> Vec<Product> {
        let mut products: Vec<_> = self
            .store
            .products()
            .into_iter()
            .filter(|p| p.active && p.is_expired(today))
            .collect();
        products.sort_by_key(|p| p.expiration_date);
        products
    }

    pub fn alert_summary(&self, today: NaiveDate) -> AlertSummary {
        AlertSummary {
            low_stock: self.low_stock().len(),
            expiring: self.expiring(today).len(),
            expired: self.expired(today).len(),
        }
    }

    /// Committed movement history for one product, in commit order.
    pub fn movement_history(&self, product_id: ProductId) -> Vec<StockMovement> {
        self.store.movements_for(product_id)
    }

    /// Fold the product's full movement history from zero.
    ///
    /// Audit accessor: the result must equal the stored `current_stock`.
    pub fn replayed_stock(&self, product_id: ProductId) -> EngineResult<i64> {
        if self.store.product(product_id).is_none() {
            return Err(EngineError::not_found("product", product_id));
        }
        Ok(replay(&self.store.movements_for(product_id)))
    }
}

impl<S> Clone for ReportService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            expiry_window_days: self.expiry_window_days,
        }
    }
}

//! Composition root.
//!
//! The store handle is constructed once and passed explicitly into each
//! service; no ambient global state.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::reports::ReportService;
use crate::services::{RequestService, StockService, TreatmentService};
use crate::store::{InMemoryLedgerStore, LedgerStore};

/// The assembled engine: one shared ledger store behind the three services
/// and the report layer.
#[derive(Debug)]
pub struct Engine<S> {
    pub stock: StockService<S>,
    pub requests: RequestService<S>,
    pub treatments: TreatmentService<S>,
    pub reports: ReportService<S>,
}

impl<S> Engine<S>
where
    S: LedgerStore,
{
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            stock: StockService::new(store.clone()),
            requests: RequestService::new(store.clone(), config.deduction_policy),
            treatments: TreatmentService::new(store.clone()),
            reports: ReportService::new(store, config.expiry_window_days),
        }
    }
}

impl Engine<InMemoryLedgerStore> {
    /// Engine over a fresh in-memory store. Returns the store handle too so
    /// callers can seed directories and inspect committed state.
    pub fn in_memory(config: EngineConfig) -> (Self, Arc<InMemoryLedgerStore>) {
        let store = Arc::new(InMemoryLedgerStore::new(config.txn_retry_limit));
        (Self::new(store.clone(), config), store)
    }
}

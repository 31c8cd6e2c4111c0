use std::collections::HashMap;
use std::sync::RwLock;

use clinistock_core::{
    ActorId, EngineError, EngineResult, PatientId, ProductId, RequestId, TreatmentId,
};
use clinistock_ledger::{Product, StockMovement};
use clinistock_requests::ProductRequest;
use clinistock_treatments::Treatment;

use super::r#trait::{LedgerStore, PatientRef, StaffRef, TxnView};

/// Default bound on internal transaction re-execution under contention.
pub const DEFAULT_RETRY_LIMIT: u32 = 5;

#[derive(Debug, Clone)]
struct Versioned<R> {
    record: R,
    version: u64,
}

/// Version observed for a record at read time; 0 means "absent".
type ObservedVersion = u64;

#[derive(Debug, Default, Clone)]
struct LedgerState {
    products: HashMap<ProductId, Versioned<Product>>,
    movements: Vec<StockMovement>,
    requests: HashMap<RequestId, Versioned<ProductRequest>>,
    treatments: HashMap<TreatmentId, Treatment>,
    patients: HashMap<PatientId, PatientRef>,
    staff: HashMap<ActorId, StaffRef>,
}

impl LedgerState {
    fn product_version(&self, id: ProductId) -> ObservedVersion {
        self.products.get(&id).map(|v| v.version).unwrap_or(0)
    }

    fn request_version(&self, id: RequestId) -> ObservedVersion {
        self.requests.get(&id).map(|v| v.version).unwrap_or(0)
    }
}

/// In-memory transactional ledger store.
///
/// Optimistic concurrency: a transaction runs against a cloned snapshot,
/// tracks the version of every product/request it touched, and validates
/// those versions under the write lock at commit. A losing transaction is
/// re-executed against fresh state up to `retry_limit` times, then fails
/// with `Contention`. Intended for tests/dev and as the reference semantics
/// for durable backends; not optimized for large ledgers.
#[derive(Debug)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
    retry_limit: u32,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_LIMIT)
    }
}

impl InMemoryLedgerStore {
    pub fn new(retry_limit: u32) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            retry_limit,
        }
    }

    fn snapshot(&self) -> EngineResult<LedgerState> {
        Ok(self
            .state
            .read()
            .map_err(|_| EngineError::storage("ledger state lock poisoned"))?
            .clone())
    }
}

/// One in-flight transaction: snapshot + read-set + staged writes.
struct MemTxn {
    snapshot: LedgerState,
    product_reads: HashMap<ProductId, ObservedVersion>,
    request_reads: HashMap<RequestId, ObservedVersion>,
    /// `None` stages a hard delete.
    staged_products: HashMap<ProductId, Option<Product>>,
    staged_requests: HashMap<RequestId, ProductRequest>,
    staged_movements: Vec<StockMovement>,
    staged_treatments: Vec<Treatment>,
}

impl MemTxn {
    fn new(snapshot: LedgerState) -> Self {
        Self {
            snapshot,
            product_reads: HashMap::new(),
            request_reads: HashMap::new(),
            staged_products: HashMap::new(),
            staged_requests: HashMap::new(),
            staged_movements: Vec::new(),
            staged_treatments: Vec::new(),
        }
    }

    /// Record the committed version a decision was based on. First
    /// observation wins; later reads of our own staged writes must not
    /// overwrite it. Blind writes observe too, so every staged record is
    /// validated at commit.
    fn observe_product(&mut self, id: ProductId) {
        let version = self.snapshot.product_version(id);
        self.product_reads.entry(id).or_insert(version);
    }

    fn observe_request(&mut self, id: RequestId) {
        let version = self.snapshot.request_version(id);
        self.request_reads.entry(id).or_insert(version);
    }

    /// True when every record in the read-set is still at the version this
    /// transaction observed.
    fn validates_against(&self, state: &LedgerState) -> bool {
        self.product_reads
            .iter()
            .all(|(id, version)| state.product_version(*id) == *version)
            && self
                .request_reads
                .iter()
                .all(|(id, version)| state.request_version(*id) == *version)
    }

    /// Apply staged writes. Caller holds the write lock and has validated
    /// the read-set.
    fn commit_into(self, state: &mut LedgerState) {
        for (id, staged) in self.staged_products {
            match staged {
                Some(record) => {
                    let version = state.product_version(id) + 1;
                    state.products.insert(id, Versioned { record, version });
                }
                None => {
                    state.products.remove(&id);
                }
            }
        }
        for (id, record) in self.staged_requests {
            let version = state.request_version(id) + 1;
            state.requests.insert(id, Versioned { record, version });
        }
        state.movements.extend(self.staged_movements);
        for treatment in self.staged_treatments {
            state.treatments.insert(treatment.id, treatment);
        }
    }
}

impl TxnView for MemTxn {
    fn product(&mut self, id: ProductId) -> Option<Product> {
        self.observe_product(id);
        if let Some(staged) = self.staged_products.get(&id) {
            return staged.clone();
        }
        self.snapshot.products.get(&id).map(|v| v.record.clone())
    }

    fn put_product(&mut self, product: Product) {
        self.observe_product(product.id);
        self.staged_products.insert(product.id, Some(product));
    }

    fn delete_product(&mut self, id: ProductId) {
        self.observe_product(id);
        self.staged_products.insert(id, None);
    }

    fn movement_count(&self, product_id: ProductId) -> usize {
        let committed = self
            .snapshot
            .movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .count();
        let staged = self
            .staged_movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .count();
        committed + staged
    }

    fn append_movement(&mut self, movement: StockMovement) {
        self.staged_movements.push(movement);
    }

    fn request(&mut self, id: RequestId) -> Option<ProductRequest> {
        self.observe_request(id);
        if let Some(staged) = self.staged_requests.get(&id) {
            return Some(staged.clone());
        }
        self.snapshot.requests.get(&id).map(|v| v.record.clone())
    }

    fn put_request(&mut self, request: ProductRequest) {
        self.observe_request(request.id);
        self.staged_requests.insert(request.id, request);
    }

    fn insert_treatment(&mut self, treatment: Treatment) {
        self.staged_treatments.push(treatment);
    }

    fn patient_exists(&self, id: PatientId) -> bool {
        self.snapshot.patients.contains_key(&id)
    }

    fn staff_exists(&self, id: ActorId) -> bool {
        self.snapshot.staff.contains_key(&id)
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn with_transaction<T>(
        &self,
        body: &mut dyn FnMut(&mut dyn TxnView) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;

            // The lock is not held while the body runs; conflicts surface at
            // commit-time validation below.
            let mut txn = MemTxn::new(self.snapshot()?);

            // Terminal errors abort immediately; nothing was committed.
            let out = body(&mut txn)?;

            let mut state = self
                .state
                .write()
                .map_err(|_| EngineError::storage("ledger state lock poisoned"))?;
            if txn.validates_against(&state) {
                txn.commit_into(&mut state);
                return Ok(out);
            }
            drop(state);

            if attempts > self.retry_limit {
                return Err(EngineError::Contention { attempts });
            }
        }
    }

    fn product(&self, id: ProductId) -> Option<Product> {
        let state = self.state.read().ok()?;
        state.products.get(&id).map(|v| v.record.clone())
    }

    fn products(&self) -> Vec<Product> {
        match self.state.read() {
            Ok(state) => state.products.values().map(|v| v.record.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn movements_for(&self, product_id: ProductId) -> Vec<StockMovement> {
        match self.state.read() {
            Ok(state) => state
                .movements
                .iter()
                .filter(|m| m.product_id == product_id)
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn request(&self, id: RequestId) -> Option<ProductRequest> {
        let state = self.state.read().ok()?;
        state.requests.get(&id).map(|v| v.record.clone())
    }

    fn treatment(&self, id: TreatmentId) -> Option<Treatment> {
        let state = self.state.read().ok()?;
        state.treatments.get(&id).cloned()
    }

    fn register_patient(&self, patient: PatientRef) {
        if let Ok(mut state) = self.state.write() {
            state.patients.insert(patient.id, patient);
        }
    }

    fn register_staff(&self, staff: StaffRef) {
        if let Ok(mut state) = self.state.write() {
            state.staff.insert(staff.id, staff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clinistock_ledger::{MovementContext, MovementKind, NewProduct, StockMovement};

    fn seed_product(store: &InMemoryLedgerStore, stock: i64) -> ProductId {
        store
            .with_transaction(&mut |txn| {
                let mut product = Product::register(
                    NewProduct {
                        name: "Lidocaine 2%".to_string(),
                        category: "anesthetic".to_string(),
                        unit: "ampoule".to_string(),
                        minimum_stock: 2,
                        expiration_date: None,
                        invoice_number: None,
                    },
                    Utc::now(),
                )?;
                product.current_stock = stock;
                let id = product.id;
                txn.put_product(product);
                Ok(id)
            })
            .unwrap()
    }

    #[test]
    fn committed_writes_are_visible_and_versioned() {
        let store = InMemoryLedgerStore::default();
        let id = seed_product(&store, 10);
        assert_eq!(store.product(id).unwrap().current_stock, 10);
    }

    #[test]
    fn aborted_transaction_leaves_no_trace() {
        let store = InMemoryLedgerStore::default();
        let id = seed_product(&store, 10);

        let err = store
            .with_transaction::<()>(&mut |txn| {
                let mut product = txn.product(id).expect("seeded");
                product.current_stock = 0;
                txn.put_product(product);
                Err(EngineError::validation("quantity", "boom"))
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::ValidationFailed { .. }));
        assert_eq!(store.product(id).unwrap().current_stock, 10);
    }

    #[test]
    fn transaction_reads_its_own_staged_writes() {
        let store = InMemoryLedgerStore::default();
        let id = seed_product(&store, 10);

        store
            .with_transaction(&mut |txn| {
                let mut product = txn.product(id).expect("seeded");
                product.current_stock = 7;
                txn.put_product(product);
                assert_eq!(txn.product(id).expect("staged").current_stock, 7);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn conflicting_transaction_is_rerun_against_fresh_state() {
        let store = InMemoryLedgerStore::default();
        let id = seed_product(&store, 10);
        let mut attempts = 0;

        store
            .with_transaction(&mut |txn| {
                attempts += 1;
                let mut product = txn.product(id).expect("seeded");
                if attempts == 1 {
                    // Sneak in a competing commit between snapshot and commit.
                    store
                        .with_transaction(&mut |inner| {
                            let mut p = inner.product(id).expect("seeded");
                            p.current_stock -= 1;
                            inner.put_product(p);
                            Ok(())
                        })
                        .unwrap();
                }
                product.current_stock -= 2;
                txn.put_product(product);
                Ok(())
            })
            .unwrap();

        assert_eq!(attempts, 2);
        assert_eq!(store.product(id).unwrap().current_stock, 7);
    }

    #[test]
    fn contention_surfaces_after_retry_budget() {
        let store = InMemoryLedgerStore::new(0);
        let id = seed_product(&store, 10);

        let err = store
            .with_transaction(&mut |txn| {
                let mut product = txn.product(id).expect("seeded");
                store
                    .with_transaction(&mut |inner| {
                        let mut p = inner.product(id).expect("seeded");
                        p.current_stock -= 1;
                        inner.put_product(p);
                        Ok(())
                    })
                    .unwrap();
                product.current_stock -= 2;
                txn.put_product(product);
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::Contention { attempts: 1 }));
        // Only the inner commit landed.
        assert_eq!(store.product(id).unwrap().current_stock, 9);
    }

    #[test]
    fn movement_count_sees_committed_and_staged_entries() {
        let store = InMemoryLedgerStore::default();
        let id = seed_product(&store, 10);

        store
            .with_transaction(&mut |txn| {
                let mut product = txn.product(id).expect("seeded");
                let plan = product
                    .plan_movement(MovementKind::Exit, 1, Utc::now().date_naive())
                    .expect("valid exit");
                let movement = StockMovement::record(
                    &product,
                    &plan,
                    ActorId::new(),
                    Utc::now(),
                    MovementContext::none(),
                );
                product.apply(&plan);
                txn.put_product(product);
                txn.append_movement(movement);
                assert_eq!(txn.movement_count(id), 1);
                Ok(())
            })
            .unwrap();

        assert_eq!(store.movements_for(id).len(), 1);
    }
}

use serde::{Deserialize, Serialize};

use clinistock_core::{ActorId, EngineResult, PatientId, ProductId, RequestId, TreatmentId};
use clinistock_ledger::{Product, StockMovement};
use clinistock_requests::ProductRequest;
use clinistock_treatments::Treatment;

/// Directory entry for a patient.
///
/// Patient management proper lives upstream; the engine only needs existence
/// checks plus a display name for confirmations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRef {
    pub id: PatientId,
    pub name: String,
}

/// Directory entry for a staff member (doctor, approver, stock manager).
///
/// `role` is carried for audit attribution only; authorization happens
/// before the engine is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRef {
    pub id: ActorId,
    pub name: String,
    pub role: String,
}

/// Read/write view inside one transaction.
///
/// Reads reflect the transaction's snapshot plus its own staged writes
/// (read-your-writes); nothing staged here is visible to other transactions
/// until the enclosing [`LedgerStore::with_transaction`] call commits.
///
/// Movements are append-only by construction: there is no update or delete
/// for them. Implementations must only append a movement in a transaction
/// that also writes the movement's product, so that per-product conflict
/// detection covers the ledger.
pub trait TxnView {
    fn product(&mut self, id: ProductId) -> Option<Product>;
    fn put_product(&mut self, product: Product);
    /// Hard delete; legal only for products with zero movements (enforced by
    /// the stock service, not the store).
    fn delete_product(&mut self, id: ProductId);
    fn movement_count(&self, product_id: ProductId) -> usize;
    fn append_movement(&mut self, movement: StockMovement);

    fn request(&mut self, id: RequestId) -> Option<ProductRequest>;
    fn put_request(&mut self, request: ProductRequest);

    fn insert_treatment(&mut self, treatment: Treatment);

    fn patient_exists(&self, id: PatientId) -> bool;
    fn staff_exists(&self, id: ActorId) -> bool;
}

/// Durable keyed storage for the engine's records, accessed only through
/// atomic multi-record transactions.
///
/// ## Transaction semantics
///
/// `with_transaction` runs `body` against a consistent snapshot and commits
/// its staged writes atomically. Conflicting concurrent transactions on the
/// same record serialize: the losing transaction is re-executed against
/// fresh state, transparently to the caller, a bounded number of times
/// before surfacing `EngineError::Contention`. Terminal errors returned by
/// `body` abort the transaction immediately with nothing committed.
///
/// Consequences relied on throughout the engine:
/// - every decision read (stock sufficiency, expiration, request status)
///   happens inside the same transaction as the write it gates;
/// - a movement's `previous_stock`/`new_stock` reflect commit-time values,
///   because the body re-runs when its snapshot went stale;
/// - no partial state is ever visible mid-flight.
///
/// ## Read accessors
///
/// The remaining methods read committed state only, for the report layer and
/// audit verification. `register_patient`/`register_staff` seed the
/// directories the treatment service validates against.
pub trait LedgerStore: Send + Sync {
    fn with_transaction<T>(
        &self,
        body: &mut dyn FnMut(&mut dyn TxnView) -> EngineResult<T>,
    ) -> EngineResult<T>;

    fn product(&self, id: ProductId) -> Option<Product>;
    fn products(&self) -> Vec<Product>;
    /// Full committed movement history for one product, in commit order.
    fn movements_for(&self, product_id: ProductId) -> Vec<StockMovement>;
    fn request(&self, id: RequestId) -> Option<ProductRequest>;
    fn treatment(&self, id: TreatmentId) -> Option<Treatment>;

    fn register_patient(&self, patient: PatientRef);
    fn register_staff(&self, staff: StaffRef);
}

//! Infrastructure layer: transactional ledger store, engine services,
//! reports, configuration.

pub mod config;
pub mod engine;
pub mod reports;
pub mod services;
pub mod store;


pub use config::{DeductionPolicy, EngineConfig};
pub use engine::Engine;
pub use reports::{AlertSummary, ReportService};
pub use services::{
    AssociateProducts, ProductRemoval, RequestOutcome, RequestService, StockAdjustment,
    StockService, TreatmentOutcome, TreatmentService,
};
pub use store::{InMemoryLedgerStore, LedgerStore, PatientRef, StaffRef, TxnView};

//! Transactional ledger store boundary.
//!
//! This module defines an infrastructure-facing abstraction for atomic
//! multi-record transactions over the ledger without making any storage
//! assumptions.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use r#trait::{LedgerStore, PatientRef, StaffRef, TxnView};

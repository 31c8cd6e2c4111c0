//! Engine services: every stock mutation, whatever its origin, funnels
//! through [`stock::record_movement`] so that each business event produces
//! exactly one movement record inside its own transaction.

pub mod requests;
pub mod stock;
pub mod treatments;

pub use requests::{RequestOutcome, RequestService};
pub use stock::{ProductRemoval, StockAdjustment, StockService};
pub use treatments::{AssociateProducts, TreatmentOutcome, TreatmentService};

//! `clinistock-ledger` — product records and the append-only movement ledger.
//!
//! A product's `current_stock` is a materialized cache of its movement log:
//! replaying all committed movements from zero always reproduces the stored
//! value. Decision logic here is pure; persistence and atomicity live in
//! `clinistock-infra`.

pub mod movement;
pub mod product;

pub use movement::{MovementContext, MovementKind, StockMovement, replay};
pub use product::{MovementPlan, NewProduct, Product};

//! `clinistock-treatments` — clinical treatment records.
//!
//! A treatment is created in one step together with its used-product
//! children; partial treatments never exist. Every used product triggers
//! exactly one exit movement, orchestrated in `clinistock-infra`.

pub mod treatment;

pub use treatment::{Treatment, TreatmentItem, UsedProduct};

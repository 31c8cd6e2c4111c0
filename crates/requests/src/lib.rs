//! `clinistock-requests` — product request records and their approval state
//! machine.
//!
//! Transitions are pure and one-way: `pending → approved → fulfilled` or
//! `pending → rejected`. Stock effects of a transition are orchestrated in
//! `clinistock-infra`; this crate only decides whether a transition is legal.

pub mod request;

pub use request::{ProductRequest, RequestItem, RequestStatus, RequestedProduct};

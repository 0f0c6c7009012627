//! Material-supply matching and delivery lifecycle engine for construction
//! sites. Matches each request to a depot with sufficient stock and a
//! vehicle with enough capacity, then tracks the request through delivery
//! with a full audit trail.

pub mod clock;
pub mod depot;
pub mod error;
pub mod fleet;
pub mod geo;
pub mod lifecycle;
pub mod material;
pub mod matching;
pub mod request;
pub mod service;
pub mod store;
pub mod user;

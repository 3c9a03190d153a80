//! Domain layer for the Folio lifecycle engine
//!
//! Core models, errors and the ports the engine talks to.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};

//! service-core: Shared infrastructure for the costing services.
pub mod error;
pub mod middleware;
pub mod observability;

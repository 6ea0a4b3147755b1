//! Printshop API server library.
//!
//! Exposes the router and state so integration tests can drive the API
//! without binding a port.

pub mod middleware;
pub mod routes;
pub mod state;

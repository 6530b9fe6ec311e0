//! Atelier API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes, run
//! registry) so integration tests and the binary entrypoint share them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod progress;
pub mod response;
pub mod router;
pub mod routes;
pub mod runs;
pub mod state;

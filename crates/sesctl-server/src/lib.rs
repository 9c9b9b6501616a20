//! sesctl-server library surface, shared by the binary and the integration
//! tests.

pub mod config;
pub mod routes;
pub mod services;
pub mod state;

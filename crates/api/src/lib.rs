//! HTTP API: session handling, the access gate, and the ledger endpoints.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;

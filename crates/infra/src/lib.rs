//! Infrastructure layer: ledger stores, the account/membership directory and
//! the ledger engine that puts the access check in front of them.
//!
//! Each concern has an in-memory implementation (tests/dev) and a Postgres
//! one behind the same async trait.

pub mod directory;
pub mod ledger_engine;
pub mod store;

pub use directory::{Directory, InMemoryDirectory, PostgresDirectory};
pub use ledger_engine::{LedgerEngine, LedgerError, NewAssignment};
pub use store::{InMemoryLedgerStore, LedgerStore, PostgresLedgerStore, StoreError, Subject};

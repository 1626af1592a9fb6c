//! Persistence boundary for RMAs, the stock ledger, history and photo metadata.
//!
//! The traits make no storage assumptions: `InMemoryStore` backs tests and
//! local development, `PostgresStore` backs production.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{FailurePoint, InMemoryStore};
pub use postgres::PostgresStore;
pub use r#trait::{
    CommitOutcome, HistoryRepository, LedgerRepository, PhotoRepository, RmaRepository, RmaWrite,
    Store, StoreError, StoreResult, UnitOfWork,
};

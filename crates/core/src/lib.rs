//! `rmaledger-core`: shared building blocks for the RMA/stock-ledger domain.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the acting user, the error taxonomy and a clock abstraction.

pub mod clock;
pub mod error;
pub mod id;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::{
    ActorId, CustomerId, HistoryEntryId, LocationId, MovementId, PhotoId, ProductId, RmaId,
    SupplierId,
};

//! RMA (return merchandise authorization) domain module.
//!
//! Pure, deterministic rules for return cases: the entity and its
//! invariants, the year-scoped numbering format, the status → stock-effect
//! rule table, history entries and photo validation. Persistence and
//! orchestration live in `rmaledger-infra`.

pub mod filter;
pub mod history;
pub mod number;
pub mod photo;
pub mod rma;
pub mod rules;

pub use filter::RmaFilter;
pub use history::{HistoryAction, HistoryEntry, NewHistoryEntry};
pub use number::RmaNumber;
pub use photo::{ALLOWED_CONTENT_TYPES, MAX_PHOTO_BYTES, Photo, PhotoUpload, storage_key, validate_batch};
pub use rma::{NewRma, Rma, RmaCategory, RmaOrigin, RmaPatch, RmaStatus};
pub use rules::{
    STATUS_STOCK_RULES, StockEffect, TransitionPlan, creation_effect, creation_reason, plan_transition,
    rma_movement, status_effect, transition_reason,
};

//! Inventory ledger domain module.
//!
//! This crate contains the stock arithmetic behind every inventory movement,
//! implemented purely as deterministic domain logic (no IO, no storage).
//! Stores call [`plan_movement`] against the live record inside their own
//! transaction, so the floor-at-zero invariant is checked at write time.

pub mod ledger;

pub use ledger::{
    Direction, InventoryRecord, Movement, MovementPlan, MovementRequest, MovementResult,
    StockKey, plan_movement, replay,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rmaledger_core::{ActorId, DomainError, DomainResult, LocationId, MovementId, ProductId, RmaId};

/// Direction of an inventory movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Stock increase.
    Entrada,
    /// Stock decrease.
    Saida,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Entrada => "entrada",
            Direction::Saida => "saida",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "entrada" => Ok(Direction::Entrada),
            "saida" => Ok(Direction::Saida),
            other => Err(DomainError::validation(format!(
                "direction must be 'entrada' or 'saida' (got '{other}')"
            ))),
        }
    }

    /// Signed delta for a movement of `quantity` units in this direction.
    pub fn signed(&self, quantity: i64) -> i64 {
        match self {
            Direction::Entrada => quantity,
            Direction::Saida => -quantity,
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inventory records are keyed by (product, location).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub location_id: LocationId,
}

impl StockKey {
    pub fn new(product_id: ProductId, location_id: LocationId) -> Self {
        Self {
            product_id,
            location_id,
        }
    }
}

/// Current-quantity projection for one (product, location) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub product_id: ProductId,
    pub location_id: LocationId,
    /// Never negative.
    pub quantity: i64,
    pub updated_by: Option<ActorId>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl InventoryRecord {
    /// A pair that has never been seen holds zero units.
    pub fn empty(key: StockKey) -> Self {
        Self {
            product_id: key.product_id,
            location_id: key.location_id,
            quantity: 0,
            updated_by: None,
            updated_at: None,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.location_id)
    }
}

/// Request to move stock in or out of a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub product_id: ProductId,
    pub location_id: LocationId,
    /// Magnitude; the sign comes from `direction`.
    pub quantity: i64,
    pub direction: Direction,
    pub actor: ActorId,
    pub reason: String,
    /// Free-text reference, e.g. the originating RMA number.
    pub reference: Option<String>,
    /// RMA whose history receives a `movimentacao_estoque` entry.
    pub rma_id: Option<RmaId>,
}

impl MovementRequest {
    pub fn new(
        key: StockKey,
        quantity: i64,
        direction: Direction,
        actor: ActorId,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            product_id: key.product_id,
            location_id: key.location_id,
            quantity,
            direction,
            actor,
            reason: reason.into(),
            reference: None,
            rma_id: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn for_rma(mut self, rma_id: RmaId) -> Self {
        self.rma_id = Some(rma_id);
        self
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.location_id)
    }

    /// Shape checks that do not depend on the current stock level.
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("quantity must be a positive integer"));
        }
        if self.reason.trim().is_empty() {
            return Err(DomainError::validation("movement reason cannot be empty"));
        }
        Ok(())
    }

    /// Apply this request to the live record.
    ///
    /// Returns the updated record and the ledger row describing the change.
    /// The record passed in must be the one read inside the writing
    /// transaction; `quantity_before` is never backdated.
    pub fn apply_to(
        &self,
        record: &InventoryRecord,
        movement_id: MovementId,
        now: DateTime<Utc>,
    ) -> DomainResult<(InventoryRecord, Movement)> {
        self.validate()?;
        if record.key() != self.key() {
            return Err(DomainError::conflict("movement applied to a different inventory record"));
        }

        let plan = plan_movement(record.quantity, self.quantity, self.direction)?;

        let updated = InventoryRecord {
            product_id: record.product_id,
            location_id: record.location_id,
            quantity: plan.after,
            updated_by: Some(self.actor.clone()),
            updated_at: Some(now),
        };

        let movement = Movement {
            id: movement_id,
            product_id: self.product_id,
            location_id: self.location_id,
            actor: self.actor.clone(),
            quantity: self.quantity,
            direction: self.direction,
            quantity_before: plan.before,
            quantity_after: plan.after,
            reason: self.reason.clone(),
            reference: self.reference.clone(),
            rma_id: self.rma_id,
            created_at: now,
        };

        Ok((updated, movement))
    }
}

/// Append-only ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub actor: ActorId,
    pub quantity: i64,
    pub direction: Direction,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub reason: String,
    pub reference: Option<String>,
    pub rma_id: Option<RmaId>,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.location_id)
    }

    pub fn signed_delta(&self) -> i64 {
        self.direction.signed(self.quantity)
    }

    /// `quantity_after = quantity_before ± quantity`.
    pub fn is_consistent(&self) -> bool {
        self.quantity_before.checked_add(self.signed_delta()) == Some(self.quantity_after)
            && self.quantity_after >= 0
    }
}

/// Outcome of a committed movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementResult {
    pub record: InventoryRecord,
    pub movement: Movement,
}

/// Before/after quantities of a movement that passed the floor check.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MovementPlan {
    pub before: i64,
    pub after: i64,
}

/// Compute the quantity after moving `quantity` units from a record holding `before`.
pub fn plan_movement(before: i64, quantity: i64, direction: Direction) -> DomainResult<MovementPlan> {
    if quantity <= 0 {
        return Err(DomainError::validation("quantity must be a positive integer"));
    }
    if before < 0 {
        return Err(DomainError::conflict(format!(
            "inventory record holds a negative quantity ({before})"
        )));
    }

    let after = match direction {
        Direction::Entrada => before
            .checked_add(quantity)
            .ok_or_else(|| DomainError::validation("quantity overflows the inventory record"))?,
        Direction::Saida => {
            if quantity > before {
                return Err(DomainError::insufficient_stock(before, quantity));
            }
            before - quantity
        }
    };

    Ok(MovementPlan { before, after })
}

/// Fold a movement log into a quantity, starting from zero.
pub fn replay<'a>(movements: impl IntoIterator<Item = &'a Movement>) -> i64 {
    movements.into_iter().map(Movement::signed_delta).sum()
}

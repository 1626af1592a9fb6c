use serde::{Deserialize, Serialize};

use rmaledger_core::{LocationId, ProductId};
use rmaledger_inventory::{Direction, InventoryRecord, Movement, MovementResult};
use rmaledger_returns::RmaStatus;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: RmaStatus,
    #[serde(default)]
    pub return_to_stock: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReturnToStockRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManualMovementRequest {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub quantity: i64,
    pub direction: Direction,
    pub reason: String,
    #[serde(default)]
    pub reference: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct StockResponse {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub quantity: i64,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<InventoryRecord> for StockResponse {
    fn from(record: InventoryRecord) -> Self {
        Self {
            product_id: record.product_id,
            location_id: record.location_id,
            quantity: record.quantity,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovementResponse {
    pub stock: StockResponse,
    pub movement: Movement,
}

impl From<MovementResult> for MovementResponse {
    fn from(result: MovementResult) -> Self {
        Self {
            stock: result.record.into(),
            movement: result.movement,
        }
    }
}

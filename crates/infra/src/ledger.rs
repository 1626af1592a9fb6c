//! Inventory ledger facade over the store.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use rmaledger_core::{Clock, DomainError};
use rmaledger_inventory::{InventoryRecord, Movement, MovementRequest, MovementResult, StockKey, replay};

use crate::store::{Store, StoreError, StoreResult, UnitOfWork};

/// Projection vs. log comparison for one inventory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub key: StockKey,
    /// Quantity held by the materialised record.
    pub recorded: i64,
    /// Quantity obtained by folding the movement log from zero.
    pub replayed: i64,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.recorded == self.replayed
    }
}

pub struct InventoryLedger<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ?Sized> Clone for InventoryLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S> InventoryLedger<S>
where
    S: Store + ?Sized,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Apply one movement atomically (record, ledger row and, for RMA-bound
    /// movements, the `movimentacao_estoque` history row).
    #[instrument(
        skip(self, request),
        fields(
            product_id = %request.product_id,
            location_id = %request.location_id,
            direction = request.direction.as_str(),
            quantity = request.quantity
        ),
        err
    )]
    pub async fn move_stock(&self, request: MovementRequest) -> StoreResult<MovementResult> {
        request.validate()?;
        let outcome = self
            .store
            .commit(UnitOfWork::new(self.clock.now()).with_movement(request))
            .await?;
        let result = outcome
            .movements
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Storage("commit returned no movement".to_string()))?;

        info!(
            movement_id = %result.movement.id,
            before = result.movement.quantity_before,
            after = result.movement.quantity_after,
            "stock moved"
        );
        Ok(result)
    }

    pub async fn record(&self, key: StockKey) -> StoreResult<InventoryRecord> {
        self.store.inventory(key).await
    }

    pub async fn quantity(&self, key: StockKey) -> StoreResult<i64> {
        Ok(self.record(key).await?.quantity)
    }

    /// Movement log, newest first.
    pub async fn movements(&self, key: StockKey) -> StoreResult<Vec<Movement>> {
        self.store.movements(key).await
    }

    /// Fold the movement log and compare it with the stored quantity.
    pub async fn reconcile(&self, key: StockKey) -> StoreResult<Reconciliation> {
        let record = self.store.inventory(key).await?;
        let log = self.store.movements(key).await?;
        if let Some(broken) = log.iter().find(|m| !m.is_consistent()) {
            return Err(StoreError::Rejected(DomainError::conflict(format!(
                "movement {} is internally inconsistent",
                broken.id
            ))));
        }
        Ok(Reconciliation {
            key,
            recorded: record.quantity,
            replayed: replay(&log),
        })
    }
}

//! RMA service: the orchestrator behind every public RMA operation.
//!
//! ```text
//! caller
//!   ↓
//! 1. validate input (domain types)
//!   ↓
//! 2. look up the stock effect in the rule tables
//!   ↓
//! 3. commit one UnitOfWork (RMA write + creation history + movements
//!    + ledger history + photos)
//!   ↓
//! 4. record secondary audit entries (fire-and-log)
//! ```
//!
//! Steps 1-3 either all take effect or none do. Step 4 runs after the commit
//! and cannot undo it.

mod error;

pub use error::{ServiceError, ServiceResult};

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use rmaledger_core::{ActorId, Clock, LocationId, PhotoId, ProductId, RmaId};
use rmaledger_inventory::{Direction, InventoryRecord, Movement, MovementRequest, MovementResult, StockKey};
use rmaledger_returns::{
    HistoryEntry, NewHistoryEntry, NewRma, Photo, PhotoUpload, Rma, RmaFilter, RmaPatch, RmaStatus,
    TransitionPlan, creation_effect, creation_reason, plan_transition, rma_movement,
    transition_reason, validate_batch,
};

use crate::audit::AuditTrail;
use crate::blob::BlobStore;
use crate::ledger::{InventoryLedger, Reconciliation};
use crate::master_data::MasterData;
use crate::numbering::NumberingAuthority;
use crate::photos::PhotoAttachmentManager;
use crate::store::{Store, StoreError, UnitOfWork};

/// Attempts at claiming a fresh RMA number before giving up with `Conflict`.
pub const MAX_NUMBER_ATTEMPTS: usize = 5;

/// Reason recorded when a return-to-stock call does not supply one.
pub const DEFAULT_RETURN_REASON: &str = "Devolução ao estoque";

/// An RMA joined with the display names of the records it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RmaDetails {
    #[serde(flatten)]
    pub rma: Rma,
    pub product_name: Option<String>,
    pub location_name: Option<String>,
    pub customer_name: Option<String>,
    pub supplier_name: Option<String>,
}

pub struct RmaService<S: ?Sized, B: ?Sized> {
    store: Arc<S>,
    blobs: Arc<B>,
    master_data: Arc<dyn MasterData>,
    clock: Arc<dyn Clock>,
    numbering: NumberingAuthority<S>,
    ledger: InventoryLedger<S>,
    audit: AuditTrail<S>,
    photos: PhotoAttachmentManager<S, B>,
}

impl<S: ?Sized, B: ?Sized> Clone for RmaService<S, B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            blobs: self.blobs.clone(),
            master_data: self.master_data.clone(),
            clock: self.clock.clone(),
            numbering: self.numbering.clone(),
            ledger: self.ledger.clone(),
            audit: self.audit.clone(),
            photos: self.photos.clone(),
        }
    }
}

impl<S, B> RmaService<S, B>
where
    S: Store + ?Sized,
    B: BlobStore + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        blobs: Arc<B>,
        master_data: Arc<dyn MasterData>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            numbering: NumberingAuthority::new(store.clone()),
            ledger: InventoryLedger::new(store.clone(), clock.clone()),
            audit: AuditTrail::new(store.clone(), clock.clone()),
            photos: PhotoAttachmentManager::new(store.clone(), blobs.clone(), clock.clone()),
            store,
            blobs,
            master_data,
            clock,
        }
    }

    pub fn ledger(&self) -> &InventoryLedger<S> {
        &self.ledger
    }

    /// Open a new case.
    ///
    /// Photos are validated before anything else happens, uploaded before the
    /// commit and inserted in the same unit of work as the RMA. The `criacao`
    /// entry is part of that commit too, ahead of any stock movement it causes.
    /// A customer return deducts its quantity from the location in that same
    /// commit.
    #[instrument(
        skip(self, input, photos),
        fields(origin = input.origin.as_str(), quantity = input.quantity, photo_count = photos.len()),
        err
    )]
    pub async fn create_rma(
        &self,
        input: NewRma,
        actor: ActorId,
        photos: Vec<PhotoUpload>,
    ) -> ServiceResult<Rma> {
        input.validate()?;
        if !photos.is_empty() {
            validate_batch(&photos)?;
        }

        let rma_id = RmaId::new();
        let uploaded = if photos.is_empty() {
            Vec::new()
        } else {
            self.photos.upload_batch(rma_id, &photos, &actor).await?
        };

        let rma = match self.commit_new_rma(rma_id, &input, &actor, uploaded.clone()).await {
            Ok(rma) => rma,
            Err(err) => {
                self.photos.discard(&uploaded).await;
                return Err(err);
            }
        };

        if !uploaded.is_empty() {
            self.audit
                .record(NewHistoryEntry::photos_added(rma.id, uploaded.len(), actor.clone()))
                .await;
        }

        info!(rma_id = %rma.id, number = %rma.number, actor = %actor, "rma created");
        Ok(rma)
    }

    async fn commit_new_rma(
        &self,
        rma_id: RmaId,
        input: &NewRma,
        actor: &ActorId,
        photos: Vec<Photo>,
    ) -> ServiceResult<Rma> {
        let year = self.clock.current_year();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let now = self.clock.now();
            let number = self.numbering.next_number(year).await?;
            let rma = Rma::open(rma_id, number, input.clone(), actor.clone(), now)?;

            let movement = creation_effect(rma.origin)
                .resolve(false)
                .map(|direction| rma_movement(&rma, direction, actor.clone(), creation_reason(&rma)));
            let work = UnitOfWork::new(now)
                .insert_rma(rma.clone())
                .with_history(NewHistoryEntry::creation(&rma))
                .with_movements(movement)
                .with_photos(photos.clone());

            match self.store.commit(work).await {
                Ok(_) => return Ok(rma),
                Err(StoreError::DuplicateNumber(taken)) if attempt < MAX_NUMBER_ATTEMPTS => {
                    warn!(number = %taken, attempt, "rma number taken concurrently, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// RMAs matching `filter`, newest first.
    #[instrument(skip(self, filter), err)]
    pub async fn list_rmas(&self, filter: RmaFilter) -> ServiceResult<Vec<Rma>> {
        Ok(self.store.list_rmas(&filter).await?)
    }

    pub async fn get_rma(&self, id: RmaId) -> ServiceResult<Rma> {
        self.store
            .get_rma(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("rma {id}")))
    }

    pub async fn get_rma_details(&self, id: RmaId) -> ServiceResult<RmaDetails> {
        let rma = self.get_rma(id).await?;
        let product_name = self.master_data.product_name(rma.product_id).await?;
        let location_name = self.master_data.location_name(rma.location_id).await?;
        let customer_name = match rma.customer_id {
            Some(customer) => self.master_data.customer_name(customer).await?,
            None => None,
        };
        let supplier_name = match rma.supplier_id {
            Some(supplier) => self.master_data.supplier_name(supplier).await?,
            None => None,
        };
        Ok(RmaDetails {
            rma,
            product_name,
            location_name,
            customer_name,
            supplier_name,
        })
    }

    /// Move an RMA to `target`, applying the stock effect the rule table
    /// assigns to (target, origin). Moving to the current status is a no-op.
    #[instrument(skip(self, actor), fields(rma_id = %id, target = target.as_str()), err)]
    pub async fn update_status(
        &self,
        id: RmaId,
        target: RmaStatus,
        actor: ActorId,
        return_to_stock: bool,
    ) -> ServiceResult<Rma> {
        let rma = self.get_rma(id).await?;
        let (from, to, stock) = match plan_transition(&rma, target, return_to_stock)? {
            TransitionPlan::Unchanged => return Ok(rma),
            TransitionPlan::Apply { from, to, stock } => (from, to, stock),
        };

        let now = self.clock.now();
        let updated = rma.with_status(to, actor.clone(), now);
        let movement = stock.map(|direction| {
            rma_movement(&updated, direction, actor.clone(), transition_reason(&updated, to))
        });
        self.store
            .commit(
                UnitOfWork::new(now)
                    .update_rma(updated.clone(), from)
                    .with_movements(movement),
            )
            .await?;

        self.audit
            .record(NewHistoryEntry::status_change(id, from, to, actor.clone()))
            .await;

        info!(
            rma_id = %id,
            from = from.as_str(),
            to = to.as_str(),
            restocked = stock.is_some(),
            actor = %actor,
            "rma status changed"
        );
        Ok(updated)
    }

    /// Cancel a case, returning its quantity to stock.
    pub async fn cancel(&self, id: RmaId, actor: ActorId) -> ServiceResult<Rma> {
        self.update_status(id, RmaStatus::Cancelado, actor, false).await
    }

    /// Delete a cancelled case with its history and photos. Photo blobs are
    /// removed best-effort; the ledger is not touched.
    #[instrument(skip(self, actor), fields(rma_id = %id), err)]
    pub async fn delete(&self, id: RmaId, actor: ActorId) -> ServiceResult<()> {
        let rma = self.get_rma(id).await?;
        rma.ensure_deletable()?;

        let photos = self.store.delete_rma(id).await?;
        for photo in &photos {
            if let Err(err) = self.blobs.delete(&photo.storage_key).await {
                warn!(key = %photo.storage_key, error = %err, "photo blob left behind by rma deletion");
            }
        }

        info!(rma_id = %id, number = %rma.number, photos = photos.len(), actor = %actor, "rma deleted");
        Ok(())
    }

    /// Put the case's quantity back into the location's stock.
    #[instrument(skip(self, actor, reason), fields(rma_id = %id), err)]
    pub async fn return_to_stock(
        &self,
        id: RmaId,
        actor: ActorId,
        reason: Option<String>,
    ) -> ServiceResult<MovementResult> {
        let rma = self.get_rma(id).await?;
        rma.ensure_not_cancelled()?;

        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_RETURN_REASON.to_string());
        let now = self.clock.now();
        let touched = rma.touched(actor.clone(), now);
        let request = rma_movement(&touched, Direction::Entrada, actor.clone(), reason);

        let outcome = self
            .store
            .commit(
                UnitOfWork::new(now)
                    .update_rma(touched, rma.status)
                    .with_movement(request),
            )
            .await?;
        let result = outcome
            .movements
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Storage("commit returned no movement".to_string()))?;

        info!(rma_id = %id, quantity = rma.quantity, actor = %actor, "rma returned to stock");
        Ok(result)
    }

    /// Edit category, reason, notes or counterpart. Quantity and status are
    /// not editable here.
    #[instrument(skip(self, patch, actor), fields(rma_id = %id), err)]
    pub async fn update_fields(&self, id: RmaId, patch: RmaPatch, actor: ActorId) -> ServiceResult<Rma> {
        let rma = self.get_rma(id).await?;
        let updated = rma.apply_patch(&patch, actor, self.clock.now())?;

        self.store
            .commit(UnitOfWork::new(updated.updated_at).update_rma(updated.clone(), rma.status))
            .await?;
        self.audit.record(NewHistoryEntry::update(&rma, &updated)).await;
        Ok(updated)
    }

    #[instrument(skip(self, files, actor), fields(rma_id = %id, count = files.len()), err)]
    pub async fn attach_photos(
        &self,
        id: RmaId,
        files: Vec<PhotoUpload>,
        actor: ActorId,
    ) -> ServiceResult<Vec<Photo>> {
        self.get_rma(id).await?;
        let photos = self.photos.attach(id, &files, &actor).await?;
        self.audit
            .record(NewHistoryEntry::photos_added(id, photos.len(), actor))
            .await;
        Ok(photos)
    }

    pub async fn remove_photo(&self, photo_id: PhotoId, actor: ActorId) -> ServiceResult<()> {
        self.photos.remove(photo_id, &actor).await?;
        Ok(())
    }

    /// History of a case, newest first.
    pub async fn get_history(&self, id: RmaId) -> ServiceResult<Vec<HistoryEntry>> {
        self.get_rma(id).await?;
        Ok(self.audit.history(id).await?)
    }

    /// Photos of a case, newest first.
    pub async fn get_photos(&self, id: RmaId) -> ServiceResult<Vec<Photo>> {
        self.get_rma(id).await?;
        Ok(self.store.photos(id).await?)
    }

    pub async fn stock(&self, product_id: ProductId, location_id: LocationId) -> ServiceResult<InventoryRecord> {
        Ok(self.ledger.record(StockKey::new(product_id, location_id)).await?)
    }

    /// Movement log of one inventory record, newest first.
    pub async fn movements(&self, product_id: ProductId, location_id: LocationId) -> ServiceResult<Vec<Movement>> {
        Ok(self.ledger.movements(StockKey::new(product_id, location_id)).await?)
    }

    /// Manual stock movement (not tied to a lifecycle event).
    pub async fn move_stock(&self, request: MovementRequest) -> ServiceResult<MovementResult> {
        Ok(self.ledger.move_stock(request).await?)
    }

    pub async fn reconcile(&self, product_id: ProductId, location_id: LocationId) -> ServiceResult<Reconciliation> {
        Ok(self.ledger.reconcile(StockKey::new(product_id, location_id)).await?)
    }
}

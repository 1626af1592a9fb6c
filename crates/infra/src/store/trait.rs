use chrono::{DateTime, Utc};
use thiserror::Error;

use rmaledger_core::{DomainError, PhotoId, RmaId};
use rmaledger_inventory::{InventoryRecord, Movement, MovementRequest, MovementResult, StockKey};
use rmaledger_returns::{HistoryEntry, NewHistoryEntry, Photo, Rma, RmaFilter, RmaNumber, RmaStatus};

/// Storage operation error.
///
/// These are infrastructure outcomes; deterministic business failures raised
/// while applying a unit of work (e.g. the stock floor) travel as `Rejected`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// `numero_rma` is already taken; the caller may recompute and retry.
    #[error("rma number {0} already exists")]
    DuplicateNumber(String),

    /// Optimistic check failed (the row changed since it was read).
    #[error("concurrent modification: {0}")]
    Conflict(String),

    #[error(transparent)]
    Rejected(#[from] DomainError),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// How a unit of work touches the `rmas` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RmaWrite {
    Insert(Rma),
    /// Replace the row, provided its status is still `expected_status`.
    Update { rma: Rma, expected_status: RmaStatus },
}

impl RmaWrite {
    pub fn rma(&self) -> &Rma {
        match self {
            RmaWrite::Insert(rma) => rma,
            RmaWrite::Update { rma, .. } => rma,
        }
    }
}

/// Writes a store commits atomically, in this order: an optional RMA write,
/// history entries stamped `at`, ledger movements (with their
/// `movimentacao_estoque` history rows), then photo rows.
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    pub at: DateTime<Utc>,
    pub rma: Option<RmaWrite>,
    pub history: Vec<NewHistoryEntry>,
    pub movements: Vec<MovementRequest>,
    pub photos: Vec<Photo>,
}

impl UnitOfWork {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            rma: None,
            history: Vec::new(),
            movements: Vec::new(),
            photos: Vec::new(),
        }
    }

    pub fn insert_rma(mut self, rma: Rma) -> Self {
        self.rma = Some(RmaWrite::Insert(rma));
        self
    }

    pub fn update_rma(mut self, rma: Rma, expected_status: RmaStatus) -> Self {
        self.rma = Some(RmaWrite::Update { rma, expected_status });
        self
    }

    pub fn with_history(mut self, entry: NewHistoryEntry) -> Self {
        self.history.push(entry);
        self
    }

    pub fn with_movement(mut self, request: MovementRequest) -> Self {
        self.movements.push(request);
        self
    }

    pub fn with_movements(mut self, requests: impl IntoIterator<Item = MovementRequest>) -> Self {
        self.movements.extend(requests);
        self
    }

    pub fn with_photos(mut self, photos: Vec<Photo>) -> Self {
        self.photos.extend(photos);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rma.is_none() && self.history.is_empty() && self.movements.is_empty() && self.photos.is_empty()
    }
}

/// What a successful commit produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    /// One result per requested movement, in request order.
    pub movements: Vec<MovementResult>,
}

#[async_trait::async_trait]
pub trait RmaRepository: Send + Sync {
    async fn get_rma(&self, id: RmaId) -> StoreResult<Option<Rma>>;

    /// Matching RMAs, newest first.
    async fn list_rmas(&self, filter: &RmaFilter) -> StoreResult<Vec<Rma>>;

    /// Highest number ever issued in `year`, if any.
    ///
    /// Numbers of deleted RMAs still count: the movement ledger keeps them
    /// as references, so they are never handed out again.
    async fn latest_number(&self, year: i32) -> StoreResult<Option<RmaNumber>>;

    /// Delete an RMA together with its history and photo rows.
    ///
    /// Returns the removed photos so their blobs can be cleaned up.
    async fn delete_rma(&self, id: RmaId) -> StoreResult<Vec<Photo>>;
}

#[async_trait::async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Current record; an unseen pair reads as zero.
    async fn inventory(&self, key: StockKey) -> StoreResult<InventoryRecord>;

    /// Movement log for a pair, newest first.
    async fn movements(&self, key: StockKey) -> StoreResult<Vec<Movement>>;
}

#[async_trait::async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn append_history(&self, entry: HistoryEntry) -> StoreResult<()>;

    /// History of an RMA, newest first.
    async fn history(&self, rma_id: RmaId) -> StoreResult<Vec<HistoryEntry>>;
}

#[async_trait::async_trait]
pub trait PhotoRepository: Send + Sync {
    /// Photos of an RMA, newest first.
    async fn photos(&self, rma_id: RmaId) -> StoreResult<Vec<Photo>>;

    async fn photo(&self, id: PhotoId) -> StoreResult<Option<Photo>>;

    async fn delete_photo(&self, id: PhotoId) -> StoreResult<()>;
}

/// Full persistence boundary used by the RMA service.
///
/// Implementations must apply a [`UnitOfWork`] atomically: either every write
/// persists or none does. Movements are applied against the record as it is
/// at commit time, so `quantity_before` always reflects the live value.
#[async_trait::async_trait]
pub trait Store: RmaRepository + LedgerRepository + HistoryRepository + PhotoRepository {
    async fn commit(&self, work: UnitOfWork) -> StoreResult<CommitOutcome>;
}

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, RwLock};

use rmaledger_core::{HistoryEntryId, MovementId, PhotoId, RmaId};
use rmaledger_inventory::{InventoryRecord, Movement, MovementResult, StockKey};
use rmaledger_returns::{HistoryEntry, NewHistoryEntry, Photo, Rma, RmaFilter, RmaNumber};

use super::r#trait::{
    CommitOutcome, HistoryRepository, LedgerRepository, PhotoRepository, RmaRepository, RmaWrite,
    Store, StoreError, StoreResult, UnitOfWork,
};

/// Points where the in-memory store can be told to fail, for exercising
/// rollback and audit error boundaries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    /// Every `commit` fails after staging, before anything is visible.
    Commit,
    /// `commit` fails when the unit of work carries photo rows.
    PhotoInsert,
    /// `append_history` fails.
    HistoryAppend,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    rmas: HashMap<RmaId, Rma>,
    /// Every number ever issued. Deleting an RMA leaves its number here.
    numbers: HashSet<RmaNumber>,
    stock: HashMap<StockKey, InventoryRecord>,
    movements: Vec<Movement>,
    history: Vec<HistoryEntry>,
    photos: Vec<Photo>,
}

/// In-memory store.
///
/// Intended for tests/dev. A single lock guards every table; a commit is
/// applied to a staged copy and swapped in only when every write succeeded.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    failures: Mutex<HashSet<FailurePoint>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, point: FailurePoint) {
        self.failures
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(point);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }

    fn should_fail(&self, point: FailurePoint) -> bool {
        self.failures
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(&point)
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }

    fn apply(&self, staged: &mut Tables, work: UnitOfWork) -> StoreResult<CommitOutcome> {
        match work.rma {
            Some(RmaWrite::Insert(rma)) => {
                if staged.numbers.contains(&rma.number) {
                    return Err(StoreError::DuplicateNumber(rma.number.to_string()));
                }
                if staged.rmas.contains_key(&rma.id) {
                    return Err(StoreError::Conflict(format!("rma {} already exists", rma.id)));
                }
                staged.numbers.insert(rma.number);
                staged.rmas.insert(rma.id, rma);
            }
            Some(RmaWrite::Update { rma, expected_status }) => {
                let current = staged
                    .rmas
                    .get(&rma.id)
                    .ok_or_else(|| StoreError::NotFound(format!("rma {}", rma.id)))?;
                if current.status != expected_status {
                    return Err(StoreError::Conflict(format!(
                        "rma {} is '{}', expected '{}'",
                        rma.id, current.status, expected_status
                    )));
                }
                staged.rmas.insert(rma.id, rma);
            }
            None => {}
        }

        for entry in work.history {
            if !staged.rmas.contains_key(&entry.rma_id) {
                return Err(StoreError::NotFound(format!("rma {}", entry.rma_id)));
            }
            staged.history.push(entry.into_entry(HistoryEntryId::new(), work.at));
        }

        let mut outcome = CommitOutcome::default();
        for request in work.movements {
            if let Some(rma_id) = request.rma_id {
                if !staged.rmas.contains_key(&rma_id) {
                    return Err(StoreError::NotFound(format!("rma {rma_id}")));
                }
            }

            let key = request.key();
            let current = staged
                .stock
                .get(&key)
                .cloned()
                .unwrap_or_else(|| InventoryRecord::empty(key));
            let (record, movement) = request.apply_to(&current, MovementId::new(), work.at)?;

            if let Some(entry) = NewHistoryEntry::stock_movement(&movement) {
                staged.history.push(entry.into_entry(HistoryEntryId::new(), work.at));
            }
            staged.stock.insert(key, record.clone());
            staged.movements.push(movement.clone());
            outcome.movements.push(MovementResult { record, movement });
        }

        if !work.photos.is_empty() {
            if self.should_fail(FailurePoint::PhotoInsert) {
                return Err(StoreError::Storage("injected failure: photo insert".to_string()));
            }
            for photo in work.photos {
                if !staged.rmas.contains_key(&photo.rma_id) {
                    return Err(StoreError::NotFound(format!("rma {}", photo.rma_id)));
                }
                staged.photos.push(photo);
            }
        }

        if self.should_fail(FailurePoint::Commit) {
            return Err(StoreError::Storage("injected failure: commit".to_string()));
        }

        Ok(outcome)
    }
}

/// Newest first; insertion order breaks timestamp ties.
fn newest_first<T>(mut rows: Vec<T>) -> Vec<T> {
    rows.reverse();
    rows
}

#[async_trait::async_trait]
impl RmaRepository for InMemoryStore {
    async fn get_rma(&self, id: RmaId) -> StoreResult<Option<Rma>> {
        Ok(self.read()?.rmas.get(&id).cloned())
    }

    async fn list_rmas(&self, filter: &RmaFilter) -> StoreResult<Vec<Rma>> {
        let tables = self.read()?;
        let mut rmas: Vec<Rma> = tables
            .rmas
            .values()
            .filter(|rma| filter.matches(rma))
            .cloned()
            .collect();
        rmas.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.number.cmp(&a.number))
        });
        Ok(rmas)
    }

    async fn latest_number(&self, year: i32) -> StoreResult<Option<RmaNumber>> {
        Ok(self
            .read()?
            .numbers
            .iter()
            .filter(|n| n.year() == year)
            .max()
            .copied())
    }

    async fn delete_rma(&self, id: RmaId) -> StoreResult<Vec<Photo>> {
        let mut tables = self.write()?;
        tables
            .rmas
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("rma {id}")))?;
        tables.history.retain(|h| h.rma_id != id);

        let (removed, kept): (Vec<Photo>, Vec<Photo>) =
            std::mem::take(&mut tables.photos).into_iter().partition(|p| p.rma_id == id);
        tables.photos = kept;
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl LedgerRepository for InMemoryStore {
    async fn inventory(&self, key: StockKey) -> StoreResult<InventoryRecord> {
        Ok(self
            .read()?
            .stock
            .get(&key)
            .cloned()
            .unwrap_or_else(|| InventoryRecord::empty(key)))
    }

    async fn movements(&self, key: StockKey) -> StoreResult<Vec<Movement>> {
        let tables = self.read()?;
        Ok(newest_first(
            tables.movements.iter().filter(|m| m.key() == key).cloned().collect(),
        ))
    }
}

#[async_trait::async_trait]
impl HistoryRepository for InMemoryStore {
    async fn append_history(&self, entry: HistoryEntry) -> StoreResult<()> {
        if self.should_fail(FailurePoint::HistoryAppend) {
            return Err(StoreError::Storage("injected failure: history append".to_string()));
        }
        let mut tables = self.write()?;
        if !tables.rmas.contains_key(&entry.rma_id) {
            return Err(StoreError::NotFound(format!("rma {}", entry.rma_id)));
        }
        tables.history.push(entry);
        Ok(())
    }

    async fn history(&self, rma_id: RmaId) -> StoreResult<Vec<HistoryEntry>> {
        let tables = self.read()?;
        Ok(newest_first(
            tables.history.iter().filter(|h| h.rma_id == rma_id).cloned().collect(),
        ))
    }
}

#[async_trait::async_trait]
impl PhotoRepository for InMemoryStore {
    async fn photos(&self, rma_id: RmaId) -> StoreResult<Vec<Photo>> {
        let tables = self.read()?;
        Ok(newest_first(
            tables.photos.iter().filter(|p| p.rma_id == rma_id).cloned().collect(),
        ))
    }

    async fn photo(&self, id: PhotoId) -> StoreResult<Option<Photo>> {
        Ok(self.read()?.photos.iter().find(|p| p.id == id).cloned())
    }

    async fn delete_photo(&self, id: PhotoId) -> StoreResult<()> {
        let mut tables = self.write()?;
        let before = tables.photos.len();
        tables.photos.retain(|p| p.id != id);
        if tables.photos.len() == before {
            return Err(StoreError::NotFound(format!("photo {id}")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    async fn commit(&self, work: UnitOfWork) -> StoreResult<CommitOutcome> {
        let mut tables = self.write()?;
        let mut staged = tables.clone();
        let outcome = self.apply(&mut staged, work)?;
        *tables = staged;
        Ok(outcome)
    }
}

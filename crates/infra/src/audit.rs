//! Audit trail: append-only history writes that never fail the caller.

use std::sync::Arc;

use tracing::warn;

use rmaledger_core::{Clock, HistoryEntryId, RmaId};
use rmaledger_returns::{HistoryEntry, NewHistoryEntry};

use crate::store::{HistoryRepository, StoreResult};

/// Secondary audit writes, run after the primary commit.
///
/// A failed write is logged at `warn` and swallowed; the primary operation
/// has already committed and is not rolled back.
pub struct AuditTrail<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ?Sized> Clone for AuditTrail<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S> AuditTrail<S>
where
    S: HistoryRepository + ?Sized,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn record(&self, entry: NewHistoryEntry) {
        let rma_id = entry.rma_id;
        let action = entry.action;
        let row = entry.into_entry(HistoryEntryId::new(), self.clock.now());
        if let Err(err) = self.store.append_history(row).await {
            warn!(
                rma_id = %rma_id,
                action = action.as_str(),
                error = %err,
                "audit entry could not be written"
            );
        }
    }

    /// History of an RMA, newest first.
    pub async fn history(&self, rma_id: RmaId) -> StoreResult<Vec<HistoryEntry>> {
        self.store.history(rma_id).await
    }
}

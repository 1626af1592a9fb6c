use std::sync::Arc;

use rmaledger_returns::RmaNumber;

use crate::store::{RmaRepository, StoreResult};

/// Issues year-scoped RMA numbers.
///
/// The number is derived from the highest one ever issued (deleted RMAs
/// included), so two concurrent
/// creations can compute the same value; the store's unique constraint
/// rejects the loser, which recomputes and retries.
pub struct NumberingAuthority<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for NumberingAuthority<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S> NumberingAuthority<S>
where
    S: RmaRepository + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn next_number(&self, year: i32) -> StoreResult<RmaNumber> {
        let latest = self.store.latest_number(year).await?;
        Ok(RmaNumber::next_after(year, latest)?)
    }
}

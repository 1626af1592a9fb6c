use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use rmaledger_core::{CustomerId, LocationId, SupplierId};

use crate::rma::{Rma, RmaOrigin, RmaStatus};

/// List filters. Every set field must match; dates are inclusive calendar days (UTC).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RmaFilter {
    #[serde(default)]
    pub origin: Option<RmaOrigin>,
    #[serde(default)]
    pub status: Option<RmaStatus>,
    #[serde(default)]
    pub location_id: Option<LocationId>,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
    /// Case-insensitive substring over number, reason and notes.
    #[serde(default)]
    pub search: Option<String>,
}

impl RmaFilter {
    /// Trimmed search term, `None` when blank.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn matches(&self, rma: &Rma) -> bool {
        if self.origin.is_some_and(|o| o != rma.origin) {
            return false;
        }
        if self.status.is_some_and(|s| s != rma.status) {
            return false;
        }
        if self.location_id.is_some_and(|l| l != rma.location_id) {
            return false;
        }
        if self.customer_id.is_some() && self.customer_id != rma.customer_id {
            return false;
        }
        if self.supplier_id.is_some() && self.supplier_id != rma.supplier_id {
            return false;
        }

        let day = rma.created_at.date_naive();
        if self.date_from.is_some_and(|from| day < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| day > to) {
            return false;
        }

        match self.search_term() {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                rma.number.to_string().to_lowercase().contains(&term)
                    || rma.reason.to_lowercase().contains(&term)
                    || rma
                        .assistance_notes
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&term))
            }
        }
    }
}

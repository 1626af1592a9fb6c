//! Human-facing RMA numbers: `RMA<year><6-digit sequence>`.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use rmaledger_core::{DomainError, DomainResult};

const PREFIX: &str = "RMA";
const SEQUENCE_DIGITS: usize = 6;

/// Year-scoped, zero-padded RMA number (e.g. `RMA2024000123`).
///
/// Ordering is by (year, sequence), which matches the lexicographic order of
/// the formatted string.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RmaNumber {
    year: i32,
    sequence: u32,
}

impl RmaNumber {
    pub const MAX_SEQUENCE: u32 = 999_999;

    pub fn new(year: i32, sequence: u32) -> DomainResult<Self> {
        if !(1000..=9999).contains(&year) {
            return Err(DomainError::validation(format!("year {year} is not a 4-digit year")));
        }
        if sequence == 0 || sequence > Self::MAX_SEQUENCE {
            return Err(DomainError::validation(format!(
                "sequence must be between 1 and {}",
                Self::MAX_SEQUENCE
            )));
        }
        Ok(Self { year, sequence })
    }

    /// First number of a year.
    pub fn first(year: i32) -> DomainResult<Self> {
        Self::new(year, 1)
    }

    /// Number following `latest` within `year`; starts at 1 when the year has none.
    pub fn next_after(year: i32, latest: Option<RmaNumber>) -> DomainResult<Self> {
        match latest {
            Some(prev) if prev.year == year => {
                if prev.sequence >= Self::MAX_SEQUENCE {
                    return Err(DomainError::validation(format!(
                        "RMA numbering exhausted for year {year}"
                    )));
                }
                Self::new(year, prev.sequence + 1)
            }
            _ => Self::first(year),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl core::fmt::Display for RmaNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{PREFIX}{}{:0width$}", self.year, self.sequence, width = SEQUENCE_DIGITS)
    }
}

impl FromStr for RmaNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::invalid_id(format!("RmaNumber: '{s}'"));

        let rest = s.strip_prefix(PREFIX).ok_or_else(invalid)?;
        if rest.len() != 4 + SEQUENCE_DIGITS || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = rest[..4].parse().map_err(|_| invalid())?;
        let sequence: u32 = rest[4..].parse().map_err(|_| invalid())?;
        Self::new(year, sequence).map_err(|_| invalid())
    }
}

impl TryFrom<String> for RmaNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RmaNumber> for String {
    fn from(value: RmaNumber) -> Self {
        value.to_string()
    }
}

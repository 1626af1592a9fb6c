//! Time source abstraction.
//!
//! Services read "now" through a `Clock` so that year-scoped numbering and
//! timeline ordering can be pinned in tests.

use std::sync::Mutex;

use chrono::{DateTime, Datelike, Duration, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar year of `now()` (UTC), used to scope RMA numbers.
    fn current_year(&self) -> i32 {
        self.now().year()
    }
}

/// Wall clock.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_advances_and_reports_year() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 0).unwrap());
        assert_eq!(clock.current_year(), 2024);
        clock.advance(Duration::minutes(2));
        assert_eq!(clock.current_year(), 2025);
    }
}

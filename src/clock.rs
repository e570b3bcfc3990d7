use std::sync::RwLock;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

/// The clinic keeps São Paulo time without daylight saving: a fixed UTC-3.
pub const CLINIC_UTC_OFFSET_SECS: i32 = -3 * 3600;

pub fn clinic_offset() -> FixedOffset {
    match FixedOffset::east_opt(CLINIC_UTC_OFFSET_SECS) {
        Some(offset) => offset,
        None => unreachable!("UTC-3 is within ±24h"),
    }
}

/// Calendar day at the clinic for the given instant.
pub fn clinic_today(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&clinic_offset()).date_naive()
}

/// Source of "now". Injected so availability is deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: RwLock::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.write() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

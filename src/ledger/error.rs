use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::TimeSlot;
use crate::store::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("{0} is not a weekday: the clinic books Monday to Friday only")]
    NotAWeekday(NaiveDate),
    #[error("slot {date} {time} has already started")]
    SlotInPast { date: NaiveDate, time: TimeSlot },
    #[error("slot already taken by appointment {0}")]
    SlotTaken(Ulid),
    #[error("daily limit of {limit} appointments on {date} reached")]
    DailyLimitReached { date: NaiveDate, limit: usize },
    #[error("appointment not found: {0}")]
    NotFound(Ulid),
    #[error("appointment {0} belongs to another client")]
    NotOwner(Ulid),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl LedgerError {
    /// True for the "slot can't be booked" family, as opposed to the daily cap
    /// or a lookup failure.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            LedgerError::NotAWeekday(_) | LedgerError::SlotInPast { .. } | LedgerError::SlotTaken(_)
        )
    }
}

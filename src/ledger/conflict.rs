use chrono::{DateTime, NaiveDate, Utc};

use crate::model::*;

use super::availability::{find_occupant, is_past, is_weekday, scheduled_on};
use super::LedgerError;

/// Decide whether `client_email` may book `date`/`time` against the current ledger.
///
/// Order matters: calendar rules first, then the daily cap, then occupancy,
/// so a capped client is told about the cap whichever slot it picked.
pub(crate) fn check_bookable(
    appointments: &[Appointment],
    date: NaiveDate,
    time: TimeSlot,
    client_email: &str,
    now: DateTime<Utc>,
    daily_limit: usize,
) -> Result<(), LedgerError> {
    if !is_weekday(date) {
        return Err(LedgerError::NotAWeekday(date));
    }
    if is_past(date, time, now) {
        return Err(LedgerError::SlotInPast { date, time });
    }
    if scheduled_on(appointments, date, client_email) >= daily_limit {
        return Err(LedgerError::DailyLimitReached {
            date,
            limit: daily_limit,
        });
    }
    if let Some(occupant) = find_occupant(appointments, date, time) {
        return Err(LedgerError::SlotTaken(occupant.id));
    }
    Ok(())
}

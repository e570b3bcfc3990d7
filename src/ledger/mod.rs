mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
#[cfg(test)]
mod tests;

pub use availability::{
    day_slots, find_occupant, is_available, is_past, is_selectable_date, is_weekday, scheduled_on, slot_start,
};
pub use error::LedgerError;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::store::Repository;

/// All appointments, scheduled and cancelled, plus the booking rules.
///
/// Each mutation reads the whole collection, validates, and writes the whole
/// collection back. `commit` makes that sequence exclusive within the process;
/// separate processes sharing one store still race (last write wins).
pub struct Ledger {
    repo: Repository,
    clock: Arc<dyn Clock>,
    pub notify: Arc<NotifyHub>,
    daily_limit: usize,
    commit: Mutex<()>,
}

impl Ledger {
    pub fn new(repo: Repository, clock: Arc<dyn Clock>, notify: Arc<NotifyHub>, daily_limit: usize) -> Self {
        Self {
            repo,
            clock,
            notify,
            daily_limit,
            commit: Mutex::new(()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn daily_limit(&self) -> usize {
        self.daily_limit
    }

    /// Write the collection back, then tell subscribers of the affected day.
    pub(super) async fn persist_and_notify(
        &self,
        appointments: &[Appointment],
        event: LedgerEvent,
    ) -> Result<(), LedgerError> {
        self.repo.save_appointments(appointments).await?;
        self.notify.send(&event);
        Ok(())
    }
}

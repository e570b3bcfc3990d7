use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::availability::{self, day_slots};
use super::{Ledger, LedgerError};

impl Ledger {
    /// Free and not yet started, judged on a fresh read of the store.
    pub async fn is_available(&self, date: NaiveDate, time: TimeSlot) -> Result<bool, LedgerError> {
        let appointments = self.repo.appointments().await?;
        Ok(availability::is_available(&appointments, date, time, self.now()))
    }

    pub fn is_selectable_date(&self, date: NaiveDate) -> bool {
        availability::is_selectable_date(date, self.now())
    }

    pub async fn day_slots(&self, date: NaiveDate) -> Result<Vec<SlotView>, LedgerError> {
        let appointments = self.repo.appointments().await?;
        Ok(day_slots(&appointments, date, self.now()))
    }

    pub async fn get(&self, id: Ulid) -> Result<Option<Appointment>, LedgerError> {
        let appointments = self.repo.appointments().await?;
        Ok(appointments.into_iter().find(|a| a.id == id))
    }

    /// A client's scheduled appointments, earliest first.
    pub async fn client_appointments(&self, client_email: &str) -> Result<Vec<Appointment>, LedgerError> {
        let mut mine: Vec<Appointment> = self
            .repo
            .appointments()
            .await?
            .into_iter()
            .filter(|a| a.is_scheduled() && a.client_email == client_email)
            .collect();
        mine.sort_by_key(|a| (a.date, a.time));
        Ok(mine)
    }

    /// Every scheduled appointment, ordered by date then time. The admin view.
    pub async fn schedule(&self) -> Result<Vec<Appointment>, LedgerError> {
        let mut all: Vec<Appointment> = self
            .repo
            .appointments()
            .await?
            .into_iter()
            .filter(Appointment::is_scheduled)
            .collect();
        all.sort_by_key(|a| (a.date, a.time));
        Ok(all)
    }
}

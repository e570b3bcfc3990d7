use chrono::NaiveDate;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::MAX_APPOINTMENTS;
use crate::model::*;
use crate::observability::{ledger_error_label, BOOKINGS_TOTAL, BOOKING_REJECTIONS_TOTAL, CANCELLATIONS_TOTAL};

use super::conflict::check_bookable;
use super::{Ledger, LedgerError};

impl Ledger {
    /// Book `date`/`time` for `client`.
    ///
    /// Availability is re-checked here against freshly read state, whatever
    /// the caller saw when it rendered the slot.
    pub async fn book(&self, client: &ClientAccount, date: NaiveDate, time: TimeSlot) -> Result<Appointment, LedgerError> {
        let result = self.book_inner(client, date, time).await;
        match &result {
            Ok(apt) => {
                metrics::counter!(BOOKINGS_TOTAL).increment(1);
                info!("booked {} {} for {} ({})", apt.date, apt.time, apt.client_email, apt.id);
            }
            Err(e) => {
                metrics::counter!(BOOKING_REJECTIONS_TOTAL, "reason" => ledger_error_label(e)).increment(1);
                debug!("booking {date} {time} for {} refused: {e}", client.email);
            }
        }
        result
    }

    async fn book_inner(&self, client: &ClientAccount, date: NaiveDate, time: TimeSlot) -> Result<Appointment, LedgerError> {
        let _commit = self.commit.lock().await;
        let mut appointments = self.repo.appointments().await?;
        if appointments.len() >= MAX_APPOINTMENTS {
            return Err(LedgerError::LimitExceeded("too many appointments"));
        }
        check_bookable(&appointments, date, time, &client.email, self.now(), self.daily_limit)?;

        let appointment = Appointment {
            id: Ulid::new(),
            client_email: client.email.clone(),
            client_name: client.name.clone(),
            date,
            time,
            status: AppointmentStatus::Scheduled,
        };
        appointments.push(appointment.clone());
        self.persist_and_notify(&appointments, LedgerEvent::Booked(appointment.clone()))
            .await?;
        Ok(appointment)
    }

    /// Mark an appointment cancelled. Cancelling twice is not an error; the
    /// second call changes nothing and publishes nothing.
    pub async fn cancel(&self, id: Ulid) -> Result<Appointment, LedgerError> {
        self.cancel_where(id, |_| Ok(())).await
    }

    /// Cancel on behalf of a client: only its own appointments.
    pub async fn cancel_owned(&self, id: Ulid, client_email: &str) -> Result<Appointment, LedgerError> {
        self.cancel_where(id, |apt| {
            if apt.client_email == client_email {
                Ok(())
            } else {
                Err(LedgerError::NotOwner(apt.id))
            }
        })
        .await
    }

    async fn cancel_where(
        &self,
        id: Ulid,
        allowed: impl Fn(&Appointment) -> Result<(), LedgerError>,
    ) -> Result<Appointment, LedgerError> {
        let _commit = self.commit.lock().await;
        let mut appointments = self.repo.appointments().await?;
        let apt = appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(LedgerError::NotFound(id))?;
        allowed(&*apt)?;

        if !apt.is_scheduled() {
            debug!("appointment {id} already cancelled");
            return Ok(apt.clone());
        }
        apt.status = AppointmentStatus::Cancelled;
        let cancelled = apt.clone();

        self.persist_and_notify(&appointments, LedgerEvent::Cancelled(cancelled.clone()))
            .await?;
        metrics::counter!(CANCELLATIONS_TOTAL).increment(1);
        info!("cancelled {} ({} {})", cancelled.id, cancelled.date, cancelled.time);
        Ok(cancelled)
    }
}

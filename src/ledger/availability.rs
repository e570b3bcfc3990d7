use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};

use crate::clock::{clinic_today, CLINIC_UTC_OFFSET_SECS};
use crate::model::*;

// ── Availability predicates ───────────────────────────────────────

/// Monday to Friday.
pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Instant the slot starts, reading `date` + slot label as clinic time (UTC-3).
pub fn slot_start(date: NaiveDate, time: TimeSlot) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(time.hour()));
    Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(CLINIC_UTC_OFFSET_SECS))))
}

/// A slot is in the past once its start is strictly before `now`.
pub fn is_past(date: NaiveDate, time: TimeSlot, now: DateTime<Utc>) -> bool {
    slot_start(date, time) < now
}

/// The scheduled appointment holding this slot, if any. Cancelled records never hold a slot.
pub fn find_occupant(appointments: &[Appointment], date: NaiveDate, time: TimeSlot) -> Option<&Appointment> {
    appointments.iter().find(|a| a.occupies(date, time))
}

/// Free and not yet started. Weekday rules are checked separately.
pub fn is_available(appointments: &[Appointment], date: NaiveDate, time: TimeSlot, now: DateTime<Utc>) -> bool {
    find_occupant(appointments, date, time).is_none() && !is_past(date, time, now)
}

/// Whether the calendar lets a client pick `date` at all: a weekday, not before today.
pub fn is_selectable_date(date: NaiveDate, now: DateTime<Utc>) -> bool {
    is_weekday(date) && date >= clinic_today(now)
}

/// Number of scheduled appointments `email` holds on `date`.
pub fn scheduled_on(appointments: &[Appointment], date: NaiveDate, email: &str) -> usize {
    appointments
        .iter()
        .filter(|a| a.is_scheduled() && a.date == date && a.client_email == email)
        .count()
}

/// Every slot of the day with its availability, in clock order.
pub fn day_slots(appointments: &[Appointment], date: NaiveDate, now: DateTime<Utc>) -> Vec<SlotView> {
    TimeSlot::ALL
        .iter()
        .map(|&time| SlotView {
            time,
            available: is_available(appointments, date, time, now),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn slot(label: &str) -> TimeSlot {
        label.parse().unwrap()
    }

    fn apt(date: NaiveDate, time: &str, email: &str, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Ulid::new(),
            client_email: email.into(),
            client_name: "Ana".into(),
            date,
            time: slot(time),
            status,
        }
    }

    #[test]
    fn weekdays() {
        // 2024-06-10 is a Monday
        let monday = day(2024, 6, 10);
        for offset in 0..5 {
            assert!(is_weekday(monday + Duration::days(offset)));
        }
        assert!(!is_weekday(day(2024, 6, 15)));
        assert!(!is_weekday(day(2024, 6, 16)));
    }

    #[test]
    fn slot_start_is_utc_minus_three() {
        let start = slot_start(day(2024, 6, 10), slot("09:00"));
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap());
        // 17:00 local is 20:00 UTC, same day
        let late = slot_start(day(2024, 6, 10), slot("17:00"));
        assert_eq!(late, Utc.with_ymd_and_hms(2024, 6, 10, 20, 0, 0).unwrap());
    }

    #[test]
    fn past_is_strictly_before_now() {
        let date = day(2024, 6, 10);
        let nine = slot("09:00");
        let start = slot_start(date, nine);
        assert!(!is_past(date, nine, start)); // exactly at start: still bookable
        assert!(is_past(date, nine, start + Duration::seconds(1)));
        assert!(!is_past(date, nine, start - Duration::hours(1)));
    }

    #[test]
    fn cancelled_records_do_not_block() {
        let date = day(2024, 6, 10);
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let ledger = vec![apt(date, "09:00", "a@x.com", AppointmentStatus::Cancelled)];
        assert!(is_available(&ledger, date, slot("09:00"), now));

        let ledger = vec![
            apt(date, "09:00", "a@x.com", AppointmentStatus::Cancelled),
            apt(date, "09:00", "b@x.com", AppointmentStatus::Scheduled),
        ];
        assert!(!is_available(&ledger, date, slot("09:00"), now));
        assert_eq!(find_occupant(&ledger, date, slot("09:00")).unwrap().client_email, "b@x.com");
        // Same time on another day is unaffected
        assert!(is_available(&ledger, day(2024, 6, 11), slot("09:00"), now));
    }

    #[test]
    fn selectable_dates() {
        // Wednesday 2024-06-12, 10:00 clinic time
        let now = Utc.with_ymd_and_hms(2024, 6, 12, 13, 0, 0).unwrap();
        assert!(is_selectable_date(day(2024, 6, 12), now)); // today
        assert!(is_selectable_date(day(2024, 6, 14), now));
        assert!(!is_selectable_date(day(2024, 6, 11), now)); // yesterday
        assert!(!is_selectable_date(day(2024, 6, 15), now)); // Saturday
    }

    #[test]
    fn counts_only_scheduled_for_client_and_day() {
        let date = day(2024, 6, 10);
        let ledger = vec![
            apt(date, "08:00", "a@x.com", AppointmentStatus::Scheduled),
            apt(date, "09:00", "a@x.com", AppointmentStatus::Cancelled),
            apt(date, "10:00", "b@x.com", AppointmentStatus::Scheduled),
            apt(day(2024, 6, 11), "10:00", "a@x.com", AppointmentStatus::Scheduled),
        ];
        assert_eq!(scheduled_on(&ledger, date, "a@x.com"), 1);
        assert_eq!(scheduled_on(&ledger, date, "b@x.com"), 1);
        assert_eq!(scheduled_on(&ledger, date, "c@x.com"), 0);
    }

    #[test]
    fn day_slots_marks_taken_and_past() {
        let date = day(2024, 6, 10);
        // 10:30 clinic time: 08:00, 09:00 and 10:00 have started
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 13, 30, 0).unwrap();
        let ledger = vec![apt(date, "14:00", "a@x.com", AppointmentStatus::Scheduled)];
        let free: Vec<String> = day_slots(&ledger, date, now)
            .into_iter()
            .filter(|s| s.available)
            .map(|s| s.time.to_string())
            .collect();
        assert_eq!(free, ["11:00", "13:00", "15:00", "16:00", "17:00"]);
    }
}

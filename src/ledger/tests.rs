use super::*;
use super::conflict::check_bookable;

use chrono::{Duration, NaiveDate, TimeZone};
use tokio_test::{assert_err, assert_ok};
use ulid::Ulid;

use crate::clock::FixedClock;
use crate::limits::DEFAULT_DAILY_LIMIT;
use crate::store::MemoryStore;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn slot(label: &str) -> TimeSlot {
    label.parse().unwrap()
}

fn client(email: &str) -> ClientAccount {
    ClientAccount {
        name: format!("Client {email}"),
        email: email.into(),
        phone: "(11) 3333-4444".into(),
        password: "pw".into(),
    }
}

/// Saturday 2024-06-01, noon UTC: everything in the week of 2024-06-10 is in the future.
fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

struct Fixture {
    ledger: Arc<Ledger>,
    clock: Arc<FixedClock>,
    repo: Repository,
}

fn fixture() -> Fixture {
    let repo = Repository::new(Arc::new(MemoryStore::new()));
    let clock = Arc::new(FixedClock::new(start_instant()));
    let ledger = Arc::new(Ledger::new(
        repo.clone(),
        clock.clone(),
        Arc::new(NotifyHub::new()),
        DEFAULT_DAILY_LIMIT,
    ));
    Fixture { ledger, clock, repo }
}

// ── Pure booking rules ───────────────────────────────────

#[test]
fn check_order_weekday_before_everything() {
    let saturday = day(2024, 6, 15);
    let err = check_bookable(&[], saturday, slot("09:00"), "a@x.com", start_instant(), 3).unwrap_err();
    assert!(matches!(err, LedgerError::NotAWeekday(d) if d == saturday));
    assert!(err.is_unavailable());
}

#[test]
fn check_cap_reported_before_occupancy() {
    let monday = day(2024, 6, 10);
    let mine: Vec<Appointment> = ["08:00", "09:00", "10:00"]
        .iter()
        .map(|t| Appointment {
            id: Ulid::new(),
            client_email: "a@x.com".into(),
            client_name: "A".into(),
            date: monday,
            time: slot(t),
            status: AppointmentStatus::Scheduled,
        })
        .collect();
    // 09:00 is taken by the client itself, but the cap wins
    let err = check_bookable(&mine, monday, slot("09:00"), "a@x.com", start_instant(), 3).unwrap_err();
    assert!(matches!(err, LedgerError::DailyLimitReached { limit: 3, .. }));
    assert!(!err.is_unavailable());

    // Another client sees plain occupancy
    let err = check_bookable(&mine, monday, slot("09:00"), "b@x.com", start_instant(), 3).unwrap_err();
    assert!(matches!(err, LedgerError::SlotTaken(id) if id == mine[1].id));
}

// ── Booking ──────────────────────────────────────────────

#[tokio::test]
async fn book_monday_nine_example() {
    let f = fixture();
    let monday = day(2024, 6, 10);
    assert!(f.ledger.is_available(monday, slot("09:00")).await.unwrap());

    let apt = f
        .ledger
        .book(&client("client@x.com"), monday, slot("09:00"))
        .await
        .unwrap();
    assert_eq!(apt.status, AppointmentStatus::Scheduled);

    let stored = f.repo.appointments().await.unwrap();
    assert_eq!(stored.len(), 1);
    let json = serde_json::to_value(&stored[0]).unwrap();
    assert_eq!(json["date"], "2024-06-10");
    assert_eq!(json["time"], "09:00");
    assert_eq!(json["status"], "scheduled");
    assert_eq!(json["clientEmail"], "client@x.com");

    assert!(!f.ledger.is_available(monday, slot("09:00")).await.unwrap());
    assert!(f.ledger.is_available(monday, slot("10:00")).await.unwrap());
}

#[tokio::test]
async fn second_booking_of_same_slot_rejected() {
    let f = fixture();
    let monday = day(2024, 6, 10);

    // Both "views" saw the slot free before either confirmed
    assert!(f.ledger.is_available(monday, slot("14:00")).await.unwrap());
    assert!(f.ledger.is_available(monday, slot("14:00")).await.unwrap());

    let first = f.ledger.book(&client("a@x.com"), monday, slot("14:00")).await.unwrap();
    let second = f.ledger.book(&client("b@x.com"), monday, slot("14:00")).await;
    assert!(matches!(second, Err(LedgerError::SlotTaken(id)) if id == first.id));
    assert_eq!(f.repo.appointments().await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_bookings_of_one_slot_yield_one_winner() {
    let f = fixture();
    let monday = day(2024, 6, 10);

    let mut handles = Vec::new();
    for i in 0..20 {
        let ledger = f.ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .book(&client(&format!("c{i}@x.com")), monday, slot("11:00"))
                .await
        }));
    }

    let mut winners = 0;
    let mut taken = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => winners += 1,
            Err(LedgerError::SlotTaken(_)) => taken += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(taken, 19);
    assert_eq!(f.repo.appointments().await.unwrap().len(), 1);
}

#[tokio::test]
async fn weekend_rejected_even_when_free() {
    let f = fixture();
    let sunday = day(2024, 6, 16);
    // The slot itself is free and in the future
    assert!(f.ledger.is_available(sunday, slot("09:00")).await.unwrap());
    let result = f.ledger.book(&client("a@x.com"), sunday, slot("09:00")).await;
    assert!(matches!(result, Err(LedgerError::NotAWeekday(_))));
    assert!(!f.ledger.is_selectable_date(sunday));
}

#[tokio::test]
async fn past_slot_rejected() {
    let f = fixture();
    let monday = day(2024, 6, 10);
    // Monday 09:30 clinic time
    f.clock.set(Utc.with_ymd_and_hms(2024, 6, 10, 12, 30, 0).unwrap());

    assert!(!f.ledger.is_available(monday, slot("09:00")).await.unwrap());
    let result = f.ledger.book(&client("a@x.com"), monday, slot("09:00")).await;
    assert!(matches!(result, Err(LedgerError::SlotInPast { .. })));

    // Later the same day is fine
    assert_ok!(f.ledger.book(&client("a@x.com"), monday, slot("10:00")).await);
}

#[tokio::test]
async fn daily_cap_blocks_fourth_on_same_day() {
    let f = fixture();
    let monday = day(2024, 6, 10);
    let ana = client("ana@x.com");

    for t in ["08:00", "13:00", "17:00"] {
        f.ledger.book(&ana, monday, slot(t)).await.unwrap();
    }
    for t in ["09:00", "10:00", "16:00"] {
        let result = f.ledger.book(&ana, monday, slot(t)).await;
        assert!(matches!(result, Err(LedgerError::DailyLimitReached { limit: 3, .. })));
    }

    // Other days and other clients are unaffected
    assert_ok!(f.ledger.book(&ana, day(2024, 6, 11), slot("09:00")).await);
    assert_ok!(f.ledger.book(&client("bia@x.com"), monday, slot("09:00")).await);
}

#[tokio::test]
async fn cancelling_frees_daily_cap() {
    let f = fixture();
    let monday = day(2024, 6, 10);
    let ana = client("ana@x.com");

    let mut booked = Vec::new();
    for t in ["08:00", "09:00", "10:00"] {
        booked.push(f.ledger.book(&ana, monday, slot(t)).await.unwrap());
    }
    assert_err!(f.ledger.book(&ana, monday, slot("11:00")).await);

    f.ledger.cancel(booked[0].id).await.unwrap();
    assert_ok!(f.ledger.book(&ana, monday, slot("11:00")).await);
}

#[tokio::test]
async fn concurrent_bookings_respect_daily_cap() {
    let f = fixture();
    let monday = day(2024, 6, 10);

    let mut handles = Vec::new();
    for t in TimeSlot::ALL {
        let ledger = f.ledger.clone();
        handles.push(tokio::spawn(async move { ledger.book(&client("ana@x.com"), monday, t).await }));
    }
    let mut ok = 0;
    for h in handles {
        if h.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, DEFAULT_DAILY_LIMIT);
}

#[tokio::test]
async fn custom_daily_limit() {
    let repo = Repository::new(Arc::new(MemoryStore::new()));
    let ledger = Ledger::new(
        repo,
        Arc::new(FixedClock::new(start_instant())),
        Arc::new(NotifyHub::new()),
        1,
    );
    assert_eq!(ledger.daily_limit(), 1);
    let monday = day(2024, 6, 10);
    ledger.book(&client("a@x.com"), monday, slot("08:00")).await.unwrap();
    assert!(matches!(
        ledger.book(&client("a@x.com"), monday, slot("09:00")).await,
        Err(LedgerError::DailyLimitReached { limit: 1, .. })
    ));
}

// ── Cancellation ─────────────────────────────────────────

#[tokio::test]
async fn cancel_is_soft_and_frees_slot() {
    let f = fixture();
    let monday = day(2024, 6, 10);
    let apt = f.ledger.book(&client("a@x.com"), monday, slot("15:00")).await.unwrap();

    let cancelled = f.ledger.cancel(apt.id).await.unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    // Record is kept, only its status changed
    let stored = f.repo.appointments().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, apt.id);
    assert_eq!(stored[0].status, AppointmentStatus::Cancelled);

    assert!(f.ledger.is_available(monday, slot("15:00")).await.unwrap());
    // Rebooking the freed slot works and coexists with the cancelled record
    let rebooked = f.ledger.book(&client("b@x.com"), monday, slot("15:00")).await.unwrap();
    assert_ne!(rebooked.id, apt.id);
    assert_eq!(f.repo.appointments().await.unwrap().len(), 2);
}

#[tokio::test]
async fn cancel_twice_is_quiet() {
    let f = fixture();
    let apt = f.ledger.book(&client("a@x.com"), day(2024, 6, 10), slot("15:00")).await.unwrap();
    f.ledger.cancel(apt.id).await.unwrap();
    let again = f.ledger.cancel(apt.id).await.unwrap();
    assert_eq!(again.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn cancel_unknown_id() {
    let f = fixture();
    let id = Ulid::new();
    assert!(matches!(f.ledger.cancel(id).await, Err(LedgerError::NotFound(x)) if x == id));
}

#[tokio::test]
async fn cancel_owned_checks_owner() {
    let f = fixture();
    let apt = f.ledger.book(&client("a@x.com"), day(2024, 6, 10), slot("15:00")).await.unwrap();

    assert!(matches!(
        f.ledger.cancel_owned(apt.id, "b@x.com").await,
        Err(LedgerError::NotOwner(_))
    ));
    assert_eq!(
        f.ledger.get(apt.id).await.unwrap().unwrap().status,
        AppointmentStatus::Scheduled
    );

    assert_ok!(f.ledger.cancel_owned(apt.id, "a@x.com").await);
}

// ── Queries ──────────────────────────────────────────────

#[tokio::test]
async fn client_view_lists_only_own_scheduled() {
    let f = fixture();
    let ana = client("ana@x.com");
    let late = f.ledger.book(&ana, day(2024, 6, 12), slot("16:00")).await.unwrap();
    let early = f.ledger.book(&ana, day(2024, 6, 11), slot("08:00")).await.unwrap();
    let dropped = f.ledger.book(&ana, day(2024, 6, 11), slot("09:00")).await.unwrap();
    f.ledger.book(&client("bia@x.com"), day(2024, 6, 11), slot("10:00")).await.unwrap();
    f.ledger.cancel(dropped.id).await.unwrap();

    let mine = f.ledger.client_appointments("ana@x.com").await.unwrap();
    let ids: Vec<Ulid> = mine.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![early.id, late.id]);
}

#[tokio::test]
async fn admin_schedule_sorted_by_date_then_time() {
    let f = fixture();
    let a = f.ledger.book(&client("a@x.com"), day(2024, 6, 12), slot("08:00")).await.unwrap();
    let b = f.ledger.book(&client("b@x.com"), day(2024, 6, 10), slot("17:00")).await.unwrap();
    let c = f.ledger.book(&client("c@x.com"), day(2024, 6, 10), slot("09:00")).await.unwrap();
    let d = f.ledger.book(&client("d@x.com"), day(2024, 6, 11), slot("13:00")).await.unwrap();
    f.ledger.cancel(d.id).await.unwrap();

    let schedule: Vec<Ulid> = f.ledger.schedule().await.unwrap().iter().map(|x| x.id).collect();
    assert_eq!(schedule, vec![c.id, b.id, a.id]);
}

#[tokio::test]
async fn day_view_reflects_bookings_and_clock() {
    let f = fixture();
    let monday = day(2024, 6, 10);
    f.ledger.book(&client("a@x.com"), monday, slot("13:00")).await.unwrap();

    let slots = f.ledger.day_slots(monday).await.unwrap();
    assert_eq!(slots.len(), TimeSlot::ALL.len());
    assert_eq!(slots.iter().filter(|s| !s.available).count(), 1);

    // Move to Monday 13:30 clinic time: everything up to 13:00 has started
    f.clock.set(start_instant() + Duration::days(9) + Duration::hours(4) + Duration::minutes(30));
    let free: Vec<String> = f
        .ledger
        .day_slots(monday)
        .await
        .unwrap()
        .into_iter()
        .filter(|s| s.available)
        .map(|s| s.time.to_string())
        .collect();
    assert_eq!(free, ["14:00", "15:00", "16:00", "17:00"]);
}

// ── Notifications ────────────────────────────────────────

#[tokio::test]
async fn mutations_publish_on_their_day() {
    let f = fixture();
    let monday = day(2024, 6, 10);
    let mut rx = f.ledger.notify.subscribe(monday);
    let mut other_day = f.ledger.notify.subscribe(day(2024, 6, 11));

    let apt = f.ledger.book(&client("a@x.com"), monday, slot("09:00")).await.unwrap();
    assert_eq!(rx.recv().await.unwrap(), LedgerEvent::Booked(apt.clone()));

    let cancelled = f.ledger.cancel(apt.id).await.unwrap();
    assert_eq!(rx.recv().await.unwrap(), LedgerEvent::Cancelled(cancelled));

    // A no-op cancel publishes nothing; neither do rejected bookings
    f.ledger.cancel(apt.id).await.unwrap();
    let _ = f.ledger.book(&client("a@x.com"), day(2024, 6, 15), slot("09:00")).await;
    assert!(rx.try_recv().is_err());
    assert!(other_day.try_recv().is_err());
}

// ── Storage failures ─────────────────────────────────────

#[tokio::test]
async fn corrupt_collection_surfaces_as_storage_error() {
    use crate::store::{Storage, APPOINTMENTS_KEY};

    let storage = Arc::new(MemoryStore::new());
    storage.set(APPOINTMENTS_KEY, "[{]".into()).await.unwrap();
    let ledger = Ledger::new(
        Repository::new(storage),
        Arc::new(FixedClock::new(start_instant())),
        Arc::new(NotifyHub::new()),
        3,
    );
    let result = ledger.book(&client("a@x.com"), day(2024, 6, 10), slot("09:00")).await;
    assert!(matches!(result, Err(LedgerError::Storage(_))));
}

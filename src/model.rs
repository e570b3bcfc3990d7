use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

// ── Time slots ───────────────────────────────────────────────────

/// A fixed clock time on a calendar day, drawn from the clinic's daily grid.
///
/// Serialized as its `"HH:MM"` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSlot {
    hour: u8,
}

impl TimeSlot {
    /// Every bookable slot, in chronological order. No slot at noon (lunch).
    pub const ALL: [TimeSlot; 9] = [
        TimeSlot { hour: 8 },
        TimeSlot { hour: 9 },
        TimeSlot { hour: 10 },
        TimeSlot { hour: 11 },
        TimeSlot { hour: 13 },
        TimeSlot { hour: 14 },
        TimeSlot { hour: 15 },
        TimeSlot { hour: 16 },
        TimeSlot { hour: 17 },
    ];

    /// Returns the slot starting at `hour`, if the clinic offers one.
    pub fn at_hour(hour: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.hour == hour)
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00", self.hour)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a clinic time slot: {0:?}")]
pub struct InvalidTimeSlot(pub String);

impl FromStr for TimeSlot {
    type Err = InvalidTimeSlot;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidTimeSlot(s.to_string());
        let (h, m) = s.split_once(':').ok_or_else(invalid)?;
        if h.len() != 2 || m != "00" {
            return Err(invalid());
        }
        let hour: u8 = h.parse().map_err(|_| invalid())?;
        Self::at_hour(hour).ok_or_else(invalid)
    }
}

impl TryFrom<String> for TimeSlot {
    type Error = InvalidTimeSlot;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeSlot> for String {
    fn from(slot: TimeSlot) -> Self {
        slot.to_string()
    }
}

// ── Identities ───────────────────────────────────────────────────

/// A registered clinic client. Stored verbatim, password included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAccount {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

/// The administrator session record. Never stored in `users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAccount {
    pub username: String,
}

/// Who is logged in. Serialized with a `"type"` tag so persisted records read
/// `{"type":"client",...}` or `{"type":"admin","username":...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Identity {
    Client(ClientAccount),
    Admin(AdminAccount),
}

impl Identity {
    pub fn as_client(&self) -> Option<&ClientAccount> {
        match self {
            Identity::Client(c) => Some(c),
            Identity::Admin(_) => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Identity::Admin(_))
    }

    /// Name shown in greetings: the client's name or the admin's username.
    pub fn display_name(&self) -> &str {
        match self {
            Identity::Client(c) => &c.name,
            Identity::Admin(a) => &a.username,
        }
    }
}

/// Registration form input. Every field is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

// ── Appointments ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Cancelled,
}

/// One booking in the ledger. Cancellation flips `status`; records are never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Ulid,
    pub client_email: String,
    pub client_name: String,
    pub date: NaiveDate,
    pub time: TimeSlot,
    pub status: AppointmentStatus,
}

impl Appointment {
    pub fn is_scheduled(&self) -> bool {
        self.status == AppointmentStatus::Scheduled
    }

    pub fn occupies(&self, date: NaiveDate, time: TimeSlot) -> bool {
        self.is_scheduled() && self.date == date && self.time == time
    }
}

/// Change published by the ledger after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Booked(Appointment),
    Cancelled(Appointment),
}

impl LedgerEvent {
    pub fn appointment(&self) -> &Appointment {
        match self {
            LedgerEvent::Booked(a) | LedgerEvent::Cancelled(a) => a,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotView {
    pub time: TimeSlot,
    pub available: bool,
}

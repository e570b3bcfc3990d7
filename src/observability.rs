use std::net::SocketAddr;

use crate::command::Command;
use crate::identity::IdentityError;
use crate::ledger::LedgerError;

// ── Request-driven metrics ──────────────────────────────────────

/// Counter: shell commands executed. Labels: command, status.
pub const COMMANDS_TOTAL: &str = "dentefeliz_commands_total";

/// Histogram: command latency in seconds. Labels: command.
pub const COMMAND_DURATION_SECONDS: &str = "dentefeliz_command_duration_seconds";

/// Counter: appointments booked.
pub const BOOKINGS_TOTAL: &str = "dentefeliz_bookings_total";

/// Counter: booking attempts refused. Labels: reason.
pub const BOOKING_REJECTIONS_TOTAL: &str = "dentefeliz_booking_rejections_total";

/// Counter: appointments cancelled (status actually flipped).
pub const CANCELLATIONS_TOTAL: &str = "dentefeliz_cancellations_total";

/// Counter: login attempts. Labels: kind (client/admin), status, reason (rejections only).
pub const LOGINS_TOTAL: &str = "dentefeliz_logins_total";

/// Counter: registration attempts. Labels: status, reason.
pub const REGISTRATIONS_TOTAL: &str = "dentefeliz_registrations_total";

// ── Storage metrics ─────────────────────────────────────────────

/// Histogram: log group-commit flush duration in seconds.
pub const STORE_FLUSH_DURATION_SECONDS: &str = "dentefeliz_store_flush_duration_seconds";

/// Histogram: log group-commit batch size (records per flush).
pub const STORE_FLUSH_BATCH_SIZE: &str = "dentefeliz_store_flush_batch_size";

/// Counter: log compactions performed.
pub const STORE_COMPACTIONS_TOTAL: &str = "dentefeliz_store_compactions_total";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::Register { .. } => "register",
        Command::Login { .. } => "login",
        Command::AdminLogin { .. } => "admin_login",
        Command::Logout => "logout",
        Command::WhoAmI => "whoami",
        Command::Slots { .. } => "slots",
        Command::Book { .. } => "book",
        Command::Cancel { .. } => "cancel",
        Command::Mine => "mine",
        Command::Schedule => "schedule",
        Command::DarkMode { .. } => "dark_mode",
        Command::Help => "help",
        Command::Quit => "quit",
    }
}

/// Short reason label for a refused booking or cancellation.
pub fn ledger_error_label(err: &LedgerError) -> &'static str {
    match err {
        LedgerError::NotAWeekday(_) => "not_a_weekday",
        LedgerError::SlotInPast { .. } => "slot_in_past",
        LedgerError::SlotTaken(_) => "slot_taken",
        LedgerError::DailyLimitReached { .. } => "daily_limit",
        LedgerError::NotFound(_) => "not_found",
        LedgerError::NotOwner(_) => "not_owner",
        LedgerError::LimitExceeded(_) => "limit_exceeded",
        LedgerError::Storage(_) => "storage",
    }
}

pub fn identity_error_label(err: &IdentityError) -> &'static str {
    match err {
        IdentityError::MissingField(_) => "missing_field",
        IdentityError::DuplicateEmail(_) => "duplicate_email",
        IdentityError::InvalidCredentials => "invalid_credentials",
        IdentityError::InvalidAdminCredentials => "invalid_admin_credentials",
        IdentityError::LimitExceeded(_) => "limit_exceeded",
        IdentityError::Storage(_) => "storage",
    }
}

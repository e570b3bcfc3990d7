/// Max bytes in any user-supplied text field (name, email, phone, password, username).
pub const MAX_FIELD_LEN: usize = 256;

/// Max registered client records.
pub const MAX_USERS: usize = 10_000;

/// Max appointment records, scheduled and cancelled together.
pub const MAX_APPOINTMENTS: usize = 100_000;

/// Default per-client, per-day cap on scheduled appointments.
pub const DEFAULT_DAILY_LIMIT: usize = 3;

/// Max bytes in one shell input line.
pub const MAX_LINE_LEN: usize = 4096;

/// Max bytes in one durable-log record payload. Larger length prefixes are treated as corruption.
pub const MAX_RECORD_LEN: usize = 64 * 1024 * 1024;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error};

use crate::command::{self, Command, CommandError, HELP};
use crate::identity::{IdentityError, IdentityStore};
use crate::ledger::{self, Ledger, LedgerError};
use crate::model::*;
use crate::observability::{command_label, COMMANDS_TOTAL, COMMAND_DURATION_SECONDS};
use crate::store::{Repository, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Info,
    Error,
}

/// A transient message: a short title plus one sentence of detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub description: String,
}

impl Notice {
    fn new(kind: NoticeKind, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            description: description.into(),
        }
    }

    fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeKind::Success, title, description)
    }

    fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeKind::Info, title, description)
    }

    fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, title, description)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.kind {
            NoticeKind::Success => "ok",
            NoticeKind::Info => "info",
            NoticeKind::Error => "error",
        };
        write!(f, "[{tag}] {}: {}", self.title, self.description)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Nothing to print (blank input line).
    Nothing,
    Notice(Notice),
    /// A listing, one entry per line.
    Lines(Vec<String>),
    Quit,
}

impl Reply {
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Notice(n) if n.kind == NoticeKind::Error)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Nothing => Ok(()),
            Reply::Notice(n) => write!(f, "{n}"),
            Reply::Lines(lines) => write!(f, "{}", lines.join("\n")),
            Reply::Quit => write!(f, "bye"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ShellError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("not logged in")]
    NotLoggedIn,
    #[error("clients only")]
    ClientOnly,
    #[error("administrator only")]
    AdminOnly,
}

/// Executes shell commands against the identity store and the ledger.
///
/// The session is re-read from storage for every command, so a shell
/// started over an existing data directory picks up the persisted login.
pub struct Shell {
    identity: Arc<IdentityStore>,
    ledger: Arc<Ledger>,
    repo: Repository,
}

impl Shell {
    pub fn new(identity: Arc<IdentityStore>, ledger: Arc<Ledger>, repo: Repository) -> Self {
        Self { identity, ledger, repo }
    }

    /// Parse and run one input line. Never fails: every error becomes a notice.
    pub async fn execute_line(&self, line: &str) -> Reply {
        match command::parse_command(line) {
            Ok(cmd) => self.execute(cmd).await,
            Err(CommandError::Empty) => Reply::Nothing,
            Err(e) => Reply::Notice(Notice::error("Invalid command", e.to_string())),
        }
    }

    pub async fn execute(&self, cmd: Command) -> Reply {
        let label = command_label(&cmd);
        let start = Instant::now();
        let result = self.execute_command(cmd).await;
        metrics::histogram!(COMMAND_DURATION_SECONDS, "command" => label).record(start.elapsed().as_secs_f64());

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(COMMANDS_TOTAL, "command" => label, "status" => status).increment(1);

        result.unwrap_or_else(|e| Reply::Notice(error_notice(label, e)))
    }

    async fn execute_command(&self, cmd: Command) -> Result<Reply, ShellError> {
        match cmd {
            Command::Register { form } => {
                let user = self.identity.register(form).await?;
                Ok(Reply::Notice(Notice::success(
                    "Account created",
                    format!("Welcome, {}!", user.display_name()),
                )))
            }
            Command::Login { email, password } => {
                let user = self.identity.login(&email, &password).await?;
                Ok(Reply::Notice(Notice::success(
                    "Logged in",
                    format!("Welcome back, {}!", user.display_name()),
                )))
            }
            Command::AdminLogin { username, password } => {
                self.identity.login_admin(&username, &password).await?;
                Ok(Reply::Notice(Notice::success(
                    "Logged in",
                    "Administrator panel unlocked.",
                )))
            }
            Command::Logout => {
                self.identity.logout().await?;
                Ok(Reply::Notice(Notice::info("Logged out", "See you soon.")))
            }
            Command::WhoAmI => {
                let description = match self.identity.session().await? {
                    Some(Identity::Client(c)) => format!("{} <{}>, client", c.name, c.email),
                    Some(Identity::Admin(a)) => format!("{}, administrator", a.username),
                    None => "nobody is logged in".to_string(),
                };
                Ok(Reply::Notice(Notice::info("Session", description)))
            }
            Command::Slots { date } => {
                if !ledger::is_weekday(date) {
                    return Ok(Reply::Notice(Notice::info(
                        "Closed",
                        format!("{date} is not a weekday. The clinic books Monday to Friday."),
                    )));
                }
                if !self.ledger.is_selectable_date(date) {
                    return Ok(Reply::Notice(Notice::info(
                        "Past date",
                        format!("{date} has already passed."),
                    )));
                }
                let lines = self
                    .ledger
                    .day_slots(date)
                    .await?
                    .into_iter()
                    .map(|s| format!("{}  {}", s.time, if s.available { "available" } else { "unavailable" }))
                    .collect();
                Ok(Reply::Lines(lines))
            }
            Command::Book { date, time } => {
                let client = self.require_client().await?;
                let apt = self.ledger.book(&client, date, time).await?;
                Ok(Reply::Notice(Notice::success(
                    "Appointment booked",
                    format!("{} at {} (id {}).", apt.date, apt.time, apt.id),
                )))
            }
            Command::Cancel { id } => {
                let apt = match self.require_session().await? {
                    Identity::Client(c) => self.ledger.cancel_owned(id, &c.email).await?,
                    Identity::Admin(_) => self.ledger.cancel(id).await?,
                };
                Ok(Reply::Notice(Notice::success(
                    "Appointment cancelled",
                    format!("{} at {} was cancelled.", apt.date, apt.time),
                )))
            }
            Command::Mine => {
                let client = self.require_client().await?;
                let mine = self.ledger.client_appointments(&client.email).await?;
                if mine.is_empty() {
                    return Ok(Reply::Notice(Notice::info(
                        "No appointments",
                        "You have no scheduled appointments.",
                    )));
                }
                Ok(Reply::Lines(
                    mine.iter()
                        .map(|a| format!("{} {}  {}", a.date, a.time, a.id))
                        .collect(),
                ))
            }
            Command::Schedule => {
                if !self.require_session().await?.is_admin() {
                    return Err(ShellError::AdminOnly);
                }
                let all = self.ledger.schedule().await?;
                if all.is_empty() {
                    return Ok(Reply::Notice(Notice::info(
                        "No appointments",
                        "Nothing is scheduled.",
                    )));
                }
                Ok(Reply::Lines(
                    all.iter()
                        .map(|a| format!("{} {}  {} <{}>  {}", a.date, a.time, a.client_name, a.client_email, a.id))
                        .collect(),
                ))
            }
            Command::DarkMode { enabled } => {
                self.repo.set_dark_mode(enabled).await?;
                let state = if enabled { "on" } else { "off" };
                Ok(Reply::Notice(Notice::info("Theme", format!("Dark mode {state}."))))
            }
            Command::Help => Ok(Reply::Lines(HELP.lines().map(str::to_string).collect())),
            Command::Quit => Ok(Reply::Quit),
        }
    }

    async fn require_session(&self) -> Result<Identity, ShellError> {
        self.identity.session().await?.ok_or(ShellError::NotLoggedIn)
    }

    async fn require_client(&self) -> Result<ClientAccount, ShellError> {
        match self.require_session().await? {
            Identity::Client(c) => Ok(c),
            Identity::Admin(_) => Err(ShellError::ClientOnly),
        }
    }
}

/// Turn a failure into the notice shown to the user. Storage trouble gets a
/// generic message; the detail goes to the log.
fn error_notice(command: &'static str, err: ShellError) -> Notice {
    if let Some(storage) = storage_cause(&err) {
        error!("{command} failed: {storage}");
        return Notice::error("Unexpected error", "Something went wrong. Please try again.");
    }
    debug!("{command} refused: {err}");

    match err {
        ShellError::NotLoggedIn => Notice::error("Not logged in", "Log in or register first."),
        ShellError::ClientOnly => Notice::error("Clients only", "Log in with a client account to do that."),
        ShellError::AdminOnly => Notice::error("Administrators only", "Log in as the administrator to do that."),
        ShellError::Identity(e) => identity_notice(e),
        ShellError::Ledger(e) => ledger_notice(e),
        ShellError::Storage(_) => Notice::error("Unexpected error", "Something went wrong. Please try again."),
    }
}

fn storage_cause(err: &ShellError) -> Option<&StorageError> {
    match err {
        ShellError::Storage(e)
        | ShellError::Identity(IdentityError::Storage(e))
        | ShellError::Ledger(LedgerError::Storage(e)) => Some(e),
        _ => None,
    }
}

fn identity_notice(err: IdentityError) -> Notice {
    match err {
        IdentityError::MissingField(field) => {
            Notice::error("Missing information", format!("Please fill in the {field} field."))
        }
        IdentityError::DuplicateEmail(_) => Notice::error("Registration failed", "This email is already registered."),
        IdentityError::InvalidCredentials => Notice::error("Login failed", "Incorrect email or password."),
        IdentityError::InvalidAdminCredentials => {
            Notice::error("Access denied", "Invalid administrator credentials.")
        }
        other => Notice::error("Request refused", other.to_string()),
    }
}

fn ledger_notice(err: LedgerError) -> Notice {
    match err {
        LedgerError::NotAWeekday(_) => {
            Notice::error("Invalid date", "Appointments are only available Monday to Friday.")
        }
        LedgerError::SlotInPast { .. } | LedgerError::SlotTaken(_) => {
            Notice::error("Slot unavailable", "This time is no longer available. Please choose another.")
        }
        LedgerError::DailyLimitReached { date, limit } => Notice::error(
            "Daily limit reached",
            format!("You can hold at most {limit} appointments on {date}."),
        ),
        LedgerError::NotFound(_) => Notice::error("Not found", "No appointment with that id."),
        LedgerError::NotOwner(_) => Notice::error("Not allowed", "You can only cancel your own appointments."),
        other => Notice::error("Request refused", other.to_string()),
    }
}

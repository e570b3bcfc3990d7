use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::MAX_LINE_LEN;
use crate::model::*;

/// Parsed shell command.
#[derive(Debug, PartialEq)]
pub enum Command {
    Register { form: Registration },
    Login { email: String, password: String },
    AdminLogin { username: String, password: String },
    Logout,
    WhoAmI,
    Slots { date: NaiveDate },
    Book { date: NaiveDate, time: TimeSlot },
    Cancel { id: Ulid },
    Mine,
    Schedule,
    DarkMode { enabled: bool },
    Help,
    Quit,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("line too long")]
    TooLong,
    #[error("unterminated quote")]
    UnterminatedQuote,
    #[error("unknown command: {0} (try `help`)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    BadDate(String),
    #[error(transparent)]
    BadTime(#[from] InvalidTimeSlot),
    #[error("invalid appointment id {0:?}")]
    BadId(String),
    #[error("expected on or off, got {0:?}")]
    BadToggle(String),
}

pub const HELP: &str = "\
commands:
  register <name> <email> <phone> <password>   create a client account (quote names with spaces)
  login <email> <password>                     client login
  admin <username> <password>                  administrator login
  logout | whoami
  slots <YYYY-MM-DD>                           show a day's time slots
  book <YYYY-MM-DD> <HH:MM>                    book a slot
  cancel <id>                                  cancel one of your appointments
  mine                                         your scheduled appointments
  schedule                                     all scheduled appointments (admin)
  dark on|off                                  theme preference
  help | quit";

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    if line.len() > MAX_LINE_LEN {
        return Err(CommandError::TooLong);
    }
    let words = split_words(line)?;
    let Some((head, args)) = words.split_first() else {
        return Err(CommandError::Empty);
    };

    match head.to_lowercase().as_str() {
        "register" => match args {
            [name, email, phone, password] => Ok(Command::Register {
                form: Registration {
                    name: name.clone(),
                    email: email.clone(),
                    phone: phone.clone(),
                    password: password.clone(),
                },
            }),
            _ => Err(CommandError::Usage("register <name> <email> <phone> <password>")),
        },
        "login" => match args {
            [email, password] => Ok(Command::Login {
                email: email.clone(),
                password: password.clone(),
            }),
            _ => Err(CommandError::Usage("login <email> <password>")),
        },
        "admin" => match args {
            [username, password] => Ok(Command::AdminLogin {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => Err(CommandError::Usage("admin <username> <password>")),
        },
        "slots" => match args {
            [date] => Ok(Command::Slots { date: parse_date(date)? }),
            _ => Err(CommandError::Usage("slots <YYYY-MM-DD>")),
        },
        "book" => match args {
            [date, time] => Ok(Command::Book {
                date: parse_date(date)?,
                time: time.parse()?,
            }),
            _ => Err(CommandError::Usage("book <YYYY-MM-DD> <HH:MM>")),
        },
        "cancel" => match args {
            [id] => Ok(Command::Cancel {
                id: Ulid::from_string(id).map_err(|_| CommandError::BadId(id.clone()))?,
            }),
            _ => Err(CommandError::Usage("cancel <id>")),
        },
        "dark" => match args {
            [toggle] => match toggle.to_lowercase().as_str() {
                "on" => Ok(Command::DarkMode { enabled: true }),
                "off" => Ok(Command::DarkMode { enabled: false }),
                _ => Err(CommandError::BadToggle(toggle.clone())),
            },
            _ => Err(CommandError::Usage("dark on|off")),
        },
        "logout" => no_args(args, Command::Logout, "logout"),
        "whoami" => no_args(args, Command::WhoAmI, "whoami"),
        "mine" => no_args(args, Command::Mine, "mine"),
        "schedule" => no_args(args, Command::Schedule, "schedule"),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        _ => Err(CommandError::Unknown(head.clone())),
    }
}

fn no_args(args: &[String], cmd: Command, usage: &'static str) -> Result<Command, CommandError> {
    if args.is_empty() {
        Ok(cmd)
    } else {
        Err(CommandError::Usage(usage))
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, CommandError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| CommandError::BadDate(s.to_string()))
}

/// Split on whitespace; double quotes group words and may be empty (`""`).
fn split_words(line: &str) -> Result<Vec<String>, CommandError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                in_word = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_quotes {
        return Err(CommandError::UnterminatedQuote);
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::limits::*;
use crate::model::*;
use crate::observability::{identity_error_label, LOGINS_TOTAL, REGISTRATIONS_TOTAL};
use crate::store::{Repository, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("email already registered: {0}")]
    DuplicateEmail(String),
    #[error("incorrect email or password")]
    InvalidCredentials,
    #[error("invalid administrator credentials")]
    InvalidAdminCredentials,
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The one administrator login. Not a stored user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl Default for AdminCredentials {
    fn default() -> Self {
        Self {
            username: "admin".into(),
            password: "admin123".into(),
        }
    }
}

/// Registered clients plus the current session.
///
/// Passwords are stored and compared in plain text and the session is just
/// the last logged-in record, persisted verbatim.
pub struct IdentityStore {
    repo: Repository,
    admin: AdminCredentials,
    /// Serializes the read-check-append of `register`.
    commit: Mutex<()>,
}

impl IdentityStore {
    pub fn new(repo: Repository, admin: AdminCredentials) -> Self {
        Self {
            repo,
            admin,
            commit: Mutex::new(()),
        }
    }

    /// Create a client account and log it in.
    pub async fn register(&self, form: Registration) -> Result<Identity, IdentityError> {
        let result = self.register_inner(form).await;
        let reason = result.as_ref().err().map_or("none", identity_error_label);
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(REGISTRATIONS_TOTAL, "status" => status, "reason" => reason).increment(1);
        result
    }

    async fn register_inner(&self, form: Registration) -> Result<Identity, IdentityError> {
        for (field, value) in [
            ("name", &form.name),
            ("email", &form.email),
            ("phone", &form.phone),
            ("password", &form.password),
        ] {
            if value.is_empty() {
                return Err(IdentityError::MissingField(field));
            }
            if value.len() > MAX_FIELD_LEN {
                return Err(IdentityError::LimitExceeded("field too long"));
            }
        }

        let _commit = self.commit.lock().await;
        let mut users = self.repo.users().await?;
        if users
            .iter()
            .filter_map(Identity::as_client)
            .any(|c| c.email == form.email)
        {
            debug!("registration refused: {} already registered", form.email);
            return Err(IdentityError::DuplicateEmail(form.email));
        }
        if users.len() >= MAX_USERS {
            return Err(IdentityError::LimitExceeded("too many users"));
        }

        let user = Identity::Client(ClientAccount {
            name: form.name,
            email: form.email,
            phone: form.phone,
            password: form.password,
        });
        users.push(user.clone());
        self.repo.save_users(&users).await?;
        self.repo.set_current_user(&user).await?;
        info!("registered client {}", user.as_client().map_or("", |c| c.email.as_str()));
        Ok(user)
    }

    /// Log a client in. Succeeds iff a record with exactly this email and password exists.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, IdentityError> {
        let users = self.repo.users().await?;
        let found = users.into_iter().find(|u| {
            u.as_client()
                .is_some_and(|c| c.email == email && c.password == password)
        });
        let Some(user) = found else {
            let err = IdentityError::InvalidCredentials;
            metrics::counter!(LOGINS_TOTAL, "kind" => "client", "status" => "rejected", "reason" => identity_error_label(&err))
                .increment(1);
            debug!("client login refused for {email}");
            return Err(err);
        };
        self.repo.set_current_user(&user).await?;
        metrics::counter!(LOGINS_TOTAL, "kind" => "client", "status" => "ok").increment(1);
        info!("client {email} logged in");
        Ok(user)
    }

    /// Log the administrator in. Only the configured credential pair is accepted.
    pub async fn login_admin(&self, username: &str, password: &str) -> Result<Identity, IdentityError> {
        if username != self.admin.username || password != self.admin.password {
            let err = IdentityError::InvalidAdminCredentials;
            metrics::counter!(LOGINS_TOTAL, "kind" => "admin", "status" => "rejected", "reason" => identity_error_label(&err))
                .increment(1);
            debug!("admin login refused for {username}");
            return Err(err);
        }
        let user = Identity::Admin(AdminAccount {
            username: username.to_string(),
        });
        self.repo.set_current_user(&user).await?;
        metrics::counter!(LOGINS_TOTAL, "kind" => "admin", "status" => "ok").increment(1);
        info!("administrator logged in");
        Ok(user)
    }

    pub async fn logout(&self) -> Result<(), IdentityError> {
        self.repo.clear_current_user().await?;
        Ok(())
    }

    /// The persisted session identity, if anyone is logged in.
    pub async fn session(&self) -> Result<Option<Identity>, IdentityError> {
        Ok(self.repo.current_user().await?)
    }
}

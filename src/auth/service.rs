use std::sync::Arc;

use crate::config::DuplicateUsers;
use crate::error::{Error, Result};
use crate::models::{LoginInput, RegisterInput, User, UserInfo, UserSession};
use crate::store::UserDirectory;

use super::{CredentialHasher, SessionManager};

/// Register and login flows.
///
/// Each flow is two independent steps, a user-directory write or read followed by
/// a token issue. Nothing locks across the two, so a register can be observed with
/// its user stored but no token issued yet; neither store ever holds a partial
/// record.
#[derive(Clone)]
pub struct AuthService {
    users: UserDirectory,
    sessions: SessionManager,
    hasher: Arc<dyn CredentialHasher>,
    duplicates: DuplicateUsers,
}

impl AuthService {
    pub fn new(
        users: UserDirectory,
        sessions: SessionManager,
        hasher: Arc<dyn CredentialHasher>,
        duplicates: DuplicateUsers,
    ) -> Self {
        Self {
            users,
            sessions,
            hasher,
            duplicates,
        }
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Create the account (or replace it, under [`DuplicateUsers::Overwrite`]) and
    /// log it straight in.
    pub fn register(&self, input: RegisterInput) -> Result<UserSession> {
        let user = User {
            name: input.name,
            username: input.username,
            password: self.hasher.hash(&input.password)?,
        };
        let username = user.username.clone();
        let name = user.name.clone();

        match self.duplicates {
            DuplicateUsers::Overwrite => self.users.upsert(user),
            DuplicateUsers::Reject => {
                if !self.users.insert_new(user) {
                    tracing::warn!(username = %username, "registration rejected: username taken");
                    return Err(Error::Conflict(format!(
                        "username '{username}' is already registered"
                    )));
                }
            }
        }

        let token = self.sessions.issue_token(&username);
        tracing::info!(username = %username, "registered user");
        Ok(UserSession { name, token })
    }

    /// Verify credentials and issue a new token, replacing any previous one.
    ///
    /// A failed attempt leaves the user's current session alone.
    pub fn login(&self, input: LoginInput) -> Result<UserSession> {
        let Some(user) = self.users.find(&input.username) else {
            tracing::warn!(username = %input.username, "login failed: unknown user");
            return Err(Error::Unauthenticated);
        };

        if !self.hasher.verify(&input.password, &user.password) {
            tracing::warn!(username = %input.username, "login failed: wrong password");
            return Err(Error::Unauthenticated);
        }

        let token = self.sessions.issue_token(&user.username);
        tracing::info!(username = %user.username, "user logged in");
        Ok(UserSession {
            name: user.name,
            token,
        })
    }

    pub fn logout(&self, username: &str, token: &str) -> Result<()> {
        self.sessions.revoke_token(username, token)?;
        tracing::info!(username, "user logged out");
        Ok(())
    }

    /// Account details for the owner of a live session.
    pub fn whoami(&self, username: &str, token: &str) -> Result<UserInfo> {
        self.sessions.check(username, token)?;
        self.users
            .find(username)
            .map(|user| UserInfo::from(&user))
            .ok_or(Error::Unauthenticated)
    }
}

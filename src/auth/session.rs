use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};

/// Length of an issued token. 32 symbols from a 62-letter alphabet is ~190 bits.
pub const TOKEN_LEN: usize = 32;

/// Draw a fresh session token from the operating system's CSPRNG.
pub fn generate_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

struct SessionEntry {
    token: String,
    issued_at: DateTime<Utc>,
}

impl SessionEntry {
    fn matches(&self, token: &str) -> bool {
        self.token.as_bytes().ct_eq(token.as_bytes()).into()
    }
}

/// Current session token per username.
///
/// A user holds at most one token: issuing a new one replaces the previous, which
/// immediately stops validating. With a TTL configured, tokens older than the TTL
/// fail with [`Error::Expired`] and are dropped on the spot.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    ttl: Option<Duration>,
}

impl SessionManager {
    /// A manager whose tokens never expire.
    pub fn new() -> Self {
        Self::with_ttl(None)
    }

    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Issue a new token for `username`, replacing any token it held before.
    pub fn issue_token(&self, username: &str) -> String {
        let token = generate_token();
        let entry = SessionEntry {
            token: token.clone(),
            issued_at: Utc::now(),
        };

        let mut sessions = self.sessions.write().expect("session lock poisoned");
        let replaced = sessions.insert(username.to_string(), entry).is_some();
        drop(sessions);

        tracing::debug!(username, replaced, "issued session token");
        token
    }

    /// True iff `token` is the live, unexpired token for `username`.
    pub fn validate(&self, username: &str, token: &str) -> bool {
        self.check(username, token).is_ok()
    }

    /// Like [`validate`](Self::validate), but says why a token was refused.
    pub fn check(&self, username: &str, token: &str) -> Result<()> {
        self.check_at(username, token, Utc::now())
    }

    fn check_at(&self, username: &str, token: &str, now: DateTime<Utc>) -> Result<()> {
        {
            let sessions = self.sessions.read().expect("session lock poisoned");
            let entry = sessions.get(username).ok_or(Error::Unauthenticated)?;
            if !entry.matches(token) {
                return Err(Error::Unauthenticated);
            }
            if !self.is_expired(entry, now) {
                return Ok(());
            }
        }

        // A concurrent login may have replaced the entry since the read lock was
        // released; only evict the token we actually found expired.
        let mut sessions = self.sessions.write().expect("session lock poisoned");
        let still_current = sessions
            .get(username)
            .is_some_and(|entry| entry.matches(token));
        if still_current {
            sessions.remove(username);
        }
        tracing::debug!(username, "rejected expired session token");
        Err(Error::Expired)
    }

    /// End the session for `username`, but only if `token` is still its live token.
    ///
    /// The comparison and the removal happen under one write lock, so a token
    /// issued by a concurrent login is never dropped by a logout holding the old one.
    pub fn revoke_token(&self, username: &str, token: &str) -> Result<()> {
        let mut sessions = self.sessions.write().expect("session lock poisoned");
        let entry = sessions.get(username).ok_or(Error::Unauthenticated)?;
        if !entry.matches(token) {
            return Err(Error::Unauthenticated);
        }
        let expired = self.is_expired(entry, Utc::now());
        sessions.remove(username);
        drop(sessions);

        if expired {
            tracing::debug!(username, "rejected expired session token");
            return Err(Error::Expired);
        }
        Ok(())
    }

    /// Remove every expired session and return how many were dropped.
    pub fn purge_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let now = Utc::now();
        let mut sessions = self.sessions.write().expect("session lock poisoned");
        let before = sessions.len();
        sessions.retain(|_, entry| !self.is_expired(entry, now));
        before - sessions.len()
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.read().expect("session lock poisoned").len()
    }

    fn is_expired(&self, entry: &SessionEntry, now: DateTime<Utc>) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        // A negative age (clock stepped backwards) never counts as expired.
        now.signed_duration_since(entry.issued_at)
            .to_std()
            .map(|age| age >= ttl)
            .unwrap_or(false)
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

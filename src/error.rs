//! Failure kinds returned by the core services.
//!
//! Each variant maps to exactly one HTTP status in `api`; the core itself never
//! knows about HTTP.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// No study is stored under the requested key.
    #[error("{0} not found")]
    NotFound(String),

    /// Unknown user, wrong password, or a token that does not match the session.
    #[error("invalid credentials")]
    Unauthenticated,

    /// The token matched but is older than the configured session TTL.
    #[error("session expired")]
    Expired,

    /// The request body could not be turned into a domain value.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Registration under an existing username while duplicates are rejected.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn study_not_found(id: &str) -> Self {
        Self::NotFound(format!("study '{id}'"))
    }
}

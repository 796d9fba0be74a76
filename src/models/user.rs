use serde::{Deserialize, Serialize};

/// A registered account.
///
/// `password` holds whatever the configured [`crate::auth::CredentialHasher`]
/// produced at registration time, never the raw password unless the plaintext
/// hasher is in use.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Input for creating (or replacing) an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub username: String,
    pub password: String,
}

/// Input for logging in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// Returned by register and login: display name plus the freshly issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub name: String,
    pub token: String,
}

/// Public account details for the session owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    pub username: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            username: user.username.clone(),
        }
    }
}

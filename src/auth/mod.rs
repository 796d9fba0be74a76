//! Accounts, credentials and session tokens.
//!
//! - [`SessionManager`]: one opaque token per username, optional TTL.
//! - [`CredentialHasher`]: how passwords are stored and checked.
//! - [`AuthService`]: register/login/logout on top of the two.

mod password;
mod service;
mod session;

pub use password::{Argon2Hasher, CredentialHasher, PlaintextHasher};
pub use service::AuthService;
pub use session::{generate_token, SessionManager, TOKEN_LEN};

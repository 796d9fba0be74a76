//! Runtime configuration loaded from `POLINPIN_*` environment variables.
//!
//! Unparsable values fall back to the default and are logged, so a typo never
//! stops the server from starting.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 25727;

/// What registering an already-taken username does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateUsers {
    /// Silently replace the existing account.
    #[default]
    Overwrite,
    /// Refuse the registration with a conflict.
    Reject,
}

impl DuplicateUsers {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overwrite => "overwrite",
            Self::Reject => "reject",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "overwrite" => Some(Self::Overwrite),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// How passwords are stored on user records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PasswordScheme {
    #[default]
    Argon2,
    /// Raw passwords. Development only.
    Plaintext,
}

impl PasswordScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Argon2 => "argon2",
            Self::Plaintext => "plaintext",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "argon2" => Some(Self::Argon2),
            "plaintext" => Some(Self::Plaintext),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Interface to bind (POLINPIN_HOST)
    pub host: String,
    /// HTTP port (POLINPIN_PORT)
    pub port: u16,
    /// Seed the demo study under `demo` at startup (POLINPIN_SEED_DEMO)
    pub seed_demo: bool,
    /// Session lifetime; `None` means tokens never expire (POLINPIN_SESSION_TTL_SECS)
    pub session_ttl: Option<Duration>,
    /// Registration policy for taken usernames (POLINPIN_DUPLICATE_USERS)
    pub duplicate_users: DuplicateUsers,
    /// Password storage (POLINPIN_PASSWORD_SCHEME)
    pub password_scheme: PasswordScheme,
    /// Require a session on `/editor/*` (POLINPIN_REQUIRE_EDITOR_AUTH)
    pub require_editor_auth: bool,
    /// Reject edited studies whose answers name unknown nodes (POLINPIN_STRICT_ANSWERS)
    pub strict_answers: bool,
    /// Allowed CORS origins, comma-separated; permissive when unset (POLINPIN_CORS_ORIGINS)
    pub cors_origins: Option<Vec<String>>,
    /// Login/register requests per minute per client IP (POLINPIN_AUTH_RATE_LIMIT)
    pub auth_rate_limit: Option<u32>,
    /// Key the rate limiter on `X-Forwarded-For`/`X-Real-IP` instead of the peer
    /// address. Only safe behind a proxy that sets them (POLINPIN_TRUST_PROXY)
    pub trust_proxy: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let host = lookup("POLINPIN_HOST").unwrap_or(defaults.host);
        let port = parse_or("POLINPIN_PORT", &lookup, defaults.port, |s| s.parse().ok());
        let seed_demo = parse_or("POLINPIN_SEED_DEMO", &lookup, defaults.seed_demo, parse_bool);
        let session_ttl =
            lookup("POLINPIN_SESSION_TTL_SECS").and_then(|s| match s.trim().parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => {
                    tracing::warn!("ignoring invalid POLINPIN_SESSION_TTL_SECS={:?}", s);
                    None
                }
            });
        let duplicate_users = parse_or(
            "POLINPIN_DUPLICATE_USERS",
            &lookup,
            defaults.duplicate_users,
            DuplicateUsers::from_str,
        );
        let password_scheme = parse_or(
            "POLINPIN_PASSWORD_SCHEME",
            &lookup,
            defaults.password_scheme,
            PasswordScheme::from_str,
        );
        let require_editor_auth = parse_or(
            "POLINPIN_REQUIRE_EDITOR_AUTH",
            &lookup,
            defaults.require_editor_auth,
            parse_bool,
        );
        let strict_answers = parse_or(
            "POLINPIN_STRICT_ANSWERS",
            &lookup,
            defaults.strict_answers,
            parse_bool,
        );
        let cors_origins = lookup("POLINPIN_CORS_ORIGINS").map(|s| {
            s.split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect()
        });
        let auth_rate_limit =
            lookup("POLINPIN_AUTH_RATE_LIMIT").and_then(|s| match s.trim().parse() {
                Ok(0) => None,
                Ok(limit) => Some(limit),
                Err(_) => {
                    tracing::warn!("ignoring invalid POLINPIN_AUTH_RATE_LIMIT={:?}", s);
                    None
                }
            });
        let trust_proxy = parse_or(
            "POLINPIN_TRUST_PROXY",
            &lookup,
            defaults.trust_proxy,
            parse_bool,
        );

        Self {
            host,
            port,
            seed_demo,
            session_ttl,
            duplicate_users,
            password_scheme,
            require_editor_auth,
            strict_answers,
            cors_origins,
            auth_rate_limit,
            trust_proxy,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = Some(ttl);
        self
    }

    pub fn with_duplicate_users(mut self, policy: DuplicateUsers) -> Self {
        self.duplicate_users = policy;
        self
    }

    pub fn with_password_scheme(mut self, scheme: PasswordScheme) -> Self {
        self.password_scheme = scheme;
        self
    }

    pub fn with_editor_auth(mut self) -> Self {
        self.require_editor_auth = true;
        self
    }

    pub fn with_strict_answers(mut self) -> Self {
        self.strict_answers = true;
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_auth_rate_limit(mut self, max_requests: u32) -> Self {
        self.auth_rate_limit = Some(max_requests);
        self
    }

    pub fn with_trusted_proxy(mut self) -> Self {
        self.trust_proxy = true;
        self
    }

    pub fn without_demo(mut self) -> Self {
        self.seed_demo = false;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            seed_demo: true,
            session_ttl: None,
            duplicate_users: DuplicateUsers::default(),
            password_scheme: PasswordScheme::default(),
            require_editor_auth: false,
            strict_answers: false,
            cors_origins: None,
            auth_rate_limit: None,
            trust_proxy: false,
        }
    }
}

fn parse_or<T>(
    key: &str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> T {
    match lookup(key) {
        Some(raw) => parse(raw.trim()).unwrap_or_else(|| {
            tracing::warn!("ignoring invalid {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.seed_demo);
        assert!(config.session_ttl.is_none());
        assert_eq!(config.duplicate_users, DuplicateUsers::Overwrite);
        assert_eq!(config.password_scheme, PasswordScheme::Argon2);
        assert!(!config.require_editor_auth);
        assert!(config.auth_rate_limit.is_none());
        assert!(!config.trust_proxy);
    }

    #[test]
    fn reads_every_variable() {
        let config = config_from(&[
            ("POLINPIN_HOST", "0.0.0.0"),
            ("POLINPIN_PORT", "8080"),
            ("POLINPIN_SEED_DEMO", "false"),
            ("POLINPIN_SESSION_TTL_SECS", "3600"),
            ("POLINPIN_DUPLICATE_USERS", "reject"),
            ("POLINPIN_PASSWORD_SCHEME", "plaintext"),
            ("POLINPIN_REQUIRE_EDITOR_AUTH", "yes"),
            ("POLINPIN_STRICT_ANSWERS", "1"),
            ("POLINPIN_CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("POLINPIN_AUTH_RATE_LIMIT", "10"),
            ("POLINPIN_TRUST_PROXY", "true"),
        ]);

        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert!(!config.seed_demo);
        assert_eq!(config.session_ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.duplicate_users, DuplicateUsers::Reject);
        assert_eq!(config.password_scheme, PasswordScheme::Plaintext);
        assert!(config.require_editor_auth);
        assert!(config.strict_answers);
        assert_eq!(
            config.cors_origins,
            Some(vec!["http://a.test".to_string(), "http://b.test".to_string()])
        );
        assert_eq!(config.auth_rate_limit, Some(10));
        assert!(config.trust_proxy);
    }

    #[test]
    fn numeric_values_tolerate_surrounding_whitespace() {
        let config = config_from(&[
            ("POLINPIN_SESSION_TTL_SECS", " 3600 "),
            ("POLINPIN_AUTH_RATE_LIMIT", "5\n"),
        ]);

        assert_eq!(config.session_ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.auth_rate_limit, Some(5));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("POLINPIN_PORT", "eighty"),
            ("POLINPIN_DUPLICATE_USERS", "merge"),
            ("POLINPIN_SESSION_TTL_SECS", "-5"),
            ("POLINPIN_AUTH_RATE_LIMIT", "0"),
        ]);

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.duplicate_users, DuplicateUsers::Overwrite);
        assert!(config.session_ttl.is_none());
        assert!(config.auth_rate_limit.is_none());
    }

    #[test]
    fn policy_names_round_trip() {
        for policy in [DuplicateUsers::Overwrite, DuplicateUsers::Reject] {
            assert_eq!(DuplicateUsers::from_str(policy.as_str()), Some(policy));
        }
        for scheme in [PasswordScheme::Argon2, PasswordScheme::Plaintext] {
            assert_eq!(PasswordScheme::from_str(scheme.as_str()), Some(scheme));
        }
    }
}

mod handlers;
pub mod middleware;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{Argon2Hasher, AuthService, CredentialHasher, PlaintextHasher, SessionManager};
use crate::config::{Config, PasswordScheme};
use crate::store::{StudyStore, UserDirectory};
use crate::studies::{StudyService, DEMO_STUDY_ID};

use self::middleware::{rate_limit_middleware, require_session, RateLimiter, USERNAME_HEADER};

/// Everything the handlers share. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub studies: StudyService,
    pub auth: AuthService,
    pub config: Arc<Config>,
    /// Present when `config.auth_rate_limit` is set.
    pub auth_limiter: Option<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let hasher: Arc<dyn CredentialHasher> = match config.password_scheme {
            PasswordScheme::Argon2 => Arc::new(Argon2Hasher::new()),
            PasswordScheme::Plaintext => {
                tracing::warn!("Passwords are stored in plaintext; development use only");
                Arc::new(PlaintextHasher)
            }
        };

        let auth = AuthService::new(
            UserDirectory::new(),
            SessionManager::with_ttl(config.session_ttl),
            hasher,
            config.duplicate_users,
        );

        let studies = StudyService::new(StudyStore::new());
        if config.seed_demo {
            studies.get_or_create_default_study(DEMO_STUDY_ID);
            tracing::debug!("seeded demo study under '{}'", DEMO_STUDY_ID);
        }

        let auth_limiter = config.auth_rate_limit.map(|max_requests| {
            RateLimiter::new(max_requests, Duration::from_secs(60))
                .trusting_proxy(config.trust_proxy)
        });

        Self {
            studies,
            auth,
            config: Arc::new(config),
            auth_limiter,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let mut editor = Router::new().route(
        "/editor/tree-test/{id}",
        get(handlers::get_study).post(handlers::put_study),
    );
    if state.config.require_editor_auth {
        editor = editor.route_layer(from_fn_with_state(state.clone(), require_session));
    }

    let mut auth = Router::new()
        .route("/login", post(handlers::login))
        .route("/register", post(handlers::register));
    if let Some(limiter) = state.auth_limiter.clone() {
        auth = auth.route_layer(from_fn_with_state(limiter, rate_limit_middleware));
    }

    let account = Router::new()
        .route("/me", get(handlers::me))
        .route("/logout", post(handlers::logout))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    let cors = cors_layer(&state.config);

    Router::new()
        // Participants
        .route("/tree-test/{id}", get(handlers::get_study))
        .route("/completed/tree-test/{id}", post(handlers::complete_study))
        // Editor, accounts
        .merge(editor)
        .merge(auth)
        .merge(account)
        // Health
        .route("/health", get(handlers::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let Some(origins) = &config.cors_origins else {
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(USERNAME_HEADER),
        ])
}

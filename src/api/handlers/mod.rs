use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};

use crate::error::{Error, Result};
use crate::models::*;

use super::middleware::SessionCredentials;
use super::AppState;

// ============================================================
// Error Handling
// ============================================================

/// Map each failure kind to its status. Internal errors are logged in full and
/// reach the client only as a generic message.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthenticated | Error::Expired => StatusCode::UNAUTHORIZED,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
                    .into_response();
            }
        };
        (status, self.to_string()).into_response()
    }
}

/// Every way a JSON body can be unusable (bad syntax, wrong shape, missing
/// content type) is a 400.
fn parse_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            let reason = rejection.body_text();
            tracing::warn!("Rejected request body: {}", reason);
            Err(Error::BadRequest(reason))
        }
    }
}

/// Credential hashing is CPU-bound; keep it off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(anyhow::anyhow!("auth task failed: {e}")))?
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Studies
// ============================================================

pub async fn get_study(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Study>> {
    state.studies.get_study(&id).map(Json)
}

pub async fn put_study(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<Study>, JsonRejection>,
) -> Result<StatusCode> {
    let study = parse_body(payload)?;

    if state.config.strict_answers {
        let unknown = study.unknown_answers();
        if !unknown.is_empty() {
            return Err(Error::BadRequest(format!(
                "task answers reference unknown nodes: {}",
                unknown.join(", ")
            )));
        }
    }

    state.studies.put_study(&id, study)?;
    Ok(StatusCode::OK)
}

/// Accepts any body, or none. JSON bodies are passed to the completion hook.
pub async fn complete_study(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> StatusCode {
    let payload = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("Completion body for '{}' is not JSON: {}", id, e);
                None
            }
        }
    };

    state.studies.complete_study(&id, payload);
    StatusCode::OK
}

// ============================================================
// Accounts
// ============================================================

pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterInput>, JsonRejection>,
) -> Result<Json<UserSession>> {
    let input = parse_body(payload)?;
    let auth = state.auth.clone();
    run_blocking(move || auth.register(input)).await.map(Json)
}

pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginInput>, JsonRejection>,
) -> Result<Json<UserSession>> {
    let input = parse_body(payload)?;
    let auth = state.auth.clone();
    run_blocking(move || auth.login(input)).await.map(Json)
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(credentials): Extension<SessionCredentials>,
) -> Result<StatusCode> {
    state
        .auth
        .logout(&credentials.username, &credentials.token)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(
    State(state): State<AppState>,
    Extension(credentials): Extension<SessionCredentials>,
) -> Result<Json<UserInfo>> {
    state
        .auth
        .whoami(&credentials.username, &credentials.token)
        .map(Json)
}

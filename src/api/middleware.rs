//! Session guard and login rate limiting.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::AUTHORIZATION, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use crate::error::Error;

use super::AppState;

/// Header carrying the username a bearer token belongs to.
pub const USERNAME_HEADER: &str = "x-username";

/// Who a request authenticated as. Inserted into request extensions by
/// [`require_session`].
#[derive(Clone, Debug)]
pub struct SessionCredentials {
    pub username: String,
    pub token: String,
}

impl SessionCredentials {
    /// Pull `Authorization: Bearer <token>` and `X-Username` out of the headers.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())?;

        let username = headers
            .get(USERNAME_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|u| !u.is_empty())?;

        Some(Self {
            username: username.to_string(),
            token: token.to_string(),
        })
    }
}

/// Reject the request unless it carries the live session token for its user.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    let Some(credentials) = SessionCredentials::from_headers(request.headers()) else {
        tracing::warn!("Missing or malformed session headers");
        return Err(Error::Unauthenticated);
    };

    if let Err(e) = state
        .auth
        .sessions()
        .check(&credentials.username, &credentials.token)
    {
        tracing::warn!(username = %credentials.username, "Session rejected: {}", e);
        return Err(e);
    }

    request.extensions_mut().insert(credentials);
    Ok(next.run(request).await)
}

/// Sliding-window request counter per client IP.
///
/// Clients are keyed on the TCP peer address. Forwarding headers are only
/// consulted when the limiter is told the server sits behind a trusted proxy.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    trust_proxy: bool,
    requests: Arc<Mutex<HashMap<IpAddr, Vec<Instant>>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            trust_proxy: false,
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn trusting_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }

    /// Record a request from `ip`. Returns false once the window is full.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.lock().expect("rate limiter lock poisoned");
        let seen = requests.entry(ip).or_default();

        seen.retain(|&t| now.duration_since(t) < self.window);
        if seen.len() >= self.max_requests as usize {
            return false;
        }
        seen.push(now);
        true
    }

    /// Forget clients with no requests inside the window. Returns how many
    /// clients are still tracked.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut requests = self.requests.lock().expect("rate limiter lock poisoned");
        requests.retain(|_, seen| {
            seen.retain(|&t| now.duration_since(t) < self.window);
            !seen.is_empty()
        });
        requests.len()
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let ip = client_ip(request.headers(), peer, limiter.trust_proxy);

    if limiter.check(ip) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Auth rate limit exceeded for {}", ip);
        Err(StatusCode::TOO_MANY_REQUESTS)
    }
}

/// The peer address, unless `trust_proxy` is set and the proxy supplied
/// `X-Forwarded-For` (first hop) or `X-Real-IP`. Loopback when neither is known.
fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        if let Some(ip) = forwarded_ip(headers) {
            return ip;
        }
    }
    peer.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded: Option<IpAddr> = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok());

    let real = || -> Option<IpAddr> {
        headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .and_then(|ip| ip.trim().parse().ok())
    };

    forwarded.or_else(real)
}

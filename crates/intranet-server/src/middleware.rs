use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use intranet_accounts::{get_user, AccountError, User};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::api::{with_conn, ApiError};
use crate::AppState;

/// The authenticated account, as stored at the start of the request.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// Session token from `x-access-token`, or `Authorization: Bearer <token>`.
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(val) = headers.get("x-access-token") {
        return val.to_str().ok().filter(|t| !t.is_empty());
    }
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware to authenticate requests by session token.
///
/// The account is re-read from the database, so a deleted account or a role
/// change takes effect on the next request.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let token = token_from_headers(req.headers())
        .ok_or_else(|| ApiError::Unauthorized("token is missing".to_string()))?
        .to_string();

    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or_else(|| ApiError::InternalServerError("app state missing".to_string()))?
        .clone();

    let claims = state.tokens.verify(&token).map_err(|e| {
        tracing::debug!(error = %e, "rejected session token");
        ApiError::Unauthorized("token is invalid or expired".to_string())
    })?;
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::Unauthorized("token is invalid or expired".to_string()))?;

    let user = with_conn(&state, move |conn| match get_user(conn, user_id) {
        Ok(user) => Ok(user),
        Err(AccountError::NotFound(_)) => {
            Err(ApiError::Unauthorized("account no longer exists".to_string()))
        }
        Err(e) => Err(e.into()),
    })
    .await?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Clients tracked before expired windows are swept.
const SWEEP_THRESHOLD: usize = 10_000;

/// A client's current window: when it opened and how many requests it saw.
#[derive(Clone, Copy, Debug)]
struct Window {
    opened: Instant,
    hits: u32,
}

impl Window {
    fn has_closed(&self, now: Instant, length: Duration) -> bool {
        now.duration_since(self.opened) >= length
    }
}

/// Fixed-window request quota per client IP for the auth routes.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    quota: u32,
    length: Duration,
    windows: Arc<Mutex<HashMap<IpAddr, Window>>>,
}

impl RateLimiter {
    /// `quota` requests per IP per minute.
    pub fn per_minute(quota: u32) -> Self {
        Self {
            quota,
            length: Duration::from_secs(60),
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Seconds a refused client should wait, for `Retry-After`.
    pub fn retry_after_secs(&self) -> u64 {
        self.length.as_secs()
    }

    /// Counts one request from `ip`; `false` once its quota for the current
    /// window is spent.
    pub fn admit(&self, ip: IpAddr) -> bool {
        self.admit_at(ip, Instant::now())
    }

    fn admit_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut windows = self.windows.lock().unwrap_or_else(|poisoned| {
            tracing::error!("rate limiter lock poisoned, continuing with its last state");
            poisoned.into_inner()
        });

        if windows.len() >= SWEEP_THRESHOLD {
            let length = self.length;
            windows.retain(|_, window| !window.has_closed(now, length));
        }

        let window = windows.entry(ip).or_insert(Window {
            opened: now,
            hits: 0,
        });
        if window.has_closed(now, self.length) {
            *window = Window {
                opened: now,
                hits: 0,
            };
        }
        window.hits = window.hits.saturating_add(1);
        window.hits <= self.quota
    }
}

/// Rate limiting middleware for the unauthenticated auth routes.
pub async fn rate_limit_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    // Without ConnectInfo the server was started without peer addresses,
    // which is a misconfiguration.
    let ip = match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => addr.ip(),
        None => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    if !state.rate_limiter.admit(ip) {
        tracing::warn!(%ip, path = %req.uri().path(), "auth rate limit exceeded");
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
        response.headers_mut().insert(
            header::RETRY_AFTER,
            HeaderValue::from(state.rate_limiter.retry_after_secs()),
        );
        return Ok(response);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_is_enforced_per_window() {
        let limiter = RateLimiter::per_minute(5);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let start = Instant::now();
        for _ in 0..5 {
            assert!(limiter.admit_at(ip, start));
        }
        assert!(!limiter.admit_at(ip, start + Duration::from_secs(59)));
        assert!(limiter.admit_at(ip, start + Duration::from_secs(60)));
        assert_eq!(limiter.retry_after_secs(), 60);
    }

    #[test]
    fn clients_have_separate_quotas() {
        let limiter = RateLimiter::per_minute(3);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        for _ in 0..3 {
            assert!(limiter.admit(a));
        }
        assert!(!limiter.admit(a));
        assert!(limiter.admit(b));
    }

    #[test]
    fn sweeping_keeps_open_windows() {
        let limiter = RateLimiter::per_minute(100);
        let start = Instant::now();
        let stale: IpAddr = "192.168.0.1".parse().unwrap();
        assert!(limiter.admit_at(stale, start));

        let later = start + Duration::from_secs(120);
        for i in 0..SWEEP_THRESHOLD as u32 {
            let ip: IpAddr = std::net::Ipv4Addr::from(i.to_be_bytes()).into();
            limiter.admit_at(ip, later);
        }
        let tracked = limiter.windows.lock().unwrap().len();
        assert!(tracked <= SWEEP_THRESHOLD);
        assert!(!limiter.windows.lock().unwrap().contains_key(&stale));

        let recent: IpAddr = std::net::Ipv4Addr::from(9_999u32.to_be_bytes()).into();
        for _ in 0..99 {
            assert!(limiter.admit_at(recent, later));
        }
        assert!(!limiter.admit_at(recent, later));
    }

    #[test]
    fn token_header_precedence() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_from_headers(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(token_from_headers(&headers), Some("abc"));

        headers.insert("x-access-token", HeaderValue::from_static("xyz"));
        assert_eq!(token_from_headers(&headers), Some("xyz"));
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(token_from_headers(&headers), None);
    }
}

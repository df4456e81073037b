use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use placefinder_core::AppConfig;
use serde::Serialize;
use tokio::{sync::Mutex, time::Instant};
use uuid::Uuid;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Windows keyed by client IP. Requests without connection info share the
/// `None` window.
#[derive(Debug, Default)]
struct ClientWindows {
    windows: HashMap<Option<IpAddr>, RateLimitWindow>,
    swept_at: Option<Instant>,
}

impl ClientWindows {
    /// Drops expired windows, at most once per window length.
    fn sweep(&mut self, now: Instant, window: Duration) {
        if self
            .swept_at
            .is_some_and(|at| now.duration_since(at) < window)
        {
            return;
        }
        self.windows
            .retain(|_, w| now.duration_since(w.started_at) < window);
        self.swept_at = Some(now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Allowed { delay: Duration },
    Rejected,
}

/// Per-client fixed-window limiter shared by every API route.
///
/// Each client gets `max_requests` per window. Past `slow_down_after`
/// requests, every further request is held back by one more
/// `slow_down_step` before it is served.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    slow_down_after: usize,
    slow_down_step: Duration,
    clients: Arc<Mutex<ClientWindows>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            slow_down_after: 0,
            slow_down_step: Duration::ZERO,
            clients: Arc::new(Mutex::new(ClientWindows::default())),
        }
    }

    /// Enables the slow-down tier. `after == 0` leaves it disabled.
    #[must_use]
    pub fn with_slow_down(mut self, after: usize, step: Duration) -> Self {
        self.slow_down_after = after;
        self.slow_down_step = step;
        self
    }

    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(
            config.rate_limit_max_requests,
            Duration::from_secs(config.rate_limit_window_secs),
        )
        .with_slow_down(
            config.slow_down_after,
            Duration::from_millis(config.slow_down_step_ms),
        )
    }

    async fn admit(&self, client: Option<IpAddr>) -> Admission {
        let now = Instant::now();
        let mut clients = self.clients.lock().await;
        clients.sweep(now, self.window);

        let entry = clients.windows.entry(client).or_insert(RateLimitWindow {
            started_at: now,
            count: 0,
        });
        if now.duration_since(entry.started_at) >= self.window {
            *entry = RateLimitWindow {
                started_at: now,
                count: 0,
            };
        }
        if entry.count >= self.max_requests {
            return Admission::Rejected;
        }
        entry.count += 1;

        let over = if self.slow_down_after == 0 {
            0
        } else {
            entry.count.saturating_sub(self.slow_down_after)
        };
        let delay = self
            .slow_down_step
            .saturating_mul(u32::try_from(over).unwrap_or(u32::MAX));
        Admission::Allowed { delay }
    }

    #[cfg(test)]
    async fn tracked_clients(&self) -> usize {
        self.clients.lock().await.windows.len()
    }
}

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    error: MiddlewareError,
}

#[derive(Debug, Serialize)]
struct MiddlewareError {
    code: &'static str,
    message: &'static str,
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware enforcing the per-client request budget.
///
/// The client is identified by the peer address from [`ConnectInfo`], so the
/// server must be run with `into_make_service_with_connect_info`.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    match rate_limit.admit(client).await {
        Admission::Rejected => {
            tracing::warn!(
                client = ?client,
                max_requests = rate_limit.max_requests,
                window_secs = rate_limit.window.as_secs(),
                "request rejected by rate limiter"
            );
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(MiddlewareErrorBody {
                    error: MiddlewareError {
                        code: "rate_limited",
                        message: "too many requests from this client, please try again later",
                    },
                }),
            )
                .into_response()
        }
        Admission::Allowed { delay } => {
            if !delay.is_zero() {
                tracing::debug!(
                    client = ?client,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "slowing down client"
                );
                tokio::time::sleep(delay).await;
            }
            next.run(req).await
        }
    }
}

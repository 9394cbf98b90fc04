use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde_json::json;
use tracing::Instrument;
use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};
use uuid::Uuid;

use crate::state::AppState;

/// Fixed-window limiter keyed by client address.
#[derive(Debug)]
pub struct RateLimiter {
    requests_per_window: u64,
    window: Duration,
    entries: DashMap<String, (u64, Instant)>,
}

impl RateLimiter {
    pub fn new(requests_per_window: u64, window: Duration) -> Self {
        Self {
            requests_per_window,
            window,
            entries: DashMap::new(),
        }
    }

    pub fn per_second(requests: u64) -> Self {
        Self::new(requests, Duration::from_secs(1))
    }

    /// Records a hit for `key`; returns false once the window's budget is spent.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert((0, now));

        if now.duration_since(entry.1) >= self.window {
            *entry = (0, now);
        }
        if entry.0 >= self.requests_per_window {
            return false;
        }
        entry.0 += 1;
        true
    }

    /// Drops windows that have already expired.
    pub fn prune(&self) {
        let now = Instant::now();
        self.entries
            .retain(|_, (_, started)| now.duration_since(*started) < self.window);
    }
}

pub async fn rate_limit_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if !state.limiter.check(&ip) {
        tracing::warn!(action = "rate_limited", ip = %ip, uri = %request.uri());
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Too many requests. Please slow down." })),
        )
            .into_response();
    }
    state.limiter.prune();

    next.run(request).await
}

pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(request_id.clone());
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        uri = %req.uri()
    );
    next.run(req).instrument(span).await
}

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::error::ApiError;
use crate::infrastructure::config::RateLimitConfig;

// Sliding-window limiter keyed by client IP; excess requests get 429
// with a `Retry-After` hint, nothing is queued.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_seconds),
            clients: Mutex::new(HashMap::new()),
        }
    }

    // Clients with no in-window hits are evicted on every call so the map
    // stays bounded by the number of currently active clients.
    pub fn check(&self, client: &str) -> Result<(), u64> {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        clients.retain(|_, hits| {
            while hits.front().is_some_and(|t| now.duration_since(*t) > self.window) {
                hits.pop_front();
            }
            !hits.is_empty()
        });

        let hits = clients.entry(client.to_string()).or_default();
        if hits.len() >= self.max_requests {
            return Err(self.window.as_secs());
        }

        hits.push_back(now);
        Ok(())
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    // ConnectInfo is only present when the server was started with it; tests
    // and proxied setups fall back to a shared key.
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match limiter.check(&client) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            ApiError::rate_limited("Rate limit exceeded", retry_after).into_response()
        }
    }
}

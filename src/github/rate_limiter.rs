use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use reqwest::{Response, StatusCode};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Tracks the quota GitHub reports on every response for one API resource
/// and holds requests back once it is spent.
pub struct RateLimiter {
    state: Mutex<RateLimitState>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct RateLimitState {
    remaining: Option<u32>,
    reset_at: Option<Instant>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// A limiter whose waits end early once `cancel` fires.
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            state: Mutex::new(RateLimitState::default()),
            cancel,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RateLimitState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Waits out an exhausted quota. Returns `false` when cancelled first.
    pub async fn wait(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let wait_duration = {
            let state = self.lock();
            match (state.remaining, state.reset_at) {
                (Some(0), Some(reset_at)) => reset_at.checked_duration_since(Instant::now()),
                _ => None,
            }
        };

        if let Some(wait_duration) = wait_duration {
            tracing::info!("Rate limited, waiting {:?}", wait_duration);
            tokio::select! {
                _ = sleep(wait_duration) => {}
                _ = self.cancel.cancelled() => return false,
            }
            let mut state = self.lock();
            state.remaining = None;
            state.reset_at = None;
        }
        true
    }

    pub fn update_from_response(&self, response: &Response) {
        let Some(remaining) = header_u64(response, "x-ratelimit-remaining") else {
            return;
        };

        let mut state = self.lock();
        state.remaining = Some(remaining.min(u32::MAX as u64) as u32);
        state.reset_at = header_u64(response, "x-ratelimit-reset")
            .map(seconds_until)
            .map(|secs| Instant::now() + Duration::from_secs(secs));
    }

    /// Seconds to wait when `response` is a rejection for an exhausted
    /// quota, `None` for every other response.
    pub fn exhausted(response: &Response) -> Option<u64> {
        let status = response.status();
        if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
            return None;
        }

        if let Some(retry_after) = header_u64(response, "retry-after") {
            return Some(retry_after);
        }

        match header_u64(response, "x-ratelimit-remaining") {
            Some(0) => Some(
                header_u64(response, "x-ratelimit-reset")
                    .map(seconds_until)
                    .unwrap_or(60),
            ),
            _ => None,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn header_u64(response: &Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn seconds_until(reset_timestamp: u64) -> u64 {
    reset_timestamp.saturating_sub(now_secs())
}

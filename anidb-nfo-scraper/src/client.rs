use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::error::ScrapeError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the shared HTTP client used for every remote catalog.
pub fn http_client() -> Result<reqwest::Client, ScrapeError> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("anidb-nfo/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Enforces a minimum interval between requests to one remote service.
///
/// Clones share the same clock, so one limiter can be handed to several
/// callers of the same service.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last_request: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: Arc::new(Mutex::new(Instant::now() - interval)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until at least `interval` has passed since the previous request.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        if elapsed < self.interval {
            tokio::time::sleep(self.interval - elapsed).await;
        }
        *last = Instant::now();
    }
}

/// Map an unsuccessful HTTP status to the matching error.
pub(crate) fn status_error(service: &str, status: reqwest::StatusCode, body: &str) -> ScrapeError {
    let snippet = &body[..floor_char_boundary(body, 200)];
    match status {
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            ScrapeError::access_denied(format!("{service} rejected the credentials: {snippet}"))
        }
        reqwest::StatusCode::TOO_MANY_REQUESTS => ScrapeError::RateLimit(service.to_string()),
        _ => ScrapeError::ServerError {
            status: status.as_u16(),
            message: snippet.to_string(),
        },
    }
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn second_request_waits_for_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(700));
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(700));
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(700));
    }

    #[test]
    fn auth_statuses_are_access_denied() {
        let err = status_error("AniList", reqwest::StatusCode::UNAUTHORIZED, "Invalid token");
        assert!(err.is_fatal());
        let err = status_error("TMDB", reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert!(matches!(err, ScrapeError::RateLimit(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let body = "é".repeat(150);
        let err = status_error("x", reqwest::StatusCode::BAD_GATEWAY, &body);
        let ScrapeError::ServerError { message, .. } = err else {
            panic!("expected server error");
        };
        assert_eq!(message.len(), 200);
    }
}

//! HTTP plumbing: a transport seam over `reqwest::blocking` and the
//! rate-limited GET used for every catalog lookup.

use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;

use crate::config::{RetryPolicy, USER_AGENT};
use crate::error::{Error, FetchFailure, Result};

// ============================================================================
// Transport
// ============================================================================

/// Status, rate-limit hint and body of one HTTP exchange.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Retry-After in seconds (fractional allowed), or `default` when the
    /// hint is missing, negative, or does not fit in a `Duration`.
    pub fn retry_after_or(&self, default: Duration) -> Duration {
        self.retry_after
            .as_deref()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(default)
    }
}

/// One request, no retries. Errors are transport failures only; any
/// status code, including 4xx/5xx, comes back as `Ok`.
pub trait Transport {
    fn get(
        &self,
        url: &str,
        headers: &[(&str, String)],
        query: &[(&str, String)],
    ) -> Result<HttpResponse>;

    fn post_form(
        &self,
        url: &str,
        headers: &[(&str, String)],
        form: &[(&str, &str)],
    ) -> Result<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str, headers: &[(&str, String)], query: &[(&str, String)]) -> Result<HttpResponse> {
        (**self).get(url, headers, query)
    }

    fn post_form(&self, url: &str, headers: &[(&str, String)], form: &[(&str, &str)]) -> Result<HttpResponse> {
        (**self).post_form(url, headers, form)
    }
}

pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(policy: &RetryPolicy) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(policy.timeout)
            .build()?;
        Ok(Self { client })
    }

    fn finish(response: reqwest::blocking::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text()?;
        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str, headers: &[(&str, String)], query: &[(&str, String)]) -> Result<HttpResponse> {
        let mut request = self.client.get(url).query(query);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }
        Self::finish(request.send()?)
    }

    fn post_form(&self, url: &str, headers: &[(&str, String)], form: &[(&str, &str)]) -> Result<HttpResponse> {
        let mut request = self.client.post(url).form(form);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }
        Self::finish(request.send()?)
    }
}

// ============================================================================
// Pauses
// ============================================================================

/// Blocking delay. Swapped for a recorder in tests.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<P: Pause + ?Sized> Pause for &P {
    fn pause(&self, duration: Duration) {
        (**self).pause(duration)
    }
}

// ============================================================================
// Rate-limited fetcher
// ============================================================================

/// GET with bounded retry.
///
/// - 2xx: returned immediately
/// - 429: wait Retry-After (default 1s) plus padding, then retry
/// - other status or transport failure: wait `backoff_step * (attempt + 1)`
///
/// Every outcome consumes one of `max_attempts`. No wait follows the final
/// attempt; the last outcome is surfaced as `Error::Fetch`.
pub struct RateLimitedFetcher<T, P = ThreadPause> {
    transport: T,
    pause: P,
    policy: RetryPolicy,
}

impl<T: Transport, P: Pause> RateLimitedFetcher<T, P> {
    pub fn new(transport: T, pause: P, policy: RetryPolicy) -> Self {
        Self {
            transport,
            pause,
            policy,
        }
    }

    pub fn get(
        &self,
        url: &str,
        headers: &[(&str, String)],
        params: &[(&str, String)],
    ) -> Result<HttpResponse> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last = FetchFailure::Transport("no attempt made".to_string());

        for attempt in 0..attempts {
            let wait = match self.transport.get(url, headers, params) {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) if response.status == 429 => {
                    last = FetchFailure::Status(429);
                    response.retry_after_or(self.policy.default_retry_after) + self.policy.rate_limit_padding
                }
                Ok(response) => {
                    last = FetchFailure::Status(response.status);
                    self.policy.backoff_step * (attempt as u32 + 1)
                }
                Err(e) => {
                    last = FetchFailure::Transport(e.to_string());
                    self.policy.backoff_step * (attempt as u32 + 1)
                }
            };

            if attempt + 1 < attempts {
                warn!(
                    url,
                    attempt = attempt + 1,
                    failure = %last,
                    wait_ms = wait.as_millis() as u64,
                    "http.retry"
                );
                self.pause.pause(wait);
            }
        }

        Err(Error::Fetch {
            url: url.to_string(),
            attempts,
            last,
        })
    }
}

// ============================================================================
// Test doubles
// ============================================================================


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn fetcher<'a>(
        transport: &'a ScriptedTransport,
        pause: &'a RecordingPause,
    ) -> RateLimitedFetcher<&'a ScriptedTransport, &'a RecordingPause> {
        RateLimitedFetcher::new(transport, pause, RetryPolicy::default())
    }

    #[test]
    fn test_success_first_try() {
        let transport = ScriptedTransport::new(vec![ok("{}")]);
        let pause = RecordingPause::default();
        let resp = fetcher(&transport, &pause).get("https://api/x", &[], &[]).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(transport.call_count(), 1);
        assert!(pause.pauses.borrow().is_empty());
    }

    #[test]
    fn test_rate_limit_honors_retry_after() {
        let transport = ScriptedTransport::new(vec![rate_limited(Some("2")), ok("{}")]);
        let pause = RecordingPause::default();
        let resp = fetcher(&transport, &pause).get("https://api/x", &[], &[]).unwrap();
        assert!(resp.is_success());
        assert_eq!(*pause.pauses.borrow(), vec![Duration::from_millis(2500)]);
    }

    #[test]
    fn test_rate_limit_default_hint() {
        let transport = ScriptedTransport::new(vec![rate_limited(None), rate_limited(Some("soon")), ok("{}")]);
        let pause = RecordingPause::default();
        fetcher(&transport, &pause).get("https://api/x", &[], &[]).unwrap();
        assert_eq!(
            *pause.pauses.borrow(),
            vec![Duration::from_millis(1500), Duration::from_millis(1500)]
        );
    }

    #[test]
    fn test_repeated_429_exhausts_budget() {
        let transport = ScriptedTransport::new(vec![
            rate_limited(Some("1")),
            rate_limited(Some("1")),
            rate_limited(Some("1")),
            ok("{}"),
        ]);
        let pause = RecordingPause::default();
        let err = fetcher(&transport, &pause).get("https://api/x", &[], &[]).unwrap_err();
        assert_eq!(err.kind(), "fetch");
        assert_eq!(err.last_status(), Some(429));
        assert_eq!(transport.call_count(), 3);
        // No wait after the final attempt
        assert_eq!(pause.pauses.borrow().len(), 2);
    }

    #[test]
    fn test_linear_backoff_on_server_error() {
        let transport = ScriptedTransport::new(vec![status(500, ""), status(502, ""), status(503, "")]);
        let pause = RecordingPause::default();
        let err = fetcher(&transport, &pause).get("https://api/x", &[], &[]).unwrap_err();
        assert_eq!(err.last_status(), Some(503));
        assert_eq!(
            *pause.pauses.borrow(),
            vec![Duration::from_millis(600), Duration::from_millis(1200)]
        );
    }

    #[test]
    fn test_transport_failure_is_retried() {
        let transport = ScriptedTransport::new(vec![
            Err(Error::Data("connection reset".to_string())),
            ok("{\"fine\":true}"),
        ]);
        let pause = RecordingPause::default();
        let resp = fetcher(&transport, &pause).get("https://api/x", &[], &[]).unwrap();
        assert_eq!(resp.body, "{\"fine\":true}");
        assert_eq!(*pause.pauses.borrow(), vec![Duration::from_millis(600)]);
    }

    #[test]
    fn test_transport_failure_last_outcome() {
        let transport = ScriptedTransport::new(vec![
            status(500, ""),
            status(500, ""),
            Err(Error::Data("timed out".to_string())),
        ]);
        let pause = RecordingPause::default();
        let err = fetcher(&transport, &pause).get("https://api/x", &[], &[]).unwrap_err();
        assert_eq!(err.last_status(), None);
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_passes_headers_and_params() {
        let transport = ScriptedTransport::new(vec![ok("{}")]);
        let pause = RecordingPause::default();
        fetcher(&transport, &pause)
            .get(
                "https://api/search",
                &[("Authorization", "Bearer t".to_string())],
                &[("q", "a b".to_string())],
            )
            .unwrap();
        let calls = transport.calls.borrow();
        assert_eq!(calls[0].headers[0], ("Authorization".to_string(), "Bearer t".to_string()));
        assert_eq!(calls[0].params[0], ("q".to_string(), "a b".to_string()));
    }

    #[test]
    fn test_retry_after_parsing() {
        let resp = HttpResponse {
            status: 429,
            retry_after: Some("0.25".to_string()),
            body: String::new(),
        };
        assert_eq!(resp.retry_after_or(Duration::from_secs(1)), Duration::from_millis(250));
    }

    #[test]
    fn test_retry_after_out_of_range_uses_default() {
        for hint in ["1e30", "-3", "NaN", "inf"] {
            let resp = HttpResponse {
                status: 429,
                retry_after: Some(hint.to_string()),
                body: String::new(),
            };
            assert_eq!(resp.retry_after_or(Duration::from_secs(1)), Duration::from_secs(1), "hint {}", hint);
        }
    }

    #[test]
    fn test_huge_retry_after_still_retries() {
        let transport = ScriptedTransport::new(vec![rate_limited(Some("1e30")), ok("{}")]);
        let pause = RecordingPause::default();
        let resp = fetcher(&transport, &pause).get("https://api/x", &[], &[]).unwrap();
        assert!(resp.is_success());
        assert_eq!(*pause.pauses.borrow(), vec![Duration::from_millis(1500)]);
    }
}

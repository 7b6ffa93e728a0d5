use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

pub const USER_AGENT_VALUE: &str = concat!("pubmed-sync/", env!("CARGO_PKG_VERSION"));

const MAX_RETRIES: usize = 3;
const BASE_DELAY_MS: u64 = 200;

pub fn build_client(
    timeout: Duration,
    extra: HeaderMap,
) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    headers.extend(extra);
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
}

/// Resends on throttling, gateway errors and dropped connections; the final
/// response or error is handed back as-is.
pub fn send_with_retries<F>(mut make_req: F) -> Result<Response, reqwest::Error>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0usize;
    loop {
        match make_req().send() {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if attempt < MAX_RETRIES && is_retryable_status(status) {
                    tracing::debug!(status, attempt, "resending request");
                    backoff(attempt);
                    attempt += 1;
                    continue;
                }
                return Ok(resp);
            }
            Err(err) => {
                if attempt < MAX_RETRIES && is_retryable_error(&err) {
                    tracing::debug!(error = %err, attempt, "resending request");
                    backoff(attempt);
                    attempt += 1;
                    continue;
                }
                return Err(err);
            }
        }
    }
}

/// Body text of a failed response, or `fallback` when the body is unreadable.
pub fn error_message(response: Response, fallback: &str) -> String {
    response
        .text()
        .ok()
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn backoff(attempt: usize) {
    thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
}

pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

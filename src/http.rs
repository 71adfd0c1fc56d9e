use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response};

use crate::error::EfpError;

const MAX_RETRIES: usize = 3;
const BASE_DELAY_MS: u64 = 200;

pub(crate) fn build_client(
    timeout: Duration,
    on_error: fn(String) -> EfpError,
) -> Result<Client, EfpError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("efp-tissue/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| on_error(err.to_string()))?,
    );
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|err| on_error(err.to_string()))
}

pub(crate) async fn send_with_retries<F>(
    mut make_req: F,
    on_error: fn(String) -> EfpError,
) -> Result<Response, EfpError>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0usize;
    loop {
        match make_req().send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if attempt < MAX_RETRIES && is_retryable_status(status) {
                    tracing::debug!(status, attempt, "retrying request");
                    backoff(attempt).await;
                    attempt += 1;
                    continue;
                }
                return Ok(resp);
            }
            Err(err) => {
                if attempt < MAX_RETRIES && is_retryable_error(&err) {
                    tracing::debug!(error = %err, attempt, "retrying request");
                    backoff(attempt).await;
                    attempt += 1;
                    continue;
                }
                return Err(on_error(err.to_string()));
            }
        }
    }
}

pub(crate) async fn check_status(
    response: Response,
    fallback: &str,
    on_status: fn(u16, String) -> EfpError,
) -> Result<Response, EfpError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| fallback.to_string());
    Err(on_status(status, message))
}

async fn backoff(attempt: usize) {
    let delay = BASE_DELAY_MS * (attempt as u64 + 1);
    tokio::time::sleep(Duration::from_millis(delay)).await;
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

//! Shared request plumbing: one place that turns reqwest failures and
//! upstream statuses into [`FetchError`]s with provenance.

use std::time::Duration;

use maglev_core::{FetchError, FetchErrorKind, FetchResult};
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Longest upstream body excerpt kept in an error message.
const BODY_EXCERPT_LEN: usize = 300;

pub fn user_agent() -> String {
    format!("maglev/{}", maglev_core::VERSION)
}

/// Build the HTTP client shared by every collaborator.
///
/// The transport timeout matches the per-call deadline so a hung socket
/// surfaces as a `timeout` error even outside `with_timeout`.
pub fn build_http_client(timeout_ms: u64) -> FetchResult<Client> {
    Client::builder()
        .user_agent(user_agent())
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .map_err(|e| FetchError::new(FetchErrorKind::Transport, format!("http client: {}", e)))
}

/// Client that hands redirects back to the caller instead of following them.
///
/// Used where the `Location` itself is the result, such as a short-lived
/// signed download URL.
pub fn build_redirect_client(timeout_ms: u64) -> FetchResult<Client> {
    Client::builder()
        .user_agent(user_agent())
        .timeout(Duration::from_millis(timeout_ms))
        .redirect(Policy::none())
        .build()
        .map_err(|e| FetchError::new(FetchErrorKind::Transport, format!("http client: {}", e)))
}

/// Send `builder` and decode a JSON body.
///
/// Status mapping:
/// - 404 is `not_found`
/// - 429 and 5xx are `http_status` (retryable)
/// - any other non-2xx is `api`
pub(crate) async fn send_json<T: DeserializeOwned>(
    client: &Client,
    builder: RequestBuilder,
) -> FetchResult<T> {
    let request = builder
        .build()
        .map_err(|e| FetchError::new(FetchErrorKind::Transport, format!("invalid request: {}", e)))?;
    let method = request.method().to_string();
    let url = request.url().to_string();
    debug!(method = %method, url = %url, "sending request");

    let response = client
        .execute(request)
        .await
        .map_err(|e| from_reqwest(&e).with_request(&method, &url))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| from_reqwest(&e).with_request(&method, &url).with_status(status.as_u16()))?;

    if !status.is_success() {
        return Err(status_error(status, &body)
            .with_request(&method, &url)
            .with_status(status.as_u16()));
    }

    decode(&body).map_err(|e| e.with_request(&method, &url).with_status(status.as_u16()))
}

/// Send `builder` on a non-following client and return the redirect target.
pub(crate) async fn send_for_redirect(
    client: &Client,
    builder: RequestBuilder,
) -> FetchResult<String> {
    let request = builder
        .build()
        .map_err(|e| FetchError::new(FetchErrorKind::Transport, format!("invalid request: {}", e)))?;
    let method = request.method().to_string();
    let url = request.url().to_string();
    debug!(method = %method, url = %url, "resolving redirect");

    let response = client
        .execute(request)
        .await
        .map_err(|e| from_reqwest(&e).with_request(&method, &url))?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = if status.is_redirection() {
        String::new()
    } else {
        response
            .text()
            .await
            .map_err(|e| from_reqwest(&e).with_request(&method, &url).with_status(status.as_u16()))?
    };

    redirect_location(status, &headers, &body)
        .map_err(|e| e.with_request(&method, &url).with_status(status.as_u16()))
}

/// The `Location` of a 3xx response. Non-redirects map like [`send_json`].
pub(crate) fn redirect_location(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> FetchResult<String> {
    if status.is_redirection() {
        return headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                FetchError::new(
                    FetchErrorKind::Decode,
                    format!("{} without a Location header", status),
                )
            });
    }
    if status.is_success() {
        return Err(FetchError::new(
            FetchErrorKind::Api,
            format!("expected a redirect, got {}", status),
        ));
    }
    Err(status_error(status, body))
}

/// Decode a JSON body into `T`.
pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> FetchResult<T> {
    serde_json::from_str(body)
        .map_err(|e| FetchError::new(FetchErrorKind::Decode, format!("unexpected response: {}", e)))
}

pub(crate) fn status_error(status: StatusCode, body: &str) -> FetchError {
    let kind = if status == StatusCode::NOT_FOUND {
        FetchErrorKind::NotFound
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        FetchErrorKind::HttpStatus
    } else {
        FetchErrorKind::Api
    };
    let excerpt: String = body.trim().chars().take(BODY_EXCERPT_LEN).collect();
    let message = if excerpt.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, excerpt)
    };
    FetchError::new(kind, message)
}

fn from_reqwest(err: &reqwest::Error) -> FetchError {
    let kind = if err.is_timeout() {
        FetchErrorKind::Timeout
    } else if err.is_decode() {
        FetchErrorKind::Decode
    } else {
        FetchErrorKind::Transport
    };
    FetchError::new(kind, err.to_string())
}

use std::time::Duration;

use config::Settings;
use core_types::{BackendError, BackendKind};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) fn request_timeout(kind: BackendKind, settings: &Settings) -> Duration {
    match settings.request_timeout() {
        Ok(timeout) if timeout.is_zero() => {
            warn!(backend = %kind, "request timeout of zero, using the default");
            DEFAULT_TIMEOUT
        }
        Ok(timeout) => timeout,
        Err(err) => {
            warn!(backend = %kind, error = %err, "falling back to default request timeout");
            DEFAULT_TIMEOUT
        }
    }
}

/// Builds a fresh client carrying the JSON content type and, when given,
/// the bearer credential on every request.
pub(crate) fn build_client(
    kind: BackendKind,
    bearer: Option<&str>,
    timeout: Duration,
) -> Option<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(token) = bearer {
        match HeaderValue::from_str(&format!("Bearer {}", token.trim())) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => {
                warn!(backend = %kind, "api key is not a valid header value");
                return None;
            }
        }
    }

    match Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
    {
        Ok(client) => Some(client),
        Err(err) => {
            warn!(backend = %kind, error = %err, "failed to build http client");
            None
        }
    }
}

/// One POST, one JSON document back. Transport failures, non-success
/// statuses and undecodable bodies all become `BackendError::Upstream`.
pub(crate) async fn post_json<B: Serialize + ?Sized>(
    client: &Client,
    kind: BackendKind,
    url: &str,
    body: &B,
) -> Result<Value, BackendError> {
    debug!(backend = %kind, %url, "sending generation request");
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|err| BackendError::upstream(kind, describe(&err)))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| BackendError::upstream(kind, describe(&err)))?;
    if !status.is_success() {
        return Err(BackendError::upstream(
            kind,
            format!("API request failed: {status} {text}"),
        ));
    }

    serde_json::from_str(&text)
        .map_err(|err| BackendError::upstream(kind, format!("invalid response json: {err}")))
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    }
}

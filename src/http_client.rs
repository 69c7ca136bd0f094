use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;

use crate::error::OracleError;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const AGENT: &str = "mlb-oracle/0.1";

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

/// GET `url` and return the body, classifying failures so the retry layer
/// knows whether another attempt can help.
pub fn get_text(url: &str, query: &[(&str, &str)]) -> std::result::Result<String, OracleError> {
    let client = http_client().map_err(|err| OracleError::permanent(format!("{err:#}")))?;
    let resp = client
        .get(url)
        .query(query)
        .header(USER_AGENT, AGENT)
        .send()
        .map_err(|err| {
            if err.is_timeout() || err.is_connect() || err.is_request() {
                OracleError::transient(format!("request to {url} failed: {err}"))
            } else {
                OracleError::permanent(format!("request to {url} failed: {err}"))
            }
        })?;
    let status = resp.status();
    let body = resp
        .text()
        .map_err(|err| OracleError::transient(format!("failed reading body of {url}: {err}")))?;
    if status.is_success() {
        return Ok(body);
    }

    let snippet = body
        .trim()
        .replace(['\n', '\r'], " ")
        .chars()
        .take(220)
        .collect::<String>();
    let message = format!("http {status} from {url}: {snippet}");
    if is_transient_status(status) {
        Err(OracleError::transient(message))
    } else {
        Err(OracleError::permanent(message))
    }
}

pub fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_statuses() {
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::BAD_REQUEST));
    }
}

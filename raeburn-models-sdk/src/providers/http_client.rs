use crate::retry::AttemptError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

#[derive(Clone, Debug)]
pub enum AuthStrategy {
    Bearer { token: String },
    None,
}

/// Thin wrapper over one pooled `reqwest::Client` per upstream base URL.
/// Each call is a single attempt; retry policy lives with the caller.
#[derive(Clone)]
pub struct HttpProviderClient {
    http: Client,
    default_headers: HeaderMap,
}

impl HttpProviderClient {
    pub fn new(
        timeout: Duration,
        headers: &[(String, String)],
        auth: AuthStrategy,
    ) -> Result<Self, String> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("failed to create HTTP client: {e}"))?;

        let mut default_headers = HeaderMap::new();
        if let AuthStrategy::Bearer { token } = auth {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                default_headers.insert("Authorization", value);
            }
        }
        for (k, v) in headers {
            if let (Ok(name), Ok(value)) = (k.parse::<HeaderName>(), HeaderValue::from_str(v)) {
                default_headers.insert(name, value);
            }
        }

        Ok(Self {
            http,
            default_headers,
        })
    }

    /// POST a JSON body and parse a JSON response. One attempt: transport
    /// failures and 5xx statuses come back as `Transient`, 4xx statuses and
    /// unparseable bodies as `Fatal`.
    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Value, AttemptError> {
        let resp = self
            .http
            .post(url)
            .headers(self.default_headers.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| AttemptError::Transient(format!("request error: {e}")))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(AttemptError::Transient(format!(
                "upstream returned {status}"
            )));
        }
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(AttemptError::Fatal(format!(
                "upstream returned {status}: {}",
                truncate(&detail, 200)
            )));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| AttemptError::Fatal(format!("malformed response body: {e}")))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

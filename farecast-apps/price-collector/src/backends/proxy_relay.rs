//!  Farecast Price Collector
//!
//!  Copyright (C) 2026  Mamy Ratsimbazafy
//!
//!  This program is free software: you can redistribute it and/or modify
//!  it under the terms of the GNU Affero General Public License as published by
//!  the Free Software Foundation, either version 3 of the License, or
//!  (at your option) any later version.
//!
//!  This program is distributed in the hope that it will be useful,
//!  but WITHOUT ANY WARRANTY; without even the implied warranty of
//!  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//!  GNU Affero General Public License for more details.
//!
//!  You should have received a copy of the GNU Affero General Public License
//!  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Relay backend: a third-party service fetches the search page from its own
//! network origin and hands back `{status, body}`.

use std::fmt;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{BackendError, BackendKind, RawResponse, classify_response};
use crate::flights_query_builder::EncodedQuery;

/// Environment variable holding the relay bearer token.
pub const RELAY_TOKEN_ENV: &str = "FARECAST_RELAY_TOKEN";

/// Relay bearer token. Never printed.
#[derive(Clone)]
pub struct RelayCredentials(String);

impl RelayCredentials {
    pub fn new(token: String) -> Self {
        Self(token)
    }

    /// Read the token from the environment, if set and non-empty.
    pub fn from_env() -> Option<Self> {
        std::env::var(RELAY_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(Self)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for RelayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RelayCredentials(<redacted>)")
    }
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    url: &'a str,
    timeout_ms: u64,
}

#[derive(Deserialize)]
struct RelayReply {
    status: u16,
    #[serde(default)]
    body: String,
}

pub struct ProxyRelayBackend {
    client: wreq::Client,
    endpoint: String,
    credentials: RelayCredentials,
    language: String,
    currency: String,
}

impl ProxyRelayBackend {
    pub fn new(
        endpoint: String,
        credentials: RelayCredentials,
        language: String,
        currency: String,
    ) -> Result<Self> {
        let client = wreq::Client::builder()
            .build()
            .context("Failed to build relay HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            credentials,
            language,
            currency,
        })
    }

    pub async fn fetch(
        &self,
        query: &EncodedQuery,
        timeout: Duration,
    ) -> Result<RawResponse, BackendError> {
        let target = query.search_url(&self.language, &self.currency);
        let payload = RelayRequest {
            url: &target,
            timeout_ms: timeout.as_millis() as u64,
        };
        let start = Instant::now();

        tracing::trace!("[proxy_relayed] POST {} for {}", self.endpoint, target);
        let exchange = async {
            let response = self
                .client
                .post(&self.endpoint)
                .header("Authorization", self.credentials.bearer())
                .json(&payload)
                .send()
                .await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, wreq::Error>((status, body))
        };

        let (relay_status, relay_body) = match tokio::time::timeout(timeout, exchange).await {
            Err(_) => return Err(BackendError::Timeout(timeout)),
            Ok(Err(e)) if e.is_timeout() => return Err(BackendError::Timeout(timeout)),
            Ok(Err(e)) => return Err(BackendError::ConnectionRefused(e.to_string())),
            Ok(Ok(exchange)) => exchange,
        };

        match relay_status {
            200..=299 => {}
            429 => return Err(BackendError::RateLimited),
            code => {
                tracing::warn!("[proxy_relayed] relay answered HTTP {}", code);
                return Err(BackendError::HttpStatus(code));
            }
        }

        let reply = parse_reply(&relay_body)?;
        let elapsed = start.elapsed();
        tracing::debug!(
            "[proxy_relayed] upstream HTTP {} in {:?}, {} KB",
            reply.status,
            elapsed,
            reply.body.len() / 1024
        );

        classify_response(reply.status, &reply.body)?;

        Ok(RawResponse {
            body: reply.body,
            backend: BackendKind::ProxyRelayed,
            http_status: reply.status,
            elapsed_ms: elapsed.as_millis() as u64,
        })
    }
}

fn parse_reply(body: &str) -> Result<RelayReply, BackendError> {
    serde_json::from_str(body).map_err(|e| {
        BackendError::ConnectionRefused(format!("unreadable relay reply: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_are_redacted() {
        let creds = RelayCredentials::new("sk-live-123".into());
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("sk-live-123"));
        assert_eq!(creds.bearer(), "Bearer sk-live-123");
    }

    #[test]
    fn request_body_shape() {
        let request = RelayRequest {
            url: "https://www.google.com/travel/flights/search?tfs=abc",
            timeout_ms: 30_000,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "url": "https://www.google.com/travel/flights/search?tfs=abc",
                "timeout_ms": 30000
            })
        );
    }

    #[test]
    fn parses_relay_reply() {
        let reply = parse_reply(r#"{"status": 200, "body": "<ul class=\"Rk10dc\"></ul>"}"#)
            .expect("valid reply");
        assert_eq!(reply.status, 200);
        assert!(reply.body.contains("Rk10dc"));

        let reply = parse_reply(r#"{"status": 502}"#).expect("body is optional");
        assert!(reply.body.is_empty());
    }

    #[test]
    fn rejects_garbage_reply() {
        assert!(matches!(
            parse_reply("<html>gateway</html>"),
            Err(BackendError::ConnectionRefused(_))
        ));
    }
}

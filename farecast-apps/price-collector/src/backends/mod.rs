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

//! # Fetch Backends
//!
//! Effectful strategies for running one search against the provider.
//! Every backend answers with raw markup or a classified [`BackendError`];
//! consent interstitials are always reported as [`BackendError::ConsentWall`].

pub mod direct_http;
pub mod headless_browser;
pub mod proxy_relay;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consent_cookie::looks_like_consent_wall;
use crate::flights_query_builder::EncodedQuery;

pub use direct_http::DirectHttpBackend;
pub use headless_browser::HeadlessBrowserBackend;
pub use proxy_relay::{ProxyRelayBackend, RelayCredentials};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    DirectHttp,
    HeadlessBrowser,
    ProxyRelayed,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [
        BackendKind::DirectHttp,
        BackendKind::HeadlessBrowser,
        BackendKind::ProxyRelayed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::DirectHttp => "direct_http",
            BackendKind::HeadlessBrowser => "headless_browser",
            BackendKind::ProxyRelayed => "proxy_relayed",
        }
    }

    /// `primary` first, then the remaining backends from cheapest to costliest.
    pub fn fallback_order(primary: BackendKind) -> Vec<BackendKind> {
        std::iter::once(primary)
            .chain(Self::ALL.into_iter().filter(|k| *k != primary))
            .collect()
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one successful transport interaction, consumed once by the decoder.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub body: String,
    pub backend: BackendKind,
    pub http_status: u16,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    ConnectionRefused(String),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("rate limited by provider")]
    RateLimited,
    #[error("consent wall: {0}")]
    ConsentWall(String),
    #[error("backend {0} is not configured")]
    Unavailable(BackendKind),
}

impl BackendError {
    /// Worth retrying on the same backend after a backoff delay.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Timeout(_)
            | BackendError::ConnectionRefused(_)
            | BackendError::RateLimited => true,
            BackendError::HttpStatus(code) => *code >= 500,
            BackendError::ConsentWall(_) | BackendError::Unavailable(_) => false,
        }
    }
}

/// Map a provider status and body onto the backend error taxonomy.
///
/// The consent check runs first: the interstitial is usually served as 200.
pub(crate) fn classify_response(status: u16, body: &str) -> Result<(), BackendError> {
    if looks_like_consent_wall(body) {
        let preview = body.chars().take(300).collect::<String>();
        return Err(BackendError::ConsentWall(preview));
    }
    match status {
        429 => Err(BackendError::RateLimited),
        200..=299 => Ok(()),
        code => Err(BackendError::HttpStatus(code)),
    }
}

/// Capability the orchestrator drives: run one query on a named backend.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        backend: BackendKind,
        query: &EncodedQuery,
        timeout: Duration,
    ) -> impl Future<Output = Result<RawResponse, BackendError>> + Send;
}

impl<T: Fetcher> Fetcher for std::sync::Arc<T> {
    fn fetch(
        &self,
        backend: BackendKind,
        query: &EncodedQuery,
        timeout: Duration,
    ) -> impl Future<Output = Result<RawResponse, BackendError>> + Send {
        T::fetch(self, backend, query, timeout)
    }
}

/// One concrete backend.
pub enum Backend {
    DirectHttp(DirectHttpBackend),
    HeadlessBrowser(HeadlessBrowserBackend),
    ProxyRelayed(ProxyRelayBackend),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::DirectHttp(_) => BackendKind::DirectHttp,
            Backend::HeadlessBrowser(_) => BackendKind::HeadlessBrowser,
            Backend::ProxyRelayed(_) => BackendKind::ProxyRelayed,
        }
    }

    pub async fn fetch(
        &self,
        query: &EncodedQuery,
        timeout: Duration,
    ) -> Result<RawResponse, BackendError> {
        match self {
            Backend::DirectHttp(b) => b.fetch(query, timeout).await,
            Backend::HeadlessBrowser(b) => b.fetch(query, timeout).await,
            Backend::ProxyRelayed(b) => b.fetch(query, timeout).await,
        }
    }
}

/// The backends available to a run, looked up by kind.
#[derive(Default)]
pub struct BackendSet {
    backends: Vec<Backend>,
}

impl BackendSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend, replacing any previous one of the same kind.
    pub fn with(mut self, backend: Backend) -> Self {
        self.backends.retain(|b| b.kind() != backend.kind());
        self.backends.push(backend);
        self
    }

    pub fn kinds(&self) -> Vec<BackendKind> {
        self.backends.iter().map(Backend::kind).collect()
    }

    pub fn contains(&self, kind: BackendKind) -> bool {
        self.backends.iter().any(|b| b.kind() == kind)
    }
}

impl Fetcher for BackendSet {
    async fn fetch(
        &self,
        backend: BackendKind,
        query: &EncodedQuery,
        timeout: Duration,
    ) -> Result<RawResponse, BackendError> {
        match self.backends.iter().find(|b| b.kind() == backend) {
            Some(b) => b.fetch(query, timeout).await,
            None => Err(BackendError::Unavailable(backend)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_starts_with_primary() {
        assert_eq!(
            BackendKind::fallback_order(BackendKind::HeadlessBrowser),
            vec![
                BackendKind::HeadlessBrowser,
                BackendKind::DirectHttp,
                BackendKind::ProxyRelayed
            ]
        );
    }

    #[test]
    fn classifies_statuses() {
        assert_eq!(classify_response(200, "<html></html>"), Ok(()));
        assert_eq!(
            classify_response(429, "slow down"),
            Err(BackendError::RateLimited)
        );
        assert_eq!(
            classify_response(503, "oops"),
            Err(BackendError::HttpStatus(503))
        );
        assert!(matches!(
            classify_response(200, "<base href=\"https://consent.google.com\">"),
            Err(BackendError::ConsentWall(_))
        ));
    }

    #[test]
    fn transient_errors() {
        assert!(BackendError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(BackendError::RateLimited.is_transient());
        assert!(BackendError::HttpStatus(502).is_transient());
        assert!(!BackendError::HttpStatus(404).is_transient());
        assert!(!BackendError::ConsentWall(String::new()).is_transient());
    }

    #[tokio::test]
    async fn missing_backend_is_unavailable() {
        use crate::flights_criteria::{AirportCode, SearchCriteria};
        use chrono::NaiveDate;

        let date = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap();
        let criteria = SearchCriteria::builder(
            AirportCode::parse("LHR").unwrap(),
            AirportCode::parse("AMS").unwrap(),
            date,
        )
        .build(date)
        .unwrap();
        let query = crate::flights_query_builder::encode(&criteria);

        let set = BackendSet::new();
        let err = set
            .fetch(BackendKind::ProxyRelayed, &query, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::Unavailable(BackendKind::ProxyRelayed));
    }
}

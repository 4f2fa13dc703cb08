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

//! Direct HTTP backend: a single GET impersonating Safari's TLS/HTTP2
//! fingerprint, with the consent cookie pre-set.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use wreq::redirect::Policy;
use wreq_util::Emulation;

use super::{BackendError, BackendKind, RawResponse, classify_response};
use crate::consent_cookie::generate_cookie_header;
use crate::flights_query_builder::EncodedQuery;

pub struct DirectHttpBackend {
    client: wreq::Client,
    language: String,
    currency: String,
}

impl DirectHttpBackend {
    pub fn new(language: String, currency: String) -> Result<Self> {
        let client = wreq::Client::builder()
            .emulation(Emulation::Safari18_5)
            .redirect(Policy::default())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            language,
            currency,
        })
    }

    pub async fn fetch(
        &self,
        query: &EncodedQuery,
        timeout: Duration,
    ) -> Result<RawResponse, BackendError> {
        let url = query.search_url(&self.language, &self.currency);
        let cookie = generate_cookie_header();
        let start = Instant::now();

        tracing::trace!("[direct_http] GET {}", url);
        let exchange = async {
            let response = self
                .client
                .get(&url)
                .header("Cookie", &cookie)
                .send()
                .await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, wreq::Error>((status, body))
        };

        let (status, body) = match tokio::time::timeout(timeout, exchange).await {
            Err(_) => return Err(BackendError::Timeout(timeout)),
            Ok(Err(e)) if e.is_timeout() => return Err(BackendError::Timeout(timeout)),
            Ok(Err(e)) => return Err(BackendError::ConnectionRefused(e.to_string())),
            Ok(Ok(exchange)) => exchange,
        };
        let elapsed = start.elapsed();
        tracing::debug!(
            "[direct_http] HTTP {} in {:?}, {} KB",
            status,
            elapsed,
            body.len() / 1024
        );

        classify_response(status, &body)?;

        Ok(RawResponse {
            body,
            backend: BackendKind::DirectHttp,
            http_status: status,
            elapsed_ms: elapsed.as_millis() as u64,
        })
    }
}

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

//! # Fetch configuration
//!
//! Loaded from JSON. Every field has a default, durations are float seconds.
//! Secrets never live here: the relay token comes from the environment.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use farecast_query_queues::Backoff;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backends::{
    Backend, BackendKind, BackendSet, DirectHttpBackend, HeadlessBrowserBackend,
    ProxyRelayBackend, RelayCredentials,
};
use crate::flights_criteria::{AirportCode, CabinClass, TripType};
use crate::flights_dataset::generate_date_range;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("max_concurrent must be at least 1")]
    NoConcurrency,
    #[error("max_retries must be at least 1")]
    NoAttempts,
    #[error("at least one adult passenger is required")]
    NoAdult,
    #[error("max_offers_per_search must be at least 1")]
    NoOffersRequested,
    #[error("fallback order is empty")]
    EmptyFallbackOrder,
    #[error("backend {0} appears twice in the fallback order")]
    DuplicateBackend(BackendKind),
    #[error("{field} must be a finite, non-negative number of seconds (got {value})")]
    InvalidDuration { field: &'static str, value: f64 },
    #[error("request_timeout must be positive")]
    ZeroTimeout,
    #[error("jitter_factor must be within [0, 1] (got {0})")]
    InvalidJitter(f64),
}

/// An origin/destination pair. Deserializes from `["LHR", "CDG"]` or
/// `{"origin": "LHR", "destination": "CDG"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub origin: AirportCode,
    pub destination: AirportCode,
}

impl Route {
    pub fn new(origin: AirportCode, destination: AirportCode) -> Self {
        Self {
            origin,
            destination,
        }
    }
}

/// Departure dates relative to the query date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateRange {
    pub start_days: u32,
    pub end_days: u32,
    pub step: u32,
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            start_days: 7,
            end_days: 60,
            step: 7,
        }
    }
}

impl DateRange {
    pub fn dates_from(&self, today: NaiveDate) -> Vec<NaiveDate> {
        generate_date_range(today, self.start_days, self.end_days, self.step)
    }
}

/// Per-search parameters shared by every pair of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub query_date: NaiveDate,
    pub cabin: CabinClass,
    pub trip_type: TripType,
    pub adults: u32,
    pub children: u32,
    pub currency: String,
    pub max_offers: u32,
}

impl SearchOptions {
    pub fn new(query_date: NaiveDate) -> Self {
        Self {
            query_date,
            cabin: CabinClass::Economy,
            trip_type: TripType::OneWay,
            adults: 1,
            children: 0,
            currency: "USD".to_string(),
            max_offers: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Minimum spacing between two dispatches on the same backend.
    pub request_delay: f64,
    /// Attempts per backend before escalating.
    pub max_retries: u32,
    pub retry_delay: f64,
    pub max_retry_delay: f64,
    pub jitter_factor: f64,
    /// Primary backend.
    pub mode: BackendKind,
    /// Overrides the order derived from `mode`.
    pub fallback_order: Option<Vec<BackendKind>>,
    pub max_concurrent: u32,
    pub max_offers_per_search: u32,
    pub request_timeout: f64,
    pub seat_class: CabinClass,
    pub trip_type: TripType,
    pub adults: u32,
    pub children: u32,
    pub currency: String,
    pub language: String,
    pub routes: Vec<Route>,
    pub dates: DateRange,
    pub webdriver_url: String,
    pub relay_endpoint: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_delay: 0.5,
            max_retries: 3,
            retry_delay: 5.0,
            max_retry_delay: 120.0,
            jitter_factor: 0.5,
            mode: BackendKind::DirectHttp,
            fallback_order: None,
            max_concurrent: 4,
            max_offers_per_search: 50,
            request_timeout: 30.0,
            seat_class: CabinClass::Economy,
            trip_type: TripType::OneWay,
            adults: 1,
            children: 0,
            currency: "USD".to_string(),
            language: "en".to_string(),
            routes: Vec::new(),
            dates: DateRange::default(),
            webdriver_url: "http://localhost:4444".to_string(),
            relay_endpoint: None,
        }
    }
}

fn seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidDuration { field, value })
}

impl FetchConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse fetch configuration")
    }

    pub async fn load(path: &std::path::Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::NoConcurrency);
        }
        if self.max_retries == 0 {
            return Err(ConfigError::NoAttempts);
        }
        if self.adults == 0 {
            return Err(ConfigError::NoAdult);
        }
        if self.max_offers_per_search == 0 {
            return Err(ConfigError::NoOffersRequested);
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::InvalidJitter(self.jitter_factor));
        }
        seconds("request_delay", self.request_delay)?;
        seconds("retry_delay", self.retry_delay)?;
        seconds("max_retry_delay", self.max_retry_delay)?;
        if seconds("request_timeout", self.request_timeout)?.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        let order = self.fallback_order();
        if order.is_empty() {
            return Err(ConfigError::EmptyFallbackOrder);
        }
        let mut seen = HashSet::new();
        for kind in &order {
            if !seen.insert(*kind) {
                return Err(ConfigError::DuplicateBackend(*kind));
            }
        }
        Ok(())
    }

    pub fn fallback_order(&self) -> Vec<BackendKind> {
        match &self.fallback_order {
            Some(order) => order.clone(),
            None => BackendKind::fallback_order(self.mode),
        }
    }

    pub fn request_spacing(&self) -> Result<Duration, ConfigError> {
        seconds("request_delay", self.request_delay)
    }

    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        seconds("request_timeout", self.request_timeout)
    }

    pub fn backoff(&self) -> Result<Backoff, ConfigError> {
        Ok(Backoff::new(
            seconds("retry_delay", self.retry_delay)?,
            seconds("max_retry_delay", self.max_retry_delay)?,
        )
        .with_jitter(self.jitter_factor))
    }

    pub fn search_options(&self, query_date: NaiveDate) -> SearchOptions {
        SearchOptions {
            query_date,
            cabin: self.seat_class,
            trip_type: self.trip_type,
            adults: self.adults,
            children: self.children,
            currency: self.currency.clone(),
            max_offers: self.max_offers_per_search,
        }
    }

    /// Construct the backends named in the fallback order.
    ///
    /// The relay is only built when both its endpoint and credentials are
    /// present; otherwise it is left out and reports as unavailable.
    pub fn build_backends(&self, credentials: Option<RelayCredentials>) -> Result<BackendSet> {
        let mut set = BackendSet::new();
        for kind in self.fallback_order() {
            match kind {
                BackendKind::DirectHttp => {
                    let backend =
                        DirectHttpBackend::new(self.language.clone(), self.currency.clone())?;
                    set = set.with(Backend::DirectHttp(backend));
                }
                BackendKind::HeadlessBrowser => {
                    set = set.with(Backend::HeadlessBrowser(HeadlessBrowserBackend::new(
                        self.webdriver_url.clone(),
                        self.language.clone(),
                        self.currency.clone(),
                    )));
                }
                BackendKind::ProxyRelayed => match (&self.relay_endpoint, &credentials) {
                    (Some(endpoint), Some(creds)) => {
                        let backend = ProxyRelayBackend::new(
                            endpoint.clone(),
                            creds.clone(),
                            self.language.clone(),
                            self.currency.clone(),
                        )?;
                        set = set.with(Backend::ProxyRelayed(backend));
                    }
                    _ => {
                        tracing::warn!(
                            "Relay backend skipped: needs relay_endpoint and {}",
                            crate::backends::proxy_relay::RELAY_TOKEN_ENV
                        );
                    }
                },
            }
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_object() {
        let config = FetchConfig::from_json("{}").unwrap();
        assert_eq!(config, FetchConfig::default());
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.request_spacing().unwrap(), Duration::from_millis(500));
        assert_eq!(
            config.fallback_order(),
            vec![
                BackendKind::DirectHttp,
                BackendKind::HeadlessBrowser,
                BackendKind::ProxyRelayed
            ]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_routes_in_both_shapes() {
        let config = FetchConfig::from_json(
            r#"{
                "mode": "headless_browser",
                "seat_class": "business",
                "routes": [["lhr", "CDG"], {"origin": "JFK", "destination": "LAX"}],
                "dates": {"start_days": 1, "end_days": 3, "step": 1}
            }"#,
        )
        .unwrap();
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[0].origin.as_str(), "LHR");
        assert_eq!(config.routes[1].destination.as_str(), "LAX");
        assert_eq!(config.seat_class, CabinClass::Business);
        assert_eq!(config.fallback_order()[0], BackendKind::HeadlessBrowser);
        assert_eq!(
            config
                .dates
                .dates_from(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
                .len(),
            3
        );
    }

    #[test]
    fn rejects_bad_airport_in_routes() {
        assert!(FetchConfig::from_json(r#"{"routes": [["LONDON", "CDG"]]}"#).is_err());
    }

    #[test]
    fn validation_errors() {
        let config = FetchConfig {
            max_concurrent: 0,
            ..FetchConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoConcurrency));

        let config = FetchConfig {
            fallback_order: Some(vec![]),
            ..FetchConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyFallbackOrder));

        let config = FetchConfig {
            fallback_order: Some(vec![BackendKind::DirectHttp, BackendKind::DirectHttp]),
            ..FetchConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateBackend(BackendKind::DirectHttp))
        );

        let config = FetchConfig {
            adults: 0,
            ..FetchConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoAdult));

        let config = FetchConfig {
            retry_delay: -1.0,
            ..FetchConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDuration { field: "retry_delay", .. })
        ));
    }

    #[test]
    fn relay_needs_credentials() {
        let config = FetchConfig {
            fallback_order: Some(vec![BackendKind::ProxyRelayed]),
            relay_endpoint: Some("https://relay.invalid/fetch".into()),
            ..FetchConfig::default()
        };
        let set = config.build_backends(None).unwrap();
        assert!(!set.contains(BackendKind::ProxyRelayed));

        let set = config
            .build_backends(Some(RelayCredentials::new("token".into())))
            .unwrap();
        assert!(set.contains(BackendKind::ProxyRelayed));
    }
}

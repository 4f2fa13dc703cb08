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

//! Headless browser backend driven over WebDriver.
//!
//! Loads the search page in a real browser, clicks through the consent
//! interstitial when redirected to it, and returns the rendered inner HTML
//! of the results region. Each fetch gets its own browser session so
//! concurrent fetches never share a window.

use std::time::{Duration, Instant};

use thirtyfour::prelude::*;

use super::{BackendError, BackendKind, RawResponse};
use crate::consent_cookie::CONSENT_ORIGIN;
use crate::flights_query_builder::EncodedQuery;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const MAX_CONSENT_WAIT: Duration = Duration::from_secs(5);

const ACCEPT_BUTTON_CSS: &str = "button[aria-label*='Accept']";
const ACCEPT_BUTTON_XPATH: &str = "//button[.//span[contains(., 'Accept all')]]";
const RESULTS_REGION_CSS: &str = r#"[role="main"]"#;

pub struct HeadlessBrowserBackend {
    webdriver_url: String,
    language: String,
    currency: String,
}

impl HeadlessBrowserBackend {
    pub fn new(webdriver_url: String, language: String, currency: String) -> Self {
        Self {
            webdriver_url,
            language,
            currency,
        }
    }

    pub async fn fetch(
        &self,
        query: &EncodedQuery,
        timeout: Duration,
    ) -> Result<RawResponse, BackendError> {
        let url = query.search_url(&self.language, &self.currency);
        let start = Instant::now();

        let body = self.render(&url, timeout).await?;
        let elapsed = start.elapsed();
        tracing::debug!(
            "[headless_browser] rendered in {:?}, {} KB",
            elapsed,
            body.len() / 1024
        );

        Ok(RawResponse {
            body,
            backend: BackendKind::HeadlessBrowser,
            http_status: 200,
            elapsed_ms: elapsed.as_millis() as u64,
        })
    }

    /// Render within `timeout`, session setup included. The session is
    /// always quit, also when the page load runs out of time.
    async fn render(&self, url: &str, timeout: Duration) -> Result<String, BackendError> {
        let start = Instant::now();
        let mut caps = DesiredCapabilities::firefox();
        caps.set_headless()
            .map_err(|e| BackendError::ConnectionRefused(e.to_string()))?;
        let driver = tokio::time::timeout(timeout, WebDriver::new(self.webdriver_url.as_str(), caps))
            .await
            .map_err(|_| BackendError::Timeout(timeout))?
            .map_err(|e| BackendError::ConnectionRefused(format!("WebDriver: {}", e)))?;

        let remaining = timeout.saturating_sub(start.elapsed());
        let waits = PageWaits::within(remaining);
        let result = tokio::time::timeout(remaining, load_results(&driver, url, waits))
            .await
            .unwrap_or(Err(BackendError::Timeout(timeout)));
        if let Err(e) = driver.quit().await {
            tracing::debug!("[headless_browser] session teardown failed: {}", e);
        }
        result
    }
}

/// Element waits carved out of the time left for a page load.
///
/// The waits never use the whole budget, so a page stuck on the consent
/// origin is still recognized as a wall before the fetch times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageWaits {
    consent: Duration,
    results: Duration,
}

impl PageWaits {
    fn within(budget: Duration) -> Self {
        Self {
            consent: (budget / 6).min(MAX_CONSENT_WAIT),
            results: budget * 2 / 3,
        }
    }
}

async fn load_results(
    driver: &WebDriver,
    url: &str,
    waits: PageWaits,
) -> Result<String, BackendError> {
    tracing::trace!("[headless_browser] goto {}", url);
    driver.goto(url).await.map_err(navigation_error)?;

    if on_consent_page(driver).await? {
        accept_consent(driver, waits.consent).await?;
    }

    let region = driver
        .query(By::Css(RESULTS_REGION_CSS))
        .wait(waits.results, POLL_INTERVAL)
        .first()
        .await;
    let region = match region {
        Ok(el) => el,
        Err(e) => {
            if on_consent_page(driver).await? {
                return Err(BackendError::ConsentWall(
                    "consent page still shown after accepting".into(),
                ));
            }
            return Err(BackendError::ConnectionRefused(format!(
                "results region never rendered: {}",
                e
            )));
        }
    };
    region.inner_html().await.map_err(navigation_error)
}

async fn on_consent_page(driver: &WebDriver) -> Result<bool, BackendError> {
    let current = driver.current_url().await.map_err(navigation_error)?;
    Ok(current.as_str().starts_with(CONSENT_ORIGIN))
}

async fn accept_consent(driver: &WebDriver, wait: Duration) -> Result<(), BackendError> {
    tracing::debug!("[headless_browser] consent interstitial, accepting");
    let button = driver
        .query(By::Css(ACCEPT_BUTTON_CSS))
        .or(By::XPath(ACCEPT_BUTTON_XPATH))
        .wait(wait, POLL_INTERVAL)
        .first()
        .await
        .map_err(|_| BackendError::ConsentWall("no accept control on consent page".into()))?;
    button
        .click()
        .await
        .map_err(|e| BackendError::ConsentWall(format!("accept click failed: {}", e)))
}

fn navigation_error(e: WebDriverError) -> BackendError {
    BackendError::ConnectionRefused(e.to_string())
}

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

//! Live integration tests against Google Flights.
//!
//! These make real requests and verify that real-world responses still decode.
//! The headless test needs a WebDriver (geckodriver) on localhost:4444.
//!
//! Run with: cargo test --test t_flights_integration_live -- --include-ignored

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Months, NaiveDate};
use tokio_util::sync::CancellationToken;

use farecast_price_collector::{
    AirportCode, Backend, BackendKind, BackendSet, CabinClass, DecodeResult, FetchConfig,
    FetchOutcome, Fetcher, Orchestrator, ResponseDecoder, Route, SearchCriteria,
    backends::{DirectHttpBackend, HeadlessBrowserBackend},
    encode,
};

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn criteria(from: &str, to: &str, months_ahead: u32, cabin: CabinClass) -> Result<SearchCriteria> {
    Ok(SearchCriteria::builder(
        AirportCode::parse(from)?,
        AirportCode::parse(to)?,
        today() + Months::new(months_ahead),
    )
    .cabin(cabin)
    .build(today())?)
}

async fn fetch_and_decode(set: &BackendSet, kind: BackendKind, c: &SearchCriteria) -> Result<()> {
    let query = encode(c);
    println!("\n🛫 {} → {} on {} via {}", c.origin(), c.destination(), c.departure_date(), kind);
    println!("🔗 URL for manual check:\n{}", query.search_url("en", "USD"));

    let raw = set
        .fetch(kind, &query, Duration::from_secs(60))
        .await
        .with_context(|| format!("{} fetch failed", kind))?;
    println!("HTTP {} in {} ms, {} KB", raw.http_status, raw.elapsed_ms, raw.body.len() / 1024);

    match ResponseDecoder::new(c.cabin(), "USD").decode(&raw) {
        DecodeResult::Offers(decoded) => {
            println!("Parsed {} offers ({} skipped)", decoded.offers.len(), decoded.skipped);
            if let Some(best) = decoded.offers.first() {
                println!("Best: {} {} {}", best.airline(), best.price(), best.currency());
            }
            assert!(!decoded.offers.is_empty(), "a busy route should have offers");
            Ok(())
        }
        other => anyhow::bail!("Unexpected decode result: {:?}", other),
    }
}

#[tokio::test]
#[ignore]
async fn test_real_query_direct_http() -> Result<()> {
    let set = BackendSet::new().with(Backend::DirectHttp(DirectHttpBackend::new(
        "en".into(),
        "USD".into(),
    )?));
    fetch_and_decode(
        &set,
        BackendKind::DirectHttp,
        &criteria("SFO", "JFK", 2, CabinClass::Economy)?,
    )
    .await
}

#[tokio::test]
#[ignore]
async fn test_real_query_headless_browser() -> Result<()> {
    let set = BackendSet::new().with(Backend::HeadlessBrowser(HeadlessBrowserBackend::new(
        "http://localhost:4444".into(),
        "en".into(),
        "USD".into(),
    )));
    fetch_and_decode(
        &set,
        BackendKind::HeadlessBrowser,
        &criteria("LHR", "JFK", 3, CabinClass::Business)?,
    )
    .await
}

#[tokio::test]
#[ignore]
async fn test_real_run_small_grid() -> Result<()> {
    let config = FetchConfig {
        request_delay: 2.0,
        max_concurrent: 2,
        fallback_order: Some(vec![BackendKind::DirectHttp]),
        ..FetchConfig::default()
    };
    let backends = config.build_backends(None)?;
    let orchestrator = Orchestrator::new(backends, &config)?;

    let routes = [Route::new(AirportCode::parse("LAX")?, AirportCode::parse("ORD")?)];
    let dates = [today() + Months::new(1), today() + Months::new(2)];
    let report = orchestrator
        .fetch_multiple_routes(
            &routes,
            &dates,
            &config.search_options(today()),
            CancellationToken::new(),
        )
        .await;

    println!("{}", report.summary());
    for row in report.rows.iter().take(5) {
        println!("{}", serde_json::to_string(row)?);
    }
    assert_eq!(report.outcomes.len(), 2);
    assert!(
        report
            .outcomes
            .iter()
            .any(|p| matches!(p.outcome, FetchOutcome::Success { .. }))
    );
    Ok(())
}

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

//! CLI: collect flight offers for a grid of routes and departure dates and
//! write them as JSON lines on stdout.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use farecast_price_collector::{
    AirportCode, BackendKind, FetchConfig, FetchOutcome, Orchestrator, RelayCredentials, Route,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "farecast-collect")]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// JSON configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Route as ORIGIN-DEST (e.g., LHR-CDG); repeatable, replaces configured routes
    #[arg(short, long = "route")]
    routes: Vec<String>,

    /// Single departure date (YYYY-MM-DD), replaces the configured date range
    #[arg(short, long)]
    date: Option<String>,

    /// Primary backend: direct_http, headless_browser, proxy_relayed
    #[arg(short, long)]
    mode: Option<String>,

    /// Verbose output
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_writer(std::io::stderr),
        )
        .init();
}

fn parse_route(s: &str) -> Result<Route> {
    let (origin, destination) = s
        .split_once(['-', ':'])
        .with_context(|| format!("Invalid route: {}. Use ORIGIN-DEST, e.g. LHR-CDG", s))?;
    Ok(Route::new(
        AirportCode::parse(origin)?,
        AirportCode::parse(destination)?,
    ))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .context(format!(
            "Invalid date format: {}. Use YYYY-MM-DD or YYYY/MM/DD",
            s
        ))
}

fn parse_mode(s: &str) -> Result<BackendKind> {
    BackendKind::ALL
        .into_iter()
        .find(|k| k.as_str() == s.to_lowercase().replace('-', "_"))
        .with_context(|| {
            format!(
                "Invalid mode: {}. Use: direct_http, headless_browser, proxy_relayed",
                s
            )
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    setup_logging(args.verbose);
    tracing::debug!("Parsed args: {:?}", args);

    let mut config = match &args.config {
        Some(path) => FetchConfig::load(path).await?,
        None => FetchConfig::default(),
    };
    if !args.routes.is_empty() {
        config.routes = args
            .routes
            .iter()
            .map(|r| parse_route(r))
            .collect::<Result<_>>()?;
    }
    if let Some(mode) = &args.mode {
        config.mode = parse_mode(mode)?;
    }
    config.validate().context("Invalid configuration")?;
    if config.routes.is_empty() {
        anyhow::bail!("No routes to collect: pass --route or set `routes` in the config");
    }

    let today = Local::now().date_naive();
    let dates = match &args.date {
        Some(d) => vec![parse_date(d)?],
        None => config.dates.dates_from(today),
    };

    let backends = config
        .build_backends(RelayCredentials::from_env())
        .context("Failed to create backends")?;
    tracing::info!("Backends available: {:?}", backends.kinds());
    let orchestrator =
        Orchestrator::new(backends, &config).context("Failed to create orchestrator")?;
    tracing::info!("Fallback order: {:?}", orchestrator.fallback_order());

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight searches");
            on_ctrl_c.cancel();
        }
    });

    let options = config.search_options(today);
    let report = orchestrator
        .fetch_multiple_routes(&config.routes, &dates, &options, cancel)
        .await;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for row in &report.rows {
        serde_json::to_writer(&mut out, row).context("Failed to serialize row")?;
        writeln!(out)?;
    }
    out.flush()?;

    for pair in &report.outcomes {
        match &pair.outcome {
            FetchOutcome::Blocked { reason } => tracing::warn!(
                "{} → {} on {}: blocked ({})",
                pair.route.origin,
                pair.route.destination,
                pair.departure_date,
                reason
            ),
            FetchOutcome::Failed { error, .. } => tracing::warn!(
                "{} → {} on {}: {}",
                pair.route.origin,
                pair.route.destination,
                pair.departure_date,
                error
            ),
            _ => {}
        }
    }
    tracing::info!("{} rows written; {}", report.rows.len(), report.summary());

    Ok(())
}

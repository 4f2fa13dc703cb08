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

//! # Fetch Orchestrator
//!
//! Runs many (route, date) searches, each one through
//! encode → fetch → decode, under a concurrency cap and per-backend
//! dispatch spacing, with retry/backoff on the same backend and escalation
//! along the fallback order.
//!
//! Each pair walks a small state machine:
//!
//! ```text
//! Pending ──permit──▶ Attempting(backend, attempt) ──▶ Success | Empty | Blocked | Failed
//!                          ▲            │
//!                          └──backoff───┘ RetryScheduled
//! ```
//!
//! Every pair yields exactly one [`PairOutcome`], whatever happens to the
//! others, and the run is cancellable through a [`CancellationToken`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use farecast_query_queues::{Backoff, DispatchGate, QueryQueue};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::backends::{BackendError, BackendKind, Fetcher};
use crate::config::{ConfigError, FetchConfig, Route, SearchOptions};
use crate::flights_criteria::{CriteriaError, SearchCriteria};
use crate::flights_dataset::DatasetRow;
use crate::flights_query_builder::{EncodedQuery, encode};
use crate::flights_results_parser::{DecodeResult, Offer, ResponseDecoder};

const PAYLOAD_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("all backends exhausted (last error: {})", display_last(.last_error))]
    Exhausted { last_error: Option<BackendError> },
    #[error("cancelled before completion")]
    Cancelled,
    #[error("invalid search criteria: {0}")]
    InvalidCriteria(#[from] CriteriaError),
    #[error("worker task aborted")]
    WorkerAborted,
}

fn display_last(last: &Option<BackendError>) -> String {
    match last {
        Some(e) => e.to_string(),
        None => "none".to_string(),
    }
}

/// Terminal result for one (route, date) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success { offers: Vec<Offer> },
    Empty,
    Blocked { reason: String },
    Failed { error: FailureReason, attempts_used: u32 },
}

impl FetchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Success { .. } => "success",
            FetchOutcome::Empty => "empty",
            FetchOutcome::Blocked { .. } => "blocked",
            FetchOutcome::Failed { .. } => "failed",
        }
    }

    fn cancelled(attempts_used: u32) -> Self {
        FetchOutcome::Failed {
            error: FailureReason::Cancelled,
            attempts_used,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairOutcome {
    pub route: Route,
    pub departure_date: NaiveDate,
    pub outcome: FetchOutcome,
    /// Backend of the last dispatched attempt.
    pub backend: Option<BackendKind>,
    pub attempts: u32,
    /// Result cards present in the response but unreadable.
    pub skipped_records: usize,
}

/// Everything a run produced: flat rows plus one outcome per pair, both in
/// input order (routes outer, dates inner).
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub rows: Vec<DatasetRow>,
    pub outcomes: Vec<PairOutcome>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeSummary {
    pub success: usize,
    pub empty: usize,
    pub blocked: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl fmt::Display for OutcomeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} success, {} empty, {} blocked, {} failed ({} cancelled)",
            self.success, self.empty, self.blocked, self.failed, self.cancelled
        )
    }
}

impl FetchReport {
    pub fn summary(&self) -> OutcomeSummary {
        let mut summary = OutcomeSummary::default();
        for pair in &self.outcomes {
            match &pair.outcome {
                FetchOutcome::Success { .. } => summary.success += 1,
                FetchOutcome::Empty => summary.empty += 1,
                FetchOutcome::Blocked { .. } => summary.blocked += 1,
                FetchOutcome::Failed { error, .. } => {
                    summary.failed += 1;
                    if *error == FailureReason::Cancelled {
                        summary.cancelled += 1;
                    }
                }
            }
        }
        summary
    }
}

enum PairState {
    Attempting {
        backend: usize,
        attempt: u32,
    },
    RetryScheduled {
        backend: usize,
        attempt: u32,
        delay: Duration,
    },
    Done(FetchOutcome),
}

struct PairRun {
    outcome: FetchOutcome,
    backend: Option<BackendKind>,
    attempts: u32,
    skipped_records: usize,
    walls: Vec<String>,
    last_error: Option<BackendError>,
}

impl PairRun {
    fn unstarted(outcome: FetchOutcome) -> Self {
        Self {
            outcome,
            backend: None,
            attempts: 0,
            skipped_records: 0,
            walls: Vec::new(),
            last_error: None,
        }
    }
}

/// What stays fixed across the attempts of one pair.
struct PairJob {
    tag: String,
    query: EncodedQuery,
    decoder: ResponseDecoder,
    max_offers: usize,
}

struct Engine<F> {
    fetcher: F,
    max_concurrent: u64,
    gate: DispatchGate<BackendKind>,
    backoff: Backoff,
    fallback_order: Vec<BackendKind>,
    max_attempts: u32,
    request_timeout: Duration,
}

pub struct Orchestrator<F: Fetcher> {
    engine: Arc<Engine<F>>,
}

impl<F: Fetcher> Orchestrator<F> {
    /// Validate `config` and prepare a reusable orchestrator.
    pub fn new(fetcher: F, config: &FetchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let engine = Engine {
            fetcher,
            max_concurrent: config.max_concurrent as u64,
            gate: DispatchGate::new(config.request_spacing()?),
            backoff: config.backoff()?,
            fallback_order: config.fallback_order(),
            max_attempts: config.max_retries,
            request_timeout: config.request_timeout()?,
        };
        Ok(Self {
            engine: Arc::new(engine),
        })
    }

    pub fn fallback_order(&self) -> &[BackendKind] {
        &self.engine.fallback_order
    }

    /// Fetch offers for every route × date.
    ///
    /// Never fails as a whole: per-pair problems land in the pair's outcome.
    pub async fn fetch_multiple_routes(
        &self,
        routes: &[Route],
        dates: &[NaiveDate],
        options: &SearchOptions,
        cancel: CancellationToken,
    ) -> FetchReport {
        let pairs: Vec<(Route, NaiveDate)> = routes
            .iter()
            .flat_map(|route| dates.iter().map(move |date| (route.clone(), *date)))
            .collect();
        let total = pairs.len();
        let queue = QueryQueue::with_concurrency_limit(self.engine.max_concurrent);
        tracing::info!(
            "Fetching {} pairs ({} routes × {} dates), {} at a time, {:?} between dispatches, order {:?}",
            total,
            routes.len(),
            dates.len(),
            queue.capacity(),
            self.engine.gate.spacing(),
            self.engine.fallback_order
        );

        let mut runs: Vec<Option<PairRun>> = (0..total).map(|_| None).collect();
        let mut tasks = JoinSet::new();

        for (index, (route, date)) in pairs.iter().enumerate() {
            let criteria = SearchCriteria::builder(
                route.origin.clone(),
                route.destination.clone(),
                *date,
            )
            .adults(options.adults)
            .children(options.children)
            .cabin(options.cabin)
            .trip_type(options.trip_type)
            .max_offers(options.max_offers)
            .build(options.query_date);
            let criteria = match criteria {
                Ok(criteria) => criteria,
                Err(e) => {
                    tracing::error!("{} → {} on {}: {}", route.origin, route.destination, date, e);
                    runs[index] = Some(PairRun::unstarted(FetchOutcome::Failed {
                        error: FailureReason::InvalidCriteria(e),
                        attempts_used: 0,
                    }));
                    continue;
                }
            };

            let engine = Arc::clone(&self.engine);
            let queue = queue.clone();
            let cancel = cancel.clone();
            let currency = options.currency.clone();
            tasks.spawn(async move {
                let run = engine.run_pair(&queue, &criteria, &currency, &cancel).await;
                (index, run)
            });
        }

        let mut done = total - tasks.len();
        let mut queue_closed = false;
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled(), if !queue_closed => {
                    // Pairs still waiting for a slot give up.
                    queue.close();
                    queue_closed = true;
                    continue;
                }
                joined = tasks.join_next() => match joined {
                    Some(joined) => joined,
                    None => break,
                },
            };
            match joined {
                Ok((index, run)) => {
                    done += 1;
                    let (route, date) = &pairs[index];
                    tracing::info!(
                        "[{}/{}] {} → {} on {}: {} after {} attempt(s)",
                        done,
                        total,
                        route.origin,
                        route.destination,
                        date,
                        run.outcome.label(),
                        run.attempts
                    );
                    runs[index] = Some(run);
                }
                Err(e) => tracing::error!("Pair worker aborted: {}", e),
            }
        }

        let mut report = FetchReport::default();
        for ((route, date), run) in pairs.into_iter().zip(runs) {
            let run = run.unwrap_or_else(|| {
                PairRun::unstarted(FetchOutcome::Failed {
                    error: FailureReason::WorkerAborted,
                    attempts_used: 0,
                })
            });
            if let (FetchOutcome::Success { offers }, Some(backend)) = (&run.outcome, run.backend) {
                report.rows.extend(offers.iter().map(|offer| {
                    DatasetRow::new(
                        &route.origin,
                        &route.destination,
                        date,
                        options.query_date,
                        offer,
                        backend,
                    )
                }));
            }
            report.outcomes.push(PairOutcome {
                route,
                departure_date: date,
                outcome: run.outcome,
                backend: run.backend,
                attempts: run.attempts,
                skipped_records: run.skipped_records,
            });
        }

        tracing::info!("Run complete: {}, {} rows", report.summary(), report.rows.len());
        report
    }
}

impl<F: Fetcher> Engine<F> {
    async fn run_pair(
        &self,
        queue: &QueryQueue,
        criteria: &SearchCriteria,
        currency: &str,
        cancel: &CancellationToken,
    ) -> PairRun {
        let Ok(_permit) = queue.acquire().await else {
            return PairRun::unstarted(FetchOutcome::cancelled(0));
        };

        let job = PairJob {
            tag: format!(
                "{}→{} {}",
                criteria.origin(),
                criteria.destination(),
                criteria.departure_date()
            ),
            query: encode(criteria),
            decoder: ResponseDecoder::new(criteria.cabin(), currency),
            max_offers: criteria.max_offers() as usize,
        };

        let mut run = PairRun::unstarted(FetchOutcome::Empty);
        let mut state = PairState::Attempting {
            backend: 0,
            attempt: 1,
        };

        loop {
            state = match state {
                PairState::Done(outcome) => {
                    run.outcome = outcome;
                    return run;
                }
                PairState::RetryScheduled {
                    backend,
                    attempt,
                    delay,
                } => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => PairState::Done(FetchOutcome::cancelled(run.attempts)),
                        _ = tokio::time::sleep(delay) => PairState::Attempting { backend, attempt: attempt + 1 },
                    }
                }
                PairState::Attempting { backend, attempt } => {
                    match self.fallback_order.get(backend).copied() {
                        None => PairState::Done(self.exhausted(&job, &mut run)),
                        Some(_) if cancel.is_cancelled() => {
                            PairState::Done(FetchOutcome::cancelled(run.attempts))
                        }
                        Some(kind) => {
                            let cleared = tokio::select! {
                                biased;
                                _ = cancel.cancelled() => false,
                                _ = self.gate.wait_turn(&kind) => true,
                            };
                            if cleared {
                                run.attempts += 1;
                                run.backend = Some(kind);
                                self.attempt(&job, kind, backend, attempt, &mut run).await
                            } else {
                                PairState::Done(FetchOutcome::cancelled(run.attempts))
                            }
                        }
                    }
                }
            };
        }
    }

    /// Dispatch once on `kind` and decide what comes next.
    async fn attempt(
        &self,
        job: &PairJob,
        kind: BackendKind,
        backend: usize,
        attempt: u32,
        run: &mut PairRun,
    ) -> PairState {
        let tag = &job.tag;
        let escalate = PairState::Attempting {
            backend: backend + 1,
            attempt: 1,
        };

        tracing::debug!("[{}] attempt {} on {}", tag, attempt, kind);
        let raw = match self
            .fetcher
            .fetch(kind, &job.query, self.request_timeout)
            .await
        {
            Ok(raw) => raw,
            Err(BackendError::ConsentWall(reason)) => {
                tracing::warn!("[{}] consent wall on {}, escalating", tag, kind);
                run.walls.push(format!("{}: {}", kind, reason));
                return escalate;
            }
            Err(e) if e.is_transient() && attempt < self.max_attempts => {
                let delay = self.backoff.delay(attempt);
                tracing::warn!(
                    "[{}] {} on {} (attempt {}/{}), retrying in {:?}",
                    tag,
                    e,
                    kind,
                    attempt,
                    self.max_attempts,
                    delay
                );
                return PairState::RetryScheduled {
                    backend,
                    attempt,
                    delay,
                };
            }
            Err(e) => {
                tracing::warn!("[{}] {} on {}, escalating", tag, e, kind);
                run.last_error = Some(e);
                return escalate;
            }
        };

        match job.decoder.decode(&raw) {
            DecodeResult::Offers(mut decoded) => {
                run.skipped_records = decoded.skipped;
                if decoded.offers.is_empty() {
                    PairState::Done(FetchOutcome::Empty)
                } else {
                    decoded.offers.truncate(job.max_offers);
                    PairState::Done(FetchOutcome::Success {
                        offers: decoded.offers,
                    })
                }
            }
            DecodeResult::Blocked(reason) => {
                tracing::warn!("[{}] {} served a consent page, escalating", tag, kind);
                run.walls.push(format!("{}: {}", kind, reason));
                escalate
            }
            DecodeResult::Malformed(reason) => {
                let preview: String = raw.body.chars().take(PAYLOAD_PREVIEW_CHARS).collect();
                tracing::error!(
                    "[{}] unreadable payload from {} (HTTP {}, {} bytes, {} ms): {}; starts with {:?}",
                    tag,
                    raw.backend,
                    raw.http_status,
                    raw.body.len(),
                    raw.elapsed_ms,
                    reason,
                    preview
                );
                PairState::Done(FetchOutcome::Empty)
            }
        }
    }

    /// Outcome once the fallback order has no backend left.
    fn exhausted(&self, job: &PairJob, run: &mut PairRun) -> FetchOutcome {
        if run.walls.len() == self.fallback_order.len() {
            tracing::error!("[{}] blocked on every backend", job.tag);
            FetchOutcome::Blocked {
                reason: run.walls.join("; "),
            }
        } else {
            tracing::error!(
                "[{}] all backends exhausted after {} attempt(s)",
                job.tag,
                run.attempts
            );
            FetchOutcome::Failed {
                error: FailureReason::Exhausted {
                    last_error: run.last_error.take(),
                },
                attempts_used: run.attempts,
            }
        }
    }
}

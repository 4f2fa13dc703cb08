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

// Flight offer acquisition: encode searches, fetch them through one of
// several backends, decode offers into dataset rows.

pub mod backends;
pub mod config;
pub mod consent_cookie;
mod flights_criteria;
mod flights_dataset;
mod flights_orchestrator;
mod flights_query_builder;
mod flights_results_parser;

pub use backends::{
    Backend, BackendError, BackendKind, BackendSet, Fetcher, RawResponse, RelayCredentials,
};
pub use config::{ConfigError, DateRange, FetchConfig, Route, SearchOptions};
pub use consent_cookie::generate_cookie_header;
pub use flights_criteria::{
    AirportCode, CabinClass, CriteriaError, SearchCriteria, SearchCriteriaBuilder, TripType,
};
pub use flights_dataset::{DatasetRow, generate_date_range};
pub use flights_orchestrator::{
    FailureReason, FetchOutcome, FetchReport, Orchestrator, OutcomeSummary, PairOutcome,
};
pub use flights_query_builder::{EncodedQuery, SEARCH_ENDPOINT, encode, proto};
pub use flights_results_parser::{DecodeResult, DecodedOffers, Offer, ResponseDecoder};

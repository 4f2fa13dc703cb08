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

//! # Flights Query Builder
//!
//! Side-effect free `tfs` parameter encoding for Google Flights search.
//! A validated [`SearchCriteria`] is packed into the provider's `Info`
//! protobuf message and transport-encoded as base64 text.

pub mod proto {
    include!("proto/google_travel_flights.rs");
}

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use prost::Message;

use crate::flights_criteria::SearchCriteria;
use proto::{Airport, FlightData, Info, Seat, Trip};

pub const SEARCH_ENDPOINT: &str = "https://www.google.com/travel/flights/search";

/// Opaque `tfs` token for one search. Same criteria, same token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedQuery {
    token: String,
}

impl EncodedQuery {
    /// The base64 token as the provider decodes it.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Full search URL, token percent-encoded for the query string.
    pub fn search_url(&self, language: &str, currency: &str) -> String {
        format!(
            "{}?tfs={}&hl={}&curr={}&tfu=EgQIABABIgA",
            SEARCH_ENDPOINT,
            urlencoding::encode(&self.token),
            urlencoding::encode(language),
            urlencoding::encode(currency),
        )
    }
}

impl fmt::Display for EncodedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

/// Encode search criteria into the provider's `tfs` token.
///
/// Criteria are validated when built, so encoding cannot fail.
pub fn encode(criteria: &SearchCriteria) -> EncodedQuery {
    let bytes = build_info(criteria).encode_to_vec();
    EncodedQuery {
        token: STANDARD_NO_PAD.encode(&bytes),
    }
}

/// Mirror the provider's message layout for one outbound leg.
fn build_info(criteria: &SearchCriteria) -> Info {
    let outbound = FlightData {
        date: criteria.departure_date().format("%Y-%m-%d").to_string(),
        max_stops: None,
        airlines: Vec::new(),
        from_flight: Some(Airport {
            airport: criteria.origin().to_string(),
        }),
        to_flight: Some(Airport {
            airport: criteria.destination().to_string(),
        }),
    };

    let passengers: Vec<i32> = criteria
        .passenger_counts()
        .iter()
        .flat_map(|(ptype, count)| std::iter::repeat_n(*ptype as i32, *count as usize))
        .collect();

    Info {
        data: vec![outbound],
        passengers,
        seat: Some(Seat::from(criteria.cabin()) as i32),
        trip: Some(Trip::from(criteria.trip_type()) as i32),
    }
}

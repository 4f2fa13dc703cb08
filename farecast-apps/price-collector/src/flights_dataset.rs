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

//! Flat dataset rows handed to persistence, and the departure-date grid.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::backends::BackendKind;
use crate::flights_criteria::AirportCode;
use crate::flights_results_parser::Offer;

pub const SOURCE_PREFIX: &str = "google_flights";

/// One offer observed for one route and departure date on one query date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetRow {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub query_date: NaiveDate,
    pub days_before_departure: i64,
    pub airline: String,
    pub price: Decimal,
    pub currency: String,
    pub stops: u32,
    /// Minutes; absent when the provider did not show a duration.
    pub flight_duration: Option<u32>,
    pub cabin: String,
    pub offer_rank: u32,
    pub departure_time: Option<String>,
    pub arrival_time: Option<String>,
    pub source: String,
}

impl DatasetRow {
    pub fn new(
        origin: &AirportCode,
        destination: &AirportCode,
        departure_date: NaiveDate,
        query_date: NaiveDate,
        offer: &Offer,
        backend: BackendKind,
    ) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_date,
            query_date,
            days_before_departure: (departure_date - query_date).num_days(),
            airline: offer.airline().to_string(),
            price: offer.price(),
            currency: offer.currency().to_string(),
            stops: offer.stops(),
            flight_duration: offer.duration_minutes(),
            cabin: offer.cabin().as_str().to_string(),
            offer_rank: offer.rank(),
            departure_time: offer.departure_time().map(str::to_string),
            arrival_time: offer.arrival_time().map(str::to_string),
            source: format!("{}/{}", SOURCE_PREFIX, backend),
        }
    }
}

/// Departure dates `start_days..=end_days` after `today`, every `step` days.
pub fn generate_date_range(
    today: NaiveDate,
    start_days: u32,
    end_days: u32,
    step: u32,
) -> Vec<NaiveDate> {
    let step = step.max(1) as usize;
    (start_days..=end_days)
        .step_by(step)
        .filter_map(|offset| today.checked_add_days(Days::new(offset as u64)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekly_grid() {
        let dates = generate_date_range(date(2026, 10, 19), 7, 60, 7);
        assert_eq!(dates.len(), 8);
        assert_eq!(dates[0], date(2026, 10, 26));
        assert_eq!(dates[7], date(2026, 12, 14));
    }

    #[test]
    fn inclusive_end_and_zero_step() {
        let dates = generate_date_range(date(2026, 1, 1), 1, 3, 0);
        assert_eq!(dates, vec![date(2026, 1, 2), date(2026, 1, 3), date(2026, 1, 4)]);
    }

    #[test]
    fn empty_when_start_after_end() {
        assert!(generate_date_range(date(2026, 1, 1), 10, 5, 1).is_empty());
    }
}

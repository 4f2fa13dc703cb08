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

//! # Search Criteria
//!
//! Value types describing one flight search. A `SearchCriteria` can only be
//! obtained through its builder, which enforces the invariants the encoder
//! relies on.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flights_query_builder::proto::{Passenger, Seat, Trip};

/// Largest party the provider accepts in one search.
pub const MAX_PASSENGERS: u64 = 9;

/// Rejected search criteria. Never retried: the same input fails the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CriteriaError {
    #[error("invalid airport code {0:?}: expected three letters")]
    InvalidAirport(String),
    #[error("origin and destination are both {0}")]
    SameOriginDestination(AirportCode),
    #[error("at least one adult is required")]
    NoAdult,
    #[error("cannot have more infants on lap ({infants}) than adults ({adults})")]
    TooManyLapInfants { infants: u32, adults: u32 },
    #[error("{total} passengers requested, at most {} per search", MAX_PASSENGERS)]
    TooManyPassengers { total: u64 },
    #[error("departure date {departure} is before query date {query}")]
    DepartureInPast {
        departure: NaiveDate,
        query: NaiveDate,
    },
    #[error("max_offers must be at least 1")]
    NoOffersRequested,
    #[error("unknown cabin class {0:?}: use economy, premium_economy, business, first")]
    UnknownCabin(String),
    #[error("unknown trip type {0:?}: use oneway, roundtrip")]
    UnknownTrip(String),
}

/// IATA airport or city code, normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AirportCode(String);

impl AirportCode {
    pub fn parse(code: &str) -> Result<Self, CriteriaError> {
        let code = code.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(CriteriaError::InvalidAirport(code.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AirportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AirportCode {
    type Error = CriteriaError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<AirportCode> for String {
    fn from(code: AirportCode) -> String {
        code.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
#[serde(rename_all = "snake_case")]
pub enum CabinClass {
    #[default]
    Economy = Seat::Economy as i32,
    #[serde(alias = "premium")]
    PremiumEconomy = Seat::PremiumEconomy as i32,
    Business = Seat::Business as i32,
    First = Seat::First as i32,
}

impl From<CabinClass> for Seat {
    fn from(c: CabinClass) -> Seat {
        match c {
            CabinClass::Economy => Seat::Economy,
            CabinClass::PremiumEconomy => Seat::PremiumEconomy,
            CabinClass::Business => Seat::Business,
            CabinClass::First => Seat::First,
        }
    }
}

impl CabinClass {
    /// Label used in the dataset.
    pub fn as_str(&self) -> &'static str {
        match self {
            CabinClass::Economy => "ECONOMY",
            CabinClass::PremiumEconomy => "PREMIUM_ECONOMY",
            CabinClass::Business => "BUSINESS",
            CabinClass::First => "FIRST",
        }
    }
}

impl FromStr for CabinClass {
    type Err = CriteriaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "economy" | "e" => Ok(CabinClass::Economy),
            "premium_economy" | "premium-economy" | "premium" | "pe" => {
                Ok(CabinClass::PremiumEconomy)
            }
            "business" | "b" => Ok(CabinClass::Business),
            "first" | "f" => Ok(CabinClass::First),
            _ => Err(CriteriaError::UnknownCabin(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
#[serde(rename_all = "snake_case")]
pub enum TripType {
    #[default]
    #[serde(alias = "one-way")]
    OneWay = Trip::OneWay as i32,
    #[serde(alias = "round-trip")]
    RoundTrip = Trip::RoundTrip as i32,
}

impl From<TripType> for Trip {
    fn from(t: TripType) -> Trip {
        match t {
            TripType::OneWay => Trip::OneWay,
            TripType::RoundTrip => Trip::RoundTrip,
        }
    }
}

impl FromStr for TripType {
    type Err = CriteriaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "oneway" | "one-way" | "one" | "ow" => Ok(TripType::OneWay),
            "roundtrip" | "round-trip" | "round" | "rt" => Ok(TripType::RoundTrip),
            _ => Err(CriteriaError::UnknownTrip(s.to_string())),
        }
    }
}

/// One search: route, date, passengers, cabin, trip type and offer cap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchCriteria {
    origin: AirportCode,
    destination: AirportCode,
    departure_date: NaiveDate,
    adults: u32,
    children: u32,
    infants_in_seat: u32,
    infants_on_lap: u32,
    cabin: CabinClass,
    trip_type: TripType,
    max_offers: u32,
}

impl SearchCriteria {
    pub fn builder(
        origin: AirportCode,
        destination: AirportCode,
        departure_date: NaiveDate,
    ) -> SearchCriteriaBuilder {
        SearchCriteriaBuilder {
            origin,
            destination,
            departure_date,
            adults: 1,
            children: 0,
            infants_in_seat: 0,
            infants_on_lap: 0,
            cabin: CabinClass::Economy,
            trip_type: TripType::OneWay,
            max_offers: 50,
        }
    }

    pub fn origin(&self) -> &AirportCode {
        &self.origin
    }

    pub fn destination(&self) -> &AirportCode {
        &self.destination
    }

    pub fn departure_date(&self) -> NaiveDate {
        self.departure_date
    }

    pub fn adults(&self) -> u32 {
        self.adults
    }

    pub fn children(&self) -> u32 {
        self.children
    }

    pub fn infants_in_seat(&self) -> u32 {
        self.infants_in_seat
    }

    pub fn infants_on_lap(&self) -> u32 {
        self.infants_on_lap
    }

    pub fn cabin(&self) -> CabinClass {
        self.cabin
    }

    pub fn trip_type(&self) -> TripType {
        self.trip_type
    }

    pub fn max_offers(&self) -> u32 {
        self.max_offers
    }

    /// Passenger counts by category, in the provider's enum order.
    pub(crate) fn passenger_counts(&self) -> [(Passenger, u32); 4] {
        [
            (Passenger::Adult, self.adults),
            (Passenger::Child, self.children),
            (Passenger::InfantInSeat, self.infants_in_seat),
            (Passenger::InfantOnLap, self.infants_on_lap),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct SearchCriteriaBuilder {
    origin: AirportCode,
    destination: AirportCode,
    departure_date: NaiveDate,
    adults: u32,
    children: u32,
    infants_in_seat: u32,
    infants_on_lap: u32,
    cabin: CabinClass,
    trip_type: TripType,
    max_offers: u32,
}

impl SearchCriteriaBuilder {
    pub fn adults(mut self, adults: u32) -> Self {
        self.adults = adults;
        self
    }

    pub fn children(mut self, children: u32) -> Self {
        self.children = children;
        self
    }

    pub fn infants_in_seat(mut self, infants: u32) -> Self {
        self.infants_in_seat = infants;
        self
    }

    pub fn infants_on_lap(mut self, infants: u32) -> Self {
        self.infants_on_lap = infants;
        self
    }

    pub fn cabin(mut self, cabin: CabinClass) -> Self {
        self.cabin = cabin;
        self
    }

    pub fn trip_type(mut self, trip_type: TripType) -> Self {
        self.trip_type = trip_type;
        self
    }

    pub fn max_offers(mut self, max_offers: u32) -> Self {
        self.max_offers = max_offers;
        self
    }

    /// Validate against the date the query is issued on.
    pub fn build(self, query_date: NaiveDate) -> Result<SearchCriteria, CriteriaError> {
        if self.origin == self.destination {
            return Err(CriteriaError::SameOriginDestination(self.origin));
        }
        if self.adults == 0 {
            return Err(CriteriaError::NoAdult);
        }
        if self.infants_on_lap > self.adults {
            return Err(CriteriaError::TooManyLapInfants {
                infants: self.infants_on_lap,
                adults: self.adults,
            });
        }
        let total = [
            self.adults,
            self.children,
            self.infants_in_seat,
            self.infants_on_lap,
        ]
        .iter()
        .map(|&n| u64::from(n))
        .sum::<u64>();
        if total > MAX_PASSENGERS {
            return Err(CriteriaError::TooManyPassengers { total });
        }
        if self.departure_date < query_date {
            return Err(CriteriaError::DepartureInPast {
                departure: self.departure_date,
                query: query_date,
            });
        }
        if self.max_offers == 0 {
            return Err(CriteriaError::NoOffersRequested);
        }

        Ok(SearchCriteria {
            origin: self.origin,
            destination: self.destination,
            departure_date: self.departure_date,
            adults: self.adults,
            children: self.children,
            infants_in_seat: self.infants_in_seat,
            infants_on_lap: self.infants_on_lap,
            cabin: self.cabin,
            trip_type: self.trip_type,
            max_offers: self.max_offers,
        })
    }
}

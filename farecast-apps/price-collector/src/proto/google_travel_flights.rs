// Farecast Price Collector
//
// Copyright (C) 2026  Mamy Ratsimbazafy
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

// Google Flights `tfs` schema, captured from live traffic.
// Field order and tags must stay in sync with tests/fixtures-flights-encoding.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Airport {
    #[prost(string, tag = "2")]
    pub airport: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FlightData {
    #[prost(string, tag = "2")]
    pub date: ::prost::alloc::string::String,
    #[prost(int32, optional, tag = "5")]
    pub max_stops: ::core::option::Option<i32>,
    #[prost(string, repeated, tag = "6")]
    pub airlines: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(message, optional, tag = "13")]
    pub from_flight: ::core::option::Option<Airport>,
    #[prost(message, optional, tag = "14")]
    pub to_flight: ::core::option::Option<Airport>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Info {
    #[prost(message, repeated, tag = "3")]
    pub data: ::prost::alloc::vec::Vec<FlightData>,
    #[prost(enumeration = "Passenger", repeated, tag = "8")]
    pub passengers: ::prost::alloc::vec::Vec<i32>,
    #[prost(enumeration = "Seat", optional, tag = "9")]
    pub seat: ::core::option::Option<i32>,
    #[prost(enumeration = "Trip", optional, tag = "19")]
    pub trip: ::core::option::Option<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Seat {
    UnknownSeat = 0,
    Economy = 1,
    PremiumEconomy = 2,
    Business = 3,
    First = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Trip {
    UnknownTrip = 0,
    RoundTrip = 1,
    OneWay = 2,
    MultiCity = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Passenger {
    UnknownPassenger = 0,
    Adult = 1,
    Child = 2,
    InfantInSeat = 3,
    InfantOnLap = 4,
}

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

//! Structural TFS encoding tests.
//!
//! Tests specific wire format characteristics critical for Google acceptance:
//! - Nested Airport message encoding (vs direct strings)
//! - Packed repeated encoding for passenger types
//!
//! Run with:
//!     cargo test --test t_flights_encoding_structural

use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use chrono::NaiveDate;

use prost::Message;

use farecast_price_collector::{
    AirportCode, CabinClass, SearchCriteria, SearchCriteriaBuilder, TripType, encode, proto,
};

const REFERENCE_TFS: &str = "GhoSCjIwMjUtMDctMTVqBRIDU0ZPcgUSA0pGS0IBAUgBmAEC";

fn sfo_jfk() -> SearchCriteriaBuilder {
    SearchCriteria::builder(
        AirportCode::parse("SFO").unwrap(),
        AirportCode::parse("JFK").unwrap(),
        NaiveDate::from_ymd_opt(2025, 7, 15).unwrap(),
    )
}

fn query_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
}

fn encoded_bytes(builder: SearchCriteriaBuilder) -> Vec<u8> {
    let criteria = builder.build(query_date()).expect("criteria should build");
    STANDARD_NO_PAD
        .decode(encode(&criteria).token())
        .expect("decode base64")
}

/// SFO→JFK, 2025-07-15, economy, one-way, one adult: token captured from a live URL.
#[test]
fn test_structural_reference_vector() {
    let criteria = sfo_jfk()
        .cabin(CabinClass::Economy)
        .trip_type(TripType::OneWay)
        .adults(1)
        .build(query_date())
        .expect("criteria should build");

    assert_eq!(encode(&criteria).token(), REFERENCE_TFS);
}

/// The from_flight and to_flight fields MUST be nested Airport messages
/// (tag 0x6a containing tag 0x12), never direct strings.
#[test]
fn test_structural_nested_airport() {
    let expected = STANDARD_NO_PAD.decode(REFERENCE_TFS).expect("valid base64");
    let ours = encoded_bytes(sfo_jfk());

    for (name, bytes) in [("reference", &expected), ("ours", &ours)] {
        assert_eq!(bytes[14], 0x6a, "{}: pos 14 must have field 13 tag", name);
        assert_eq!(bytes[15], 0x05, "{}: pos 15 length 5 for Airport", name);
        assert_eq!(bytes[16], 0x12, "{}: pos 16 field 2 inside Airport", name);
        assert_eq!(bytes[17], 0x03, "{}: pos 17 length 3 for 'SFO'", name);
        assert_eq!(&bytes[18..21], b"SFO", "{}: 'SFO' at positions 18-20", name);
        assert_eq!(bytes[21], 0x72, "{}: pos 21 must have field 14 tag", name);
        assert_eq!(&bytes[25..28], b"JFK", "{}: 'JFK' at positions 25-27", name);
    }
}

/// Passenger types are packed (tag 8, wire type 2), adults first, then
/// children, infants in seat, infants on lap.
#[test]
fn test_structural_packed_passengers() {
    let bytes = encoded_bytes(sfo_jfk().adults(2).children(1).infants_on_lap(1));

    let pos = bytes
        .windows(2)
        .position(|w| w == [0x42, 0x04])
        .expect("packed passengers field with 4 entries");
    assert_eq!(&bytes[pos + 2..pos + 6], &[1, 1, 2, 4]);
}

/// Seat is tag 9 varint, value from the provider's seat enumeration.
#[test]
fn test_structural_seat_field() {
    for (cabin, value) in [
        (CabinClass::Economy, 1u8),
        (CabinClass::PremiumEconomy, 2),
        (CabinClass::Business, 3),
        (CabinClass::First, 4),
    ] {
        let bytes = encoded_bytes(sfo_jfk().cabin(cabin));
        assert!(
            bytes.windows(2).any(|w| w == [0x48, value]),
            "{:?} should encode as 48 {:02x}",
            cabin,
            value
        );
    }
}

/// Trip type is tag 19 varint: two-byte key 98 01.
#[test]
fn test_structural_trip_field() {
    let one_way = encoded_bytes(sfo_jfk().trip_type(TripType::OneWay));
    assert_eq!(&one_way[one_way.len() - 3..], &[0x98, 0x01, 0x02]);

    let round_trip = encoded_bytes(sfo_jfk().trip_type(TripType::RoundTrip));
    assert_eq!(&round_trip[round_trip.len() - 3..], &[0x98, 0x01, 0x01]);
}

/// No stop limit or airline filter is sent.
#[test]
fn test_structural_no_optional_leg_filters() {
    let bytes = encoded_bytes(sfo_jfk());
    let info = proto::Info::decode(bytes.as_slice()).expect("valid Info message");

    assert_eq!(info.data.len(), 1, "a single outbound leg");
    assert_eq!(info.data[0].max_stops, None);
    assert!(info.data[0].airlines.is_empty());
}

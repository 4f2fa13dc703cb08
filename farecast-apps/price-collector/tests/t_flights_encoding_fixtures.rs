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

//! Fixture-based TFS encoding tests.
//!
//! Loads test vectors from `tfs_vectors.json` and compares the encoder output
//! byte-for-byte with the expected unpadded tokens.
//!
//! Run with:
//!     cargo test --test t_flights_encoding_fixtures

use std::path::Path;

use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use chrono::NaiveDate;
use serde::Deserialize;

use farecast_price_collector::{AirportCode, CabinClass, SearchCriteria, TripType, encode};

#[derive(Deserialize, Debug)]
struct TestCase {
    name: String,
    input: CaseInput,
    expected_tfs: String,
}

#[derive(Deserialize, Debug)]
struct CaseInput {
    from_airport: String,
    to_airport: String,
    depart_date: NaiveDate,
    cabin_class: String,
    trip_type: String,
    #[serde(default)]
    passengers: Passengers,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct Passengers {
    adults: u32,
    children: u32,
    infants_in_seat: u32,
    infants_on_lap: u32,
}

#[derive(Deserialize, Debug)]
struct VectorsFile {
    total_cases: usize,
    cases: Vec<TestCase>,
}

fn criteria_from_input(input: &CaseInput) -> Result<SearchCriteria, String> {
    let cabin: CabinClass = input.cabin_class.parse().map_err(|e| format!("{}", e))?;
    let trip: TripType = input.trip_type.parse().map_err(|e| format!("{}", e))?;
    let query_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

    SearchCriteria::builder(
        AirportCode::parse(&input.from_airport).map_err(|e| e.to_string())?,
        AirportCode::parse(&input.to_airport).map_err(|e| e.to_string())?,
        input.depart_date,
    )
    .adults(input.passengers.adults)
    .children(input.passengers.children)
    .infants_in_seat(input.passengers.infants_in_seat)
    .infants_on_lap(input.passengers.infants_on_lap)
    .cabin(cabin)
    .trip_type(trip)
    .build(query_date)
    .map_err(|e| e.to_string())
}

fn load_vectors() -> VectorsFile {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let vectors_path = manifest_dir.join("tests/fixtures-flights-encoding/tfs_vectors.json");

    let content = std::fs::read_to_string(&vectors_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", vectors_path.display(), e));

    serde_json::from_str(&content).unwrap_or_else(|e| panic!("failed to parse JSON: {}", e))
}

/// Verify the encoder produces byte-exact tokens.
#[test]
fn test_encoding_vectors() {
    let vectors = load_vectors();
    assert_eq!(vectors.total_cases, vectors.cases.len());

    println!("Loaded {} test vectors", vectors.total_cases);
    println!("{}", "=".repeat(70));

    let mut passed = 0usize;
    let mut failed = 0usize;

    for (i, case) in vectors.cases.iter().enumerate() {
        println!("[{:2}/{:2}] {}", i + 1, vectors.cases.len(), case.name);

        let criteria = match criteria_from_input(&case.input) {
            Ok(c) => c,
            Err(e) => {
                println!("  ✗ PARSE ERROR: {}", e);
                failed += 1;
                continue;
            }
        };

        let token = encode(&criteria);
        if token.token() == case.expected_tfs {
            println!("  ✓ BYTE-EXACT MATCH ({} chars)", token.token().len());
            passed += 1;
            continue;
        }

        let ours = STANDARD_NO_PAD.decode(token.token()).expect("our token is base64");
        let expected = STANDARD_NO_PAD
            .decode(&case.expected_tfs)
            .expect("reference token is base64");
        let first_diff = ours
            .iter()
            .zip(expected.iter())
            .position(|(a, b)| a != b)
            .unwrap_or(ours.len().min(expected.len()));
        println!(
            "  ✗ MISMATCH at byte {}: ours {} bytes vs expected {} bytes",
            first_diff,
            ours.len(),
            expected.len()
        );
        failed += 1;
    }

    println!("\n{}", "=".repeat(70));
    println!("RESULTS: {} passed, {} failed", passed, failed);

    if failed > 0 {
        panic!("{} tests failed", failed);
    }
}

/// Search URLs embed the token percent-encoded.
#[test]
fn test_vectors_in_search_urls() {
    for case in load_vectors().cases {
        let criteria = criteria_from_input(&case.input).expect("valid case");
        let url = encode(&criteria).search_url("en", "USD");
        assert!(url.starts_with("https://www.google.com/travel/flights/search?tfs="));
        assert!(
            url.contains(&*urlencoding::encode(&case.expected_tfs)),
            "{}: {}",
            case.name,
            url
        );
        assert!(url.contains("&hl=en&curr=USD"));
    }
}

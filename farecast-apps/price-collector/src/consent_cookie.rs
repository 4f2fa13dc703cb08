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

//! Consent handling for Google services: the SOCS cookie that pre-accepts
//! the consent dialog, and detection of the consent interstitial when the
//! cookie is not honoured.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{Datelike, Local, NaiveDate};
use prost::Message;

/// Origin the provider redirects to when consent is required.
pub const CONSENT_ORIGIN: &str = "https://consent.google.com";

/// Body fragments only present on the consent interstitial.
const CONSENT_MARKERS: &[&str] = &[
    "consent.google.com",
    "base href=\"https://consent.google.com\"",
    "ppConfig",
];

/// Stable blob observed in browser-issued SOCS cookies.
const DEFAULT_BINARY_BLOB: &[u8] = &[0x08, 0x80, 0xc4, 0xf6, 0xca];

#[derive(Clone, PartialEq, ::prost::Message)]
struct SocsCookie {
    #[prost(string, tag = "2")]
    server_tag: String,
    #[prost(bytes = "vec", tag = "3")]
    blob: Vec<u8>,
}

/// SOCS value (without the `SOCS=` prefix) as issued the day before `today`.
fn socs_value(today: NaiveDate) -> String {
    let issued = today.pred_opt().unwrap_or(today);
    let cookie = SocsCookie {
        server_tag: format!(
            "boq_identityfrontenduiserver_{}{:02}{:02}.03_p0en",
            issued.year(),
            issued.month(),
            issued.day()
        ),
        blob: DEFAULT_BINARY_BLOB.to_vec(),
    };
    STANDARD.encode(cookie.encode_to_vec())
}

/// Cookie header for a given day: `CONSENT=PENDING+987; <socs>`.
pub fn cookie_header_for(today: NaiveDate) -> String {
    format!("CONSENT=PENDING+987; {}", socs_value(today))
}

/// Cookie header for the current local day.
pub fn generate_cookie_header() -> String {
    cookie_header_for(Local::now().date_naive())
}

/// Whether a response body is the consent interstitial rather than results.
pub fn looks_like_consent_wall(body: &str) -> bool {
    CONSENT_MARKERS.iter().any(|marker| body.contains(marker))
}

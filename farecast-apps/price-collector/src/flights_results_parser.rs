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

//! # Flights Results Parser
//!
//! Side-effect free decoding of Google Flights result markup into ranked
//! [`Offer`]s. Accepts both the full search document (direct and relayed
//! fetches) and the rendered results region (headless fetches).
//!
//! A card that cannot be read is skipped and counted; the rest of the
//! response is still decoded.

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::backends::RawResponse;
use crate::consent_cookie::looks_like_consent_wall;
use crate::flights_criteria::CabinClass;

/// One priced itinerary, ranked within the response it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Offer {
    airline: String,
    price: Decimal,
    currency: String,
    stops: u32,
    duration_minutes: Option<u32>,
    cabin: CabinClass,
    departure_time: Option<String>,
    arrival_time: Option<String>,
    rank: u32,
}

impl Offer {
    pub fn airline(&self) -> &str {
        &self.airline
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn stops(&self) -> u32 {
        self.stops
    }

    pub fn duration_minutes(&self) -> Option<u32> {
        self.duration_minutes
    }

    pub fn cabin(&self) -> CabinClass {
        self.cabin
    }

    pub fn departure_time(&self) -> Option<&str> {
        self.departure_time.as_deref()
    }

    pub fn arrival_time(&self) -> Option<&str> {
        self.arrival_time.as_deref()
    }

    /// 1-based position by ascending price.
    pub fn rank(&self) -> u32 {
        self.rank
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedOffers {
    pub offers: Vec<Offer>,
    /// Cards present in the response that could not be read.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    Offers(DecodedOffers),
    Blocked(String),
    Malformed(String),
}

/// Decodes responses for one search, supplying what the markup doesn't carry.
#[derive(Debug, Clone)]
pub struct ResponseDecoder {
    cabin: CabinClass,
    currency: String,
}

impl ResponseDecoder {
    pub fn new(cabin: CabinClass, currency: impl Into<String>) -> Self {
        Self {
            cabin,
            currency: currency.into(),
        }
    }

    pub fn decode(&self, raw: &RawResponse) -> DecodeResult {
        let result = self.decode_markup(&raw.body);
        if let DecodeResult::Offers(decoded) = &result {
            if decoded.skipped > 0 {
                tracing::warn!(
                    "[decode] {} skipped {} unreadable card(s), kept {}",
                    raw.backend,
                    decoded.skipped,
                    decoded.offers.len()
                );
            }
        }
        result
    }

    pub fn decode_markup(&self, markup: &str) -> DecodeResult {
        if looks_like_consent_wall(markup) {
            return DecodeResult::Blocked("consent interstitial instead of results".into());
        }

        let selectors = FlightSelectors::new();
        let document = Html::parse_document(markup);

        let has_results_structure = document.select(&selectors.result_list).next().is_some()
            || document.select(&selectors.results_container).next().is_some();
        if !has_results_structure {
            let reason = if markup.contains("Loading results") || markup.contains("jsshadow") {
                "results not rendered (loading placeholder only)"
            } else {
                "no results structure in response"
            };
            return DecodeResult::Malformed(reason.into());
        }

        let mut cards = Vec::new();
        let mut skipped = 0;
        for (position, card) in document.select(&selectors.flight_card).enumerate() {
            match parse_card(card, &selectors, &self.currency) {
                Ok(parsed) => cards.push(parsed),
                Err(reason) => {
                    skipped += 1;
                    tracing::debug!("[decode] card #{} skipped: {}", position + 1, reason);
                }
            }
        }

        DecodeResult::Offers(DecodedOffers {
            offers: rank_offers(cards, self.cabin),
            skipped,
        })
    }
}

#[derive(Debug)]
struct ParsedCard {
    airline: String,
    price: Decimal,
    currency: String,
    stops: u32,
    duration_minutes: Option<u32>,
    departure_time: Option<String>,
    arrival_time: Option<String>,
}

struct FlightSelectors {
    results_container: Selector,
    result_list: Selector,
    flight_card: Selector,
    airline: Selector,
    times: Selector,
    duration: Selector,
    stops: Selector,
    arrives_next_day: Selector,
    price: Selector,
}

impl FlightSelectors {
    fn new() -> Self {
        Self {
            results_container: Selector::parse(r#"div[jsname="YdtKid"]"#).unwrap(),
            result_list: Selector::parse(r#"ul.Rk10dc"#).unwrap(),
            flight_card: Selector::parse(r#"ul.Rk10dc > li"#).unwrap(),
            airline: Selector::parse(r#"div.sSHqwe.tPgKwe.ogfYpf span"#).unwrap(),
            times: Selector::parse(r#"span.mv1WYe div"#).unwrap(),
            duration: Selector::parse(r#"li div.Ak5kof div"#).unwrap(),
            stops: Selector::parse(r#".BbR8Ec .ogfYpf"#).unwrap(),
            arrives_next_day: Selector::parse(r#"span.bOzv6"#).unwrap(),
            price: Selector::parse(r#".YMlIz.FpEdX"#).unwrap(),
        }
    }
}

static DURATION_H_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*h").unwrap());
static DURATION_M_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*m").unwrap());
static PRICE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d.,]*").unwrap());

fn parse_card(
    card: ElementRef,
    selectors: &FlightSelectors,
    default_currency: &str,
) -> Result<ParsedCard, &'static str> {
    let airline = first_text(card, &selectors.airline)
        .filter(|s| !s.is_empty())
        .ok_or("missing airline")?;

    let price_text = first_text(card, &selectors.price).ok_or("missing price")?;
    let price = parse_price(&price_text).ok_or("unreadable price")?;
    let currency = currency_from_price(&price_text)
        .map(str::to_string)
        .unwrap_or_else(|| default_currency.to_string());

    let stops = match first_text(card, &selectors.stops) {
        Some(label) => parse_stops(&label),
        None => {
            tracing::warn!("No stops label on card for {}, counting as nonstop", airline);
            0
        }
    };

    let times: Vec<String> = card
        .select(&selectors.times)
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty())
        .collect();
    let departure_time = times.first().cloned();
    let arrival_plus_days = first_text(card, &selectors.arrives_next_day)
        .and_then(|s| s.trim_start_matches('+').split_whitespace().next()?.parse::<u32>().ok())
        .unwrap_or(0);
    let arrival_time = times.get(1).map(|arr| {
        if arrival_plus_days == 0 {
            arr.clone()
        } else {
            format!("{} +{}d", arr, arrival_plus_days)
        }
    });

    let duration_minutes = first_text(card, &selectors.duration).and_then(|s| parse_duration(&s));

    Ok(ParsedCard {
        airline,
        price,
        currency,
        stops,
        duration_minutes,
        departure_time,
        arrival_time,
    })
}

/// Sort by price, keeping response order among equal prices, then number 1..N.
fn rank_offers(mut cards: Vec<ParsedCard>, cabin: CabinClass) -> Vec<Offer> {
    cards.sort_by(|a, b| a.price.cmp(&b.price));
    cards
        .into_iter()
        .enumerate()
        .map(|(i, c)| Offer {
            airline: c.airline,
            price: c.price,
            currency: c.currency,
            stops: c.stops,
            duration_minutes: c.duration_minutes,
            cabin,
            departure_time: c.departure_time,
            arrival_time: c.arrival_time,
            rank: i as u32 + 1,
        })
        .collect()
}

fn first_text(card: ElementRef, selector: &Selector) -> Option<String> {
    card.select(selector)
        .next()
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_stops(label: &str) -> u32 {
    if label.contains("Nonstop") {
        return 0;
    }
    label
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            tracing::warn!("Could not parse number of stops from: '{}'", label);
            0
        })
}

/// Read an amount such as `$1,234`, `€89`, `1.234,50 €`.
///
/// With both separators present the last one is the decimal point; a lone
/// separator followed by exactly three digits groups thousands.
fn parse_price(text: &str) -> Option<Decimal> {
    let raw = PRICE_RE.find(text)?.as_str().trim_end_matches(['.', ',']);
    let last_dot = raw.rfind('.');
    let last_comma = raw.rfind(',');

    let normalized = match (last_dot, last_comma) {
        (Some(d), Some(c)) => {
            let (decimal, thousands) = if d > c { ('.', ',') } else { (',', '.') };
            raw.replace(thousands, "").replace(decimal, ".")
        }
        (Some(p), None) | (None, Some(p)) => {
            let sep = raw.as_bytes()[p] as char;
            let groups_thousands = raw.len() - p - 1 == 3;
            if groups_thousands {
                raw.replace(sep, "")
            } else if raw.matches(sep).count() == 1 {
                raw.replace(sep, ".")
            } else {
                return None;
            }
        }
        (None, None) => raw.to_string(),
    };

    Decimal::from_str(&normalized).ok()
}

fn currency_from_price(text: &str) -> Option<&'static str> {
    const SYMBOLS: &[(&str, &str)] = &[
        ("€", "EUR"),
        ("£", "GBP"),
        ("¥", "JPY"),
        ("₹", "INR"),
        ("CHF", "CHF"),
        ("CA$", "CAD"),
        ("A$", "AUD"),
    ];
    SYMBOLS
        .iter()
        .find(|(symbol, _)| text.contains(symbol))
        .map(|(_, code)| *code)
}

fn parse_duration(s: &str) -> Option<u32> {
    let s = s.trim();
    let hours = DURATION_H_RE
        .captures(s)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok());
    let minutes = DURATION_M_RE
        .captures(s)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok());

    if hours.is_none() && minutes.is_none() {
        tracing::debug!("Could not parse duration from: '{}'", s);
        return None;
    }
    let total = hours
        .unwrap_or(0)
        .checked_mul(60)
        .and_then(|h| h.checked_add(minutes.unwrap_or(0)));
    if total.is_none() {
        tracing::debug!("Duration out of range: '{}'", s);
    }
    total
}

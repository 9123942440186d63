//! Shared utility functions for the account portal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A date as either of the two conventions this core has to accept:
/// epoch seconds (the provider convention) or an ISO-8601 string (the
/// local-mirror convention).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateValue {
    Epoch(i64),
    Iso(String),
}

impl DateValue {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            DateValue::Epoch(secs) => DateTime::from_timestamp(*secs, 0),
            DateValue::Iso(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// Normalize either date convention to a long-form calendar date,
/// e.g. "November 14, 2023". Returns None for unparseable input.
pub fn format_long_date(date: &DateValue) -> Option<String> {
    date.to_datetime()
        .map(|dt| dt.format("%B %-d, %Y").to_string())
}

/// Format a minor-unit amount as a 2-decimal currency string,
/// e.g. (1000, "usd") -> "$10.00".
pub fn format_amount(amount: i64, currency: &str) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.abs();
    let magnitude = format!("{}.{:02}", abs / 100, abs % 100);
    match currency.to_lowercase().as_str() {
        "usd" => format!("{}${}", sign, magnitude),
        "eur" => format!("{}€{}", sign, magnitude),
        "gbp" => format!("{}£{}", sign, magnitude),
        other => format!("{}{} {}", sign, magnitude, other.to_uppercase()),
    }
}

/// One cookie parsed out of a Set-Cookie header.
#[derive(Debug, Clone)]
pub struct ParsedCookie {
    pub name: String,
    pub value: String,
    /// Epoch seconds from the Expires attribute, when present.
    pub expires: Option<i64>,
}

/// Parse a single Set-Cookie header value into name, value and expiry.
pub fn parse_set_cookie(header: &str) -> Option<ParsedCookie> {
    let mut parts = header.split(';').map(str::trim);
    let (name, value) = parts.next()?.split_once('=')?;
    if name.is_empty() {
        return None;
    }

    let mut expires = None;
    for attr in parts {
        if let Some((key, val)) = attr.split_once('=') {
            if key.eq_ignore_ascii_case("expires") {
                expires = DateTime::parse_from_rfc2822(val)
                    .ok()
                    .map(|dt| dt.timestamp());
            }
        }
    }

    Some(ParsedCookie {
        name: name.to_string(),
        value: value.to_string(),
        expires,
    })
}

/// Extract a named cookie's value from a Cookie request header.
pub fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').map(str::trim).find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == name).then_some(v)
    })
}

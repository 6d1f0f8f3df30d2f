//! Unique output names for canonical PDFs.
//!
//! Names become object-store keys downstream, so the stem is restricted to
//! the key-safe set `[0-9a-zA-Z!-_.*'()]`; everything else (spaces,
//! accents, slashes, other punctuation) turns into `_`.

use crate::error::NormalizeError;
use crate::output::OrdinalPath;
use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static RE_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9a-zA-Z!\-_.*'()]").unwrap());

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Replace every character outside the key-safe set with `_`.
pub fn sanitize(input: &str) -> String {
    let s = RE_DISALLOWED.replace_all(input, "_");
    RE_WHITESPACE.replace_all(&s, "_").into_owned()
}

/// Build `<timestamp>-<sanitised stem>-<ordinal>.pdf`.
pub fn make_unique_name(timestamp: &BatchTimestamp, stem: &str, ordinal: &OrdinalPath) -> String {
    format!("{}-{}-{}.pdf", timestamp, sanitize(stem), ordinal)
}

/// The batch-wide timestamp prefix, formatted `%Y%m%d%H%M%S`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchTimestamp(String);

const FORMAT: &str = "%Y%m%d%H%M%S";

/// Receive-time format used by the mail provider webhook payloads.
const PROVIDER_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

impl BatchTimestamp {
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.format(FORMAT).to_string())
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Parse a receive time such as `2024-05-17T09:41:03Z`.
    ///
    /// Any RFC 3339 timestamp is accepted as well and converted to UTC.
    pub fn parse(input: &str) -> Result<Self, NormalizeError> {
        let trimmed = input.trim();
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, PROVIDER_FORMAT) {
            return Ok(Self::from_datetime(naive.and_utc()));
        }
        DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| Self::from_datetime(dt.with_timezone(&Utc)))
            .map_err(|_| NormalizeError::InvalidTimestamp {
                input: input.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<DateTime<Utc>> for BatchTimestamp {
    fn from(at: DateTime<Utc>) -> Self {
        Self::from_datetime(at)
    }
}

impl fmt::Display for BatchTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

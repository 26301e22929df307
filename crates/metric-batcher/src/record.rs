// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Parsing of raw input lines into measurement records.
//!
//! A line has the form
//!
//! ```text
//! KeyName:<measurement>:<tag1>:<value1>:<tag2>:<value2>|<value>|<rfc3339 timestamp>
//! ```
//!
//! Tokens of the first segment are paired by position. The `KeyName` pair names the
//! measurement and is never kept as a tag.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use derive_more::Display;
use tracing::warn;

use crate::constants::{KEY_NAME_TAG, RFC3339_FORMAT, SEGMENT_SEPARATOR, TAG_SEPARATOR};
use crate::errors::ParseError;

/// What to do with a line whose value or timestamp segment cannot be parsed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display)]
pub enum MalformedPolicy {
    /// Keep the record with a `0.0` value or a Unix epoch timestamp.
    #[default]
    #[display("zero")]
    ZeroFill,
    /// Drop the line.
    #[display("skip")]
    Skip,
}

impl FromStr for MalformedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zero" | "zero_fill" | "zerofill" => Ok(Self::ZeroFill),
            "skip" => Ok(Self::Skip),
            other => Err(format!(
                "invalid malformed line policy '{other}', expected one of: zero, skip"
            )),
        }
    }
}

/// A single parsed measurement.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    key: String,
    value: f64,
    tags: BTreeMap<String, String>,
    time: DateTime<Utc>,
}

impl Record {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[must_use]
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    #[must_use]
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Outcome of parsing one line that produced a record.
#[derive(Clone, Debug, PartialEq)]
pub struct Parsed {
    pub record: Record,
    /// True when a placeholder replaced an unparseable value or timestamp.
    pub degraded: bool,
}

/// Parses one input line.
///
/// Whitespace around the line is trimmed first. A line without a `|` never yields a
/// record. Unparseable values and timestamps are handled according to `policy`; each
/// of them is reported with a warning. A line without a timestamp segment is stamped
/// with the Unix epoch.
pub fn parse(line: &str, policy: MalformedPolicy) -> Result<Parsed, ParseError> {
    let line = line.trim();
    let mut segments = line.split(SEGMENT_SEPARATOR);

    // split always yields at least one segment
    let tag_spec = segments.next().unwrap_or_default();
    let Some(raw_value) = segments.next() else {
        return Err(ParseError::MissingValue);
    };
    let raw_time = segments.next();

    let mut tags = split_tags(tag_spec);
    let key = match tags.remove(KEY_NAME_TAG) {
        Some(key) if !key.is_empty() => key,
        _ => return Err(ParseError::MissingKeyName),
    };

    let mut degraded = false;

    let value = match parse_value(raw_value) {
        Ok(value) => value,
        Err(e) => {
            warn!("{e} in line {line:?}");
            match policy {
                MalformedPolicy::Skip => return Err(e),
                MalformedPolicy::ZeroFill => {
                    degraded = true;
                    0.0
                }
            }
        }
    };

    let time = match raw_time.map(parse_time) {
        None => DateTime::<Utc>::UNIX_EPOCH,
        Some(Ok(time)) => time,
        Some(Err(e)) => {
            warn!("{e} in line {line:?}");
            match policy {
                MalformedPolicy::Skip => return Err(e),
                MalformedPolicy::ZeroFill => {
                    degraded = true;
                    DateTime::<Utc>::UNIX_EPOCH
                }
            }
        }
    };

    Ok(Parsed {
        record: Record {
            key,
            value,
            tags,
            time,
        },
        degraded,
    })
}

/// Pairs the `:`-separated tokens of a tag spec by position.
///
/// Even positions are keys, the following odd position is the value. A trailing key
/// without a value is dropped. When a key repeats, the later pair wins.
#[must_use]
pub fn split_tags(tag_spec: &str) -> BTreeMap<String, String> {
    let tokens: Vec<&str> = tag_spec.split(TAG_SEPARATOR).collect();
    tokens
        .chunks_exact(2)
        .map(|pair| (pair[0].to_string(), pair[1].to_string()))
        .collect()
}

/// Values are read at 32-bit precision and widened, so `10.31` becomes `10.3100004196167`.
/// NaN and infinities have no line protocol encoding and are refused.
fn parse_value(raw: &str) -> Result<f64, ParseError> {
    match raw.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(f64::from(value)),
        _ => Err(ParseError::InvalidValue(raw.to_string())),
    }
}

/// Strict RFC 3339: a `T` between date and time, and either an uppercase `Z` or a
/// numeric offset.
fn parse_time(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    let normalized = match raw.strip_suffix('Z') {
        Some(local) => format!("{local}+00:00"),
        None => raw.to_string(),
    };
    DateTime::parse_from_str(&normalized, RFC3339_FORMAT)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|_| ParseError::InvalidTimestamp(raw.to_string()))
}

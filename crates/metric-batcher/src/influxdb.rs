// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! InfluxDB point model and a client for the `/write` HTTP endpoint.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::Display;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tracing::{debug, trace};

use crate::errors::SinkError;
use crate::flusher::PointSink;

/// Time precision of the timestamps sent on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, Serialize)]
pub enum Precision {
    #[display("ns")]
    #[serde(rename = "ns")]
    Nanoseconds,
    #[display("u")]
    #[serde(rename = "u")]
    Microseconds,
    #[display("ms")]
    #[serde(rename = "ms")]
    Milliseconds,
    #[default]
    #[display("s")]
    #[serde(rename = "s")]
    Seconds,
}

impl Precision {
    fn timestamp(self, time: DateTime<Utc>) -> Result<i64, SinkError> {
        match self {
            Self::Nanoseconds => time.timestamp_nanos_opt().ok_or_else(|| {
                SinkError::Payload(format!("{time} is out of range for nanosecond precision"))
            }),
            Self::Microseconds => Ok(time.timestamp_micros()),
            Self::Milliseconds => Ok(time.timestamp_millis()),
            Self::Seconds => Ok(time.timestamp()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
    pub time: DateTime<Utc>,
    pub precision: Precision,
}

impl Point {
    /// Appends this point to `out` as one line of line protocol, without the newline.
    ///
    /// Tags with an empty key or value cannot be represented and are left out.
    fn write_line(&self, out: &mut String) -> Result<(), SinkError> {
        if self.measurement.is_empty() {
            return Err(SinkError::Payload("point without measurement".to_string()));
        }
        if self.fields.is_empty() {
            return Err(SinkError::Payload(format!(
                "point {} has no fields",
                self.measurement
            )));
        }

        escape_into(out, &self.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            if key.is_empty() || value.is_empty() {
                trace!("Dropping empty tag {key:?}={value:?} from {}", self.measurement);
                continue;
            }
            out.push(',');
            escape_into(out, key, &[',', '=', ' ']);
            out.push('=');
            escape_into(out, value, &[',', '=', ' ']);
        }

        let mut separator = ' ';
        for (key, value) in &self.fields {
            if !value.is_finite() {
                return Err(SinkError::Payload(format!(
                    "field {key} of {} is not finite: {value}",
                    self.measurement
                )));
            }
            out.push(separator);
            escape_into(out, key, &[',', '=', ' ']);
            // writing to a String cannot fail
            let _ = write!(out, "={value}");
            separator = ',';
        }

        let _ = write!(out, " {}", self.precision.timestamp(self.time)?);
        Ok(())
    }
}

/// A backslash that would otherwise escape a following separator, or the delimiter
/// after the token, is doubled.
fn escape_into(out: &mut String, raw: &str, special: &[char]) {
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if special.contains(&ch) {
            out.push('\\');
        } else if ch == '\\' && chars.peek().map_or(true, |next| special.contains(next)) {
            out.push('\\');
        }
        out.push(ch);
    }
}

/// A group of points written in a single request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchPoints {
    pub points: Vec<Point>,
    pub database: String,
    pub retention_policy: String,
    pub precision: Precision,
}

impl BatchPoints {
    /// Renders the batch as newline-separated line protocol.
    pub fn to_line_protocol(&self) -> Result<String, SinkError> {
        let mut body = String::with_capacity(self.points.len() * 64);
        for point in &self.points {
            if point.precision != self.precision {
                return Err(SinkError::Payload(format!(
                    "point precision {} differs from batch precision {}",
                    point.precision, self.precision
                )));
            }
            point.write_line(&mut body)?;
            body.push('\n');
        }
        Ok(body)
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Client for the InfluxDB 1.x write API.
#[derive(Clone, Debug)]
pub struct InfluxApi {
    client: reqwest::Client,
    write_url: String,
    credentials: Option<Credentials>,
}

impl InfluxApi {
    /// `base_url` is the server root, for example `http://localhost:8086`.
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SinkError::Client(e.to_string()))?;
        Ok(Self {
            client,
            write_url: format!("{}/write", base_url.trim_end_matches('/')),
            credentials,
        })
    }

    #[must_use]
    pub fn write_url(&self) -> &str {
        &self.write_url
    }
}

#[async_trait]
impl PointSink for InfluxApi {
    async fn write_points(&self, batch: &BatchPoints) -> Result<(), SinkError> {
        let body = batch.to_line_protocol()?;

        let precision = batch.precision.to_string();
        let mut query = vec![
            ("db", batch.database.as_str()),
            ("precision", precision.as_str()),
        ];
        if !batch.retention_policy.is_empty() {
            query.push(("rp", batch.retention_policy.as_str()));
        }

        let mut request = self
            .client
            .post(&self.write_url)
            .query(&query)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body);
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, credentials.password.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Destination(e.status(), e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("{status}: wrote {} points", batch.points.len());
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(SinkError::Destination(Some(status), text))
        }
    }
}

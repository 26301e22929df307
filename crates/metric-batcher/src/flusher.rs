// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::constants::VALUE_FIELD;
use crate::errors::SinkError;
use crate::influxdb::{BatchPoints, Point, Precision};
use crate::record::Record;

/// Destination of flushed batches.
#[async_trait]
pub trait PointSink {
    /// Writes every point of `batch` or fails as a whole.
    async fn write_points(&self, batch: &BatchPoints) -> Result<(), SinkError>;
}

pub struct Flusher<S> {
    sink: S,
    database: String,
    retention_policy: String,
    precision: Precision,
}

pub struct FlusherConfig<S> {
    pub sink: S,
    pub database: String,
    pub retention_policy: String,
    pub precision: Precision,
}

impl<S: PointSink> Flusher<S> {
    pub fn new(config: FlusherConfig<S>) -> Self {
        Flusher {
            sink: config.sink,
            database: config.database,
            retention_policy: config.retention_policy,
            precision: config.precision,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Writes the given records as one batch and returns how many were written.
    ///
    /// The records are consumed either way; a failed write loses them.
    pub async fn flush(&self, records: Vec<Record>) -> Result<usize, SinkError> {
        let n_points = records.len();
        let batch = BatchPoints {
            points: to_points(records, self.precision),
            database: self.database.clone(),
            retention_policy: self.retention_policy.clone(),
            precision: self.precision,
        };

        debug!("Flushing {n_points} points to database {}", self.database);
        match serde_json::to_string(&batch) {
            Ok(json) => debug!("{json}"),
            Err(e) => debug!("Unable to render batch as JSON: {e}"),
        }

        if let Err(e) = self.sink.write_points(&batch).await {
            error!("Failed to write {n_points} points: {e}");
            return Err(e);
        }
        debug!("Successfully flushed {n_points} points");
        Ok(n_points)
    }
}

/// Turns records into single-field points.
#[must_use]
pub fn to_points(records: Vec<Record>, precision: Precision) -> Vec<Point> {
    records
        .into_iter()
        .map(|record| Point {
            measurement: record.key().to_string(),
            fields: BTreeMap::from([(VALUE_FIELD.to_string(), record.value())]),
            time: record.time(),
            tags: record.tags().clone(),
            precision,
        })
        .collect()
}

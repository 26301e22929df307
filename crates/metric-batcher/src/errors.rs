// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Why a single input line did not produce a record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("no value segment, expected `<tags>|<value>[|<timestamp>]`")]
    MissingValue,
    #[error("no `KeyName` tag pair carrying the measurement name")]
    MissingKeyName,
    #[error("unable to parse value {0:?} as float32")]
    InvalidValue(String),
    #[error("unable to parse timestamp {0:?} as RFC 3339")]
    InvalidTimestamp(String),
}

/// Failure to hand a batch to the storage backend. Always fatal for the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("failed to prepare payload: {0}")]
    Payload(String),
    #[error("error shipping batch: {0:?} {1}")]
    Destination(Option<StatusCode>, String),
}

/// Failure of the stdin ingest loop.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read input: {0}")]
    Read(#[from] std::io::Error),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

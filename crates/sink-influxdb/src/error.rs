// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use metric_batcher::errors::{IngestError, SinkError};

/// Errors that stop the sink process
#[derive(Debug, thiserror::Error)]
pub enum SinkInfluxdbError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to create InfluxDB client: {0}")]
    Client(#[source] SinkError),

    #[error("Ingest failed: {0}")]
    Ingest(#[from] IngestError),
}

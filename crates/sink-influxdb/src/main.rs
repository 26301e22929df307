// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod config;
mod error;

use std::env;
use std::num::NonZeroU64;

use tokio::io::BufReader;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use metric_batcher::{
    accumulator::BatchAccumulator,
    flusher::{Flusher, FlusherConfig},
    influxdb::{InfluxApi, Precision},
    ingest::ingest,
};

use crate::config::Config;
use crate::error::SinkInfluxdbError;

#[tokio::main(flavor = "current_thread")]
pub async fn main() {
    init_logging();

    if let Err(e) = run().await {
        error!("{e}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let log_level = env::var("INFLUX_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());
    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }

    debug!("Logging subsystem enabled");
}

async fn run() -> Result<(), SinkInfluxdbError> {
    let config = Config::from_env()?;
    let batch_size = NonZeroU64::new(config.batch_size).ok_or_else(|| {
        SinkInfluxdbError::InvalidConfig("INFLUX_BATCHSIZE must be greater than 0".to_string())
    })?;

    let api = InfluxApi::new(&config.base_url(), config.credentials())
        .map_err(SinkInfluxdbError::Client)?;
    info!(
        "Writing to {} database {} in batches of {batch_size} lines",
        api.write_url(),
        config.database
    );

    let flusher = Flusher::new(FlusherConfig {
        sink: api,
        database: config.database,
        retention_policy: config.retention_policy,
        precision: Precision::Seconds,
    });
    let accumulator = BatchAccumulator::new(flusher, batch_size, config.malformed_policy);

    let stats = ingest(BufReader::new(tokio::io::stdin()), accumulator).await?;
    info!(
        "Done: {} lines, {} blank, {} rejected, {} degraded, {} points written in {} batches",
        stats.lines_consumed,
        stats.blank_lines,
        stats.rejected_lines,
        stats.degraded_lines,
        stats.records_written,
        stats.flushes
    );
    Ok(())
}

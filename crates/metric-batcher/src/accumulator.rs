// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batching of parsed records.
//!
//! Every non-blank line advances a line counter. When the counter reaches a multiple of
//! the batch size, the records collected so far are flushed before the current line is
//! parsed, so the current line opens the next batch. Whatever is left when the input
//! ends is flushed once more.

use std::num::NonZeroU64;

use tracing::{debug, info, trace};

use crate::errors::SinkError;
use crate::flusher::{Flusher, PointSink};
use crate::record::{parse, MalformedPolicy, Record};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccumulatorState {
    Accumulating,
    Flushing,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccumulatorStats {
    /// Non-blank lines seen, including rejected ones.
    pub lines_consumed: u64,
    pub blank_lines: u64,
    pub rejected_lines: u64,
    /// Lines kept with a placeholder value or timestamp.
    pub degraded_lines: u64,
    pub records_written: u64,
    pub flushes: u64,
}

pub struct BatchAccumulator<S> {
    flusher: Flusher<S>,
    batch_size: NonZeroU64,
    policy: MalformedPolicy,
    batch: Vec<Record>,
    state: AccumulatorState,
    stats: AccumulatorStats,
}

impl<S: PointSink> BatchAccumulator<S> {
    pub fn new(flusher: Flusher<S>, batch_size: NonZeroU64, policy: MalformedPolicy) -> Self {
        BatchAccumulator {
            flusher,
            batch_size,
            policy,
            batch: Vec::new(),
            state: AccumulatorState::Accumulating,
            stats: AccumulatorStats::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    #[must_use]
    pub fn stats(&self) -> AccumulatorStats {
        self.stats
    }

    #[must_use]
    pub fn lines_consumed(&self) -> u64 {
        self.stats.lines_consumed
    }

    /// Records waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> &[Record] {
        &self.batch
    }

    #[must_use]
    pub fn flusher(&self) -> &Flusher<S> {
        &self.flusher
    }

    /// Takes one raw input line. Fails only when a flush triggered by this line fails.
    pub async fn consume(&mut self, line: &str) -> Result<(), SinkError> {
        if line.is_empty() {
            info!("String with no length. Skipping.");
            self.stats.blank_lines += 1;
            return Ok(());
        }

        self.stats.lines_consumed += 1;
        if self.stats.lines_consumed % self.batch_size.get() == 0 {
            self.flush().await?;
        }

        match parse(line, self.policy) {
            Ok(parsed) => {
                if parsed.degraded {
                    self.stats.degraded_lines += 1;
                }
                trace!(
                    "Accepted {} = {} with {} tags",
                    parsed.record.key(),
                    parsed.record.value(),
                    parsed.record.tags().len()
                );
                self.batch.push(parsed.record);
            }
            Err(e) => {
                info!("Skipping line {line:?}: {e}");
                self.stats.rejected_lines += 1;
            }
        }
        Ok(())
    }

    /// Flushes the remaining records, if any, and returns the final counters.
    pub async fn finish(mut self) -> Result<AccumulatorStats, SinkError> {
        if self.batch.is_empty() {
            info!("Message with no length. Skipping write and exiting..");
        } else {
            self.flush().await?;
        }
        Ok(self.stats)
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        if self.batch.is_empty() {
            debug!(
                "Batch boundary at line {} with no records, nothing to write",
                self.stats.lines_consumed
            );
            return Ok(());
        }

        self.state = AccumulatorState::Flushing;
        let batch = std::mem::take(&mut self.batch);
        let result = self.flusher.flush(batch).await;
        self.state = AccumulatorState::Accumulating;

        let written = result?;
        self.stats.records_written += written as u64;
        self.stats.flushes += 1;
        Ok(())
    }
}

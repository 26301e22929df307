// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Line-by-line reading of the input stream into a [`BatchAccumulator`].

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::accumulator::{AccumulatorStats, BatchAccumulator};
use crate::errors::IngestError;
use crate::flusher::PointSink;

/// Feeds every line of `reader` to `accumulator` until end of input, then flushes what
/// is left.
///
/// Lines end at `\n`, an optional `\r` before it is dropped. Invalid UTF-8 is replaced
/// rather than treated as a read error.
pub async fn ingest<R, S>(
    mut reader: R,
    mut accumulator: BatchAccumulator<S>,
) -> Result<AccumulatorStats, IngestError>
where
    R: AsyncBufRead + Unpin,
    S: PointSink,
{
    let mut buf = Vec::with_capacity(256);
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(strip_line_ending(&buf));
        accumulator.consume(&line).await?;
    }

    debug!(
        "End of input after {} lines",
        accumulator.lines_consumed() + accumulator.stats().blank_lines
    );
    Ok(accumulator.finish().await?)
}

fn strip_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

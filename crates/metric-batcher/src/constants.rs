// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Reserved tag key whose paired value carries the measurement name.
pub const KEY_NAME_TAG: &str = "KeyName";

/// Name of the single field every point is written with.
pub const VALUE_FIELD: &str = "value";

/// Separates the tag spec, the value and the timestamp of an input line.
pub const SEGMENT_SEPARATOR: char = '|';

/// Separates the tokens of the tag spec.
pub const TAG_SEPARATOR: char = ':';

pub const DEFAULT_BATCH_SIZE: u64 = 1_000;
pub const DEFAULT_INFLUXDB_PORT: u16 = 8086;
pub const DEFAULT_INFLUXDB_HOST: &str = "localhost";

/// Timestamp layout after a trailing `Z` has been rewritten to `+00:00`.
pub const RFC3339_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";

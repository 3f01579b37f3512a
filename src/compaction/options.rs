// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::error::ConfigError;
use std::collections::HashMap;

/// Option key of [`SizeTieredOptions::bucket_low`]
pub const BUCKET_LOW_KEY: &str = "bucket_low";

/// Option key of [`SizeTieredOptions::bucket_high`]
pub const BUCKET_HIGH_KEY: &str = "bucket_high";

/// Option key of [`SizeTieredOptions::min_sstable_size`]
pub const MIN_SSTABLE_SIZE_KEY: &str = "min_sstable_size";

/// Default lower similarity ratio
pub const DEFAULT_BUCKET_LOW: f64 = 0.5;

/// Default upper similarity ratio
pub const DEFAULT_BUCKET_HIGH: f64 = 1.5;

/// Default size below which tables are bucketed together regardless of ratio
pub const DEFAULT_MIN_SSTABLE_SIZE: u64 = /* 50 MiB */ 50 * 1_024 * 1_024;

/// Bucketing options of size-tiered compaction
///
/// A table joins a bucket if its size lies within
/// `[bucket_low * avg, bucket_high * avg]` of the bucket's average size,
/// or if both the table and the bucket average are smaller than `min_sstable_size`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SizeTieredOptions {
    pub(crate) bucket_low: f64,
    pub(crate) bucket_high: f64,
    pub(crate) min_sstable_size: u64,
}

impl Default for SizeTieredOptions {
    fn default() -> Self {
        Self {
            bucket_low: DEFAULT_BUCKET_LOW,
            bucket_high: DEFAULT_BUCKET_HIGH,
            min_sstable_size: DEFAULT_MIN_SSTABLE_SIZE,
        }
    }
}

impl SizeTieredOptions {
    /// Creates validated options.
    ///
    /// # Errors
    ///
    /// Returns error if `bucket_low` is not in (0, 1), or
    /// `bucket_high` is not in (1, ∞).
    pub fn new(bucket_low: f64, bucket_high: f64, min_sstable_size: u64) -> Result<Self, ConfigError> {
        let low_in_range = bucket_low > 0.0 && bucket_low < 1.0;
        if !low_in_range {
            return Err(ConfigError::OutOfRange {
                key: BUCKET_LOW_KEY,
                value: bucket_low.to_string(),
            });
        }

        let high_in_range = bucket_high > 1.0 && bucket_high.is_finite();
        if !high_in_range {
            return Err(ConfigError::OutOfRange {
                key: BUCKET_HIGH_KEY,
                value: bucket_high.to_string(),
            });
        }

        Ok(Self {
            bucket_low,
            bucket_high,
            min_sstable_size,
        })
    }

    /// Parses options from a string-keyed map.
    ///
    /// Missing keys use their defaults.
    ///
    /// # Errors
    ///
    /// Returns error on unknown keys, unparseable values or values out of range.
    pub fn from_options<S: std::hash::BuildHasher>(
        options: &HashMap<String, String, S>,
    ) -> Result<Self, ConfigError> {
        let mut bucket_low = DEFAULT_BUCKET_LOW;
        let mut bucket_high = DEFAULT_BUCKET_HIGH;
        let mut min_sstable_size = DEFAULT_MIN_SSTABLE_SIZE;

        for (key, value) in options {
            match key.as_str() {
                BUCKET_LOW_KEY => bucket_low = parse(BUCKET_LOW_KEY, value)?,
                BUCKET_HIGH_KEY => bucket_high = parse(BUCKET_HIGH_KEY, value)?,
                MIN_SSTABLE_SIZE_KEY => {
                    min_sstable_size = parse(MIN_SSTABLE_SIZE_KEY, value)?;
                }
                _ => return Err(ConfigError::UnknownOption(key.clone())),
            }
        }

        Self::new(bucket_low, bucket_high, min_sstable_size)
    }

    /// Lower similarity ratio.
    #[must_use]
    pub fn bucket_low(&self) -> f64 {
        self.bucket_low
    }

    /// Upper similarity ratio.
    #[must_use]
    pub fn bucket_high(&self) -> f64 {
        self.bucket_high
    }

    /// Size floor (bytes) below which the ratio comparison is bypassed.
    #[must_use]
    pub fn min_sstable_size(&self) -> u64 {
        self.min_sstable_size
    }

    /// Options as key-value pairs, as accepted by [`SizeTieredOptions::from_options`].
    #[must_use]
    pub fn to_options(&self) -> Vec<(&'static str, String)> {
        vec![
            (BUCKET_LOW_KEY, self.bucket_low.to_string()),
            (BUCKET_HIGH_KEY, self.bucket_high.to_string()),
            (MIN_SSTABLE_SIZE_KEY, self.min_sstable_size.to_string()),
        ]
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Unparseable {
        key,
        value: value.into(),
    })
}

// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Invalid compaction configuration
///
/// Always raised when a configuration value is built, never while
/// selecting tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Option key that no strategy understands
    UnknownOption(String),

    /// Option value that could not be parsed
    Unparseable {
        /// Option key
        key: &'static str,

        /// Raw value
        value: String,
    },

    /// Option value outside of its allowed range
    OutOfRange {
        /// Option key
        key: &'static str,

        /// Raw value
        value: String,
    },

    /// Thresholds violate `2 <= min <= max`
    InvalidThresholds {
        /// Minimum table count of a compaction
        min: usize,

        /// Maximum table count of a compaction
        max: usize,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownOption(key) => write!(f, "unknown compaction option {key:?}"),
            Self::Unparseable { key, value } => {
                write!(f, "could not parse {key}={value:?}")
            }
            Self::OutOfRange { key, value } => {
                write!(f, "{key}={value:?} is out of range")
            }
            Self::InvalidThresholds { min, max } => {
                write!(f, "invalid thresholds min={min} max={max}")
            }
        }
    }
}

/// Represents errors that can occur while planning or running compactions
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Invalid configuration
    Config(ConfigError),

    /// Merge task was dropped before it was resolved
    Cancelled,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CompactionError: {self:?}")
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Config(_) | Self::Cancelled => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ConfigError> for Error {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// Compaction result
pub type Result<T> = std::result::Result<T, Error>;

use std::path::PathBuf;
use thiserror::Error;

use crate::signal::Channel;

pub type Result<T> = std::result::Result<T, WinkError>;

#[derive(Debug, Error)]
pub enum WinkError {
    /// Raw samples are neither cached nor obtainable from the video.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error(
        "no peaks found in the {channel} spectrum (window {window}, threshold {threshold}); \
         not enough data, try a longer analysis window (-t) or a lower threshold"
    )]
    InsufficientPeaks {
        channel: Channel,
        window: usize,
        threshold: f64,
    },

    /// Both lights blink at the same estimated rate, so the beat period is unbounded.
    #[error("both lights estimated at {frequency} Hz; beat period is undefined")]
    DegenerateFrequencies { frequency: f64 },

    #[error("malformed data: {0}")]
    MalformedData(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("fft failed: {0}")]
    Fft(String),

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WinkError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WinkError::Io {
            path: path.into(),
            source,
        }
    }
}

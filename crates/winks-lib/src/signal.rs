use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{Result, WinkError};

/// One of the two observed lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Light1,
    Light2,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Light1, Channel::Light2];

    pub fn index(self) -> usize {
        match self {
            Channel::Light1 => 0,
            Channel::Light2 => 1,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Light1 => write!(f, "light 1"),
            Channel::Light2 => write!(f, "light 2"),
        }
    }
}

/// Per-frame samples of one light, timestamped in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub times: Vec<f64>,
    /// Normalized intensity in [0, 1]
    pub data: Vec<f64>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    /// Interval between the first two samples.
    pub fn sample_interval(&self) -> Option<f64> {
        match self.times.as_slice() {
            [t0, t1, ..] => Some(t1 - t0),
            _ => None,
        }
    }
}

/// Both lights sampled on a shared timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub times: Vec<f64>,
    pub light1: Vec<f64>,
    pub light2: Vec<f64>,
}

impl Recording {
    /// Build a recording, rejecting sequences that do not line up.
    pub fn new(times: Vec<f64>, light1: Vec<f64>, light2: Vec<f64>) -> Result<Self> {
        let recording = Self {
            times,
            light1,
            light2,
        };
        recording.validate()?;
        Ok(recording)
    }

    pub fn validate(&self) -> Result<()> {
        if self.light1.len() != self.times.len() || self.light2.len() != self.times.len() {
            return Err(WinkError::MalformedData(format!(
                "length mismatch: {} timestamps, {} light 1 samples, {} light 2 samples",
                self.times.len(),
                self.light1.len(),
                self.light2.len()
            )));
        }
        if let Some(pos) = self.times.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(WinkError::MalformedData(format!(
                "timestamps not strictly increasing at sample {}",
                pos + 1
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn duration(&self) -> f64 {
        match (self.times.first(), self.times.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Keep only the leading samples whose timestamp is below `max_seconds`.
    pub fn truncate(&mut self, max_seconds: f64) {
        let keep = self.times.iter().take_while(|t| **t < max_seconds).count();
        self.times.truncate(keep);
        self.light1.truncate(keep);
        self.light2.truncate(keep);
    }

    /// Hash over the exact bits of every sample, used to tie cached artifacts
    /// to the data they were derived from.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for series in [&self.times, &self.light1, &self.light2] {
            series.len().hash(&mut hasher);
            for v in series.iter() {
                v.to_bits().hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    pub fn channel(&self, channel: Channel) -> TimeSeries {
        let data = match channel {
            Channel::Light1 => self.light1.clone(),
            Channel::Light2 => self.light2.clone(),
        };
        TimeSeries {
            times: self.times.clone(),
            data,
        }
    }
}

/// One-sided amplitude spectrum; `freqs[i]` pairs with `amps[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub freqs: Vec<f64>,
    pub amps: Vec<f64>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.amps.len()
    }
    pub fn is_empty(&self) -> bool {
        self.amps.is_empty()
    }
    /// Spacing of the frequency grid, if there are at least two bins.
    pub fn bin_width(&self) -> Option<f64> {
        match self.freqs.as_slice() {
            [f0, f1, ..] => Some(f1 - f0),
            _ => None,
        }
    }
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.freqs.iter().copied().zip(self.amps.iter().copied())
    }
}

/// A dominant local maximum of a spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub index: usize,
    pub freq: f64,
    pub amp: f64,
}

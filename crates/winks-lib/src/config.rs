use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, WinkError};

/// A pixel location in a video frame (row-major, zero based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pixel {
    pub row: usize,
    pub col: usize,
}

impl Pixel {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Which RGB component carries the light's intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChannel {
    #[default]
    Red,
    Green,
    Blue,
}

impl ColorChannel {
    pub fn pick(self, rgb: [u8; 3]) -> u8 {
        match self {
            ColorChannel::Red => rgb[0],
            ColorChannel::Green => rgb[1],
            ColorChannel::Blue => rgb[2],
        }
    }
}

/// Where raw samples come from when the cache is cold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Video { path: PathBuf },
    Synthetic(SyntheticConfig),
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Video {
            path: PathBuf::from("video_data.mp4"),
        }
    }
}

/// Parameters of the generated square-wave lights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Blink frequency of each light (Hz).
    pub frequencies: [f64; 2],
    /// Frames per second.
    pub frame_rate: f64,
    /// Length of the recording (seconds).
    pub duration: f64,
    /// Fraction of each period the light is on.
    pub duty_cycle: f64,
    /// Pixel value while lit.
    pub on_level: u8,
    /// Pixel value while dark.
    pub off_level: u8,
    /// Fraction of the frame interval the shutter is open.
    pub exposure: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            frequencies: [2.0, 2.01],
            frame_rate: 30.0,
            duration: 600.0,
            duty_cycle: 0.5,
            on_level: 255,
            off_level: 0,
            exposure: 1.0,
        }
    }
}

/// How much of the pipeline is persisted between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheGranularity {
    /// Timestamps and raw intensities only.
    #[default]
    Samples,
    /// Additionally the per-light spectra, skipping the transform on a hit.
    Spectra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub granularity: CacheGranularity,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            granularity: CacheGranularity::Samples,
        }
    }
}

/// Peak dominance test parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakConfig {
    /// A peak must be the largest amplitude within +-`window` bins.
    pub window: usize,
    /// A peak must also exceed this amplitude.
    pub threshold: f64,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            window: 50,
            threshold: 100.0,
        }
    }
}

/// How peak frequencies map to harmonic numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarmonicIndexing {
    /// `freq / first_freq`, unrounded.
    #[default]
    Ratio,
    /// `freq / first_freq` rounded to the nearest integer, at least 1.
    Nearest,
}

/// Explicit per-run configuration for every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub source: SourceConfig,
    pub lights: [Pixel; 2],
    pub color_channel: ColorChannel,
    pub cache: CacheConfig,
    pub peaks: PeakConfig,
    pub harmonics: HarmonicIndexing,
    /// Analyze only samples before this many seconds.
    pub max_duration: Option<f64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            lights: [Pixel::new(420, 713), Pixel::new(360, 473)],
            color_channel: ColorChannel::Red,
            cache: CacheConfig::default(),
            peaks: PeakConfig::default(),
            harmonics: HarmonicIndexing::Ratio,
            max_duration: None,
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AnalysisConfig =
            toml::from_str(text).map_err(|e| WinkError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| WinkError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.peaks.window == 0 {
            return Err(WinkError::InvalidConfig("peak window must be at least 1".into()));
        }
        if !self.peaks.threshold.is_finite() || self.peaks.threshold < 0.0 {
            return Err(WinkError::InvalidConfig(format!(
                "peak threshold must be a non-negative number, got {}",
                self.peaks.threshold
            )));
        }
        if let Some(t) = self.max_duration {
            if !(t.is_finite() && t > 0.0) {
                return Err(WinkError::InvalidConfig(format!(
                    "max duration must be positive, got {t}"
                )));
            }
        }
        if self.lights[0] == self.lights[1] {
            return Err(WinkError::InvalidConfig(
                "both lights point at the same pixel".into(),
            ));
        }
        if let SourceConfig::Synthetic(synthetic) = &self.source {
            synthetic.validate()?;
        }
        Ok(())
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.frame_rate > 0.0 && self.duration > 0.0) {
            return Err(WinkError::InvalidConfig(
                "synthetic frame rate and duration must be positive".into(),
            ));
        }
        if !(self.duty_cycle > 0.0 && self.duty_cycle < 1.0) {
            return Err(WinkError::InvalidConfig(format!(
                "duty cycle must lie in (0, 1), got {}",
                self.duty_cycle
            )));
        }
        if !(self.exposure > 0.0 && self.exposure <= 1.0) {
            return Err(WinkError::InvalidConfig(format!(
                "exposure must lie in (0, 1], got {}",
                self.exposure
            )));
        }
        if self.frequencies.iter().any(|f| !(*f > 0.0)) {
            return Err(WinkError::InvalidConfig(
                "synthetic blink frequencies must be positive".into(),
            ));
        }
        Ok(())
    }
}

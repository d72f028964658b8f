use serde::{Deserialize, Serialize};

use crate::error::{Result, WinkError};

/// Estimated blink rates of both lights and the period of their phase drift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatResult {
    pub light1_hz: f64,
    pub light2_hz: f64,
    pub beat_period_minutes: f64,
    pub light1_peaks: usize,
    pub light2_peaks: usize,
}

/// Time in minutes for two oscillators at `f0_a` and `f0_b` Hz to slip a full cycle.
pub fn beat_period(f0_a: f64, f0_b: f64) -> Result<f64> {
    let diff = (f0_a - f0_b).abs();
    if diff == 0.0 {
        return Err(WinkError::DegenerateFrequencies { frequency: f0_a });
    }
    Ok(1.0 / diff / 60.0)
}

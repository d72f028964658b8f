use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::HarmonicIndexing;
use crate::error::{Result, WinkError};
use crate::signal::Peak;

/// Straight-line fit of peak frequency against harmonic number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonicFit {
    /// Harmonic number assigned to each peak.
    pub harmonics: Vec<f64>,
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination of the fit (1.0 for a perfect line).
    pub r_squared: f64,
    pub peaks: Vec<Peak>,
}

impl HarmonicFit {
    /// Fundamental frequency estimate in Hz: the fitted slope.
    pub fn fundamental(&self) -> f64 {
        self.slope
    }

    pub fn predict(&self, harmonic: f64) -> f64 {
        self.slope * harmonic + self.intercept
    }

    /// `(harmonic, peak frequency)` pairs that were fitted.
    pub fn points(&self) -> Vec<[f64; 2]> {
        self.harmonics
            .iter()
            .zip(&self.peaks)
            .map(|(h, p)| [*h, p.freq])
            .collect()
    }
}

/// Estimate the fundamental frequency from a run of harmonic peaks.
///
/// Each peak is assigned the harmonic number `freq / first_freq` and a
/// least-squares line is fitted through `(harmonic, freq)`.
pub fn estimate(peaks: &[Peak], indexing: HarmonicIndexing) -> Result<HarmonicFit> {
    let first = peaks
        .first()
        .ok_or_else(|| WinkError::MalformedData("no peaks to fit".into()))?;
    if !(first.freq.is_finite() && first.freq != 0.0) {
        return Err(WinkError::MalformedData(format!(
            "first peak frequency {} cannot anchor harmonic numbers",
            first.freq
        )));
    }
    let harmonics: Vec<f64> = peaks
        .iter()
        .map(|p| {
            let ratio = p.freq / first.freq;
            match indexing {
                HarmonicIndexing::Ratio => ratio,
                HarmonicIndexing::Nearest => ratio.round().max(1.0),
            }
        })
        .collect();
    let freqs: Vec<f64> = peaks.iter().map(|p| p.freq).collect();
    let (slope, intercept) = linear_fit(&harmonics, &freqs);
    let r_squared = coefficient_of_determination(&harmonics, &freqs, slope, intercept);
    debug!(
        "fit over {} harmonics: slope {:.6} Hz, intercept {:.6} Hz, r^2 {:.6}",
        peaks.len(),
        slope,
        intercept,
        r_squared
    );
    Ok(HarmonicFit {
        harmonics,
        slope,
        intercept,
        r_squared,
        peaks: peaks.to_vec(),
    })
}

/// Ordinary least squares `y = slope * x + intercept`.
///
/// With fewer than two distinct `x` values the line is pinned through the origin.
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return (0.0, 0.0);
    }
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xx = 0.0;
    let mut sum_xy = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        sum_x += x;
        sum_y += y;
        sum_xx += x * x;
        sum_xy += x * y;
    }
    let n_f = n as f64;
    let denom = n_f * sum_xx - sum_x * sum_x;
    if denom.abs() <= f64::EPSILON * (n_f * sum_xx).abs() {
        let slope = if sum_x != 0.0 { sum_y / sum_x } else { 0.0 };
        return (slope, 0.0);
    }
    let slope = (n_f * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n_f;
    (slope, intercept)
}

fn coefficient_of_determination(xs: &[f64], ys: &[f64], slope: f64, intercept: f64) -> f64 {
    if ys.is_empty() {
        return 0.0;
    }
    let mean = ys.iter().sum::<f64>() / ys.len() as f64;
    let ss_tot: f64 = ys.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
        .sum();
    if ss_tot == 0.0 {
        1.0
    } else {
        1.0 - ss_res / ss_tot
    }
}

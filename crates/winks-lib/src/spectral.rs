use realfft::RealFftPlanner;

use crate::error::{Result, WinkError};
use crate::signal::{Spectrum, TimeSeries};

/// One-sided DFT magnitude of `values`.
///
/// The frequency grid runs evenly from 0 to `1 / dt` (inclusive) across as many
/// points as there are samples, `dt` being the first timestamp interval; only the
/// lower half (below Nyquist) is returned.
pub fn transform(times: &[f64], values: &[f64]) -> Result<Spectrum> {
    if times.len() != values.len() {
        return Err(WinkError::MalformedData(format!(
            "{} timestamps but {} samples",
            times.len(),
            values.len()
        )));
    }
    let n = values.len();
    if n < 2 {
        return Err(WinkError::MalformedData(format!(
            "need at least two samples for a spectrum, got {n}"
        )));
    }
    let dt = times[1] - times[0];
    if !(dt > 0.0) {
        return Err(WinkError::MalformedData(format!(
            "sampling interval must be positive, got {dt}"
        )));
    }

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(n);
    let mut input = values.to_vec();
    let mut output = r2c.make_output_vec();
    r2c.process(&mut input, &mut output)
        .map_err(|e| WinkError::Fft(e.to_string()))?;

    let half = n / 2;
    let step = (1.0 / dt) / (n - 1) as f64;
    let freqs = (0..half).map(|i| i as f64 * step).collect();
    let amps = output.iter().take(half).map(|c| c.norm()).collect();
    Ok(Spectrum { freqs, amps })
}

pub fn transform_series(series: &TimeSeries) -> Result<Spectrum> {
    transform(&series.times, &series.data)
}

use log::debug;

use crate::config::PeakConfig;
use crate::signal::{Peak, Spectrum};

/// Find dominant local maxima of a spectrum.
///
/// Bin `i` is a peak when its amplitude is the largest in `[i - window, i + window)`
/// and exceeds `threshold`. Bins closer than `window` to either end cannot be
/// judged and are skipped. Neighbouring bins tied for the maximum each qualify.
/// Peaks come back in ascending frequency.
pub fn find_peaks(spectrum: &Spectrum, window: usize, threshold: f64) -> Vec<Peak> {
    let amps = &spectrum.amps;
    let end = amps.len().saturating_sub(window);
    let mut peaks = Vec::new();
    for i in window..end {
        let amp = amps[i];
        if amp <= threshold {
            continue;
        }
        let local_max = amps[i - window..i + window]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        if amp == local_max {
            peaks.push(Peak {
                index: i,
                freq: spectrum.freqs[i],
                amp,
            });
        }
    }
    debug!(
        "found {} peaks (window {}, threshold {})",
        peaks.len(),
        window,
        threshold
    );
    peaks
}

pub fn find_peaks_with_config(spectrum: &Spectrum, cfg: &PeakConfig) -> Vec<Peak> {
    find_peaks(spectrum, cfg.window, cfg.threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(amps: Vec<f64>) -> Spectrum {
        Spectrum {
            freqs: (0..amps.len()).map(|i| i as f64 * 0.5).collect(),
            amps,
        }
    }

    #[test]
    fn finds_isolated_maxima_above_threshold() {
        let mut amps = vec![1.0; 40];
        amps[10] = 50.0;
        amps[20] = 5.0;
        amps[30] = 80.0;
        let peaks = find_peaks(&spectrum(amps), 3, 10.0);
        let indices: Vec<usize> = peaks.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![10, 30]);
        assert_eq!(peaks[0].freq, 5.0);
        assert_eq!(peaks[1].amp, 80.0);
    }

    #[test]
    fn never_reports_bins_near_either_edge() {
        let mut amps = vec![0.0; 30];
        amps[2] = 100.0;
        amps[26] = 100.0;
        amps[27] = 100.0;
        amps[15] = 100.0;
        let window = 4;
        let peaks = find_peaks(&spectrum(amps.clone()), window, 1.0);
        assert_eq!(peaks.iter().map(|p| p.index).collect::<Vec<_>>(), vec![15]);
        for w in 1..10 {
            for p in find_peaks(&spectrum(amps.clone()), w, 1.0) {
                assert!(p.index >= w && p.index < amps.len() - w);
            }
        }
    }

    #[test]
    fn window_is_half_open_on_the_right() {
        // bin 10 only sees up to bin 11 with window 2, so the taller bin 12 does not mask it
        let mut amps = vec![0.0; 20];
        amps[10] = 5.0;
        amps[12] = 9.0;
        let idx: Vec<usize> = find_peaks(&spectrum(amps), 2, 1.0)
            .iter()
            .map(|p| p.index)
            .collect();
        assert_eq!(idx, vec![10, 12]);
    }

    #[test]
    fn tied_neighbours_both_qualify() {
        let mut amps = vec![0.0; 20];
        amps[9] = 7.0;
        amps[10] = 7.0;
        let idx: Vec<usize> = find_peaks(&spectrum(amps), 3, 1.0)
            .iter()
            .map(|p| p.index)
            .collect();
        assert_eq!(idx, vec![9, 10]);
    }

    #[test]
    fn threshold_is_strict() {
        let mut amps = vec![0.0; 20];
        amps[10] = 10.0;
        assert!(find_peaks(&spectrum(amps.clone()), 3, 10.0).is_empty());
        assert_eq!(find_peaks(&spectrum(amps), 3, 9.999).len(), 1);
    }

    #[test]
    fn short_spectrum_yields_nothing() {
        assert!(find_peaks(&spectrum(vec![5.0; 5]), 3, 0.0).is_empty());
        assert!(find_peaks(&spectrum(Vec::new()), 1, 0.0).is_empty());
    }

    #[test]
    fn repeated_runs_agree() {
        let amps: Vec<f64> = (0..500).map(|i| ((i * 37 % 101) as f64).sqrt()).collect();
        let input = spectrum(amps);
        let first = find_peaks(&input, 7, 3.0);
        assert!(!first.is_empty());
        assert_eq!(first, find_peaks(&input, 7, 3.0));
    }
}

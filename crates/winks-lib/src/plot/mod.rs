use serde::{Deserialize, Serialize};

use crate::harmonics::HarmonicFit;
use crate::signal::{Channel, Peak, Recording, Spectrum};

/// Seconds of waveform shown in the reference plot.
pub const WAVEFORM_SECONDS: f64 = 10.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    /// Unconnected markers; `style.width` is the marker radius.
    Points(LineSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(s) | Series::Points(s) => &s.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn with_labels(mut self, x: &str, y: &str) -> Self {
        self.x.label = Some(x.into());
        self.y.label = Some(y.into());
        self
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// `(x_min, x_max, y_min, y_max)` over every series, if any point exists.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.series.iter().flat_map(|s| s.points().iter());
        let first = points.next()?;
        let init = (first[0], first[0], first[1], first[1]);
        Some(points.fold(init, |(x0, x1, y0, y1), p| {
            (x0.min(p[0]), x1.max(p[0]), y0.min(p[1]), y1.max(p[1]))
        }))
    }
}

/// Every `k`-th point, keeping at most `max_points`.
pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

/// Light 1 intensity over the first [`WAVEFORM_SECONDS`].
pub fn figure_from_waveform(recording: &Recording) -> Figure {
    let start = recording.times.first().copied().unwrap_or(0.0);
    let points: Vec<[f64; 2]> = recording
        .times
        .iter()
        .zip(&recording.light1)
        .take_while(|(t, _)| **t - start <= WAVEFORM_SECONDS)
        .map(|(t, v)| [*t, *v])
        .collect();
    let mut fig =
        Figure::new(Some("Light 1 waveform".to_string())).with_labels("time (s)", "intensity");
    fig.add_series(Series::Line(LineSeries {
        name: "light 1".into(),
        points,
        style: Style {
            width: 1.4,
            color: Color(0x1F77B4),
        },
    }));
    fig
}

/// Amplitude spectrum with the detected peaks marked.
pub fn figure_from_spectrum(
    channel: Channel,
    spectrum: &Spectrum,
    peaks: &[Peak],
    max_points: usize,
) -> Figure {
    let points: Vec<[f64; 2]> = spectrum.points().map(|(f, a)| [f, a]).collect();
    let mut fig = Figure::new(Some(format!("Spectrum of {channel}")))
        .with_labels("frequency (Hz)", "amplitude");
    fig.add_series(Series::Line(LineSeries {
        name: "spectrum".into(),
        points: decimate_points(&points, max_points),
        style: Style {
            width: 1.0,
            color: Color(0x1F77B4),
        },
    }));
    fig.add_series(Series::Points(LineSeries {
        name: "peaks".into(),
        points: peaks.iter().map(|p| [p.freq, p.amp]).collect(),
        style: Style {
            width: 3.0,
            color: Color(0xD62728),
        },
    }));
    fig
}

/// Peak frequency against harmonic number, with the fitted line.
pub fn figure_from_fit(channel: Channel, fit: &HarmonicFit) -> Figure {
    let mut fig = Figure::new(Some(format!(
        "Harmonics of {channel}: f0 = {:.4} Hz",
        fit.fundamental()
    )))
    .with_labels("harmonic number", "frequency (Hz)");
    fig.add_series(Series::Points(LineSeries {
        name: "peaks".into(),
        points: fit.points(),
        style: Style {
            width: 3.0,
            color: Color(0x1F77B4),
        },
    }));
    fig.add_series(Series::Line(LineSeries {
        name: "fit".into(),
        points: fit.harmonics.iter().map(|h| [*h, fit.predict(*h)]).collect(),
        style: Style {
            width: 1.4,
            color: Color(0xFF7F0E),
        },
    }));
    fig
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarmonicIndexing;
    use crate::harmonics::estimate;

    #[test]
    fn waveform_covers_first_ten_seconds() {
        let times: Vec<f64> = (0..300).map(|i| i as f64 * 0.1).collect();
        let light: Vec<f64> = times.iter().map(|t| t.sin().abs()).collect();
        let rec = Recording::new(times, light.clone(), light).unwrap();
        let fig = figure_from_waveform(&rec);
        let pts = fig.series[0].points();
        assert!(pts.iter().all(|p| p[0] <= WAVEFORM_SECONDS));
        assert!(pts.len() >= 100);
    }

    #[test]
    fn spectrum_figure_marks_peaks_and_decimates() {
        let spectrum = Spectrum {
            freqs: (0..5000).map(|i| i as f64 * 0.01).collect(),
            amps: (0..5000).map(|i| (i % 97) as f64).collect(),
        };
        let peaks = [Peak {
            index: 96,
            freq: 0.96,
            amp: 96.0,
        }];
        let fig = figure_from_spectrum(Channel::Light2, &spectrum, &peaks, 1024);
        assert_eq!(fig.series[0].points().len(), 1024);
        assert!(matches!(fig.series[1], Series::Points(_)));
        assert_eq!(fig.series[1].points(), &[[0.96, 96.0]]);
        assert_eq!(fig.title.as_deref(), Some("Spectrum of light 2"));
    }

    #[test]
    fn fit_figure_pairs_harmonics_with_line() {
        let peaks: Vec<Peak> = [1.0, 3.0, 5.0]
            .iter()
            .enumerate()
            .map(|(i, f)| Peak {
                index: i,
                freq: *f,
                amp: 1.0,
            })
            .collect();
        let fit = estimate(&peaks, HarmonicIndexing::Ratio).unwrap();
        let fig = figure_from_fit(Channel::Light1, &fit);
        assert_eq!(fig.series[0].points(), &[[1.0, 1.0], [3.0, 3.0], [5.0, 5.0]]);
        let (x0, x1, y0, y1) = fig.bounds().unwrap();
        assert_eq!((x0, x1), (1.0, 5.0));
        assert!((y0 - 1.0).abs() < 1e-9 && (y1 - 5.0).abs() < 1e-9);
    }
}

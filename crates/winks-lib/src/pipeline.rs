use log::{debug, info};

use crate::beat::{beat_period, BeatResult};
use crate::config::{AnalysisConfig, CacheGranularity};
use crate::error::{Result, WinkError};
use crate::harmonics::{estimate, HarmonicFit};
use crate::ingest::{self, VideoDecoder};
use crate::io::cache::{Cache, SpectraManifest};
use crate::peaks::find_peaks_with_config;
use crate::signal::{Channel, Peak, Recording, Spectrum};
use crate::spectral::transform_series;

/// Receives intermediate results as the pipeline produces them.
///
/// Nothing an observer does feeds back into the analysis.
pub trait Observer {
    fn on_waveform(&mut self, _recording: &Recording) {}
    fn on_spectrum(&mut self, _channel: Channel, _spectrum: &Spectrum, _peaks: &[Peak]) {}
    fn on_fit(&mut self, _channel: Channel, _fit: &HarmonicFit) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Load the configured recording and analyze it.
pub fn analyze(
    config: &AnalysisConfig,
    decoder: &dyn VideoDecoder,
    observer: &mut dyn Observer,
) -> Result<BeatResult> {
    config.validate()?;
    info!("beginning analysis");
    let recording = ingest::load(config, decoder)?;
    analyze_recording(&recording, config, observer)
}

/// Estimate both fundamentals of `recording` and the resulting beat period.
pub fn analyze_recording(
    recording: &Recording,
    config: &AnalysisConfig,
    observer: &mut dyn Observer,
) -> Result<BeatResult> {
    recording.validate()?;
    observer.on_waveform(recording);
    let spectra = spectra(recording, config)?;
    let mut fits = Vec::with_capacity(2);
    for channel in Channel::ALL {
        info!("analyzing {channel}");
        fits.push(analyze_spectrum(
            channel,
            &spectra[channel.index()],
            config,
            observer,
        )?);
    }
    let (f1, f2) = (fits[0].fundamental(), fits[1].fundamental());
    let period = beat_period(f1, f2)?;
    info!("light 1 at {f1:.4} Hz, light 2 at {f2:.4} Hz, beat period {period:.2} min");
    Ok(BeatResult {
        light1_hz: f1,
        light2_hz: f2,
        beat_period_minutes: period,
        light1_peaks: fits[0].peaks.len(),
        light2_peaks: fits[1].peaks.len(),
    })
}

/// Peak detection and harmonic fit for one light.
pub fn analyze_spectrum(
    channel: Channel,
    spectrum: &Spectrum,
    config: &AnalysisConfig,
    observer: &mut dyn Observer,
) -> Result<HarmonicFit> {
    let peaks = find_peaks_with_config(spectrum, &config.peaks);
    observer.on_spectrum(channel, spectrum, &peaks);
    if peaks.is_empty() {
        return Err(WinkError::InsufficientPeaks {
            channel,
            window: config.peaks.window,
            threshold: config.peaks.threshold,
        });
    }
    let fit = estimate(&peaks, config.harmonics)?;
    observer.on_fit(channel, &fit);
    Ok(fit)
}

/// Spectra of both lights, served from the cache when configured and current.
pub fn spectra(recording: &Recording, config: &AnalysisConfig) -> Result<[Spectrum; 2]> {
    if config.cache.granularity != CacheGranularity::Spectra {
        return compute_spectra(recording);
    }
    let cache = Cache::new(&config.cache.dir);
    let manifest = SpectraManifest::for_recording(recording, config.max_duration);
    if let Some(cached) = cache.read_spectra(&manifest)? {
        info!("loading cached spectra from {}", cache.dir().display());
        return Ok(cached);
    }
    let computed = compute_spectra(recording)?;
    cache.write_spectra(&manifest, &computed)?;
    debug!("cached spectra in {}", cache.dir().display());
    Ok(computed)
}

fn compute_spectra(recording: &Recording) -> Result<[Spectrum; 2]> {
    debug!("transforming {} samples per light", recording.len());
    Ok([
        transform_series(&recording.channel(Channel::Light1))?,
        transform_series(&recording.channel(Channel::Light2))?,
    ])
}
